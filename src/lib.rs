// Library surface for headless/integration tests and reuse.
// The binary in main.rs only wires these together.
pub mod app_dirs;
pub mod card;
pub mod config;
pub mod error;
pub mod gesture;
pub mod http;
pub mod runtime;
pub mod session;
pub mod speech;
pub mod store;
pub mod sync;
pub mod ui;

pub use card::{Card, CardId, Filter};
pub use error::DeckError;
pub use session::{Command, Session};
pub use store::CardStore;
