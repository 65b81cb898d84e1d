use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::card::{Card, CardId};
use crate::error::DeckError;

/// The external service of record for card data.
pub trait Persistence: Send + Sync + 'static {
    fn fetch_cards(&self) -> Result<Vec<Card>, DeckError>;
    fn set_learned(&self, id: &CardId, learned: bool) -> Result<(), DeckError>;
    fn set_favourite(&self, id: &CardId, is_favourite: bool) -> Result<(), DeckError>;
    /// Additive on the collaborator side.
    fn add_time(&self, id: &CardId, seconds: u64) -> Result<(), DeckError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Learned { id: CardId, value: bool },
    Favourite { id: CardId, value: bool },
    Time { id: CardId, seconds: u64 },
}

impl Mutation {
    pub fn id(&self) -> &CardId {
        match self {
            Mutation::Learned { id, .. }
            | Mutation::Favourite { id, .. }
            | Mutation::Time { id, .. } => id,
        }
    }

    pub fn send(&self, persistence: &dyn Persistence) -> Result<(), DeckError> {
        match self {
            Mutation::Learned { id, value } => persistence.set_learned(id, *value),
            Mutation::Favourite { id, value } => persistence.set_favourite(id, *value),
            Mutation::Time { id, seconds } => persistence.add_time(id, *seconds),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncTask {
    /// `generation` tells overlapping loads apart; only the newest counts.
    Load { generation: u64 },
    Mutate(Mutation),
}

#[derive(Debug)]
pub enum SyncOutcome {
    Loaded {
        generation: u64,
        result: Result<Vec<Card>, DeckError>,
    },
    Mutated {
        mutation: Mutation,
        result: Result<(), DeckError>,
    },
}

impl SyncTask {
    pub fn run(self, persistence: &dyn Persistence) -> SyncOutcome {
        match self {
            SyncTask::Load { generation } => SyncOutcome::Loaded {
                generation,
                result: persistence.fetch_cards(),
            },
            SyncTask::Mutate(mutation) => {
                let result = mutation.send(persistence);
                SyncOutcome::Mutated { mutation, result }
            }
        }
    }
}

/// Runs collaborator calls without blocking the caller.
pub trait Dispatcher {
    fn submit(&self, task: SyncTask);
}

/// Production dispatcher: a single worker thread runs tasks in submission
/// order and posts each outcome back to the event loop over `tx`.
///
/// The worker exits once the dispatcher is dropped and its queue is drained.
pub struct ThreadDispatcher {
    tasks: Sender<SyncTask>,
    in_flight: InFlight,
}

impl ThreadDispatcher {
    pub fn new<E>(persistence: Arc<dyn Persistence>, tx: Sender<E>) -> Self
    where
        E: From<SyncOutcome> + Send + 'static,
    {
        let (tasks, queue) = mpsc::channel::<SyncTask>();
        let in_flight = InFlight::default();
        let worker_in_flight = in_flight.clone();

        thread::spawn(move || {
            for task in queue {
                let outcome = task.run(persistence.as_ref());
                // the loop may already be gone at teardown
                let _ = tx.send(E::from(outcome));
                worker_in_flight.0.fetch_sub(1, Ordering::SeqCst);
            }
        });

        Self { tasks, in_flight }
    }

    /// Handle for observing unfinished tasks after the dispatcher has
    /// been handed to a store.
    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }
}

/// Count of submitted tasks whose call has not finished yet.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Polls until the queue is drained or `timeout` passes. Returns
    /// whether everything finished.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.count() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        true
    }
}

impl Dispatcher for ThreadDispatcher {
    fn submit(&self, task: SyncTask) {
        debug!("dispatching {:?}", task);
        self.in_flight.0.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::SendError(task)) = self.tasks.send(task) {
            self.in_flight.0.fetch_sub(1, Ordering::SeqCst);
            warn!("sync worker is gone, dropping {:?}", task);
        }
    }
}

/// Records submitted tasks without running them. Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct QueueDispatcher {
    tasks: Rc<RefCell<Vec<SyncTask>>>,
}

impl QueueDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<SyncTask> {
        self.tasks.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl Dispatcher for QueueDispatcher {
    fn submit(&self, task: SyncTask) {
        self.tasks.borrow_mut().push(task);
    }
}
