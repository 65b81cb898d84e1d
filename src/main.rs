use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use env_logger::{Env, Target};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use flipdeck::{
    app_dirs::AppDirs,
    card::Filter,
    config::{is_valid_swipe_threshold, Config, ConfigStore, FileConfigStore},
    http::HttpPersistence,
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    session::{AdvanceMode, Session, SessionSettings},
    speech::Speech,
    store::CardStore,
    sync::ThreadDispatcher,
    ui,
};

/// How long pending card updates may take to reach the server after quit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// flashcard study session in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Study a vocabulary deck in the terminal: flip cards, swipe with the mouse, listen to pronunciations and track what you have learned."
)]
pub struct Cli {
    /// base url of the card service
    #[clap(long)]
    api_url: Option<String>,

    /// which cards to study
    #[clap(short = 'f', long, value_enum)]
    filter: Option<Filter>,

    /// locale used for speech, e.g. en-US
    #[clap(short = 'l', long)]
    locale: Option<String>,

    /// mark a card learned when moving past it
    #[clap(long)]
    mark_on_advance: bool,

    /// minimum drag distance (in gesture units, 8 per column) for a swipe
    #[clap(long, value_parser = parse_swipe_threshold)]
    swipe_threshold: Option<f64>,

    /// disable text-to-speech
    #[clap(long)]
    no_speech: bool,

    /// write the log here instead of the state directory
    #[clap(long)]
    log_file: Option<PathBuf>,
}

fn parse_swipe_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if is_valid_swipe_threshold(value) {
        Ok(value)
    } else {
        Err(format!("{s} is not a positive number"))
    }
}

impl Cli {
    /// Command-line values win over the config file.
    fn apply(&self, cfg: &mut Config) {
        if let Some(url) = &self.api_url {
            cfg.api_url = url.clone();
        }
        if let Some(filter) = self.filter {
            cfg.filter = filter;
        }
        if let Some(locale) = &self.locale {
            cfg.locale = locale.clone();
        }
        if self.mark_on_advance {
            cfg.advance_mode = AdvanceMode::MarkLearned;
        }
        if let Some(threshold) = self.swipe_threshold {
            cfg.swipe_threshold = threshold;
        }
        if self.no_speech {
            cfg.speech = false;
        }
    }
}

fn init_logging(path: Option<PathBuf>) {
    let Some(path) = path.or_else(AppDirs::log_path) else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    // stderr belongs to the alternate screen, so without a file there is no log
    if let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) {
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
            .target(Target::Pipe(Box::new(file)))
            .try_init();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    init_logging(cli.log_file.clone());

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    cli.apply(&mut config);

    let persistence = HttpPersistence::new(&config.api_url)?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &config, persistence);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    let (filter, advance_mode) = result?;
    config.filter = filter;
    config.advance_mode = advance_mode;
    if let Err(e) = config_store.save(&config) {
        log::warn!("could not save config to {}: {e}", config_store.path().display());
    }

    Ok(())
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    config: &Config,
    persistence: HttpPersistence,
) -> Result<(Filter, AdvanceMode), Box<dyn Error>> {
    let events = CrosstermEventSource::new();
    let dispatcher = ThreadDispatcher::new(Arc::new(persistence), events.sender());
    let in_flight = dispatcher.in_flight();

    let store = CardStore::with_filter(Box::new(dispatcher), config.filter);
    let speech = if config.speech {
        Speech::detect()
    } else {
        Speech::disabled()
    };

    let mut session = Session::new(store, speech, SessionSettings::from(config));
    session.start();

    let mut runner = Runner::new(events, FixedTicker::default());
    while !session.should_quit() {
        terminal.draw(|f| ui::draw(&mut session, f))?;
        let event = runner.step();
        session.handle_event(event);
    }

    session.teardown();
    if !in_flight.wait_idle(SHUTDOWN_GRACE) {
        log::warn!("{} card updates still pending at exit", in_flight.count());
    }

    Ok((session.store().filter(), session.advance_mode()))
}
