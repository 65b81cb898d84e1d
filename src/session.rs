//! The interactive study session: input channels, per-card UI state and
//! the elapsed-time counters, layered over a [`CardStore`].

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use serde::{Deserialize, Serialize};

use crate::card::{Card, CardId, Filter};
use crate::config::Config;
use crate::gesture::{Direction, PointerInput, Position, SwipeTracker};
use crate::runtime::SessionEvent;
use crate::speech::Speech;
use crate::store::CardStore;

/// Ticks a flash message stays on screen.
const FLASH_TICKS: u8 = 3;

/// What advancing to the next card does to the card being left.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
pub enum AdvanceMode {
    #[default]
    Browse,
    #[strum(serialize = "Mark learned")]
    MarkLearned,
}

impl AdvanceMode {
    pub fn toggled(self) -> Self {
        match self {
            AdvanceMode::Browse => AdvanceMode::MarkLearned,
            AdvanceMode::MarkLearned => AdvanceMode::Browse,
        }
    }
}

/// Everything keyboard, pointer and buttons can ask the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Next,
    Prev,
    Flip,
    Speak,
    ToggleHint,
    ToggleLearned,
    ToggleFavourite,
    SetFilter(Filter),
    TogglePause,
    ToggleAdvanceMode,
    Reload,
    StartAnswer,
    ToggleHelp,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Filter(Filter),
    Prev,
    Listen,
    Learned,
    Favourite,
    Pause,
    Next,
}

impl Button {
    pub const CONTROLS: [Button; 6] = [
        Button::Prev,
        Button::Listen,
        Button::Learned,
        Button::Favourite,
        Button::Pause,
        Button::Next,
    ];

    pub fn command(&self) -> Command {
        match self {
            Button::Filter(f) => Command::SetFilter(*f),
            Button::Prev => Command::Prev,
            Button::Listen => Command::Speak,
            Button::Learned => Command::ToggleLearned,
            Button::Favourite => Command::ToggleFavourite,
            Button::Pause => Command::TogglePause,
            Button::Next => Command::Next,
        }
    }
}

/// Keyboard shortcut table for the deck view.
pub fn command_for_key(key: &KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Command::Quit),
            _ => None,
        };
    }

    let cmd = match key.code {
        KeyCode::Right | KeyCode::Char('j') => Command::Next,
        KeyCode::Left | KeyCode::Char('k') => Command::Prev,
        KeyCode::Enter | KeyCode::Char(' ') => Command::Flip,
        KeyCode::Char('s') => Command::Speak,
        KeyCode::Char('h') => Command::ToggleHint,
        KeyCode::Char('l') => Command::ToggleLearned,
        KeyCode::Char('f') => Command::ToggleFavourite,
        KeyCode::Char(c @ '1'..='4') => {
            Command::SetFilter(Filter::TABS[c as usize - '1' as usize])
        }
        KeyCode::Char('p') => Command::TogglePause,
        KeyCode::Char('m') => Command::ToggleAdvanceMode,
        KeyCode::Char('r') => Command::Reload,
        KeyCode::Char('t') => Command::StartAnswer,
        KeyCode::Char('?') => Command::ToggleHelp,
        KeyCode::Esc | KeyCode::Char('q') => Command::Quit,
        _ => return None,
    };
    Some(cmd)
}

/// Gesture vocabulary: a tap (no direction) flips like a click does.
pub fn command_for_swipe(direction: Direction) -> Command {
    match direction {
        Direction::Left => Command::Next,
        Direction::Right => Command::Prev,
        Direction::Up | Direction::None => Command::Flip,
        Direction::Down => Command::Speak,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Deck,
    /// A text input owns the keyboard; shortcuts are off.
    Answer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    Info,
    Good,
    Bad,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub text: String,
    pub kind: FlashKind,
    ttl: u8,
}

/// Screen regions recorded at draw time for mouse hit-testing.
#[derive(Debug, Clone, Default)]
pub struct HitAreas {
    pub card: Option<Rect>,
    pub buttons: Vec<(Rect, Button)>,
}

fn contains(area: &Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}

impl HitAreas {
    pub fn button_at(&self, column: u16, row: u16) -> Option<Button> {
        self.buttons
            .iter()
            .find(|(area, _)| contains(area, column, row))
            .map(|(_, b)| *b)
    }

    pub fn on_card(&self, column: u16, row: u16) -> bool {
        self.card
            .as_ref()
            .is_some_and(|area| contains(area, column, row))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub locale: String,
    pub advance_mode: AdvanceMode,
    pub swipe_threshold: f64,
    pub flush_interval_secs: u64,
}

impl From<&Config> for SessionSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            locale: cfg.locale.clone(),
            advance_mode: cfg.advance_mode,
            swipe_threshold: cfg.swipe_threshold,
            flush_interval_secs: cfg.flush_interval_secs,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

pub struct Session {
    store: CardStore,
    speech: Speech,
    swipe: SwipeTracker,
    settings: SessionSettings,
    flipped: bool,
    show_hint: bool,
    show_help: bool,
    paused: bool,
    session_secs: u64,
    visible: Option<CardId>,
    card_secs: u64,
    answer: Option<String>,
    flash: Option<Flash>,
    quit: bool,
    torn_down: bool,
    pub hit_areas: HitAreas,
}

impl Session {
    pub fn new(store: CardStore, speech: Speech, settings: SessionSettings) -> Self {
        let swipe = SwipeTracker::new(settings.swipe_threshold);
        let mut session = Self {
            store,
            speech,
            swipe,
            settings,
            flipped: false,
            show_hint: false,
            show_help: false,
            paused: false,
            session_secs: 0,
            visible: None,
            card_secs: 0,
            answer: None,
            flash: None,
            quit: false,
            torn_down: false,
            hit_areas: HitAreas::default(),
        };
        session.sync_visible();
        session
    }

    /// Kicks off the initial deck load.
    pub fn start(&mut self) {
        self.store.load();
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Key(key) => self.handle_key(key),
            SessionEvent::Mouse(mouse) => self.handle_mouse(mouse),
            SessionEvent::Tick => self.on_tick(),
            // cell coordinates of a half-finished drag no longer line up
            SessionEvent::Resize => self.swipe.cancel(),
            SessionEvent::Sync(outcome) => {
                if let crate::sync::SyncOutcome::Loaded { generation, .. } = &outcome {
                    if self.store.is_current_load(*generation) {
                        // push the time for the card being replaced before
                        // the reload overwrites local state
                        self.flush_card_time();
                    }
                }
                self.store.apply(outcome);
                self.sync_visible();
            }
        }
        self.speech.poll();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.focus() == Focus::Answer {
            self.edit_answer(key);
            return;
        }
        if let Some(cmd) = command_for_key(&key) {
            self.execute(cmd);
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        let (column, row) = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(button) = self.hit_areas.button_at(column, row) {
                    self.execute(button.command());
                } else if self.hit_areas.on_card(column, row) {
                    self.handle_pointer(PointerInput::MouseDown(Position::from_cell(column, row)));
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                self.handle_pointer(PointerInput::MouseDrag(Position::from_cell(column, row)));
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.handle_pointer(PointerInput::MouseUp);
            }
            _ => {}
        }
    }

    /// Entry point for normalized pointer input from any source.
    pub fn handle_pointer(&mut self, input: PointerInput) {
        if let Some(direction) = self.swipe.feed(input) {
            log::debug!("swipe {direction}");
            self.execute(command_for_swipe(direction));
        }
    }

    pub fn execute(&mut self, cmd: Command) {
        match cmd {
            Command::Next => self.advance(),
            Command::Prev => self.store.prev(),
            Command::Flip => {
                if self.current().is_some() {
                    self.flipped = !self.flipped;
                }
            }
            Command::Speak => self.speak_current(),
            Command::ToggleHint => self.show_hint = !self.show_hint,
            Command::ToggleLearned => {
                if let Some((id, learned)) = self.current().map(|c| (c.id().clone(), c.learned)) {
                    self.mark_learned_and_advance(&id, !learned);
                }
            }
            Command::ToggleFavourite => {
                if let Some((id, fav)) = self.current().map(|c| (c.id().clone(), c.is_favourite)) {
                    self.store.mark_favourite(&id, !fav);
                }
            }
            Command::SetFilter(filter) => self.store.set_filter(filter),
            Command::TogglePause => self.paused = !self.paused,
            Command::ToggleAdvanceMode => {
                self.settings.advance_mode = self.settings.advance_mode.toggled();
                self.flash(
                    format!("Advance mode: {}", self.settings.advance_mode),
                    FlashKind::Info,
                );
            }
            Command::Reload => {
                self.flush_card_time();
                self.store.load();
            }
            Command::StartAnswer => {
                if self.current().is_some() {
                    self.answer = Some(String::new());
                }
            }
            Command::ToggleHelp => self.show_help = !self.show_help,
            Command::Quit => self.quit = true,
        }
        self.sync_visible();
    }

    pub fn on_tick(&mut self) {
        if let Some(flash) = self.flash.as_mut() {
            flash.ttl = flash.ttl.saturating_sub(1);
            if flash.ttl == 0 {
                self.flash = None;
            }
        }

        if self.paused {
            return;
        }
        self.session_secs += 1;
        if self.visible.is_some() {
            self.card_secs += 1;
            let every = self.settings.flush_interval_secs;
            if every > 0 && self.card_secs >= every {
                self.flush_card_time();
            }
        }
    }

    /// Flushes accrued card time and silences speech. Safe to call twice.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.flush_card_time();
        self.speech.stop();
    }

    fn advance(&mut self) {
        match self.settings.advance_mode {
            AdvanceMode::Browse => self.store.next(),
            AdvanceMode::MarkLearned => match self.current().map(|c| c.id().clone()) {
                Some(id) => self.mark_learned_and_advance(&id, true),
                None => self.store.next(),
            },
        }
    }

    // When marking drops the card out of the view the store has already
    // moved the cursor home; stepping again would skip a card.
    fn mark_learned_and_advance(&mut self, id: &CardId, value: bool) {
        let before = self.store.view_len();
        self.store.mark_learned(id, value);
        if value && self.store.view_len() == before {
            self.store.next();
        }
    }

    fn speak_current(&mut self) {
        let text = match self.store.current() {
            Some(card) => card.spoken_text(self.flipped).to_string(),
            None => return,
        };
        self.speech.speak(&text, &self.settings.locale);
    }

    fn edit_answer(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.answer = None;
            self.quit = true;
            return;
        }
        let Some(answer) = self.answer.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.answer = None,
            KeyCode::Backspace => {
                answer.pop();
            }
            KeyCode::Char(c) => answer.push(c),
            KeyCode::Enter => {
                if let Some(answer) = self.answer.take() {
                    self.check_answer(&answer);
                }
            }
            _ => {}
        }
    }

    fn check_answer(&mut self, answer: &str) {
        let Some(expected) = self.current().map(|c| c.translation.clone()) else {
            return;
        };
        if normalize(answer) == normalize(&expected) {
            self.flash("Correct!".to_string(), FlashKind::Good);
        } else {
            self.flash(format!("Answer: {expected}"), FlashKind::Bad);
        }
        self.flipped = true;
    }

    fn flash(&mut self, text: String, kind: FlashKind) {
        self.flash = Some(Flash {
            text,
            kind,
            ttl: FLASH_TICKS,
        });
    }

    fn flush_card_time(&mut self) {
        let secs = std::mem::take(&mut self.card_secs);
        if let Some(id) = self.visible.clone() {
            self.store.record_time(&id, secs as i64);
        }
    }

    // Per-card state belongs to the card identity, not the cursor slot.
    fn sync_visible(&mut self) {
        let now = self.store.current().map(|c| c.id().clone());
        if now == self.visible {
            return;
        }
        self.flush_card_time();
        self.visible = now;
        self.flipped = false;
        self.show_hint = false;
        if self.visible.is_none() {
            self.answer = None;
        }
    }

    pub fn store(&self) -> &CardStore {
        &self.store
    }

    pub fn current(&self) -> Option<&Card> {
        self.store.current()
    }

    pub fn speech(&self) -> &Speech {
        &self.speech
    }

    pub fn focus(&self) -> Focus {
        if self.answer.is_some() {
            Focus::Answer
        } else {
            Focus::Deck
        }
    }

    pub fn answer_input(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn hint_visible(&self) -> bool {
        self.show_hint
    }

    pub fn help_visible(&self) -> bool {
        self.show_help
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn session_secs(&self) -> u64 {
        self.session_secs
    }

    pub fn card_secs(&self) -> u64 {
        self.card_secs
    }

    pub fn flash_message(&self) -> Option<&Flash> {
        self.flash.as_ref()
    }

    pub fn advance_mode(&self) -> AdvanceMode {
        self.settings.advance_mode
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `m:ss`, as shown in the status bar.
pub fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
