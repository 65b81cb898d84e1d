use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::card::{Card, Filter};
use crate::session::{format_clock, Button, FlashKind, Focus, HitAreas, Session};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;
const BUTTON_GAP: u16 = 1;

const HELP: &[(&str, &str)] = &[
    ("→ / j", "next card"),
    ("← / k", "previous card"),
    ("Enter / Space", "flip"),
    ("s", "listen"),
    ("h", "hint"),
    ("l", "learned"),
    ("f", "favorite"),
    ("1-4", "filter"),
    ("p", "pause"),
    ("m", "advance mode"),
    ("t", "type the answer"),
    ("r", "reload"),
    ("Esc / q", "quit"),
];

/// The fixed regions of the study screen.
struct Regions {
    tabs: Rect,
    card: Rect,
    controls: Rect,
    status: Rect,
    prompt: Rect,
}

fn regions(area: Rect) -> Regions {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    Regions {
        tabs: chunks[0],
        card: chunks[2],
        controls: chunks[4],
        status: chunks[5],
        prompt: chunks[6],
    }
}

fn button_label(button: Button, session: &Session) -> String {
    let card = session.current();
    match button {
        Button::Filter(f) => format!(" {f} "),
        Button::Prev => "[← Prev]".to_string(),
        Button::Listen => "[♪ Listen]".to_string(),
        Button::Learned => match card {
            Some(c) if c.learned => "[✓ Learned]".to_string(),
            _ => "[  Learned]".to_string(),
        },
        Button::Favourite => match card {
            Some(c) if c.is_favourite => "[★ Favorite]".to_string(),
            _ => "[☆ Favorite]".to_string(),
        },
        Button::Pause if session.is_paused() => "[Resume]".to_string(),
        Button::Pause => "[Pause]".to_string(),
        Button::Next => "[Next →]".to_string(),
    }
}

fn button_enabled(button: Button, session: &Session) -> bool {
    match button {
        Button::Filter(_) | Button::Pause => true,
        Button::Listen => session.speech().is_supported() && session.current().is_some(),
        Button::Prev | Button::Next | Button::Learned | Button::Favourite => {
            session.current().is_some()
        }
    }
}

/// Lays buttons out left to right, centered, dropping those that do not fit.
fn place_row(row: Rect, labels: &[(Button, String)]) -> Vec<(Rect, Button)> {
    let total: u16 = labels
        .iter()
        .map(|(_, l)| l.width() as u16 + BUTTON_GAP)
        .sum::<u16>()
        .saturating_sub(BUTTON_GAP);
    let mut x = row.x + row.width.saturating_sub(total) / 2;
    let right = row.x.saturating_add(row.width);

    let mut placed = Vec::with_capacity(labels.len());
    for (button, label) in labels {
        let w = label.width() as u16;
        if x.saturating_add(w) > right {
            break;
        }
        placed.push((Rect::new(x, row.y, w, 1), *button));
        x = x.saturating_add(w + BUTTON_GAP);
    }
    placed
}

fn tab_row(session: &Session, row: Rect) -> Vec<(Rect, Button)> {
    let labels: Vec<_> = Filter::TABS
        .iter()
        .map(|f| (Button::Filter(*f), button_label(Button::Filter(*f), session)))
        .collect();
    place_row(row, &labels)
}

fn control_row(session: &Session, row: Rect) -> Vec<(Rect, Button)> {
    let labels: Vec<_> = Button::CONTROLS
        .iter()
        .map(|b| (*b, button_label(*b, session)))
        .collect();
    place_row(row, &labels)
}

/// Clickable regions for a frame of the given size.
pub fn hit_areas(area: Rect, session: &Session) -> HitAreas {
    let r = regions(area);
    let buttons = tab_row(session, r.tabs)
        .into_iter()
        .chain(control_row(session, r.controls))
        .filter(|(_, b)| button_enabled(*b, session))
        .collect();

    HitAreas {
        card: session.current().map(|_| r.card),
        buttons,
    }
}

/// Renders a frame and records where its buttons ended up.
pub fn draw(session: &mut Session, f: &mut Frame) {
    let area = f.area();
    f.render_widget(&*session, area);
    session.hit_areas = hit_areas(area, session);
}

fn card_lines<'a>(card: &'a Card, session: &Session) -> Vec<Line<'a>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);
    let italic = Style::default().add_modifier(Modifier::ITALIC);

    let mut lines = vec![Line::from("")];
    if session.is_flipped() {
        lines.push(Line::from(Span::styled(
            card.translation.as_str(),
            bold.fg(Color::Green),
        )));
        if let Some(example) = card.example.as_deref() {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(format!("\"{example}\""), italic)));
        }
        if let Some(tr) = card.example_translation.as_deref() {
            lines.push(Line::from(Span::styled(tr, dim)));
        }
    } else {
        lines.push(Line::from(Span::styled(card.term.as_str(), bold.fg(Color::Cyan))));
        if session.hint_visible() {
            lines.push(Line::from(""));
            let hint = match card.synonym.as_deref() {
                Some(s) => format!("Hint: {s}"),
                None => "No hint for this card".to_string(),
            };
            lines.push(Line::from(Span::styled(hint, italic.fg(Color::Yellow))));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Enter or click to flip", dim)));
    }
    lines
}

fn render_card(session: &Session, area: Rect, buf: &mut Buffer) {
    let store = session.store();
    let Some(card) = store.current() else {
        let message = if store.is_loading() {
            "Loading cards..."
        } else if store.cards().is_empty() {
            "No cards yet. Press r to reload."
        } else {
            "No cards in this view."
        };
        Paragraph::new(Span::styled(
            message,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL))
        .render(area, buf);
        return;
    };

    let mut marks = String::new();
    if card.learned {
        marks.push_str(" ✓ ");
    }
    if card.is_favourite {
        marks.push_str(" ★ ");
    }
    let side = if session.is_flipped() { "back" } else { "front" };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(format!(" {} / {} ", store.cursor() + 1, store.view_len()))
        .title(Line::from(format!(" {side} ")).alignment(Alignment::Center))
        .title(Line::from(marks).alignment(Alignment::Right));

    Paragraph::new(card_lines(card, session))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block)
        .render(area, buf);
}

fn render_buttons(
    session: &Session,
    placed: Vec<(Rect, Button)>,
    active: Option<Filter>,
    buf: &mut Buffer,
) {
    for (rect, button) in placed {
        let mut style = Style::default();
        if !button_enabled(button, session) {
            style = style.add_modifier(Modifier::DIM);
        } else if matches!(button, Button::Filter(f) if Some(f) == active) {
            style = style.fg(Color::Black).bg(Color::Cyan);
        }
        buf.set_string(rect.x, rect.y, button_label(button, session), style);
    }
}

fn status_line(session: &Session) -> Line<'static> {
    let store = session.store();
    let stats = store.stats();
    let dim = Style::default().add_modifier(Modifier::DIM);

    let mut spans = vec![
        Span::raw(format!("session {}", format_clock(session.session_secs()))),
        Span::styled(format!("  card {}", format_clock(session.card_secs())), dim),
        Span::styled(format!("  ✓ {}", stats.learned), Style::default().fg(Color::Green)),
        Span::styled(
            format!("  ✗ {}", stats.not_learned()),
            Style::default().fg(Color::Red),
        ),
        Span::styled(format!("  ★ {}", stats.favourites), Style::default().fg(Color::Yellow)),
        Span::raw(format!("  {}%", stats.learning_rate())),
        Span::styled(format!("  {}", session.advance_mode()), dim),
    ];
    if session.is_paused() {
        spans.push(Span::styled(
            "  PAUSED",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }
    if session.speech().is_speaking() {
        spans.push(Span::styled("  ♪ speaking", Style::default().fg(Color::Magenta)));
    }
    if store.is_loading() {
        spans.push(Span::styled("  loading", dim));
    }
    Line::from(spans)
}

fn prompt_line(session: &Session) -> Line<'_> {
    if session.focus() == Focus::Answer {
        let typed = session.answer_input().unwrap_or_default();
        return Line::from(vec![
            Span::styled("Answer: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(typed),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]);
    }
    match session.flash_message() {
        Some(flash) => {
            let color = match flash.kind {
                FlashKind::Info => Color::Cyan,
                FlashKind::Good => Color::Green,
                FlashKind::Bad => Color::Red,
            };
            Line::from(Span::styled(flash.text.as_str(), Style::default().fg(color)))
        }
        None => Line::from(Span::styled(
            "? for help",
            Style::default().add_modifier(Modifier::DIM),
        )),
    }
}

fn render_help(area: Rect, buf: &mut Buffer) {
    let width = 40.min(area.width);
    let height = (HELP.len() as u16 + 2).min(area.height);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    let lines: Vec<Line> = HELP
        .iter()
        .map(|(keys, what)| {
            Line::from(vec![
                Span::styled(
                    format!("{keys:>14} "),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(*what),
            ])
        })
        .collect();

    Clear.render(popup, buf);
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Keys "))
        .render(popup, buf);
}

impl Widget for &Session {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let r = regions(area);
        let active = Some(self.store().filter());

        render_buttons(self, tab_row(self, r.tabs), active, buf);
        render_card(self, r.card, buf);
        render_buttons(self, control_row(self, r.controls), None, buf);

        Paragraph::new(status_line(self))
            .alignment(Alignment::Center)
            .render(r.status, buf);
        Paragraph::new(prompt_line(self))
            .alignment(Alignment::Center)
            .render(r.prompt, buf);

        if self.help_visible() {
            render_help(r.card, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Command, SessionSettings};
    use crate::speech::Speech;
    use crate::store::CardStore;
    use crate::sync::QueueDispatcher;

    fn create_test_session(cards: Vec<Card>) -> Session {
        let mut store = CardStore::new(Box::new(QueueDispatcher::new()));
        store.replace_cards(cards);
        Session::new(store, Speech::disabled(), SessionSettings::default())
    }

    fn deck() -> Vec<Card> {
        let mut a = Card::new("1", "Serendipity", "Tesadüf");
        a.synonym = Some("Happy accident".into());
        a.example = Some("Pure serendipity.".into());
        vec![a, Card::new("2", "Ephemeral", "Geçici")]
    }

    fn render_to_string(session: &Session, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buffer = Buffer::empty(area);
        session.render(area, &mut buffer);
        buffer
            .content()
            .chunks(width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_front_of_card() {
        let session = create_test_session(deck());
        let rendered = render_to_string(&session, 80, 24);
        assert!(rendered.contains("Serendipity"));
        assert!(rendered.contains("1 / 2"));
        assert!(!rendered.contains("Tesadüf"));
        assert!(rendered.contains("All"));
        assert!(rendered.contains("Next"));
    }

    #[test]
    fn test_back_of_card() {
        let mut session = create_test_session(deck());
        session.execute(Command::Flip);
        let rendered = render_to_string(&session, 80, 24);
        assert!(rendered.contains("Tesadüf"));
        assert!(rendered.contains("Pure serendipity."));
        assert!(rendered.contains(" back "));
    }

    #[test]
    fn test_hint() {
        let mut session = create_test_session(deck());
        session.execute(Command::ToggleHint);
        assert!(render_to_string(&session, 80, 24).contains("Hint: Happy accident"));
    }

    #[test]
    fn test_empty_view_message() {
        let mut session = create_test_session(deck());
        session.execute(Command::SetFilter(Filter::Learned));
        let rendered = render_to_string(&session, 80, 24);
        assert!(rendered.contains("No cards in this view."));
    }

    #[test]
    fn test_loading_message() {
        let mut store = CardStore::new(Box::new(QueueDispatcher::new()));
        store.load();
        let session = Session::new(store, Speech::disabled(), SessionSettings::default());
        let rendered = render_to_string(&session, 80, 24);
        assert!(rendered.contains("Loading cards..."));
        assert!(rendered.contains("loading"));
    }

    #[test]
    fn test_status_line() {
        let mut session = create_test_session(deck());
        for _ in 0..65 {
            session.on_tick();
        }
        session.execute(Command::TogglePause);
        let rendered = render_to_string(&session, 100, 24);
        assert!(rendered.contains("session 1:05"));
        assert!(rendered.contains("PAUSED"));
        assert!(rendered.contains("[Resume]"));
    }

    #[test]
    fn test_answer_prompt() {
        let mut session = create_test_session(deck());
        session.execute(Command::StartAnswer);
        assert!(render_to_string(&session, 80, 24).contains("Answer: _"));
    }

    #[test]
    fn test_help_overlay() {
        let mut session = create_test_session(deck());
        session.execute(Command::ToggleHelp);
        let rendered = render_to_string(&session, 80, 24);
        assert!(rendered.contains("Keys"));
        assert!(rendered.contains("previous card"));
    }

    #[test]
    fn test_hit_areas_cover_controls_and_card() {
        let session = create_test_session(deck());
        let areas = hit_areas(Rect::new(0, 0, 80, 24), &session);

        let card = areas.card.unwrap();
        assert!(card.height >= 3);
        let next = areas
            .buttons
            .iter()
            .find(|(_, b)| *b == Button::Next)
            .map(|(r, _)| *r)
            .unwrap();
        assert_eq!(areas.button_at(next.x, next.y), Some(Button::Next));
        assert!(areas
            .buttons
            .iter()
            .any(|(_, b)| *b == Button::Filter(Filter::Favorite)));
    }

    #[test]
    fn test_listen_not_clickable_without_speech() {
        let session = create_test_session(deck());
        let areas = hit_areas(Rect::new(0, 0, 80, 24), &session);
        assert!(areas.buttons.iter().all(|(_, b)| *b != Button::Listen));
        assert!(render_to_string(&session, 80, 24).contains("Listen"));
    }

    #[test]
    fn test_no_card_area_without_cards() {
        let session = create_test_session(Vec::new());
        let areas = hit_areas(Rect::new(0, 0, 80, 24), &session);
        assert!(areas.card.is_none());
        assert!(areas
            .buttons
            .iter()
            .all(|(_, b)| matches!(b, Button::Filter(_) | Button::Pause)));
    }

    #[test]
    fn test_buttons_do_not_overflow() {
        let session = create_test_session(deck());
        let area = Rect::new(0, 0, 30, 24);
        let areas = hit_areas(area, &session);
        for (rect, _) in &areas.buttons {
            assert!(rect.x + rect.width <= area.width);
        }
    }

    #[test]
    fn test_extreme_sizes() {
        let mut session = create_test_session(deck());
        session.execute(Command::ToggleHelp);
        for (w, h) in [(1, 1), (10, 5), (20, 3), (200, 60)] {
            let _ = render_to_string(&session, w, h);
        }
    }
}
