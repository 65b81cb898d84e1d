//! Displacement-based swipe recognition.
//!
//! Touch contacts and mouse drags are both normalized to [`Position`] before
//! they reach the [`GestureRecognizer`], which only ever sees a start point
//! and a latest point.

/// Default minimum travel, in units, for a gesture to count as a swipe.
pub const DEFAULT_SWIPE_THRESHOLD: f64 = 50.0;

/// Nominal size of one terminal cell in gesture units.
pub const CELL_WIDTH_UNITS: f64 = 8.0;
pub const CELL_HEIGHT_UNITS: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Maps a terminal cell to gesture units so thresholds stay comparable
    /// with pixel-based pointers.
    pub fn from_cell(column: u16, row: u16) -> Self {
        Self {
            x: column as f64 * CELL_WIDTH_UNITS,
            y: row as f64 * CELL_HEIGHT_UNITS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
    None,
}

#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    threshold: f64,
    start: Option<Position>,
    latest: Option<Position>,
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(DEFAULT_SWIPE_THRESHOLD)
    }
}

impl GestureRecognizer {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            start: None,
            latest: None,
        }
    }

    pub fn in_progress(&self) -> bool {
        self.start.is_some()
    }

    /// Starts a gesture, dropping any stale one that never ended.
    pub fn begin(&mut self, position: Position) {
        self.start = Some(position);
        self.latest = None;
    }

    pub fn update(&mut self, position: Position) {
        if self.start.is_some() {
            self.latest = Some(position);
        }
    }

    /// Classifies the finished gesture and resets the recognizer.
    pub fn end(&mut self) -> Direction {
        let (start, latest) = match (self.start.take(), self.latest.take()) {
            (Some(s), Some(l)) => (s, l),
            _ => return Direction::None,
        };

        let dx = start.x - latest.x;
        let dy = start.y - latest.y;

        if dx.abs() > dy.abs() {
            if dx > self.threshold {
                Direction::Left
            } else if dx < -self.threshold {
                Direction::Right
            } else {
                Direction::None
            }
        } else if dy > self.threshold {
            Direction::Up
        } else if dy < -self.threshold {
            Direction::Down
        } else {
            Direction::None
        }
    }

    pub fn cancel(&mut self) {
        self.start = None;
        self.latest = None;
    }
}

/// Raw pointer input from either source, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerInput {
    TouchStart(Vec<Position>),
    TouchMove(Vec<Position>),
    TouchEnd,
    MouseDown(Position),
    MouseDrag(Position),
    MouseUp,
}

/// Feeds both pointer sources into one recognizer.
#[derive(Debug, Clone, Default)]
pub struct SwipeTracker {
    recognizer: GestureRecognizer,
    dragging: bool,
}

impl SwipeTracker {
    pub fn new(threshold: f64) -> Self {
        Self {
            recognizer: GestureRecognizer::new(threshold),
            dragging: false,
        }
    }

    /// Abandons any gesture in flight.
    pub fn cancel(&mut self) {
        self.dragging = false;
        self.recognizer.cancel();
    }

    /// Returns a direction once per completed gesture, `None` while a
    /// gesture is still in flight or the input does not belong to one.
    pub fn feed(&mut self, input: PointerInput) -> Option<Direction> {
        match input {
            PointerInput::TouchStart(points) => {
                if let Some(p) = points.first() {
                    self.dragging = false;
                    self.recognizer.begin(*p);
                }
                None
            }
            PointerInput::TouchMove(points) => {
                if let Some(p) = points.first() {
                    self.recognizer.update(*p);
                }
                None
            }
            PointerInput::TouchEnd => {
                if self.recognizer.in_progress() {
                    Some(self.recognizer.end())
                } else {
                    None
                }
            }
            PointerInput::MouseDown(p) => {
                self.dragging = true;
                self.recognizer.begin(p);
                None
            }
            PointerInput::MouseDrag(p) => {
                if self.dragging {
                    self.recognizer.update(p);
                }
                None
            }
            PointerInput::MouseUp => {
                if !self.dragging {
                    return None;
                }
                self.dragging = false;
                Some(self.recognizer.end())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swipe(from: (f64, f64), to: (f64, f64)) -> Direction {
        let mut g = GestureRecognizer::default();
        g.begin(Position::new(from.0, from.1));
        g.update(Position::new(to.0, to.1));
        g.end()
    }

    #[test]
    fn right_to_left_movement_is_left() {
        assert_eq!(swipe((0.0, 0.0), (-80.0, 5.0)), Direction::Left);
    }

    #[test]
    fn below_threshold_is_none() {
        assert_eq!(swipe((0.0, 0.0), (30.0, 5.0)), Direction::None);
    }

    #[test]
    fn left_to_right_movement_is_right() {
        assert_eq!(swipe((10.0, 10.0), (90.0, 0.0)), Direction::Right);
    }

    #[test]
    fn vertical_swipes() {
        assert_eq!(swipe((0.0, 100.0), (5.0, 20.0)), Direction::Up);
        assert_eq!(swipe((0.0, 0.0), (-5.0, 60.0)), Direction::Down);
        assert_eq!(swipe((0.0, 0.0), (0.0, 40.0)), Direction::None);
    }

    #[test]
    fn exactly_threshold_is_none() {
        assert_eq!(swipe((0.0, 0.0), (-50.0, 0.0)), Direction::None);
    }

    #[test]
    fn diagonal_tie_is_treated_as_vertical() {
        assert_eq!(swipe((0.0, 0.0), (-70.0, -70.0)), Direction::Up);
    }

    #[test]
    fn end_without_update_is_none() {
        let mut g = GestureRecognizer::default();
        g.begin(Position::new(0.0, 0.0));
        assert_eq!(g.end(), Direction::None);
        assert!(!g.in_progress());
    }

    #[test]
    fn end_without_begin_is_none() {
        let mut g = GestureRecognizer::default();
        g.update(Position::new(-200.0, 0.0));
        assert_eq!(g.end(), Direction::None);
    }

    #[test]
    fn new_begin_discards_stale_gesture() {
        let mut g = GestureRecognizer::default();
        g.begin(Position::new(0.0, 0.0));
        g.update(Position::new(-300.0, 0.0));
        g.begin(Position::new(500.0, 500.0));
        g.update(Position::new(510.0, 505.0));
        assert_eq!(g.end(), Direction::None);
    }

    #[test]
    fn custom_threshold() {
        let mut g = GestureRecognizer::new(10.0);
        g.begin(Position::new(0.0, 0.0));
        g.update(Position::new(-30.0, 5.0));
        assert_eq!(g.end(), Direction::Left);
    }

    #[test]
    fn cell_positions_scale_to_units() {
        let p = Position::from_cell(10, 3);
        assert_eq!(p, Position::new(80.0, 48.0));
    }

    #[test]
    fn touch_and_mouse_converge() {
        let mut touch = SwipeTracker::default();
        assert_eq!(
            touch.feed(PointerInput::TouchStart(vec![Position::new(100.0, 0.0)])),
            None
        );
        touch.feed(PointerInput::TouchMove(vec![
            Position::new(10.0, 0.0),
            Position::new(400.0, 400.0),
        ]));
        let by_touch = touch.feed(PointerInput::TouchEnd);

        let mut mouse = SwipeTracker::default();
        mouse.feed(PointerInput::MouseDown(Position::new(100.0, 0.0)));
        mouse.feed(PointerInput::MouseDrag(Position::new(10.0, 0.0)));
        let by_mouse = mouse.feed(PointerInput::MouseUp);

        assert_eq!(by_touch, Some(Direction::Left));
        assert_eq!(by_touch, by_mouse);
    }

    #[test]
    fn mouse_drag_without_press_is_ignored() {
        let mut t = SwipeTracker::default();
        assert_eq!(t.feed(PointerInput::MouseDrag(Position::new(0.0, 0.0))), None);
        assert_eq!(t.feed(PointerInput::MouseUp), None);
    }

    #[test]
    fn empty_touch_lists_are_ignored() {
        let mut t = SwipeTracker::default();
        t.feed(PointerInput::TouchStart(vec![]));
        assert_eq!(t.feed(PointerInput::TouchEnd), None);
    }

    #[test]
    fn each_gesture_completes_once() {
        let mut t = SwipeTracker::default();
        t.feed(PointerInput::MouseDown(Position::new(0.0, 0.0)));
        t.feed(PointerInput::MouseDrag(Position::new(90.0, 0.0)));
        assert_eq!(t.feed(PointerInput::MouseUp), Some(Direction::Right));
        assert_eq!(t.feed(PointerInput::MouseUp), None);
    }

    #[test]
    fn cancelled_gesture_yields_nothing() {
        let mut t = SwipeTracker::default();
        t.feed(PointerInput::MouseDown(Position::new(0.0, 0.0)));
        t.feed(PointerInput::MouseDrag(Position::new(200.0, 0.0)));
        t.cancel();
        assert_eq!(t.feed(PointerInput::MouseUp), None);
    }
}
