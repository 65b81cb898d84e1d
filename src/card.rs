use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Server-assigned card identity. The collaborator hands out integers but
/// the client treats ids as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for CardId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for CardId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => CardId::from(n),
            RawId::Text(s) => CardId::from(s),
        })
    }
}

/// Scheduling placeholder, carried through but never consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    id: CardId,
    pub term: String,
    pub translation: String,
    #[serde(default)]
    pub synonym: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub example_translation: Option<String>,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub learned: bool,
    #[serde(default, deserialize_with = "bool_or_int")]
    pub is_favourite: bool,
    #[serde(default)]
    pub time_spent: u64,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default = "default_ease_factor")]
    pub ease_factor: f64,
    #[serde(default = "default_interval")]
    pub interval: u32,
}

fn default_category() -> String {
    "word".to_string()
}

fn default_ease_factor() -> f64 {
    2.5
}

fn default_interval() -> u32 {
    1
}

// SQL bit columns come back as 0/1 from some backends.
fn bool_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
        Flag::Null(()) => false,
    })
}

impl Card {
    pub fn new(id: impl Into<CardId>, term: &str, translation: &str) -> Self {
        Self {
            id: id.into(),
            term: term.to_string(),
            translation: translation.to_string(),
            synonym: None,
            example: None,
            example_translation: None,
            learned: false,
            is_favourite: false,
            time_spent: 0,
            category: default_category(),
            tags: Vec::new(),
            difficulty: Difficulty::default(),
            review_count: 0,
            ease_factor: default_ease_factor(),
            interval: default_interval(),
        }
    }

    pub fn id(&self) -> &CardId {
        &self.id
    }

    /// Text spoken for this card: the example when the back is showing and
    /// there is one, the term otherwise.
    pub fn spoken_text(&self, flipped: bool) -> &str {
        match (&self.example, flipped) {
            (Some(example), true) if !example.trim().is_empty() => example,
            _ => &self.term,
        }
    }
}

/// Which subset of the deck is being studied
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
pub enum Filter {
    #[default]
    #[strum(serialize = "All")]
    All,
    #[strum(serialize = "Learned")]
    Learned,
    #[strum(serialize = "New")]
    ToLearn,
    #[strum(serialize = "Favorites")]
    Favorite,
}

impl Filter {
    /// Order of the filter tabs in the UI and of the `1`..`4` shortcuts.
    pub const TABS: [Filter; 4] = [
        Filter::All,
        Filter::ToLearn,
        Filter::Learned,
        Filter::Favorite,
    ];

    pub fn matches(&self, card: &Card) -> bool {
        match self {
            Filter::All => true,
            Filter::Learned => card.learned,
            Filter::ToLearn => !card.learned,
            Filter::Favorite => card.is_favourite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeckStats {
    pub total: usize,
    pub learned: usize,
    pub favourites: usize,
}

impl DeckStats {
    pub fn from_cards(cards: &[Card]) -> Self {
        cards.iter().fold(Self::default(), |mut acc, c| {
            acc.total += 1;
            if c.learned {
                acc.learned += 1;
            }
            if c.is_favourite {
                acc.favourites += 1;
            }
            acc
        })
    }

    pub fn not_learned(&self) -> usize {
        self.total - self.learned
    }

    pub fn learning_rate(&self) -> u32 {
        ((self.learned as f64 / self.total.max(1) as f64) * 100.0).round() as u32
    }
}
