use log::{debug, error, info, warn};

use crate::card::{Card, CardId, DeckStats, Filter};
use crate::sync::{Dispatcher, Mutation, SyncOutcome, SyncTask};

/// Owns the canonical card list, the active filter, the derived view and
/// the cursor into it.
pub struct CardStore {
    cards: Vec<Card>,
    filter: Filter,
    // indices into `cards`, in load order
    view: Vec<usize>,
    cursor: usize,
    loading: bool,
    // generation of the most recently requested load
    load_generation: u64,
    dispatcher: Box<dyn Dispatcher>,
}

impl CardStore {
    pub fn new(dispatcher: Box<dyn Dispatcher>) -> Self {
        Self::with_filter(dispatcher, Filter::All)
    }

    pub fn with_filter(dispatcher: Box<dyn Dispatcher>, filter: Filter) -> Self {
        Self {
            cards: Vec::new(),
            filter,
            view: Vec::new(),
            cursor: 0,
            loading: false,
            load_generation: 0,
            dispatcher,
        }
    }

    /// Asks the collaborator for the full deck. The result lands through
    /// [`CardStore::apply`]; answers to earlier loads are dropped.
    pub fn load(&mut self) {
        self.loading = true;
        self.load_generation += 1;
        self.dispatcher.submit(SyncTask::Load {
            generation: self.load_generation,
        });
    }

    /// Whether a load answer with `generation` would still be applied.
    pub fn is_current_load(&self, generation: u64) -> bool {
        generation >= self.load_generation
    }

    /// Applies a finished collaborator call on the event thread.
    pub fn apply(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Loaded { generation, .. } if !self.is_current_load(generation) => {
                debug!(
                    "dropping stale load {generation}, waiting for {}",
                    self.load_generation
                );
            }
            SyncOutcome::Loaded {
                result: Ok(cards), ..
            } => {
                info!("loaded {} cards", cards.len());
                self.replace_cards(cards);
            }
            SyncOutcome::Loaded { result: Err(e), .. } => {
                error!("failed to load cards: {e}");
                self.replace_cards(Vec::new());
            }
            SyncOutcome::Mutated {
                mutation,
                result: Ok(()),
            } => {
                debug!("synced {:?}", mutation);
            }
            SyncOutcome::Mutated {
                mutation,
                result: Err(e),
            } => {
                // local state stays optimistic until the next load
                warn!("ignoring failed sync of {:?}: {e}", mutation);
            }
        }
    }

    pub fn replace_cards(&mut self, cards: Vec<Card>) {
        self.loading = false;
        self.cards = cards;
        self.rebuild_view();
        self.cursor = 0;
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.rebuild_view();
        self.cursor = 0;
    }

    pub fn next(&mut self) {
        let len = self.view.len();
        if len == 0 {
            return;
        }
        self.cursor = (self.cursor + 1) % len;
    }

    pub fn prev(&mut self) {
        let len = self.view.len();
        if len == 0 {
            return;
        }
        self.cursor = (self.cursor + len - 1) % len;
    }

    pub fn mark_learned(&mut self, id: &CardId, value: bool) {
        let Some(card) = self.card_mut(id) else {
            debug!("mark_learned: unknown card {id}");
            return;
        };
        card.learned = value;
        self.refresh_view();
        self.dispatcher.submit(SyncTask::Mutate(Mutation::Learned {
            id: id.clone(),
            value,
        }));
    }

    pub fn mark_favourite(&mut self, id: &CardId, value: bool) {
        let Some(card) = self.card_mut(id) else {
            debug!("mark_favourite: unknown card {id}");
            return;
        };
        card.is_favourite = value;
        self.refresh_view();
        self.dispatcher.submit(SyncTask::Mutate(Mutation::Favourite {
            id: id.clone(),
            value,
        }));
    }

    pub fn record_time(&mut self, id: &CardId, seconds: i64) {
        if seconds <= 0 {
            return;
        }
        let seconds = seconds as u64;
        let Some(card) = self.card_mut(id) else {
            debug!("record_time: unknown card {id}");
            return;
        };
        card.time_spent = card.time_spent.saturating_add(seconds);
        self.dispatcher.submit(SyncTask::Mutate(Mutation::Time {
            id: id.clone(),
            seconds,
        }));
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, id: &CardId) -> Option<&Card> {
        self.cards.iter().find(|c| c.id() == id)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn view(&self) -> Vec<&Card> {
        self.view.iter().map(|&i| &self.cards[i]).collect()
    }

    pub fn view_len(&self) -> usize {
        self.view.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Card> {
        self.view.get(self.cursor).map(|&i| &self.cards[i])
    }

    pub fn stats(&self) -> DeckStats {
        DeckStats::from_cards(&self.cards)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn card_mut(&mut self, id: &CardId) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id() == id)
    }

    fn rebuild_view(&mut self) {
        let filter = self.filter;
        self.view = self
            .cards
            .iter()
            .enumerate()
            .filter(|(_, c)| filter.matches(c))
            .map(|(i, _)| i)
            .collect();
    }

    // Mutations can move a card in or out of the view; a length change
    // sends the cursor home so it never points past the end.
    fn refresh_view(&mut self) {
        let before = self.view.len();
        self.rebuild_view();
        if self.view.len() != before {
            self.cursor = 0;
        }
    }
}
