use log::{info, warn};

use crate::error::StorageError;
use crate::quiz::persistence::QuizStore;
use crate::quiz::storage::KeyValueStore;
use crate::quiz::HistoryEntry;

/// Append-only record of finished sessions, oldest first.
#[derive(Debug, Default, Clone)]
pub struct HistoryLedger {
    entries: Vec<HistoryEntry>,
}

impl HistoryLedger {
    /// Reads the stored list; an unreadable list is logged and treated as empty.
    pub fn load<S: KeyValueStore>(store: &QuizStore<S>) -> Self {
        let entries = match store.load_history() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring stored history: {}", e);
                Vec::new()
            }
        };
        Self { entries }
    }

    pub fn record<S: KeyValueStore>(
        &mut self,
        store: &mut QuizStore<S>,
        category: &str,
        score: usize,
    ) -> Result<(), StorageError> {
        self.entries.push(HistoryEntry {
            category: category.to_string(),
            score,
        });
        info!(
            "Recorded {} with score {} ({} in history)",
            category,
            score,
            self.entries.len()
        );
        store.save_history(&self.entries)
    }

    pub fn load_all(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::persistence::KEY_HISTORY;
    use crate::quiz::storage::MemoryStore;

    #[test]
    fn records_in_order_and_persists() {
        let mut store = QuizStore::new(MemoryStore::new());
        let mut ledger = HistoryLedger::load(&store);
        assert!(ledger.is_empty());

        ledger.record(&mut store, "science", 9).unwrap();
        ledger.record(&mut store, "history", 4).unwrap();
        ledger.record(&mut store, "science", 9).unwrap();

        let reloaded = HistoryLedger::load(&store);
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.load_all(), ledger.load_all());
        let first = HistoryEntry {
            category: "science".into(),
            score: 9,
        };
        assert_eq!(reloaded.load_all()[0], first);
        assert_eq!(reloaded.load_all()[1].category, "history");
    }

    #[test]
    fn unreadable_history_starts_empty() {
        let mut inner = MemoryStore::new();
        inner.set(KEY_HISTORY, "not a list".to_string()).unwrap();
        let store = QuizStore::new(inner);
        assert!(HistoryLedger::load(&store).is_empty());
    }
}
