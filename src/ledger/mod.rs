pub mod csv;
pub mod store;

use crate::identity::Normalizer;
use log::{debug, info};
use std::collections::HashSet;
use std::sync::Mutex;

pub use store::{LedgerWriter, LEDGER_HEADER, LEDGER_SCHEMA_VERSION};

pub struct DedupLedger {
    normalizer: Normalizer,
    identity_column: usize,
    // Only mutated through `check_and_insert` and `seed_rows`.
    seen: Mutex<HashSet<String>>,
}

impl DedupLedger {
    pub fn new(normalizer: Normalizer, identity_column: usize) -> Self {
        DedupLedger {
            normalizer,
            identity_column,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Adds the identities found in a full ledger dump (header included).
    /// Returns how many new identities were added. Malformed rows and
    /// empty fields are skipped.
    pub fn seed(&self, ledger_text: &str) -> usize {
        let rows = csv::parse_rows(ledger_text);
        self.seed_rows(rows.iter().skip(1))
    }

    /// Same as [`seed`](Self::seed) but over already-split rows without a
    /// header.
    pub fn seed_rows<'a, I>(&self, rows: I) -> usize
    where
        I: IntoIterator<Item = &'a Vec<String>>,
    {
        let mut seen = self.lock();
        let mut added = 0;
        for row in rows {
            let Some(raw) = row.get(self.identity_column) else {
                debug!("Seed row without identity column skipped: {:?}", row);
                continue;
            };
            let key = self.normalizer.normalize(raw);
            if key.is_empty() {
                continue;
            }
            if seen.insert(key) {
                added += 1;
            }
        }
        info!("Dedup ledger seeded with {} identities ({} total).", added, seen.len());
        added
    }

    /// Cheap probe before any navigation. Never mutates.
    pub fn exists(&self, raw_name: &str) -> bool {
        let key = self.normalizer.normalize(raw_name);
        !key.is_empty() && self.lock().contains(&key)
    }

    /// Authoritative guard before a persist: `true` means duplicate (no-op),
    /// `false` means the identity was new and is now recorded.
    /// An empty identity is never inserted and never a duplicate.
    pub fn check_and_insert(&self, raw_name: &str) -> bool {
        let key = self.normalizer.normalize(raw_name);
        if key.is_empty() {
            return false;
        }
        !self.lock().insert(key)
    }

    pub fn normalize(&self, raw_name: &str) -> String {
        self.normalizer.normalize(raw_name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A poisoned set is still a valid set: entries are only ever added.
        self.seen.lock().unwrap_or_else(|p| p.into_inner())
    }
}
