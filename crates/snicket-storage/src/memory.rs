use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use parking_lot::RwLock;
use snicket_core::error::Result;
use snicket_core::{Clock, DomainStat, Record, Store, SystemClock};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Everything the store knows, guarded by one lock.
///
/// `codes` is a reverse index into `urls`; the two maps are only ever
/// touched together under the write lock, so a code either resolves to the
/// record that owns it or to nothing.
#[derive(Default)]
struct State {
    urls: HashMap<String, Record>,
    codes: HashMap<String, String>,
    domain_hits: HashMap<String, u64>,
}

impl State {
    /// Removes the record for `url` along with its reverse index entry.
    ///
    /// The code entry is only dropped while it still points at `url`; an
    /// expired record's code may have been re-issued to another URL since.
    fn remove_record(&mut self, url: &str) {
        if let Some(record) = self.urls.remove(url) {
            if self
                .codes
                .get(&record.code)
                .is_some_and(|owner| owner == url)
            {
                self.codes.remove(&record.code);
            }
        }
    }

    fn live_code(&self, url: &str, now: Timestamp) -> Option<String> {
        self.urls
            .get(url)
            .filter(|record| record.is_live(now))
            .map(|record| record.code.clone())
    }

    fn has_live_record(&self, url: &str, now: Timestamp) -> bool {
        self.urls.get(url).is_some_and(|record| record.is_live(now))
    }
}

/// In-memory implementation of [`Store`].
///
/// A single read-write lock guards the forward map, the reverse code index
/// and the domain counters, so a save lands in all three atomically and
/// concurrent lookups never observe a half-applied one.
pub struct MemoryStore<C: Clock = SystemClock> {
    expiry: SignedDuration,
    state: RwLock<State>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    /// Creates a store whose records expire `expiry` after they were saved.
    pub fn new(expiry: SignedDuration) -> Self {
        Self::with_clock(expiry, SystemClock)
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Creates a store that reads time from the given clock.
    pub fn with_clock(expiry: SignedDuration, clock: C) -> Self {
        Self {
            expiry,
            state: RwLock::new(State::default()),
            clock,
        }
    }
}

#[async_trait]
impl<C: Clock + 'static> Store for MemoryStore<C> {
    async fn code_exists(&self, code: &str) -> Result<bool> {
        if code.is_empty() {
            return Ok(false);
        }
        let now = self.clock.now();
        let state = self.state.read();
        Ok(state
            .codes
            .get(code)
            .and_then(|url| state.urls.get(url))
            .is_some_and(|record| record.code == code && record.is_live(now)))
    }

    async fn get_code(&self, url: &str) -> Result<Option<String>> {
        if url.is_empty() {
            return Ok(None);
        }
        let now = self.clock.now();
        {
            let state = self.state.read();
            match state.urls.get(url) {
                None => return Ok(None),
                Some(record) if record.is_live(now) => return Ok(Some(record.code.clone())),
                Some(_) => {}
            }
        }

        // The record was expired under the read lock. Re-check under the
        // write lock; a concurrent save may have replaced it in between.
        let mut state = self.state.write();
        if let Some(code) = state.live_code(url, now) {
            return Ok(Some(code));
        }
        if state.urls.contains_key(url) {
            trace!(url, "sweeping expired record on lookup");
            state.remove_record(url);
        }
        Ok(None)
    }

    async fn get_url(&self, code: &str) -> Result<Option<String>> {
        if code.is_empty() {
            return Ok(None);
        }
        let now = self.clock.now();
        let state = self.state.read();
        Ok(state
            .codes
            .get(code)
            .and_then(|url| state.urls.get(url))
            .filter(|record| record.code == code && record.is_live(now))
            .map(|record| record.url.clone()))
    }

    async fn save(&self, url: &str, code: &str, domain: &str) -> Result<()> {
        if url.is_empty() || code.is_empty() || domain.is_empty() {
            trace!(url, code, domain, "ignoring save with an empty field");
            return Ok(());
        }
        let now = self.clock.now();
        let mut state = self.state.write();

        if state.has_live_record(url, now) {
            trace!(url, "url already has a live record");
            return Ok(());
        }
        // Drops the expired record, if any, so its code entry cannot go stale.
        state.remove_record(url);

        state.codes.insert(code.to_owned(), url.to_owned());
        state.urls.insert(
            url.to_owned(),
            Record {
                url: url.to_owned(),
                code: code.to_owned(),
                domain: domain.to_owned(),
                created_at: now,
                expires_at: now + self.expiry,
            },
        );
        *state.domain_hits.entry(domain.to_owned()).or_insert(0) += 1;
        debug!(url, code, domain, "stored new shortening");
        Ok(())
    }

    async fn top_domains(&self, n: usize) -> Result<Vec<DomainStat>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut counts: Vec<(String, u64)> = {
            let state = self.state.read();
            state
                .domain_hits
                .iter()
                .map(|(domain, hits)| (domain.clone(), *hits))
                .collect()
        };
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(n);
        Ok(counts
            .into_iter()
            .zip(1u32..)
            .map(|((domain, shortened), rank)| DomainStat {
                rank,
                domain,
                shortened,
            })
            .collect())
    }

    async fn purge(&self) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.write();
        let expired: Vec<String> = state
            .urls
            .values()
            .filter(|record| !record.is_live(now))
            .map(|record| record.url.clone())
            .collect();
        for url in &expired {
            state.remove_record(url);
        }
        if !expired.is_empty() {
            debug!(removed = expired.len(), "purged expired records");
        }
        Ok(())
    }
}
