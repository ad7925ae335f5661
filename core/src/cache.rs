//! Memoized views keyed by the full filter tuple.
//!
//! RULES:
//!   - A hit returns exactly what a cold build would have produced.
//!   - Invalidation is all or nothing. Any change to records or config
//!     clears every entry.

use crate::{
    clock::PayrollWindow,
    engine::{AccessScope, FleetView, ViewFilter},
    types::ContractFilter,
};
use std::collections::hash_map::{Entry, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    pub window:    PayrollWindow,
    pub team:      Option<String>,
    pub contract:  ContractFilter,
    pub company:   Option<String>,
    pub franchise: Option<String>,
    pub access:    AccessScope,
}

impl AggregateKey {
    pub fn new(window: PayrollWindow, filter: &ViewFilter) -> Self {
        Self {
            window,
            team:      filter.team.clone(),
            contract:  filter.contract,
            company:   filter.company.clone(),
            franchise: filter.franchise.clone(),
            access:    filter.access.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct AggregateCache {
    entries: HashMap<AggregateKey, FleetView>,
    hits:    u64,
    misses:  u64,
}

impl AggregateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached view for `key`, building it on a miss.
    pub fn get_or_build(
        &mut self,
        key: AggregateKey,
        build: impl FnOnce(&AggregateKey) -> FleetView,
    ) -> &FleetView {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                log::debug!("cache hit for window {}", entry.key().window.start);
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                self.misses += 1;
                log::debug!("cache miss for window {}", entry.key().window.start);
                let view = build(entry.key());
                entry.insert(view)
            }
        }
    }

    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("invalidating {} cached views", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
