//! Named event counters

use std::collections::BTreeMap;

/// Monotonic and gauge-style counters keyed by static names.
///
/// Keys are `&'static str` so recording an event never allocates.
#[derive(Debug, Default)]
pub struct Counter {
    values: BTreeMap<&'static str, u64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, name: &'static str, value: u64) {
        *self.values.entry(name).or_insert(0) += value;
    }

    /// Saturates at zero.
    pub fn decrement(&mut self, name: &'static str, value: u64) {
        let slot = self.values.entry(name).or_insert(0);
        *slot = slot.saturating_sub(value);
    }

    pub fn set(&mut self, name: &'static str, value: u64) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> u64 {
        self.values.get(name).copied().unwrap_or(0)
    }

    /// Counters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.values.iter().map(|(name, value)| (*name, *value))
    }
}
