use std::collections::HashMap;

/// Unread messages per sender and their running total.
///
/// `total` always equals the sum of the per-sender counts; senders with
/// nothing unread are not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnreadLedger {
    counts: HashMap<String, u64>,
    total: u64,
}

impl UnreadLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, sender_id: &str) {
        *self.counts.entry(sender_id.to_owned()).or_default() += 1;
        self.total += 1;
    }

    /// Zeroes one sender and returns how many were removed from the total.
    pub fn clear(&mut self, sender_id: &str) -> u64 {
        let removed = self.counts.remove(sender_id).unwrap_or(0);
        self.total -= removed;
        removed
    }

    /// Puts back `count` unread messages, e.g. after the server refused a mark-read.
    pub fn restore(&mut self, sender_id: &str, count: u64) {
        if count == 0 {
            return;
        }
        *self.counts.entry(sender_id.to_owned()).or_default() += count;
        self.total += count;
    }

    /// Replaces the ledger with counts taken from the server.
    pub fn reconcile<I, S>(&mut self, counts: I)
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        self.counts = counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(sender, count)| (sender.into(), count))
            .collect();
        self.total = self.counts.values().sum();
    }

    pub fn count(&self, sender_id: &str) -> u64 {
        self.counts.get(sender_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn counts(&self) -> &HashMap<String, u64> {
        &self.counts
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.counts.values().sum::<u64>() && self.counts.values().all(|count| *count > 0)
    }

    pub fn reset(&mut self) {
        self.counts.clear();
        self.total = 0;
    }
}
