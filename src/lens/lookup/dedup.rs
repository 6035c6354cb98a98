//! Result deduplication
//!
//! A [`DedupSet`] is scoped to one dispatch (one domain's fan-out); it is
//! created when the first response arrives and dropped once the merged list
//! is produced.

use super::types::{dedup_key, DedupKey, ResultRecord};
use std::collections::HashSet;
use tracing::debug;

/// Check a candidate against the keys seen so far
pub fn is_duplicate(candidate: &ResultRecord, seen: &HashSet<DedupKey>) -> bool {
    seen.contains(&dedup_key(candidate))
}

/// Accumulates records, silently dropping duplicates
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<DedupKey>,
    records: Vec<ResultRecord>,
    dropped: usize,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; returns false when it was a duplicate and got dropped
    pub fn insert(&mut self, record: ResultRecord) -> bool {
        if is_duplicate(&record, &self.seen) {
            debug!(
                "dropping duplicate record AS{} ({})",
                record.asn_number, record.organization_name
            );
            self.dropped += 1;
            return false;
        }
        self.seen.insert(record.dedup_key());
        self.records.push(record);
        true
    }

    pub fn extend<I: IntoIterator<Item = ResultRecord>>(&mut self, records: I) {
        for record in records {
            self.insert(record);
        }
    }

    /// Number of duplicates dropped so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(asn: u32, org: &str, first: &str, last: &str) -> ResultRecord {
        ResultRecord::new(first.parse().unwrap(), last.parse().unwrap(), asn, "US", org)
    }

    #[test]
    fn test_is_duplicate() {
        let mut seen = HashSet::new();
        let a = record(15169, "GOOGLE", "8.8.8.0", "8.8.8.255");
        seen.insert(a.dedup_key());

        assert!(is_duplicate(&record(15169, "google", "8.8.4.0", "8.8.4.255"), &seen));
        assert!(!is_duplicate(&record(15169, "GOOGLE-CLOUD", "8.8.4.0", "8.8.4.255"), &seen));
        assert!(!is_duplicate(&record(36040, "GOOGLE", "8.8.4.0", "8.8.4.255"), &seen));
    }

    #[test]
    fn test_dedup_set() {
        let mut set = DedupSet::new();
        assert!(set.insert(record(15169, "GOOGLE", "8.8.8.0", "8.8.8.255")));
        assert!(!set.insert(record(15169, "Google", "142.250.0.0", "142.251.255.255")));
        assert!(set.insert(record(15169, "GOOGLE-CLOUD", "34.0.0.0", "34.0.255.255")));

        assert_eq!(set.len(), 2);
        assert_eq!(set.dropped(), 1);

        // first occurrence wins
        let records = set.into_records();
        assert_eq!(records[0].first_address, Some("8.8.8.0".parse().unwrap()));
    }

    #[test]
    fn test_dedup_order_independent_keys() {
        let a = record(1, "A", "1.0.0.0", "1.0.0.255");
        let b = record(2, "B", "2.0.0.0", "2.0.0.255");
        let a2 = record(1, "a", "3.0.0.0", "3.0.0.255");

        let mut forward = DedupSet::new();
        forward.extend(vec![a.clone(), b.clone(), a2.clone()]);
        let mut backward = DedupSet::new();
        backward.extend(vec![a2, b, a]);

        let mut k1: Vec<DedupKey> = forward.into_records().iter().map(dedup_key).collect();
        let mut k2: Vec<DedupKey> = backward.into_records().iter().map(dedup_key).collect();
        k1.sort();
        k2.sort();
        assert_eq!(k1, k2);
    }
}
