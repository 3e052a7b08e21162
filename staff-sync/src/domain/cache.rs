use std::collections::{HashMap, HashSet};

use shared::types::{StaffId, StaffRecord};

/// Client-side mirror of the server's staff listing, plus a filtered view over it.
///
/// The filtered view stores identities only and is resolved against `all` on every read,
/// so it can never contain a record the cache does not hold. Search results are merged
/// into `all` before they become the view.
#[derive(Debug, Default)]
pub struct LocalCache {
    all: Vec<StaffRecord>,
    index: HashMap<StaffId, usize>,
    filtered: Vec<StaffId>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every record and clears any filter. Returns the number of records kept.
    ///
    /// If the listing repeats an id, the first occurrence wins.
    pub fn replace_all(&mut self, records: Vec<StaffRecord>) -> usize {
        let received = records.len();
        let mut seen = HashSet::with_capacity(received);
        self.all = records
            .into_iter()
            .filter(|record| seen.insert(record.id.clone()))
            .collect();

        if self.all.len() != received {
            tracing::warn!(
                received,
                kept = self.all.len(),
                "Dropped duplicate staff ids from listing"
            );
        }

        self.reindex();
        self.clear_filter();
        self.all.len()
    }

    /// Removes the record from both views. Returns `false` if it was not cached.
    pub fn remove(&mut self, id: &StaffId) -> bool {
        let Some(position) = self.index.get(id).copied() else {
            return false;
        };
        self.all.remove(position);
        self.filtered.retain(|filtered_id| filtered_id != id);
        self.reindex();
        true
    }

    pub fn apply_filter<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&StaffRecord) -> bool,
    {
        self.filtered = self
            .all
            .iter()
            .filter(|record| predicate(record))
            .map(|record| record.id.clone())
            .collect();
        self.filtered.len()
    }

    pub fn clear_filter(&mut self) {
        self.apply_filter(|_| true);
    }

    /// Makes the server's `records` the filtered view, keeping their order.
    ///
    /// Each record is merged into the cache first: a cached copy is replaced by the
    /// server's, and an id the cache does not hold yet is appended. A repeated id keeps
    /// its first occurrence.
    pub fn set_filtered(&mut self, records: Vec<StaffRecord>) -> usize {
        let received = records.len();
        let mut seen = HashSet::with_capacity(received);
        let mut view = Vec::with_capacity(received);
        let mut added = 0usize;

        for record in records {
            if !seen.insert(record.id.clone()) {
                continue;
            }
            view.push(record.id.clone());
            match self.index.get(&record.id).copied() {
                Some(position) => self.all[position] = record,
                None => {
                    self.index.insert(record.id.clone(), self.all.len());
                    self.all.push(record);
                    added += 1;
                }
            }
        }

        if view.len() != received {
            tracing::warn!(
                received,
                kept = view.len(),
                "Dropped duplicate staff ids from search result"
            );
        }
        if added > 0 {
            tracing::debug!(added, "Search returned records not yet cached");
        }

        self.filtered = view;
        self.filtered.len()
    }

    pub fn all(&self) -> &[StaffRecord] {
        &self.all
    }

    /// Resolves the filtered view against the current records.
    pub fn filtered(&self) -> Vec<&StaffRecord> {
        self.filtered
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn get(&self, id: &StaffId) -> Option<&StaffRecord> {
        self.index.get(id).map(|&position| &self.all[position])
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    fn reindex(&mut self) {
        self.index = self
            .all
            .iter()
            .enumerate()
            .map(|(position, record)| (record.id.clone(), position))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, firstname: &str) -> StaffRecord {
        serde_json::from_value(serde_json::json!({ "id": id, "firstname": firstname })).unwrap()
    }

    fn filtered_ids(cache: &LocalCache) -> Vec<StaffId> {
        cache.filtered().iter().map(|r| r.id.clone()).collect()
    }

    fn all_ids(cache: &LocalCache) -> Vec<StaffId> {
        cache.all().iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn replace_all_then_clear_filter_mirrors_input() {
        let records = vec![record(1, "Ann"), record(2, "Bo"), record(3, "Cy")];
        let mut cache = LocalCache::new();
        cache.replace_all(records.clone());
        cache.apply_filter(|r| r.firstname == "Bo");
        cache.clear_filter();

        assert_eq!(cache.all(), records.as_slice());
        let filtered: Vec<StaffRecord> = cache.filtered().into_iter().cloned().collect();
        assert_eq!(filtered, records);
    }

    #[test]
    fn replace_all_resets_previous_filter() {
        let mut cache = LocalCache::new();
        cache.replace_all(vec![record(1, "Ann"), record(2, "Bo")]);
        cache.apply_filter(|r| r.firstname == "Ann");
        assert_eq!(cache.filtered().len(), 1);

        cache.replace_all(vec![record(1, "Ann"), record(2, "Bo")]);
        assert_eq!(cache.filtered().len(), 2);
    }

    #[test]
    fn replace_all_keeps_first_duplicate() {
        let mut cache = LocalCache::new();
        let kept =
            cache.replace_all(vec![record(1, "Ann"), record(1, "Impostor"), record(2, "Bo")]);

        assert_eq!(kept, 2);
        assert_eq!(cache.get(&StaffId::from(1)).unwrap().firstname, "Ann");
    }

    #[test]
    fn remove_absent_id_is_a_no_op() {
        let mut cache = LocalCache::new();
        cache.replace_all(vec![record(1, "Ann"), record(2, "Bo")]);
        cache.apply_filter(|r| r.firstname == "Bo");

        assert!(!cache.remove(&StaffId::from(99)));
        assert_eq!(all_ids(&cache), vec![StaffId::from(1), StaffId::from(2)]);
        assert_eq!(filtered_ids(&cache), vec![StaffId::from(2)]);
    }

    #[test]
    fn remove_drops_record_from_both_views() {
        let mut cache = LocalCache::new();
        cache.replace_all(vec![record(1, "Ann"), record(2, "Bo"), record(3, "Cy")]);

        assert!(cache.remove(&StaffId::from(2)));
        assert_eq!(all_ids(&cache), vec![StaffId::from(1), StaffId::from(3)]);
        assert_eq!(filtered_ids(&cache), vec![StaffId::from(1), StaffId::from(3)]);
        assert_eq!(cache.get(&StaffId::from(3)).unwrap().firstname, "Cy");
    }

    #[test]
    fn apply_filter_reads_live_records() {
        let mut cache = LocalCache::new();
        cache.replace_all(vec![record(1, "Ann"), record(2, "Bo")]);
        cache.remove(&StaffId::from(1));
        cache.apply_filter(|_| true);

        assert_eq!(filtered_ids(&cache), vec![StaffId::from(2)]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_filtered_keeps_server_order_and_drops_repeated_ids() {
        let mut cache = LocalCache::new();
        cache.replace_all(vec![record(1, "Ann"), record(2, "Bo"), record(3, "Cy")]);

        let matched = cache.set_filtered(vec![record(3, "Cy"), record(1, "Ann"), record(3, "Cy")]);

        assert_eq!(matched, 2);
        assert_eq!(filtered_ids(&cache), vec![StaffId::from(3), StaffId::from(1)]);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn set_filtered_shows_server_fields_for_cached_ids() {
        let mut cache = LocalCache::new();
        cache.replace_all(vec![record(1, "Ann"), record(2, "Bo")]);

        cache.set_filtered(vec![record(1, "Annabel")]);

        let names: Vec<_> = cache.filtered().iter().map(|r| r.firstname.clone()).collect();
        assert_eq!(names, vec!["Annabel"]);
        assert_eq!(cache.get(&StaffId::from(1)).unwrap().firstname, "Annabel");
        assert_eq!(all_ids(&cache), vec![StaffId::from(1), StaffId::from(2)]);
    }

    #[test]
    fn set_filtered_adds_records_missing_from_cache() {
        let mut cache = LocalCache::new();

        let matched = cache.set_filtered(vec![record(7, "Zed")]);

        assert_eq!(matched, 1);
        assert_eq!(filtered_ids(&cache), vec![StaffId::from(7)]);
        assert_eq!(all_ids(&cache), vec![StaffId::from(7)]);

        assert!(cache.remove(&StaffId::from(7)));
        assert!(cache.filtered().is_empty());
    }
}
