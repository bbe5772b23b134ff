use std::collections::HashMap;

/// In-memory keyed record store shared by the match and player tables. The
/// same handful of operations serves both schemas; property-equality
/// queries are expressed as predicates. Lookups on missing keys return
/// `None` and bulk operations on empty selections are no-ops, never errors:
/// disconnect races make missing records an expected condition.
#[derive(Debug)]
pub struct Store<T> {
    records: HashMap<String, T>,
}

// derive(Default) would demand T: Default; an empty store needs no such
// bound
impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Store<T> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, record: T) {
        self.records.insert(key.into(), record);
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.records.get_mut(key)
    }

    /// Replace the whole record under `key`.
    pub fn overwrite(&mut self, key: impl Into<String>, record: T) {
        self.records.insert(key.into(), record);
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.records.remove(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records matching a predicate, with their keys.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> impl Iterator<Item = (&String, &T)> {
        self.records.iter().filter(move |(_, r)| pred(r))
    }

    /// Keys of all records matching a predicate.
    pub fn keys_where(&self, pred: impl Fn(&T) -> bool) -> Vec<String> {
        self.records
            .iter()
            .filter(|(_, r)| pred(r))
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn count_where(&self, pred: impl Fn(&T) -> bool) -> usize {
        self.records.values().filter(|r| pred(r)).count()
    }

    /// Mutate every record matching a predicate; returns how many matched.
    pub fn update_where(&mut self, pred: impl Fn(&T) -> bool, mut apply: impl FnMut(&mut T)) -> usize {
        let mut updated = 0;
        for record in self.records.values_mut() {
            if pred(record) {
                apply(record);
                updated += 1;
            }
        }
        updated
    }

    /// Delete every record matching a predicate; returns how many matched.
    pub fn remove_where(&mut self, pred: impl Fn(&T) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| !pred(r));
        before - self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Rec {
        group: u32,
        n: u32,
    }

    fn sample() -> Store<Rec> {
        let mut store = Store::new();
        store.insert("a", Rec { group: 1, n: 0 });
        store.insert("b", Rec { group: 1, n: 0 });
        store.insert("c", Rec { group: 2, n: 0 });
        store
    }

    #[test]
    fn missing_key_is_none_not_a_panic() {
        let mut store = sample();
        assert!(store.get("nope").is_none());
        assert!(store.get_mut("nope").is_none());
        assert!(store.remove("nope").is_none());
    }

    #[test]
    fn filter_and_keys_by_predicate() {
        let store = sample();
        assert_eq!(store.filter(|r| r.group == 1).count(), 2);
        let mut keys = store.keys_where(|r| r.group == 1);
        keys.sort();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(store.count_where(|r| r.group == 3), 0);
    }

    #[test]
    fn update_where_touches_only_matches() {
        let mut store = sample();
        assert_eq!(store.update_where(|r| r.group == 1, |r| r.n = 7), 2);
        assert_eq!(store.get("a").unwrap().n, 7);
        assert_eq!(store.get("c").unwrap().n, 0);
    }

    #[test]
    fn remove_where_counts_deletions() {
        let mut store = sample();
        assert_eq!(store.remove_where(|r| r.group == 1), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn overwrite_replaces_record() {
        let mut store = sample();
        store.overwrite("a", Rec { group: 9, n: 9 });
        assert_eq!(store.get("a"), Some(&Rec { group: 9, n: 9 }));
    }

    #[test]
    fn default_needs_no_default_records() {
        // Rec has no Default impl; an empty store must not require one
        let store: Store<Rec> = Store::default();
        assert!(store.is_empty());
    }
}
