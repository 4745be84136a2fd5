use std::collections::HashMap;
use std::hash::Hash;

/// Assigns stable small integer ids to dynamically-appearing remote objects.
///
/// The editor protocol requires numeric, stable handles; the runtime names
/// its actors with opaque strings. Ids are assigned monotonically starting
/// at 1 and never reused while the registry is alive. Each session owns
/// exactly one registry; entries go away only when the session does.
pub struct IdRegistry<K> {
    next: u32,
    ids: HashMap<K, u32>,
}

impl<K: Eq + Hash> IdRegistry<K> {
    pub fn new() -> Self {
        Self {
            next: 1,
            ids: HashMap::new(),
        }
    }

    /// Assign a fresh id. Each object must be registered exactly once;
    /// callers check [`IdRegistry::id_of`] first if re-delivery is possible.
    pub fn register(&mut self, key: K) -> u32 {
        let id = self.next;
        self.next += 1;
        let previous = self.ids.insert(key, id);
        debug_assert!(previous.is_none(), "object registered twice");
        id
    }

    pub fn id_of(&self, key: &K) -> Option<u32> {
        self.ids.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<K: Eq + Hash> Default for IdRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}
