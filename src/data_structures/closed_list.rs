use std::fmt::Debug;

use smallvec::SmallVec;

use crate::data_structures::pool::NodeHandle;

/// Buckets a new table starts with.
pub const INITIAL_BUCKETS: usize = 64;
/// How much the bucket array grows when the table gets too full.
pub const GROWTH_FACTOR: usize = 2;

#[derive(Clone, Debug)]
struct Entry<K> {
    hash: u64,
    key: K,
    node: NodeHandle,
}

type Chain<K> = SmallVec<[Entry<K>; 2]>;

/// A chained hash table from packed states to nodes.
///
/// Hashes are computed by the caller (usually through `Domain::hash`) and
/// kept next to the keys, so growing never needs to rehash.
///
/// At most one node is resident per key. Callers must `find` before they
/// `add`.
///
/// ```
/// use hsearch::data_structures::closed_list::ClosedList;
/// use hsearch::data_structures::pool::NodePool;
///
/// let mut pool = NodePool::new();
/// let node = pool.construct(()).unwrap();
///
/// let mut closed = ClosedList::new();
/// assert_eq!(closed.find(42, &"state"), None);
/// closed.add(42, "state", node);
/// assert_eq!(closed.find(42, &"state"), Some(node));
/// assert_eq!(closed.remove(42, &"state"), Some(node));
/// assert!(closed.is_empty());
/// ```
#[derive(Debug)]
pub struct ClosedList<K> {
    buckets: Vec<Chain<K>>,
    len: usize,
}

impl<K> ClosedList<K>
where
    K: Debug + Eq,
{
    #[must_use]
    pub fn new() -> Self {
        Self::with_buckets(INITIAL_BUCKETS)
    }

    /// A table with at least `n` buckets.
    #[must_use]
    pub fn with_buckets(n: usize) -> Self {
        let n = n.max(1).next_power_of_two();
        let mut buckets = Vec::with_capacity(n);
        buckets.resize_with(n, SmallVec::new);
        Self { buckets, len: 0 }
    }

    #[inline(always)]
    fn bucket(&self, hash: u64) -> usize {
        (((hash >> 32) ^ hash) as usize) & (self.buckets.len() - 1)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn find(&self, hash: u64, key: &K) -> Option<NodeHandle> {
        self.buckets[self.bucket(hash)]
            .iter()
            .find(|e| e.hash == hash && e.key == *key)
            .map(|e| e.node)
    }

    pub fn add(&mut self, hash: u64, key: K, node: NodeHandle) {
        debug_assert!(
            self.find(hash, &key).is_none(),
            "{key:?} is already resident"
        );
        if (self.len + 1) * 4 > self.buckets.len() * 3 {
            self.grow();
        }
        let b = self.bucket(hash);
        self.buckets[b].push(Entry { hash, key, node });
        self.len += 1;
    }

    pub fn remove(&mut self, hash: u64, key: &K) -> Option<NodeHandle> {
        let b = self.bucket(hash);
        let chain = &mut self.buckets[b];
        let i = chain.iter().position(|e| e.hash == hash && e.key == *key)?;
        self.len -= 1;
        Some(chain.swap_remove(i).node)
    }

    /// Forgets every entry, keeping the buckets around for reuse.
    pub fn clear(&mut self) {
        for chain in &mut self.buckets {
            chain.clear();
        }
        self.len = 0;
    }

    /// Resident `(key, node)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, NodeHandle)> + '_ {
        self.buckets
            .iter()
            .flat_map(|chain| chain.iter().map(|e| (&e.key, e.node)))
    }

    fn grow(&mut self) {
        let n = self.buckets.len() * GROWTH_FACTOR;
        log::trace!("Growing closed list to {n} buckets");
        let mut buckets = Vec::with_capacity(n);
        buckets.resize_with(n, SmallVec::new);
        let old = std::mem::replace(&mut self.buckets, buckets);
        for e in old.into_iter().flatten() {
            let b = self.bucket(e.hash);
            self.buckets[b].push(e);
        }
    }

    pub fn memory_usage(&self) -> usize {
        self.buckets.capacity() * std::mem::size_of::<Chain<K>>()
            + self
                .buckets
                .iter()
                .filter(|c| c.spilled())
                .map(|c| c.capacity() * std::mem::size_of::<Entry<K>>())
                .sum::<usize>()
    }
}

impl<K> Default for ClosedList<K>
where
    K: Debug + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::data_structures::pool::NodePool;

    #[test]
    fn grows_past_load_factor() {
        let mut pool = NodePool::new();
        let mut closed = ClosedList::with_buckets(4);
        let handles: Vec<_> = (0..100u64)
            .map(|k| {
                let n = pool.construct(k).unwrap();
                closed.add(k, k, n);
                n
            })
            .collect();

        assert_eq!(closed.len(), 100);
        assert!(closed.len() * 4 <= closed.buckets() * 3);
        for k in 0..100u64 {
            assert_eq!(closed.find(k, &k), Some(handles[k as usize]));
        }
        assert_eq!(closed.iter().count(), 100);
    }

    #[test]
    fn colliding_hashes_chain() {
        let mut pool = NodePool::new();
        let a = pool.construct(()).unwrap();
        let b = pool.construct(()).unwrap();
        let mut closed = ClosedList::new();
        closed.add(7, "a", a);
        closed.add(7, "b", b);
        assert_eq!(closed.find(7, &"a"), Some(a));
        assert_eq!(closed.find(7, &"b"), Some(b));
        assert_eq!(closed.remove(7, &"a"), Some(a));
        assert_eq!(closed.find(7, &"a"), None);
        assert_eq!(closed.find(7, &"b"), Some(b));
    }

    #[test]
    fn clear_keeps_buckets() {
        let mut pool = NodePool::new();
        let mut closed = ClosedList::with_buckets(2);
        for k in 0..10u32 {
            let n = pool.construct(()).unwrap();
            closed.add(k as u64, k, n);
        }
        let buckets = closed.buckets();
        closed.clear();
        assert!(closed.is_empty());
        assert_eq!(closed.buckets(), buckets);
        assert_eq!(closed.find(3, &3), None);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Add(u8),
        Remove(u8),
    }

    proptest! {
        #[test]
        fn at_most_one_node_per_key(
            ops in prop::collection::vec(
                prop_oneof![any::<u8>().prop_map(Op::Add), any::<u8>().prop_map(Op::Remove)],
                0..300,
            )
        ) {
            let mut pool = NodePool::new();
            let mut closed = ClosedList::with_buckets(1);
            let mut model = HashMap::new();
            // Poor hash to force collisions
            let hash = |k: u8| (k % 5) as u64;

            for op in ops {
                match op {
                    Op::Add(k) => {
                        if closed.find(hash(k), &k).is_none() {
                            let n = pool.construct(k).unwrap();
                            closed.add(hash(k), k, n);
                            model.insert(k, n);
                        }
                        prop_assert_eq!(closed.find(hash(k), &k), model.get(&k).copied());
                    }
                    Op::Remove(k) => {
                        prop_assert_eq!(closed.remove(hash(k), &k), model.remove(&k));
                        prop_assert_eq!(closed.find(hash(k), &k), None);
                    }
                }
                prop_assert_eq!(closed.len(), model.len());
                let mut keys: Vec<u8> = closed.iter().map(|(k, _)| *k).collect();
                let total = keys.len();
                keys.sort();
                keys.dedup();
                prop_assert_eq!(keys.len(), total);
            }
        }
    }
}
