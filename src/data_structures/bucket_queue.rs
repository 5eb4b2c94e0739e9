use std::fmt::Debug;

use crate::data_structures::open_list::BucketRank;
use crate::data_structures::open_list::OpenList;
use crate::data_structures::open_list::QueuePos;
use crate::data_structures::open_list::QueueSlots;
use crate::data_structures::pool::NodeHandle;

#[derive(Debug)]
struct Bucket<R> {
    /// Entries across all the sub-buckets.
    len: usize,
    subs: Vec<Vec<(NodeHandle, R)>>,
}

impl<R> Default for Bucket<R> {
    fn default() -> Self {
        Self { len: 0, subs: vec![] }
    }
}

/// A two-level bucketed priority queue for small integer ranks.
///
/// Entries are bucketed by `primary()` and then by `secondary()`, and popped
/// last-in first-out within a sub-bucket. Pushing and popping are amortised
/// constant time, but memory grows with the largest key seen, so this only
/// suits Ranks that stay small.
#[derive(Debug)]
pub struct BucketQueue<R> {
    buckets: Vec<Bucket<R>>,
    len: usize,
    /// No entry has a lower primary key.
    min_primary: usize,
    /// No entry in the `min_primary` bucket has a lower secondary key.
    min_sub: usize,
}

impl<R: BucketRank> BucketQueue<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: vec![],
            len: 0,
            min_primary: 0,
            min_sub: 0,
        }
    }

    /// Distinct primary keys the queue has room for.
    pub fn buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Moves the cursors to the minimal non-empty sub-bucket.
    fn settle(&mut self) {
        if self.len == 0 {
            self.min_primary = 0;
            self.min_sub = 0;
            return;
        }
        while self.buckets[self.min_primary].len == 0 {
            self.min_primary += 1;
            self.min_sub = 0;
        }
        let subs = &self.buckets[self.min_primary].subs;
        while subs[self.min_sub].is_empty() {
            self.min_sub += 1;
        }
    }

    fn insert<S: QueueSlots>(&mut self, slots: &mut S, node: NodeHandle, rank: R) {
        let (p, s) = (rank.primary(), rank.secondary());
        if self.buckets.len() <= p {
            self.buckets.resize_with(p + 1, Bucket::default);
        }
        let bucket = &mut self.buckets[p];
        if bucket.subs.len() <= s {
            bucket.subs.resize_with(s + 1, Vec::new);
        }
        let sub = &mut bucket.subs[s];
        slots.set_queue_pos(
            node,
            Some(QueuePos {
                bucket: p as u32,
                sub: s as u32,
                index: sub.len() as u32,
            }),
        );
        sub.push((node, rank));
        bucket.len += 1;

        if self.len == 0 || (p, s) < (self.min_primary, self.min_sub) {
            self.min_primary = p;
            self.min_sub = s;
        }
        self.len += 1;
    }

    /// Takes `node` out, leaving the cursors possibly pointing at empty buckets.
    fn remove<S: QueueSlots>(&mut self, slots: &mut S, node: NodeHandle) -> R {
        let pos = match slots.queue_pos(node) {
            Some(pos) => pos,
            None => panic!("Removing {node:?}, which is not queued"),
        };
        let bucket = &mut self.buckets[pos.bucket as usize];
        let sub = &mut bucket.subs[pos.sub as usize];
        let (removed, rank) = sub.swap_remove(pos.index());
        debug_assert_eq!(removed, node, "Node is out of sync.");
        if let Some((moved, _)) = sub.get(pos.index()) {
            slots.set_queue_pos(*moved, Some(pos));
        }
        bucket.len -= 1;
        self.len -= 1;
        slots.set_queue_pos(node, None);
        rank
    }
}

impl<R: BucketRank> Default for BucketQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BucketRank> OpenList<R> for BucketQueue<R> {
    const KIND: &'static str = "bucket queue";

    #[inline(always)]
    fn len(&self) -> usize {
        self.len
    }

    fn push<S: QueueSlots>(&mut self, slots: &mut S, node: NodeHandle, rank: R) {
        debug_assert!(slots.queue_pos(node).is_none(), "{node:?} is already queued");
        self.insert(slots, node, rank);
    }

    fn pop<S: QueueSlots>(&mut self, slots: &mut S) -> Option<(NodeHandle, R)> {
        if self.len == 0 {
            return None;
        }
        self.settle();
        let bucket = &mut self.buckets[self.min_primary];
        let (node, rank) = bucket.subs[self.min_sub].pop()?;
        bucket.len -= 1;
        self.len -= 1;
        slots.set_queue_pos(node, None);
        Some((node, rank))
    }

    fn front(&self) -> Option<(NodeHandle, R)> {
        if self.len == 0 {
            return None;
        }
        // The cursors are only a lower bound until the next pop settles them.
        self.buckets[self.min_primary..]
            .iter()
            .enumerate()
            .find(|(_, b)| b.len > 0)
            .and_then(|(i, b)| {
                let skip = if i == 0 { self.min_sub } else { 0 };
                b.subs[skip..].iter().find_map(|s| s.last().copied())
            })
    }

    fn update<S: QueueSlots>(&mut self, slots: &mut S, node: NodeHandle, rank: R) {
        self.remove(slots, node);
        self.insert(slots, node, rank);
    }

    fn drain<S: QueueSlots>(&mut self, slots: &mut S) -> Vec<NodeHandle> {
        let mut nodes = Vec::with_capacity(self.len);
        for bucket in &mut self.buckets {
            for sub in &mut bucket.subs {
                for (node, _) in sub.drain(..) {
                    slots.set_queue_pos(node, None);
                    nodes.push(node);
                }
            }
            bucket.len = 0;
        }
        self.len = 0;
        self.settle();
        nodes
    }

    fn append<S: QueueSlots>(&mut self, slots: &mut S, entries: Vec<(NodeHandle, R)>) {
        for (node, rank) in entries {
            self.push(slots, node, rank);
        }
    }

    fn nodes(&self) -> impl Iterator<Item = (NodeHandle, R)> + '_ {
        self.buckets
            .iter()
            .flat_map(|b| b.subs.iter())
            .flat_map(|s| s.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::data_structures::open_list::testing;

    /// `(f, h)` pairs.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct Pair(u8, u8);

    impl BucketRank for Pair {
        fn primary(&self) -> usize {
            self.0 as usize
        }
        fn secondary(&self) -> usize {
            self.1 as usize
        }
    }

    #[test]
    fn pops_by_primary_then_secondary() {
        let (mut pool, nodes) = testing::nodes(4);
        let mut open = BucketQueue::new();
        open.push(&mut pool, nodes[0], Pair(3, 0));
        open.push(&mut pool, nodes[1], Pair(2, 5));
        open.push(&mut pool, nodes[2], Pair(2, 1));
        open.push(&mut pool, nodes[3], Pair(2, 1));

        assert_eq!(open.front().map(|(_, r)| r), Some(Pair(2, 1)));
        // LIFO among equals
        assert_eq!(open.pop(&mut pool), Some((nodes[3], Pair(2, 1))));
        assert_eq!(open.pop(&mut pool), Some((nodes[2], Pair(2, 1))));
        assert_eq!(open.pop(&mut pool), Some((nodes[1], Pair(2, 5))));
        assert_eq!(open.pop(&mut pool), Some((nodes[0], Pair(3, 0))));
        assert_eq!(open.pop(&mut pool), None);
        assert_eq!(open.buckets(), 4);
    }

    #[test]
    fn update_relocates() {
        let (mut pool, nodes) = testing::nodes(3);
        let mut open = BucketQueue::new();
        for n in &nodes {
            open.push(&mut pool, *n, Pair(5, 5));
        }
        open.update(&mut pool, nodes[0], Pair(1, 0));
        // nodes[2] was swapped into the hole nodes[0] left
        assert_eq!(pool[nodes[2]].pos.map(|p| p.index), Some(0));
        assert_eq!(open.pop(&mut pool), Some((nodes[0], Pair(1, 0))));
        open.push_update(&mut pool, nodes[2], Pair(9, 0));
        assert_eq!(open.pop(&mut pool), Some((nodes[1], Pair(5, 5))));
        assert_eq!(open.pop(&mut pool), Some((nodes[2], Pair(9, 0))));
        assert!(open.is_empty());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Push(u8, u8),
        Pop,
        Update(usize, u8, u8),
        Drain,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0..32u8, 0..8u8).prop_map(|(f, h)| Op::Push(f, h)),
            3 => Just(Op::Pop),
            2 => (any::<usize>(), 0..32u8, 0..8u8).prop_map(|(i, f, h)| Op::Update(i, f, h)),
            1 => Just(Op::Drain),
        ]
    }

    proptest! {
        #[test]
        fn pops_minimum_like_a_sorted_model(ops in prop::collection::vec(op(), 0..200)) {
            let (mut pool, nodes) = testing::nodes(ops.len());
            let mut open = BucketQueue::new();
            let mut model: Vec<(NodeHandle, Pair)> = vec![];
            let mut fresh = nodes.into_iter();

            for op in ops {
                match op {
                    Op::Push(f, h) => {
                        let n = fresh.next().unwrap();
                        open.push(&mut pool, n, Pair(f, h));
                        model.push((n, Pair(f, h)));
                    }
                    Op::Pop => {
                        let min = model.iter().map(|(_, r)| *r).min();
                        prop_assert_eq!(open.front().map(|(_, r)| r), min);
                        let popped = open.pop(&mut pool);
                        prop_assert_eq!(popped.map(|(_, r)| r), min);
                        if let Some((n, _)) = popped {
                            model.retain(|(m, _)| *m != n);
                        }
                    }
                    Op::Update(i, f, h) => {
                        if model.is_empty() {
                            continue;
                        }
                        let i = i % model.len();
                        model[i].1 = Pair(f, h);
                        open.update(&mut pool, model[i].0, Pair(f, h));
                    }
                    Op::Drain => {
                        let mut drained = open.drain(&mut pool);
                        let mut expected: Vec<_> = model.drain(..).map(|(n, _)| n).collect();
                        drained.sort_by_key(|n| n.index());
                        expected.sort_by_key(|n| n.index());
                        prop_assert_eq!(drained, expected);
                    }
                }
                prop_assert_eq!(open.len(), model.len());
                prop_assert_eq!(open.nodes().count(), model.len());
            }
        }
    }
}
