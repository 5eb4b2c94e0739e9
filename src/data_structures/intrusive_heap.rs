use std::cmp::min;
use std::fmt::Debug;

use crate::data_structures::open_list::OpenList;
use crate::data_structures::open_list::QueuePos;
use crate::data_structures::open_list::QueueSlots;
use crate::data_structures::open_list::Rank;
use crate::data_structures::pool::NodeHandle;
use crate::derank::derank;
use crate::heap_primitives::index_first_children;
use crate::heap_primitives::index_last_children;
use crate::heap_primitives::index_parent;

/// An entry of the heap.
///
/// Only the rank takes part in comparisons.
#[derive(Copy, Clone, Debug)]
struct HeapEntry<R> {
    rank: R,
    node: NodeHandle,
}

impl<R: Rank> PartialEq for HeapEntry<R> {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.rank.eq(&other.rank)
    }
}
impl<R: Rank> Eq for HeapEntry<R> {}

impl<R: Rank> PartialOrd for HeapEntry<R> {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<R: Rank> Ord for HeapEntry<R> {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank.cmp(&other.rank)
    }
}

/// "Intrusive" Heap
///
/// NOTE: Intrusive data structures deal with mostly-opaque elements that carry
/// some data relevant to the data structure.
///
/// A d-ary Heap that embeds the vector index into the nodes so nodes can be
/// found in constant time. The nodes live elsewhere (a `NodePool`), so
/// reordering the heap goes through [`QueueSlots`] to let every moved node
/// know its new index.
///
/// ```
/// use hsearch::data_structures::intrusive_heap::IntrusiveHeap;
/// use hsearch::data_structures::open_list::{OpenList, QueuePos, Queued};
/// use hsearch::data_structures::pool::NodePool;
///
/// #[derive(Debug, Default)]
/// struct Node(Option<QueuePos>);
/// impl Queued for Node {
///     fn queue_pos(&self) -> Option<QueuePos> { self.0 }
///     fn set_queue_pos(&mut self, pos: Option<QueuePos>) { self.0 = pos }
/// }
///
/// let mut pool = NodePool::new();
/// let a = pool.construct(Node::default()).unwrap();
/// let b = pool.construct(Node::default()).unwrap();
///
/// let mut open = IntrusiveHeap::<u32>::new();
/// open.push(&mut pool, a, 5);
/// open.push(&mut pool, b, 3);
/// // Found a better path to `a`
/// open.update(&mut pool, a, 1);
/// assert_eq!(open.pop(&mut pool), Some((a, 1)));
/// assert_eq!(open.pop(&mut pool), Some((b, 3)));
/// assert!(pool[a].0.is_none());
/// ```
#[derive(Debug)]
pub struct IntrusiveHeap<R, const ARITY: usize = 2> {
    heap: Vec<HeapEntry<R>>,
}

#[inline(always)]
#[must_use]
fn up<const A: usize>(i: usize) -> usize {
    index_parent::<A>(i)
}
#[inline(always)]
#[must_use]
fn down_left<const A: usize>(i: usize) -> usize {
    index_first_children::<A>(i)
}
#[inline(always)]
#[must_use]
fn down_right<const A: usize>(i: usize) -> usize {
    index_last_children::<A>(i)
}

impl<R, const ARITY: usize> IntrusiveHeap<R, ARITY>
where
    R: Rank,
{
    /// A node needs room for at least two children.
    const SUPPORTED_ARITY: () = assert!(ARITY >= 2, "Heap arity must be at least 2");

    #[must_use]
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SUPPORTED_ARITY;
        Self { heap: vec![] }
    }

    #[inline(always)]
    #[cfg(not(feature = "verify"))]
    pub(crate) fn verify_heap<S: QueueSlots>(&self, _slots: &S) {
        // All good... (hopefully)
    }

    #[inline(always)]
    #[cfg(feature = "verify")]
    pub(crate) fn verify_heap<S: QueueSlots>(&self, slots: &S) {
        // Every node,
        for (i, e) in self.heap.iter().enumerate() {
            // - Has the right intrusive index set.
            assert_eq!(slots.queue_pos(e.node), Some(QueuePos::heap(i)));

            // - Goes after its parent node, if any.
            if i == 0 {
                continue;
            }
            let p = up::<ARITY>(i);
            assert!(
                self.heap[p] <= self.heap[i],
                "Node[{p}]={:?} !<= child [{i}]={:?}. Out of heap of len={}",
                self.heap[p],
                self.heap[i],
                self.heap.len(),
            );
        }
    }

    // Implementation details

    /// Pops the top node from a Heap with at least 2 elements.
    ///
    /// Works by unfairly sifting down the top-node to the last level, where it can
    /// be swapped with the very last element of the array and popped
    /// Temporarily breaks invariants around the node sifting down unfairly.
    fn _unsafe_pop_non_trivial_heap<S: QueueSlots>(&mut self, slots: &mut S) -> HeapEntry<R> {
        #[cfg(feature = "coz_profile")]
        coz::scope!("PopNonTrivial");

        debug_assert!(self.heap.len() >= 2, "It doesn't get easier.");

        // There's at least 2 nodes before we remove the best.
        // 1. We pretend there's a hole at the root, and bubble elements up till the hole reaches the bottom.
        // 2. If the hole is not the last element, we swap it for the last one.
        // 3. Now the last element is the one that was at the top of the heap, we pop it.
        let len = self.heap.len();
        let last = len - 1;

        let mut hole = 0;
        loop {
            // Find the best child
            let mut child = down_left::<ARITY>(hole);
            debug_assert_eq!(child + ARITY, down_right::<ARITY>(hole) + 1);
            child += derank(&self.heap[child..min(child + ARITY, len)]);

            debug_assert!(self.heap[hole] <= self.heap[child]);
            self._unsafe_half_swap_down(slots, hole, child);

            hole = child;
            if down_left::<ARITY>(hole) >= len {
                break;
            }
        }
        // NOTE: So far the hole made it to the last level, but it may not be at the end of the array.
        debug_assert!(hole <= last, "The hole={hole} is past last={last}");
        if hole != last {
            self._unsafe_half_swap_down(slots, hole, last);
            self._unsafe_sift_up(slots, hole);
        }

        match self.heap.pop() {
            Some(top) => top,
            None => unreachable!("The heap had at least 2 elements"),
        }
    }

    /// Raises a node
    /// Returns it's new index
    #[inline(always)]
    fn _unsafe_sift_up<S: QueueSlots>(&mut self, slots: &mut S, index: usize) -> usize {
        debug_assert!(
            index < self.heap.len(),
            "Node is way out of sync. Index out of bounds..."
        );

        let mut pos = index;
        while pos > 0 {
            let parent = up::<ARITY>(pos);
            if self.heap[parent] <= self.heap[pos] {
                break;
            }
            self._unsafe_swap(slots, parent, pos);
            pos = parent;
        }
        pos
    }

    /// Lowers a node
    /// Returns it's new index
    #[inline(always)]
    fn _unsafe_sift_down<S: QueueSlots>(&mut self, slots: &mut S, mut index: usize) -> usize {
        let len = self.heap.len();
        debug_assert!(
            index < len,
            "Node is way out of sync. Index out of bounds..."
        );

        loop {
            // Find the best child
            let mut child = down_left::<ARITY>(index);
            if child >= len {
                break;
            }
            child += derank(&self.heap[child..min(child + ARITY, len)]);

            if self.heap[index] <= self.heap[child] {
                break;
            }

            self._unsafe_swap(slots, index, child);
            index = child;
        }
        index
    }

    // Swapping primitives
    /// Swaps two elements in the heap.
    ///
    /// For consistency in calling code `l < r` is checked.
    ///
    /// Keeps the intrusive indices in sync.
    #[inline(always)]
    fn _unsafe_swap<S: QueueSlots>(&mut self, slots: &mut S, l: usize, r: usize) {
        debug_assert!(l < r, "Swap({l}, {r}) uses wrong argument order");

        self.heap.swap(l, r);
        slots.set_queue_pos(self.heap[l].node, Some(QueuePos::heap(l)));
        slots.set_queue_pos(self.heap[r].node, Some(QueuePos::heap(r)));
        debug_assert!(
            self.heap[l] <= self.heap[r],
            "Swaps must locally restore the heap invariant."
        );
    }

    /// Swaps two elements in the heap.
    ///
    /// For consistency in calling code `l < r` is checked.
    ///
    /// Only keeps the index of the element going up in sync as we should shortly
    /// after remove the element that goes down.
    #[inline(always)]
    fn _unsafe_half_swap_down<S: QueueSlots>(&mut self, slots: &mut S, l: usize, r: usize) {
        debug_assert!(l < r, "HalfSwapDown({l}, {r}) is wrong");

        self.heap.swap(l, r);
        slots.set_queue_pos(self.heap[l].node, Some(QueuePos::heap(l)));
        debug_assert!(
            self.heap[l] >= self.heap[r],
            "Half-assed swap down must be unfairly pushing a node down."
        );
    }

    /// Restores the heap property over the whole array (Floyd's heapify).
    fn heapify<S: QueueSlots>(&mut self, slots: &mut S) {
        for (i, e) in self.heap.iter().enumerate() {
            slots.set_queue_pos(e.node, Some(QueuePos::heap(i)));
        }
        if self.heap.len() < 2 {
            return;
        }
        for i in (0..=up::<ARITY>(self.heap.len() - 1)).rev() {
            self._unsafe_sift_down(slots, i);
        }
    }
}

impl<R, const ARITY: usize> Default for IntrusiveHeap<R, ARITY>
where
    R: Rank,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R, const ARITY: usize> OpenList<R> for IntrusiveHeap<R, ARITY>
where
    R: Rank,
{
    const KIND: &'static str = "intrusive heap";

    #[inline(always)]
    fn len(&self) -> usize {
        self.heap.len()
    }

    fn push<S: QueueSlots>(&mut self, slots: &mut S, node: NodeHandle, rank: R) {
        self.verify_heap(slots);
        debug_assert!(slots.queue_pos(node).is_none(), "{node:?} is already queued");

        let heap_index = self.heap.len(); // Future heap_index
        self.heap.push(HeapEntry { rank, node });
        slots.set_queue_pos(node, Some(QueuePos::heap(heap_index)));
        self._unsafe_sift_up(slots, heap_index);

        self.verify_heap(slots);
    }

    fn pop<S: QueueSlots>(&mut self, slots: &mut S) -> Option<(NodeHandle, R)> {
        #[cfg(feature = "coz_profile")]
        coz::scope!("Pop");

        self.verify_heap(slots);
        let top = if self.heap.len() <= 1 {
            self.heap.pop()?
        } else {
            self._unsafe_pop_non_trivial_heap(slots)
        };
        slots.set_queue_pos(top.node, None);
        self.verify_heap(slots);

        Some((top.node, top.rank))
    }

    #[inline(always)]
    fn front(&self) -> Option<(NodeHandle, R)> {
        self.heap.first().map(|e| (e.node, e.rank))
    }

    fn update<S: QueueSlots>(&mut self, slots: &mut S, node: NodeHandle, rank: R) {
        let index = match slots.queue_pos(node) {
            Some(pos) => pos.index(),
            None => panic!("Updating {node:?}, which is not queued"),
        };
        debug_assert_eq!(self.heap[index].node, node, "Node is out of sync.");

        self.heap[index].rank = rank;
        if self._unsafe_sift_up(slots, index) == index {
            self._unsafe_sift_down(slots, index);
        }
        self.verify_heap(slots);
    }

    fn drain<S: QueueSlots>(&mut self, slots: &mut S) -> Vec<NodeHandle> {
        self.heap
            .drain(..)
            .map(|e| {
                slots.set_queue_pos(e.node, None);
                e.node
            })
            .collect()
    }

    fn append<S: QueueSlots>(&mut self, slots: &mut S, entries: Vec<(NodeHandle, R)>) {
        self.heap.reserve(entries.len());
        for (node, rank) in entries {
            debug_assert!(slots.queue_pos(node).is_none(), "{node:?} is already queued");
            self.heap.push(HeapEntry { rank, node });
        }
        self.heapify(slots);
        self.verify_heap(slots);
    }

    fn nodes(&self) -> impl Iterator<Item = (NodeHandle, R)> + '_ {
        self.heap.iter().map(|e| (e.node, e.rank))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::data_structures::open_list::testing;

    #[test]
    fn heap_works() {
        let (mut pool, nodes) = testing::nodes(1);
        let mut heap = IntrusiveHeap::<u32>::new();

        heap.push(&mut pool, nodes[0], 7);
        assert_eq!(heap.front(), Some((nodes[0], 7)));
        assert_eq!(heap.pop(&mut pool), Some((nodes[0], 7)));
        assert_eq!(heap.pop(&mut pool), None);
        assert!(pool[nodes[0]].pos.is_none());
    }

    #[test]
    fn heap_sorts() {
        let (mut pool, nodes) = testing::nodes(6);
        let mut heap = IntrusiveHeap::<char>::new();

        for (n, c) in nodes.iter().zip("cefadb".chars()) {
            heap.push(&mut pool, *n, c);
        }
        // "a" bubbled up to the root
        assert_eq!(pool[nodes[3]].pos, Some(QueuePos::heap(0)));

        let popped: String = std::iter::from_fn(|| heap.pop(&mut pool).map(|(_, c)| c)).collect();
        assert_eq!(popped, "abcdef");
    }

    #[test]
    fn update_moves_both_ways() {
        let (mut pool, nodes) = testing::nodes(4);
        let mut heap = IntrusiveHeap::<u32, 4>::new();
        for (i, n) in nodes.iter().enumerate() {
            heap.push(&mut pool, *n, 10 * (i as u32 + 1));
        }

        heap.update(&mut pool, nodes[3], 1);
        assert_eq!(heap.front(), Some((nodes[3], 1)));
        heap.update(&mut pool, nodes[3], 100);
        heap.push_update(&mut pool, nodes[1], 5);
        assert_eq!(heap.pop(&mut pool), Some((nodes[1], 5)));
        assert_eq!(heap.pop(&mut pool), Some((nodes[0], 10)));
        assert_eq!(heap.pop(&mut pool), Some((nodes[2], 30)));
        assert_eq!(heap.pop(&mut pool), Some((nodes[3], 100)));
    }

    #[test]
    fn reinit_rebuilds() {
        let (mut pool, nodes) = testing::nodes(5);
        let mut heap = IntrusiveHeap::<u32>::new();
        heap.push(&mut pool, nodes[0], 3);
        heap.push(&mut pool, nodes[1], 1);

        let drained = heap.drain(&mut pool);
        assert_eq!(drained.len(), 2);
        assert!(heap.is_empty());
        assert!(drained.iter().all(|n| pool[*n].pos.is_none()));

        let entries = nodes.iter().zip([9, 4, 7, 1, 8]).map(|(n, r)| (*n, r)).collect();
        heap.reinit(&mut pool, entries);
        assert_eq!(heap.len(), 5);
        for (n, _) in heap.nodes() {
            assert!(pool[n].pos.is_some());
        }
        let popped: Vec<u32> = std::iter::from_fn(|| heap.pop(&mut pool).map(|(_, r)| r)).collect();
        assert_eq!(popped, vec![1, 4, 7, 8, 9]);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Push(u16),
        Pop,
        Update(usize, u16),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<u16>().prop_map(Op::Push),
            Just(Op::Pop),
            (any::<usize>(), any::<u16>()).prop_map(|(i, r)| Op::Update(i, r)),
        ]
    }

    fn check_ordering<const A: usize>(ops: Vec<Op>) {
        let (mut pool, nodes) = testing::nodes(ops.len());
        let mut heap = IntrusiveHeap::<u16, A>::new();
        // The model: ranks of queued nodes
        let mut queued: Vec<(NodeHandle, u16)> = vec![];
        let mut fresh = nodes.into_iter();

        for op in ops {
            match op {
                Op::Push(r) => {
                    let n = fresh.next().unwrap();
                    heap.push(&mut pool, n, r);
                    queued.push((n, r));
                }
                Op::Pop => {
                    let min = queued.iter().map(|(_, r)| *r).min();
                    let popped = heap.pop(&mut pool);
                    assert_eq!(popped.map(|(_, r)| r), min);
                    if let Some((n, _)) = popped {
                        queued.retain(|(m, _)| *m != n);
                        assert!(pool[n].pos.is_none());
                    }
                }
                Op::Update(i, r) => {
                    if queued.is_empty() {
                        continue;
                    }
                    let i = i % queued.len();
                    queued[i].1 = r;
                    heap.update(&mut pool, queued[i].0, r);
                }
            }
            assert_eq!(heap.len(), queued.len());
            for (n, _) in &queued {
                let pos = pool[*n].pos.unwrap();
                assert_eq!(heap.heap[pos.index()].node, *n);
            }
        }
    }

    proptest! {
        #[test]
        fn binary_heap_pops_minimum(ops in prop::collection::vec(op(), 0..200)) {
            check_ordering::<2>(ops);
        }

        #[test]
        fn ternary_heap_pops_minimum(ops in prop::collection::vec(op(), 0..200)) {
            check_ordering::<3>(ops);
        }

        #[test]
        fn wide_heap_pops_minimum(ops in prop::collection::vec(op(), 0..200)) {
            check_ordering::<12>(ops);
        }

        #[test]
        fn octary_heap_pops_minimum(ops in prop::collection::vec(op(), 0..200)) {
            check_ordering::<8>(ops);
        }
    }
}
