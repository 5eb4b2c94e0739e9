//! Priority queues over pooled nodes.
//!
//! Open lists don't own nodes, they hold `(NodeHandle, Rank)` entries and tell
//! the nodes where they live through [`QueueSlots`]. That's what allows
//! re-ranking a node in place after finding a better path to it, without
//! searching for its entry.
//!
//! Changing the rank of an enqueued node is a two step affair, write the new
//! node values through the pool, then call [`OpenList::update`] (or
//! [`OpenList::push_update`]) before the next `pop`.

use std::fmt::Debug;

use crate::data_structures::pool::NodeHandle;
use crate::data_structures::pool::NodePool;

/// Where a node sits within an open list.
///
/// Heaps only use `index`, bucket queues use all three coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueuePos {
    pub bucket: u32,
    pub sub: u32,
    pub index: u32,
}

impl QueuePos {
    #[inline(always)]
    pub fn heap(index: usize) -> Self {
        Self {
            bucket: 0,
            sub: 0,
            index: index as u32,
        }
    }

    #[inline(always)]
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// Storage for the queue positions of nodes.
///
/// `None` means the node is not enqueued.
pub trait QueueSlots {
    fn queue_pos(&self, node: NodeHandle) -> Option<QueuePos>;
    fn set_queue_pos(&mut self, node: NodeHandle, pos: Option<QueuePos>);
}

/// A node record that remembers its position in an open list.
pub trait Queued {
    fn queue_pos(&self) -> Option<QueuePos>;
    fn set_queue_pos(&mut self, pos: Option<QueuePos>);
}

impl<N: Queued> QueueSlots for NodePool<N> {
    #[inline(always)]
    fn queue_pos(&self, node: NodeHandle) -> Option<QueuePos> {
        self[node].queue_pos()
    }
    #[inline(always)]
    fn set_queue_pos(&mut self, node: NodeHandle, pos: Option<QueuePos>) {
        self[node].set_queue_pos(pos);
    }
}

/// The sort key of an open list. Lower is better.
pub trait Rank: Copy + Ord + Debug {}
impl<T: Copy + Ord + Debug> Rank for T {}

/// A Rank that can be spread over integer buckets.
///
/// The ordering of the Rank must agree with `(primary(), secondary())`.
pub trait BucketRank: Rank {
    fn primary(&self) -> usize;
    fn secondary(&self) -> usize;
}

/// A frontier of nodes ordered by some Rank.
pub trait OpenList<R: Rank>: Default + Debug {
    /// Name used in reports.
    const KIND: &'static str;

    fn len(&self) -> usize;

    #[inline(always)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds a node that's not in the queue.
    fn push<S: QueueSlots>(&mut self, slots: &mut S, node: NodeHandle, rank: R);

    /// Removes a minimal node.
    fn pop<S: QueueSlots>(&mut self, slots: &mut S) -> Option<(NodeHandle, R)>;

    /// Peeks at a minimal node.
    fn front(&self) -> Option<(NodeHandle, R)>;

    /// Re-ranks a node that's in the queue.
    fn update<S: QueueSlots>(&mut self, slots: &mut S, node: NodeHandle, rank: R);

    /// Re-ranks `node` if it's in the queue, adds it otherwise.
    #[inline(always)]
    fn push_update<S: QueueSlots>(&mut self, slots: &mut S, node: NodeHandle, rank: R) {
        match slots.queue_pos(node) {
            Some(_) => self.update(slots, node, rank),
            None => self.push(slots, node, rank),
        }
    }

    /// Removes every node, returning them in no particular order.
    fn drain<S: QueueSlots>(&mut self, slots: &mut S) -> Vec<NodeHandle>;

    fn clear<S: QueueSlots>(&mut self, slots: &mut S) {
        self.drain(slots);
    }

    /// Adds many nodes at once.
    fn append<S: QueueSlots>(&mut self, slots: &mut S, entries: Vec<(NodeHandle, R)>);

    /// Replaces the whole contents of the queue.
    fn reinit<S: QueueSlots>(&mut self, slots: &mut S, entries: Vec<(NodeHandle, R)>) {
        self.clear(slots);
        self.append(slots, entries);
    }

    /// Enqueued nodes in no particular order.
    fn nodes(&self) -> impl Iterator<Item = (NodeHandle, R)> + '_;
}
