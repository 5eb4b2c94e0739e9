//! An arena of reusable node records.
//!
//! Nodes are addressed by [`NodeHandle`]s, an index into the arena plus the
//! generation of the slot. Destroying a node bumps the generation of its
//! slot, so a handle that outlived its node is caught when dereferenced
//! instead of silently aliasing whatever node reuses the slot.

use nonmax::NonMaxU32;
use thiserror::Error;

/// Slots added to the arena whenever it runs out of room.
pub const POOL_BLOCK_SIZE: usize = 4096;

/// A reference to a node living in a [`NodePool`].
///
/// Handles are plain values and don't keep nodes alive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: NonMaxU32,
    generation: u32,
}

impl NodeHandle {
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.index.get() as usize
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolExhausted {
    #[error("node limit of {0} nodes reached")]
    Limit(usize),
    #[error("failed to grow the node pool past {0} nodes")]
    Allocation(usize),
}

#[derive(Debug)]
struct Slot<N> {
    generation: u32,
    node: Option<N>,
}

#[derive(Debug)]
pub struct NodePool<N> {
    slots: Vec<Slot<N>>,
    /// Indices of vacant slots.
    free: Vec<NonMaxU32>,
    /// Maximum number of live nodes.
    limit: Option<usize>,
}

impl<N> NodePool<N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            limit: None,
        }
    }

    /// A pool that refuses to hold more than `limit` live nodes.
    ///
    /// Running into the limit is reported exactly like an allocation failure.
    #[must_use]
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            limit,
        }
    }

    /// Stores a node, reusing vacant slots first.
    pub fn construct(&mut self, node: N) -> Result<NodeHandle, PoolExhausted> {
        if let Some(limit) = self.limit {
            if self.len() >= limit {
                return Err(PoolExhausted::Limit(limit));
            }
        }

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index.get() as usize];
            debug_assert!(slot.node.is_none());
            slot.node = Some(node);
            return Ok(NodeHandle {
                index,
                generation: slot.generation,
            });
        }

        let i = self.slots.len();
        let index = u32::try_from(i)
            .ok()
            .and_then(NonMaxU32::new)
            .ok_or(PoolExhausted::Allocation(i))?;
        if self.slots.len() == self.slots.capacity() {
            self.slots
                .try_reserve_exact(POOL_BLOCK_SIZE)
                .map_err(|_| PoolExhausted::Allocation(i))?;
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });

        Ok(NodeHandle {
            index,
            generation: 0,
        })
    }

    /// Removes a node, returning it.
    ///
    /// The handle is consumed and any copy of it is invalid from now on.
    pub fn destruct(&mut self, handle: NodeHandle) -> N {
        let slot = &mut self.slots[handle.index()];
        assert_eq!(
            slot.generation, handle.generation,
            "Destructing {handle:?} through a stale handle"
        );
        let node = match slot.node.take() {
            Some(node) => node,
            None => unreachable!("Live generation with a vacant slot"),
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        node
    }

    #[inline(always)]
    pub fn get(&self, handle: NodeHandle) -> Option<&N> {
        match self.slots.get(handle.index()) {
            Some(slot) if slot.generation == handle.generation => slot.node.as_ref(),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut N> {
        match self.slots.get_mut(handle.index()) {
            Some(slot) if slot.generation == handle.generation => slot.node.as_mut(),
            _ => None,
        }
    }

    /// Live nodes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots, both live and vacant.
    #[inline(always)]
    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Drops every node and releases the memory.
    ///
    /// Outstanding handles are invalid afterwards. Since generations restart,
    /// this must only happen between search episodes.
    pub fn reset(&mut self) {
        self.slots = Vec::new();
        self.free = Vec::new();
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &N)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let node = slot.node.as_ref()?;
            let index = NonMaxU32::new(i as u32)?;
            Some((
                NodeHandle {
                    index,
                    generation: slot.generation,
                },
                node,
            ))
        })
    }
}

impl<N> Default for NodePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> std::ops::Index<NodeHandle> for NodePool<N> {
    type Output = N;

    #[inline(always)]
    fn index(&self, handle: NodeHandle) -> &Self::Output {
        match self.get(handle) {
            Some(node) => node,
            None => panic!("Dangling {handle:?}"),
        }
    }
}

impl<N> std::ops::IndexMut<NodeHandle> for NodePool<N> {
    #[inline(always)]
    fn index_mut(&mut self, handle: NodeHandle) -> &mut Self::Output {
        match self.get_mut(handle) {
            Some(node) => node,
            None => panic!("Dangling {handle:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_reused() {
        let mut pool = NodePool::<String>::new();
        let a = pool.construct("a".to_string()).unwrap();
        let b = pool.construct("b".to_string()).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[a], "a");
        assert_eq!(pool[b], "b");

        assert_eq!(pool.destruct(a), "a");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(a), None);

        let c = pool.construct("c".to_string()).unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert_eq!(pool[c], "c");
        assert_eq!(pool.get(a), None);
        assert_eq!(pool.slots(), 2);
    }

    #[test]
    #[should_panic]
    fn stale_handles_are_caught() {
        let mut pool = NodePool::<u32>::new();
        let a = pool.construct(1).unwrap();
        pool.destruct(a);
        let _b = pool.construct(2).unwrap();
        let _dangling = &pool[a];
    }

    #[test]
    fn grows_by_blocks() {
        let mut pool = NodePool::<u64>::new();
        for i in 0..(POOL_BLOCK_SIZE as u64 + 1) {
            pool.construct(i).unwrap();
        }
        assert!(pool.capacity() >= POOL_BLOCK_SIZE + 1);
        assert_eq!(pool.len(), POOL_BLOCK_SIZE + 1);
        assert_eq!(pool.iter().count(), POOL_BLOCK_SIZE + 1);
    }

    #[test]
    fn limits_live_nodes() {
        let mut pool = NodePool::<u8>::with_limit(Some(2));
        let a = pool.construct(0).unwrap();
        pool.construct(1).unwrap();
        assert_eq!(pool.construct(2), Err(PoolExhausted::Limit(2)));

        // Freeing a node makes room again
        pool.destruct(a);
        assert!(pool.construct(3).is_ok());
    }

    #[test]
    fn reset_drops_everything() {
        let mut pool = NodePool::<u8>::new();
        let a = pool.construct(0).unwrap();
        pool.reset();
        assert!(pool.is_empty());
        assert_eq!(pool.get(a), None);
    }
}
