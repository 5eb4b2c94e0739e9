use std::io::Write;
use std::time::Duration;

use num_traits::Zero;

use crate::cost::Cost;
use crate::data_structures::open_list::QueuePos;
use crate::data_structures::open_list::Queued;
use crate::data_structures::pool::NodeHandle;
use crate::data_structures::pool::NodePool;
use crate::domain::Domain;
use crate::domain::DomainPath;
use crate::domain::Operator;
use crate::domain::Path;
use crate::limits::Limit;
use crate::report::ReportWriter;

/// A node of a search tree.
///
/// Parents are handles into the same pool, so the tree lives as long as the
/// pool does.
#[derive(Debug)]
pub struct SearchNode<D: Domain> {
    pub packed: D::PackedState,
    pub parent: Option<NodeHandle>,
    /// The Operator that generated this node.
    pub op: D::Operator,
    /// The Operator that leads back to the parent.
    pub rev_op: D::Operator,
    pub g: D::Cost,
    pub h: D::Cost,
    /// Estimated steps to a goal, for distance-aware priorities.
    pub d: D::Cost,
    pub pos: Option<QueuePos>,
}

impl<D: Domain> SearchNode<D> {
    pub fn root(packed: D::PackedState, h: D::Cost, d: D::Cost) -> Self {
        Self {
            packed,
            parent: None,
            op: D::Operator::NOP,
            rev_op: D::Operator::NOP,
            g: D::Cost::zero(),
            h,
            d,
            pos: None,
        }
    }

    /// Gives this Node a better path through a new parent.
    pub fn reach(&mut self, parent: NodeHandle, op: D::Operator, rev_op: D::Operator, g: D::Cost) {
        debug_assert!(g < self.g, "{g} doesn't improve {}", self.g);
        self.parent = Some(parent);
        self.op = op;
        self.rev_op = rev_op;
        self.g = g;
    }
}

impl<D: Domain> Queued for SearchNode<D> {
    #[inline(always)]
    fn queue_pos(&self) -> Option<QueuePos> {
        self.pos
    }
    #[inline(always)]
    fn set_queue_pos(&mut self, pos: Option<QueuePos>) {
        self.pos = pos;
    }
}

/// What path reconstruction needs from a node.
pub trait TreeNode<D: Domain> {
    fn packed(&self) -> &D::PackedState;
    fn parent(&self) -> Option<NodeHandle>;
    fn op(&self) -> D::Operator;
}

impl<D: Domain> TreeNode<D> for SearchNode<D> {
    fn packed(&self) -> &D::PackedState {
        &self.packed
    }
    fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }
    fn op(&self) -> D::Operator {
        self.op
    }
}

/// Walks parent links from `goal` back to its root.
///
/// Operators are replayed from the root to price each step, since the `g` of
/// a node may be stale after one of its ancestors was reached through a
/// cheaper path.
pub fn reconstruct_path<D, N>(domain: &D, pool: &NodePool<N>, goal: NodeHandle) -> DomainPath<D>
where
    D: Domain,
    N: TreeNode<D>,
{
    #[cfg(feature = "coz_profile")]
    coz::scope!("PathReconstruction");

    let mut chain = vec![goal];
    let mut node = goal;
    while let Some(parent) = pool[node].parent() {
        debug_assert!(chain.len() <= pool.len(), "Parent links form a cycle");
        chain.push(parent);
        node = parent;
    }
    chain.reverse();

    let mut state = domain.unpack(pool[chain[0]].packed());
    let mut path = Path::new_from_start(state.clone());
    for &node in &chain[1..] {
        let child = &pool[node];
        let edge = domain.apply(&state, child.op());
        debug_assert!(edge.cost.valid(), "Broken parent link into {node:?}");
        debug_assert!(domain.pack(&edge.state) == *child.packed());
        path.append(child.op(), edge.state.clone(), edge.cost);
        state = edge.state;
    }
    path
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub expanded: u64,
    pub generated: u64,
    /// Generated nodes that didn't improve on a resident one.
    pub duplicates: u64,
    /// Nodes put back in the frontier after leaving it.
    pub reopened: u64,
    pub wall_time: Duration,
    pub limit: Option<Limit>,
}

/// The outcome of a search episode.
///
/// The path is empty when no solution was found, whether because a limit
/// was reached (`stats.limit`) or because there's none.
#[derive(Debug)]
pub struct SearchResult<D: Domain> {
    pub path: DomainPath<D>,
    pub stats: SearchStats,
}

impl<D: Domain> SearchResult<D> {
    pub fn unsolved(stats: SearchStats) -> Self {
        Self {
            path: Path::empty(),
            stats,
        }
    }

    pub fn solved(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn cost(&self) -> Option<D::Cost> {
        self.solved().then_some(self.path.cost)
    }

    /// Writes the standard result pairs.
    pub fn report<W: Write>(&self, out: &mut ReportWriter<W>) -> std::io::Result<()> {
        let s = &self.stats;
        out.pair("total nodes expanded", s.expanded)?;
        out.pair("total nodes generated", s.generated)?;
        out.pair("total duplicates", s.duplicates)?;
        out.pair("total reopened", s.reopened)?;
        out.pair("total wall time", s.wall_time.as_secs_f64())?;
        match self.cost() {
            Some(cost) => {
                out.pair("final sol cost", cost)?;
                out.pair("final sol length", self.path.len())?;
            }
            None => {
                out.pair("final sol cost", -1)?;
                out.pair("final sol length", -1)?;
            }
        }
        match s.limit {
            Some(limit) => out.pair("limit reached", limit),
            None => out.pair("limit reached", "none"),
        }
    }
}

/// A search algorithm over some Domain.
pub trait Search<D: Domain> {
    /// Looks for a path from `init` to a goal.
    fn search(&mut self, init: D::State) -> SearchResult<D>;

    /// Drops every node and zeroes the counters.
    fn reset(&mut self);

    /// Writes the configuration and internals of the algorithm.
    fn report<W: Write>(&self, out: &mut ReportWriter<W>) -> std::io::Result<()>;

    fn domain(&self) -> &D;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::graph::GraphDomain;
    use crate::report::Report;

    #[test]
    fn reconstructs_parent_chain() {
        let graph = GraphDomain::builder(4)
            .edge(0, 1, 2)
            .edge(1, 2, 3)
            .goal(2)
            .build();
        let mut pool = NodePool::<SearchNode<GraphDomain>>::new();
        let root = pool.construct(SearchNode::root(0, 0, 0)).unwrap();
        let mut mid = SearchNode::root(1, 0, 0);
        mid.g = u32::MAX;
        mid.reach(root, 1, u32::MAX, 2);
        let mid = pool.construct(mid).unwrap();
        let mut goal = SearchNode::root(2, 0, 0);
        goal.g = u32::MAX;
        goal.reach(mid, 2, u32::MAX, 5);
        let goal = pool.construct(goal).unwrap();

        let path = reconstruct_path(&graph, &pool, goal);
        assert_eq!(path.states, vec![0, 1, 2]);
        assert_eq!(path.cost, 5);
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn reports_failures() {
        let result = SearchResult::<GraphDomain>::unsolved(SearchStats {
            expanded: 3,
            limit: Some(Limit::Time),
            ..Default::default()
        });
        let mut w = ReportWriter::new(Vec::new()).undated();
        result.report(&mut w).unwrap();
        let report = Report::parse(&String::from_utf8(w.into_inner()).unwrap()).unwrap();
        assert_eq!(report.get("total nodes expanded"), Some("3"));
        assert_eq!(report.get("final sol cost"), Some("-1"));
        assert_eq!(report.get("limit reached"), Some("time"));
    }
}
