//! Anytime Repairing A* (ARA*).
//!
//! A sequence of weighted A* rounds with a shrinking weight. Rounds reuse the
//! nodes and `g` values of the previous ones: nodes improved after being
//! expanded wait in an inconsistent set until the next round instead of
//! being expanded again right away. Every round that improves the incumbent
//! publishes it along with a bound on its suboptimality.

use std::cmp::Reverse;
use std::io::Write;
use std::time::Duration;

use num_traits::SaturatingAdd;
use num_traits::Zero;
use ordered_float::OrderedFloat;

use crate::cost::Cost;
use crate::data_structures::closed_list::ClosedList;
use crate::data_structures::intrusive_heap::IntrusiveHeap;
use crate::data_structures::open_list::OpenList;
use crate::data_structures::open_list::QueuePos;
use crate::data_structures::open_list::Queued;
use crate::data_structures::pool::NodeHandle;
use crate::data_structures::pool::NodePool;
use crate::debug;
use crate::domain::Domain;
use crate::domain::Operator;
use crate::domain::Path;
use crate::limits::Limit;
use crate::limits::Limits;
use crate::options::ConfigError;
use crate::options::Options;
use crate::report::ReportWriter;
use crate::search::Search;
use crate::search::SearchResult;
use crate::search::SearchStats;
use crate::search::TreeNode;
use crate::search::reconstruct_path;
use crate::timer::Timer;

/// Weights this close to 1 are taken as exactly 1.
pub const WEIGHT_EPSILON: f64 = 1e-6;

const NAME: &str = "ARA*";
const SOLUTIONS_TABLE: &str = "AnytimeSolution";

/// `f' = g + w·h`, ties broken by higher g.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AraRank<C> {
    f: OrderedFloat<f64>,
    g: Reverse<C>,
}

impl<C: Cost> AraRank<C> {
    pub fn new(g: C, h: C, w: f64) -> Self {
        Self {
            f: OrderedFloat(g.as_f64() + w * h.as_f64()),
            g: Reverse(g),
        }
    }

    pub fn f(&self) -> f64 {
        self.f.into_inner()
    }
}

#[derive(Debug)]
pub struct AraNode<D: Domain> {
    pub packed: D::PackedState,
    pub parent: Option<NodeHandle>,
    pub op: D::Operator,
    pub rev_op: D::Operator,
    pub g: D::Cost,
    pub h: D::Cost,
    pub pos: Option<QueuePos>,
    /// Expanded during the current round.
    pub closed: bool,
    /// Waiting in the inconsistent set.
    pub incons: bool,
}

impl<D: Domain> AraNode<D> {
    #[inline(always)]
    fn f(&self) -> D::Cost {
        self.g.saturating_add(&self.h)
    }

    fn reach(&mut self, parent: NodeHandle, op: D::Operator, rev_op: D::Operator, g: D::Cost) {
        debug_assert!(g < self.g);
        self.parent = Some(parent);
        self.op = op;
        self.rev_op = rev_op;
        self.g = g;
    }
}

impl<D: Domain> Queued for AraNode<D> {
    #[inline(always)]
    fn queue_pos(&self) -> Option<QueuePos> {
        self.pos
    }
    #[inline(always)]
    fn set_queue_pos(&mut self, pos: Option<QueuePos>) {
        self.pos = pos;
    }
}

impl<D: Domain> TreeNode<D> for AraNode<D> {
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

/// An incumbent published at the end of a round.
#[derive(Clone, Debug, PartialEq)]
pub struct AnytimeSolution<C> {
    pub round: usize,
    pub expanded: u64,
    pub generated: u64,
    pub weight: f64,
    /// Proven suboptimality bound of `cost`.
    pub bound: f64,
    pub cost: C,
    pub wall_time: Duration,
}

/// The weight of the round after one at `w`.
///
/// ```
/// use hsearch::algorithms::arastar::next_weight;
///
/// assert_eq!(next_weight(3.0, 0.5), 2.5);
/// assert_eq!(next_weight(1.2, 0.5), 1.0);
/// assert_eq!(next_weight(1.3, 0.3 - 1e-9), 1.0);
/// ```
pub fn next_weight(w: f64, dwt: f64) -> f64 {
    let w = (w - dwt).max(1.0);
    if w - 1.0 < WEIGHT_EPSILON { 1.0 } else { w }
}

#[derive(Debug)]
pub struct AraStar<D: Domain> {
    domain: D,
    pool: NodePool<AraNode<D>>,
    open: IntrusiveHeap<AraRank<D::Cost>>,
    /// Every node generated so far, by packed state.
    closed: ClosedList<D::PackedState>,
    /// Nodes improved after their expansion in the current round.
    incons: Vec<NodeHandle>,
    /// Nodes expanded in the current round.
    expanded: Vec<NodeHandle>,

    wt0: f64,
    dwt: f64,
    weight: f64,
    bound: f64,
    incumbent: Option<NodeHandle>,
    solutions: Vec<AnytimeSolution<D::Cost>>,

    limits: Limits,
    stats: SearchStats,
}

impl<D: Domain> AraStar<D> {
    /// Reads `wt0`, `dwt` and the limits.
    pub fn new(domain: D, opts: &Options) -> Result<Self, ConfigError> {
        let wt0 = opts
            .weight("wt0")?
            .ok_or_else(|| ConfigError::Missing("wt0".to_string()))?;
        let dwt = opts
            .positive("dwt")?
            .ok_or_else(|| ConfigError::Missing("dwt".to_string()))?;
        let limits = Limits::from_options(opts)?;
        opts.warn_unknown(NAME, &["wt0", "dwt"]);

        Ok(Self {
            domain,
            pool: NodePool::with_limit(limits.nodes),
            open: IntrusiveHeap::new(),
            closed: ClosedList::new(),
            incons: vec![],
            expanded: vec![],
            wt0,
            dwt,
            weight: wt0,
            bound: f64::INFINITY,
            incumbent: None,
            solutions: vec![],
            limits,
            stats: SearchStats::default(),
        })
    }

    /// Incumbents of the last search, in the order they were found.
    pub fn solutions(&self) -> &[AnytimeSolution<D::Cost>] {
        &self.solutions
    }

    #[inline(always)]
    fn rank(&self, node: &AraNode<D>) -> AraRank<D::Cost> {
        AraRank::new(node.g, node.h, self.weight)
    }

    fn run(&mut self, init: &D::State, timer: &Timer) {
        let h = self.domain.heuristic(init);
        if !h.valid() {
            return;
        }
        let packed = self.domain.pack(init);
        let hash = self.domain.hash(&packed);
        let root = AraNode {
            packed: packed.clone(),
            parent: None,
            op: D::Operator::NOP,
            rev_op: D::Operator::NOP,
            g: D::Cost::zero(),
            h,
            pos: None,
            closed: false,
            incons: false,
        };
        let rank = self.rank(&root);
        let Some(root) = self.construct(root) else {
            return;
        };
        self.closed.add(hash, packed, root);
        if self.domain.is_goal(init) {
            self.incumbent = Some(root);
            self.bound = 1.0;
            self.publish(0, timer);
            return;
        }
        self.open.push(&mut self.pool, root, rank);

        for round in 1.. {
            let improved = self.improve(timer);
            if self.incumbent.is_some() {
                self.bound = self.proven_bound();
            }
            if improved {
                self.publish(round, timer);
            }

            if self.stats.limit.is_some() || self.weight <= 1.0 {
                break;
            }
            if self.open.is_empty() && self.incons.is_empty() {
                break;
            }
            self.weight = next_weight(self.weight, self.dwt);
            self.rebuild_open();
            log::debug!("{NAME}: round {} at weight {}", round + 1, self.weight);
        }
    }

    /// Expands nodes until the incumbent can't be improved at the current
    /// weight. Returns whether the incumbent improved.
    fn improve(&mut self, timer: &Timer) -> bool {
        let mut improved = false;
        loop {
            if let Some(limit) = self.limits.check(&self.stats, timer) {
                self.stats.limit = Some(limit);
                return improved;
            }
            let Some((_, front)) = self.open.front() else {
                return improved;
            };
            if let Some(incumbent) = self.incumbent {
                if self.pool[incumbent].g.as_f64() <= front.f() {
                    return improved;
                }
            }
            let Some((node, _)) = self.open.pop(&mut self.pool) else {
                return improved;
            };

            self.pool[node].closed = true;
            self.expanded.push(node);
            self.stats.expanded += 1;

            let state = self.domain.unpack(&self.pool[node].packed);
            let (g, rev_op) = (self.pool[node].g, self.pool[node].rev_op);

            for op in self.domain.operators(&state) {
                if op == rev_op {
                    continue;
                }
                let edge = self.domain.apply(&state, op);
                if !edge.cost.valid() {
                    continue;
                }
                self.stats.generated += 1;

                let child_g = g.saturating_add(&edge.cost);
                let packed = self.domain.pack(&edge.state);
                let hash = self.domain.hash(&packed);
                let goal = self.domain.is_goal(&edge.state);

                if let Some(dup) = self.closed.find(hash, &packed) {
                    if self.pool[dup].g <= child_g {
                        self.stats.duplicates += 1;
                        continue;
                    }
                    self.pool[dup].reach(node, op, edge.rev_op, child_g);
                    if goal {
                        improved |= self.consider(dup);
                        continue;
                    }

                    let resident = &self.pool[dup];
                    let (queued, closed, incons) =
                        (resident.pos.is_some(), resident.closed, resident.incons);
                    let rank = self.rank(resident);
                    if queued {
                        self.open.update(&mut self.pool, dup, rank);
                    } else if closed {
                        if !incons {
                            self.pool[dup].incons = true;
                            self.incons.push(dup);
                            self.stats.reopened += 1;
                        }
                    } else {
                        // Expanded in an earlier round.
                        self.open.push(&mut self.pool, dup, rank);
                        self.stats.reopened += 1;
                    }
                    continue;
                }

                let h = self.domain.heuristic(&edge.state);
                if !h.valid() {
                    continue;
                }
                let child = AraNode {
                    packed: packed.clone(),
                    parent: Some(node),
                    op,
                    rev_op: edge.rev_op,
                    g: child_g,
                    h,
                    pos: None,
                    closed: false,
                    incons: false,
                };
                let rank = self.rank(&child);
                let Some(child) = self.construct(child) else {
                    return improved;
                };
                self.closed.add(hash, packed, child);

                if goal {
                    improved |= self.consider(child);
                } else {
                    self.open.push(&mut self.pool, child, rank);
                }
            }
        }
    }

    fn construct(&mut self, node: AraNode<D>) -> Option<NodeHandle> {
        match self.pool.construct(node) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::debug!("{NAME}: {e}");
                self.stats.limit = Some(Limit::Memory);
                None
            }
        }
    }

    /// Makes `goal` the incumbent if it's cheaper.
    fn consider(&mut self, goal: NodeHandle) -> bool {
        let g = self.pool[goal].g;
        let better = match self.incumbent {
            None => true,
            Some(incumbent) => incumbent == goal || g < self.pool[incumbent].g,
        };
        if better {
            log::trace!("{NAME}: incumbent of cost {g}");
            self.incumbent = Some(goal);
        }
        better
    }

    /// `cost / min f` over the nodes that could still lead to a cheaper
    /// solution, kept between 1 and the current weight and never growing.
    fn proven_bound(&self) -> f64 {
        let Some(incumbent) = self.incumbent else {
            return self.bound;
        };
        let cost = self.pool[incumbent].g;
        let min_f = self
            .open
            .nodes()
            .map(|(n, _)| n)
            .chain(self.incons.iter().copied())
            .map(|n| self.pool[n].f())
            .filter(|f| *f < cost)
            .min();
        let bound = match min_f {
            None => 1.0,
            Some(f) if f.is_zero() => self.weight,
            Some(f) => cost.as_f64() / f.as_f64(),
        };
        bound.min(self.weight).max(1.0).min(self.bound)
    }

    fn publish(&mut self, round: usize, timer: &Timer) {
        let Some(incumbent) = self.incumbent else {
            return;
        };
        self.solutions.push(AnytimeSolution {
            round,
            expanded: self.stats.expanded,
            generated: self.stats.generated,
            weight: self.weight,
            bound: self.bound,
            cost: self.pool[incumbent].g,
            wall_time: timer.elapsed(),
        });
    }

    /// Merges the inconsistent set into open, ranked under the new weight,
    /// and forgets which nodes were expanded.
    fn rebuild_open(&mut self) {
        #[cfg(feature = "coz_profile")]
        coz::scope!("RebuildOpen");

        let mut nodes = self.open.drain(&mut self.pool);
        nodes.append(&mut self.incons);
        for n in self.expanded.drain(..) {
            self.pool[n].closed = false;
        }

        let weight = self.weight;
        let entries = nodes
            .into_iter()
            .map(|n| {
                let node = &mut self.pool[n];
                node.incons = false;
                (n, AraRank::new(node.g, node.h, weight))
            })
            .collect();
        self.open.reinit(&mut self.pool, entries);
    }
}

impl<D: Domain> Search<D> for AraStar<D> {
    /// Returns the best incumbent, even when a limit stopped the search.
    fn search(&mut self, init: D::State) -> SearchResult<D> {
        self.reset();
        let timer = self.limits.timer();
        self.run(&init, &timer);
        self.stats.wall_time = timer.elapsed();

        log::debug!(
            "{NAME} finished at weight {} with bound {} ({:?})",
            self.weight,
            self.bound,
            self.stats.limit
        );
        let path = match self.incumbent {
            Some(goal) => reconstruct_path(&self.domain, &self.pool, goal),
            None => Path::empty(),
        };
        SearchResult {
            path,
            stats: self.stats.clone(),
        }
    }

    fn reset(&mut self) {
        self.open.clear(&mut self.pool);
        self.closed.clear();
        self.incons.clear();
        self.expanded.clear();
        self.pool.reset();
        self.weight = self.wt0;
        self.bound = f64::INFINITY;
        self.incumbent = None;
        self.solutions.clear();
        self.stats = SearchStats::default();
    }

    fn report<W: Write>(&self, out: &mut ReportWriter<W>) -> std::io::Result<()> {
        out.pair("algorithm", NAME)?;
        out.pair("open list", <IntrusiveHeap<AraRank<D::Cost>> as OpenList<_>>::KIND)?;
        out.pair("node size", debug::type_size::<AraNode<D>>())?;
        out.pair("initial weight", self.wt0)?;
        out.pair("weight decrement", self.dwt)?;
        out.pair("final weight", self.weight)?;
        out.pair("final bound", self.bound)?;
        for (key, value) in self.limits.pairs() {
            out.pair(key, value)?;
        }

        out.altcols(
            SOLUTIONS_TABLE,
            ["round", "expanded", "generated", "weight", "bound", "cost", "wall time"],
        )?;
        for s in &self.solutions {
            out.altrow(
                SOLUTIONS_TABLE,
                [
                    s.round.to_string(),
                    s.expanded.to_string(),
                    s.generated.to_string(),
                    s.weight.to_string(),
                    s.bound.to_string(),
                    s.cost.to_string(),
                    s.wall_time.as_secs_f64().to_string(),
                ],
            )?;
        }
        Ok(())
    }

    fn domain(&self) -> &D {
        &self.domain
    }
}
