//! LSS-LRTA*, real-time search with a bounded local search space.
//!
//! Every step runs a bounded A* around the agent, learns better heuristic
//! values for the expanded states by propagating the frontier values back
//! with Dijkstra, and then commits to the path towards the most promising
//! frontier state.
//!
//! States are cached across steps with their successors, predecessors and
//! learned heuristic, so revisiting a region doesn't call into the domain
//! again. The cache outlives a single search: repeated trials keep improving
//! the heuristic until [`Search::reset`].

use std::fmt;
use std::io::Write;
use std::time::Duration;

use derive_more::Display;
use hrsw::Stopwatch;
use num_traits::SaturatingAdd;
use num_traits::Zero;

use crate::cost::Cost;
use crate::data_structures::closed_list::ClosedList;
use crate::data_structures::intrusive_heap::IntrusiveHeap;
use crate::data_structures::open_list::OpenList;
use crate::data_structures::open_list::QueuePos;
use crate::data_structures::open_list::Queued;
use crate::data_structures::pool::NodeHandle;
use crate::data_structures::pool::NodePool;
use crate::data_structures::pool::PoolExhausted;
use crate::debug;
use crate::domain::Domain;
use crate::domain::DomainPath;
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

const NAME: &str = "LSS-LRTA*";
const STEPS_TABLE: &str = "LssStep";
const KEYS: &[&str] = &[
    "depth",
    "lookahead",
    "steptime",
    "edgetime",
    "tiebreak",
    "exclroot",
];

/// How frontier states with the same `f` are ordered.
#[derive(Copy, Clone, Debug, Default, Display, PartialEq, Eq)]
pub enum TieBreak {
    /// Prefer the state furthest from the agent.
    #[default]
    #[display("high")]
    HighG,
    /// Prefer the state closest to the agent.
    #[display("low")]
    LowG,
}

/// The size of each local search space.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LookaheadLimit {
    /// A fixed number of expansions.
    Expansions(u64),
    /// A fixed wall time.
    Deadline(Duration),
    /// Wall time proportional to the cost of the previous move, `first` for
    /// the very first one.
    EdgeCost { first: Duration, per_unit: Duration },
}

impl LookaheadLimit {
    /// Reads `depth` (or `lookahead`), `steptime` and `edgetime`.
    pub fn from_options(opts: &Options) -> Result<Self, ConfigError> {
        let depth = match opts.count("depth")? {
            Some(n) => Some(n),
            None => opts.count("lookahead")?,
        };
        let steptime = opts.seconds("steptime")?;
        let edgetime = opts.seconds("edgetime")?;

        let conflict = |key: &str, with: &str| ConfigError::Invalid {
            key: key.to_string(),
            value: opts.get_str(key).unwrap_or_default().to_string(),
            reason: format!("conflicts with {with}"),
        };
        match (depth, steptime, edgetime) {
            (Some(_), _, Some(_)) => Err(conflict("edgetime", "depth")),
            (Some(_), Some(_), None) => Err(conflict("steptime", "depth")),
            (None, first, Some(per_unit)) => Ok(Self::EdgeCost {
                first: first.unwrap_or(per_unit),
                per_unit,
            }),
            (None, Some(deadline), None) => Ok(Self::Deadline(deadline)),
            (Some(n), None, None) => Ok(Self::Expansions(n)),
            (None, None, None) => Err(ConfigError::Missing("depth".to_string())),
        }
    }
}

impl fmt::Display for LookaheadLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expansions(n) => write!(f, "{n} expansions"),
            Self::Deadline(d) => write!(f, "{}s", d.as_secs_f64()),
            Self::EdgeCost { first, per_unit } => write!(
                f,
                "{}s per unit of cost, {}s first",
                per_unit.as_secs_f64(),
                first.as_secs_f64()
            ),
        }
    }
}

/// `f = g + h`, ties broken according to a [`TieBreak`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LssRank<C> {
    f: C,
    tie: C,
}

impl<C: Cost> LssRank<C> {
    pub fn new(g: C, h: C, tie_break: TieBreak) -> Self {
        Self {
            f: g.saturating_add(&h),
            tie: match tie_break {
                TieBreak::HighG => C::infinity() - g,
                TieBreak::LowG => g,
            },
        }
    }
}

/// A state cached across steps.
#[derive(Debug)]
pub struct LssNode<D: Domain> {
    pub packed: D::PackedState,
    hash: u64,
    goal: bool,
    /// Learned heuristic.
    pub h: D::Cost,
    /// `(operator, node, cost)` edges, known once the node was expanded.
    succs: Option<Vec<(D::Operator, NodeHandle, D::Cost)>>,
    /// `(node, cost)` edges into this node from expanded nodes.
    preds: Vec<(NodeHandle, D::Cost)>,

    // Only meaningful while the node is in the current local search space.
    g: D::Cost,
    parent: Option<NodeHandle>,
    op: D::Operator,
    pos: Option<QueuePos>,
    interior: bool,
}

impl<D: Domain> Queued for LssNode<D> {
    #[inline(always)]
    fn queue_pos(&self) -> Option<QueuePos> {
        self.pos
    }
    #[inline(always)]
    fn set_queue_pos(&mut self, pos: Option<QueuePos>) {
        self.pos = pos;
    }
}

impl<D: Domain> TreeNode<D> for LssNode<D> {
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

#[derive(Clone, Debug, PartialEq)]
pub struct StepStats<C> {
    /// Expansions in the local search space.
    pub expansions: u64,
    /// Operators committed.
    pub length: usize,
    pub cost: C,
    pub wall_time: Duration,
}

enum Lss {
    /// A goal is at the front of the local search space.
    Goal(NodeHandle),
    /// The lookahead ran out.
    Frontier,
    /// There's nowhere left to go.
    DeadEnd,
    /// A search limit fired.
    Stopped,
}

#[derive(Debug)]
pub struct LssLrtaStar<D: Domain> {
    domain: D,
    pool: NodePool<LssNode<D>>,
    /// Every state seen, across steps.
    nodes: ClosedList<D::PackedState>,
    /// States in the current local search space.
    lss: ClosedList<D::PackedState>,
    open: IntrusiveHeap<LssRank<D::Cost>>,
    /// Frontier of the backwards Dijkstra search, by heuristic value.
    learning: IntrusiveHeap<D::Cost>,
    /// Nodes expanded in the current step.
    interior: Vec<NodeHandle>,

    lookahead: LookaheadLimit,
    tie_break: TieBreak,
    exclude_root: bool,

    limits: Limits,
    stats: SearchStats,
    steps: Vec<StepStats<D::Cost>>,
}

impl<D: Domain> LssLrtaStar<D> {
    /// Reads the lookahead, `tiebreak`, `exclroot` and the limits.
    pub fn new(domain: D, opts: &Options) -> Result<Self, ConfigError> {
        let lookahead = LookaheadLimit::from_options(opts)?;
        let tie_break = match opts.get_str("tiebreak") {
            None | Some("high") => TieBreak::HighG,
            Some("low") => TieBreak::LowG,
            Some(v) => {
                return Err(ConfigError::Invalid {
                    key: "tiebreak".to_string(),
                    value: v.to_string(),
                    reason: "expected high or low".to_string(),
                });
            }
        };
        let exclude_root = opts.flag("exclroot")?.unwrap_or(false);
        let limits = Limits::from_options(opts)?;
        opts.warn_unknown(NAME, KEYS);

        Ok(Self {
            domain,
            pool: NodePool::with_limit(limits.nodes),
            nodes: ClosedList::new(),
            lss: ClosedList::new(),
            open: IntrusiveHeap::new(),
            learning: IntrusiveHeap::new(),
            interior: vec![],
            lookahead,
            tie_break,
            exclude_root,
            limits,
            stats: SearchStats::default(),
            steps: vec![],
        })
    }

    /// Per-step statistics of the last search.
    pub fn steps(&self) -> &[StepStats<D::Cost>] {
        &self.steps
    }

    /// The cached node of `s`, if it was ever generated.
    pub fn cached(&self, s: &D::State) -> Option<&LssNode<D>> {
        let packed = self.domain.pack(s);
        let hash = self.domain.hash(&packed);
        self.nodes.find(hash, &packed).map(|n| &self.pool[n])
    }

    #[inline(always)]
    fn rank(&self, node: &LssNode<D>) -> LssRank<D::Cost> {
        LssRank::new(node.g, node.h, self.tie_break)
    }

    /// The cached node of `s`, creating it if needed.
    fn node(&mut self, s: &D::State) -> Result<NodeHandle, PoolExhausted> {
        let packed = self.domain.pack(s);
        let hash = self.domain.hash(&packed);
        if let Some(n) = self.nodes.find(hash, &packed) {
            return Ok(n);
        }
        let n = self.pool.construct(LssNode {
            packed: packed.clone(),
            hash,
            goal: self.domain.is_goal(s),
            h: self.domain.heuristic(s),
            succs: None,
            preds: vec![],
            g: D::Cost::infinity(),
            parent: None,
            op: D::Operator::NOP,
            pos: None,
            interior: false,
        })?;
        self.nodes.add(hash, packed, n);
        Ok(n)
    }

    /// Successor edges of `n`, asking the domain only the first time.
    fn successors(
        &mut self,
        n: NodeHandle,
    ) -> Result<Vec<(D::Operator, NodeHandle, D::Cost)>, PoolExhausted> {
        if let Some(succs) = &self.pool[n].succs {
            return Ok(succs.clone());
        }
        let state = self.domain.unpack(&self.pool[n].packed);
        let mut succs = vec![];
        for op in self.domain.operators(&state) {
            let edge = self.domain.apply(&state, op);
            if !edge.cost.valid() {
                continue;
            }
            self.stats.generated += 1;
            let child = self.node(&edge.state)?;
            self.pool[child].preds.push((n, edge.cost));
            succs.push((op, child, edge.cost));
        }
        self.pool[n].succs = Some(succs.clone());
        Ok(succs)
    }

    /// Adds `n` to the local search space.
    fn enter(&mut self, n: NodeHandle, parent: Option<NodeHandle>, op: D::Operator, g: D::Cost) {
        let node = &mut self.pool[n];
        node.g = g;
        node.parent = parent;
        node.op = op;
        let (hash, packed) = (node.hash, node.packed.clone());
        self.lss.add(hash, packed, n);
        let rank = self.rank(&self.pool[n]);
        self.open.push(&mut self.pool, n, rank);
    }

    fn step_deadline(&self, last_cost: Option<D::Cost>) -> Option<Duration> {
        match self.lookahead {
            LookaheadLimit::Expansions(_) => None,
            LookaheadLimit::Deadline(d) => Some(d),
            LookaheadLimit::EdgeCost { first, per_unit } => Some(match last_cost {
                None => first,
                Some(c) => Duration::try_from_secs_f64(per_unit.as_secs_f64() * c.as_f64())
                    .unwrap_or(Duration::MAX),
            }),
        }
    }

    /// Runs the bounded A* around `root`.
    fn expand_lss(&mut self, root: NodeHandle, timer: &Timer, step_timer: &Timer) -> (Lss, u64) {
        #[cfg(feature = "coz_profile")]
        coz::scope!("ExpandLSS");

        self.lss.clear();
        self.open.clear(&mut self.pool);
        self.enter(root, None, D::Operator::NOP, D::Cost::zero());

        let mut expansions = 0;
        loop {
            if let Some(limit) = self.limits.check(&self.stats, timer) {
                self.stats.limit = Some(limit);
                return (Lss::Stopped, expansions);
            }
            let Some((n, _)) = self.open.front() else {
                return (Lss::DeadEnd, expansions);
            };
            if self.pool[n].goal {
                return (Lss::Goal(n), expansions);
            }
            let reached = match self.lookahead {
                LookaheadLimit::Expansions(max) => expansions >= max,
                _ => step_timer.check_time_limit(),
            };
            if expansions > 0 && reached {
                return (Lss::Frontier, expansions);
            }

            self.open.pop(&mut self.pool);
            self.pool[n].interior = true;
            self.interior.push(n);
            expansions += 1;
            self.stats.expanded += 1;

            let succs = match self.successors(n) {
                Ok(succs) => succs,
                Err(e) => {
                    log::debug!("{NAME}: {e}");
                    self.stats.limit = Some(Limit::Memory);
                    return (Lss::Stopped, expansions);
                }
            };
            let g = self.pool[n].g;
            for (op, child, cost) in succs {
                if self.exclude_root && child == root {
                    continue;
                }
                let child_g = g.saturating_add(&cost);
                let resident = &self.pool[child];
                if self.lss.find(resident.hash, &resident.packed).is_none() {
                    self.enter(child, Some(n), op, child_g);
                    continue;
                }
                if resident.interior || resident.g <= child_g {
                    self.stats.duplicates += 1;
                    continue;
                }
                let resident = &mut self.pool[child];
                resident.g = child_g;
                resident.parent = Some(n);
                resident.op = op;
                let rank = self.rank(&self.pool[child]);
                self.open.update(&mut self.pool, child, rank);
            }
        }
    }

    /// Raises the heuristic of the interior nodes to the best value backed
    /// up from the frontier.
    fn learn(&mut self) {
        #[cfg(feature = "coz_profile")]
        coz::scope!("LearnHeuristic");

        let frontier = self.open.drain(&mut self.pool);
        let mut old = Vec::with_capacity(self.interior.len());
        for &n in &self.interior {
            old.push(self.pool[n].h);
            self.pool[n].h = D::Cost::infinity();
        }

        let entries = frontier.into_iter().map(|n| (n, self.pool[n].h)).collect();
        self.learning.reinit(&mut self.pool, entries);
        while let Some((n, h)) = self.learning.pop(&mut self.pool) {
            let preds = self.pool[n].preds.clone();
            for (p, cost) in preds {
                let backed_up = cost.saturating_add(&h);
                let pred = &mut self.pool[p];
                if pred.interior && backed_up < pred.h {
                    pred.h = backed_up;
                    self.learning.push_update(&mut self.pool, p, backed_up);
                }
            }
        }

        for (n, old) in self.interior.drain(..).zip(old) {
            let node = &mut self.pool[n];
            node.h = node.h.max(old);
            node.interior = false;
        }
    }

    /// Forgets the local search space of an interrupted step.
    fn clear_lss(&mut self) {
        self.open.clear(&mut self.pool);
        self.learning.clear(&mut self.pool);
        self.lss.clear();
        for n in self.interior.drain(..) {
            self.pool[n].interior = false;
        }
    }

    fn run(&mut self, init: &D::State, timer: &Timer) -> Option<DomainPath<D>> {
        let mut root = match self.node(init) {
            Ok(root) => root,
            Err(e) => {
                log::debug!("{NAME}: {e}");
                self.stats.limit = Some(Limit::Memory);
                return None;
            }
        };
        let mut path = Path::new_from_start(init.clone());
        let mut last_cost = None;

        loop {
            let mut stopwatch = Stopwatch::new_started();
            let step_timer = Timer::with_time_limit(self.step_deadline(last_cost));
            let (lss, expansions) = self.expand_lss(root, timer, &step_timer);

            let target = match lss {
                Lss::Goal(goal) => goal,
                Lss::Frontier => match self.open.front() {
                    Some((target, _)) if self.pool[target].h.valid() => target,
                    _ => return None,
                },
                Lss::DeadEnd | Lss::Stopped => return None,
            };
            let step = reconstruct_path(&self.domain, &self.pool, target);
            let goal = self.pool[target].goal;
            if !goal {
                self.learn();
            }

            stopwatch.stop();
            self.steps.push(StepStats {
                expansions,
                length: step.len(),
                cost: step.cost,
                wall_time: stopwatch.elapsed(),
            });
            log::trace!("{NAME}: step {} commits {}", self.steps.len(), step);

            last_cost = Some(step.cost);
            path.extend(step);
            if goal {
                return Some(path);
            }
            root = target;
        }
    }
}

impl<D: Domain> Search<D> for LssLrtaStar<D> {
    /// Runs one trial from `init`. Learned heuristic values are kept
    /// across calls until [`Search::reset`].
    fn search(&mut self, init: D::State) -> SearchResult<D> {
        self.clear_lss();
        self.steps.clear();
        self.stats = SearchStats::default();
        let timer = self.limits.timer();
        let path = self.run(&init, &timer);
        self.stats.wall_time = timer.elapsed();

        log::debug!(
            "{NAME} finished after {} steps ({:?})",
            self.steps.len(),
            self.stats.limit
        );
        SearchResult {
            path: path.unwrap_or_else(Path::empty),
            stats: self.stats.clone(),
        }
    }

    fn reset(&mut self) {
        self.clear_lss();
        self.nodes.clear();
        self.pool.reset();
        self.steps.clear();
        self.stats = SearchStats::default();
    }

    fn report<W: Write>(&self, out: &mut ReportWriter<W>) -> std::io::Result<()> {
        out.pair("algorithm", NAME)?;
        out.pair("open list", <IntrusiveHeap<LssRank<D::Cost>> as OpenList<_>>::KIND)?;
        out.pair("node size", debug::type_size::<LssNode<D>>())?;
        out.pair("lookahead", self.lookahead)?;
        out.pair("tie break", self.tie_break)?;
        out.pair("exclude root", self.exclude_root)?;
        for (key, value) in self.limits.pairs() {
            out.pair(key, value)?;
        }

        let steps = self.steps.len();
        out.pair("steps", steps)?;
        out.pair("cached nodes", self.nodes.len())?;
        if steps > 0 {
            let expansions: u64 = self.steps.iter().map(|s| s.expansions).sum();
            let time: Duration = self.steps.iter().map(|s| s.wall_time).sum();
            let max_time = self
                .steps
                .iter()
                .map(|s| s.wall_time)
                .max()
                .unwrap_or_default();
            out.pair("mean lss expansions", expansions as f64 / steps as f64)?;
            out.pair("mean step time", time.as_secs_f64() / steps as f64)?;
            out.pair("max step time", max_time.as_secs_f64())?;
        }

        out.altcols(STEPS_TABLE, ["step", "expansions", "length", "cost", "wall time"])?;
        for (i, s) in self.steps.iter().enumerate() {
            out.altrow(
                STEPS_TABLE,
                [
                    (i + 1).to_string(),
                    s.expansions.to_string(),
                    s.length.to_string(),
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

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use indoc::indoc;
    use proptest::prelude::*;

    use super::*;
    use crate::domain::validate_path;
    use crate::problems::graph::GraphDomain;
    use crate::problems::grid::GridCell;
    use crate::problems::grid::GridDomain;
    use crate::problems::grid::GridState;
    use crate::problems::tiles::Tiles;
    use crate::report::Report;

    fn walled_grid() -> GridDomain {
        let mut grid = GridDomain::open(10, 10).unwrap();
        for y in 0..9 {
            grid.set(5, y, GridCell::Wall);
        }
        grid
    }

    fn lss<D: Domain>(domain: D, opts: Options) -> LssLrtaStar<D> {
        LssLrtaStar::new(domain, &opts).unwrap()
    }

    fn check_solves<D: Domain>(search: &mut LssLrtaStar<D>) -> SearchResult<D> {
        let init = search.domain().initial_state();
        let result = search.search(init.clone());
        assert!(result.solved(), "{:?}", result.stats);
        let (end, cost) = validate_path(search.domain(), &init, &result.path.ops).unwrap();
        assert!(search.domain().is_goal(&end));
        assert_eq!(cost, result.path.cost);

        let steps = search.steps();
        assert!(!steps.is_empty());
        assert_eq!(steps.iter().map(|s| s.length).sum::<usize>(), result.path.len());
        result
    }

    #[test]
    fn ranking() {
        let high = |g: u32, h: u32| LssRank::new(g, h, TieBreak::HighG);
        let low = |g: u32, h: u32| LssRank::new(g, h, TieBreak::LowG);
        assert!(high(1, 3) < high(1, 4));
        assert!(high(2, 3) < high(1, 4));
        assert!(low(1, 4) < low(2, 3));
        assert!(low(9, 0) < high(0, 10));
    }

    #[test]
    fn reaches_goals() {
        let mut search = lss(walled_grid(), Options::new().with("depth", 1));
        let result = check_solves(&mut search);
        assert!(result.path.cost >= 18);
        assert!(search.steps().iter().all(|s| s.expansions == 1));

        let tiles = Tiles::try_from("1 4 2\n3 5 8\n6 7 0").unwrap();
        let mut search = lss(tiles, Options::new().with("depth", 3));
        check_solves(&mut search);
    }

    #[test]
    fn large_lookaheads_find_optimal_paths() {
        let mut search = lss(walled_grid(), Options::new().with("depth", 1000));
        let result = check_solves(&mut search);
        assert_eq!(result.path.cost, 18);
        assert_eq!(search.steps().len(), 1);

        let tiles = Tiles::try_from("7 2 4\n5 0 6\n8 3 1").unwrap();
        let mut search = lss(tiles, Options::new().with("lookahead", 100_000));
        assert_eq!(check_solves(&mut search).path.cost, 26);
    }

    /// A wall whose only gap is on the top row, far from the straight line
    /// between start and goal.
    fn detour_grid() -> GridDomain {
        GridDomain::try_from(indoc! {"
            ..........
            .....#....
            .....#....
            .....#....
            .....#....
            .....#....
            .....#....
            .....#....
            .....#....
            S....#...G
        "})
        .unwrap()
    }

    /// Exact cost to the goal of `detour_grid`.
    fn detour_cost(s: &GridState) -> u32 {
        let (x, y) = (s.x(), s.y());
        if x <= 5 { 18 - x + y } else { (9 - x) + (9 - y) }
    }

    #[test]
    fn learning_raises_h_within_bounds() {
        let grid = detour_grid();
        let mut search = lss(grid.clone(), Options::new().with("depth", 4));
        let result = check_solves(&mut search);
        assert!(result.path.cost >= 27);

        let mut learned = 0;
        for (packed, n) in search.nodes.iter() {
            let state = grid.unpack(packed);
            let h = search.pool[n].h;
            assert!(h >= grid.heuristic(&state), "{state} lowered to {h}");
            assert!(h <= detour_cost(&state), "{state} raised to {h}");
            if h > grid.heuristic(&state) {
                learned += 1;
            }
        }
        assert!(learned > 0);

        // Every way out of the corner at the foot of the wall starts by moving
        // away from the goal.
        let corner = GridState::new(4, 9).unwrap();
        assert_eq!(grid.heuristic(&corner), 5);
        let h = search.cached(&corner).map(|n| n.h);
        assert!(h.is_some_and(|h| h >= 7), "{h:?}");
    }

    #[test]
    fn learns_exact_values_on_small_graphs() {
        // 1 is a cheap looking cul-de-sac next to the start.
        let graph = GraphDomain::builder(4)
            .undirected(0, 1, 1)
            .undirected(0, 2, 1)
            .undirected(2, 3, 1)
            .h(2, 1)
            .goal(3)
            .build();
        let learned = |search: &LssLrtaStar<GraphDomain>| -> Vec<Option<u32>> {
            (0..4).map(|v| search.cached(&v).map(|n| n.h)).collect()
        };

        let mut search = lss(graph.clone(), Options::new().with("depth", 1));
        let result = search.search(0);
        assert_eq!(result.path.ops, vec![1, 0, 2, 3]);
        assert_eq!(result.path.cost, 4);
        assert_eq!(search.steps().len(), 4);
        assert_eq!(learned(&search), vec![Some(2), Some(2), Some(1), Some(0)]);

        // A second trial starts from what the first one learned.
        let result = search.search(0);
        assert_eq!(result.path.ops, vec![2, 3]);
        assert_eq!(learned(&search), vec![Some(2), Some(2), Some(1), Some(0)]);
        search.reset();
        assert_eq!(search.cached(&0).map(|n| n.h), None);

        // Excluding the root from its descendants still backs values up
        // through it.
        let opts = Options::new().with("depth", 2).with("exclroot", true);
        let mut search = lss(graph.clone(), opts);
        let result = search.search(0);
        assert_eq!(result.path.ops, vec![2, 3]);
        assert_eq!(learned(&search), vec![Some(2), Some(3), Some(1), Some(0)]);
        assert_eq!(graph.optimal_costs()[1], Some(3));
    }

    #[test]
    fn trials_converge_to_optimal_paths() {
        let grid = detour_grid();
        let start = grid.initial_state();
        let mut search = lss(grid.clone(), Options::new().with("depth", 4));

        let mut h_start = grid.heuristic(&start);
        let mut costs = vec![];
        for _trial in 0..1000 {
            let result = check_solves(&mut search);
            costs.push(result.path.cost);
            let h = search.cached(&start).map_or(0, |n| n.h);
            assert!(h >= h_start);
            assert!(h <= 27);
            h_start = h;
            if result.path.cost == 27 {
                break;
            }
        }
        assert_eq!(costs.last(), Some(&27), "{costs:?}");
    }

    #[test]
    fn tie_breaking_and_root_exclusion() {
        for (tiebreak, exclroot) in [("high", false), ("low", false), ("high", true), ("low", true)] {
            let opts = Options::new()
                .with("depth", 2)
                .with("tiebreak", tiebreak)
                .with("exclroot", exclroot);
            let mut search = lss(walled_grid(), opts);
            check_solves(&mut search);
            assert_eq!(search.tie_break.to_string(), tiebreak);
        }
    }

    #[test]
    fn time_bounded_lookaheads() {
        let opts = Options::new().with("steptime", 0.5);
        let mut search = lss(walled_grid(), opts);
        assert_eq!(search.lookahead, LookaheadLimit::Deadline(Duration::from_millis(500)));
        check_solves(&mut search);

        let opts = Options::new().with("edgetime", 0.001);
        let mut search = lss(walled_grid(), opts);
        assert!(matches!(search.lookahead, LookaheadLimit::EdgeCost { .. }));
        check_solves(&mut search);
    }

    #[test]
    fn dead_ends() {
        let graph = GraphDomain::builder(4).edge(0, 1, 1).edge(1, 3, 1).goal(2).build();
        let mut search = lss(graph, Options::new().with("depth", 10));
        let result = search.search(0);
        assert!(!result.solved());
        assert_eq!(result.stats.limit, None);

        // Heading to 1 looks great but leads nowhere.
        let graph = GraphDomain::builder(4)
            .undirected(0, 1, 1)
            .undirected(0, 2, 5)
            .edge(2, 3, 1)
            .h(2, 5)
            .goal(3)
            .build();
        let mut search = lss(graph, Options::new().with("depth", 1));
        let result = search.search(0);
        assert_eq!(result.path.end(), Some(&3));
    }

    #[test]
    fn limits_abort() {
        let opts = Options::new().with("depth", 1).with("expd", 3);
        let mut search = lss(walled_grid(), opts);
        let result = search.search(walled_grid().initial_state());
        assert!(!result.solved());
        assert_eq!(result.stats.limit, Some(Limit::Expansions));

        let opts = Options::new().with("depth", 1).with("nodes", 5);
        let mut search = lss(walled_grid(), opts);
        let result = search.search(walled_grid().initial_state());
        assert_eq!(result.stats.limit, Some(Limit::Memory));
    }

    #[test]
    fn rejects_bad_options() {
        let grid = walled_grid();
        let new = |opts: Options| LssLrtaStar::new(grid.clone(), &opts).err();
        assert_eq!(new(Options::new()), Some(ConfigError::Missing("depth".to_string())));
        assert!(matches!(
            new(Options::new().with("depth", 0)),
            Some(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            new(Options::new().with("depth", 3).with("tiebreak", "random")),
            Some(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            new(Options::new().with("depth", 3).with("steptime", 1)),
            Some(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn reports_steps() {
        let grid = walled_grid();
        let mut search = lss(grid.clone(), Options::new().with("depth", 5));
        let result = search.search(grid.initial_state());

        let mut w = ReportWriter::new(Vec::new()).undated();
        w.start().unwrap();
        search.report(&mut w).unwrap();
        result.report(&mut w).unwrap();
        w.end().unwrap();
        let report = Report::parse(&String::from_utf8(w.into_inner()).unwrap()).unwrap();

        assert_eq!(report.get("algorithm"), Some("LSS-LRTA*"));
        assert_eq!(report.get("lookahead"), Some("5 expansions"));
        assert_eq!(report.get("tie break"), Some("high"));
        let steps = search.steps().len();
        assert_eq!(report.get("steps"), Some(steps.to_string().as_str()));
        assert_eq!(report.rows(STEPS_TABLE).count(), steps);
    }

    /// A connected undirected graph with an admissible heuristic, and the
    /// optimal costs to the goal, vertex `n - 1`.
    fn random_graph() -> impl Strategy<Value = (GraphDomain, Vec<Option<u32>>)> {
        (2usize..16)
            .prop_flat_map(|n| {
                (
                    Just(n),
                    prop::collection::vec((0..n as u32, 0..n as u32, 1u32..10), 0..30),
                    prop::collection::vec(0.0f64..1.0, n),
                )
            })
            .prop_map(|(n, edges, scale)| {
                let mut builder = GraphDomain::builder(n).goal(n as u32 - 1);
                for v in 1..n as u32 {
                    builder = builder.undirected(v - 1, v, 10);
                }
                for (a, b, c) in edges {
                    builder = builder.undirected(a, b, c);
                }
                let optimal = builder.clone().build().optimal_costs();
                for (v, h) in optimal.iter().enumerate() {
                    let h = h.map_or(0, |h| (h as f64 * scale[v]).floor() as u32);
                    builder = builder.h(v as u32, h);
                }
                (builder.build(), optimal)
            })
    }

    proptest! {
        #[test]
        fn learned_heuristics_stay_admissible(
            (graph, optimal) in random_graph(),
            depth in 1u64..5,
            tiebreak in prop_oneof![Just("high"), Just("low")],
            exclroot in any::<bool>(),
        ) {
            let opts = Options::new()
                .with("depth", depth)
                .with("tiebreak", tiebreak)
                .with("exclroot", exclroot);
            let mut search = lss(graph.clone(), opts);

            let mut seen = HashMap::new();
            for _trial in 0..3 {
                let result = search.search(0);
                prop_assert!(result.solved());
                prop_assert!(result.path.cost >= optimal[0].unwrap());

                for (v, n) in search.nodes.iter() {
                    let h = search.pool[n].h;
                    let opt = optimal[*v as usize].unwrap();
                    prop_assert!(h >= graph.heuristic(v));
                    prop_assert!(h <= opt, "h({}) = {} > {}", v, h, opt);
                    if let Some(before) = seen.insert(*v, h) {
                        prop_assert!(h >= before, "h({}) fell from {} to {}", v, before, h);
                    }
                }
            }
        }
    }
}
