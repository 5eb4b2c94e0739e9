//! Best-first search with reopening.
//!
//! One search loop parameterised by its ranking, which gives A*, weighted
//! A* and utility-guided best-first search. The open list is a type
//! parameter too, so A* can run over a bucket queue when costs are small
//! integers.

use std::fmt::Debug;
use std::io::Write;
use std::marker::PhantomData;

use num_traits::SaturatingAdd;
use num_traits::Zero;
use ordered_float::OrderedFloat;

use crate::cost::Cost;
use crate::data_structures::bucket_queue::BucketQueue;
use crate::data_structures::closed_list::ClosedList;
use crate::data_structures::intrusive_heap::IntrusiveHeap;
use crate::data_structures::open_list::BucketRank;
use crate::data_structures::open_list::OpenList;
use crate::data_structures::open_list::Rank;
use crate::data_structures::pool::NodeHandle;
use crate::data_structures::pool::NodePool;
use crate::debug;
use crate::domain::Domain;
use crate::domain::Path;
use crate::limits::Limit;
use crate::limits::Limits;
use crate::options::ConfigError;
use crate::options::Options;
use crate::report::ReportWriter;
use crate::search::Search;
use crate::search::SearchNode;
use crate::search::SearchResult;
use crate::search::SearchStats;
use crate::search::reconstruct_path;
use crate::timer::Timer;

/// How a best-first search orders its frontier.
pub trait BestFirstRank<C: Cost>: Rank {
    /// Configuration read from the options.
    type Params: Clone + Debug;

    /// Name used in reports and logs.
    const NAME: &'static str;
    /// Options understood by [`BestFirstRank::params`].
    const KEYS: &'static [&'static str];
    /// Whether [`BestFirstRank::new`] uses `d`, sparing calls to
    /// [`Domain::distance`] otherwise.
    const NEEDS_DISTANCE: bool = false;

    fn params(opts: &Options) -> Result<Self::Params, ConfigError>;

    fn new(g: C, h: C, d: C, params: &Self::Params) -> Self;

    fn report_params<W: Write>(
        _params: &Self::Params,
        _out: &mut ReportWriter<W>,
    ) -> std::io::Result<()> {
        Ok(())
    }
}

/// The ranking tuple for A*
///
/// We prefer better f-values, and tie break for lower h.
///
/// Intuition around higher g-value might be slightly easier, but keeping the
/// raw h value helps to avoid recomputing it later.
///
/// ```
/// use hsearch::algorithms::best_first::AStarRank;
///
/// assert!(AStarRank::new(2u32, 0) < AStarRank::new(2, 1));
/// assert!(AStarRank::new(2u32, 0) < AStarRank::new(0, 2));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AStarRank<C> {
    f: C,
    h: C,
}

impl<C: Cost> AStarRank<C> {
    pub fn new(g: C, h: C) -> Self {
        Self {
            f: g.saturating_add(&h),
            h,
        }
    }

    pub fn f(&self) -> C {
        self.f
    }

    pub fn h(&self) -> C {
        self.h
    }
}

impl<C: Cost> BestFirstRank<C> for AStarRank<C> {
    type Params = ();

    const NAME: &'static str = "A*";
    const KEYS: &'static [&'static str] = &[];

    fn params(_opts: &Options) -> Result<(), ConfigError> {
        Ok(())
    }

    #[inline(always)]
    fn new(g: C, h: C, _d: C, _params: &()) -> Self {
        AStarRank::new(g, h)
    }
}

impl<C: Cost> BucketRank for AStarRank<C> {
    #[inline(always)]
    fn primary(&self) -> usize {
        self.f.as_bucket()
    }
    #[inline(always)]
    fn secondary(&self) -> usize {
        self.h.as_bucket()
    }
}

/// `f' = g + w·h`, ties broken by lower h.
///
/// The weight only scales the sort key, `g` stays exact.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct WeightedRank<C> {
    f: OrderedFloat<f64>,
    h: C,
}

impl<C: Cost> WeightedRank<C> {
    pub fn new(g: C, h: C, w: f64) -> Self {
        Self {
            f: OrderedFloat(g.as_f64() + w * h.as_f64()),
            h,
        }
    }

    pub fn f(&self) -> f64 {
        self.f.into_inner()
    }
}

impl<C: Cost> BestFirstRank<C> for WeightedRank<C> {
    /// The heuristic weight.
    type Params = f64;

    const NAME: &'static str = "weighted A*";
    const KEYS: &'static [&'static str] = &["wt"];

    fn params(opts: &Options) -> Result<f64, ConfigError> {
        opts.weight("wt")?
            .ok_or_else(|| ConfigError::Missing("wt".to_string()))
    }

    #[inline(always)]
    fn new(g: C, h: C, _d: C, w: &f64) -> Self {
        WeightedRank::new(g, h, *w)
    }

    fn report_params<W: Write>(w: &f64, out: &mut ReportWriter<W>) -> std::io::Result<()> {
        out.pair("weight", w)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UtilityWeights {
    /// Weight of the solution cost.
    pub wf: f64,
    /// Weight of the remaining search time, estimated by the distance.
    pub wt: f64,
}

/// `u = wf·(g + h) + wt·d`, ties broken by lower h.
///
/// Trades solution cost for search effort, with `d` as a proxy of the time
/// still needed to reach a goal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UtilityRank<C> {
    u: OrderedFloat<f64>,
    h: C,
}

impl<C: Cost> BestFirstRank<C> for UtilityRank<C> {
    type Params = UtilityWeights;

    const NAME: &'static str = "utility best-first";
    const KEYS: &'static [&'static str] = &["wf", "wt"];
    const NEEDS_DISTANCE: bool = true;

    fn params(opts: &Options) -> Result<UtilityWeights, ConfigError> {
        Ok(UtilityWeights {
            wf: opts.non_negative("wf")?.unwrap_or(1.0),
            wt: opts.non_negative("wt")?.unwrap_or(1.0),
        })
    }

    #[inline(always)]
    fn new(g: C, h: C, d: C, w: &UtilityWeights) -> Self {
        let f = g.saturating_add(&h);
        Self {
            u: OrderedFloat(w.wf * f.as_f64() + w.wt * d.as_f64()),
            h,
        }
    }

    fn report_params<W: Write>(
        w: &UtilityWeights,
        out: &mut ReportWriter<W>,
    ) -> std::io::Result<()> {
        out.pair("cost weight", w.wf)?;
        out.pair("time weight", w.wt)
    }
}

pub type AStar<D> = BestFirstSearch<D, AStarRank<<D as Domain>::Cost>>;
pub type BucketAStar<D> =
    BestFirstSearch<D, AStarRank<<D as Domain>::Cost>, BucketQueue<AStarRank<<D as Domain>::Cost>>>;
pub type WeightedAStar<D> = BestFirstSearch<D, WeightedRank<<D as Domain>::Cost>>;
pub type UtilityBestFirst<D> = BestFirstSearch<D, UtilityRank<<D as Domain>::Cost>>;

#[derive(Debug)]
pub struct BestFirstSearch<D, R, O = IntrusiveHeap<R>>
where
    D: Domain,
    R: BestFirstRank<D::Cost>,
    O: OpenList<R>,
{
    domain: D,

    /// All the Search Nodes. Naturally forms a Search Forest as each node may
    /// have a parent Node.
    pool: NodePool<SearchNode<D>>,

    /// The frontier. Nodes know their position in it, which allows
    /// re-ranking them without a linear search.
    open: O,

    /// Every node generated so far, by packed state. A node is closed when
    /// it's in here but not in `open`.
    closed: ClosedList<D::PackedState>,

    params: R::Params,
    reopen: bool,
    limits: Limits,
    stats: SearchStats,

    _rank: PhantomData<R>,
}

impl<D, R, O> BestFirstSearch<D, R, O>
where
    D: Domain,
    R: BestFirstRank<D::Cost>,
    O: OpenList<R>,
{
    /// Reads `reopen`, the limits and whatever the ranking needs.
    pub fn new(domain: D, opts: &Options) -> Result<Self, ConfigError> {
        let params = R::params(opts)?;
        let reopen = opts.flag("reopen")?.unwrap_or(true);
        let limits = Limits::from_options(opts)?;

        let keys: Vec<&str> = R::KEYS.iter().copied().chain(["reopen"]).collect();
        opts.warn_unknown(R::NAME, &keys);

        Ok(Self {
            domain,
            pool: NodePool::with_limit(limits.nodes),
            open: O::default(),
            closed: ClosedList::new(),
            params,
            reopen,
            limits,
            stats: SearchStats::default(),
            _rank: PhantomData,
        })
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    #[inline(always)]
    fn rank(&self, node: &SearchNode<D>) -> R {
        R::new(node.g, node.h, node.d, &self.params)
    }

    #[inline(always)]
    fn distance(&self, s: &D::State) -> D::Cost {
        if R::NEEDS_DISTANCE {
            self.domain.distance(s)
        } else {
            D::Cost::zero()
        }
    }

    /// Allocates a node, turning exhaustion into a memory limit.
    fn construct(&mut self, node: SearchNode<D>) -> Option<NodeHandle> {
        match self.pool.construct(node) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::debug!("{}: {e}", R::NAME);
                self.stats.limit = Some(Limit::Memory);
                None
            }
        }
    }

    /// Runs the search loop, returning the goal node if one is found.
    fn find_goal(&mut self, init: &D::State, timer: &Timer) -> Option<NodeHandle> {
        #[cfg(feature = "coz_profile")]
        coz::scope!("FindGoal");

        let unit_cost = self.domain.unit_cost();

        let h = self.domain.heuristic(init);
        if !h.valid() {
            return None;
        }
        let packed = self.domain.pack(init);
        let hash = self.domain.hash(&packed);
        let root = SearchNode::root(packed.clone(), h, self.distance(init));
        let rank = self.rank(&root);
        let root = self.construct(root)?;
        self.closed.add(hash, packed, root);
        if unit_cost && self.domain.is_goal(init) {
            return Some(root);
        }
        self.open.push(&mut self.pool, root, rank);

        loop {
            if let Some(limit) = self.limits.check(&self.stats, timer) {
                self.stats.limit = Some(limit);
                return None;
            }

            let (node, _) = self.open.pop(&mut self.pool)?;

            #[cfg(feature = "coz_profile")]
            coz::scope!("NodeExpansion");

            let state = self.domain.unpack(&self.pool[node].packed);
            if self.domain.is_goal(&state) {
                #[cfg(feature = "coz_profile")]
                coz::progress!("GoalFound");
                return Some(node);
            }

            self.stats.expanded += 1;
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

                // Have we seen this State?
                if let Some(dup) = self.closed.find(hash, &packed) {
                    #[cfg(feature = "coz_profile")]
                    coz::scope!("ReachExistingNode");

                    let resident = &self.pool[dup];
                    let is_open = resident.pos.is_some();
                    if resident.g <= child_g || !(is_open || self.reopen) {
                        self.stats.duplicates += 1;
                        continue;
                    }

                    // Found a better path to an existing node
                    let resident = &mut self.pool[dup];
                    resident.reach(node, op, edge.rev_op, child_g);
                    let rank = self.rank(&self.pool[dup]);
                    if !is_open {
                        self.stats.reopened += 1;
                    }
                    self.open.push_update(&mut self.pool, dup, rank);
                    continue;
                }

                #[cfg(feature = "coz_profile")]
                coz::scope!("ReachNewNode");

                let h = self.domain.heuristic(&edge.state);
                if !h.valid() {
                    continue;
                }
                let child = SearchNode {
                    packed: packed.clone(),
                    parent: Some(node),
                    op,
                    rev_op: edge.rev_op,
                    g: child_g,
                    h,
                    d: self.distance(&edge.state),
                    pos: None,
                };
                let rank = self.rank(&child);
                let child = self.construct(child)?;
                self.closed.add(hash, packed, child);

                if unit_cost && self.domain.is_goal(&edge.state) {
                    return Some(child);
                }
                self.open.push(&mut self.pool, child, rank);
            }
        }
    }

    pub fn write_memory_stats<W: std::io::Write>(&self, mut out: W) -> std::io::Result<()> {
        use size::Size;
        use std::mem::size_of;
        use thousands::Separable;

        writeln!(out, "{} Stats:", R::NAME)?;
        let s = size_of::<SearchNode<D>>();
        let l = self.pool.len();
        let c = self.pool.capacity();
        writeln!(
            out,
            "  - |Nodes|:   {} ({})",
            l.separate_with_commas(),
            Size::from_bytes(l * s)
        )?;
        writeln!(
            out,
            "  - |Nodes|*:  {} ({})",
            c.separate_with_commas(),
            Size::from_bytes(c * s)
        )?;

        let s = size_of::<(NodeHandle, R)>();
        let l = self.open.len();
        writeln!(
            out,
            "  - |Open|:    {} ({})",
            l.separate_with_commas(),
            Size::from_bytes(l * s)
        )?;

        writeln!(
            out,
            "  - |Closed|:  {} ({})",
            self.closed.len().separate_with_commas(),
            Size::from_bytes(self.closed.memory_usage())
        )?;

        writeln!(
            out,
            "  - Expanded nodes: {}",
            self.stats.expanded.separate_with_commas()
        )?;

        Ok(())
    }
}

impl<D, R, O> Search<D> for BestFirstSearch<D, R, O>
where
    D: Domain,
    R: BestFirstRank<D::Cost>,
    O: OpenList<R>,
{
    fn search(&mut self, init: D::State) -> SearchResult<D> {
        self.reset();
        let timer = self.limits.timer();
        let goal = self.find_goal(&init, &timer);
        self.stats.wall_time = timer.elapsed();

        log::debug!(
            "{} finished after {} expansions ({:?})",
            R::NAME,
            self.stats.expanded,
            self.stats.limit
        );
        let path = match goal {
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
        self.pool.reset();
        self.stats = SearchStats::default();
    }

    fn report<W: Write>(&self, out: &mut ReportWriter<W>) -> std::io::Result<()> {
        out.pair("algorithm", R::NAME)?;
        out.pair("open list", O::KIND)?;
        out.pair("rank", debug::type_name::<R>())?;
        out.pair("node size", debug::type_size::<SearchNode<D>>())?;
        R::report_params(&self.params, out)?;
        out.pair("reopen", self.reopen)?;
        for (key, value) in self.limits.pairs() {
            out.pair(key, value)?;
        }
        out.pair("nodes allocated", self.pool.len())?;
        out.pair("closed list buckets", self.closed.buckets())
    }

    fn domain(&self) -> &D {
        &self.domain
    }
}
