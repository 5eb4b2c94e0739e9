use std::fmt::Debug;
use std::hash::Hash;
use std::hash::Hasher;

use num_traits::SaturatingAdd;
use num_traits::Zero;
use rustc_hash::FxHasher;
use smallvec::SmallVec;

use crate::cost::Cost;

const MAX_ELEMENTS_DISPLAYED: usize = 20;

/// An action applicable on some State.
///
/// `NOP` is the "no operator" value, used for roots and for directed edges
/// that can't be undone.
pub trait Operator: Copy + Clone + Debug + PartialEq + Eq {
    const NOP: Self;
}

/// Operators applicable on a State.
pub type Operators<O> = SmallVec<[O; 8]>;

/// The outcome of applying an Operator on a State.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge<S, O, C> {
    /// The State reached.
    pub state: S,
    /// Cost of the Operator. `Cost::infinity()` means there's no such edge.
    pub cost: C,
    /// The Operator undoing this edge, `Operator::NOP` if there's none.
    pub rev_op: O,
    /// Cost of undoing this edge.
    pub rev_cost: C,
}

pub type DomainEdge<D> =
    Edge<<D as Domain>::State, <D as Domain>::Operator, <D as Domain>::Cost>;
pub type DomainPath<D> =
    Path<<D as Domain>::State, <D as Domain>::Operator, <D as Domain>::Cost>;

/// A search space definition.
///
/// Every algorithm is generic over this trait. Implementations are expected
/// to be pure functions of their inputs, and packing must be a bijection up
/// to semantic equality of States. Neither property is checked.
pub trait Domain: Debug {
    /// Working representation used while expanding.
    type State: Clone + Debug;
    /// Compact key used for duplicate detection.
    type PackedState: Clone + Debug + PartialEq + Eq + Hash;
    type Operator: Operator;
    type Cost: Cost;

    fn initial_state(&self) -> Self::State;
    fn is_goal(&self, s: &Self::State) -> bool;

    /// An estimate of the cost to reach a goal.
    fn heuristic(&self, s: &Self::State) -> Self::Cost;
    /// An estimate of the number of steps needed to reach a goal.
    fn distance(&self, s: &Self::State) -> Self::Cost;

    /// Operators applicable on `s`. May be empty on dead ends.
    fn operators(&self, s: &Self::State) -> Operators<Self::Operator>;
    fn apply(&self, s: &Self::State, op: Self::Operator) -> DomainEdge<Self>;

    fn pack(&self, s: &Self::State) -> Self::PackedState;
    fn unpack(&self, p: &Self::PackedState) -> Self::State;

    fn hash(&self, p: &Self::PackedState) -> u64 {
        let mut hasher = FxHasher::default();
        p.hash(&mut hasher);
        hasher.finish()
    }

    /// Writes a human-readable rendition of `s`.
    fn dump(&self, s: &Self::State, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        write!(out, "{s:?}")
    }

    /// Whether every edge costs exactly one.
    ///
    /// Allows recognising goals when they are generated rather than when
    /// they are expanded.
    fn unit_cost(&self) -> bool {
        false
    }
}

/// Replays `ops` from `start`, returning the final State and total cost.
///
/// Fails when an operator is not applicable or leads through a missing edge.
pub fn validate_path<D: Domain>(
    domain: &D,
    start: &D::State,
    ops: &[D::Operator],
) -> Option<(D::State, D::Cost)> {
    let mut state = start.clone();
    let mut cost = D::Cost::zero();
    for op in ops {
        if !domain.operators(&state).contains(op) {
            return None;
        }
        let edge = domain.apply(&state, *op);
        if !edge.cost.valid() {
            return None;
        }
        cost = cost.saturating_add(&edge.cost);
        state = edge.state;
    }
    Some((state, cost))
}

/// A sequence of States joined by Operators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path<S, O, C> {
    pub states: Vec<S>,
    pub ops: Vec<O>,
    pub cost: C,
}

impl<S, O, C> Path<S, O, C>
where
    S: Clone + Debug,
    O: Operator,
    C: Cost,
{
    #[inline(always)]
    pub fn empty() -> Self {
        Self {
            states: vec![],
            ops: vec![],
            cost: C::zero(),
        }
    }

    #[inline(always)]
    pub fn new_from_start(start: S) -> Self {
        Self {
            states: vec![start],
            ops: vec![],
            cost: C::zero(),
        }
    }

    /// Whether there's no path at all.
    ///
    /// A path that starts on a goal has a single State and isn't empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The number of Operators.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn start(&self) -> Option<&S> {
        self.states.first()
    }
    pub fn end(&self) -> Option<&S> {
        self.states.last()
    }

    #[inline(always)]
    pub fn append(&mut self, op: O, s: S, c: C) {
        debug_assert!(!self.states.is_empty());
        self.ops.push(op);
        self.states.push(s);
        self.cost = self.cost.saturating_add(&c);
    }

    /// Appends a Path starting where this one ends.
    pub fn extend(&mut self, other: Path<S, O, C>) {
        if self.states.is_empty() {
            *self = other;
            return;
        }
        debug_assert_eq!(other.states.len(), other.ops.len() + 1);
        self.states.extend(other.states.into_iter().skip(1));
        self.ops.extend(other.ops);
        self.cost = self.cost.saturating_add(&other.cost);
    }
}

impl<S, O, C> std::fmt::Display for Path<S, O, C>
where
    S: Clone + Debug,
    O: Operator,
    C: Cost,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => write!(
                f,
                "Path({}, {:?}:{:?}:{:?})",
                self.cost,
                start,
                self.ops
                    .iter()
                    .take(MAX_ELEMENTS_DISPLAYED)
                    .collect::<Vec<_>>(),
                end
            ),
            _ => write!(f, "Path()"),
        }
    }
}
