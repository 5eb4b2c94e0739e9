//! An explicit weighted graph with a tabulated heuristic.
//!
//! Handy to build small search spaces with exactly the edge costs and
//! heuristic values a test needs, including inconsistent heuristics, dead
//! ends and directed edges.

use crate::domain::Domain;
use crate::domain::DomainEdge;
use crate::domain::Edge;
use crate::domain::Operator;
use crate::domain::Operators;

pub type Vertex = u32;
pub type GraphCost = u32;

/// Operators are the target vertices. `Vertex::MAX` is the "no operator".
impl Operator for Vertex {
    const NOP: Self = Vertex::MAX;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphDomain {
    /// Sorted `(target, cost)` out-edges of every vertex.
    edges: Vec<Vec<(Vertex, GraphCost)>>,
    h: Vec<GraphCost>,
    d: Vec<GraphCost>,
    goals: Vec<bool>,
    start: Vertex,
}

#[derive(Clone, Debug)]
pub struct GraphBuilder {
    graph: GraphDomain,
}

impl GraphBuilder {
    /// A directed edge. Parallel edges keep the cheapest cost.
    pub fn edge(mut self, from: Vertex, to: Vertex, cost: GraphCost) -> Self {
        let out = &mut self.graph.edges[from as usize];
        match out.binary_search_by_key(&to, |(t, _)| *t) {
            Ok(i) => out[i].1 = out[i].1.min(cost),
            Err(i) => out.insert(i, (to, cost)),
        }
        self
    }

    /// Edges both ways with the same cost.
    pub fn undirected(self, a: Vertex, b: Vertex, cost: GraphCost) -> Self {
        self.edge(a, b, cost).edge(b, a, cost)
    }

    /// Sets the heuristic (and distance) estimate of `v`.
    pub fn h(mut self, v: Vertex, h: GraphCost) -> Self {
        self.graph.h[v as usize] = h;
        self.graph.d[v as usize] = h;
        self
    }

    pub fn goal(mut self, v: Vertex) -> Self {
        self.graph.goals[v as usize] = true;
        self
    }

    pub fn start(mut self, v: Vertex) -> Self {
        self.graph.start = v;
        self
    }

    pub fn build(self) -> GraphDomain {
        self.graph
    }
}

impl GraphDomain {
    /// A graph on vertices `0..n`, starting at `0`, without edges, goals or
    /// heuristic.
    pub fn builder(n: usize) -> GraphBuilder {
        GraphBuilder {
            graph: GraphDomain {
                edges: vec![vec![]; n],
                h: vec![0; n],
                d: vec![0; n],
                goals: vec![false; n],
                start: 0,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    fn cost(&self, from: Vertex, to: Vertex) -> Option<GraphCost> {
        let out = &self.edges[from as usize];
        out.binary_search_by_key(&to, |(t, _)| *t)
            .ok()
            .map(|i| out[i].1)
    }

    /// True optimal cost to a goal from every vertex (`None` if there's no
    /// path), by Dijkstra over reversed edges.
    pub fn optimal_costs(&self) -> Vec<Option<GraphCost>> {
        use std::cmp::Reverse;
        use std::collections::BinaryHeap;

        let mut rev: Vec<Vec<(Vertex, GraphCost)>> = vec![vec![]; self.len()];
        for (from, out) in self.edges.iter().enumerate() {
            for (to, c) in out {
                rev[*to as usize].push((from as Vertex, *c));
            }
        }

        let mut best = vec![None; self.len()];
        let mut heap: BinaryHeap<Reverse<(GraphCost, Vertex)>> = self
            .goals
            .iter()
            .enumerate()
            .filter(|(_, g)| **g)
            .map(|(v, _)| Reverse((0, v as Vertex)))
            .collect();
        while let Some(Reverse((c, v))) = heap.pop() {
            if best[v as usize].is_some() {
                continue;
            }
            best[v as usize] = Some(c);
            for (u, w) in &rev[v as usize] {
                if best[*u as usize].is_none() {
                    heap.push(Reverse((c.saturating_add(*w), *u)));
                }
            }
        }
        best
    }
}

impl Domain for GraphDomain {
    type State = Vertex;
    type PackedState = Vertex;
    type Operator = Vertex;
    type Cost = GraphCost;

    fn initial_state(&self) -> Vertex {
        self.start
    }

    fn is_goal(&self, s: &Vertex) -> bool {
        self.goals[*s as usize]
    }

    fn heuristic(&self, s: &Vertex) -> GraphCost {
        self.h[*s as usize]
    }

    fn distance(&self, s: &Vertex) -> GraphCost {
        self.d[*s as usize]
    }

    fn operators(&self, s: &Vertex) -> Operators<Vertex> {
        self.edges[*s as usize].iter().map(|(t, _)| *t).collect()
    }

    fn apply(&self, s: &Vertex, op: Vertex) -> DomainEdge<Self> {
        match self.cost(*s, op) {
            Some(cost) => {
                let back = self.cost(op, *s);
                Edge {
                    state: op,
                    cost,
                    rev_op: back.map_or(Vertex::NOP, |_| *s),
                    rev_cost: back.unwrap_or(GraphCost::MAX),
                }
            }
            None => Edge {
                state: *s,
                cost: GraphCost::MAX,
                rev_op: Vertex::NOP,
                rev_cost: GraphCost::MAX,
            },
        }
    }

    fn pack(&self, s: &Vertex) -> Vertex {
        *s
    }

    fn unpack(&self, p: &Vertex) -> Vertex {
        *p
    }
}
