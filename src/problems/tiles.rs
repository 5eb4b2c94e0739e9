use derive_more::Display;
use thiserror::Error;

use crate::domain::Domain;
use crate::domain::DomainEdge;
use crate::domain::Edge;
use crate::domain::Operator;
use crate::domain::Operators;

/// Largest board, so that packed boards fit 4 bits per cell in a `u64`.
pub const MAX_TILES: usize = 16;

pub type TilesCost = u32;

/// A board. Cells past `Tiles::len()` are unused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TilesState {
    tiles: [u8; MAX_TILES],
    blank: u8,
}

impl TilesState {
    pub fn tiles(&self, n: usize) -> &[u8] {
        &self.tiles[..n]
    }

    pub fn blank(&self) -> usize {
        self.blank as usize
    }
}

/// Moves of the blank.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum TilesOp {
    #[display("U")]
    Up,
    #[display("D")]
    Down,
    #[display("L")]
    Left,
    #[display("R")]
    Right,
    #[display("-")]
    Nop,
}

impl Operator for TilesOp {
    const NOP: Self = TilesOp::Nop;
}

impl TilesOp {
    pub fn reverse(&self) -> TilesOp {
        match self {
            TilesOp::Up => TilesOp::Down,
            TilesOp::Down => TilesOp::Up,
            TilesOp::Left => TilesOp::Right,
            TilesOp::Right => TilesOp::Left,
            TilesOp::Nop => TilesOp::Nop,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TilesParseError {
    #[error("Empty input")]
    EmptyInput,
    #[error("Row {row} has {found} tiles, expected {expected}")]
    Ragged {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("Invalid tile {0:?}")]
    InvalidTile(String),
    #[error("Tiles are not a permutation of 0..{0}")]
    NotAPermutation(usize),
    #[error("{0} tiles don't fit a board of at most {MAX_TILES}")]
    TooLarge(usize),
}

/// The sliding tiles puzzle, with unit costs.
///
/// The goal has the blank (`0`) at the top-left corner and the other tiles
/// in order after it.
///
/// ```
/// use hsearch::domain::Domain;
/// use hsearch::problems::tiles::Tiles;
///
/// let tiles = Tiles::try_from("1 2 5\n3 4 8\n6 7 0").unwrap();
/// let start = tiles.initial_state();
/// assert_eq!(tiles.heuristic(&start), 4);
/// assert!(!tiles.is_goal(&start));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tiles {
    width: usize,
    height: usize,
    init: TilesState,
}

impl Tiles {
    pub fn new(width: usize, height: usize, board: &[u8]) -> Result<Self, TilesParseError> {
        let n = width * height;
        if n == 0 {
            return Err(TilesParseError::EmptyInput);
        }
        if n > MAX_TILES {
            return Err(TilesParseError::TooLarge(n));
        }
        if board.len() != n {
            return Err(TilesParseError::NotAPermutation(n));
        }
        let mut seen = [false; MAX_TILES];
        let mut tiles = [0u8; MAX_TILES];
        let mut blank = 0;
        for (i, &t) in board.iter().enumerate() {
            if t as usize >= n || seen[t as usize] {
                return Err(TilesParseError::NotAPermutation(n));
            }
            seen[t as usize] = true;
            tiles[i] = t;
            if t == 0 {
                blank = i as u8;
            }
        }
        Ok(Self {
            width,
            height,
            init: TilesState { tiles, blank },
        })
    }

    /// A puzzle that starts solved.
    pub fn solved(width: usize, height: usize) -> Result<Self, TilesParseError> {
        let board: Vec<u8> = (0..(width * height).min(MAX_TILES + 1) as u8).collect();
        Self::new(width, height, &board)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// The same puzzle starting from `init`.
    pub fn with_initial(&self, init: TilesState) -> Self {
        Self {
            init,
            ..self.clone()
        }
    }

    /// A random walk of `moves` steps from the goal, never undoing the last
    /// step.
    pub fn scramble<R: rand::Rng>(&self, rng: &mut R, moves: usize) -> TilesState {
        let mut s = self.goal();
        let mut last = TilesOp::Nop;
        for _ in 0..moves {
            let mut ops = self.operators(&s);
            if ops.len() > 1 {
                ops.retain(|op| *op != last.reverse());
            }
            if ops.is_empty() {
                break;
            }
            let op = ops[rng.random_range(0..ops.len())];
            s = self.apply(&s, op).state;
            last = op;
        }
        s
    }

    pub fn goal(&self) -> TilesState {
        let mut tiles = [0u8; MAX_TILES];
        for (i, t) in tiles.iter_mut().enumerate().take(self.len()) {
            *t = i as u8;
        }
        TilesState { tiles, blank: 0 }
    }

    #[inline(always)]
    fn manhattan(&self, tile: u8, pos: usize) -> TilesCost {
        let (x, y) = (pos % self.width, pos / self.width);
        let (gx, gy) = (tile as usize % self.width, tile as usize / self.width);
        (x.abs_diff(gx) + y.abs_diff(gy)) as TilesCost
    }

    /// Where the blank ends up after `op`.
    #[inline(always)]
    fn target(&self, blank: usize, op: TilesOp) -> Option<usize> {
        let (x, y) = (blank % self.width, blank / self.width);
        match op {
            TilesOp::Up if y > 0 => Some(blank - self.width),
            TilesOp::Down if y + 1 < self.height => Some(blank + self.width),
            TilesOp::Left if x > 0 => Some(blank - 1),
            TilesOp::Right if x + 1 < self.width => Some(blank + 1),
            _ => None,
        }
    }
}

impl Domain for Tiles {
    type State = TilesState;
    type PackedState = u64;
    type Operator = TilesOp;
    type Cost = TilesCost;

    fn initial_state(&self) -> TilesState {
        self.init
    }

    fn is_goal(&self, s: &TilesState) -> bool {
        s.blank == 0 && s.tiles(self.len()).iter().enumerate().all(|(i, t)| *t as usize == i)
    }

    /// Sum of the Manhattan distances of every tile but the blank.
    fn heuristic(&self, s: &TilesState) -> TilesCost {
        s.tiles(self.len())
            .iter()
            .enumerate()
            .filter(|(_, t)| **t != 0)
            .map(|(pos, t)| self.manhattan(*t, pos))
            .sum()
    }

    fn distance(&self, s: &TilesState) -> TilesCost {
        self.heuristic(s)
    }

    fn operators(&self, s: &TilesState) -> Operators<TilesOp> {
        [TilesOp::Up, TilesOp::Down, TilesOp::Left, TilesOp::Right]
            .into_iter()
            .filter(|op| self.target(s.blank(), *op).is_some())
            .collect()
    }

    fn apply(&self, s: &TilesState, op: TilesOp) -> DomainEdge<Self> {
        match self.target(s.blank(), op) {
            Some(to) => {
                let mut next = *s;
                next.tiles.swap(s.blank(), to);
                next.blank = to as u8;
                Edge {
                    state: next,
                    cost: 1,
                    rev_op: op.reverse(),
                    rev_cost: 1,
                }
            }
            None => Edge {
                state: *s,
                cost: TilesCost::MAX,
                rev_op: TilesOp::Nop,
                rev_cost: TilesCost::MAX,
            },
        }
    }

    fn pack(&self, s: &TilesState) -> u64 {
        s.tiles(self.len())
            .iter()
            .enumerate()
            .fold(0u64, |p, (i, t)| p | ((*t as u64) << (4 * i)))
    }

    fn unpack(&self, p: &u64) -> TilesState {
        let mut s = TilesState {
            tiles: [0; MAX_TILES],
            blank: 0,
        };
        for i in 0..self.len() {
            let t = ((p >> (4 * i)) & 0xF) as u8;
            s.tiles[i] = t;
            if t == 0 {
                s.blank = i as u8;
            }
        }
        s
    }

    fn dump(&self, s: &TilesState, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        for row in s.tiles(self.len()).chunks(self.width) {
            let row: Vec<String> = row.iter().map(|t| format!("{t:2}")).collect();
            writeln!(out, "{}", row.join(" "))?;
        }
        Ok(())
    }

    fn unit_cost(&self) -> bool {
        true
    }
}

impl TryFrom<&str> for Tiles {
    type Error = TilesParseError;

    /// Reads whitespace separated tiles, one row per line.
    ///
    /// A single line is read as a square board.
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let rows: Vec<Vec<&str>> = s
            .lines()
            .map(|l| l.split_whitespace().collect::<Vec<_>>())
            .filter(|r| !r.is_empty())
            .collect();
        let Some(first) = rows.first() else {
            return Err(TilesParseError::EmptyInput);
        };

        let (width, height) = if rows.len() == 1 {
            let side = (first.len() as f64).sqrt().round() as usize;
            if side * side != first.len() {
                return Err(TilesParseError::Ragged {
                    row: 0,
                    found: first.len(),
                    expected: side * side,
                });
            }
            (side, side)
        } else {
            (first.len(), rows.len())
        };
        if rows.len() > 1 {
            if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
                return Err(TilesParseError::Ragged {
                    row,
                    found: r.len(),
                    expected: width,
                });
            }
        }

        let board = rows
            .iter()
            .flatten()
            .map(|t| {
                t.parse::<u8>()
                    .map_err(|_| TilesParseError::InvalidTile(t.to_string()))
            })
            .collect::<Result<Vec<u8>, _>>()?;
        Tiles::new(width, height, &board)
    }
}
