use derive_more::Display;
use nonmax::NonMaxU32;
use thiserror::Error;

use crate::domain::Domain;
use crate::domain::DomainEdge;
use crate::domain::Edge;
use crate::domain::Operator;
use crate::domain::Operators;

const MAX_ELEMENTS_DISPLAYED: usize = 40;
const RANDOM_STATE_MAX_TRIES: usize = 10_000;

pub(crate) type CoordIntrinsic = u32;
pub type Coord = NonMaxU32;
pub type GridCost = u32;

/// A cell of the grid. `y` grows downwards, like the lines of the map.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
#[display("({x},{y})")]
pub struct GridState {
    pub(crate) x: Coord,
    pub(crate) y: Coord,
}

impl GridState {
    pub fn new(x: CoordIntrinsic, y: CoordIntrinsic) -> Option<GridState> {
        Some(GridState {
            x: Coord::new(x)?,
            y: Coord::new(y)?,
        })
    }

    pub fn x(&self) -> CoordIntrinsic {
        self.x.get()
    }
    pub fn y(&self) -> CoordIntrinsic {
        self.y.get()
    }
}

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum GridOp {
    #[display("↑")]
    Up, // y--
    #[display("↓")]
    Down, // y++
    #[display("←")]
    Left, // x--
    #[display("→")]
    Right, // x++
    #[display("·")]
    Nop,
}

impl Operator for GridOp {
    const NOP: Self = GridOp::Nop;
}

impl GridOp {
    pub fn reverse(&self) -> GridOp {
        match self {
            GridOp::Up => GridOp::Down,
            GridOp::Down => GridOp::Up,
            GridOp::Left => GridOp::Right,
            GridOp::Right => GridOp::Left,
            GridOp::Nop => GridOp::Nop,
        }
    }
}

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum GridCell {
    #[display("░")]
    Empty,
    #[display("█")]
    Wall,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridParseError {
    #[error("Empty input")]
    EmptyInput,
    #[error("Invalid character '{ch}' found at ({x},{y})")]
    InvalidCharacter { ch: char, x: usize, y: usize },
    #[error("Line {y} is {found} cells wide, expected {expected}")]
    Ragged {
        y: usize,
        found: usize,
        expected: usize,
    },
    #[error("Map has {0} start cells, expected exactly one")]
    Starts(usize),
    #[error("Map has {0} goal cells, expected exactly one")]
    Goals(usize),
    #[error("Map is too large")]
    TooLarge,
    #[error("I/O error when loading '{p}': {e}")]
    IOError { p: std::path::PathBuf, e: String },
}

/// Navigation on a 4-connected grid with unit costs.
///
/// Maps are text, `#` for walls, `.` or ` ` for free cells, `S` for the start
/// and `G` for the goal.
///
/// ```
/// use hsearch::domain::Domain;
/// use hsearch::problems::grid::GridDomain;
///
/// let grid = GridDomain::try_from("S.#\n..G").unwrap();
/// let start = grid.initial_state();
/// assert_eq!(grid.heuristic(&start), 3);
/// assert_eq!(grid.operators(&start).len(), 2);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct GridDomain {
    map: Vec<Vec<GridCell>>,
    start: GridState,
    goal: GridState,
}

impl GridDomain {
    /// A wall-less `width`x`height` grid from the top-left to the
    /// bottom-right corner.
    pub fn open(width: usize, height: usize) -> Result<Self, GridParseError> {
        if width == 0 || height == 0 {
            return Err(GridParseError::EmptyInput);
        }
        let corner = |x: usize, y: usize| {
            GridState::new(
                CoordIntrinsic::try_from(x).map_err(|_| GridParseError::TooLarge)?,
                CoordIntrinsic::try_from(y).map_err(|_| GridParseError::TooLarge)?,
            )
            .ok_or(GridParseError::TooLarge)
        };
        Ok(Self {
            map: vec![vec![GridCell::Empty; width]; height],
            start: corner(0, 0)?,
            goal: corner(width - 1, height - 1)?,
        })
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.map[0].len(), self.map.len())
    }

    pub fn goal(&self) -> GridState {
        self.goal
    }

    #[inline(always)]
    pub fn at(&self, state: &GridState) -> GridCell {
        self.map[state.y() as usize][state.x() as usize]
    }

    pub fn set(&mut self, x: usize, y: usize, cell: GridCell) {
        self.map[y][x] = cell;
    }

    /// Moves the start somewhere else.
    pub fn with_start(mut self, start: GridState) -> Self {
        self.start = start;
        self
    }

    pub fn random_state<R: rand::Rng>(&self, r: &mut R) -> Option<GridState> {
        let (max_x, max_y) = self.dimensions();
        for _tries in 0..RANDOM_STATE_MAX_TRIES {
            let x = r.random_range(0..max_x);
            let y = r.random_range(0..max_y);
            if self.map[y][x] == GridCell::Empty {
                return GridState::new(x as CoordIntrinsic, y as CoordIntrinsic);
            }
        }
        None
    }

    /// The cell reached by `op`, if it's on the map and not a wall.
    #[inline(always)]
    fn step(&self, state: &GridState, op: GridOp) -> Option<GridState> {
        let (max_x, max_y) = self.dimensions();
        let (x, y) = (state.x(), state.y());

        #[rustfmt::skip]
        let (x, y) = match op {
            GridOp::Up    => (x, y.checked_sub(1)?),
            GridOp::Down  => (x, y + 1),
            GridOp::Left  => (x.checked_sub(1)?, y),
            GridOp::Right => (x + 1, y),
            GridOp::Nop   => return None,
        };
        if x as usize >= max_x || y as usize >= max_y {
            return None;
        }
        let s = GridState::new(x, y)?;
        (self.at(&s) == GridCell::Empty).then_some(s)
    }
}

impl Domain for GridDomain {
    type State = GridState;
    type PackedState = GridState;
    type Operator = GridOp;
    type Cost = GridCost;

    fn initial_state(&self) -> GridState {
        self.start
    }

    #[inline(always)]
    fn is_goal(&self, s: &GridState) -> bool {
        *s == self.goal
    }

    /// The distance of following straight lines
    #[inline(always)]
    fn heuristic(&self, s: &GridState) -> GridCost {
        s.x().abs_diff(self.goal.x()) + s.y().abs_diff(self.goal.y())
    }

    #[inline(always)]
    fn distance(&self, s: &GridState) -> GridCost {
        self.heuristic(s)
    }

    fn operators(&self, s: &GridState) -> Operators<GridOp> {
        #[cfg(feature = "coz_profile")]
        coz::scope!("StateExpansion");

        [GridOp::Up, GridOp::Down, GridOp::Left, GridOp::Right]
            .into_iter()
            .filter(|op| self.step(s, *op).is_some())
            .collect()
    }

    fn apply(&self, s: &GridState, op: GridOp) -> DomainEdge<Self> {
        match self.step(s, op) {
            Some(state) => Edge {
                state,
                cost: 1,
                rev_op: op.reverse(),
                rev_cost: 1,
            },
            None => Edge {
                state: *s,
                cost: GridCost::MAX,
                rev_op: GridOp::Nop,
                rev_cost: GridCost::MAX,
            },
        }
    }

    fn pack(&self, s: &GridState) -> GridState {
        *s
    }

    fn unpack(&self, p: &GridState) -> GridState {
        *p
    }

    fn dump(&self, s: &GridState, out: &mut dyn std::fmt::Write) -> std::fmt::Result {
        for (y, line) in self.map.iter().enumerate().take(MAX_ELEMENTS_DISPLAYED) {
            for (x, cell) in line.iter().enumerate().take(MAX_ELEMENTS_DISPLAYED) {
                let here = (x as CoordIntrinsic, y as CoordIntrinsic);
                if here == (s.x(), s.y()) {
                    write!(out, "@")?;
                } else if here == (self.goal.x(), self.goal.y()) {
                    write!(out, "G")?;
                } else {
                    write!(out, "{cell}")?;
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn unit_cost(&self) -> bool {
        true
    }
}

impl TryFrom<&str> for GridDomain {
    type Error = GridParseError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let lines: Vec<&str> = s.lines().collect();
        if lines.is_empty() || lines[0].is_empty() {
            return Err(GridParseError::EmptyInput);
        }
        let max_x = lines[0].chars().count();
        if max_x >= CoordIntrinsic::MAX as usize || lines.len() >= CoordIntrinsic::MAX as usize {
            return Err(GridParseError::TooLarge);
        }

        let mut map = Vec::with_capacity(lines.len());
        let mut starts = vec![];
        let mut goals = vec![];
        for (y, line) in lines.iter().enumerate() {
            let mut row = Vec::with_capacity(max_x);
            for (x, ch) in line.chars().enumerate() {
                let here = GridState::new(x as CoordIntrinsic, y as CoordIntrinsic);
                row.push(match ch {
                    ' ' | '.' => GridCell::Empty,
                    '#' | '█' => GridCell::Wall,
                    'S' => {
                        starts.extend(here);
                        GridCell::Empty
                    }
                    'G' => {
                        goals.extend(here);
                        GridCell::Empty
                    }
                    ch => return Err(GridParseError::InvalidCharacter { ch, x, y }),
                });
            }
            if row.len() != max_x {
                return Err(GridParseError::Ragged {
                    y,
                    found: row.len(),
                    expected: max_x,
                });
            }
            map.push(row);
        }

        match (starts.as_slice(), goals.as_slice()) {
            ([start], [goal]) => Ok(Self {
                map,
                start: *start,
                goal: *goal,
            }),
            ([_], _) => Err(GridParseError::Goals(goals.len())),
            _ => Err(GridParseError::Starts(starts.len())),
        }
    }
}

impl TryFrom<&std::path::Path> for GridDomain {
    type Error = GridParseError;

    fn try_from(p: &std::path::Path) -> Result<Self, Self::Error> {
        let text = std::fs::read_to_string(p).map_err(|e| GridParseError::IOError {
            p: p.to_path_buf(),
            e: e.to_string(),
        })?;
        GridDomain::try_from(text.as_str())
    }
}

impl std::fmt::Display for GridDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let d = self.dimensions();
        writeln!(f, "Grid({}x{}) {} -> {}:", d.0, d.1, self.start, self.goal)?;
        self.dump(&self.start, f)
    }
}

impl std::fmt::Debug for GridDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Grid{:?}", self.dimensions())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rand_chacha::ChaCha8Rng;
    use rand_chacha::rand_core::SeedableRng;

    use super::*;
    use crate::cost::Cost;

    #[test]
    fn parses_maps() {
        let grid = GridDomain::try_from(indoc! {"
            S.#
            #.G
        "})
        .unwrap();
        assert_eq!(grid.dimensions(), (3, 2));
        assert_eq!(grid.initial_state(), GridState::new(0, 0).unwrap());
        assert_eq!(grid.goal(), GridState::new(2, 1).unwrap());
        assert_eq!(grid.at(&GridState::new(2, 0).unwrap()), GridCell::Wall);

        assert_eq!(
            GridDomain::try_from("S.x\n..G"),
            Err(GridParseError::InvalidCharacter { ch: 'x', x: 2, y: 0 })
        );
        assert_eq!(
            GridDomain::try_from("S..\n.G"),
            Err(GridParseError::Ragged {
                y: 1,
                found: 2,
                expected: 3
            })
        );
        assert_eq!(GridDomain::try_from("S..\n..."), Err(GridParseError::Goals(0)));
        assert_eq!(GridDomain::try_from("SS.\n..G"), Err(GridParseError::Starts(2)));
        assert_eq!(GridDomain::try_from(""), Err(GridParseError::EmptyInput));
    }

    #[test]
    fn moves_and_costs() {
        let grid = GridDomain::try_from("S.#\n#.G").unwrap();
        let s = grid.initial_state();
        assert_eq!(grid.operators(&s).as_slice(), &[GridOp::Right]);

        let e = grid.apply(&s, GridOp::Right);
        assert_eq!(e.state, GridState::new(1, 0).unwrap());
        assert_eq!((e.cost, e.rev_op, e.rev_cost), (1, GridOp::Left, 1));

        // Into a wall
        assert!(!grid.apply(&s, GridOp::Down).cost.valid());
        // Off the map
        assert!(!grid.apply(&s, GridOp::Up).cost.valid());

        let mut dump = String::new();
        grid.dump(&e.state, &mut dump).unwrap();
        assert_eq!(dump, "░@█\n█░G\n");
    }

    #[test]
    fn heuristic_is_admissible_on_wall_map() {
        let mut grid = GridDomain::open(10, 10).unwrap();
        for y in 0..9 {
            grid.set(5, y, GridCell::Wall);
        }
        let start = grid.initial_state();
        assert!(grid.heuristic(&start) <= 18);
        assert!(grid.unit_cost());
    }

    #[test]
    fn random_states_are_free() {
        let grid = GridDomain::try_from("S##\n###\n##G").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        for _ in 0..10 {
            let s = grid.random_state(&mut rng).unwrap();
            assert_eq!(grid.at(&s), GridCell::Empty);
        }
    }
}
