use std::ops::BitOr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub use cell::*;
pub use error::*;
pub use placement::*;
pub use session::*;
pub use types::*;

mod cell;
mod error;
mod placement;
mod session;
mod types;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub size: RowCol,
    pub mines: CellCount,
}

impl GameConfig {
    pub const fn new_unchecked(size: RowCol, mines: CellCount) -> Self {
        Self { size, mines }
    }

    /// Clamps dimensions to at least 1x1 and the mine count to
    /// `(rows - 1) * (cols - 1)` so the board never saturates with mines.
    pub fn new((rows, cols): RowCol, mines: CellCount) -> Self {
        let rows = rows.clamp(1, Coord::MAX);
        let cols = cols.clamp(1, Coord::MAX);
        let mines = mines.min(mult(rows - 1, cols - 1));
        Self::new_unchecked((rows, cols), mines)
    }

    pub const fn beginner() -> Self {
        Self::new_unchecked((9, 9), 10)
    }

    pub const fn intermediate() -> Self {
        Self::new_unchecked((16, 16), 40)
    }

    pub const fn expert() -> Self {
        Self::new_unchecked((16, 30), 99)
    }

    pub const fn rows(&self) -> Coord {
        self.size.0
    }

    pub const fn cols(&self) -> Coord {
        self.size.1
    }

    pub const fn total_squares(&self) -> CellCount {
        mult(self.size.0, self.size.1)
    }

    pub const fn safe_squares(&self) -> CellCount {
        self.total_squares() - self.mines
    }
}

/// Mine occupancy mask. Out-of-range coordinates never fail: reads report
/// "no mine" and writes are dropped, so neighbor scans may walk one step
/// past the edges without checking bounds first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    mines: Array2<bool>,
}

impl Board {
    pub fn new(size: RowCol) -> Self {
        Self {
            mines: Array2::default(size.to_nd_index()),
        }
    }

    pub fn from_mine_coords(size: RowCol, mine_coords: &[RowCol]) -> Result<Self> {
        let mut board = Self::new(size);

        for &coords in mine_coords {
            if !board.is_valid_cell(coords) {
                return Err(GameError::InvalidCoords);
            }
            board.mines[coords.to_nd_index()] = true;
        }

        Ok(board)
    }

    pub fn size(&self) -> RowCol {
        let dim = self.mines.dim();
        (dim.0.try_into().unwrap(), dim.1.try_into().unwrap())
    }

    pub fn is_valid_cell(&self, (row, col): RowCol) -> bool {
        let (rows, cols) = self.size();
        row < rows && col < cols
    }

    pub fn get_cell(&self, coords: RowCol) -> bool {
        self.is_valid_cell(coords) && self.mines[coords.to_nd_index()]
    }

    /// Stores `value` and returns the previous value, or `false` without
    /// mutating anything when the coordinates are out of range.
    pub fn set_cell(&mut self, coords: RowCol, value: bool) -> bool {
        if !self.is_valid_cell(coords) {
            return false;
        }
        std::mem::replace(&mut self.mines[coords.to_nd_index()], value)
    }

    pub fn clear(&mut self) {
        self.mines.fill(false);
    }

    pub fn total_squares(&self) -> CellCount {
        self.mines.len().try_into().unwrap()
    }

    pub fn mine_count(&self) -> CellCount {
        self.mines
            .iter()
            .filter(|&&mine| mine)
            .count()
            .try_into()
            .unwrap()
    }

    pub fn adjacent_mines(&self, coords: RowCol) -> u8 {
        self.mines
            .iter_neighbors(coords)
            .filter(|&pos| self.get_cell(pos))
            .count()
            .try_into()
            .unwrap()
    }

    pub(crate) fn iter_neighbors(&self, coords: RowCol) -> NeighborIter {
        self.mines.iter_neighbors(coords)
    }
}

/// Per-cell mine-neighbor counts, derived in one pass once mines are placed.
/// Mine cells hold `-1`; every other cell holds its clipped Moore-neighborhood
/// mine count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighborCounts {
    counts: Array2<i8>,
}

impl NeighborCounts {
    /// Placeholder used before placement; not meaningful until [`derive`]
    /// replaces it.
    ///
    /// [`derive`]: NeighborCounts::derive
    pub(crate) fn zeroed(size: RowCol) -> Self {
        Self {
            counts: Array2::default(size.to_nd_index()),
        }
    }

    pub fn derive(board: &Board) -> Self {
        let (rows, cols) = board.size();
        let mut counts: Array2<i8> = Array2::default([rows as usize, cols as usize]);

        for row in 0..rows {
            for col in 0..cols {
                let coords = (row, col);
                counts[coords.to_nd_index()] = if board.get_cell(coords) {
                    -1
                } else {
                    board.adjacent_mines(coords) as i8
                };
            }
        }

        Self { counts }
    }

    /// Count for a cell, `0` when the coordinates are out of range.
    pub fn get(&self, coords: RowCol) -> i8 {
        let dim = self.counts.dim();
        if (coords.0 as usize) < dim.0 && (coords.1 as usize) < dim.1 {
            self.counts[coords.to_nd_index()]
        } else {
            0
        }
    }
}

/// Outcome of toggling a flag
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FlagOutcome {
    NoChange,
    Toggled,
}

impl FlagOutcome {
    /// Whether this outcome could have caused an update to the game
    pub const fn has_update(self) -> bool {
        match self {
            Self::NoChange => false,
            Self::Toggled => true,
        }
    }
}

/// Outcome of revealing one or more cells
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RevealOutcome {
    NoChange,
    Revealed,
    Exploded,
    Won,
}

impl RevealOutcome {
    /// Whether this outcome could have caused an update to the game
    pub const fn has_update(self) -> bool {
        use RevealOutcome::*;
        match self {
            NoChange => false,
            Revealed => true,
            Exploded => true,
            Won => true,
        }
    }
}

/// Used to merge outcomes when a chord reveals several neighbors
impl BitOr for RevealOutcome {
    type Output = RevealOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        use RevealOutcome::*;
        match (self, rhs) {
            // explosion has priority
            (Exploded, _) => Exploded,
            (_, Exploded) => Exploded,
            // then winning
            (Won, _) => Won,
            (_, Won) => Won,
            // then plain reveals
            (Revealed, _) => Revealed,
            (_, Revealed) => Revealed,
            // and no-change only with both
            (NoChange, NoChange) => NoChange,
        }
    }
}
