use std::collections::{HashSet, VecDeque};
use std::ops::BitOr;

use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{RngExt, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::*;

/// Valid transitions:
/// - InProgress -> Won
/// - InProgress -> Lost
///
/// Both end states are terminal; only [`GameSession::reset`] re-enters
/// `InProgress`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    InProgress,
    Won,
    Lost,
}

impl Outcome {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl Default for Outcome {
    fn default() -> Self {
        Self::InProgress
    }
}

/// A single game from first reveal to win or loss. Mines are placed lazily on
/// the first reveal so that reveal can never explode; everything the session
/// exposes is pure state, with rendering, input mapping, and timekeeping left
/// to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    config: GameConfig,
    board: Board,
    counts: NeighborCounts,
    grid: Array2<CellState>,
    opened: CellCount,
    flags: CellCount,
    started: bool,
    outcome: Outcome,
    seed: u64,
    prepared: bool,
}

impl GameSession {
    pub fn new(config: GameConfig) -> Self {
        Self::with_seed(config, rand::rng().random())
    }

    pub fn with_seed(config: GameConfig, seed: u64) -> Self {
        let config = GameConfig::new(config.size, config.mines);
        Self {
            board: Board::new(config.size),
            counts: NeighborCounts::zeroed(config.size),
            grid: Array2::default(config.size.to_nd_index()),
            opened: 0,
            flags: 0,
            started: false,
            outcome: Outcome::InProgress,
            seed,
            prepared: false,
            config,
        }
    }

    /// Builds a session over an explicit mine layout. Lazy placement is
    /// skipped, so the first reveal carries no safety guarantee.
    pub fn with_board(board: Board) -> Self {
        let config = GameConfig::new_unchecked(board.size(), board.mine_count());
        let counts = NeighborCounts::derive(&board);
        Self {
            grid: Array2::default(config.size.to_nd_index()),
            opened: 0,
            flags: 0,
            started: false,
            outcome: Outcome::InProgress,
            seed: 0,
            prepared: true,
            config,
            board,
            counts,
        }
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    pub fn size(&self) -> RowCol {
        self.config.size
    }

    pub fn rows(&self) -> Coord {
        self.config.rows()
    }

    pub fn cols(&self) -> Coord {
        self.config.cols()
    }

    pub fn mine_count(&self) -> CellCount {
        self.config.mines
    }

    pub fn total_squares(&self) -> CellCount {
        self.config.total_squares()
    }

    pub fn opened_count(&self) -> CellCount {
        self.opened
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn is_valid_cell(&self, coords: RowCol) -> bool {
        self.board.is_valid_cell(coords)
    }

    /// Whether the cell hides a mine; only meaningful to show after a loss.
    pub fn is_mine(&self, coords: RowCol) -> bool {
        self.board.get_cell(coords)
    }

    /// Mine-neighbor count of a cell, `-1` for mines. Zero until mines have
    /// been placed, and for out-of-range coordinates.
    pub fn neighbor_count(&self, coords: RowCol) -> i8 {
        self.counts.get(coords)
    }

    pub fn cell_state(&self, coords: RowCol) -> CellState {
        if self.is_valid_cell(coords) {
            self.grid[coords.to_nd_index()]
        } else {
            CellState::Hidden
        }
    }

    pub fn is_visited(&self, coords: RowCol) -> bool {
        self.cell_state(coords).is_revealed()
    }

    pub fn is_flagged(&self, coords: RowCol) -> bool {
        self.cell_state(coords).is_flagged()
    }

    /// Mine count minus placed flags. Goes negative on over-flagging; any
    /// display floor is the caller's choice.
    pub fn mines_remaining(&self) -> isize {
        self.config.mines as isize - self.flags as isize
    }

    /// Reveals a cell, flood-filling across zero-count regions. The first
    /// reveal of a session triggers mine placement that excludes the revealed
    /// cell.
    pub fn reveal(&mut self, coords: RowCol) -> RevealOutcome {
        if !self.started {
            self.place_mines(coords);
            self.started = true;
        }
        self.reveal_cell(coords)
    }

    /// Flags or unflags a hidden cell.
    pub fn toggle_flag(&mut self, coords: RowCol) -> FlagOutcome {
        use CellState::*;
        use FlagOutcome::*;

        if self.outcome.is_terminal() || !self.is_valid_cell(coords) {
            return NoChange;
        }

        match self.grid[coords.to_nd_index()] {
            Hidden => {
                self.grid[coords.to_nd_index()] = Flagged;
                self.flags += 1;
                Toggled
            }
            Flagged => {
                self.grid[coords.to_nd_index()] = Hidden;
                self.flags -= 1;
                Toggled
            }
            Revealed => NoChange,
        }
    }

    /// The both-button fast reveal: when a revealed cell has exactly as many
    /// flagged neighbors as its count, every other hidden neighbor is
    /// revealed. A misplaced flag makes this lose the game.
    pub fn chord_reveal(&mut self, coords: RowCol) -> RevealOutcome {
        use RevealOutcome::*;

        if self.outcome.is_terminal() || !self.is_valid_cell(coords) {
            return NoChange;
        }
        if !self.grid[coords.to_nd_index()].is_revealed() {
            return NoChange;
        }
        if self.counts.get(coords) != self.flagged_neighbors(coords) as i8 {
            return NoChange;
        }

        self.neighbors(coords)
            .map(|pos| self.reveal_cell(pos))
            .reduce(BitOr::bitor)
            .unwrap_or(NoChange)
    }

    /// Clears the board and re-enters a fresh in-progress game with the same
    /// dimensions and mine count; mines are placed anew on the next reveal.
    pub fn reset(&mut self) {
        self.board.clear();
        self.counts = NeighborCounts::zeroed(self.config.size);
        self.grid = Array2::default(self.config.size.to_nd_index());
        self.opened = 0;
        self.flags = 0;
        self.started = false;
        self.outcome = Outcome::InProgress;
        self.prepared = false;
        // rechain the seed so the next game gets a fresh layout while seeded
        // sessions stay deterministic
        self.seed = SmallRng::seed_from_u64(self.seed).random();
    }

    fn place_mines(&mut self, safe: RowCol) {
        if self.prepared {
            return;
        }
        self.board = RandomPlacer::new(self.seed).place(self.config, safe);
        self.counts = NeighborCounts::derive(&self.board);
        log::debug!("game started at {:?}", safe);
    }

    fn reveal_cell(&mut self, coords: RowCol) -> RevealOutcome {
        use RevealOutcome::*;

        if self.outcome.is_terminal() || !self.is_valid_cell(coords) {
            return NoChange;
        }
        if self.grid[coords.to_nd_index()] != CellState::Hidden {
            return NoChange;
        }

        self.grid[coords.to_nd_index()] = CellState::Revealed;

        if self.board.get_cell(coords) {
            log::debug!("mine hit at {:?}", coords);
            self.outcome = Outcome::Lost;
            return Exploded;
        }

        self.opened += 1;
        let count = self.counts.get(coords);
        log::trace!("opened {:?}, neighbor count {}", coords, count);

        if count == 0 {
            self.flood_from(coords);
        }

        if self.opened == self.config.safe_squares() {
            log::debug!("all safe squares opened");
            self.outcome = Outcome::Won;
            Won
        } else {
            Revealed
        }
    }

    /// Work-list flood fill across the zero-count region plus its bordering
    /// non-zero cells. The visited guard runs before enqueueing so each cell
    /// enters the queue at most once.
    fn flood_from(&mut self, start: RowCol) {
        let mut visited = HashSet::from([start]);
        let mut to_visit: VecDeque<_> = self
            .neighbors(start)
            .filter(|&pos| self.grid[pos.to_nd_index()] == CellState::Hidden)
            .collect();
        log::trace!("flood fill from {:?}, initial neighbors: {:?}", start, to_visit);

        while let Some(coords) = to_visit.pop_front() {
            if !visited.insert(coords) {
                continue;
            }

            // skip flagged or already opened cells
            if self.grid[coords.to_nd_index()] != CellState::Hidden {
                continue;
            }

            self.grid[coords.to_nd_index()] = CellState::Revealed;
            self.opened += 1;

            let count = self.counts.get(coords);
            log::trace!("flood opened {:?}, neighbor count {}", coords, count);

            // a zero cell borders no mines, so its neighbors open too
            if count == 0 {
                to_visit.extend(
                    self.neighbors(coords)
                        .filter(|&pos| self.grid[pos.to_nd_index()] == CellState::Hidden)
                        .filter(|pos| !visited.contains(pos)),
                );
            }
        }
    }

    fn flagged_neighbors(&self, coords: RowCol) -> u8 {
        self.neighbors(coords)
            .filter(|&pos| self.grid[pos.to_nd_index()] == CellState::Flagged)
            .count()
            .try_into()
            .unwrap()
    }

    fn neighbors(&self, coords: RowCol) -> NeighborIter {
        self.board.iter_neighbors(coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(size: RowCol, mines: &[RowCol]) -> GameSession {
        GameSession::with_board(Board::from_mine_coords(size, mines).unwrap())
    }

    #[test]
    fn reveal_hits_mine_and_ends_game() {
        let mut game = prepared((2, 2), &[(0, 0)]);

        assert_eq!(game.reveal((0, 0)), RevealOutcome::Exploded);
        assert_eq!(game.outcome(), Outcome::Lost);
        assert!(game.is_visited((0, 0)));
        assert_eq!(game.opened_count(), 0);
    }

    #[test]
    fn first_reveal_is_never_a_mine() {
        for seed in 0..64 {
            let mut game = GameSession::with_seed(GameConfig::new((4, 4), 9), seed);

            assert_ne!(game.reveal((2, 1)), RevealOutcome::Exploded, "seed {seed}");
            assert!(!game.is_mine((2, 1)), "seed {seed}");
        }
    }

    #[test]
    fn lazy_placement_matches_configured_mine_count() {
        let mut game = GameSession::with_seed(GameConfig::new((2, 3), 5), 11);
        game.reveal((1, 1));

        let mut mines = 0;
        for row in 0..2 {
            for col in 0..3 {
                mines += u16::from(game.is_mine((row, col)));
            }
        }
        // clamped to (rows - 1) * (cols - 1)
        assert_eq!(mines, 2);
        assert_eq!(game.mine_count(), 2);
    }

    #[test]
    fn equal_seeds_play_identical_games() {
        let config = GameConfig::beginner();
        let mut first = GameSession::with_seed(config, 99);
        let mut second = GameSession::with_seed(config, 99);

        first.reveal((4, 4));
        second.reveal((4, 4));

        assert_eq!(first, second);
    }

    #[test]
    fn neighbor_counts_follow_the_fixed_layout() {
        let mut game = prepared((2, 3), &[(0, 0)]);
        game.reveal((1, 1));

        assert_eq!(game.neighbor_count((0, 0)), -1);
        assert_eq!(game.neighbor_count((0, 1)), 1);
        assert_eq!(game.neighbor_count((1, 0)), 1);
        assert_eq!(game.neighbor_count((1, 1)), 1);
        assert_eq!(game.neighbor_count((0, 2)), 0);
        assert_eq!(game.neighbor_count((1, 2)), 0);
    }

    #[test]
    fn flood_fill_opens_zero_region_and_its_border() {
        let mut game = prepared((2, 3), &[(0, 0)]);

        assert_eq!(game.reveal((0, 2)), RevealOutcome::Revealed);

        // the zero region and its bordering count-1 cells
        assert!(game.is_visited((0, 2)));
        assert!(game.is_visited((1, 2)));
        assert!(game.is_visited((0, 1)));
        assert!(game.is_visited((1, 1)));
        // the mine and the left column cell beyond the border stay hidden
        assert!(!game.is_visited((0, 0)));
        assert!(!game.is_visited((1, 0)));
        assert_eq!(game.opened_count(), 4);
        assert_eq!(game.outcome(), Outcome::InProgress);

        assert_eq!(game.reveal((1, 0)), RevealOutcome::Won);
    }

    #[test]
    fn flood_fill_never_opens_flagged_cells() {
        let mut game = prepared((3, 3), &[(2, 2)]);

        game.toggle_flag((0, 1));
        assert_eq!(game.reveal((0, 0)), RevealOutcome::Revealed);

        assert!(game.is_flagged((0, 1)));
        assert!(!game.is_visited((0, 1)));
        // the flag also cuts off the zero-path to the right column
        assert!(!game.is_visited((0, 2)));
        assert!(!game.is_visited((1, 2)));
        assert_eq!(game.opened_count(), 5);

        game.toggle_flag((0, 1));
        assert_eq!(game.reveal((0, 1)), RevealOutcome::Won);
    }

    #[test]
    fn win_when_all_safe_squares_open() {
        let mut game = prepared((2, 1), &[(0, 0)]);

        assert_eq!(game.reveal((1, 0)), RevealOutcome::Won);
        assert_eq!(game.outcome(), Outcome::Won);
        assert_eq!(game.opened_count(), 1);
    }

    #[test]
    fn chord_reveal_opens_unflagged_neighbors() {
        let mut game = prepared((3, 3), &[(0, 1), (2, 1)]);

        game.reveal((1, 1));
        game.toggle_flag((0, 1));
        game.toggle_flag((2, 1));

        assert_eq!(game.chord_reveal((1, 1)), RevealOutcome::Won);
        assert!(game.is_visited((1, 0)));
        assert!(game.is_visited((1, 2)));
        assert!(!game.is_visited((0, 1)));
    }

    #[test]
    fn chord_reveal_requires_matching_flag_count() {
        let mut game = prepared((3, 3), &[(0, 1), (2, 1)]);

        game.reveal((1, 1));
        game.toggle_flag((0, 1));
        let before = game.clone();

        assert_eq!(game.chord_reveal((1, 1)), RevealOutcome::NoChange);
        assert_eq!(game, before);
    }

    #[test]
    fn chord_reveal_explodes_on_misplaced_flag() {
        let mut game = prepared((3, 3), &[(0, 0)]);

        game.reveal((1, 1));
        game.toggle_flag((0, 1));

        assert_eq!(game.chord_reveal((1, 1)), RevealOutcome::Exploded);
        assert_eq!(game.outcome(), Outcome::Lost);
        assert!(game.is_flagged((0, 1)));
        assert!(game.is_visited((0, 0)));
    }

    #[test]
    fn chord_reveal_ignores_hidden_targets() {
        let mut game = prepared((3, 3), &[(0, 0)]);
        game.reveal((2, 2));

        assert_eq!(game.chord_reveal((1, 1)), RevealOutcome::NoChange);
    }

    #[test]
    fn toggle_flag_is_self_inverse() {
        let mut game = prepared((2, 2), &[(0, 0)]);
        assert_eq!(game.mines_remaining(), 1);

        assert_eq!(game.toggle_flag((0, 1)), FlagOutcome::Toggled);
        assert!(game.is_flagged((0, 1)));
        assert_eq!(game.mines_remaining(), 0);

        assert_eq!(game.toggle_flag((0, 1)), FlagOutcome::Toggled);
        assert!(!game.is_flagged((0, 1)));
        assert_eq!(game.mines_remaining(), 1);
    }

    #[test]
    fn over_flagging_drives_the_counter_negative() {
        let mut game = prepared((2, 2), &[(0, 0)]);

        game.toggle_flag((0, 1));
        game.toggle_flag((1, 0));
        game.toggle_flag((1, 1));

        assert_eq!(game.mines_remaining(), -2);
    }

    #[test]
    fn flagged_cells_cannot_be_revealed() {
        let mut game = prepared((2, 2), &[(0, 0)]);

        game.toggle_flag((1, 1));
        assert_eq!(game.reveal((1, 1)), RevealOutcome::NoChange);
        assert!(!game.is_visited((1, 1)));
    }

    #[test]
    fn revealed_cells_cannot_be_flagged() {
        let mut game = prepared((2, 2), &[(0, 0)]);

        game.reveal((1, 1));
        assert_eq!(game.toggle_flag((1, 1)), FlagOutcome::NoChange);
        assert!(!game.is_flagged((1, 1)));
    }

    #[test]
    fn terminal_outcome_freezes_all_state() {
        let mut game = prepared((2, 2), &[(0, 0)]);
        game.reveal((0, 0));
        let lost = game.clone();

        assert_eq!(game.reveal((1, 1)), RevealOutcome::NoChange);
        assert_eq!(game.toggle_flag((1, 0)), FlagOutcome::NoChange);
        assert_eq!(game.chord_reveal((0, 0)), RevealOutcome::NoChange);
        assert_eq!(game, lost);
    }

    #[test]
    fn out_of_range_coordinates_are_absorbed() {
        let mut game = prepared((2, 2), &[(0, 0)]);

        assert_eq!(game.reveal((5, 5)), RevealOutcome::NoChange);
        assert_eq!(game.toggle_flag((5, 5)), FlagOutcome::NoChange);
        assert_eq!(game.chord_reveal((5, 5)), RevealOutcome::NoChange);
        assert_eq!(game.opened_count(), 0);
        assert!(!game.is_visited((5, 5)));
    }

    #[test]
    fn reset_restores_a_fresh_session() {
        let mut game = GameSession::with_seed(GameConfig::new((4, 4), 3), 5);
        game.reveal((0, 0));
        game.toggle_flag((3, 3));
        game.reveal((1, 1));

        game.reset();

        assert_eq!(game.outcome(), Outcome::InProgress);
        assert!(!game.has_started());
        assert_eq!(game.opened_count(), 0);
        assert_eq!(game.mines_remaining(), 3);
        for row in 0..4 {
            for col in 0..4 {
                assert!(!game.is_visited((row, col)));
                assert!(!game.is_flagged((row, col)));
                assert!(!game.is_mine((row, col)));
            }
        }

        // the next game places mines lazily again, first reveal still safe
        assert_ne!(game.reveal((2, 2)), RevealOutcome::Exploded);
        assert!(game.has_started());
    }

    #[test]
    fn correctly_flagged_board_chords_open_without_losing() {
        let mines = [
            (2, 1),
            (2, 3),
            (2, 5),
            (2, 7),
            (4, 0),
            (4, 8),
            (6, 1),
            (6, 3),
            (6, 5),
            (6, 7),
        ];
        let mut game = prepared((9, 9), &mines);

        assert_eq!(game.reveal((0, 0)), RevealOutcome::Revealed);
        for &coords in &mines {
            game.toggle_flag(coords);
        }
        assert_eq!(game.mines_remaining(), 0);

        // chording every revealed cell to a fixpoint opens the whole board
        while game.outcome() == Outcome::InProgress {
            let opened_before = game.opened_count();
            for row in 0..9 {
                for col in 0..9 {
                    if game.is_visited((row, col)) {
                        assert_ne!(
                            game.chord_reveal((row, col)),
                            RevealOutcome::Exploded
                        );
                    }
                }
            }
            if game.opened_count() == opened_before {
                break;
            }
        }

        assert_eq!(game.outcome(), Outcome::Won);
        assert_eq!(game.opened_count(), 71);
    }

    #[test]
    fn won_game_accounts_for_every_safe_square() {
        let mut game = prepared((3, 3), &[(0, 1), (2, 1)]);

        for coords in [(0, 0), (0, 2), (1, 0), (1, 1), (1, 2), (2, 0), (2, 2)] {
            assert_eq!(game.outcome(), Outcome::InProgress);
            assert!(game.reveal(coords).has_update());
        }

        assert_eq!(game.outcome(), Outcome::Won);
        assert_eq!(
            game.opened_count() + game.mine_count(),
            game.total_squares()
        );
    }
}
