use rand::rngs::SmallRng;
use rand::SeedableRng;

use super::*;

/// Uniform placement by partial shuffle: draws `config.mines` distinct cell
/// indices from the candidates left once the safe cell is excluded, instead
/// of resampling until enough distinct cells turn up.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RandomPlacer {
    seed: u64,
}

impl RandomPlacer {
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl MinePlacer for RandomPlacer {
    fn place(self, config: GameConfig, safe: RowCol) -> Board {
        let mut board = Board::new(config.size);
        let cols = config.cols();

        // an out-of-range first click excludes nothing
        let skip = board.is_valid_cell(safe).then(|| cell_index(safe, cols));
        let candidates = board.total_squares() - CellCount::from(skip.is_some());

        let mines = if config.mines > candidates {
            log::warn!(
                "requested {} mines but only {} cells stay placeable",
                config.mines,
                candidates
            );
            candidates
        } else {
            config.mines
        };

        let mut rng = SmallRng::seed_from_u64(self.seed);
        for index in rand::seq::index::sample(&mut rng, candidates as usize, mines as usize) {
            // indices at or past the excluded cell shift up by one
            let mut cell = index as CellCount;
            if let Some(skip) = skip {
                if cell >= skip {
                    cell += 1;
                }
            }
            board.set_cell(cell_at_index(cell, cols), true);
        }

        log::debug!(
            "placed {} mines on {}x{}, safe cell {:?}",
            mines,
            config.rows(),
            cols,
            safe
        );
        board
    }
}
