use crate::grid::{Grid, GridError, Position};
use rand::Rng;

/// A directed transfer of one power unit from axis `down` to axis `up`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub up: usize,
    pub down: usize,
}

/// Every transfer between two distinct axes
pub const MOVES: [Move; 6] = [
    Move { up: 0, down: 1 },
    Move { up: 0, down: 2 },
    Move { up: 1, down: 0 },
    Move { up: 1, down: 2 },
    Move { up: 2, down: 0 },
    Move { up: 2, down: 1 },
];

/// Tally of one mutation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    pub accepted: u32,
    pub rejected: u32,
}

#[derive(Debug, Clone)]
pub struct Mutation {
    attempts: u32,
}

impl Mutation {
    pub fn new(attempts: u32) -> Self {
        Self { attempts }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `attempts` independent transfer attempts on random cells.
    /// Rejected attempts are not retried.
    pub fn mutate<R: Rng + ?Sized>(
        &self,
        grid: &mut Grid,
        rng: &mut R,
    ) -> Result<MutationOutcome, GridError> {
        let mut outcome = MutationOutcome::default();

        for _ in 0..self.attempts {
            let pos = grid.random_position(rng);
            let mv = MOVES[rng.gen_range(0..MOVES.len())];
            if Self::apply(grid, pos, mv)? {
                outcome.accepted += 1;
            } else {
                outcome.rejected += 1;
            }
        }

        Ok(outcome)
    }

    /// Apply one transfer at `pos`. Returns whether the cell changed; an
    /// out-of-bounds candidate leaves the cell as it was.
    pub fn apply(grid: &mut Grid, pos: Position, mv: Move) -> Result<bool, GridError> {
        let mut cell = grid.cell_at(pos)?;
        match cell.power.transfer(mv.up, mv.down) {
            Some(power) => {
                cell.power = power;
                grid.set_cell(pos, cell)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for Mutation {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Size;
    use crate::power::{Cell, PowerVector};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn random_grid(seed: u64, variance: u8) -> Grid {
        let mut rng = SmallRng::seed_from_u64(seed);
        Grid::new(Size::new(12, 9), |_| Cell::random(variance, &mut rng).unwrap()).unwrap()
    }

    #[test]
    fn test_move_table_covers_all_directed_pairs() {
        assert_eq!(MOVES.len(), 6);
        for mv in MOVES {
            assert_ne!(mv.up, mv.down);
            assert!(mv.up < 3 && mv.down < 3);
        }
        for (i, a) in MOVES.iter().enumerate() {
            for b in &MOVES[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_apply_accepts_legal_move() {
        let mut grid = Grid::filled(Size::new(2, 2), Cell::default()).unwrap();
        let pos = Position::new(1, 1);
        assert!(Mutation::apply(&mut grid, pos, Move { up: 2, down: 0 }).unwrap());
        assert_eq!(grid.cell_at(pos).unwrap().power.components(), [4, 5, 6]);
    }

    #[test]
    fn test_rejected_move_leaves_cell_unchanged() {
        let start = Cell::new(PowerVector::new([9, 5, 1]));
        let mut grid = Grid::filled(Size::new(3, 3), start).unwrap();
        let pos = Position::new(0, 2);

        // Would push axis 0 above the maximum
        assert!(!Mutation::apply(&mut grid, pos, Move { up: 0, down: 1 }).unwrap());
        assert_eq!(grid.cell_at(pos).unwrap(), start);

        // Would push axis 2 below the minimum
        assert!(!Mutation::apply(&mut grid, pos, Move { up: 1, down: 2 }).unwrap());
        assert_eq!(grid.cell_at(pos).unwrap(), start);
    }

    #[test]
    fn test_apply_out_of_bounds_position() {
        let mut grid = Grid::filled(Size::new(2, 2), Cell::default()).unwrap();
        assert!(Mutation::apply(&mut grid, Position::new(2, 0), MOVES[0]).is_err());
    }

    #[test]
    fn test_mutate_counts_every_attempt() {
        let mut grid = random_grid(11, 4);
        let mut rng = SmallRng::seed_from_u64(5);
        let outcome = Mutation::new(500).mutate(&mut grid, &mut rng).unwrap();
        assert_eq!(outcome.accepted + outcome.rejected, 500);
        assert!(outcome.accepted > 0);
    }

    #[test]
    fn test_zero_attempts_is_noop() {
        let mut grid = random_grid(2, 3);
        let before = grid.clone();
        let mut rng = SmallRng::seed_from_u64(9);
        let outcome = Mutation::new(0).mutate(&mut grid, &mut rng).unwrap();
        assert_eq!(outcome, MutationOutcome::default());
        assert_eq!(grid, before);
    }

    #[test]
    fn test_mutate_preserves_invariants() {
        let mut grid = random_grid(21, 4);
        let mut rng = SmallRng::seed_from_u64(21);
        let mutation = Mutation::new(2000);

        for _ in 0..20 {
            mutation.mutate(&mut grid, &mut rng).unwrap();
            for cell in grid.cells() {
                assert!(cell.power.is_valid());
                assert!(cell.power.is_conserved());
            }
        }
    }

    #[test]
    fn test_mutate_is_deterministic_for_seed() {
        let start = random_grid(4, 2);
        let mut a = start.clone();
        let mut b = start;
        let mutation = Mutation::new(300);

        let mut rng_a = SmallRng::seed_from_u64(77);
        let mut rng_b = SmallRng::seed_from_u64(77);
        for _ in 0..10 {
            mutation.mutate(&mut a, &mut rng_a).unwrap();
            mutation.mutate(&mut b, &mut rng_b).unwrap();
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_attempts() {
        assert_eq!(Mutation::default().attempts(), 1);
    }
}
