use crate::grid::{Grid, GridError, Position};
use rand::seq::SliceRandom;
use rand::Rng;

/// Result of a single contest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The first cell won and overwrote the second
    FirstWins,
    /// The second cell won and overwrote the first
    SecondWins,
    /// Equal number of winning axes, nothing changed
    Tie,
}

/// Tally of one fight pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FightOutcome {
    pub first_wins: u32,
    pub second_wins: u32,
    pub ties: u32,
}

impl FightOutcome {
    /// Contests that changed a cell
    pub fn decided(&self) -> u32 {
        self.first_wins + self.second_wins
    }

    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::FirstWins => self.first_wins += 1,
            Verdict::SecondWins => self.second_wins += 1,
            Verdict::Tie => self.ties += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Fight {
    attempts: u32,
}

impl Fight {
    pub fn new(attempts: u32) -> Self {
        Self { attempts }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Run `attempts` contests between random cells and one of their four
    /// toroidal neighbours.
    pub fn fight<R: Rng + ?Sized>(
        &self,
        grid: &mut Grid,
        rng: &mut R,
    ) -> Result<FightOutcome, GridError> {
        let mut outcome = FightOutcome::default();
        for _ in 0..self.attempts {
            outcome.record(Self::single_fight(grid, rng)?);
        }
        Ok(outcome)
    }

    fn single_fight<R: Rng + ?Sized>(grid: &mut Grid, rng: &mut R) -> Result<Verdict, GridError> {
        let first = grid.random_position(rng);
        let neighbours = grid.neighbours(first);
        // Four entries, never empty
        let second = *neighbours.choose(rng).unwrap_or(&first);
        Self::contest(grid, first, second)
    }

    /// Resolve one contest between the cells at `first` and `second`. The
    /// loser receives an independent copy of the winner's profile.
    pub fn contest(
        grid: &mut Grid,
        first: Position,
        second: Position,
    ) -> Result<Verdict, GridError> {
        let cell1 = grid.cell_at(first)?;
        let cell2 = grid.cell_at(second)?;
        let (adv1, adv2) = cell1.power.advantages(&cell2.power);

        if adv1 > adv2 {
            grid.set_cell(second, cell1)?;
            Ok(Verdict::FirstWins)
        } else if adv2 > adv1 {
            grid.set_cell(first, cell2)?;
            Ok(Verdict::SecondWins)
        } else {
            Ok(Verdict::Tie)
        }
    }
}
