//! Diagnostic tools for analyzing the state of the automaton

use crate::grid::Grid;
use crate::power::{PowerVector, AXES};
#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use std::collections::HashMap;

/// Count how many cells carry each profile (parallel)
#[cfg(not(target_arch = "wasm32"))]
pub fn profile_histogram(grid: &Grid) -> HashMap<PowerVector, usize> {
    grid.cells()
        .par_iter()
        .fold(HashMap::new, |mut acc, cell| {
            *acc.entry(cell.power).or_insert(0) += 1;
            acc
        })
        .reduce(HashMap::new, |mut acc, counts| {
            for (power, count) in counts {
                *acc.entry(power).or_insert(0) += count;
            }
            acc
        })
}

/// Count how many cells carry each profile (sequential on wasm)
#[cfg(target_arch = "wasm32")]
pub fn profile_histogram(grid: &Grid) -> HashMap<PowerVector, usize> {
    let mut counts = HashMap::new();
    for cell in grid.cells() {
        *counts.entry(cell.power).or_insert(0) += 1;
    }
    counts
}

/// Per-axis component sums (parallel)
#[cfg(not(target_arch = "wasm32"))]
fn axis_totals(grid: &Grid) -> [u64; AXES] {
    grid.cells()
        .par_iter()
        .map(|cell| cell.power.components().map(u64::from))
        .reduce(
            || [0u64; AXES],
            |mut acc, values| {
                for i in 0..AXES {
                    acc[i] += values[i];
                }
                acc
            },
        )
}

/// Per-axis component sums (sequential on wasm)
#[cfg(target_arch = "wasm32")]
fn axis_totals(grid: &Grid) -> [u64; AXES] {
    let mut totals = [0u64; AXES];
    for cell in grid.cells() {
        for (total, value) in totals.iter_mut().zip(cell.power.components()) {
            *total += u64::from(value);
        }
    }
    totals
}

/// Summarize the grid: invariant audit, profile diversity, axis balance
pub fn summarize(grid: &Grid) -> GridSummary {
    let histogram = profile_histogram(grid);
    let cells = grid.cells().len();

    let mut stats = GridSummary {
        cells,
        distinct_profiles: histogram.len(),
        ..GridSummary::default()
    };

    // Highest count wins; ties go to the lexicographically smallest profile
    stats.dominant_profile = histogram
        .iter()
        .map(|(power, count)| (*power, *count))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)));

    for (power, count) in &histogram {
        if !power.is_conserved() {
            stats.conservation_violations += count;
        }
        if !power.is_valid() {
            stats.bound_violations += count;
        }
    }

    if cells > 0 {
        let totals = axis_totals(grid);
        for i in 0..AXES {
            stats.axis_means[i] = totals[i] as f64 / cells as f64;
        }
    }

    stats
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridSummary {
    pub cells: usize,
    pub distinct_profiles: usize,
    pub dominant_profile: Option<(PowerVector, usize)>,
    pub axis_means: [f64; AXES],
    pub conservation_violations: usize,
    pub bound_violations: usize,
}

impl GridSummary {
    /// Every cell satisfies both the bounds and the conserved total
    pub fn is_consistent(&self) -> bool {
        self.conservation_violations == 0 && self.bound_violations == 0
    }

    /// Share of the grid held by the dominant profile
    pub fn dominance(&self) -> f64 {
        match self.dominant_profile {
            Some((_, count)) if self.cells > 0 => count as f64 / self.cells as f64,
            _ => 0.0,
        }
    }

    pub fn log_report(&self, step: u64) {
        let dominant = self
            .dominant_profile
            .map(|(power, _)| power.to_string())
            .unwrap_or_else(|| "-".to_string());
        tracing::info!(
            step,
            cells = self.cells,
            distinct = self.distinct_profiles,
            dominant = %dominant,
            dominance = self.dominance(),
            mean_r = self.axis_means[0],
            mean_g = self.axis_means[1],
            mean_b = self.axis_means[2],
            consistent = self.is_consistent(),
            "grid summary"
        );
    }
}
