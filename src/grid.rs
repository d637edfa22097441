//! Storage for one rank's strip of the global grid.
//!
//! Both buffers are row-major with `columns + 2` values per row and
//! `local_rows + 2` rows. Row 0 and row `local_rows + 1` are halo rows,
//! column 0 and column `columns + 1` are fixed boundary columns.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Fixed values along the outside of the global grid.
///
/// Rows are addressed by padded global index (0 is the top boundary row,
/// `global_rows + 1` the bottom one) and columns by padded index, so every
/// strip of a decomposition computes the same bits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundaryConditions {
    /// One constant per side.
    Fixed {
        top: f64,
        bottom: f64,
        left: f64,
        right: f64,
    },

    /// Top and left held at 0. The right column rises linearly down the rows
    /// and the bottom row linearly across the columns, both reaching `max`
    /// at the last interior cell.
    Ramp { max: f64 },
}

impl Default for BoundaryConditions {
    fn default() -> Self {
        BoundaryConditions::Ramp { max: 100.0 }
    }
}

impl BoundaryConditions {
    /// Heated top edge, everything else cold.
    pub const HOT_TOP: Self = BoundaryConditions::Fixed {
        top: 100.0,
        bottom: 0.0,
        left: 0.0,
        right: 0.0,
    };

    pub fn top(&self, _column: usize, _columns: usize) -> f64 {
        match *self {
            BoundaryConditions::Fixed { top, .. } => top,
            BoundaryConditions::Ramp { .. } => 0.0,
        }
    }

    pub fn bottom(&self, column: usize, columns: usize) -> f64 {
        match *self {
            BoundaryConditions::Fixed { bottom, .. } => bottom,
            BoundaryConditions::Ramp { max } => (max / columns as f64) * column as f64,
        }
    }

    pub fn left(&self, _row: usize, _global_rows: usize) -> f64 {
        match *self {
            BoundaryConditions::Fixed { left, .. } => left,
            BoundaryConditions::Ramp { .. } => 0.0,
        }
    }

    pub fn right(&self, row: usize, global_rows: usize) -> f64 {
        match *self {
            BoundaryConditions::Fixed { right, .. } => right,
            BoundaryConditions::Ramp { max } => (max / global_rows as f64) * row as f64,
        }
    }

    /// Hottest value anywhere on the boundary.
    pub fn max(&self) -> f64 {
        match *self {
            BoundaryConditions::Fixed {
                top,
                bottom,
                left,
                right,
            } => top.max(bottom).max(left).max(right),
            BoundaryConditions::Ramp { max } => max,
        }
    }
}

/// Starting values of the interior cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialCondition {
    Uniform(f64),

    /// Values in `[0, max)`, a pure function of the seed and the global row,
    /// so every decomposition starts from the same field.
    Random { seed: u64, max: f64 },
}

impl Default for InitialCondition {
    fn default() -> Self {
        InitialCondition::Uniform(0.0)
    }
}

impl InitialCondition {
    pub fn fill_row(&self, global_row: usize, row: &mut [f64]) {
        match *self {
            InitialCondition::Uniform(value) => row.fill(value),
            InitialCondition::Random { seed, max } => {
                let row_seed =
                    seed ^ (global_row as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
                let mut rng = StdRng::seed_from_u64(row_seed);
                for v in row.iter_mut() {
                    *v = rng.gen::<f64>() * max;
                }
            }
        }
    }
}

/// Read access to consecutive full-width rows, addressed by grid row index.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    data: &'a [f64],
    width: usize,
    first: usize,
}

impl<'a> RowView<'a> {
    /// `data` holds whole rows of `width` values, the first being grid row
    /// `first`.
    pub fn new(data: &'a [f64], width: usize, first: usize) -> Self {
        debug_assert!(width == 0 || data.len() % width == 0);
        RowView { data, width, first }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    #[track_caller]
    pub fn row(&self, i: usize) -> &'a [f64] {
        let k = i - self.first;
        &self.data[k * self.width..(k + 1) * self.width]
    }
}

/// Disjoint pieces of a strip for one sweep: the edge task owns the halo
/// rows of `previous` and the edge rows of `current`, the bulk workers own
/// the remaining rows of `current`, and both read the interior of
/// `previous`.
pub struct SweepSplit<'a> {
    /// Row 0 of previous.
    pub top_halo: &'a mut [f64],
    /// Row `local_rows + 1` of previous.
    pub bottom_halo: &'a mut [f64],
    /// Rows `1..=local_rows` of previous.
    pub previous: RowView<'a>,
    /// Row 1 of current.
    pub top_edge: &'a mut [f64],
    /// Rows `2..local_rows` of current.
    pub bulk: &'a mut [f64],
    /// Row `local_rows` of current.
    pub bottom_edge: &'a mut [f64],
}

pub struct StripGrid {
    local_rows: usize,
    columns: usize,
    current: Vec<f64>,
    previous: Vec<f64>,
}

impl StripGrid {
    pub fn new(local_rows: usize, columns: usize) -> Self {
        let size = (local_rows + 2) * (columns + 2);
        StripGrid {
            local_rows,
            columns,
            current: vec![0.0; size],
            previous: vec![0.0; size],
        }
    }

    pub fn local_rows(&self) -> usize {
        self.local_rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Values per row, boundary columns included.
    pub fn width(&self) -> usize {
        self.columns + 2
    }

    /// Rows per buffer, halo rows included.
    pub fn height(&self) -> usize {
        self.local_rows + 2
    }

    pub fn current(&self) -> &[f64] {
        &self.current
    }

    pub fn previous(&self) -> &[f64] {
        &self.previous
    }

    pub fn current_row(&self, i: usize) -> &[f64] {
        let w = self.width();
        &self.current[i * w..(i + 1) * w]
    }

    pub fn previous_row(&self, i: usize) -> &[f64] {
        let w = self.width();
        &self.previous[i * w..(i + 1) * w]
    }

    #[track_caller]
    pub fn value(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < self.height() && j < self.width());
        self.current[i * self.width() + j]
    }

    #[track_caller]
    pub fn previous_value(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < self.height() && j < self.width());
        self.previous[i * self.width() + j]
    }

    /// Both buffers at once, for phases that read one and write the other.
    pub fn buffers_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        (&mut self.current, &mut self.previous)
    }

    /// Needs at least two interior rows so the edge rows are distinct.
    pub fn split_for_sweep(&mut self) -> SweepSplit<'_> {
        let w = self.width();
        let l = self.local_rows;
        debug_assert!(l >= 2);

        let (top_halo, rest) = self.previous.split_at_mut(w);
        let (interior, bottom_halo) = rest.split_at_mut(l * w);

        let (_, rest) = self.current.split_at_mut(w);
        let (top_edge, rest) = rest.split_at_mut(w);
        let (bulk, rest) = rest.split_at_mut((l - 2) * w);
        let (bottom_edge, _) = rest.split_at_mut(w);

        SweepSplit {
            top_halo,
            bottom_halo,
            previous: RowView::new(interior, w, 1),
            top_edge,
            bulk,
            bottom_edge,
        }
    }

    /// Interior of the current buffer, halos and boundary columns dropped.
    pub fn interior(&self) -> Vec<f64> {
        let mut result = Vec::with_capacity(self.local_rows * self.columns);
        for i in 1..=self.local_rows {
            result.extend_from_slice(&self.current_row(i)[1..=self.columns]);
        }
        result
    }

    /// Fill both buffers for the strip whose first interior row is global
    /// row `first_row` of a grid with `global_rows` interior rows.
    /// Halo rows facing a neighbor start with the neighbor's initial row.
    pub fn initialise(
        &mut self,
        boundary: &BoundaryConditions,
        initial: &InitialCondition,
        first_row: usize,
        global_rows: usize,
    ) {
        profiling::scope!("grid::initialise");
        let width = self.width();
        let columns = self.columns;
        let last_row = self.height() - 1;
        let at_top = first_row == 0;
        let at_bottom = first_row + self.local_rows == global_rows;

        self.current
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(i, row): (usize, &mut [f64])| {
                let global_row = first_row + i;
                row[0] = boundary.left(global_row, global_rows);
                row[columns + 1] = boundary.right(global_row, global_rows);
                let cells = &mut row[1..=columns];
                if i == 0 && at_top {
                    for (j, cell) in cells.iter_mut().enumerate() {
                        *cell = boundary.top(j + 1, columns);
                    }
                } else if i == last_row && at_bottom {
                    for (j, cell) in cells.iter_mut().enumerate() {
                        *cell = boundary.bottom(j + 1, columns);
                    }
                } else {
                    initial.fill_row(global_row - 1, cells);
                }
            });
        self.previous.copy_from_slice(&self.current);
    }
}
