//! The 5-point Jacobi update.
//!
//! `current[i][j] = 0.25 * (previous[i+1][j] + previous[i-1][j]
//!                          + previous[i][j+1] + previous[i][j-1])`
//!
//! The sum is always taken in this order so every decomposition of the
//! grid produces the same bits.

use crate::grid::RowView;
use rayon::prelude::*;

/// Update the interior cells of one row. All slices are full grid rows,
/// boundary columns included; the boundary cells of `out` are not written.
#[inline]
pub fn relax_row(above: &[f64], row: &[f64], below: &[f64], out: &mut [f64]) {
    let n = out.len() - 2;
    debug_assert!(above.len() == n + 2 && row.len() == n + 2 && below.len() == n + 2);
    let cells = out[1..=n]
        .iter_mut()
        .zip(&below[1..=n])
        .zip(&above[1..=n])
        .zip(&row[2..n + 2])
        .zip(&row[0..n]);
    for ((((o, b), a), r), l) in cells {
        *o = 0.25 * (b + a + r + l);
    }
}

/// Update the rows held in `out`, which start at grid row `first_row`.
/// Every row only reads `previous`, so rows are handed out to the pool
/// independently.
pub fn relax_rows(previous: RowView<'_>, out: &mut [f64], first_row: usize) {
    profiling::scope!("stencil::relax_rows");
    let width = previous.width();
    if width == 0 || out.is_empty() {
        return;
    }
    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(k, out_row): (usize, &mut [f64])| {
            let i = first_row + k;
            relax_row(
                previous.row(i - 1),
                previous.row(i),
                previous.row(i + 1),
                out_row,
            );
        });
}
