use rayon::prelude::*;

/// Largest `|current - previous|` over the interior cells of one row,
/// copying current into previous in the same pass.
#[inline]
fn row_delta_and_copy(current: &[f64], previous: &mut [f64]) -> f64 {
    let n = current.len() - 2;
    let mut dt: f64 = 0.0;
    for (c, p) in current[1..=n].iter().zip(previous[1..=n].iter_mut()) {
        dt = dt.max((c - *p).abs());
        *p = *c;
    }
    dt
}

/// Rank-local max change of the interior after a sweep. Rows are split
/// across the pool and the per-row maxima combined with a max reduction.
/// On return previous holds the interior of current, ready for the next
/// sweep; halo rows and boundary columns are left alone.
pub fn local_max_delta(
    current: &[f64],
    previous: &mut [f64],
    width: usize,
    local_rows: usize,
) -> f64 {
    profiling::scope!("convergence::local_max_delta");
    let interior = width..(local_rows + 1) * width;
    current[interior.clone()]
        .par_chunks(width)
        .zip(previous[interior].par_chunks_mut(width))
        .map(|(c, p)| row_delta_and_copy(c, p))
        .reduce(|| 0.0, f64::max)
}
