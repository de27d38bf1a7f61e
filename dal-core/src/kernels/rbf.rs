//! RBF kernel post-GEMM fixup (spec §4.8): given squared norms `a1`, `a2` of
//! two samples and their dot product `d` (already computed by an external
//! GEMM), finishes the RBF kernel value
//! `exp(max(threshold, coeff * (a1 + a2 - 2*d)))`. The GEMM itself and the
//! norm computation are an external collaborator; this is the scalar
//! fixup applied to every output element afterwards.

/// `exp(max(threshold, coeff * (a1 + a2 - 2*d)))`, applied in place to a
/// whole post-GEMM block. `a1` broadcasts over rows (one entry per row of
/// `d`), `a2` over columns (one entry per column of `d`); `d` is
/// `rows x cols` row-major and is the GEMM output `X * X'^T`.
pub fn apply_rbf_fixup(d: &mut [f64], a1: &[f64], a2: &[f64], rows: usize, cols: usize, coeff: f64, threshold: f64) {
    assert_eq!(d.len(), rows * cols);
    assert_eq!(a1.len(), rows);
    assert_eq!(a2.len(), cols);
    for row in 0..rows {
        for col in 0..cols {
            let idx = row * cols + col;
            let raw = coeff * (a1[row] + a2[col] - 2.0 * d[idx]);
            d[idx] = raw.max(threshold).exp();
        }
    }
}

/// The scalar form, for a single pair, used by tests and by callers that
/// only ever need one kernel value at a time.
pub fn rbf_value(a1: f64, a2: f64, d: f64, coeff: f64, threshold: f64) -> f64 {
    (coeff * (a1 + a2 - 2.0 * d)).max(threshold).exp()
}
