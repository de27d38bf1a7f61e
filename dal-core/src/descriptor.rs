//! Descriptor surface for the linear-model core (spec §4.7/§9): the
//! options and tunable-but-safe hyperparameters a caller can set before
//! training, kept as a plain struct rather than a builder trait — the
//! surface is small and every field already has a sane default, so a
//! builder's extra indirection would not earn its keep here.

use bitflags::bitflags;

bitflags! {
    /// Which optional outputs `train` should populate, beyond the always-present
    /// coefficients.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResultOptions: u8 {
        const COEFFICIENTS = 0b001;
        const INTERCEPT    = 0b010;
        const DIAGNOSTICS  = 0b100;
    }
}

impl Default for ResultOptions {
    fn default() -> Self {
        ResultOptions::COEFFICIENTS | ResultOptions::INTERCEPT
    }
}

/// User-facing training options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModelDescriptor {
    pub compute_intercept: bool,
    pub alpha: f64,
    pub result_options: ResultOptions,
}

impl Default for LinearModelDescriptor {
    fn default() -> Self {
        Self {
            compute_intercept: true,
            alpha: 0.0,
            result_options: ResultOptions::default(),
        }
    }
}

/// Tunable-but-safe CPU hyperparameters (spec §4.7/§9): every field has a
/// default that is correct for any input shape, the hyperparameters only
/// trade performance, never correctness. Per spec's non-goal on
/// per-algorithm tuning constants, this core only carries the surface a
/// real call site reads: [`crate::linear_model::PartialModel::update`]
/// reads `cpu_macro_block` for its accumulation block size, and
/// [`crate::linear_model::predict`] reads `cpu_predict_block_rows` for its
/// default prediction block size. Picking better defaults per CPU
/// generation is left to a caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuHyperparameters {
    /// Row-block size used while accumulating `X'X`/`X'Y`.
    pub cpu_macro_block: usize,
    /// Row-block size `predict` uses when the caller doesn't pick one
    /// explicitly via `predict_blocked`.
    pub cpu_predict_block_rows: usize,
}

impl Default for CpuHyperparameters {
    fn default() -> Self {
        Self {
            cpu_macro_block: 256,
            cpu_predict_block_rows: 1024,
        }
    }
}
