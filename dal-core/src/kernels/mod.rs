//! Representative hot-path kernel contracts external callers rely on
//! (spec §4.8): the RBF post-GEMM fixup and the SVM working-set kernel
//! cache. Both are small, self-contained pieces meant to sit downstream of
//! an externally supplied GEMM, not full algorithm implementations.

pub mod rbf;
pub mod svm_cache;

pub use rbf::{apply_rbf_fixup, rbf_value};
pub use svm_cache::WorkingSetCache;
