//! Linear-model training and prediction core (spec §4.7): a blocked
//! normal-equations accumulator, batch/incremental/distributed finalization
//! paths that all bottom out in [`partial::PartialModel::merge`], and a
//! row-blocked predictor.

pub mod partial;
pub mod predict;
pub mod train;

pub use partial::PartialModel;
pub use predict::{predict, predict_blocked, predict_with_hyperparameters, DEFAULT_PREDICT_BLOCK_ROWS};
pub use train::{finalize, train, TrainedModel};
