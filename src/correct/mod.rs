//! Multiple testing correction.

pub mod bh;

pub use bh::{bh_qvalues, correct_bh, correct_bh_permutation, BhCorrected};
