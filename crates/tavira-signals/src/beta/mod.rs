//! Beta-based signals.

mod low_beta;

pub use low_beta::LowBeta;
