//! Signal, score and alpha constructors for the Tavira backtest engine.
//!
//! This crate provides the concrete pipeline stages:
//! - Signals: momentum, short-term reversal and low beta
//! - Scores: cross-sectional z-score and uniform presence score
//! - Alphas: Grinold–Kahn risk-scaled alpha and a static alpha
//!
//! # Example
//!
//! ```ignore
//! use tavira_signals::{GrinoldKahn, ZScore, registry::create_signal};
//! use tavira_traits::{AlphaConstructor, Interval, ScoreConstructor};
//!
//! let signal = create_signal("momentum", Interval::Monthly)?.signal(&history)?;
//! let score = ZScore.score(&signal)?;
//! let alpha = GrinoldKahn::default().alpha(&score, &total_risk)?;
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod alpha;
pub mod beta;
pub mod momentum;
pub mod registry;
pub mod score;

pub use alpha::{GrinoldKahn, StaticAlpha};
pub use beta::LowBeta;
pub use momentum::{Momentum, MomentumConfig, Reversal, ReversalConfig};
pub use registry::{SignalCategory, SignalInfo};
pub use score::{UniformScore, ZScore};
