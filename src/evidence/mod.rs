//! Bayesian evidence for co-moving star pairs.
//!
//! Responsibilities:
//!
//! - marginalize a linear-Gaussian star model over its latent velocity (`marginal`)
//! - combine stars into the shared (H1) and independent (H2) velocity hypotheses (`hypothesis`)
//! - evaluate the same densities at a fixed velocity (`direct`)

pub mod direct;
pub mod hypothesis;
pub mod marginal;

pub use direct::*;
pub use hypothesis::*;
pub use marginal::*;
