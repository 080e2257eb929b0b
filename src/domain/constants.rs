//! Physical and numerical constants.

/// Tangential speed in km/s of a star at 1 pc moving 1 mas/yr across the sky
/// (1 AU/yr = 4.740470463533348 km/s, and 1 mas at 1 pc is 1e-3 AU).
pub const KMS_PER_PC_MASYR: f64 = 4.740_470_463_533_348e-3;

pub const MAS_PER_ARCSEC: f64 = 1000.0;

/// Angular step (rad) used for the finite differences of the tangent basis.
pub const TANGENT_OFFSET_RAD: f64 = 0.5;

/// RV precision entries within this of zero mean "no RV measured".
///
/// Upstream zeroing is not guaranteed to be bit-exact.
pub const RV_PRECISION_ATOL: f64 = 1e-8;

/// Population velocity dispersion (km/s) used when no prior is configured.
pub const DEFAULT_SIGMA_V_KMS: f64 = 25.0;

/// Observable slots per star: parallax, pm_ra, pm_dec, RV.
pub const OBS_PER_STAR: usize = 4;

/// Index of the RV slot within a star's observable block.
pub const RV_SLOT: usize = 3;
