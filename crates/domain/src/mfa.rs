//! Constants shared by the TOTP/MFA service and its infrastructure adapters.

/// Number of one-time backup codes issued per enrollment.
pub const BACKUP_CODE_COUNT: usize = 8;

/// Character length of each backup code.
pub const BACKUP_CODE_LENGTH: usize = 8;

/// TOTP time-step size in seconds (RFC 6238 default).
pub const TOTP_STEP_SECONDS: u64 = 30;

/// Number of adjacent time steps accepted on either side of the current one.
pub const TOTP_SKEW_STEPS: u8 = 1;

/// Consecutive TOTP verification failures allowed before lockout.
pub const TOTP_MAX_FAILURES: u32 = 5;
