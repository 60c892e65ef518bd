use thiserror::Error;

/// Protocol-wide error types for the Bulwark safety module.
///
/// Every mutating entry point is all-or-nothing: when one of these is
/// returned, no state has been changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BulwarkError {
    /// Caller lacks the role required for the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Action attempted while the module state forbids it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Requested state change is unreachable from the current state, or is
    /// outside its timing window.
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Configuration payload failed validation or does not match the
    /// queued hash.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A computed share or asset amount is zero where a positive result is required.
    #[error("Amount rounds to zero")]
    RoundsToZero,

    /// Pool id out of range.
    #[error("{kind} pool id {id} out of bounds (len {len})")]
    OutOfBounds {
        kind: &'static str,
        id: u16,
        len: usize,
    },

    /// External drip model returned a factor above 1e18.
    #[error("Invalid drip factor: {0}")]
    InvalidDripFactor(u128),

    /// Tracked balance would exceed what the module actually holds.
    #[error("Invalid deposit: {0}")]
    InvalidDeposit(String),

    /// Trigger is unknown to the module, already used, or has not fired.
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// Redemption is queued but its delay has not elapsed.
    #[error("Delay not elapsed: ready at {ready_at}, now {now}")]
    DelayNotElapsed { ready_at: u64, now: u64 },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Slash amount is above the pool's max slash percentage.
    #[error("Slash of {amount} exceeds max slash percentage for reserve pool {reserve_pool_id} (stake {stake_amount})")]
    ExceedsMaxSlashPercentage {
        reserve_pool_id: u16,
        amount: u128,
        stake_amount: u128,
    },

    /// The same reserve pool appears twice in one slash set.
    #[error("Reserve pool {0} already slashed in this call")]
    AlreadySlashed(u16),

    /// Token balance or allowance too low.
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Checked arithmetic failed (overflow, underflow, division by zero).
    #[error("Math error: {0}")]
    Math(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for BulwarkError {
    fn from(e: serde_json::Error) -> Self {
        BulwarkError::Serialization(e.to_string())
    }
}
