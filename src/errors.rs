// Error taxonomy for the marketplace core.
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    // Validation errors - raised before any state is touched
    InvalidArgument(String),

    // Lookup errors
    NotFound(String),
    AlreadyExists(String),

    // A purchase is already in flight
    Conflict(String),

    // Matching errors
    InsufficientFunds { available: i64, required: i64 },
    InsufficientSupply { available: i64, requested: i64 },

    // Underlying key-value store unreachable or corrupt
    Store(String),
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::InsufficientFunds { available, required } => {
                write!(f, "Insufficient funds: have {}, need {}", available, required)
            }
            Self::InsufficientSupply { available, requested } => {
                write!(
                    f,
                    "Insufficient supply: requested {} with only {} available",
                    requested, available
                )
            }
            Self::Store(msg) => write!(f, "State access error: {}", msg),
        }
    }
}

impl std::error::Error for MarketError {}

impl From<sled::Error> for MarketError {
    fn from(err: sled::Error) -> Self {
        MarketError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Store(err.to_string())
    }
}

impl MarketError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Conflict(_) => "CONFLICT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::InsufficientSupply { .. } => "INSUFFICIENT_SUPPLY",
            Self::Store(_) => "STATE_ACCESS_ERROR",
        }
    }

    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}
