//! Protocol error definitions.

use odra::prelude::*;

/// Ledger errors.
///
/// Every error aborts the enclosing transaction; nothing here is retried.
#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CdpError {
    // Access control errors (1xx)
    PermissionDenied = 100,

    // Amount errors (2xx)
    InvalidAmount = 200,

    // Pool registry errors (3xx)
    PoolNotFound = 300,
    PoolAlreadyRegistered = 301,

    // Invariant errors (4xx)
    InvariantViolation = 400,
    ArithmeticOverflow = 401,

    // Token errors (5xx)
    InsufficientTokenBalance = 500,
    InsufficientAllowance = 501,

    // Trove registry errors (6xx)
    TroveNotActive = 600,
    TroveAlreadyActive = 601,
    NoActiveTroves = 602,

    // Configuration errors (9xx)
    InvalidConfig = 900,
    ContractNotWired = 901,
}

impl CdpError {
    pub const fn message(&self) -> &'static str {
        match self {
            // Access control
            CdpError::PermissionDenied => "Permission denied: caller is not authorized",

            // Amount
            CdpError::InvalidAmount => "Invalid amount",

            // Pool registry
            CdpError::PoolNotFound => "Pool not found for asset",
            CdpError::PoolAlreadyRegistered => "Pool already registered for asset",

            // Invariants
            CdpError::InvariantViolation => "Ledger invariant violated",
            CdpError::ArithmeticOverflow => "Arithmetic overflow",

            // Token
            CdpError::InsufficientTokenBalance => "Insufficient token balance",
            CdpError::InsufficientAllowance => "Insufficient token allowance",

            // Trove registry
            CdpError::TroveNotActive => "Trove is not active",
            CdpError::TroveAlreadyActive => "Trove already active for this owner",
            CdpError::NoActiveTroves => "No active troves to redistribute to",

            // Config
            CdpError::InvalidConfig => "Invalid configuration parameter",
            CdpError::ContractNotWired => "Collaborator contract address not set",
        }
    }
}

impl core::fmt::Display for CdpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.message())
    }
}

impl From<CdpError> for OdraError {
    fn from(error: CdpError) -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            OdraError::user(error as u16)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            OdraError::user(error as u16, error.message())
        }
    }
}
