//! # Error Types
//!
//! Domain-specific error types for atlas-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  atlas-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── PaymentError     - Tender validation failures (payment module)    │
//! │                                                                         │
//! │  atlas-checkout errors (separate crate)                                │
//! │  ├── RepositoryError  - Remote collaborator failures                   │
//! │  └── CheckoutError    - Staging workflow failures                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CheckoutError → Host UI           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (stock id, amounts, indices)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::payment::PaymentError;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations caught before any state change;
/// they should be translated to user-facing messages by the host.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested quantity exceeds what the stock can still commit.
    ///
    /// `available` is the stock's on-hand quantity minus quantity already
    /// held by other cart lines referencing the same stock.
    #[error("Insufficient stock for {stock_id}: available {available}, requested {requested}")]
    StockUnavailable {
        stock_id: String,
        available: i64,
        requested: i64,
    },

    /// Cart entry cannot be found.
    #[error("Cart entry not found: {0}")]
    EntryNotFound(String),

    /// Entry quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Discount window expired or usage limit exhausted for this cart.
    #[error("Discount {discount_id} is not selectable for this line")]
    DiscountNotSelectable { discount_id: String },

    /// Tender validation failure (wraps PaymentError).
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when input doesn't meet field-level requirements; used for
/// early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
