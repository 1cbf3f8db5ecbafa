//! # atlas-core: Pure Business Logic for Atlas POS
//!
//! This crate is the **heart** of the order staging and settlement core. It
//! contains all business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Atlas POS Order Core                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      Host UI Layer                              │   │
//! │  │    Cart UI ──► Park/Resume UI ──► Tender UI                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  atlas-checkout (async layer)                   │   │
//! │  │    cart staging, reconciliation, lifecycle, session gate        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ atlas-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │  payment  │  │   │
//! │  │   │ LineItem  │  │   Money   │  │ stacking  │  │ allocator │  │   │
//! │  │   │  Orders   │  │  TaxCalc  │  │  totals   │  │  change   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • PURE FUNCTIONS                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (LineItem, FloatingOrder, PaymentRow, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Discount stacking and order total aggregation
//! - [`discount`] - Discount validity-window and usage-limit selectability
//! - [`payment`] - Tender allocation: cash-needed, change, shortfall
//! - [`validation`] - Field-level input validation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Network, clock, and file system access are FORBIDDEN here
//!    (callers pass "today" into window checks)
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod money;
pub mod payment;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use atlas_core::Money` instead of
// `use atlas_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use payment::{PaymentError, TenderBreakdown};
pub use pricing::{LineTotals, OrderTotals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct entries allowed in a single cart.
pub const MAX_CART_ENTRIES: usize = 100;

/// Maximum quantity a single cart line may hold.
///
/// Guards against fat-finger quantities (e.g. 1000 instead of 10); the
/// per-stock availability clamp applies beneath this ceiling.
pub const MAX_LINE_QUANTITY: i64 = 999;
