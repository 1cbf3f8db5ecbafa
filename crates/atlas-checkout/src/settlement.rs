//! # Settlement
//!
//! Builds the transaction-posting payload from a validated tender and
//! submits it through the [`SettlementGateway`].
//!
//! ## Boundary Rules
//! - Amounts cross the boundary in integer cents; the service renders
//!   2-decimal values on its side.
//! - Payment rows are the NORMALIZED set (cash rewritten to cash-needed when
//!   non-cash tender exists); change travels as its own field.
//! - A rejected submission leaves everything local intact — cart, payment
//!   rows, floating-order link — so the cashier retries without re-entering.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use atlas_core::{LineItem, Money, OrderTotals, PaymentError, PaymentRow, TenderBreakdown};

use crate::repository::RepositoryResult;

// =============================================================================
// Payload Types
// =============================================================================

/// Status the posted transaction is recorded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Completed,
    Voided,
}

/// One tender line of the settlement record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementPayment {
    pub payment_method_id: String,
    pub amount: Money,
    pub notes: Option<String>,
}

/// One merchandise line of the settlement record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementItem {
    pub stock_id: String,
    pub quantity: i64,
    pub discounts: Vec<String>,
}

/// The full transaction-posting payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRequest {
    /// Primary method (the first tender row); the full set is in `payments`.
    pub payment_method_id: String,
    pub is_dine_in: bool,
    pub status: SettlementStatus,

    pub paid_amount: Money,
    pub subtotal: Money,
    pub grand_total: Money,
    pub total_discount: Money,
    pub total_tax: Money,
    pub change: Money,
    pub due_amount: Money,

    pub customer_id: Option<String>,
    pub branch_id: String,

    pub payments: Vec<SettlementPayment>,
    pub order_items: Vec<SettlementItem>,
    pub taxes: Vec<String>,

    pub floating_order_id: Option<String>,
    pub cash_register_session_id: Option<String>,
}

/// What the posting endpoint returns on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    pub transaction_id: String,
    pub receipt_number: String,
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// The transaction-posting endpoint. External collaborator.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Posts a settled sale. Rejection means payment did NOT complete.
    async fn submit(&self, request: SettlementRequest) -> RepositoryResult<SettlementReceipt>;
}

// =============================================================================
// Request Assembly
// =============================================================================

/// Context fields the orchestrator threads into the payload.
#[derive(Debug, Clone)]
pub struct SettlementContext {
    pub is_dine_in: bool,
    pub customer_id: Option<String>,
    pub branch_id: String,
    pub tax_ids: Vec<String>,
    pub floating_order_id: Option<String>,
    pub cash_register_session_id: Option<String>,
}

/// Assembles the posting payload from the priced cart and the normalized
/// tender rows.
///
/// `rows` must already be validated and normalized; a row without a method
/// id here is a programming error surfaced as `MissingMethod` rather than a
/// panic.
pub fn build_request(
    items: &[LineItem],
    totals: &OrderTotals,
    rows: &[PaymentRow],
    breakdown: &TenderBreakdown,
    context: SettlementContext,
) -> Result<SettlementRequest, PaymentError> {
    if rows.is_empty() {
        return Err(PaymentError::EmptyTender);
    }

    let mut payments = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let method = row
            .method_id
            .clone()
            .ok_or(PaymentError::MissingMethod { index })?;
        payments.push(SettlementPayment {
            payment_method_id: method,
            amount: row.amount,
            notes: row.notes.clone(),
        });
    }

    let paid_amount: Money = payments.iter().map(|p| p.amount).sum();

    Ok(SettlementRequest {
        payment_method_id: payments[0].payment_method_id.clone(),
        is_dine_in: context.is_dine_in,
        status: SettlementStatus::Completed,
        paid_amount,
        subtotal: totals.subtotal,
        grand_total: totals.grand_total,
        total_discount: totals.discount,
        total_tax: totals.tax,
        change: breakdown.change,
        due_amount: totals.grand_total,
        customer_id: context.customer_id,
        branch_id: context.branch_id,
        payments,
        order_items: items
            .iter()
            .map(|item| SettlementItem {
                stock_id: item.stock_id.clone(),
                quantity: item.quantity,
                discounts: item.discount_ids.clone(),
            })
            .collect(),
        taxes: context.tax_ids,
        floating_order_id: context.floating_order_id,
        cash_register_session_id: context.cash_register_session_id,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
