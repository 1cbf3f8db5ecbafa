//! # Reconciliation Engine
//!
//! Makes a linked floating order's remote item set equal to the cart's item
//! set with the minimum number of remote calls — and only ever by ADDING
//! quantity. Decreases and removals are explicit per-item user actions, not
//! synchronization.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Fetch the order fresh (never trust a cached copy for deltas).      │
//! │                                                                         │
//! │  2. Map fungible key → total quantity for remote items and cart items. │
//! │                                                                         │
//! │  3. delta(key) = cart_qty − remote_qty   (remote_qty = 0 if absent)    │
//! │     Keep only delta > 0. Keys are iterated in sorted order so remote   │
//! │     writes land deterministically.                                      │
//! │                                                                         │
//! │  4. One add_item per positive delta, sequentially awaited.             │
//! │                                                                         │
//! │  5. Attach the active tax set (idempotent).                            │
//! │                                                                         │
//! │  6. Conditionally move the order to in-progress.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Semantics
//! A failed add aborts the remainder WITHOUT rolling back what was applied;
//! the caller sees a retryable `PartialReconciliation`. Re-running is safe:
//! deltas are recomputed from current remote state, so already-applied keys
//! produce delta 0 and are skipped. Zero deltas is a distinct, successful
//! no-op — the cart still clears and the order still parks.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use atlas_core::{FloatingOrder, FungibleKey, LineItem, OrderStatus};

use crate::error::{CheckoutError, CheckoutResult};
use crate::repository::{
    AddItemRequest, FloatingOrderRepository, OrderPatch, RepositoryError,
};

// =============================================================================
// Outcome
// =============================================================================

/// How a reconciliation run ended. The no-op case is UI-observable: the host
/// reports "nothing to sync" instead of "N lines parked".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Positive deltas were pushed to the remote order.
    Applied { added_lines: usize },
    /// Cart and remote already agreed; nothing was sent.
    NoChanges,
}

// =============================================================================
// Delta Computation
// =============================================================================

/// Sums quantities per fungible key.
fn quantities_by_key(items: &[LineItem]) -> BTreeMap<FungibleKey, i64> {
    let mut map: BTreeMap<FungibleKey, i64> = BTreeMap::new();
    for item in items {
        *map.entry(item.fungible_key()).or_insert(0) += item.quantity;
    }
    map
}

/// Computes the positive add-deltas that bring `remote` up to `cart`.
///
/// Keys with delta ≤ 0 are skipped: this engine never shrinks a remote line.
/// The result is sorted by key, giving the sequential applier a
/// deterministic remote write order.
pub fn compute_deltas(remote: &[LineItem], cart: &[LineItem]) -> Vec<(FungibleKey, i64)> {
    let remote_map = quantities_by_key(remote);
    let cart_map = quantities_by_key(cart);

    cart_map
        .into_iter()
        .filter_map(|(key, cart_qty)| {
            let remote_qty = remote_map.get(&key).copied().unwrap_or(0);
            let delta = cart_qty - remote_qty;
            (delta > 0).then_some((key, delta))
        })
        .collect()
}

// =============================================================================
// Engine
// =============================================================================

/// Runs one reconciliation of `cart_items` against the remote order.
///
/// On success the order is parked (`in-progress`); the caller owns clearing
/// the local cart and dropping the link.
pub async fn run(
    repo: &dyn FloatingOrderRepository,
    order_id: &str,
    cart_items: &[LineItem],
    tax_ids: &[String],
) -> CheckoutResult<ReconcileOutcome> {
    // Fresh remote state: deltas computed against a stale snapshot would
    // re-add quantity another terminal already appended.
    let fresh = repo.get(order_id).await?;
    if fresh.is_terminal() {
        return Err(CheckoutError::StaleOrder {
            order_id: order_id.to_string(),
        });
    }

    let deltas = compute_deltas(&fresh.items, cart_items);
    let total = deltas.len();
    debug!(order_id = %order_id, deltas = total, "reconciliation deltas computed");

    let mut last_seen: FloatingOrder = fresh;
    let mut applied = 0usize;

    for (key, delta) in &deltas {
        let request = AddItemRequest {
            stock_id: key.stock_id().to_string(),
            quantity: *delta,
            discounts: key.discount_ids().to_vec(),
        };

        match repo.add_item(order_id, request).await {
            Ok(order) => {
                applied += 1;
                last_seen = order;
            }
            Err(source) => {
                warn!(
                    order_id = %order_id,
                    applied,
                    total,
                    error = %source,
                    "reconciliation aborted mid-batch; applied deltas stay"
                );
                return Err(CheckoutError::PartialReconciliation {
                    order_id: order_id.to_string(),
                    applied,
                    total,
                    source,
                });
            }
        }
    }

    if applied > 0 {
        last_seen = repo.add_taxes(order_id, tax_ids).await?;
    }

    // Park. The add_item responses carried the advancing version, so the
    // conditional write uses the newest one we saw.
    if last_seen.status.can_transition_to(OrderStatus::InProgress) {
        park(repo, order_id, last_seen.version).await?;
    }

    let outcome = if applied > 0 {
        ReconcileOutcome::Applied {
            added_lines: applied,
        }
    } else {
        ReconcileOutcome::NoChanges
    };
    info!(order_id = %order_id, ?outcome, "reconciliation complete");
    Ok(outcome)
}

/// Conditionally moves the order to `in-progress`, refetching once on a
/// version conflict (another terminal wrote between our calls).
async fn park(
    repo: &dyn FloatingOrderRepository,
    order_id: &str,
    expected_version: i64,
) -> CheckoutResult<()> {
    let patch = OrderPatch::status_only(OrderStatus::InProgress, expected_version);
    match repo.update(order_id, patch).await {
        Ok(_) => Ok(()),
        Err(RepositoryError::VersionConflict { current, .. }) => {
            debug!(order_id = %order_id, current, "stale park; refetching and retrying once");
            let fresh = repo.get(order_id).await?;
            if fresh.is_terminal() {
                return Err(CheckoutError::StaleOrder {
                    order_id: order_id.to_string(),
                });
            }
            if !fresh.status.can_transition_to(OrderStatus::InProgress) {
                // Someone else already parked it; nothing left to do.
                return Ok(());
            }
            let retry = OrderPatch::status_only(OrderStatus::InProgress, fresh.version);
            repo.update(order_id, retry).await?;
            Ok(())
        }
        Err(other) => Err(other.into()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{line, MockRepository};
    use std::sync::Arc;

    // -------------------------------------------------------------------------
    // Delta computation (pure)
    // -------------------------------------------------------------------------

    #[test]
    fn test_delta_for_absent_remote_key_is_full_cart_quantity() {
        let cart = vec![line("7", 2, &[])];
        let deltas = compute_deltas(&[], &cart);

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].1, 2);
    }

    #[test]
    fn test_equal_sets_produce_no_deltas() {
        let remote = vec![line("7", 2, &[])];
        let cart = vec![line("7", 2, &[])];
        assert!(compute_deltas(&remote, &cart).is_empty());
    }

    #[test]
    fn test_decreases_are_skipped() {
        // Remote holds MORE than the cart: the engine never shrinks it.
        let remote = vec![line("7", 5, &[])];
        let cart = vec![line("7", 2, &[])];
        assert!(compute_deltas(&remote, &cart).is_empty());
    }

    #[test]
    fn test_split_remote_lines_sum_under_one_key() {
        // Remote carries 2 + 3 under one key; cart wants 7 → delta 2.
        let remote = vec![line("7", 2, &[]), line("7", 3, &[])];
        let cart = vec![line("7", 7, &[])];

        let deltas = compute_deltas(&remote, &cart);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].1, 2);
    }

    #[test]
    fn test_discount_sets_split_keys() {
        let remote = vec![line("7", 2, &[])];
        let cart = vec![line("7", 2, &[]), line("7", 1, &["d1"])];

        let deltas = compute_deltas(&remote, &cart);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].0.discount_ids(), &["d1".to_string()]);
        assert_eq!(deltas[0].1, 1);
    }

    #[test]
    fn test_deltas_are_sorted_for_deterministic_application() {
        let cart = vec![line("9", 1, &[]), line("1", 1, &[]), line("5", 1, &[])];
        let deltas = compute_deltas(&[], &cart);

        let order: Vec<&str> = deltas.iter().map(|(k, _)| k.stock_id()).collect();
        assert_eq!(order, vec!["1", "5", "9"]);
    }

    // -------------------------------------------------------------------------
    // Engine (against the in-memory repository)
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_run_applies_deltas_and_parks() {
        let repo = Arc::new(MockRepository::new());
        let order = repo.seed_order("o1", vec![line("7", 1, &[])]);

        let cart = vec![line("7", 3, &[]), line("8", 2, &[])];
        let outcome = run(repo.as_ref(), &order.id, &cart, &["vat".to_string()])
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Applied { added_lines: 2 });

        let remote = repo.order("o1");
        assert_eq!(remote.status, OrderStatus::InProgress);
        assert_eq!(
            remote.quantity_for_key(&line("7", 0, &[]).fungible_key()),
            3
        );
        assert_eq!(
            remote.quantity_for_key(&line("8", 0, &[]).fungible_key()),
            2
        );
        assert_eq!(repo.calls_named("add_taxes"), 1);
    }

    #[tokio::test]
    async fn test_run_twice_is_idempotent() {
        let repo = Arc::new(MockRepository::new());
        let order = repo.seed_order("o1", vec![]);
        let cart = vec![line("7", 3, &[])];

        run(repo.as_ref(), &order.id, &cart, &[]).await.unwrap();
        let adds_after_first = repo.calls_named("add_item");

        let second = run(repo.as_ref(), &order.id, &cart, &[]).await.unwrap();

        assert_eq!(second, ReconcileOutcome::NoChanges);
        assert_eq!(repo.calls_named("add_item"), adds_after_first);
    }

    #[tokio::test]
    async fn test_no_op_still_parks() {
        // Scenario: cart matches the remote order exactly. No add-item call,
        // but the order still moves to in-progress.
        let repo = Arc::new(MockRepository::new());
        let order = repo.seed_order("o1", vec![line("7", 2, &[])]);

        let cart = vec![line("7", 2, &[])];
        let outcome = run(repo.as_ref(), &order.id, &cart, &[]).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::NoChanges);
        assert_eq!(repo.calls_named("add_item"), 0);
        assert_eq!(repo.order("o1").status, OrderStatus::InProgress);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_applied_deltas() {
        let repo = Arc::new(MockRepository::new());
        let order = repo.seed_order("o1", vec![]);
        repo.fail_add_item_after(1);

        let cart = vec![line("1", 1, &[]), line("2", 1, &[]), line("3", 1, &[])];
        let err = run(repo.as_ref(), &order.id, &cart, &[]).await.unwrap_err();

        match err {
            CheckoutError::PartialReconciliation { applied, total, .. } => {
                assert_eq!(applied, 1);
                assert_eq!(total, 3);
            }
            other => panic!("expected PartialReconciliation, got {other:?}"),
        }

        // The first delta landed and stays.
        assert_eq!(
            repo.order("o1")
                .quantity_for_key(&line("1", 0, &[]).fungible_key()),
            1
        );

        // Retry finishes the remaining keys without re-adding the first.
        repo.clear_failure();
        let outcome = run(repo.as_ref(), &order.id, &cart, &[]).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied { added_lines: 2 });
        assert_eq!(
            repo.order("o1")
                .quantity_for_key(&line("1", 0, &[]).fungible_key()),
            1
        );
    }

    #[tokio::test]
    async fn test_terminal_order_is_stale() {
        let repo = Arc::new(MockRepository::new());
        let order = repo.seed_order("o1", vec![]);
        repo.set_status("o1", OrderStatus::Billed);

        let err = run(repo.as_ref(), &order.id, &[line("7", 1, &[])], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::StaleOrder { .. }));
    }
}
