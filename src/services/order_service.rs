//! Checkout and order history.
//!
//! Checkout turns every cart line into one order priced at the unit price
//! captured when the line was added. The ledger write goes first. The steps
//! after it (purchase history, cart clearing) are idempotent, and an
//! interrupted checkout is finished by the next call to checkout.
//!
//! Every order carries the id of the cart row it came from and the ledger
//! rejects a second order for the same row. Together with the per-user lock
//! this stops two checkouts of the same cart from both being recorded.

use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::OrderList,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderDraft},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
    store::StoreError,
    values::Quantity,
};

pub async fn checkout(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderList>> {
    let user_id = user.user_id;
    let _guard = state.cart_locks.acquire(user_id).await;

    let cart = state
        .policy
        .idempotent("get_cart", || state.store.get_cart(user_id))
        .await?;
    if cart.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let mut lines = Vec::with_capacity(cart.len());
    for item in &cart {
        let quantity = Quantity::new(item.quantity).map_err(|_| {
            AppError::InvalidArgument(format!(
                "cart line for product {} has invalid quantity {}",
                item.product.product_id, item.quantity
            ))
        })?;
        lines.push((item, quantity));
    }

    let cart_item_ids: Vec<Uuid> = cart.iter().map(|item| item.id).collect();
    let recorded = state
        .policy
        .idempotent("orders_for_cart_items", || {
            state.store.orders_for_cart_items(user_id, &cart_item_ids)
        })
        .await?;
    if !recorded.is_empty() {
        return Err(finish_interrupted_checkout(state, user_id, recorded).await);
    }

    let now = state.clock.now();
    let drafts = lines
        .into_iter()
        .map(|(item, quantity)| OrderDraft::from_cart_item(item, quantity, now))
        .collect::<AppResult<Vec<_>>>()?;
    let product_ids: Vec<Uuid> = drafts.iter().map(|draft| draft.product_id).collect();

    // not retried: a lost reply here is resolved by the next checkout call
    let orders = state
        .policy
        .once("insert_orders", state.store.insert_orders(drafts))
        .await
        .map_err(|err| match err {
            StoreError::Conflict(detail) => {
                AppError::Inconsistent(format!("cart was already checked out: {detail}"))
            }
            other => other.into(),
        })?;
    tracing::info!(user_id = %user_id, orders = orders.len(), "orders recorded");

    if let Err(err) = complete_checkout(state, user_id, &product_ids, &cart_item_ids).await {
        tracing::error!(user_id = %user_id, error = %err, "checkout cleanup failed after orders were recorded");
        return Err(AppError::Inconsistent(format!(
            "{} orders were recorded but the cart may not have been cleared ({err}); retry checkout to finish",
            orders.len()
        )));
    }

    log_audit(
        state,
        Some(user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_ids": orders.iter().map(|order| order.id).collect::<Vec<_>>(),
        })),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout successful",
        OrderList { items: orders },
        Some(Meta::empty()),
    ))
}

/// Purchase history, then removal of the ordered cart rows. Rows added after
/// the cart was read are left alone.
async fn complete_checkout(
    state: &AppState,
    user_id: Uuid,
    product_ids: &[Uuid],
    cart_item_ids: &[Uuid],
) -> Result<(), StoreError> {
    let now = state.clock.now();
    state
        .policy
        .idempotent("append_purchases", || {
            state.store.append_purchases(user_id, product_ids, now)
        })
        .await?;

    state
        .policy
        .idempotent("delete_items", || {
            state.store.delete_items(user_id, cart_item_ids)
        })
        .await?;
    Ok(())
}

async fn finish_interrupted_checkout(
    state: &AppState,
    user_id: Uuid,
    recorded: Vec<Order>,
) -> AppError {
    let product_ids: Vec<Uuid> = recorded.iter().map(|order| order.product_id).collect();
    let cart_item_ids: Vec<Uuid> = recorded.iter().map(|order| order.cart_item_id).collect();
    tracing::warn!(
        user_id = %user_id,
        orders = recorded.len(),
        "cart still holds lines that were already ordered"
    );

    match complete_checkout(state, user_id, &product_ids, &cart_item_ids).await {
        Ok(()) => AppError::Inconsistent(format!(
            "a previous checkout already recorded {} orders for this cart; those lines have now been removed from the cart",
            recorded.len()
        )),
        Err(err) => AppError::Inconsistent(format!(
            "a previous checkout already recorded {} orders for this cart and cleanup failed again ({err})",
            recorded.len()
        )),
    }
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, request) = pagination.page_request();
    let result = state
        .policy
        .idempotent("list_orders", || state.store.list_orders(user.user_id, request))
        .await?;

    let meta = Meta::new(page, limit, result.total as i64);
    Ok(ApiResponse::success(
        "Ok",
        OrderList {
            items: result.items,
        },
        Some(meta),
    ))
}
