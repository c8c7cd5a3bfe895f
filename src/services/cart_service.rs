use axum::http::StatusCode;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartList, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartItem,
    response::{ApiResponse, Meta},
    state::AppState,
    values::Quantity,
};

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let items = state
        .policy
        .idempotent("get_cart", || state.store.get_cart(user.user_id))
        .await?;

    let total = items.len() as i64;
    let meta = Meta::new(1, total, total);
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

/// Adds to the caller's line for the product, creating it when missing.
/// Returns 201 for a new line and 200 when an existing line was incremented.
pub async fn upsert_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<(StatusCode, ApiResponse<CartItem>)> {
    let quantity = Quantity::new(payload.quantity)?;
    let _guard = state.cart_locks.acquire(user.user_id).await;

    let product = state
        .policy
        .idempotent("get_product", || state.store.get_product(payload.product_id))
        .await?
        .ok_or_else(|| AppError::NotFound("product not found".into()))?;

    let upserted = state
        .policy
        .once(
            "upsert_item",
            state
                .store
                .upsert_item(user.user_id, &product.snapshot(), quantity, state.clock.now()),
        )
        .await?;

    log_audit(
        state,
        Some(user.user_id),
        "cart_update",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await;

    let (status, message) = if upserted.created {
        (StatusCode::CREATED, "Item added to cart")
    } else {
        (StatusCode::OK, "Quantity updated")
    };
    Ok((status, ApiResponse::success(message, upserted.item, None)))
}

/// Sets the quantity as given. Non-positive values are stored and rejected at
/// checkout.
pub async fn update_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let _guard = state.cart_locks.acquire(user.user_id).await;
    let now = state.clock.now();
    let item = state
        .policy
        .idempotent("update_quantity", || {
            state
                .store
                .update_quantity(user.user_id, product_id, payload.quantity, now)
        })
        .await?
        .ok_or_else(|| AppError::NotFound("cart item not found".into()))?;

    log_audit(
        state,
        Some(user.user_id),
        "cart_set_quantity",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id, "quantity": payload.quantity })),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart item updated successfully",
        item,
        Some(Meta::empty()),
    ))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let _guard = state.cart_locks.acquire(user.user_id).await;
    let removed = state
        .policy
        .once("remove_item", state.store.remove_item(user.user_id, product_id))
        .await?;

    if !removed {
        return Err(AppError::NotFound("cart item not found".into()));
    }

    log_audit(
        state,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Item removed from cart successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let _guard = state.cart_locks.acquire(user.user_id).await;
    let removed = state
        .policy
        .idempotent("clear_cart", || state.store.clear_cart(user.user_id))
        .await?;

    if removed > 0 {
        log_audit(
            state,
            Some(user.user_id),
            "cart_clear",
            Some("cart_items"),
            Some(serde_json::json!({ "removed": removed })),
        )
        .await;
    }

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({ "removed": removed }),
        Some(Meta::empty()),
    ))
}
