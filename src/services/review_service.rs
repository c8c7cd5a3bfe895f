use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::reviews::{AddReviewRequest, ReviewList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Meta},
    state::AppState,
    values::Rating,
};

/// Appends a review from a user who has checked the product out before.
///
/// The reviewer name comes from the request body as-is, and a purchaser may
/// review the same product any number of times.
pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: AddReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let rating = Rating::new(payload.rating)?;

    let product_exists = state
        .policy
        .idempotent("get_product", || state.store.get_product(product_id))
        .await?
        .is_some();
    if !product_exists {
        return Err(AppError::NotFound("product not found".into()));
    }

    let profile = state
        .policy
        .idempotent("get_profile", || state.store.get_profile(user.user_id))
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    if !profile.has_purchased(product_id) {
        return Err(AppError::Forbidden(
            "only customers who bought this product can review it".into(),
        ));
    }

    let review = Review {
        name: payload.name,
        rating: rating.get(),
        comment: payload.comment,
        created_at: state.clock.now(),
    };

    let appended = state
        .policy
        .once("append_review", state.store.append_review(product_id, &review))
        .await?;
    if !appended {
        return Err(AppError::NotFound("product not found".into()));
    }

    log_audit(
        state,
        Some(user.user_id),
        "review_add",
        Some("reviews"),
        Some(serde_json::json!({ "product_id": product_id, "rating": review.rating })),
    )
    .await;

    Ok(ApiResponse::success(
        "Review added successfully",
        review,
        Some(Meta::empty()),
    ))
}

pub async fn list_reviews(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<ReviewList>> {
    let product = state
        .policy
        .idempotent("get_product", || state.store.get_product(product_id))
        .await?
        .ok_or_else(|| AppError::NotFound("product not found".into()))?;

    let total = product.reviews.len() as i64;
    Ok(ApiResponse::success(
        "Reviews",
        ReviewList {
            items: product.reviews,
        },
        Some(Meta::new(1, total, total)),
    ))
}
