use crate::{
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::UserProfile,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<UserProfile>> {
    let profile = state
        .policy
        .idempotent("get_profile", || state.store.get_profile(user.user_id))
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    Ok(ApiResponse::success("OK", profile, Some(Meta::empty())))
}
