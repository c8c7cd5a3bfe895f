use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{NewProduct, Product, ProductUpdate},
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    state::AppState,
    values::Price,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, request) = query.pagination().page_request();
    let filter = query.filter();

    let result = state
        .policy
        .idempotent("list_products", || state.store.list_products(&filter, request))
        .await?;

    let meta = Meta::new(page, limit, result.total as i64);
    let data = ProductList {
        items: result.items,
    };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let result = state
        .policy
        .idempotent("get_product", || state.store.get_product(id))
        .await?;
    let result = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound("product not found".into())),
    };
    Ok(ApiResponse::success("Product", result, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let name = required_name(payload.name)?;
    let price = Price::new(payload.price)?;

    let product = state
        .policy
        .once(
            "create_product",
            state.store.create_product(
                NewProduct {
                    name,
                    description: payload.description,
                    price,
                    image_url: payload.image_url,
                },
                state.clock.now(),
            ),
        )
        .await?;

    log_audit(
        state,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product added successfully",
        product,
        Some(Meta::empty()),
    ))
}

/// Changes catalog fields. Cart lines and orders keep the price they captured.
pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    let update = ProductUpdate {
        name: payload.name.map(required_name).transpose()?,
        description: payload.description,
        price: payload.price.map(Price::new).transpose()?,
        image_url: payload.image_url,
    };

    let product = state
        .policy
        .idempotent("update_product", || state.store.update_product(id, update.clone()))
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound("product not found".into())),
    };

    log_audit(
        state,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await;

    Ok(ApiResponse::success(
        "Product updated successfully",
        product,
        Some(Meta::empty()),
    ))
}

fn required_name(name: String) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidArgument("name is required".into()));
    }
    Ok(trimmed.to_string())
}
