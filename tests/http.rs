use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use storefront_api::{
    middleware::auth::issue_token,
    models::{NewProduct, NewUserProfile, ROLE_ADMIN, ROLE_USER},
    routes::create_api_router,
    state::AppState,
    store::{CatalogStore, StorePolicy, UserProfileStore, memory::MemoryStore},
    values::Price,
};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "http-test-secret";

struct TestApp {
    router: Router,
    store: MemoryStore,
    user_token: String,
    admin_token: String,
}

async fn app() -> anyhow::Result<TestApp> {
    let store = MemoryStore::new();
    let state = AppState::new(Arc::new(store.clone()), StorePolicy::default(), SECRET);

    let user = store
        .create_profile(
            NewUserProfile {
                email: "user@example.com".into(),
                name: "User".into(),
                role: ROLE_USER.into(),
            },
            Utc::now(),
        )
        .await?;
    let admin = store
        .create_profile(
            NewUserProfile {
                email: "admin@example.com".into(),
                name: "Admin".into(),
                role: ROLE_ADMIN.into(),
            },
            Utc::now(),
        )
        .await?;

    Ok(TestApp {
        router: Router::new()
            .nest("/api", create_api_router())
            .with_state(state),
        store,
        user_token: issue_token(SECRET, user.id, ROLE_USER, Duration::hours(1))?,
        admin_token: issue_token(SECRET, admin.id, ROLE_ADMIN, Duration::hours(1))?,
    })
}

impl TestApp {
    async fn product(&self, price: i64) -> anyhow::Result<Uuid> {
        let product = self
            .store
            .create_product(
                NewProduct {
                    name: "Widget".into(),
                    description: Some("A widget".into()),
                    price: Price::new(price)?,
                    image_url: None,
                },
                Utc::now(),
            )
            .await?;
        Ok(product.id)
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, json))
    }
}

#[tokio::test]
async fn cart_requires_a_valid_token() -> anyhow::Result<()> {
    let app = app().await?;

    let (status, body) = app.send("GET", "/api/cart", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["data"]["error"].is_string());

    let (status, _) = app.send("GET", "/api/cart", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = issue_token("other-secret", Uuid::new_v4(), ROLE_USER, Duration::hours(1))?;
    let (status, _) = app.send("GET", "/api/cart", Some(&forged), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn catalog_is_public() -> anyhow::Result<()> {
    let app = app().await?;
    let id = app.product(1500).await?;

    let (status, body) = app.send("GET", "/api/products", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], json!(id));
    assert_eq!(body["meta"]["total"], json!(1));

    let (status, body) = app
        .send("GET", &format!("/api/products/{id}"), None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], json!(1500));

    let (status, _) = app
        .send("GET", &format!("/api/products/{}", Uuid::new_v4()), None, None)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn product_search_and_price_filter() -> anyhow::Result<()> {
    let app = app().await?;
    app.product(100).await?;
    app.product(900).await?;

    let (status, body) = app
        .send("GET", "/api/products?q=widg&min_price=500", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], json!(1));
    assert_eq!(body["data"][0]["price"], json!(900));

    let (_, body) = app
        .send("GET", "/api/products?sort_by=price&sort_order=asc", None, None)
        .await?;
    assert_eq!(body["data"][0]["price"], json!(100));

    let (status, body) = app
        .send("GET", "/api/products?page=2&per_page=1", None, None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["page"], json!(2));
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn only_admins_create_products() -> anyhow::Result<()> {
    let app = app().await?;
    let payload = json!({ "name": "Mug", "description": null, "price": 1200, "image_url": null });

    let (status, _) = app
        .send("POST", "/api/products", Some(&app.user_token), Some(payload.clone()))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send("POST", "/api/products", Some(&app.admin_token), Some(payload))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], json!("Mug"));
    assert_eq!(body["data"]["reviews"], json!([]));

    let (status, _) = app
        .send(
            "POST",
            "/api/products",
            Some(&app.admin_token),
            Some(json!({ "name": "Bad", "price": -1 })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn add_to_cart_reports_created_then_updated() -> anyhow::Result<()> {
    let app = app().await?;
    let id = app.product(10).await?;
    let token = Some(app.user_token.as_str());

    let (status, body) = app
        .send("POST", "/api/cart", token, Some(json!({ "product_id": id, "quantity": 2 })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["quantity"], json!(2));
    assert_eq!(body["data"]["product"]["unit_price"], json!(10));

    let (status, body) = app
        .send("POST", "/api/cart", token, Some(json!({ "product_id": id, "quantity": 3 })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], json!(5));

    let (status, _) = app
        .send("POST", "/api/cart", token, Some(json!({ "product_id": id, "quantity": 0 })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send("GET", "/api/cart", token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn checkout_over_http() -> anyhow::Result<()> {
    let app = app().await?;
    let id = app.product(10).await?;
    let token = Some(app.user_token.as_str());

    let (status, body) = app.send("POST", "/api/cart/checkout", token, None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["error"], json!("Cart is empty"));

    app.send("POST", "/api/cart", token, Some(json!({ "product_id": id, "quantity": 2 })))
        .await?;
    let (status, body) = app.send("POST", "/api/cart/checkout", token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Checkout successful"));
    assert_eq!(body["data"]["items"][0]["total_price"], json!(20));
    assert_eq!(body["data"]["items"][0]["status"], json!("Pending"));

    let (status, body) = app.send("GET", "/api/orders", token, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], json!(1));

    let (_, body) = app.send("GET", "/api/users/me", token, None).await?;
    assert_eq!(body["data"]["purchased_products"], json!([id]));
    Ok(())
}

#[tokio::test]
async fn edit_remove_and_clear_cart_lines() -> anyhow::Result<()> {
    let app = app().await?;
    let id = app.product(10).await?;
    let token = Some(app.user_token.as_str());
    app.send("POST", "/api/cart", token, Some(json!({ "product_id": id, "quantity": 1 })))
        .await?;

    let (status, body) = app
        .send("PUT", &format!("/api/cart/{id}"), token, Some(json!({ "quantity": 4 })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], json!(4));

    let (status, _) = app
        .send("DELETE", &format!("/api/cart/{id}"), token, None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send("PUT", &format!("/api/cart/{id}"), token, Some(json!({ "quantity": 4 })))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("DELETE", "/api/cart", token, None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn reviews_over_http() -> anyhow::Result<()> {
    let app = app().await?;
    let id = app.product(10).await?;
    let token = Some(app.user_token.as_str());
    let review = json!({ "name": "User", "rating": 4, "comment": "solid" });
    let uri = format!("/api/products/{id}/reviews");

    let (status, _) = app.send("POST", &uri, token, Some(review.clone())).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            "POST",
            &format!("/api/products/{}/reviews", Uuid::new_v4()),
            token,
            Some(review.clone()),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.send("POST", "/api/cart", token, Some(json!({ "product_id": id, "quantity": 1 })))
        .await?;
    app.send("POST", "/api/cart/checkout", token, None).await?;

    let (status, body) = app.send("POST", &uri, token, Some(review)).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], json!("Review added successfully"));

    let (status, body) = app.send("GET", &uri, None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["rating"], json!(4));
    Ok(())
}
