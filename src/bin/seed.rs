use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::users::{Column as UserColumn, Entity as Users},
    middleware::auth::issue_token,
    models::{NewProduct, NewUserProfile, ROLE_ADMIN, ROLE_USER},
    store::{CatalogStore, PageRequest, ProductFilter, UserProfileStore, sea::SeaStore},
    values::Price,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(config.database_url()?).await?;
    run_migrations(&orm).await?;
    let store = SeaStore::new(orm);

    let admin_id = ensure_profile(&store, "admin@example.com", "Admin", ROLE_ADMIN).await?;
    let user_id = ensure_profile(&store, "user@example.com", "Shopper", ROLE_USER).await?;
    seed_products(&store).await?;

    let ttl = Duration::days(30);
    let admin_token = issue_token(&config.jwt_secret, admin_id, ROLE_ADMIN, ttl)?;
    let user_token = issue_token(&config.jwt_secret, user_id, ROLE_USER, ttl)?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    println!("Admin token: {admin_token}");
    println!("User token: {user_token}");
    Ok(())
}

async fn ensure_profile(
    store: &SeaStore,
    email: &str,
    name: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let existing = Users::find()
        .filter(UserColumn::Email.eq(email))
        .one(store.connection())
        .await?;
    if let Some(user) = existing {
        println!("User {email} already exists");
        return Ok(user.id);
    }

    let profile = store
        .create_profile(
            NewUserProfile {
                email: email.to_string(),
                name: name.to_string(),
                role: role.to_string(),
            },
            Utc::now(),
        )
        .await?;
    println!("Created user {email} (role={role})");
    Ok(profile.id)
}

async fn seed_products(store: &SeaStore) -> anyhow::Result<()> {
    let existing = store
        .list_products(&ProductFilter::default(), PageRequest { limit: 1, offset: 0 })
        .await?;
    if existing.total > 0 {
        println!("Catalog already has {} products, skipping", existing.total);
        return Ok(());
    }

    let products = vec![
        ("Axum Hoodie", "Warm hoodie for Rustaceans", 5500),
        ("Ferris Mug", "Coffee tastes better with Ferris", 1200),
        ("Rust Sticker Pack", "Decorate your laptop", 500),
        ("E-book: Async Rust", "Learn async Rust patterns", 2500),
    ];

    for (name, desc, price) in products {
        store
            .create_product(
                NewProduct {
                    name: name.to_string(),
                    description: Some(desc.to_string()),
                    price: Price::new(price)?,
                    image_url: None,
                },
                Utc::now(),
            )
            .await?;
    }

    println!("Seeded products");
    Ok(())
}
