//! Persistence seams for the storefront.
//!
//! Services talk to the collections through these traits so the same checkout
//! and review logic runs against Postgres ([`sea::SeaStore`]) or the in-process
//! [`memory::MemoryStore`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DbErr, RuntimeErr, SqlErr};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{
        AuditEntry, CartItem, NewProduct, NewUserProfile, Order, OrderDraft, Product,
        ProductSnapshot, ProductUpdate, Review, UserProfile,
    },
    values::Quantity,
};

pub mod memory;
pub mod policy;
pub mod sea;

pub use policy::StorePolicy;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// A value does not fit its column, such as a cart quantity past `i32::MAX`.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("ORM error")]
    Orm(#[source] DbErr),
}

impl StoreError {
    /// Whether repeating the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return StoreError::Conflict(detail);
        }
        if postgres_code(&err).as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE) {
            return StoreError::OutOfRange(err.to_string());
        }
        match err {
            DbErr::ConnectionAcquire(e) => StoreError::Unavailable(e.to_string()),
            DbErr::Conn(RuntimeErr::SqlxError(e)) => StoreError::Unavailable(e.to_string()),
            other => StoreError::Orm(other),
        }
    }
}

const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

fn postgres_code(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    CreatedAt,
    Price,
    Name,
}

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring of name or description.
    pub search: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort: ProductSort,
    pub descending: bool,
}

/// Result of adding to a cart: the row as stored and whether it is new.
#[derive(Debug, Clone)]
pub struct Upserted {
    pub item: CartItem,
    pub created: bool,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, StoreError>;

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;

    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError>;

    async fn update_product(
        &self,
        id: Uuid,
        update: ProductUpdate,
    ) -> Result<Option<Product>, StoreError>;

    /// Appends to the product's reviews. `false` when the product is missing.
    async fn append_review(&self, product_id: Uuid, review: &Review) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Oldest line first.
    async fn get_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>, StoreError>;

    /// Adds `quantity` to the user's line for the product, creating it with
    /// `product` as the snapshot if there is none. An existing snapshot is kept.
    async fn upsert_item(
        &self,
        user_id: Uuid,
        product: &ProductSnapshot,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Upserted, StoreError>;

    async fn update_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, StoreError>;

    async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, StoreError>;

    async fn delete_items(&self, user_id: Uuid, cart_item_ids: &[Uuid])
    -> Result<u64, StoreError>;

    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Writes every draft or none of them. A draft whose `cart_item_id` is
    /// already in the ledger fails the whole call with [`StoreError::Conflict`].
    async fn insert_orders(&self, drafts: Vec<OrderDraft>) -> Result<Vec<Order>, StoreError>;

    async fn orders_for_cart_items(
        &self,
        user_id: Uuid,
        cart_item_ids: &[Uuid],
    ) -> Result<Vec<Order>, StoreError>;

    /// Newest first.
    async fn list_orders(&self, user_id: Uuid, page: PageRequest)
    -> Result<Page<Order>, StoreError>;
}

#[async_trait]
pub trait UserProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    async fn create_profile(
        &self,
        profile: NewUserProfile,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, StoreError>;

    /// Set union into the purchase history; repeating it is harmless.
    async fn append_purchases(
        &self,
        user_id: Uuid,
        product_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_audit(&self, entry: AuditEntry, now: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Everything the HTTP layer needs from one backend.
pub trait Store: CatalogStore + CartStore + OrderLedger + UserProfileStore + AuditSink {}

impl<T> Store for T where T: CatalogStore + CartStore + OrderLedger + UserProfileStore + AuditSink {}
