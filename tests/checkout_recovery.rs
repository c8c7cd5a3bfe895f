use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storefront_api::{
    dto::cart::AddToCartRequest,
    error::AppError,
    middleware::auth::AuthUser,
    models::{
        AuditEntry, CartItem, NewProduct, NewUserProfile, Order, OrderDraft, Product,
        ProductSnapshot, ProductUpdate, ROLE_USER, Review, UserProfile,
    },
    routes::params::Pagination,
    services::{cart_service, order_service},
    state::AppState,
    store::{
        AuditSink, CartStore, CatalogStore, OrderLedger, Page, PageRequest, ProductFilter,
        StoreError, StorePolicy, Upserted, UserProfileStore, memory::MemoryStore,
    },
    values::{Price, Quantity},
};
use uuid::Uuid;

/// Memory store whose cart deletions fail while `broken` is set, which can
/// drop the reply of an order insert after it was applied, and which can stall
/// order inserts.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    broken: Arc<AtomicBool>,
    lose_insert_reply: Arc<AtomicBool>,
    slow_insert: Arc<AtomicBool>,
    deletes_attempted: Arc<AtomicU32>,
}

impl FlakyStore {
    fn deletion_failure(&self) -> Option<StoreError> {
        self.deletes_attempted.fetch_add(1, Ordering::SeqCst);
        self.broken
            .load(Ordering::SeqCst)
            .then(|| StoreError::Unavailable("connection reset".into()))
    }
}

#[async_trait]
impl CatalogStore for FlakyStore {
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, StoreError> {
        self.inner.list_products(filter, page).await
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        self.inner.get_product(id).await
    }

    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        self.inner.create_product(product, now).await
    }

    async fn update_product(
        &self,
        id: Uuid,
        update: ProductUpdate,
    ) -> Result<Option<Product>, StoreError> {
        self.inner.update_product(id, update).await
    }

    async fn append_review(&self, product_id: Uuid, review: &Review) -> Result<bool, StoreError> {
        self.inner.append_review(product_id, review).await
    }
}

#[async_trait]
impl CartStore for FlakyStore {
    async fn get_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>, StoreError> {
        self.inner.get_cart(user_id).await
    }

    async fn upsert_item(
        &self,
        user_id: Uuid,
        product: &ProductSnapshot,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Upserted, StoreError> {
        self.inner.upsert_item(user_id, product, quantity, now).await
    }

    async fn update_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, StoreError> {
        self.inner
            .update_quantity(user_id, product_id, quantity, now)
            .await
    }

    async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, StoreError> {
        self.inner.remove_item(user_id, product_id).await
    }

    async fn delete_items(
        &self,
        user_id: Uuid,
        cart_item_ids: &[Uuid],
    ) -> Result<u64, StoreError> {
        if let Some(err) = self.deletion_failure() {
            return Err(err);
        }
        self.inner.delete_items(user_id, cart_item_ids).await
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, StoreError> {
        if let Some(err) = self.deletion_failure() {
            return Err(err);
        }
        self.inner.clear_cart(user_id).await
    }
}

#[async_trait]
impl OrderLedger for FlakyStore {
    async fn insert_orders(&self, drafts: Vec<OrderDraft>) -> Result<Vec<Order>, StoreError> {
        if self.slow_insert.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        let orders = self.inner.insert_orders(drafts).await?;
        if self.lose_insert_reply.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reply lost".into()));
        }
        Ok(orders)
    }

    async fn orders_for_cart_items(
        &self,
        user_id: Uuid,
        cart_item_ids: &[Uuid],
    ) -> Result<Vec<Order>, StoreError> {
        self.inner.orders_for_cart_items(user_id, cart_item_ids).await
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError> {
        self.inner.list_orders(user_id, page).await
    }
}

#[async_trait]
impl UserProfileStore for FlakyStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        self.inner.get_profile(user_id).await
    }

    async fn create_profile(
        &self,
        profile: NewUserProfile,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, StoreError> {
        self.inner.create_profile(profile, now).await
    }

    async fn append_purchases(
        &self,
        user_id: Uuid,
        product_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.append_purchases(user_id, product_ids, now).await
    }
}

#[async_trait]
impl AuditSink for FlakyStore {
    async fn record_audit(&self, entry: AuditEntry, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.record_audit(entry, now).await
    }
}

async fn setup() -> anyhow::Result<(FlakyStore, AppState, AuthUser, Uuid)> {
    let store = FlakyStore::default();
    let policy = StorePolicy {
        call_timeout: Duration::from_secs(1),
        max_attempts: 3,
        backoff: Duration::from_millis(1),
    };
    let state = AppState::new(Arc::new(store.clone()), policy, "test-secret");

    let profile = store
        .create_profile(
            NewUserProfile {
                email: "shopper@example.com".into(),
                name: "Shopper".into(),
                role: ROLE_USER.into(),
            },
            Utc::now(),
        )
        .await?;
    let product = store
        .create_product(
            NewProduct {
                name: "Widget".into(),
                description: None,
                price: Price::new(10)?,
                image_url: None,
            },
            Utc::now(),
        )
        .await?;
    let user = AuthUser {
        user_id: profile.id,
        role: profile.role,
    };

    cart_service::upsert_item(
        &state,
        &user,
        AddToCartRequest {
            product_id: product.id,
            quantity: 2,
        },
    )
    .await?;

    Ok((store, state, user, product.id))
}

async fn order_count(state: &AppState, user: &AuthUser) -> anyhow::Result<usize> {
    let resp = order_service::list_orders(state, user, Pagination::default()).await?;
    Ok(resp.data.map(|d| d.items.len()).unwrap_or_default())
}

#[tokio::test]
async fn failed_cleanup_is_reported_and_finished_by_the_next_checkout() -> anyhow::Result<()> {
    let (store, state, user, product_id) = setup().await?;
    store.broken.store(true, Ordering::SeqCst);

    let err = order_service::checkout(&state, &user)
        .await
        .expect_err("cart could not be cleared");
    assert!(matches!(err, AppError::Inconsistent(_)), "got {err:?}");
    // retried up to the policy budget
    assert_eq!(store.deletes_attempted.load(Ordering::SeqCst), 3);
    assert_eq!(order_count(&state, &user).await?, 1);
    assert_eq!(store.get_cart(user.user_id).await?.len(), 1);

    store.broken.store(false, Ordering::SeqCst);
    let err = order_service::checkout(&state, &user)
        .await
        .expect_err("cart was already ordered");
    assert!(matches!(err, AppError::Inconsistent(_)), "got {err:?}");

    assert!(store.get_cart(user.user_id).await?.is_empty());
    assert_eq!(order_count(&state, &user).await?, 1);
    let profile = store.get_profile(user.user_id).await?.expect("profile");
    assert!(profile.has_purchased(product_id));

    let err = order_service::checkout(&state, &user)
        .await
        .expect_err("nothing left");
    assert!(matches!(err, AppError::EmptyCart));
    Ok(())
}

#[tokio::test]
async fn lost_insert_reply_is_not_retried_into_duplicates() -> anyhow::Result<()> {
    let (store, state, user, product_id) = setup().await?;
    store.lose_insert_reply.store(true, Ordering::SeqCst);

    let err = order_service::checkout(&state, &user)
        .await
        .expect_err("reply was lost");
    assert!(matches!(err, AppError::TransientStoreFailure(_)), "got {err:?}");
    assert_eq!(order_count(&state, &user).await?, 1);

    let err = order_service::checkout(&state, &user)
        .await
        .expect_err("orders already recorded");
    assert!(matches!(err, AppError::Inconsistent(_)), "got {err:?}");
    assert_eq!(order_count(&state, &user).await?, 1);
    assert!(store.get_cart(user.user_id).await?.is_empty());

    let profile = store.get_profile(user.user_id).await?.expect("profile");
    assert!(profile.has_purchased(product_id));
    Ok(())
}

#[tokio::test]
async fn ledger_rejects_a_second_order_for_the_same_cart_line() -> anyhow::Result<()> {
    let (store, _state, user, _) = setup().await?;
    let cart = store.get_cart(user.user_id).await?;
    let quantity = Quantity::new(cart[0].quantity)?;
    let draft = OrderDraft::from_cart_item(&cart[0], quantity, Utc::now())?;

    store.insert_orders(vec![draft.clone()]).await?;
    let err = store
        .insert_orders(vec![draft])
        .await
        .expect_err("duplicate cart line");
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(AppError::from(err).status().as_u16(), 409);
    Ok(())
}

#[tokio::test]
async fn cart_writes_during_checkout_are_kept() -> anyhow::Result<()> {
    let (store, state, user, widget_id) = setup().await?;
    let gadget = store
        .create_product(
            NewProduct {
                name: "Gadget".into(),
                description: None,
                price: Price::new(7)?,
                image_url: None,
            },
            Utc::now(),
        )
        .await?;
    store.slow_insert.store(true, Ordering::SeqCst);

    let (shared_state, shopper) = (&state, &user);
    // lands while the order insert is stalled
    let add = move |product_id, quantity| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cart_service::upsert_item(shared_state, shopper, AddToCartRequest { product_id, quantity })
            .await
    };
    let (checkout, new_line, increment) = tokio::join!(
        order_service::checkout(&state, &user),
        add(gadget.id, 4),
        add(widget_id, 3),
    );

    let ordered: Vec<(Uuid, i32)> = checkout?
        .data
        .expect("orders")
        .items
        .iter()
        .map(|o| (o.product_id, o.quantity))
        .collect();
    assert_eq!(ordered, vec![(widget_id, 2)]);
    new_line?;
    increment?;

    let mut cart: Vec<(Uuid, i32)> = store
        .get_cart(user.user_id)
        .await?
        .iter()
        .map(|item| (item.product.product_id, item.quantity))
        .collect();
    cart.sort();
    let mut expected = vec![(gadget.id, 4), (widget_id, 3)];
    expected.sort();
    assert_eq!(cart, expected);
    Ok(())
}
