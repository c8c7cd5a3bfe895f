use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    models::{
        AuditEntry, CartItem, NewProduct, NewUserProfile, Order, OrderDraft, Product,
        ProductSnapshot, ProductUpdate, Review, UserProfile,
    },
    store::{
        AuditSink, CartStore, CatalogStore, OrderLedger, Page, PageRequest, ProductFilter,
        ProductSort, StoreError, Upserted, UserProfileStore,
    },
    values::Quantity,
};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, UserProfile>,
    products: Vec<Product>,
    cart: Vec<CartItem>,
    orders: Vec<Order>,
    audit: Vec<(AuditEntry, DateTime<Utc>)>,
    writes: u64,
}

/// In-process backend. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls that changed something. Audit entries do not count.
    pub async fn write_count(&self) -> u64 {
        self.state.lock().await.writes
    }

    pub async fn audit_actions(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .audit
            .iter()
            .map(|(entry, _)| entry.action.clone())
            .collect()
    }
}

fn paginate<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
    items.iter().skip(offset).take(limit).cloned().collect()
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, StoreError> {
        let state = self.state.lock().await;
        let search = filter
            .search
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase());

        let mut matched: Vec<Product> = state
            .products
            .iter()
            .filter(|p| {
                search.as_ref().is_none_or(|needle| {
                    p.name.to_lowercase().contains(needle)
                        || p
                            .description
                            .as_ref()
                            .is_some_and(|d| d.to_lowercase().contains(needle))
                })
            })
            .filter(|p| filter.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| filter.max_price.is_none_or(|max| p.price <= max))
            .cloned()
            .collect();

        match filter.sort {
            ProductSort::CreatedAt => matched.sort_by_key(|p| p.created_at),
            ProductSort::Price => matched.sort_by_key(|p| p.price),
            ProductSort::Name => matched.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        if filter.descending {
            matched.reverse();
        }

        Ok(Page {
            total: matched.len() as u64,
            items: paginate(&matched, page),
        })
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        let mut state = self.state.lock().await;
        let product = Product {
            id: Uuid::new_v4(),
            name: product.name,
            description: product.description,
            price: product.price.get(),
            image_url: product.image_url,
            reviews: Vec::new(),
            created_at: now,
        };
        state.products.push(product.clone());
        state.writes += 1;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        update: ProductUpdate,
    ) -> Result<Option<Product>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(product) = state.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(description) = update.description {
            product.description = Some(description);
        }
        if let Some(price) = update.price {
            product.price = price.get();
        }
        if let Some(image_url) = update.image_url {
            product.image_url = Some(image_url);
        }
        let updated = product.clone();
        state.writes += 1;
        Ok(Some(updated))
    }

    async fn append_review(&self, product_id: Uuid, review: &Review) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(product) = state.products.iter_mut().find(|p| p.id == product_id) else {
            return Ok(false);
        };
        product.append_review(review.clone());
        state.writes += 1;
        Ok(true)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>, StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<CartItem> = state
            .cart
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.created_at);
        Ok(items)
    }

    async fn upsert_item(
        &self,
        user_id: Uuid,
        product: &ProductSnapshot,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Upserted, StoreError> {
        let mut state = self.state.lock().await;
        let existing = state
            .cart
            .iter_mut()
            .find(|item| item.user_id == user_id && item.product.product_id == product.product_id);

        let upserted = match existing {
            Some(item) => {
                item.quantity = item.quantity.checked_add(quantity.get()).ok_or_else(|| {
                    StoreError::OutOfRange(format!(
                        "quantity for product {} is out of range",
                        product.product_id
                    ))
                })?;
                item.updated_at = now;
                Upserted {
                    item: item.clone(),
                    created: false,
                }
            }
            None => {
                let item = CartItem {
                    id: Uuid::new_v4(),
                    user_id,
                    product: product.clone(),
                    quantity: quantity.get(),
                    created_at: now,
                    updated_at: now,
                };
                state.cart.push(item.clone());
                Upserted {
                    item,
                    created: true,
                }
            }
        };
        state.writes += 1;
        Ok(upserted)
    }

    async fn update_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(item) = state
            .cart
            .iter_mut()
            .find(|item| item.user_id == user_id && item.product.product_id == product_id)
        else {
            return Ok(None);
        };
        item.quantity = quantity;
        item.updated_at = now;
        let updated = item.clone();
        state.writes += 1;
        Ok(Some(updated))
    }

    async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.cart.len();
        state
            .cart
            .retain(|item| !(item.user_id == user_id && item.product.product_id == product_id));
        let removed = state.cart.len() < before;
        if removed {
            state.writes += 1;
        }
        Ok(removed)
    }

    async fn delete_items(
        &self,
        user_id: Uuid,
        cart_item_ids: &[Uuid],
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.cart.len();
        state
            .cart
            .retain(|item| !(item.user_id == user_id && cart_item_ids.contains(&item.id)));
        let deleted = (before - state.cart.len()) as u64;
        if deleted > 0 {
            state.writes += 1;
        }
        Ok(deleted)
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.cart.len();
        state.cart.retain(|item| item.user_id != user_id);
        let deleted = (before - state.cart.len()) as u64;
        if deleted > 0 {
            state.writes += 1;
        }
        Ok(deleted)
    }
}

#[async_trait]
impl OrderLedger for MemoryStore {
    async fn insert_orders(&self, drafts: Vec<OrderDraft>) -> Result<Vec<Order>, StoreError> {
        let mut state = self.state.lock().await;

        for (i, draft) in drafts.iter().enumerate() {
            let seen_in_batch = drafts
                .iter()
                .take(i)
                .any(|other| other.cart_item_id == draft.cart_item_id);
            let seen_in_ledger = state
                .orders
                .iter()
                .any(|order| order.cart_item_id == draft.cart_item_id);
            if seen_in_batch || seen_in_ledger {
                return Err(StoreError::Conflict(format!(
                    "an order for cart item {} already exists",
                    draft.cart_item_id
                )));
            }
        }

        let orders: Vec<Order> = drafts
            .into_iter()
            .map(|draft| draft.into_order(Uuid::new_v4()))
            .collect();
        if !orders.is_empty() {
            state.orders.extend(orders.iter().cloned());
            state.writes += 1;
        }
        Ok(orders)
    }

    async fn orders_for_cart_items(
        &self,
        user_id: Uuid,
        cart_item_ids: &[Uuid],
    ) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .filter(|order| order.user_id == user_id && cart_item_ids.contains(&order.cart_item_id))
            .cloned()
            .collect())
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        // newest first, ties keep insertion order
        orders.reverse();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page {
            total: orders.len() as u64,
            items: paginate(&orders, page),
        })
    }
}

#[async_trait]
impl UserProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&user_id).cloned())
    }

    async fn create_profile(
        &self,
        profile: NewUserProfile,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, StoreError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.email == profile.email) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                profile.email
            )));
        }
        let user = UserProfile {
            id: Uuid::new_v4(),
            email: profile.email,
            name: profile.name,
            role: profile.role,
            purchased_products: Vec::new(),
            created_at: now,
        };
        state.users.insert(user.id, user.clone());
        state.writes += 1;
        Ok(user)
    }

    async fn append_purchases(
        &self,
        user_id: Uuid,
        product_ids: &[Uuid],
        _now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::Corrupt(format!("no profile for user {user_id}")))?;

        let mut added = false;
        for product_id in product_ids {
            if !user.purchased_products.contains(product_id) {
                user.purchased_products.push(*product_id);
                added = true;
            }
        }
        if added {
            state.writes += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record_audit(&self, entry: AuditEntry, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.audit.push((entry, now));
        Ok(())
    }
}
