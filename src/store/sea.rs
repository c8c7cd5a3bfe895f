use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, LoaderTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm::sea_query::{Expr, OnConflict, extension::postgres::PgExpr};
use uuid::Uuid;

use crate::{
    entity::{
        audit_logs::ActiveModel as AuditActive,
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems, Model as CartModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products, Model as ProductModel},
        purchased_products::{
            ActiveModel as PurchaseActive, Column as PurchaseCol, Entity as PurchasedProducts,
        },
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews, Model as ReviewModel},
        users::{ActiveModel as UserActive, Entity as Users, Model as UserModel},
    },
    models::{
        AuditEntry, CartItem, NewProduct, NewUserProfile, Order, OrderDraft, OrderStatus, Product,
        ProductSnapshot, ProductUpdate, Review, UserProfile,
    },
    store::{
        AuditSink, CartStore, CatalogStore, OrderLedger, Page, PageRequest, ProductFilter,
        ProductSort, StoreError, Upserted, UserProfileStore,
    },
    values::Quantity,
};

/// Postgres backend built on SeaORM.
#[derive(Debug, Clone)]
pub struct SeaStore {
    orm: DatabaseConnection,
}

impl SeaStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.orm
    }
}

#[async_trait]
impl CatalogStore for SeaStore {
    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<Product>, StoreError> {
        let mut condition = Condition::all();

        if let Some(search) = filter.search.as_ref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            condition = condition.add(
                Condition::any()
                    .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                    .add(Expr::col(ProdCol::Description).ilike(pattern)),
            );
        }
        if let Some(min_price) = filter.min_price {
            condition = condition.add(ProdCol::Price.gte(min_price));
        }
        if let Some(max_price) = filter.max_price {
            condition = condition.add(ProdCol::Price.lte(max_price));
        }

        let sort_col = match filter.sort {
            ProductSort::CreatedAt => ProdCol::CreatedAt,
            ProductSort::Price => ProdCol::Price,
            ProductSort::Name => ProdCol::Name,
        };

        let mut finder = Products::find().filter(condition);
        finder = if filter.descending {
            finder.order_by_desc(sort_col)
        } else {
            finder.order_by_asc(sort_col)
        };

        let total = finder.clone().count(&self.orm).await?;

        let models = finder
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.orm)
            .await?;
        let reviews = models.load_many(Reviews, &self.orm).await?;

        let items = models
            .into_iter()
            .zip(reviews)
            .map(|(model, reviews)| product_from_entity(model, reviews))
            .collect();

        Ok(Page { items, total })
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        let Some(model) = Products::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };
        let reviews = model
            .find_related(Reviews)
            .order_by_asc(ReviewCol::CreatedAt)
            .all(&self.orm)
            .await?;
        Ok(Some(product_from_entity(model, reviews)))
    }

    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, StoreError> {
        let model = ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(product.name),
            description: Set(product.description),
            price: Set(product.price.get()),
            image_url: Set(product.image_url),
            created_at: Set(now.into()),
        }
        .insert(&self.orm)
        .await?;

        Ok(product_from_entity(model, Vec::new()))
    }

    async fn update_product(
        &self,
        id: Uuid,
        update: ProductUpdate,
    ) -> Result<Option<Product>, StoreError> {
        let Some(existing) = Products::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };

        let mut active: ProductActive = existing.into();
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(description) = update.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = update.price {
            active.price = Set(price.get());
        }
        if let Some(image_url) = update.image_url {
            active.image_url = Set(Some(image_url));
        }
        let model = active.update(&self.orm).await?;

        let reviews = model
            .find_related(Reviews)
            .order_by_asc(ReviewCol::CreatedAt)
            .all(&self.orm)
            .await?;
        Ok(Some(product_from_entity(model, reviews)))
    }

    async fn append_review(&self, product_id: Uuid, review: &Review) -> Result<bool, StoreError> {
        let exists = Products::find_by_id(product_id)
            .count(&self.orm)
            .await?
            > 0;
        if !exists {
            return Ok(false);
        }

        ReviewActive {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            reviewer_name: Set(review.name.clone()),
            rating: Set(review.rating),
            comment: Set(review.comment.clone()),
            created_at: Set(review.created_at.into()),
        }
        .insert(&self.orm)
        .await?;

        Ok(true)
    }
}

#[async_trait]
impl CartStore for SeaStore {
    async fn get_cart(&self, user_id: Uuid) -> Result<Vec<CartItem>, StoreError> {
        let items = CartItems::find()
            .filter(CartCol::UserId.eq(user_id))
            .order_by_asc(CartCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(cart_item_from_entity)
            .collect();
        Ok(items)
    }

    async fn upsert_item(
        &self,
        user_id: Uuid,
        product: &ProductSnapshot,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Upserted, StoreError> {
        let proposed_id = Uuid::new_v4();
        let active = CartActive {
            id: Set(proposed_id),
            user_id: Set(user_id),
            product_id: Set(product.product_id),
            product_name: Set(product.name.clone()),
            unit_price: Set(product.unit_price),
            image_url: Set(product.image_url.clone()),
            quantity: Set(quantity.get()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        // single statement so concurrent adds for the same product both count
        let model = CartItems::insert(active)
            .on_conflict(
                OnConflict::columns([CartCol::UserId, CartCol::ProductId])
                    .value(
                        CartCol::Quantity,
                        Expr::cust("cart_items.quantity + EXCLUDED.quantity"),
                    )
                    .value(CartCol::UpdatedAt, Expr::cust("EXCLUDED.updated_at"))
                    .to_owned(),
            )
            .exec_with_returning(&self.orm)
            .await?;

        // a conflicting insert keeps the existing row and its id
        let created = model.id == proposed_id;
        Ok(Upserted {
            item: cart_item_from_entity(model),
            created,
        })
    }

    async fn update_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<CartItem>, StoreError> {
        let updated_at: sea_orm::prelude::DateTimeWithTimeZone = now.into();
        let rows = CartItems::update_many()
            .col_expr(CartCol::Quantity, Expr::value(quantity))
            .col_expr(CartCol::UpdatedAt, Expr::value(updated_at))
            .filter(
                Condition::all()
                    .add(CartCol::UserId.eq(user_id))
                    .add(CartCol::ProductId.eq(product_id)),
            )
            .exec_with_returning(&self.orm)
            .await?;
        Ok(rows.into_iter().next().map(cart_item_from_entity))
    }

    async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, StoreError> {
        let result = CartItems::delete_many()
            .filter(
                Condition::all()
                    .add(CartCol::UserId.eq(user_id))
                    .add(CartCol::ProductId.eq(product_id)),
            )
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_items(
        &self,
        user_id: Uuid,
        cart_item_ids: &[Uuid],
    ) -> Result<u64, StoreError> {
        if cart_item_ids.is_empty() {
            return Ok(0);
        }
        let result = CartItems::delete_many()
            .filter(
                Condition::all()
                    .add(CartCol::UserId.eq(user_id))
                    .add(CartCol::Id.is_in(cart_item_ids.iter().copied())),
            )
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected)
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = CartItems::delete_many()
            .filter(CartCol::UserId.eq(user_id))
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl OrderLedger for SeaStore {
    async fn insert_orders(&self, drafts: Vec<OrderDraft>) -> Result<Vec<Order>, StoreError> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let orders: Vec<Order> = drafts
            .into_iter()
            .map(|draft| draft.into_order(Uuid::new_v4()))
            .collect();

        let rows = orders.iter().map(|order| OrderActive {
            id: Set(order.id),
            user_id: Set(order.user_id),
            product_id: Set(order.product_id),
            cart_item_id: Set(order.cart_item_id),
            quantity: Set(order.quantity),
            total_price: Set(order.total_price),
            status: Set(order.status.as_str().to_string()),
            created_at: Set(order.created_at.into()),
        });

        // one multi-row INSERT, so a duplicate cart_item_id rejects all of them
        Orders::insert_many(rows)
            .exec_without_returning(&self.orm)
            .await?;

        Ok(orders)
    }

    async fn orders_for_cart_items(
        &self,
        user_id: Uuid,
        cart_item_ids: &[Uuid],
    ) -> Result<Vec<Order>, StoreError> {
        if cart_item_ids.is_empty() {
            return Ok(Vec::new());
        }
        Orders::find()
            .filter(
                Condition::all()
                    .add(OrderCol::UserId.eq(user_id))
                    .add(OrderCol::CartItemId.is_in(cart_item_ids.iter().copied())),
            )
            .order_by_asc(OrderCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect()
    }

    async fn list_orders(
        &self,
        user_id: Uuid,
        page: PageRequest,
    ) -> Result<Page<Order>, StoreError> {
        let finder = Orders::find()
            .filter(OrderCol::UserId.eq(user_id))
            .order_by_desc(OrderCol::CreatedAt);

        let total = finder.clone().count(&self.orm).await?;

        let items = finder
            .limit(page.limit)
            .offset(page.offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page { items, total })
    }
}

#[async_trait]
impl UserProfileStore for SeaStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let Some(user) = Users::find_by_id(user_id).one(&self.orm).await? else {
            return Ok(None);
        };
        let purchased = PurchasedProducts::find()
            .filter(PurchaseCol::UserId.eq(user_id))
            .order_by_asc(PurchaseCol::CreatedAt)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(|row| row.product_id)
            .collect();
        Ok(Some(profile_from_entity(user, purchased)))
    }

    async fn create_profile(
        &self,
        profile: NewUserProfile,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, StoreError> {
        let user = UserActive {
            id: Set(Uuid::new_v4()),
            email: Set(profile.email),
            name: Set(profile.name),
            role: Set(profile.role),
            created_at: Set(now.into()),
        }
        .insert(&self.orm)
        .await?;
        Ok(profile_from_entity(user, Vec::new()))
    }

    async fn append_purchases(
        &self,
        user_id: Uuid,
        product_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut unique = product_ids.to_vec();
        unique.sort();
        unique.dedup();
        if unique.is_empty() {
            return Ok(());
        }

        let rows = unique.into_iter().map(|product_id| PurchaseActive {
            user_id: Set(user_id),
            product_id: Set(product_id),
            created_at: Set(now.into()),
        });

        PurchasedProducts::insert_many(rows)
            .on_conflict(
                OnConflict::columns([PurchaseCol::UserId, PurchaseCol::ProductId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.orm)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for SeaStore {
    async fn record_audit(&self, entry: AuditEntry, now: DateTime<Utc>) -> Result<(), StoreError> {
        AuditActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(entry.user_id),
            action: Set(entry.action),
            resource: Set(entry.resource),
            metadata: Set(entry.metadata),
            created_at: Set(now.into()),
        }
        .insert(&self.orm)
        .await?;
        Ok(())
    }
}

fn product_from_entity(model: ProductModel, mut reviews: Vec<ReviewModel>) -> Product {
    reviews.sort_by_key(|review| review.created_at);
    Product {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        image_url: model.image_url,
        reviews: reviews.into_iter().map(review_from_entity).collect(),
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn review_from_entity(model: ReviewModel) -> Review {
    Review {
        name: model.reviewer_name,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn cart_item_from_entity(model: CartModel) -> CartItem {
    CartItem {
        id: model.id,
        user_id: model.user_id,
        product: ProductSnapshot {
            product_id: model.product_id,
            name: model.product_name,
            unit_price: model.unit_price,
            image_url: model.image_url,
        },
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_from_entity(model: OrderModel) -> Result<Order, StoreError> {
    let status = model
        .status
        .parse::<OrderStatus>()
        .map_err(StoreError::Corrupt)?;
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        product_id: model.product_id,
        cart_item_id: model.cart_item_id,
        quantity: model.quantity,
        total_price: model.total_price,
        status,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn profile_from_entity(model: UserModel, purchased_products: Vec<Uuid>) -> UserProfile {
    UserProfile {
        id: model.id,
        email: model.email,
        name: model.name,
        role: model.role,
        purchased_products,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
