use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartList, UpdateCartItemRequest},
        orders::OrderList,
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{AddReviewRequest, ReviewList},
    },
    models::{CartItem, Order, OrderStatus, Product, ProductSnapshot, Review, UserProfile},
    response::{ApiResponse, ErrorData, Meta},
    routes::{cart, health, orders, params, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        cart::checkout,
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::list_reviews,
        products::add_review,
        orders::list_orders,
        users::me
    ),
    components(
        schemas(
            UserProfile,
            Product,
            Review,
            ProductSnapshot,
            CartItem,
            Order,
            OrderStatus,
            CartList,
            OrderList,
            ProductList,
            ReviewList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CreateProductRequest,
            UpdateProductRequest,
            AddReviewRequest,
            params::Pagination,
            params::ProductQuery,
            Meta,
            ErrorData,
            ApiResponse<ErrorData>,
            ApiResponse<health::HealthData>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartItem>,
            ApiResponse<CartList>,
            ApiResponse<OrderList>,
            ApiResponse<ReviewList>,
            ApiResponse<Review>,
            ApiResponse<UserProfile>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Reviews", description = "Product reviews, open to past buyers"),
        (name = "Cart", description = "Cart and checkout endpoints"),
        (name = "Orders", description = "Order history"),
        (name = "Users", description = "Current user profile"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
