pub mod audit_logs;
pub mod cart_items;
pub mod orders;
pub mod products;
pub mod purchased_products;
pub mod reviews;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use purchased_products::Entity as PurchasedProducts;
pub use reviews::Entity as Reviews;
pub use users::Entity as Users;
