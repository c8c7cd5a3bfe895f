use serde::Deserialize;
use utoipa::ToSchema;

use crate::store::{PageRequest, ProductFilter, ProductSort};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }

    /// `(page, per_page, request)` for handing to a store.
    pub fn page_request(&self) -> (i64, i64, PageRequest) {
        let (page, per_page, offset) = self.normalize();
        let request = PageRequest {
            limit: per_page as u64,
            offset: offset as u64,
        };
        (page, per_page, request)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
}

// Page fields are inlined: serde_urlencoded cannot parse numbers through `flatten`.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Matches name or description, case-insensitive.
    pub q: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn filter(&self) -> ProductFilter {
        let sort = match self.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
            ProductSortBy::CreatedAt => ProductSort::CreatedAt,
            ProductSortBy::Price => ProductSort::Price,
            ProductSortBy::Name => ProductSort::Name,
        };
        ProductFilter {
            search: self.q.clone(),
            min_price: self.min_price,
            max_price: self.max_price,
            sort,
            descending: matches!(self.sort_order.unwrap_or(SortOrder::Desc), SortOrder::Desc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let (page, per_page, offset) = Pagination::default().normalize();
        assert_eq!((page, per_page, offset), (1, 20, 0));

        let (page, per_page, request) = Pagination {
            page: Some(3),
            per_page: Some(500),
        }
        .page_request();
        assert_eq!((page, per_page), (3, 100));
        assert_eq!(request, PageRequest { limit: 100, offset: 200 });
    }

    #[test]
    fn product_query_defaults_to_newest_first() {
        let filter = ProductQuery::default().filter();
        assert_eq!(filter.sort, ProductSort::CreatedAt);
        assert!(filter.descending);
    }
}
