use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Review;

/// `name` is shown as the reviewer and is not checked against the caller's profile.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddReviewRequest {
    pub name: String,
    pub rating: i16,
    pub comment: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ReviewList {
    #[schema(value_type = Vec<Review>)]
    pub items: Vec<Review>,
}
