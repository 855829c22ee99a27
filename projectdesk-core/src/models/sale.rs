use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: i64,
    pub project_id: i64,
    /// Amount in minor currency units.
    pub amount_cents: i64,
    pub currency: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleInput {
    pub amount_cents: i64,
    pub currency: String,
    pub description: Option<String>,
}
