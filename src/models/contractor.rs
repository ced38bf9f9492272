use chrono::{DateTime, Utc};
use serde::Serialize;

/// A contractor who files timecards. Access is by the opaque `url_token`
/// carried in their personal link, not by login.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Contractor {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub default_hourly_rate: f64,
    pub is_active: bool,
    pub url_token: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register a contractor. The token is generated, never
/// supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewContractor {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub default_hourly_rate: f64,
    pub url_token: String,
}
