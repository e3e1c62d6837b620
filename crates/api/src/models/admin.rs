//! Console administrator.

use chrono::{DateTime, Utc};
use serde::Serialize;

use haat_core::{AdminId, Email, PhoneNumber};

/// An administrator of the marketplace console.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: AdminId,
    pub phone_number: PhoneNumber,
    pub email: Option<Email>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
