//! Product categories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use haat_core::CategoryId;

/// A product category.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for creating or replacing a category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

impl CategoryInput {
    /// Trim fields and require a name.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message when the name is blank.
    pub fn validate(self) -> Result<Self, String> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err("Category name is required".to_owned());
        }
        Ok(Self {
            name,
            description: super::clean(self.description),
            icon: super::clean(self.icon),
        })
    }
}
