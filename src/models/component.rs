//! Represents a karoseri (vehicle body) component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

const CODE_MAX_LEN: usize = 50;
const NAME_MAX_LEN: usize = 100;
const CATEGORY_MAX_LEN: usize = 50;

/// A body component that damage records and predictions refer to.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Component {
    pub id: Uuid,

    /// Unique product code, e.g. `KRS-001`.
    pub code: String,

    /// Human readable name, e.g. `Roof Panel`.
    pub name: String,

    /// Grouping such as `Body Panel`.
    pub category: String,

    pub description: Option<String>,

    /// Inactive components are kept for history but hidden by filters.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /components`.
#[derive(Deserialize, Debug, Clone)]
pub struct NewComponent {
    pub code: String,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
}

impl NewComponent {
    pub fn validate(&self) -> Result<(), String> {
        check_len("code", &self.code, CODE_MAX_LEN)?;
        check_len("name", &self.name, NAME_MAX_LEN)?;
        check_len("category", &self.category, CATEGORY_MAX_LEN)
    }
}

/// Body of `PUT /components/{id}`; absent fields are left unchanged.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ComponentUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    /// `null` clears the description.
    #[serde(default, deserialize_with = "crate::models::nullable")]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl ComponentUpdate {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(code) = &self.code {
            check_len("code", code, CODE_MAX_LEN)?;
        }
        if let Some(name) = &self.name {
            check_len("name", name, NAME_MAX_LEN)?;
        }
        if let Some(category) = &self.category {
            check_len("category", category, CATEGORY_MAX_LEN)?;
        }
        Ok(())
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(format!("{field} must be between 1 and {max} characters"));
    }
    Ok(())
}
