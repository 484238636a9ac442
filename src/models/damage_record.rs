//! Damage records: labelled feature vectors used as classifier training data.

use crate::models::component::Component;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Number of numeric features per sample.
pub const FEATURE_COUNT: usize = 7;

/// Feature names in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "damage_area",
    "damage_depth",
    "damage_point_count",
    "component_age",
    "usage_frequency",
    "corrosion_level",
    "deformation",
];

/// Damage severity class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase", try_from = "String")]
#[sqlx(rename_all = "lowercase")]
pub enum DamageLevel {
    Ringan,
    Sedang,
    Berat,
}

impl DamageLevel {
    /// Canonical class order used for confusion matrices and probability maps.
    pub const ALL: [DamageLevel; 3] = [DamageLevel::Ringan, DamageLevel::Sedang, DamageLevel::Berat];

    pub fn as_str(self) -> &'static str {
        match self {
            DamageLevel::Ringan => "ringan",
            DamageLevel::Sedang => "sedang",
            DamageLevel::Berat => "berat",
        }
    }

    /// Position of this level in [`DamageLevel::ALL`].
    pub fn index(self) -> usize {
        match self {
            DamageLevel::Ringan => 0,
            DamageLevel::Sedang => 1,
            DamageLevel::Berat => 2,
        }
    }
}

impl fmt::Display for DamageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the damage levels.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("damage_level must be one of: ringan, sedang, berat")]
pub struct InvalidDamageLevel;

impl FromStr for DamageLevel {
    type Err = InvalidDamageLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ringan" => Ok(DamageLevel::Ringan),
            "sedang" => Ok(DamageLevel::Sedang),
            "berat" => Ok(DamageLevel::Berat),
            _ => Err(InvalidDamageLevel),
        }
    }
}

impl TryFrom<String> for DamageLevel {
    type Error = InvalidDamageLevel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The seven numeric inputs of the classifier.
#[derive(Serialize, Deserialize, Clone, Copy, FromRow, Debug, PartialEq)]
pub struct DamageFeatures {
    /// Damage area in cm².
    pub damage_area: f64,
    /// Damage depth in mm.
    pub damage_depth: f64,
    /// Number of damage points.
    pub damage_point_count: i64,
    /// Component age in months.
    pub component_age: i64,
    /// Usage intensity, 1-10.
    pub usage_frequency: i64,
    /// Corrosion level, 1-5.
    pub corrosion_level: i64,
    /// Deformation in mm.
    pub deformation: f64,
}

impl DamageFeatures {
    /// Check every feature against its allowed range.
    pub fn validate(&self) -> Result<(), String> {
        if !self.damage_area.is_finite() || self.damage_area <= 0.0 {
            return Err("damage_area must be greater than 0".into());
        }
        if !self.damage_depth.is_finite() || self.damage_depth <= 0.0 {
            return Err("damage_depth must be greater than 0".into());
        }
        if self.damage_point_count <= 0 {
            return Err("damage_point_count must be greater than 0".into());
        }
        if self.component_age <= 0 {
            return Err("component_age must be greater than 0".into());
        }
        if !(1..=10).contains(&self.usage_frequency) {
            return Err("usage_frequency must be between 1 and 10".into());
        }
        if !(1..=5).contains(&self.corrosion_level) {
            return Err("corrosion_level must be between 1 and 5".into());
        }
        if !self.deformation.is_finite() || self.deformation < 0.0 {
            return Err("deformation must be greater than or equal to 0".into());
        }
        Ok(())
    }

    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.damage_area,
            self.damage_depth,
            self.damage_point_count as f64,
            self.component_age as f64,
            self.usage_frequency as f64,
            self.corrosion_level as f64,
            self.deformation,
        ]
    }
}

/// A stored training sample.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct DamageRecord {
    pub id: Uuid,

    /// Component this damage was observed on.
    pub component_id: Uuid,

    #[sqlx(flatten)]
    #[serde(flatten)]
    pub features: DamageFeatures,

    /// Classification label.
    pub damage_level: DamageLevel,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Damage record together with its owning component.
#[derive(Serialize, Debug, Clone)]
pub struct DamageRecordResponse {
    #[serde(flatten)]
    pub record: DamageRecord,
    pub component: Option<Component>,
}

/// Body of `POST /damage-records`.
#[derive(Deserialize, Debug, Clone)]
pub struct NewDamageRecord {
    pub component_id: Uuid,
    #[serde(flatten)]
    pub features: DamageFeatures,
    pub damage_level: DamageLevel,
    pub notes: Option<String>,
}

/// Body of `PUT /damage-records/{id}`; absent fields are left unchanged.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct DamageRecordUpdate {
    pub component_id: Option<Uuid>,
    pub damage_area: Option<f64>,
    pub damage_depth: Option<f64>,
    pub damage_point_count: Option<i64>,
    pub component_age: Option<i64>,
    pub usage_frequency: Option<i64>,
    pub corrosion_level: Option<i64>,
    pub deformation: Option<f64>,
    pub damage_level: Option<DamageLevel>,
    /// `null` clears the notes.
    #[serde(default, deserialize_with = "crate::models::nullable")]
    pub notes: Option<Option<String>>,
}

impl DamageRecordUpdate {
    /// Overlay the provided fields on top of `features`.
    pub fn apply_features(&self, features: &DamageFeatures) -> DamageFeatures {
        DamageFeatures {
            damage_area: self.damage_area.unwrap_or(features.damage_area),
            damage_depth: self.damage_depth.unwrap_or(features.damage_depth),
            damage_point_count: self
                .damage_point_count
                .unwrap_or(features.damage_point_count),
            component_age: self.component_age.unwrap_or(features.component_age),
            usage_frequency: self.usage_frequency.unwrap_or(features.usage_frequency),
            corrosion_level: self.corrosion_level.unwrap_or(features.corrosion_level),
            deformation: self.deformation.unwrap_or(features.deformation),
        }
    }
}

/// Count of records per damage level.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DamageDistribution {
    pub ringan: i64,
    pub sedang: i64,
    pub berat: i64,
    pub total: i64,
}

/// Outcome of a CSV bulk import.
#[derive(Serialize, Debug, Clone, Default)]
pub struct BulkImportResult {
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
}
