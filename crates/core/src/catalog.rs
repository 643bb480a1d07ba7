use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{PageId, ProductId, StoreId, TenantId};

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex is valid"));

/// Default currency applied to products that do not specify one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Check that `value` is lowercase kebab-case.
pub fn validate_slug(field: &str, value: &str) -> Result<(), ValidationError> {
    if SLUG_RE.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "{field} must be lowercase kebab-case"
        )))
    }
}

/// Check that a display name has at least `min` characters after trimming.
pub fn validate_min_len(field: &str, value: &str, min: usize) -> Result<(), ValidationError> {
    if value.trim().chars().count() >= min {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "{field} must be at least {min} characters"
        )))
    }
}

/// Visibility state shared by stores, products and pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishStatus {
    Draft,
    Published,
}

impl PublishStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "PUBLISHED" => Some(Self::Published),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_published(self) -> bool {
        matches!(self, Self::Published)
    }
}

/// A tenant's storefront. `slug` and `subdomain` are unique across all tenants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: StoreId,
    pub tenant_id: TenantId,
    pub name: String,
    pub slug: String,
    pub subdomain: String,
    pub custom_domain: Option<String>,
    pub status: PublishStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product listed in a store. `slug` is unique within its store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub media: serde_json::Value,
    pub status: PublishStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Versioned block document rendered by a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PageContent {
    #[cfg_attr(feature = "openapi", schema(value_type = f64))]
    pub version: serde_json::Number,
    pub blocks: Vec<serde_json::Value>,
    /// Any other top-level keys, kept as submitted.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PageContent {
    /// Validate an arbitrary JSON value as page content.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        let invalid = || {
            ValidationError::new("Invalid content shape. Expected { version:number, blocks:[] }")
        };
        let serde_json::Value::Object(mut map) = value else {
            return Err(invalid());
        };
        let Some(serde_json::Value::Number(version)) = map.remove("version") else {
            return Err(invalid());
        };
        let Some(serde_json::Value::Array(blocks)) = map.remove("blocks") else {
            return Err(invalid());
        };
        Ok(Self {
            version,
            blocks,
            extra: map,
        })
    }
}

/// A content page belonging to a store. `slug` is unique within its store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub store_id: StoreId,
    pub title: String,
    pub slug: String,
    pub content: PageContent,
    pub status: PublishStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_rules() {
        assert!(validate_slug("slug", "my-store-2").is_ok());
        assert!(validate_slug("slug", "a").is_ok());
        for bad in ["", "My-Store", "double--dash", "-lead", "trail-", "under_score"] {
            let err = validate_slug("slug", bad).unwrap_err();
            assert_eq!(err.to_string(), "slug must be lowercase kebab-case");
        }
    }

    #[test]
    fn min_len_counts_trimmed_chars() {
        assert!(validate_min_len("name", "ab", 2).is_ok());
        assert!(validate_min_len("name", " a ", 2).is_err());
    }

    #[test]
    fn page_content_accepts_versioned_blocks() {
        let content = PageContent::from_value(serde_json::json!({
            "version": 1,
            "blocks": [{ "kind": "hero" }]
        }))
        .unwrap();
        assert_eq!(content.version.as_u64(), Some(1));
        assert_eq!(content.blocks.len(), 1);
    }

    #[test]
    fn page_content_keeps_other_top_level_keys() {
        let raw = serde_json::json!({
            "version": 2,
            "blocks": [],
            "theme": { "accent": "teal" },
            "locale": "en"
        });
        let content = PageContent::from_value(raw.clone()).unwrap();
        assert_eq!(content.extra["locale"], "en");
        assert_eq!(serde_json::to_value(&content).unwrap(), raw);

        let reparsed: PageContent = serde_json::from_value(raw).unwrap();
        assert_eq!(reparsed, content);
    }

    #[test]
    fn page_content_rejects_bad_shapes() {
        for bad in [
            serde_json::json!([]),
            serde_json::json!({ "blocks": [] }),
            serde_json::json!({ "version": "1", "blocks": [] }),
            serde_json::json!({ "version": 1, "blocks": {} }),
        ] {
            assert!(PageContent::from_value(bad).is_err());
        }
    }

    #[test]
    fn status_storage_form() {
        assert_eq!(PublishStatus::parse("PUBLISHED"), Some(PublishStatus::Published));
        assert_eq!(PublishStatus::Draft.as_str(), "DRAFT");
        assert!(!PublishStatus::Draft.is_published());
    }
}
