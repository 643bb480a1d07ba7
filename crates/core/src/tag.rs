use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::TagId;

/// Lowest (least restrictive) tag tier.
pub const MIN_TAG_TIER: u8 = 1;
/// Highest (most restrictive) tag tier.
pub const MAX_TAG_TIER: u8 = 3;

/// A global, slug-unique label that stores and products can carry.
///
/// Higher tiers are reserved for higher plans; see the tag-tier gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: TagId,
    pub slug: String,
    pub name: String,
    pub tier: u8,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub flags: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Slug and display name of a tag attached to a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TagRef {
    pub slug: String,
    pub name: String,
}

impl From<&Tag> for TagRef {
    fn from(tag: &Tag) -> Self {
        Self {
            slug: tag.slug.clone(),
            name: tag.name.clone(),
        }
    }
}

/// Input for creating a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDraft {
    pub slug: String,
    pub name: String,
    pub tier: u8,
    pub flags: serde_json::Value,
}

impl TagDraft {
    /// Tags shipped with a fresh installation.
    #[must_use]
    pub fn seed() -> Vec<Self> {
        [("new", "New"), ("featured", "Featured"), ("sale", "Sale")]
            .into_iter()
            .map(|(slug, name)| Self {
                slug: slug.to_owned(),
                name: name.to_owned(),
                tier: MIN_TAG_TIER,
                flags: serde_json::json!({}),
            })
            .collect()
    }
}

/// Reject tiers outside `1..=3`.
pub fn validate_tier(tier: u8) -> Result<(), ValidationError> {
    if (MIN_TAG_TIER..=MAX_TAG_TIER).contains(&tier) {
        Ok(())
    } else {
        Err(ValidationError::new(format!(
            "tier must be between {MIN_TAG_TIER} and {MAX_TAG_TIER}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_tags_are_entry_tier() {
        let seed = TagDraft::seed();
        assert_eq!(seed.len(), 3);
        assert!(seed.iter().all(|t| t.tier == 1));
        assert!(seed.iter().any(|t| t.slug == "featured"));
    }

    #[test]
    fn tier_bounds() {
        assert!(validate_tier(1).is_ok());
        assert!(validate_tier(3).is_ok());
        assert!(validate_tier(0).is_err());
        assert!(validate_tier(4).is_err());
    }
}
