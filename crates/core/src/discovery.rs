use serde::{Deserialize, Serialize};

/// Default number of results per explore kind.
pub const DEFAULT_EXPLORE_LIMIT: u32 = 20;
/// Upper bound on results per explore kind.
pub const MAX_EXPLORE_LIMIT: u32 = 50;

/// Which listings an explore request returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ExploreKind {
    Store,
    Product,
    #[default]
    All,
}

impl ExploreKind {
    #[must_use]
    pub fn includes_stores(self) -> bool {
        matches!(self, Self::Store | Self::All)
    }

    #[must_use]
    pub fn includes_products(self) -> bool {
        matches!(self, Self::Product | Self::All)
    }
}

/// Ordering of explore results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ExploreSort {
    /// Newest first.
    #[default]
    New,
    /// Store name or product title, ascending.
    Name,
    /// Product price ascending. Stores fall back to newest first.
    Price,
}

/// Normalized discovery filter over published content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExploreQuery {
    /// Case-insensitive substring; `None` matches everything.
    pub q: Option<String>,
    /// Match listings linked to any of these tag slugs; empty matches everything.
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub kind: ExploreKind,
    pub sort: ExploreSort,
    pub limit: u32,
    pub offset: u32,
}

impl ExploreQuery {
    /// Build a query from raw request parameters, trimming and clamping as needed.
    #[must_use]
    pub fn normalized(
        q: Option<&str>,
        tags: Option<&str>,
        kind: ExploreKind,
        sort: ExploreSort,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Self {
        let q = q.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned);
        let tags = tags
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        Self {
            q,
            tags,
            kind,
            sort,
            limit: limit
                .unwrap_or(DEFAULT_EXPLORE_LIMIT)
                .clamp(1, MAX_EXPLORE_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// Whether `haystack` contains the search term, ignoring case.
    #[must_use]
    pub fn matches_text(&self, haystack: &str) -> bool {
        self.q
            .as_deref()
            .is_none_or(|q| haystack.to_lowercase().contains(&q.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_tags_and_limits() {
        let query = ExploreQuery::normalized(
            Some("  shoes "),
            Some("sale, new,,"),
            ExploreKind::All,
            ExploreSort::Price,
            Some(500),
            None,
        );
        assert_eq!(query.q.as_deref(), Some("shoes"));
        assert_eq!(query.tags, ["sale", "new"]);
        assert_eq!(query.limit, MAX_EXPLORE_LIMIT);
        assert_eq!(query.offset, 0);
    }

    #[test]
    fn defaults() {
        let query =
            ExploreQuery::normalized(Some(""), None, ExploreKind::Store, ExploreSort::New, Some(0), None);
        assert!(query.q.is_none());
        assert!(query.tags.is_empty());
        assert_eq!(query.limit, 1);
        assert_eq!(
            ExploreQuery::normalized(None, None, ExploreKind::All, ExploreSort::New, None, None).limit,
            DEFAULT_EXPLORE_LIMIT
        );
    }

    #[test]
    fn text_match_is_case_insensitive() {
        let query =
            ExploreQuery::normalized(Some("CaFe"), None, ExploreKind::All, ExploreSort::New, None, None);
        assert!(query.matches_text("The Little cafe"));
        assert!(!query.matches_text("bakery"));
    }

    #[test]
    fn kind_flags() {
        assert!(ExploreKind::All.includes_stores() && ExploreKind::All.includes_products());
        assert!(!ExploreKind::Store.includes_products());
        assert!(!ExploreKind::Product.includes_stores());
    }
}
