//! View-event model and the pure parts of view deduplication: viewer hashing,
//! UTC day keys, idempotency keys and the zero-filled seven-day series.

use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::types::{EventId, PageId, ProductId, StoreId};

/// Number of daily buckets in the trailing analytics window (today inclusive).
pub const WINDOW_DAYS: u64 = 7;

/// Accepted viewer id length bounds.
pub const VIEWER_ID_MIN_LEN: usize = 8;
pub const VIEWER_ID_MAX_LEN: usize = 128;

/// Kind of view an analytics event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewEventType {
    StoreView,
    ProductView,
    PageView,
}

impl ViewEventType {
    pub const ALL: [Self; 3] = [Self::StoreView, Self::ProductView, Self::PageView];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StoreView => "STORE_VIEW",
            Self::ProductView => "PRODUCT_VIEW",
            Self::PageView => "PAGE_VIEW",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STORE_VIEW" => Some(Self::StoreView),
            "PRODUCT_VIEW" => Some(Self::ProductView),
            "PAGE_VIEW" => Some(Self::PageView),
            _ => None,
        }
    }
}

impl fmt::Display for ViewEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single piece of content a view refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewTarget {
    Store(StoreId),
    Product(ProductId),
    Page(PageId),
}

impl ViewTarget {
    #[must_use]
    pub fn event_type(&self) -> ViewEventType {
        match self {
            Self::Store(_) => ViewEventType::StoreView,
            Self::Product(_) => ViewEventType::ProductView,
            Self::Page(_) => ViewEventType::PageView,
        }
    }

    #[must_use]
    pub fn target_id(&self) -> &str {
        match self {
            Self::Store(id) => id.as_str(),
            Self::Product(id) => id.as_str(),
            Self::Page(id) => id.as_str(),
        }
    }
}

/// A view event as submitted by a client.
///
/// `type` names which of the three id fields is meaningful; [`ViewEventInput::target`]
/// turns the loose wire shape into a [`ViewTarget`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ViewEventInput {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,
}

impl ViewEventInput {
    /// Build the wire form for a target, optionally tagged with a viewer id.
    #[must_use]
    pub fn for_target(target: &ViewTarget, viewer_id: Option<String>) -> Self {
        let mut input = Self {
            event_type: target.event_type().as_str().to_owned(),
            viewer_id,
            ..Self::default()
        };
        let id = Some(target.target_id().to_owned());
        match target {
            ViewTarget::Store(_) => input.store_id = id,
            ViewTarget::Product(_) => input.product_id = id,
            ViewTarget::Page(_) => input.page_id = id,
        }
        input
    }

    /// Resolve the declared type and the id field that goes with it.
    pub fn target(&self) -> Result<ViewTarget, ValidationError> {
        let event_type = ViewEventType::parse(&self.event_type)
            .ok_or_else(|| ValidationError::new("Invalid analytics view type"))?;

        let required = |value: &Option<String>, field: &str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .ok_or_else(|| {
                    ValidationError::new(format!("{field} is required for {event_type}"))
                })
        };

        Ok(match event_type {
            ViewEventType::StoreView => ViewTarget::Store(required(&self.store_id, "storeId")?.into()),
            ViewEventType::ProductView => {
                ViewTarget::Product(required(&self.product_id, "productId")?.into())
            }
            ViewEventType::PageView => ViewTarget::Page(required(&self.page_id, "pageId")?.into()),
        })
    }

    /// The supplied viewer id, if any, after length validation.
    pub fn viewer_id(&self) -> Result<Option<&str>, ValidationError> {
        match self.viewer_id.as_deref() {
            None | Some("") => Ok(None),
            Some(v) if (VIEWER_ID_MIN_LEN..=VIEWER_ID_MAX_LEN).contains(&v.chars().count()) => {
                Ok(Some(v))
            }
            Some(_) => Err(ValidationError::new(format!(
                "viewerId must be between {VIEWER_ID_MIN_LEN} and {VIEWER_ID_MAX_LEN} characters"
            ))),
        }
    }
}

/// A persisted view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub id: EventId,
    #[serde(rename = "type")]
    pub event_type: ViewEventType,
    pub store_id: Option<StoreId>,
    pub product_id: Option<ProductId>,
    pub page_id: Option<PageId>,
    pub viewer_hash: Option<String>,
    /// Unique when present; absent for anonymous views.
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AnalyticsEvent {
    /// Build an event row for `target`. A key is attached only when a viewer hash is.
    #[must_use]
    pub fn for_target(target: &ViewTarget, viewer_hash: Option<String>, at: DateTime<Utc>) -> Self {
        let idempotency_key = viewer_hash
            .as_deref()
            .map(|hash| idempotency_key(target, hash, at));
        let (store_id, product_id, page_id) = match target {
            ViewTarget::Store(id) => (Some(id.clone()), None, None),
            ViewTarget::Product(id) => (None, Some(id.clone()), None),
            ViewTarget::Page(id) => (None, None, Some(id.clone())),
        };
        Self {
            id: EventId::generate(),
            event_type: target.event_type(),
            store_id,
            product_id,
            page_id,
            viewer_hash,
            idempotency_key,
            created_at: at,
        }
    }
}

/// One-way SHA-256 hex digest of a client-supplied viewer id.
#[must_use]
pub fn hash_viewer(viewer_id: &str) -> String {
    hex::encode(Sha256::digest(viewer_id.as_bytes()))
}

/// UTC calendar date of `at`, formatted `YYYY-MM-DD`.
#[must_use]
pub fn day_key_utc(at: DateTime<Utc>) -> String {
    at.date_naive().format("%Y-%m-%d").to_string()
}

/// `{TYPE}:{targetId}:{viewerHash}:{YYYY-MM-DD}`
#[must_use]
pub fn idempotency_key(target: &ViewTarget, viewer_hash: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}:{}:{}:{}",
        target.event_type(),
        target.target_id(),
        viewer_hash,
        day_key_utc(at)
    )
}

/// First day of the trailing window that ends (inclusively) on `today`.
#[must_use]
pub fn window_start(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_days(Days::new(WINDOW_DAYS - 1))
        .unwrap_or(NaiveDate::MIN)
}

/// Midnight UTC at the start of the trailing window containing `now`.
#[must_use]
pub fn window_start_instant(now: DateTime<Utc>) -> DateTime<Utc> {
    window_start(now.date_naive())
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}

/// Per-type view counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ViewTotals {
    pub store_views: u64,
    pub product_views: u64,
    pub page_views: u64,
}

impl ViewTotals {
    pub fn record(&mut self, event_type: ViewEventType) {
        self.add(event_type, 1);
    }

    pub fn add(&mut self, event_type: ViewEventType, n: u64) {
        match event_type {
            ViewEventType::StoreView => self.store_views += n,
            ViewEventType::ProductView => self.product_views += n,
            ViewEventType::PageView => self.page_views += n,
        }
    }

    #[must_use]
    pub fn get(&self, event_type: ViewEventType) -> u64 {
        match event_type {
            ViewEventType::StoreView => self.store_views,
            ViewEventType::ProductView => self.product_views,
            ViewEventType::PageView => self.page_views,
        }
    }
}

/// Counts for one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DayBucket {
    pub date: String,
    pub store_views: u64,
    pub product_views: u64,
    pub page_views: u64,
}

/// Seven consecutive UTC days, oldest first, zero-filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WeekSeries {
    pub start: String,
    pub days: Vec<DayBucket>,
}

impl WeekSeries {
    /// Pre-seed seven buckets ending on `today`, then tally `events` into them.
    /// Events outside the window are ignored.
    pub fn build<I>(today: NaiveDate, events: I) -> Self
    where
        I: IntoIterator<Item = (ViewEventType, DateTime<Utc>)>,
    {
        let start = window_start(today);
        let mut totals = [ViewTotals::default(); WINDOW_DAYS as usize];

        for (event_type, at) in events {
            let offset = (at.date_naive() - start).num_days();
            if let Ok(idx) = usize::try_from(offset)
                && let Some(bucket) = totals.get_mut(idx)
            {
                bucket.record(event_type);
            }
        }

        let days = start
            .iter_days()
            .zip(totals)
            .map(|(date, t)| DayBucket {
                date: date.format("%Y-%m-%d").to_string(),
                store_views: t.store_views,
                product_views: t.product_views,
                page_views: t.page_views,
            })
            .collect();

        Self {
            start: start.format("%Y-%m-%d").to_string(),
            days,
        }
    }
}

/// Result of submitting one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TrackOutcome {
    pub ok: bool,
    /// `true` when the view went through the keyed upsert path.
    pub deduped: bool,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn input(event_type: &str) -> ViewEventInput {
        ViewEventInput {
            event_type: event_type.to_owned(),
            ..ViewEventInput::default()
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = input("CLICK").target().unwrap_err();
        assert_eq!(err.to_string(), "Invalid analytics view type");
    }

    #[test]
    fn matching_id_field_is_required() {
        let mut event = input("PRODUCT_VIEW");
        event.store_id = Some("s1".into());
        let err = event.target().unwrap_err();
        assert_eq!(err.to_string(), "productId is required for PRODUCT_VIEW");

        event.product_id = Some("p1".into());
        assert_eq!(event.target().unwrap(), ViewTarget::Product("p1".into()));
    }

    #[test]
    fn empty_id_counts_as_missing() {
        let mut event = input("PAGE_VIEW");
        event.page_id = Some(String::new());
        assert_eq!(
            event.target().unwrap_err().to_string(),
            "pageId is required for PAGE_VIEW"
        );
    }

    #[test]
    fn wire_shape_uses_type_field() {
        let event: ViewEventInput =
            serde_json::from_str(r#"{"type":"STORE_VIEW","storeId":"s1","viewerId":"viewer-123"}"#)
                .unwrap();
        assert_eq!(event.target().unwrap(), ViewTarget::Store("s1".into()));
        assert_eq!(event.viewer_id().unwrap(), Some("viewer-123"));

        let back = ViewEventInput::for_target(&ViewTarget::Store("s1".into()), None);
        let json = serde_json::to_value(&back).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "STORE_VIEW", "storeId": "s1" }));
    }

    #[test]
    fn viewer_id_length_is_bounded() {
        let mut event = input("STORE_VIEW");
        event.viewer_id = Some("short".into());
        assert!(event.viewer_id().is_err());
        event.viewer_id = Some("x".repeat(129));
        assert!(event.viewer_id().is_err());
        event.viewer_id = None;
        assert_eq!(event.viewer_id().unwrap(), None);
    }

    #[test]
    fn viewer_hash_is_sha256_hex() {
        let hash = hash_viewer("v1");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_viewer("v1"));
        assert_ne!(hash, hash_viewer("v2"));
        assert_ne!(hash, "v1");
    }

    #[test]
    fn idempotency_key_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 0).unwrap();
        let key = idempotency_key(&ViewTarget::Store("s1".into()), "abc", at);
        assert_eq!(key, "STORE_VIEW:s1:abc:2026-03-09");
    }

    #[test]
    fn day_boundary_is_utc_midnight() {
        let before = Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 30).unwrap();
        let after = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 30).unwrap();
        let target = ViewTarget::Page("p1".into());
        assert_ne!(
            idempotency_key(&target, "h", before),
            idempotency_key(&target, "h", after)
        );
    }

    #[test]
    fn distinct_targets_get_distinct_keys() {
        let at = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        let a = idempotency_key(&ViewTarget::Store("s1".into()), "h", at);
        let b = idempotency_key(&ViewTarget::Store("s2".into()), "h", at);
        let c = idempotency_key(&ViewTarget::Product("s1".into()), "h", at);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn anonymous_events_carry_no_key() {
        let at = Utc::now();
        let event = AnalyticsEvent::for_target(&ViewTarget::Store("s1".into()), None, at);
        assert!(event.idempotency_key.is_none());
        assert_eq!(event.store_id.as_deref(), Some("s1"));

        let keyed = AnalyticsEvent::for_target(
            &ViewTarget::Product("p1".into()),
            Some("h".into()),
            at,
        );
        assert!(keyed.idempotency_key.is_some());
        assert!(keyed.store_id.is_none());
        assert_eq!(keyed.event_type, ViewEventType::ProductView);
    }

    #[test]
    fn week_series_is_seven_ascending_days() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let series = WeekSeries::build(today, std::iter::empty());
        assert_eq!(series.start, "2026-02-24");
        assert_eq!(series.days.len(), 7);
        assert_eq!(series.days[0].date, "2026-02-24");
        assert_eq!(series.days[6].date, "2026-03-02");

        let dates: Vec<NaiveDate> = series
            .days
            .iter()
            .map(|d| NaiveDate::parse_from_str(&d.date, "%Y-%m-%d").unwrap())
            .collect();
        assert!(dates.windows(2).all(|w| (w[1] - w[0]).num_days() == 1));
        assert!(series.days.iter().all(|d| d.store_views == 0));
    }

    #[test]
    fn week_series_tallies_in_window_only() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap();
        let events = vec![
            (ViewEventType::StoreView, at(2, 1)),
            (ViewEventType::StoreView, at(2, 23)),
            (ViewEventType::PageView, at(1, 12)),
            (ViewEventType::ProductView, Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()),
            (ViewEventType::ProductView, at(3, 0)),
        ];
        let series = WeekSeries::build(today, events);
        assert_eq!(series.days[6].store_views, 2);
        assert_eq!(series.days[5].page_views, 1);
        let products: u64 = series.days.iter().map(|d| d.product_views).sum();
        assert_eq!(products, 0);
    }

    #[test]
    fn window_start_instant_is_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 15, 30, 0).unwrap();
        let start = window_start_instant(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 2, 24, 0, 0, 0).unwrap());
    }

    #[test]
    fn totals_record_by_type() {
        let mut totals = ViewTotals::default();
        totals.record(ViewEventType::StoreView);
        totals.add(ViewEventType::PageView, 3);
        assert_eq!(totals.get(ViewEventType::StoreView), 1);
        assert_eq!(totals.get(ViewEventType::PageView), 3);
        assert_eq!(totals.get(ViewEventType::ProductView), 0);
    }
}
