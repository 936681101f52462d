use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::FeedError;
use crate::filter::{filter_events, CategoryFilter, FilterCriteria, MissingCoordinates};
use crate::geo::GeoPoint;
use crate::location::{resolve_origin, LocationProvider};
use crate::models::{Category, Event};

/// Where the feed reads events and categories from.
pub trait EventSource: Send + Sync {
    /// All events, ascending by start time.
    fn fetch_events(&self) -> impl Future<Output = Result<Vec<Event>, FeedError>> + Send;
    /// All categories, ascending by name.
    fn fetch_categories(&self) -> impl Future<Output = Result<Vec<Category>, FeedError>> + Send;
}

/// A fixed in-memory snapshot, e.g. what the local store last synced.
#[derive(Clone, Debug, Default)]
pub struct SnapshotSource {
    pub events: Vec<Event>,
    pub categories: Vec<Category>,
}

impl EventSource for SnapshotSource {
    async fn fetch_events(&self) -> Result<Vec<Event>, FeedError> {
        Ok(self.events.clone())
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, FeedError> {
        Ok(self.categories.clone())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FeedState {
    Idle,
    Loading,
    Ready,
    Failed(FeedError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Clone, Debug, Default)]
pub struct FeedSnapshot {
    pub events: Vec<Event>,
    pub categories: Vec<Category>,
    pub origin: Option<GeoPoint>,
}

/// State behind one feed screen: the loaded lists, the user's criteria and
/// the outcome of the last load.
pub struct FeedSession<S, L> {
    source: S,
    location: L,
    location_timeout: Duration,
    criteria: FilterCriteria,
    events: Vec<Event>,
    categories: Vec<Category>,
    state: FeedState,
    latest_ticket: u64,
}

impl<S: EventSource, L: LocationProvider> FeedSession<S, L> {
    pub fn new(source: S, location: L, location_timeout: Duration) -> Self {
        Self {
            source,
            location,
            location_timeout,
            criteria: FilterCriteria::default(),
            events: Vec::new(),
            categories: Vec::new(),
            state: FeedState::Idle,
            latest_ticket: 0,
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn origin(&self) -> Option<GeoPoint> {
        self.criteria.origin
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        self.criteria.category = category;
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.criteria.query = query.into();
    }

    pub fn set_radius_km(&mut self, radius_km: f64) {
        self.criteria.radius_km = radius_km;
    }

    pub fn set_missing_coordinates(&mut self, policy: MissingCoordinates) {
        self.criteria.missing_coordinates = policy;
    }

    /// Starts a load; only the most recently issued ticket may apply results.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.latest_ticket += 1;
        self.state = FeedState::Loading;
        LoadTicket(self.latest_ticket)
    }

    /// Applies a finished load. Returns `false` when a newer load has been
    /// started since `ticket` was issued; the result is then discarded.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<FeedSnapshot, FeedError>,
    ) -> bool {
        if ticket.0 != self.latest_ticket {
            log::debug!(
                "discarding stale load {} (latest is {})",
                ticket.0,
                self.latest_ticket
            );
            return false;
        }

        match result {
            Ok(snapshot) => {
                log::debug!(
                    "loaded {} events and {} categories",
                    snapshot.events.len(),
                    snapshot.categories.len()
                );
                self.events = snapshot.events;
                self.categories = snapshot.categories;
                self.criteria.origin = snapshot.origin;
                self.state = FeedState::Ready;
            }
            Err(err) => {
                log::warn!("feed load failed: {err}");
                self.state = FeedState::Failed(err);
            }
        }
        true
    }

    /// Fetches events, categories and the current position together.
    pub async fn fetch_snapshot(&self) -> Result<FeedSnapshot, FeedError> {
        let (events, categories, origin) = tokio::join!(
            self.source.fetch_events(),
            self.source.fetch_categories(),
            resolve_origin(&self.location, self.location_timeout),
        );
        Ok(FeedSnapshot {
            events: events?,
            categories: categories?,
            origin,
        })
    }

    pub async fn refresh(&mut self) -> &FeedState {
        let ticket = self.begin_load();
        let result = self.fetch_snapshot().await;
        self.finish_load(ticket, result);
        &self.state
    }

    /// User-initiated retry after a failure; same as a fresh load.
    pub async fn retry(&mut self) -> &FeedState {
        self.refresh().await
    }

    pub fn visible_events(&self, now: DateTime<Utc>) -> Vec<&Event> {
        if self.state != FeedState::Ready {
            return Vec::new();
        }
        filter_events(&self.events, now, &self.criteria)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::location::{FixedLocation, LocationError};
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn event(id: &str, title: &str, hours: i64, coordinate: Option<GeoPoint>) -> Event {
        Event {
            id: id.to_string(),
            title: title.to_string(),
            starts_at: now() + ChronoDuration::hours(hours),
            location: "Centro".to_string(),
            coordinate,
            image_url: None,
            is_free: false,
            price: 20.0,
            category_id: Some("music".to_string()),
        }
    }

    fn snapshot() -> SnapshotSource {
        SnapshotSource {
            events: vec![
                event("past", "Yesterday", -24, None),
                event("near", "Near", 24, Some(GeoPoint::new(0.0, 0.1))),
                event("far", "Far", 48, Some(GeoPoint::new(0.0, 0.5))),
            ],
            categories: vec![Category {
                id: "music".into(),
                name: "Music".into(),
            }],
        }
    }

    struct Denied;

    impl LocationProvider for Denied {
        async fn current_position(&self) -> Result<GeoPoint, LocationError> {
            Err(LocationError::PermissionDenied)
        }
    }

    /// Fails the first `failures` event fetches with a network error.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
        inner: SnapshotSource,
    }

    impl EventSource for Flaky {
        async fn fetch_events(&self) -> Result<Vec<Event>, FeedError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(FeedError::Network("connection reset".into()))
            } else {
                self.inner.fetch_events().await
            }
        }

        async fn fetch_categories(&self) -> Result<Vec<Category>, FeedError> {
            self.inner.fetch_categories().await
        }
    }

    fn ids(events: &[&Event]) -> Vec<String> {
        events.iter().map(|e| e.id.clone()).collect()
    }

    #[tokio::test]
    async fn refresh_applies_origin_and_filters() {
        let mut session = FeedSession::new(
            snapshot(),
            FixedLocation(Some(GeoPoint::new(0.0, 0.0))),
            Duration::from_secs(1),
        );
        assert!(session.visible_events(now()).is_empty());

        assert_eq!(session.refresh().await, &FeedState::Ready);
        assert_eq!(session.categories().len(), 1);
        assert_eq!(ids(&session.visible_events(now())), vec!["near"]);

        session.set_query("zzz");
        assert!(session.visible_events(now()).is_empty());
        session.set_query("");
        session.set_radius_km(100.0);
        assert_eq!(ids(&session.visible_events(now())), vec!["near", "far"]);
    }

    #[tokio::test]
    async fn denied_location_matches_no_origin() {
        let mut denied = FeedSession::new(snapshot(), Denied, Duration::from_secs(1));
        let mut unset = FeedSession::new(snapshot(), FixedLocation(None), Duration::from_secs(1));
        denied.refresh().await;
        unset.refresh().await;

        assert_eq!(denied.origin(), None);
        assert_eq!(
            ids(&denied.visible_events(now())),
            ids(&unset.visible_events(now()))
        );
        assert_eq!(ids(&denied.visible_events(now())), vec!["near", "far"]);
    }

    #[tokio::test]
    async fn fetch_failure_needs_manual_retry() {
        let source = Flaky {
            failures: 1,
            calls: AtomicUsize::new(0),
            inner: snapshot(),
        };
        let mut session = FeedSession::new(source, FixedLocation(None), Duration::from_secs(1));

        match session.refresh().await {
            FeedState::Failed(err) => assert_eq!(err.kind(), ErrorKind::Network),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(session.visible_events(now()).is_empty());

        assert_eq!(session.retry().await, &FeedState::Ready);
        assert_eq!(session.visible_events(now()).len(), 2);
    }

    #[test]
    fn latest_load_wins() {
        let mut session = FeedSession::new(
            SnapshotSource::default(),
            FixedLocation(None),
            Duration::from_secs(1),
        );

        let first = session.begin_load();
        let second = session.begin_load();

        let newer = FeedSnapshot {
            events: vec![event("new", "New", 1, None)],
            ..FeedSnapshot::default()
        };
        let older = FeedSnapshot {
            events: vec![event("old", "Old", 1, None)],
            ..FeedSnapshot::default()
        };

        assert!(session.finish_load(second, Ok(newer)));
        assert!(!session.finish_load(first, Ok(older)));
        assert_eq!(ids(&session.visible_events(now())), vec!["new"]);

        let third = session.begin_load();
        assert_eq!(session.state(), &FeedState::Loading);
        assert!(session.finish_load(third, Err(FeedError::General("boom".into()))));
        assert!(matches!(session.state(), FeedState::Failed(_)));
    }

    #[test]
    fn category_switch_does_not_refetch() {
        let mut session = FeedSession::new(
            SnapshotSource::default(),
            FixedLocation(None),
            Duration::from_secs(1),
        );
        let ticket = session.begin_load();
        let mut other = event("other", "Other", 2, None);
        other.category_id = Some("theatre".into());
        session.finish_load(
            ticket,
            Ok(FeedSnapshot {
                events: vec![event("m", "Music", 1, None), other],
                ..FeedSnapshot::default()
            }),
        );

        session.set_category(CategoryFilter::Id("theatre".into()));
        assert_eq!(ids(&session.visible_events(now())), vec!["other"]);
        session.set_category(CategoryFilter::All);
        assert_eq!(session.visible_events(now()).len(), 2);

        session.set_missing_coordinates(MissingCoordinates::Exclude);
        assert_eq!(session.criteria().missing_coordinates, MissingCoordinates::Exclude);
    }
}
