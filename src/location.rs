use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::geo::GeoPoint;

pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("location request timed out")]
    Timeout,
}

pub trait LocationProvider: Send + Sync {
    fn current_position(&self) -> impl Future<Output = Result<GeoPoint, LocationError>> + Send;
}

/// A provider that always answers with the same configured point, or with
/// `Unavailable` when none is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedLocation(pub Option<GeoPoint>);

impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<GeoPoint, LocationError> {
        self.0
            .ok_or_else(|| LocationError::Unavailable("no position configured".to_string()))
    }
}

/// Asks the provider for a position, giving up after `timeout`.
///
/// Any failure degrades to `None` so the feed still renders, just without the
/// distance filter.
pub async fn resolve_origin<L: LocationProvider>(provider: &L, timeout: Duration) -> Option<GeoPoint> {
    let outcome = match tokio::time::timeout(timeout, provider.current_position()).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    };

    match outcome {
        Ok(point) if point.is_valid() => Some(point),
        Ok(point) => {
            log::warn!("ignoring invalid position {point:?}");
            None
        }
        Err(err) => {
            log::warn!("skipping distance filter: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Denied;

    impl LocationProvider for Denied {
        async fn current_position(&self) -> Result<GeoPoint, LocationError> {
            Err(LocationError::PermissionDenied)
        }
    }

    struct Hanging;

    impl LocationProvider for Hanging {
        async fn current_position(&self) -> Result<GeoPoint, LocationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(GeoPoint::new(1.0, 1.0))
        }
    }

    #[tokio::test]
    async fn fixed_location_resolves() {
        let point = GeoPoint::new(-23.55, -46.63);
        let origin = resolve_origin(&FixedLocation(Some(point)), DEFAULT_LOCATION_TIMEOUT).await;
        assert_eq!(origin, Some(point));
    }

    #[tokio::test]
    async fn failures_degrade_to_no_origin() {
        assert_eq!(resolve_origin(&Denied, DEFAULT_LOCATION_TIMEOUT).await, None);
        assert_eq!(
            resolve_origin(&FixedLocation(None), DEFAULT_LOCATION_TIMEOUT).await,
            None
        );
        assert_eq!(
            resolve_origin(&FixedLocation(Some(GeoPoint::new(95.0, 0.0))), DEFAULT_LOCATION_TIMEOUT)
                .await,
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let origin = resolve_origin(&Hanging, Duration::from_millis(500)).await;
        assert_eq!(origin, None);
    }
}
