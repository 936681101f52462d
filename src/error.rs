use thiserror::Error;

use crate::location::LocationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Permission,
    Geolocation,
    General,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeedError {
    #[error("network error: {0}")]
    Network(String),
    #[error("permission denied: {0}")]
    Permission(String),
    #[error("location error: {0}")]
    Geolocation(String),
    #[error("{0}")]
    General(String),
}

impl FeedError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FeedError::Network(_) => ErrorKind::Network,
            FeedError::Permission(_) => ErrorKind::Permission,
            FeedError::Geolocation(_) => ErrorKind::Geolocation,
            FeedError::General(_) => ErrorKind::General,
        }
    }

    /// Text for the retry prompt shown when a load fails.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Network => "Could not reach the server. Check your connection and try again.",
            ErrorKind::Permission => "You do not have access to this content. Sign in and try again.",
            ErrorKind::Geolocation => "Your location is unavailable. Showing events everywhere.",
            ErrorKind::General => "Something went wrong. Try again.",
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FeedError::General(err.to_string())
        } else {
            FeedError::Network(err.to_string())
        }
    }
}

impl From<rusqlite::Error> for FeedError {
    fn from(err: rusqlite::Error) -> Self {
        FeedError::General(format!("local store: {err}"))
    }
}

impl From<LocationError> for FeedError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => FeedError::Permission(err.to_string()),
            other => FeedError::Geolocation(other.to_string()),
        }
    }
}
