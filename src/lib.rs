pub mod config;
pub mod db;
pub mod debounce;
pub mod error;
pub mod filter;
pub mod geo;
pub mod location;
pub mod logs;
pub mod models;
pub mod remote;
pub mod render;
pub mod session;
mod utils;

pub use error::{ErrorKind, FeedError};
pub use filter::{filter_events, CategoryFilter, FilterCriteria, MissingCoordinates};
pub use geo::{haversine_km, GeoPoint};
pub use models::{Category, Event};
pub use session::{EventSource, FeedSession, FeedState};
