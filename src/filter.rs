//! Client-side composition of the feed predicates.
//!
//! Every predicate only ever removes events, and they are combined with AND
//! in a fixed order: temporal, spatial, category, text. The relative order of
//! the input list is kept.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;
use crate::models::Event;

pub const DEFAULT_RADIUS_KM: f64 = 20.0;
pub const ALL_CATEGORIES: &str = "all";

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Id(String),
}

impl CategoryFilter {
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Id(id) => event.category_id.as_deref() == Some(id.as_str()),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == ALL_CATEGORIES {
            Ok(CategoryFilter::All)
        } else {
            Ok(CategoryFilter::Id(trimmed.to_string()))
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str(ALL_CATEGORIES),
            CategoryFilter::Id(id) => f.write_str(id),
        }
    }
}

/// What the spatial predicate does with events that carry no coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCoordinates {
    #[default]
    Include,
    Exclude,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterCriteria {
    pub category: CategoryFilter,
    pub query: String,
    pub origin: Option<GeoPoint>,
    pub radius_km: f64,
    pub missing_coordinates: MissingCoordinates,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            category: CategoryFilter::All,
            query: String::new(),
            origin: None,
            radius_km: DEFAULT_RADIUS_KM,
            missing_coordinates: MissingCoordinates::Include,
        }
    }
}

impl FilterCriteria {
    fn normalized_query(&self) -> Option<String> {
        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            None
        } else {
            Some(query)
        }
    }
}

pub fn filter_events<'a>(
    events: &'a [Event],
    now: DateTime<Utc>,
    criteria: &FilterCriteria,
) -> Vec<&'a Event> {
    let query = criteria.normalized_query();
    events
        .iter()
        .filter(|event| event.is_upcoming(now))
        .filter(|event| within_radius(event, criteria))
        .filter(|event| criteria.category.matches(event))
        .filter(|event| match &query {
            Some(q) => matches_query(event, q),
            None => true,
        })
        .collect()
}

fn within_radius(event: &Event, criteria: &FilterCriteria) -> bool {
    let Some(origin) = criteria.origin else {
        return true;
    };
    match event.coordinate {
        Some(point) => origin.distance_km(&point) <= criteria.radius_km,
        None => criteria.missing_coordinates == MissingCoordinates::Include,
    }
}

// `query` is already trimmed and lower-cased.
fn matches_query(event: &Event, query: &str) -> bool {
    event.title.to_lowercase().contains(query) || event.location.to_lowercase().contains(query)
}
