use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::GeoPoint;

const UNTITLED: &str = "Untitled Event";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub location: String,
    pub coordinate: Option<GeoPoint>,
    pub image_url: Option<String>,
    pub is_free: bool,
    pub price: f64,
    pub category_id: Option<String>,
}

impl Event {
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.starts_at >= now
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("record is missing an id")]
    MissingId,
    #[error("record {id} has an invalid date: {value}")]
    InvalidDate { id: String, value: String },
    #[error("record {id} has no name")]
    MissingName { id: String },
}

/// An `events` row as the backend returns it, before validation.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct EventRow {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_url: Option<String>,
    pub is_free: Option<bool>,
    pub price: Option<f64>,
    #[serde(deserialize_with = "optional_id_as_string")]
    pub category_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CategoryRow {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub name: Option<String>,
}

impl TryFrom<EventRow> for Event {
    type Error = RecordError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let id = row.id.trim().to_string();
        if id.is_empty() {
            return Err(RecordError::MissingId);
        }

        let raw_date = row.date.unwrap_or_default();
        let starts_at = parse_timestamp(&raw_date).ok_or_else(|| RecordError::InvalidDate {
            id: id.clone(),
            value: raw_date.clone(),
        })?;

        let coordinate = match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) => GeoPoint::checked(lat, lon),
            _ => None,
        };

        let title = row
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        let is_free = row.is_free.unwrap_or(false);
        let price = if is_free {
            0.0
        } else {
            row.price.filter(|p| p.is_finite()).unwrap_or(0.0)
        };

        Ok(Event {
            id,
            title,
            starts_at,
            location: row.location.unwrap_or_default().trim().to_string(),
            coordinate,
            image_url: row.image_url.filter(|url| !url.trim().is_empty()),
            is_free,
            price,
            category_id: row.category_id.filter(|c| !c.is_empty()),
        })
    }
}

impl TryFrom<CategoryRow> for Category {
    type Error = RecordError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        let id = row.id.trim().to_string();
        if id.is_empty() {
            return Err(RecordError::MissingId);
        }
        let name = row
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| RecordError::MissingName { id: id.clone() })?;
        Ok(Category { id, name })
    }
}

// Columns without a zone come back with no offset; those are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

// Backends hand out uuid strings or integer keys depending on the table.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(optional_id_as_string(deserializer)?.unwrap_or_default())
}

fn optional_id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> EventRow {
        serde_json::from_value(value).expect("valid row json")
    }

    #[test]
    fn converts_complete_row() {
        let event = Event::try_from(row(json!({
            "id": "e1",
            "title": "Festival de Música",
            "date": "2026-11-02T20:00:00+00:00",
            "location": "Parque Ibirapuera",
            "latitude": -23.5874,
            "longitude": -46.6576,
            "image_url": "https://cdn.example.com/e1.jpg",
            "is_free": false,
            "price": 45.5,
            "category_id": 3
        })))
        .expect("valid event");

        assert_eq!(event.title, "Festival de Música");
        assert_eq!(event.category_id.as_deref(), Some("3"));
        assert_eq!(event.price, 45.5);
        assert_eq!(event.coordinate, Some(GeoPoint::new(-23.5874, -46.6576)));
        assert_eq!(event.starts_at.to_rfc3339(), "2026-11-02T20:00:00+00:00");
    }

    #[test]
    fn partial_or_invalid_coordinates_are_dropped() {
        let one_sided = Event::try_from(row(json!({
            "id": "e2",
            "date": "2026-11-02T20:00:00Z",
            "latitude": 10.0
        })))
        .expect("valid event");
        assert_eq!(one_sided.coordinate, None);
        assert_eq!(one_sided.title, UNTITLED);

        let out_of_range = Event::try_from(row(json!({
            "id": "e3",
            "date": "2026-11-02T20:00:00Z",
            "latitude": 120.0,
            "longitude": 10.0
        })))
        .expect("valid event");
        assert_eq!(out_of_range.coordinate, None);
    }

    #[test]
    fn free_events_have_zero_price() {
        let event = Event::try_from(row(json!({
            "id": "e4",
            "date": "2026-11-02T20:00:00-03:00",
            "is_free": true,
            "price": 30
        })))
        .expect("valid event");
        assert!(event.is_free);
        assert_eq!(event.price, 0.0);
        assert_eq!(event.starts_at.to_rfc3339(), "2026-11-02T23:00:00+00:00");
    }

    #[test]
    fn zoneless_dates_are_utc() {
        let event = Event::try_from(row(json!({
            "id": "e6",
            "date": "2026-11-02T20:00:00"
        })))
        .expect("valid event");
        assert_eq!(event.starts_at.to_rfc3339(), "2026-11-02T20:00:00+00:00");
    }

    #[test]
    fn rejects_bad_date_and_missing_id() {
        let bad_date = Event::try_from(row(json!({ "id": "e5", "date": "next friday" })));
        assert!(matches!(bad_date, Err(RecordError::InvalidDate { .. })));

        let no_id = Event::try_from(row(json!({ "date": "2026-11-02T20:00:00Z" })));
        assert_eq!(no_id, Err(RecordError::MissingId));
    }

    #[test]
    fn category_requires_name() {
        let ok: CategoryRow = serde_json::from_value(json!({ "id": 7, "name": " Music " })).unwrap();
        assert_eq!(
            Category::try_from(ok),
            Ok(Category {
                id: "7".into(),
                name: "Music".into()
            })
        );

        let unnamed: CategoryRow = serde_json::from_value(json!({ "id": "c1" })).unwrap();
        assert!(matches!(
            Category::try_from(unnamed),
            Err(RecordError::MissingName { .. })
        ));
    }
}
