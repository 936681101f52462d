use chrono_tz::Tz;

use crate::geo::GeoPoint;
use crate::models::{Category, Event};

pub fn price_label(event: &Event) -> String {
    if event.is_free || event.price <= 0.0 {
        "Free".to_string()
    } else {
        format!("{:.2}", event.price)
    }
}

pub fn local_time(event: &Event, tz: Tz) -> String {
    event
        .starts_at
        .with_timezone(&tz)
        .format("%a %b %e @ %H:%M %Z")
        .to_string()
}

/// One block of text per event for terminal output.
pub fn event_block(
    event: &Event,
    tz: Tz,
    origin: Option<GeoPoint>,
    categories: &[Category],
) -> String {
    let mut lines = vec![event.title.clone()];

    let location = if event.location.is_empty() {
        "Location TBA".to_string()
    } else {
        event.location.clone()
    };
    let distance = origin
        .zip(event.coordinate)
        .map(|(from, to)| format!(" ({:.1} km)", from.distance_km(&to)));
    lines.push(format!(
        "  Where: {location}{}",
        distance.unwrap_or_default()
    ));
    lines.push(format!("  When: {}", local_time(event, tz)));
    lines.push(format!("  Price: {}", price_label(event)));

    if let Some(name) = event
        .category_id
        .as_deref()
        .and_then(|id| categories.iter().find(|c| c.id == id))
        .map(|c| c.name.as_str())
    {
        lines.push(format!("  Category: {name}"));
    }

    lines.join("\n")
}
