//! Incident extraction from TomTom `incidentDetails` payloads.
//!
//! Records are parsed one at a time from raw JSON so that a malformed entry
//! only drops itself, never the batch or the parent reading.

use chrono::{DateTime, Utc};
use common::{Incident, IncidentType, Severity};
use serde_json::Value;
use tracing::debug;

/// Map a TomTom icon category onto an incident type.
///
/// Accepts the textual categories as well as TomTom's numeric icon codes
/// (1 accident, 6 jam, 7 lane closed, 8 road closed, 9 road works).
pub fn incident_type_for(category: &str) -> IncidentType {
    match category.trim().to_ascii_lowercase().as_str() {
        "accident" | "1" => IncidentType::Accident,
        "roadwork" | "construction" | "9" => IncidentType::Roadwork,
        "congestion" | "jam" | "6" => IncidentType::Congestion,
        "closure" | "roadclosed" | "7" | "8" => IncidentType::Closure,
        _ => IncidentType::Other,
    }
}

/// First `[lng, lat]` position of a geometry's coordinates.
///
/// Point geometries carry a flat `[lng, lat]`; line geometries carry a list of
/// positions, in which case the first one is used.
fn first_position(coordinates: &Value) -> Option<(f64, f64)> {
    let values = coordinates.as_array()?;
    match values.first()? {
        Value::Array(_) => first_position(values.first()?),
        _ if values.len() >= 2 => Some((values[0].as_f64()?, values[1].as_f64()?)),
        _ => None,
    }
}

fn category_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "other".to_string(),
    }
}

/// Parse one raw incident record. Returns `None` when the geometry or the
/// properties block is missing or unusable.
pub fn parse_incident(raw: &Value, reported_at: DateTime<Utc>) -> Option<Incident> {
    let coordinates = raw.get("geometry")?.get("coordinates")?;
    let (longitude, latitude) = first_position(coordinates)?;

    let properties = raw.get("properties")?.as_object()?;

    let category = category_string(properties.get("iconCategory"));
    let magnitude = properties
        .get("magnitudeOfDelay")
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let description = properties
        .get("events")
        .and_then(Value::as_array)
        .and_then(|events| events.first())
        .map(|event| {
            event
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        });

    Some(Incident {
        latitude,
        longitude,
        incident_type: incident_type_for(&category),
        severity: Severity::from_magnitude(magnitude),
        description,
        delay_minutes: Some(magnitude.max(0) as u32),
        reported_at,
    })
}

/// Parse every usable record from an `{"incidents": [...]}` payload.
pub fn parse_incidents(payload: &Value) -> Vec<Incident> {
    let Some(records) = payload.get("incidents").and_then(Value::as_array) else {
        return Vec::new();
    };

    let now = Utc::now();
    let incidents: Vec<Incident> = records
        .iter()
        .filter_map(|raw| {
            let parsed = parse_incident(raw, now);
            if parsed.is_none() {
                debug!("Skipping malformed TomTom incident record");
            }
            parsed
        })
        .collect();

    debug!("Parsed {}/{} TomTom incidents", incidents.len(), records.len());
    incidents
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_point_incident() {
        let raw = json!({
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [4.8897, 52.3731]},
            "properties": {
                "iconCategory": "Accident",
                "magnitudeOfDelay": 3,
                "events": [{"description": "Stationary traffic", "code": 108}]
            }
        });

        let incident = parse_incident(&raw, Utc::now()).expect("incident should parse");
        assert_eq!(incident.longitude, 4.8897);
        assert_eq!(incident.latitude, 52.3731);
        assert_eq!(incident.incident_type, IncidentType::Accident);
        assert_eq!(incident.severity, Severity::High);
        assert_eq!(incident.delay_minutes, Some(3));
        assert_eq!(incident.description.as_deref(), Some("Stationary traffic"));
    }

    #[test]
    fn test_line_geometry_uses_first_position() {
        let raw = json!({
            "geometry": {"type": "LineString", "coordinates": [[4.1, 52.1], [4.2, 52.2]]},
            "properties": {"iconCategory": 8, "magnitudeOfDelay": 4}
        });

        let incident = parse_incident(&raw, Utc::now()).expect("incident should parse");
        assert_eq!((incident.longitude, incident.latitude), (4.1, 52.1));
        assert_eq!(incident.incident_type, IncidentType::Closure);
        assert!(incident.description.is_none());
    }

    #[test]
    fn test_event_without_description_gives_empty_text() {
        let raw = json!({
            "geometry": {"coordinates": [4.1, 52.1]},
            "properties": {"iconCategory": "jam", "events": [{"code": 1}]}
        });

        let incident = parse_incident(&raw, Utc::now()).expect("incident should parse");
        assert_eq!(incident.description.as_deref(), Some(""));
    }

    #[test]
    fn test_records_without_geometry_or_properties_are_skipped() {
        let now = Utc::now();
        assert!(parse_incident(&json!({"properties": {}}), now).is_none());
        assert!(parse_incident(&json!({"geometry": {"coordinates": [4.1]}, "properties": {}}), now).is_none());
        assert!(parse_incident(&json!({"geometry": {"coordinates": [4.1, 52.1]}}), now).is_none());
    }

    #[test]
    fn test_batch_skips_bad_records() {
        let payload = json!({
            "incidents": [
                {"geometry": {"coordinates": [4.1, 52.1]}, "properties": {"iconCategory": "jam"}},
                {"geometry": {"coordinates": "oops"}, "properties": {}},
                {"properties": {"iconCategory": "roadwork"}},
                {"geometry": {"coordinates": [4.3, 52.3]}, "properties": {"iconCategory": "construction", "magnitudeOfDelay": 6}}
            ]
        });

        let incidents = parse_incidents(&payload);
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].incident_type, IncidentType::Congestion);
        assert_eq!(incidents[0].severity, Severity::Low);
        assert_eq!(incidents[1].incident_type, IncidentType::Roadwork);
        assert_eq!(incidents[1].severity, Severity::Critical);
    }

    #[test]
    fn test_category_lookup() {
        assert_eq!(incident_type_for("ROADCLOSED"), IncidentType::Closure);
        assert_eq!(incident_type_for("closure"), IncidentType::Closure);
        assert_eq!(incident_type_for("fog"), IncidentType::Other);
        assert_eq!(incident_type_for(""), IncidentType::Other);
    }

    #[test]
    fn test_missing_incidents_key_yields_empty() {
        assert!(parse_incidents(&json!({})).is_empty());
    }
}
