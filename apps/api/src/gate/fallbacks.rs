// Sample data served to free and anonymous callers on static-fallback routes.

use serde_json::{json, Value};

use crate::gate::routes::GatedRoute;
use crate::models::catalog::Stream;

/// The sample payload for a static-fallback route.
pub fn for_route(route: &GatedRoute) -> Option<Value> {
    match route {
        GatedRoute::Streams => Some(streams()),
        GatedRoute::Colleges => Some(colleges()),
        GatedRoute::CoachingForCareer { .. } | GatedRoute::CoachingDetail { .. } => {
            Some(coaching())
        }
        _ => None,
    }
}

pub fn streams() -> Value {
    Value::Array(
        Stream::ALL
            .iter()
            .map(|s| json!({ "name": s.as_str(), "subjects": s.core_subjects() }))
            .collect(),
    )
}

pub fn colleges() -> Value {
    json!([
        { "id": "c1", "name": "City Engineering College", "city": "Pune" },
        { "id": "c2", "name": "National Commerce College", "city": "Ahmedabad" },
    ])
}

pub fn coaching() -> Value {
    json!([
        { "id": "k1", "name": "Apex Coaching" },
        { "id": "k2", "name": "Elite Academy" },
        { "id": "k3", "name": "Focus Institute" },
    ])
}
