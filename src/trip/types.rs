use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/create-trip`.
///
/// `number_of_days` is bounded (1-10) by the form that sends it and is not re-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripGenerationRequest {
    pub country: String,
    pub number_of_days: u32,
    pub travel_style: String,
    pub interests: String,
    pub budget: String,
    pub group_type: String,
    pub user_id: String,
}

/// Itinerary produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub name: String,
    pub description: String,
    pub estimated_price: String,
    pub duration: u32,
    pub budget: String,
    pub travel_style: String,
    pub country: String,
    pub interests: String,
    pub group_type: String,
    pub best_time_to_visit: Vec<String>,
    pub weather_info: Vec<String>,
    pub location: TripLocation,
    pub itinerary: Vec<ItineraryDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TripLocation {
    pub city: String,
    /// Latitude, longitude.
    pub coordinates: [f64; 2],
    pub open_street_map: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ItineraryDay {
    pub day: u32,
    pub location: String,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Activity {
    pub time: String,
    pub description: String,
}

/// Document written to the trip collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRecord {
    /// The model's trip JSON, serialized.
    pub trip_detail: String,
    /// RFC 3339, UTC, millisecond precision.
    pub created_at: String,
    pub image_urls: Vec<Option<String>>,
    pub user_id: String,
}

impl TripRecord {
    pub fn to_data(&self) -> crate::Result<serde_json::Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(serde_json::Map::new()),
        }
    }
}
