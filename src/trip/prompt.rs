use super::types::TripGenerationRequest;

/// Build the itinerary instruction for the model.
///
/// Every request parameter is embedded, followed by the JSON shape the answer must
/// follow. The model is told to answer with plain JSON, without markdown.
pub fn build_prompt(req: &TripGenerationRequest) -> String {
    let days = req.number_of_days;
    format!(
        r#"Generate a {days}-day travel itinerary for {country} based on the following user information:
Budget: '{budget}'
Interests: '{interests}'
TravelStyle: '{travel_style}'
GroupType: '{group_type}'
Return the itinerary and lowest estimated price in a clean, non-markdown JSON format with the following structure:
{{
"name": "A descriptive title for the trip",
"description": "A brief description of the trip and its highlights not exceeding 100 words",
"estimatedPrice": "Lowest average price for the trip in USD, e.g.$price",
"duration": {days},
"budget": "{budget}",
"travelStyle": "{travel_style}",
"country": "{country}",
"interests": "{interests}",
"groupType": "{group_type}",
"bestTimeToVisit": [
  "🌸 Season (from month to month): reason to visit",
  "☀️ Season (from month to month): reason to visit",
  "🍁 Season (from month to month): reason to visit",
  "❄️ Season (from month to month): reason to visit"
],
"weatherInfo": [
  "☀️ Season: temperature range in Celsius (temperature range in Fahrenheit)",
  "🌦️ Season: temperature range in Celsius (temperature range in Fahrenheit)",
  "🌧️ Season: temperature range in Celsius (temperature range in Fahrenheit)",
  "❄️ Season: temperature range in Celsius (temperature range in Fahrenheit)"
],
"location": {{
  "city": "name of the city or region",
  "coordinates": [latitude, longitude],
  "openStreetMap": "link to open street map"
}},
"itinerary": [
{{
  "day": 1,
  "location": "City/Region Name",
  "activities": [
    {{"time": "Morning", "description": "🏰 Visit the local historic castle and enjoy a scenic walk"}},
    {{"time": "Afternoon", "description": "🖼️ Explore a famous art museum with a guided tour"}},
    {{"time": "Evening", "description": "🍷 Dine at a rooftop restaurant with local wine"}}
  ]
}},
...
]
}}"#,
        days = days,
        country = req.country,
        budget = req.budget,
        interests = req.interests,
        travel_style = req.travel_style,
        group_type = req.group_type,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TripGenerationRequest {
        TripGenerationRequest {
            country: "Portugal".into(),
            number_of_days: 5,
            travel_style: "Relaxed".into(),
            interests: "Food & Culinary".into(),
            budget: "Mid-range".into(),
            group_type: "Couple".into(),
            user_id: "user-1".into(),
        }
    }

    #[test]
    fn embeds_every_parameter() {
        let prompt = build_prompt(&request());
        assert!(prompt.starts_with("Generate a 5-day travel itinerary for Portugal"));
        for needle in [
            "Budget: 'Mid-range'",
            "Interests: 'Food & Culinary'",
            "TravelStyle: 'Relaxed'",
            "GroupType: 'Couple'",
            "\"duration\": 5,",
            "\"interests\": \"Food & Culinary\",",
        ] {
            assert!(prompt.contains(needle), "missing {needle}");
        }
        assert!(!prompt.contains("user-1"));
    }

    #[test]
    fn asks_for_plain_json() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains("non-markdown JSON"));
        for field in ["bestTimeToVisit", "weatherInfo", "openStreetMap", "itinerary", "activities"] {
            assert!(prompt.contains(field));
        }
    }
}
