//! Trip generation and the trip catalog.
//!
//! [`TripPipeline::handle`] walks one `create-trip` request through method gate,
//! secret check, body decode, prompt, model call (with [`RetryPolicy`]), output
//! parsing, image lookup and persistence. [`TripCatalog`] reads stored trips back.

pub mod catalog;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod types;

pub use catalog::{page_number, TripCatalog, TripPage, PAGE_SIZE};
pub use parse::{extract_json, parse_trip, parse_trip_detail, trip_schema, ParsedTrip};
pub use pipeline::{PipelineResponse, TripPipeline, METHOD_NOT_ALLOWED_MESSAGE};
pub use prompt::build_prompt;
pub use retry::RetryPolicy;
pub use types::{Activity, ItineraryDay, Trip, TripGenerationRequest, TripLocation, TripRecord};
