//! Image search used to illustrate generated trips.

pub mod unsplash;

use async_trait::async_trait;

use crate::Result;

pub use unsplash::UnsplashClient;

/// Number of images attached to a trip.
pub const TRIP_IMAGE_COUNT: usize = 3;

#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// Regular-size URLs of the first `limit` results, in result order.
    ///
    /// A result without a usable URL yields `None` in its slot; fewer results than
    /// `limit` yield a shorter list.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Option<String>>>;
}

/// Query string for a trip: country, interests and travel style.
pub fn trip_query(country: &str, interests: &str, travel_style: &str) -> String {
    format!("{} {} {}", country, interests, travel_style)
}
