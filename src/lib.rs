//! # trip-edge
//!
//! Edge request handling for an AI trip planner.
//!
//! ## Overview
//!
//! Two request flows share one process:
//!
//! - **SSR bridge** ([`ssr`]): adapts an inbound HTTP request into a protocol-neutral
//!   [`ssr::NormalizedRequest`], invokes a page render handler (primary calling
//!   convention first, legacy convention as fallback) and streams the
//!   [`ssr::RenderResult`] back into the platform response.
//! - **Trip generation** ([`trip`]): a POST-only JSON endpoint that builds an itinerary
//!   prompt, calls a generative text model with bounded rate-limit retries, parses the
//!   answer into a [`trip::Trip`], enriches it with images and persists the record in a
//!   document store.
//!
//! External services sit behind traits ([`drivers::TextModel`], [`images::ImageSearch`],
//! [`store::DocumentStore`], [`ssr::RenderHandler`]) and are constructed once at startup
//! and injected into the components that need them.
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`ssr`] | Request normalization, render handler invocation, body delivery |
//! | [`trip`] | Trip types, prompt, parsing, retry policy, pipeline, catalog |
//! | [`drivers`] | Text model trait and the Gemini `generateContent` driver |
//! | [`images`] | Image search trait and the Unsplash client |
//! | [`store`] | Document store trait, Appwrite client, in-memory store |
//! | [`users`] | User directory over the document store |
//! | [`server`] | axum router and handlers |
//! | [`config`] | YAML + environment configuration |

pub mod config;
pub mod drivers;
pub mod error_code;
pub mod images;
pub mod logging;
pub mod server;
pub mod ssr;
pub mod store;
pub mod transport;
pub mod trip;
pub mod users;

pub use config::{AppConfig, Secrets};
pub use server::{router, AppState};
pub use ssr::{NormalizedRequest, RenderHandler, RenderResult, ResponseBody, SsrBridge};
pub use trip::{Trip, TripGenerationRequest, TripPipeline};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the crate
pub mod error;
pub use error::{Error, ErrorContext};
