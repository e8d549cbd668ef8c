//! Outbound HTTP plumbing shared by the Gemini, Unsplash, Appwrite and SSR upstream clients.

pub mod http;

pub use http::{read_json, remote_error, HttpTransport, TransportError};
