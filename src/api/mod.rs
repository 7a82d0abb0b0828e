//! HTTP API module for Tabletalk.
//!
//! Exposes the query pipeline over a small REST surface, including a
//! server-sent-events variant for progress and token streaming.

mod handlers;
mod rest;

pub use handlers::*;
pub use rest::*;
