//! External processing service client
//!
//! `client` sends a single request and classifies the reply; `retry` is the
//! opt-in caller policy layered on top of it.

pub mod client;
pub mod retry;

pub use client::{
    RequestBody, UpstreamBody, UpstreamClient, UpstreamError, UpstreamResponse, UpstreamStream,
};
pub use retry::RetryPolicy;
