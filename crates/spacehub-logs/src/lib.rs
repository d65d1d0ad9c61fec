//! spacehub-logs: real-time relay of space app logs.
//!
//! The build and deploy infrastructure exposes each app's build log and
//! service log as a long-lived chunked HTTP response. [`LogRelay`] opens
//! that response with a bearer token and forwards it chunk by chunk to a
//! [`LogStream`]. At most one chunk is in flight between upstream and
//! subscriber, so nothing is buffered beyond it.
//!
//! The relay ends when the upstream closes, when an upstream read fails
//! (the error is delivered as the last item), or when the subscriber drops
//! its stream.

pub mod error;
pub mod relay;

pub use error::{LogRelayError, LogRelayResult};
pub use relay::{LogKind, LogRelay, LogRelayConfig, LogStream};
