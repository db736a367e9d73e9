mod async_result;
mod blocking;
mod client;
mod error;

pub use async_result::{AsyncResult, DEFAULT_POLL_INTERVAL};
pub use blocking::{BlockingAsyncResult, BlockingClient};
pub use client::{ApplyOptions, Client};
pub use error::{ClientError, Result};

/// Routing metadata attached to submitted envelopes
pub use celeryq_protocol::DeliveryInfo as DeliveryOptions;
