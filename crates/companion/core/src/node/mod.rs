//! Access to the followed node.

mod error;
pub use error::NodeClientError;

mod traits;
pub use traits::{BlockSource, HeightStream, RetentionControl};
#[cfg(test)]
pub(crate) use traits::{MockBlockSource, MockRetentionControl};

mod client;
pub use client::NodeClient;
