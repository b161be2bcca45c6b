//! Async CD 1.1 sending-side socket for pushing station data frames.
//!
//! Connect to a data consumer, push data, alert, acknack, and option
//! frames, and read whatever the receiver sends back.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> cd11_rs_client::Result<()> {
//! use cd11_rs_client::Cd11Client;
//!
//! let mut client = Cd11Client::connect("127.0.0.1:8100").await?;
//! client.send_alert("going away").await?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub(crate) mod connection;
pub mod error;
pub mod stream;

pub use client::{Cd11Client, ClientConfig};
pub use error::{ClientError, Result};
pub use stream::frame_stream;
