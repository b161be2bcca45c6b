//! Stream adapter over a connected client.

use async_stream::try_stream;
use cd11_rs_protocol::Frame;
use futures_core::Stream;

use crate::client::Cd11Client;
use crate::error::ClientError;

/// Turn a connected client into a stream of inbound frames.
///
/// The stream ends cleanly when the peer closes the connection; every
/// other error is yielded to the consumer.
pub fn frame_stream(
    mut client: Cd11Client,
) -> impl Stream<Item = std::result::Result<Frame, ClientError>> {
    try_stream! {
        loop {
            match client.read().await {
                Ok(frame) => yield frame,
                Err(ClientError::Disconnected) => break,
                Err(e) => Err(e)?,
            }
        }
    }
}
