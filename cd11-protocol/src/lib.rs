//! CD 1.1 protocol types, frame codec, and gap tracking.
//!
//! This crate provides the shared protocol layer for the CD 1.1
//! continuous-data format, used by both the client and receiver crates.

pub mod error;
pub mod factory;
pub mod frame;
pub mod gap;
pub mod time;
pub mod wire;

pub use error::{Cd11Error, Result};
pub use factory::FrameFactory;
pub use frame::{
    AcknackPayload, AlertPayload, ChannelSubframe, CommandRequestPayload, CommandResponsePayload,
    CompressionFormat, ConnectionExchange, DataPayload, Frame, FrameHeader, FramePayload,
    FrameTrailer, FrameType, OptionExchange, SensorType,
};
pub use gap::{GapList, GapRange};
