//! CD 1.1 frame encoding and decoding.
//!
//! Every frame is header (36 bytes), type-specific body, then trailer.
//! The header's trailer offset is the byte offset from the start of the
//! frame to the trailer, so it doubles as the body length declaration.
//! Decoding is all-or-nothing: any truncation or inconsistency rejects
//! the whole frame without partial effects.

mod control;
mod data;

pub use control::{
    AcknackPayload, AlertPayload, CommandRequestPayload, CommandResponsePayload,
    ConnectionExchange, OptionExchange,
};
pub use data::{ChannelSubframe, CompressionFormat, DataPayload, SensorType};

use crate::error::{Cd11Error, Result};
use crate::wire::{self, Reader};

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 36;

/// Wire width of the creator and destination fields.
pub const IDENTIFIER_LEN: usize = 8;

/// Wire width of a frame-set name.
pub const FRAMESET_LEN: usize = 20;

/// Frame type codes as they appear on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    ConnectionRequest,
    ConnectionResponse,
    OptionRequest,
    OptionResponse,
    Data,
    Acknack,
    Alert,
    CommandRequest,
    CommandResponse,
    CustomReset,
}

impl FrameType {
    pub fn from_code(code: i32) -> Result<Self> {
        Ok(match code {
            1 => Self::ConnectionRequest,
            2 => Self::ConnectionResponse,
            3 => Self::OptionRequest,
            4 => Self::OptionResponse,
            5 => Self::Data,
            6 => Self::Acknack,
            7 => Self::Alert,
            8 => Self::CommandRequest,
            9 => Self::CommandResponse,
            26 => Self::CustomReset,
            other => return Err(Cd11Error::UnknownFrameType(other)),
        })
    }

    pub fn code(self) -> i32 {
        match self {
            Self::ConnectionRequest => 1,
            Self::ConnectionResponse => 2,
            Self::OptionRequest => 3,
            Self::OptionResponse => 4,
            Self::Data => 5,
            Self::Acknack => 6,
            Self::Alert => 7,
            Self::CommandRequest => 8,
            Self::CommandResponse => 9,
            Self::CustomReset => 26,
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ConnectionRequest => "connection request",
            Self::ConnectionResponse => "connection response",
            Self::OptionRequest => "option request",
            Self::OptionResponse => "option response",
            Self::Data => "data",
            Self::Acknack => "acknack",
            Self::Alert => "alert",
            Self::CommandRequest => "command request",
            Self::CommandResponse => "command response",
            Self::CustomReset => "custom reset",
        };
        f.write_str(name)
    }
}

/// The fixed fields of the frame header. The frame type and trailer
/// offset are derived from the payload at encode time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Sender identifier, at most 8 bytes.
    pub creator: String,
    /// Receiver identifier, at most 8 bytes.
    pub destination: String,
    /// Per-frame-set sequence number. Meaningful for data and command
    /// response frames; zero elsewhere.
    pub sequence: u64,
    /// Series number of the frame-set.
    pub series: i32,
}

/// Authentication trailer. The comm verification word is carried as an
/// opaque pass-through; no checksum is computed or verified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameTrailer {
    pub auth_key_id: i32,
    /// Unpadded authentication value bytes.
    pub auth_value: Vec<u8>,
    pub comm_verification: u64,
}

impl FrameTrailer {
    /// Serialized trailer length including auth padding.
    pub fn wire_len(&self) -> usize {
        4 + 4 + wire::padded_len(self.auth_value.len()) + 8
    }
}

/// Type-specific frame body.
#[derive(Clone, Debug, PartialEq)]
pub enum FramePayload {
    ConnectionRequest(ConnectionExchange),
    ConnectionResponse(ConnectionExchange),
    OptionRequest(OptionExchange),
    OptionResponse(OptionExchange),
    Data(DataPayload),
    Acknack(AcknackPayload),
    Alert(AlertPayload),
    CommandRequest(CommandRequestPayload),
    CommandResponse(CommandResponsePayload),
    CustomReset(Vec<u8>),
}

impl FramePayload {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::ConnectionRequest(_) => FrameType::ConnectionRequest,
            Self::ConnectionResponse(_) => FrameType::ConnectionResponse,
            Self::OptionRequest(_) => FrameType::OptionRequest,
            Self::OptionResponse(_) => FrameType::OptionResponse,
            Self::Data(_) => FrameType::Data,
            Self::Acknack(_) => FrameType::Acknack,
            Self::Alert(_) => FrameType::Alert,
            Self::CommandRequest(_) => FrameType::CommandRequest,
            Self::CommandResponse(_) => FrameType::CommandResponse,
            Self::CustomReset(_) => FrameType::CustomReset,
        }
    }
}

/// One decoded CD 1.1 frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: FramePayload,
    pub trailer: FrameTrailer,
}

impl Frame {
    pub fn frame_type(&self) -> FrameType {
        self.payload.frame_type()
    }

    /// Decode one frame from the beginning of a buffer.
    ///
    /// Returns `(frame, bytes_consumed)` because frames are
    /// variable-length and buffers may hold more than one.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < HEADER_LEN {
            return Err(Cd11Error::FrameTooShort {
                expected: HEADER_LEN,
                actual: buf.len(),
            });
        }

        let mut r = Reader::new(buf);
        let frame_type = FrameType::from_code(r.i32()?)?;
        let trailer_offset = r.i32()?;
        let creator = r.fixed_str(IDENTIFIER_LEN)?;
        let destination = r.fixed_str(IDENTIFIER_LEN)?;
        let sequence = r.u64()?;
        let series = r.i32()?;

        if trailer_offset < HEADER_LEN as i32 {
            return Err(Cd11Error::InvalidTrailerOffset {
                offset: trailer_offset,
                header: HEADER_LEN,
            });
        }

        let body = r.take(trailer_offset as usize - HEADER_LEN)?;
        // The body is fully present at this point, so an underflow inside
        // it means inconsistent declared sizes, not a short read.
        let payload = decode_body(frame_type, body).map_err(|e| match e {
            Cd11Error::FrameTooShort { expected, actual } => Cd11Error::InvalidField {
                field: "frame body",
                reason: format!("declared sizes need {expected} bytes, body holds {actual}"),
            },
            other => other,
        })?;

        let auth_key_id = r.i32()?;
        let auth_size = r.i32()?;
        if auth_size < 0 {
            return Err(Cd11Error::InvalidField {
                field: "auth size",
                reason: format!("negative: {auth_size}"),
            });
        }
        let auth_value = r.padded_bytes(auth_size as usize)?;
        let comm_verification = r.u64()?;

        let frame = Frame {
            header: FrameHeader {
                creator,
                destination,
                sequence,
                series,
            },
            payload,
            trailer: FrameTrailer {
                auth_key_id,
                auth_value,
                comm_verification,
            },
        };
        Ok((frame, buf.len() - r.remaining()))
    }

    /// Serialize the frame, computing the trailer offset.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = encode_body(&self.payload)?;
        let trailer_offset = HEADER_LEN + body.len();

        let mut buf = Vec::with_capacity(trailer_offset + self.trailer.wire_len());
        buf.extend_from_slice(&self.frame_type().code().to_be_bytes());
        buf.extend_from_slice(&(trailer_offset as i32).to_be_bytes());
        wire::put_fixed_str(&mut buf, "creator", &self.header.creator, IDENTIFIER_LEN)?;
        wire::put_fixed_str(
            &mut buf,
            "destination",
            &self.header.destination,
            IDENTIFIER_LEN,
        )?;
        buf.extend_from_slice(&self.header.sequence.to_be_bytes());
        buf.extend_from_slice(&self.header.series.to_be_bytes());
        buf.extend_from_slice(&body);

        buf.extend_from_slice(&self.trailer.auth_key_id.to_be_bytes());
        buf.extend_from_slice(&(self.trailer.auth_value.len() as i32).to_be_bytes());
        wire::put_padded_bytes(&mut buf, &self.trailer.auth_value);
        buf.extend_from_slice(&self.trailer.comm_verification.to_be_bytes());
        Ok(buf)
    }
}

fn decode_body(frame_type: FrameType, body: &[u8]) -> Result<FramePayload> {
    Ok(match frame_type {
        FrameType::ConnectionRequest => {
            FramePayload::ConnectionRequest(control::decode_connection(body)?)
        }
        FrameType::ConnectionResponse => {
            FramePayload::ConnectionResponse(control::decode_connection(body)?)
        }
        FrameType::OptionRequest => FramePayload::OptionRequest(control::decode_option(body)?),
        FrameType::OptionResponse => FramePayload::OptionResponse(control::decode_option(body)?),
        FrameType::Data => FramePayload::Data(data::decode_data(body)?),
        FrameType::Acknack => FramePayload::Acknack(control::decode_acknack(body)?),
        FrameType::Alert => FramePayload::Alert(control::decode_alert(body)?),
        FrameType::CommandRequest => {
            FramePayload::CommandRequest(control::decode_command_request(body)?)
        }
        FrameType::CommandResponse => {
            FramePayload::CommandResponse(control::decode_command_response(body)?)
        }
        FrameType::CustomReset => FramePayload::CustomReset(body.to_vec()),
    })
}

fn encode_body(payload: &FramePayload) -> Result<Vec<u8>> {
    match payload {
        FramePayload::ConnectionRequest(p) | FramePayload::ConnectionResponse(p) => {
            control::encode_connection(p)
        }
        FramePayload::OptionRequest(p) | FramePayload::OptionResponse(p) => {
            control::encode_option(p)
        }
        FramePayload::Data(p) => data::encode_data(p),
        FramePayload::Acknack(p) => control::encode_acknack(p),
        FramePayload::Alert(p) => control::encode_alert(p),
        FramePayload::CommandRequest(p) => control::encode_command_request(p),
        FramePayload::CommandResponse(p) => control::encode_command_response(p),
        FramePayload::CustomReset(bytes) => Ok(bytes.clone()),
    }
}
