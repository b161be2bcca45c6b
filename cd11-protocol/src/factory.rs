//! Outbound frame construction.
//!
//! A [`FrameFactory`] carries the identity fields every outbound frame
//! repeats (creator, destination, authentication key) and stamps them
//! onto well-formed frames of each kind.

use crate::frame::{
    AcknackPayload, AlertPayload, ChannelSubframe, ConnectionExchange, DataPayload, Frame,
    FrameHeader, FramePayload, FrameTrailer, OptionExchange,
};
use crate::gap::GapList;

/// Protocol version advertised in connection frames.
pub const MAJOR_VERSION: u16 = 1;
pub const MINOR_VERSION: u16 = 1;

#[derive(Clone, Debug)]
pub struct FrameFactory {
    creator: String,
    destination: String,
    auth_key_id: i32,
    series: i32,
}

impl FrameFactory {
    pub fn new(creator: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            creator: creator.into(),
            destination: destination.into(),
            auth_key_id: 0,
            series: 0,
        }
    }

    pub fn with_auth_key(mut self, auth_key_id: i32) -> Self {
        self.auth_key_id = auth_key_id;
        self
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    /// Frame-set name this factory acknowledges, `creator:series`.
    pub fn frameset(&self) -> String {
        format!("{}:{}", self.creator, self.series)
    }

    fn frame(&self, sequence: u64, payload: FramePayload) -> Frame {
        Frame {
            header: FrameHeader {
                creator: self.creator.clone(),
                destination: self.destination.clone(),
                sequence,
                series: self.series,
            },
            payload,
            trailer: FrameTrailer {
                auth_key_id: self.auth_key_id,
                auth_value: Vec::new(),
                // checksum is an opaque pass-through field
                comm_verification: 0,
            },
        }
    }

    /// Acknack reporting the current state of a gap list under the given
    /// frame-set name.
    pub fn acknack(&self, frameset: &str, gaps: &GapList) -> Frame {
        self.frame(
            0,
            FramePayload::Acknack(AcknackPayload {
                frameset: frameset.to_owned(),
                lowest: gaps.lowest(),
                highest: gaps.highest(),
                gaps: gaps.snapshot(),
            }),
        )
    }

    pub fn alert(&self, message: impl Into<String>) -> Frame {
        self.frame(
            0,
            FramePayload::Alert(AlertPayload {
                message: message.into(),
            }),
        )
    }

    pub fn data(&self, subframes: Vec<ChannelSubframe>, sequence: u64) -> Frame {
        let nominal_time_ms = subframes.first().map_or(0, |sf| sf.timestamp_ms);
        let frame_time_length_ms = subframes.first().map_or(0, |sf| sf.time_length_ms);
        self.frame(
            sequence,
            FramePayload::Data(DataPayload {
                frame_time_length_ms,
                nominal_time_ms,
                subframes,
            }),
        )
    }

    pub fn option_request(&self, option_type: u32, option_value: Vec<u8>) -> Frame {
        self.frame(
            0,
            FramePayload::OptionRequest(OptionExchange {
                option_type,
                option_value,
            }),
        )
    }

    /// Option response agreeing to a received request.
    pub fn option_response(&self, request: &OptionExchange) -> Frame {
        self.frame(0, FramePayload::OptionResponse(request.clone()))
    }

    pub fn connection_request(&self, station: impl Into<String>) -> Frame {
        self.connection(station, FramePayload::ConnectionRequest)
    }

    pub fn connection_response(&self, station: impl Into<String>) -> Frame {
        self.connection(station, FramePayload::ConnectionResponse)
    }

    fn connection(
        &self,
        station: impl Into<String>,
        wrap: fn(ConnectionExchange) -> FramePayload,
    ) -> Frame {
        self.frame(
            0,
            wrap(ConnectionExchange {
                major_version: MAJOR_VERSION,
                minor_version: MINOR_VERSION,
                station: station.into(),
                station_type: "IDC".into(),
                service_type: "TCP".into(),
                ip: 0,
                port: 0,
                secondary_ip: 0,
                secondary_port: 0,
            }),
        )
    }

    pub fn custom_reset(&self) -> Frame {
        self.frame(0, FramePayload::CustomReset(Vec::new()))
    }
}
