//! Whole-frame codec tests over the public API: every frame type
//! round-trips, plus a golden byte vector pinning the wire layout.

use cd11_rs_protocol::{
    AcknackPayload, AlertPayload, ChannelSubframe, CommandRequestPayload, CommandResponsePayload,
    CompressionFormat, ConnectionExchange, DataPayload, Frame, FrameHeader, FramePayload,
    FrameTrailer, FrameType, GapRange, OptionExchange, SensorType,
};

fn header(sequence: u64) -> FrameHeader {
    FrameHeader {
        creator: "MKAR".into(),
        destination: "DC".into(),
        sequence,
        series: 0,
    }
}

fn trailer() -> FrameTrailer {
    FrameTrailer {
        auth_key_id: 4,
        auth_value: b"auth-sig".to_vec(),
        comm_verification: 0x0123_4567_89AB_CDEF,
    }
}

fn roundtrip(payload: FramePayload) -> Frame {
    let frame = Frame {
        header: header(11),
        payload,
        trailer: trailer(),
    };
    let bytes = frame.encode().expect("encode");
    let (decoded, consumed) = Frame::decode(&bytes).expect("decode");
    assert_eq!(consumed, bytes.len(), "whole buffer consumed");
    assert_eq!(decoded, frame);
    decoded
}

fn connection() -> ConnectionExchange {
    ConnectionExchange {
        major_version: 1,
        minor_version: 1,
        station: "MKAR".into(),
        station_type: "IDC".into(),
        service_type: "TCP".into(),
        ip: 0xC0A8_0001,
        port: 8100,
        secondary_ip: 0,
        secondary_port: 0,
    }
}

fn subframe() -> ChannelSubframe {
    ChannelSubframe {
        authentication_on: true,
        compression: CompressionFormat::CanadianAfterSignature,
        sensor_type: SensorType::Infrasonic,
        is_calibration: false,
        site: "I51H1".into(),
        channel: "BDF".into(),
        location: "".into(),
        data_format: "s4".into(),
        calibration_factor: 0.0,
        calibration_period: 0.0,
        timestamp_ms: 1_700_000_000_000,
        time_length_ms: 10_000,
        sample_count: 200,
        channel_status: vec![1, 0, 0, 0],
        data: vec![0x5A; 123],
        subframe_count: 3,
        auth_key_id: 4,
        auth_value: vec![9, 9, 9],
    }
}

#[test]
fn connection_request_roundtrip() {
    let frame = roundtrip(FramePayload::ConnectionRequest(connection()));
    assert_eq!(frame.frame_type(), FrameType::ConnectionRequest);
}

#[test]
fn connection_response_roundtrip() {
    roundtrip(FramePayload::ConnectionResponse(connection()));
}

#[test]
fn option_request_roundtrip() {
    roundtrip(FramePayload::OptionRequest(OptionExchange {
        option_type: 1,
        option_value: b"MKAR".to_vec(),
    }));
}

#[test]
fn option_response_roundtrip() {
    roundtrip(FramePayload::OptionResponse(OptionExchange {
        option_type: 1,
        option_value: Vec::new(),
    }));
}

#[test]
fn data_roundtrip() {
    roundtrip(FramePayload::Data(DataPayload {
        frame_time_length_ms: 10_000,
        nominal_time_ms: 1_700_000_000_000,
        subframes: vec![subframe()],
    }));
}

#[test]
fn acknack_roundtrip() {
    roundtrip(FramePayload::Acknack(AcknackPayload {
        frameset: "MKAR:0".into(),
        lowest: 1,
        highest: 500,
        gaps: vec![GapRange::new(7, 19), GapRange::new(44, 44)],
    }));
}

#[test]
fn alert_roundtrip() {
    roundtrip(FramePayload::Alert(AlertPayload {
        message: "going down for maintenance".into(),
    }));
}

#[test]
fn command_request_roundtrip() {
    roundtrip(FramePayload::CommandRequest(CommandRequestPayload {
        station: "MKAR".into(),
        site: "MK01".into(),
        channel: "SHZ".into(),
        location: "01".into(),
        timestamp_ms: 1_700_000_000_000,
        message: "calibrate now".into(),
    }));
}

#[test]
fn command_response_roundtrip() {
    roundtrip(FramePayload::CommandResponse(CommandResponsePayload {
        station: "MKAR".into(),
        site: "MK01".into(),
        channel: "SHZ".into(),
        location: "01".into(),
        timestamp_ms: 1_700_000_000_000,
        message: "calibrate now".into(),
        response: "calibration started".into(),
    }));
}

#[test]
fn custom_reset_roundtrip() {
    roundtrip(FramePayload::CustomReset(vec![1, 2, 3, 4]));
}

/// Pin the exact wire layout of a minimal alert frame so codec changes
/// that silently shift bytes are caught.
#[test]
fn alert_frame_golden_bytes() {
    let frame = Frame {
        header: FrameHeader {
            creator: "DC".into(),
            destination: "MKAR".into(),
            sequence: 0,
            series: 0,
        },
        payload: FramePayload::Alert(AlertPayload {
            message: "bye".into(),
        }),
        trailer: FrameTrailer::default(),
    };
    let bytes = frame.encode().unwrap();

    let mut expected = Vec::new();
    expected.extend_from_slice(&7i32.to_be_bytes()); // alert type code
    expected.extend_from_slice(&44i32.to_be_bytes()); // trailer offset: 36 header + 8 body
    expected.extend_from_slice(b"DC      ");
    expected.extend_from_slice(b"MKAR    ");
    expected.extend_from_slice(&0u64.to_be_bytes());
    expected.extend_from_slice(&0i32.to_be_bytes());
    expected.extend_from_slice(&3u32.to_be_bytes()); // message size
    expected.extend_from_slice(b"bye\0"); // padded to 4
    expected.extend_from_slice(&0i32.to_be_bytes()); // auth key id
    expected.extend_from_slice(&0i32.to_be_bytes()); // auth size
    expected.extend_from_slice(&0u64.to_be_bytes()); // comm verification

    assert_eq!(bytes, expected);
}

/// A frame decoded from bytes re-encodes to the identical bytes.
#[test]
fn decode_encode_is_identity_on_wire_bytes() {
    let frame = Frame {
        header: header(99),
        payload: FramePayload::Data(DataPayload {
            frame_time_length_ms: 10_000,
            nominal_time_ms: 1_700_000_000_000,
            subframes: vec![subframe()],
        }),
        trailer: trailer(),
    };
    let bytes = frame.encode().unwrap();
    let (decoded, _) = Frame::decode(&bytes).unwrap();
    assert_eq!(decoded.encode().unwrap(), bytes);
}
