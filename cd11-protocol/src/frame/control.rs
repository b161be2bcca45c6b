//! Bodies of the non-data frame types.

use crate::error::{Cd11Error, Result};
use crate::frame::FRAMESET_LEN;
use crate::gap::GapRange;
use crate::time;
use crate::wire::{self, Reader};

/// Body shared by connection request and connection response frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionExchange {
    pub major_version: u16,
    pub minor_version: u16,
    /// Station name, at most 8 bytes.
    pub station: String,
    /// Station type, e.g. "IDC", at most 4 bytes.
    pub station_type: String,
    /// Service type, e.g. "TCP", at most 4 bytes.
    pub service_type: String,
    pub ip: u32,
    pub port: u16,
    pub secondary_ip: u32,
    pub secondary_port: u16,
}

pub(super) fn decode_connection(body: &[u8]) -> Result<ConnectionExchange> {
    let mut r = Reader::new(body);
    Ok(ConnectionExchange {
        major_version: r.u16()?,
        minor_version: r.u16()?,
        station: r.fixed_str(8)?,
        station_type: r.fixed_str(4)?,
        service_type: r.fixed_str(4)?,
        ip: r.u32()?,
        port: r.u16()?,
        secondary_ip: r.u32()?,
        secondary_port: r.u16()?,
    })
}

pub(super) fn encode_connection(p: &ConnectionExchange) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(32);
    buf.extend_from_slice(&p.major_version.to_be_bytes());
    buf.extend_from_slice(&p.minor_version.to_be_bytes());
    wire::put_fixed_str(&mut buf, "station", &p.station, 8)?;
    wire::put_fixed_str(&mut buf, "station type", &p.station_type, 4)?;
    wire::put_fixed_str(&mut buf, "service type", &p.service_type, 4)?;
    buf.extend_from_slice(&p.ip.to_be_bytes());
    buf.extend_from_slice(&p.port.to_be_bytes());
    buf.extend_from_slice(&p.secondary_ip.to_be_bytes());
    buf.extend_from_slice(&p.secondary_port.to_be_bytes());
    Ok(buf)
}

/// Body shared by option request and option response frames. A single
/// option per frame; the only type in live use is 1 (connection
/// establishment, value = station name).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionExchange {
    pub option_type: u32,
    /// Unpadded option value bytes.
    pub option_value: Vec<u8>,
}

pub(super) fn decode_option(body: &[u8]) -> Result<OptionExchange> {
    let mut r = Reader::new(body);
    let count = r.u32()?;
    if count != 1 {
        return Err(Cd11Error::InvalidField {
            field: "option count",
            reason: format!("expected 1, got {count}"),
        });
    }
    let option_type = r.u32()?;
    let size = r.u32()?;
    let option_value = r.padded_bytes(size as usize)?;
    Ok(OptionExchange {
        option_type,
        option_value,
    })
}

pub(super) fn encode_option(p: &OptionExchange) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(12 + wire::padded_len(p.option_value.len()));
    buf.extend_from_slice(&1u32.to_be_bytes());
    buf.extend_from_slice(&p.option_type.to_be_bytes());
    buf.extend_from_slice(&(p.option_value.len() as u32).to_be_bytes());
    wire::put_padded_bytes(&mut buf, &p.option_value);
    Ok(buf)
}

/// Acknack body: the sender's view of one frame-set, watermarks plus the
/// sequence-number holes it still wants retransmitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcknackPayload {
    /// Frame-set being acknowledged, at most 20 bytes, e.g. "MKAR:0".
    pub frameset: String,
    pub lowest: u64,
    pub highest: u64,
    pub gaps: Vec<GapRange>,
}

pub(super) fn decode_acknack(body: &[u8]) -> Result<AcknackPayload> {
    let mut r = Reader::new(body);
    let frameset = r.fixed_str(FRAMESET_LEN)?;
    let lowest = r.u64()?;
    let highest = r.u64()?;
    let gap_count = r.u32()?;
    let mut gaps = Vec::with_capacity(gap_count as usize);
    for _ in 0..gap_count {
        let start = r.u64()?;
        let end = r.u64()?;
        gaps.push(GapRange { start, end });
    }
    Ok(AcknackPayload {
        frameset,
        lowest,
        highest,
        gaps,
    })
}

pub(super) fn encode_acknack(p: &AcknackPayload) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(FRAMESET_LEN + 20 + p.gaps.len() * 16);
    wire::put_fixed_str(&mut buf, "frameset", &p.frameset, FRAMESET_LEN)?;
    buf.extend_from_slice(&p.lowest.to_be_bytes());
    buf.extend_from_slice(&p.highest.to_be_bytes());
    buf.extend_from_slice(&(p.gaps.len() as u32).to_be_bytes());
    for gap in &p.gaps {
        buf.extend_from_slice(&gap.start.to_be_bytes());
        buf.extend_from_slice(&gap.end.to_be_bytes());
    }
    Ok(buf)
}

/// Alert body: free text announcing the sender is about to close.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertPayload {
    pub message: String,
}

pub(super) fn decode_alert(body: &[u8]) -> Result<AlertPayload> {
    let mut r = Reader::new(body);
    let size = r.u32()?;
    let bytes = r.padded_bytes(size as usize)?;
    let message = String::from_utf8(bytes).map_err(|e| Cd11Error::InvalidField {
        field: "alert message",
        reason: e.to_string(),
    })?;
    Ok(AlertPayload { message })
}

pub(super) fn encode_alert(p: &AlertPayload) -> Result<Vec<u8>> {
    let bytes = p.message.as_bytes();
    let mut buf = Vec::with_capacity(4 + wire::padded_len(bytes.len()));
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    wire::put_padded_bytes(&mut buf, bytes);
    Ok(buf)
}

/// Command request body: a command directed at one channel of a station.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandRequestPayload {
    pub station: String,
    pub site: String,
    pub channel: String,
    pub location: String,
    /// Epoch milliseconds; a 20-byte julian timestamp on the wire.
    pub timestamp_ms: i64,
    pub message: String,
}

/// Command response body: the original command plus the station's reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandResponsePayload {
    pub station: String,
    pub site: String,
    pub channel: String,
    pub location: String,
    pub timestamp_ms: i64,
    pub message: String,
    pub response: String,
}

struct CommandCommon {
    station: String,
    site: String,
    channel: String,
    location: String,
    timestamp_ms: i64,
    message: String,
}

fn decode_command_common(r: &mut Reader<'_>) -> Result<CommandCommon> {
    let station = r.fixed_str(8)?;
    let site = r.fixed_str(5)?;
    let channel = r.fixed_str(3)?;
    let location = r.fixed_str(2)?;
    r.take(2)?; // alignment
    let timestamp_ms = time::parse_julian(&r.fixed_str(time::TIMESTAMP_LEN)?)?;
    let message = decode_sized_string(r, "command message")?;
    Ok(CommandCommon {
        station,
        site,
        channel,
        location,
        timestamp_ms,
        message,
    })
}

fn encode_command_common(
    buf: &mut Vec<u8>,
    station: &str,
    site: &str,
    channel: &str,
    location: &str,
    timestamp_ms: i64,
    message: &str,
) -> Result<()> {
    wire::put_fixed_str(buf, "station", station, 8)?;
    wire::put_fixed_str(buf, "site", site, 5)?;
    wire::put_fixed_str(buf, "channel", channel, 3)?;
    wire::put_fixed_str(buf, "location", location, 2)?;
    buf.extend_from_slice(&[0, 0]); // alignment
    buf.extend_from_slice(time::format_julian(timestamp_ms).as_bytes());
    encode_sized_string(buf, message);
    Ok(())
}

fn decode_sized_string(r: &mut Reader<'_>, field: &'static str) -> Result<String> {
    let size = r.u32()?;
    let bytes = r.padded_bytes(size as usize)?;
    String::from_utf8(bytes).map_err(|e| Cd11Error::InvalidField {
        field,
        reason: e.to_string(),
    })
}

fn encode_sized_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
    wire::put_padded_bytes(buf, s.as_bytes());
}

pub(super) fn decode_command_request(body: &[u8]) -> Result<CommandRequestPayload> {
    let mut r = Reader::new(body);
    let c = decode_command_common(&mut r)?;
    Ok(CommandRequestPayload {
        station: c.station,
        site: c.site,
        channel: c.channel,
        location: c.location,
        timestamp_ms: c.timestamp_ms,
        message: c.message,
    })
}

pub(super) fn encode_command_request(p: &CommandRequestPayload) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_command_common(
        &mut buf,
        &p.station,
        &p.site,
        &p.channel,
        &p.location,
        p.timestamp_ms,
        &p.message,
    )?;
    Ok(buf)
}

pub(super) fn decode_command_response(body: &[u8]) -> Result<CommandResponsePayload> {
    let mut r = Reader::new(body);
    let c = decode_command_common(&mut r)?;
    let response = decode_sized_string(&mut r, "command response")?;
    Ok(CommandResponsePayload {
        station: c.station,
        site: c.site,
        channel: c.channel,
        location: c.location,
        timestamp_ms: c.timestamp_ms,
        message: c.message,
        response,
    })
}

pub(super) fn encode_command_response(p: &CommandResponsePayload) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_command_common(
        &mut buf,
        &p.station,
        &p.site,
        &p.channel,
        &p.location,
        p.timestamp_ms,
        &p.message,
    )?;
    encode_sized_string(&mut buf, &p.response);
    Ok(buf)
}
