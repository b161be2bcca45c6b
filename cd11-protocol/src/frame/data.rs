//! Data frame body: the channel subframe header followed by one
//! subframe per channel.
//!
//! The subframe header carries a "channel string", 10 bytes per channel
//! (site 5, channel 3, location 2), padded to a 4-byte boundary. It is
//! derived from the subframes at encode time and validated against the
//! declared channel count at decode time.

use crate::error::{Cd11Error, Result};
use crate::time::{self, TIMESTAMP_LEN};
use crate::wire::{self, Reader};

/// Fixed portion of a channel subframe, before the three variable fields.
const SUBFRAME_FIXED_LEN: usize = 9 * 4 + 24 + TIMESTAMP_LEN;

/// Channel string entry width: site (5) + channel (3) + location (2).
pub const CHANNEL_STRING_ENTRY_LEN: usize = 10;

/// Transformation byte of the channel description.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompressionFormat {
    None,
    CanadianBeforeSignature,
    CanadianAfterSignature,
    SteimBeforeSignature,
    SteimAfterSignature,
}

impl CompressionFormat {
    pub fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => Self::None,
            1 => Self::CanadianBeforeSignature,
            2 => Self::CanadianAfterSignature,
            3 => Self::SteimBeforeSignature,
            4 => Self::SteimAfterSignature,
            other => return Err(Cd11Error::InvalidCompressionFormat(other)),
        })
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::CanadianBeforeSignature => 1,
            Self::CanadianAfterSignature => 2,
            Self::SteimBeforeSignature => 3,
            Self::SteimAfterSignature => 4,
        }
    }
}

/// Sensor type byte of the channel description.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SensorType {
    Seismic,
    Hydroacoustic,
    Infrasonic,
    Weather,
    Other,
}

impl SensorType {
    pub fn from_byte(b: u8) -> Result<Self> {
        Ok(match b {
            0 => Self::Seismic,
            1 => Self::Hydroacoustic,
            2 => Self::Infrasonic,
            3 => Self::Weather,
            4 => Self::Other,
            other => return Err(Cd11Error::InvalidSensorType(other)),
        })
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Seismic => 0,
            Self::Hydroacoustic => 1,
            Self::Infrasonic => 2,
            Self::Weather => 3,
            Self::Other => 4,
        }
    }
}

/// One channel's worth of samples inside a data frame.
///
/// The channel length and authentication offset fields are derived at
/// encode time; sample bytes are carried opaque, in whatever format and
/// compression the description bytes declare.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelSubframe {
    pub authentication_on: bool,
    pub compression: CompressionFormat,
    pub sensor_type: SensorType,
    /// Option flag of the channel description: set when the samples are
    /// calibration data.
    pub is_calibration: bool,
    /// Site name, at most 5 bytes.
    pub site: String,
    /// Channel name, at most 3 bytes.
    pub channel: String,
    /// Location code, at most 2 bytes.
    pub location: String,
    /// CSS 3.0 data type of the uncompressed samples, e.g. "s4".
    pub data_format: String,
    /// Meaningful only when `is_calibration` is set.
    pub calibration_factor: f32,
    pub calibration_period: f32,
    /// UTC time of the first sample, epoch milliseconds.
    pub timestamp_ms: i64,
    /// Time spanned by this subframe, milliseconds.
    pub time_length_ms: u32,
    pub sample_count: u32,
    /// Unpadded channel status bytes.
    pub channel_status: Vec<u8>,
    /// Unpadded sample bytes.
    pub data: Vec<u8>,
    /// Digitizer-assigned count; zero when unsupported.
    pub subframe_count: u32,
    pub auth_key_id: i32,
    /// Unpadded authentication value bytes.
    pub auth_value: Vec<u8>,
}

impl ChannelSubframe {
    /// 10-byte site/channel/location key used in the subframe header's
    /// channel string and for channel-name resolution.
    pub fn channel_string(&self) -> Result<String> {
        let mut buf = Vec::with_capacity(CHANNEL_STRING_ENTRY_LEN);
        wire::put_fixed_str(&mut buf, "site", &self.site, 5)?;
        wire::put_fixed_str(&mut buf, "channel", &self.channel, 3)?;
        wire::put_fixed_str(&mut buf, "location", &self.location, 2)?;
        // input was valid UTF-8 and only spaces were appended
        Ok(String::from_utf8(buf).unwrap_or_default())
    }

    fn wire_len(&self) -> usize {
        SUBFRAME_FIXED_LEN
            + wire::padded_len(self.channel_status.len())
            + wire::padded_len(self.data.len())
            + wire::padded_len(self.auth_value.len())
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let _channel_length = r.i32()?;
        let _auth_offset = r.i32()?;
        let authentication_on = r.u8()? == 1;
        let compression = CompressionFormat::from_byte(r.u8()?)?;
        let sensor_type = SensorType::from_byte(r.u8()?)?;
        let is_calibration = r.u8()? == 1;
        let site = r.fixed_str(5)?;
        let channel = r.fixed_str(3)?;
        let location = r.fixed_str(2)?;
        let data_format = r.fixed_str(2)?;
        let calibration_factor = r.f32()?;
        let calibration_period = r.f32()?;
        let timestamp_ms = time::parse_julian(&r.fixed_str(TIMESTAMP_LEN)?)?;
        let time_length_ms = r.u32()?;
        let sample_count = r.u32()?;
        let status_size = r.u32()?;
        let channel_status = r.padded_bytes(status_size as usize)?;
        let data_size = r.u32()?;
        let data = r.padded_bytes(data_size as usize)?;
        let subframe_count = r.u32()?;
        let auth_key_id = r.i32()?;
        let auth_size = r.u32()?;
        let auth_value = r.padded_bytes(auth_size as usize)?;

        Ok(ChannelSubframe {
            authentication_on,
            compression,
            sensor_type,
            is_calibration,
            site,
            channel,
            location,
            data_format,
            calibration_factor,
            calibration_period,
            timestamp_ms,
            time_length_ms,
            sample_count,
            channel_status,
            data,
            subframe_count,
            auth_key_id,
            auth_value,
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        // channel length does not count its own 4 bytes
        let channel_length = (self.wire_len() - 4) as i32;
        // offset from the subframe start to the auth key identifier
        let auth_offset = (SUBFRAME_FIXED_LEN - 8
            + wire::padded_len(self.channel_status.len())
            + wire::padded_len(self.data.len())) as i32;

        buf.extend_from_slice(&channel_length.to_be_bytes());
        buf.extend_from_slice(&auth_offset.to_be_bytes());
        buf.push(u8::from(self.authentication_on));
        buf.push(self.compression.to_byte());
        buf.push(self.sensor_type.to_byte());
        buf.push(u8::from(self.is_calibration));
        wire::put_fixed_str(buf, "site", &self.site, 5)?;
        wire::put_fixed_str(buf, "channel", &self.channel, 3)?;
        wire::put_fixed_str(buf, "location", &self.location, 2)?;
        wire::put_fixed_str(buf, "data format", &self.data_format, 2)?;
        buf.extend_from_slice(&self.calibration_factor.to_be_bytes());
        buf.extend_from_slice(&self.calibration_period.to_be_bytes());
        buf.extend_from_slice(time::format_julian(self.timestamp_ms).as_bytes());
        buf.extend_from_slice(&self.time_length_ms.to_be_bytes());
        buf.extend_from_slice(&self.sample_count.to_be_bytes());
        buf.extend_from_slice(&(self.channel_status.len() as u32).to_be_bytes());
        wire::put_padded_bytes(buf, &self.channel_status);
        buf.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        wire::put_padded_bytes(buf, &self.data);
        buf.extend_from_slice(&self.subframe_count.to_be_bytes());
        buf.extend_from_slice(&self.auth_key_id.to_be_bytes());
        buf.extend_from_slice(&(self.auth_value.len() as u32).to_be_bytes());
        wire::put_padded_bytes(buf, &self.auth_value);
        Ok(())
    }
}

/// Data frame body.
#[derive(Clone, Debug, PartialEq)]
pub struct DataPayload {
    /// Time spanned by the whole frame, milliseconds.
    pub frame_time_length_ms: u32,
    /// Nominal UTC start time of the frame, epoch milliseconds.
    pub nominal_time_ms: i64,
    pub subframes: Vec<ChannelSubframe>,
}

pub(super) fn decode_data(body: &[u8]) -> Result<DataPayload> {
    let mut r = Reader::new(body);
    let channel_count = r.u32()?;
    let frame_time_length_ms = r.u32()?;
    let nominal_time_ms = time::parse_julian(&r.fixed_str(TIMESTAMP_LEN)?)?;
    let channel_string_len = r.u32()? as usize;
    if channel_string_len != channel_count as usize * CHANNEL_STRING_ENTRY_LEN {
        return Err(Cd11Error::InvalidField {
            field: "channel string length",
            reason: format!("{channel_string_len} for {channel_count} channels"),
        });
    }
    r.padded_bytes(channel_string_len)?;

    let mut subframes = Vec::with_capacity(channel_count as usize);
    for _ in 0..channel_count {
        subframes.push(ChannelSubframe::decode(&mut r)?);
    }
    Ok(DataPayload {
        frame_time_length_ms,
        nominal_time_ms,
        subframes,
    })
}

pub(super) fn encode_data(p: &DataPayload) -> Result<Vec<u8>> {
    let channel_count = p.subframes.len() as u32;
    let channel_string_len = p.subframes.len() * CHANNEL_STRING_ENTRY_LEN;

    let mut buf =
        Vec::with_capacity(12 + TIMESTAMP_LEN + wire::padded_len(channel_string_len) + 128);
    buf.extend_from_slice(&channel_count.to_be_bytes());
    buf.extend_from_slice(&p.frame_time_length_ms.to_be_bytes());
    buf.extend_from_slice(time::format_julian(p.nominal_time_ms).as_bytes());
    buf.extend_from_slice(&(channel_string_len as u32).to_be_bytes());
    let mut channel_string = Vec::with_capacity(channel_string_len);
    for subframe in &p.subframes {
        channel_string.extend_from_slice(subframe.channel_string()?.as_bytes());
    }
    wire::put_padded_bytes(&mut buf, &channel_string);

    for subframe in &p.subframes {
        subframe.encode(&mut buf)?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_subframe() -> ChannelSubframe {
        ChannelSubframe {
            authentication_on: false,
            compression: CompressionFormat::None,
            sensor_type: SensorType::Seismic,
            is_calibration: false,
            site: "MK01".into(),
            channel: "SHZ".into(),
            location: "01".into(),
            data_format: "s4".into(),
            calibration_factor: 0.0,
            calibration_period: 0.0,
            timestamp_ms: 1_583_020_800_000,
            time_length_ms: 10_000,
            sample_count: 400,
            channel_status: vec![0x01, 0x02],
            data: (0u8..100).collect(),
            subframe_count: 0,
            auth_key_id: 0,
            auth_value: Vec::new(),
        }
    }

    #[test]
    fn single_channel_roundtrip() {
        let p = DataPayload {
            frame_time_length_ms: 10_000,
            nominal_time_ms: 1_583_020_800_000,
            subframes: vec![sample_subframe()],
        };
        let bytes = encode_data(&p).unwrap();
        assert_eq!(decode_data(&bytes).unwrap(), p);
    }

    #[test]
    fn multi_channel_roundtrip() {
        let mut second = sample_subframe();
        second.channel = "SHN".into();
        second.sensor_type = SensorType::Infrasonic;
        second.compression = CompressionFormat::CanadianAfterSignature;
        second.data = vec![0xFF; 17]; // forces padding
        let p = DataPayload {
            frame_time_length_ms: 10_000,
            nominal_time_ms: 1_583_020_800_000,
            subframes: vec![sample_subframe(), second],
        };
        let bytes = encode_data(&p).unwrap();
        assert_eq!(decode_data(&bytes).unwrap(), p);
    }

    #[test]
    fn channel_string_is_ten_bytes_per_channel() {
        let s = sample_subframe().channel_string().unwrap();
        assert_eq!(s.len(), CHANNEL_STRING_ENTRY_LEN);
        assert_eq!(s, "MK01 SHZ01");
    }

    #[test]
    fn channel_string_length_mismatch_rejected() {
        let p = DataPayload {
            frame_time_length_ms: 0,
            nominal_time_ms: 0,
            subframes: vec![sample_subframe()],
        };
        let mut bytes = encode_data(&p).unwrap();
        // corrupt the channel string length field
        bytes[4 + 4 + TIMESTAMP_LEN..4 + 4 + TIMESTAMP_LEN + 4]
            .copy_from_slice(&99u32.to_be_bytes());
        assert!(matches!(
            decode_data(&bytes).unwrap_err(),
            Cd11Error::InvalidField { field: "channel string length", .. }
        ));
    }

    #[test]
    fn truncated_subframe_rejected() {
        let p = DataPayload {
            frame_time_length_ms: 0,
            nominal_time_ms: 0,
            subframes: vec![sample_subframe()],
        };
        let bytes = encode_data(&p).unwrap();
        assert!(matches!(
            decode_data(&bytes[..bytes.len() - 8]).unwrap_err(),
            Cd11Error::FrameTooShort { .. }
        ));
    }

    #[test]
    fn invalid_description_bytes_rejected() {
        assert!(matches!(
            CompressionFormat::from_byte(9).unwrap_err(),
            Cd11Error::InvalidCompressionFormat(9)
        ));
        assert!(matches!(
            SensorType::from_byte(200).unwrap_err(),
            Cd11Error::InvalidSensorType(200)
        ));
    }

    #[test]
    fn calibration_fields_roundtrip() {
        let mut sf = sample_subframe();
        sf.is_calibration = true;
        sf.calibration_factor = 1.25;
        sf.calibration_period = 8.0;
        let p = DataPayload {
            frame_time_length_ms: 10_000,
            nominal_time_ms: 0,
            subframes: vec![sf],
        };
        let bytes = encode_data(&p).unwrap();
        let decoded = decode_data(&bytes).unwrap();
        assert_eq!(decoded.subframes[0].calibration_factor, 1.25);
        assert_eq!(decoded.subframes[0].calibration_period, 8.0);
    }
}
