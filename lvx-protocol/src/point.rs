use std::fmt::{self, Display};

use bytes::Buf;

use crate::error::ProtocolError;
use crate::status::HealthWord;

/// Header version every point/IMU packet must carry.
pub const PACKET_VERSION: u8 = 5;

/// Point layout identifier at byte 9 of a data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    /// Mid-series Cartesian, 100 × 13 B.
    CartesianMid = 0,
    /// Mid-series spherical, 100 × 9 B.
    SphericalMid = 1,
    /// Horizon/Tele-15 Cartesian single return, 96 × 14 B (tagged).
    CartesianSingle = 2,
    /// Horizon/Tele-15 spherical single return, 96 × 10 B (tagged).
    SphericalSingle = 3,
    /// Horizon/Tele-15 Cartesian dual return, 48 × 28 B.
    CartesianDual = 4,
    /// Horizon/Tele-15 spherical dual return with shared angles, 48 × 16 B.
    SphericalDual = 5,
    /// Inertial sample, 1 × 24 B.
    Imu = 6,
}

impl DataType {
    /// Size of one wire record in bytes.
    #[must_use]
    pub fn record_len(self) -> usize {
        match self {
            DataType::CartesianMid => 13,
            DataType::SphericalMid => 9,
            DataType::CartesianSingle => 14,
            DataType::SphericalSingle => 10,
            DataType::CartesianDual => 28,
            DataType::SphericalDual => 16,
            DataType::Imu => 24,
        }
    }

    /// Number of records packed in one packet.
    #[must_use]
    pub fn records_per_packet(self) -> usize {
        match self {
            DataType::CartesianMid | DataType::SphericalMid => 100,
            DataType::CartesianSingle | DataType::SphericalSingle => 96,
            DataType::CartesianDual | DataType::SphericalDual => 48,
            DataType::Imu => 1,
        }
    }

    #[must_use]
    pub fn is_cartesian(self) -> bool {
        matches!(
            self,
            DataType::CartesianMid | DataType::CartesianSingle | DataType::CartesianDual
        )
    }

    #[must_use]
    pub fn is_dual(self) -> bool {
        matches!(self, DataType::CartesianDual | DataType::SphericalDual)
    }

    /// Layouts that carry the confidence/return-type tag byte.
    #[must_use]
    pub fn has_tag(self) -> bool {
        matches!(
            self,
            DataType::CartesianSingle
                | DataType::SphericalSingle
                | DataType::CartesianDual
                | DataType::SphericalDual
        )
    }
}

impl TryFrom<u8> for DataType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::CartesianMid),
            1 => Ok(Self::SphericalMid),
            2 => Ok(Self::CartesianSingle),
            3 => Ok(Self::SphericalSingle),
            4 => Ok(Self::CartesianDual),
            5 => Ok(Self::SphericalDual),
            6 => Ok(Self::Imu),
            unknown => Err(ProtocolError::BadDataType(unknown)),
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// Converts a raw packet timestamp to seconds with 6-decimal rounding.
///
/// Types 0, 1 and 4 carry nanoseconds since epoch; type 3 carries a UTC
/// split of (year, month, day, hour) plus microseconds into the hour, which
/// collapses to seconds into the day. Hour/day/month/year rollover inside a
/// capture is not handled.
///
/// # Errors
///
/// Errors on an unknown timestamp type.
pub fn decode_timestamp(timestamp_type: u8, bytes: [u8; 8]) -> Result<f64, ProtocolError> {
    match timestamp_type {
        0 | 1 | 4 => {
            let nanos = u64::from_le_bytes(bytes);
            Ok(round_micros(nanos as f64 / 1_000_000_000.0))
        }
        3 => {
            let hour = bytes[3];
            let micros = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
            Ok(round_micros(f64::from(micros) / 1_000_000.0) + f64::from(hour) * 3600.0)
        }
        unknown => Err(ProtocolError::BadTimestampType(unknown)),
    }
}

fn round_micros(seconds: f64) -> f64 {
    (seconds * 1_000_000.0).round() / 1_000_000.0
}

/**
 * Point/IMU packet header.
 *
 * 18 bytes: version, slot, lidar id, reserved, health word, timestamp type,
 * data type, 8-byte timestamp.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketHeader {
    pub slot: u8,
    pub lidar_id: u8,
    pub status: HealthWord,
    pub timestamp_type: u8,
    pub data_type: DataType,
    /// Decoded packet timestamp in seconds; applies to the first point.
    pub timestamp: f64,
}

impl PacketHeader {
    pub const LEN: usize = 18;

    /// Parses the packet header, returning it along with the point bytes.
    ///
    /// # Errors
    ///
    /// Errors if the packet is shorter than the header, the version is not
    /// 5, or the data/timestamp types are unknown.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), ProtocolError> {
        let Some((header, remainder)) = bytes.split_at_checked(Self::LEN) else {
            return Err(ProtocolError::Truncated {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        };

        let mut header = header;
        let version = header.get_u8();
        if version != PACKET_VERSION {
            return Err(ProtocolError::BadPacketVersion(version));
        }
        let slot = header.get_u8();
        let lidar_id = header.get_u8();
        let _reserved = header.get_u8();
        let status = HealthWord::from_le(header.get_u32_le());
        let timestamp_type = header.get_u8();
        let data_type = DataType::try_from(header.get_u8())?;
        let mut raw_timestamp = [0_u8; 8];
        header.copy_to_slice(&mut raw_timestamp);
        let timestamp = decode_timestamp(timestamp_type, raw_timestamp)?;

        Ok((
            Self {
                slot,
                lidar_id,
                status,
                timestamp_type,
                data_type,
                timestamp,
            },
            remainder,
        ))
    }
}

impl Display for PacketHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "slot:{} lidar:{} dt:{} t:{:.6}",
            self.slot, self.lidar_id, self.data_type, self.timestamp
        )
    }
}

/// One Cartesian return: millimetre integers plus intensity and, on tagged
/// layouts, the confidence byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartesianPoint {
    pub x_mm: i32,
    pub y_mm: i32,
    pub z_mm: i32,
    pub intensity: u8,
    pub tag: Option<u8>,
}

impl CartesianPoint {
    /// Reads one record off the front of `bytes`.
    ///
    /// # Errors
    ///
    /// Errors if fewer than the record's bytes remain.
    pub fn parse(bytes: &[u8], with_tag: bool) -> Result<(Self, &[u8]), ProtocolError> {
        let len = if with_tag { 14 } else { 13 };
        let Some((mut record, remainder)) = bytes.split_at_checked(len) else {
            return Err(ProtocolError::Truncated {
                expected: len,
                actual: bytes.len(),
            });
        };
        let x_mm = record.get_i32_le();
        let y_mm = record.get_i32_le();
        let z_mm = record.get_i32_le();
        let intensity = record.get_u8();
        let tag = with_tag.then(|| record.get_u8());
        Ok((
            Self {
                x_mm,
                y_mm,
                z_mm,
                intensity,
                tag,
            },
            remainder,
        ))
    }

    /// All coordinate fields zero marks a non-return.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.x_mm == 0 && self.y_mm == 0 && self.z_mm == 0
    }

    #[must_use]
    pub fn x_m(&self) -> f64 {
        f64::from(self.x_mm) / 1000.0
    }

    #[must_use]
    pub fn y_m(&self) -> f64 {
        f64::from(self.y_mm) / 1000.0
    }

    #[must_use]
    pub fn z_m(&self) -> f64 {
        f64::from(self.z_mm) / 1000.0
    }
}

/// One spherical return: millimetre distance, centi-degree angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SphericalPoint {
    pub depth_mm: u32,
    pub zenith_cdeg: u16,
    pub azimuth_cdeg: u16,
    pub intensity: u8,
    pub tag: Option<u8>,
}

impl SphericalPoint {
    /// Reads one record off the front of `bytes`.
    ///
    /// # Errors
    ///
    /// Errors if fewer than the record's bytes remain.
    pub fn parse(bytes: &[u8], with_tag: bool) -> Result<(Self, &[u8]), ProtocolError> {
        let len = if with_tag { 10 } else { 9 };
        let Some((mut record, remainder)) = bytes.split_at_checked(len) else {
            return Err(ProtocolError::Truncated {
                expected: len,
                actual: bytes.len(),
            });
        };
        let depth_mm = record.get_u32_le();
        let zenith_cdeg = record.get_u16_le();
        let azimuth_cdeg = record.get_u16_le();
        let intensity = record.get_u8();
        let tag = with_tag.then(|| record.get_u8());
        Ok((
            Self {
                depth_mm,
                zenith_cdeg,
                azimuth_cdeg,
                intensity,
                tag,
            },
            remainder,
        ))
    }

    /// Zero distance marks a non-return.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.depth_mm == 0
    }

    #[must_use]
    pub fn depth_m(&self) -> f64 {
        f64::from(self.depth_mm) / 1000.0
    }

    #[must_use]
    pub fn zenith_deg(&self) -> f64 {
        f64::from(self.zenith_cdeg) / 100.0
    }

    #[must_use]
    pub fn azimuth_deg(&self) -> f64 {
        f64::from(self.azimuth_cdeg) / 100.0
    }
}

/// Confidence/return-type bitfield on tagged layouts, MSB-first like the
/// health word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tag(pub u8);

impl Tag {
    #[must_use]
    pub fn spatial_confidence(self) -> u8 {
        (self.0 >> 6) & 0b11
    }

    #[must_use]
    pub fn intensity_confidence(self) -> u8 {
        (self.0 >> 4) & 0b11
    }

    #[must_use]
    pub fn return_type(self) -> u8 {
        (self.0 >> 2) & 0b11
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    fn header_bytes(timestamp_type: u8, data_type: u8, timestamp: [u8; 8]) -> Vec<u8> {
        let mut bytes = BytesMut::new();
        bytes.put_u8(PACKET_VERSION);
        bytes.put_u8(1); // slot
        bytes.put_u8(2); // lidar id
        bytes.put_u8(0); // reserved
        bytes.put_u32_le(0);
        bytes.put_u8(timestamp_type);
        bytes.put_u8(data_type);
        bytes.put_slice(&timestamp);
        bytes.to_vec()
    }

    #[test]
    fn parses_nanosecond_timestamps() {
        let nanos = 1_234_567_891_234_u64;
        let bytes = header_bytes(0, 0, nanos.to_le_bytes());
        let (header, rest) = PacketHeader::parse(&bytes).expect("well-formed header");
        assert!(rest.is_empty());
        assert_eq!(header.data_type, DataType::CartesianMid);
        assert!((header.timestamp - 1234.567891).abs() < 1e-9);
    }

    #[test]
    fn parses_utc_timestamps_as_seconds_into_day() {
        // 17:00 plus 900 seconds
        let mut raw = [0_u8; 8];
        raw[0] = 20; // year (ignored)
        raw[1] = 9;
        raw[2] = 10;
        raw[3] = 17;
        raw[4..8].copy_from_slice(&900_000_000_u32.to_le_bytes());
        let bytes = header_bytes(3, 6, raw);
        let (header, _) = PacketHeader::parse(&bytes).expect("well-formed header");
        assert!((header.timestamp - (17.0 * 3600.0 + 900.0)).abs() < 1e-9);
    }

    #[test]
    fn rejects_wrong_version() {
        let mut bytes = header_bytes(0, 0, [0; 8]);
        bytes[0] = 4;
        assert_eq!(
            PacketHeader::parse(&bytes),
            Err(ProtocolError::BadPacketVersion(4))
        );
    }

    #[test]
    fn rejects_unknown_data_type() {
        let bytes = header_bytes(0, 9, [0; 8]);
        assert_eq!(
            PacketHeader::parse(&bytes),
            Err(ProtocolError::BadDataType(9))
        );
    }

    #[test]
    fn layout_table_matches_packet_sizes() {
        for (data_type, len, count) in [
            (DataType::CartesianMid, 13, 100),
            (DataType::SphericalMid, 9, 100),
            (DataType::CartesianSingle, 14, 96),
            (DataType::SphericalSingle, 10, 96),
            (DataType::CartesianDual, 28, 48),
            (DataType::SphericalDual, 16, 48),
            (DataType::Imu, 24, 1),
        ] {
            assert_eq!(data_type.record_len(), len);
            assert_eq!(data_type.records_per_packet(), count);
        }
    }

    #[test]
    fn cartesian_cursor_advances_by_record_len() {
        let mut bytes = BytesMut::new();
        bytes.put_i32_le(1000);
        bytes.put_i32_le(2000);
        bytes.put_i32_le(3000);
        bytes.put_u8(42);
        bytes.put_u8(0xB4); // tag
        bytes.put_u8(0xFF); // trailing byte that must remain
        let (point, rest) = CartesianPoint::parse(&bytes, true).expect("enough bytes");
        assert_eq!(rest, &[0xFF]);
        assert_eq!(point.x_mm, 1000);
        assert_eq!(point.tag, Some(0xB4));
        assert!(!point.is_null());
        let tag = Tag(0xB4);
        assert_eq!(tag.spatial_confidence(), 2);
        assert_eq!(tag.intensity_confidence(), 3);
        assert_eq!(tag.return_type(), 1);
    }

    #[test]
    fn spherical_null_means_zero_distance() {
        let mut bytes = BytesMut::new();
        bytes.put_u32_le(0);
        bytes.put_u16_le(4500);
        bytes.put_u16_le(18000);
        bytes.put_u8(7);
        let (point, _) = SphericalPoint::parse(&bytes, false).expect("enough bytes");
        assert!(point.is_null());
        assert!((point.zenith_deg() - 45.0).abs() < f64::EPSILON);
    }
}
