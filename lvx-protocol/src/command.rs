use std::fmt::{self, Display};
use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;
use crate::frame::{self, CommandSet, FrameType};
use crate::status::HealthWord;

/// Command ids in the General set.
pub mod general {
    pub const BROADCAST: u8 = 0;
    pub const HANDSHAKE: u8 = 1;
    pub const QUERY: u8 = 2;
    pub const HEARTBEAT: u8 = 3;
    pub const SAMPLING: u8 = 4;
    pub const COORDINATE_SYSTEM: u8 = 5;
    pub const DISCONNECT: u8 = 6;
    pub const ABNORMAL_STATUS: u8 = 7;
    pub const IP_CONFIG: u8 = 8;
    pub const REBOOT: u8 = 10;
}

/// Command ids in the Lidar set.
pub mod lidar {
    pub const MODE: u8 = 0;
    pub const WRITE_EXTRINSICS: u8 = 1;
    pub const READ_EXTRINSICS: u8 = 2;
    pub const RAIN_FOG: u8 = 3;
    pub const FAN: u8 = 4;
    pub const GET_FAN: u8 = 5;
    pub const RETURN_MODE: u8 = 6;
    pub const IMU_PUSH: u8 = 8;
    pub const GET_IMU_PUSH: u8 = 9;
    pub const WRITE_UTC: u8 = 10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LidarMode {
    Normal = 1,
    PowerSave = 2,
    Standby = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoordinateSystem {
    Cartesian = 0,
    Spherical = 1,
}

impl Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateSystem::Cartesian => f.write_str("Cartesian"),
            CoordinateSystem::Spherical => f.write_str("Spherical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnMode {
    SingleFirst = 0,
    SingleStrongest = 1,
    Dual = 2,
}

impl Display for ReturnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnMode::SingleFirst => f.write_str("single first"),
            ReturnMode::SingleStrongest => f.write_str("single strongest"),
            ReturnMode::Dual => f.write_str("dual"),
        }
    }
}

/// The closed catalogue of host-to-sensor requests.
///
/// Lifecycle commands carry constant payloads; the parameterised ones build
/// their payloads at call time. `encode` yields the full frame, both
/// checksums included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Handshake {
        host: Ipv4Addr,
        data_port: u16,
        cmd_port: u16,
        imu_port: u16,
    },
    Query,
    Heartbeat,
    SetSampling(bool),
    SetCoordinateSystem(CoordinateSystem),
    Disconnect,
    SetStaticIp(Ipv4Addr),
    SetDynamicIp,
    Reboot,
    SetMode(LidarMode),
    WriteExtrinsics {
        roll_deg: f32,
        pitch_deg: f32,
        yaw_deg: f32,
        x_mm: i32,
        y_mm: i32,
        z_mm: i32,
    },
    ReadExtrinsics,
    SetRainFog(bool),
    SetFan(bool),
    GetFan,
    SetReturnMode(ReturnMode),
    SetImuPush(bool),
    GetImuPush,
    WriteUtc {
        /// Years since 2000.
        year: u8,
        month: u8,
        day: u8,
        hour: u8,
        /// Microseconds into the hour.
        microseconds: u32,
    },
}

impl Command {
    #[must_use]
    pub fn cmd_set(&self) -> CommandSet {
        match self {
            Command::Handshake { .. }
            | Command::Query
            | Command::Heartbeat
            | Command::SetSampling(_)
            | Command::SetCoordinateSystem(_)
            | Command::Disconnect
            | Command::SetStaticIp(_)
            | Command::SetDynamicIp
            | Command::Reboot => CommandSet::General,
            _ => CommandSet::Lidar,
        }
    }

    #[must_use]
    pub fn cmd_id(&self) -> u8 {
        match self {
            Command::Handshake { .. } => general::HANDSHAKE,
            Command::Query => general::QUERY,
            Command::Heartbeat => general::HEARTBEAT,
            Command::SetSampling(_) => general::SAMPLING,
            Command::SetCoordinateSystem(_) => general::COORDINATE_SYSTEM,
            Command::Disconnect => general::DISCONNECT,
            Command::SetStaticIp(_) | Command::SetDynamicIp => general::IP_CONFIG,
            Command::Reboot => general::REBOOT,
            Command::SetMode(_) => lidar::MODE,
            Command::WriteExtrinsics { .. } => lidar::WRITE_EXTRINSICS,
            Command::ReadExtrinsics => lidar::READ_EXTRINSICS,
            Command::SetRainFog(_) => lidar::RAIN_FOG,
            Command::SetFan(_) => lidar::FAN,
            Command::GetFan => lidar::GET_FAN,
            Command::SetReturnMode(_) => lidar::RETURN_MODE,
            Command::SetImuPush(_) => lidar::IMU_PUSH,
            Command::GetImuPush => lidar::GET_IMU_PUSH,
            Command::WriteUtc { .. } => lidar::WRITE_UTC,
        }
    }

    fn payload(&self) -> BytesMut {
        let mut payload = BytesMut::new();
        match *self {
            Command::Handshake {
                host,
                data_port,
                cmd_port,
                imu_port,
            } => {
                payload.put_slice(&host.octets());
                payload.put_u16_le(data_port);
                payload.put_u16_le(cmd_port);
                payload.put_u16_le(imu_port);
            }
            Command::Query
            | Command::Heartbeat
            | Command::Disconnect
            | Command::ReadExtrinsics
            | Command::GetFan
            | Command::GetImuPush => {}
            Command::SetSampling(on) => payload.put_u8(u8::from(on)),
            Command::SetCoordinateSystem(system) => payload.put_u8(system as u8),
            Command::SetStaticIp(ip) => {
                payload.put_u8(1);
                payload.put_slice(&ip.octets());
            }
            Command::SetDynamicIp => {
                payload.put_u8(0);
                payload.put_slice(&[0, 0, 0, 0]);
            }
            Command::Reboot => payload.put_u16_le(0),
            Command::SetMode(mode) => payload.put_u8(mode as u8),
            Command::WriteExtrinsics {
                roll_deg,
                pitch_deg,
                yaw_deg,
                x_mm,
                y_mm,
                z_mm,
            } => {
                payload.put_f32_le(roll_deg);
                payload.put_f32_le(pitch_deg);
                payload.put_f32_le(yaw_deg);
                payload.put_i32_le(x_mm);
                payload.put_i32_le(y_mm);
                payload.put_i32_le(z_mm);
            }
            Command::SetRainFog(on) => payload.put_u8(u8::from(on)),
            Command::SetFan(on) => payload.put_u8(u8::from(on)),
            Command::SetReturnMode(mode) => payload.put_u8(mode as u8),
            Command::SetImuPush(on) => payload.put_u8(u8::from(on)),
            Command::WriteUtc {
                year,
                month,
                day,
                hour,
                microseconds,
            } => {
                payload.put_u8(year);
                payload.put_u8(month);
                payload.put_u8(day);
                payload.put_u8(hour);
                payload.put_u32_le(microseconds);
            }
        }
        payload
    }

    /// Serializes the command into a complete frame.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        frame::build(
            FrameType::Command,
            self.cmd_set(),
            self.cmd_id(),
            0,
            &self.payload(),
        )
        .unwrap_or_else(|_| unreachable!("catalogue payloads always fit in a frame"))
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cmd_set(), self.cmd_id())
    }
}

fn ack_field(payload: &[u8], expected: usize) -> Result<&[u8], ProtocolError> {
    if payload.len() < expected {
        return Err(ProtocolError::Truncated {
            expected,
            actual: payload.len(),
        });
    }
    Ok(payload)
}

/// Heartbeat ack: return code, work state, feature byte, health word copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatAck {
    pub ret_code: u8,
    pub work_state: u8,
    pub feature: u8,
    pub status: HealthWord,
}

impl HeartbeatAck {
    /// # Errors
    ///
    /// Errors if the payload is shorter than the fixed ack layout.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut payload = ack_field(payload, 7)?;
        Ok(Self {
            ret_code: payload.get_u8(),
            work_state: payload.get_u8(),
            feature: payload.get_u8(),
            status: HealthWord::from_le(payload.get_u32_le()),
        })
    }
}

/// Query ack carrying the four firmware version bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryAck {
    pub ret_code: u8,
    pub version: [u8; 4],
}

impl QueryAck {
    /// # Errors
    ///
    /// Errors if the payload is shorter than the fixed ack layout.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut payload = ack_field(payload, 5)?;
        let ret_code = payload.get_u8();
        let mut version = [0_u8; 4];
        payload.copy_to_slice(&mut version);
        Ok(Self { ret_code, version })
    }

    /// Firmware as the conventional `AA.BB.CCDD` string.
    #[must_use]
    pub fn firmware_string(&self) -> String {
        format!(
            "{:02}.{:02}.{:02}{:02}",
            self.version[0], self.version[1], self.version[2], self.version[3]
        )
    }
}

/// Read-extrinsics ack: rotations in degrees, translation in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrinsicsAck {
    pub ret_code: u8,
    pub roll_deg: f32,
    pub pitch_deg: f32,
    pub yaw_deg: f32,
    pub x_mm: i32,
    pub y_mm: i32,
    pub z_mm: i32,
}

impl ExtrinsicsAck {
    /// # Errors
    ///
    /// Errors if the payload is shorter than the fixed ack layout.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut payload = ack_field(payload, 25)?;
        Ok(Self {
            ret_code: payload.get_u8(),
            roll_deg: payload.get_f32_le(),
            pitch_deg: payload.get_f32_le(),
            yaw_deg: payload.get_f32_le(),
            x_mm: payload.get_i32_le(),
            y_mm: payload.get_i32_le(),
            z_mm: payload.get_i32_le(),
        })
    }
}

/// Ack for the get-fan / get-IMU-push queries: one state byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateAck {
    pub ret_code: u8,
    pub state: u8,
}

impl StateAck {
    /// # Errors
    ///
    /// Errors if the payload is shorter than the fixed ack layout.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut payload = ack_field(payload, 2)?;
        Ok(Self {
            ret_code: payload.get_u8(),
            state: payload.get_u8(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(text: &str) -> Vec<u8> {
        (0..text.len())
            .step_by(2)
            .map(|index| u8::from_str_radix(&text[index..index + 2], 16).expect("valid hex"))
            .collect()
    }

    // Byte-for-byte fixtures captured from a real sensor session.
    #[test]
    fn fixed_commands_match_reference_frames() {
        let cases: [(Command, &str); 16] = [
            (Command::Query, "AA010F0000000004D70002AE8A8A7B"),
            (Command::Heartbeat, "AA010F0000000004D7000338BA8D0C"),
            (Command::Disconnect, "AA010F0000000004D70006B74EE77C"),
            (Command::ReadExtrinsics, "AA010F0000000004D70102EFBB9162"),
            (Command::GetFan, "AA010F0000000004D701054C2EF5FC"),
            (Command::GetImuPush, "AA010F0000000004D70109676243F5"),
            (Command::SetRainFog(true), "AA011000000000B809010301D271D049"),
            (Command::SetRainFog(false), "AA011000000000B8090103004441D73E"),
            (
                Command::SetMode(LidarMode::Normal),
                "AA011000000000B8090100011122FD62",
            ),
            (
                Command::SetMode(LidarMode::PowerSave),
                "AA011000000000B809010002AB73F4FB",
            ),
            (
                Command::SetMode(LidarMode::Standby),
                "AA011000000000B8090100033D43F38C",
            ),
            (Command::SetSampling(false), "AA011000000000B809000400B4BD5470"),
            (Command::SetSampling(true), "AA011000000000B809000401228D5307"),
            (
                Command::SetCoordinateSystem(CoordinateSystem::Cartesian),
                "AA011000000000B809000500F58C4F69",
            ),
            (
                Command::SetCoordinateSystem(CoordinateSystem::Spherical),
                "AA011000000000B80900050163BC481E",
            ),
            (Command::Reboot, "AA011100000000FC02000A000004477736"),
        ];
        for (command, reference) in cases {
            assert_eq!(command.encode(), hex(reference), "frame for {command}");
        }
    }

    #[test]
    fn fan_return_mode_and_imu_commands_match_reference_frames() {
        let cases: [(Command, &str); 7] = [
            (Command::SetFan(true), "AA011000000000B80901040115E79106"),
            (Command::SetFan(false), "AA011000000000B80901040083D79671"),
            (
                Command::SetReturnMode(ReturnMode::SingleFirst),
                "AA011000000000B80901060001B5A043",
            ),
            (
                Command::SetReturnMode(ReturnMode::SingleStrongest),
                "AA011000000000B8090106019785A734",
            ),
            (
                Command::SetReturnMode(ReturnMode::Dual),
                "AA011000000000B8090106022DD4AEAD",
            ),
            (Command::SetImuPush(true), "AA011000000000B80901080119A824AA"),
            (Command::SetImuPush(false), "AA011000000000B8090108008F9823DD"),
        ];
        for (command, reference) in cases {
            assert_eq!(command.encode(), hex(reference), "frame for {command}");
        }
    }

    #[test]
    fn dynamic_ip_command_matches_reference_frame() {
        assert_eq!(
            Command::SetDynamicIp.encode(),
            hex("AA011400000000A8240008000000000068F8DD50")
        );
    }

    #[test]
    fn zero_extrinsics_command_matches_reference_frame() {
        let command = Command::WriteExtrinsics {
            roll_deg: 0.0,
            pitch_deg: 0.0,
            yaw_deg: 0.0,
            x_mm: 0,
            y_mm: 0,
            z_mm: 0,
        };
        assert_eq!(
            command.encode(),
            hex("AA012700000000B5ED01010000000000000000000000000000000000000000000000004CDEA4E7")
        );
    }

    #[test]
    fn utc_command_matches_reference_frame() {
        // Sept 10, 2020 at 17:15 UTC
        let command = Command::WriteUtc {
            year: 20,
            month: 9,
            day: 10,
            hour: 17,
            microseconds: 900_000_000,
        };
        assert_eq!(
            command.encode(),
            hex("AA0117000000006439010A14090A1100E9A435D0337994")
        );
    }

    #[test]
    fn handshake_payload_encodes_host_and_ports() {
        let command = Command::Handshake {
            host: Ipv4Addr::new(192, 168, 1, 50),
            data_port: 60001,
            cmd_port: 60002,
            imu_port: 60003,
        };
        let bytes = command.encode();
        assert_eq!(bytes.len(), 25);
        assert_eq!(&bytes[..2], &[0xAA, 0x01]);
        assert_eq!(&bytes[9..11], &[0x00, general::HANDSHAKE]);
        assert_eq!(&bytes[11..15], &[192, 168, 1, 50]);
        assert_eq!(&bytes[15..17], &60001_u16.to_le_bytes());
        assert_eq!(&bytes[17..19], &60002_u16.to_le_bytes());
        assert_eq!(&bytes[19..21], &60003_u16.to_le_bytes());
    }

    #[test]
    fn heartbeat_ack_parses_work_state_and_status() {
        let mut payload = vec![0_u8, 1, 0];
        payload.extend_from_slice(&0_u32.to_le_bytes());
        let ack = HeartbeatAck::parse(&payload).expect("well-formed ack");
        assert_eq!(ack.ret_code, 0);
        assert_eq!(ack.work_state, 1);
    }

    #[test]
    fn query_ack_formats_firmware_string() {
        let ack = QueryAck::parse(&[0, 3, 3, 0, 6]).expect("well-formed ack");
        assert_eq!(ack.firmware_string(), "03.03.0006");
    }
}
