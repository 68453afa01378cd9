use std::fmt::{self, Display};

use bytes::{Buf, BufMut, BytesMut};

use crate::checksum;
use crate::error::ProtocolError;

/// Every frame starts with this byte.
pub const SOF: u8 = 0xAA;

/// The only protocol version this crate speaks.
pub const PROTOCOL_VERSION: u8 = 1;

/// Upper bound on the total frame length, imposed by the sensor.
pub const MAX_FRAME_LEN: usize = 1400;

/// SOF, version, length, frame type, sequence and the CRC-16 over them.
pub(crate) const PREAMBLE_LEN: usize = 9;

/// The CRC-16 covers the preamble up to (but not including) itself.
const PREAMBLE_CRC_SPAN: usize = 7;

/// Preamble plus command set, command id and the trailing CRC-32.
pub const WRAPPER_LEN: usize = PREAMBLE_LEN + 2 + 4;

/// Largest payload that still fits in a frame.
pub const MAX_PAYLOAD_LEN: usize = MAX_FRAME_LEN - WRAPPER_LEN;

/// Direction/kind marker at byte 4 of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Host-to-sensor request.
    Command = 0,
    /// Sensor response to a prior request.
    Ack = 1,
    /// Unsolicited sensor message (broadcast, abnormal status).
    Message = 2,
}

impl TryFrom<u8> for FrameType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Command),
            1 => Ok(Self::Ack),
            2 => Ok(Self::Message),
            unknown => Err(ProtocolError::BadFrameType(unknown)),
        }
    }
}

impl Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            FrameType::Command => "CMD (request)",
            FrameType::Ack => "ACK (response)",
            FrameType::Message => "MSG (message)",
        };
        f.write_str(str)
    }
}

/// Namespace for the command id at byte 9 of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandSet {
    General = 0,
    Lidar = 1,
    Hub = 2,
}

impl TryFrom<u8> for CommandSet {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::General),
            1 => Ok(Self::Lidar),
            2 => Ok(Self::Hub),
            unknown => Err(ProtocolError::BadCommandSet(unknown)),
        }
    }
}

impl Display for CommandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            CommandSet::General => "General",
            CommandSet::Lidar => "Lidar",
            CommandSet::Hub => "Hub",
        };
        f.write_str(str)
    }
}

/// A parsed command/ack/message frame, borrowing its payload from the
/// datagram it was parsed from.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub frame_type: FrameType,
    /// Echoed by the sensor; the protocol carries no request multiplexing.
    pub seq: u16,
    pub cmd_set: CommandSet,
    pub cmd_id: u8,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Deserializes one frame from a datagram.
    ///
    /// The declared frame length must match the datagram length exactly; a
    /// UDP datagram carries exactly one frame.
    ///
    /// # Errors
    ///
    /// Errors if the structural invariants (SOF, version, length bound) or
    /// either checksum are violated. Callers treat every variant as
    /// "drop and count".
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ProtocolError> {
        let total = bytes.len();
        let Some((preamble, _)) = bytes.split_at_checked(PREAMBLE_LEN) else {
            return Err(ProtocolError::Truncated {
                expected: WRAPPER_LEN,
                actual: total,
            });
        };

        let mut head = preamble;
        let sof = head.get_u8();
        if sof != SOF {
            return Err(ProtocolError::BadSof(sof));
        }
        let version = head.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::BadVersion(version));
        }
        let length = usize::from(head.get_u16_le());
        if length < WRAPPER_LEN || length > MAX_FRAME_LEN {
            return Err(ProtocolError::BadLength(length));
        }
        if length != total {
            return Err(ProtocolError::Truncated {
                expected: length,
                actual: total,
            });
        }
        let frame_type_raw = head.get_u8();
        let seq = head.get_u16_le();
        let stored_crc16 = head.get_u16_le();

        let Some(crc16_span) = bytes.get(..PREAMBLE_CRC_SPAN) else {
            unreachable!("length was checked above");
        };
        let computed_crc16 = checksum::preamble_checksum(crc16_span);
        if stored_crc16 != computed_crc16 {
            return Err(ProtocolError::Crc16Mismatch {
                stored: stored_crc16,
                computed: computed_crc16,
            });
        }

        let (body, mut tail) = match bytes
            .split_at_checked(PREAMBLE_LEN)
            .and_then(|(_, rest)| rest.split_at_checked(total - PREAMBLE_LEN - 4))
        {
            Some(parts) => parts,
            None => unreachable!("length was checked above"),
        };
        let stored_crc32 = tail.get_u32_le();
        let Some(crc32_span) = bytes.get(..total - 4) else {
            unreachable!("length was checked above");
        };
        let computed_crc32 = checksum::frame_checksum(crc32_span);
        if stored_crc32 != computed_crc32 {
            return Err(ProtocolError::Crc32Mismatch {
                stored: stored_crc32,
                computed: computed_crc32,
            });
        }

        let frame_type = FrameType::try_from(frame_type_raw)?;
        let mut body = body;
        let cmd_set = CommandSet::try_from(body.get_u8())?;
        let cmd_id = body.get_u8();

        Ok(Self {
            frame_type,
            seq,
            cmd_set,
            cmd_id,
            payload: body,
        })
    }
}

impl Display for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} seq:{} payload:{}B",
            self.frame_type,
            self.cmd_set,
            self.cmd_id,
            self.seq,
            self.payload.len()
        )
    }
}

/// Serializes one frame, computing both checksums.
///
/// # Errors
///
/// Errors if the payload does not fit within [`MAX_FRAME_LEN`].
pub fn build(
    frame_type: FrameType,
    cmd_set: CommandSet,
    cmd_id: u8,
    seq: u16,
    payload: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let total = WRAPPER_LEN + payload.len();
    if total > MAX_FRAME_LEN {
        return Err(ProtocolError::PayloadTooLong {
            len: payload.len(),
        });
    }

    let mut frame = BytesMut::with_capacity(total);
    frame.put_u8(SOF);
    frame.put_u8(PROTOCOL_VERSION);
    frame.put_u16_le(total as u16);
    frame.put_u8(frame_type as u8);
    frame.put_u16_le(seq);
    let crc16 = checksum::preamble_checksum(&frame);
    frame.put_u16_le(crc16);
    frame.put_u8(cmd_set as u8);
    frame.put_u8(cmd_id);
    frame.put_slice(payload);
    let crc32 = checksum::frame_checksum(&frame);
    frame.put_u32_le(crc32);

    Ok(frame.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Vec<u8> {
        build(
            FrameType::Ack,
            CommandSet::Lidar,
            6,
            0x1234,
            &[0x00, 0x01, 0x02],
        )
        .expect("payload fits")
    }

    #[test]
    fn round_trip_preserves_fields() {
        let bytes = sample_frame();
        let frame = Frame::parse(&bytes).expect("frame is well-formed");
        assert_eq!(frame.frame_type, FrameType::Ack);
        assert_eq!(frame.cmd_set, CommandSet::Lidar);
        assert_eq!(frame.cmd_id, 6);
        assert_eq!(frame.seq, 0x1234);
        assert_eq!(frame.payload, &[0x00, 0x01, 0x02]);
    }

    #[test]
    fn round_trip_largest_payload() {
        let payload = vec![0xA5; MAX_PAYLOAD_LEN];
        let bytes = build(FrameType::Command, CommandSet::General, 1, 0, &payload)
            .expect("payload fits");
        assert_eq!(bytes.len(), MAX_FRAME_LEN);
        let frame = Frame::parse(&bytes).expect("frame is well-formed");
        assert_eq!(frame.payload, payload.as_slice());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = vec![0; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(
            build(FrameType::Command, CommandSet::General, 1, 0, &payload),
            Err(ProtocolError::PayloadTooLong { .. })
        ));
    }

    #[test]
    fn every_single_bit_flip_is_rejected() {
        let bytes = sample_frame();
        for byte in 0..bytes.len() {
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    Frame::parse(&corrupted).is_err(),
                    "flip of byte {byte} bit {bit} was not detected"
                );
            }
        }
    }

    #[test]
    fn truncated_datagram_is_rejected() {
        let bytes = sample_frame();
        assert!(matches!(
            Frame::parse(&bytes[..bytes.len() - 1]),
            Err(ProtocolError::Truncated { .. })
        ));
        assert!(matches!(
            Frame::parse(&[]),
            Err(ProtocolError::Truncated { .. })
        ));
    }
}
