use std::fmt::{self, Display};

use serde::Serialize;

use crate::error::ProtocolError;

/// Sensor model, from the device-type byte of a broadcast announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceKind {
    Hub,
    Mid40,
    Tele15,
    Horizon,
    Unknown(u8),
}

impl From<u8> for DeviceKind {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Hub,
            1 => Self::Mid40,
            2 => Self::Tele15,
            3 => Self::Horizon,
            unknown => Self::Unknown(unknown),
        }
    }
}

impl Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Hub => f.write_str("Hub"),
            DeviceKind::Mid40 => f.write_str("Mid-40"),
            DeviceKind::Tele15 => f.write_str("Tele-15"),
            DeviceKind::Horizon => f.write_str("Horizon"),
            DeviceKind::Unknown(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

/**
 * Broadcast announcement payload (MSG / General / 0).
 *
 * 16 ASCII characters of broadcast code, one device-type byte, two reserved
 * bytes. Character 14 of the code is the IP-range digit that labels the
 * sub-sensors of a composite unit; the first 14 characters are the serial.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub broadcast_code: String,
    pub serial: String,
    pub ip_range_code: u8,
    pub kind: DeviceKind,
}

impl Announcement {
    pub const CODE_LEN: usize = 16;

    /// Parses an announcement payload.
    ///
    /// # Errors
    ///
    /// Errors if the payload is too short or the broadcast code is not
    /// ASCII with a decimal range digit at position 14.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let Some((code, rest)) = payload.split_at_checked(Self::CODE_LEN) else {
            return Err(ProtocolError::Truncated {
                expected: Self::CODE_LEN + 1,
                actual: payload.len(),
            });
        };
        let Some(&device_type) = rest.first() else {
            return Err(ProtocolError::Truncated {
                expected: Self::CODE_LEN + 1,
                actual: payload.len(),
            });
        };

        if !code.is_ascii() {
            return Err(ProtocolError::BadBroadcastCode);
        }
        let broadcast_code = String::from_utf8_lossy(code).into_owned();
        let ip_range_code = broadcast_code
            .chars()
            .nth(14)
            .and_then(|digit| digit.to_digit(10))
            .ok_or(ProtocolError::BadBroadcastCode)?;
        let serial = broadcast_code
            .get(..14)
            .ok_or(ProtocolError::BadBroadcastCode)?
            .to_owned();

        Ok(Self {
            broadcast_code,
            serial,
            ip_range_code: ip_range_code as u8,
            kind: DeviceKind::from(device_type),
        })
    }
}

impl Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} serial:{} (ID: {})",
            self.kind, self.serial, self.ip_range_code
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_mid40_announcement() {
        let mut payload = Vec::from(*b"ABCDEFGHIJKLMN1X");
        payload.extend_from_slice(&[1, 0, 0]);
        let announcement = Announcement::parse(&payload).expect("well-formed payload");
        assert_eq!(announcement.serial, "ABCDEFGHIJKLMN");
        assert_eq!(announcement.ip_range_code, 1);
        assert_eq!(announcement.kind, DeviceKind::Mid40);
        assert_eq!(announcement.broadcast_code, "ABCDEFGHIJKLMN1X");
    }

    #[test]
    fn rejects_non_digit_range_code() {
        let mut payload = Vec::from(*b"ABCDEFGHIJKLMNXX");
        payload.extend_from_slice(&[1, 0, 0]);
        assert_eq!(
            Announcement::parse(&payload),
            Err(ProtocolError::BadBroadcastCode)
        );
    }

    #[test]
    fn rejects_short_payload() {
        assert!(matches!(
            Announcement::parse(b"ABCDEFGH"),
            Err(ProtocolError::Truncated { .. })
        ));
    }
}
