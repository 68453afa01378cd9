use std::fmt::{self, Display};

use bytes::Buf;

use crate::error::ProtocolError;

/// One inertial sample: three-axis angular velocity followed by three-axis
/// acceleration, six little-endian `f32`s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    pub gyro: [f32; 3],
    pub accel: [f32; 3],
}

impl ImuSample {
    pub const LEN: usize = 24;

    /// Reads one sample off the front of `bytes`.
    ///
    /// # Errors
    ///
    /// Errors if fewer than 24 bytes remain.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), ProtocolError> {
        let Some((mut sample, remainder)) = bytes.split_at_checked(Self::LEN) else {
            return Err(ProtocolError::Truncated {
                expected: Self::LEN,
                actual: bytes.len(),
            });
        };

        let gyro = [
            sample.get_f32_le(),
            sample.get_f32_le(),
            sample.get_f32_le(),
        ];
        let accel = [
            sample.get_f32_le(),
            sample.get_f32_le(),
            sample.get_f32_le(),
        ];

        Ok((Self { gyro, accel }, remainder))
    }
}

impl Display for ImuSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gyro:[{}, {}, {}], accel:[{}, {}, {}]",
            self.gyro[0], self.gyro[1], self.gyro[2], self.accel[0], self.accel[1], self.accel[2],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    #[test]
    fn round_trips_six_floats() {
        let mut bytes = BytesMut::new();
        for value in [0.1_f32, -0.2, 0.3, 9.8, 0.0, -9.8] {
            bytes.put_f32_le(value);
        }
        let (sample, rest) = ImuSample::parse(&bytes).expect("enough bytes");
        assert!(rest.is_empty());
        assert_eq!(sample.gyro, [0.1, -0.2, 0.3]);
        assert_eq!(sample.accel, [9.8, 0.0, -9.8]);
    }

    #[test]
    fn rejects_short_payload() {
        assert!(matches!(
            ImuSample::parse(&[0; 20]),
            Err(ProtocolError::Truncated { .. })
        ));
    }
}
