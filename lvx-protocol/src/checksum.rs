use crc::{Algorithm, Crc};

// Both checksums are the catalogue algorithms with sensor-defined seeds.
// `Algorithm::init` is specified in unreflected bit order, hence the
// `reverse_bits` on the seeds the device documentation quotes.

/// CRC-16 over the 7-byte frame preamble: poly 0x1021, reflected, seed 0x4C49.
const PREAMBLE_ALGORITHM: Algorithm<u16> = Algorithm {
    init: 0x4C49_u16.reverse_bits(),
    ..crc::CRC_16_MCRF4XX
};

/// CRC-32 over the frame minus its trailing checksum: ISO-HDLC poly,
/// reflected, seed 0x564F580A, xor-out 0xFFFFFFFF.
const FRAME_ALGORITHM: Algorithm<u32> = Algorithm {
    init: (!0x564F_580A_u32).reverse_bits(),
    ..crc::CRC_32_ISO_HDLC
};

const CRC16: Crc<u16> = Crc::<u16>::new(&PREAMBLE_ALGORITHM);
const CRC32: Crc<u32> = Crc::<u32>::new(&FRAME_ALGORITHM);

pub(crate) fn preamble_checksum(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

pub(crate) fn frame_checksum(bytes: &[u8]) -> u32 {
    CRC32.checksum(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference values taken from frames captured off a real sensor.
    #[test]
    fn preamble_checksum_matches_known_heartbeat() {
        assert_eq!(
            preamble_checksum(&[0xAA, 0x01, 0x0F, 0x00, 0x00, 0x00, 0x00]),
            0xD704
        );
    }

    #[test]
    fn preamble_checksum_matches_known_handshake() {
        assert_eq!(
            preamble_checksum(&[0xAA, 0x01, 0x19, 0x00, 0x00, 0x00, 0x00]),
            0x58DC
        );
    }

    #[test]
    fn frame_checksum_matches_known_heartbeat() {
        let frame: [u8; 11] = [
            0xAA, 0x01, 0x0F, 0x00, 0x00, 0x00, 0x00, 0x04, 0xD7, 0x00, 0x03,
        ];
        assert_eq!(frame_checksum(&frame), 0x0C8D_BA38);
    }
}
