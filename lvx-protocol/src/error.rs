use thiserror::Error;

/// Everything that can go wrong while decoding bytes coming from a sensor.
///
/// None of these is fatal to a session: the owning loop drops the datagram
/// and increments a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("datagram truncated: expected {expected} bytes but got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("wrong start-of-frame byte {0:#04x}")]
    BadSof(u8),

    #[error("unsupported protocol version {0}")]
    BadVersion(u8),

    #[error("frame length {0} outside protocol bounds")]
    BadLength(usize),

    #[error("preamble checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    Crc16Mismatch { stored: u16, computed: u16 },

    #[error("frame checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Crc32Mismatch { stored: u32, computed: u32 },

    #[error("unknown frame type {0}")]
    BadFrameType(u8),

    #[error("unknown command set {0}")]
    BadCommandSet(u8),

    #[error("payload of {len} bytes does not fit in a frame")]
    PayloadTooLong { len: usize },

    #[error("point packet version {0} is not 5")]
    BadPacketVersion(u8),

    #[error("unknown data type {0}")]
    BadDataType(u8),

    #[error("unknown timestamp type {0}")]
    BadTimestampType(u8),

    #[error("unknown work state {0}")]
    BadWorkState(u8),

    #[error("broadcast code is not 16 ASCII characters")]
    BadBroadcastCode,
}
