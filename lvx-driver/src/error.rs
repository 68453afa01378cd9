use std::fmt::{self, Display};

use lvx_protocol::ProtocolError;
use thiserror::Error;

/// Conditions the original behaviour answers by terminating the process.
///
/// Each carries its historical exit code. The reason is always recorded on
/// the session before any exit happens, so callers running with
/// [`FatalPolicy::Record`] can observe it instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    /// Heartbeat reported work-state error (or system status error).
    HeartbeatError,
    /// Unsolicited abnormal-status message from the sensor.
    AbnormalStatus,
    /// The requested sensor IP did not answer the discovery pass.
    IpMismatch,
    /// Could not bind the session sockets.
    BindFailure,
    /// Sensor accepted a dynamic IP change and must be power-cycled.
    DynamicIpApplied,
    /// Sensor accepted a static IP change and must be power-cycled.
    StaticIpApplied,
}

impl FatalReason {
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            FatalReason::HeartbeatError => 0,
            FatalReason::AbnormalStatus => 1,
            FatalReason::IpMismatch => 2,
            FatalReason::BindFailure => 3,
            FatalReason::DynamicIpApplied => 4,
            FatalReason::StaticIpApplied => 5,
        }
    }
}

impl Display for FatalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            FatalReason::HeartbeatError => "heartbeat error state",
            FatalReason::AbnormalStatus => "abnormal status message",
            FatalReason::IpMismatch => "sensor IP did not answer discovery",
            FatalReason::BindFailure => "socket bind failure",
            FatalReason::DynamicIpApplied => "dynamic IP applied, sensor must be power-cycled",
            FatalReason::StaticIpApplied => "static IP applied, sensor must be power-cycled",
        };
        f.write_str(str)
    }
}

/// What to do when a [`FatalReason`] arises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalPolicy {
    /// Terminate the process with the historical exit code.
    #[default]
    ExitProcess,
    /// Record the reason on the session and surface it as an error.
    Record,
}

/// Driver-level failures surfaced to callers.
///
/// Malformed inbound traffic never appears here: receive loops drop the
/// datagram and increment a counter. Retrying is the caller's business.
#[derive(Debug, Error)]
pub enum Error {
    #[error("device rejected the request (ret code {code})")]
    RejectedByDevice { code: u8 },

    #[error("timed out waiting for the sensor to respond")]
    Timeout,

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("not connected to a sensor")]
    NotConnected,

    #[error("fatal sensor condition: {0}")]
    Fatal(FatalReason),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
