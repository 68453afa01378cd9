//! Host-side driver for Livox-family solid-state LiDAR sensors.
//!
//! Discovery on the announcement port, three-socket sessions with a 1 Hz
//! heartbeat, the typed command surface, real-time point/IMU capture into a
//! compact binary container, and transcoding of that container to CSV or
//! LAS. Multiple sensors (including composite Mid-100 units) can be driven
//! concurrently from one host.

mod capture;
mod commander;
mod container;
mod discovery;
mod error;
mod group;
mod heartbeat;
mod net;
mod session;
mod sink;
mod transcode;

pub use capture::{CaptureMode, CaptureSummary};
pub use container::{
    IMU_MAGIC, IMU_RECORD_LEN, ImuContainerReader, POINT_MAGIC, PointContainerReader,
    StoredRecord, csv_header, has_return_marker, record_stride, stored_record_len,
};
pub use discovery::{
    DEFAULT_SCAN_WINDOW, DiscoveredSensor, GroupKind, SensorGroup, classify_groups, discover,
};
pub use error::{Error, FatalPolicy, FatalReason, Result};
pub use group::SensorArray;
pub use session::{
    ConnectionInfo, DeviceModel, DriverConfig, Extrinsics, FirmwareKind, Sensor, SubSensor,
    all_done_capturing,
};
pub use sink::MessageSink;
pub use transcode::{TranscodeSummary, convert_bin_to_csv, convert_bin_to_las};

// Re-export the protocol vocabulary callers need at the driver surface.
pub use lvx_protocol::broadcast::DeviceKind;
pub use lvx_protocol::command::{CoordinateSystem, ReturnMode};
pub use lvx_protocol::point::DataType;
pub use lvx_protocol::status::{HealthSnapshot, WorkState};
