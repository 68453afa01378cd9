use std::fmt::{self, Display};
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use lvx_protocol::broadcast::DeviceKind;
use lvx_protocol::command::{Command, CoordinateSystem, QueryAck, general};
use lvx_protocol::{CommandSet, Frame, FrameType, SENSOR_CMD_PORT};
use serde::Serialize;
use tracing::debug;

use crate::capture::{CaptureHandle, CaptureSummary};
use crate::discovery::{self, DEFAULT_SCAN_WINDOW, DiscoveredSensor, GroupKind};
use crate::error::{Error, FatalPolicy, FatalReason, Result};
use crate::heartbeat::{self, ACK_TIMEOUT, HeartbeatHandle, IdleGate, SessionShared};
use crate::net;
use crate::sink::MessageSink;

/// Session-wide knobs injected at construction.
#[derive(Clone, Debug, Default)]
pub struct DriverConfig {
    pub sink: MessageSink,
    pub fatal_policy: FatalPolicy,
}

/// Return discipline of the sensor firmware, derived from its version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FirmwareKind {
    SingleReturn,
    DualReturn,
    TripleReturn,
}

impl FirmwareKind {
    /// Code stored in the binary container header.
    #[must_use]
    pub fn code(self) -> i16 {
        match self {
            FirmwareKind::SingleReturn => 1,
            FirmwareKind::DualReturn => 2,
            FirmwareKind::TripleReturn => 3,
        }
    }

    #[must_use]
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::SingleReturn),
            2 => Some(Self::DualReturn),
            3 => Some(Self::TripleReturn),
            _ => None,
        }
    }

    /// Multi-return firmwares are only published under these versions; every
    /// other version reports one return per pulse.
    #[must_use]
    pub fn from_version(version: &str) -> Self {
        match version {
            "03.03.0001" | "03.03.0006" => Self::DualReturn,
            "03.03.0002" | "03.03.0007" => Self::TripleReturn,
            _ => Self::SingleReturn,
        }
    }

    /// Relative duration stretch applied to approximate 100 000 points/s.
    pub(crate) fn duration_bias(self) -> f64 {
        match self {
            FirmwareKind::SingleReturn => 0.001,
            FirmwareKind::DualReturn => 0.0005,
            FirmwareKind::TripleReturn => 0.000_55,
        }
    }
}

/// Position of a sub-sensor inside a composite Mid-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubSensor {
    Left,
    Middle,
    Right,
}

impl SubSensor {
    #[must_use]
    pub fn from_range_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Left),
            2 => Some(Self::Middle),
            3 => Some(Self::Right),
            _ => None,
        }
    }
}

impl Display for SubSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            SubSensor::Left => "L",
            SubSensor::Middle => "M",
            SubSensor::Right => "R",
        };
        f.write_str(str)
    }
}

/// What the session believes it is talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceModel {
    Unknown,
    Single(DeviceKind),
    /// One sub-sensor of a composite Mid-100.
    Mid100(SubSensor),
}

impl DeviceModel {
    /// Composite units keep Cartesian null returns in the capture output.
    #[must_use]
    pub fn retains_nulls(&self) -> bool {
        matches!(self, DeviceModel::Mid100(_))
    }
}

impl Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceModel::Unknown => f.write_str("UNKNOWN"),
            DeviceModel::Single(kind) => write!(f, "{kind}"),
            DeviceModel::Mid100(sub) => write!(f, "Mid-100 ({sub})"),
        }
    }
}

/// Mounting extrinsics as read back from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extrinsics {
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
    pub roll_deg: f32,
    pub pitch_deg: f32,
    pub yaw_deg: f32,
}

/// Addressing of a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub computer_ip: Ipv4Addr,
    pub sensor_ip: Ipv4Addr,
    pub data_port: u16,
    pub cmd_port: u16,
    pub imu_port: u16,
}

/// One sensor session: three bound sockets, a heartbeat task, and, while
/// streaming, a capture task.
pub struct Sensor {
    pub(crate) sink: MessageSink,
    pub(crate) fatal_policy: FatalPolicy,
    pub(crate) computer_ip: Ipv4Addr,
    pub(crate) sensor_ip: Ipv4Addr,
    pub(crate) data_port: u16,
    pub(crate) cmd_port: u16,
    pub(crate) imu_port: u16,
    pub(crate) data_socket: Option<UdpSocket>,
    pub(crate) cmd_socket: Option<UdpSocket>,
    pub(crate) imu_socket: Option<UdpSocket>,
    pub(crate) connected: bool,
    pub(crate) streaming: bool,
    pub(crate) writing: bool,
    pub(crate) firmware: String,
    pub(crate) firmware_kind: FirmwareKind,
    pub(crate) serial: String,
    pub(crate) ip_range_code: u8,
    pub(crate) model: DeviceModel,
    pub(crate) coord_system: Option<CoordinateSystem>,
    pub(crate) extrinsics: Option<Extrinsics>,
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) gate: Arc<IdleGate>,
    pub(crate) heartbeat: Option<HeartbeatHandle>,
    pub(crate) capture: Option<CaptureHandle>,
}

impl Sensor {
    #[must_use]
    pub fn new(config: DriverConfig) -> Self {
        Self {
            sink: config.sink,
            fatal_policy: config.fatal_policy,
            computer_ip: Ipv4Addr::UNSPECIFIED,
            sensor_ip: Ipv4Addr::UNSPECIFIED,
            data_port: 0,
            cmd_port: 0,
            imu_port: 0,
            data_socket: None,
            cmd_socket: None,
            imu_socket: None,
            connected: false,
            streaming: false,
            writing: false,
            firmware: "UNKNOWN".to_owned(),
            firmware_kind: FirmwareKind::SingleReturn,
            serial: "UNKNOWN".to_owned(),
            ip_range_code: 0,
            model: DeviceModel::Unknown,
            coord_system: None,
            extrinsics: None,
            shared: Arc::new(SessionShared::new()),
            gate: Arc::new(IdleGate::new()),
            heartbeat: None,
            capture: None,
        }
    }

    /// Discovers sensors, then opens a session with the one at `sensor_ip`.
    ///
    /// Requested ports of 0 let the OS assign them. A sensor that does not
    /// answer the discovery pass is fatal (exit code 2 under the legacy
    /// policy).
    ///
    /// # Errors
    ///
    /// `Timeout` when the handshake goes unanswered, `RejectedByDevice` on
    /// a non-zero handshake ret code, `Fatal` on IP mismatch or bind
    /// failure.
    pub fn connect(
        &mut self,
        computer_ip: Ipv4Addr,
        sensor_ip: Ipv4Addr,
        data_port: u16,
        cmd_port: u16,
        imu_port: u16,
    ) -> Result<()> {
        if self.connected {
            self.sink.emit(&format!(
                "Already connected to the Livox {} at IP: {}",
                self.model, self.sensor_ip
            ));
            return Ok(());
        }
        let sensors = discovery::discover(DEFAULT_SCAN_WINDOW)?;
        self.connect_verified(computer_ip, sensor_ip, data_port, cmd_port, imu_port, &sensors)
    }

    /// Discovers sensors and connects to the first complete unit.
    ///
    /// # Errors
    ///
    /// `Configuration` when nothing (or only a composite unit) is found;
    /// otherwise as [`Sensor::connect`].
    pub fn auto_connect(&mut self, computer_ip: Ipv4Addr) -> Result<()> {
        let sensors = discovery::discover(DEFAULT_SCAN_WINDOW)?;
        let groups = discovery::classify_groups(&sensors);
        let Some(group) = groups
            .iter()
            .find(|group| group.kind != GroupKind::Indeterminate)
        else {
            return Err(Error::Configuration(
                "no Livox sensors discovered".to_owned(),
            ));
        };
        if group.kind == GroupKind::Composite {
            return Err(Error::Configuration(
                "discovered a composite Mid-100; connect it through SensorArray".to_owned(),
            ));
        }
        let target = group
            .members
            .first()
            .cloned()
            .ok_or_else(|| Error::Configuration("empty sensor group".to_owned()))?;
        self.sink.emit(&format!(
            "   *** Discovered a Livox sensor ***\n           Type: {}\n         Serial: {}\n          IP(s): {} (ID: {})",
            target.kind, target.serial, target.ip, target.ip_range_code
        ));
        self.connect_verified(computer_ip, target.ip, 0, 0, 0, &sensors)
    }

    pub(crate) fn connect_verified(
        &mut self,
        computer_ip: Ipv4Addr,
        sensor_ip: Ipv4Addr,
        data_port: u16,
        cmd_port: u16,
        imu_port: u16,
        sensors: &[DiscoveredSensor],
    ) -> Result<()> {
        let Some(found) = sensors.iter().find(|sensor| sensor.ip == sensor_ip) else {
            self.sink.emit(
                "* ERROR: specified sensor IP:Command Port cannot connect to a Livox sensor *",
            );
            heartbeat::raise_fatal(&self.shared, self.fatal_policy, FatalReason::IpMismatch);
            return Err(Error::Fatal(FatalReason::IpMismatch));
        };
        self.serial = found.serial.clone();
        self.ip_range_code = found.ip_range_code;
        self.model = resolve_model(found, sensors);
        self.computer_ip = computer_ip;
        self.sensor_ip = sensor_ip;

        self.bind_ports(computer_ip, data_port, cmd_port, imu_port)?;

        let cmd_socket = self
            .cmd_socket
            .as_ref()
            .ok_or(Error::NotConnected)?
            .try_clone()?;
        let handshake = Command::Handshake {
            host: computer_ip,
            data_port: self.data_port,
            cmd_port: self.cmd_port,
            imu_port: self.imu_port,
        };
        cmd_socket.send_to(&handshake.encode(), (sensor_ip, SENSOR_CMD_PORT))?;

        let mut buf = [0_u8; 256];
        let Some(len) = net::recv_within(&cmd_socket, ACK_TIMEOUT, &mut buf)? else {
            self.sink.emit(&format!(
                "FAILED to connect to the Livox {} at IP: {sensor_ip}",
                self.model
            ));
            self.close_sockets();
            return Err(Error::Timeout);
        };
        let ret_code = match Frame::parse(&buf[..len]) {
            Ok(frame)
                if frame.frame_type == FrameType::Ack
                    && frame.cmd_set == CommandSet::General
                    && frame.cmd_id == general::HANDSHAKE =>
            {
                frame.payload.first().copied().unwrap_or(1)
            }
            Ok(_) | Err(_) => {
                self.sink.emit(&format!(
                    "FAILED to connect to the Livox {} at IP: {sensor_ip}",
                    self.model
                ));
                self.close_sockets();
                return Err(Error::Timeout);
            }
        };
        if ret_code != 0 {
            self.sink.emit(&format!(
                "FAILED to connect to the Livox {} at IP: {sensor_ip}",
                self.model
            ));
            self.close_sockets();
            return Err(Error::RejectedByDevice { code: ret_code });
        }

        self.connected = true;
        self.heartbeat = Some(heartbeat::spawn(
            cmd_socket,
            sensor_ip,
            Arc::clone(&self.shared),
            Arc::clone(&self.gate),
            self.sink.clone(),
            self.fatal_policy,
        ));
        thread::sleep(Duration::from_millis(150));
        if self.query().is_err() {
            self.sink
                .note(self.sensor_ip, "FAILED to receive query results");
        }
        self.sink.emit(&format!(
            "Connected to the Livox {} at IP: {} (ID: {})",
            self.model, self.sensor_ip, self.ip_range_code
        ));
        Ok(())
    }

    fn bind_ports(
        &mut self,
        computer_ip: Ipv4Addr,
        data_port: u16,
        cmd_port: u16,
        imu_port: u16,
    ) -> Result<()> {
        let bound = (|| {
            let data = net::bind_udp(computer_ip, data_port)?;
            let cmd = net::bind_udp(computer_ip, cmd_port)?;
            let imu = net::bind_udp(computer_ip, imu_port)?;
            Ok::<_, std::io::Error>((data, cmd, imu))
        })();
        match bound {
            Ok((data, cmd, imu)) => {
                self.data_port = data.local_addr()?.port();
                self.cmd_port = cmd.local_addr()?.port();
                self.imu_port = imu.local_addr()?.port();
                self.data_socket = Some(data);
                self.cmd_socket = Some(cmd);
                self.imu_socket = Some(imu);
                thread::sleep(Duration::from_millis(100));
                Ok(())
            }
            Err(err) => {
                self.sink.emit(&format!(
                    " *** ERROR: cannot bind to specified IP:Port(s), {err}"
                ));
                heartbeat::raise_fatal(&self.shared, self.fatal_policy, FatalReason::BindFailure);
                Err(Error::Fatal(FatalReason::BindFailure))
            }
        }
    }

    /// Sends one command and waits for its ack, serialised by the idle gate.
    pub(crate) fn transact(&self, command: &Command) -> Result<Vec<u8>> {
        if let Some(reason) = self.shared.fatal_reason() {
            return Err(Error::Fatal(reason));
        }
        if !self.connected {
            return Err(Error::NotConnected);
        }
        let socket = self.cmd_socket.as_ref().ok_or(Error::NotConnected)?;
        let _guard = self.gate.acquire();
        socket.send_to(&command.encode(), (self.sensor_ip, SENSOR_CMD_PORT))?;

        let mut buf = [0_u8; 256];
        let deadline = Instant::now() + ACK_TIMEOUT;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let Some(len) = net::recv_within(socket, deadline - now, &mut buf)? else {
                return Err(Error::Timeout);
            };
            match Frame::parse(&buf[..len]) {
                Ok(frame)
                    if frame.frame_type == FrameType::Ack
                        && frame.cmd_set == command.cmd_set()
                        && frame.cmd_id == command.cmd_id() =>
                {
                    return Ok(frame.payload.to_vec());
                }
                Ok(frame)
                    if frame.frame_type == FrameType::Message
                        && frame.cmd_set == CommandSet::General
                        && frame.cmd_id == general::ABNORMAL_STATUS =>
                {
                    self.sink
                        .note(self.sensor_ip, "*** ERROR: ABNORMAL STATUS MESSAGE RECEIVED ***");
                    heartbeat::raise_fatal(
                        &self.shared,
                        self.fatal_policy,
                        FatalReason::AbnormalStatus,
                    );
                    return Err(Error::Fatal(FatalReason::AbnormalStatus));
                }
                Ok(frame) => debug!(%frame, "ignoring stale frame while awaiting ack"),
                Err(err) => {
                    self.shared.dropped_frames.fetch_add(1, Ordering::Relaxed);
                    debug!(%err, "dropped malformed frame while awaiting ack");
                }
            }
        }
    }

    pub(crate) fn query(&mut self) -> Result<()> {
        let payload = self.transact(&Command::Query)?;
        let ack = QueryAck::parse(&payload)?;
        if ack.ret_code != 0 {
            return Err(Error::RejectedByDevice {
                code: ack.ret_code,
            });
        }
        self.firmware = ack.firmware_string();
        self.firmware_kind = FirmwareKind::from_version(&self.firmware);
        Ok(())
    }

    /// Stops capture, notifies the sensor, and tears the session down.
    ///
    /// # Errors
    ///
    /// Socket errors only; a rejected disconnect is reported on the sink
    /// but teardown proceeds regardless.
    pub fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            self.sink.emit(&format!(
                "Not connected to the Livox {} at IP: {}",
                self.model, self.sensor_ip
            ));
            return Ok(());
        }
        self.stop_capture();
        self.streaming = false;
        match self.transact(&Command::Disconnect) {
            Ok(payload) => {
                if payload.first() != Some(&0) {
                    self.sink.note(self.sensor_ip, "FAILED to disconnect");
                }
            }
            Err(_) => self
                .sink
                .note(self.sensor_ip, "incorrect disconnect response"),
        }
        self.teardown();
        self.sink.emit(&format!(
            "Disconnected from the Livox {} at IP: {}",
            self.model, self.sensor_ip
        ));
        Ok(())
    }

    /// Commands a sensor reboot and tears the session down.
    ///
    /// # Errors
    ///
    /// Socket errors only.
    pub fn reboot(&mut self) -> Result<()> {
        if !self.connected {
            self.sink.emit(&format!(
                "Not connected to the Livox {} at IP: {}",
                self.model, self.sensor_ip
            ));
            return Ok(());
        }
        self.stop_capture();
        self.streaming = false;
        match self.transact(&Command::Reboot) {
            Ok(payload) => {
                if payload.first() != Some(&0) {
                    self.sink.note(self.sensor_ip, "FAILED to reboot");
                }
            }
            Err(_) => self.sink.note(self.sensor_ip, "incorrect reboot response"),
        }
        self.teardown();
        self.sink.emit(&format!(
            "Rebooting the Livox {} at IP: {}",
            self.model, self.sensor_ip
        ));
        Ok(())
    }

    fn teardown(&mut self) {
        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.stop(&self.shared, &self.gate);
        }
        self.close_sockets();
        self.connected = false;
        thread::sleep(Duration::from_millis(200));
    }

    pub(crate) fn close_sockets(&mut self) {
        self.data_socket = None;
        self.cmd_socket = None;
        self.imu_socket = None;
    }

    pub(crate) fn stop_capture(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        self.writing = false;
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    #[must_use]
    pub fn firmware(&self) -> &str {
        &self.firmware
    }

    #[must_use]
    pub fn firmware_kind(&self) -> FirmwareKind {
        self.firmware_kind
    }

    #[must_use]
    pub fn serial(&self) -> &str {
        &self.serial
    }

    #[must_use]
    pub fn model(&self) -> DeviceModel {
        self.model
    }

    #[must_use]
    pub fn ip_range_code(&self) -> u8 {
        self.ip_range_code
    }

    /// Last work state seen in a heartbeat ack; -1 before the first.
    #[must_use]
    pub fn work_state(&self) -> i8 {
        self.shared.work_state.load(Ordering::Acquire)
    }

    /// The recorded fatal reason, if the session hit one.
    #[must_use]
    pub fn fatal_reason(&self) -> Option<FatalReason> {
        self.shared.fatal_reason()
    }

    #[must_use]
    pub fn extrinsics(&self) -> Option<Extrinsics> {
        self.extrinsics
    }

    /// Last coordinate system this session commanded, if any.
    #[must_use]
    pub fn coordinate_system(&self) -> Option<CoordinateSystem> {
        self.coord_system
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    #[must_use]
    pub fn is_writing(&self) -> bool {
        self.writing
    }

    #[must_use]
    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.connected.then(|| ConnectionInfo {
            computer_ip: self.computer_ip,
            sensor_ip: self.sensor_ip,
            data_port: self.data_port,
            cmd_port: self.cmd_port,
            imu_port: self.imu_port,
        })
    }

    /// Latest health codes, with one descriptive line per field on the sink.
    #[must_use]
    pub fn status_codes(&self) -> [i8; 12] {
        let codes = self
            .shared
            .health
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .codes();
        for (index, label) in STATUS_LABELS.iter().enumerate() {
            self.sink
                .emit(&format!("      {label}{}", describe_status(index, codes[index])));
        }
        codes
    }

    /// Counters of the current (or just-closed) capture stream.
    #[must_use]
    pub fn capture_summary(&self) -> Option<CaptureSummary> {
        self.capture.as_ref().map(CaptureHandle::summary)
    }

    /// True when no capture is running, or the running one has a bounded
    /// duration and finished it.
    #[must_use]
    pub fn done_capturing(&self) -> bool {
        thread::sleep(Duration::from_millis(10));
        match &self.capture {
            Some(capture) => capture.done(),
            None => true,
        }
    }
}

impl Drop for Sensor {
    fn drop(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.stop(&self.shared, &self.gate);
        }
    }
}

fn resolve_model(found: &DiscoveredSensor, sensors: &[DiscoveredSensor]) -> DeviceModel {
    let groups = discovery::classify_groups(sensors);
    let composite = groups
        .iter()
        .any(|group| group.serial == found.unit_serial() && group.kind == GroupKind::Composite);
    if composite {
        SubSensor::from_range_code(found.ip_range_code)
            .map_or(DeviceModel::Unknown, DeviceModel::Mid100)
    } else {
        DeviceModel::Single(found.kind)
    }
}

const STATUS_LABELS: [&str; 12] = [
    "System Status:         ",
    "Temperature Status:    ",
    "Voltage Status:        ",
    "Motor Status:          ",
    "Clean Status:          ",
    "Firmware Status:       ",
    "PPS Status:            ",
    "Device Status:         ",
    "Fan Status:            ",
    "Self Heating Status:   ",
    "PTP Status:            ",
    "Time Sync. Status:     ",
];

fn describe_status(index: usize, code: i8) -> &'static str {
    match (index, code) {
        (0, 0) => "OK",
        (0, 1) => "* WARNING *",
        (0, 2) => "*** ERROR ***",
        (1, 0) => "OK",
        (1, 1) => "High/Low Warning",
        (1, 2) => "Extremely High/Low Error",
        (2, 0) => "OK",
        (2, 1) => "High Warning",
        (2, 2) => "Extremely High Error",
        (3, 0) => "OK",
        (3, 1) => "Warning State",
        (3, 2) => "Error State",
        (4, 0) => "OK",
        (4, 1) => "Dirty/Blocked Warning",
        (5, 0) => "OK",
        (5, 1) => "Abnormal Error",
        (6, 0) => "OK, but not detected",
        (6, 1) => "OK",
        (7, 0) => "OK",
        (7, 1) => "Approaching End of Service Life Warning",
        (8, 0) => "OK",
        (8, 1) => "Fan Warning",
        (9, 0) => "Low Temp. Heating ON",
        (9, 1) => "Low Temp. Heating OFF",
        (10, 0) => "No 1588 Signal",
        (10, 1) => "1588 Signal OK",
        (11, 0) => "Internal clock sync.",
        (11, 1) => "PTP 1588 sync.",
        (11, 2) => "GPS sync.",
        (11, 3) => "PPS sync.",
        (11, 4) => "Abnormal time sync.",
        _ => "UNKNOWN",
    }
}

/// True when every session with a capture stream has finished (indefinite
/// streams count as finished).
#[must_use]
pub fn all_done_capturing(sensors: &[&Sensor]) -> bool {
    thread::sleep(Duration::from_millis(10));
    sensors
        .iter()
        .filter(|sensor| sensor.capture.is_some())
        .all(|sensor| match &sensor.capture {
            Some(capture) => capture.done(),
            None => true,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_kind_special_versions() {
        assert_eq!(FirmwareKind::from_version("03.03.0001"), FirmwareKind::DualReturn);
        assert_eq!(FirmwareKind::from_version("03.03.0002"), FirmwareKind::TripleReturn);
        assert_eq!(FirmwareKind::from_version("03.03.0006"), FirmwareKind::DualReturn);
        assert_eq!(FirmwareKind::from_version("03.03.0007"), FirmwareKind::TripleReturn);
        assert_eq!(FirmwareKind::from_version("03.05.0000"), FirmwareKind::SingleReturn);
        assert_eq!(FirmwareKind::from_version("UNKNOWN"), FirmwareKind::SingleReturn);
    }

    #[test]
    fn device_model_labels() {
        assert_eq!(DeviceModel::Single(DeviceKind::Horizon).to_string(), "Horizon");
        assert_eq!(DeviceModel::Mid100(SubSensor::Middle).to_string(), "Mid-100 (M)");
        assert!(DeviceModel::Mid100(SubSensor::Left).retains_nulls());
        assert!(!DeviceModel::Single(DeviceKind::Mid40).retains_nulls());
    }
}
