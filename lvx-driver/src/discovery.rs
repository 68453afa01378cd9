use std::net::{Ipv4Addr, SocketAddr};
use std::thread;
use std::time::{Duration, Instant};

use lvx_protocol::broadcast::{Announcement, DeviceKind};
use lvx_protocol::command::general;
use lvx_protocol::{BROADCAST_LISTEN_PORT, CommandSet, Frame, FrameType, SENSOR_CMD_PORT};
use tracing::{debug, warn};

use crate::error::Result;
use crate::net::{self, POLL_YIELD};

/// Default announcement collection window.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(1);

/// One sensor seen on the announcement port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSensor {
    pub ip: Ipv4Addr,
    /// Full 16-character broadcast code.
    pub serial: String,
    pub ip_range_code: u8,
    pub kind: DeviceKind,
}

impl DiscoveredSensor {
    /// The serial shared by every sub-sensor of one unit (the code minus
    /// its range digit and spare character).
    #[must_use]
    pub fn unit_serial(&self) -> &str {
        self.serial.get(..14).unwrap_or(&self.serial)
    }
}

/// What a serial-sharing group of announcements turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind {
    Atomic(DeviceKind),
    /// Three sub-sensors behind one serial (a Mid-100).
    Composite,
    /// Two announcements: either a sub-sensor is missing or still booting.
    Indeterminate,
}

/// Announcements grouped by serial.
#[derive(Debug, Clone)]
pub struct SensorGroup {
    pub serial: String,
    /// Composite members sorted by IP-range code (L, M, R).
    pub members: Vec<DiscoveredSensor>,
    pub kind: GroupKind,
}

/// Listens on UDP/55000 for sensor announcements.
///
/// Collects until `scan_window` passes with no previously-unseen source IP,
/// deduplicating by source IP. Announcements must originate from the sensor
/// command port.
///
/// # Errors
///
/// Errors only on socket failures; an empty network yields an empty list.
pub fn discover(scan_window: Duration) -> Result<Vec<DiscoveredSensor>> {
    let socket = net::bind_udp(Ipv4Addr::UNSPECIFIED, BROADCAST_LISTEN_PORT)?;
    let mut sensors: Vec<DiscoveredSensor> = Vec::new();
    let mut buf = [0_u8; 128];
    let mut deadline = Instant::now() + scan_window;

    while Instant::now() < deadline {
        let (len, source) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_YIELD);
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        let SocketAddr::V4(source) = source else {
            continue;
        };
        if source.port() != SENSOR_CMD_PORT {
            continue;
        }
        let source_ip = *source.ip();
        if sensors.iter().any(|sensor| sensor.ip == source_ip) {
            continue;
        }
        match parse_announcement(&buf[..len]) {
            Some(announcement) => {
                debug!(ip = %source_ip, serial = %announcement.serial, "announcement");
                sensors.push(DiscoveredSensor {
                    ip: source_ip,
                    serial: announcement.broadcast_code,
                    ip_range_code: announcement.ip_range_code,
                    kind: announcement.kind,
                });
                deadline = Instant::now() + scan_window;
            }
            None => warn!(ip = %source_ip, "undecodable announcement dropped"),
        }
    }

    drop(socket);
    thread::sleep(Duration::from_millis(200));
    Ok(sensors)
}

fn parse_announcement(datagram: &[u8]) -> Option<Announcement> {
    let frame = Frame::parse(datagram).ok()?;
    if frame.frame_type != FrameType::Message
        || frame.cmd_set != CommandSet::General
        || frame.cmd_id != general::BROADCAST
    {
        return None;
    }
    Announcement::parse(frame.payload).ok()
}

/// Groups discovered sensors by serial and classifies each group.
///
/// Size three is a composite Mid-100 whose members are ordered L/M/R by
/// IP-range code; size two is flagged indeterminate and skipped by
/// auto-connection.
#[must_use]
pub fn classify_groups(sensors: &[DiscoveredSensor]) -> Vec<SensorGroup> {
    let mut groups: Vec<SensorGroup> = Vec::new();
    for sensor in sensors {
        match groups
            .iter_mut()
            .find(|group| group.serial == sensor.unit_serial())
        {
            Some(group) => group.members.push(sensor.clone()),
            None => groups.push(SensorGroup {
                serial: sensor.unit_serial().to_owned(),
                members: vec![sensor.clone()],
                kind: GroupKind::Indeterminate,
            }),
        }
    }
    for group in &mut groups {
        group
            .members
            .sort_by_key(|member| member.ip_range_code);
        group.kind = match group.members.as_slice() {
            [only] => GroupKind::Atomic(only.kind),
            [_, _, _] => GroupKind::Composite,
            _ => GroupKind::Indeterminate,
        };
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(last_octet: u8, unit: &str, range_code: u8) -> DiscoveredSensor {
        DiscoveredSensor {
            ip: Ipv4Addr::new(192, 168, 1, last_octet),
            serial: format!("{unit}{range_code}X"),
            ip_range_code: range_code,
            kind: DeviceKind::Mid40,
        }
    }

    #[test]
    fn three_announcements_sharing_a_serial_form_a_composite() {
        let sensors = [
            sensor(120, "AAAAAAAAAAAAAA", 2),
            sensor(12, "AAAAAAAAAAAAAA", 1),
            sensor(200, "AAAAAAAAAAAAAA", 3),
        ];
        let groups = classify_groups(&sensors);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kind, GroupKind::Composite);
        let codes: Vec<u8> = groups[0]
            .members
            .iter()
            .map(|member| member.ip_range_code)
            .collect();
        assert_eq!(codes, [1, 2, 3], "members ordered L, M, R");
    }

    #[test]
    fn pairs_are_indeterminate_and_singles_atomic() {
        let sensors = [
            sensor(12, "AAAAAAAAAAAAAA", 1),
            sensor(13, "AAAAAAAAAAAAAA", 2),
            sensor(14, "BBBBBBBBBBBBBB", 1),
        ];
        let groups = classify_groups(&sensors);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].kind, GroupKind::Indeterminate);
        assert_eq!(groups[1].kind, GroupKind::Atomic(DeviceKind::Mid40));
    }
}
