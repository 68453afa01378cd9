use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::net::{Ipv4Addr, UdpSocket};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use lvx_protocol::point::{CartesianPoint, DataType, PacketHeader, SphericalPoint};
use serde::Serialize;
use tracing::{debug, warn};

use crate::commander::INDEFINITE_SECS;
use crate::container;
use crate::heartbeat::SessionShared;
use crate::net::{self, POLL_YIELD};
use crate::session::FirmwareKind;
use crate::sink::MessageSink;

/// Output form of a capture run.
///
/// `BufferedCsv` is the legacy stored-ASCII mode: the same row stream as
/// `RealtimeCsv` behind a buffer flushed at stop. Deprecated; kept for
/// compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Binary,
    RealtimeCsv,
    BufferedCsv,
}

/// Counters published when a capture closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CaptureSummary {
    pub good: u64,
    pub null: u64,
    pub imu_records: u64,
    pub dropped: u64,
}

struct WriteJob {
    path: PathBuf,
    wait_secs: f64,
    duration_secs: f64,
    firmware: FirmwareKind,
}

struct CaptureShared {
    started: AtomicBool,
    capturing: AtomicBool,
    finished: AtomicBool,
    indefinite: AtomicBool,
    good: AtomicU64,
    null: AtomicU64,
    imu_records: AtomicU64,
    dropped: AtomicU64,
    job: Mutex<Option<WriteJob>>,
    data_type: AtomicI8,
}

impl CaptureShared {
    fn new() -> Self {
        Self {
            started: AtomicBool::new(true),
            capturing: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            indefinite: AtomicBool::new(true),
            good: AtomicU64::new(0),
            null: AtomicU64::new(0),
            imu_records: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            job: Mutex::new(None),
            data_type: AtomicI8::new(-1),
        }
    }

    fn running(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

/// Owner handle of one capture task.
///
/// The task owns the data and IMU sockets for its lifetime, multiplexing
/// both with non-blocking readiness checks. Cancellation is cooperative:
/// the run flag is observed at every loop boundary.
pub(crate) struct CaptureHandle {
    shared: Arc<CaptureShared>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    pub(crate) fn spawn(
        data_socket: UdpSocket,
        imu_socket: UdpSocket,
        mode: CaptureMode,
        retain_nulls: bool,
        session: Arc<SessionShared>,
        sink: MessageSink,
        sensor_ip: Ipv4Addr,
    ) -> Self {
        let shared = Arc::new(CaptureShared::new());
        let worker = Arc::clone(&shared);
        let thread = thread::spawn(move || {
            run(
                &data_socket,
                &imu_socket,
                mode,
                retain_nulls,
                &worker,
                &session,
                &sink,
                sensor_ip,
            );
        });
        Self {
            shared,
            thread: Some(thread),
        }
    }

    /// Arms the consuming task to start writing.
    pub(crate) fn arm(
        &self,
        path: PathBuf,
        wait_secs: f64,
        duration_secs: f64,
        firmware: FirmwareKind,
    ) {
        {
            let mut job = self.shared.job.lock().unwrap_or_else(PoisonError::into_inner);
            *job = Some(WriteJob {
                path,
                wait_secs,
                duration_secs,
                firmware,
            });
        }
        self.shared
            .indefinite
            .store(duration_secs <= 0.0, Ordering::Release);
        self.shared.capturing.store(true, Ordering::Release);
    }

    pub(crate) fn stop(&mut self) {
        self.shared.started.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _joined = thread.join();
        }
    }

    /// Finished, or armed with an indefinite duration, or never armed.
    pub(crate) fn done(&self) -> bool {
        self.shared.indefinite.load(Ordering::Acquire) || !self.shared.running()
    }

    pub(crate) fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            good: self.shared.good.load(Ordering::Acquire),
            null: self.shared.null.load(Ordering::Acquire),
            imu_records: self.shared.imu_records.load(Ordering::Acquire),
            dropped: self.shared.dropped.load(Ordering::Acquire),
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[expect(clippy::too_many_arguments, reason = "internal thread entry point")]
fn run(
    data_socket: &UdpSocket,
    imu_socket: &UdpSocket,
    mode: CaptureMode,
    retain_nulls: bool,
    shared: &CaptureShared,
    session: &SessionShared,
    sink: &MessageSink,
    sensor_ip: Ipv4Addr,
) {
    let mut buf = [0_u8; 1500];

    // consume the stream until a write job arms the task
    let (mut start_time, data_type) = loop {
        if !shared.running() {
            shared.finished.store(true, Ordering::Release);
            return;
        }
        match net::try_recv(data_socket, &mut buf) {
            Ok(Some(len)) => match PacketHeader::parse(&buf[..len]) {
                Ok((header, _)) => {
                    shared
                        .data_type
                        .store(header.data_type as i8, Ordering::Release);
                    session.update_health(header.status);
                    if shared.capturing.load(Ordering::Acquire) {
                        break (header.timestamp, header.data_type);
                    }
                }
                Err(err) => {
                    shared.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!(%err, "dropped point packet");
                }
            },
            Ok(None) => thread::sleep(POLL_YIELD),
            Err(err) => {
                warn!(%err, "data socket receive failed");
                thread::sleep(POLL_YIELD);
            }
        }
    };

    let Some(job) = shared
        .job
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
    else {
        shared.finished.store(true, Ordering::Release);
        return;
    };

    // wait phase, measured in sensor time
    let mut current = start_time;
    loop {
        if !shared.running() {
            shared.finished.store(true, Ordering::Release);
            return;
        }
        if current - start_time > job.wait_secs {
            start_time = current;
            break;
        }
        let mut progressed = false;
        if let Ok(Some(len)) = net::try_recv(data_socket, &mut buf) {
            progressed = true;
            match PacketHeader::parse(&buf[..len]) {
                Ok((header, _)) => {
                    current = header.timestamp;
                    session.update_health(header.status);
                }
                Err(_) => {
                    shared.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        if let Ok(Some(_)) = net::try_recv(imu_socket, &mut buf) {
            progressed = true;
        }
        if !progressed {
            thread::sleep(POLL_YIELD);
        }
    }

    sink.note(sensor_ip, "CAPTURING DATA...");

    let indefinite = job.duration_secs <= 0.0;
    let mut duration = if indefinite {
        INDEFINITE_SECS
    } else {
        job.duration_secs
    };
    if !indefinite {
        duration += job.firmware.duration_bias() * (duration / 2.0);
    }

    let label = match mode {
        CaptureMode::Binary => "BINARY",
        CaptureMode::RealtimeCsv | CaptureMode::BufferedCsv => "ASCII",
    };
    sink.note(
        sensor_ip,
        &format!(
            "writing real-time data to {label} file: {}",
            job.path.display()
        ),
    );

    let mut writer = match open_writer(&job, mode, data_type) {
        Ok(writer) => writer,
        Err(err) => {
            warn!(%err, "could not open capture output, capture terminated");
            sink.note(sensor_ip, "* ISSUE: cannot create output file *");
            shared.finished.store(true, Ordering::Release);
            shared.capturing.store(false, Ordering::Release);
            shared.started.store(false, Ordering::Release);
            return;
        }
    };
    let mut imu_out: Option<BufWriter<File>> = None;

    let mut good = 0_u64;
    let mut null = 0_u64;
    let mut imu_records = 0_u64;
    let mut timestamp = start_time;

    while shared.running() {
        if timestamp - start_time > duration {
            break;
        }
        let mut progressed = false;

        match net::try_recv(data_socket, &mut buf) {
            Ok(Some(len)) => {
                progressed = true;
                match PacketHeader::parse(&buf[..len]) {
                    Ok((header, body)) if header.data_type == data_type => {
                        session.update_health(header.status);
                        timestamp = header.timestamp;
                        match process_packet(
                            &mut writer,
                            job.firmware,
                            data_type,
                            retain_nulls,
                            header.timestamp,
                            body,
                        ) {
                            Ok((packet_good, packet_null)) => {
                                good += packet_good;
                                null += packet_null;
                            }
                            Err(err) => {
                                warn!(%err, "write failed, capture terminated");
                                break;
                            }
                        }
                    }
                    Ok(_) | Err(_) => {
                        shared.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Ok(None) => {}
            Err(err) => warn!(%err, "data socket receive failed"),
        }

        if mode == CaptureMode::Binary {
            if let Ok(Some(len)) = net::try_recv(imu_socket, &mut buf) {
                progressed = true;
                if let Ok((header, body)) = PacketHeader::parse(&buf[..len]) {
                    if header.data_type == DataType::Imu && body.len() >= 24 {
                        timestamp = header.timestamp;
                        match write_imu_record(
                            &mut imu_out,
                            &job.path,
                            &body[..24],
                            header.timestamp,
                        ) {
                            Ok(()) => imu_records += 1,
                            Err(err) => {
                                warn!(%err, "IMU write failed, capture terminated");
                                break;
                            }
                        }
                    }
                } else {
                    shared.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        if progressed {
            if mode == CaptureMode::RealtimeCsv {
                if let Err(err) = writer.flush() {
                    warn!(%err, "flush failed, capture terminated");
                    break;
                }
            }
        } else {
            thread::sleep(POLL_YIELD);
        }
    }

    if let Err(err) = writer.flush() {
        warn!(%err, "final flush failed");
    }
    if let Some(mut imu_writer) = imu_out {
        if let Err(err) = imu_writer.flush() {
            warn!(%err, "final IMU flush failed");
        }
    }

    shared.good.store(good, Ordering::Release);
    shared.null.store(null, Ordering::Release);
    shared.imu_records.store(imu_records, Ordering::Release);
    shared.finished.store(true, Ordering::Release);
    shared.capturing.store(false, Ordering::Release);
    shared.started.store(false, Ordering::Release);

    sink.note(
        sensor_ip,
        &format!("closed {label} file: {}", job.path.display()),
    );
    sink.emit(&format!(
        "                                (points: {good} good, {null} null, {} total)",
        good + null
    ));
    if imu_records > 0 {
        sink.emit(&format!(
            "                                (IMU records: {imu_records})"
        ));
    }
}

fn open_writer(
    job: &WriteJob,
    mode: CaptureMode,
    data_type: DataType,
) -> io::Result<RecordWriter<BufWriter<File>>> {
    let mut out = BufWriter::new(File::create(&job.path)?);
    match mode {
        CaptureMode::Binary => {
            container::write_point_preamble(&mut out, job.firmware, data_type)?;
            Ok(RecordWriter::Binary(out))
        }
        CaptureMode::RealtimeCsv | CaptureMode::BufferedCsv => {
            let include_return =
                job.firmware != FirmwareKind::SingleReturn || data_type.has_tag();
            writeln!(out, "{}", container::csv_header(job.firmware, data_type, false))?;
            Ok(RecordWriter::Csv {
                out,
                data_type,
                include_return,
            })
        }
    }
}

fn write_imu_record(
    imu_out: &mut Option<BufWriter<File>>,
    point_path: &std::path::Path,
    sample: &[u8],
    time: f64,
) -> io::Result<()> {
    if imu_out.is_none() {
        let path = container::sibling_path(point_path, "_IMU");
        let mut created = BufWriter::new(File::create(path)?);
        created.write_all(container::IMU_MAGIC)?;
        *imu_out = Some(created);
    }
    let Some(out) = imu_out.as_mut() else {
        unreachable!("writer was just created");
    };
    out.write_all(sample)?;
    out.write_all(&time.to_le_bytes())
}

/// Destination of decoded capture records.
pub(crate) enum RecordWriter<W: Write> {
    Binary(W),
    Csv {
        out: W,
        data_type: DataType,
        include_return: bool,
    },
}

impl<W: Write> RecordWriter<W> {
    /// Writes one point: raw record bytes, synthesized time, and, when the
    /// layout carries one, the return marker.
    pub(crate) fn point(&mut self, record: &[u8], time: f64, marker: Option<u8>) -> io::Result<()> {
        match self {
            RecordWriter::Binary(out) => {
                out.write_all(record)?;
                out.write_all(&time.to_le_bytes())?;
                if let Some(marker) = marker {
                    out.write_all(&[b'0' + marker])?;
                }
                Ok(())
            }
            RecordWriter::Csv {
                out,
                data_type,
                include_return,
            } => container::write_csv_row(
                out,
                *data_type,
                record,
                time,
                marker.unwrap_or(1),
                *include_return,
            ),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            RecordWriter::Binary(out) | RecordWriter::Csv { out, .. } => out.flush(),
        }
    }
}

/// Interval between consecutive per-point (or per-group) timestamps.
fn point_spacing(firmware: FirmwareKind, data_type: DataType) -> f64 {
    match data_type {
        DataType::CartesianMid | DataType::SphericalMid => match firmware {
            FirmwareKind::SingleReturn | FirmwareKind::DualReturn => 0.000_01,
            FirmwareKind::TripleReturn => 0.000_016_666,
        },
        DataType::CartesianSingle | DataType::SphericalSingle => 0.000_004_167,
        DataType::CartesianDual | DataType::SphericalDual => 0.000_002_083,
        DataType::Imu => 0.0,
    }
}

/// Returns per timestamp step on the plain Mid layouts.
fn return_group(firmware: FirmwareKind, data_type: DataType) -> usize {
    match data_type {
        DataType::CartesianMid | DataType::SphericalMid => match firmware {
            FirmwareKind::SingleReturn => 1,
            FirmwareKind::DualReturn => 2,
            FirmwareKind::TripleReturn => 3,
        },
        _ => 1,
    }
}

/// Decodes one packet's points, synthesizes per-point times, applies the
/// null filter, and hands surviving records to the writer.
///
/// The packet timestamp belongs to the first point: the running time starts
/// one spacing below it and is incremented before each group is emitted.
/// Returns `(good, null)` counts.
pub(crate) fn process_packet<W: Write>(
    writer: &mut RecordWriter<W>,
    firmware: FirmwareKind,
    data_type: DataType,
    retain_nulls: bool,
    packet_time: f64,
    points: &[u8],
) -> io::Result<(u64, u64)> {
    let spacing = point_spacing(firmware, data_type);
    let mut time = packet_time - spacing;
    let mut good = 0_u64;
    let mut null = 0_u64;

    match data_type {
        DataType::CartesianMid | DataType::CartesianSingle => {
            let group = return_group(firmware, data_type);
            let with_tag = data_type.has_tag();
            let multi = group > 1;
            for (index, record) in points.chunks_exact(data_type.record_len()).enumerate() {
                if index % group == 0 {
                    time += spacing;
                }
                let (point, _) = CartesianPoint::parse(record, with_tag)
                    .unwrap_or_else(|_| unreachable!("chunk length equals the record length"));
                let keep = !point.is_null()
                    || (retain_nulls && data_type == DataType::CartesianMid);
                if keep {
                    let marker = multi.then(|| (index % group) as u8 + 1);
                    writer.point(record, time, marker)?;
                    good += 1;
                } else {
                    null += 1;
                }
            }
        }
        DataType::SphericalMid | DataType::SphericalSingle => {
            let group = return_group(firmware, data_type);
            let with_tag = data_type.has_tag();
            let multi = group > 1;
            for (index, record) in points.chunks_exact(data_type.record_len()).enumerate() {
                if index % group == 0 {
                    time += spacing;
                }
                let (point, _) = SphericalPoint::parse(record, with_tag)
                    .unwrap_or_else(|_| unreachable!("chunk length equals the record length"));
                if point.is_null() {
                    null += 1;
                } else {
                    let marker = multi.then(|| (index % group) as u8 + 1);
                    writer.point(record, time, marker)?;
                    good += 1;
                }
            }
        }
        DataType::CartesianDual => {
            for record in points.chunks_exact(28) {
                time += spacing;
                for (half, sub) in record.chunks_exact(14).enumerate() {
                    let (point, _) = CartesianPoint::parse(sub, true)
                        .unwrap_or_else(|_| unreachable!("half of a dual record is 14 bytes"));
                    if point.is_null() {
                        null += 1;
                    } else {
                        writer.point(sub, time, Some(half as u8 + 1))?;
                        good += 1;
                    }
                }
            }
        }
        DataType::SphericalDual => {
            for record in points.chunks_exact(16) {
                time += spacing;
                let angles = &record[..4];
                for (half, start) in [(1_u8, 4_usize), (2, 10)] {
                    let mut sub = [0_u8; 10];
                    sub[..4].copy_from_slice(&record[start..start + 4]);
                    sub[4..8].copy_from_slice(angles);
                    sub[8] = record[start + 4];
                    sub[9] = record[start + 5];
                    let (point, _) = SphericalPoint::parse(&sub, true)
                        .unwrap_or_else(|_| unreachable!("rebuilt record is 10 bytes"));
                    if point.is_null() {
                        null += 1;
                    } else {
                        writer.point(&sub, time, Some(half))?;
                        good += 1;
                    }
                }
            }
        }
        DataType::Imu => {}
    }

    Ok((good, null))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cartesian_record(x: i32, y: i32, z: i32, intensity: u8) -> Vec<u8> {
        let mut record = Vec::new();
        record.extend_from_slice(&x.to_le_bytes());
        record.extend_from_slice(&y.to_le_bytes());
        record.extend_from_slice(&z.to_le_bytes());
        record.push(intensity);
        record
    }

    #[test]
    fn single_return_points_get_ten_microsecond_spacing() {
        let mut points = Vec::new();
        for index in 0..3_i32 {
            points.extend_from_slice(&cartesian_record(1000 + index, 2000, 3000, 42));
        }
        let mut writer = RecordWriter::Binary(Vec::new());
        let (good, null) = process_packet(
            &mut writer,
            FirmwareKind::SingleReturn,
            DataType::CartesianMid,
            false,
            10.0,
            &points,
        )
        .expect("in-memory writer");
        assert_eq!((good, null), (3, 0));
        let RecordWriter::Binary(bytes) = writer else {
            unreachable!("constructed as binary");
        };
        assert_eq!(bytes.len(), 3 * 21);
        let time_of = |record: usize| {
            let offset = record * 21 + 13;
            f64::from_le_bytes(bytes[offset..offset + 8].try_into().expect("8 bytes"))
        };
        // the packet timestamp belongs to the first point
        assert!((time_of(0) - 10.0).abs() < 1e-12);
        assert!((time_of(1) - 10.000_01).abs() < 1e-9);
        assert!((time_of(2) - 10.000_02).abs() < 1e-9);
        assert!(time_of(0) <= time_of(1) && time_of(1) <= time_of(2));
    }

    #[test]
    fn null_points_are_counted_but_not_written() {
        let mut points = Vec::new();
        points.extend_from_slice(&cartesian_record(0, 0, 0, 0));
        points.extend_from_slice(&cartesian_record(1000, 2000, 3000, 7));
        let mut writer = RecordWriter::Binary(Vec::new());
        let (good, null) = process_packet(
            &mut writer,
            FirmwareKind::SingleReturn,
            DataType::CartesianMid,
            false,
            1.0,
            &points,
        )
        .expect("in-memory writer");
        assert_eq!((good, null), (1, 1));
        let RecordWriter::Binary(bytes) = writer else {
            unreachable!("constructed as binary");
        };
        assert_eq!(bytes.len(), 21);
    }

    #[test]
    fn composite_units_retain_cartesian_nulls() {
        let points = cartesian_record(0, 0, 0, 0);
        let mut writer = RecordWriter::Binary(Vec::new());
        let (good, null) = process_packet(
            &mut writer,
            FirmwareKind::SingleReturn,
            DataType::CartesianMid,
            true,
            1.0,
            &points,
        )
        .expect("in-memory writer");
        assert_eq!((good, null), (1, 0));
    }

    #[test]
    fn dual_firmware_pairs_share_a_timestamp_and_carry_markers() {
        let mut points = Vec::new();
        for index in 0..4_i32 {
            points.extend_from_slice(&cartesian_record(100 + index, 1, 1, 9));
        }
        let mut writer = RecordWriter::Binary(Vec::new());
        let (good, _) = process_packet(
            &mut writer,
            FirmwareKind::DualReturn,
            DataType::CartesianMid,
            false,
            5.0,
            &points,
        )
        .expect("in-memory writer");
        assert_eq!(good, 4);
        let RecordWriter::Binary(bytes) = writer else {
            unreachable!("constructed as binary");
        };
        assert_eq!(bytes.len(), 4 * 22);
        let record = |index: usize| &bytes[index * 22..(index + 1) * 22];
        assert_eq!(record(0)[21], b'1');
        assert_eq!(record(1)[21], b'2');
        assert_eq!(record(2)[21], b'1');
        assert_eq!(record(3)[21], b'2');
        let time = |index: usize| {
            f64::from_le_bytes(record(index)[13..21].try_into().expect("8 bytes"))
        };
        assert!((time(0) - time(1)).abs() < 1e-12, "pair shares one time");
        assert!((time(2) - (time(0) + 0.000_01)).abs() < 1e-9);
    }

    #[test]
    fn dual_return_packets_split_into_marked_records() {
        let mut points = Vec::new();
        for _ in 0..2 {
            let mut first = cartesian_record(500, 600, 700, 1);
            first.push(0x04);
            let mut second = cartesian_record(501, 601, 701, 2);
            second.push(0x08);
            points.extend_from_slice(&first);
            points.extend_from_slice(&second);
        }
        let mut writer = RecordWriter::Binary(Vec::new());
        let (good, null) = process_packet(
            &mut writer,
            FirmwareKind::SingleReturn,
            DataType::CartesianDual,
            false,
            2.0,
            &points,
        )
        .expect("in-memory writer");
        assert_eq!((good, null), (4, 0));
        let RecordWriter::Binary(bytes) = writer else {
            unreachable!("constructed as binary");
        };
        // stored per return: 14 raw + 8 time + 1 marker
        assert_eq!(bytes.len(), 4 * 23);
        assert_eq!(bytes[22], b'1');
        assert_eq!(bytes[45], b'2');
        let first_time = f64::from_le_bytes(bytes[14..22].try_into().expect("8 bytes"));
        let second_time = f64::from_le_bytes(bytes[37..45].try_into().expect("8 bytes"));
        assert!((first_time - second_time).abs() < 1e-12, "pair shares one time");
        assert!((first_time - 2.0).abs() < 1e-9);
    }

    #[test]
    fn shared_angle_dual_records_are_rebuilt_per_return() {
        let mut record = Vec::new();
        record.extend_from_slice(&4500_u16.to_le_bytes()); // zenith
        record.extend_from_slice(&9000_u16.to_le_bytes()); // azimuth
        record.extend_from_slice(&1500_u32.to_le_bytes()); // first depth
        record.push(11);
        record.push(0x04);
        record.extend_from_slice(&0_u32.to_le_bytes()); // second return missing
        record.push(0);
        record.push(0);
        let mut writer = RecordWriter::Binary(Vec::new());
        let (good, null) = process_packet(
            &mut writer,
            FirmwareKind::SingleReturn,
            DataType::SphericalDual,
            false,
            3.0,
            &record,
        )
        .expect("in-memory writer");
        assert_eq!((good, null), (1, 1));
        let RecordWriter::Binary(bytes) = writer else {
            unreachable!("constructed as binary");
        };
        assert_eq!(bytes.len(), 19);
        assert_eq!(&bytes[..4], &1500_u32.to_le_bytes());
        assert_eq!(&bytes[4..6], &4500_u16.to_le_bytes());
        assert_eq!(&bytes[6..8], &9000_u16.to_le_bytes());
        assert_eq!(bytes[8], 11);
        assert_eq!(bytes[9], 0x04);
        assert_eq!(bytes[18], b'1');
    }

    #[test]
    fn timestamps_never_decrease_within_a_packet() {
        let mut points = Vec::new();
        for index in 0..96_i32 {
            let mut record = cartesian_record(index + 1, 2, 3, 4);
            record.push(0);
            points.extend_from_slice(&record);
        }
        let mut writer = RecordWriter::Binary(Vec::new());
        process_packet(
            &mut writer,
            FirmwareKind::SingleReturn,
            DataType::CartesianSingle,
            false,
            100.0,
            &points,
        )
        .expect("in-memory writer");
        let RecordWriter::Binary(bytes) = writer else {
            unreachable!("constructed as binary");
        };
        let stride = 22;
        let mut previous = f64::MIN;
        for index in 0..96 {
            let offset = index * stride + 14;
            let time =
                f64::from_le_bytes(bytes[offset..offset + 8].try_into().expect("8 bytes"));
            assert!(time >= previous, "record {index} went backwards");
            previous = time;
        }
    }
}
