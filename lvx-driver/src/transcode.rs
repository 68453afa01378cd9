use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use chrono::{Datelike, Utc};
use lvx_protocol::imu::ImuSample;
use lvx_protocol::point::CartesianPoint;
use tracing::info;

use crate::container::{self, ImuContainerReader, PointContainerReader};
use crate::error::{Error, Result};

/// Counts of one transcoding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TranscodeSummary {
    pub points: u64,
    pub imu_records: u64,
}

impl TranscodeSummary {
    fn absorb(&mut self, other: TranscodeSummary) {
        self.points += other.points;
        self.imu_records += other.imu_records;
    }
}

/// Converts a point container (and its `_M`/`_R`/`_IMU` siblings, when they
/// exist) to delimited text. Output lands next to the input with `.csv`
/// appended.
///
/// # Errors
///
/// `Configuration` when the file is not a container; I/O errors otherwise.
pub fn convert_bin_to_csv(path: impl AsRef<Path>, delete_bin: bool) -> Result<TranscodeSummary> {
    let path = path.as_ref();
    let mut summary = csv_one(path, delete_bin)?;
    for suffix in ["_M", "_R"] {
        let sibling = container::sibling_path(path, suffix);
        if sibling.is_file() {
            summary.absorb(csv_one(&sibling, delete_bin)?);
        }
    }
    Ok(summary)
}

fn csv_one(path: &Path, delete_bin: bool) -> Result<TranscodeSummary> {
    let mut reader = PointContainerReader::open(path)?;
    let csv_path = append_extension(path, "csv");
    let mut out = BufWriter::new(File::create(&csv_path)?);
    writeln!(
        out,
        "{}",
        container::csv_header(reader.firmware, reader.data_type, true)
    )?;
    let mut points = 0_u64;
    while let Some(record) = reader.next_record()? {
        container::write_csv_row(
            &mut out,
            reader.data_type,
            &record.raw,
            record.time,
            record.return_num,
            true,
        )?;
        points += 1;
    }
    out.flush()?;
    info!(path = %csv_path.display(), points, "point data converted to CSV");
    if delete_bin {
        fs::remove_file(path)?;
    }
    let imu_records = imu_sibling_to_csv(path, delete_bin)?;
    Ok(TranscodeSummary {
        points,
        imu_records,
    })
}

/// Converts a Cartesian point container (and siblings) to LAS 1.2, point
/// data format 3. Spherical containers are rejected before any output file
/// exists. The IMU sibling, when present, converts to CSV alongside.
///
/// # Errors
///
/// `Configuration` for non-Cartesian or empty containers; I/O errors
/// otherwise.
pub fn convert_bin_to_las(path: impl AsRef<Path>, delete_bin: bool) -> Result<TranscodeSummary> {
    let path = path.as_ref();
    let mut summary = las_one(path, delete_bin)?;
    for suffix in ["_M", "_R"] {
        let sibling = container::sibling_path(path, suffix);
        if sibling.is_file() {
            summary.absorb(las_one(&sibling, delete_bin)?);
        }
    }
    Ok(summary)
}

struct LasPoint {
    x: f64,
    y: f64,
    z: f64,
    intensity: u16,
    return_num: u8,
    gps_time: f64,
}

fn las_one(path: &Path, delete_bin: bool) -> Result<TranscodeSummary> {
    let mut reader = PointContainerReader::open(path)?;
    if !reader.data_type.is_cartesian() {
        return Err(Error::Configuration(
            "only Cartesian point data can be converted to an LAS file".to_owned(),
        ));
    }

    let with_tag = reader.data_type.has_tag();
    let mut points = Vec::new();
    while let Some(record) = reader.next_record()? {
        let (point, _) = CartesianPoint::parse(&record.raw, with_tag)?;
        points.push(LasPoint {
            x: point.x_m(),
            y: point.y_m(),
            z: point.z_m(),
            intensity: u16::from(point.intensity),
            return_num: record.return_num,
            gps_time: record.time,
        });
    }
    if points.is_empty() {
        return Err(Error::Configuration(format!(
            "{} contains no point records",
            path.display()
        )));
    }

    let las_path = append_extension(path, "las");
    write_las(&las_path, &points)?;
    info!(path = %las_path.display(), points = points.len(), "point data converted to LAS");
    if delete_bin {
        fs::remove_file(path)?;
    }
    let imu_records = imu_sibling_to_csv(path, delete_bin)?;
    Ok(TranscodeSummary {
        points: points.len() as u64,
        imu_records,
    })
}

fn imu_sibling_to_csv(point_path: &Path, delete_bin: bool) -> Result<u64> {
    let imu_path = container::sibling_path(point_path, "_IMU");
    if !imu_path.is_file() {
        return Ok(0);
    }
    let mut reader = ImuContainerReader::open(&imu_path)?;
    let csv_path = append_extension(&imu_path, "csv");
    let mut out = BufWriter::new(File::create(csv_path)?);
    writeln!(out, "{}", container::IMU_CSV_HEADER)?;
    let mut records = 0_u64;
    while let Some((raw, time)) = reader.next_record()? {
        let (sample, _) = ImuSample::parse(&raw)?;
        writeln!(
            out,
            "{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            sample.gyro[0],
            sample.gyro[1],
            sample.gyro[2],
            sample.accel[0],
            sample.accel[1],
            sample.accel[2],
            time
        )?;
        records += 1;
    }
    out.flush()?;
    if delete_bin {
        fs::remove_file(&imu_path)?;
    }
    Ok(records)
}

fn append_extension(path: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

const LAS_SCALE: f64 = 0.001;
const LAS_HEADER_SIZE: u16 = 227;
const LAS_RECORD_LEN: u16 = 34;

fn write_las(path: &Path, points: &[LasPoint]) -> io::Result<()> {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    let mut by_return = [0_u32; 5];
    for point in points {
        for (axis, value) in [point.x, point.y, point.z].into_iter().enumerate() {
            min[axis] = min[axis].min(value);
            max[axis] = max[axis].max(value);
        }
        let slot = usize::from(point.return_num.clamp(1, 5)) - 1;
        by_return[slot] += 1;
    }
    let offset = [min[0].floor(), min[1].floor(), min[2].floor()];

    let today = Utc::now();
    let mut header = BytesMut::with_capacity(usize::from(LAS_HEADER_SIZE));
    header.put_slice(b"LASF");
    header.put_u16_le(0); // file source id
    header.put_u16_le(0); // global encoding
    header.put_slice(&[0_u8; 16]); // project guid
    header.put_u8(1);
    header.put_u8(2); // version 1.2
    header.put_slice(&pad32("OpenPyLivox"));
    header.put_slice(&pad32("OpenPyLivox V1.1.0"));
    header.put_u16_le(today.ordinal() as u16);
    header.put_u16_le(today.year() as u16);
    header.put_u16_le(LAS_HEADER_SIZE);
    header.put_u32_le(u32::from(LAS_HEADER_SIZE)); // offset to point data
    header.put_u32_le(0); // no variable length records
    header.put_u8(3); // point data format: gps time + rgb
    header.put_u16_le(LAS_RECORD_LEN);
    header.put_u32_le(points.len() as u32);
    for count in by_return {
        header.put_u32_le(count);
    }
    for _ in 0..3 {
        header.put_f64_le(LAS_SCALE);
    }
    for value in offset {
        header.put_f64_le(value);
    }
    for axis in 0..3 {
        header.put_f64_le(max[axis]);
        header.put_f64_le(min[axis]);
    }
    debug_assert_eq!(header.len(), usize::from(LAS_HEADER_SIZE));

    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(&header)?;
    let mut record = BytesMut::with_capacity(usize::from(LAS_RECORD_LEN));
    for point in points {
        record.clear();
        record.put_i32_le(((point.x - offset[0]) / LAS_SCALE).round() as i32);
        record.put_i32_le(((point.y - offset[1]) / LAS_SCALE).round() as i32);
        record.put_i32_le(((point.z - offset[2]) / LAS_SCALE).round() as i32);
        record.put_u16_le(point.intensity);
        record.put_u8(point.return_num & 0x07);
        record.put_u8(0); // classification
        record.put_i8(0); // scan angle rank
        record.put_u8(0); // user data
        record.put_u16_le(0); // point source id
        record.put_f64_le(point.gps_time);
        record.put_u16_le(0); // red
        record.put_u16_le(0); // green
        record.put_u16_le(0); // blue
        out.write_all(&record)?;
    }
    out.flush()
}

fn pad32(text: &str) -> [u8; 32] {
    let mut padded = [b' '; 32];
    padded[..text.len()].copy_from_slice(text.as_bytes());
    padded
}
