use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use bytes::Buf;
use lvx_protocol::point::{CartesianPoint, DataType, SphericalPoint, Tag};

use crate::error::{Error, Result};
use crate::session::FirmwareKind;

/// Leading magic of a point container.
pub const POINT_MAGIC: &[u8; 11] = b"OPENPYLIVOX";

/// Leading magic of an IMU container.
pub const IMU_MAGIC: &[u8; 15] = b"OPENPYLIVOX_IMU";

/// Bytes one IMU record occupies on disk: 24 payload + 8 timestamp.
pub const IMU_RECORD_LEN: usize = 32;

/// Bytes one point record occupies on disk as stored by capture.
///
/// Dual layouts are stored per return (single-return shape), so every
/// record carries its own return marker.
#[must_use]
pub fn stored_record_len(data_type: DataType) -> usize {
    match data_type {
        DataType::CartesianMid => 13,
        DataType::SphericalMid => 9,
        DataType::CartesianSingle | DataType::CartesianDual => 14,
        DataType::SphericalSingle | DataType::SphericalDual => 10,
        DataType::Imu => 24,
    }
}

/// Whether records of this shape carry the trailing ASCII return marker.
#[must_use]
pub fn has_return_marker(firmware: FirmwareKind, data_type: DataType) -> bool {
    data_type.is_dual()
        || (firmware != FirmwareKind::SingleReturn
            && matches!(data_type, DataType::CartesianMid | DataType::SphericalMid))
}

/// Full on-disk stride of one record: point bytes, `f64` time, marker.
#[must_use]
pub fn record_stride(firmware: FirmwareKind, data_type: DataType) -> usize {
    stored_record_len(data_type) + 8 + usize::from(has_return_marker(firmware, data_type))
}

/// Derives `name<suffix>.ext` next to `path`, keeping the directory.
pub(crate) fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());
    name.push_str(suffix);
    if let Some(extension) = path.extension() {
        name.push('.');
        name.push_str(&extension.to_string_lossy());
    }
    path.with_file_name(name)
}

/// Writes the point container preamble: magic, firmware code, data type.
pub(crate) fn write_point_preamble<W: Write>(
    out: &mut W,
    firmware: FirmwareKind,
    data_type: DataType,
) -> io::Result<()> {
    out.write_all(POINT_MAGIC)?;
    out.write_all(&firmware.code().to_le_bytes())?;
    out.write_all(&i16::from(data_type as u8).to_le_bytes())
}

/// CSV header line for a point stream.
///
/// Live capture under single-return firmware omits the ReturnNum column on
/// the plain Mid layouts; transcoded output always carries it.
#[must_use]
pub fn csv_header(firmware: FirmwareKind, data_type: DataType, transcoded: bool) -> &'static str {
    let base_return =
        transcoded || firmware != FirmwareKind::SingleReturn || data_type.has_tag();
    match (data_type.is_cartesian(), data_type.has_tag(), base_return) {
        (true, true, _) => "//X,Y,Z,Inten-sity,Time,ReturnNum,ReturnType,sConf,iConf",
        (false, true, _) => "//Distance,Zenith,Azimuth,Inten-sity,Time,ReturnNum,ReturnType,sConf,iConf",
        (true, false, true) => "//X,Y,Z,Inten-sity,Time,ReturnNum",
        (true, false, false) => "//X,Y,Z,Inten-sity,Time",
        (false, false, true) => "//Distance,Zenith,Azimuth,Inten-sity,Time,ReturnNum",
        (false, false, false) => "//Distance,Zenith,Azimuth,Inten-sity,Time",
    }
}

/// Header line of the IMU CSV output.
pub const IMU_CSV_HEADER: &str = "//gyro_x,gyro_y,gyro_z,acc_x,acc_y,acc_z,time";

/// Writes one CSV point row: distances 3 dp, angles 2 dp, time 6 dp, and
/// the tag nibbles on tagged layouts.
pub(crate) fn write_csv_row<W: Write>(
    out: &mut W,
    data_type: DataType,
    record: &[u8],
    time: f64,
    return_num: u8,
    include_return: bool,
) -> io::Result<()> {
    let tagged = data_type.has_tag();
    let tag = if data_type.is_cartesian() {
        let (point, _) = CartesianPoint::parse(record, tagged).map_err(corrupt_record)?;
        write!(
            out,
            "{:.3},{:.3},{:.3},{},{:.6}",
            point.x_m(),
            point.y_m(),
            point.z_m(),
            point.intensity,
            time
        )?;
        point.tag
    } else {
        let (point, _) = SphericalPoint::parse(record, tagged).map_err(corrupt_record)?;
        write!(
            out,
            "{:.3},{:.2},{:.2},{},{:.6}",
            point.depth_m(),
            point.zenith_deg(),
            point.azimuth_deg(),
            point.intensity,
            time
        )?;
        point.tag
    };
    if include_return {
        write!(out, ",{return_num}")?;
    }
    if tagged {
        let tag = Tag(tag.unwrap_or_default());
        write!(
            out,
            ",{},{},{}",
            tag.return_type(),
            tag.spatial_confidence(),
            tag.intensity_confidence()
        )?;
    }
    writeln!(out)
}

fn corrupt_record(err: lvx_protocol::ProtocolError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err.to_string())
}

/// One record read back from a point container.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub raw: Vec<u8>,
    pub time: f64,
    pub return_num: u8,
}

/// Streaming reader over a point container.
pub struct PointContainerReader {
    reader: BufReader<File>,
    pub firmware: FirmwareKind,
    pub data_type: DataType,
}

impl PointContainerReader {
    /// Opens a container and validates its preamble.
    ///
    /// # Errors
    ///
    /// `Configuration` when the file is not a point container or declares
    /// an unusable firmware/data-type pair.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut magic = [0_u8; POINT_MAGIC.len()];
        reader.read_exact(&mut magic).map_err(|_| bad_container(path))?;
        if &magic != POINT_MAGIC {
            return Err(bad_container(path));
        }
        let mut codes = [0_u8; 4];
        reader.read_exact(&mut codes).map_err(|_| bad_container(path))?;
        let mut codes = codes.as_slice();
        let firmware_code = codes.get_i16_le();
        let data_type_code = codes.get_i16_le();
        let firmware = FirmwareKind::from_code(firmware_code).ok_or_else(|| {
            Error::Configuration(format!(
                "point container reports a wrong firmware type ({firmware_code})"
            ))
        })?;
        let data_type = u8::try_from(data_type_code)
            .ok()
            .and_then(|code| DataType::try_from(code).ok())
            .filter(|data_type| *data_type != DataType::Imu)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "point container reports a wrong data type ({data_type_code})"
                ))
            })?;
        Ok(Self {
            reader,
            firmware,
            data_type,
        })
    }

    /// Reads the next record; `None` at (possibly truncated) end of file.
    ///
    /// # Errors
    ///
    /// I/O errors other than end-of-file.
    pub fn next_record(&mut self) -> Result<Option<StoredRecord>> {
        let mut raw = vec![0_u8; stored_record_len(self.data_type)];
        match self.reader.read_exact(&mut raw) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let mut time = [0_u8; 8];
        match self.reader.read_exact(&mut time) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let return_num = if has_return_marker(self.firmware, self.data_type) {
            let mut marker = [0_u8; 1];
            match self.reader.read_exact(&mut marker) {
                Ok(()) => marker[0].wrapping_sub(b'0'),
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(err) => return Err(err.into()),
            }
        } else {
            1
        };
        Ok(Some(StoredRecord {
            raw,
            time: f64::from_le_bytes(time),
            return_num,
        }))
    }
}

/// Streaming reader over an IMU container.
pub struct ImuContainerReader {
    reader: BufReader<File>,
}

impl ImuContainerReader {
    /// Opens an IMU container and validates its magic.
    ///
    /// # Errors
    ///
    /// `Configuration` when the file is not an IMU container.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut magic = [0_u8; IMU_MAGIC.len()];
        reader.read_exact(&mut magic).map_err(|_| bad_imu_container(path))?;
        if &magic != IMU_MAGIC {
            return Err(bad_imu_container(path));
        }
        Ok(Self { reader })
    }

    /// Reads the next 24-byte sample plus timestamp; `None` at end of file.
    ///
    /// # Errors
    ///
    /// I/O errors other than end-of-file.
    pub fn next_record(&mut self) -> Result<Option<([u8; 24], f64)>> {
        let mut raw = [0_u8; 24];
        match self.reader.read_exact(&mut raw) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let mut time = [0_u8; 8];
        match self.reader.read_exact(&mut time) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        Ok(Some((raw, f64::from_le_bytes(time))))
    }
}

fn bad_container(path: &Path) -> Error {
    Error::Configuration(format!(
        "{} was not recognized as a point container",
        path.display()
    ))
}

fn bad_imu_container(path: &Path) -> Error {
    Error::Configuration(format!(
        "{} was not recognized as an IMU container",
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_match_the_stored_layouts() {
        let single = FirmwareKind::SingleReturn;
        let dual = FirmwareKind::DualReturn;
        assert_eq!(record_stride(single, DataType::CartesianMid), 21);
        assert_eq!(record_stride(dual, DataType::CartesianMid), 22);
        assert_eq!(record_stride(single, DataType::SphericalMid), 17);
        assert_eq!(record_stride(dual, DataType::SphericalMid), 18);
        assert_eq!(record_stride(single, DataType::CartesianSingle), 22);
        assert_eq!(record_stride(single, DataType::SphericalSingle), 18);
        assert_eq!(record_stride(single, DataType::CartesianDual), 23);
        assert_eq!(record_stride(single, DataType::SphericalDual), 19);
    }

    #[test]
    fn sibling_path_keeps_the_directory() {
        let path = Path::new("/tmp/scans/run1.bin");
        assert_eq!(
            sibling_path(path, "_IMU"),
            Path::new("/tmp/scans/run1_IMU.bin")
        );
        assert_eq!(sibling_path(path, "_M"), Path::new("/tmp/scans/run1_M.bin"));
    }

    #[test]
    fn csv_rows_use_fixed_precision() {
        let mut record = Vec::new();
        record.extend_from_slice(&1234_i32.to_le_bytes());
        record.extend_from_slice(&(-2000_i32).to_le_bytes());
        record.extend_from_slice(&500_i32.to_le_bytes());
        record.push(42);
        let mut out = Vec::new();
        write_csv_row(&mut out, DataType::CartesianMid, &record, 12.5, 1, false)
            .expect("row fits in memory");
        assert_eq!(
            String::from_utf8(out).expect("ascii row"),
            "1.234,-2.000,0.500,42,12.500000\n"
        );
    }

    #[test]
    fn tagged_csv_rows_append_tag_nibbles() {
        let mut record = Vec::new();
        record.extend_from_slice(&1000_u32.to_le_bytes());
        record.extend_from_slice(&4500_u16.to_le_bytes());
        record.extend_from_slice(&9000_u16.to_le_bytes());
        record.push(9);
        record.push(0b1001_0100); // spatial 2, intensity 1, return type 1
        let mut out = Vec::new();
        write_csv_row(&mut out, DataType::SphericalSingle, &record, 0.25, 1, true)
            .expect("row fits in memory");
        assert_eq!(
            String::from_utf8(out).expect("ascii row"),
            "1.000,45.00,90.00,9,0.250000,1,1,2,1\n"
        );
    }
}
