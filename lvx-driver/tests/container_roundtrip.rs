//! Container-format and transcoder checks on hand-built capture files.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use lvx_driver::{
    DataType, FirmwareKind, IMU_MAGIC, POINT_MAGIC, PointContainerReader, convert_bin_to_csv,
    convert_bin_to_las, record_stride,
};

fn write_dt0_container(path: &Path, points: &[(i32, i32, i32, u8, f64)]) -> Result<()> {
    let mut out = File::create(path)?;
    out.write_all(POINT_MAGIC)?;
    out.write_all(&1_i16.to_le_bytes())?;
    out.write_all(&0_i16.to_le_bytes())?;
    for &(x, y, z, intensity, time) in points {
        out.write_all(&x.to_le_bytes())?;
        out.write_all(&y.to_le_bytes())?;
        out.write_all(&z.to_le_bytes())?;
        out.write_all(&[intensity])?;
        out.write_all(&time.to_le_bytes())?;
    }
    Ok(())
}

fn write_dt1_container(path: &Path, records: usize) -> Result<()> {
    let mut out = File::create(path)?;
    out.write_all(POINT_MAGIC)?;
    out.write_all(&1_i16.to_le_bytes())?;
    out.write_all(&1_i16.to_le_bytes())?;
    for index in 0..records {
        out.write_all(&(1000 + index as u32).to_le_bytes())?;
        out.write_all(&4500_u16.to_le_bytes())?;
        out.write_all(&9000_u16.to_le_bytes())?;
        out.write_all(&[7])?;
        out.write_all(&(index as f64).to_le_bytes())?;
    }
    Ok(())
}

fn sample_points(count: usize) -> Vec<(i32, i32, i32, u8, f64)> {
    (0..count)
        .map(|index| {
            (
                1000 + index as i32,
                2000,
                3000,
                42,
                1.0 + index as f64 * 0.000_01,
            )
        })
        .collect()
}

#[test]
fn container_size_matches_the_stride_invariant() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scan.bin");
    let points = sample_points(250);
    write_dt0_container(&path, &points)?;

    let stride = record_stride(FirmwareKind::SingleReturn, DataType::CartesianMid);
    assert_eq!(stride, 21);
    assert_eq!(fs::metadata(&path)?.len(), 15 + (stride as u64) * 250);

    let mut reader = PointContainerReader::open(&path)?;
    assert_eq!(reader.firmware, FirmwareKind::SingleReturn);
    assert_eq!(reader.data_type, DataType::CartesianMid);
    let mut count = 0_usize;
    while let Some(record) = reader.next_record()? {
        assert_eq!(record.raw.len(), 13);
        assert_eq!(record.return_num, 1);
        assert!((record.time - points[count].4).abs() < 1e-12);
        count += 1;
    }
    assert_eq!(count, 250);
    Ok(())
}

#[test]
fn csv_conversion_recovers_the_point_count() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scan.bin");
    write_dt0_container(&path, &sample_points(100))?;

    let summary = convert_bin_to_csv(&path, false)?;
    assert_eq!(summary.points, 100);

    let csv = fs::read_to_string(dir.path().join("scan.bin.csv"))?;
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("//X,Y,Z,Inten-sity,Time,ReturnNum"),
        "transcoded output always carries the return column"
    );
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), 100);
    assert_eq!(rows[0], "1.000,2.000,3.000,42,1.000000,1");
    Ok(())
}

#[test]
fn csv_conversion_handles_imu_and_composite_siblings() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scan.bin");
    write_dt0_container(&path, &sample_points(10))?;
    write_dt0_container(&dir.path().join("scan_M.bin"), &sample_points(20))?;

    let mut imu = File::create(dir.path().join("scan_IMU.bin"))?;
    imu.write_all(IMU_MAGIC)?;
    for index in 0..3_u32 {
        for value in [0.1_f32, -0.2, 0.3, 9.8, 0.0, -9.8] {
            imu.write_all(&value.to_le_bytes())?;
        }
        imu.write_all(&f64::from(index).to_le_bytes())?;
    }
    drop(imu);

    let summary = convert_bin_to_csv(&path, false)?;
    assert_eq!(summary.points, 30, "the _M sibling converts alongside");
    assert_eq!(summary.imu_records, 3);

    let imu_csv = fs::read_to_string(dir.path().join("scan_IMU.bin.csv"))?;
    let mut lines = imu_csv.lines();
    assert_eq!(
        lines.next(),
        Some("//gyro_x,gyro_y,gyro_z,acc_x,acc_y,acc_z,time")
    );
    assert_eq!(lines.count(), 3);
    assert!(dir.path().join("scan_M.bin.csv").is_file());
    Ok(())
}

#[test]
fn las_conversion_writes_a_valid_1_2_header() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scan.bin");
    write_dt0_container(&path, &sample_points(40))?;

    let summary = convert_bin_to_las(&path, false)?;
    assert_eq!(summary.points, 40);

    let las = fs::read(dir.path().join("scan.bin.las"))?;
    assert_eq!(las.len(), 227 + 34 * 40);
    assert_eq!(&las[..4], b"LASF");
    assert_eq!(las[24], 1, "major version");
    assert_eq!(las[25], 2, "minor version");
    assert_eq!(&las[26..37], b"OpenPyLivox");
    assert_eq!(las[57], b' ', "system id is space-padded to 32 bytes");
    assert_eq!(las[104], 3, "point data format");
    assert_eq!(u16::from_le_bytes([las[105], las[106]]), 34);
    assert_eq!(u32::from_le_bytes([las[107], las[108], las[109], las[110]]), 40);
    assert_eq!(
        u32::from_le_bytes([las[111], las[112], las[113], las[114]]),
        40,
        "every record is a first return"
    );
    let scale = f64::from_le_bytes(las[131..139].try_into()?);
    assert!((scale - 0.001).abs() < 1e-15);

    // offsets are the floored minima (1, 2, 3), so the first record is the
    // origin and the second sits one scale step along x
    let first = &las[227..261];
    assert_eq!(i32::from_le_bytes(first[..4].try_into()?), 0);
    assert_eq!(i32::from_le_bytes(first[4..8].try_into()?), 0);
    let second = &las[261..295];
    assert_eq!(i32::from_le_bytes(second[..4].try_into()?), 1);
    assert_eq!(u16::from_le_bytes([first[12], first[13]]), 42);
    assert_eq!(first[14] & 0x07, 1, "return number lives in the flag byte");
    let gps_time = f64::from_le_bytes(first[20..28].try_into()?);
    assert!((gps_time - 1.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn las_conversion_rejects_spherical_containers_without_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("spherical.bin");
    write_dt1_container(&path, 5)?;

    let outcome = convert_bin_to_las(&path, false);
    assert!(matches!(outcome, Err(lvx_driver::Error::Configuration(_))));
    assert!(
        !dir.path().join("spherical.bin.las").exists(),
        "no output file may be created for a rejected container"
    );
    Ok(())
}
