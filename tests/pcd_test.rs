use mask_to_pointcloud::SyncError;
use mask_to_pointcloud::pcd::{PcdDecoder, parse_pcd, write_ascii_pcd};
use mask_to_pointcloud::store::PointCloudDecoder;
use nalgebra as na;
use tempfile::TempDir;

#[test]
fn test_ascii_pcd() {
    let text = "# .PCD v0.7\nVERSION 0.7\nFIELDS x y z intensity\nSIZE 4 4 4 4\nTYPE F F F F\n\
                COUNT 1 1 1 1\nWIDTH 3\nHEIGHT 1\nVIEWPOINT 0 0 0 1 0 0 0\nPOINTS 3\nDATA ascii\n\
                1 2 3 0.5\n-1.5 0 2.25 1\nnan nan nan 0\n";
    let points = parse_pcd(text.as_bytes()).unwrap();
    assert_eq!(points.len(), 3);
    assert_eq!(points[0], na::Point3::new(1.0, 2.0, 3.0));
    assert_eq!(points[1], na::Point3::new(-1.5, 0.0, 2.25));
    // nan rows stay so indices match the file
    assert!(points[2].x.is_nan());
}

#[test]
fn test_binary_pcd() {
    let mut bytes = b"VERSION 0.7\nFIELDS intensity x y z\nSIZE 2 4 4 8\nTYPE U F F F\n\
                      COUNT 1 1 1 1\nWIDTH 2\nHEIGHT 1\nPOINTS 2\nDATA binary\n"
        .to_vec();
    for (i, (x, y, z)) in [(1.0f32, 2.0f32, 3.0f64), (4.0, 5.0, 6.0)].iter().enumerate() {
        bytes.extend_from_slice(&(i as u16).to_le_bytes());
        bytes.extend_from_slice(&x.to_le_bytes());
        bytes.extend_from_slice(&y.to_le_bytes());
        bytes.extend_from_slice(&z.to_le_bytes());
    }
    let points = parse_pcd(&bytes).unwrap();
    assert_eq!(
        points,
        vec![na::Point3::new(1.0, 2.0, 3.0), na::Point3::new(4.0, 5.0, 6.0)]
    );
}

#[test]
fn test_binary_pcd_truncated() {
    let mut bytes =
        b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 2\nHEIGHT 1\nDATA binary\n".to_vec();
    bytes.extend_from_slice(&[0u8; 12]);
    assert!(parse_pcd(&bytes).is_err());
}

#[test]
fn test_rejects_compressed_and_missing_fields() {
    let compressed = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nPOINTS 0\nDATA binary_compressed\n";
    assert!(parse_pcd(compressed.as_bytes()).is_err());

    let no_z = "FIELDS x y\nSIZE 4 4\nTYPE F F\nPOINTS 1\nDATA ascii\n1 2\n";
    assert!(parse_pcd(no_z.as_bytes()).is_err());

    assert!(parse_pcd(b"VERSION 0.7\n").is_err());
}

#[test]
fn test_decoder_reads_written_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cloud.pcd");
    let points = vec![
        na::Point3::new(0.5, -0.25, 10.0),
        na::Point3::new(1e3, 2e-3, -7.0),
    ];
    std::fs::write(&path, write_ascii_pcd(&points)).unwrap();

    let decoded = PcdDecoder.decode(&path).unwrap();
    assert_eq!(decoded, points);
    assert!(PcdDecoder.decode(&temp_dir.path().join("missing.pcd")).is_err());
}

#[test]
fn test_oversized_header_counts_are_decode_errors() {
    let width_overflow = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\n\
                           WIDTH 18446744073709551615\nHEIGHT 2\nDATA ascii\n1 2 3\n";
    assert!(matches!(parse_pcd(width_overflow), Err(SyncError::Decode(_))));

    let huge_ascii = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\n\
                       POINTS 18446744073709551615\nDATA ascii\n1 2 3\n";
    assert!(matches!(parse_pcd(huge_ascii), Err(SyncError::Decode(_))));

    let huge_binary = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\n\
                        POINTS 1537228672809129302\nDATA binary\n";
    assert!(matches!(parse_pcd(huge_binary), Err(SyncError::Decode(_))));

    let huge_layout = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\n\
                        COUNT 1 1 18446744073709551615\nPOINTS 1\nDATA binary\n";
    assert!(matches!(parse_pcd(huge_layout), Err(SyncError::Decode(_))));
}
