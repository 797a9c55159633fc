//! Integration test: a computed path serialized into every output format.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use nalgebra::{Matrix3, Vector3};
use zigscan_export::{
    RunLogEntry, Timestamp, decode_path_frame, encode_path_frame, parse_coordinate_text,
    to_coordinate_text, to_csv_row,
};
use zigscan_pipeline::{CalibrationParameters, Distortion, Frame, RunConfig, path_generation};

fn computed_path() -> Vec<zigscan_pipeline::WorldPoint> {
    let calib = CalibrationParameters::new(
        Matrix3::new(800.0, 0.0, 240.0, 0.0, 800.0, 220.0, 0.0, 0.0, 1.0),
        Distortion::default(),
        Vector3::zeros(),
        Vector3::new(0.0, 0.0, 1000.0),
    )
    .unwrap();
    let background = Frame::from_pixel(480, 440, image::Rgb([90, 90, 90]));
    let object = Frame::from_fn(480, 440, |x, y| {
        if (200..280).contains(&x) && (200..250).contains(&y) {
            image::Rgb([240, 30, 30])
        } else {
            image::Rgb([90, 90, 90])
        }
    });
    let config = RunConfig {
        spacing_mm: 15.0,
        ..RunConfig::default()
    };
    path_generation(&calib, &object, &background, &config)
        .expect("pipeline should succeed")
        .world_path
}

#[test]
fn coordinate_file_preserves_the_path_to_five_decimals() {
    let path = computed_path();
    assert!(path.len() >= 4);

    let text = to_coordinate_text(&path);
    assert_eq!(text.lines().count(), path.len());

    let parsed = parse_coordinate_text(&text).unwrap();
    assert_eq!(parsed.len(), path.len());
    for (a, b) in parsed.iter().zip(&path) {
        assert!((a.x - b.x).abs() <= 5e-6 && (a.y - b.y).abs() <= 5e-6);
    }
}

#[test]
fn wire_frame_preserves_the_path_to_hundredths() {
    let path = computed_path();
    let frame = encode_path_frame(17, &path).unwrap();
    assert_eq!(frame.len(), 8 + 8 * path.len());

    let (id, decoded) = decode_path_frame(&frame).unwrap();
    assert_eq!(id, 17);
    assert_eq!(decoded.len(), path.len());
    for (a, b) in decoded.iter().zip(&path) {
        assert!((a.x - b.x).abs() <= 0.005 + 1e-9);
        assert!((a.y - b.y).abs() <= 0.005 + 1e-9);
    }
}

#[test]
fn log_row_matches_header_columns() {
    let row = to_csv_row(&RunLogEntry::new(
        "wool_3",
        Timestamp::from_unix_seconds(1_600_000_000),
        &RunConfig::default(),
    ));
    assert_eq!(row.trim_end().split(',').count(), 5);
    assert!(row.starts_with("wool_3,2020-09-13 12:26:40,"));
}
