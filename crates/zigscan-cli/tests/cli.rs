//! Integration test: the `zigscan` binary end to end on temporary files.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::process::{Command, Output};

const CALIBRATION_YAML: &str = "\
camera_matrix: [[1000.0, 0.0, 240.0], [0.0, 1000.0, 220.0], [0.0, 0.0, 1.0]]
dist_coeff: [[0.0, 0.0, 0.0, 0.0, 0.0]]
rotation_vector: [[0.0], [0.0], [0.0]]
translation_vector: [[0.0], [0.0], [1000.0]]
";

/// Scratch directory holding the calibration record; removed on drop.
fn workdir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("calibration_matrix.yaml"), CALIBRATION_YAML).unwrap();
    dir
}

fn zigscan(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_zigscan"))
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("binary should run")
}

fn write_frames(dir: &Path) {
    image::RgbImage::from_pixel(480, 440, image::Rgb([100, 100, 100]))
        .save(dir.join("bg.png"))
        .unwrap();
    image::RgbImage::from_fn(480, 440, |x, y| {
        if (200..280).contains(&x) && (200..250).contains(&y) {
            image::Rgb([250, 240, 20])
        } else {
            image::Rgb([100, 100, 100])
        }
    })
    .save(dir.join("obj.png"))
    .unwrap();
}

#[test]
fn project_maps_principal_point_to_origin() {
    let tmp = workdir();
    let dir = tmp.path();
    let out = zigscan(
        dir,
        &[
            "project",
            "--calibration",
            "calibration_matrix.yaml",
            "240,220",
            "340,220",
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        String::from_utf8(out.stdout).unwrap(),
        "   0.00000    0.00000\n 100.00000    0.00000\n"
    );
}

#[test]
fn project_to_pixel_accepts_negative_millimeters() {
    let tmp = workdir();
    let dir = tmp.path();
    let out = zigscan(
        dir,
        &[
            "project",
            "--calibration",
            "calibration_matrix.yaml",
            "--to-pixel",
            "-40,-20",
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8(out.stdout).unwrap(), " 200.00000  200.00000\n");
}

#[test]
fn lut_has_one_line_per_pixel() {
    let tmp = workdir();
    let dir = tmp.path();
    let out = zigscan(
        dir,
        &[
            "lut",
            "--calibration",
            "calibration_matrix.yaml",
            "--width",
            "4",
            "--height",
            "3",
            "--output",
            "lut.txt",
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let lut = std::fs::read_to_string(dir.join("lut.txt")).unwrap();
    let lines: Vec<&str> = lut.lines().collect();
    assert_eq!(lines.len(), 12);
    assert_eq!(lines[0], "-240.00000 -220.00000");
    assert_eq!(lines[5], "-239.00000 -219.00000");
}

#[test]
fn generate_writes_outputs_and_archive() {
    let tmp = workdir();
    let dir = tmp.path();
    write_frames(dir);
    let out = zigscan(
        dir,
        &[
            "generate",
            "--calibration",
            "calibration_matrix.yaml",
            "--background",
            "bg.png",
            "--object",
            "obj.png",
            "--visualization",
            "vis.png",
            "--coordinates",
            "path.txt",
            "--archive",
            "archive",
            "--sample",
            "felt_1",
            "--json",
        ],
    );
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let diagnostics: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let points = diagnostics["summary"]["path_point_count"].as_u64().unwrap();
    assert!(points >= 4);

    let path = std::fs::read_to_string(dir.join("path.txt")).unwrap();
    assert_eq!(path.lines().count() as u64, points);
    assert_eq!(
        std::fs::read_to_string(dir.join("archive/coordinates/felt_1.txt")).unwrap(),
        path
    );
    assert!(dir.join("archive/objects/felt_1.png").is_file());
    assert!(dir.join("archive/background/felt_1.png").is_file());
    assert_eq!(image::open(dir.join("vis.png")).unwrap().width(), 480);
}

#[test]
fn empty_plate_fails_with_an_error_exit() {
    let tmp = workdir();
    let dir = tmp.path();
    image::RgbImage::from_pixel(480, 440, image::Rgb([100, 100, 100]))
        .save(dir.join("bg.png"))
        .unwrap();
    let out = zigscan(
        dir,
        &[
            "generate",
            "--calibration",
            "calibration_matrix.yaml",
            "--background",
            "bg.png",
            "--object",
            "bg.png",
        ],
    );
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("ERROR"));
}

#[test]
fn invalid_config_json_fails() {
    let tmp = workdir();
    let dir = tmp.path();
    write_frames(dir);
    let out = zigscan(
        dir,
        &[
            "generate",
            "--calibration",
            "calibration_matrix.yaml",
            "--background",
            "bg.png",
            "--object",
            "obj.png",
            "--config-json",
            r#"{"spacing_mm": -1.0}"#,
        ],
    );
    assert!(!out.status.success());
}
