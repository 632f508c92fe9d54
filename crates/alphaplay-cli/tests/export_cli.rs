use std::fs;
use std::path::Path;
use std::process::Command;

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

/// 4x2 side-by-side frame: opaque red color on the left, a mask that is
/// white in its first column and black in its second on the right.
fn write_side_by_side(path: &Path) {
    let frame = RgbaImage::from_fn(4, 2, |x, _| match x {
        0 | 1 => Rgba([255, 0, 0, 255]),
        2 => Rgba([255, 255, 255, 255]),
        _ => Rgba([0, 0, 0, 255]),
    });
    frame.save(path).unwrap();
}

#[test]
fn export_frame_writes_transparent_png() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.png");
    let output = dir.path().join("frame.png");
    write_side_by_side(&input);

    let status = Command::new(env!("CARGO_BIN_EXE_alphaplay"))
        .arg(&input)
        .args(["--size", "2x2", "--fill", "stretch", "--export-frame"])
        .arg(&output)
        .status()
        .expect("failed to run alphaplay --export-frame");
    assert!(status.success());

    let frame = image::open(&output).unwrap().to_rgba8();
    assert_eq!(frame.dimensions(), (2, 2));
    for y in 0..2 {
        assert_eq!(frame.get_pixel(0, y).0, [255, 0, 0, 255]);
        assert_eq!(frame.get_pixel(1, y).0[3], 0);
    }
}

#[test]
fn profile_layout_is_used_for_export() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.png");
    let output = dir.path().join("frame.png");
    // Alpha on top, color below.
    let frame = RgbaImage::from_fn(1, 2, |_, y| {
        if y == 0 {
            Rgba([128, 128, 128, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    });
    frame.save(&input).unwrap();
    let profile = dir.path().join("alphaplay.toml");
    fs::write(
        &profile,
        r#"
version = 1
src = "clip.png"
layout = "top-bottom"
order = "alpha-first"
alpha_channel = "luma"
fill = "stretch"
size = [1, 1]
"#,
    )
    .unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_alphaplay"))
        .arg("--config")
        .arg(&profile)
        .arg("--export-frame")
        .arg(&output)
        .status()
        .expect("failed to run alphaplay with a profile");
    assert!(status.success());

    let pixel = image::open(&output).unwrap().to_rgba8().get_pixel(0, 0).0;
    assert_eq!(&pixel[..3], &[0, 0, 255]);
    assert!((i32::from(pixel[3]) - 128).abs() <= 1, "alpha {}", pixel[3]);
}

#[test]
fn export_without_source_fails() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("frame.png");
    let status = Command::new(env!("CARGO_BIN_EXE_alphaplay"))
        .arg("--export-frame")
        .arg(&output)
        .env_remove("ALPHAPLAY_CONFIG")
        .status()
        .expect("failed to run alphaplay");
    assert!(!status.success());
    assert!(!output.exists());
}

#[test]
fn missing_media_is_reported() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("frame.png");
    let status = Command::new(env!("CARGO_BIN_EXE_alphaplay"))
        .arg(dir.path().join("missing.gif"))
        .arg("--export-frame")
        .arg(&output)
        .status()
        .expect("failed to run alphaplay");
    assert!(!status.success());
    assert!(!output.exists());
}
