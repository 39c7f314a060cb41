use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn uvfill(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_uvfill"))
        .env("UVFILL_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run uvfill")
}

#[test]
fn cpu_render_exports_gradient_png() {
    let root = TempDir::new().unwrap();
    let output = root.path().join("out/gradient.png");

    let result = uvfill(
        &root.path().join("config"),
        &[
            "--backend",
            "cpu",
            "--size",
            "4x2",
            "--output",
            output.to_str().unwrap(),
        ],
    );
    assert!(result.status.success(), "{result:?}");

    let image = image::open(&output).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (4, 2));
    assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 255]);
    assert_eq!(image.get_pixel(2, 1).0, [128, 128, 255, 255]);
    assert_eq!(image.get_pixel(3, 0).0, [191, 0, 255, 255]);
}

#[test]
fn zero_sized_surface_is_rejected() {
    let root = TempDir::new().unwrap();
    let result = uvfill(root.path(), &["--backend", "cpu", "--size", "0x4"]);

    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("non-zero"));
}

#[test]
fn unsupported_export_extension_is_rejected() {
    let root = TempDir::new().unwrap();
    let output = root.path().join("gradient.exr");
    let result = uvfill(
        root.path(),
        &["--backend", "cpu", "--size", "4x4", "--output", output.to_str().unwrap()],
    );

    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn no_export_skips_writing() {
    let root = TempDir::new().unwrap();
    let output = root.path().join("gradient.png");
    let result = uvfill(
        root.path(),
        &[
            "--backend",
            "cpu",
            "--size",
            "8x8",
            "--no-export",
            "--output",
            output.to_str().unwrap(),
        ],
    );

    assert!(result.status.success(), "{result:?}");
    assert!(!output.exists());
}

#[test]
fn config_init_refuses_to_overwrite_without_force() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");

    let first = uvfill(&config_dir, &["config", "init"]);
    assert!(first.status.success(), "{first:?}");
    let contents = fs::read_to_string(config_dir.join("config.toml")).unwrap();
    assert!(contents.contains("[render]"));
    assert!(contents.contains("size = \"512x512\""));

    let second = uvfill(&config_dir, &["config", "init"]);
    assert!(!second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("--force"));

    let forced = uvfill(&config_dir, &["config", "init", "--force"]);
    assert!(forced.status.success(), "{forced:?}");
}

#[test]
fn config_where_prints_resolved_file() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");

    let result = uvfill(&config_dir, &["config", "where"]);
    assert!(result.status.success(), "{result:?}");
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains(&config_dir.join("config.toml").display().to_string()));
}

#[test]
fn config_file_values_apply_to_render() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let output = root.path().join("from-config.png");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        format!(
            "[render]\nbackend = \"cpu\"\nsize = \"6x3\"\noutput = {:?}\n",
            output.to_str().unwrap()
        ),
    )
    .unwrap();

    let result = uvfill(&config_dir, &[]);
    assert!(result.status.success(), "{result:?}");

    let image = image::open(&output).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (6, 3));
}

#[test]
fn invalid_config_file_is_reported() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[render]\nformat = \"bgra8\"\n").unwrap();

    let result = uvfill(&config_dir, &["--no-export"]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("render.format"));
}
