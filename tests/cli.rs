use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use assert_fs::TempDir;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use predicates::prelude::*;
use rstest::*;

macro_rules! cargo_run {
    ($cmd:expr, $($args:expr),*) => {
        {
            let mut cmd = Command::cargo_bin($cmd)?;
            cmd.env("RUST_LOG", "info");
            $(cmd.arg($args);)*
            cmd.assert()
        }
    };
}

/// 构造图片目录和清单：一张透明 PNG、一张 RGB PNG、一张损坏的图片和一张不存在的图片
fn prepare(root: &Path) -> Result<()> {
    let images = root.join("images/set1");
    fs::create_dir_all(&images)?;
    RgbaImage::from_pixel(6, 4, Rgba([0, 0, 255, 0])).save(images.join("cat.png"))?;
    RgbImage::from_pixel(3, 3, Rgb([1, 2, 3])).save(images.join("dog.png"))?;
    fs::write(images.join("broken.png"), b"\x89PNG garbage")?;

    let manifest = serde_json::json!([
        {
            "index": "cat.png",
            "source": {"base_dir": "set1"},
            "gpt4_output": {"structured": "cat structured", "short": "cat short", "summarized": "A cat on a mat"}
        },
        {
            "index": "missing.png",
            "source": {"base_dir": "set1"},
            "gpt4_output": {"structured": "-", "short": "-", "summarized": "-"}
        },
        {
            "index": "broken.png",
            "source": {"base_dir": "set1"},
            "gpt4_output": {"structured": "-", "short": "-", "summarized": "-"}
        },
        {
            "index": "dog.png",
            "source": {"base_dir": "set1"},
            "gpt4_output": {"structured": "dog structured", "short": "dog short", "summarized": "A dog"}
        }
    ]);
    fs::write(root.join("manifest.json"), manifest.to_string())?;
    Ok(())
}

#[test]
fn convert_and_reload() -> Result<()> {
    let root = TempDir::new()?;
    prepare(root.path())?;
    let output = root.path().join("out/dataset");

    cargo_run!(
        "json2dataset",
        "--json_file",
        root.path().join("manifest.json"),
        "--image_base_dir",
        root.path().join("images"),
        "--output_file",
        &output
    )
    .success()
    .stderr(predicate::str::contains("missing.png"))
    .stderr(predicate::str::contains("broken.png"))
    .stderr(predicate::str::contains("Saving dataset to"));

    assert!(output.join("data.mdb").is_file());

    cargo_run!(
        "json2dataset",
        "--json_file",
        root.path().join("manifest.json"),
        "--image_base_dir",
        root.path().join("images"),
        "--output_file",
        &output
    )
    .success()
    .stdout(predicate::str::contains("Dataset has 2 examples"))
    .stdout(predicate::str::contains(r#"["image", "text_data", "answer"]"#))
    .stdout(predicate::str::contains("<Image mode=RGB size=6x4>"))
    .stdout(predicate::str::contains(r#""text_data": "Describe the image""#))
    .stdout(predicate::str::contains(r#""answer": "A cat on a mat""#))
    .stderr(predicate::str::contains("skipping").not());

    Ok(())
}

#[rstest]
#[case::structured("structured", "cat structured")]
#[case::short("short", "cat short")]
#[case::summarized("summarized", "A cat on a mat")]
fn output_type(#[case] output_type_arg: &str, #[case] answer: &str) -> Result<()> {
    let root = TempDir::new()?;
    prepare(root.path())?;
    let output = root.path().join("dataset");

    cargo_run!(
        "json2dataset",
        "--json_file",
        root.path().join("manifest.json"),
        "--image_base_dir",
        root.path().join("images"),
        "--output_file",
        &output,
        "--output_type",
        output_type_arg
    )
    .success();

    cargo_run!(
        "json2dataset",
        "--json_file",
        root.path().join("manifest.json"),
        "--image_base_dir",
        root.path().join("images"),
        "--output_file",
        &output
    )
    .success()
    .stdout(predicate::str::contains(format!(r#""answer": "{}""#, answer)));

    Ok(())
}

#[test]
fn no_output_file() -> Result<()> {
    let root = TempDir::new()?;
    prepare(root.path())?;

    cargo_run!(
        "json2dataset",
        "--json_file",
        root.path().join("manifest.json"),
        "--image_base_dir",
        root.path().join("images")
    )
    .success()
    .stderr(predicate::str::contains("No output file specified"));

    Ok(())
}

#[test]
fn missing_inputs() -> Result<()> {
    let root = TempDir::new()?;
    prepare(root.path())?;

    cargo_run!(
        "json2dataset",
        "--json_file",
        root.path().join("nope.json"),
        "--image_base_dir",
        root.path().join("images")
    )
    .failure()
    .stderr(predicate::str::contains("does not exist"));

    cargo_run!(
        "json2dataset",
        "--json_file",
        root.path().join("manifest.json"),
        "--image_base_dir",
        root.path().join("nope")
    )
    .failure()
    .stderr(predicate::str::contains("Image base directory"));

    Ok(())
}

#[test]
fn existing_output_is_not_overwritten() -> Result<()> {
    let root = TempDir::new()?;
    prepare(root.path())?;
    let output = root.path().join("occupied");
    fs::create_dir_all(&output)?;
    fs::write(output.join("keep.txt"), "hello")?;

    cargo_run!(
        "json2dataset",
        "--json_file",
        root.path().join("manifest.json"),
        "--image_base_dir",
        root.path().join("images"),
        "--output_file",
        &output
    )
    .failure();

    let entries = fs::read_dir(&output)?.collect::<Result<Vec<_>, _>>()?;
    assert_eq!(entries.len(), 1);
    assert_eq!(fs::read_to_string(output.join("keep.txt"))?, "hello");

    Ok(())
}

#[test]
fn missing_answer_key_is_fatal() -> Result<()> {
    let root = TempDir::new()?;
    prepare(root.path())?;
    let manifest = serde_json::json!([
        {"index": "dog.png", "source": {"base_dir": "set1"}, "gpt4_output": {"short": "dog"}}
    ]);
    fs::write(root.path().join("manifest.json"), manifest.to_string())?;
    let output = root.path().join("dataset");

    cargo_run!(
        "json2dataset",
        "--json_file",
        root.path().join("manifest.json"),
        "--image_base_dir",
        root.path().join("images"),
        "--output_file",
        &output
    )
    .failure()
    .stderr(predicate::str::contains("summarized"));

    assert!(!output.exists());

    Ok(())
}
