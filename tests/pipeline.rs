mod common;

use common::scratch_dir;
use common::synthetic_image::{checkerboard, color_ramp, is_light_cell};
use pixels_engine::binarization::{binarize, select_threshold};
use pixels_engine::histogram::compute_histogram_grayscale;
use pixels_engine::image_io::{load_image, save_image};
use pixels_engine::{ChannelSelection, Operation, PipelineSettings, PixelsError, Session, ThresholdMethod};

const CELL: usize = 4;

#[test]
fn every_automatic_method_separates_checkerboard() {
    let _ = env_logger::builder().is_test(true).try_init();
    let board = checkerboard(32, 24, CELL, 32, 220);
    let hist = compute_histogram_grayscale(&board);

    for method in ThresholdMethod::automatic() {
        let t = select_threshold(&hist, &method).expect("threshold");
        assert!(t > 32 && t <= 220, "{} picked {}", method.name(), t);

        let out = binarize(&board, &method).expect("binarize");
        for y in 0..board.height() {
            for x in 0..board.width() {
                let expected = if is_light_cell(x, y, CELL) { 255 } else { 0 };
                assert_eq!(
                    out.get_pixel(x, y).unwrap(),
                    (expected, expected, expected),
                    "{} at ({}, {})",
                    method.name(),
                    x,
                    y
                );
            }
        }
    }
}

#[test]
fn pipeline_file_drives_the_session() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = scratch_dir("pipeline_file");
    let pipeline_path = dir.join("pipeline.json");
    std::fs::write(
        &pipeline_path,
        r#"{
            "operations": [
                {"op": "grayscale_luminance"},
                {"op": "gaussian_blur", "sigma": 0.8},
                {"op": "stretch", "channels": "all"},
                {"op": "binarize", "method": "percent_black", "percent": 50}
            ]
        }"#,
    )
    .unwrap();

    let settings = PipelineSettings::load(&pipeline_path).expect("load pipeline");
    assert_eq!(settings.operations.len(), 4);
    assert_eq!(
        settings.operations[2],
        Operation::Stretch { channels: ChannelSelection::All }
    );

    let input = color_ramp(20, 10);
    let direct = settings.run(&input).expect("run");

    let mut session = Session::with_image(input.clone());
    for op in &settings.operations {
        session.apply(op).expect("session step");
    }
    assert_eq!(session.image(), Some(&direct));
    assert!(direct.as_bytes().iter().all(|&v| v == 0 || v == 255));
    // Input never mutated
    assert_eq!(input, color_ramp(20, 10));
}

#[test]
fn failing_step_stops_pipeline() {
    let settings = PipelineSettings {
        operations: vec![
            Operation::Add { value: 10.0 },
            Operation::MeanFilter { size: 4 },
            Operation::Sobel,
        ],
    };
    assert!(matches!(
        settings.run(&color_ramp(8, 8)),
        Err(PixelsError::DimensionMismatch(_))
    ));
}

#[test]
fn processed_image_survives_disk_roundtrip() {
    let dir = scratch_dir("pipeline_disk");
    let path = dir.join("out.ppm");
    let processed = Operation::Median { size: 3 }
        .apply(&checkerboard(12, 12, 3, 10, 240))
        .expect("median");
    save_image(&processed, &path, false).expect("save");
    assert_eq!(load_image(&path).expect("load"), processed);
}

#[test]
fn uniform_image_is_fixed_point_of_smoothing() {
    let flat = pixels_engine::PixelBuffer::from_dimensions(9, 7, (90, 120, 200), 255).unwrap();
    for op in [
        Operation::MeanFilter { size: 3 },
        Operation::MeanFilter { size: 5 },
        Operation::GaussianBlur { sigma: 1.2 },
        Operation::Median { size: 3 },
    ] {
        assert_eq!(op.apply(&flat).unwrap(), flat, "{}", op.label());
    }
}
