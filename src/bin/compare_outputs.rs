use std::path::PathBuf;
use pixels_engine::image_io::{load_image, save_image};
use pixels_engine::{PipelineSettings, PixelBuffer};

/// Mean absolute byte difference mapped to a 0-100% similarity
fn similarity(expected: &PixelBuffer, actual: &PixelBuffer) -> f32 {
    let total_diff: u64 = expected
        .as_bytes()
        .iter()
        .zip(actual.as_bytes())
        .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs() as u64)
        .sum();
    let avg_diff = total_diff as f32 / expected.as_bytes().len().max(1) as f32;
    100.0 - (avg_diff / 2.55)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <pipeline.json> <input> [<reference> ...]", args[0]);
        eprintln!("  Runs the pipeline on <input> and compares against each reference image");
        std::process::exit(2);
    }

    let pipeline_path = PathBuf::from(&args[1]);
    let input_path = PathBuf::from(&args[2]);
    let references: Vec<PathBuf> = args[3..].iter().map(PathBuf::from).collect();

    let settings = match PipelineSettings::load(&pipeline_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    println!("=== Comparing Pipeline Output Against References ===\n");
    println!("Pipeline: {} ({} operations)", pipeline_path.display(), settings.operations.len());
    for op in &settings.operations {
        println!("  - {}", op.label());
    }

    let output = match load_image(&input_path).and_then(|img| settings.run(&img)) {
        Ok(out) => out,
        Err(e) => {
            println!("✗ ERROR: {}", e);
            std::process::exit(1);
        }
    };
    println!("\nOutput: {}x{}", output.width(), output.height());

    let output_path = input_path.with_file_name(format!(
        "{}-engine-output.ppm",
        input_path.file_stem().and_then(|s| s.to_str()).unwrap_or("image")
    ));
    match save_image(&output, &output_path, true) {
        Ok(()) => println!("Saved: {}\n", output_path.display()),
        Err(e) => println!("✗ Could not save output: {}\n", e),
    }

    let mut all_pass = true;
    for reference_path in &references {
        println!("Reference: {}", reference_path.display());
        match load_image(reference_path) {
            Ok(reference) => {
                if reference.dimensions() != output.dimensions() {
                    println!(
                        "  ✗ Size mismatch: {:?} vs {:?}",
                        reference.dimensions(),
                        output.dimensions()
                    );
                    all_pass = false;
                } else if reference == output {
                    println!("  ✓ PERFECT MATCH!");
                } else {
                    let score = similarity(&reference, &output);
                    println!("  Pixel similarity: {:.2}%", score);
                    if score < 95.0 {
                        all_pass = false;
                    }
                }
            }
            Err(e) => {
                println!("  ✗ ERROR: {}", e);
                all_pass = false;
            }
        }
        println!();
    }

    println!("=== Summary ===");
    if all_pass {
        println!("✓ All comparisons passed!");
    } else {
        println!("✗ Some comparisons failed. Review output above.");
        std::process::exit(1);
    }
}
