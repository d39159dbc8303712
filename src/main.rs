use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use pixels_engine::bezier::{generate_curve, CurveKind};
use pixels_engine::binarization::{select_threshold, ThresholdMethod};
use pixels_engine::histogram::{compute_histogram, compute_histogram_grayscale, Channel, Histogram};
use pixels_engine::image_io::{self, FileKind};
use pixels_engine::{Operation, PipelineSettings, Point, Polygon, SceneState, Session};

#[derive(Parser)]
#[command(name = "pixels-engine")]
#[command(version, about = "Image processing engine", long_about = None)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run operations on an image and save the result
    Apply {
        /// Input image (.ppm, .jpg, .jpeg)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output image, format chosen by extension
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// JSON pipeline file, applied before any inline operation
        #[arg(short, long, value_name = "FILE")]
        pipeline: Option<PathBuf>,

        /// Inline operation as JSON, e.g. '{"op":"median","size":3}' (repeatable)
        #[arg(long = "op", value_name = "JSON")]
        ops: Vec<String>,

        /// Convert to luminance grayscale
        #[arg(long)]
        grayscale: bool,

        /// Gaussian blur sigma
        #[arg(long, value_name = "SIGMA")]
        blur: Option<f64>,

        /// Binarize with: manual:T, percent_black:P, mean_iterative, entropy,
        /// minimum_error or fuzzy_minimum_error
        #[arg(long, value_name = "METHOD")]
        binarize: Option<String>,

        /// Write ASCII (P3) instead of binary (P6) PPM
        #[arg(long)]
        ascii: bool,

        /// JPEG quality (1-95)
        #[arg(long, value_name = "Q", default_value = "90")]
        quality: u8,
    },

    /// Print dimensions and histogram summary
    Info {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Print the threshold each automatic method selects
    Threshold {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },

    /// Sample a Bézier curve and print the points as JSON
    Curve {
        /// Control points (x,y), at least two
        #[arg(long = "point", value_name = "X,Y", value_parser = parse_point, required = true, allow_hyphen_values = true)]
        points: Vec<Point>,

        /// One weight per control point for a rational curve
        #[arg(long = "weight", value_name = "W")]
        weights: Vec<f64>,

        /// Number of segments (samples + 1 points)
        #[arg(long, value_name = "N", default_value = "100")]
        samples: usize,
    },

    /// Edit a persisted polygon scene
    Scene {
        /// Scene JSON file (created if missing)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(subcommand)]
        action: Option<SceneAction>,
    },
}

#[derive(Subcommand)]
enum SceneAction {
    /// Print the scene
    Show,
    /// Add a polygon and select it
    Add {
        #[arg(long, default_value = "Polygon")]
        name: String,
        #[arg(value_name = "X,Y", value_parser = parse_point, required = true, allow_hyphen_values = true)]
        points: Vec<Point>,
    },
    /// Select the topmost polygon under a point
    Select {
        #[arg(value_parser = parse_point, value_name = "X,Y", allow_hyphen_values = true)]
        at: Point,
    },
    /// Move the selected polygon
    Translate {
        #[arg(allow_hyphen_values = true)]
        dx: f64,
        #[arg(allow_hyphen_values = true)]
        dy: f64,
    },
    /// Rotate the selected polygon about the rotate pivot
    Rotate {
        #[arg(allow_hyphen_values = true)]
        degrees: f64,
    },
    /// Scale the selected polygon about the scale pivot
    Scale { factor: f64 },
    /// Set the rotate and/or scale pivot
    Pivot {
        #[arg(long, value_parser = parse_point, value_name = "X,Y", allow_hyphen_values = true)]
        rotate: Option<Point>,
        #[arg(long, value_parser = parse_point, value_name = "X,Y", allow_hyphen_values = true)]
        scale: Option<Point>,
    },
    /// Remove all polygons
    Clear,
}

fn parse_point(s: &str) -> std::result::Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x: f64 = x.trim().parse().map_err(|_| format!("invalid x in '{}'", s))?;
    let y: f64 = y.trim().parse().map_err(|_| format!("invalid y in '{}'", s))?;
    Ok(Point::new(x, y))
}

/// `entropy`, `manual:128`, `percent_black:40`, ...
fn parse_method(s: &str) -> Result<ThresholdMethod> {
    let (name, arg) = match s.split_once(':') {
        Some((n, a)) => (n, Some(a)),
        None => (s, None),
    };
    let method = match (name, arg) {
        ("manual", Some(t)) => ThresholdMethod::Manual {
            threshold: t.parse().context("manual threshold")?,
        },
        ("percent_black", Some(p)) => ThresholdMethod::PercentBlack {
            percent: p.parse().context("percent")?,
        },
        ("percent_black", None) => ThresholdMethod::PercentBlack { percent: 50.0 },
        ("mean_iterative", Some(n)) => ThresholdMethod::MeanIterative {
            max_iterations: n.parse().context("max iterations")?,
        },
        ("mean_iterative", None) => ThresholdMethod::default(),
        ("entropy", None) => ThresholdMethod::Entropy,
        ("minimum_error", None) => ThresholdMethod::MinimumError,
        ("fuzzy_minimum_error", None) => ThresholdMethod::FuzzyMinimumError,
        _ => bail!("unknown binarization method '{}'", s),
    };
    Ok(method)
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match cli.command {
        Commands::Apply {
            input,
            output,
            pipeline,
            ops,
            grayscale,
            blur,
            binarize,
            ascii,
            quality,
        } => cmd_apply(&input, &output, pipeline, &ops, grayscale, blur, binarize, ascii, quality),
        Commands::Info { input } => cmd_info(&input),
        Commands::Threshold { input } => cmd_threshold(&input),
        Commands::Curve {
            points,
            weights,
            samples,
        } => cmd_curve(points, weights, samples),
        Commands::Scene { file, action } => cmd_scene(&file, action.unwrap_or(SceneAction::Show)),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_apply(
    input: &Path,
    output: &Path,
    pipeline: Option<PathBuf>,
    ops: &[String],
    grayscale: bool,
    blur: Option<f64>,
    binarize: Option<String>,
    ascii: bool,
    quality: u8,
) -> Result<()> {
    let image = image_io::load_image(input)
        .with_context(|| format!("loading {}", input.display()))?;
    let mut settings = match pipeline {
        Some(path) => PipelineSettings::load(&path)
            .with_context(|| format!("reading pipeline {}", path.display()))?,
        None => PipelineSettings::default(),
    };
    for json in ops {
        let op: Operation =
            serde_json::from_str(json).with_context(|| format!("parsing --op '{}'", json))?;
        settings.operations.push(op);
    }
    if grayscale {
        settings.operations.push(Operation::GrayscaleLuminance);
    }
    if let Some(sigma) = blur {
        settings.operations.push(Operation::GaussianBlur { sigma });
    }
    if let Some(method) = binarize {
        settings.operations.push(Operation::Binarize(parse_method(&method)?));
    }

    let mut session = Session::with_image(image);
    let total = settings.operations.len();
    for (i, op) in settings.operations.iter().enumerate() {
        info!("[{}/{}] {}", i + 1, total, op.label());
        session
            .apply(op)
            .with_context(|| format!("step {} ({})", i + 1, op.label()))?;
    }

    let result = session.take_image().context("no image in session")?;
    match FileKind::from_path(output)? {
        FileKind::Ppm => image_io::save_as_ppm(&result, output, !ascii)?,
        FileKind::Jpeg => image_io::save_as_jpeg(&result, output, quality)?,
    }
    println!("{} operation(s) applied, saved to {}", total, output.display());
    Ok(())
}

fn print_histogram_summary(label: &str, hist: &Histogram) {
    let total = hist.total().max(1);
    let mean = hist.weighted_sum() as f64 / total as f64;
    match (hist.min_level(), hist.max_level()) {
        (Some(lo), Some(hi)) => println!("  {:<9} min {:>3}  max {:>3}  mean {:>7.2}", label, lo, hi, mean),
        _ => println!("  {:<9} empty", label),
    }
}

fn cmd_info(input: &Path) -> Result<()> {
    let image = image_io::load_image(input)?;
    println!("{}", input.display());
    println!("  size      {}x{}", image.width(), image.height());
    println!("  max value {}", image.max_value());
    for channel in Channel::ALL {
        print_histogram_summary(&format!("{:?}", channel).to_lowercase(), &compute_histogram(&image, channel));
    }
    print_histogram_summary("luminance", &compute_histogram_grayscale(&image));
    Ok(())
}

fn cmd_threshold(input: &Path) -> Result<()> {
    let image = image_io::load_image(input)?;
    let hist = compute_histogram_grayscale(&image);
    for method in ThresholdMethod::automatic() {
        let t = select_threshold(&hist, &method)?;
        println!("{:<20} {:>3}", method.name(), t);
    }
    Ok(())
}

fn cmd_curve(points: Vec<Point>, weights: Vec<f64>, samples: usize) -> Result<()> {
    let kind = if weights.is_empty() {
        CurveKind::Polynomial
    } else {
        if weights.len() != points.len() {
            bail!("{} weights for {} points", weights.len(), points.len());
        }
        CurveKind::Rational(weights)
    };
    let curve = generate_curve(&points, samples, &kind);
    println!("{}", serde_json::to_string_pretty(&curve)?);
    Ok(())
}

fn cmd_scene(file: &Path, action: SceneAction) -> Result<()> {
    let mut scene = SceneState::new();
    scene
        .load(file)
        .with_context(|| format!("loading scene {}", file.display()))?;

    let changed = match action {
        SceneAction::Show => false,
        SceneAction::Add { name, points } => {
            scene.add_polygon(Polygon::new(name, points));
            true
        }
        SceneAction::Select { at } => {
            match scene.select_at(at) {
                Some(i) => println!("selected {} ({})", i, scene.polygons[i].name),
                None => println!("nothing at ({}, {})", at.x, at.y),
            }
            true
        }
        SceneAction::Translate { dx, dy } => require_selection(scene.translate_selected(dx, dy))?,
        SceneAction::Rotate { degrees } => require_selection(scene.rotate_selected(degrees))?,
        SceneAction::Scale { factor } => require_selection(scene.scale_selected(factor))?,
        SceneAction::Pivot { rotate, scale } => {
            if let Some(p) = rotate {
                scene.rotate_pivot = p;
            }
            if let Some(p) = scale {
                scene.scale_pivot = p;
            }
            true
        }
        SceneAction::Clear => {
            scene.clear();
            true
        }
    };

    if changed {
        scene.save(file)?;
    }
    println!("{}", scene.to_json()?);
    Ok(())
}

fn require_selection(applied: bool) -> Result<bool> {
    if !applied {
        bail!("no polygon selected");
    }
    Ok(true)
}
