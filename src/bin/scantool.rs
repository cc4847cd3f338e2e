use clap::{Parser, Subcommand};
use frame_scan::tools::{grayscale_stats, load_frame, render_code128, save_grid};
use frame_scan::utils::luminance::luminance_from_frame;
use frame_scan::{
    ChannelListener, FramePipeline, LuminanceSource, Rotation, ScanError, ScanEvent, ScanInput,
    ScannerConfig,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const SCAN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("no result from pipeline within {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("cannot render {text:?} at {width}x{height} with {module}px modules")]
    Render {
        text: String,
        width: usize,
        height: usize,
        module: usize,
    },
}

#[derive(Parser)]
#[command(name = "scantool", version, about = "frame_scan CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one pipeline pass over an image and print the listener event
    Scan {
        #[arg(long)]
        image: PathBuf,
        /// Sensor rotation in degrees (multiple of 90)
        #[arg(long, default_value = "0", value_parser = parse_rotation, allow_negative_numbers = true)]
        rotation: Rotation,
    },
    /// List the decode candidates generated for an image
    Candidates {
        #[arg(long)]
        image: PathBuf,
        #[arg(long, default_value = "0", value_parser = parse_rotation, allow_negative_numbers = true)]
        rotation: Rotation,
    },
    /// Write a synthetic Code 128 image
    Render {
        #[arg(long)]
        text: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, default_value_t = 640)]
        width: usize,
        #[arg(long, default_value_t = 480)]
        height: usize,
        /// Pixels per module
        #[arg(long, default_value_t = 3)]
        module: usize,
    },
    /// Print luminance statistics for an image
    Stats {
        #[arg(long)]
        image: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Scan { image, rotation } => scan_cmd(&image, rotation),
        Command::Candidates { image, rotation } => candidates_cmd(&image, rotation),
        Command::Render {
            text,
            out,
            width,
            height,
            module,
        } => render_cmd(&text, &out, width, height, module),
        Command::Stats { image } => stats_cmd(&image),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn parse_rotation(value: &str) -> Result<Rotation, String> {
    let degrees: i32 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{value}` is not a number of degrees"))?;
    Rotation::from_degrees(degrees).ok_or_else(|| format!("must be a multiple of 90, got {degrees}"))
}

fn scan_cmd(image: &Path, rotation: Rotation) -> Result<(), CliError> {
    let frame = load_frame(image, rotation)?;
    println!(
        "Image: {} ({}x{}, rotation {})",
        image.display(),
        frame.width(),
        frame.height(),
        rotation
    );

    let (listener, events) = ChannelListener::new();
    let pipeline = FramePipeline::builder(Arc::new(listener))
        .config(ScannerConfig::from_env())
        .build();

    let start = Instant::now();
    pipeline.submit(frame);
    let event = events
        .recv_timeout(SCAN_TIMEOUT)
        .map_err(|_| CliError::Timeout(SCAN_TIMEOUT))?;
    let elapsed = start.elapsed();

    match event {
        ScanEvent::Detected { symbology, text } => {
            println!("Detected {symbology}: {text}");
        }
        ScanEvent::NoneDetected => println!("Nothing detected"),
    }
    let stats = pipeline.stats();
    println!(
        "Time: {:.2} ms (specialized hits: {}, general hits: {})",
        elapsed.as_secs_f64() * 1000.0,
        stats.specialized_hits,
        stats.general_hits
    );
    pipeline.close();
    Ok(())
}

fn candidates_cmd(image: &Path, rotation: Rotation) -> Result<(), CliError> {
    let frame = load_frame(image, rotation)?;
    let grid = Arc::new(luminance_from_frame(&frame)?);
    drop(frame);

    let config = ScannerConfig::from_env();
    let input = ScanInput {
        grid,
        rotation,
        roi: config.default_roi,
        try_inverted: config.try_inverted,
    };
    for (i, candidate) in input.candidates().enumerate() {
        let region = candidate.image.region();
        println!(
            "{:>2}: {:<32} {}x{} (extra turns {}, source region {},{} {}x{})",
            i,
            candidate.label(),
            candidate.image.width(),
            candidate.image.height(),
            candidate.extra_turns,
            region.left,
            region.top,
            region.width,
            region.height
        );
    }
    Ok(())
}

fn render_cmd(text: &str, out: &Path, width: usize, height: usize, module: usize) -> Result<(), CliError> {
    let module = module.max(1);
    let grid = render_code128(text, width, height, module, height / 4).ok_or_else(|| CliError::Render {
        text: text.to_string(),
        width,
        height,
        module,
    })?;
    save_grid(&grid, out)?;
    println!("Wrote {} ({}x{})", out.display(), width, height);
    Ok(())
}

fn stats_cmd(image: &Path) -> Result<(), CliError> {
    let frame = load_frame(image, Rotation::Deg0)?;
    let grid = luminance_from_frame(&frame)?;
    let stats = grayscale_stats(&grid);
    println!("Image: {} ({}x{})", image.display(), grid.width(), grid.height());
    println!(
        "Grayscale range: {}-{}, average: {}",
        stats.min, stats.max, stats.avg
    );
    Ok(())
}
