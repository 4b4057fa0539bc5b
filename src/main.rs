//! Slot Autoplay
//!
//! Drives a slot-game launcher page in Chromium through its start sequence,
//! and reads the displayed score from screenshots with Tesseract OCR.

mod automation;
mod browser;
mod config;
mod error;
mod ocr;
mod paths;
mod poll;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use config::AppConfig;
use error::PipelineError;
use ocr::{NO_SCORE_SENTINEL, ScoreOptions, TesseractEngine, TextRecognizer, read_score};
use poll::CancelFlag;

const LOG_FILE: &str = "slot_autoplay.log";

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join(LOG_FILE);
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Slot game autoplay and score reader.
#[derive(Parser)]
#[command(name = "slot-autoplay")]
#[command(about = "Launch a slot game in Chromium and read scores from screenshots")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to config.json next to the executable)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the game, click through the start sequence and screenshot the canvas
    Play {
        /// Launcher URL (overrides config)
        #[arg(long)]
        url: Option<String>,

        /// Run the browser without a window
        #[arg(long)]
        headless: bool,

        /// Directory for screenshots
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Read the score from the final screenshot
        #[arg(long)]
        read_score: bool,
    },

    /// Extract the score from one or more screenshots
    Score {
        /// Screenshot files
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Read the whole image instead of the configured crop region
        #[arg(long)]
        full_image: bool,

        /// Append results to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Directory for the cropped debug image
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Don't write the cropped debug image
        #[arg(long)]
        no_debug_crop: bool,
    },
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        log(&format!("[PANIC]{} {}", location, msg));
    }));
}

fn install_cancel_handler() -> CancelFlag {
    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log("Interrupt received, stopping...");
        handler_flag.cancel();
    }) {
        log(&format!("Warning: Ctrl-C handler not installed: {}", e));
    }
    cancel
}

fn build_engine(config: &AppConfig) -> Result<TesseractEngine> {
    let paths = ocr::ensure_tesseract(&config.score)?;
    Ok(TesseractEngine::new(
        paths,
        &config.score.language,
        config.score.psm,
    ))
}

/// Runs the score reader on one image and prints the outcome.
fn score_one(
    recognizer: &dyn TextRecognizer,
    image: &Path,
    options: &ScoreOptions,
) -> Result<String, PipelineError> {
    log(&format!("Reading score from {}", image.display()));
    let result = read_score(recognizer, image, options);
    match &result {
        Ok(score) => println!("\nExtracted Score: {}", score),
        Err(PipelineError::NoCandidateScore(_)) => {
            println!("\nExtracted Score: {}", NO_SCORE_SENTINEL)
        }
        Err(e) => {
            log(&format!("Error: {}", e));
            println!("Failed to extract score.");
        }
    }
    result
}

fn run_score_command(
    config: &AppConfig,
    images: &[PathBuf],
    full_image: bool,
    csv: Option<&Path>,
    out_dir: &Path,
    no_debug_crop: bool,
    cancel: &CancelFlag,
) -> Result<()> {
    let engine = build_engine(config)?;

    let mut options = ScoreOptions::from_config(&config.score, full_image, out_dir);
    if no_debug_crop {
        options.debug_crop_path = None;
    }

    if let Some(csv_path) = csv {
        automation::init_csv(csv_path)?;
    }

    for image in images {
        if cancel.is_cancelled() {
            log("Cancelled, skipping remaining images");
            break;
        }
        let result = score_one(&engine, image, &options);
        if let Some(csv_path) = csv {
            if let Err(e) = automation::append_to_csv(csv_path, image, &result) {
                log(&format!("Failed to write CSV row: {}", e));
            }
        }
    }

    Ok(())
}

fn run_play_command(
    mut config: AppConfig,
    url: Option<String>,
    headless: bool,
    out_dir: &Path,
    read_score_after: bool,
    cancel: &CancelFlag,
) -> Result<()> {
    if let Some(url) = url {
        config.play.url = url;
    }
    if headless {
        config.browser.headless = true;
    }

    // Set up OCR before the browser so a missing Tesseract fails fast.
    let engine = if read_score_after {
        Some(build_engine(&config)?)
    } else {
        None
    };

    let outcome = match automation::run_play(&config, out_dir, cancel) {
        Ok(outcome) => outcome,
        Err(e) => {
            log(&format!("Play sequence failed: {:#}", e));
            return Ok(());
        }
    };

    log(&format!(
        "Play sequence complete (game frame: {})",
        outcome.frame_url
    ));
    println!("Before clicks: {}", outcome.before_screenshot.display());
    println!("After clicks: {}", outcome.after_screenshot.display());

    if let Some(engine) = engine {
        let options = ScoreOptions::from_config(&config.score, false, out_dir);
        let _ = score_one(&engine, &outcome.after_screenshot, &options);
    }

    Ok(())
}

fn main() -> Result<()> {
    install_panic_hook();

    let cli = Cli::parse();

    paths::ensure_directories()?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(paths::get_default_config_path);
    let config = config::load_config(&config_path);

    let cancel = install_cancel_handler();

    match cli.command {
        Commands::Play {
            url,
            headless,
            out_dir,
            read_score,
        } => run_play_command(config, url, headless, &out_dir, read_score, &cancel),
        Commands::Score {
            images,
            full_image,
            csv,
            out_dir,
            no_debug_crop,
        } => run_score_command(
            &config,
            &images,
            full_image,
            csv.as_deref(),
            &out_dir,
            no_debug_crop,
            &cancel,
        ),
    }
}
