//! Dataset Generator CLI
//!
//! Builds train/val/test image datasets from a search query, or runs any of
//! the pipeline stages on its own.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use dataset_generator::config::{PipelineConfig, ResizeMode, SplitRatios};
use dataset_generator::dataset::{dataset_summary, DatasetOrganizer, SplitName};
use dataset_generator::download::download_dataset;
use dataset_generator::export::MetadataExporter;
use dataset_generator::pipeline::{DatasetRequest, Pipeline};
use dataset_generator::processing::ImageProcessor;
use dataset_generator::source::{ImageSource, OpenverseClient};
use dataset_generator::utils::logging::{init_logging, LogConfig, LogLevel};
use dataset_generator::utils::percentage;
use dataset_generator::{DEFAULT_OUTPUT_DIR, VERSION};

/// Dataset Generator
///
/// Downloads images matching a query, normalizes them to a fixed square and
/// splits them into train/val/test folders with metadata.
#[derive(Parser, Debug)]
#[command(name = "dataset-generator")]
#[command(version)]
#[command(about = "Automated image dataset creation from web images", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, conflicts_with_all = ["verbose", "quiet"])]
    log_level: Option<LogLevel>,

    /// TOML configuration file; command-line flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline: download, process, organize, metadata
    Generate {
        /// Search query (e.g. "orange cats")
        #[arg(short, long)]
        query: String,

        /// Number of images to download
        #[arg(short, long, value_parser = positive_count)]
        num: usize,

        /// Dataset name (e.g. "Orange Cats Dataset")
        #[arg(long)]
        name: String,

        /// Dataset description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Base directory for the finished dataset
        #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
        output: PathBuf,

        /// Target image size in pixels (square)
        #[arg(short, long)]
        size: Option<u32>,

        /// JPEG quality (1-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,

        /// Minimum accepted width and height
        #[arg(long)]
        min_size: Option<u32>,

        /// Fraction of images for training
        #[arg(long)]
        train_ratio: Option<f64>,

        /// Fraction of images for validation
        #[arg(long)]
        val_ratio: Option<f64>,

        /// Fraction of images for testing
        #[arg(long)]
        test_ratio: Option<f64>,

        /// Random seed for the split
        #[arg(long)]
        seed: Option<u64>,

        /// Keep the temporary raw and processed directories
        #[arg(long)]
        keep_temp: bool,

        /// Root for temporary directories
        #[arg(long)]
        temp_dir: Option<PathBuf>,
    },

    /// Download and normalize images only
    Download {
        /// Search query
        #[arg(short, long)]
        query: String,

        /// Number of images to download
        #[arg(short, long, value_parser = positive_count)]
        num: usize,

        /// Directory for the raw images
        #[arg(short, long, default_value = "data/raw")]
        output: PathBuf,
    },

    /// Validate and resize a directory of images
    Process {
        /// Directory with raw images
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for processed images
        #[arg(short, long)]
        output: PathBuf,

        /// Target image size in pixels (square)
        #[arg(short, long)]
        size: Option<u32>,

        /// JPEG quality (1-100)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,

        /// Minimum accepted width and height
        #[arg(long)]
        min_size: Option<u32>,

        /// Resize straight to the square instead of padding
        #[arg(long)]
        stretch: bool,

        /// Remove the output directory first
        #[arg(long)]
        clean: bool,
    },

    /// Split a directory of images into train/val/test
    Organize {
        /// Directory with processed images
        #[arg(short, long)]
        input: PathBuf,

        /// Dataset root to create
        #[arg(short, long)]
        output: PathBuf,

        /// Category (class) name
        #[arg(long)]
        category: String,

        /// Fraction of images for training
        #[arg(long)]
        train_ratio: Option<f64>,

        /// Fraction of images for validation
        #[arg(long)]
        val_ratio: Option<f64>,

        /// Fraction of images for testing
        #[arg(long)]
        test_ratio: Option<f64>,

        /// Random seed for the split
        #[arg(long)]
        seed: Option<u64>,

        /// Move files instead of copying them
        #[arg(long = "move")]
        move_files: bool,

        /// Remove the output directory first
        #[arg(long)]
        clean: bool,
    },

    /// Write dataset_info.json and README.md for an organized dataset
    Metadata {
        /// Dataset root
        dataset_dir: PathBuf,

        /// Dataset name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,

        /// Dataset description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Where the images came from
        #[arg(long, default_value = "openverse")]
        source: String,
    },

    /// Print image counts of an organized dataset
    Summary {
        /// Dataset root
        dataset_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else if let Some(level) = cli.log_level {
        LogConfig {
            level,
            ..LogConfig::default()
        }
    } else {
        LogConfig::default()
    };
    let _ = init_logging(&log_config);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

/// Image counts must be at least 1
fn positive_count(s: &str) -> std::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be a positive integer".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Dispatch a command; `Ok(false)` means it ran but did not succeed
fn run(cli: Cli) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => PipelineConfig::default(),
    };
    info!("dataset-generator v{}", VERSION);

    match cli.command {
        Commands::Generate {
            query,
            num,
            name,
            description,
            output,
            size,
            quality,
            min_size,
            train_ratio,
            val_ratio,
            test_ratio,
            seed,
            keep_temp,
            temp_dir,
        } => {
            apply_processing(&mut config, size, quality, min_size, false);
            apply_split(&mut config, train_ratio, val_ratio, test_ratio, seed);
            if let Some(temp_dir) = temp_dir {
                config.temp_dir = temp_dir;
            }

            let request = DatasetRequest {
                query,
                num_images: num,
                dataset_name: name,
                description,
                output_base_dir: output,
                keep_temp_files: keep_temp,
            };
            cmd_generate(config, &request)
        }

        Commands::Download { query, num, output } => cmd_download(&config, &query, num, &output),

        Commands::Process {
            input,
            output,
            size,
            quality,
            min_size,
            stretch,
            clean,
        } => {
            apply_processing(&mut config, size, quality, min_size, stretch);
            cmd_process(&config, &input, &output, clean)
        }

        Commands::Organize {
            input,
            output,
            category,
            train_ratio,
            val_ratio,
            test_ratio,
            seed,
            move_files,
            clean,
        } => {
            apply_split(&mut config, train_ratio, val_ratio, test_ratio, seed);
            cmd_organize(&config, &input, &output, &category, clean, move_files)
        }

        Commands::Metadata {
            dataset_dir,
            name,
            description,
            source,
        } => cmd_metadata(&dataset_dir, name, &description, &source),

        Commands::Summary { dataset_dir } => cmd_summary(&dataset_dir),
    }
}

fn apply_processing(
    config: &mut PipelineConfig,
    size: Option<u32>,
    quality: Option<u8>,
    min_size: Option<u32>,
    stretch: bool,
) {
    if let Some(size) = size {
        config.processing.target_size = size;
    }
    if let Some(quality) = quality {
        config.processing.quality = quality;
    }
    if let Some(min_size) = min_size {
        config.processing.min_size = min_size;
    }
    if stretch {
        config.processing.resize_mode = ResizeMode::Stretch;
    }
}

fn apply_split(
    config: &mut PipelineConfig,
    train: Option<f64>,
    val: Option<f64>,
    test: Option<f64>,
    seed: Option<u64>,
) {
    let current = config.split.ratios;
    config.split.ratios = SplitRatios {
        train: train.unwrap_or(current.train),
        val: val.unwrap_or(current.val),
        test: test.unwrap_or(current.test),
    };
    if let Some(seed) = seed {
        config.split.seed = seed;
    }
}

fn cmd_generate(config: PipelineConfig, request: &DatasetRequest) -> Result<bool> {
    let source = OpenverseClient::new(config.source.clone())?;
    let pipeline = Pipeline::new(config, source).context("Invalid pipeline configuration")?;

    let result = pipeline.generate(request);
    Ok(result.success)
}

fn cmd_download(config: &PipelineConfig, query: &str, num: usize, output: &Path) -> Result<bool> {
    let source = OpenverseClient::new(config.source.clone())?;
    let delay = Duration::from_millis(config.source.download_delay_ms);

    println!("{}", format!("Downloading '{}' from {}", query, source.name()).cyan().bold());
    let report = download_dataset(&source, query, num, output, delay)?;

    println!();
    println!("  Requested:  {}", report.requested);
    println!("  Found:      {}", report.found);
    println!("  Downloaded: {}", report.downloaded.len().to_string().green());
    println!("  Failed:     {}", report.failed.to_string().red());
    println!("  Location:   {}", output.display());

    Ok(!report.downloaded.is_empty())
}

fn cmd_process(config: &PipelineConfig, input: &Path, output: &Path, clean: bool) -> Result<bool> {
    let processor = ImageProcessor::new(config.processing.clone())?;

    println!("{}", "Processing images".cyan().bold());
    let report = processor.process_batch(input, output, clean)?;

    println!();
    println!("  Processed: {}", report.processed.len().to_string().green());
    println!("  Rejected:  {}", report.rejected.to_string().red());
    println!("  Success:   {:.1}%", report.success_rate());

    Ok(!report.processed.is_empty())
}

fn cmd_organize(
    config: &PipelineConfig,
    input: &Path,
    output: &Path,
    category: &str,
    clean: bool,
    move_files: bool,
) -> Result<bool> {
    let organizer = DatasetOrganizer::new(config.split.ratios, config.split.seed)?;

    println!("{}", "Organizing dataset".cyan().bold());
    let summary = organizer.organize(input, output, category, clean, move_files)?;

    println!();
    println!("  Root: {}", summary.root_path.display());
    for split in SplitName::ALL {
        let count = summary.count(split);
        println!(
            "  {:<5} {} images ({:.1}%)",
            split.as_str(),
            count,
            percentage(count, summary.total_images)
        );
    }

    Ok(summary.organized() > 0)
}

fn cmd_metadata(
    dataset_dir: &Path,
    name: Option<String>,
    description: &str,
    source: &str,
) -> Result<bool> {
    let name = name.unwrap_or_else(|| {
        dataset_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string())
    });

    println!("{}", "Generating metadata".cyan().bold());
    let metadata = MetadataExporter::new().export(dataset_dir, &name, description, source, None)?;

    println!();
    println!("  Total images: {}", metadata.statistics.total_images);
    println!("  Total size:   {} MB", metadata.statistics.total_size_mb);
    println!("  Categories:   {}", metadata.statistics.categories.join(", "));

    Ok(true)
}

fn cmd_summary(dataset_dir: &Path) -> Result<bool> {
    let summary = dataset_summary(dataset_dir)?;

    println!("{}", format!("Dataset {}", dataset_dir.display()).cyan().bold());
    for (split, data) in &summary.splits {
        println!("  {}/ ({} images)", split, data.total);
        for (category, count) in &data.categories {
            println!("    {}/ {}", category, count);
        }
    }
    println!();
    println!("  Total images: {}", summary.total_images.to_string().green());
    println!("  Categories:   {}", summary.categories.join(", "));

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_must_be_positive() {
        let parse = |num: &str| {
            Cli::try_parse_from(["dataset-generator", "download", "-q", "cats", "-n", num])
        };
        assert!(parse("0").is_err());
        assert!(parse("-3").is_err());
        assert!(parse("five").is_err());

        match parse("5").unwrap().command {
            Commands::Download { num, .. } => assert_eq!(num, 5),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_generate_rejects_zero_images() {
        let result = Cli::try_parse_from([
            "dataset-generator", "generate", "-q", "cats", "-n", "0", "--name", "Cats",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level_flag() {
        let cli = Cli::try_parse_from(["dataset-generator", "--log-level", "warn", "summary", "d"])
            .unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Warn));

        assert!(Cli::try_parse_from(["dataset-generator", "--log-level", "loud", "summary", "d"]).is_err());
        assert!(Cli::try_parse_from(["dataset-generator", "-v", "--log-level", "warn", "summary", "d"]).is_err());
    }
}
