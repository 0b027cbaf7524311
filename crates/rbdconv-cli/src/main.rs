//! rbdconv CLI - Convert raw disk images to RBD export-diff files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rbdconv_core::{
    convert_file, Codec, CompressionLevel, ConvertOptions, ConvertPhase, ConvertProgress,
    ProgressCallback,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Convert a raw disk image into a compressed RBD export-diff (v2) file.
#[derive(Parser)]
#[command(name = "rbdconv")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input raw image ("-" reads standard input and requires --size).
    #[arg(long = "in", value_name = "FILE")]
    input: PathBuf,

    /// Output file.
    #[arg(long = "out", value_name = "FILE")]
    output: PathBuf,

    /// Declared image size in bytes (defaults to the input length).
    #[arg(long)]
    size: Option<u64>,

    /// Object order; stripes are 2^order bytes.
    #[arg(long, default_value_t = 22)]
    order: u8,

    /// Output codec.
    #[arg(long, value_enum, default_value = "xz")]
    codec: CodecArg,

    /// Compression level (fast, balanced, max).
    #[arg(short, long, value_enum, default_value = "balanced")]
    compression: CompressionArg,

    /// Read size in megabytes.
    #[arg(long, default_value = "4")]
    chunk_size_mb: usize,

    /// Suppress progress output.
    #[arg(short, long)]
    quiet: bool,

    /// Log level (trace / debug / info / warn / error); RUST_LOG takes precedence.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Output codec argument mapping.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CodecArg {
    /// xz compression.
    Xz,
    /// gzip compression.
    Gzip,
    /// No compression.
    None,
}

impl From<CodecArg> for Codec {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Xz => Codec::Xz,
            CodecArg::Gzip => Codec::Gzip,
            CodecArg::None => Codec::None,
        }
    }
}

/// Compression level argument mapping.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CompressionArg {
    /// Fast compression (level 1).
    Fast,
    /// Balanced compression (level 6).
    Balanced,
    /// Maximum compression (level 9).
    Max,
}

impl From<CompressionArg> for CompressionLevel {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Fast => CompressionLevel::Fast,
            CompressionArg::Balanced => CompressionLevel::Balanced,
            CompressionArg::Max => CompressionLevel::Max,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            // Usage errors exit with 1 rather than clap's default of 2
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&cli.log_level))
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run_convert(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("failed to convert: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_convert(cli: &Cli) -> Result<()> {
    let options = ConvertOptions::default()
        .with_order(cli.order)
        .with_codec(cli.codec.into())
        .with_compression(cli.compression.into())
        .with_chunk_size(cli.chunk_size_mb * 1024 * 1024);

    let total = match cli.size {
        Some(size) => size,
        None if cli.input == Path::new("-") => 0,
        None => std::fs::metadata(&cli.input)
            .with_context(|| format!("failed to open {} for reading", cli.input.display()))?
            .len(),
    };

    if !cli.quiet {
        eprintln!("Input:       {}", cli.input.display());
        eprintln!("Output:      {}", cli.output.display());
        eprintln!("Size:        {}", format_bytes(total));
        eprintln!("Stripe:      {}", format_bytes(1u64 << cli.order.min(63)));
        eprintln!("Codec:       {} ({:?})", options.codec, options.compression);
        eprintln!();
    }

    let progress_bar = if cli.quiet {
        None
    } else {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}")?
            .progress_chars("#>-");
        pb.set_style(style);
        Some(pb)
    };

    let callback: Option<ProgressCallback> = progress_bar.clone().map(|pb| {
        Box::new(move |progress: ConvertProgress| {
            pb.set_position(progress.bytes_processed);
            let phase_msg = match progress.phase {
                ConvertPhase::Header => "Writing header...",
                ConvertPhase::Encoding => "Encoding...",
                ConvertPhase::Finalizing => "Finalizing...",
                ConvertPhase::Complete => "Complete!",
            };
            pb.set_message(phase_msg);
        }) as ProgressCallback
    });

    let summary = convert_file(&cli.input, &cli.output, cli.size, &options, callback)?;

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Complete!");
    }

    info!(
        records = summary.stats.records,
        sparse_stripes = summary.stats.sparse_stripes,
        "wrote {}",
        cli.output.display()
    );

    if !cli.quiet {
        eprintln!();
        eprintln!("Conversion completed successfully: {}", cli.output.display());
        eprintln!(
            "Stripes:     {} ({} sparse, {:.1}%)",
            summary.stats.stripes,
            summary.stats.sparse_stripes,
            summary.sparse_ratio() * 100.0
        );
        eprintln!("Data:        {}", format_bytes(summary.stats.payload_bytes));
        if let Ok(metadata) = std::fs::metadata(&cli.output) {
            eprintln!("Output size: {}", format_bytes(metadata.len()));
        }
    }

    Ok(())
}

/// Format bytes as human-readable string.
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(4096), "4.00 KB");
        assert_eq!(format_bytes(4 * 1024 * 1024), "4.00 MB");
    }

    #[test]
    fn test_requires_in_and_out() {
        assert!(Cli::try_parse_from(["rbdconv", "--in", "disk.raw"]).is_err());
        assert!(Cli::try_parse_from(["rbdconv", "--out", "disk.rbd"]).is_err());
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["rbdconv", "--in", "disk.raw", "--out", "disk.rbd"])
            .unwrap();
        assert_eq!(cli.order, 22);
        assert!(matches!(cli.codec, CodecArg::Xz));
        assert!(matches!(cli.compression, CompressionArg::Balanced));
        assert_eq!(cli.size, None);
        assert_eq!(cli.chunk_size_mb, 4);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_parse_chunk_size_mb() {
        let cli = Cli::try_parse_from([
            "rbdconv", "--in", "disk.raw", "--out", "disk.rbd", "--chunk-size-mb", "16",
        ])
        .unwrap();
        assert_eq!(cli.chunk_size_mb, 16);
        assert!(Cli::try_parse_from([
            "rbdconv", "--in", "disk.raw", "--out", "disk.rbd", "--chunk-size", "16",
        ])
        .is_err());
    }

    #[test]
    fn test_parse_stdin_with_size() {
        let cli = Cli::try_parse_from([
            "rbdconv", "--in", "-", "--out", "disk.rbd", "--size", "8192", "--codec", "none",
        ])
        .unwrap();
        assert_eq!(cli.input, PathBuf::from("-"));
        assert_eq!(cli.size, Some(8192));
        assert!(matches!(cli.codec, CodecArg::None));
    }
}
