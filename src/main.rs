//! CLI: index a directory of images and list near-duplicates.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use depict::config::{DedupConfig, HashAlgorithm, HashSettings, Tolerance, DEFAULT_DB_FILE};
use depict::{Deduplicator, SnapshotFormat};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "depict", version)]
#[command(about = "Find near-duplicate images with perceptual hashes", long_about = None)]
struct Cli {
    /// Directory containing the images
    dir: PathBuf,

    /// How similar two images must be to be reported
    #[arg(short, long, value_enum, default_value = "medium")]
    tolerance: ToleranceArg,

    /// Explicit Hamming radius, overrides --tolerance
    #[arg(short, long)]
    radius: Option<u32>,

    /// Snapshot file, relative to DIR unless absolute
    #[arg(long, default_value = DEFAULT_DB_FILE)]
    db: PathBuf,

    /// Snapshot encoding
    #[arg(long, value_enum, default_value = "json")]
    format: FormatArg,

    /// Also index images in subdirectories
    #[arg(long)]
    recursive: bool,

    /// Perceptual hash algorithm; must match the one the snapshot was built with
    #[arg(long, value_enum, default_value = "blockhash")]
    hash_alg: HashAlgArg,

    /// Hash edge length in bits; the hash has size*size bits
    #[arg(long, default_value = "8")]
    hash_size: u32,

    /// Instead of the full sweep, list indexed images similar to this file
    #[arg(long, value_name = "IMAGE")]
    query: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy)]
enum ToleranceArg {
    Exact,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl From<ToleranceArg> for Tolerance {
    fn from(arg: ToleranceArg) -> Self {
        match arg {
            ToleranceArg::Exact => Tolerance::Exact,
            ToleranceArg::Low => Tolerance::Low,
            ToleranceArg::Medium => Tolerance::Medium,
            ToleranceArg::High => Tolerance::High,
            ToleranceArg::VeryHigh => Tolerance::VeryHigh,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum FormatArg {
    Json,
    Bincode,
}

impl From<FormatArg> for SnapshotFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => SnapshotFormat::Json,
            FormatArg::Bincode => SnapshotFormat::Bincode,
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum HashAlgArg {
    Mean,
    Gradient,
    VertGradient,
    DoubleGradient,
    Blockhash,
}

impl From<HashAlgArg> for HashAlgorithm {
    fn from(arg: HashAlgArg) -> Self {
        match arg {
            HashAlgArg::Mean => HashAlgorithm::Mean,
            HashAlgArg::Gradient => HashAlgorithm::Gradient,
            HashAlgArg::VertGradient => HashAlgorithm::VertGradient,
            HashAlgArg::DoubleGradient => HashAlgorithm::DoubleGradient,
            HashAlgArg::Blockhash => HashAlgorithm::Blockhash,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> DedupConfig {
    let radius = cli
        .radius
        .unwrap_or_else(|| Tolerance::from(cli.tolerance).radius());
    DedupConfig {
        radius,
        db_path: cli.db.clone(),
        format: cli.format.into(),
        recursive: cli.recursive,
        hash: HashSettings {
            algorithm: cli.hash_alg.into(),
            width: cli.hash_size,
            height: cli.hash_size,
        },
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = build_config(&cli);
    let dedup = Deduplicator::new(&cli.dir, config)?;

    if let Some(query) = &cli.query {
        let tree = dedup
            .load_tree()
            .with_context(|| format!("Failed to load {}", dedup.store().path().display()))?;
        let found = dedup
            .lookup(&tree, query)
            .with_context(|| format!("Failed to hash {}", query.display()))?;
        if found.is_empty() {
            println!("No indexed image is similar to {}", query.display());
        }
        for (image, distance) in found {
            println!("{} is similar to {} (distance: {})", query.display(), image.name, distance);
        }
        return Ok(());
    }

    let report = dedup
        .run()
        .with_context(|| format!("Failed to deduplicate {}", cli.dir.display()))?;

    if report.similars.is_empty() {
        println!("No similar images found (radius {}).", report.radius);
    }
    for (name, similar) in &report.similars {
        println!("{} is similar to:", name);
        for other in similar {
            println!(" - {}", other);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_alg_values() {
        let cli = Cli::try_parse_from(["depict", "photos", "--hash-alg", "vert-gradient"]).unwrap();
        assert_eq!(build_config(&cli).hash.algorithm, HashAlgorithm::VertGradient);

        let cli = Cli::try_parse_from(["depict", "photos"]).unwrap();
        assert_eq!(build_config(&cli).hash, HashSettings::default());

        assert!(Cli::try_parse_from(["depict", "photos", "--hash-alg", "sha256"]).is_err());
    }

    #[test]
    fn test_radius_overrides_tolerance() {
        let cli = Cli::try_parse_from(["depict", "photos", "--tolerance", "high"]).unwrap();
        assert_eq!(build_config(&cli).radius, 16);

        let cli =
            Cli::try_parse_from(["depict", "photos", "--tolerance", "high", "--radius", "3"]).unwrap();
        assert_eq!(build_config(&cli).radius, 3);
    }

    #[test]
    fn test_query_and_format_flags() {
        let cli = Cli::try_parse_from([
            "depict",
            "photos",
            "--query",
            "new.png",
            "--format",
            "bincode",
            "--recursive",
        ])
        .unwrap();
        assert_eq!(cli.query, Some(PathBuf::from("new.png")));
        let config = build_config(&cli);
        assert_eq!(config.format, SnapshotFormat::Bincode);
        assert!(config.recursive);
    }
}
