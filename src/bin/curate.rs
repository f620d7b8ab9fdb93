//! curate - Spatial deconvolution curation CLI
//!
//! Command-line interface for cleaning and summarising deconvolution output.

use clap::{Args, Parser, Subcommand, ValueEnum};
use spot_deconv_curator::curate::{
    attach, clean, clean_with_stats, select_variable_cell_types, CleanConfig, PrevalenceBounds,
};
use spot_deconv_curator::data::{ContributionMatrix, SpotMetadata};
use spot_deconv_curator::error::Result;
use spot_deconv_curator::pipeline::{Curation, CurationConfig};
use spot_deconv_curator::profile::profile_prevalence;
use std::path::{Path, PathBuf};
use tracing::info;

/// Output format for reports
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Yaml,
}

/// Cleaning options shared by `clean` and `profile --raw`
#[derive(Args, Debug, Clone)]
struct CleanArgs {
    /// Contributions strictly below this are set to zero
    #[arg(long, default_value = "0.02")]
    threshold: f64,

    /// Label of a residual column to drop (repeatable or comma-separated)
    #[arg(
        long = "residual-label",
        value_delimiter = ',',
        default_values = ["res_ss", "residual"]
    )]
    residual_labels: Vec<String>,
}

impl CleanArgs {
    fn config(&self) -> CleanConfig {
        CleanConfig::new(self.threshold).with_residual_labels(&self.residual_labels)
    }
}

/// Spatial deconvolution curation
#[derive(Parser)]
#[command(name = "curate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop residual/unlabeled columns and zero minor contributions
    Clean {
        /// Path to raw contribution matrix TSV (spots x cell types)
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the cleaned matrix TSV
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        clean: CleanArgs,
    },

    /// Report per cell-type prevalence
    Profile {
        /// Path to contribution matrix TSV
        #[arg(short, long)]
        input: PathBuf,

        /// Clean the input first
        #[arg(long)]
        raw: bool,

        #[command(flatten)]
        clean: CleanArgs,

        /// Prevalence at or above which a cell type is ubiquitous
        #[arg(long, default_value = "0.8")]
        upper: f64,

        /// Prevalence a variable cell type must exceed
        #[arg(long, default_value = "0.0")]
        lower: f64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Print variable cell types, one per line
    Select {
        /// Path to cleaned contribution matrix TSV
        #[arg(short, long)]
        input: PathBuf,

        /// Prevalence a variable cell type must stay below
        #[arg(long, default_value = "0.8")]
        upper: f64,

        /// Prevalence a variable cell type must exceed
        #[arg(long, default_value = "0.0")]
        lower: f64,
    },

    /// Merge a cleaned matrix into spot metadata by spot ID
    Attach {
        /// Path to cleaned contribution matrix TSV
        #[arg(short, long)]
        input: PathBuf,

        /// Path to spot metadata TSV
        #[arg(short, long)]
        metadata: PathBuf,

        /// Output path for the merged metadata TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run a full curation from a YAML configuration file
    Run {
        /// Path to curation configuration YAML
        #[arg(short, long)]
        config: PathBuf,

        /// Path to raw contribution matrix TSV
        #[arg(short, long)]
        input: PathBuf,

        /// Path to spot metadata TSV
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate an example curation configuration
    Example {
        /// Output path for the example YAML
        #[arg(short, long, default_value = "curation.yaml")]
        output: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Clean {
            input,
            output,
            clean,
        } => cmd_clean(&input, &output, &clean.config()),

        Commands::Profile {
            input,
            raw,
            clean,
            upper,
            lower,
            format,
        } => cmd_profile(&input, raw.then(|| clean.config()), lower, upper, format),

        Commands::Select {
            input,
            upper,
            lower,
        } => cmd_select(&input, lower, upper),

        Commands::Attach {
            input,
            metadata,
            output,
        } => cmd_attach(&input, &metadata, &output),

        Commands::Run {
            config,
            input,
            metadata,
            output,
        } => cmd_run(&config, &input, metadata.as_deref(), &output),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_matrix(path: &Path) -> Result<ContributionMatrix> {
    info!("Loading contribution matrix from {:?}", path);
    let matrix = ContributionMatrix::from_tsv(path)?;
    info!(
        "Loaded {} spots x {} columns",
        matrix.n_spots(),
        matrix.n_columns()
    );
    Ok(matrix)
}

/// Clean a raw matrix
fn cmd_clean(input: &Path, output: &Path, config: &CleanConfig) -> Result<()> {
    let raw = load_matrix(input)?;
    let (cleaned, stats) = clean_with_stats(&raw, config)?;

    eprint!("{}", stats);
    info!("Writing cleaned matrix to {:?}", output);
    cleaned.to_tsv(output)?;
    Ok(())
}

/// Profile prevalence, cleaning first when a clean config is given
fn cmd_profile(
    input: &Path,
    clean_config: Option<CleanConfig>,
    lower: f64,
    upper: f64,
    format: Format,
) -> Result<()> {
    let mut matrix = load_matrix(input)?;
    if let Some(config) = clean_config {
        matrix = clean(&matrix, &config)?;
    }
    let profile = profile_prevalence(&matrix, &PrevalenceBounds::new(lower, upper))?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&profile)?),
        Format::Yaml => println!("{}", serde_yaml::to_string(&profile)?),
        Format::Text => print!("{}", profile),
    }
    Ok(())
}

/// Print variable cell types
fn cmd_select(input: &Path, lower: f64, upper: f64) -> Result<()> {
    let matrix = load_matrix(input)?;
    let variable = select_variable_cell_types(&matrix, &PrevalenceBounds::new(lower, upper))?;
    info!("{} variable cell types", variable.len());
    for label in variable {
        println!("{}", label);
    }
    Ok(())
}

/// Attach a cleaned matrix to metadata
fn cmd_attach(input: &Path, metadata_path: &Path, output: &Path) -> Result<()> {
    let matrix = load_matrix(input)?;
    let metadata = SpotMetadata::from_tsv(metadata_path)?;
    let merged = attach(&matrix, &metadata)?;

    info!("Writing merged metadata to {:?}", output);
    merged.to_tsv(output)?;
    Ok(())
}

/// Run a curation from configuration
fn cmd_run(
    config_path: &Path,
    input: &Path,
    metadata_path: Option<&Path>,
    output_dir: &Path,
) -> Result<()> {
    info!("Loading curation configuration from {:?}", config_path);
    let config_str = std::fs::read_to_string(config_path)?;
    let config = CurationConfig::from_yaml(&config_str)?;

    let raw = load_matrix(input)?;
    let metadata = metadata_path.map(SpotMetadata::from_tsv).transpose()?;

    let report = Curation::from_config(&config).run(&raw, metadata.as_ref())?;

    std::fs::create_dir_all(output_dir)?;
    report.cleaned.to_tsv(output_dir.join("cleaned.tsv"))?;
    std::fs::write(
        output_dir.join("prevalence.json"),
        serde_json::to_string_pretty(&report.prevalence)?,
    )?;
    let mut variable = report.variable.join("\n");
    if !variable.is_empty() {
        variable.push('\n');
    }
    std::fs::write(output_dir.join("variable_cell_types.txt"), variable)?;
    std::fs::write(output_dir.join("palette.yaml"), report.palette.to_yaml()?)?;
    if let Some(attached) = &report.attached {
        attached.to_tsv(output_dir.join("spot_metadata.tsv"))?;
    }

    info!("Wrote results to {:?}", output_dir);
    eprint!("{}", report.clean_stats);
    eprintln!("Variable cell types: {}", report.variable.join(", "));
    Ok(())
}

/// Write an example configuration
fn cmd_example(output: &Path) -> Result<()> {
    let config = Curation::new()
        .name("spotlight-default")
        .minor_threshold(0.02)
        .residual_labels(&["res_ss", "residual"])
        .prevalence_bounds(0.0, 0.8)
        .seed(123)
        .to_config(Some(
            "Drop residual columns, zero contributions below 2%, focus on cell types in 0-80% of spots",
        ));
    std::fs::write(output, config.to_yaml()?)?;
    info!("Wrote example configuration to {:?}", output);
    Ok(())
}
