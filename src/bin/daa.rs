//! DAA - Cohort Differential Abundance Analysis CLI
//!
//! Command-line interface for M vs S comparisons of HUMAnN and MetaPhlAn
//! profiles.

use clap::{Parser, Subcommand, ValueEnum};
use cohort_daa::data::{AbundanceTable, GroupMap, ModuleSet};
use cohort_daa::error::Result;
use cohort_daa::filter::{export_levels, TaxonomicLevel};
use cohort_daa::pipeline::{
    default_id_column, run_feature_analysis, run_module_analysis, AnalysisConfig, ModuleTest,
    Pipeline, PipelineConfig, PipelineInput, RunManifest,
};
use cohort_daa::profile::{alpha_diversity, write_alpha_diversity};
use cohort_daa::validate::{validate_direction, StatsTable};
use log::info;
use std::path::{Path, PathBuf};

/// Profile flavour; sets defaults a config file would otherwise carry.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    /// HUMAnN pathway abundances: unstratified rows, 5000 permutations
    Humann,
    /// MetaPhlAn clade abundances: species rows, 2000 permutations
    Metaphlan,
}

/// CLI-friendly module test enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliModuleTest {
    /// Permutation test on CLR module scores
    Permutation,
    /// Mann-Whitney U on raw module scores
    MannWhitney,
}

impl From<CliModuleTest> for ModuleTest {
    fn from(test: CliModuleTest) -> Self {
        match test {
            CliModuleTest::Permutation => ModuleTest::Permutation,
            CliModuleTest::MannWhitney => ModuleTest::MannWhitney,
        }
    }
}

/// Cohort Differential Abundance Analysis
#[derive(Parser)]
#[command(name = "daa")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by the analysis subcommands.
#[derive(clap::Args)]
struct AnalysisArgs {
    /// Path to the abundance table (TSV, optionally .gz)
    #[arg(short, long)]
    abundance: PathBuf,

    /// Path to the sample sheet TSV (run accession and group columns)
    #[arg(short, long)]
    sample_sheet: PathBuf,

    /// Analysis configuration YAML
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Defaults for a profile type, used when no config file is given
    #[arg(long, value_enum)]
    source: Option<Source>,

    /// Number of permutations
    #[arg(long)]
    n_perm: Option<usize>,

    /// Random seed for the permutation subsets
    #[arg(long)]
    seed: Option<u64>,

    /// Pseudocount added before the CLR log
    #[arg(long)]
    pseudocount: Option<f64>,

    /// Taxonomic level of clade rows to analyse (e.g. species)
    #[arg(long)]
    level: Option<String>,

    /// Test features in parallel
    #[arg(long)]
    parallel: bool,

    /// Enumerate all relabelings when there are no more than n_perm of them
    #[arg(long)]
    exact: bool,

    /// Write a JSON run manifest
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Feature-level permutation test on CLR values
    Features {
        #[command(flatten)]
        args: AnalysisArgs,

        /// Output path for the feature statistics TSV
        #[arg(short, long, default_value = "species_differential_clr.tsv")]
        output: PathBuf,

        /// Identifier column written in the output (default: input-dependent)
        #[arg(long)]
        id_column: Option<String>,

        /// Also write per-sample alpha diversity to this path
        #[arg(long)]
        alpha: Option<PathBuf>,
    },

    /// Module-level comparison of summed member abundances
    Modules {
        #[command(flatten)]
        args: AnalysisArgs,

        /// Module membership TSV (module and feature columns)
        #[arg(short, long)]
        membership: PathBuf,

        /// Output path for the module statistics TSV
        #[arg(short, long, default_value = "module_stats.tsv")]
        output: PathBuf,

        /// Also write module scores in long format to this path
        #[arg(long)]
        scores_out: Option<PathBuf>,

        /// P-value method for module scores
        #[arg(long, value_enum)]
        test: Option<CliModuleTest>,
    },

    /// Run a pipeline from a YAML pipeline file
    Run {
        /// Path to pipeline configuration YAML
        #[arg(short, long)]
        pipeline: PathBuf,

        /// Path to the abundance table (TSV, optionally .gz)
        #[arg(short, long)]
        abundance: PathBuf,

        /// Path to the sample sheet TSV
        #[arg(short, long)]
        sample_sheet: PathBuf,

        /// Module membership TSV, for pipelines that aggregate modules
        #[arg(short, long)]
        membership: Option<PathBuf>,

        /// Analysis configuration YAML (sample sheet columns, id column)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output path for results TSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check whether module effects replicate in an external cohort
    Direction {
        /// Discovery module statistics TSV
        #[arg(short, long)]
        discovery: PathBuf,

        /// External cohort statistics TSV
        #[arg(short, long)]
        external: PathBuf,

        /// Analysis configuration YAML (direction section)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Identifier column shared by both tables
        #[arg(long)]
        id_column: Option<String>,

        /// Effect column of the discovery table
        #[arg(long)]
        discovery_delta: Option<String>,

        /// Effect column of the external table
        #[arg(long)]
        external_delta: Option<String>,

        /// Output path for the joined table
        #[arg(short, long, default_value = "direction_validation.tsv")]
        output: PathBuf,
    },

    /// Split a MetaPhlAn table into one table per taxonomic level
    ExportLevels {
        /// Path to the MetaPhlAn table (TSV, optionally .gz)
        #[arg(short, long)]
        abundance: PathBuf,

        /// Comma-separated taxonomic levels
        #[arg(short, long, default_value = "species,genus,phylum")]
        levels: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// File name prefix
        #[arg(long, default_value = "metaphlan")]
        prefix: String,

        /// Gzip the output tables
        #[arg(long)]
        compress: bool,
    },

    /// Generate a default analysis configuration
    ExampleConfig {
        /// Output path for YAML config
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the feature-level pipeline YAML to this path
        #[arg(long)]
        pipeline: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let _logger = match flexi_logger::Logger::try_with_env_or_str(&cli.log_level)
        .and_then(|logger| logger.start())
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Warning: could not start logger: {}", e);
            None
        }
    };

    let result = match cli.command {
        Commands::Features {
            args,
            output,
            id_column,
            alpha,
        } => cmd_features(&args, &output, id_column, alpha.as_deref()),

        Commands::Modules {
            args,
            membership,
            output,
            scores_out,
            test,
        } => cmd_modules(&args, &membership, &output, scores_out.as_deref(), test),

        Commands::Run {
            pipeline,
            abundance,
            sample_sheet,
            membership,
            config,
            output,
        } => cmd_run(
            &pipeline,
            &abundance,
            &sample_sheet,
            membership.as_deref(),
            config.as_deref(),
            &output,
        ),

        Commands::Direction {
            discovery,
            external,
            config,
            id_column,
            discovery_delta,
            external_delta,
            output,
        } => cmd_direction(
            &discovery,
            &external,
            config.as_deref(),
            id_column,
            discovery_delta,
            external_delta,
            &output,
        ),

        Commands::ExportLevels {
            abundance,
            levels,
            out_dir,
            prefix,
            compress,
        } => cmd_export_levels(&abundance, &levels, &out_dir, &prefix, compress),

        Commands::ExampleConfig { output, pipeline } => {
            cmd_example_config(&output, pipeline.as_deref())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            AnalysisConfig::from_file(path)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

/// Effective configuration: file or source preset, then CLI overrides.
fn resolve_config(args: &AnalysisArgs) -> Result<AnalysisConfig> {
    let mut config = load_config(args.config.as_deref())?;

    if args.config.is_none() {
        match args.source {
            Some(Source::Humann) => config.permutation.n_permutations = 5000,
            Some(Source::Metaphlan) => {
                config.permutation.n_permutations = 2000;
                config.rows = config.rows.at_level(TaxonomicLevel::Species);
            }
            None => {}
        }
    }

    if let Some(n) = args.n_perm {
        config.permutation.n_permutations = n;
    }
    if let Some(seed) = args.seed {
        config.permutation.seed = seed;
    }
    if let Some(pc) = args.pseudocount {
        config.pseudocount = pc;
    }
    if let Some(level) = &args.level {
        config.rows = config.rows.at_level(TaxonomicLevel::parse(level)?);
    }
    if args.parallel {
        config.permutation.parallel = true;
    }
    if args.exact {
        config.permutation.exact_when_small = true;
    }

    config.validate()?;
    Ok(config)
}

fn load_inputs(args: &AnalysisArgs, config: &AnalysisConfig) -> Result<(AbundanceTable, GroupMap)> {
    info!("Loading abundance table from {:?}", args.abundance);
    let table = AbundanceTable::from_tsv(&args.abundance)?;
    info!(
        "Loaded {} rows x {} samples",
        table.n_features(),
        table.n_samples()
    );
    let groups = GroupMap::from_tsv(&args.sample_sheet, &config.sample_sheet)?;
    let (n_m, n_s) = groups.counts();
    info!("Sample sheet: {} M, {} S", n_m, n_s);
    Ok((table, groups))
}

/// Run the feature-level analysis
fn cmd_features(
    args: &AnalysisArgs,
    output_path: &Path,
    id_column: Option<String>,
    alpha_path: Option<&Path>,
) -> Result<()> {
    let mut config = resolve_config(args)?;
    if id_column.is_some() {
        config.id_column = id_column;
    }
    let (table, groups) = load_inputs(args, &config)?;

    let output = run_feature_analysis(&table, &groups, &config)?;
    let results = output.feature_table()?;

    eprintln!("Writing results to {:?}...", output_path);
    results.to_tsv(output_path)?;
    eprintln!("Done! {} features tested", results.len());
    eprintln!("{}", results.summary());

    let top = results.sorted_by_pvalue();
    if !top.is_empty() {
        eprintln!("Top 5 hits:");
        for r in top.iter().take(5) {
            eprintln!(
                "  {}: diff={:.3}, p={:.4}, q={:.4}",
                r.feature, r.diff_s_minus_m, r.p_perm, r.q_fdr
            );
        }
    }

    let mut manifest = RunManifest::new(&output, &config, Pipeline::features(&config).to_config(None))
        .input("abundance", &args.abundance)
        .input("sample_sheet", &args.sample_sheet)
        .output("features", output_path);

    if let Some(path) = alpha_path {
        let rows = alpha_diversity(&output.relative);
        write_alpha_diversity(&rows, path)?;
        eprintln!("Wrote alpha diversity for {} samples to {:?}", rows.len(), path);
        manifest = manifest.output("alpha_diversity", path);
    }

    if let Some(path) = &args.manifest {
        manifest.write(path)?;
    }
    Ok(())
}

/// Run the module-level analysis
fn cmd_modules(
    args: &AnalysisArgs,
    membership_path: &Path,
    output_path: &Path,
    scores_path: Option<&Path>,
    test: Option<CliModuleTest>,
) -> Result<()> {
    let mut config = resolve_config(args)?;
    if let Some(test) = test {
        config.module_test = test.into();
    }
    let (table, groups) = load_inputs(args, &config)?;
    let modules = ModuleSet::from_tsv(membership_path)?;
    info!("Loaded {} modules", modules.len());

    let output = run_module_analysis(&table, &groups, &modules, &config)?;
    let results = output.module_table()?;

    eprintln!("Writing results to {:?}...", output_path);
    results.to_tsv(output_path)?;
    eprintln!("Done! {} modules tested", results.len());
    eprintln!("{}", results.summary());

    let mut manifest = RunManifest::new(&output, &config, Pipeline::modules(&config).to_config(None))
        .input("abundance", &args.abundance)
        .input("sample_sheet", &args.sample_sheet)
        .input("membership", membership_path)
        .output("modules", output_path);

    if let (Some(path), Some(scores)) = (scores_path, &output.scores) {
        scores.to_tsv(path)?;
        eprintln!("Wrote module scores to {:?}", path);
        manifest = manifest.output("module_scores", path);
    }

    if let Some(path) = &args.manifest {
        manifest.write(path)?;
    }
    Ok(())
}

/// Run a pipeline from configuration
fn cmd_run(
    pipeline_path: &Path,
    abundance_path: &Path,
    sample_sheet_path: &Path,
    membership_path: Option<&Path>,
    config_path: Option<&Path>,
    output_path: &Path,
) -> Result<()> {
    eprintln!("Loading pipeline configuration from {:?}...", pipeline_path);
    let pipeline_config = PipelineConfig::from_yaml(&std::fs::read_to_string(pipeline_path)?)?;
    let config = load_config(config_path)?;

    let table = AbundanceTable::from_tsv(abundance_path)?;
    let groups = GroupMap::from_tsv(sample_sheet_path, &config.sample_sheet)?;
    let modules = membership_path.map(ModuleSet::from_tsv).transpose()?;
    let id_column = config
        .id_column
        .clone()
        .unwrap_or_else(|| default_id_column(&table).to_string());

    eprintln!("Running pipeline '{}'...", pipeline_config.name);
    let output = Pipeline::from_config(&pipeline_config).run(PipelineInput {
        table: &table,
        groups: &groups,
        modules: modules.as_ref(),
        id_column: &id_column,
    })?;

    eprintln!("Writing results to {:?}...", output_path);
    match (&output.features, &output.modules) {
        (Some(features), _) => {
            features.to_tsv(output_path)?;
            eprintln!("Done! {} features tested", features.len());
        }
        (None, Some(modules)) => {
            modules.to_tsv(output_path)?;
            eprintln!("Done! {} modules tested", modules.len());
        }
        (None, None) => {}
    }
    Ok(())
}

/// Join discovery and external statistics on a shared identifier
fn cmd_direction(
    discovery_path: &Path,
    external_path: &Path,
    config_path: Option<&Path>,
    id_column: Option<String>,
    discovery_delta: Option<String>,
    external_delta: Option<String>,
    output_path: &Path,
) -> Result<()> {
    let mut direction = load_config(config_path)?.direction;
    if let Some(id) = id_column {
        direction.id_column = id;
    }
    if let Some(col) = discovery_delta {
        direction.discovery_delta = col;
    }
    if let Some(col) = external_delta {
        direction.external_delta = col;
    }

    let discovery = StatsTable::from_tsv(discovery_path)?;
    let external = StatsTable::from_tsv(external_path)?;
    let table = validate_direction(&discovery, &external, &direction)?;

    table.to_tsv(output_path)?;
    eprintln!(
        "Done! {} of {} shared rows match in direction",
        table.n_matched(),
        table.len()
    );
    Ok(())
}

/// Write one table per taxonomic level
fn cmd_export_levels(
    abundance_path: &Path,
    levels: &str,
    out_dir: &Path,
    prefix: &str,
    compress: bool,
) -> Result<()> {
    let levels = TaxonomicLevel::parse_list(levels)?;
    let table = AbundanceTable::from_tsv(abundance_path)?;
    std::fs::create_dir_all(out_dir)?;

    let written = export_levels(&table, &levels, '|', out_dir, prefix, compress)?;
    for path in &written {
        eprintln!("Wrote {:?}", path);
    }
    Ok(())
}

/// Generate example analysis configuration
fn cmd_example_config(output_path: &Path, pipeline_path: Option<&Path>) -> Result<()> {
    let config = AnalysisConfig::default();
    let yaml = config.to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote example configuration to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    if let Some(path) = pipeline_path {
        let pipeline = Pipeline::features(&config).to_config(Some(
            "Feature-level permutation test on CLR relative abundances",
        ));
        std::fs::write(path, pipeline.to_yaml()?)?;
        eprintln!("Wrote example pipeline to {:?}", path);
    }
    Ok(())
}
