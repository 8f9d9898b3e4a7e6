//! Code implementing the `search` sub command: the full network-guided
//! epistasis detection pipeline.

pub mod aggregate;
pub mod filter;
pub mod ld;
pub mod local;
pub mod seeding;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use thousands::Separable;

use crate::common::rng::RngPool;
use crate::common::TimeSpan;
use crate::data::registry::SnpRegistry;
use crate::data::snp_set::SnpSet;
use crate::io::annotate::{annotate_dbsnp, annotate_snps, AnnotationSpec};
use crate::io::instance::{DataPurpose, InputFormat, LoadOptions, PhenotypeType};
use crate::io::network_csv::{connect_from_csv, connect_same_annotation, NetworkSpec};
use crate::io::save_network::{save_network, NetworkFormat};
use crate::io::write_sets::{write_sets, WriteSetsOptions};
use crate::network::shuffle::{shuffle_network, ShuffleMethod};
use crate::network::SnpNetwork;
use crate::score::{EpistasisScore, ScoreEngine};
use aggregate::NetworkChild;
use ld::{LdMode, LdTester};
use local::{AnnealingType, LocalSearch, LocalSearchParams, SearchOutcome};
use seeding::community_wise::CommunityWiseParams;
use seeding::quantum::{QcMode, QuantumParams};
use seeding::SeedingRoutine;

/// Command line arguments for `epinet search`.
#[derive(Parser, Debug)]
#[command(author, version, about = "Run the network-guided epistasis search", long_about = None)]
pub struct Args {
    /// Path to the genotype input file.
    #[arg(long, required = true)]
    pub input_path: String,
    /// Format of the genotype input file.
    #[arg(long, default_value = "JSON_EPIGEN")]
    pub input_format: InputFormat,
    /// Kind of the phenotype column.
    #[arg(long, default_value = "DICHOTOMOUS")]
    pub phenotype: PhenotypeType,
    /// Number of categories of a categorical phenotype.
    #[arg(long, default_value_t = 2)]
    pub num_categories: usize,
    /// Optional covariates CSV, aligned by individual.
    #[arg(long)]
    pub covariates_file: Option<String>,
    /// Directory for all output files; nothing is written without it.
    #[arg(long)]
    pub output_directory: Option<String>,
    /// Number of worker threads; 0 uses all cores.
    #[arg(long, default_value_t = 0)]
    pub num_threads: usize,
    /// Seed for all random number generators.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of cross-validation folds; 1 disables fold selection.
    #[arg(long, default_value_t = 1)]
    pub num_folds: usize,
    /// Fold to apply when `--num-folds` is greater than 1.
    #[arg(long, default_value_t = 0)]
    pub fold_id: usize,
    /// Keep the training or the validation individuals of the fold.
    #[arg(long, default_value = "TRAINING")]
    pub cv_purpose: DataPurpose,

    /// Annotate SNPs from the prepared dbSNP table in the data directory.
    #[arg(long)]
    pub snp_annotate_dbsnp: bool,
    /// Additional annotation sources, each
    /// `path|has-header|snp-col|anno-col|csv-sep|snp-sep|anno-sep`.
    #[arg(long = "snp-annotate")]
    pub snp_annotations: Vec<AnnotationSpec>,
    /// Skip unknown SNP names in annotation sources instead of failing.
    #[arg(long)]
    pub ignore_unknown_snps: bool,

    /// Add the prepared BIOGRID network from the data directory.
    #[arg(long)]
    pub network_biogrid: bool,
    /// Additional networks, each
    /// `name|path|has-header|col1|col2|csv-sep|col1-sep|col2-sep`.
    #[arg(long = "network")]
    pub networks: Vec<NetworkSpec>,
    /// Directory holding the prepared dbSNP and BIOGRID tables.
    #[arg(long, default_value = "./data/")]
    pub data_directory: String,
    /// Shuffle the composite network before the final search.
    #[arg(long)]
    pub network_shuffle_method: Option<ShuffleMethod>,

    /// MMA filter: remove SNPs whose marginal p-value is at most this cutoff.
    #[arg(long)]
    pub mma_filter_cutoff: Option<f64>,
    /// Apply Benjamini-Hochberg correction before the MMA cutoff.
    #[arg(long)]
    pub mma_filter_bh: bool,
    /// MAF filter: remove SNPs whose MAF is at least this cutoff.
    #[arg(long)]
    pub maf_filter_cutoff: Option<f64>,
    /// Supplemental single-column MAF file for inputs without MAF data.
    #[arg(long)]
    pub maf_file: Option<String>,

    /// Additional score columns in the result tables.
    #[arg(long = "additional-score")]
    pub additional_scores: Vec<EpistasisScore>,
    /// Write the best-score-over-time series of the final search.
    #[arg(long)]
    pub score_over_time: bool,
    /// Keep identical results separate instead of collapsing them.
    #[arg(long)]
    pub no_collapse: bool,
    /// Skip the SQLite dump of the composite network.
    #[arg(long)]
    pub disable_save_network: bool,

    #[command(flatten)]
    pub ms: MsArgs,
    #[command(flatten)]
    pub fs: FsArgs,
}

/// Per-network (`--ms-*`) search parameters.
#[derive(Parser, Debug, Clone)]
pub struct MsArgs {
    /// Score model driving the per-network searches.
    #[arg(id = "ms-model", long = "ms-model", default_value = "PENETRANCE_NLL")]
    pub model: EpistasisScore,
    /// Seeding routine of the per-network searches.
    #[arg(id = "ms-seeding-routine", long = "ms-seeding-routine", default_value = "RANDOM_CONNECTED")]
    pub seeding_routine: SeedingRoutine,
    /// Number of seeds drawn by RANDOM_CONNECTED.
    #[arg(id = "ms-num-seeds", long = "ms-num-seeds", default_value_t = 300)]
    pub num_seeds: usize,
    /// Maximal Leiden cluster size.
    #[arg(id = "ms-max-cluster-size", long = "ms-max-cluster-size", default_value_t = 1000)]
    pub max_cluster_size: usize,
    /// Candidate sets sampled per cluster.
    #[arg(id = "ms-num-sets-per-cluster", long = "ms-num-sets-per-cluster", default_value_t = 5)]
    pub num_sets_per_cluster: usize,
    /// SNPs per sampled candidate set.
    #[arg(id = "ms-snps-per-set", long = "ms-snps-per-set", default_value_t = 2)]
    pub snps_per_set: usize,
    /// Quantile of pooled candidates kept as seeds.
    #[arg(id = "ms-quantile", long = "ms-quantile", default_value_t = 0.25)]
    pub quantile: f64,
    /// Minimal result set size.
    #[arg(id = "ms-min-set", long = "ms-min-set", default_value_t = 2)]
    pub min_set: usize,
    /// Maximal result set size.
    #[arg(id = "ms-max-set", long = "ms-max-set", default_value_t = 10)]
    pub max_set: usize,
    /// Round limit per seed.
    #[arg(id = "ms-max-rounds", long = "ms-max-rounds", default_value_t = 300)]
    pub max_rounds: usize,
    /// Annealing acceptance rule.
    #[arg(id = "ms-annealing-type", long = "ms-annealing-type", default_value = "SIMULATED_ANNEALING")]
    pub annealing_type: AnnealingType,
    #[arg(id = "ms-annealing-start-prob", long = "ms-annealing-start-prob", default_value_t = 0.8)]
    pub annealing_start_prob: f64,
    #[arg(id = "ms-annealing-end-prob", long = "ms-annealing-end-prob", default_value_t = 0.01)]
    pub annealing_end_prob: f64,
    #[arg(id = "ms-cooling-factor", long = "ms-cooling-factor", default_value_t = 1.0)]
    pub cooling_factor: f64,
    /// Wall-clock limit per seed (time-span format, no suffix = minutes).
    #[arg(id = "ms-per-seed-time-limit", long = "ms-per-seed-time-limit")]
    pub per_seed_time_limit: Option<TimeSpan>,
    /// Wall-clock limit for the whole per-network search.
    #[arg(id = "ms-search-time-limit", long = "ms-search-time-limit")]
    pub search_time_limit: Option<TimeSpan>,
    /// Attach Monte-Carlo p-values with this many permutations.
    #[arg(id = "ms-monte-carlo-permutations", long = "ms-monte-carlo-permutations")]
    pub monte_carlo_permutations: Option<usize>,
    /// Pairwise r-squared matrix enabling the LD constraint.
    #[arg(id = "ms-ld-file", long = "ms-ld-file")]
    pub ld_file: Option<PathBuf>,
    #[arg(id = "ms-ld-mode", long = "ms-ld-mode", default_value = "MEAN")]
    pub ld_mode: LdMode,
    /// Fixed LD cutoff; without it the cutoff is sampled.
    #[arg(id = "ms-ld-cutoff", long = "ms-ld-cutoff")]
    pub ld_cutoff: Option<f64>,
    #[arg(id = "ms-ld-mc-min-set", long = "ms-ld-mc-min-set", default_value_t = 2)]
    pub ld_mc_min_set: usize,
    #[arg(id = "ms-ld-mc-max-set", long = "ms-ld-mc-max-set", default_value_t = 10)]
    pub ld_mc_max_set: usize,
    #[arg(id = "ms-ld-mc-samples", long = "ms-ld-mc-samples", default_value_t = 1000)]
    pub ld_mc_samples: usize,
    /// QUBO solver backend of QUANTUM_COMPUTING seeding.
    #[arg(id = "ms-qc-mode", long = "ms-qc-mode", default_value = "SIMULATED_ANNEALING")]
    pub qc_mode: QcMode,
    /// Clusters below this size use the random sampler instead.
    #[arg(id = "ms-qc-min-cluster-size", long = "ms-qc-min-cluster-size", default_value_t = 100)]
    pub qc_min_cluster_size: usize,
    #[arg(id = "ms-qc-n-clique", long = "ms-qc-n-clique", default_value_t = 2)]
    pub qc_n_clique: usize,
    #[arg(id = "ms-qc-k", long = "ms-qc-k", default_value_t = 3)]
    pub qc_k: usize,
    #[arg(id = "ms-qc-nu", long = "ms-qc-nu", default_value_t = 0.2)]
    pub qc_nu: f64,
    #[arg(id = "ms-qc-lambda0", long = "ms-qc-lambda0", default_value_t = 5.0)]
    pub qc_lambda0: f64,
    #[arg(id = "ms-qc-lambda1", long = "ms-qc-lambda1", default_value_t = 1.0)]
    pub qc_lambda1: f64,
    #[arg(id = "ms-qc-lambda2", long = "ms-qc-lambda2", default_value_t = 1.0)]
    pub qc_lambda2: f64,
}

/// Final-search (`--fs-*`) parameters; the composite network pass.
#[derive(Parser, Debug, Clone)]
pub struct FsArgs {
    /// Score model driving the final search.
    #[arg(id = "fs-model", long = "fs-model", default_value = "PENETRANCE_NLL")]
    pub model: EpistasisScore,
    /// Seeding routine of the final search.
    #[arg(id = "fs-seeding-routine", long = "fs-seeding-routine", default_value = "RANDOM_CONNECTED")]
    pub seeding_routine: SeedingRoutine,
    #[arg(id = "fs-num-seeds", long = "fs-num-seeds", default_value_t = 300)]
    pub num_seeds: usize,
    #[arg(id = "fs-max-cluster-size", long = "fs-max-cluster-size", default_value_t = 1000)]
    pub max_cluster_size: usize,
    #[arg(id = "fs-num-sets-per-cluster", long = "fs-num-sets-per-cluster", default_value_t = 5)]
    pub num_sets_per_cluster: usize,
    #[arg(id = "fs-snps-per-set", long = "fs-snps-per-set", default_value_t = 2)]
    pub snps_per_set: usize,
    #[arg(id = "fs-quantile", long = "fs-quantile", default_value_t = 0.25)]
    pub quantile: f64,
    #[arg(id = "fs-min-set", long = "fs-min-set", default_value_t = 2)]
    pub min_set: usize,
    #[arg(id = "fs-max-set", long = "fs-max-set", default_value_t = 10)]
    pub max_set: usize,
    #[arg(id = "fs-max-rounds", long = "fs-max-rounds", default_value_t = 300)]
    pub max_rounds: usize,
    #[arg(id = "fs-annealing-type", long = "fs-annealing-type", default_value = "SIMULATED_ANNEALING")]
    pub annealing_type: AnnealingType,
    #[arg(id = "fs-annealing-start-prob", long = "fs-annealing-start-prob", default_value_t = 0.8)]
    pub annealing_start_prob: f64,
    #[arg(id = "fs-annealing-end-prob", long = "fs-annealing-end-prob", default_value_t = 0.01)]
    pub annealing_end_prob: f64,
    #[arg(id = "fs-cooling-factor", long = "fs-cooling-factor", default_value_t = 1.0)]
    pub cooling_factor: f64,
    #[arg(id = "fs-per-seed-time-limit", long = "fs-per-seed-time-limit")]
    pub per_seed_time_limit: Option<TimeSpan>,
    #[arg(id = "fs-search-time-limit", long = "fs-search-time-limit")]
    pub search_time_limit: Option<TimeSpan>,
    #[arg(id = "fs-monte-carlo-permutations", long = "fs-monte-carlo-permutations")]
    pub monte_carlo_permutations: Option<usize>,
    #[arg(id = "fs-ld-file", long = "fs-ld-file")]
    pub ld_file: Option<PathBuf>,
    #[arg(id = "fs-ld-mode", long = "fs-ld-mode", default_value = "MEAN")]
    pub ld_mode: LdMode,
    #[arg(id = "fs-ld-cutoff", long = "fs-ld-cutoff")]
    pub ld_cutoff: Option<f64>,
    #[arg(id = "fs-ld-mc-min-set", long = "fs-ld-mc-min-set", default_value_t = 2)]
    pub ld_mc_min_set: usize,
    #[arg(id = "fs-ld-mc-max-set", long = "fs-ld-mc-max-set", default_value_t = 10)]
    pub ld_mc_max_set: usize,
    #[arg(id = "fs-ld-mc-samples", long = "fs-ld-mc-samples", default_value_t = 1000)]
    pub ld_mc_samples: usize,
}

/// Shared mutable state of one pipeline run.
pub(crate) struct SearchContext {
    pub engine: Arc<ScoreEngine>,
    pub registry: SnpRegistry,
    pub network: SnpNetwork,
    pub results: Vec<SnpSet>,
    pub rngs: RngPool,
}

/// Resolved configuration of one search stage.
struct StageConfig {
    routine: SeedingRoutine,
    num_seeds: usize,
    community: CommunityWiseParams,
    quantum: QuantumParams,
    local: LocalSearchParams,
    ld: Option<LdTester>,
}

impl StageConfig {
    #[allow(clippy::too_many_arguments)]
    fn resolve(
        name: &str,
        ms: &MsArgs,
        fs: Option<&FsArgs>,
        no_collapse: bool,
        num_snps: usize,
        rngs: &RngPool,
    ) -> Result<Self, anyhow::Error> {
        // the fs family shares the ms QC settings
        macro_rules! pick {
            ($field:ident) => {
                fs.map(|fs| fs.$field.clone()).unwrap_or_else(|| ms.$field.clone())
            };
        }
        let model = pick!(model);
        let min_set = pick!(min_set);
        let max_set = pick!(max_set);
        let snps_per_set = pick!(snps_per_set);
        if min_set < 2 || min_set > max_set || max_set > crate::err::MAX_SNP_SET_SIZE {
            anyhow::bail!(
                "invalid {} set size bounds: min {}, max {} (cap {})",
                name,
                min_set,
                max_set,
                crate::err::MAX_SNP_SET_SIZE
            );
        }
        if snps_per_set > max_set {
            anyhow::bail!(
                "{} snps-per-set {} exceeds the maximal set size {}",
                name,
                snps_per_set,
                max_set
            );
        }

        let ld_file = pick!(ld_file);
        let ld = match ld_file {
            None => None,
            Some(path) => {
                let mode = pick!(ld_mode);
                let tester = match pick!(ld_cutoff) {
                    Some(cutoff) => LdTester::with_fixed_cutoff(&path, mode, num_snps, cutoff)?,
                    None => rngs.with(|rng| {
                        LdTester::with_monte_carlo_cutoff(
                            &path,
                            mode,
                            num_snps,
                            pick!(ld_mc_min_set),
                            pick!(ld_mc_max_set),
                            pick!(ld_mc_samples),
                            rng,
                        )
                    })?,
                };
                Some(tester)
            }
        };

        Ok(Self {
            routine: pick!(seeding_routine),
            num_seeds: pick!(num_seeds),
            community: CommunityWiseParams {
                model,
                quantile: pick!(quantile),
                max_cluster_size: pick!(max_cluster_size),
                num_sets_per_cluster: pick!(num_sets_per_cluster),
                num_snps_per_set: snps_per_set,
                ..CommunityWiseParams::default()
            },
            quantum: QuantumParams {
                mode: ms.qc_mode,
                min_cluster_size: ms.qc_min_cluster_size,
                n_clique: ms.qc_n_clique,
                k: ms.qc_k,
                nu: ms.qc_nu,
                lambda0: ms.qc_lambda0,
                lambda1: ms.qc_lambda1,
                lambda2: ms.qc_lambda2,
                ..QuantumParams::default()
            },
            local: LocalSearchParams {
                model,
                collapse_identical_results: !no_collapse,
                max_rounds: pick!(max_rounds),
                search_time_limit: pick!(search_time_limit).map(|span| span.as_duration()),
                per_seed_time_limit: pick!(per_seed_time_limit).map(|span| span.as_duration()),
                annealing_type: pick!(annealing_type),
                annealing_start_prob: pick!(annealing_start_prob),
                annealing_end_prob: pick!(annealing_end_prob),
                cooling_factor: pick!(cooling_factor),
                min_set,
                max_set,
                monte_carlo_permutations: pick!(monte_carlo_permutations),
            },
            ld,
        })
    }
}

/// Generate the seeds of one stage.
fn run_seeding(ctx: &mut SearchContext, stage: &StageConfig) -> Result<Vec<SnpSet>, anyhow::Error> {
    let SearchContext {
        engine,
        registry,
        network,
        rngs,
        ..
    } = ctx;
    let seeds = match stage.routine {
        SeedingRoutine::RandomConnected => {
            seeding::random_connected::run(network, stage.num_seeds, rngs)
        }
        SeedingRoutine::CommunityWise => seeding::community_wise::run(
            engine.as_ref(),
            network,
            registry,
            &stage.community,
            rngs,
        )?,
        SeedingRoutine::QuantumComputing => seeding::quantum::run(
            engine.as_ref(),
            network,
            registry,
            &stage.community,
            &stage.quantum,
            rngs,
        )?,
    };
    Ok(seeds)
}

/// Run the local search of one stage against the context's network.
fn run_local_search(
    ctx: &mut SearchContext,
    stage: &StageConfig,
    seeds: Vec<SnpSet>,
) -> Result<SearchOutcome, anyhow::Error> {
    let search = LocalSearch::new(
        stage.local.clone(),
        ctx.engine.as_ref(),
        &ctx.network,
        &ctx.rngs,
        stage.ld.as_ref(),
    );
    Ok(search.run(seeds)?)
}

/// Main entry point for `epinet search`.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", common);
    tracing::info!("args = {:?}", args);

    if args.num_threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.num_threads)
            .build_global()?;
    }
    let output_directory = args.output_directory.as_deref().map(Path::new);
    if let Some(directory) = output_directory {
        std::fs::create_dir_all(directory)?;
    } else {
        tracing::warn!("no --output-directory given, result files will not be written");
    }

    // load the instance and build registry and score engine
    let mut instance = crate::io::instance::load_instance(
        Path::new(&args.input_path),
        args.input_format,
        args.phenotype,
        args.num_categories,
        LoadOptions {
            num_folds: args.num_folds,
            fold_id: args.fold_id,
            purpose: args.cv_purpose,
        },
    )?;
    if let Some(covariates_file) = &args.covariates_file {
        crate::io::instance::load_covariates(&mut instance, Path::new(covariates_file))?;
    }
    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!("using random seed {}", seed);
    instance.set_seed(seed);
    tracing::info!(
        "loaded instance with {} SNPs and {} individuals",
        instance.num_snps().separate_with_commas(),
        instance.num_inds().separate_with_commas()
    );

    let instance = Arc::new(instance);
    let mut registry = SnpRegistry::from_instance(&instance)?;
    let engine = Arc::new(ScoreEngine::new(instance.clone()));

    // annotation sources
    let data_directory = Path::new(&args.data_directory);
    if args.snp_annotate_dbsnp {
        annotate_dbsnp(&mut registry, data_directory, args.ignore_unknown_snps)?;
    }
    for spec in &args.snp_annotations {
        annotate_snps(&mut registry, spec, args.ignore_unknown_snps)?;
    }

    // filters
    if let Some(cutoff) = args.maf_filter_cutoff {
        filter::maf_filter(
            &mut registry,
            cutoff,
            args.maf_file.as_deref().map(Path::new),
        )?;
    }
    if let Some(cutoff) = args.mma_filter_cutoff {
        filter::mma_filter(&engine, &mut registry, cutoff, args.mma_filter_bh)?;
    }

    let rngs = RngPool::new(seed);
    let ms_stage = StageConfig::resolve(
        "ms",
        &args.ms,
        None,
        args.no_collapse,
        instance.num_snps(),
        &rngs,
    )?;
    let fs_stage = StageConfig::resolve(
        "fs",
        &args.ms,
        Some(&args.fs),
        args.no_collapse,
        instance.num_snps(),
        &rngs,
    )?;

    let mut ctx = SearchContext {
        engine: engine.clone(),
        registry,
        network: SnpNetwork::new(),
        results: vec![],
        rngs,
    };

    // per-network child pipelines
    let mut network_specs: Vec<NetworkSpec> = vec![];
    if args.network_biogrid {
        network_specs.push(NetworkSpec::biogrid(data_directory));
    }
    network_specs.extend(args.networks.iter().cloned());

    let children: Vec<NetworkChild<'_>> = if network_specs.is_empty() {
        vec![make_child("SAME_TAG".to_string(), None, &ms_stage)]
    } else {
        network_specs
            .into_iter()
            .map(|spec| make_child(spec.name.clone(), Some(spec), &ms_stage))
            .collect()
    };
    aggregate::run_networks(&mut ctx, children)?;

    // final pass over the composite network
    tracing::info!(
        "composite network: {} nodes, {} edges, connected: {}",
        ctx.network.num_nodes(),
        ctx.network.num_edges(),
        ctx.network.is_connected()
    );
    if let Some(method) = args.network_shuffle_method {
        let SearchContext { network, rngs, .. } = &mut ctx;
        rngs.with(|rng| shuffle_network(network, method, rng));
    }

    let seeds = run_seeding(&mut ctx, &fs_stage)?;
    let table_options = WriteSetsOptions {
        rank_model: Some(fs_stage.local.model),
        scores: args.additional_scores.clone(),
        individual_snps: false,
    };
    if let Some(directory) = output_directory {
        if !args.disable_save_network {
            save_network(
                &ctx.network,
                &ctx.registry,
                &directory.join("result_network.sqlite3"),
                NetworkFormat::Sqlite,
            )?;
        }
        write_sets(
            &directory.join("result_seeds.csv"),
            &ctx.engine,
            &ctx.registry,
            &seeds,
            &table_options,
        )?;
    }

    let outcome = run_local_search(&mut ctx, &fs_stage, seeds)?;
    ctx.results = outcome.results.clone();
    tracing::info!("final search produced {} result sets", ctx.results.len());

    if let Some(directory) = output_directory {
        write_sets(
            &directory.join("result_results.csv"),
            &ctx.engine,
            &ctx.registry,
            &ctx.results,
            &table_options,
        )?;
        write_sets(
            &directory.join("result_ind_SNP_scores.csv"),
            &ctx.engine,
            &ctx.registry,
            &ctx.results,
            &WriteSetsOptions {
                individual_snps: true,
                ..table_options.clone()
            },
        )?;
        if args.score_over_time {
            write_score_over_time(
                &directory.join("scores_over_time.csv"),
                &outcome.score_over_time,
            )?;
        }
    }

    tracing::info!("All done. Have a nice day!");
    Ok(())
}

fn make_child<'a>(
    name: String,
    spec: Option<NetworkSpec>,
    stage: &'a StageConfig,
) -> NetworkChild<'a> {
    let child_name = name.clone();
    NetworkChild {
        name,
        run: Box::new(move |ctx: &mut SearchContext| {
            connect_same_annotation(&ctx.registry, &mut ctx.network)?;
            if let Some(spec) = &spec {
                connect_from_csv(&ctx.registry, &mut ctx.network, spec)?;
            }
            if ctx.network.num_edges() == 0 {
                tracing::warn!("network {} has no edges", child_name);
            }
            let seeds = run_seeding(ctx, stage)?;
            let outcome = run_local_search(ctx, stage, seeds)?;
            ctx.results = outcome.results;
            tracing::info!(
                "network {} produced {} result sets",
                child_name,
                ctx.results.len()
            );
            Ok(())
        }),
    }
}

/// Write the best-score time series as `time (ms)` / `score` rows.
fn write_score_over_time(
    path: &Path,
    timeline: &[(f64, std::time::Duration)],
) -> Result<(), anyhow::Error> {
    use std::io::Write as _;
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(file, "time (ms)\tscore")?;
    for (score, elapsed) in timeline {
        writeln!(
            file,
            "{}.{:03}\t{}",
            elapsed.as_secs(),
            elapsed.subsec_millis(),
            crate::common::format_number(*score)
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use clap::Parser;

    #[test]
    fn cli_surface_parses() {
        let args = super::Args::parse_from([
            "search",
            "--input-path",
            "cohort.json",
            "--input-format",
            "JSON_EPIGEN",
            "--phenotype",
            "CATEGORICAL",
            "--num-categories",
            "3",
            "--num-threads",
            "4",
            "--network",
            "PPI|net.csv|yes|gene1|gene2|,|;|;",
            "--ms-seeding-routine",
            "COMMUNITY_WISE",
            "--ms-model",
            "PENETRANCE_NLL",
            "--ms-search-time-limit",
            "90",
            "--fs-model",
            "BAYESIAN",
            "--network-shuffle-method",
            "EXPECTED_DEGREE_KEEP_INDIVIDUAL_DEGREE",
            "--ms-qc-mode",
            "QAOA",
        ]);
        assert_eq!("cohort.json", args.input_path);
        assert_eq!(3, args.num_categories);
        assert_eq!(1, args.networks.len());
        assert_eq!("PPI", args.networks[0].name);
        assert_eq!(
            super::SeedingRoutine::CommunityWise,
            args.ms.seeding_routine
        );
        assert_eq!(
            90 * 60,
            args.ms.search_time_limit.unwrap().as_duration().as_secs()
        );
        assert_eq!(crate::score::EpistasisScore::Bayesian, args.fs.model);
        assert_eq!(super::QcMode::Qaoa, args.ms.qc_mode);
        assert_eq!(
            Some(crate::network::shuffle::ShuffleMethod::ExpectedDegreeKeepIndividualDegree),
            args.network_shuffle_method
        );
    }

    #[test]
    fn invalid_enum_values_are_rejected() {
        let result = super::Args::try_parse_from([
            "search",
            "--input-path",
            "cohort.json",
            "--ms-seeding-routine",
            "SOMETHING_ELSE",
        ]);
        assert!(result.is_err());
    }
}
