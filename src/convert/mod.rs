//! Code implementing the `convert` sub command: re-encode an instance in the
//! compact binary format.

use std::path::Path;

use clap::Parser;

use crate::io::instance::{load_instance, save_bin, InputFormat, LoadOptions, PhenotypeType};

/// Command line arguments for `epinet convert`.
#[derive(Parser, Debug)]
#[command(author, version, about = "Convert an instance to the binary format", long_about = None)]
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
    /// Path of the binary output file.
    #[arg(long, required = true)]
    pub output_path: String,
}

/// Main entry point for `epinet convert`.
pub fn run(common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", common);
    tracing::info!("args = {:?}", args);

    let instance = load_instance(
        Path::new(&args.input_path),
        args.input_format,
        args.phenotype,
        args.num_categories,
        LoadOptions::default(),
    )?;
    tracing::info!(
        "loaded instance with {} SNPs and {} individuals",
        instance.num_snps(),
        instance.num_inds()
    );
    save_bin(&instance, Path::new(&args.output_path))?;
    tracing::info!("wrote binary instance to {:?}", args.output_path);
    Ok(())
}
