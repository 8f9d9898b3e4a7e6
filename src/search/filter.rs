//! Pre-search SNP filters.
//!
//! Both filters mark SNPs as `removed` on the registry; removed SNPs are
//! skipped by the annotation-driven network connectors but may still appear
//! in already-built networks and SNP sets.

use rayon::prelude::*;

use crate::data::registry::SnpRegistry;
use crate::data::snp::SnpId;
use crate::err::{Error, Result};
use crate::score::ScoreEngine;

/// Maximum-marginal-association filter.
///
/// Computes the single-SNP variance-test p-value for every SNP (optionally
/// Benjamini-Hochberg corrected), stores it on the registry, and marks SNPs
/// with `p <= cutoff` as removed.
pub fn mma_filter(
    engine: &ScoreEngine,
    registry: &mut SnpRegistry,
    cutoff: f64,
    bh_correction: bool,
) -> Result<usize> {
    let num_snps = registry.len();
    let mut p_values: Vec<f64> = (0..num_snps as u32)
        .into_par_iter()
        .map(|snp| engine.marginal_p_value(SnpId(snp)))
        .collect::<Result<_>>()?;

    if bh_correction {
        tracing::info!("correcting MMA p-values with Benjamini-Hochberg");
        p_values = benjamini_hochberg(&p_values);
    }

    let mut num_removed = 0usize;
    for (i, &p) in p_values.iter().enumerate() {
        let snp = SnpId(i as u32);
        registry.set_mma(snp, p);
        if p <= cutoff {
            registry.set_removed(snp, true);
            num_removed += 1;
        }
    }
    tracing::info!("MMA filter removed {} SNPs from the dataset", num_removed);
    Ok(num_removed)
}

/// Benjamini-Hochberg adjustment of a p-value vector.
pub(crate) fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    let mut indexed: Vec<(f64, usize)> = p_values
        .iter()
        .copied()
        .enumerate()
        .map(|(i, p)| (p, i))
        .collect();
    indexed.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("p-values are finite"));

    for (rank, entry) in indexed.iter_mut().enumerate() {
        entry.0 *= n as f64 / (rank + 1) as f64;
    }
    // enforce monotonicity from the back
    let mut running_min = f64::MAX;
    for entry in indexed.iter_mut().rev() {
        running_min = running_min.min(entry.0);
        entry.0 = running_min;
    }

    let mut adjusted = vec![0.0; n];
    for (p, i) in indexed {
        adjusted[i] = p;
    }
    adjusted
}

/// Minor-allele-frequency filter.
///
/// Falls back to a supplemental single-column file when the instance carried
/// no MAF information; marks SNPs with `maf >= cutoff` as removed.
pub fn maf_filter(
    registry: &mut SnpRegistry,
    cutoff: f64,
    maf_file: Option<&std::path::Path>,
) -> Result<usize> {
    if !registry.has_maf_information() {
        let path = maf_file.ok_or_else(|| {
            Error::BadInput(
                "no MAF data in the input file and no additional MAF file provided".into(),
            )
        })?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::BadInput(format!("cannot read MAF file {:?}: {}", path, e)))?;
        let maf_data: Vec<f64> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                line.split('\t')
                    .next()
                    .unwrap_or(line)
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| Error::BadInput(format!("invalid MAF value {:?}: {}", line, e)))
            })
            .collect::<Result<_>>()?;
        registry.set_maf_information(maf_data)?;
    }

    let mut num_removed = 0usize;
    for snp in registry.all_snps().collect::<Vec<_>>() {
        let maf = registry
            .maf(snp)
            .ok_or_else(|| Error::NotFound(format!("MAF of SNP {}", snp)))?;
        if maf >= cutoff {
            registry.set_removed(snp, true);
            num_removed += 1;
        }
    }
    tracing::info!("MAF filter removed {} SNPs from the dataset", num_removed);
    Ok(num_removed)
}
