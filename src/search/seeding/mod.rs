//! Seed generation strategies for the local search.

use rayon::prelude::*;

use crate::data::snp_set::SnpSet;
use crate::err::Result;
use crate::score::{EpistasisScore, ScoreEngine};

pub mod community_wise;
pub mod quantum;
pub mod random_connected;

/// Selectable seeding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SeedingRoutine {
    RandomConnected,
    CommunityWise,
    QuantumComputing,
}

/// Quantile selection over per-cluster candidate sets.
///
/// Keeps the best candidate of every cluster unconditionally, pools all
/// candidates, and additionally keeps the globally best
/// `ceil(quantile * total)` of them.
pub(crate) fn select_start_seeds(
    engine: &ScoreEngine,
    mut candidates: Vec<Vec<SnpSet>>,
    model: EpistasisScore,
    quantile: f64,
) -> Result<Vec<SnpSet>> {
    let sense = model.sense();

    // score all candidates (memoized on the sets) and order each cluster's
    // list best-first
    candidates
        .par_iter_mut()
        .map(|cluster_sets| {
            for set in cluster_sets.iter_mut() {
                engine.score_set(set, model)?;
            }
            cluster_sets.sort_by(|a, b| {
                let score_a = a.cached_score(model.slot()).expect("scored above");
                let score_b = b.cached_score(model.slot()).expect("scored above");
                if sense.is_better(score_a, score_b) {
                    std::cmp::Ordering::Less
                } else if sense.is_better(score_b, score_a) {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            });
            Ok(())
        })
        .collect::<Result<Vec<()>>>()?;

    let mut selected: Vec<SnpSet> = vec![];
    for cluster_sets in &candidates {
        if let Some(best) = cluster_sets.first() {
            if !selected.contains(best) {
                selected.push(best.clone());
            }
        }
    }

    let mut pool: Vec<SnpSet> = candidates.into_iter().flatten().collect();
    pool.sort_by(|a, b| {
        let score_a = a.cached_score(model.slot()).expect("scored above");
        let score_b = b.cached_score(model.slot()).expect("scored above");
        if sense.is_better(score_a, score_b) {
            std::cmp::Ordering::Less
        } else if sense.is_better(score_b, score_a) {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    });
    let num_from_pool = (quantile * pool.len() as f64).ceil() as usize;
    for set in pool.into_iter().take(num_from_pool) {
        if !selected.contains(&set) {
            selected.push(set);
        }
    }

    Ok(selected)
}
