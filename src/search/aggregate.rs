//! Multi-network aggregation.
//!
//! Runs each per-network child pipeline against a snapshot of the shared
//! state, captures which result SNPs were adjacent inside the child's
//! network, and finally rebuilds one composite network from all results with
//! the child names as edge labels.

use std::collections::HashMap;

use crate::data::snp::{SnpEdge, SnpId};
use crate::data::snp_set::SnpSet;
use crate::search::SearchContext;

/// One per-network child pipeline: builds its network into the context and
/// leaves its result sets behind.
pub(crate) struct NetworkChild<'a> {
    pub name: String,
    #[allow(clippy::type_complexity)]
    pub run: Box<dyn FnMut(&mut SearchContext) -> Result<(), anyhow::Error> + 'a>,
}

/// Run all children and rebuild the composite network from their results.
pub(crate) fn run_networks(
    ctx: &mut SearchContext,
    mut children: Vec<NetworkChild<'_>>,
) -> Result<(), anyhow::Error> {
    let initial_network = ctx.network.clone();
    let initial_results = ctx.results.clone();
    let total = children.len();

    let mut captured: Vec<(String, Vec<SnpSet>, HashMap<SnpId, Vec<SnpId>>)> = vec![];
    for (i, child) in children.iter_mut().enumerate() {
        tracing::info!(
            "multi-network pipeline {} ({} of {})",
            child.name,
            i + 1,
            total
        );

        ctx.network = initial_network.clone();
        ctx.results = initial_results.clone();
        (child.run)(ctx)?;

        // for every result SNP, the neighbours it actually had inside this
        // child's network, restricted to its own result set
        let mut adjacency: HashMap<SnpId, Vec<SnpId>> = HashMap::new();
        for set in &ctx.results {
            for &snp in set.snps() {
                adjacency.entry(snp).or_insert_with(|| {
                    let neighbours = ctx.network.adjacent(snp);
                    set.snps()
                        .iter()
                        .copied()
                        .filter(|member| neighbours.contains(member))
                        .collect()
                });
            }
        }
        captured.push((child.name.clone(), std::mem::take(&mut ctx.results), adjacency));
    }

    tracing::info!("constructing the composite network from the preliminary results");
    ctx.network.clear();
    ctx.results.clear();

    for (name, result_sets, adjacency) in &captured {
        for set in result_sets {
            ctx.network.add_nodes(set.snps().iter().copied());
            for &snp in set.snps() {
                ctx.registry
                    .set_or_add_attribute(snp, "ms_source", name, ';')?;
                for &other in &adjacency[&snp] {
                    ctx.network.add_edge(SnpEdge::new(snp, other), name)?;
                }
            }
        }
    }
    Ok(())
}
