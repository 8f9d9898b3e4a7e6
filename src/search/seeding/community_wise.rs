//! Community-wise seeding: Leiden clustering under a size constraint,
//! cluster refinement, random-walk sampling, quantile selection.

use std::collections::{BTreeSet, HashMap, HashSet};

use rayon::prelude::*;

use crate::common::rng::RngPool;
use crate::data::registry::SnpRegistry;
use crate::data::snp::SnpId;
use crate::data::snp_set::SnpSet;
use crate::err::Result;
use crate::network::SnpNetwork;
use crate::score::{EpistasisScore, ScoreEngine};

/// Resolution increment of the forward search phase.
const LEIDEN_FORWARD_SEARCH_SPEED: f64 = 0.5;
/// Cap on the binary-search refinement steps.
const LEIDEN_NUM_BINARY_SEARCH_STEPS: usize = 4;

/// Tuning knobs of the community-wise seeding.
#[derive(Debug, Clone)]
pub struct CommunityWiseParams {
    pub model: EpistasisScore,
    pub quantile: f64,
    pub max_cluster_size: usize,
    pub num_sets_per_cluster: usize,
    pub num_snps_per_set: usize,
    pub leiden_beta: f64,
    pub leiden_max_steps: usize,
}

impl Default for CommunityWiseParams {
    fn default() -> Self {
        Self {
            model: EpistasisScore::PenetranceNll,
            quantile: 0.25,
            max_cluster_size: 1000,
            num_sets_per_cluster: 5,
            num_snps_per_set: 2,
            leiden_beta: 0.01,
            leiden_max_steps: 10,
        }
    }
}

/// Run the full community-wise seeding.
pub fn run(
    engine: &ScoreEngine,
    network: &SnpNetwork,
    registry: &mut SnpRegistry,
    params: &CommunityWiseParams,
    rngs: &RngPool,
) -> Result<Vec<SnpSet>> {
    tracing::info!("seeding with method COMMUNITY_WISE");

    let (mut clusters, min_size, max_size) =
        leiden_with_size_constraint(network, params, rngs);
    record_clusters(registry, "leiden_cluster", &clusters)?;
    tracing::info!(
        "clustering: {} clusters with size in [{}, {}]",
        clusters.len(),
        min_size,
        max_size
    );

    refine_clustering(network, &mut clusters, params.max_cluster_size);
    record_clusters(registry, "leiden_cluster_after_refinement", &clusters)?;
    tracing::info!("after cluster refinement: {} clusters left", clusters.len());

    let candidates = generate_random_sets(network, &clusters, params, rngs);
    let seeds = super::select_start_seeds(engine, candidates, params.model, params.quantile)?;
    tracing::info!("selected {} start seeds for local search", seeds.len());
    Ok(seeds)
}

/// Find a Leiden clustering whose largest cluster respects the size cap.
///
/// A forward phase grows the resolution in fixed increments until the
/// constraint holds, then a bounded binary search refines between the last
/// two resolutions.  When two consecutive forward steps change neither the
/// maximum cluster size nor the cluster count, the search stops with the
/// current best.
pub(crate) fn leiden_with_size_constraint(
    network: &SnpNetwork,
    params: &CommunityWiseParams,
    rngs: &RngPool,
) -> (Vec<Vec<SnpId>>, usize, usize) {
    let mut reached_max = false;
    let mut resolution_min = 0.0f64;
    let mut resolution_max = 0.0f64;
    let mut binary_search_steps = 0usize;

    let mut best_clustering: Vec<Vec<SnpId>> = vec![];
    let mut best_min_size = 0usize;
    let mut best_max_size = 0usize;

    let mut previous_max_size = usize::MAX;
    let mut previous_num_clusters = usize::MAX;

    loop {
        let resolution = if reached_max {
            (resolution_min + resolution_max) / 2.0
        } else {
            resolution_max
        };

        let clusters = rngs.with(|rng| {
            network.cluster_leiden(resolution, params.leiden_beta, params.leiden_max_steps, rng)
        });
        let cluster_min = clusters.iter().map(|c| c.len()).min().unwrap_or(0);
        let cluster_max = clusters.iter().map(|c| c.len()).max().unwrap_or(0);

        if reached_max {
            if cluster_max <= params.max_cluster_size {
                resolution_max = resolution;
                best_clustering = clusters;
                best_min_size = cluster_min;
                best_max_size = cluster_max;
            } else {
                resolution_min = resolution;
            }
            binary_search_steps += 1;
        } else if cluster_max <= params.max_cluster_size {
            reached_max = true;
            best_clustering = clusters;
            best_min_size = cluster_min;
            best_max_size = cluster_max;
        } else {
            if previous_max_size == cluster_max && previous_num_clusters == clusters.len() {
                // the resolution stopped changing the clustering
                best_clustering = clusters;
                best_min_size = cluster_min;
                best_max_size = cluster_max;
                break;
            }
            previous_max_size = cluster_max;
            previous_num_clusters = clusters.len();
            best_clustering = clusters;
            resolution_min = resolution_max;
            resolution_max += LEIDEN_FORWARD_SEARCH_SPEED;
        }

        if reached_max
            && (binary_search_steps >= LEIDEN_NUM_BINARY_SEARCH_STEPS
                || resolution_min == resolution_max)
        {
            break;
        }
    }

    (best_clustering, best_min_size, best_max_size)
}

/// Merge undersized clusters into connected neighbour clusters, smallest
/// first, without exceeding the size cap.
pub(crate) fn refine_clustering(
    network: &SnpNetwork,
    clusters: &mut Vec<Vec<SnpId>>,
    max_cluster_size: usize,
) {
    let mut cluster_of: HashMap<SnpId, usize> = HashMap::new();
    for (i, cluster) in clusters.iter().enumerate() {
        for &snp in cluster {
            cluster_of.insert(snp, i);
        }
    }

    for i in 0..clusters.len() {
        if clusters[i].is_empty() || clusters[i].len() >= max_cluster_size {
            continue;
        }
        // clusters connected to this one
        let mut connected: HashSet<usize> = HashSet::new();
        for &snp in &clusters[i] {
            for &neighbour in network.adjacent(snp) {
                if let Some(&other) = cluster_of.get(&neighbour) {
                    if other != i {
                        connected.insert(other);
                    }
                }
            }
        }

        let mut by_size: Vec<(usize, usize)> = connected
            .into_iter()
            .map(|other| (other, clusters[other].len()))
            .collect();
        by_size.sort_by_key(|&(other, size)| (size, other));

        for (other, size) in by_size {
            if clusters[i].len() + size > max_cluster_size {
                break;
            }
            let moved = std::mem::take(&mut clusters[other]);
            for &snp in &moved {
                cluster_of.insert(snp, i);
            }
            clusters[i].extend(moved);
        }
    }

    clusters.retain(|cluster| !cluster.is_empty());
}

/// Record cluster membership as a per-SNP registry attribute.
pub(crate) fn record_clusters(
    registry: &mut SnpRegistry,
    attribute: &str,
    clusters: &[Vec<SnpId>],
) -> Result<()> {
    for (i, cluster) in clusters.iter().enumerate() {
        for &snp in cluster {
            registry.set_attribute(snp, attribute, i.to_string())?;
        }
    }
    Ok(())
}

/// Sample candidate sets per cluster by random walks over the in-cluster
/// neighbourhood.
pub(crate) fn generate_random_sets(
    network: &SnpNetwork,
    clusters: &[Vec<SnpId>],
    params: &CommunityWiseParams,
    rngs: &RngPool,
) -> Vec<Vec<SnpSet>> {
    clusters
        .par_iter()
        .map(|cluster| sample_cluster(network, cluster, params, rngs))
        .collect()
}

/// Candidate sets of one cluster.
pub(crate) fn sample_cluster(
    network: &SnpNetwork,
    cluster: &[SnpId],
    params: &CommunityWiseParams,
    rngs: &RngPool,
) -> Vec<SnpSet> {
    let mut cluster_sets: BTreeSet<SnpSet> = BTreeSet::new();
    let members: HashSet<SnpId> = cluster.iter().copied().collect();

    if cluster.len() <= params.num_snps_per_set {
        if let Ok(mut set) = SnpSet::from_snps(cluster.iter().copied()) {
            set.set_attribute("SEED_ORIGIN", "COMMUNITY_WISE");
            cluster_sets.insert(set);
        }
        return cluster_sets.into_iter().collect();
    }

    for _ in 0..params.num_sets_per_cluster {
        let start = cluster[rngs.index_below(cluster.len())];
        let mut selected = vec![start];
        let mut add_options: BTreeSet<SnpId> = network
            .adjacent(start)
            .iter()
            .copied()
            .filter(|snp| members.contains(snp) && !selected.contains(snp))
            .collect();

        while selected.len() < params.num_snps_per_set {
            if add_options.is_empty() {
                break;
            }
            let pick = *add_options
                .iter()
                .nth(rngs.index_below(add_options.len()))
                .expect("nonempty checked above");
            add_options.remove(&pick);
            selected.push(pick);
            for &neighbour in network.adjacent(pick) {
                if members.contains(&neighbour) && !selected.contains(&neighbour) {
                    add_options.insert(neighbour);
                }
            }
        }

        if let Ok(mut set) = SnpSet::from_snps(selected) {
            set.set_attribute("SEED_ORIGIN", "COMMUNITY_WISE");
            cluster_sets.insert(set);
        }
    }

    cluster_sets.into_iter().collect()
}

#[cfg(test)]
mod test {
    use super::{
        generate_random_sets, leiden_with_size_constraint, refine_clustering, CommunityWiseParams,
    };
    use crate::common::rng::RngPool;
    use crate::data::snp::{SnpEdge, SnpId};
    use crate::network::SnpNetwork;
    use pretty_assertions::assert_eq;

    fn two_cliques() -> SnpNetwork {
        let mut network = SnpNetwork::new();
        for i in 0..4u32 {
            for j in (i + 1)..4 {
                network
                    .add_edge(SnpEdge::new(SnpId(i), SnpId(j)), "X")
                    .unwrap();
                network
                    .add_edge(SnpEdge::new(SnpId(i + 4), SnpId(j + 4)), "X")
                    .unwrap();
            }
        }
        network
            .add_edge(SnpEdge::new(SnpId(0), SnpId(4)), "X")
            .unwrap();
        network
    }

    #[test]
    fn size_constraint_is_met_when_achievable() {
        let network = two_cliques();
        let rngs = RngPool::with_slots(8, 1);
        let params = CommunityWiseParams {
            max_cluster_size: 4,
            ..CommunityWiseParams::default()
        };
        let (clusters, min_size, max_size) =
            leiden_with_size_constraint(&network, &params, &rngs);
        assert!(max_size <= 4);
        assert!(min_size >= 1);
        let total: usize = clusters.iter().map(|c| c.len()).sum();
        assert_eq!(8, total);
    }

    #[test]
    fn refinement_merges_small_connected_clusters() {
        let mut network = SnpNetwork::new();
        network
            .add_edge(SnpEdge::new(SnpId(0), SnpId(1)), "X")
            .unwrap();
        network
            .add_edge(SnpEdge::new(SnpId(1), SnpId(2)), "X")
            .unwrap();
        let mut clusters = vec![vec![SnpId(0), SnpId(1)], vec![SnpId(2)]];
        refine_clustering(&network, &mut clusters, 4);
        assert_eq!(1, clusters.len());
        assert_eq!(3, clusters[0].len());
    }

    #[test]
    fn refinement_respects_size_cap() {
        let mut network = SnpNetwork::new();
        network
            .add_edge(SnpEdge::new(SnpId(0), SnpId(1)), "X")
            .unwrap();
        network
            .add_edge(SnpEdge::new(SnpId(1), SnpId(2)), "X")
            .unwrap();
        let mut clusters = vec![vec![SnpId(0), SnpId(1)], vec![SnpId(2)]];
        refine_clustering(&network, &mut clusters, 2);
        assert_eq!(2, clusters.len());
    }

    #[test]
    fn small_cluster_becomes_single_candidate() {
        let network = two_cliques();
        let rngs = RngPool::with_slots(21, 1);
        let params = CommunityWiseParams {
            num_snps_per_set: 3,
            ..CommunityWiseParams::default()
        };
        let clusters = vec![vec![SnpId(0), SnpId(1)]];
        let candidates = generate_random_sets(&network, &clusters, &params, &rngs);
        assert_eq!(1, candidates.len());
        assert_eq!(1, candidates[0].len());
        assert_eq!(&[SnpId(0), SnpId(1)], candidates[0][0].snps());
        assert_eq!(
            Some("COMMUNITY_WISE"),
            candidates[0][0].attribute("SEED_ORIGIN")
        );
    }

    #[test]
    fn random_walk_sets_stay_in_cluster() {
        let network = two_cliques();
        let rngs = RngPool::with_slots(33, 1);
        let params = CommunityWiseParams {
            num_snps_per_set: 3,
            num_sets_per_cluster: 10,
            ..CommunityWiseParams::default()
        };
        let cluster: Vec<SnpId> = (0..4).map(SnpId).collect();
        let candidates = generate_random_sets(&network, std::slice::from_ref(&cluster), &params, &rngs);
        for set in &candidates[0] {
            assert_eq!(3, set.len());
            for snp in set.snps() {
                assert!(cluster.contains(snp), "{} escaped the cluster", snp);
            }
        }
    }
}
