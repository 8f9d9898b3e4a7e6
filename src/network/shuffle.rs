//! Node-preserving network shuffling.
//!
//! All four methods keep the vertex set; the topology-preserving ones also
//! keep the edge structure and only permute which SNP sits on which vertex,
//! the expected-degree ones rewire edges with endpoint probability
//! proportional to the original degrees.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::repeater::RepeaterList;
use crate::data::snp::{SnpEdge, SnpId};
use crate::network::SnpNetwork;

/// Edge label attached to rewired edges.
const SHUFFLE_LABEL: &str = "NET_SHUFFLE";

/// Selectable shuffle method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ShuffleMethod {
    /// Permute SNPs within equal-degree buckets; topology unchanged.
    TopologyPreservingWithSnpDegree,
    /// Permute SNPs in one global bucket; topology unchanged.
    TopologyPreservingWithoutSnpDegree,
    /// Permute SNPs globally, then rewire under the expected-degree model.
    ExpectedDegreeKeepDegreeDistribution,
    /// Rewire under the expected-degree model with each SNP's own degree.
    ExpectedDegreeKeepIndividualDegree,
}

/// Shuffle the network in place and log how much it changed.
pub fn shuffle_network(network: &mut SnpNetwork, method: ShuffleMethod, rng: &mut StdRng) {
    tracing::info!("shuffling network with method {}", method);
    let initial = network.clone();
    match method {
        ShuffleMethod::TopologyPreservingWithSnpDegree => {
            shuffle_topology_preserving(network, true, rng)
        }
        ShuffleMethod::TopologyPreservingWithoutSnpDegree => {
            shuffle_topology_preserving(network, false, rng)
        }
        ShuffleMethod::ExpectedDegreeKeepDegreeDistribution => {
            shuffle_topology_preserving(network, false, rng);
            shuffle_expected_degree(network, rng);
        }
        ShuffleMethod::ExpectedDegreeKeepIndividualDegree => {
            shuffle_expected_degree(network, rng)
        }
    }
    analyze_shuffle(&initial, network);
}

/// Bucket SNPs by degree (or into one bucket), permute within each bucket,
/// and remap ids.
fn shuffle_topology_preserving(
    network: &mut SnpNetwork,
    preserve_snp_degree: bool,
    rng: &mut StdRng,
) {
    let mut degree_bins: std::collections::HashMap<usize, Vec<SnpId>> =
        std::collections::HashMap::new();
    for snp in network.snps() {
        let degree = if preserve_snp_degree {
            network.degree(snp)
        } else {
            0
        };
        degree_bins.entry(degree).or_default().push(snp);
    }

    let mut num_changed = 0usize;
    let mut num_same = 0usize;
    let mut replacement_pairs = vec![];
    for bin in degree_bins.values() {
        let mut targets = bin.clone();
        targets.shuffle(rng);
        for (&old, &new) in bin.iter().zip(&targets) {
            if old == new {
                num_same += 1;
            } else {
                num_changed += 1;
                replacement_pairs.push((old, new));
            }
        }
    }
    network.replace_nodes(&replacement_pairs);

    tracing::info!(
        "shuffled SNPs: {} changed, {} unchanged",
        num_changed,
        num_same
    );
}

/// Rewire all edges, drawing endpoints from a degree-weighted multiset.
///
/// Draws two SNPs from different groups of the repeater list, inserts the
/// edge when it is new and decrements both group counts.  Stops after
/// restoring the original edge count or after as many consecutive failures.
fn shuffle_expected_degree(network: &mut SnpNetwork, rng: &mut StdRng) {
    let target_edges = network.num_edges();
    if target_edges == 0 {
        return;
    }

    let mut node_degrees: Vec<(SnpId, usize)> = network
        .snps()
        .map(|snp| (snp, network.degree(snp)))
        .filter(|&(_, degree)| degree > 0)
        .collect();
    node_degrees.shuffle(rng);
    let mut node_list = RepeaterList::new(node_degrees);

    network.clear_edges();

    let mut num_successful = 0usize;
    let mut consecutive_failed = 0usize;
    while num_successful < target_edges && consecutive_failed < target_edges {
        if node_list.len() < 2 {
            break;
        }
        let snp1_pos = rng.gen_range(0..node_list.len());
        let group_start = node_list.group_start(snp1_pos);
        let group_end = node_list.group_end(snp1_pos);
        let group_size = group_end - group_start + 1;
        if node_list.len() <= group_size {
            break;
        }
        let mut snp2_pos = rng.gen_range(0..node_list.len() - group_size);
        if snp2_pos >= group_start {
            snp2_pos += group_size;
        }

        let snp1 = *node_list.get(snp1_pos);
        let snp2 = *node_list.get(snp2_pos);
        let edge = SnpEdge::new(snp1, snp2);
        if network.edge_exists(edge) {
            consecutive_failed += 1;
            continue;
        }
        network
            .add_edge(edge, SHUFFLE_LABEL)
            .expect("shuffle label fits the capacity");
        node_list.erase(snp1_pos.max(snp2_pos));
        node_list.erase(snp1_pos.min(snp2_pos));
        num_successful += 1;
        consecutive_failed = 0;
    }
    tracing::info!(
        "rewired {} of {} edges ({} left unplaced)",
        num_successful,
        target_edges,
        target_edges - num_successful
    );
}

/// Compare the shuffled network against the initial one and log the degree
/// and edge overlap statistics.
fn analyze_shuffle(initial: &SnpNetwork, shuffled: &SnpNetwork) {
    let mut num_degree_changed = 0usize;
    let mut total_change = 0f64;
    let mut total_change_abs = 0f64;
    let mut edges_found = 0usize;
    let mut edges_unchanged = 0usize;
    for snp in shuffled.snps() {
        let old_degree = initial.degree(snp);
        let new_degree = shuffled.degree(snp);
        if old_degree != new_degree {
            num_degree_changed += 1;
            let diff = new_degree as f64 - old_degree as f64;
            total_change += diff;
            total_change_abs += diff.abs();
        }
        edges_found += new_degree;
        edges_unchanged += shuffled
            .adjacent(snp)
            .iter()
            .filter(|&&other| initial.edge_exists(SnpEdge::new(snp, other)))
            .count();
    }
    let num_nodes = shuffled.num_nodes().max(1) as f64;
    tracing::info!(
        "degree change: num. nodes: {}, avg. change: {:.4}, avg. abs. change: {:.4}",
        num_degree_changed,
        total_change / num_nodes,
        total_change_abs / num_nodes
    );
    tracing::info!(
        "unchanged edges: {} of {}",
        edges_unchanged / 2,
        edges_found / 2
    );
}
