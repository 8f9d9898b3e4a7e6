//! Random connected-pair seeding.

use crate::common::rng::RngPool;
use crate::data::snp_set::SnpSet;
use crate::network::SnpNetwork;
use std::collections::HashSet;

/// Draw up to `num_seeds` disjoint connected SNP pairs from the network.
///
/// Every picked SNP is marked used for the rest of the run, so the resulting
/// pairs share no SNPs.
pub fn run(network: &SnpNetwork, num_seeds: usize, rngs: &RngPool) -> Vec<SnpSet> {
    let mut seeds = vec![];
    let mut used = HashSet::new();
    let mut pool: Vec<_> = network.snps().collect();

    while !pool.is_empty() && seeds.len() < num_seeds {
        let first = pool.swap_remove(rngs.index_below(pool.len()));
        if used.contains(&first) {
            continue;
        }
        let mut neighbours = network.adjacent(first).to_vec();
        while !neighbours.is_empty() {
            let second = neighbours.swap_remove(rngs.index_below(neighbours.len()));
            if used.contains(&second) {
                continue;
            }
            let mut seed = SnpSet::from_snps([first, second]).expect("a pair fits the cap");
            seed.set_attribute("SEED_ORIGIN", "RANDOM_CONNECTED");
            seeds.push(seed);
            used.insert(first);
            used.insert(second);
            break;
        }
    }

    tracing::info!("seeding with method RANDOM_CONNECTED produced {} seeds", seeds.len());
    seeds
}

#[cfg(test)]
mod test {
    use super::run;
    use crate::common::rng::RngPool;
    use crate::data::snp::{SnpEdge, SnpId};
    use crate::data::snp_set::SnpSet;
    use crate::network::SnpNetwork;
    use pretty_assertions::assert_eq;

    #[test]
    fn two_disjoint_edges_yield_both_pairs() {
        let mut network = SnpNetwork::new();
        network
            .add_edge(SnpEdge::new(SnpId(0), SnpId(1)), "X")
            .unwrap();
        network
            .add_edge(SnpEdge::new(SnpId(2), SnpId(3)), "X")
            .unwrap();

        let rngs = RngPool::with_slots(1234, 1);
        let mut seeds = run(&network, 2, &rngs);
        seeds.sort();
        assert_eq!(
            vec![
                SnpSet::from_snps([SnpId(0), SnpId(1)]).unwrap(),
                SnpSet::from_snps([SnpId(2), SnpId(3)]).unwrap(),
            ],
            seeds
        );
        assert_eq!(Some("RANDOM_CONNECTED"), seeds[0].attribute("SEED_ORIGIN"));
    }

    #[test]
    fn picked_snps_are_not_reused() {
        // a star: only one pair can be drawn
        let mut network = SnpNetwork::new();
        for other in 1..=4 {
            network
                .add_edge(SnpEdge::new(SnpId(0), SnpId(other)), "X")
                .unwrap();
        }
        let rngs = RngPool::with_slots(99, 1);
        let seeds = run(&network, 4, &rngs);
        assert_eq!(1, seeds.len());
    }

    #[test]
    fn isolated_nodes_yield_no_seeds() {
        let mut network = SnpNetwork::new();
        network.add_node(SnpId(0));
        network.add_node(SnpId(1));
        let rngs = RngPool::with_slots(5, 1);
        assert!(run(&network, 3, &rngs).is_empty());
    }
}
