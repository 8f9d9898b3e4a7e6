//! Canonical graph form and the algorithms running on it.
//!
//! The mutable [`super::SnpNetwork`] converts lazily into a petgraph
//! representation for library-driven queries; vertex descriptors never leave
//! this module.

use std::collections::HashMap;
use std::collections::VecDeque;

use petgraph::graph::{NodeIndex, UnGraph};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::snp::{SnpEdge, SnpId};

/// Immutable canonical adjacency form of a SNP network.
#[derive(Debug)]
pub(crate) struct CanonicalGraph {
    graph: UnGraph<SnpId, ()>,
}

impl CanonicalGraph {
    pub(crate) fn build(
        nodes: impl Iterator<Item = SnpId>,
        edges: impl Iterator<Item = SnpEdge>,
    ) -> Self {
        let mut graph = UnGraph::default();
        let mut index_of = HashMap::new();
        for snp in nodes {
            let index = graph.add_node(snp);
            index_of.insert(snp, index);
        }
        for edge in edges {
            graph.add_edge(index_of[&edge.first()], index_of[&edge.second()], ());
        }
        Self { graph }
    }

    fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// Neighbour lists indexed by dense node position.
    fn neighbour_lists(&self) -> Vec<Vec<usize>> {
        self.graph
            .node_indices()
            .map(|v| self.graph.neighbors(v).map(|w| w.index()).collect())
            .collect()
    }

    fn snp_at(&self, position: usize) -> SnpId {
        self.graph[NodeIndex::new(position)]
    }
}

pub(crate) fn is_connected(canonical: &CanonicalGraph) -> bool {
    petgraph::algo::connected_components(&canonical.graph) <= 1
}

/// Longest shortest path over all connected node pairs.
pub(crate) fn diameter(canonical: &CanonicalGraph) -> i64 {
    let adjacency = canonical.neighbour_lists();
    let n = adjacency.len();
    let mut best = 0i64;
    let mut distance = vec![usize::MAX; n];
    for start in 0..n {
        distance.iter_mut().for_each(|d| *d = usize::MAX);
        distance[start] = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            for &w in &adjacency[v] {
                if distance[w] == usize::MAX {
                    distance[w] = distance[v] + 1;
                    best = best.max(distance[w] as i64);
                    queue.push_back(w);
                }
            }
        }
    }
    best
}

/// SNPs whose removal increases the number of connected components.
///
/// Iterative Tarjan lowpoint computation.
pub(crate) fn articulation_points(canonical: &CanonicalGraph) -> Vec<SnpId> {
    let adjacency = canonical.neighbour_lists();
    let n = adjacency.len();
    let mut disc = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut parent = vec![usize::MAX; n];
    let mut is_cut = vec![false; n];
    let mut timer = 0usize;

    for root in 0..n {
        if disc[root] != usize::MAX {
            continue;
        }
        let mut root_children = 0usize;
        // stack of (node, next neighbour offset)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        disc[root] = timer;
        low[root] = timer;
        timer += 1;

        while let Some(&mut (v, offset)) = stack.last_mut() {
            if offset < adjacency[v].len() {
                stack.last_mut().expect("frame present").1 += 1;
                let w = adjacency[v][offset];
                if disc[w] == usize::MAX {
                    parent[w] = v;
                    disc[w] = timer;
                    low[w] = timer;
                    timer += 1;
                    if v == root {
                        root_children += 1;
                    }
                    stack.push((w, 0));
                } else if w != parent[v] {
                    low[v] = low[v].min(disc[w]);
                }
            } else {
                stack.pop();
                if let Some(&(u, _)) = stack.last() {
                    low[u] = low[u].min(low[v]);
                    if u != root && low[v] >= disc[u] {
                        is_cut[u] = true;
                    }
                }
            }
        }
        if root_children > 1 {
            is_cut[root] = true;
        }
    }

    (0..n)
        .filter(|&v| is_cut[v])
        .map(|v| canonical.snp_at(v))
        .collect()
}

/// Modularity-based Leiden partition.
///
/// Runs local moving plus aggregation rounds until the modularity score fails
/// to improve or `max_steps` is reached.  `resolution` is the usual gamma
/// parameter; `beta` controls randomized selection among near-equally good
/// moves.
pub(crate) fn leiden(
    canonical: &CanonicalGraph,
    resolution: f64,
    beta: f64,
    max_steps: usize,
    rng: &mut StdRng,
) -> Vec<Vec<SnpId>> {
    let n = canonical.num_nodes();
    if n == 0 {
        return vec![];
    }

    // membership of the original nodes, refined level by level
    let mut membership: Vec<usize> = (0..n).collect();
    let mut level = Level::from_lists(canonical.neighbour_lists());
    let mut best_modularity = f64::NEG_INFINITY;

    for _ in 0..max_steps.max(1) {
        let communities = level.local_moving(resolution, beta, rng);
        let modularity = level.modularity(&communities, resolution);
        if modularity <= best_modularity + 1e-9 {
            break;
        }
        best_modularity = modularity;
        let renumbered = renumber(&communities);
        for slot in membership.iter_mut() {
            *slot = renumbered[*slot];
        }
        level = level.aggregate(&renumbered);
        if level.num_nodes() == 1 {
            break;
        }
    }

    let num_clusters = membership.iter().max().map(|&c| c + 1).unwrap_or(0);
    let mut clusters = vec![vec![]; num_clusters];
    for (node, &community) in membership.iter().enumerate() {
        clusters[community].push(canonical.snp_at(node));
    }
    clusters.retain(|c| !c.is_empty());
    clusters
}

/// One aggregation level of the Leiden loop: a weighted multigraph.
struct Level {
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
    strength: Vec<f64>,
    total_weight: f64,
}

impl Level {
    fn from_lists(lists: Vec<Vec<usize>>) -> Self {
        let adjacency: Vec<Vec<(usize, f64)>> = lists
            .into_iter()
            .map(|neighbours| neighbours.into_iter().map(|w| (w, 1.0)).collect())
            .collect();
        Self::finish(adjacency, Vec::new())
    }

    fn finish(adjacency: Vec<Vec<(usize, f64)>>, mut self_loops: Vec<f64>) -> Self {
        self_loops.resize(adjacency.len(), 0.0);
        let strength: Vec<f64> = adjacency
            .iter()
            .zip(&self_loops)
            .map(|(neighbours, &sl)| neighbours.iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * sl)
            .collect();
        let total_weight = strength.iter().sum::<f64>() / 2.0;
        Self {
            adjacency,
            self_loops,
            strength,
            total_weight,
        }
    }

    fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    /// Move nodes between communities until no positive-gain move remains.
    fn local_moving(&self, resolution: f64, beta: f64, rng: &mut StdRng) -> Vec<usize> {
        let n = self.num_nodes();
        let mut community: Vec<usize> = (0..n).collect();
        let mut community_strength: Vec<f64> = self.strength.clone();
        if self.total_weight <= 0.0 {
            return community;
        }
        let two_m = 2.0 * self.total_weight;

        let mut order: Vec<usize> = (0..n).collect();
        let mut improved = true;
        while improved {
            improved = false;
            order.shuffle(rng);
            for &v in &order {
                let own = community[v];
                // weights from v into each adjacent community
                let mut weight_to: HashMap<usize, f64> = HashMap::new();
                for &(w, weight) in &self.adjacency[v] {
                    *weight_to.entry(community[w]).or_insert(0.0) += weight;
                }
                let to_own = weight_to.get(&own).copied().unwrap_or(0.0);
                community_strength[own] -= self.strength[v];

                let mut candidates: Vec<(usize, f64)> = vec![];
                let mut best_gain = 0.0f64;
                for (&target, &weight) in weight_to.iter() {
                    if target == own {
                        continue;
                    }
                    let gain = (weight - to_own) / self.total_weight
                        - resolution * self.strength[v]
                            * (community_strength[target] - community_strength[own])
                            / (two_m * self.total_weight);
                    if gain > 1e-12 {
                        candidates.push((target, gain));
                        best_gain = best_gain.max(gain);
                    }
                }
                // beta-randomized choice among near-best moves
                let threshold = best_gain * (1.0 - beta.clamp(0.0, 1.0));
                candidates.retain(|&(_, gain)| gain >= threshold);
                let choice = match candidates.len() {
                    0 => None,
                    1 => Some(candidates[0].0),
                    len => Some(candidates[rng.gen_range(0..len)].0),
                };

                if let Some(target) = choice {
                    community[v] = target;
                    community_strength[target] += self.strength[v];
                    improved = true;
                } else {
                    community_strength[own] += self.strength[v];
                }
            }
        }
        community
    }

    fn modularity(&self, community: &[usize], resolution: f64) -> f64 {
        if self.total_weight <= 0.0 {
            return 0.0;
        }
        let num_communities = community.iter().max().map(|&c| c + 1).unwrap_or(0);
        let mut internal = vec![0.0f64; num_communities];
        let mut degree_sum = vec![0.0f64; num_communities];
        for v in 0..self.num_nodes() {
            degree_sum[community[v]] += self.strength[v];
            internal[community[v]] += 2.0 * self.self_loops[v];
            for &(w, weight) in &self.adjacency[v] {
                if community[w] == community[v] {
                    internal[community[v]] += weight;
                }
            }
        }
        let two_m = 2.0 * self.total_weight;
        (0..num_communities)
            .map(|c| {
                internal[c] / two_m - resolution * (degree_sum[c] / two_m).powi(2)
            })
            .sum()
    }

    /// Collapse communities into single nodes.
    fn aggregate(&self, renumbered: &[usize]) -> Level {
        let num_communities = renumbered.iter().max().map(|&c| c + 1).unwrap_or(0);
        let mut self_loops = vec![0.0f64; num_communities];
        let mut weights: Vec<HashMap<usize, f64>> = vec![HashMap::new(); num_communities];
        for v in 0..self.num_nodes() {
            let cv = renumbered[v];
            self_loops[cv] += self.self_loops[v];
            for &(w, weight) in &self.adjacency[v] {
                let cw = renumbered[w];
                if cw == cv {
                    // every internal edge is seen from both endpoints
                    self_loops[cv] += weight / 2.0;
                } else {
                    *weights[cv].entry(cw).or_insert(0.0) += weight;
                }
            }
        }
        let adjacency = weights
            .into_iter()
            .map(|map| map.into_iter().collect())
            .collect();
        Level::finish(adjacency, self_loops)
    }
}

fn renumber(community: &[usize]) -> Vec<usize> {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    community
        .iter()
        .map(|&c| {
            let next = mapping.len();
            *mapping.entry(c).or_insert(next)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::CanonicalGraph;
    use crate::data::snp::{SnpEdge, SnpId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn graph(nodes: &[u32], edges: &[(u32, u32)]) -> CanonicalGraph {
        CanonicalGraph::build(
            nodes.iter().map(|&n| SnpId(n)),
            edges
                .iter()
                .map(|&(a, b)| SnpEdge::new(SnpId(a), SnpId(b))),
        )
    }

    #[test]
    fn connectivity() {
        let connected = graph(&[0, 1, 2], &[(0, 1), (1, 2)]);
        assert!(super::is_connected(&connected));
        let split = graph(&[0, 1, 2, 3], &[(0, 1), (2, 3)]);
        assert!(!super::is_connected(&split));
    }

    #[test]
    fn diameter_of_path() {
        let path = graph(&[0, 1, 2, 3], &[(0, 1), (1, 2), (2, 3)]);
        assert_eq!(3, super::diameter(&path));
        let triangle = graph(&[0, 1, 2], &[(0, 1), (1, 2), (0, 2)]);
        assert_eq!(1, super::diameter(&triangle));
    }

    #[test]
    fn articulation_points_of_bridge() {
        // two triangles joined through node 2
        let g = graph(
            &[0, 1, 2, 3, 4],
            &[(0, 1), (1, 2), (0, 2), (2, 3), (3, 4), (2, 4)],
        );
        assert_eq!(vec![SnpId(2)], super::articulation_points(&g));
    }

    #[test]
    fn articulation_points_of_path() {
        let g = graph(&[0, 1, 2], &[(0, 1), (1, 2)]);
        assert_eq!(vec![SnpId(1)], super::articulation_points(&g));
    }

    #[test]
    fn complete_graph_has_no_articulation_points() {
        let g = graph(&[0, 1, 2, 3], &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert!(super::articulation_points(&g).is_empty());
    }

    #[test]
    fn leiden_separates_two_cliques() {
        // two K4 cliques connected by a single edge
        let mut edges = vec![];
        for i in 0..4u32 {
            for j in (i + 1)..4 {
                edges.push((i, j));
                edges.push((i + 4, j + 4));
            }
        }
        edges.push((0, 4));
        let g = graph(&(0..8).collect::<Vec<_>>(), &edges);
        let mut rng = StdRng::seed_from_u64(17);
        let mut clusters = super::leiden(&g, 1.0, 0.01, 10, &mut rng);
        for cluster in clusters.iter_mut() {
            cluster.sort();
        }
        clusters.sort();
        assert_eq!(2, clusters.len());
        assert_eq!(
            vec![SnpId(0), SnpId(1), SnpId(2), SnpId(3)],
            clusters[0]
        );
        assert_eq!(
            vec![SnpId(4), SnpId(5), SnpId(6), SnpId(7)],
            clusters[1]
        );
    }

    #[test]
    fn leiden_high_resolution_gives_singletons() {
        let g = graph(&[0, 1, 2, 3], &[(0, 1), (2, 3)]);
        let mut rng = StdRng::seed_from_u64(3);
        let clusters = super::leiden(&g, 100.0, 0.01, 10, &mut rng);
        assert_eq!(4, clusters.len());
    }
}
