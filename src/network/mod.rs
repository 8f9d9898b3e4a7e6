//! The labeled, undirected SNP-SNP interaction network.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use rand::rngs::StdRng;

use crate::data::snp::{SnpEdge, SnpId};
use crate::err::{Error, Result, MAX_EDGE_LABELS};

pub mod canonical;
pub mod shuffle;

use canonical::CanonicalGraph;

static NO_NEIGHBOURS: &[SnpId] = &[];

/// A mutable undirected graph over SNP ids.
///
/// Edges carry the set of labels they were inserted under as a 64-bit
/// bitmask.  The canonical form consumed by the graph algorithms is built
/// lazily and invalidated by every structural mutation.
#[derive(Debug, Default)]
pub struct SnpNetwork {
    adjacency: IndexMap<SnpId, Vec<SnpId>>,
    edges: HashMap<u64, u64>,
    labels: Vec<String>,
    label_map: HashMap<String, u8>,
    canonical: RwLock<Option<Arc<CanonicalGraph>>>,
}

impl Clone for SnpNetwork {
    fn clone(&self) -> Self {
        Self {
            adjacency: self.adjacency.clone(),
            edges: self.edges.clone(),
            labels: self.labels.clone(),
            label_map: self.label_map.clone(),
            canonical: RwLock::new(None),
        }
    }
}

impl SnpNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn invalidate(&mut self) {
        *self.canonical.get_mut().expect("canonical lock poisoned") = None;
    }

    /// Intern an edge label; at most [`MAX_EDGE_LABELS`] distinct labels may
    /// exist per network.
    pub fn label_id(&mut self, label: &str) -> Result<u8> {
        if let Some(&id) = self.label_map.get(label) {
            return Ok(id);
        }
        if self.labels.len() >= MAX_EDGE_LABELS {
            return Err(Error::LabelCapacity(label.to_string()));
        }
        let id = self.labels.len() as u8;
        self.labels.push(label.to_string());
        self.label_map.insert(label.to_string(), id);
        Ok(id)
    }

    /// All label strings registered so far, in id order.
    pub fn all_edge_labels(&self) -> &[String] {
        &self.labels
    }

    pub fn add_node(&mut self, snp: SnpId) {
        self.adjacency.entry(snp).or_default();
        self.invalidate();
    }

    pub fn add_nodes(&mut self, snps: impl IntoIterator<Item = SnpId>) {
        for snp in snps {
            self.adjacency.entry(snp).or_default();
        }
        self.invalidate();
    }

    /// Insert an edge under a label; missing endpoints are added, self-loops
    /// silently dropped.  Re-inserting ORs the label bit into the mask.
    pub fn add_edge(&mut self, edge: SnpEdge, label: &str) -> Result<()> {
        let id = self.label_id(label)?;
        self.insert_edge_mask(edge, 1u64 << id);
        Ok(())
    }

    /// Insert an edge under label id 0 without registering a label string.
    ///
    /// Used for synthetic graphs (local search subgraphs, clique edges) whose
    /// labels are never queried.
    pub fn add_edge_unlabeled(&mut self, edge: SnpEdge) {
        self.insert_edge_mask(edge, 1);
    }

    fn insert_edge_mask(&mut self, edge: SnpEdge, mask: u64) {
        if edge.is_loop() {
            return;
        }
        let (a, b) = (edge.first(), edge.second());
        match self.edges.entry(edge.key()) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                *entry.get_mut() |= mask;
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(mask);
                self.adjacency.entry(a).or_default().push(b);
                self.adjacency.entry(b).or_default().push(a);
            }
        }
        self.invalidate();
    }

    pub fn remove_edge(&mut self, edge: SnpEdge) {
        if self.edges.remove(&edge.key()).is_some() {
            let (a, b) = (edge.first(), edge.second());
            if let Some(neighbours) = self.adjacency.get_mut(&a) {
                neighbours.retain(|&snp| snp != b);
            }
            if let Some(neighbours) = self.adjacency.get_mut(&b) {
                neighbours.retain(|&snp| snp != a);
            }
            self.invalidate();
        }
    }

    /// Remove a node together with all incident edges.
    pub fn remove_node(&mut self, snp: SnpId) {
        if let Some(neighbours) = self.adjacency.shift_remove(&snp) {
            for other in neighbours {
                self.edges.remove(&SnpEdge::new(snp, other).key());
                if let Some(list) = self.adjacency.get_mut(&other) {
                    list.retain(|&s| s != snp);
                }
            }
            self.invalidate();
        }
    }

    pub fn clear(&mut self) {
        self.adjacency.clear();
        self.edges.clear();
        self.invalidate();
    }

    /// Remove all edges, keeping the vertex set.
    pub fn clear_edges(&mut self) {
        for (_, neighbours) in self.adjacency.iter_mut() {
            neighbours.clear();
        }
        self.edges.clear();
        self.invalidate();
    }

    pub fn contains_node(&self, snp: SnpId) -> bool {
        self.adjacency.contains_key(&snp)
    }

    pub fn edge_exists(&self, edge: SnpEdge) -> bool {
        self.edges.contains_key(&edge.key())
    }

    pub fn degree(&self, snp: SnpId) -> usize {
        self.adjacency.get(&snp).map(|n| n.len()).unwrap_or(0)
    }

    pub fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Neighbours of a SNP; empty if the SNP is not in the network.
    pub fn adjacent(&self, snp: SnpId) -> &[SnpId] {
        self.adjacency
            .get(&snp)
            .map(|n| n.as_slice())
            .unwrap_or(NO_NEIGHBOURS)
    }

    /// Neighbours of any SNP in the set, excluding the set itself; sorted and
    /// deduplicated.
    pub fn adjacent_of_set(&self, snps: &[SnpId]) -> Vec<SnpId> {
        let mut result: Vec<SnpId> = snps
            .iter()
            .flat_map(|&snp| self.adjacent(snp).iter().copied())
            .filter(|snp| !snps.contains(snp))
            .collect();
        result.sort_unstable();
        result.dedup();
        result
    }

    /// All incident edges of a SNP with their label masks.
    pub fn adjacent_edges(&self, snp: SnpId) -> Vec<(SnpEdge, u64)> {
        self.adjacent(snp)
            .iter()
            .map(|&other| {
                let edge = SnpEdge::new(snp, other);
                (edge, self.edges[&edge.key()])
            })
            .collect()
    }

    /// The full adjacency list, in node insertion order.
    pub fn adjacency_list(&self) -> Vec<(SnpId, Vec<SnpId>)> {
        self.adjacency
            .iter()
            .map(|(&snp, neighbours)| (snp, neighbours.clone()))
            .collect()
    }

    /// Label ids of an edge.
    pub fn edge_label_ids(&self, edge: SnpEdge) -> Result<Vec<u8>> {
        let mask = self
            .edges
            .get(&edge.key())
            .ok_or_else(|| Error::NotFound(format!("edge {}", edge)))?;
        Ok((0..MAX_EDGE_LABELS as u8)
            .filter(|id| mask & (1u64 << id) != 0)
            .collect())
    }

    /// Label strings of an edge; bits without a registered string are
    /// skipped.
    pub fn edge_labels(&self, edge: SnpEdge) -> Result<Vec<String>> {
        Ok(self
            .edge_label_ids(edge)?
            .into_iter()
            .filter_map(|id| self.labels.get(id as usize).cloned())
            .collect())
    }

    /// Iterate over all SNPs in the network.
    pub fn snps(&self) -> impl Iterator<Item = SnpId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Iterate over all edges with their label masks.
    pub fn edges(&self) -> impl Iterator<Item = (SnpEdge, u64)> + '_ {
        self.adjacency.keys().flat_map(move |&snp| {
            self.adjacent(snp)
                .iter()
                .filter(move |&&other| snp < other)
                .map(move |&other| {
                    let edge = SnpEdge::new(snp, other);
                    (edge, self.edges[&edge.key()])
                })
        })
    }

    /// Change the SNP ids carried by vertices while preserving adjacency.
    ///
    /// For each pair, when both ids exist their identities are swapped; when
    /// only one exists it is renamed to the other id.  Edge keys are
    /// regenerated from the moved identities.
    pub fn replace_nodes(&mut self, pairs: &[(SnpId, SnpId)]) {
        for &(a, b) in pairs {
            let a_in = self.contains_node(a);
            let b_in = self.contains_node(b);
            match (a_in, b_in) {
                (true, true) => {
                    let a_edges = self.adjacent_edges(a);
                    let b_edges = self.adjacent_edges(b);
                    self.remove_node(a);
                    self.remove_node(b);
                    self.add_node(a);
                    self.add_node(b);
                    self.readd_renamed(&a_edges, a, b);
                    self.readd_renamed(&b_edges, b, a);
                }
                (true, false) => self.rename_node(a, b),
                (false, true) => self.rename_node(b, a),
                (false, false) => {}
            }
        }
        self.invalidate();
    }

    fn rename_node(&mut self, from: SnpId, to: SnpId) {
        let edges = self.adjacent_edges(from);
        self.remove_node(from);
        self.add_node(to);
        self.readd_renamed(&edges, from, to);
    }

    fn readd_renamed(&mut self, edges: &[(SnpEdge, u64)], from: SnpId, to: SnpId) {
        for &(edge, mask) in edges {
            let other = if edge.first() == from {
                edge.second()
            } else {
                edge.first()
            };
            // an edge between the swapped pair keeps connecting it
            let other = if other == to { from } else { other };
            self.insert_edge_mask(SnpEdge::new(to, other), mask);
        }
    }

    /// The canonical form for library-driven algorithms; rebuilt lazily after
    /// mutations.
    pub(crate) fn canonical(&self) -> Arc<CanonicalGraph> {
        {
            let cache = self.canonical.read().expect("canonical lock poisoned");
            if let Some(canonical) = cache.as_ref() {
                return Arc::clone(canonical);
            }
        }
        let built = Arc::new(CanonicalGraph::build(
            self.snps(),
            self.edges().map(|(edge, _)| edge),
        ));
        let mut cache = self.canonical.write().expect("canonical lock poisoned");
        cache.get_or_insert(built).clone()
    }

    /// SNPs whose removal disconnects the network.
    pub fn articulation_points(&self) -> Vec<SnpId> {
        canonical::articulation_points(&self.canonical())
    }

    pub fn is_connected(&self) -> bool {
        canonical::is_connected(&self.canonical())
    }

    /// Longest shortest path over connected node pairs.
    pub fn diameter(&self) -> i64 {
        canonical::diameter(&self.canonical())
    }

    /// Partition the network with Leiden community detection.
    pub fn cluster_leiden(
        &self,
        resolution: f64,
        beta: f64,
        max_steps: usize,
        rng: &mut StdRng,
    ) -> Vec<Vec<SnpId>> {
        canonical::leiden(&self.canonical(), resolution, beta, max_steps, rng)
    }
}
