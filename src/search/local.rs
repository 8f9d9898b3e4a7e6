//! Simulated-annealing local search over the interaction network.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::common::rng::RngPool;
use crate::data::snp::{SnpEdge, SnpId};
use crate::data::snp_set::SnpSet;
use crate::err::Result;
use crate::network::SnpNetwork;
use crate::score::{EpistasisScore, ScoreEngine};
use crate::search::ld::LdTester;

/// Selectable annealing acceptance rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AnnealingType {
    SimulatedAnnealing,
    RandomAnnealing,
    HyperbolicTanAnnealing,
}

/// Tuning knobs of the local search.
#[derive(Debug, Clone)]
pub struct LocalSearchParams {
    pub model: EpistasisScore,
    pub collapse_identical_results: bool,
    pub max_rounds: usize,
    pub search_time_limit: Option<Duration>,
    pub per_seed_time_limit: Option<Duration>,
    pub annealing_type: AnnealingType,
    pub annealing_start_prob: f64,
    pub annealing_end_prob: f64,
    pub cooling_factor: f64,
    pub min_set: usize,
    pub max_set: usize,
    pub monte_carlo_permutations: Option<usize>,
}

impl Default for LocalSearchParams {
    fn default() -> Self {
        Self {
            model: EpistasisScore::PenetranceNll,
            collapse_identical_results: true,
            max_rounds: 300,
            search_time_limit: None,
            per_seed_time_limit: None,
            annealing_type: AnnealingType::SimulatedAnnealing,
            annealing_start_prob: 0.8,
            annealing_end_prob: 0.01,
            cooling_factor: 1.0,
            min_set: 2,
            max_set: crate::err::MAX_SNP_SET_SIZE,
            monte_carlo_permutations: None,
        }
    }
}

/// Aggregated outcome of one search pass.
#[derive(Debug)]
pub struct SearchOutcome {
    pub results: Vec<SnpSet>,
    /// Best score after each improvement with the time it was reached.
    pub score_over_time: Vec<(f64, Duration)>,
    /// Seeds skipped because of the global deadline or a per-seed error.
    pub num_skipped: usize,
}

enum Move {
    Add(SnpId),
    Delete(SnpId),
    Substitute { delete: SnpId, add: SnpId },
}

/// One candidate tracked during move enumeration.
struct Candidate {
    set: SnpSet,
    score: f64,
    applied: Move,
}

enum StoppingReason {
    Convergence,
    SimulatedAnnealing,
    SeedTimeout,
    SearchTimeout,
}

impl StoppingReason {
    fn as_str(&self) -> &'static str {
        match self {
            StoppingReason::Convergence => "CONVERGENCE",
            StoppingReason::SimulatedAnnealing => "SIMULATED_ANNEALING",
            StoppingReason::SeedTimeout => "SEED_TIMEOUT",
            StoppingReason::SearchTimeout => "SEARCH_TIMEOUT",
        }
    }
}

/// The per-network local search driver.
pub struct LocalSearch<'a> {
    params: LocalSearchParams,
    cooling_factor: f64,
    engine: &'a ScoreEngine,
    network: &'a SnpNetwork,
    rngs: &'a RngPool,
    ld_tester: Option<&'a LdTester>,
}

impl<'a> LocalSearch<'a> {
    pub fn new(
        params: LocalSearchParams,
        engine: &'a ScoreEngine,
        network: &'a SnpNetwork,
        rngs: &'a RngPool,
        ld_tester: Option<&'a LdTester>,
    ) -> Self {
        // with a round limit, derive the cooling factor from the start and
        // end acceptance probabilities
        let cooling_factor = if params.max_rounds > 1 {
            let start = 1.0 / params.annealing_start_prob.ln();
            let end = 1.0 / params.annealing_end_prob.ln();
            (end / start).powf(1.0 / (params.max_rounds - 1) as f64)
        } else {
            params.cooling_factor
        };
        Self {
            params,
            cooling_factor,
            engine,
            network,
            rngs,
            ld_tester,
        }
    }

    /// Refine all seeds in parallel and collapse identical results.
    pub fn run(&self, seeds: Vec<SnpSet>) -> Result<SearchOutcome> {
        let search_start = Instant::now();
        let total_seeds = seeds.len();
        match self.params.search_time_limit {
            Some(limit) => tracing::info!(
                "local search over {} seeds with time limit {:?}",
                total_seeds,
                limit
            ),
            None => tracing::info!("local search over {} seeds without time limit", total_seeds),
        }

        let sense = self.params.model.sense();
        let mut initial_best = match sense {
            crate::score::ModelSense::Minimize => f64::MAX,
            crate::score::ModelSense::Maximize => f64::MIN,
        };
        for seed in &seeds {
            if let Ok(score) = self.engine.evaluate(seed.snps(), self.params.model) {
                if sense.is_better(score, initial_best) {
                    initial_best = score;
                }
            }
        }

        struct Shared {
            finished: usize,
            num_skipped: usize,
            best_score: f64,
            timeline: Vec<(f64, Duration)>,
            results: Vec<SnpSet>,
        }
        let shared = Mutex::new(Shared {
            finished: 0,
            num_skipped: 0,
            best_score: initial_best,
            timeline: vec![(initial_best, Duration::ZERO)],
            results: vec![],
        });

        seeds.into_par_iter().for_each(|seed| {
            let within_deadline = self
                .params
                .search_time_limit
                .map(|limit| search_start.elapsed() < limit)
                .unwrap_or(true);

            let mut outcome = None;
            if within_deadline {
                match self.process_seed(&seed, search_start) {
                    Ok(result) => outcome = Some(result),
                    Err(e) => {
                        // one bad seed must not kill the search
                        tracing::warn!("seed {} failed: {}", seed, e);
                    }
                }
            }

            let mut shared = shared.lock().expect("search state poisoned");
            match outcome {
                Some(mut result) if !result.is_empty() => {
                    if let Ok(score) = self.engine.score_set(&mut result, self.params.model) {
                        if sense.is_better(score, shared.best_score) {
                            shared.best_score = score;
                            shared.timeline.push((score, search_start.elapsed()));
                        }
                    }
                    shared.results.push(result);
                }
                _ => shared.num_skipped += 1,
            }
            shared.finished += 1;
            if shared.finished % 50 == 0 || shared.finished == total_seeds {
                tracing::info!(
                    "local search: {} of {} start points done, current best score {}",
                    shared.finished,
                    total_seeds,
                    shared.best_score
                );
            }
        });

        let shared = shared.into_inner().expect("search state poisoned");
        if self.params.search_time_limit.is_some() {
            tracing::info!(
                "runs skipped due to exceeded search time limit or errors: {}",
                shared.num_skipped
            );
        }

        let mut results = if self.params.collapse_identical_results {
            collapse_results(shared.results)
        } else {
            shared.results
        };

        if let Some(permutations) = self.params.monte_carlo_permutations {
            for result in results.iter_mut() {
                let p = self
                    .engine
                    .monte_carlo_p(result.snps(), self.params.model, permutations)?;
                result.set_attribute("MONTE_CARLO_SCORE", crate::common::format_number(p));
            }
        }

        Ok(SearchOutcome {
            results,
            score_over_time: shared.timeline,
            num_skipped: shared.num_skipped,
        })
    }

    /// Refine one start seed.
    pub(crate) fn process_seed(&self, start_seed: &SnpSet, search_start: Instant) -> Result<SnpSet> {
        let seed_start = Instant::now();
        let sense = self.params.model.sense();
        let mut stopping_reason = StoppingReason::Convergence;

        let mut result = start_seed.clone();

        // grow to the minimal size over the main network
        while result.len() < self.params.min_set {
            let adjacent = self.network.adjacent_of_set(result.snps());
            if adjacent.is_empty() {
                break;
            }
            result.insert(adjacent[self.rngs.index_below(adjacent.len())])?;
        }
        if result.len() < self.params.min_set {
            tracing::debug!("min_set criterion violated for start seed {}", start_seed);
            let mut empty = SnpSet::new();
            empty.set_attribute("STOPPING_REASON", "MIN_SET CRITERION VIOLATED");
            empty.set_attribute("NUM_ROUNDS", "0");
            return Ok(empty);
        }

        // the local subgraph starts as a clique over the seed, so that
        // articulation queries reflect the induced subgraph
        let mut subgraph = SnpNetwork::new();
        subgraph.add_nodes(result.snps().iter().copied());
        for (i, &a) in result.snps().iter().enumerate() {
            for &b in &result.snps()[i + 1..] {
                subgraph.add_edge_unlabeled(SnpEdge::new(a, b));
            }
        }

        let mut delta_sum = 0.0;
        let mut temperature = 1.0 / self.params.annealing_start_prob.ln();
        let mut iterations_without_improvement = 0usize;
        let mut best_result = result.clone();
        let mut best_score = self.engine.score_set(&mut best_result, self.params.model)?;

        let mut round = 1usize;
        while round <= self.params.max_rounds {
            if let Some(limit) = self.params.search_time_limit {
                if search_start.elapsed() >= limit {
                    stopping_reason = StoppingReason::SearchTimeout;
                    break;
                }
            }
            if let Some(limit) = self.params.per_seed_time_limit {
                if seed_start.elapsed() >= limit {
                    stopping_reason = StoppingReason::SeedTimeout;
                    break;
                }
            }

            let previous_score = self.engine.score_set(&mut result, self.params.model)?;
            let mut current_score = previous_score;
            let mut best_move: Option<Candidate> = None;
            let mut second_move: Option<Candidate> = None;

            let track = |candidate: Candidate,
                             current_score: &mut f64,
                             best_move: &mut Option<Candidate>,
                             second_move: &mut Option<Candidate>| {
                if sense.is_better(candidate.score, *current_score) {
                    *current_score = candidate.score;
                    *best_move = Some(candidate);
                } else if second_move
                    .as_ref()
                    .map(|second| sense.is_better(candidate.score, second.score))
                    .unwrap_or(true)
                {
                    *second_move = Some(candidate);
                }
            };

            // members that are no articulation points of the local subgraph
            let articulation_points = subgraph.articulation_points();
            let allowed_to_delete: Vec<SnpId> = result
                .snps()
                .iter()
                .copied()
                .filter(|snp| !articulation_points.contains(snp))
                .collect();

            if result.len() < self.params.max_set {
                for snp in self.network.adjacent_of_set(result.snps()) {
                    if self
                        .ld_tester
                        .map(|tester| tester.rejects(result.snps(), snp))
                        .unwrap_or(false)
                    {
                        continue;
                    }
                    let set = result.with(snp)?;
                    let score = self.engine.evaluate(set.snps(), self.params.model)?;
                    track(
                        Candidate {
                            set,
                            score,
                            applied: Move::Add(snp),
                        },
                        &mut current_score,
                        &mut best_move,
                        &mut second_move,
                    );
                }
            }

            if result.len() > self.params.min_set {
                for &snp in &allowed_to_delete {
                    let set = result.without(snp);
                    let score = self.engine.evaluate(set.snps(), self.params.model)?;
                    track(
                        Candidate {
                            set,
                            score,
                            applied: Move::Delete(snp),
                        },
                        &mut current_score,
                        &mut best_move,
                        &mut second_move,
                    );
                }
            }

            for &delete_snp in &allowed_to_delete {
                let after_delete = result.without(delete_snp);
                for add_snp in self.network.adjacent_of_set(after_delete.snps()) {
                    if add_snp == delete_snp {
                        continue;
                    }
                    // the LD constraint is re-checked against the reduced set
                    if self
                        .ld_tester
                        .map(|tester| tester.rejects(after_delete.snps(), add_snp))
                        .unwrap_or(false)
                    {
                        continue;
                    }
                    let set = after_delete.with(add_snp)?;
                    let score = self.engine.evaluate(set.snps(), self.params.model)?;
                    track(
                        Candidate {
                            set,
                            score,
                            applied: Move::Substitute {
                                delete: delete_snp,
                                add: add_snp,
                            },
                        },
                        &mut current_score,
                        &mut best_move,
                        &mut second_move,
                    );
                }
            }

            let chosen = match best_move {
                Some(best) => {
                    delta_sum += (best.score - previous_score).abs();
                    best
                }
                None => {
                    let Some(second) = second_move else {
                        // out of options
                        break;
                    };
                    let delta = (second.score - previous_score).abs();
                    delta_sum += delta;
                    if !self.annealing_decision(
                        round,
                        second.score,
                        previous_score,
                        delta_sum,
                        temperature,
                        iterations_without_improvement,
                    ) {
                        stopping_reason = StoppingReason::SimulatedAnnealing;
                        break;
                    }
                    iterations_without_improvement += 1;
                    second
                }
            };

            match chosen.applied {
                Move::Add(snp) => self.attach_to_subgraph(&mut subgraph, snp),
                Move::Delete(snp) => subgraph.remove_node(snp),
                Move::Substitute { delete, add } => {
                    subgraph.remove_node(delete);
                    self.attach_to_subgraph(&mut subgraph, add);
                }
            }
            result = chosen.set;
            if sense.is_better(chosen.score, best_score) {
                best_result = result.clone();
                best_score = chosen.score;
            }

            temperature *= self.cooling_factor;
            round += 1;
        }

        best_result.set_attribute("NUM_ROUNDS", round.to_string());
        best_result.set_attribute("STOPPING_REASON", stopping_reason.as_str());
        Ok(best_result)
    }

    /// Add a node to the local subgraph with all its main-network edges to
    /// existing members.
    fn attach_to_subgraph(&self, subgraph: &mut SnpNetwork, snp: SnpId) {
        subgraph.add_node(snp);
        for &other in self.network.adjacent(snp) {
            if subgraph.contains_node(other) {
                subgraph.add_edge_unlabeled(SnpEdge::new(snp, other));
            }
        }
    }

    /// Decide whether the second-best move is accepted.
    fn annealing_decision(
        &self,
        round: usize,
        score_now: f64,
        score_before: f64,
        delta_sum: f64,
        temperature: f64,
        iterations_without_improvement: usize,
    ) -> bool {
        match self.params.annealing_type {
            AnnealingType::RandomAnnealing => {
                self.rngs.unit() > 0.5 && round < self.params.max_rounds.saturating_sub(1)
            }
            AnnealingType::HyperbolicTanAnnealing => {
                let remaining = (self.params.max_rounds - round).max(1) as f64;
                let score_anneal = (score_now - score_before) / remaining;
                let score_normalized = 1.0 - 2.0 / ((2.0 * score_anneal).exp() + 1.0);
                self.rngs.unit() >= score_normalized
            }
            AnnealingType::SimulatedAnnealing => {
                let delta = (score_now - score_before).abs();
                if delta == 0.0 {
                    return false;
                }
                let delta_avg = delta_sum / round as f64;
                let condition = (-delta / (delta_avg * temperature)).exp() - 1.0;
                let random_number = self.rngs.unit();
                random_number > condition
                    || random_number
                        < iterations_without_improvement as f64 / round as f64
            }
        }
    }
}

/// Merge identical result sets, aggregating their attributes per key.
pub(crate) fn collapse_results(results: Vec<SnpSet>) -> Vec<SnpSet> {
    let mut groups: HashMap<SnpSet, Vec<SnpSet>> = HashMap::new();
    for result in results {
        groups.entry(result.clone()).or_default().push(result);
    }

    let mut collapsed: Vec<(SnpSet, Vec<SnpSet>)> = groups.into_iter().collect();
    collapsed.sort_by(|a, b| a.0.cmp(&b.0));

    collapsed
        .into_iter()
        .map(|(representative, members)| {
            let mut merged = representative;
            merged.clear_attributes();
            merged.set_attribute("NUM_MERGED", members.len().to_string());

            let mut keys: Vec<&str> = members
                .iter()
                .flat_map(|member| member.attribute_keys())
                .collect();
            keys.sort_unstable();
            keys.dedup();

            for key in keys {
                let values: Vec<&str> = members
                    .iter()
                    .filter_map(|member| member.attribute(key))
                    .collect();
                aggregate_attribute(&mut merged, key, &values);
            }
            merged
        })
        .collect()
}

/// Typed aggregation of one attribute over a merged group.
fn aggregate_attribute(merged: &mut SnpSet, key: &str, values: &[&str]) {
    let all = values.join(";");

    if let Ok(ints) = values
        .iter()
        .map(|v| v.parse::<i64>())
        .collect::<std::result::Result<Vec<i64>, _>>()
    {
        let sum: i64 = ints.iter().sum();
        let mut distinct = ints.clone();
        distinct.sort_unstable();
        distinct.dedup();
        merged.set_attribute(
            &format!("{}_AVG", key),
            crate::common::format_number(sum as f64 / ints.len() as f64),
        );
        merged.set_attribute(
            &format!("{}_MIN", key),
            ints.iter().min().expect("nonempty").to_string(),
        );
        merged.set_attribute(
            &format!("{}_MAX", key),
            ints.iter().max().expect("nonempty").to_string(),
        );
        merged.set_attribute(
            &format!("{}_DISTINCT", key),
            crate::common::join(distinct.iter(), ";"),
        );
        merged.set_attribute(&format!("{}_ALL", key), all);
    } else if let Ok(floats) = values
        .iter()
        .map(|v| v.parse::<f64>())
        .collect::<std::result::Result<Vec<f64>, _>>()
    {
        let sum: f64 = floats.iter().sum();
        let mut distinct = floats.clone();
        distinct.sort_by(|a, b| a.partial_cmp(b).expect("attribute values are finite"));
        distinct.dedup();
        merged.set_attribute(
            &format!("{}_AVG", key),
            crate::common::format_number(sum / floats.len() as f64),
        );
        merged.set_attribute(
            &format!("{}_MIN", key),
            crate::common::format_number(floats.iter().cloned().fold(f64::MAX, f64::min)),
        );
        merged.set_attribute(
            &format!("{}_MAX", key),
            crate::common::format_number(floats.iter().cloned().fold(f64::MIN, f64::max)),
        );
        merged.set_attribute(
            &format!("{}_DISTINCT", key),
            crate::common::join(distinct.iter().map(|v| crate::common::format_number(*v)), ";"),
        );
        merged.set_attribute(&format!("{}_ALL", key), all);
    } else {
        let mut distinct: Vec<&str> = values.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        merged.set_attribute(&format!("{}_DISTINCT", key), distinct.join(";"));
        merged.set_attribute(&format!("{}_ALL", key), all);
    }
}

#[cfg(test)]
mod test {
    use super::{collapse_results, AnnealingType, LocalSearch, LocalSearchParams};
    use crate::common::rng::RngPool;
    use crate::data::snp::{SnpEdge, SnpId};
    use crate::data::snp_set::SnpSet;
    use crate::network::SnpNetwork;
    use crate::score::{EpistasisScore, ScoreEngine};
    use pretty_assertions::assert_eq;

    fn params(min_set: usize, max_set: usize) -> LocalSearchParams {
        LocalSearchParams {
            model: EpistasisScore::Variance,
            min_set,
            max_set,
            max_rounds: 20,
            annealing_type: AnnealingType::SimulatedAnnealing,
            ..LocalSearchParams::default()
        }
    }

    #[test]
    fn two_node_graph_converges_in_one_round() {
        let engine = ScoreEngine::new(crate::score::test::categorical_instance());
        let mut network = SnpNetwork::new();
        network
            .add_edge(SnpEdge::new(SnpId(0), SnpId(1)), "X")
            .unwrap();
        let rngs = RngPool::with_slots(1234, 8);
        let search = LocalSearch::new(
            LocalSearchParams {
                collapse_identical_results: false,
                ..params(2, 2)
            },
            &engine,
            &network,
            &rngs,
            None,
        );

        let seed = SnpSet::from_snps([SnpId(0), SnpId(1)]).unwrap();
        let outcome = search.run(vec![seed]).unwrap();
        assert_eq!(1, outcome.results.len());
        let result = &outcome.results[0];
        assert_eq!(&[SnpId(0), SnpId(1)], result.snps());
        assert_eq!(Some("CONVERGENCE"), result.attribute("STOPPING_REASON"));
        assert_eq!(Some("1"), result.attribute("NUM_ROUNDS"));
    }

    #[test]
    fn empty_adjacency_violates_min_set() {
        let engine = ScoreEngine::new(crate::score::test::categorical_instance());
        let mut network = SnpNetwork::new();
        network.add_node(SnpId(0));
        let rngs = RngPool::with_slots(1, 8);
        let search = LocalSearch::new(
            LocalSearchParams {
                collapse_identical_results: false,
                ..params(2, 3)
            },
            &engine,
            &network,
            &rngs,
            None,
        );

        let outcome = search.run(vec![SnpSet::singleton(SnpId(0))]).unwrap();
        // the empty result is dropped but counted as skipped
        assert!(outcome.results.is_empty());
        assert_eq!(1, outcome.num_skipped);
    }

    #[test]
    fn min_set_violation_reports_reason() {
        let engine = ScoreEngine::new(crate::score::test::categorical_instance());
        let mut network = SnpNetwork::new();
        network.add_node(SnpId(0));
        let rngs = RngPool::with_slots(1, 8);
        let search = LocalSearch::new(params(2, 3), &engine, &network, &rngs, None);
        let result = search
            .process_seed(&SnpSet::singleton(SnpId(0)), std::time::Instant::now())
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(
            Some("MIN_SET CRITERION VIOLATED"),
            result.attribute("STOPPING_REASON")
        );
        assert_eq!(Some("0"), result.attribute("NUM_ROUNDS"));
    }

    #[test]
    fn warm_up_grows_to_min_set() {
        let engine = ScoreEngine::new(crate::score::test::categorical_instance());
        let mut network = SnpNetwork::new();
        network
            .add_edge(SnpEdge::new(SnpId(0), SnpId(1)), "X")
            .unwrap();
        let rngs = RngPool::with_slots(7, 8);
        let search = LocalSearch::new(params(2, 2), &engine, &network, &rngs, None);
        let outcome = search.run(vec![SnpSet::singleton(SnpId(0))]).unwrap();
        assert_eq!(1, outcome.results.len());
        assert_eq!(&[SnpId(0), SnpId(1)], outcome.results[0].snps());
    }

    #[test]
    fn collapse_aggregates_attributes_by_type() {
        let mut a = SnpSet::from_snps([SnpId(1), SnpId(2)]).unwrap();
        a.set_attribute("NUM_ROUNDS", "3");
        let mut b = SnpSet::from_snps([SnpId(1), SnpId(2)]).unwrap();
        b.set_attribute("NUM_ROUNDS", "5");

        let collapsed = collapse_results(vec![a, b]);
        assert_eq!(1, collapsed.len());
        let merged = &collapsed[0];
        assert_eq!(Some("2"), merged.attribute("NUM_MERGED"));
        assert_eq!(Some("4"), merged.attribute("NUM_ROUNDS_AVG"));
        assert_eq!(Some("3"), merged.attribute("NUM_ROUNDS_MIN"));
        assert_eq!(Some("5"), merged.attribute("NUM_ROUNDS_MAX"));
        assert_eq!(Some("3;5"), merged.attribute("NUM_ROUNDS_ALL"));
        assert_eq!(Some("3;5"), merged.attribute("NUM_ROUNDS_DISTINCT"));
    }

    #[test]
    fn collapse_keeps_distinct_sets_apart() {
        let a = SnpSet::from_snps([SnpId(1)]).unwrap();
        let b = SnpSet::from_snps([SnpId(2)]).unwrap();
        let collapsed = collapse_results(vec![a, b]);
        assert_eq!(2, collapsed.len());
    }

    #[test]
    fn string_attributes_get_distinct_and_all_only() {
        let mut a = SnpSet::from_snps([SnpId(1)]).unwrap();
        a.set_attribute("SEED_ORIGIN", "RANDOM_CONNECTED");
        let mut b = SnpSet::from_snps([SnpId(1)]).unwrap();
        b.set_attribute("SEED_ORIGIN", "RANDOM_CONNECTED");
        let collapsed = collapse_results(vec![a, b]);
        let merged = &collapsed[0];
        assert_eq!(
            Some("RANDOM_CONNECTED"),
            merged.attribute("SEED_ORIGIN_DISTINCT")
        );
        assert_eq!(
            Some("RANDOM_CONNECTED;RANDOM_CONNECTED"),
            merged.attribute("SEED_ORIGIN_ALL")
        );
        assert_eq!(None, merged.attribute("SEED_ORIGIN_AVG"));
    }

    #[test]
    fn deadline_skips_remaining_seeds() {
        let engine = ScoreEngine::new(crate::score::test::categorical_instance());
        let mut network = SnpNetwork::new();
        network
            .add_edge(SnpEdge::new(SnpId(0), SnpId(1)), "X")
            .unwrap();
        let rngs = RngPool::with_slots(3, 8);
        let search = LocalSearch::new(
            LocalSearchParams {
                search_time_limit: Some(std::time::Duration::ZERO),
                ..params(2, 2)
            },
            &engine,
            &network,
            &rngs,
            None,
        );
        let seeds = vec![
            SnpSet::from_snps([SnpId(0), SnpId(1)]).unwrap(),
            SnpSet::from_snps([SnpId(0), SnpId(1)]).unwrap(),
        ];
        let outcome = search.run(seeds).unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(2, outcome.num_skipped);
    }
}
