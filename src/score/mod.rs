//! Epistasis score models and the engine dispatching to them.

use std::sync::{Arc, Mutex};

use crate::data::instance::{Instance, Phenotypes};
use crate::data::snp::SnpId;
use crate::data::snp_set::SnpSet;
use crate::err::{Error, Result};

pub mod bayesian;
pub mod penetrance;
pub mod regression;
pub mod variance;

use bayesian::BayesianModel;
use penetrance::PenetranceModel;
use regression::RegressionModel;
use variance::VarianceModel;

/// All selectable score kinds.
///
/// The string form is pinned by the CLI surface (e.g. `PENETRANCE_NLL`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, serde::Serialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EpistasisScore {
    Variance,
    Bayesian,
    PenetranceNll,
    PenetranceLlh,
    PenetranceAic,
    PenetranceBic,
    RegressionNll,
    RegressionLlh,
    RegressionAic,
    RegressionBic,
    RegressionNllGain,
    RegressionLlhGain,
    RegressionAicGain,
    RegressionBicGain,
}

impl EpistasisScore {
    pub const ALL: [EpistasisScore; 14] = [
        EpistasisScore::Variance,
        EpistasisScore::Bayesian,
        EpistasisScore::PenetranceNll,
        EpistasisScore::PenetranceLlh,
        EpistasisScore::PenetranceAic,
        EpistasisScore::PenetranceBic,
        EpistasisScore::RegressionNll,
        EpistasisScore::RegressionLlh,
        EpistasisScore::RegressionAic,
        EpistasisScore::RegressionBic,
        EpistasisScore::RegressionNllGain,
        EpistasisScore::RegressionLlhGain,
        EpistasisScore::RegressionAicGain,
        EpistasisScore::RegressionBicGain,
    ];

    /// Memoization slot in [`SnpSet`]'s score vector.
    pub fn slot(self) -> usize {
        Self::ALL
            .iter()
            .position(|&s| s == self)
            .expect("every score is listed")
    }

    /// Whether smaller or larger values of this score are better.
    pub fn sense(self) -> ModelSense {
        match self {
            EpistasisScore::Variance
            | EpistasisScore::Bayesian
            | EpistasisScore::PenetranceLlh
            | EpistasisScore::RegressionLlh
            | EpistasisScore::RegressionLlhGain => ModelSense::Maximize,
            _ => ModelSense::Minimize,
        }
    }
}

/// Direction of a score model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSense {
    Minimize,
    Maximize,
}

impl ModelSense {
    /// Strictly better under this sense.
    pub fn is_better(self, lhs: f64, rhs: f64) -> bool {
        match self {
            ModelSense::Minimize => lhs < rhs,
            ModelSense::Maximize => lhs > rhs,
        }
    }

    /// Not worse under this sense.
    pub fn is_not_worse(self, lhs: f64, rhs: f64) -> bool {
        !self.is_better(rhs, lhs)
    }
}

/// The capability set every score model provides.
pub trait EpistasisModel: Send {
    /// Parse an option string of the form `--option value [...]`.
    fn set_options(&mut self, options: &str) -> Result<()>;

    fn model_sense(&self) -> ModelSense;

    /// Evaluate the score of a SNP set on the instance.
    fn evaluate(&mut self, instance: &Instance, snp_set: &[SnpId]) -> Result<f64>;
}

/// Split an option string into `(name, value)` pairs.
pub(crate) fn parse_options(options: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = vec![];
    let mut tokens = options.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        let name = token
            .strip_prefix("--")
            .ok_or_else(|| Error::BadInput(format!("expected --option, got {:?}", token)))?;
        let value = tokens
            .next()
            .ok_or_else(|| Error::BadInput(format!("missing value for option --{}", name)))?;
        pairs.push((name.to_string(), value.to_string()));
    }
    Ok(pairs)
}

/// Group phenotype categories by genotype cell; `counts[cell][category]`.
pub(crate) fn categorical_counts(instance: &Instance, snp_set: &[SnpId]) -> Result<Vec<Vec<usize>>> {
    let num_categories = instance.num_categories()?;
    let num_cells = 3usize.pow(snp_set.len() as u32);
    instance.with_phenotypes(|phenotypes| {
        let Phenotypes::Categorical { values, .. } = phenotypes else {
            return Err(Error::Unsupported(
                "categorical counts on quantitative phenotypes".into(),
            ));
        };
        let mut counts = vec![vec![0usize; num_categories]; num_cells];
        for (ind, &category) in values.iter().enumerate() {
            let cell = instance.genotype_id_at_set(snp_set, ind);
            counts[cell][category as usize] += 1;
        }
        Ok(counts)
    })
}

/// Group quantitative phenotype values by genotype cell.
pub(crate) fn quantitative_groups(instance: &Instance, snp_set: &[SnpId]) -> Result<Vec<Vec<f64>>> {
    let num_cells = 3usize.pow(snp_set.len() as u32);
    instance.with_phenotypes(|phenotypes| {
        let Phenotypes::Quantitative(values) = phenotypes else {
            return Err(Error::Unsupported(
                "quantitative grouping on categorical phenotypes".into(),
            ));
        };
        let mut groups = vec![vec![]; num_cells];
        for (ind, &value) in values.iter().enumerate() {
            groups[instance.genotype_id_at_set(snp_set, ind)].push(value);
        }
        Ok(groups)
    })
}

/// Lazily created model instances of one worker thread.
#[derive(Default)]
struct ThreadModels {
    variance: Option<VarianceModel>,
    bayesian: Option<BayesianModel>,
    penetrance: Option<(EpistasisScore, PenetranceModel)>,
    regression: Option<(EpistasisScore, RegressionModel)>,
}

impl ThreadModels {
    /// The model serving `score`, re-initialized when the sub-score changed.
    fn model_for(&mut self, score: EpistasisScore) -> Result<&mut dyn EpistasisModel> {
        match score {
            EpistasisScore::Variance => Ok(self.variance.get_or_insert_with(VarianceModel::default)),
            EpistasisScore::Bayesian => Ok(self.bayesian.get_or_insert_with(BayesianModel::default)),
            EpistasisScore::PenetranceNll
            | EpistasisScore::PenetranceLlh
            | EpistasisScore::PenetranceAic
            | EpistasisScore::PenetranceBic => {
                if self.penetrance.as_ref().map(|(s, _)| *s) != Some(score) {
                    let mut model = PenetranceModel::default();
                    model.set_options(&format!("--score {}", score))?;
                    self.penetrance = Some((score, model));
                }
                Ok(&mut self.penetrance.as_mut().expect("set above").1)
            }
            _ => {
                if self.regression.as_ref().map(|(s, _)| *s) != Some(score) {
                    let mut model = RegressionModel::default();
                    model.set_options(&format!("--score {}", score))?;
                    self.regression = Some((score, model));
                }
                Ok(&mut self.regression.as_mut().expect("set above").1)
            }
        }
    }
}

/// Evaluates scores on the shared instance with one model instance per
/// (thread, model kind) pair.
pub struct ScoreEngine {
    instance: Arc<Instance>,
    slots: Vec<Mutex<ThreadModels>>,
}

impl ScoreEngine {
    pub fn new(instance: Arc<Instance>) -> Self {
        let slots = (0..rayon::current_num_threads() + 1)
            .map(|_| Mutex::new(ThreadModels::default()))
            .collect();
        Self { instance, slots }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    fn thread_slot(&self) -> &Mutex<ThreadModels> {
        let index = rayon::current_thread_index()
            .map(|i| (i + 1).min(self.slots.len() - 1))
            .unwrap_or(0);
        &self.slots[index]
    }

    /// Evaluate a score without memoization.
    pub fn evaluate(&self, snp_set: &[SnpId], score: EpistasisScore) -> Result<f64> {
        let mut models = self.thread_slot().lock().expect("model slot poisoned");
        models
            .model_for(score)?
            .evaluate(&self.instance, snp_set)
    }

    /// Evaluate a score with memoization on the SNP set.
    pub fn score_set(&self, snp_set: &mut SnpSet, score: EpistasisScore) -> Result<f64> {
        if let Some(value) = snp_set.cached_score(score.slot()) {
            return Ok(value);
        }
        let value = self.evaluate(snp_set.snps(), score)?;
        snp_set.store_score(score.slot(), value);
        Ok(value)
    }

    pub fn sense(&self, score: EpistasisScore) -> ModelSense {
        score.sense()
    }

    pub fn is_better(&self, lhs: f64, rhs: f64, score: EpistasisScore) -> bool {
        score.sense().is_better(lhs, rhs)
    }

    /// Monte-Carlo p-value of a SNP set.
    ///
    /// Permutes the phenotypes `permutations` times and counts how often the
    /// permuted score is not worse than the score under the original
    /// phenotypes.  Permutation runs are globally exclusive; the original
    /// phenotypes are restored even when an evaluation fails.
    pub fn monte_carlo_p(
        &self,
        snp_set: &[SnpId],
        score: EpistasisScore,
        permutations: usize,
    ) -> Result<f64> {
        let _section = self.instance.monte_carlo_section();
        let reference = self.evaluate(snp_set, score)?;
        let sense = score.sense();
        let _restorer = self.instance.phenotype_restorer();
        let mut num_not_worse = 0usize;
        for _ in 0..permutations {
            self.instance.shuffle_phenotypes();
            let shuffled = self.evaluate(snp_set, score)?;
            if sense.is_not_worse(shuffled, reference) {
                num_not_worse += 1;
            }
        }
        Ok((num_not_worse + 1) as f64 / (permutations + 1) as f64)
    }

    /// The single-SNP variance-test p-value backing the MMA filter.
    pub fn marginal_p_value(&self, snp: SnpId) -> Result<f64> {
        variance::p_value(&self.instance, &[snp])
    }
}
