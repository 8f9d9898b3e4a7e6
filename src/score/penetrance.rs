//! The penetrance score model.
//!
//! Fits a maximum-likelihood penetrance table: one phenotype distribution per
//! genotype cell (multinomial for categorical, Gaussian for quantitative
//! phenotypes) and scores the set by the resulting negative log-likelihood or
//! one of its information-criterion variants.

use crate::data::instance::Instance;
use crate::data::snp::SnpId;
use crate::err::{Error, Result};
use crate::score::{categorical_counts, quantitative_groups, EpistasisModel, ModelSense};

/// Variance floor for degenerate genotype cells.
const MIN_CELL_VARIANCE: f64 = 1e-8;

/// Selectable sub-score of the penetrance and regression models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SubScore {
    #[default]
    Nll,
    Llh,
    Aic,
    Bic,
}

impl SubScore {
    pub(crate) fn sense(self) -> ModelSense {
        match self {
            SubScore::Llh => ModelSense::Maximize,
            _ => ModelSense::Minimize,
        }
    }

    /// Combine a fitted log-likelihood into the requested criterion.
    pub(crate) fn combine(self, nll: f64, num_params: usize, num_inds: usize) -> f64 {
        match self {
            SubScore::Nll => nll,
            SubScore::Llh => -nll,
            SubScore::Aic => 2.0 * num_params as f64 + 2.0 * nll,
            SubScore::Bic => num_params as f64 * (num_inds as f64).ln() + 2.0 * nll,
        }
    }
}

#[derive(Debug, Default)]
pub struct PenetranceModel {
    sub_score: SubScore,
}

impl EpistasisModel for PenetranceModel {
    fn set_options(&mut self, options: &str) -> Result<()> {
        for (name, value) in crate::score::parse_options(options)? {
            match (name.as_str(), value.as_str()) {
                ("score", "PENETRANCE_NLL") => self.sub_score = SubScore::Nll,
                ("score", "PENETRANCE_LLH") => self.sub_score = SubScore::Llh,
                ("score", "PENETRANCE_AIC") => self.sub_score = SubScore::Aic,
                ("score", "PENETRANCE_BIC") => self.sub_score = SubScore::Bic,
                _ => {
                    return Err(Error::BadInput(format!(
                        "unknown penetrance model option --{} {}",
                        name, value
                    )))
                }
            }
        }
        Ok(())
    }

    fn model_sense(&self) -> ModelSense {
        self.sub_score.sense()
    }

    fn evaluate(&mut self, instance: &Instance, snp_set: &[SnpId]) -> Result<f64> {
        let num_cells = 3usize.pow(snp_set.len() as u32);
        let (nll, num_params) = if instance.is_categorical() {
            let counts = categorical_counts(instance, snp_set)?;
            let num_categories = instance.num_categories()?;
            let mut nll = 0.0;
            for row in &counts {
                let cell_total: usize = row.iter().sum();
                if cell_total == 0 {
                    continue;
                }
                for &count in row {
                    if count > 0 {
                        let penetrance = count as f64 / cell_total as f64;
                        nll -= count as f64 * penetrance.ln();
                    }
                }
            }
            (nll, num_cells * (num_categories - 1))
        } else {
            let groups = quantitative_groups(instance, snp_set)?;
            let mut nll = 0.0;
            for group in &groups {
                if group.is_empty() {
                    continue;
                }
                let n = group.len() as f64;
                let mean = group.iter().sum::<f64>() / n;
                let variance = (group.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / n)
                    .max(MIN_CELL_VARIANCE);
                nll += 0.5 * n * ((2.0 * std::f64::consts::PI * variance).ln() + 1.0);
            }
            (nll, 2 * num_cells)
        };
        Ok(self
            .sub_score
            .combine(nll, num_params, instance.num_inds()))
    }
}
