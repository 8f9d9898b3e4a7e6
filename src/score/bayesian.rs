//! The Bayesian score model.
//!
//! The K2 Bayesian network score of the phenotype node given the joint
//! genotype: the log marginal likelihood of the genotype-cell/category
//! contingency under uniform Dirichlet priors.  Categorical phenotypes only.

use statrs::function::gamma::ln_gamma;

use crate::data::instance::Instance;
use crate::data::snp::SnpId;
use crate::err::{Error, Result};
use crate::score::{categorical_counts, EpistasisModel, ModelSense};

#[derive(Debug, Default)]
pub struct BayesianModel;

impl EpistasisModel for BayesianModel {
    fn set_options(&mut self, options: &str) -> Result<()> {
        for (name, value) in crate::score::parse_options(options)? {
            match name.as_str() {
                "score" if value == "BAYESIAN" => {}
                _ => {
                    return Err(Error::BadInput(format!(
                        "unknown Bayesian model option --{} {}",
                        name, value
                    )))
                }
            }
        }
        Ok(())
    }

    fn model_sense(&self) -> ModelSense {
        ModelSense::Maximize
    }

    fn evaluate(&mut self, instance: &Instance, snp_set: &[SnpId]) -> Result<f64> {
        if !instance.is_categorical() {
            return Err(Error::Unsupported(
                "the Bayesian score requires categorical phenotypes".into(),
            ));
        }
        let counts = categorical_counts(instance, snp_set)?;
        let num_categories = instance.num_categories()? as f64;
        let mut score = 0.0;
        for row in &counts {
            let cell_total: usize = row.iter().sum();
            if cell_total == 0 {
                continue;
            }
            score += ln_gamma(num_categories) - ln_gamma(cell_total as f64 + num_categories);
            for &count in row {
                score += ln_gamma(count as f64 + 1.0);
            }
        }
        Ok(score)
    }
}

#[cfg(test)]
mod test {
    use super::BayesianModel;
    use crate::data::snp::SnpId;
    use crate::err::Error;
    use crate::score::test::{categorical_instance, quantitative_instance};
    use crate::score::EpistasisModel;

    #[test]
    fn associated_snp_scores_higher() {
        let instance = categorical_instance();
        let mut model = BayesianModel::default();
        let associated = model.evaluate(&instance, &[SnpId(0)]).unwrap();
        let noise = model.evaluate(&instance, &[SnpId(1)]).unwrap();
        assert!(associated > noise);
    }

    #[test]
    fn quantitative_phenotypes_are_unsupported() {
        let instance = quantitative_instance();
        let mut model = BayesianModel::default();
        assert!(matches!(
            model.evaluate(&instance, &[SnpId(0)]).unwrap_err(),
            Error::Unsupported(_)
        ));
    }
}
