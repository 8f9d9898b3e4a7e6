//! The regression score model.
//!
//! Regresses the phenotype on the allele counts of the SNP set, a joint
//! interaction term, and the covariates when present: ordinary least squares
//! for quantitative phenotypes, logistic regression fitted by IRLS for binary
//! categorical ones.  The `*_GAIN` variants score the improvement of the
//! interaction model over the main-effects-only model.

use nalgebra::{DMatrix, DVector};

use crate::data::instance::{Instance, Phenotypes};
use crate::data::snp::SnpId;
use crate::err::{Error, Result};
use crate::score::penetrance::SubScore;
use crate::score::{EpistasisModel, ModelSense};

const IRLS_MAX_ITERATIONS: usize = 25;
const IRLS_TOLERANCE: f64 = 1e-8;
const RIDGE: f64 = 1e-9;

#[derive(Debug, Default)]
pub struct RegressionModel {
    sub_score: SubScore,
    gain: bool,
}

impl EpistasisModel for RegressionModel {
    fn set_options(&mut self, options: &str) -> Result<()> {
        for (name, value) in crate::score::parse_options(options)? {
            if name != "score" {
                return Err(Error::BadInput(format!(
                    "unknown regression model option --{} {}",
                    name, value
                )));
            }
            let base = value
                .strip_prefix("REGRESSION_")
                .ok_or_else(|| Error::BadInput(format!("unknown regression score {}", value)))?;
            let (base, gain) = match base.strip_suffix("_GAIN") {
                Some(stripped) => (stripped, true),
                None => (base, false),
            };
            self.sub_score = match base {
                "NLL" => SubScore::Nll,
                "LLH" => SubScore::Llh,
                "AIC" => SubScore::Aic,
                "BIC" => SubScore::Bic,
                _ => return Err(Error::BadInput(format!("unknown regression score {}", value))),
            };
            self.gain = gain;
        }
        Ok(())
    }

    fn model_sense(&self) -> ModelSense {
        self.sub_score.sense()
    }

    fn evaluate(&mut self, instance: &Instance, snp_set: &[SnpId]) -> Result<f64> {
        let full = fit(instance, snp_set, true)?;
        let full_score = self
            .sub_score
            .combine(full.nll, full.num_params, instance.num_inds());
        if !self.gain {
            return Ok(full_score);
        }
        let main = fit(instance, snp_set, false)?;
        let main_score = self
            .sub_score
            .combine(main.nll, main.num_params, instance.num_inds());
        Ok(full_score - main_score)
    }
}

struct Fit {
    nll: f64,
    num_params: usize,
}

/// Build the design matrix: intercept, per-SNP allele counts, the product
/// interaction term (for sets of two or more SNPs), covariates.
fn design_matrix(instance: &Instance, snp_set: &[SnpId], with_interaction: bool) -> DMatrix<f64> {
    let n = instance.num_inds();
    let mut columns: Vec<DVector<f64>> = vec![DVector::from_element(n, 1.0)];
    for &snp in snp_set {
        columns.push(DVector::from_iterator(
            n,
            instance.genotypes_at(snp).iter().map(|&g| g as f64),
        ));
    }
    if with_interaction && snp_set.len() >= 2 {
        columns.push(DVector::from_iterator(
            n,
            (0..n).map(|ind| {
                snp_set
                    .iter()
                    .map(|&snp| instance.genotype(snp, ind) as f64)
                    .product::<f64>()
            }),
        ));
    }
    if let Some(covariates) = instance.covariates() {
        for c in 0..covariates.ncols() {
            columns.push(covariates.column(c).into_owned());
        }
    }
    DMatrix::from_columns(&columns)
}

fn fit(instance: &Instance, snp_set: &[SnpId], with_interaction: bool) -> Result<Fit> {
    let x = design_matrix(instance, snp_set, with_interaction);
    instance.with_phenotypes(|phenotypes| match phenotypes {
        Phenotypes::Quantitative(values) => {
            let y = DVector::from_column_slice(values);
            fit_least_squares(&x, &y)
        }
        Phenotypes::Categorical {
            values,
            num_categories,
        } => {
            if *num_categories != 2 {
                return Err(Error::Unsupported(format!(
                    "regression scores support binary phenotypes only, got {} categories",
                    num_categories
                )));
            }
            let y = DVector::from_iterator(values.len(), values.iter().map(|&v| v as f64));
            fit_logistic(&x, &y)
        }
    })
}

fn solve_normal_equations(lhs: DMatrix<f64>, rhs: DVector<f64>) -> Result<DVector<f64>> {
    let p = lhs.nrows();
    let regularized = lhs + DMatrix::identity(p, p) * RIDGE;
    regularized
        .lu()
        .solve(&rhs)
        .ok_or_else(|| Error::BadInput("singular design matrix in regression fit".into()))
}

fn fit_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<Fit> {
    let n = x.nrows() as f64;
    let beta = solve_normal_equations(x.transpose() * x, x.transpose() * y)?;
    let residuals = y - x * &beta;
    let sigma2 = (residuals.norm_squared() / n).max(1e-12);
    let nll = 0.5 * n * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
    Ok(Fit {
        nll,
        // coefficients plus the noise variance
        num_params: x.ncols() + 1,
    })
}

fn fit_logistic(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<Fit> {
    let n = x.nrows();
    let mut beta = DVector::zeros(x.ncols());
    for _ in 0..IRLS_MAX_ITERATIONS {
        let eta = x * &beta;
        let p = eta.map(|v| 1.0 / (1.0 + (-v).exp()));
        let w = p.map(|pi| (pi * (1.0 - pi)).max(1e-12));
        // X^T W X step without materializing the diagonal weight matrix
        let mut weighted_x = x.clone();
        for (mut row, &weight) in weighted_x.row_iter_mut().zip(w.iter()) {
            row *= weight;
        }
        let step = solve_normal_equations(x.transpose() * weighted_x, x.transpose() * (y - &p))?;
        beta += &step;
        if step.norm() < IRLS_TOLERANCE {
            break;
        }
    }

    let eta = x * &beta;
    let mut nll = 0.0;
    for ind in 0..n {
        let p = (1.0 / (1.0 + (-eta[ind]).exp())).clamp(1e-12, 1.0 - 1e-12);
        nll -= y[ind] * p.ln() + (1.0 - y[ind]) * (1.0 - p).ln();
    }
    Ok(Fit {
        nll,
        num_params: x.ncols(),
    })
}

#[cfg(test)]
mod test {
    use super::RegressionModel;
    use crate::data::instance::{Instance, Phenotypes};
    use crate::data::snp::SnpId;
    use crate::err::Error;
    use crate::score::test::{categorical_instance, quantitative_instance};
    use crate::score::EpistasisModel;

    #[test]
    fn linear_fit_scores_signal_over_noise() {
        let instance = quantitative_instance();
        let mut model = RegressionModel::default();
        model.set_options("--score REGRESSION_NLL").unwrap();
        let associated = model.evaluate(&instance, &[SnpId(0)]).unwrap();
        let noise = model.evaluate(&instance, &[SnpId(1)]).unwrap();
        assert!(associated < noise);
    }

    #[test]
    fn logistic_fit_scores_signal_over_noise() {
        let instance = categorical_instance();
        let mut model = RegressionModel::default();
        model.set_options("--score REGRESSION_NLL").unwrap();
        let associated = model.evaluate(&instance, &[SnpId(0)]).unwrap();
        let noise = model.evaluate(&instance, &[SnpId(1)]).unwrap();
        assert!(associated < noise);
    }

    #[test]
    fn interaction_gain_detects_epistasis() {
        // phenotype is the XOR-like product pattern of two SNPs, invisible to
        // the main effects alone
        let g1 = vec![0, 0, 1, 1, 2, 2, 0, 0, 1, 1, 2, 2];
        let g2 = vec![0, 1, 0, 1, 0, 1, 2, 1, 2, 0, 2, 1];
        let phenotype: Vec<f64> = g1
            .iter()
            .zip(&g2)
            .map(|(&a, &b)| (a * b) as f64 + 0.01 * (a as f64 - b as f64))
            .collect();
        let mut genotypes = g1.clone();
        genotypes.extend(&g2);
        let instance = Instance::new(
            genotypes,
            Phenotypes::Quantitative(phenotype),
            vec!["rs1".into(), "rs2".into()],
        )
        .unwrap();

        let mut model = RegressionModel::default();
        model.set_options("--score REGRESSION_NLL_GAIN").unwrap();
        let gain = model.evaluate(&instance, &[SnpId(0), SnpId(1)]).unwrap();
        // the interaction model fits far better, so the NLL gain is negative
        assert!(gain < -1.0, "expected strong negative NLL gain, got {}", gain);
    }

    #[test]
    fn covariates_enter_the_fit() {
        let instance = quantitative_instance();
        let mut model = RegressionModel::default();
        model.set_options("--score REGRESSION_NLL").unwrap();
        let without = model.evaluate(&instance, &[SnpId(1)]).unwrap();

        // covariate equal to the phenotype absorbs all variance
        let mut with_cov = Instance::new(
            (0..24u32)
                .map(|i| instance.genotype(SnpId(i / 12), (i % 12) as usize))
                .collect(),
            instance.with_phenotypes(|p| p.clone()),
            vec!["rs1".into(), "rs2".into()],
        )
        .unwrap();
        let phenotype = instance.with_phenotypes(|p| match p {
            Phenotypes::Quantitative(values) => values.clone(),
            _ => unreachable!(),
        });
        with_cov
            .set_covariates(nalgebra::DMatrix::from_column_slice(12, 1, &phenotype))
            .unwrap();
        let with = model.evaluate(&with_cov, &[SnpId(1)]).unwrap();
        assert!(with < without);
    }

    #[test]
    fn multinomial_phenotypes_are_unsupported() {
        let instance = Instance::new(
            vec![0, 1, 2, 0, 1, 2],
            Phenotypes::Categorical {
                values: vec![0, 1, 2, 0, 1, 2],
                num_categories: 3,
            },
            vec!["rs1".into()],
        )
        .unwrap();
        let mut model = RegressionModel::default();
        model.set_options("--score REGRESSION_NLL").unwrap();
        assert!(matches!(
            model.evaluate(&instance, &[SnpId(0)]).unwrap_err(),
            Error::Unsupported(_)
        ));
    }

    #[test]
    fn unknown_scores_rejected() {
        let mut model = RegressionModel::default();
        assert!(model.set_options("--score REGRESSION_FOO").is_err());
        assert!(model.set_options("--score VARIANCE").is_err());
        assert!(model.set_options("--score REGRESSION_BIC_GAIN").is_ok());
    }
}
