//! The variance score model.
//!
//! Tests whether the joint genotype at a SNP set explains phenotype
//! variation: a one-way ANOVA F-test over the genotype cells for
//! quantitative phenotypes, a genotype-by-category chi-squared test for
//! categorical ones.  The score is `-log10(p)`, so larger is better; the raw
//! single-SNP p-value doubles as the MMA statistic.

use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};

use crate::data::instance::Instance;
use crate::data::snp::SnpId;
use crate::err::{Error, Result};
use crate::score::{categorical_counts, quantitative_groups, EpistasisModel, ModelSense};

#[derive(Debug, Default)]
pub struct VarianceModel;

impl EpistasisModel for VarianceModel {
    fn set_options(&mut self, options: &str) -> Result<()> {
        for (name, value) in crate::score::parse_options(options)? {
            match name.as_str() {
                "score" if value == "VARIANCE" => {}
                _ => {
                    return Err(Error::BadInput(format!(
                        "unknown variance model option --{} {}",
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
        let p = p_value(instance, snp_set)?;
        Ok(-p.max(f64::MIN_POSITIVE).log10())
    }
}

/// The p-value of the variance test for a SNP set.
pub(crate) fn p_value(instance: &Instance, snp_set: &[SnpId]) -> Result<f64> {
    if instance.is_categorical() {
        chi_squared_p(instance, snp_set)
    } else {
        anova_p(instance, snp_set)
    }
}

fn anova_p(instance: &Instance, snp_set: &[SnpId]) -> Result<f64> {
    let groups = quantitative_groups(instance, snp_set)?;
    let occupied: Vec<&Vec<f64>> = groups.iter().filter(|g| !g.is_empty()).collect();
    let n: usize = occupied.iter().map(|g| g.len()).sum();
    if occupied.len() < 2 || n <= occupied.len() {
        return Ok(1.0);
    }

    let grand_mean = occupied
        .iter()
        .flat_map(|g| g.iter())
        .sum::<f64>()
        / n as f64;
    let mut between = 0.0;
    let mut within = 0.0;
    for group in &occupied {
        let mean = group.iter().sum::<f64>() / group.len() as f64;
        between += group.len() as f64 * (mean - grand_mean).powi(2);
        within += group.iter().map(|y| (y - mean).powi(2)).sum::<f64>();
    }
    if within <= 0.0 {
        // the genotype splits the phenotype perfectly
        return Ok(f64::MIN_POSITIVE);
    }

    let df1 = (occupied.len() - 1) as f64;
    let df2 = (n - occupied.len()) as f64;
    let f = (between / df1) / (within / df2);
    let distribution = FisherSnedecor::new(df1, df2)
        .map_err(|e| Error::BadInput(format!("invalid F distribution: {}", e)))?;
    Ok((1.0 - distribution.cdf(f)).max(0.0))
}

fn chi_squared_p(instance: &Instance, snp_set: &[SnpId]) -> Result<f64> {
    let counts = categorical_counts(instance, snp_set)?;
    let occupied: Vec<&Vec<usize>> = counts
        .iter()
        .filter(|row| row.iter().sum::<usize>() > 0)
        .collect();
    if occupied.is_empty() {
        return Ok(1.0);
    }
    let num_categories = occupied[0].len();
    let n: usize = occupied.iter().flat_map(|row| row.iter()).sum();
    let row_sums: Vec<usize> = occupied.iter().map(|row| row.iter().sum()).collect();
    let col_sums: Vec<usize> = (0..num_categories)
        .map(|k| occupied.iter().map(|row| row[k]).sum())
        .collect();

    let mut chi2 = 0.0;
    for (row, &row_sum) in occupied.iter().zip(&row_sums) {
        for (k, &col_sum) in col_sums.iter().enumerate() {
            let expected = row_sum as f64 * col_sum as f64 / n as f64;
            if expected > 0.0 {
                chi2 += (row[k] as f64 - expected).powi(2) / expected;
            }
        }
    }

    let df = (occupied.len() - 1) * (num_categories - 1);
    if df == 0 {
        return Ok(1.0);
    }
    let distribution = ChiSquared::new(df as f64)
        .map_err(|e| Error::BadInput(format!("invalid chi-squared distribution: {}", e)))?;
    Ok((1.0 - distribution.cdf(chi2)).max(0.0))
}

#[cfg(test)]
mod test {
    use super::VarianceModel;
    use crate::data::snp::SnpId;
    use crate::score::test::{categorical_instance, quantitative_instance};
    use crate::score::EpistasisModel;

    #[test]
    fn associated_snp_scores_higher_than_noise() {
        let instance = categorical_instance();
        let mut model = VarianceModel::default();
        let associated = model.evaluate(&instance, &[SnpId(0)]).unwrap();
        let noise = model.evaluate(&instance, &[SnpId(1)]).unwrap();
        assert!(
            associated > noise,
            "associated {} should beat noise {}",
            associated,
            noise
        );
        assert!(associated > 1.0);
    }

    #[test]
    fn anova_detects_separated_means() {
        let instance = quantitative_instance();
        let mut model = VarianceModel::default();
        let associated = model.evaluate(&instance, &[SnpId(0)]).unwrap();
        let noise = model.evaluate(&instance, &[SnpId(1)]).unwrap();
        assert!(associated > noise);
        assert!(associated > 3.0);
    }

    #[test]
    fn p_values_are_probabilities() {
        let instance = categorical_instance();
        for snp in [SnpId(0), SnpId(1)] {
            let p = super::p_value(&instance, &[snp]).unwrap();
            assert!((0.0..=1.0).contains(&p), "p out of range: {}", p);
        }
        let joint = super::p_value(&instance, &[SnpId(0), SnpId(1)]).unwrap();
        assert!((0.0..=1.0).contains(&joint));
    }

    #[test]
    fn options_reject_unknown() {
        let mut model = VarianceModel::default();
        assert!(model.set_options("--score VARIANCE").is_ok());
        assert!(model.set_options("--score PENETRANCE_NLL").is_err());
    }
}
