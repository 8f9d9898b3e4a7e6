//! Linkage disequilibrium constraint checking.

use rand::rngs::StdRng;
use rand::Rng;

use crate::data::snp::SnpId;
use crate::err::{Error, Result};

/// Aggregation of the pairwise r-squared values between a candidate and the
/// members of a SNP set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LdMode {
    Mean,
    Max,
}

/// Percentile taken from the sampled aggregates when deriving the cutoff.
const MC_CUTOFF_PERCENTILE: f64 = 0.95;

/// Rejects candidate SNPs in too high linkage disequilibrium with a set.
#[derive(Debug)]
pub struct LdTester {
    matrix: Vec<f64>,
    num_snps: usize,
    mode: LdMode,
    cutoff: f64,
}

impl LdTester {
    /// Build from an in-memory r-squared matrix (row-major `num_snps^2`).
    pub fn from_matrix(
        matrix: Vec<f64>,
        num_snps: usize,
        mode: LdMode,
        cutoff: f64,
    ) -> Result<Self> {
        if matrix.len() != num_snps * num_snps {
            return Err(Error::BadInput(format!(
                "LD matrix holds {} values but {}x{} were expected",
                matrix.len(),
                num_snps,
                num_snps
            )));
        }
        Ok(Self {
            matrix,
            num_snps,
            mode,
            cutoff,
        })
    }

    /// Load a whitespace-separated matrix file with a fixed cutoff.
    ///
    /// Leading header rows are detected by scanning for the first row whose
    /// first cell is the diagonal `1`.
    pub fn with_fixed_cutoff(
        path: &std::path::Path,
        mode: LdMode,
        num_snps: usize,
        cutoff: f64,
    ) -> Result<Self> {
        let matrix = load_matrix(path, num_snps)?;
        Self::from_matrix(matrix, num_snps, mode, cutoff)
    }

    /// Load a matrix file and derive the cutoff by Monte-Carlo sampling.
    ///
    /// Samples `num_samples` random subsets with sizes drawn uniformly from
    /// `[min_set, max_set]`, aggregates each against one extra random SNP and
    /// takes the 95th percentile of the sorted aggregates.
    pub fn with_monte_carlo_cutoff(
        path: &std::path::Path,
        mode: LdMode,
        num_snps: usize,
        min_set: usize,
        max_set: usize,
        num_samples: usize,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let matrix = load_matrix(path, num_snps)?;
        let mut tester = Self::from_matrix(matrix, num_snps, mode, 0.0)?;
        if min_set == 0 || max_set < min_set || num_samples == 0 {
            return Err(Error::BadInput(format!(
                "invalid LD Monte-Carlo parameters: min_set={}, max_set={}, num_samples={}",
                min_set, max_set, num_samples
            )));
        }
        if num_snps <= max_set {
            return Err(Error::BadInput(format!(
                "cannot sample subsets of up to {} SNPs from an LD matrix over {}",
                max_set, num_snps
            )));
        }

        let mut samples = Vec::with_capacity(num_samples);
        for _ in 0..num_samples {
            let set_size = rng.gen_range(min_set..=max_set);
            let mut selected = indexmap::IndexSet::new();
            while selected.len() < set_size + 1 {
                selected.insert(rng.gen_range(0..num_snps));
            }
            let mut snps: Vec<SnpId> = selected.into_iter().map(|i| SnpId(i as u32)).collect();
            let candidate = snps.pop().expect("sampled at least one SNP");
            samples.push(tester.aggregate(&snps, candidate));
        }
        samples.sort_by(|a, b| a.partial_cmp(b).expect("no NaN in LD values"));
        let index = ((num_samples as f64 * MC_CUTOFF_PERCENTILE).floor() as usize)
            .saturating_sub(1)
            .min(num_samples - 1);
        tester.cutoff = samples[index];
        tracing::info!(
            "determined LD cutoff: {} (mode: {})",
            tester.cutoff,
            tester.mode
        );
        Ok(tester)
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn r_squared(&self, a: SnpId, b: SnpId) -> f64 {
        self.matrix[a.index() * self.num_snps + b.index()]
    }

    /// Aggregate the candidate's r-squared against all set members.
    pub fn aggregate(&self, snp_set: &[SnpId], candidate: SnpId) -> f64 {
        match self.mode {
            LdMode::Mean => {
                snp_set
                    .iter()
                    .map(|&snp| self.r_squared(candidate, snp))
                    .sum::<f64>()
                    / snp_set.len().max(1) as f64
            }
            LdMode::Max => snp_set
                .iter()
                .map(|&snp| self.r_squared(candidate, snp))
                .fold(0.0, f64::max),
        }
    }

    /// Whether adding `candidate` to `snp_set` violates the LD constraint.
    pub fn rejects(&self, snp_set: &[SnpId], candidate: SnpId) -> bool {
        self.aggregate(snp_set, candidate) >= self.cutoff
    }
}

fn load_matrix(path: &std::path::Path, num_snps: usize) -> Result<Vec<f64>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::BadInput(format!("cannot read LD file {:?}: {}", path, e)))?;
    let rows: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let header_rows = rows
        .iter()
        .position(|row| {
            row.split_whitespace()
                .next()
                .and_then(|cell| cell.parse::<f64>().ok())
                .map(|value| value == 1.0)
                .unwrap_or(false)
        })
        .unwrap_or(rows.len());
    if rows.len() - header_rows != num_snps {
        return Err(Error::BadInput(format!(
            "LD file {:?} has {} data rows for {} SNPs (detected {} header rows)",
            path,
            rows.len() - header_rows,
            num_snps,
            header_rows
        )));
    }

    let mut matrix = Vec::with_capacity(num_snps * num_snps);
    for row in &rows[header_rows..] {
        let values: Vec<f64> = row
            .split_whitespace()
            .map(|cell| {
                cell.parse::<f64>()
                    .map_err(|e| Error::BadInput(format!("invalid LD value {:?}: {}", cell, e)))
            })
            .collect::<Result<_>>()?;
        if values.len() != num_snps {
            return Err(Error::BadInput(format!(
                "LD file {:?} row has {} columns for {} SNPs",
                path,
                values.len(),
                num_snps
            )));
        }
        matrix.extend(values);
    }
    Ok(matrix)
}

#[cfg(test)]
mod test {
    use super::{LdMode, LdTester};
    use crate::data::snp::SnpId;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Write as _;

    /// 3x3 matrix where the candidate is SNP 0 and the set is {1, 2}.
    fn tester(mode: LdMode, cutoff: f64, r01: f64, r02: f64) -> LdTester {
        let matrix = vec![
            1.0, r01, r02, //
            r01, 1.0, 0.0, //
            r02, 0.0, 1.0,
        ];
        LdTester::from_matrix(matrix, 3, mode, cutoff).unwrap()
    }

    #[rstest]
    #[case(LdMode::Mean, 0.4, 0.8, 0.6, true)]
    #[case(LdMode::Max, 0.4, 0.8, 0.8, true)]
    #[case(LdMode::Mean, 0.3, 0.4, 0.35, false)]
    fn aggregation_and_cutoff(
        #[case] mode: LdMode,
        #[case] r01: f64,
        #[case] r02: f64,
        #[case] expected_aggregate: f64,
        #[case] expected_rejected: bool,
    ) {
        let tester = tester(mode, 0.5, r01, r02);
        let set = [SnpId(1), SnpId(2)];
        assert!((tester.aggregate(&set, SnpId(0)) - expected_aggregate).abs() < 1e-12);
        assert_eq!(expected_rejected, tester.rejects(&set, SnpId(0)));
    }

    #[test]
    fn aggregate_at_cutoff_rejects() {
        let tester = tester(LdMode::Mean, 0.6, 0.4, 0.8);
        assert!(tester.rejects(&[SnpId(1), SnpId(2)], SnpId(0)));
    }

    #[test]
    fn matrix_file_with_header_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rs1 rs2 rs3").unwrap();
        writeln!(file, "1 0.2 0.3").unwrap();
        writeln!(file, "0.2 1 0.4").unwrap();
        writeln!(file, "0.3 0.4 1").unwrap();
        let tester = LdTester::with_fixed_cutoff(file.path(), LdMode::Max, 3, 0.5).unwrap();
        assert!((tester.aggregate(&[SnpId(2)], SnpId(0)) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn matrix_file_with_wrong_dimensions_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1 0.2").unwrap();
        writeln!(file, "0.2 1").unwrap();
        assert!(LdTester::with_fixed_cutoff(file.path(), LdMode::Max, 3, 0.5).is_err());
    }

    #[test]
    fn monte_carlo_cutoff_is_a_sampled_aggregate() {
        use rand::SeedableRng;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..6 {
            let row: Vec<String> = (0..6)
                .map(|j| {
                    if i == j {
                        "1".to_string()
                    } else {
                        format!("0.{}", (i + j) % 10)
                    }
                })
                .collect();
            writeln!(file, "{}", row.join(" ")).unwrap();
        }
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let tester = LdTester::with_monte_carlo_cutoff(
            file.path(),
            LdMode::Mean,
            6,
            2,
            3,
            200,
            &mut rng,
        )
        .unwrap();
        assert!(tester.cutoff() > 0.0 && tester.cutoff() <= 1.0);
    }
}
