//! The epistasis instance: genotype matrix, phenotypes, covariates.

use std::sync::{Mutex, MutexGuard, RwLock};

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::snp::SnpId;
use crate::err::{Error, Result};

/// Phenotypes of all individuals, either quantitative or categorical.
#[derive(Debug, Clone, PartialEq)]
pub enum Phenotypes {
    /// One double per individual.
    Quantitative(Vec<f64>),
    /// One category in `[0, num_categories)` per individual.
    Categorical {
        values: Vec<u16>,
        num_categories: usize,
    },
}

impl Phenotypes {
    pub fn len(&self) -> usize {
        match self {
            Phenotypes::Quantitative(values) => values.len(),
            Phenotypes::Categorical { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Phenotypes::Categorical { .. })
    }

    fn shuffle(&mut self, rng: &mut StdRng) {
        match self {
            Phenotypes::Quantitative(values) => values.shuffle(rng),
            Phenotypes::Categorical { values, .. } => values.shuffle(rng),
        }
    }
}

/// The instance all score models operate on.
///
/// Immutable after load except for the current phenotype vector, which is
/// permuted during Monte-Carlo runs.  Genotypes are stored SNP-major so all
/// individuals of one SNP form a contiguous slice.
#[derive(Debug)]
pub struct Instance {
    num_snps: usize,
    num_inds: usize,
    genotypes: Vec<u8>,
    phenotypes: RwLock<Phenotypes>,
    original_phenotypes: Phenotypes,
    covariates: Option<DMatrix<f64>>,
    snp_names: Vec<String>,
    chromosomes: Vec<String>,
    mafs: Vec<f64>,
    disease_snps: Vec<SnpId>,
    shuffle_rng: Mutex<StdRng>,
    mc_lock: Mutex<()>,
}

impl Instance {
    /// Create an instance from raw buffers.
    ///
    /// `genotypes` must hold `num_snps * num_inds` values in `{0, 1, 2}` in
    /// SNP-major order and `snp_names` one name per SNP.
    pub fn new(
        genotypes: Vec<u8>,
        phenotypes: Phenotypes,
        snp_names: Vec<String>,
    ) -> Result<Self> {
        let num_snps = snp_names.len();
        let num_inds = phenotypes.len();
        if genotypes.len() != num_snps * num_inds {
            return Err(Error::BadInput(format!(
                "genotype buffer holds {} values but {} SNPs x {} individuals were announced",
                genotypes.len(),
                num_snps,
                num_inds
            )));
        }
        if let Some(pos) = genotypes.iter().position(|&g| g > 2) {
            return Err(Error::BadInput(format!(
                "genotype at SNP {} / individual {} is {} (expected 0, 1, or 2)",
                pos / num_inds.max(1),
                pos % num_inds.max(1),
                genotypes[pos]
            )));
        }
        if let Phenotypes::Categorical {
            values,
            num_categories,
        } = &phenotypes
        {
            if *num_categories < 2 {
                return Err(Error::BadInput(format!(
                    "need at least 2 phenotype categories, got {}",
                    num_categories
                )));
            }
            if let Some(ind) = values.iter().position(|&v| v as usize >= *num_categories) {
                return Err(Error::BadInput(format!(
                    "phenotype of individual {} is {} (expected category below {})",
                    ind, values[ind], num_categories
                )));
            }
        }
        Ok(Self {
            num_snps,
            num_inds,
            genotypes,
            original_phenotypes: phenotypes.clone(),
            phenotypes: RwLock::new(phenotypes),
            covariates: None,
            snp_names,
            chromosomes: vec![],
            mafs: vec![],
            disease_snps: vec![],
            shuffle_rng: Mutex::new(StdRng::from_entropy()),
            mc_lock: Mutex::new(()),
        })
    }

    pub fn num_snps(&self) -> usize {
        self.num_snps
    }

    pub fn num_inds(&self) -> usize {
        self.num_inds
    }

    pub fn is_categorical(&self) -> bool {
        self.original_phenotypes.is_categorical()
    }

    /// Number of categories of a categorical phenotype.
    pub fn num_categories(&self) -> Result<usize> {
        match &self.original_phenotypes {
            Phenotypes::Categorical { num_categories, .. } => Ok(*num_categories),
            Phenotypes::Quantitative(_) => Err(Error::Unsupported(
                "number of categories requested on quantitative phenotypes".into(),
            )),
        }
    }

    pub fn snp_name(&self, snp: SnpId) -> &str {
        &self.snp_names[snp.index()]
    }

    pub fn snp_names(&self) -> &[String] {
        &self.snp_names
    }

    pub fn chromosomes(&self) -> &[String] {
        &self.chromosomes
    }

    pub fn set_chromosomes(&mut self, chromosomes: Vec<String>) -> Result<()> {
        if chromosomes.len() != self.num_snps {
            return Err(Error::BadInput(format!(
                "got {} chromosomes for {} SNPs",
                chromosomes.len(),
                self.num_snps
            )));
        }
        self.chromosomes = chromosomes;
        Ok(())
    }

    pub fn has_maf_information(&self) -> bool {
        !self.mafs.is_empty()
    }

    pub fn mafs(&self) -> &[f64] {
        &self.mafs
    }

    pub fn set_mafs(&mut self, mafs: Vec<f64>) -> Result<()> {
        if mafs.len() != self.num_snps {
            return Err(Error::BadInput(format!(
                "got {} MAF values for {} SNPs",
                mafs.len(),
                self.num_snps
            )));
        }
        self.mafs = mafs;
        Ok(())
    }

    pub fn disease_snps(&self) -> &[SnpId] {
        &self.disease_snps
    }

    pub fn set_disease_snps(&mut self, disease_snps: Vec<SnpId>) -> Result<()> {
        if let Some(snp) = disease_snps.iter().find(|s| s.index() >= self.num_snps) {
            return Err(Error::BadInput(format!(
                "disease SNP index {} out of range ({} SNPs)",
                snp, self.num_snps
            )));
        }
        self.disease_snps = disease_snps;
        Ok(())
    }

    pub fn num_covs(&self) -> usize {
        self.covariates.as_ref().map(|m| m.ncols()).unwrap_or(0)
    }

    pub fn covariates(&self) -> Option<&DMatrix<f64>> {
        self.covariates.as_ref()
    }

    pub fn covariates_of_ind(&self, ind: usize) -> Option<DVector<f64>> {
        self.covariates
            .as_ref()
            .map(|m| m.row(ind).transpose().into_owned())
    }

    pub fn set_covariates(&mut self, covariates: DMatrix<f64>) -> Result<()> {
        if covariates.nrows() != self.num_inds {
            return Err(Error::BadInput(format!(
                "covariate matrix has {} rows but the instance has {} individuals",
                covariates.nrows(),
                self.num_inds
            )));
        }
        self.covariates = Some(covariates);
        Ok(())
    }

    /// Genotype of one individual at one SNP.
    pub fn genotype(&self, snp: SnpId, ind: usize) -> u8 {
        self.genotypes[snp.index() * self.num_inds + ind]
    }

    /// Genotypes of all individuals at one SNP, as a contiguous slice.
    pub fn genotypes_at(&self, snp: SnpId) -> &[u8] {
        let start = snp.index() * self.num_inds;
        &self.genotypes[start..start + self.num_inds]
    }

    /// Genotype of one individual at a SNP set.
    pub fn genotype_at_set(&self, snp_set: &[SnpId], ind: usize) -> Vec<u8> {
        snp_set.iter().map(|&snp| self.genotype(snp, ind)).collect()
    }

    /// Genotype of one individual at a SNP set, as integer id in
    /// `[0, 3^|set|)`.
    pub fn genotype_id_at_set(&self, snp_set: &[SnpId], ind: usize) -> usize {
        snp_set
            .iter()
            .fold(0usize, |acc, &snp| acc * 3 + self.genotype(snp, ind) as usize)
    }

    /// Invert [`Instance::genotype_id_at_set`].
    pub fn id_to_genotype(genotype_id: usize, set_size: usize) -> Vec<u8> {
        let mut genotype = vec![0u8; set_size];
        let mut rest = genotype_id;
        for slot in genotype.iter_mut().rev() {
            *slot = (rest % 3) as u8;
            rest /= 3;
        }
        genotype
    }

    /// All individuals with the given genotype id at the SNP set.
    pub fn inds_with_genotype_id(&self, snp_set: &[SnpId], genotype_id: usize) -> Vec<usize> {
        (0..self.num_inds)
            .filter(|&ind| self.genotype_id_at_set(snp_set, ind) == genotype_id)
            .collect()
    }

    /// All individuals with the given genotype at the SNP set.
    pub fn inds_with_genotype(&self, snp_set: &[SnpId], genotype: &[u8]) -> Vec<usize> {
        let id = genotype.iter().fold(0usize, |acc, &g| acc * 3 + g as usize);
        self.inds_with_genotype_id(snp_set, id)
    }

    pub fn num_inds_with_genotype_id(&self, snp_set: &[SnpId], genotype_id: usize) -> usize {
        (0..self.num_inds)
            .filter(|&ind| self.genotype_id_at_set(snp_set, ind) == genotype_id)
            .count()
    }

    /// All individuals whose genotype is non-zero at every SNP of the set.
    pub fn inds_with_nonzero_genotype(&self, snp_set: &[SnpId]) -> Vec<usize> {
        (0..self.num_inds)
            .filter(|&ind| snp_set.iter().all(|&snp| self.genotype(snp, ind) != 0))
            .collect()
    }

    /// Run a closure with read access to the current (possibly permuted)
    /// phenotype vector.
    pub fn with_phenotypes<R>(&self, f: impl FnOnce(&Phenotypes) -> R) -> R {
        let phenotypes = self.phenotypes.read().expect("phenotype lock poisoned");
        f(&phenotypes)
    }

    /// Individuals with non-zero genotype at the whole set, grouped by
    /// phenotype category.
    pub fn individuals_per_category(&self, snp_set: &[SnpId]) -> Result<Vec<Vec<usize>>> {
        let num_categories = self.num_categories()?;
        let carriers = self.inds_with_nonzero_genotype(snp_set);
        self.with_phenotypes(|phenotypes| {
            let Phenotypes::Categorical { values, .. } = phenotypes else {
                unreachable!("checked above");
            };
            let mut result = vec![vec![]; num_categories];
            for ind in carriers {
                result[values[ind] as usize].push(ind);
            }
            Ok(result)
        })
    }

    /// Total number of individuals per phenotype category.
    pub fn num_individuals_per_category(&self) -> Result<Vec<usize>> {
        let num_categories = self.num_categories()?;
        self.with_phenotypes(|phenotypes| {
            let Phenotypes::Categorical { values, .. } = phenotypes else {
                unreachable!("checked above");
            };
            let mut counts = vec![0usize; num_categories];
            for &value in values {
                counts[value as usize] += 1;
            }
            Ok(counts)
        })
    }

    /// Seed the generator used for phenotype permutation.
    pub fn set_seed(&self, seed: u64) {
        *self.shuffle_rng.lock().expect("rng lock poisoned") = StdRng::seed_from_u64(seed);
    }

    /// Permute the current phenotype vector in place.
    pub fn shuffle_phenotypes(&self) {
        let mut rng = self.shuffle_rng.lock().expect("rng lock poisoned");
        let mut phenotypes = self.phenotypes.write().expect("phenotype lock poisoned");
        phenotypes.shuffle(&mut rng);
    }

    /// Restore the original phenotype vector.
    pub fn restore_phenotypes(&self) {
        let mut phenotypes = self.phenotypes.write().expect("phenotype lock poisoned");
        *phenotypes = self.original_phenotypes.clone();
    }

    /// Acquire the process-wide Monte-Carlo section.
    ///
    /// Phenotype permutation mutates shared state, so only one thread may
    /// drive a Monte-Carlo run at a time.
    pub fn monte_carlo_section(&self) -> MutexGuard<'_, ()> {
        self.mc_lock.lock().expect("monte carlo lock poisoned")
    }

    /// RAII guard restoring the original phenotypes on drop.
    pub fn phenotype_restorer(&self) -> PhenotypeRestorer<'_> {
        PhenotypeRestorer { instance: self }
    }
}

/// Restores the original phenotype vector when dropped, also on early error
/// returns.
pub struct PhenotypeRestorer<'a> {
    instance: &'a Instance,
}

impl Drop for PhenotypeRestorer<'_> {
    fn drop(&mut self) {
        self.instance.restore_phenotypes();
    }
}

#[cfg(test)]
mod test {
    use super::{Instance, Phenotypes};
    use crate::data::snp::SnpId;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    pub(crate) fn small_instance() -> Instance {
        // 3 SNPs x 4 individuals, SNP-major
        Instance::new(
            vec![
                0, 1, 2, 0, // rs1
                1, 1, 0, 2, // rs2
                2, 0, 1, 1, // rs3
            ],
            Phenotypes::Categorical {
                values: vec![0, 1, 0, 1],
                num_categories: 2,
            },
            vec!["rs1".into(), "rs2".into(), "rs3".into()],
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_genotype() {
        let result = Instance::new(
            vec![0, 3],
            Phenotypes::Quantitative(vec![0.0, 1.0]),
            vec!["rs1".into()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_out_of_range_category() {
        let result = Instance::new(
            vec![0, 1],
            Phenotypes::Categorical {
                values: vec![0, 2],
                num_categories: 2,
            },
            vec!["rs1".into()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_mismatched_covariates() {
        let mut instance = small_instance();
        let result = instance.set_covariates(nalgebra::DMatrix::zeros(3, 2));
        assert!(result.is_err());
        instance
            .set_covariates(nalgebra::DMatrix::zeros(4, 2))
            .unwrap();
        assert_eq!(2, instance.num_covs());
    }

    #[rstest]
    #[case(0, vec![0, 1, 2])]
    #[case(1, vec![1, 1, 0])]
    #[case(3, vec![0, 2, 1])]
    fn genotype_at_set(#[case] ind: usize, #[case] expected: Vec<u8>) {
        let instance = small_instance();
        let set = [SnpId(0), SnpId(1), SnpId(2)];
        assert_eq!(expected, instance.genotype_at_set(&set, ind));
    }

    #[test]
    fn genotype_id_round_trip() {
        let instance = small_instance();
        let set = [SnpId(0), SnpId(1), SnpId(2)];
        for ind in 0..instance.num_inds() {
            let id = instance.genotype_id_at_set(&set, ind);
            assert!(id < 27);
            assert_eq!(
                instance.genotype_at_set(&set, ind),
                Instance::id_to_genotype(id, set.len())
            );
        }
    }

    #[test]
    fn inds_with_genotype_id_scans_all() {
        let instance = small_instance();
        let set = [SnpId(0)];
        assert_eq!(vec![0, 3], instance.inds_with_genotype_id(&set, 0));
        assert_eq!(vec![1], instance.inds_with_genotype_id(&set, 1));
        assert_eq!(vec![2], instance.inds_with_genotype_id(&set, 2));
    }

    #[test]
    fn nonzero_genotype_carriers() {
        let instance = small_instance();
        // individuals with non-zero genotype at both rs1 and rs2
        assert_eq!(
            vec![1],
            instance.inds_with_nonzero_genotype(&[SnpId(0), SnpId(1)])
        );
    }

    #[test]
    fn individuals_per_category_groups_carriers() {
        let instance = small_instance();
        let groups = instance.individuals_per_category(&[SnpId(2)]).unwrap();
        assert_eq!(vec![vec![0, 2], vec![3]], groups);
        assert_eq!(
            vec![2, 2],
            instance.num_individuals_per_category().unwrap()
        );
    }

    #[test]
    fn shuffle_restore_round_trip() {
        let instance = small_instance();
        instance.set_seed(42);
        let original = instance.with_phenotypes(|p| p.clone());
        for _ in 0..5 {
            instance.shuffle_phenotypes();
        }
        instance.restore_phenotypes();
        assert_eq!(original, instance.with_phenotypes(|p| p.clone()));
    }

    #[test]
    fn restorer_restores_on_drop() {
        let instance = small_instance();
        instance.set_seed(7);
        let original = instance.with_phenotypes(|p| p.clone());
        {
            let _restorer = instance.phenotype_restorer();
            instance.shuffle_phenotypes();
        }
        assert_eq!(original, instance.with_phenotypes(|p| p.clone()));
    }
}
