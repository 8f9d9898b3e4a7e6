//! SNP sets: sorted, capped sequences of SNP ids with attributes and
//! memoized scores.

use std::collections::BTreeMap;

use crate::data::snp::SnpId;
use crate::err::{Error, Result, MAX_SNP_SET_SIZE};

/// A sorted set of at most [`MAX_SNP_SET_SIZE`] SNPs.
///
/// Carries a string attribute map and a memoized vector of scores, one slot
/// per score kind, with a bitmask tracking which slots are filled.  Any
/// mutation of the SNP sequence clears the score cache but keeps the
/// attributes.  Equality and hashing consider the SNP sequence only.
#[derive(Debug, Clone, Default)]
pub struct SnpSet {
    snps: Vec<SnpId>,
    attributes: BTreeMap<String, String>,
    scores: Vec<f64>,
    computed: u64,
}

impl SnpSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from arbitrary SNPs; sorts and deduplicates.
    pub fn from_snps(snps: impl IntoIterator<Item = SnpId>) -> Result<Self> {
        let mut snps: Vec<SnpId> = snps.into_iter().collect();
        snps.sort_unstable();
        snps.dedup();
        if snps.len() > MAX_SNP_SET_SIZE {
            return Err(Error::SetTooLarge(snps.len()));
        }
        Ok(Self {
            snps,
            ..Self::default()
        })
    }

    /// Build a single-SNP set.
    pub fn singleton(snp: SnpId) -> Self {
        Self {
            snps: vec![snp],
            ..Self::default()
        }
    }

    pub fn snps(&self) -> &[SnpId] {
        &self.snps
    }

    pub fn len(&self) -> usize {
        self.snps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snps.is_empty()
    }

    pub fn contains(&self, snp: SnpId) -> bool {
        self.snps.binary_search(&snp).is_ok()
    }

    /// Insert a SNP, keeping the sequence sorted.  A no-op if already present.
    pub fn insert(&mut self, snp: SnpId) -> Result<()> {
        if let Err(pos) = self.snps.binary_search(&snp) {
            if self.snps.len() >= MAX_SNP_SET_SIZE {
                return Err(Error::SetTooLarge(self.snps.len() + 1));
            }
            self.snps.insert(pos, snp);
            self.invalidate_scores();
        }
        Ok(())
    }

    /// Remove a SNP.  A no-op if absent.
    pub fn remove(&mut self, snp: SnpId) {
        if let Ok(pos) = self.snps.binary_search(&snp) {
            self.snps.remove(pos);
            self.invalidate_scores();
        }
    }

    /// Merge another set into this one.
    pub fn merge(&mut self, other: &SnpSet) -> Result<()> {
        for &snp in other.snps() {
            self.insert(snp)?;
        }
        for (key, value) in other.attributes.iter() {
            self.attributes.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    /// A copy of this set with one more SNP.
    pub fn with(&self, snp: SnpId) -> Result<SnpSet> {
        let mut next = self.clone();
        next.insert(snp)?;
        Ok(next)
    }

    /// A copy of this set without the given SNP.
    pub fn without(&self, snp: SnpId) -> SnpSet {
        let mut next = self.clone();
        next.remove(snp);
        next
    }

    pub fn set_attribute(&mut self, key: &str, value: impl Into<String>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute_keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(|k| k.as_str())
    }

    pub fn clear_attributes(&mut self) {
        self.attributes.clear();
    }

    /// The memoized score for the given slot, if computed.
    pub fn cached_score(&self, slot: usize) -> Option<f64> {
        if self.computed & (1u64 << slot) != 0 {
            Some(self.scores[slot])
        } else {
            None
        }
    }

    /// Memoize a score.
    pub fn store_score(&mut self, slot: usize, value: f64) {
        if self.scores.len() <= slot {
            self.scores.resize(slot + 1, 0.0);
        }
        self.scores[slot] = value;
        self.computed |= 1u64 << slot;
    }

    fn invalidate_scores(&mut self) {
        self.computed = 0;
    }
}

impl PartialEq for SnpSet {
    fn eq(&self, other: &Self) -> bool {
        self.snps == other.snps
    }
}

impl Eq for SnpSet {}

impl PartialOrd for SnpSet {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SnpSet {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.snps.cmp(&other.snps)
    }
}

impl std::hash::Hash for SnpSet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // fold by element so the hash only depends on the sequence
        let mut acc: u64 = 0;
        for snp in &self.snps {
            acc ^= u64::from(snp.0).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        }
        state.write_u64(acc);
    }
}

impl std::fmt::Display for SnpSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", crate::common::join(self.snps.iter(), ";"))
    }
}

#[cfg(test)]
mod test {
    use super::SnpSet;
    use crate::data::snp::SnpId;
    use crate::err::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn from_snps_sorts_and_dedups() {
        let set = SnpSet::from_snps([SnpId(5), SnpId(1), SnpId(5), SnpId(3)]).unwrap();
        assert_eq!(&[SnpId(1), SnpId(3), SnpId(5)], set.snps());
    }

    #[test]
    fn insert_beyond_cap_fails() {
        let mut set = SnpSet::from_snps((0..10).map(SnpId)).unwrap();
        let err = set.insert(SnpId(99)).unwrap_err();
        assert!(matches!(err, Error::SetTooLarge(11)));
        // re-inserting an existing member is still fine
        set.insert(SnpId(3)).unwrap();
        assert_eq!(10, set.len());
    }

    #[test]
    fn mutation_clears_score_cache_keeps_attributes() {
        let mut set = SnpSet::from_snps([SnpId(1), SnpId(2)]).unwrap();
        set.set_attribute("SEED_ORIGIN", "RANDOM_CONNECTED");
        set.store_score(0, 1.5);
        assert_eq!(Some(1.5), set.cached_score(0));

        set.insert(SnpId(3)).unwrap();
        assert_eq!(None, set.cached_score(0));
        assert_eq!(Some("RANDOM_CONNECTED"), set.attribute("SEED_ORIGIN"));

        set.store_score(2, -0.5);
        set.remove(SnpId(1));
        assert_eq!(None, set.cached_score(2));
    }

    #[test]
    fn equality_and_hash_ignore_attributes() {
        use std::collections::HashSet;
        let mut a = SnpSet::from_snps([SnpId(1), SnpId(2)]).unwrap();
        let b = SnpSet::from_snps([SnpId(2), SnpId(1)]).unwrap();
        a.set_attribute("NUM_ROUNDS", "3");
        assert_eq!(a, b);

        let mut seen = HashSet::new();
        seen.insert(a);
        assert!(seen.contains(&b));
    }

    #[test]
    fn ordering_is_element_wise() {
        let a = SnpSet::from_snps([SnpId(1), SnpId(2)]).unwrap();
        let b = SnpSet::from_snps([SnpId(1), SnpId(3)]).unwrap();
        let c = SnpSet::from_snps([SnpId(1), SnpId(2)]).unwrap();
        assert!(a < b);
        // equal sequences are neither less nor greater
        assert!(!(a < c) && !(c < a));
    }

    #[test]
    fn merge_unions_snps_and_attributes() {
        let mut a = SnpSet::from_snps([SnpId(1)]).unwrap();
        let mut b = SnpSet::from_snps([SnpId(2)]).unwrap();
        b.set_attribute("SEED_ORIGIN", "COMMUNITY_WISE");
        a.merge(&b).unwrap();
        assert_eq!(&[SnpId(1), SnpId(2)], a.snps());
        assert_eq!(Some("COMMUNITY_WISE"), a.attribute("SEED_ORIGIN"));
    }
}
