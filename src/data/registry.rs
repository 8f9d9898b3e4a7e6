//! The SNP registry: name lookup, annotations, variable attributes, filter
//! state.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::data::instance::Instance;
use crate::data::snp::SnpId;
use crate::err::{Error, Result};

/// Per-SNP record owned by the registry.
#[derive(Debug, Clone, Default)]
pub struct SnpRecord {
    /// External name, typically an rs-id.
    pub name: String,
    /// Chromosome, empty when the input had none.
    pub chromosome: String,
    /// Minor allele frequency, when known.
    pub maf: Option<f64>,
    /// Annotations (gene symbols etc.) attached by the annotation sources.
    pub annotations: Vec<String>,
    /// Free-form key/value attributes.
    pub attributes: BTreeMap<String, String>,
    /// Maximum marginal association p-value, filled by the MMA filter.
    pub mma: f64,
    /// Set by filters; removed SNPs are skipped by the stages that consult
    /// the flag but may still appear in networks and SNP sets.
    pub removed: bool,
}

/// Registry of all SNPs of a run.
///
/// Created once at load and handed explicitly to whoever needs name lookups;
/// there is no process-wide instance.
#[derive(Debug, Default)]
pub struct SnpRegistry {
    records: Vec<SnpRecord>,
    name_map: HashMap<String, SnpId>,
    annotation_map: HashMap<String, Vec<SnpId>>,
}

impl SnpRegistry {
    /// Build the registry from a loaded instance.
    pub fn from_instance(instance: &Instance) -> Result<Self> {
        let mut records = Vec::with_capacity(instance.num_snps());
        let mut name_map = HashMap::with_capacity(instance.num_snps());
        for (i, name) in instance.snp_names().iter().enumerate() {
            if name_map.insert(name.clone(), SnpId(i as u32)).is_some() {
                return Err(Error::BadInput(format!("duplicate SNP name {:?}", name)));
            }
            records.push(SnpRecord {
                name: name.clone(),
                chromosome: instance
                    .chromosomes()
                    .get(i)
                    .cloned()
                    .unwrap_or_default(),
                maf: instance.mafs().get(i).copied(),
                ..SnpRecord::default()
            });
        }
        Ok(Self {
            records,
            name_map,
            annotation_map: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over all SNP ids in load order.
    pub fn all_snps(&self) -> impl Iterator<Item = SnpId> {
        (0..self.records.len() as u32).map(SnpId)
    }

    pub fn record(&self, snp: SnpId) -> Result<&SnpRecord> {
        self.records
            .get(snp.index())
            .ok_or_else(|| Error::NotFound(format!("SNP id {}", snp)))
    }

    fn record_mut(&mut self, snp: SnpId) -> Result<&mut SnpRecord> {
        self.records
            .get_mut(snp.index())
            .ok_or_else(|| Error::NotFound(format!("SNP id {}", snp)))
    }

    pub fn name(&self, snp: SnpId) -> &str {
        &self.records[snp.index()].name
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.lookup_name(name).is_some()
    }

    fn lookup_name(&self, name: &str) -> Option<SnpId> {
        self.name_map.get(name).copied().or_else(|| {
            // bare "NNN" also matches an rs-style id "rsNNN"
            if name.chars().all(|c| c.is_ascii_digit()) {
                self.name_map.get(&format!("rs{}", name)).copied()
            } else {
                None
            }
        })
    }

    /// Look a SNP up by external name, applying the rs-trim rule.
    pub fn by_name(&self, name: &str) -> Result<SnpId> {
        self.lookup_name(name)
            .ok_or_else(|| Error::NotFound(format!("SNP named {:?}", name)))
    }

    /// All SNPs carrying the given annotation.
    pub fn by_annotation(&self, annotation: &str, include_removed: bool) -> Vec<SnpId> {
        self.annotation_map
            .get(annotation)
            .map(|snps| {
                snps.iter()
                    .copied()
                    .filter(|&snp| include_removed || !self.records[snp.index()].removed)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Attach annotations; rebuilds the reverse index.
    pub fn add_annotations(&mut self, pairs: impl IntoIterator<Item = (SnpId, String)>) -> Result<()> {
        for (snp, annotation) in pairs {
            let record = self.record_mut(snp)?;
            if !record.annotations.contains(&annotation) {
                record.annotations.push(annotation);
            }
        }
        self.rebuild_annotation_map();
        Ok(())
    }

    fn rebuild_annotation_map(&mut self) {
        self.annotation_map.clear();
        for (i, record) in self.records.iter().enumerate() {
            for annotation in &record.annotations {
                self.annotation_map
                    .entry(annotation.clone())
                    .or_default()
                    .push(SnpId(i as u32));
            }
        }
    }

    pub fn annotations(&self, snp: SnpId) -> &[String] {
        &self.records[snp.index()].annotations
    }

    /// Set an attribute, overwriting any previous value.
    pub fn set_attribute(&mut self, snp: SnpId, key: &str, value: impl Into<String>) -> Result<()> {
        self.record_mut(snp)?
            .attributes
            .insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn attribute(&self, snp: SnpId, key: &str) -> Option<&str> {
        self.records[snp.index()]
            .attributes
            .get(key)
            .map(|s| s.as_str())
    }

    /// Add a value to a separated attribute list: the existing value is split
    /// by `sep`, the new value added, and the union re-joined sorted.
    pub fn set_or_add_attribute(
        &mut self,
        snp: SnpId,
        key: &str,
        value: &str,
        sep: char,
    ) -> Result<()> {
        let record = self.record_mut(snp)?;
        let mut parts: BTreeSet<String> = record
            .attributes
            .get(key)
            .map(|existing| {
                existing
                    .split(sep)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();
        parts.insert(value.to_string());
        let joined = parts.into_iter().collect::<Vec<_>>().join(&sep.to_string());
        record.attributes.insert(key.to_string(), joined);
        Ok(())
    }

    pub fn set_removed(&mut self, snp: SnpId, removed: bool) {
        self.records[snp.index()].removed = removed;
    }

    pub fn is_removed(&self, snp: SnpId) -> bool {
        self.records[snp.index()].removed
    }

    pub fn set_mma(&mut self, snp: SnpId, mma: f64) {
        self.records[snp.index()].mma = mma;
    }

    pub fn mma(&self, snp: SnpId) -> f64 {
        self.records[snp.index()].mma
    }

    pub fn maf(&self, snp: SnpId) -> Option<f64> {
        self.records[snp.index()].maf
    }

    pub fn has_maf_information(&self) -> bool {
        self.records.iter().all(|r| r.maf.is_some()) && !self.records.is_empty()
    }

    /// Attach MAF values, one per SNP in id order.
    pub fn set_maf_information(&mut self, maf_data: Vec<f64>) -> Result<()> {
        if maf_data.len() != self.records.len() {
            return Err(Error::BadInput(format!(
                "got {} MAF values for {} SNPs",
                maf_data.len(),
                self.records.len()
            )));
        }
        for (record, maf) in self.records.iter_mut().zip(maf_data) {
            record.maf = Some(maf);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::SnpRegistry;
    use crate::data::instance::{Instance, Phenotypes};
    use crate::data::snp::SnpId;
    use crate::err::Error;
    use pretty_assertions::assert_eq;

    fn registry_of(names: &[&str]) -> SnpRegistry {
        let n = names.len();
        let instance = Instance::new(
            vec![0u8; n * 2],
            Phenotypes::Quantitative(vec![0.0, 1.0]),
            names.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap();
        SnpRegistry::from_instance(&instance).unwrap()
    }

    #[test]
    fn by_name_with_rs_trim_rule() {
        let registry = registry_of(&["rs1", "rs2", "rs3", "rs4", "rs5"]);
        assert_eq!(SnpId(2), registry.by_name("rs3").unwrap());
        assert_eq!(SnpId(2), registry.by_name("3").unwrap());
        assert!(matches!(
            registry.by_name("rs99").unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn duplicate_names_rejected() {
        let instance = Instance::new(
            vec![0u8; 4],
            Phenotypes::Quantitative(vec![0.0, 1.0]),
            vec!["rs1".into(), "rs1".into()],
        )
        .unwrap();
        assert!(SnpRegistry::from_instance(&instance).is_err());
    }

    #[test]
    fn annotations_and_reverse_index() {
        let mut registry = registry_of(&["rs1", "rs2", "rs3"]);
        registry
            .add_annotations(vec![
                (SnpId(0), "BRCA1".to_string()),
                (SnpId(1), "BRCA1".to_string()),
                (SnpId(1), "TP53".to_string()),
            ])
            .unwrap();
        assert_eq!(
            vec![SnpId(0), SnpId(1)],
            registry.by_annotation("BRCA1", false)
        );
        registry.set_removed(SnpId(0), true);
        assert_eq!(vec![SnpId(1)], registry.by_annotation("BRCA1", false));
        assert_eq!(
            vec![SnpId(0), SnpId(1)],
            registry.by_annotation("BRCA1", true)
        );
        assert!(registry.by_annotation("UNKNOWN", true).is_empty());
    }

    #[test]
    fn set_or_add_attribute_joins_sorted_union() {
        let mut registry = registry_of(&["rs1"]);
        registry
            .set_or_add_attribute(SnpId(0), "ms_source", "PPI", ';')
            .unwrap();
        registry
            .set_or_add_attribute(SnpId(0), "ms_source", "BIOGRID", ';')
            .unwrap();
        registry
            .set_or_add_attribute(SnpId(0), "ms_source", "PPI", ';')
            .unwrap();
        assert_eq!(
            Some("BIOGRID;PPI"),
            registry.attribute(SnpId(0), "ms_source")
        );
    }

    #[test]
    fn set_attribute_overwrites() {
        let mut registry = registry_of(&["rs1"]);
        registry
            .set_attribute(SnpId(0), "leiden_cluster", "1")
            .unwrap();
        registry
            .set_attribute(SnpId(0), "leiden_cluster", "2")
            .unwrap();
        assert_eq!(Some("2"), registry.attribute(SnpId(0), "leiden_cluster"));
    }

    #[test]
    fn maf_information() {
        let mut registry = registry_of(&["rs1", "rs2"]);
        assert!(!registry.has_maf_information());
        registry.set_maf_information(vec![0.1, 0.25]).unwrap();
        assert!(registry.has_maf_information());
        assert_eq!(Some(0.25), registry.maf(SnpId(1)));
        assert!(registry.set_maf_information(vec![0.1]).is_err());
    }
}
