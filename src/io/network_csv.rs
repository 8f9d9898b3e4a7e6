//! Network construction from annotation-level interaction tables.

use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::data::registry::SnpRegistry;
use crate::data::snp::{SnpEdge, SnpId};
use crate::err::{Error, Result};
use crate::io::annotate::{parse_bool, parse_separator, resolve_column};
use crate::network::SnpNetwork;

/// Edge label of the same-annotation connector.
const SAME_TAG_LABEL: &str = "SAME_TAG";

/// A `name|path|has-header|col1|col2|csv-sep|col1-sep|col2-sep` network
/// source specification.
#[derive(Debug, Clone)]
pub struct NetworkSpec {
    pub name: String,
    pub path: PathBuf,
    pub has_header: bool,
    pub column1: String,
    pub column2: String,
    pub csv_separator: char,
    pub column1_separator: char,
    pub column2_separator: char,
}

impl std::str::FromStr for NetworkSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split('|').collect();
        if fields.len() != 8 {
            anyhow::bail!(
                "expected name|path|has-header|col1|col2|csv-sep|col1-sep|col2-sep, got {:?}",
                s
            );
        }
        Ok(Self {
            name: fields[0].to_string(),
            path: PathBuf::from(fields[1]),
            has_header: parse_bool(fields[2])?,
            column1: fields[3].to_string(),
            column2: fields[4].to_string(),
            csv_separator: parse_separator(fields[5])?,
            column1_separator: parse_separator(fields[6])?,
            column2_separator: parse_separator(fields[7])?,
        })
    }
}

impl NetworkSpec {
    /// The prepared BIOGRID gene-gene interaction table of a data directory.
    pub fn biogrid(data_directory: &Path) -> Self {
        Self {
            name: "BIOGRID".to_string(),
            path: data_directory.join("BIOGRID.csv"),
            has_header: true,
            column1: "gene1".to_string(),
            column2: "gene2".to_string(),
            csv_separator: ',',
            column1_separator: ';',
            column2_separator: ';',
        }
    }
}

/// Insert the edges of an annotation-level interaction table.
///
/// Every row yields the Cartesian product of its two token lists; each token
/// pair connects all SNPs carrying the first annotation with all SNPs
/// carrying the second.  SNPs marked removed are skipped.
pub fn connect_from_csv(
    registry: &SnpRegistry,
    network: &mut SnpNetwork,
    spec: &NetworkSpec,
) -> Result<usize> {
    tracing::info!("building network {} from {:?}", spec.name, spec.path);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(spec.csv_separator as u8)
        .from_path(&spec.path)
        .map_err(|e| Error::BadInput(format!("cannot read {:?}: {}", spec.path, e)))?;

    let mut records = reader.records();
    let header = if spec.has_header {
        Some(
            records
                .next()
                .transpose()
                .map_err(|e| Error::BadInput(format!("bad header in {:?}: {}", spec.path, e)))?
                .ok_or_else(|| Error::BadInput(format!("{:?} is empty", spec.path)))?,
        )
    } else {
        None
    };
    let column1 = resolve_column(&spec.column1, header.as_ref(), &spec.path)?;
    let column2 = resolve_column(&spec.column2, header.as_ref(), &spec.path)?;

    let mut num_inserted = 0usize;
    for record in records {
        let record =
            record.map_err(|e| Error::BadInput(format!("bad row in {:?}: {}", spec.path, e)))?;
        let (Some(cell1), Some(cell2)) = (record.get(column1), record.get(column2)) else {
            return Err(Error::BadInput(format!(
                "row in {:?} misses column {} or {}",
                spec.path, column1, column2
            )));
        };

        let tokens1: Vec<&str> = cell1
            .split(spec.column1_separator)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        let tokens2: Vec<&str> = cell2
            .split(spec.column2_separator)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        for (token1, token2) in tokens1.iter().cartesian_product(tokens2.iter()) {
            let snps1 = registry.by_annotation(token1, false);
            let snps2 = registry.by_annotation(token2, false);
            for (&snp1, &snp2) in snps1.iter().cartesian_product(snps2.iter()) {
                if snp1 != snp2 {
                    network.add_edge(SnpEdge::new(snp1, snp2), &spec.name)?;
                    num_inserted += 1;
                }
            }
        }
    }
    tracing::info!(
        "network {}: {} nodes, {} edges",
        spec.name,
        network.num_nodes(),
        network.num_edges()
    );
    Ok(num_inserted)
}

/// Connect every pair of SNPs sharing an annotation.
pub fn connect_same_annotation(registry: &SnpRegistry, network: &mut SnpNetwork) -> Result<usize> {
    let mut num_inserted = 0usize;
    let mut annotations: Vec<String> = registry
        .all_snps()
        .flat_map(|snp| registry.annotations(snp).iter().cloned())
        .collect();
    annotations.sort_unstable();
    annotations.dedup();

    for annotation in &annotations {
        let snps: Vec<SnpId> = registry.by_annotation(annotation, false);
        for (i, &snp1) in snps.iter().enumerate() {
            for &snp2 in &snps[i + 1..] {
                network.add_edge(SnpEdge::new(snp1, snp2), SAME_TAG_LABEL)?;
                num_inserted += 1;
            }
        }
    }
    tracing::info!(
        "same-annotation connector inserted {} edges over {} annotations",
        num_inserted,
        annotations.len()
    );
    Ok(num_inserted)
}
