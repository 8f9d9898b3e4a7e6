//! SNP annotation sources.

use std::path::{Path, PathBuf};

use crate::data::registry::SnpRegistry;
use crate::err::{Error, Result};

/// A `path|has-header|snp-col|anno-col|csv-sep|snp-sep|anno-sep` annotation
/// source specification.
///
/// Columns are addressed by header name when the file has a header, by
/// zero-based index otherwise.  Cells may hold single tokens or lists split
/// by the per-column separator.
#[derive(Debug, Clone)]
pub struct AnnotationSpec {
    pub path: PathBuf,
    pub has_header: bool,
    pub snp_column: String,
    pub annotation_column: String,
    pub csv_separator: char,
    pub snp_separator: char,
    pub annotation_separator: char,
}

impl std::str::FromStr for AnnotationSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split('|').collect();
        if fields.len() != 7 {
            anyhow::bail!(
                "expected path|has-header|snp-col|anno-col|csv-sep|snp-sep|anno-sep, got {:?}",
                s
            );
        }
        Ok(Self {
            path: PathBuf::from(fields[0]),
            has_header: parse_bool(fields[1])?,
            snp_column: fields[2].to_string(),
            annotation_column: fields[3].to_string(),
            csv_separator: parse_separator(fields[4])?,
            snp_separator: parse_separator(fields[5])?,
            annotation_separator: parse_separator(fields[6])?,
        })
    }
}

pub(crate) fn parse_bool(field: &str) -> std::result::Result<bool, anyhow::Error> {
    match field.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        other => anyhow::bail!("expected yes/no, got {:?}", other),
    }
}

pub(crate) fn parse_separator(field: &str) -> std::result::Result<char, anyhow::Error> {
    match field {
        "\\t" | "TAB" => Ok('\t'),
        _ => {
            let mut chars = field.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => anyhow::bail!("expected a single separator character, got {:?}", field),
            }
        }
    }
}

/// Resolve a column given by name or index against a header row.
pub(crate) fn resolve_column(
    column: &str,
    header: Option<&csv::StringRecord>,
    path: &Path,
) -> Result<usize> {
    if let Some(header) = header {
        if let Some(index) = header.iter().position(|cell| cell == column) {
            return Ok(index);
        }
    }
    column.parse::<usize>().map_err(|_| {
        Error::BadInput(format!(
            "column {:?} not found in {:?} and not an index",
            column, path
        ))
    })
}

/// Read an annotation CSV and attach `(snp, annotation)` pairs to the
/// registry.
///
/// Unknown SNP names fail with `NotFound` unless `ignore_unknown_snps` is
/// set, which downgrades them to a skip.
pub fn annotate_snps(
    registry: &mut SnpRegistry,
    spec: &AnnotationSpec,
    ignore_unknown_snps: bool,
) -> Result<usize> {
    tracing::info!("annotating SNPs from {:?}", spec.path);
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
    let snp_column = resolve_column(&spec.snp_column, header.as_ref(), &spec.path)?;
    let annotation_column =
        resolve_column(&spec.annotation_column, header.as_ref(), &spec.path)?;

    let mut pairs = vec![];
    for record in records {
        let record =
            record.map_err(|e| Error::BadInput(format!("bad row in {:?}: {}", spec.path, e)))?;
        let (Some(snp_cell), Some(annotation_cell)) =
            (record.get(snp_column), record.get(annotation_column))
        else {
            return Err(Error::BadInput(format!(
                "row in {:?} misses column {} or {}",
                spec.path, snp_column, annotation_column
            )));
        };

        for snp_name in snp_cell.split(spec.snp_separator) {
            let snp_name = snp_name.trim();
            if snp_name.is_empty() {
                continue;
            }
            let snp = match registry.by_name(snp_name) {
                Ok(snp) => snp,
                Err(Error::NotFound(_)) if ignore_unknown_snps => continue,
                Err(e) => return Err(e),
            };
            for annotation in annotation_cell.split(spec.annotation_separator) {
                let annotation = annotation.trim();
                if !annotation.is_empty() {
                    pairs.push((snp, annotation.to_string()));
                }
            }
        }
    }

    let num_pairs = pairs.len();
    registry.add_annotations(pairs)?;
    tracing::info!("attached {} annotation pairs", num_pairs);
    Ok(num_pairs)
}

/// Annotate from the prepared dbSNP gene map shipped in the data directory.
pub fn annotate_dbsnp(
    registry: &mut SnpRegistry,
    data_directory: &Path,
    ignore_unknown_snps: bool,
) -> Result<usize> {
    let spec = AnnotationSpec {
        path: data_directory.join("dbSNP.csv"),
        has_header: true,
        snp_column: "snp".to_string(),
        annotation_column: "gene".to_string(),
        csv_separator: ',',
        snp_separator: ';',
        annotation_separator: ';',
    };
    annotate_snps(registry, &spec, ignore_unknown_snps)
}
