//! Instance loaders and the compact binary format.

use std::io::{Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::data::instance::{Instance, Phenotypes};
use crate::data::snp::SnpId;
use crate::err::{Error, Result};

/// Supported genotype input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InputFormat {
    CsvSnpsAsRowsFirst,
    CsvSnpsAsRowsLast,
    CsvSnpsAsColumnsFirst,
    CsvSnpsAsColumnsLast,
    JsonEpigen,
    Bin,
}

/// Kind of the phenotype column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PhenotypeType {
    Quantitative,
    /// Categorical with two categories.
    Dichotomous,
    Categorical,
}

/// Whether a cross-validation load keeps the training or the validation
/// individuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DataPurpose {
    Training,
    Validation,
}

/// Cross-validation selection applied while loading.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub num_folds: usize,
    pub fold_id: usize,
    pub purpose: DataPurpose,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            num_folds: 1,
            fold_id: 0,
            purpose: DataPurpose::Training,
        }
    }
}

impl LoadOptions {
    /// Which individuals to drop: the in-fold ones for training, everyone
    /// else for validation.
    fn skip_mask(&self, num_inds: usize) -> Vec<bool> {
        if self.num_folds <= 1 {
            return vec![false; num_inds];
        }
        let (start, end) = fold_bounds(num_inds, self.num_folds, self.fold_id);
        (0..num_inds)
            .map(|ind| {
                let in_fold = ind >= start && ind < end;
                match self.purpose {
                    DataPurpose::Training => in_fold,
                    DataPurpose::Validation => !in_fold,
                }
            })
            .collect()
    }
}

/// Half-open index range of one cross-validation fold.
pub(crate) fn fold_bounds(num_inds: usize, num_folds: usize, fold_id: usize) -> (usize, usize) {
    let bound = |id: usize| id * (num_inds / num_folds) + id.min(num_inds % num_folds);
    (bound(fold_id), bound(fold_id + 1))
}

/// Load an instance from any supported format.
pub fn load_instance(
    path: &Path,
    format: InputFormat,
    phenotype_type: PhenotypeType,
    num_categories: usize,
    options: LoadOptions,
) -> Result<Instance> {
    tracing::info!("loading instance from {:?} ({})", path, format);
    match format {
        InputFormat::CsvSnpsAsRowsFirst => {
            load_csv(path, true, true, phenotype_type, num_categories, options)
        }
        InputFormat::CsvSnpsAsRowsLast => {
            load_csv(path, true, false, phenotype_type, num_categories, options)
        }
        InputFormat::CsvSnpsAsColumnsFirst => {
            load_csv(path, false, true, phenotype_type, num_categories, options)
        }
        InputFormat::CsvSnpsAsColumnsLast => {
            load_csv(path, false, false, phenotype_type, num_categories, options)
        }
        InputFormat::JsonEpigen => load_json(path, phenotype_type, num_categories, options),
        InputFormat::Bin => load_bin(path, num_categories, options),
    }
}

fn parse_genotype(cell: &str, context: &str) -> Result<u8> {
    match cell.trim() {
        "0" => Ok(0),
        "1" => Ok(1),
        "2" => Ok(2),
        other => Err(Error::BadInput(format!(
            "invalid genotype {:?} at {} (expected 0, 1, or 2)",
            other, context
        ))),
    }
}

fn parse_phenotypes(
    cells: &[String],
    phenotype_type: PhenotypeType,
    num_categories: usize,
) -> Result<Phenotypes> {
    match phenotype_type {
        PhenotypeType::Quantitative => {
            let values = cells
                .iter()
                .map(|cell| {
                    cell.trim().parse::<f64>().map_err(|_| {
                        Error::BadInput(format!(
                            "invalid quantitative phenotype {:?} (expected a double)",
                            cell
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            Ok(Phenotypes::Quantitative(values))
        }
        PhenotypeType::Dichotomous | PhenotypeType::Categorical => {
            let num_categories = if phenotype_type == PhenotypeType::Dichotomous {
                2
            } else {
                num_categories
            };
            let values = cells
                .iter()
                .map(|cell| {
                    cell.trim()
                        .parse::<u16>()
                        .ok()
                        .filter(|&v| (v as usize) < num_categories)
                        .ok_or_else(|| {
                            Error::BadInput(format!(
                                "invalid phenotype {:?} (expected a category below {})",
                                cell, num_categories
                            ))
                        })
                })
                .collect::<Result<Vec<u16>>>()?;
            Ok(Phenotypes::Categorical {
                values,
                num_categories,
            })
        }
    }
}

/// Read a whole delimited file into rows of cells.
fn read_cells(path: &Path, delimiter: u8) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| Error::BadInput(format!("cannot read {:?}: {}", path, e)))?;
    let mut rows = vec![];
    for record in reader.records() {
        let record = record.map_err(|e| Error::BadInput(format!("bad row in {:?}: {}", path, e)))?;
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(rows)
}

fn load_csv(
    path: &Path,
    snps_as_rows: bool,
    info_first: bool,
    phenotype_type: PhenotypeType,
    num_categories: usize,
    options: LoadOptions,
) -> Result<Instance> {
    let mut rows = read_cells(path, b',')?;
    if !snps_as_rows {
        // transpose so that rows are SNPs and the info/phenotype layout match
        let num_cols = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        let mut transposed = vec![vec![String::new(); rows.len()]; num_cols];
        for (i, row) in rows.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                transposed[j][i] = cell.clone();
            }
        }
        rows = transposed;
    }
    if rows.len() < 2 {
        return Err(Error::BadInput(format!(
            "{:?} holds no SNP rows besides the phenotype",
            path
        )));
    }

    // the last SNP-axis entry holds the phenotypes
    let phenotype_row = rows.pop().expect("length checked above");
    let mut snp_names = vec![];
    let mut genotype_rows: Vec<Vec<String>> = vec![];
    for mut row in rows {
        if row.len() < 2 {
            return Err(Error::BadInput(format!("{:?} holds a short SNP row", path)));
        }
        let name = if info_first {
            row.remove(0)
        } else {
            row.pop().expect("length checked above")
        };
        snp_names.push(name);
        genotype_rows.push(row);
    }
    let mut phenotype_cells = phenotype_row;
    if phenotype_cells.len() == genotype_rows[0].len() + 1 {
        // the phenotype row carries an info cell as well
        if info_first {
            phenotype_cells.remove(0);
        } else {
            phenotype_cells.pop();
        }
    }

    let num_inds = genotype_rows[0].len();
    if phenotype_cells.len() != num_inds {
        return Err(Error::BadInput(format!(
            "{:?} holds {} phenotypes for {} individuals",
            path,
            phenotype_cells.len(),
            num_inds
        )));
    }

    let skip = options.skip_mask(num_inds);
    let mut genotypes = vec![];
    for (snp, row) in genotype_rows.iter().enumerate() {
        if row.len() != num_inds {
            return Err(Error::BadInput(format!(
                "{:?} holds {} genotypes for SNP {} but {} individuals",
                path,
                row.len(),
                snp_names[snp],
                num_inds
            )));
        }
        for (ind, cell) in row.iter().enumerate() {
            if !skip[ind] {
                genotypes.push(parse_genotype(
                    cell,
                    &format!("SNP {} / individual {}", snp_names[snp], ind),
                )?);
            }
        }
    }
    let kept_phenotypes: Vec<String> = phenotype_cells
        .into_iter()
        .zip(&skip)
        .filter(|(_, &skipped)| !skipped)
        .map(|(cell, _)| cell)
        .collect();

    Instance::new(
        genotypes,
        parse_phenotypes(&kept_phenotypes, phenotype_type, num_categories)?,
        snp_names,
    )
}

#[derive(serde::Deserialize)]
struct EpigenFile {
    num_snps: usize,
    num_inds: usize,
    genotype: Vec<Vec<u8>>,
    phenotype: Vec<serde_json::Value>,
    snps: Vec<serde_json::Value>,
    #[serde(default)]
    mafs: Vec<f64>,
    #[serde(default)]
    disease_snps: Vec<u32>,
}

fn load_json(
    path: &Path,
    phenotype_type: PhenotypeType,
    num_categories: usize,
    options: LoadOptions,
) -> Result<Instance> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::BadInput(format!("cannot read {:?}: {}", path, e)))?;
    let parsed: EpigenFile = serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| Error::BadInput(format!("invalid JSON in {:?}: {}", path, e)))?;

    if parsed.num_snps == 0 || parsed.num_inds == 0 {
        return Err(Error::BadInput(format!(
            "{:?} announces {} SNPs and {} individuals",
            path, parsed.num_snps, parsed.num_inds
        )));
    }
    if parsed.genotype.len() != parsed.num_snps
        || parsed.genotype.iter().any(|row| row.len() != parsed.num_inds)
        || parsed.phenotype.len() != parsed.num_inds
        || parsed.snps.len() != parsed.num_snps
    {
        return Err(Error::BadInput(format!(
            "{:?} has inconsistent genotype, phenotype, or snps dimensions",
            path
        )));
    }
    {
        let mut seen = std::collections::HashSet::new();
        for &snp in &parsed.disease_snps {
            if snp as usize >= parsed.num_snps || !seen.insert(snp) {
                return Err(Error::BadInput(format!(
                    "{:?} has an invalid or duplicate disease SNP index {}",
                    path, snp
                )));
            }
        }
    }

    let skip = options.skip_mask(parsed.num_inds);
    let mut genotypes = vec![];
    for row in &parsed.genotype {
        for (ind, &value) in row.iter().enumerate() {
            if !skip[ind] {
                genotypes.push(value);
            }
        }
    }
    let phenotype_cells: Vec<String> = parsed
        .phenotype
        .iter()
        .zip(&skip)
        .filter(|(_, &skipped)| !skipped)
        .map(|(value, _)| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    let mut snp_names = vec![];
    let mut chromosomes = vec![];
    for snp in &parsed.snps {
        match snp {
            serde_json::Value::String(name) => snp_names.push(name.clone()),
            serde_json::Value::Array(fields) => {
                let name = fields
                    .first()
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        Error::BadInput(format!("{:?} has a snps entry without an rs-id", path))
                    })?;
                snp_names.push(name.to_string());
                if let Some(chromosome) = fields.get(1).and_then(|v| v.as_str()) {
                    chromosomes.push(chromosome.to_string());
                }
            }
            _ => {
                return Err(Error::BadInput(format!(
                    "{:?} has an unsupported snps entry",
                    path
                )))
            }
        }
    }

    let mut instance = Instance::new(
        genotypes,
        parse_phenotypes(&phenotype_cells, phenotype_type, num_categories)?,
        snp_names,
    )?;
    if chromosomes.len() == parsed.num_snps {
        instance.set_chromosomes(chromosomes)?;
    }
    if !parsed.mafs.is_empty() {
        instance.set_mafs(parsed.mafs)?;
    }
    instance.set_disease_snps(parsed.disease_snps.into_iter().map(SnpId).collect())?;
    Ok(instance)
}

fn load_bin(path: &Path, num_categories: usize, options: LoadOptions) -> Result<Instance> {
    let bad = |message: String| Error::BadInput(format!("{:?}: {}", path, message));
    let file =
        std::fs::File::open(path).map_err(|e| bad(format!("cannot read binary file: {}", e)))?;
    let mut reader = std::io::BufReader::new(file);

    let num_snps = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| bad(e.to_string()))? as usize;
    let num_inds = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| bad(e.to_string()))? as usize;

    let mut raw_genotypes = vec![0u8; num_snps * num_inds];
    reader
        .read_exact(&mut raw_genotypes)
        .map_err(|e| bad(format!("truncated genotype buffer: {}", e)))?;

    let dtype = reader.read_u8().map_err(|e| bad(e.to_string()))?;
    let mut phenotype_cells = Vec::with_capacity(num_inds);
    for _ in 0..num_inds {
        let cell = match dtype {
            1 => reader
                .read_f64::<LittleEndian>()
                .map_err(|e| bad(e.to_string()))?
                .to_string(),
            2 => reader
                .read_u64::<LittleEndian>()
                .map_err(|e| bad(e.to_string()))?
                .to_string(),
            other => return Err(bad(format!("unknown phenotype dtype {}", other))),
        };
        phenotype_cells.push(cell);
    }
    let phenotype_type = if dtype == 1 {
        PhenotypeType::Quantitative
    } else {
        PhenotypeType::Categorical
    };

    let has_chromosome = reader.read_u8().map_err(|e| bad(e.to_string()))? != 0;
    let has_maf = reader.read_u8().map_err(|e| bad(e.to_string()))? != 0;

    let read_string = |reader: &mut std::io::BufReader<std::fs::File>| -> Result<String> {
        let len = reader.read_u8().map_err(|e| bad(e.to_string()))? as usize;
        let mut buf = vec![0u8; len];
        reader
            .read_exact(&mut buf)
            .map_err(|e| bad(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| bad(format!("non-UTF-8 name: {}", e)))
    };

    let mut snp_names = Vec::with_capacity(num_snps);
    let mut chromosomes = vec![];
    let mut mafs = vec![];
    for _ in 0..num_snps {
        snp_names.push(read_string(&mut reader)?);
        if has_chromosome {
            chromosomes.push(read_string(&mut reader)?);
        }
        if has_maf {
            mafs.push(
                reader
                    .read_f64::<LittleEndian>()
                    .map_err(|e| bad(e.to_string()))?,
            );
        }
    }

    let num_disease = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| bad(e.to_string()))? as usize;
    let mut disease_snps = Vec::with_capacity(num_disease);
    for _ in 0..num_disease {
        disease_snps.push(SnpId(
            reader
                .read_u64::<LittleEndian>()
                .map_err(|e| bad(e.to_string()))? as u32,
        ));
    }

    let skip = options.skip_mask(num_inds);
    let mut genotypes = vec![];
    for snp in 0..num_snps {
        for ind in 0..num_inds {
            if !skip[ind] {
                let value = raw_genotypes[snp * num_inds + ind];
                if value > 2 {
                    return Err(bad(format!(
                        "invalid genotype {} at SNP {} / individual {}",
                        value, snp, ind
                    )));
                }
                genotypes.push(value);
            }
        }
    }
    let kept_phenotypes: Vec<String> = phenotype_cells
        .into_iter()
        .zip(&skip)
        .filter(|(_, &skipped)| !skipped)
        .map(|(cell, _)| cell)
        .collect();

    let mut instance = Instance::new(
        genotypes,
        parse_phenotypes(&kept_phenotypes, phenotype_type, num_categories)?,
        snp_names,
    )?;
    if has_chromosome {
        instance.set_chromosomes(chromosomes)?;
    }
    if has_maf {
        instance.set_mafs(mafs)?;
    }
    instance.set_disease_snps(disease_snps)?;
    Ok(instance)
}

/// Store an instance in the compact binary format.
pub fn save_bin(instance: &Instance, path: &Path) -> Result<()> {
    let bad = |message: String| Error::BadInput(format!("{:?}: {}", path, message));
    let file = std::fs::File::create(path)
        .map_err(|e| bad(format!("cannot create binary file: {}", e)))?;
    let mut writer = std::io::BufWriter::new(file);

    let write = |writer: &mut std::io::BufWriter<std::fs::File>, buf: &[u8]| -> Result<()> {
        writer.write_all(buf).map_err(|e| bad(e.to_string()))
    };

    write(&mut writer, &(instance.num_snps() as u64).to_le_bytes())?;
    write(&mut writer, &(instance.num_inds() as u64).to_le_bytes())?;
    for snp in 0..instance.num_snps() {
        write(&mut writer, instance.genotypes_at(SnpId(snp as u32)))?;
    }

    instance.with_phenotypes(|phenotypes| match phenotypes {
        Phenotypes::Quantitative(values) => {
            writer.write_u8(1).map_err(|e| bad(e.to_string()))?;
            for &value in values {
                writer
                    .write_f64::<LittleEndian>(value)
                    .map_err(|e| bad(e.to_string()))?;
            }
            Ok(())
        }
        Phenotypes::Categorical { values, .. } => {
            writer.write_u8(2).map_err(|e| bad(e.to_string()))?;
            for &value in values {
                writer
                    .write_u64::<LittleEndian>(value as u64)
                    .map_err(|e| bad(e.to_string()))?;
            }
            Ok(())
        }
    })?;

    let has_chromosome = !instance.chromosomes().is_empty();
    let has_maf = instance.has_maf_information();
    writer
        .write_u8(has_chromosome as u8)
        .map_err(|e| bad(e.to_string()))?;
    writer
        .write_u8(has_maf as u8)
        .map_err(|e| bad(e.to_string()))?;

    let write_string =
        |writer: &mut std::io::BufWriter<std::fs::File>, value: &str| -> Result<()> {
            let bytes = value.as_bytes();
            if bytes.len() > u8::MAX as usize {
                return Err(bad(format!("name {:?} is too long for the format", value)));
            }
            writer
                .write_u8(bytes.len() as u8)
                .map_err(|e| bad(e.to_string()))?;
            writer.write_all(bytes).map_err(|e| bad(e.to_string()))
        };

    for snp in 0..instance.num_snps() {
        write_string(&mut writer, &instance.snp_names()[snp])?;
        if has_chromosome {
            write_string(&mut writer, &instance.chromosomes()[snp])?;
        }
        if has_maf {
            writer
                .write_f64::<LittleEndian>(instance.mafs()[snp])
                .map_err(|e| bad(e.to_string()))?;
        }
    }

    writer
        .write_u64::<LittleEndian>(instance.disease_snps().len() as u64)
        .map_err(|e| bad(e.to_string()))?;
    for &snp in instance.disease_snps() {
        writer
            .write_u64::<LittleEndian>(snp.index() as u64)
            .map_err(|e| bad(e.to_string()))?;
    }
    writer.flush().map_err(|e| bad(e.to_string()))?;
    Ok(())
}

/// Load a covariates CSV: a header row of column names, one row per
/// individual, the first column holding the individual label.
pub fn load_covariates(instance: &mut Instance, path: &Path) -> Result<()> {
    let rows = read_cells(path, b',')?;
    let Some((header, body)) = rows.split_first() else {
        return Err(Error::BadInput(format!("{:?} is empty", path)));
    };
    if header.len() < 2 {
        return Err(Error::BadInput(format!(
            "{:?} has no covariate columns besides the label",
            path
        )));
    }
    let num_covs = header.len() - 1;

    let mut values = vec![];
    for (ind, row) in body.iter().enumerate() {
        if row.len() != header.len() {
            return Err(Error::BadInput(format!(
                "{:?} row {} has {} cells, header has {}",
                path,
                ind + 1,
                row.len(),
                header.len()
            )));
        }
        for cell in &row[1..] {
            values.push(cell.trim().parse::<f64>().map_err(|_| {
                Error::BadInput(format!("invalid covariate value {:?} in {:?}", cell, path))
            })?);
        }
    }

    let covariates = nalgebra::DMatrix::from_row_slice(body.len(), num_covs, &values);
    instance.set_covariates(covariates)?;
    tracing::info!("loaded {} covariates for {} individuals", num_covs, body.len());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{
        fold_bounds, load_covariates, load_instance, save_bin, DataPurpose, InputFormat,
        LoadOptions, PhenotypeType,
    };
    use crate::data::instance::{Instance, Phenotypes};
    use crate::data::snp::SnpId;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::Write as _;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn csv_snps_as_rows_first() {
        let file = write_temp("rs1,0,1,2\nrs2,1,1,0\npheno,0,1,1\n");
        let instance = load_instance(
            file.path(),
            InputFormat::CsvSnpsAsRowsFirst,
            PhenotypeType::Dichotomous,
            2,
            LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(2, instance.num_snps());
        assert_eq!(3, instance.num_inds());
        assert_eq!(&["rs1".to_string(), "rs2".to_string()], instance.snp_names());
        assert_eq!(&[0, 1, 2], instance.genotypes_at(SnpId(0)));
        assert_eq!(&[1, 1, 0], instance.genotypes_at(SnpId(1)));
    }

    #[test]
    fn csv_snps_as_columns_last() {
        // columns are SNPs, last row holds the rs ids, last column phenotypes
        let file = write_temp("0,1,0.5\n1,1,1.5\n2,0,2.5\nrs1,rs2,pheno\n");
        let instance = load_instance(
            file.path(),
            InputFormat::CsvSnpsAsColumnsLast,
            PhenotypeType::Quantitative,
            0,
            LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(2, instance.num_snps());
        assert_eq!(3, instance.num_inds());
        assert_eq!(&[0, 1, 2], instance.genotypes_at(SnpId(0)));
        instance.with_phenotypes(|p| {
            assert_eq!(&Phenotypes::Quantitative(vec![0.5, 1.5, 2.5]), p);
        });
    }

    #[test]
    fn csv_rejects_bad_genotype() {
        let file = write_temp("rs1,0,3\npheno,0,1\n");
        assert!(load_instance(
            file.path(),
            InputFormat::CsvSnpsAsRowsFirst,
            PhenotypeType::Dichotomous,
            2,
            LoadOptions::default(),
        )
        .is_err());
    }

    #[test]
    fn json_epigen_round_trip() {
        let file = write_temp(
            r#"{
                "num_snps": 2,
                "num_inds": 3,
                "genotype": [[0, 1, 2], [1, 0, 1]],
                "phenotype": [0, 1, 1],
                "snps": [["rs1", "1"], ["rs2", "2"]],
                "mafs": [0.1, 0.2],
                "disease_snps": [1]
            }"#,
        );
        let instance = load_instance(
            file.path(),
            InputFormat::JsonEpigen,
            PhenotypeType::Dichotomous,
            2,
            LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(2, instance.num_snps());
        assert_eq!(&["1".to_string(), "2".to_string()], instance.chromosomes());
        assert_eq!(&[0.1, 0.2], instance.mafs());
        assert_eq!(&[SnpId(1)], instance.disease_snps());
    }

    #[rstest]
    #[case(r#"{"num_snps": 0, "num_inds": 1, "genotype": [], "phenotype": [0], "snps": []}"#)]
    #[case(
        r#"{"num_snps": 1, "num_inds": 2, "genotype": [[0]], "phenotype": [0, 1], "snps": ["rs1"]}"#
    )]
    #[case(
        r#"{"num_snps": 1, "num_inds": 1, "genotype": [[0]], "phenotype": [0], "snps": ["rs1"], "disease_snps": [5]}"#
    )]
    fn json_epigen_rejects_inconsistencies(#[case] content: &str) {
        let file = write_temp(content);
        assert!(load_instance(
            file.path(),
            InputFormat::JsonEpigen,
            PhenotypeType::Dichotomous,
            2,
            LoadOptions::default(),
        )
        .is_err());
    }

    #[test]
    fn binary_round_trip_is_byte_equal() {
        let mut instance = Instance::new(
            vec![0, 1, 2, 2, 1, 0],
            Phenotypes::Categorical {
                values: vec![0, 1, 1],
                num_categories: 2,
            },
            vec!["rs1".into(), "rs2".into()],
        )
        .unwrap();
        instance.set_chromosomes(vec!["1".into(), "X".into()]).unwrap();
        instance.set_mafs(vec![0.05, 0.41]).unwrap();
        instance.set_disease_snps(vec![SnpId(0)]).unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        save_bin(&instance, file.path()).unwrap();
        let reloaded = load_instance(
            file.path(),
            InputFormat::Bin,
            PhenotypeType::Categorical,
            2,
            LoadOptions::default(),
        )
        .unwrap();

        for snp in 0..2 {
            assert_eq!(
                instance.genotypes_at(SnpId(snp)),
                reloaded.genotypes_at(SnpId(snp))
            );
        }
        instance.with_phenotypes(|expected| {
            reloaded.with_phenotypes(|actual| assert_eq!(expected, actual));
        });
        assert_eq!(instance.snp_names(), reloaded.snp_names());
        assert_eq!(instance.chromosomes(), reloaded.chromosomes());
        assert_eq!(instance.mafs(), reloaded.mafs());
        assert_eq!(instance.disease_snps(), reloaded.disease_snps());

        // saving the reloaded instance reproduces the bytes
        let second = tempfile::NamedTempFile::new().unwrap();
        save_bin(&reloaded, second.path()).unwrap();
        assert_eq!(
            std::fs::read(file.path()).unwrap(),
            std::fs::read(second.path()).unwrap()
        );
    }

    #[rstest]
    #[case(10, 3, 0, 0, 4)]
    #[case(10, 3, 1, 4, 7)]
    #[case(10, 3, 2, 7, 10)]
    #[case(9, 3, 1, 3, 6)]
    fn fold_bounds_formula(
        #[case] num_inds: usize,
        #[case] num_folds: usize,
        #[case] fold_id: usize,
        #[case] start: usize,
        #[case] end: usize,
    ) {
        assert_eq!((start, end), fold_bounds(num_inds, num_folds, fold_id));
    }

    #[test]
    fn fold_selection_drops_individuals() {
        let file = write_temp("rs1,0,1,2,0\npheno,0,1,1,0\n");
        let training = load_instance(
            file.path(),
            InputFormat::CsvSnpsAsRowsFirst,
            PhenotypeType::Dichotomous,
            2,
            LoadOptions {
                num_folds: 2,
                fold_id: 0,
                purpose: DataPurpose::Training,
            },
        )
        .unwrap();
        // fold 0 covers individuals 0..2, training skips them
        assert_eq!(2, training.num_inds());
        assert_eq!(&[2, 0], training.genotypes_at(SnpId(0)));

        let validation = load_instance(
            file.path(),
            InputFormat::CsvSnpsAsRowsFirst,
            PhenotypeType::Dichotomous,
            2,
            LoadOptions {
                num_folds: 2,
                fold_id: 0,
                purpose: DataPurpose::Validation,
            },
        )
        .unwrap();
        assert_eq!(2, validation.num_inds());
        assert_eq!(&[0, 1], validation.genotypes_at(SnpId(0)));
    }

    #[test]
    fn covariates_csv_skips_the_label_column() {
        let file = write_temp("id,age,bmi\nA,30,22.5\nB,40,25.0\nC,50,27.5\n");
        let mut instance = Instance::new(
            vec![0, 1, 2],
            Phenotypes::Quantitative(vec![1.0, 2.0, 3.0]),
            vec!["rs1".into()],
        )
        .unwrap();
        load_covariates(&mut instance, file.path()).unwrap();
        assert_eq!(2, instance.num_covs());
        let covariates = instance.covariates().unwrap();
        assert_eq!(30.0, covariates[(0, 0)]);
        assert_eq!(27.5, covariates[(2, 1)]);
    }

    #[test]
    fn covariates_with_mismatched_rows_fail() {
        let file = write_temp("id,age\nA,30\nB,40\n");
        let mut instance = Instance::new(
            vec![0, 1, 2],
            Phenotypes::Quantitative(vec![1.0, 2.0, 3.0]),
            vec!["rs1".into()],
        )
        .unwrap();
        assert!(load_covariates(&mut instance, file.path()).is_err());
    }
}
