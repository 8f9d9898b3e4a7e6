//! The tab-separated result table.

use std::path::Path;

use rayon::prelude::*;

use crate::data::registry::SnpRegistry;
use crate::data::snp::SnpId;
use crate::data::snp_set::SnpSet;
use crate::err::Result;
use crate::score::{EpistasisScore, ScoreEngine};

/// Options of the result table writer.
#[derive(Debug, Clone, Default)]
pub struct WriteSetsOptions {
    /// Sort by this score and emit a RANK column.
    pub rank_model: Option<EpistasisScore>,
    /// Additional score columns.
    pub scores: Vec<EpistasisScore>,
    /// Write one row per distinct SNP instead of one per set.
    pub individual_snps: bool,
}

/// Write the result table for a collection of SNP sets.
///
/// Columns: optional RANK, `RS_IDS`, one column per selected score, one
/// column per collected attribute key, `ANNOTATIONS`, and for categorical
/// phenotypes `NUM_INDIVIDUALS_k` / `FREQ_INDIVIDUALS_k` / `INDIVIDUALS_k`
/// per category.
pub fn write_sets(
    path: &Path,
    engine: &ScoreEngine,
    registry: &SnpRegistry,
    sets: &[SnpSet],
    options: &WriteSetsOptions,
) -> Result<()> {
    tracing::info!(
        "writing {} to {:?}",
        if options.individual_snps {
            "individual SNPs"
        } else {
            "sets"
        },
        path
    );

    let mut all_sets: Vec<SnpSet> = if options.individual_snps {
        let mut snps: Vec<SnpId> = sets.iter().flat_map(|set| set.snps().iter().copied()).collect();
        snps.sort_unstable();
        snps.dedup();
        snps.into_iter().map(SnpSet::singleton).collect()
    } else {
        sets.to_vec()
    };

    let mut score_columns = vec![];
    if let Some(rank_model) = options.rank_model {
        score_columns.push(rank_model);
    }
    for &score in &options.scores {
        if !score_columns.contains(&score) {
            score_columns.push(score);
        }
    }

    // compute all requested scores up front, in parallel
    all_sets
        .par_iter_mut()
        .map(|set| {
            for &score in &score_columns {
                engine.score_set(set, score)?;
            }
            Ok(())
        })
        .collect::<Result<Vec<()>>>()?;

    if let Some(rank_model) = options.rank_model {
        let sense = rank_model.sense();
        all_sets.sort_by(|a, b| {
            let score_a = a.cached_score(rank_model.slot()).expect("scored above");
            let score_b = b.cached_score(rank_model.slot()).expect("scored above");
            if sense.is_better(score_a, score_b) {
                std::cmp::Ordering::Less
            } else if sense.is_better(score_b, score_a) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
    }

    let mut attribute_keys: Vec<String> = all_sets
        .iter()
        .flat_map(|set| set.attribute_keys().map(|k| k.to_string()))
        .collect();
    attribute_keys.sort_unstable();
    attribute_keys.dedup();

    let categorical = engine.instance().is_categorical();
    let num_categories = if categorical {
        engine.instance().num_categories()?
    } else {
        0
    };
    let individuals_per_category = if categorical {
        Some(engine.instance().num_individuals_per_category()?)
    } else {
        None
    };

    let mut header = vec![];
    if let Some(rank_model) = options.rank_model {
        header.push(format!("RANK ({})", rank_model));
    }
    header.push("RS_IDS".to_string());
    for &score in &score_columns {
        header.push(score.to_string());
    }
    header.extend(attribute_keys.iter().cloned());
    header.push("ANNOTATIONS".to_string());
    for k in 0..num_categories {
        header.push(format!("NUM_INDIVIDUALS_{}", k));
        header.push(format!("FREQ_INDIVIDUALS_{}", k));
        header.push(format!("INDIVIDUALS_{}", k));
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|e| crate::err::Error::BadInput(format!("cannot write {:?}: {}", path, e)))?;
    writer
        .write_record(&header)
        .map_err(|e| crate::err::Error::BadInput(format!("cannot write {:?}: {}", path, e)))?;

    for (position, set) in all_sets.iter().enumerate() {
        let mut row = vec![];
        if options.rank_model.is_some() {
            row.push((position + 1).to_string());
        }
        row.push(crate::common::join(
            set.snps().iter().map(|&snp| registry.name(snp)),
            ";",
        ));
        for &score in &score_columns {
            row.push(crate::common::format_number(
                set.cached_score(score.slot()).expect("scored above"),
            ));
        }
        for key in &attribute_keys {
            row.push(set.attribute(key).unwrap_or_default().to_string());
        }

        let mut annotations: Vec<&String> = set
            .snps()
            .iter()
            .flat_map(|&snp| registry.annotations(snp).iter())
            .collect();
        annotations.sort_unstable();
        annotations.dedup();
        row.push(crate::common::join(annotations, ";"));

        if let Some(totals) = &individuals_per_category {
            let per_category = engine.instance().individuals_per_category(set.snps())?;
            for (k, individuals) in per_category.iter().enumerate() {
                row.push(individuals.len().to_string());
                row.push(crate::common::format_number(
                    individuals.len() as f64 / totals[k].max(1) as f64,
                ));
                row.push(crate::common::join(individuals.iter(), ";"));
            }
        }

        writer
            .write_record(&row)
            .map_err(|e| crate::err::Error::BadInput(format!("cannot write {:?}: {}", path, e)))?;
    }
    writer
        .flush()
        .map_err(|e| crate::err::Error::BadInput(format!("cannot write {:?}: {}", path, e)))?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{write_sets, WriteSetsOptions};
    use crate::data::registry::SnpRegistry;
    use crate::data::snp::SnpId;
    use crate::data::snp_set::SnpSet;
    use crate::score::{EpistasisScore, ScoreEngine};
    use pretty_assertions::assert_eq;

    #[test]
    fn table_has_rank_scores_attributes_and_category_columns() {
        let instance = crate::score::test::categorical_instance();
        let engine = ScoreEngine::new(instance.clone());
        let mut registry = SnpRegistry::from_instance(&instance).unwrap();
        registry
            .add_annotations(vec![(SnpId(0), "GENE_A".to_string())])
            .unwrap();

        let mut strong = SnpSet::singleton(SnpId(0));
        strong.set_attribute("NUM_ROUNDS", "3");
        let weak = SnpSet::singleton(SnpId(1));

        let file = tempfile::NamedTempFile::new().unwrap();
        write_sets(
            file.path(),
            &engine,
            &registry,
            &[weak, strong],
            &WriteSetsOptions {
                rank_model: Some(EpistasisScore::Variance),
                scores: vec![EpistasisScore::PenetranceNll],
                individual_snps: false,
            },
        )
        .unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(3, lines.len());
        let header: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(
            vec![
                "RANK (VARIANCE)",
                "RS_IDS",
                "VARIANCE",
                "PENETRANCE_NLL",
                "NUM_ROUNDS",
                "ANNOTATIONS",
                "NUM_INDIVIDUALS_0",
                "FREQ_INDIVIDUALS_0",
                "INDIVIDUALS_0",
                "NUM_INDIVIDUALS_1",
                "FREQ_INDIVIDUALS_1",
                "INDIVIDUALS_1",
            ],
            header
        );
        // the associated SNP ranks first
        let first: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!("1", first[0]);
        assert_eq!("rs1", first[1]);
        assert_eq!("GENE_A", first[5]);
        let second: Vec<&str> = lines[2].split('\t').collect();
        assert_eq!("rs2", second[1]);
        // the unranked set has an empty attribute cell
        assert_eq!("", second[4]);
    }

    #[test]
    fn individual_snps_mode_writes_distinct_snps() {
        let instance = crate::score::test::categorical_instance();
        let engine = ScoreEngine::new(instance.clone());
        let registry = SnpRegistry::from_instance(&instance).unwrap();
        let sets = vec![
            SnpSet::from_snps([SnpId(0), SnpId(1)]).unwrap(),
            SnpSet::from_snps([SnpId(1)]).unwrap(),
        ];

        let file = tempfile::NamedTempFile::new().unwrap();
        write_sets(
            file.path(),
            &engine,
            &registry,
            &sets,
            &WriteSetsOptions {
                rank_model: None,
                scores: vec![EpistasisScore::Variance],
                individual_snps: true,
            },
        )
        .unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        // header plus one row per distinct SNP
        assert_eq!(3, content.lines().count());
    }
}
