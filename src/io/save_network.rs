//! Network dump formats.

use std::path::Path;

use crate::common::sanitize_identifier;
use crate::data::registry::SnpRegistry;
use crate::data::snp::SnpId;
use crate::err::{Error, Result};
use crate::network::SnpNetwork;

/// Selectable network dump format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkFormat {
    Sqlite,
    JsonAdjacency,
    JsonAdjacencyMatrix,
    CsvAdjacencyMatrix,
    NodeEdgeList,
}

/// Write the network in the requested format.
pub fn save_network(
    network: &SnpNetwork,
    registry: &SnpRegistry,
    path: &Path,
    format: NetworkFormat,
) -> Result<()> {
    tracing::info!("saving network to {:?} ({})", path, format);
    match format {
        NetworkFormat::Sqlite => save_sqlite(network, registry, path),
        NetworkFormat::JsonAdjacency => save_json_adjacency(network, registry, path),
        NetworkFormat::JsonAdjacencyMatrix => save_json_matrix(network, registry, path),
        NetworkFormat::CsvAdjacencyMatrix => save_csv_matrix(network, registry, path),
        NetworkFormat::NodeEdgeList => save_node_edge_list(network, registry, path),
    }
}

fn save_sqlite(network: &SnpNetwork, registry: &SnpRegistry, path: &Path) -> Result<()> {
    let bad = |e: rusqlite::Error| Error::BadInput(format!("SQLite error on {:?}: {}", path, e));
    if path.exists() {
        std::fs::remove_file(path)
            .map_err(|e| Error::BadInput(format!("cannot replace {:?}: {}", path, e)))?;
    }
    let mut connection = rusqlite::Connection::open(path).map_err(bad)?;
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .map_err(bad)?;

    // attribute and label columns are data-driven and need sanitizing
    let mut attribute_keys: Vec<String> = network
        .snps()
        .flat_map(|snp| {
            registry
                .record(snp)
                .map(|record| record.attributes.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        })
        .collect();
    attribute_keys.sort_unstable();
    attribute_keys.dedup();

    let attribute_columns: Vec<String> = attribute_keys
        .iter()
        .map(|key| format!(", \"{}\" TEXT", sanitize_identifier(key)))
        .collect();
    connection
        .execute(
            &format!(
                "CREATE TABLE nodes (id INTEGER PRIMARY KEY, name TEXT{}) WITHOUT ROWID",
                attribute_columns.join("")
            ),
            [],
        )
        .map_err(bad)?;
    connection
        .execute(
            "CREATE TABLE node_annotations (id INTEGER PRIMARY KEY, name TEXT) WITHOUT ROWID",
            [],
        )
        .map_err(bad)?;
    connection
        .execute(
            "CREATE TABLE has_annotation (node INTEGER, annotation INTEGER, \
             PRIMARY KEY (node, annotation)) WITHOUT ROWID",
            [],
        )
        .map_err(bad)?;

    let labels = network.all_edge_labels().to_vec();
    let label_columns: Vec<String> = labels
        .iter()
        .map(|label| format!(", \"{}\" BOOL", sanitize_identifier(label)))
        .collect();
    connection
        .execute(
            &format!(
                "CREATE TABLE edges (node1 INTEGER, node2 INTEGER{}, \
                 PRIMARY KEY (node1, node2)) WITHOUT ROWID",
                label_columns.join("")
            ),
            [],
        )
        .map_err(bad)?;

    let transaction = connection.transaction().map_err(bad)?;
    {
        let mut annotation_ids: indexmap::IndexMap<String, usize> = indexmap::IndexMap::new();
        for snp in network.snps() {
            let record = registry.record(snp)?;
            let mut values: Vec<Box<dyn rusqlite::ToSql>> =
                vec![Box::new(snp.index() as i64), Box::new(record.name.clone())];
            for key in &attribute_keys {
                values.push(Box::new(record.attributes.get(key).cloned()));
            }
            let placeholders = (1..=values.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            transaction
                .execute(
                    &format!("INSERT INTO nodes VALUES ({})", placeholders),
                    rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
                )
                .map_err(bad)?;

            for annotation in &record.annotations {
                let next_id = annotation_ids.len();
                let annotation_id = *annotation_ids.entry(annotation.clone()).or_insert(next_id);
                transaction
                    .execute(
                        "INSERT INTO has_annotation VALUES (?1, ?2)",
                        rusqlite::params![snp.index() as i64, annotation_id as i64],
                    )
                    .map_err(bad)?;
            }
        }
        for (annotation, id) in &annotation_ids {
            transaction
                .execute(
                    "INSERT INTO node_annotations VALUES (?1, ?2)",
                    rusqlite::params![*id as i64, annotation],
                )
                .map_err(bad)?;
        }

        for (edge, mask) in network.edges() {
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
                Box::new(edge.first().index() as i64),
                Box::new(edge.second().index() as i64),
            ];
            for id in 0..labels.len() {
                values.push(Box::new(mask & (1u64 << id) != 0));
            }
            let placeholders = (1..=values.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            transaction
                .execute(
                    &format!("INSERT INTO edges VALUES ({})", placeholders),
                    rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
                )
                .map_err(bad)?;
        }
    }
    transaction.commit().map_err(bad)?;
    Ok(())
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| Error::BadInput(format!("cannot write {:?}: {}", path, e)))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)
        .map_err(|e| Error::BadInput(format!("cannot write {:?}: {}", path, e)))
}

fn save_json_adjacency(network: &SnpNetwork, registry: &SnpRegistry, path: &Path) -> Result<()> {
    let mut adjacency = serde_json::Map::new();
    for (snp, neighbours) in network.adjacency_list() {
        let mut names: Vec<&str> = neighbours
            .iter()
            .map(|&other| registry.name(other))
            .collect();
        names.sort_unstable();
        adjacency.insert(
            registry.name(snp).to_string(),
            serde_json::json!(names),
        );
    }
    write_json(path, &serde_json::Value::Object(adjacency))
}

fn ordered_snps(network: &SnpNetwork) -> Vec<SnpId> {
    let mut snps: Vec<SnpId> = network.snps().collect();
    snps.sort_unstable();
    snps
}

fn adjacency_matrix(network: &SnpNetwork, snps: &[SnpId]) -> Vec<Vec<u8>> {
    snps.iter()
        .map(|&a| {
            snps.iter()
                .map(|&b| {
                    (a != b && network.edge_exists(crate::data::snp::SnpEdge::new(a, b))) as u8
                })
                .collect()
        })
        .collect()
}

fn save_json_matrix(network: &SnpNetwork, registry: &SnpRegistry, path: &Path) -> Result<()> {
    let snps = ordered_snps(network);
    let names: Vec<&str> = snps.iter().map(|&snp| registry.name(snp)).collect();
    write_json(
        path,
        &serde_json::json!({
            "nodes": names,
            "matrix": adjacency_matrix(network, &snps),
        }),
    )
}

fn save_csv_matrix(network: &SnpNetwork, registry: &SnpRegistry, path: &Path) -> Result<()> {
    let snps = ordered_snps(network);
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| Error::BadInput(format!("cannot write {:?}: {}", path, e)))?;
    writer
        .write_record(snps.iter().map(|&snp| registry.name(snp)))
        .map_err(|e| Error::BadInput(format!("cannot write {:?}: {}", path, e)))?;
    for row in adjacency_matrix(network, &snps) {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(|e| Error::BadInput(format!("cannot write {:?}: {}", path, e)))?;
    }
    writer
        .flush()
        .map_err(|e| Error::BadInput(format!("cannot write {:?}: {}", path, e)))?;
    Ok(())
}

fn save_node_edge_list(network: &SnpNetwork, registry: &SnpRegistry, path: &Path) -> Result<()> {
    let nodes: Vec<serde_json::Value> = ordered_snps(network)
        .into_iter()
        .map(|snp| {
            let record = registry.record(snp)?;
            Ok(serde_json::json!({
                "id": snp.index(),
                "name": record.name,
                "annotations": record.annotations,
                "attributes": record.attributes,
            }))
        })
        .collect::<Result<_>>()?;
    let edges: Vec<serde_json::Value> = network
        .edges()
        .map(|(edge, _)| {
            Ok(serde_json::json!({
                "node1": edge.first().index(),
                "node2": edge.second().index(),
                "labels": network.edge_labels(edge)?,
            }))
        })
        .collect::<Result<_>>()?;
    write_json(path, &serde_json::json!({ "nodes": nodes, "edges": edges }))
}

#[cfg(test)]
mod test {
    use super::{save_network, NetworkFormat};
    use crate::data::instance::{Instance, Phenotypes};
    use crate::data::registry::SnpRegistry;
    use crate::data::snp::{SnpEdge, SnpId};
    use crate::network::SnpNetwork;
    use pretty_assertions::assert_eq;

    fn fixtures() -> (SnpNetwork, SnpRegistry) {
        let instance = Instance::new(
            vec![0u8; 6],
            Phenotypes::Quantitative(vec![0.0, 1.0]),
            vec!["rs1".into(), "rs2".into(), "rs3".into()],
        )
        .unwrap();
        let mut registry = SnpRegistry::from_instance(&instance).unwrap();
        registry
            .add_annotations(vec![(SnpId(0), "GENE_A".to_string())])
            .unwrap();
        registry
            .set_attribute(SnpId(0), "leiden cluster", "0")
            .unwrap();

        let mut network = SnpNetwork::new();
        network
            .add_edge(SnpEdge::new(SnpId(0), SnpId(1)), "BIOGRID")
            .unwrap();
        network
            .add_edge(SnpEdge::new(SnpId(1), SnpId(2)), "SAME_TAG")
            .unwrap();
        (network, registry)
    }

    #[test]
    fn sqlite_dump_has_all_tables_and_label_columns() {
        let (network, registry) = fixtures();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.sqlite3");
        save_network(&network, &registry, &path, NetworkFormat::Sqlite).unwrap();

        let connection = rusqlite::Connection::open(&path).unwrap();
        let nodes: i64 = connection
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(3, nodes);
        let edges: i64 = connection
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))
            .unwrap();
        assert_eq!(2, edges);
        let biogrid_edges: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM edges WHERE \"BIOGRID\"",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(1, biogrid_edges);
        let annotated: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM has_annotation ha \
                 JOIN node_annotations na ON ha.annotation = na.id \
                 WHERE na.name = 'GENE_A'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(1, annotated);
        // the attribute column name was sanitized
        let cluster: Option<String> = connection
            .query_row(
                "SELECT \"leiden_cluster\" FROM nodes WHERE name = 'rs1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(Some("0".to_string()), cluster);
    }

    #[test]
    fn json_adjacency_lists_neighbour_names() {
        let (network, registry) = fixtures();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");
        save_network(&network, &registry, &path, NetworkFormat::JsonAdjacency).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(serde_json::json!(["rs1", "rs3"]), parsed["rs2"]);
    }

    #[test]
    fn adjacency_matrix_is_symmetric() {
        let (network, registry) = fixtures();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.json");
        save_network(&network, &registry, &path, NetworkFormat::JsonAdjacencyMatrix).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let matrix = parsed["matrix"].as_array().unwrap();
        assert_eq!(3, matrix.len());
        assert_eq!(1, matrix[0][1]);
        assert_eq!(1, matrix[1][0]);
        assert_eq!(0, matrix[0][2]);
    }

    #[test]
    fn node_edge_list_carries_labels() {
        let (network, registry) = fixtures();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");
        save_network(&network, &registry, &path, NetworkFormat::NodeEdgeList).unwrap();

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(3, parsed["nodes"].as_array().unwrap().len());
        let edges = parsed["edges"].as_array().unwrap();
        assert_eq!(2, edges.len());
        assert!(edges.iter().any(|edge| edge["labels"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("BIOGRID"))));
    }
}
