#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use linegraph::{GraphDb, PropValue};
use serde_json::Value;
use tempfile::TempDir;

const SIDEWALKS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature",
         "geometry": {"type": "LineString", "coordinates": [[0, 0], [0, 1]]},
         "properties": {"incline": 0.02, "surface": "concrete"}},
        {"type": "Feature",
         "geometry": {"type": "LineString", "coordinates": [[0, 1], [1, 1]]},
         "properties": {"incline": -0.01}}
    ]
}"#;

const CROSSINGS: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature",
         "geometry": {"type": "LineString", "coordinates": [[1, 1], [1, 2]]},
         "properties": {"marked": true}},
        {"type": "Feature",
         "geometry": {"type": "Point", "coordinates": [5, 5]},
         "properties": {}}
    ]
}"#;

fn inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let sidewalks = dir.join("sidewalks.geojson");
    let crossings = dir.join("crossings.geojson");
    fs::write(&sidewalks, SIDEWALKS).expect("write sidewalks");
    fs::write(&crossings, CROSSINGS).expect("write crossings");
    (sidewalks, crossings)
}

fn run_json(args: &[&Path], extra: &[&str]) -> Value {
    let output = cargo_bin_cmd!("linegraph")
        .args(args)
        .args(extra)
        .args(["--quiet", "--format", "json"])
        .output()
        .expect("run cli");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("json summary")
}

#[test]
fn ingest_reports_a_json_summary() {
    let dir = TempDir::new().expect("tempdir");
    let (sidewalks, crossings) = inputs(dir.path());
    let store = dir.path().join("out").join("graph.db");

    let summary = run_json(&[&sidewalks, &crossings, &store], &[]);
    assert_eq!(summary["created"], Value::Bool(true));
    assert_eq!(summary["inputs"], 2);
    assert_eq!(summary["features_seen"], 4);
    assert_eq!(summary["features_ingested"], 3);
    assert_eq!(summary["edges_inserted"], 3);
    assert_eq!(summary["node_count"], 4);
    assert_eq!(summary["edge_count"], 3);
    let failures = summary["failures"].as_array().expect("failures");
    assert_eq!(failures.len(), 1);
    assert!(failures[0].as_str().unwrap().contains("crossings feature #1"));

    let db = GraphDb::connect(&store).expect("open store");
    let layers: Vec<_> = db
        .edges()
        .map(|e| e.unwrap().get("_layer").cloned())
        .collect();
    assert_eq!(
        layers,
        vec![
            Some(PropValue::from("sidewalks")),
            Some(PropValue::from("sidewalks")),
            Some(PropValue::from("crossings")),
        ]
    );
}

#[test]
fn rerunning_appends_to_the_store() {
    let dir = TempDir::new().expect("tempdir");
    let (sidewalks, _) = inputs(dir.path());
    let store = dir.path().join("graph.db");

    run_json(&[&sidewalks, &store], &[]);
    let summary = run_json(&[&sidewalks, &store], &["--bidirectional", "--negate", "incline"]);
    assert_eq!(summary["created"], Value::Bool(false));
    assert_eq!(summary["nodes_created"], 0);
    assert_eq!(summary["edges_inserted"], 4);
    assert_eq!(summary["edge_count"], 6);

    let db = GraphDb::connect(&store).expect("open store");
    let top = db.key(0.0, 1.0).unwrap();
    let bottom = db.key(0.0, 0.0).unwrap();
    let down = db
        .edges_between(&top, &bottom)
        .next()
        .expect("reverse edge")
        .unwrap();
    assert_eq!(down.get("incline"), Some(&PropValue::Real(-0.02)));
}

#[test]
fn text_summary_names_the_store() {
    let dir = TempDir::new().expect("tempdir");
    let (sidewalks, _) = inputs(dir.path());
    let store = dir.path().join("graph.db");

    let output = cargo_bin_cmd!("linegraph")
        .arg(&sidewalks)
        .arg(&store)
        .arg("--quiet")
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("Created {}", store.display())));
    assert!(stdout.contains("2 ingested"));
    assert!(stdout.contains("new columns: _geometry, _layer, incline, surface"));
}

#[test]
fn missing_input_fails_without_creating_the_store() {
    let dir = TempDir::new().expect("tempdir");
    let store = dir.path().join("graph.db");
    let output = cargo_bin_cmd!("linegraph")
        .arg(dir.path().join("absent.geojson"))
        .arg(&store)
        .arg("--quiet")
        .output()
        .expect("run cli");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
    assert!(!store.exists());
}

#[test]
fn a_single_path_is_a_usage_error() {
    let dir = TempDir::new().expect("tempdir");
    let output = cargo_bin_cmd!("linegraph")
        .arg(dir.path().join("graph.db"))
        .output()
        .expect("run cli");
    assert!(!output.status.success());
}

#[test]
fn config_file_supplies_ingest_options() {
    let dir = TempDir::new().expect("tempdir");
    let (sidewalks, _) = inputs(dir.path());
    let config = dir.path().join("ingest.toml");
    fs::write(
        &config,
        "batch_size = 1\nstore_geometry = false\nlayer = \"walk\"\n",
    )
    .expect("write config");
    let store = dir.path().join("graph.db");

    let config_arg = config.display().to_string();
    let summary = run_json(&[&sidewalks, &store], &["--config", &config_arg]);
    assert_eq!(summary["batches_committed"], 2);

    let db = GraphDb::connect(&store).expect("open store");
    assert!(!db.edge_columns().iter().any(|c| c == "_geometry"));
    let edge = db.edges().next().unwrap().unwrap();
    assert_eq!(edge.get("_layer"), Some(&PropValue::from("walk")));

    fs::write(&config, "batch = 1\n").expect("rewrite config");
    let output = cargo_bin_cmd!("linegraph")
        .arg(&sidewalks)
        .arg(dir.path().join("other.db"))
        .args(["--quiet", "--config", &config_arg])
        .output()
        .expect("run cli");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ingest.toml"));
}
