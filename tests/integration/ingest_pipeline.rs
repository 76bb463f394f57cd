#![allow(missing_docs)]

use std::fs;

use linegraph::ingest::{FeatureError, GeoJsonLayer};
use linegraph::{
    Coord, DuplicateEdges, GraphDb, IngestOptions, IngestReport, Ingestor, LineFeature,
    OpenOptions, PropValue, Result,
};
use tempfile::tempdir;

fn line(points: &[(f64, f64)], props: &[(&str, PropValue)]) -> LineFeature {
    LineFeature::new(
        points.iter().map(|(x, y)| Coord::new(*x, *y)).collect(),
        props
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

fn street_grid() -> Vec<LineFeature> {
    vec![
        line(&[(0.0, 0.0), (1.0, 0.0)], &[("name", "A St".into())]),
        line(&[(1.0, 0.0), (1.0, 1.0)], &[("name", "B St".into()), ("lanes", PropValue::Int(2))]),
        line(&[(1.0, 1.0), (0.5, 1.5), (0.0, 1.0)], &[("oneway", PropValue::Bool(true))]),
        line(&[(0.0, 1.0), (0.0, 0.0)], &[]),
    ]
}

fn ingest(db: &mut GraphDb, features: Vec<LineFeature>, opts: IngestOptions) -> IngestReport {
    let mut ingestor = Ingestor::new(db, opts).unwrap();
    for feature in features {
        ingestor.push(feature).unwrap();
    }
    ingestor.finish().unwrap()
}

#[test]
fn every_edge_endpoint_is_a_node() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    let report = ingest(&mut db, street_grid(), IngestOptions::default());
    assert_eq!(report.features_ingested, 4);
    assert_eq!(report.edges_inserted, 4);
    assert_eq!(report.nodes_created, 4);

    for edge in db.edges() {
        let edge = edge.unwrap();
        assert!(db.has_node(&edge.u).unwrap());
        assert!(db.has_node(&edge.v).unwrap());
    }
    assert_eq!(db.node_count().unwrap(), 4);
}

#[test]
fn repeating_a_batch_doubles_edges_but_not_nodes() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    ingest(&mut db, street_grid(), IngestOptions::default());
    let nodes = db.node_count().unwrap();
    let edges = db.edge_count().unwrap();

    let report = ingest(&mut db, street_grid(), IngestOptions::default());
    assert_eq!(report.nodes_created, 0);
    assert_eq!(db.node_count().unwrap(), nodes);
    assert_eq!(db.edge_count().unwrap(), edges * 2);
}

#[test]
fn coalescing_store_keeps_one_edge_per_pair() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create_with_options(
        dir.path().join("graph.db"),
        OpenOptions::default().duplicate_edges(DuplicateEdges::Coalesce),
    )
    .unwrap();
    ingest(&mut db, street_grid(), IngestOptions::default());
    let report = ingest(&mut db, street_grid(), IngestOptions::default());
    assert_eq!(report.edges_inserted, 0);
    assert_eq!(report.edges_merged, 4);
    assert_eq!(db.edge_count().unwrap(), 4);
}

#[test]
fn nearby_endpoints_share_a_node() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    ingest(
        &mut db,
        vec![
            line(&[(0.0, 0.0), (10.000000001, 5.0)], &[]),
            line(&[(9.99999999996, 5.00000000002), (20.0, 5.0)], &[]),
        ],
        IngestOptions::default(),
    );
    assert_eq!(db.node_count().unwrap(), 3);
    let middle = db.key(10.0, 5.0).unwrap();
    assert_eq!(db.successors(&middle).count(), 1);
    assert_eq!(db.predecessors(&middle).count(), 1);
}

#[test]
fn system_attributes_are_recorded() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    ingest(&mut db, street_grid(), IngestOptions::default().layer("streets"));
    let edges: Vec<_> = db.edges().collect::<Result<_>>().unwrap();
    assert!(edges
        .iter()
        .all(|e| e.get("_layer") == Some(&PropValue::from("streets"))));
    let curved = edges[2].get("_geometry").and_then(PropValue::as_str).unwrap();
    assert!(curved.contains("[0.5,1.5]"));

    let mut bare = GraphDb::create(dir.path().join("bare.db")).unwrap();
    ingest(&mut bare, street_grid(), IngestOptions::default().store_geometry(false));
    assert!(!bare.edge_columns().iter().any(|c| c == "_geometry"));
    assert!(!bare.edge_columns().iter().any(|c| c == "_layer"));
}

#[test]
fn bidirectional_ingest_adds_reverse_edges() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    let report = ingest(
        &mut db,
        vec![line(
            &[(0.0, 0.0), (0.0, 1.0)],
            &[("incline", PropValue::Real(0.05)), ("name", "Hill".into())],
        )],
        IngestOptions::default()
            .bidirectional(true)
            .negate_on_reverse("incline")
            .negate_on_reverse("name"),
    );
    assert_eq!(report.edges_inserted, 2);
    let a = db.key(0.0, 0.0).unwrap();
    let b = db.key(0.0, 1.0).unwrap();
    let up = db.successors(&a).next().unwrap().unwrap();
    let down = db.successors(&b).next().unwrap().unwrap();
    assert_eq!(up.get("incline"), Some(&PropValue::Real(0.05)));
    assert_eq!(down.get("incline"), Some(&PropValue::Real(-0.05)));
    assert_eq!(down.get("name"), Some(&PropValue::from("Hill")));
}

#[test]
fn batches_are_committed_per_batch_size() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    let features: Vec<_> = (0..10)
        .map(|i| {
            let x = f64::from(i);
            line(&[(x, 0.0), (x + 1.0, 0.0)], &[("seq", PropValue::Int(i64::from(i)))])
        })
        .collect();
    let report = ingest(&mut db, features, IngestOptions::default().batch_size(4));
    assert_eq!(report.batches_committed, 3);
    let meta = db.metadata().unwrap();
    assert_eq!(meta.batches_committed, 3);
    assert_eq!(meta.features_ingested, 10);
}

#[test]
fn node_cache_can_be_disabled() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create_with_options(
        dir.path().join("graph.db"),
        OpenOptions::default().node_cache_entries(0),
    )
    .unwrap();
    let report = ingest(&mut db, street_grid(), IngestOptions::default());
    assert_eq!(report.nodes_created, 4);
    assert_eq!(db.node_count().unwrap(), 4);
}

#[test]
fn geojson_files_feed_the_ingestor() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("paths.geojson");
    fs::write(
        &input,
        r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {"width": 2.5},
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [0, 3]]}},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "MultiLineString", "coordinates": [[[0, 0], [1, 1]]]}},
            {"type": "Feature", "properties": {"_u": 1},
             "geometry": {"type": "LineString", "coordinates": [[0, 3], [4, 3]]}}
        ]}"#,
    )
    .unwrap();
    let layer = GeoJsonLayer::open(&input).unwrap();
    assert_eq!(layer.name(), Some("paths"));

    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    let mut ingestor = Ingestor::new(&mut db, IngestOptions::default()).unwrap();
    ingestor.ingest(layer.features()).unwrap();
    let report = ingestor.finish().unwrap();
    assert_eq!(report.features_seen, 3);
    assert_eq!(report.features_ingested, 1);
    assert_eq!(report.skipped(), 2);
    assert!(matches!(
        report.failures[0].error,
        FeatureError::UnsupportedGeometry(_)
    ));
    assert!(matches!(report.failures[1].error, FeatureError::Rejected(_)));
    assert_eq!(db.edge_count().unwrap(), 1);
    assert_eq!(db.edge_columns(), vec!["_geometry", "width"]);
}
