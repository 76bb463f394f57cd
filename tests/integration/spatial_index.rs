#![allow(missing_docs)]

use linegraph::{
    Attributes, BoundingBox, Coord, GraphDb, GraphError, IngestOptions, Ingestor, LineFeature,
    OpenOptions,
};
use tempfile::{tempdir, TempDir};

fn indexed_store() -> (TempDir, GraphDb) {
    let dir = tempdir().unwrap();
    let db = GraphDb::create_with_options(
        dir.path().join("graph.db"),
        OpenOptions::default().spatial_index(true),
    )
    .unwrap();
    (dir, db)
}

fn segment(db: &mut GraphDb, from: (f64, f64), to: (f64, f64)) -> i64 {
    let u = db.key(from.0, from.1).unwrap();
    let v = db.key(to.0, to.1).unwrap();
    db.add_edge(&u, &v, Attributes::new()).unwrap()
}

fn ingest_line(db: &mut GraphDb, points: &[(f64, f64)], opts: IngestOptions) {
    let feature = LineFeature::new(
        points.iter().map(|(x, y)| Coord::new(*x, *y)).collect(),
        Attributes::new(),
    );
    let mut ingestor = Ingestor::new(db, opts).unwrap();
    ingestor.push(feature).unwrap();
    ingestor.finish().unwrap();
}

#[test]
fn index_enabled_at_create_answers_box_queries() {
    let (_dir, mut db) = indexed_store();
    assert!(db.has_spatial_index().unwrap());
    assert!(db.metadata().unwrap().spatial_index);
    let low = segment(&mut db, (0.0, 0.0), (10.0, 0.0));
    let mid = segment(&mut db, (0.0, 5.0), (10.0, 5.0));
    segment(&mut db, (0.0, 20.0), (10.0, 20.0));

    let nodes = db.nodes_in_bbox(&BoundingBox::new(-1.0, -1.0, 1.0, 6.0)).unwrap();
    let keys: Vec<&str> = nodes.iter().map(|n| n.key.as_str()).collect();
    assert_eq!(keys, vec!["0, 0", "0, 5"]);

    let edges = db.edges_in_bbox(&BoundingBox::new(2.0, -1.0, 3.0, 6.0)).unwrap();
    let ids: Vec<i64> = edges.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![low, mid]);
}

#[test]
fn dwithin_sorts_by_distance() {
    let (_dir, mut db) = indexed_store();
    let mid = segment(&mut db, (0.0, 5.0), (10.0, 5.0));
    let low = segment(&mut db, (0.0, 0.0), (10.0, 0.0));
    segment(&mut db, (0.0, 20.0), (10.0, 20.0));

    let hits = db.edges_dwithin(5.0, 1.0, 5.0, true).unwrap();
    let found: Vec<(i64, f64)> = hits.iter().map(|(e, d)| (e.id, *d)).collect();
    assert_eq!(found, vec![(low, 1.0), (mid, 4.0)]);

    let unsorted = db.edges_dwithin(5.0, 1.0, 5.0, false).unwrap();
    assert_eq!(unsorted[0].0.id, mid);

    let err = db.edges_dwithin(5.0, 1.0, -1.0, true).unwrap_err();
    assert!(matches!(err, GraphError::InvalidArgument(_)));
}

#[test]
fn dwithin_measures_against_the_stored_geometry() {
    let (_dir, mut db) = indexed_store();
    let bulge = [(0.0, 0.0), (5.0, 3.0), (10.0, 0.0)];
    ingest_line(&mut db, &bulge, IngestOptions::default());
    assert!(db.edges_dwithin(5.0, 0.5, 1.0, true).unwrap().is_empty());
    assert_eq!(db.edges_dwithin(5.0, 2.5, 3.0, true).unwrap().len(), 1);

    let (_other, mut straight) = indexed_store();
    ingest_line(
        &mut straight,
        &bulge,
        IngestOptions::default().store_geometry(false),
    );
    let hits = straight.edges_dwithin(5.0, 0.5, 1.0, true).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].1, 0.5);
}

#[test]
fn queries_need_the_index() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    segment(&mut db, (0.0, 0.0), (1.0, 1.0));
    assert!(!db.has_spatial_index().unwrap());
    let err = db
        .edges_in_bbox(&BoundingBox::new(0.0, 0.0, 1.0, 1.0))
        .unwrap_err();
    assert!(matches!(err, GraphError::Unsupported(_)));

    db.enable_spatial_index().unwrap();
    let nodes = db.nodes_in_bbox(&BoundingBox::new(0.5, 0.5, 2.0, 2.0)).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(db.edges_in_bbox(&BoundingBox::new(0.0, 0.0, 1.0, 1.0)).unwrap().len(), 1);

    db.drop_spatial_index().unwrap();
    assert!(!db.has_spatial_index().unwrap());
    assert!(matches!(
        db.edges_dwithin(0.0, 0.0, 1.0, false),
        Err(GraphError::Unsupported(_))
    ));
    segment(&mut db, (2.0, 2.0), (3.0, 3.0));
    assert_eq!(db.edge_count().unwrap(), 2);
}

#[test]
fn index_survives_a_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("graph.db");
    let mut db =
        GraphDb::create_with_options(&path, OpenOptions::default().spatial_index(true)).unwrap();
    segment(&mut db, (0.0, 0.0), (1.0, 0.0));
    db.close().unwrap();

    let mut db = GraphDb::connect(&path).unwrap();
    segment(&mut db, (1.0, 0.0), (2.0, 0.0));
    let hits = db.edges_in_bbox(&BoundingBox::new(1.5, -0.5, 3.0, 0.5)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].v.as_str(), "2, 0");
}

#[test]
fn box_queries_are_exact_below_float32_resolution() {
    let (_dir, mut db) = indexed_store();
    let outside = segment(&mut db, (100.0000001, 47.0), (100.0000001, 48.0));
    let inside = segment(&mut db, (100.000002, 47.0), (100.000002, 48.0));

    let bbox = BoundingBox::new(100.000001, 46.0, 101.0, 49.0);
    let nodes = db.nodes_in_bbox(&bbox).unwrap();
    let keys: Vec<&str> = nodes.iter().map(|n| n.key.as_str()).collect();
    assert_eq!(keys, vec!["100.000002, 47", "100.000002, 48"]);
    assert!(nodes.iter().all(|n| {
        let c = n.key.coord();
        bbox.contains(c.x, c.y)
    }));

    let ids: Vec<i64> = db.edges_in_bbox(&bbox).unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![inside]);
    assert!(!ids.contains(&outside));
}
