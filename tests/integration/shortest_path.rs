#![allow(missing_docs)]

use linegraph::{
    Attributes, GraphAccess, GraphDb, GraphError, IngestOptions, Ingestor, LineFeature, NodeKey,
    PathOutcome, PropValue, Coord, Weight,
};
use tempfile::{tempdir, TempDir};

fn weighted(length: f64) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("length".into(), PropValue::Real(length));
    attrs
}

struct Triangle {
    _dir: TempDir,
    db: GraphDb,
    a: NodeKey,
    b: NodeKey,
    c: NodeKey,
}

fn triangle() -> Triangle {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    let a = db.key(0.0, 0.0).unwrap();
    let b = db.key(1.0, 0.0).unwrap();
    let c = db.key(2.0, 0.0).unwrap();
    db.add_edge(&a, &b, weighted(5.0)).unwrap();
    db.add_edge(&b, &c, weighted(2.0)).unwrap();
    db.add_edge(&a, &c, weighted(10.0)).unwrap();
    Triangle { _dir: dir, db, a, b, c }
}

#[test]
fn cheapest_route_beats_the_direct_edge() {
    let t = triangle();
    let path = t
        .db
        .shortest_path(&t.a, &t.c, "length")
        .unwrap()
        .into_path()
        .unwrap();
    assert_eq!(path.nodes, vec![t.a.clone(), t.b.clone(), t.c.clone()]);
    assert_eq!(path.edges.len(), 2);
    assert_eq!(path.total_weight, 7.0);
}

#[test]
fn edges_are_only_followed_forwards() {
    let t = triangle();
    let outcome = t.db.shortest_path(&t.c, &t.a, "length").unwrap();
    assert_eq!(outcome, PathOutcome::NoPathFound);
}

#[test]
fn unknown_endpoints_are_not_found() {
    let t = triangle();
    let nowhere = t.db.key(50.0, 50.0).unwrap();
    let err = t.db.shortest_path(&t.a, &nowhere, "length").unwrap_err();
    assert!(matches!(err, GraphError::NodeNotFound(_)));
    let err = t.db.shortest_path(&nowhere, &t.a, "length").unwrap_err();
    assert!(matches!(err, GraphError::NodeNotFound(_)));
}

#[test]
fn missing_weights_fail_unless_a_fallback_is_given() {
    let mut t = triangle();
    let d = t.db.key(3.0, 0.0).unwrap();
    t.db.add_edge(&t.c, &d, Attributes::new()).unwrap();

    let err = t.db.shortest_path(&t.a, &d, "length").unwrap_err();
    assert!(
        matches!(err, GraphError::WeightAttribute { ref key, reason, .. } if key == "length" && reason == "missing"),
        "{err}"
    );

    let weight = Weight::attribute("length").or_else(|_| 1.0);
    let path = t
        .db
        .shortest_path_by(&t.a, &d, &weight)
        .unwrap()
        .into_path()
        .unwrap();
    assert_eq!(path.total_weight, 8.0);
    assert_eq!(path.nodes.last(), Some(&d));
}

#[test]
fn text_weights_are_rejected() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    let a = db.key(0.0, 0.0).unwrap();
    let b = db.key(1.0, 0.0).unwrap();
    let mut attrs = Attributes::new();
    attrs.insert("length".into(), "far".into());
    db.add_edge(&a, &b, attrs).unwrap();
    let err = db.shortest_path(&a, &b, "length").unwrap_err();
    assert!(matches!(
        err,
        GraphError::WeightAttribute { reason: "not a number", .. }
    ));
}

#[test]
fn distances_come_back_nearest_first() {
    let t = triangle();
    let distances = t
        .db
        .single_source_distances(&t.a, &Weight::attribute("length"), None)
        .unwrap();
    assert_eq!(
        distances,
        vec![(t.a.clone(), 0.0), (t.b.clone(), 5.0), (t.c.clone(), 7.0)]
    );

    let near = t
        .db
        .single_source_distances(&t.a, &Weight::attribute("length"), Some(6.0))
        .unwrap();
    assert_eq!(near.len(), 2);
}

#[test]
fn bidirectional_ingest_makes_paths_reversible() {
    let dir = tempdir().unwrap();
    let mut db = GraphDb::create(dir.path().join("graph.db")).unwrap();
    let features = [
        [(0.0, 0.0), (0.0, 1.0)],
        [(0.0, 1.0), (1.0, 1.0)],
        [(1.0, 1.0), (1.0, 2.0)],
    ]
    .into_iter()
    .map(|pts| {
        LineFeature::new(
            pts.iter().map(|(x, y)| Coord::new(*x, *y)).collect(),
            weighted(1.0),
        )
    });
    let mut ingestor = Ingestor::new(&mut db, IngestOptions::default().bidirectional(true)).unwrap();
    for feature in features {
        ingestor.push(feature).unwrap();
    }
    ingestor.finish().unwrap();

    let start = db.key(0.0, 0.0).unwrap();
    let end = db.key(1.0, 2.0).unwrap();
    let there = db.shortest_path(&start, &end, "length").unwrap().into_path().unwrap();
    let back = db.shortest_path(&end, &start, "length").unwrap().into_path().unwrap();
    assert_eq!(there.total_weight, 3.0);
    assert_eq!(back.total_weight, 3.0);
    let mut reversed = back.nodes.clone();
    reversed.reverse();
    assert_eq!(there.nodes, reversed);
}

fn out_degree<G: GraphAccess + ?Sized>(graph: &G, key: &NodeKey) -> usize {
    graph.successors(key).filter(|e| e.is_ok()).count()
}

#[test]
fn the_store_is_usable_through_the_generic_trait() {
    let t = triangle();
    let graph: &dyn GraphAccess = &t.db;
    assert_eq!(out_degree(graph, &t.a), 2);
    assert_eq!(out_degree(graph, &t.c), 0);
    assert!(graph.has_edge(&t.a, &t.b).unwrap());
    assert_eq!(graph.nodes().count(), 3);
}
