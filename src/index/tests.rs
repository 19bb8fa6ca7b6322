use super::*;

fn entry(vector: &[f32], text: &str) -> IndexEntry {
    IndexEntry {
        vector: vector.to_vec(),
        text: text.to_string(),
    }
}

fn create_test_index() -> VectorIndex {
    VectorIndex::build(vec![
        entry(&[0.0, 0.0], "origin"),
        entry(&[1.0, 0.0], "east"),
        entry(&[0.0, 2.0], "far north"),
        entry(&[-1.0, 0.0], "west"),
    ])
    .expect("index should build")
}

fn texts(results: &[SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.text.as_str()).collect()
}

#[test]
fn build_rejects_empty_entries() {
    assert!(matches!(
        VectorIndex::build(Vec::new()),
        Err(QaError::EmptyIndex)
    ));
}

#[test]
fn build_rejects_mixed_dimensions() {
    let result = VectorIndex::build(vec![entry(&[1.0, 2.0], "a"), entry(&[1.0], "b")]);
    assert!(matches!(
        result,
        Err(QaError::DimensionMismatch {
            expected: 2,
            found: 1
        })
    ));
}

#[test]
fn build_keeps_entries() {
    let index = create_test_index();
    assert_eq!(index.len(), 4);
    assert_eq!(index.dimension(), 2);
    assert!(!index.is_empty());
    assert_eq!(index.entries()[2].text, "far north");
}

#[test]
fn query_orders_by_distance() {
    let index = create_test_index();

    let results = index.query(&[0.9, 0.1], 3).expect("query should succeed");

    assert_eq!(texts(&results), vec!["east", "origin", "west"]);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(results[0].position, 1);
}

#[test]
fn query_distance_is_euclidean() {
    let index = create_test_index();

    let results = index.query(&[3.0, 4.0], 1).expect("query should succeed");

    assert_eq!(results[0].text, "far north");
    assert!((results[0].distance - 13.0_f32.sqrt()).abs() < 1e-6);
}

#[test]
fn ties_keep_insertion_order() {
    let index = create_test_index();

    // "east" and "west" are both at distance 1 from the origin
    let results = index.query(&[0.0, 0.0], 3).expect("query should succeed");
    assert_eq!(texts(&results), vec!["origin", "east", "west"]);

    let duplicates = VectorIndex::build(vec![
        entry(&[1.0], "first"),
        entry(&[1.0], "second"),
        entry(&[1.0], "third"),
    ])
    .expect("index should build");
    let results = duplicates.query(&[1.0], 3).expect("query should succeed");
    assert_eq!(texts(&results), vec!["first", "second", "third"]);
}

#[test]
fn k_larger_than_index_returns_everything() {
    let index = create_test_index();
    let results = index.query(&[0.0, 0.0], 10).expect("query should succeed");
    assert_eq!(results.len(), 4);
}

#[test]
fn zero_k_is_rejected() {
    let index = create_test_index();
    assert!(matches!(
        index.query(&[0.0, 0.0], 0),
        Err(QaError::InvalidK(0))
    ));
}

#[test]
fn query_dimension_must_match() {
    let index = create_test_index();
    assert!(matches!(
        index.query(&[0.0, 0.0, 0.0], 1),
        Err(QaError::DimensionMismatch {
            expected: 2,
            found: 3
        })
    ));
}
