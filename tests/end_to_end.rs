//! End-to-end scenarios through the public API: build, query, persist,
//! reload, and the documented failure modes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallworld::{
    DataObject, DenseVectorSpace, IndexError, IndexParams, RangeQuery, SmallWorldIndex,
};

fn random_dataset(n: usize, dim: usize, seed: u64) -> Vec<DataObject> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let values: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            DataObject::from_f32s(i as i64, &values)
        })
        .collect()
}

fn params(nn: u32, ef_construction: u32, threads: u32) -> IndexParams {
    IndexParams {
        nn,
        ef_construction,
        index_thread_qty: threads,
        use_proxy_dist: false,
    }
}

#[test]
fn single_point_index() {
    let space = DenseVectorSpace;
    let data = vec![DataObject::from_f32s(7, &[1.0, 2.0])];
    let mut index = SmallWorldIndex::new(&space, &data);
    index.create_index(params(10, 10, 1)).unwrap();
    index.set_query_time_params(&[("efSearch", "10")]).unwrap();

    assert_eq!(index.node_count(), 1);
    let results = index.knn(&data[0], 1).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].object_id, 7);
    assert_eq!(results[0].distance, 0.0);
}

#[test]
fn two_points_ranked_by_distance() {
    let space = DenseVectorSpace;
    let data = vec![
        DataObject::from_f32s(0, &[0.0]),
        DataObject::from_f32s(1, &[10.0]),
    ];
    let mut index = SmallWorldIndex::new(&space, &data);
    index.create_index(params(10, 10, 1)).unwrap();
    index.set_query_time_params(&[("efSearch", "4")]).unwrap();

    // Exactly one bidirectional edge.
    assert_eq!(index.friends(0), vec![1]);
    assert_eq!(index.friends(1), vec![0]);

    let probe = DataObject::from_f32s(-1, &[3.0]);
    let results = index.knn(&probe, 2).unwrap();
    let ids: Vec<i64> = results.iter().map(|n| n.object_id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert!(results[0].distance < results[1].distance);
}

#[test]
fn parallel_build_holds_invariants_and_full_self_recall() {
    let space = DenseVectorSpace;
    let data = random_dataset(100, 16, 42);
    let mut index = SmallWorldIndex::new(&space, &data);
    index.create_index(params(8, 32, 4)).unwrap();

    assert_eq!(index.node_count(), 100);
    for u in 0..100u32 {
        for v in index.friends(u) {
            assert!(v < 100);
            assert!(index.friends(v).contains(&u), "edge {u}->{v} not reciprocal");
        }
    }

    // With the beam as wide as the dataset the traversal is exhaustive on
    // a connected graph, so every indexed point must find itself.
    index.set_query_time_params(&[("efSearch", "100")]).unwrap();
    for obj in &data {
        let results = index.knn(obj, 1).unwrap();
        assert_eq!(results[0].object_id, obj.id());
        assert_eq!(results[0].distance, 0.0);
    }
}

#[test]
fn widening_the_beam_reaches_full_recall() {
    let space = DenseVectorSpace;
    let data = random_dataset(200, 8, 7);
    let mut index = SmallWorldIndex::new(&space, &data);
    index.create_index(params(5, 10, 1)).unwrap();

    let probes = random_dataset(20, 8, 8);
    let mut recalls = Vec::new();
    for ef in ["1", "4", "16", "200"] {
        index.set_query_time_params(&[("efSearch", ef)]).unwrap();
        let mut hits = 0usize;
        for probe in &probes {
            let expected = brute_force_top1(&space, &data, probe);
            let got = index.knn(probe, 1).unwrap();
            if got.first().map(|n| n.object_id) == Some(expected) {
                hits += 1;
            }
        }
        recalls.push(hits as f32 / probes.len() as f32);
    }
    assert_eq!(*recalls.last().unwrap(), 1.0);
    assert!(recalls.iter().all(|&r| r <= 1.0));
}

fn brute_force_top1(space: &DenseVectorSpace, data: &[DataObject], probe: &DataObject) -> i64 {
    use smallworld::Space as _;
    data.iter()
        .min_by(|a, b| {
            space
                .distance(a, probe)
                .partial_cmp(&space.distance(b, probe))
                .unwrap()
        })
        .map(|obj| obj.id())
        .unwrap()
}

#[test]
fn save_load_roundtrip_answers_identically() {
    let space = DenseVectorSpace;
    let data = random_dataset(1000, 16, 1234);
    let mut index = SmallWorldIndex::new(&space, &data);
    index.create_index(params(8, 32, 4)).unwrap();
    index.set_query_time_params(&[("efSearch", "64")]).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("points.swr");
    index.save_index(&path).unwrap();

    let mut loaded = SmallWorldIndex::new(&space, &data);
    loaded.load_index(&path).unwrap();
    loaded.set_query_time_params(&[("efSearch", "64")]).unwrap();
    assert_eq!(loaded.node_count(), 1000);

    let probes = random_dataset(50, 16, 5678);
    for probe in &probes {
        assert_eq!(index.knn(probe, 10).unwrap(), loaded.knn(probe, 10).unwrap());
    }
}

#[test]
fn both_algorithms_return_the_same_exhaustive_top_k() {
    let space = DenseVectorSpace;
    let data = random_dataset(300, 12, 99);
    let mut index = SmallWorldIndex::new(&space, &data);
    index.create_index(params(6, 24, 2)).unwrap();

    let probes = random_dataset(10, 12, 100);
    for probe in &probes {
        index
            .set_query_time_params(&[("efSearch", "300"), ("algoType", "old")])
            .unwrap();
        let old = index.knn(probe, 5).unwrap();
        index
            .set_query_time_params(&[("efSearch", "300"), ("algoType", "v1merge")])
            .unwrap();
        let merged = index.knn(probe, 5).unwrap();
        assert_eq!(old, merged);
    }
}

#[test]
fn range_queries_are_rejected() {
    let space = DenseVectorSpace;
    let data = random_dataset(10, 4, 1);
    let mut index = SmallWorldIndex::new(&space, &data);
    index.create_index(params(3, 6, 1)).unwrap();
    let err = index.search_range(&RangeQuery { radius: 0.5 }).unwrap_err();
    assert!(matches!(err, IndexError::Unsupported(_)));
}

#[test]
fn unknown_parameters_are_rejected() {
    let err = IndexParams::from_pairs(&[("NN", "8"), ("post", "2")]).unwrap_err();
    assert!(matches!(err, IndexError::Config(_)));

    let space = DenseVectorSpace;
    let data = random_dataset(4, 4, 2);
    let mut index = SmallWorldIndex::new(&space, &data);
    index.create_index(params(2, 4, 1)).unwrap();
    let err = index
        .set_query_time_params(&[("efSearch", "4"), ("mystery", "1")])
        .unwrap_err();
    assert!(matches!(err, IndexError::Config(_)));
}

#[test]
fn empty_dataset_builds_and_returns_nothing() {
    let space = DenseVectorSpace;
    let data: Vec<DataObject> = Vec::new();
    let mut index = SmallWorldIndex::new(&space, &data);
    index.create_index(IndexParams::default()).unwrap();
    assert!(index.is_empty());
    let probe = DataObject::from_f32s(0, &[0.0, 0.0, 0.0, 0.0]);
    assert!(index.knn(&probe, 5).unwrap().is_empty());
}
