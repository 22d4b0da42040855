//! Synthetic build/search benchmark.
//! Measures build time, Recall@10, and QPS on uniform random vectors.
//!
//! Usage: cargo bench --bench random_points

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallworld::{DataObject, DenseVectorSpace, IndexParams, SmallWorldIndex, Space};
use std::time::Instant;

const N: usize = 20_000;
const DIM: usize = 32;
const QUERIES: usize = 500;
const K: usize = 10;

fn random_objects(n: usize, dim: usize, seed: u64, id_base: i64) -> Vec<DataObject> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let values: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
            DataObject::from_f32s(id_base + i as i64, &values)
        })
        .collect()
}

fn brute_force_top_k(
    space: &DenseVectorSpace,
    data: &[DataObject],
    probe: &DataObject,
    k: usize,
) -> Vec<i64> {
    let mut scored: Vec<(f32, i64)> = data
        .iter()
        .map(|obj| (space.distance(obj, probe), obj.id()))
        .collect();
    scored.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    scored.iter().take(k).map(|&(_, id)| id).collect()
}

fn main() {
    let space = DenseVectorSpace;
    let data = random_objects(N, DIM, 20240511, 0);
    let probes = random_objects(QUERIES, DIM, 19, -(QUERIES as i64));

    let mut index = SmallWorldIndex::new(&space, &data);
    let start = Instant::now();
    index
        .create_index(IndexParams {
            nn: 16,
            ef_construction: 64,
            index_thread_qty: std::thread::available_parallelism()
                .map(|p| p.get() as u32)
                .unwrap_or(1),
            use_proxy_dist: false,
        })
        .expect("build failed");
    let build_secs = start.elapsed().as_secs_f64();
    println!(
        "built {N} x {DIM}d in {build_secs:.2}s ({:.0} inserts/s)",
        N as f64 / build_secs
    );

    let truth: Vec<Vec<i64>> = probes
        .iter()
        .map(|p| brute_force_top_k(&space, &data, p, K))
        .collect();

    for (ef, algo) in [
        (32, "old"),
        (32, "v1merge"),
        (128, "old"),
        (128, "v1merge"),
        (512, "old"),
        (512, "v1merge"),
    ] {
        index
            .set_query_time_params(&[("efSearch", &ef.to_string()), ("algoType", algo)])
            .expect("bad query params");

        let start = Instant::now();
        let mut matched = 0usize;
        for (probe, expected) in probes.iter().zip(&truth) {
            let results = index.knn(probe, K).expect("query failed");
            matched += results
                .iter()
                .filter(|n| expected.contains(&n.object_id))
                .count();
        }
        let elapsed = start.elapsed().as_secs_f64();
        let recall = matched as f64 / (QUERIES * K) as f64;
        let qps = QUERIES as f64 / elapsed;
        println!("efSearch={ef:<4} algo={algo:<8} recall@{K}={recall:.4} qps={qps:.0}");
    }
}
