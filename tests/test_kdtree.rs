// Accuracy and exactness of Best-Bin-First search over descriptor-like data.

use prec::features2d::{descriptor_dist_sqr, DESC_LEN};
use prec::flann::KdTree;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Cluster-structured byte vectors: the regime descriptor pools live in.
/// `clusters` centers drawn uniformly, members scattered a few counts
/// around them.
fn clustered_pool(n: usize, clusters: usize, rng: &mut StdRng) -> Vec<[u8; DESC_LEN]> {
    let centers: Vec<[u8; DESC_LEN]> = (0..clusters)
        .map(|_| {
            let mut c = [0u8; DESC_LEN];
            for v in &mut c {
                *v = rng.gen();
            }
            c
        })
        .collect();

    (0..n)
        .map(|_| {
            let center = &centers[rng.gen_range(0..clusters)];
            let mut d = *center;
            for v in &mut d {
                let noise = rng.gen_range(-10i16..=10);
                *v = (i16::from(*v) + noise).clamp(0, 255) as u8;
            }
            d
        })
        .collect()
}

fn brute_force_nn(pool: &[[u8; DESC_LEN]], query: &[u8; DESC_LEN]) -> usize {
    pool.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            descriptor_dist_sqr(query, a).total_cmp(&descriptor_dist_sqr(query, b))
        })
        .map(|(i, _)| i)
        .unwrap()
}

#[test]
fn test_bbf_depth_200_mostly_exact() {
    let mut rng = StdRng::seed_from_u64(42);
    let pool = clustered_pool(10_000, 100, &mut rng);
    let tree = KdTree::build(&pool).unwrap();

    let mut queries = Vec::new();
    for _ in 0..300 {
        // Perturb a random pool member so the true neighbor is nontrivial.
        let mut q = pool[rng.gen_range(0..pool.len())];
        for v in &mut q {
            let noise = rng.gen_range(-3i16..=3);
            *v = (i16::from(*v) + noise).clamp(0, 255) as u8;
        }
        queries.push(q);
    }

    let mut hits = 0;
    for q in &queries {
        let exact = brute_force_nn(&pool, q);
        let approx = tree.knn_bbf(q, 1, 200);
        // Distance equality counts as a hit: ties are interchangeable.
        if approx[0].0 == exact
            || approx[0].1 == descriptor_dist_sqr(q, &pool[exact])
        {
            hits += 1;
        }
    }

    let rate = f64::from(hits) / queries.len() as f64;
    assert!(
        rate >= 0.95,
        "BBF with depth 200 found the exact 1-NN for only {:.1}% of queries",
        rate * 100.0
    );
}

#[test]
fn test_bbf_full_budget_equals_exact_knn() {
    let mut rng = StdRng::seed_from_u64(7);
    let pool = clustered_pool(1_000, 20, &mut rng);
    let tree = KdTree::build(&pool).unwrap();

    for _ in 0..50 {
        let mut q = [0u8; DESC_LEN];
        for v in &mut q {
            *v = rng.gen();
        }

        let mut exact: Vec<(usize, f32)> = pool
            .iter()
            .enumerate()
            .map(|(i, d)| (i, descriptor_dist_sqr(&q, d)))
            .collect();
        exact.sort_by(|a, b| a.1.total_cmp(&b.1));

        let approx = tree.knn_bbf(&q, 3, pool.len());
        assert_eq!(approx.len(), 3);
        for (got, want) in approx.iter().zip(exact.iter()) {
            assert_eq!(got.1, want.1);
        }
    }
}

#[test]
fn test_good_search_depth_scales_with_log() {
    let mut rng = StdRng::seed_from_u64(3);
    let small_pool = clustered_pool(256, 8, &mut rng);
    let large_pool = clustered_pool(8_192, 64, &mut rng);

    let small = KdTree::build(&small_pool).unwrap().good_search_depth();
    let large = KdTree::build(&large_pool).unwrap().good_search_depth();

    assert!(small < large);
    // Five doublings of the pool add a bounded number of extra visits.
    assert!(large - small < 100);
}
