use criterion::{black_box, criterion_group, criterion_main, Criterion};
use prec::core::GrayImage;
use prec::features2d::{SiftExtractor, DESC_LEN};
use prec::flann::KdTree;
use prec::imgproc::gaussian_blur;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn blob_image(width: usize, height: usize, seed: u64) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let blobs: Vec<(f32, f32, f32, f32)> = (0..60)
        .map(|_| {
            (
                rng.gen::<f32>() * width as f32,
                rng.gen::<f32>() * height as f32,
                2.0 + rng.gen::<f32>() * 6.0,
                (rng.gen::<f32>() - 0.5) * 0.8,
            )
        })
        .collect();

    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut v = 0.5f32;
            for &(cx, cy, r, a) in &blobs {
                let d2 = (x as f32 - cx).powi(2) + (y as f32 - cy).powi(2);
                if d2 < 9.0 * r * r {
                    v += a * (-d2 / (2.0 * r * r)).exp();
                }
            }
            img.set(x, y, v.clamp(0.0, 1.0));
        }
    }
    img
}

fn bench_gaussian_blur(c: &mut Criterion) {
    let img = blob_image(256, 256, 1);
    c.bench_function("gaussian_blur_256_sigma_1.6", |b| {
        b.iter(|| gaussian_blur(black_box(&img), 1.6))
    });
}

fn bench_sift_extract(c: &mut Criterion) {
    let img = blob_image(256, 256, 2);
    let extractor = SiftExtractor::default();
    c.bench_function("sift_extract_256", |b| {
        b.iter(|| extractor.extract(black_box(&img)).unwrap())
    });
}

fn bench_kdtree(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let pool: Vec<[u8; DESC_LEN]> = (0..5_000)
        .map(|_| {
            let mut d = [0u8; DESC_LEN];
            for v in &mut d {
                *v = rng.gen();
            }
            d
        })
        .collect();

    c.bench_function("kdtree_build_5k", |b| {
        b.iter(|| KdTree::build(black_box(&pool)).unwrap())
    });

    let tree = KdTree::build(&pool).unwrap();
    let query = pool[42];
    c.bench_function("kdtree_bbf_knn3_depth200", |b| {
        b.iter(|| tree.knn_bbf(black_box(&query), 3, 200))
    });
}

criterion_group!(benches, bench_gaussian_blur, bench_sift_extract, bench_kdtree);
criterion_main!(benches);
