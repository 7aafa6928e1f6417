use blockfs::tree::NodeCache;
use blockfs::{BlockPointer, BranchName, TlfId};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_chain(cache: &NodeCache, depth: usize) -> blockfs::tree::Node {
    let mut node = cache
        .get_or_create(BlockPointer::from_content(b"root"), "bench", None)
        .unwrap();
    for i in 0..depth {
        let pointer = BlockPointer::from_content(format!("dir-{}", i).as_bytes());
        node = cache
            .get_or_create(pointer, &format!("d{}", i), Some(&node))
            .unwrap();
    }
    node
}

fn bench_path_from_node(c: &mut Criterion) {
    let cache = NodeCache::new(TlfId::from_name("bench"), BranchName::master());
    let leaf = build_chain(&cache, 32);

    c.bench_function("path_from_node_depth_32", |b| {
        b.iter(|| black_box(cache.path_from_node(black_box(&leaf))))
    });
}

fn bench_get_or_create_hit(c: &mut Criterion) {
    let cache = NodeCache::new(TlfId::from_name("bench"), BranchName::master());
    let pointer = BlockPointer::from_content(b"hot");
    let node = cache.get_or_create(pointer, "hot", None).unwrap();

    c.bench_function("get_or_create_existing", |b| {
        b.iter(|| {
            let n = cache.get_or_create(black_box(pointer), "hot", None).unwrap();
            cache.forget(&n);
        })
    });
    cache.forget(&node);
}

criterion_group!(benches, bench_path_from_node, bench_get_or_create_hit);
criterion_main!(benches);
