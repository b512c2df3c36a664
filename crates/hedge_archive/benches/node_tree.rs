use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn get_input(count: usize) -> Vec<(String, usize)> {
    (0..count)
        .map(|i| (format!("chr_{}_{:04}_tex", ["sonic", "shadow", "tails"][i % 3], i), i))
        .collect()
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn pack(bencher: divan::Bencher, count: usize) {
    bencher
        .with_inputs(|| get_input(count))
        .bench_values(|entries| {
            divan::black_box(hedge_archive::NodeTree::pack(entries, true));
        });
}

#[divan::bench(args = [100, 1_000, 10_000])]
fn entries(bencher: divan::Bencher, count: usize) {
    bencher
        .with_inputs(|| hedge_archive::NodeTree::pack(get_input(count), true))
        .bench_refs(|tree| {
            divan::black_box(tree.entries());
        });
}
