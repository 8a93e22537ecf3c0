use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bp_core::{compare, parse_listing, BranchGraph, MatchParams};

const NODE_COUNTS: &[usize] = &[32, 128, 512];

/// Generate a plausible listing: straight-line filler with conditional
/// branches sprinkled in, their targets drawn from nearby branch sites.
fn synthetic_listing(branches: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);

    // Lay out addresses first so branch targets can point at real sites.
    let mut branch_addrs = Vec::with_capacity(branches);
    let mut filler_runs = Vec::with_capacity(branches);
    let mut addr: u64 = 0x401000;
    for _ in 0..branches {
        let run: u32 = rng.gen_range(1..4);
        filler_runs.push((addr, run));
        addr += 3 * u64::from(run);
        branch_addrs.push(addr);
        addr += 2;
    }

    let mut out = String::from("Disassembly of section .text:\n\n0000000000401000 <main>:\n");
    for (i, (&site, &(filler_start, run))) in
        branch_addrs.iter().zip(filler_runs.iter()).enumerate()
    {
        let mut a = filler_start;
        for _ in 0..run {
            out.push_str(&format!("  {:x}:\t48 89 e5\tmov    %rsp,%rbp\n", a));
            a += 3;
        }
        let lo = i.saturating_sub(8);
        let hi = branch_addrs.len().min(i + 8);
        let target = branch_addrs[rng.gen_range(lo..hi)];
        out.push_str(&format!("  {:x}:\t75 00\tjne    {:x} <main+0x{:x}>\n", site, target, i));
    }

    out
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");

    for &n in NODE_COUNTS {
        let listing = synthetic_listing(n, 0xb5eed);
        group.throughput(Throughput::Bytes(listing.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse_and_build", n), &listing, |b, l| {
            b.iter(|| {
                let insns = parse_listing(l.as_bytes());
                std::hint::black_box(BranchGraph::build("bench", &insns));
            });
        });
    }

    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    group.sample_size(20);

    for &n in NODE_COUNTS {
        let prior_listing = synthetic_listing(n, 1);
        let new_listing = synthetic_listing(n, 2);
        let prior = BranchGraph::build("prior", &parse_listing(prior_listing.as_bytes()));
        let new = BranchGraph::build("new", &parse_listing(new_listing.as_bytes()));

        group.bench_function(BenchmarkId::new("best_size", n), |b| {
            b.iter(|| std::hint::black_box(compare(&prior, &new, &MatchParams::best_size())));
        });
        group.bench_function(BenchmarkId::new("all_sizes", n), |b| {
            b.iter(|| std::hint::black_box(compare(&prior, &new, &MatchParams::all_sizes())));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extract, bench_compare);
criterion_main!(benches);
