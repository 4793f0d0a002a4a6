use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use zonewalk::DomainName;
use zonewalk::dictionary::DictionaryMatcher;
use zonewalk::dnssec::{Nsec3Parameters, nsec3_hash};

fn bench_nsec3_hash(c: &mut Criterion) {
    let name: DomainName = "www.example.com.".parse().unwrap();
    let mut group = c.benchmark_group("nsec3_hash");

    for iterations in [0u16, 10, 100] {
        let params = Nsec3Parameters::sha1(iterations, vec![0xaa, 0xbb, 0xcc, 0xdd]);
        group.bench_with_input(
            BenchmarkId::new("iterations", iterations),
            &params,
            |b, params| b.iter(|| nsec3_hash(black_box(&name), black_box(params)).unwrap()),
        );
    }

    group.finish();
}

fn bench_dictionary_candidate(c: &mut Criterion) {
    let zone: DomainName = "example.com.".parse().unwrap();
    let params = Nsec3Parameters::sha1(0, Vec::new());
    let digests = (0..1000).map(|i| {
        let name = zone.prepend(format!("host{}", i).as_bytes()).unwrap();
        nsec3_hash(&name, &params).unwrap()
    });
    let matcher = DictionaryMatcher::new(zone.clone(), params.clone(), digests).unwrap();

    c.bench_function("dictionary candidate", |b| {
        b.iter(|| matcher.match_candidate(black_box("host500")))
    });
}

criterion_group!(benches, bench_nsec3_hash, bench_dictionary_candidate);
criterion_main!(benches);
