use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mmdb_reader::{Database, GeoLookup};
use std::hint::black_box;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

#[path = "../tests/common/mod.rs"]
mod common;

use common::{city_record, MmdbWriter};

/// Database with one /24 per `10.x.y.0` for `count` networks
fn build_db(record_size: u16, count: u32) -> Vec<u8> {
    let mut w = MmdbWriter::new(6, record_size);
    for i in 0..count {
        let cidr = format!("10.{}.{}.0/24", (i >> 8) & 0xff, i & 0xff);
        w.insert(
            &cidr,
            &city_record("US", "United States", ("NA", "North America"), 37.751, -97.822),
        );
    }
    w.build()
}

fn queries(count: u32) -> Vec<IpAddr> {
    (0..10_000u32)
        .map(|i| {
            let n = i % (count * 2);
            IpAddr::V4(Ipv4Addr::new(10, (n >> 8) as u8, n as u8, 7))
        })
        .collect()
}

/// Tree walk only, per record size
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    group.measurement_time(Duration::from_secs(5));

    for record_size in [24u16, 28, 32] {
        let db = Database::from_bytes(build_db(record_size, 4096)).unwrap();
        let queries = queries(4096);

        group.throughput(Throughput::Elements(queries.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("record_size", record_size),
            &queries,
            |b, queries| {
                b.iter(|| {
                    for &ip in queries {
                        black_box(db.lookup_addr(black_box(ip)).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

/// Lookup plus decoding, from a single value up to the whole record
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let db = Database::from_bytes(build_db(28, 256)).unwrap();
    let entry = db.lookup("10.0.1.1").unwrap().entry().unwrap();

    group.bench_function("get_value", |b| {
        b.iter(|| black_box(entry.get_value(black_box(&["country", "names", "en"])).unwrap()));
    });
    group.bench_function("entry_data_list", |b| {
        b.iter(|| black_box(entry.get_entry_data_list().unwrap()));
    });
    group.bench_function("to_json", |b| {
        b.iter(|| black_box(entry.get_entry_data_list().unwrap().to_json().unwrap()));
    });

    group.finish();
}

/// Country lookups with and without the LRU cache
fn bench_geo_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("geo_country");
    let queries = queries(1024);
    group.throughput(Throughput::Elements(queries.len() as u64));

    for capacity in [0usize, 4096] {
        let geo = GeoLookup::new(Database::from_bytes(build_db(24, 1024)).unwrap(), capacity);
        group.bench_with_input(
            BenchmarkId::new("cache_capacity", capacity),
            &queries,
            |b, queries| {
                b.iter(|| {
                    for &ip in queries {
                        black_box(geo.country(black_box(ip)).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_decode, bench_geo_cache);
criterion_main!(benches);
