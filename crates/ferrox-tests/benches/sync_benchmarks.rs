//! Synchronization benchmarks
//!
//! Measures collecting a checklist over loopback trees of growing size, with
//! and without the directory cache.

use std::hint::black_box;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ferrox_config::{EngineConfig, SessionConfig};
use ferrox_session::{LoopbackConnector, Session};
use ferrox_sync::{SyncMode, SyncParams, SynchronizeEngine};
use ferrox_tests::write_local_file;
use ferrox_types::{CopyParam, UnattendedUi};
use tempfile::TempDir;

/// Local and remote trees with `directories` x `files` entries each
///
/// Every third file differs in time so the checklist is never empty.
fn create_trees(directories: usize, files: usize) -> (TempDir, TempDir) {
    let local = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let base = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
    let newer = Utc.timestamp_opt(1_600_000_600, 0).unwrap();
    for directory in 0..directories {
        for file in 0..files {
            let relative = format!("dir{:03}/file{:04}.txt", directory, file);
            write_local_file(&local.path().join(&relative), "content", base).unwrap();
            let remote_time = if file % 3 == 0 { newer } else { base };
            write_local_file(&remote.path().join(&relative), "content", remote_time).unwrap();
        }
    }
    (local, remote)
}

fn open_session(remote: &TempDir) -> Session {
    let mut session = Session::new(
        SessionConfig::default(),
        EngineConfig::default(),
        Rc::new(LoopbackConnector::new(remote.path())),
        Arc::new(UnattendedUi),
    );
    session.open().unwrap();
    session
}

fn bench_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_collect");
    group.sample_size(20);

    for (directories, files) in [(4, 25), (10, 50), (20, 100)] {
        let (local, remote) = create_trees(directories, files);
        let mut session = open_session(&remote);
        let label = format!("{}x{}", directories, files);
        group.throughput(Throughput::Elements((directories * files) as u64));

        for use_cache in [false, true] {
            let params = SyncParams {
                use_cache,
                ..SyncParams::default()
            };
            let name = if use_cache { "cached" } else { "uncached" };
            group.bench_with_input(BenchmarkId::new(name, &label), &params, |b, params| {
                b.iter(|| {
                    let checklist = SynchronizeEngine::new(&mut session)
                        .collect(
                            local.path(),
                            "/",
                            SyncMode::Both,
                            &CopyParam::default(),
                            *params,
                            None,
                        )
                        .unwrap();
                    black_box(checklist.len())
                });
            });
        }
    }

    group.finish();
}

fn bench_listing(c: &mut Criterion) {
    let (_local, remote) = create_trees(1, 500);
    let mut session = open_session(&remote);

    c.bench_function("read_directory_listing_500", |b| {
        b.iter(|| {
            let list = session
                .read_directory_listing("/dir000", &Default::default())
                .unwrap();
            black_box(list.len())
        });
    });
}

criterion_group!(benches, bench_collect, bench_listing);
criterion_main!(benches);
