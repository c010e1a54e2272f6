use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tailcall_dataloader::{CancellationToken, DataLoader, Loader};

struct CountingLoader {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Loader<u64> for CountingLoader {
    type Value = String;
    type Error = ();

    async fn load(&self, keys: &[u64], _: &CancellationToken) -> Result<Vec<String>, ()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(keys.iter().map(|key| format!("value_{}", key)).collect())
    }
}

fn data_loader() -> Arc<DataLoader<u64, CountingLoader>> {
    Arc::new(
        DataLoader::new(CountingLoader { calls: AtomicUsize::new(0) })
            .delay(Duration::ZERO)
            .max_batch_size(100),
    )
}

fn benchmark_load_many(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("load_many 1000 keys", |b| {
        b.iter(|| {
            let data_loader = data_loader();
            let values = rt.block_on(data_loader.load_many(0..1000)).unwrap();
            assert_eq!(data_loader.loader().calls.load(Ordering::SeqCst), 10);
            black_box(values)
        })
    });
}

fn benchmark_concurrent_load_one(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("load_one concurrent duplicate keys", |b| {
        b.iter(|| {
            let data_loader = data_loader();
            rt.block_on(async {
                let handles = (0..1000)
                    .map(|i| {
                        let data_loader = data_loader.clone();
                        tokio::spawn(async move { data_loader.load_one(i % 10).await })
                    })
                    .collect::<Vec<_>>();

                for handle in handles {
                    black_box(handle.await.unwrap().unwrap());
                }
            });
        })
    });
}

fn all_benchmarks(c: &mut Criterion) {
    benchmark_load_many(c);
    benchmark_concurrent_load_one(c);
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = all_benchmarks
}
criterion_main!(benches);
