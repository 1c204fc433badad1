use bencher::{TestCase, TestPayload};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const CHUNK_SIZES: [usize; 3] = [512, 8 * 1024, 64 * 1024];

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("fields_only", TestPayload::new(32, 0, 0)),
        TestCase::normal("single_file_256k", TestPayload::new(4, 1, 256 * 1024)),
        TestCase::large("many_files_16k", TestPayload::new(4, 64, 16 * 1024)),
    ]
}

fn benchmark_multipart_encoder(criterion: &mut Criterion) {
    // keep the encoder's trace output from skewing the numbers
    let subscriber = FmtSubscriber::builder().with_max_level(Level::WARN).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let test_cases = create_test_cases();
    let mut group = criterion.benchmark_group("multipart_encoder");

    for case in test_cases {
        let total = case.body(CHUNK_SIZES[0]).expect("bench payload should be valid").size();
        if let Some(total) = total {
            group.throughput(Throughput::Bytes(total));
        }

        for chunk_size in CHUNK_SIZES {
            let id = BenchmarkId::new(case.name(), chunk_size);
            group.bench_with_input(id, &case, |b, case| {
                b.iter_batched_ref(
                    || case.body(chunk_size).expect("bench payload should be valid"),
                    |body| {
                        while !body.is_eof() {
                            let chunk = body.read(chunk_size).expect("in-memory content should not fail");
                            black_box(chunk);
                        }
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

criterion_group!(encoder, benchmark_multipart_encoder);
criterion_main!(encoder);
