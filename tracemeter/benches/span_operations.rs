use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tracemeter::{MetricsHandler, Tracer};

/// Benchmark a whole trace: lease, enter, leave, flush, recycle
fn bench_enter_leave(c: &mut Criterion) {
    let tracer = Tracer::new();

    c.bench_function("enter_leave", |b| {
        b.iter(|| {
            let scope = tracer.scope().enter(black_box("Begin"));
            scope.leave(black_box("End"));
        });
    });
}

/// Traces are restarted periodically so their buffers stay bounded.
const EVENTS_PER_TRACE: i64 = 10_000;

/// Benchmark nested spans inside a long-lived trace
fn bench_inner_enter_leave(c: &mut Criterion) {
    let tracer = Tracer::new();
    let mut outer = tracer.scope().enter("Begin");
    let mut i = 0i64;

    c.bench_function("inner_enter_leave", |b| {
        b.iter(|| {
            let inner = outer.enter(black_box("Request"));
            inner.leave(black_box("Done"));

            i += 1;
            if i % EVENTS_PER_TRACE == 0 {
                outer.leave("End");
                outer = tracer.scope().enter("Begin");
            }
        });
    });

    outer.leave("End");
}

/// Benchmark counting under an open span
fn bench_count(c: &mut Criterion) {
    let tracer = Tracer::new();
    let mut scope = tracer.scope().enter("Begin");
    let mut i = 0i64;

    c.bench_function("count", |b| {
        b.iter(|| {
            scope.count(black_box("Len"), black_box(i));

            i += 1;
            if i % EVENTS_PER_TRACE == 0 {
                scope.leave("End");
                scope = tracer.scope().enter("Begin");
            }
        });
    });

    scope.leave("End");
}

/// Benchmark traces folded into metrics by the trace handler
fn bench_trace_to_metrics(c: &mut Criterion) {
    let handler = Arc::new(MetricsHandler::new("bench"));
    let tracer = Tracer::new();
    let root = tracer.scope().with_handler(handler);

    c.bench_function("trace_to_metrics", |b| {
        b.iter(|| {
            let request = root.start(black_box("Request"), "*");
            let parse = request.enter("Parse");
            parse.count("Bytes", 512);
            parse.leave("Done");
            request.leave("Served");
        });
    });
}

/// Benchmark concurrent traces sharing one pool
fn bench_concurrent_traces(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_traces");

    for thread_count in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*thread_count as u64 * 1000));
        group.bench_with_input(
            BenchmarkId::new("threads", thread_count),
            thread_count,
            |b, &thread_count| {
                let tracer = Tracer::new();
                b.iter(|| {
                    let mut handles_vec = vec![];

                    for _ in 0..thread_count {
                        let tracer = tracer.clone();
                        handles_vec.push(thread::spawn(move || {
                            for _ in 0..1000 {
                                let scope = tracer.scope().enter(black_box("Work"));
                                scope.count("Items", 1);
                                scope.leave("Done");
                            }
                        }));
                    }

                    for join_handle in handles_vec {
                        join_handle.join().unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_enter_leave,
    bench_inner_enter_leave,
    bench_count,
    bench_trace_to_metrics,
    bench_concurrent_traces,
);

criterion_main!(benches);
