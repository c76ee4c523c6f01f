use criterion::{black_box, criterion_group, criterion_main, Criterion};
use risse::{Args, Dispatch, Engine, Variant};

fn bench_member_get_set(c: &mut Criterion) {
    let engine = Engine::new();
    let object = Variant::object(engine.new_object());
    object.set_property(&engine, "value", 0).unwrap();

    c.bench_function("member set/get 10k", |b| {
        b.iter(|| {
            for i in 0..10000i64 {
                object.set_property(&engine, "value", i).unwrap();
                black_box(object.get_property(&engine, "value").unwrap());
            }
        })
    });
}

fn bench_method_call(c: &mut Criterion) {
    let engine = Engine::new();
    let text = Variant::from("risse runtime");
    let args = Args::from([Variant::from("runtime")]);

    c.bench_function("string indexOf 10k", |b| {
        b.iter(|| {
            for _ in 0..10000 {
                black_box(text.invoke(&engine, "indexOf", &args).unwrap());
            }
        })
    });
}

fn bench_array_push(c: &mut Criterion) {
    let engine = Engine::new();

    c.bench_function("array push 10k", |b| {
        b.iter(|| {
            let array = engine.new_array(Vec::new()).unwrap();
            for i in 0..10000i64 {
                array.invoke(&engine, "push", &Args::from([Variant::from(i)])).unwrap();
            }
            black_box(array.get_property(&engine, "length").unwrap())
        })
    });
}

fn bench_structured_round_trip(c: &mut Criterion) {
    let engine = Engine::new();
    let rows: Vec<Variant> = (0..1000i64)
        .map(|i| engine.eval_structured(&format!("%[\"id\" => {}, \"tags\" => [\"a\", 1.5]]", i)).unwrap())
        .collect();
    let data = engine.new_array(rows).unwrap();

    c.bench_function("structured dump+read 1k rows", |b| {
        b.iter(|| {
            let text = engine.to_structured(&data).unwrap();
            black_box(engine.eval_structured(&text.to_string()).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_member_get_set,
    bench_method_call,
    bench_array_push,
    bench_structured_round_trip,
);
criterion_main!(benches);
