use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wastewise::{AdvisoryMapper, ClassificationPipeline, ClassifierError, Prediction};

fn bench_advisory(c: &mut Criterion) {
    let mapper = AdvisoryMapper::default();
    let mut group = c.benchmark_group("Advisory");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    // First rule
    group.bench_function("bottle_label", |b| b.iter(|| {
        mapper.map_to_tip(black_box("beer bottle"))
    }));

    // Falls through every rule
    group.bench_function("unmatched_label", |b| b.iter(|| {
        mapper.map_to_tip(black_box("Granny Smith"))
    }));

    group.bench_function("long_synset_label", |b| b.iter(|| {
        mapper.map_to_tip(black_box("ashcan, trash can, garbage can, wastebin, ash bin, ash-bin, ashbin, dustbin, trash barrel, trash bin"))
    }));

    group.finish();
}

fn bench_interpret(c: &mut Criterion) {
    let pipeline = ClassificationPipeline::default();
    let predictions = vec![
        Prediction::new("beer bottle, container", 0.87),
        Prediction::new("pop bottle, soda bottle", 0.08),
        Prediction::new("water bottle", 0.02),
    ];

    let mut group = c.benchmark_group("Interpret");
    group.sample_size(50);

    group.bench_function("top_prediction", |b| b.iter(|| {
        pipeline.interpret(Ok(black_box(predictions.clone())))
    }));

    group.bench_function("empty", |b| b.iter(|| {
        pipeline.interpret(Ok(black_box(Vec::new())))
    }));

    group.bench_function("error", |b| b.iter(|| {
        pipeline.interpret(Err(black_box(ClassifierError::PredictionError("boom".into()))))
    }));

    group.finish();
}

criterion_group!(benches, bench_advisory, bench_interpret);
criterion_main!(benches);
