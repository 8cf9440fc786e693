//! # Sweep Benchmarks
//!
//! Performance benchmarks for dagwright-core validation and repair.
//!
//! Run with: `cargo bench -p dagwright-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dagwright_core::{
    Edge, Graph, GraphLimits, Node, NodeKind, Pipeline, PipelineConfig, PipelineRequest,
    SweepEngine, Validator, extract_constraints,
};
use std::hint::black_box;

const LIMITS: GraphLimits = GraphLimits {
    max_nodes: 5_000,
    max_edges: 20_000,
};

/// Chain of outcomes feeding one goal, every third edge broken.
fn create_draft(size: usize) -> Graph {
    let mut graph = Graph::new();
    graph.nodes.push(Node::new("goal", NodeKind::Goal, "Goal"));
    let mut prev = "goal".to_string();

    for i in 0..size {
        let id = format!("o{}", i);
        graph
            .nodes
            .push(Node::new(id.clone(), NodeKind::Outcome, format!("Outcome {}", i)));
        let mut edge = Edge::new(id.clone(), prev, 0.4, 0.1);
        if i % 3 == 0 {
            edge.strength_mean = f64::NAN;
        } else {
            edge.id = Some(format!("e{}", i));
        }
        graph.edges.push(edge);
        prev = id;
    }

    graph
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");
    let validator = Validator::new(LIMITS);

    for size in [50, 500, 2000].iter() {
        let graph = create_draft(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| black_box(validator.validate(graph)));
        });
    }

    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    let engine = SweepEngine::new(Validator::new(LIMITS), 10);

    for size in [50, 500, 2000].iter() {
        let graph = create_draft(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| {
                let mut draft = graph.clone();
                black_box(engine.run(&mut draft))
            });
        });
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let config = PipelineConfig {
        limits: LIMITS,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(config).expect("valid config");
    let request = PipelineRequest::default();

    for size in [50, 500].iter() {
        let graph = create_draft(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| black_box(pipeline.run(graph.clone(), &request)));
        });
    }

    group.finish();
}

fn bench_extraction(c: &mut Criterion) {
    let brief = "We need to grow revenue to at least £2m by Q4 2026. \
                 Keep marketing spend under £150k and headcount no more than 40. \
                 Churn must not exceed 5%. Price between £20 and £35. \
                 Launch within 6 months.";

    c.bench_function("extract_constraints", |b| {
        b.iter(|| black_box(extract_constraints(black_box(brief))));
    });
}

criterion_group!(
    benches,
    bench_validate,
    bench_sweep,
    bench_pipeline,
    bench_extraction
);
criterion_main!(benches);
