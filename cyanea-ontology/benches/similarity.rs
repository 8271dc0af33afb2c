use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cyanea_ontology::{
    AnnotationPropagator, AnnotationRecord, GeneTermIndex, Namespace, OntologyGraph,
    PairwiseSimilarityEngine, Term,
};

/// A layered DAG: `width` terms per level, each term with two parents in
/// the level above, and `genes` genes annotated to pseudo-random leaves.
fn layered_ontology(levels: u32, width: usize, genes: usize) -> OntologyGraph {
    let mut g = OntologyGraph::new();
    g.add_term(Term::new("root", "root", Namespace::BiologicalProcess, 0))
        .unwrap();
    for level in 1..=levels {
        for k in 0..width {
            let id = format!("L{level}_{k}");
            g.add_term(Term::new(&id, &id, Namespace::BiologicalProcess, level))
                .unwrap();
            if level == 1 {
                g.add_edge(&id, "root").unwrap();
            } else {
                g.add_edge(&id, &format!("L{}_{}", level - 1, k)).unwrap();
                g.add_edge(&id, &format!("L{}_{}", level - 1, (k * 7 + 3) % width))
                    .unwrap();
            }
        }
    }

    let mut state: u64 = 42;
    let mut annotations = Vec::new();
    for gene in 0..genes {
        for _ in 0..3 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let k = (state >> 33) as usize % width;
            annotations.push(AnnotationRecord::new(
                format!("G{gene}"),
                format!("L{levels}_{k}"),
                "IDA",
            ));
        }
    }
    AnnotationPropagator::new().propagate(annotations, g).unwrap()
}

fn bench_propagate(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagate");
    group.sample_size(20);

    group.bench_function("8x200_terms_2k_genes", |b| {
        b.iter(|| layered_ontology(black_box(8), 200, 2_000))
    });

    group.finish();
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");

    let graph = layered_ontology(8, 200, 2_000);
    let index = GeneTermIndex::build(&graph).unwrap();
    let engine = PairwiseSimilarityEngine::new(&index, &graph).unwrap();

    group.bench_function("1k_pairs", |b| {
        b.iter(|| {
            for i in 0..1_000 {
                black_box(engine.similarity_at(i, (i * 13 + 1) % 2_000));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_propagate, bench_similarity);
criterion_main!(benches);
