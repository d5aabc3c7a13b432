//! Benchmarks for grounding and MC-SAT.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use markov_logic::domain::Domains;
use markov_logic::evidence::{EvidenceBuilder, TriState};
use markov_logic::ground::{GroundingConfig, GroundingEngine};
use markov_logic::identity::IdentityEncoder;
use markov_logic::infer::{McSat, McSatConfig};
use markov_logic::logic::{Atom, AtomSignature, Literal, Schema, Term, WeightedClause};

const TIMES: usize = 500;

fn clauses() -> Vec<WeightedClause> {
    let happens = |e: Term, t: &str| Atom::new("Happens", vec![e, Term::var(t)]);
    let initiated = |e: Term, t: &str| Atom::new("InitiatedAt", vec![e, Term::var(t)]);
    vec![
        WeightedClause::soft(
            0,
            1.5,
            vec![
                Literal::neg(initiated(Term::constant("Fight"), "t")),
                Literal::pos(happens(Term::constant("Abrupt"), "t")),
            ],
        ),
        WeightedClause::soft(1, -1.0, vec![Literal::pos(initiated(Term::var("e"), "t"))]),
        WeightedClause::soft(
            2,
            2.0,
            vec![
                Literal::neg(happens(Term::var("e"), "t")),
                Literal::pos(initiated(Term::var("e"), "t")),
            ],
        ),
    ]
}

fn evidence() -> Arc<markov_logic::evidence::Evidence> {
    let times: Vec<String> = (0..TIMES).map(|t| t.to_string()).collect();
    let domains = Domains::new()
        .with("event", ["Abrupt", "Fight", "Walk", "Run"])
        .with("time", times.iter().cloned());
    let schema = Schema::new()
        .predicate("Happens", ["event", "time"])
        .predicate("InitiatedAt", ["event", "time"]);
    let encoder = Arc::new(IdentityEncoder::new(&schema, Arc::new(domains)).unwrap());
    let mut builder = EvidenceBuilder::new(encoder).query(AtomSignature::new("InitiatedAt", 2));
    for t in times.iter().step_by(7) {
        builder = builder.fact(AtomSignature::new("Happens", 2), ["Abrupt", t.as_str()], TriState::True);
    }
    Arc::new(builder.build().unwrap())
}

fn bench_grounding(c: &mut Criterion) {
    let clauses = Arc::new(clauses());
    let evidence = evidence();
    let query = [AtomSignature::new("InitiatedAt", 2)];

    for (name, parallel) in [("ground_parallel", true), ("ground_sequential", false)] {
        let engine = GroundingEngine::new(GroundingConfig {
            parallel,
            chunk_size: 256,
            ..Default::default()
        });
        c.bench_function(name, |bench| {
            bench.iter(|| {
                black_box(
                    engine
                        .ground(Arc::clone(&clauses), Arc::clone(&evidence), &query)
                        .unwrap(),
                )
            })
        });
    }
}

fn bench_mcsat(c: &mut Criterion) {
    let engine = GroundingEngine::default();
    let query = [AtomSignature::new("InitiatedAt", 2)];
    let mrf = engine.ground(clauses(), evidence(), &query).unwrap();
    let config = McSatConfig {
        samples: 50,
        seed: 1,
        ..Default::default()
    };

    c.bench_function("mcsat_50_samples", |bench| {
        bench.iter(|| {
            let mut mrf = mrf.clone();
            let stats = McSat::new(&mut mrf, config.clone()).unwrap().infer().unwrap();
            black_box(stats)
        })
    });
}

criterion_group!(benches, bench_grounding, bench_mcsat);
criterion_main!(benches);
