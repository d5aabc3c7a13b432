//! End-to-end tests: problem files on disk through grounding, inference,
//! result writing and evaluation.

use std::path::{Path, PathBuf};

use markov_logic::config::MlnConfig;
use markov_logic::engine::{Engine, NetworkInfo};
use markov_logic::error::{GroundingError, MlnError};
use markov_logic::evidence::TriState;
use markov_logic::logic::AtomSignature;
use markov_logic::output::{self, OutputConfig};
use markov_logic::problem::{EvidenceAtom, Problem};

/// `Happens(Abrupt, 2)` is observed; a fight is initiated exactly when an
/// abrupt event happens, and initiations are a priori unlikely.
const FIGHT: &str = r#"{
    "domains": {
        "event": ["Abrupt", "Fight"],
        "time": ["1", "2", "3", "4"]
    },
    "predicates": [
        { "symbol": "Happens", "args": ["event", "time"] },
        { "symbol": "InitiatedAt", "args": ["event", "time"] }
    ],
    "clauses": [
        { "index": 0, "weight": 1.5, "literals": [
            { "positive": false, "atom": { "predicate": "InitiatedAt",
              "args": [{ "Constant": "Fight" }, { "Variable": { "name": "t" } }] } },
            { "positive": true, "atom": { "predicate": "Happens",
              "args": [{ "Constant": "Abrupt" }, { "Variable": { "name": "t" } }] } }
        ] },
        { "index": 1, "weight": -2.0, "literals": [
            { "positive": true, "atom": { "predicate": "InitiatedAt",
              "args": [{ "Variable": { "name": "e" } }, { "Variable": { "name": "t" } }] } }
        ] },
        { "index": 2, "weight": 4.0, "literals": [
            { "positive": false, "atom": { "predicate": "Happens",
              "args": [{ "Constant": "Abrupt" }, { "Variable": { "name": "t" } }] } },
            { "positive": true, "atom": { "predicate": "InitiatedAt",
              "args": [{ "Constant": "Fight" }, { "Variable": { "name": "t" } }] } }
        ] }
    ],
    "evidence": [
        { "predicate": "Happens", "args": ["Abrupt", "2"] }
    ],
    "query": [{ "symbol": "InitiatedAt", "arity": 2 }]
}"#;

const CONFIG: &str = r#"
[mcsat]
samples = 2000
chains = 2
seed = 7

[maxwalksat]
seed = 7
"#;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn fight_engine(dir: &Path) -> Engine {
    let problem = write(dir, "fight.json", FIGHT);
    let config = write(dir, "fight.toml", CONFIG);
    Engine::from_files(&problem, Some(&config)).unwrap()
}

fn initiated(engine: &Engine, event: &str, time: &str) -> markov_logic::atom::AtomId {
    engine
        .encoder()
        .encode(&AtomSignature::new("InitiatedAt", 2), &[event, time])
        .unwrap()
}

#[test]
fn grounding_merges_clause_contributions() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = fight_engine(dir.path());
    let mrf = engine.ground().unwrap();

    let info = NetworkInfo::of(&mrf);
    assert_eq!(info.atoms, 8);
    assert_eq!(info.constraints, 8);
    assert_eq!(info.hard, 0);
    assert_eq!(info.unit, 8);

    let weight_of = |id| {
        mrf.constraints()
            .iter()
            .find(|c| c.literals()[0].atom() == id)
            .map(|c| c.weight())
            .unwrap()
    };
    assert!((weight_of(initiated(&engine, "Fight", "1")) + 3.5).abs() < 1e-12);
    assert!((weight_of(initiated(&engine, "Fight", "2")) - 2.0).abs() < 1e-12);
    assert!((weight_of(initiated(&engine, "Abrupt", "3")) + 2.0).abs() < 1e-12);

    // Grounding twice yields the same network.
    let again = engine.ground().unwrap();
    assert_eq!(again.constraints(), mrf.constraints());
}

#[test]
fn marginals_follow_the_weights() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = fight_engine(dir.path());
    let (mrf, stats) = engine.marginals().unwrap();
    assert_eq!(stats.samples, 4000);
    assert_eq!(stats.chains, 2);

    let p = |event, time| mrf.marginal(initiated(&engine, event, time));
    assert!(p("Fight", "2") > 0.7, "supported initiation: {}", p("Fight", "2"));
    assert!(p("Fight", "1") < 0.2, "unsupported initiation: {}", p("Fight", "1"));
    assert!(p("Abrupt", "4") < 0.35);
    for atom in mrf.atoms() {
        let m = mrf.marginal(atom.id);
        assert!((0.0..=1.0).contains(&m));
    }
}

#[test]
fn output_is_deterministic_for_a_seed() {
    let dir = tempfile::TempDir::new().unwrap();
    let render = || {
        let engine = fight_engine(dir.path());
        let (mrf, _) = engine.marginals().unwrap();
        let out = dir.path().join("marginals.txt");
        let file = std::fs::File::create(&out).unwrap();
        output::write_marginals(&mrf, file, &engine.config().output).unwrap();
        std::fs::read_to_string(&out).unwrap()
    };
    let first = render();
    let second = render();
    assert_eq!(first, second);

    let lines: Vec<&str> = first.lines().collect();
    assert_eq!(lines.len(), 8);
    for line in &lines {
        let (atom, value) = line.rsplit_once(' ').unwrap();
        assert!(atom.starts_with("InitiatedAt("));
        let (_, digits) = value.split_once('.').unwrap();
        assert_eq!(digits.len(), 6);
        let value: f64 = value.parse().unwrap();
        assert!((0.0..=1.0).contains(&value));
    }
}

#[test]
fn map_state_scores_perfectly_against_annotation() {
    let dir = tempfile::TempDir::new().unwrap();
    let engine = fight_engine(dir.path());
    let (mrf, stats) = engine.map_state().unwrap();
    assert_eq!(stats.best_cost.hard, 0);

    let mut out = Vec::new();
    output::write_map(&mrf, &mut out, &OutputConfig::default()).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("InitiatedAt(Fight,2) 1"));
    assert!(text.contains("InitiatedAt(Fight,1) 0"));

    let mut annotation = Problem::from_json(FIGHT).unwrap();
    annotation.evidence = vec![EvidenceAtom::new(
        "InitiatedAt",
        ["Fight", "2"],
        TriState::True,
    )];
    let annotation_path = dir.path().join("annotation.json");
    annotation.save(&annotation_path).unwrap();
    let annotation = Problem::load(&annotation_path).unwrap();

    let evaluation = engine.evaluate(&mrf, &annotation, 0.5).unwrap();
    assert_eq!(evaluation.overall.true_positives, 1);
    assert_eq!(evaluation.overall.false_positives, 0);
    assert_eq!(evaluation.overall.false_negatives, 0);
    assert_eq!(evaluation.overall.f1(), 1.0);
}

#[test]
fn hard_clause_contradicted_by_evidence_is_fatal() {
    let mut problem = Problem::from_json(FIGHT).unwrap();
    // Closed-world Happens(Abrupt, 1) is false, so the hard clause
    // `Happens(Abrupt, 1)` cannot hold.
    problem.clauses.push(serde_json::from_str(
        r#"{ "index": 3, "weight": "hard", "literals": [
            { "positive": true, "atom": { "predicate": "Happens",
              "args": [{ "Constant": "Abrupt" }, { "Constant": "1" }] } }
        ] }"#,
    ).unwrap());
    let engine = Engine::new(problem, MlnConfig::default()).unwrap();
    let err = engine.ground().unwrap_err();
    assert!(matches!(
        err,
        MlnError::Grounding(GroundingError::HardClauseViolated { clause: 3, .. })
    ));
}

#[test]
fn function_terms_ground_through_mappings() {
    let problem = Problem::from_json(
        r#"{
            "domains": { "time": ["1", "2", "3"] },
            "predicates": [
                { "symbol": "Start", "args": ["time"] },
                { "symbol": "Active", "args": ["time"] }
            ],
            "functions": [{ "symbol": "next", "returns": "time", "args": ["time"] }],
            "clauses": [{ "index": 0, "weight": "hard", "literals": [
                { "positive": false, "atom": { "predicate": "Start",
                  "args": [{ "Variable": { "name": "t" } }] } },
                { "positive": true, "atom": { "predicate": "Active",
                  "args": [{ "Function": { "symbol": "next",
                    "args": [{ "Variable": { "name": "t" } }] } }] } }
            ] }],
            "evidence": [{ "predicate": "Start", "args": ["1"] }],
            "function_mappings": [
                { "function": "next", "value": "2", "args": ["1"] },
                { "function": "next", "value": "3", "args": ["2"] }
            ],
            "query": [{ "symbol": "Active", "arity": 1 }]
        }"#,
    )
    .unwrap();
    let mut config = MlnConfig::default().with_seed(3);
    config.mcsat.samples = 200;
    let engine = Engine::new(problem, config).unwrap();

    let mrf = engine.ground().unwrap();
    assert_eq!(mrf.constraints().len(), 1);
    assert!(mrf.constraints()[0].is_hard());

    let (mrf, _) = engine.marginals().unwrap();
    let active = AtomSignature::new("Active", 1);
    let id = engine.encoder().encode(&active, &["2"]).unwrap();
    assert_eq!(mrf.marginal(id), 1.0);
    // Every query atom is reported, constrained or not.
    assert_eq!(mrf.query_atoms().count(), 3);
}
