//! Recognition metrics against an annotated ground truth.
//!
//! An atom counts as recognised when its marginal reaches the threshold,
//! or, for a network that was never sampled, when its MAP state is true.
//! Annotated atoms are those the annotation evidence marks `True`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{InferError, MlnResult};
use crate::evidence::{Evidence, TriState};
use crate::logic::AtomSignature;
use crate::mrf::GroundMrf;

/// `tp / (tp + fp)`; 1.0 when nothing was recognised.
pub fn precision(tp: usize, fp: usize) -> f64 {
    if tp + fp == 0 {
        1.0
    } else {
        tp as f64 / (tp + fp) as f64
    }
}

/// `tp / (tp + fn)`; 1.0 when nothing was annotated.
pub fn recall(tp: usize, fn_: usize) -> f64 {
    if tp + fn_ == 0 {
        1.0
    } else {
        tp as f64 / (tp + fn_) as f64
    }
}

/// `2 tp / (recognised + annotated)`; 1.0 when both are zero.
pub fn f1(tp: usize, recognized: usize, annotated: usize) -> f64 {
    let total = recognized + annotated;
    if total == 0 {
        1.0
    } else {
        2.0 * tp as f64 / total as f64
    }
}

/// Confusion counts of a recognition run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
}

impl Confusion {
    pub fn record(&mut self, recognized: bool, annotated: bool) {
        match (recognized, annotated) {
            (true, true) => self.true_positives += 1,
            (true, false) => self.false_positives += 1,
            (false, true) => self.false_negatives += 1,
            (false, false) => self.true_negatives += 1,
        }
    }

    pub fn recognized(&self) -> usize {
        self.true_positives + self.false_positives
    }

    pub fn annotated(&self) -> usize {
        self.true_positives + self.false_negatives
    }

    pub fn precision(&self) -> f64 {
        precision(self.true_positives, self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        recall(self.true_positives, self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        f1(self.true_positives, self.recognized(), self.annotated())
    }
}

impl std::ops::AddAssign for Confusion {
    fn add_assign(&mut self, other: Self) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
        self.true_negatives += other.true_negatives;
    }
}

impl std::fmt::Display for Confusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tp={} fp={} fn={} precision={:.4} recall={:.4} f1={:.4}",
            self.true_positives,
            self.false_positives,
            self.false_negatives,
            self.precision(),
            self.recall(),
            self.f1()
        )
    }
}

/// Metrics over all query atoms and per query signature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub overall: Confusion,
    pub by_signature: BTreeMap<AtomSignature, Confusion>,
}

/// Compare the query atoms of `mrf` with `annotation`.
///
/// Every ground atom of a query signature is scored. Atoms the evidence
/// fixed never reach the MRF; their evidence value stands in for the
/// inferred one. Atoms are matched by name, so the annotation may use a
/// different id layout as long as it declares the query predicates.
pub fn evaluate(mrf: &GroundMrf, annotation: &Evidence, threshold: f64) -> MlnResult<Evaluation> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(InferError::InvalidParameter {
            name: "threshold",
            value: threshold.to_string(),
            expected: "a probability in [0, 1]",
        }
        .into());
    }

    let evidence = mrf.evidence();
    let encoder = evidence.encoder();
    let target = annotation.encoder();
    let sampled = mrf.samples() > 0;
    let mut evaluation = Evaluation::default();
    let mut from_evidence = 0usize;
    for signature in mrf.query() {
        for id in encoder.identity(signature)?.ids() {
            let recognized = match mrf.get_atom(id) {
                Some(_) if sampled => mrf.marginal(id) >= threshold,
                Some(atom) => atom.state,
                None => {
                    from_evidence += 1;
                    evidence.get(signature, id)? == TriState::True
                }
            };
            let constants = encoder.decode(signature, id)?;
            let target_id = target.encode(signature, &constants)?;
            let annotated = annotation.get(signature, target_id)? == TriState::True;
            evaluation.overall.record(recognized, annotated);
            evaluation
                .by_signature
                .entry(signature.clone())
                .or_default()
                .record(recognized, annotated);
        }
    }
    tracing::debug!(
        overall = %evaluation.overall,
        from_evidence,
        "evaluated query atoms"
    );
    Ok(evaluation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::Domains;
    use crate::evidence::EvidenceBuilder;
    use crate::ground::ground_network;
    use crate::identity::IdentityEncoder;
    use crate::logic::{Atom, Literal, Schema, Term, WeightedClause};

    #[test]
    fn zero_division_conventions() {
        assert_eq!(precision(100, 0), 1.0);
        assert_eq!(precision(0, 0), 1.0);
        assert_eq!(recall(55, 55), 0.5);
        assert_eq!(recall(0, 0), 1.0);
        assert_eq!(f1(0, 0, 0), 1.0);
        assert_eq!(f1(0, 3, 2), 0.0);
        assert!((f1(2, 3, 2) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn confusion_accumulates() {
        let mut c = Confusion::default();
        c.record(true, true);
        c.record(true, false);
        c.record(false, true);
        c.record(false, false);
        let mut total = c;
        total += c;
        assert_eq!(total.true_positives, 2);
        assert_eq!(total.recognized(), 4);
        assert_eq!(total.annotated(), 4);
        assert_eq!(total.precision(), 0.5);
        assert!(total.to_string().starts_with("tp=2 fp=2 fn=2"));
    }

    #[test]
    fn evaluates_map_states_against_annotation() {
        let domains = Arc::new(Domains::new().with("time", ["1", "2", "3"]));
        let schema = Schema::new().predicate("Fight", ["time"]);
        let encoder = Arc::new(IdentityEncoder::new(&schema, Arc::clone(&domains)).unwrap());
        let query = AtomSignature::new("Fight", 1);
        let evidence = EvidenceBuilder::new(Arc::clone(&encoder))
            .query(query.clone())
            .build()
            .unwrap();
        let clause = WeightedClause::soft(
            0,
            1.0,
            vec![Literal::pos(Atom::new("Fight", vec![Term::var("t")]))],
        );
        let mut mrf = ground_network(vec![clause], Arc::new(evidence), &[query.clone()]).unwrap();
        let ids: Vec<_> = mrf.atoms().iter().map(|a| a.id).collect();
        mrf.set_state(ids[0], true);
        mrf.set_state(ids[1], true);

        let annotation = EvidenceBuilder::new(encoder)
            .fact(query.clone(), ["2"], TriState::True)
            .fact(query.clone(), ["3"], TriState::True)
            .build()
            .unwrap();
        let evaluation = evaluate(&mrf, &annotation, 0.5).unwrap();
        assert_eq!(evaluation.overall.true_positives, 1);
        assert_eq!(evaluation.overall.false_positives, 1);
        assert_eq!(evaluation.overall.false_negatives, 1);
        assert_eq!(evaluation.by_signature[&query], evaluation.overall);
        assert!(evaluate(&mrf, &annotation, 1.5).is_err());
    }

    #[test]
    fn query_atoms_fixed_by_evidence_are_scored() {
        let domains = Arc::new(Domains::new().with("time", ["1", "2", "3"]));
        let schema = Schema::new().predicate("Fight", ["time"]);
        let encoder = Arc::new(IdentityEncoder::new(&schema, Arc::clone(&domains)).unwrap());
        let query = AtomSignature::new("Fight", 1);
        let evidence = EvidenceBuilder::new(Arc::clone(&encoder))
            .query(query.clone())
            .fact(query.clone(), ["1"], TriState::True)
            .fact(query.clone(), ["2"], TriState::False)
            .build()
            .unwrap();
        let clause = WeightedClause::soft(
            0,
            1.0,
            vec![Literal::pos(Atom::new("Fight", vec![Term::var("t")]))],
        );
        let mut mrf = ground_network(vec![clause], Arc::new(evidence), &[query.clone()]).unwrap();
        assert_eq!(mrf.atoms().len(), 1);
        let id = mrf.atoms()[0].id;
        mrf.set_state(id, true);

        let annotation = EvidenceBuilder::new(encoder)
            .fact(query.clone(), ["1"], TriState::True)
            .fact(query.clone(), ["2"], TriState::True)
            .build()
            .unwrap();
        let evaluation = evaluate(&mrf, &annotation, 0.5).unwrap();
        // Fight(1) from evidence: tp. Fight(2) from evidence: fn. Fight(3) inferred: fp.
        assert_eq!(evaluation.overall.true_positives, 1);
        assert_eq!(evaluation.overall.false_negatives, 1);
        assert_eq!(evaluation.overall.false_positives, 1);
        assert_eq!(evaluation.overall.true_negatives, 0);
    }
}
