//! Engine facade: top-level API for grounding and inference.
//!
//! The `Engine` owns a problem's id layout, its evidence and the
//! configuration, and runs the grounding and inference pipeline on demand.
//! Every call grounds afresh, so one engine can serve several runs with
//! different solver settings.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::builtins::BuiltinRegistry;
use crate::config::MlnConfig;
use crate::error::MlnResult;
use crate::eval::{self, Evaluation};
use crate::evidence::Evidence;
use crate::ground::GroundingEngine;
use crate::identity::IdentityEncoder;
use crate::infer::{InferenceStats, MaxWalkSat, McSat};
use crate::mrf::GroundMrf;
use crate::problem::Problem;

/// Grounding and inference over one problem.
pub struct Engine {
    config: MlnConfig,
    problem: Problem,
    encoder: Arc<IdentityEncoder>,
    evidence: Arc<Evidence>,
    grounder: GroundingEngine,
    cancel: Arc<AtomicBool>,
}

impl Engine {
    /// Validate the configuration and build the evidence store.
    pub fn new(problem: Problem, config: MlnConfig) -> MlnResult<Self> {
        config.validate()?;
        let encoder = problem.encoder()?;
        let evidence = Arc::new(problem.evidence(Arc::clone(&encoder))?);
        tracing::info!(
            atoms = encoder.atom_count(),
            signatures = encoder.identities().len(),
            clauses = problem.clauses.len(),
            "engine ready"
        );
        Ok(Self {
            grounder: GroundingEngine::new(config.grounding.clone()),
            config,
            problem,
            encoder,
            evidence,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Load a problem file and an optional TOML config.
    pub fn from_files(problem: &Path, config: Option<&Path>) -> MlnResult<Self> {
        let problem = Problem::load(problem)?;
        let config = match config {
            Some(path) => MlnConfig::load(path)?,
            None => MlnConfig::default(),
        };
        Self::new(problem, config)
    }

    /// Replace the builtin predicates and functions used while grounding.
    pub fn with_builtins(mut self, builtins: Arc<BuiltinRegistry>) -> Self {
        self.grounder = self.grounder.with_builtins(builtins);
        self
    }

    pub fn config(&self) -> &MlnConfig {
        &self.config
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn encoder(&self) -> &IdentityEncoder {
        &self.encoder
    }

    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    /// Flag that stops a running sampler at its next sample boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Ground the problem's clauses against its evidence.
    pub fn ground(&self) -> MlnResult<GroundMrf> {
        self.grounder.ground(
            self.problem.clauses.clone(),
            Arc::clone(&self.evidence),
            &self.problem.query,
        )
    }

    /// Ground, then estimate marginals with MC-SAT.
    pub fn marginals(&self) -> MlnResult<(GroundMrf, InferenceStats)> {
        let mut mrf = self.ground()?;
        let stats = McSat::new(&mut mrf, self.config.mcsat.clone())?
            .with_cancel_flag(self.cancel_flag())
            .infer()?;
        Ok((mrf, stats))
    }

    /// Ground, then search a most probable state with MaxWalkSAT.
    pub fn map_state(&self) -> MlnResult<(GroundMrf, InferenceStats)> {
        let mut mrf = self.ground()?;
        let stats = MaxWalkSat::new(&mut mrf, self.config.maxwalksat.clone())?
            .with_cancel_flag(self.cancel_flag())
            .infer()?;
        Ok((mrf, stats))
    }

    /// Score an inferred network against an annotation problem sharing
    /// this problem's predicates.
    pub fn evaluate(&self, mrf: &GroundMrf, annotation: &Problem, threshold: f64) -> MlnResult<Evaluation> {
        let encoder = annotation.encoder()?;
        let truth = annotation.evidence(encoder)?;
        eval::evaluate(mrf, &truth, threshold)
    }
}

/// Summary of a ground network.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInfo {
    pub atoms: usize,
    pub constraints: usize,
    pub hard: usize,
    pub unit: usize,
    pub empty: usize,
    pub substitutions: u64,
    pub satisfied: u64,
    pub skipped: u64,
}

impl NetworkInfo {
    pub fn of(mrf: &GroundMrf) -> Self {
        let constraints = mrf.constraints();
        let stats = mrf.stats();
        Self {
            atoms: mrf.atoms().len(),
            constraints: constraints.len(),
            hard: constraints.iter().filter(|c| c.is_hard()).count(),
            unit: constraints.iter().filter(|c| c.is_unit()).count(),
            empty: constraints.iter().filter(|c| c.is_empty()).count(),
            substitutions: stats.substitutions,
            satisfied: stats.satisfied,
            skipped: stats.skipped,
        }
    }
}

impl std::fmt::Display for NetworkInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "ground network")?;
        writeln!(f, "  atoms:          {}", self.atoms)?;
        writeln!(f, "  constraints:    {}", self.constraints)?;
        writeln!(f, "  hard:           {}", self.hard)?;
        writeln!(f, "  unit:           {}", self.unit)?;
        writeln!(f, "  empty:          {}", self.empty)?;
        writeln!(f, "  substitutions:  {}", self.substitutions)?;
        writeln!(f, "  satisfied:      {}", self.satisfied)?;
        writeln!(f, "  skipped:        {}", self.skipped)?;
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("atoms", &self.encoder.atom_count())
            .field("clauses", &self.problem.clauses.len())
            .finish()
    }
}
