// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # markov-logic
//!
//! Markov Logic Networks: weighted first-order clauses grounded against
//! evidence into a Markov random field, with MC-SAT marginal inference and
//! MaxWalkSAT MAP search.
//!
//! ## Architecture
//!
//! - **Identity** (`identity`): dense 1-based ids for every ground atom, one
//!   contiguous block per predicate in mixed-radix order
//! - **Evidence** (`evidence`): sparse three-valued truth tables with
//!   closed/open-world defaults and function mappings
//! - **Grounding** (`ground`): clause compilation, chunked parallel
//!   substitution enumeration on rayon, deduplication through DashMap
//! - **Ground MRF** (`mrf`): constraints, atoms and the clause dependency map
//! - **Inference** (`infer`): MC-SAT with SampleSAT, MaxWalkSAT
//!
//! ## Library usage
//!
//! ```no_run
//! use markov_logic::config::MlnConfig;
//! use markov_logic::engine::Engine;
//! use markov_logic::problem::Problem;
//!
//! let problem = Problem::load("fight.json".as_ref()).unwrap();
//! let engine = Engine::new(problem, MlnConfig::default()).unwrap();
//! let (mrf, stats) = engine.marginals().unwrap();
//! println!("{mrf}: {} samples", stats.samples);
//! ```

pub mod atom;
pub mod builtins;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod eval;
pub mod evidence;
pub mod ground;
pub mod identity;
pub mod infer;
pub mod logic;
pub mod mrf;
pub mod output;
pub mod problem;
