//! Result writers for marginal probabilities and MAP states.
//!
//! Text output is one atom per line, `Symbol(c1,c2) value`, in atom id
//! order. JSON output serializes the same records as an array.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{InferError, MlnResult};
use crate::mrf::{GroundAtom, GroundMrf};

/// How results are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Result writer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Digits after the decimal point in text output.
    pub precision: usize,
    /// Report `(count + 0.5) / (samples + 1)` instead of `count / samples`.
    pub smoothing: bool,
    /// Write every ground atom, not only the query atoms.
    pub all_atoms: bool,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            precision: 6,
            smoothing: false,
            all_atoms: false,
            format: OutputFormat::Text,
        }
    }
}

/// One reported atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginalRecord {
    pub atom: String,
    pub probability: f64,
}

/// One atom of a MAP state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub atom: String,
    pub state: bool,
}

/// Probability reported for an atom that was sampled true `count` times.
pub fn marginal_value(count: u64, samples: u64, smoothing: bool) -> f64 {
    if smoothing {
        (count as f64 + 0.5) / (samples as f64 + 1.0)
    } else if samples == 0 {
        0.0
    } else {
        count as f64 / samples as f64
    }
}

/// Probability reported for atoms never sampled true.
pub fn never_sampled(samples: u64, smoothing: bool) -> f64 {
    marginal_value(0, samples, smoothing)
}

fn reported_atoms<'a>(mrf: &'a GroundMrf, config: &OutputConfig) -> Vec<&'a GroundAtom> {
    if config.all_atoms || mrf.query().is_empty() {
        mrf.atoms().iter().collect()
    } else {
        mrf.query_atoms().collect()
    }
}

/// Marginals of the reported atoms, in atom id order.
pub fn marginals(mrf: &GroundMrf, config: &OutputConfig) -> MlnResult<Vec<MarginalRecord>> {
    let encoder = mrf.evidence().encoder();
    reported_atoms(mrf, config)
        .into_iter()
        .map(|atom| {
            Ok(MarginalRecord {
                atom: encoder.format_atom(atom.id)?,
                probability: marginal_value(atom.true_count, mrf.samples(), config.smoothing),
            })
        })
        .collect()
}

/// Current truth states of the reported atoms.
pub fn states(mrf: &GroundMrf, config: &OutputConfig) -> MlnResult<Vec<StateRecord>> {
    let encoder = mrf.evidence().encoder();
    reported_atoms(mrf, config)
        .into_iter()
        .map(|atom| {
            Ok(StateRecord {
                atom: encoder.format_atom(atom.id)?,
                state: atom.state,
            })
        })
        .collect()
}

/// Write the marginals of the reported atoms.
pub fn write_marginals(mrf: &GroundMrf, mut sink: impl Write, config: &OutputConfig) -> MlnResult<()> {
    let records = marginals(mrf, config)?;
    match config.format {
        OutputFormat::Text => {
            for record in &records {
                writeln!(
                    sink,
                    "{} {:.prec$}",
                    record.atom,
                    record.probability,
                    prec = config.precision
                )
                .map_err(io)?;
            }
        }
        OutputFormat::Json => write_json(&mut sink, &records)?,
    }
    sink.flush().map_err(io)?;
    Ok(())
}

/// Write the MAP state of the reported atoms as `0|1`.
pub fn write_map(mrf: &GroundMrf, mut sink: impl Write, config: &OutputConfig) -> MlnResult<()> {
    let records = states(mrf, config)?;
    match config.format {
        OutputFormat::Text => {
            for record in &records {
                writeln!(sink, "{} {}", record.atom, u8::from(record.state)).map_err(io)?;
            }
        }
        OutputFormat::Json => write_json(&mut sink, &records)?,
    }
    sink.flush().map_err(io)?;
    Ok(())
}

fn write_json<T: Serialize>(sink: &mut impl Write, records: &[T]) -> MlnResult<()> {
    serde_json::to_writer_pretty(&mut *sink, records)
        .map_err(|e| io(std::io::Error::other(e)))?;
    writeln!(sink).map_err(io)?;
    Ok(())
}

fn io(source: std::io::Error) -> InferError {
    InferError::Io { source }
}
