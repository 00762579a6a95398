//! Per-manager error taxonomy (spec.md §7) plus an aggregating `EngineError`.
//!
//! Critical startup failures propagate (`main` refuses to start); recoverable
//! failures are logged at the manager boundary and swallowed there — nothing
//! downstream of this file should `panic!`/`unwrap()` on a data-dependent
//! path.

use duotone_shared::{DocumentError, ParamError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Param(#[from] ParamError),
}

#[derive(Debug, Error)]
pub enum PresetError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error("no valid shadow file or permanent preset could be loaded")]
    NoLoadablePreset,
    #[error("preset failed schema validation: {0}")]
    SchemaInvalid(String),
}

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("serial port error on {port}: {source}")]
    Serial { port: String, #[source] source: serialport::Error },
    #[error("MIDI transport error: {0}")]
    Transport(#[from] midir::InitError),
    #[error("malformed MIDI byte stream: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("step index {0} out of range (max {1})")]
    StepOutOfRange(usize, usize),
    #[error("malformed step string: {0}")]
    MalformedStepString(String),
    #[error("malformed chunk string: {0}")]
    MalformedChunk(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Preset(#[from] PresetError),
    #[error(transparent)]
    Midi(#[from] MidiError),
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error(transparent)]
    Param(#[from] ParamError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}
