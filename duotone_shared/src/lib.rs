//! Wire and document types shared between the control engine and its
//! collaborators: parameter identity, the preset/config/attribute file
//! schemas, decoded MIDI events, and the event-bus payload types.
//!
//! This crate owns no behaviour — it is the vocabulary `duotone_engine`'s
//! managers speak to each other and to disk.

pub mod document;
pub mod error;
pub mod events;
pub mod ids;
pub mod midi;

pub use document::{
    ConfigDocument, HapticModeEntry, HapticModesDocument, KnobIndent, LayerDocument,
    ParamAttrEntry, ParamEntry, ParamListEntry, ParamListsDocument, ParamMapEntry, PatchDocument,
    PresetDocument, PresetId,
};
pub use error::{DocumentError, ParamError};
pub use events::{
    Event, EventKind, GuiMsg, ParamChange, ParamChangeFlags, ReloadPresets, SfcFunc, SfcFuncType,
    SystemFunc, SystemFuncType,
};
pub use ids::{ControlType, LayerId, LayerMask, ModuleId, ParamFlags, ParamHandle, Scope, StateId};
pub use midi::{
    CoalesceKey, MidiEvent, MidiEventKind, MidiSource, CC_BANK_SELECT, MIDI_CC_MAX_VALUE,
    MIDI_CC_MIN_VALUE, MIDI_CHANPRESS_MAX_VALUE, MIDI_CHANPRESS_MIN_VALUE,
    MIDI_PITCH_BEND_MAX_VALUE, MIDI_PITCH_BEND_MIN_VALUE,
};
