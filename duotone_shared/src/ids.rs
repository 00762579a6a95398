//! Stable identity types for parameters, layers, and states.
//!
//! Mirrors the arena+index identity described in the control engine's design
//! notes: a parameter is addressed by `(module, numeric_id, path)` and, once
//! registered, by a small `ParamHandle` index. There are no owning pointers
//! between parameters — mappings are pairs of handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Owning module of a parameter, used for `(module, numeric_id)` lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleId {
    /// Audio DSP engine ("DAW") parameters.
    Daw,
    /// Global/system-level parameters (tempo, MIDI channels, colours...).
    System,
    /// Step/phrase sequencer parameters.
    Seq,
    /// Arpeggiator parameters.
    Arp,
    /// GUI-only bookkeeping parameters.
    Gui,
    /// Physical control surface parameters (knobs, switches).
    SfcControl,
    /// MIDI shim parameters (CC/pitch-bend/channel-pressure targets).
    Midi,
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleId::Daw => "daw",
            ModuleId::System => "system",
            ModuleId::Seq => "seq",
            ModuleId::Arp => "arp",
            ModuleId::Gui => "gui",
            ModuleId::SfcControl => "sfc",
            ModuleId::Midi => "midi",
        };
        f.write_str(s)
    }
}

/// A parameter's storage scope — determines how many cells back its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Single value, not part of any preset.
    Global,
    /// Single value, persisted at the top level of the preset document.
    PresetCommon,
    /// One value per layer (D0/D1).
    Layer,
    /// One value per layer, inside that layer's patch-common sub-array.
    PatchCommon,
    /// One value per (layer, state) cell.
    PatchState,
    /// Not a stored value — addresses a named system function.
    SystemFunc,
    /// Lives on the physical control surface (knob/switch).
    SurfaceControl,
    /// A MIDI CC/pitch-bend/channel-pressure shim endpoint.
    MidiShim,
}

/// One of the two independent voice layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerId {
    D0,
    D1,
}

impl LayerId {
    pub const ALL: [LayerId; 2] = [LayerId::D0, LayerId::D1];

    pub fn index(self) -> usize {
        match self {
            LayerId::D0 => 0,
            LayerId::D1 => 1,
        }
    }

    pub fn other(self) -> LayerId {
        match self {
            LayerId::D0 => LayerId::D1,
            LayerId::D1 => LayerId::D0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayerId::D0 => "d0",
            LayerId::D1 => "d1",
        }
    }

    pub fn from_str(s: &str) -> Option<LayerId> {
        match s {
            "d0" => Some(LayerId::D0),
            "d1" => Some(LayerId::D1),
            _ => None,
        }
    }
}

/// One of the two morphable patch states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateId {
    A,
    B,
}

impl StateId {
    pub fn index(self) -> usize {
        match self {
            StateId::A => 0,
            StateId::B => 1,
        }
    }

    pub fn other(self) -> StateId {
        match self {
            StateId::A => StateId::B,
            StateId::B => StateId::A,
        }
    }
}

/// Bitmask over `LayerId` used by fanout targeting (`layer_id_mask`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayerMask(u8);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const D0: LayerMask = LayerMask(0b01);
    pub const D1: LayerMask = LayerMask(0b10);
    pub const BOTH: LayerMask = LayerMask(0b11);

    pub fn single(layer: LayerId) -> LayerMask {
        match layer {
            LayerId::D0 => LayerMask::D0,
            LayerId::D1 => LayerMask::D1,
        }
    }

    pub fn contains(self, layer: LayerId) -> bool {
        (self.0 & LayerMask::single(layer).0) != 0
    }

    pub fn union(self, other: LayerMask) -> LayerMask {
        LayerMask(self.0 | other.0)
    }
}

/// Persistence/behaviour flags carried by every parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParamFlags {
    /// Persisted as part of a preset (or global) file.
    pub preset: bool,
    /// Persisted at all (preset or global params file).
    pub save: bool,
    /// Lives inside the mod-matrix sub-space.
    pub modmatrix: bool,
    /// String value encodes a compressed sequencer chunk.
    pub seqchunk: bool,
}

/// Physical control type for surface-control parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlType {
    Knob,
    Switch,
}

/// Stable numeric handle into the parameter registry's arena.
///
/// Mappings are stored as pairs of handles; there is no owning pointer
/// between two `Param`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParamHandle(pub u32);

impl ParamHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ParamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
