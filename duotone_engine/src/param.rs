//! Parameter Model (C4): per-scope storage, value views, and the mapping
//! fanout algorithm (spec.md §4.4 — "the central invariant").

use duotone_shared::{ControlType, LayerId, LayerMask, ParamFlags, ParamHandle, Scope, StateId};
use std::collections::HashSet;

/// One storage cell: a normalised float plus, for enum/string-valued
/// parameters, the human-readable string.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub value: f32,
    pub str_value: Option<String>,
}

impl Cell {
    fn clamp(&mut self) {
        self.value = self.value.clamp(0.0, 1.0);
    }
}

/// Storage shaped by the parameter's scope (spec.md §3/§4.4).
#[derive(Debug, Clone)]
pub enum ParamStorage {
    Global(Cell),
    PresetCommon(Cell),
    Layer([Cell; 2]),
    PatchCommon([Cell; 2]),
    /// `[layer][state]`. A state-A-only parameter only ever writes index 0;
    /// state B mirrors it on read (spec.md §4.4 morph notes, §9).
    PatchState([[Cell; 2]; 2]),
    SystemFunc,
    SurfaceControl(Cell),
    MidiShim(Cell),
}

impl ParamStorage {
    pub fn new_for_scope(scope: Scope) -> ParamStorage {
        match scope {
            Scope::Global => ParamStorage::Global(Cell::default()),
            Scope::PresetCommon => ParamStorage::PresetCommon(Cell::default()),
            Scope::Layer => ParamStorage::Layer(Default::default()),
            Scope::PatchCommon => ParamStorage::PatchCommon(Default::default()),
            Scope::PatchState => ParamStorage::PatchState(Default::default()),
            Scope::SystemFunc => ParamStorage::SystemFunc,
            Scope::SurfaceControl => ParamStorage::SurfaceControl(Cell::default()),
            Scope::MidiShim => ParamStorage::MidiShim(Cell::default()),
        }
    }
}

/// A fully-described parameter, identified by `(module, numeric_id, path)`
/// and, once registered, by a stable `ParamHandle`.
#[derive(Debug, Clone)]
pub struct Param {
    pub handle: ParamHandle,
    pub module: duotone_shared::ModuleId,
    pub numeric_id: u32,
    pub path: String,
    pub scope: Scope,
    pub flags: ParamFlags,
    pub control_type: Option<ControlType>,
    pub ref_tag: Option<String>,
    pub display_name: Option<String>,
    pub num_positions: Option<u32>,
    pub display_min_value: f32,
    pub display_max_value: f32,
    pub display_decimal_places: u8,
    pub value_strings: Vec<String>,
    pub value_tag: Option<String>,
    pub value_tags: Vec<String>,
    pub linked_param: bool,
    pub linking_enabled: bool,
    pub state_a_only: bool,
    /// Only meaningful for `Scope::SystemFunc` parameters — which named
    /// system function a write to this parameter invokes.
    pub system_func_type: Option<duotone_shared::SystemFuncType>,
    /// Only meaningful for `Scope::MidiShim` parameters — MIDI channel and
    /// the controller this shim drives (CC number, or `None` for
    /// pitch-bend/channel-pressure shims).
    pub midi_shim_channel: u8,
    pub midi_shim_cc: Option<u8>,
    /// Surface-control metadata from the parameter map file (spec.md §4.5
    /// step 3, §3 Data Model): which UI state the control shows in, its
    /// multifn group and default member, haptic profile, and whether it
    /// morphs between the A/B states.
    pub ui_state: Option<String>,
    pub group: Option<String>,
    pub group_param: Option<String>,
    pub group_default: bool,
    pub haptic_mode: Option<String>,
    pub morphable: bool,
    pub storage: ParamStorage,
    /// Peer handles this parameter fans out into (spec.md §4.4). Order
    /// matters for deterministic recursion.
    pub mappings: Vec<ParamHandle>,
}

impl Param {
    pub fn new(
        handle: ParamHandle,
        module: duotone_shared::ModuleId,
        numeric_id: u32,
        path: impl Into<String>,
        scope: Scope,
    ) -> Self {
        Self {
            handle,
            module,
            numeric_id,
            path: path.into(),
            scope,
            flags: ParamFlags::default(),
            control_type: None,
            ref_tag: None,
            display_name: None,
            num_positions: None,
            display_min_value: 0.0,
            display_max_value: 1.0,
            display_decimal_places: 2,
            value_strings: Vec::new(),
            value_tag: None,
            value_tags: Vec::new(),
            linked_param: false,
            linking_enabled: true,
            state_a_only: false,
            system_func_type: None,
            midi_shim_channel: 0,
            midi_shim_cc: None,
            ui_state: None,
            group: None,
            group_param: None,
            group_default: false,
            haptic_mode: None,
            morphable: false,
            storage: ParamStorage::new_for_scope(scope),
            mappings: Vec::new(),
        }
    }

    /// Read the normalised value for `(layer, state)`. Scopes narrower than
    /// the request (Global/PresetCommon) ignore the selector.
    pub fn value(&self, layer: LayerId, state: StateId) -> f32 {
        match &self.storage {
            ParamStorage::Global(c) | ParamStorage::PresetCommon(c) => c.value,
            ParamStorage::Layer(cells) | ParamStorage::PatchCommon(cells) => {
                cells[layer.index()].value
            }
            ParamStorage::PatchState(cells) => {
                if self.state_a_only {
                    cells[layer.index()][0].value
                } else {
                    cells[layer.index()][state.index()].value
                }
            }
            ParamStorage::SurfaceControl(c) | ParamStorage::MidiShim(c) => c.value,
            ParamStorage::SystemFunc => 0.0,
        }
    }

    /// Write the normalised value for `(layer, state)`, clamped to `[0,1]`.
    /// For Layer/PatchCommon/PatchState scopes, `mask` selects which layer
    /// cells are touched (spec.md §4.4 step 3, "Layer / PatchCommon /
    /// PatchState").
    pub fn set_value(&mut self, mask: LayerMask, state: StateId, mut new_value: f32) {
        new_value = new_value.clamp(0.0, 1.0);
        match &mut self.storage {
            ParamStorage::Global(c) | ParamStorage::PresetCommon(c) => {
                c.value = new_value;
                c.clamp();
            }
            ParamStorage::Layer(cells) | ParamStorage::PatchCommon(cells) => {
                for layer in LayerId::ALL {
                    if mask.contains(layer) {
                        cells[layer.index()].value = new_value;
                        cells[layer.index()].clamp();
                    }
                }
            }
            ParamStorage::PatchState(cells) => {
                for layer in LayerId::ALL {
                    if !mask.contains(layer) {
                        continue;
                    }
                    if self.state_a_only {
                        cells[layer.index()][0].value = new_value;
                        cells[layer.index()][0].clamp();
                    } else {
                        cells[layer.index()][state.index()].value = new_value;
                        cells[layer.index()][state.index()].clamp();
                    }
                }
            }
            ParamStorage::SurfaceControl(c) | ParamStorage::MidiShim(c) => {
                c.value = new_value;
                c.clamp();
            }
            ParamStorage::SystemFunc => {}
        }
    }

    /// Copy another parameter's normalised value into this one
    /// (`set_value_from_param`, spec.md §4.4). Position parameters
    /// re-quantise on the destination side by virtue of sharing the same
    /// normalised representation.
    pub fn set_value_from_param(&mut self, other: &Param, mask: LayerMask, state: StateId) {
        self.set_value(mask, state, other.value(LayerId::D0, state));
    }

    pub fn string_value(&self, layer: LayerId, state: StateId) -> Option<&str> {
        match &self.storage {
            ParamStorage::Global(c) | ParamStorage::PresetCommon(c) => c.str_value.as_deref(),
            ParamStorage::Layer(cells) | ParamStorage::PatchCommon(cells) => {
                cells[layer.index()].str_value.as_deref()
            }
            ParamStorage::PatchState(cells) => {
                let s = if self.state_a_only { 0 } else { state.index() };
                cells[layer.index()][s].str_value.as_deref()
            }
            ParamStorage::SurfaceControl(c) | ParamStorage::MidiShim(c) => c.str_value.as_deref(),
            ParamStorage::SystemFunc => None,
        }
    }

    pub fn set_string_value(&mut self, mask: LayerMask, state: StateId, value: impl Into<String>) {
        let value = value.into();
        match &mut self.storage {
            ParamStorage::Global(c) | ParamStorage::PresetCommon(c) => {
                c.str_value = Some(value);
            }
            ParamStorage::Layer(cells) | ParamStorage::PatchCommon(cells) => {
                for layer in LayerId::ALL {
                    if mask.contains(layer) {
                        cells[layer.index()].str_value = Some(value.clone());
                    }
                }
            }
            ParamStorage::PatchState(cells) => {
                for layer in LayerId::ALL {
                    if !mask.contains(layer) {
                        continue;
                    }
                    let s = if self.state_a_only { 0 } else { state.index() };
                    cells[layer.index()][s].str_value = Some(value.clone());
                }
            }
            ParamStorage::SurfaceControl(c) | ParamStorage::MidiShim(c) => {
                c.str_value = Some(value);
            }
            ParamStorage::SystemFunc => {}
        }
    }
}

/// The cause set carried through one fanout recursion — every parameter
/// already visited, to break recursion at the immediate predecessor (spec.md
/// §4.4 step 1).
pub type CauseSet = HashSet<ParamHandle>;
