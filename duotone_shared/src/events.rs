//! Event-bus payload types carried by the event router (spec.md §4.2).

use crate::document::PresetId;
use crate::ids::{LayerId, ModuleId, ParamHandle, StateId};
use crate::midi::MidiEvent;
use serde::{Deserialize, Serialize};

/// Discriminant used by listeners to subscribe by `(producer_module, event_type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ParamChange,
    SystemFunc,
    ReloadPresets,
    Midi,
    SfcFunc,
}

/// A value has been written to a parameter; downstream effects should
/// propagate per the mapping fanout algorithm (spec.md §4.4).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamChange {
    pub param: ParamHandle,
    pub from_module: ModuleId,
    pub layer_id_mask: crate::ids::LayerMask,
    /// Only the GUI bridge honours this flag; all other listeners still see
    /// the event even when `display == false`.
    pub display: bool,
    pub flags: ParamChangeFlags,
}

impl ParamChange {
    pub fn new(param: ParamHandle, from_module: ModuleId) -> Self {
        Self {
            param,
            from_module,
            layer_id_mask: crate::ids::LayerMask::BOTH,
            display: true,
            flags: ParamChangeFlags::default(),
        }
    }

    pub fn non_displaying(mut self) -> Self {
        self.display = false;
        self
    }

    pub fn with_layer_mask(mut self, mask: crate::ids::LayerMask) -> Self {
        self.layer_id_mask = mask;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamChangeFlags {
    pub from_midi: bool,
    pub from_fanout: bool,
    pub from_load: bool,
}

/// Named system-function command (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemFuncType {
    LoadPreset,
    LoadLayer,
    LoadSound,
    InitPreset,
    TogglePatchState,
    UndoLastLoad,
    RestorePrevious,
    BankRenamed,
    PatchRenamed,
    SeqRec,
    SeqRun,
    SeqReset,
    MultifnSwitch,
    VcfCutoffLink,
    FxMacroSelect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemFunc {
    pub func_type: SystemFuncType,
    pub value: f32,
    pub num: i32,
    pub preset_id: Option<PresetId>,
    pub src_layer: Option<LayerId>,
    pub dst_layer: Option<LayerId>,
    pub dst_state: Option<StateId>,
    pub str_value: Option<String>,
    pub str_value_2: Option<String>,
    pub linked_param: Option<ParamHandle>,
}

impl SystemFunc {
    pub fn new(func_type: SystemFuncType) -> Self {
        Self {
            func_type,
            value: 0.0,
            num: 0,
            preset_id: None,
            src_layer: None,
            dst_layer: None,
            dst_state: None,
            str_value: None,
            str_value_2: None,
            linked_param: None,
        }
    }
}

/// Broadcast signal to re-read parameter values (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReloadPresets {
    pub from_layer_toggle: bool,
    pub from_ab_toggle: bool,
}

/// Outgoing commands to the control surface (spec.md §4.2, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SfcFuncType {
    SetSwitchValue,
    SetSwitchLedState,
    ConfigMultifnSwitches,
    ResetMultifnSwitches,
    SelectMultifnSwitch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SfcFunc {
    pub func_type: SfcFuncType,
    pub param: Option<ParamHandle>,
    pub switch_value: Option<f32>,
}

impl SfcFunc {
    pub fn new(func_type: SfcFuncType) -> Self {
        Self { func_type, param: None, switch_value: None }
    }
}

/// Small fixed-size records consumed by the pixel-level GUI renderer
/// (out of scope; this is the contract it's fed through, spec.md §4.10/§6).
#[derive(Debug, Clone, PartialEq)]
pub enum GuiMsg {
    HomeScreenRefresh,
    ListUpdate,
    SelectedListItemUpdate { index: usize },
    EnumParamUpdate { param: ParamHandle, value_str: String },
    MessagePopup { line_1: String, line_2: String, line_3: String, show_hourglass: bool },
    SetSoftButtonsText { button1_text: String, button2_text: String },
    SetSystemColour { colour: String },
    ScreenCaptureRequest,
    ClearBootWarningScreen,
}

/// The full event-bus payload, carried by the router (spec.md §4.2).
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ParamChange(ParamChange),
    SystemFunc(SystemFunc),
    ReloadPresets(ReloadPresets),
    Midi(MidiEvent),
    SfcFunc(SfcFunc),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ParamChange(_) => EventKind::ParamChange,
            Event::SystemFunc(_) => EventKind::SystemFunc,
            Event::ReloadPresets(_) => EventKind::ReloadPresets,
            Event::Midi(_) => EventKind::Midi,
            Event::SfcFunc(_) => EventKind::SfcFunc,
        }
    }
}
