//! On-disk JSON schemas: preset documents, the global config file, and the
//! static parameter definition files (map/attributes/list/haptic modes).
//!
//! These mirror `spec.md` §6 exactly; they are pure data, validated and
//! interpreted by `duotone_engine`'s file/preset manager.

use serde::{Deserialize, Serialize};

/// A single `{path, value}` or `{path, str_value}` entry inside a params
/// array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamEntry {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub str_value: Option<String>,
}

impl ParamEntry {
    pub fn numeric(path: impl Into<String>, value: f32) -> Self {
        Self { path: path.into(), value: Some(value), str_value: None }
    }

    pub fn string(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self { path: path.into(), value: None, str_value: Some(value.into()) }
    }
}

/// One layer's patch: common params plus the two morphable states.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchDocument {
    pub name: String,
    #[serde(default)]
    pub common: Vec<ParamEntry>,
    pub state_a: Vec<ParamEntry>,
    #[serde(default)]
    pub state_b: Vec<ParamEntry>,
}

/// One of the two layer sub-documents (`layer_id` ∈ {"d0","d1"}).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDocument {
    pub layer_id: String,
    #[serde(default)]
    pub params: Vec<ParamEntry>,
    pub patch: PatchDocument,
    /// Voice allocation for this layer. `0` is the "unset" sentinel a fresh
    /// destination layer carries before a load redistributes it (spec.md
    /// §4.5 "Load layer").
    #[serde(default)]
    pub voice_count: u32,
}

/// The whole preset document (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetDocument {
    pub version: String,
    pub revision: u64,
    #[serde(default)]
    pub params: Vec<ParamEntry>,
    pub layers: Vec<LayerDocument>,
}

impl PresetDocument {
    pub fn layer(&self, layer_id: &str) -> Option<&LayerDocument> {
        self.layers.iter().find(|l| l.layer_id == layer_id)
    }

    pub fn layer_mut(&mut self, layer_id: &str) -> Option<&mut LayerDocument> {
        self.layers.iter_mut().find(|l| l.layer_id == layer_id)
    }
}

/// The global config file (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub preset_id: String,
    pub prev_preset_id: String,
    #[serde(default = "default_mod_src_num")]
    pub mod_src_num: u32,
    #[serde(default)]
    pub demo_mode: bool,
    #[serde(default = "default_demo_timeout")]
    pub demo_mode_timeout: u32,
    #[serde(default = "default_system_colour")]
    pub system_colour: String,
}

fn default_mod_src_num() -> u32 {
    1
}

fn default_demo_timeout() -> u32 {
    300
}

fn default_system_colour() -> String {
    "00A0FF".to_string()
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            preset_id: "001_BASIC/000_INIT".to_string(),
            prev_preset_id: "001_BASIC/000_INIT".to_string(),
            mod_src_num: default_mod_src_num(),
            demo_mode: false,
            demo_mode_timeout: default_demo_timeout(),
            system_colour: default_system_colour(),
        }
    }
}

/// One entry from the parameter map file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamMapEntry {
    pub param_1: String,
    pub param_2: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haptic_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morphable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

impl ParamMapEntry {
    pub fn is_linked_params(&self) -> bool {
        self.r#type.as_deref() == Some("linked_params")
    }
}

/// One entry from the parameter attributes file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamAttrEntry {
    pub param_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_positions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_min_value: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_max_value: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_decimal_places: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_strings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_as_numeric: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_param: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display_enum_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_a_only_param: Option<bool>,
}

/// One named haptic profile entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HapticModeEntry {
    pub control_type: String,
    pub name: String,
    #[serde(default)]
    pub knob_start_angle: Option<f32>,
    #[serde(default)]
    pub knob_end_angle: Option<f32>,
    #[serde(default)]
    pub switch_mode: Option<String>,
    #[serde(default)]
    pub knob_indents: Vec<KnobIndent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnobIndent {
    pub angle: f32,
    pub hw_active: bool,
}

/// The haptic modes file (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HapticModesDocument {
    pub default_knob_haptic_mode: String,
    pub default_switch_haptic_mode: String,
    pub haptic_modes: Vec<HapticModeEntry>,
}

/// The parameter list file: named lists (and context-specific sub-lists) of
/// parameter paths, consumed by the GUI's list/enum navigation (spec.md §4.5
/// step 5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamListEntry {
    pub list_name: String,
    pub param_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamListsDocument {
    #[serde(default)]
    pub lists: Vec<ParamListEntry>,
}

/// A bank/preset identifier, `"<bank_folder>/<preset_name>"`, where the bank
/// folder is `NNN_BankName` and the preset file is `NNN_PresetName.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetId {
    pub bank_index: u32,
    pub bank_name: String,
    pub preset_index: u32,
    pub preset_name: String,
}

impl PresetId {
    pub fn bank_folder(&self) -> String {
        format!("{:03}_{}", self.bank_index, self.bank_name)
    }

    pub fn preset_file(&self) -> String {
        format!("{:03}_{}.json", self.preset_index, self.preset_name)
    }

    pub fn as_path_string(&self) -> String {
        format!("{}/{}", self.bank_folder(), self.preset_file())
    }

    /// Parse `"NNN_BankName/NNN_PresetName.json"` (or without the
    /// extension) back into its components.
    pub fn parse(s: &str) -> Option<PresetId> {
        let (bank_part, preset_part) = s.split_once('/')?;
        let preset_part = preset_part.strip_suffix(".json").unwrap_or(preset_part);
        let (bank_index, bank_name) = bank_part.split_once('_')?;
        let (preset_index, preset_name) = preset_part.split_once('_')?;
        Some(PresetId {
            bank_index: bank_index.parse().ok()?,
            bank_name: bank_name.to_string(),
            preset_index: preset_index.parse().ok()?,
            preset_name: preset_name.to_string(),
        })
    }
}

impl std::fmt::Display for PresetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_path_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_id_round_trips_through_string_form() {
        let id = PresetId {
            bank_index: 2,
            bank_name: "USER".to_string(),
            preset_index: 3,
            preset_name: "PAD".to_string(),
        };
        assert_eq!(id.as_path_string(), "002_USER/003_PAD.json");
        let parsed = PresetId::parse(&id.as_path_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn preset_id_parses_without_json_extension() {
        let parsed = PresetId::parse("001_BASIC/000_INIT").unwrap();
        assert_eq!(parsed.bank_index, 1);
        assert_eq!(parsed.bank_name, "BASIC");
        assert_eq!(parsed.preset_index, 0);
        assert_eq!(parsed.preset_name, "INIT");
    }

    #[test]
    fn preset_id_rejects_malformed_input() {
        assert!(PresetId::parse("no-slash-here").is_none());
        assert!(PresetId::parse("noindex/000_INIT").is_none());
    }
}
