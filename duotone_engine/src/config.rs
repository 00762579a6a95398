//! Startup file loading (C5), mirroring `FileManager::_startup`'s order
//! (spec.md §4.5 steps 1-7; supplemented in SPEC_FULL.md §4.5).

use crate::context::EngineContext;
use crate::error::PresetError;
use duotone_shared::{
    ConfigDocument, DocumentError, HapticModesDocument, ParamAttrEntry, ParamEntry,
    ParamListsDocument, ParamMapEntry,
};
use std::path::{Path, PathBuf};

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DocumentError> {
    let text = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| DocumentError::Json {
        path: path.display().to_string(),
        source: e,
    })
}

pub(crate) fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), DocumentError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| DocumentError::Json {
        path: path.display().to_string(),
        source: e,
    })?;
    std::fs::write(path, text).map_err(|e| DocumentError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// File-system layout the engine's config loader reads from, held here
/// rather than hardcoded so `duotone_host` and tests can point it at a
/// scratch directory (`tempfile::TempDir`).
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub root: PathBuf,
}

impl ConfigPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn global_config(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn blacklist(&self) -> PathBuf {
        self.root.join("param_blacklist.json")
    }

    pub fn param_map(&self) -> PathBuf {
        self.root.join("param_map.json")
    }

    pub fn param_attrs(&self) -> PathBuf {
        self.root.join("param_attrs.json")
    }

    pub fn param_list(&self) -> PathBuf {
        self.root.join("param_list.json")
    }

    pub fn global_values(&self) -> PathBuf {
        self.root.join("global_params.json")
    }

    pub fn haptic_modes(&self) -> PathBuf {
        self.root.join("haptic_modes.json")
    }
}

/// Step 1: open the global config file, creating it with defaults if absent.
pub fn load_or_init_config(paths: &ConfigPaths) -> Result<ConfigDocument, PresetError> {
    let path = paths.global_config();
    if !path.exists() {
        let config = ConfigDocument::default();
        write_json(&path, &config)?;
        return Ok(config);
    }
    Ok(read_json(&path)?)
}

/// Step 2: load the parameter blacklist (a bare JSON array of path strings).
/// Missing file ⇒ empty blacklist (nothing is forbidden by default).
pub fn load_blacklist(paths: &ConfigPaths) -> Result<Vec<String>, PresetError> {
    let path = paths.blacklist();
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(read_json(&path)?)
}

/// Step 3: load the parameter map — bidirectional mappings plus
/// surface-control enrichment.
pub fn load_param_map(paths: &ConfigPaths) -> Result<Vec<ParamMapEntry>, PresetError> {
    let path = paths.param_map();
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(read_json(&path)?)
}

/// Step 4: load per-parameter display/attribute metadata.
pub fn load_param_attrs(paths: &ConfigPaths) -> Result<Vec<ParamAttrEntry>, PresetError> {
    let path = paths.param_attrs();
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(read_json(&path)?)
}

/// Step 5: open the parameter list file (named lists plus context-specific
/// sub-lists, spec.md §4.5 step 5). Missing file ⇒ no lists registered.
pub fn load_param_list(paths: &ConfigPaths) -> Result<ParamListsDocument, PresetError> {
    let path = paths.param_list();
    if !path.exists() {
        return Ok(ParamListsDocument::default());
    }
    Ok(read_json(&path)?)
}

/// Step 7: load named haptic profiles.
pub fn load_haptic_modes(paths: &ConfigPaths) -> Result<Option<HapticModesDocument>, PresetError> {
    let path = paths.haptic_modes();
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(read_json(&path)?))
}

/// Step 6: load saved global-parameter values. Missing file ⇒ nothing saved
/// yet (fresh install).
pub fn load_global_values(paths: &ConfigPaths) -> Result<Vec<ParamEntry>, PresetError> {
    let path = paths.global_values();
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(read_json(&path)?)
}

/// Apply the blacklist to the registry before any registration happens
/// (spec.md §4.3, SPEC_FULL §4.5 — blacklisted params are never registered).
pub fn apply_blacklist(ctx: &mut EngineContext, blacklist: &[String]) {
    for path in blacklist {
        ctx.registry.blacklist(path.clone());
    }
}

/// Apply parameter-map entries: wire up the bidirectional mapping between
/// `param_1` and `param_2` (both directions, since fanout recursion handles
/// the reverse edge itself — see §4.4).
pub fn apply_param_map(ctx: &mut EngineContext, entries: &[ParamMapEntry]) {
    for entry in entries {
        let (Some(h1), Some(h2)) = (
            ctx.registry.lookup_by_path(&entry.param_1),
            ctx.registry.lookup_by_path(&entry.param_2),
        ) else {
            log::warn!(
                "param map entry references unknown path(s): {} <-> {}",
                entry.param_1,
                entry.param_2
            );
            continue;
        };
        if let Some(p1) = ctx.registry.get_mut(h1) {
            if entry.is_linked_params() {
                p1.linked_param = true;
            }
            p1.mappings.push(h2);
            apply_surface_metadata(p1, entry);
        }
        if let Some(p2) = ctx.registry.get_mut(h2) {
            if entry.is_linked_params() {
                p2.linked_param = true;
            }
            p2.mappings.push(h1);
            apply_surface_metadata(p2, entry);
        }
    }
}

/// Propagate a param-map entry's surface-control metadata onto the parameter
/// it describes (spec.md §4.5 step 3, §3 Data Model: state, haptic mode,
/// group, morphable, multifn index).
fn apply_surface_metadata(param: &mut crate::param::Param, entry: &ParamMapEntry) {
    if entry.ui_state.is_some() {
        param.ui_state = entry.ui_state.clone();
    }
    if entry.group.is_some() {
        param.group = entry.group.clone();
    }
    if entry.group_param.is_some() {
        param.group_param = entry.group_param.clone();
    }
    if let Some(group_default) = entry.group_default {
        param.group_default = group_default;
    }
    if entry.haptic_mode.is_some() {
        param.haptic_mode = entry.haptic_mode.clone();
    }
    if let Some(morphable) = entry.morphable {
        param.morphable = morphable;
    }
}

/// Apply attribute entries: display metadata, ref tags, enumerated
/// value strings/tags, linked/state-A-only flags (SPEC_FULL §4.5).
pub fn apply_param_attrs(ctx: &mut EngineContext, entries: &[ParamAttrEntry]) {
    for entry in entries {
        let Some(handle) = ctx.registry.lookup_by_path(&entry.param_path) else {
            log::warn!("param attr entry references unknown path: {}", entry.param_path);
            continue;
        };
        let Some(param) = ctx.registry.get_mut(handle) else { continue };
        param.ref_tag = entry.r#ref.clone();
        param.display_name = entry.display_name.clone();
        param.num_positions = entry.num_positions;
        if let Some(min) = entry.display_min_value {
            param.display_min_value = min;
        }
        if let Some(max) = entry.display_max_value {
            param.display_max_value = max;
        }
        if let Some(dp) = entry.display_decimal_places {
            param.display_decimal_places = dp;
        }
        if !entry.value_strings.is_empty() {
            param.value_strings = entry.value_strings.clone();
        }
        param.value_tag = entry.value_tag.clone();
        if !entry.value_tags.is_empty() {
            param.value_tags = entry.value_tags.clone();
        }
        if let Some(linked) = entry.linked_param {
            param.linked_param = linked;
        }
        if let Some(state_a_only) = entry.state_a_only_param {
            param.state_a_only = state_a_only;
        }
    }
}

/// Resolve each list entry's paths into handles, dropping unknown paths
/// (logged, not fatal — a partially-resolvable list is still useful).
pub fn apply_param_list(ctx: &mut EngineContext, doc: &ParamListsDocument) {
    for entry in &doc.lists {
        let handles: Vec<_> = entry
            .param_paths
            .iter()
            .filter_map(|path| {
                let handle = ctx.registry.lookup_by_path(path);
                if handle.is_none() {
                    log::warn!("param list '{}' references unknown path: {}", entry.list_name, path);
                }
                handle
            })
            .collect();
        ctx.registry.set_named_list(entry.list_name.clone(), handles);
    }
}

/// Step 6: restore saved global-parameter values by path.
pub fn apply_global_values(
    ctx: &mut EngineContext,
    entries: &[duotone_shared::ParamEntry],
) {
    for entry in entries {
        let Some(handle) = ctx.registry.lookup_by_path(&entry.path) else { continue };
        if let Some(value) = entry.value {
            if let Some(param) = ctx.registry.get_mut(handle) {
                param.set_value(duotone_shared::LayerMask::BOTH, duotone_shared::StateId::A, value);
            }
        }
        if let Some(str_value) = &entry.str_value {
            if let Some(param) = ctx.registry.get_mut(handle) {
                param.set_string_value(
                    duotone_shared::LayerMask::BOTH,
                    duotone_shared::StateId::A,
                    str_value.clone(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(dir.path());
        let config = load_or_init_config(&paths).unwrap();
        assert_eq!(config.preset_id, "001_BASIC/000_INIT");
        assert!(paths.global_config().exists());
    }

    #[test]
    fn existing_config_file_is_loaded_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(dir.path());
        let mut custom = ConfigDocument::default();
        custom.preset_id = "002_USER/001_LEAD".to_string();
        write_json(&paths.global_config(), &custom).unwrap();
        let loaded = load_or_init_config(&paths).unwrap();
        assert_eq!(loaded.preset_id, "002_USER/001_LEAD");
    }

    #[test]
    fn missing_blacklist_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(dir.path());
        assert!(load_blacklist(&paths).unwrap().is_empty());
    }

    #[test]
    fn missing_param_list_file_yields_no_lists() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::new(dir.path());
        assert!(load_param_list(&paths).unwrap().lists.is_empty());
    }

    #[test]
    fn param_list_resolves_known_paths_and_drops_unknown() {
        use crate::router::EventRouter;
        use duotone_shared::{ModuleId, ParamListEntry, Scope};
        use std::sync::Arc;

        let router = Arc::new(EventRouter::new());
        let mut ctx = EngineContext::new(router);
        let handle = ctx
            .registry
            .register(crate::param::Param::new(
                duotone_shared::ParamHandle(0),
                ModuleId::Daw,
                1,
                "daw/osc1/wave",
                Scope::PatchCommon,
            ))
            .unwrap()
            .unwrap();
        let doc = ParamListsDocument {
            lists: vec![ParamListEntry {
                list_name: "osc_waves".to_string(),
                param_paths: vec!["daw/osc1/wave".to_string(), "daw/osc1/missing".to_string()],
                context: None,
            }],
        };
        apply_param_list(&mut ctx, &doc);
        assert_eq!(ctx.registry.named_list("osc_waves"), Some(&[handle][..]));
    }

    #[test]
    fn param_map_propagates_surface_metadata_to_both_sides() {
        use crate::router::EventRouter;
        use duotone_shared::{ModuleId, Scope};
        use std::sync::Arc;

        let router = Arc::new(EventRouter::new());
        let mut ctx = EngineContext::new(router);
        let h1 = ctx
            .registry
            .register(crate::param::Param::new(
                duotone_shared::ParamHandle(0),
                ModuleId::Daw,
                1,
                "daw/vcf/cutoff",
                Scope::PatchCommon,
            ))
            .unwrap()
            .unwrap();
        let h2 = ctx
            .registry
            .register(crate::param::Param::new(
                duotone_shared::ParamHandle(0),
                ModuleId::SfcControl,
                2,
                "sfc/vcf_cutoff_knob",
                Scope::SurfaceControl,
            ))
            .unwrap()
            .unwrap();
        let entries = vec![ParamMapEntry {
            param_1: "daw/vcf/cutoff".to_string(),
            param_2: "sfc/vcf_cutoff_knob".to_string(),
            ui_state: Some("SHOW_PARAM".to_string()),
            group: Some("vcf".to_string()),
            group_param: Some("vcf/active".to_string()),
            group_default: Some(true),
            haptic_mode: Some("detent".to_string()),
            morphable: Some(true),
            r#type: None,
        }];
        apply_param_map(&mut ctx, &entries);

        for handle in [h1, h2] {
            let param = ctx.registry.get(handle).unwrap();
            assert_eq!(param.ui_state.as_deref(), Some("SHOW_PARAM"));
            assert_eq!(param.group.as_deref(), Some("vcf"));
            assert_eq!(param.group_param.as_deref(), Some("vcf/active"));
            assert!(param.group_default);
            assert_eq!(param.haptic_mode.as_deref(), Some("detent"));
            assert!(param.morphable);
        }
    }
}
