//! File/Preset Manager (C5): the two-file shadow-save crash-safety protocol,
//! debounced saves, and the full preset/layer/sound load-and-reconcile
//! lifecycle (spec.md §4.5).

use crate::clock::Timer;
use crate::config::{read_json, write_json, ConfigPaths};
use crate::context::EngineContext;
use crate::error::PresetError;
use duotone_shared::{ConfigDocument, LayerDocument, PatchDocument, PresetDocument, PresetId};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Debounce window for preset-scoped mutations (spec.md §4.5 "~2s one-shot
/// dirty timer").
pub const PRESET_SAVE_DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowSlot {
    A,
    B,
}

impl ShadowSlot {
    fn other(self) -> ShadowSlot {
        match self {
            ShadowSlot::A => ShadowSlot::B,
            ShadowSlot::B => ShadowSlot::A,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            ShadowSlot::A => "shadow_a",
            ShadowSlot::B => "shadow_b",
        }
    }
}

pub struct PresetManager {
    paths: ConfigPaths,
    banks_root: PathBuf,
    pub config: ConfigDocument,
    pub document: PresetDocument,
    prev_document: Option<PresetDocument>,
    /// The shadow file a successful save writes to next. A reload never
    /// toggles this (SPEC_FULL §4.5).
    write_target: ShadowSlot,
    dirty_timer: Option<Timer>,
}

/// Maximum number of voices split across the two layers (spec.md §4.5 voice
/// redistribution rule).
pub const MAX_VOICES: u32 = 16;

fn embedded_basic_preset() -> PresetDocument {
    PresetDocument {
        version: "1.0".to_string(),
        revision: 0,
        params: Vec::new(),
        layers: vec![
            LayerDocument {
                layer_id: "d0".to_string(),
                params: Vec::new(),
                patch: PatchDocument { name: "INIT".to_string(), ..Default::default() },
                voice_count: MAX_VOICES / 2,
            },
            LayerDocument {
                layer_id: "d1".to_string(),
                params: Vec::new(),
                patch: PatchDocument { name: "INIT".to_string(), ..Default::default() },
                voice_count: MAX_VOICES / 2,
            },
        ],
    }
}

fn validate_document(doc: &PresetDocument) -> Result<(), PresetError> {
    if doc.layers.len() != 2 {
        return Err(PresetError::SchemaInvalid(format!(
            "expected 2 layers, found {}",
            doc.layers.len()
        )));
    }
    if doc.layer("d0").is_none() || doc.layer("d1").is_none() {
        return Err(PresetError::SchemaInvalid("missing d0/d1 layer".to_string()));
    }
    Ok(())
}

impl PresetManager {
    pub fn new(paths: ConfigPaths, banks_root: impl Into<PathBuf>, config: ConfigDocument) -> Self {
        Self {
            paths,
            banks_root: banks_root.into(),
            config,
            document: embedded_basic_preset(),
            prev_document: None,
            write_target: ShadowSlot::B,
            dirty_timer: None,
        }
    }

    fn permanent_path(&self, preset_id: &PresetId) -> PathBuf {
        self.banks_root.join(preset_id.bank_folder()).join(preset_id.preset_file())
    }

    /// Resolve a raw 1-based (bank, preset) index pair — as captured from a
    /// MIDI bank-select/program-change pair — into the `PresetId` actually on
    /// disk, by matching the `NNN_` numeric prefix each bank folder and
    /// preset file carries (spec.md §4.5 bank/preset identifier format).
    pub fn resolve_by_index(&self, bank_index: u32, preset_index: u32) -> Option<PresetId> {
        let bank_prefix = format!("{bank_index:03}_");
        let bank_dir = std::fs::read_dir(&self.banks_root).ok()?.find_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().into_string().ok()?;
            name.starts_with(&bank_prefix).then_some((entry.path(), name))
        })?;
        let bank_name = bank_dir.1.strip_prefix(&bank_prefix)?.to_string();

        let preset_prefix = format!("{preset_index:03}_");
        let preset_file = std::fs::read_dir(&bank_dir.0).ok()?.find_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().into_string().ok()?;
            name.starts_with(&preset_prefix).then_some(name)
        })?;
        let preset_name = preset_file.strip_prefix(&preset_prefix)?.strip_suffix(".json")?.to_string();

        Some(PresetId { bank_index, bank_name, preset_index, preset_name })
    }

    fn shadow_path(&self, preset_id: &PresetId, slot: ShadowSlot) -> PathBuf {
        self.permanent_path(preset_id).with_extension(format!("json.{}", slot.suffix()))
    }

    fn mtime(path: &PathBuf) -> Option<std::time::SystemTime> {
        std::fs::metadata(path).ok()?.modified().ok()
    }

    /// Step 8 of startup (spec.md §4.5): load via the two-file shadow
    /// protocol, falling back to the permanent preset path.
    pub fn load_startup(&mut self) -> Result<(), PresetError> {
        let preset_id = PresetId::parse(&self.config.preset_id)
            .ok_or_else(|| PresetError::SchemaInvalid(self.config.preset_id.clone()))?;
        let a = self.shadow_path(&preset_id, ShadowSlot::A);
        let b = self.shadow_path(&preset_id, ShadowSlot::B);
        let (a_exists, b_exists) = (a.exists(), b.exists());

        let newer_first = match (Self::mtime(&a), Self::mtime(&b)) {
            (Some(ta), Some(tb)) if tb > ta => [ShadowSlot::B, ShadowSlot::A],
            _ => [ShadowSlot::A, ShadowSlot::B],
        };

        if a_exists || b_exists {
            for slot in newer_first {
                let path = self.shadow_path(&preset_id, slot);
                if !path.exists() {
                    continue;
                }
                if let Ok(doc) = read_json::<PresetDocument>(&path) {
                    if validate_document(&doc).is_ok() {
                        self.document = doc;
                        self.write_target = slot.other();
                        return Ok(());
                    }
                }
            }
        }

        let permanent = self.permanent_path(&preset_id);
        let doc: PresetDocument = read_json(&permanent)?;
        validate_document(&doc)?;
        self.document = doc;
        self.write_target = ShadowSlot::A;
        Ok(())
    }

    /// Write the current document to the next shadow slot and toggle it.
    /// Only a successful save toggles the write target (SPEC_FULL §4.5).
    pub fn save_shadow(&mut self) -> Result<(), PresetError> {
        let preset_id = PresetId::parse(&self.config.preset_id)
            .ok_or_else(|| PresetError::SchemaInvalid(self.config.preset_id.clone()))?;
        let path = self.shadow_path(&preset_id, self.write_target);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| duotone_shared::DocumentError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        write_json(&path, &self.document)?;
        self.write_target = self.write_target.other();
        Ok(())
    }

    fn save_config(&self) -> Result<(), PresetError> {
        Ok(write_json(&self.paths.global_config(), &self.config)?)
    }

    /// Restart the ~2s debounce timer. `on_fire` runs on the timer thread
    /// once the window elapses without a further mutation.
    pub fn mark_dirty<F>(&mut self, on_fire: F)
    where
        F: FnMut() + Send + 'static,
    {
        // Dropping the previous timer joins its thread, guaranteeing it
        // cannot fire after being superseded (clock.rs's cancellation
        // contract).
        self.dirty_timer = Some(Timer::start_once(PRESET_SAVE_DEBOUNCE, on_fire));
    }

    /// Load preset: spec.md §4.5 "Load preset". Acquires the morph lock for
    /// both layers for the duration of the load so a concurrent morph read
    /// can't tear mid-swap, releasing it again on every exit path.
    pub fn load_preset(
        &mut self,
        ctx: &mut EngineContext,
        preset_id: PresetId,
    ) -> Result<(), PresetError> {
        for layer in duotone_shared::LayerId::ALL {
            ctx.set_morph_lock(layer, true);
        }
        let result = self.load_preset_locked(ctx, preset_id);
        for layer in duotone_shared::LayerId::ALL {
            ctx.set_morph_lock(layer, false);
        }
        result
    }

    fn load_preset_locked(
        &mut self,
        ctx: &mut EngineContext,
        preset_id: PresetId,
    ) -> Result<(), PresetError> {
        self.prev_document = Some(self.document.clone());
        let path = self.permanent_path(&preset_id);
        let doc: PresetDocument = read_json(&path)?;
        validate_document(&doc)?;
        self.document = doc;
        self.config.prev_preset_id = self.config.preset_id.clone();
        self.config.preset_id = preset_id.as_path_string();
        for layer in duotone_shared::LayerId::ALL {
            ctx.set_live_state(layer, duotone_shared::StateId::A);
            ctx.set_morph_value(layer, 0.0);
        }
        self.reconcile_special_cases(ctx, true);
        self.save_config()?;
        ctx.router.emit(
            duotone_shared::ModuleId::System,
            duotone_shared::Event::ReloadPresets(duotone_shared::ReloadPresets::default()),
        );
        Ok(())
    }

    /// Load layer: spec.md §4.5 "Load layer (into layer D)".
    pub fn load_layer(
        &mut self,
        ctx: &mut EngineContext,
        src: &str,
        dst: duotone_shared::LayerId,
    ) -> Result<(), PresetError> {
        let src_doc = self
            .document
            .layer(src)
            .cloned()
            .ok_or_else(|| PresetError::SchemaInvalid(format!("unknown source layer {src}")))?;
        if let Some(dst_layer) = self.document.layer_mut(dst.as_str()) {
            dst_layer.params = src_doc.params;
            dst_layer.patch = src_doc.patch;
        }
        validate_document(&self.document)?;
        if dst == duotone_shared::LayerId::D1 {
            let d1_empty = self.document.layer("d1").map(|l| l.voice_count == 0).unwrap_or(false);
            if d1_empty {
                if let Some(d0) = self.document.layer_mut("d0") {
                    d0.voice_count = MAX_VOICES - 1;
                }
                if let Some(d1) = self.document.layer_mut("d1") {
                    d1.voice_count = 1;
                }
            }
        }
        self.reconcile_special_cases(ctx, false);
        ctx.router.emit(
            duotone_shared::ModuleId::System,
            duotone_shared::Event::ReloadPresets(duotone_shared::ReloadPresets {
                from_layer_toggle: true,
                from_ab_toggle: false,
            }),
        );
        Ok(())
    }

    /// Load sound: spec.md §4.5 "Load sound (into (layer, state))".
    pub fn load_sound(
        &mut self,
        ctx: &mut EngineContext,
        src_layer: &str,
        dst_layer: duotone_shared::LayerId,
        dst_state: duotone_shared::StateId,
    ) -> Result<(), PresetError> {
        let src_state_a = self
            .document
            .layer(src_layer)
            .map(|l| l.patch.state_a.clone())
            .ok_or_else(|| PresetError::SchemaInvalid(format!("unknown source layer {src_layer}")))?;
        if let Some(dst) = self.document.layer_mut(dst_layer.as_str()) {
            match dst_state {
                duotone_shared::StateId::A => dst.patch.state_a = src_state_a,
                duotone_shared::StateId::B => dst.patch.state_b = src_state_a,
            }
        }
        ctx.set_live_state(dst_layer, dst_state);
        ctx.set_morph_value(dst_layer, if matches!(dst_state, duotone_shared::StateId::A) { 0.0 } else { 1.0 });
        ctx.router.emit(
            duotone_shared::ModuleId::System,
            duotone_shared::Event::ReloadPresets(duotone_shared::ReloadPresets {
                from_layer_toggle: false,
                from_ab_toggle: true,
            }),
        );
        Ok(())
    }

    /// Init preset: spec.md §4.5 "Init preset".
    pub fn init_preset(&mut self, ctx: &mut EngineContext) -> Result<(), PresetError> {
        let d0_name = self.document.layer("d0").map(|l| l.patch.name.clone()).unwrap_or_default();
        let d1_name = self.document.layer("d1").map(|l| l.patch.name.clone()).unwrap_or_default();
        let mut fresh = embedded_basic_preset();
        if let Some(l) = fresh.layer_mut("d0") {
            l.patch.name = d0_name;
        }
        if let Some(l) = fresh.layer_mut("d1") {
            l.patch.name = d1_name;
        }
        self.document = fresh;
        self.reconcile_special_cases(ctx, false);
        // "shadow-save twice so both files are consistent"
        self.save_shadow()?;
        self.save_shadow()?;
        Ok(())
    }

    /// Toggle patch state: spec.md §4.5 "Toggle patch state".
    pub fn toggle_patch_state(
        &mut self,
        ctx: &mut EngineContext,
        layer: duotone_shared::LayerId,
        morph_param: Option<duotone_shared::ParamHandle>,
    ) {
        let new_state = ctx.live_state(layer).other();
        ctx.set_live_state(layer, new_state);
        // 5ms settle delay before writing the morph endpoint, allowing the
        // audio engine to flush a buffer (spec.md §4.5).
        std::thread::sleep(Duration::from_millis(5));
        let morph_value = match new_state {
            duotone_shared::StateId::A => 0.0,
            duotone_shared::StateId::B => 1.0,
        };
        if let Some(handle) = morph_param {
            ctx.write_param(
                handle,
                morph_value,
                duotone_shared::LayerMask::single(layer),
                new_state,
                duotone_shared::ModuleId::System,
                Default::default(),
            );
        }
        ctx.set_morph_value(layer, morph_value);
        ctx.router.emit(
            duotone_shared::ModuleId::System,
            duotone_shared::Event::ReloadPresets(duotone_shared::ReloadPresets {
                from_layer_toggle: false,
                from_ab_toggle: true,
            }),
        );
    }

    /// Restore previous: spec.md §4.5 "Restore previous".
    pub fn restore_previous(&mut self) -> Result<(), PresetError> {
        if let Some(prev) = self.prev_document.take() {
            self.document = prev;
            Ok(())
        } else {
            Err(PresetError::NoLoadablePreset)
        }
    }

    /// Undo last load: spec.md §4.5 "Undo last load".
    pub fn undo_last_load(&mut self, ctx: &mut EngineContext) -> Result<(), PresetError> {
        let prev_id = PresetId::parse(&self.config.prev_preset_id)
            .ok_or_else(|| PresetError::SchemaInvalid(self.config.prev_preset_id.clone()))?;
        self.load_preset(ctx, prev_id)
    }

    /// Rename bank/patch: spec.md §4.5 "Rename bank/patch".
    pub fn rename_bank(
        &mut self,
        ctx: &EngineContext,
        old: &PresetId,
        new_bank_name: &str,
    ) -> Result<(), PresetError> {
        let old_dir = self.banks_root.join(old.bank_folder());
        let mut new_id = old.clone();
        new_id.bank_name = new_bank_name.to_string();
        let new_dir = self.banks_root.join(new_id.bank_folder());
        if old_dir.exists() {
            std::fs::rename(&old_dir, &new_dir).map_err(|e| duotone_shared::DocumentError::Io {
                path: old_dir.display().to_string(),
                source: e,
            })?;
        }
        if self.config.preset_id.starts_with(&old.bank_folder()) {
            self.config.preset_id = self.config.preset_id.replacen(&old.bank_folder(), &new_id.bank_folder(), 1);
        }
        if self.config.prev_preset_id.starts_with(&old.bank_folder()) {
            self.config.prev_preset_id =
                self.config.prev_preset_id.replacen(&old.bank_folder(), &new_id.bank_folder(), 1);
        }
        let mut sf = duotone_shared::SystemFunc::new(duotone_shared::SystemFuncType::BankRenamed);
        sf.preset_id = Some(new_id);
        ctx.router.emit(duotone_shared::ModuleId::System, duotone_shared::Event::SystemFunc(sf));
        Ok(())
    }

    /// Re-run the special-case reconciliation outside of a load, e.g. when a
    /// live surface action flips one of the mirrored parameters directly
    /// (spec.md §4.5 special-case list is reconciled, not just loaded).
    pub fn reconcile_live_special_cases(&mut self, ctx: &mut EngineContext) {
        self.reconcile_special_cases(ctx, false);
    }

    /// Special-case parameter reconciliation (spec.md §4.5, run on every
    /// load; the extra steps marked "preset load only" run only when
    /// `full_preset_load` is true).
    fn reconcile_special_cases(&mut self, ctx: &mut EngineContext, full_preset_load: bool) {
        if let Some(lfo_sync) = ctx.registry.lookup_by_path("daw/lfo1/tempo_sync") {
            if let Some(rate_state) = ctx.registry.lookup_by_path("daw/lfo1/rate_state") {
                let synced = ctx.registry.get(lfo_sync).map(|p| p.value(ctx.live_layer, duotone_shared::StateId::A) > 0.5).unwrap_or(false);
                ctx.write_param(
                    rate_state,
                    if synced { 1.0 } else { 0.0 },
                    duotone_shared::LayerMask::BOTH,
                    duotone_shared::StateId::A,
                    duotone_shared::ModuleId::System,
                    duotone_shared::ParamChangeFlags { from_load: true, ..Default::default() },
                );
            }
        }
        if let (Some(saved), Some(button)) = (
            ctx.registry.lookup_by_path("daw/vcf/cutoff_link"),
            ctx.registry.lookup_by_path("system/vcf_cutoff_link_button"),
        ) {
            let linked = ctx.registry.get(saved).map(|p| p.value(ctx.live_layer, duotone_shared::StateId::A) > 0.5).unwrap_or(false);
            ctx.write_param(
                button,
                if linked { 1.0 } else { 0.0 },
                duotone_shared::LayerMask::BOTH,
                duotone_shared::StateId::A,
                duotone_shared::ModuleId::System,
                duotone_shared::ParamChangeFlags { from_load: true, ..Default::default() },
            );
        }
        if let (Some(saved), Some(button)) = (
            ctx.registry.lookup_by_path("daw/vcf/lp_slope"),
            ctx.registry.lookup_by_path("system/vcf_lp_slope_button"),
        ) {
            let slope = ctx.registry.get(saved).map(|p| p.value(ctx.live_layer, duotone_shared::StateId::A)).unwrap_or(0.0);
            ctx.write_param(
                button,
                slope,
                duotone_shared::LayerMask::BOTH,
                duotone_shared::StateId::A,
                duotone_shared::ModuleId::System,
                duotone_shared::ParamChangeFlags { from_load: true, ..Default::default() },
            );
        }
        if full_preset_load {
            if let Some(resonance) = ctx.registry.lookup_by_path("daw/vcf/resonance_mode") {
                ctx.write_param(
                    resonance,
                    0.0,
                    duotone_shared::LayerMask::BOTH,
                    duotone_shared::StateId::A,
                    duotone_shared::ModuleId::System,
                    duotone_shared::ParamChangeFlags { from_load: true, ..Default::default() },
                );
            }
            self.reconcile_fx_macro_mirror(ctx);
        }
    }

    /// "FX macro level mirrors the selected macro parameter, with the
    /// surface control's per-state value updated under a temporarily
    /// switched FX state" (spec.md §4.5, preset-load only). The macro select
    /// names which per-state macro-level parameter is authoritative; that
    /// value is copied into the surface control's mirror for each state in
    /// turn, switching the live state just long enough to write it.
    fn reconcile_fx_macro_mirror(&mut self, ctx: &mut EngineContext) {
        let (Some(select), Some(level), Some(surface)) = (
            ctx.registry.lookup_by_path("daw/fx/macro_select"),
            ctx.registry.lookup_by_path("daw/fx/macro_level"),
            ctx.registry.lookup_by_path("system/fx_macro_level_button"),
        ) else {
            return;
        };
        let _ = select;
        let original_state = ctx.live_state(ctx.live_layer);
        for state in [duotone_shared::StateId::A, duotone_shared::StateId::B] {
            ctx.set_live_state(ctx.live_layer, state);
            let macro_value = ctx.registry.get(level).map(|p| p.value(ctx.live_layer, state)).unwrap_or(0.0);
            ctx.write_param(
                surface,
                macro_value,
                duotone_shared::LayerMask::single(ctx.live_layer),
                state,
                duotone_shared::ModuleId::System,
                duotone_shared::ParamChangeFlags { from_load: true, ..Default::default() },
            );
        }
        ctx.set_live_state(ctx.live_layer, original_state);
    }
}

pub type SharedPresetManager = Arc<parking_lot::Mutex<PresetManager>>;

#[cfg(test)]
mod tests {
    use super::*;
    use duotone_shared::LayerId;

    fn manager(dir: &std::path::Path) -> PresetManager {
        let paths = ConfigPaths::new(dir);
        let config = ConfigDocument::default();
        PresetManager::new(paths, dir.join("banks"), config)
    }

    #[test]
    fn shadow_save_then_startup_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        mgr.document.layers[0].patch.name = "LEAD".to_string();
        mgr.save_shadow().unwrap();
        let mut reload = manager(dir.path());
        reload.load_startup().unwrap();
        assert_eq!(reload.document.layer("d0").unwrap().patch.name, "LEAD");
    }

    #[test]
    fn second_save_toggles_shadow_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut mgr = manager(dir.path());
        let preset_id = PresetId::parse(&mgr.config.preset_id).unwrap();
        mgr.save_shadow().unwrap();
        let first_target = mgr.write_target;
        assert!(mgr.shadow_path(&preset_id, first_target.other()).exists());
        mgr.save_shadow().unwrap();
        assert_ne!(mgr.write_target, first_target);
    }

    #[test]
    fn init_preset_preserves_patch_names() {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(crate::router::EventRouter::new());
        let mut ctx = EngineContext::new(router);
        let mut mgr = manager(dir.path());
        mgr.document.layers[0].patch.name = "KEPT".to_string();
        mgr.init_preset(&mut ctx).unwrap();
        assert_eq!(mgr.document.layer("d0").unwrap().patch.name, "KEPT");
    }

    #[test]
    fn load_layer_copies_source_into_destination() {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(crate::router::EventRouter::new());
        let mut ctx = EngineContext::new(router);
        let mut mgr = manager(dir.path());
        mgr.document.layers[0].patch.name = "SRC".to_string();
        mgr.load_layer(&mut ctx, "d0", LayerId::D1).unwrap();
        assert_eq!(mgr.document.layer("d1").unwrap().patch.name, "SRC");
    }

    #[test]
    fn load_layer_into_empty_d1_redistributes_voices() {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(crate::router::EventRouter::new());
        let mut ctx = EngineContext::new(router);
        let mut mgr = manager(dir.path());
        mgr.document.layer_mut("d1").unwrap().voice_count = 0;
        mgr.load_layer(&mut ctx, "d0", LayerId::D1).unwrap();
        assert_eq!(mgr.document.layer("d0").unwrap().voice_count, MAX_VOICES - 1);
        assert_eq!(mgr.document.layer("d1").unwrap().voice_count, 1);
    }

    #[test]
    fn load_layer_into_nonempty_d1_leaves_voices_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(crate::router::EventRouter::new());
        let mut ctx = EngineContext::new(router);
        let mut mgr = manager(dir.path());
        mgr.document.layer_mut("d1").unwrap().voice_count = 4;
        mgr.load_layer(&mut ctx, "d0", LayerId::D1).unwrap();
        assert_eq!(mgr.document.layer("d1").unwrap().voice_count, 4);
    }

    #[test]
    fn load_preset_locks_and_unlocks_morph() {
        let dir = tempfile::tempdir().unwrap();
        let banks_root = dir.path().join("banks");
        let id = PresetId::parse("001_BASIC/000_INIT").unwrap();
        let dst = banks_root.join(id.bank_folder());
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(
            dst.join(id.preset_file()),
            serde_json::to_string_pretty(&embedded_basic_preset()).unwrap(),
        )
        .unwrap();
        let router = Arc::new(crate::router::EventRouter::new());
        let mut ctx = EngineContext::new(router);
        let mut mgr = PresetManager::new(ConfigPaths::new(dir.path()), &banks_root, ConfigDocument::default());
        mgr.load_preset(&mut ctx, id).unwrap();
        for layer in LayerId::ALL {
            assert!(!ctx.morph(layer).lock);
        }
    }
}
