//! System-function dispatch (spec.md §4.2/§4.5/§4.6): wires the `SystemFunc`
//! events the parameter fanout emits (`EngineContext::fan_into_peer`'s
//! `Scope::SystemFunc` arm) to the preset manager and the sequencer — the
//! one place all fourteen named system functions are actually acted on.

use crate::context::EngineContext;
use crate::preset::PresetManager;
use crate::router::{EventListener, EventRouter};
use crate::sequencer::{PhraseLooper, SeqMode, StepSequencer};
use duotone_shared::{EventKind, ModuleId, SystemFunc, SystemFuncType};

/// Both sequencer modes plus which one is currently live (spec.md §4.6 —
/// SEQ_REC/SEQ_RUN/SEQ_RESET are shared system functions whose effect
/// depends on the preset-common Mode parameter).
#[derive(Default)]
pub struct SequencerState {
    pub mode: SeqMode,
    pub step: StepSequencer,
    pub phrase: PhraseLooper,
}

/// `EventRouter::subscribe` is keyed by `(producer_module, kind)` with no
/// wildcard, and a `SystemFunc` is emitted under whichever module owns the
/// parameter that triggered it — not a fixed producer. Subscribing once per
/// `ModuleId` is the only way to observe every one of them.
pub fn subscribe_system_funcs(router: &EventRouter) -> Vec<EventListener> {
    [
        ModuleId::Daw,
        ModuleId::System,
        ModuleId::Seq,
        ModuleId::Arp,
        ModuleId::Gui,
        ModuleId::SfcControl,
        ModuleId::Midi,
    ]
    .into_iter()
    .map(|m| router.subscribe(m, EventKind::SystemFunc))
    .collect()
}

/// Act on one `SystemFunc` event. Preset-manager failures are logged, not
/// propagated — the same boundary policy as every other manager (spec.md
/// §7).
pub fn dispatch_system_func(
    sf: &SystemFunc,
    ctx: &mut EngineContext,
    presets: &mut PresetManager,
    seq: &mut SequencerState,
) {
    match sf.func_type {
        SystemFuncType::LoadPreset => {
            let Some(preset_id) = sf.preset_id.clone() else { return };
            if let Err(e) = presets.load_preset(ctx, preset_id) {
                log::warn!("LoadPreset failed: {e}");
            }
        }
        SystemFuncType::LoadLayer => {
            let (Some(src), Some(dst)) = (sf.str_value.as_deref(), sf.dst_layer) else { return };
            if let Err(e) = presets.load_layer(ctx, src, dst) {
                log::warn!("LoadLayer failed: {e}");
            }
        }
        SystemFuncType::LoadSound => {
            let (Some(src), Some(dst_layer), Some(dst_state)) =
                (sf.str_value.as_deref(), sf.dst_layer, sf.dst_state)
            else {
                return;
            };
            if let Err(e) = presets.load_sound(ctx, src, dst_layer, dst_state) {
                log::warn!("LoadSound failed: {e}");
            }
        }
        SystemFuncType::InitPreset => {
            if let Err(e) = presets.init_preset(ctx) {
                log::warn!("InitPreset failed: {e}");
            }
        }
        SystemFuncType::TogglePatchState => {
            let Some(layer) = sf.dst_layer else { return };
            presets.toggle_patch_state(ctx, layer, sf.linked_param);
        }
        SystemFuncType::UndoLastLoad => {
            if let Err(e) = presets.undo_last_load(ctx) {
                log::warn!("UndoLastLoad failed: {e}");
            }
        }
        SystemFuncType::RestorePrevious => {
            if let Err(e) = presets.restore_previous() {
                log::warn!("RestorePrevious failed: {e}");
            }
        }
        // Raised by `PresetManager::rename_bank` itself, as a notification
        // for listeners like the GUI bridge; nothing to act on here.
        SystemFuncType::BankRenamed | SystemFuncType::PatchRenamed => {}
        SystemFuncType::SeqRec => match seq.mode {
            SeqMode::Step => {
                if sf.value <= 0.5 {
                    seq.step.exit_rec();
                }
            }
            SeqMode::PhraseLooper => {
                if sf.value > 0.5 {
                    seq.phrase.rec_on();
                } else {
                    seq.phrase.rec_off();
                    seq.phrase.stop_rec_and_round(sf.num.max(0) as u32);
                }
            }
        },
        SystemFuncType::SeqRun => match seq.mode {
            SeqMode::Step => {
                if sf.value > 0.5 {
                    seq.step.run_on();
                } else {
                    seq.step.stop();
                }
            }
            SeqMode::PhraseLooper => {
                if sf.value > 0.5 {
                    seq.phrase.run_on();
                }
            }
        },
        SystemFuncType::SeqReset => {
            if matches!(seq.mode, SeqMode::PhraseLooper) {
                seq.phrase.reset();
            }
        }
        SystemFuncType::MultifnSwitch => {
            if matches!(seq.mode, SeqMode::Step) {
                seq.step.multifn_pressed(sf.num.max(0) as usize);
            }
        }
        SystemFuncType::VcfCutoffLink | SystemFuncType::FxMacroSelect => {
            presets.reconcile_live_special_cases(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigPaths;
    use duotone_shared::{ConfigDocument, LayerId, StateId};
    use std::sync::Arc;

    fn setup() -> (EngineContext, PresetManager, SequencerState) {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(EventRouter::new());
        let ctx = EngineContext::new(router);
        let presets =
            PresetManager::new(ConfigPaths::new(dir.path()), dir.path().join("banks"), ConfigDocument::default());
        (ctx, presets, SequencerState::default())
    }

    #[test]
    fn seq_rec_off_in_step_mode_exits_recording() {
        let (mut ctx, mut presets, mut seq) = setup();
        seq.step.rec_note_on(60);
        seq.step.rec_note_off(60);
        let mut sf = SystemFunc::new(SystemFuncType::SeqRec);
        sf.value = 0.0;
        dispatch_system_func(&sf, &mut ctx, &mut presets, &mut seq);
        assert_eq!(seq.step.state, crate::sequencer::step::StepState::Idle);
    }

    #[test]
    fn seq_rec_on_in_phrase_mode_starts_recording() {
        let (mut ctx, mut presets, mut seq) = setup();
        seq.mode = SeqMode::PhraseLooper;
        let mut sf = SystemFunc::new(SystemFuncType::SeqRec);
        sf.value = 1.0;
        dispatch_system_func(&sf, &mut ctx, &mut presets, &mut seq);
        seq.phrase.record_note(0, 60, 100, crate::sequencer::phrase::PhraseEventKind::NoteOn);
        assert_eq!(seq.phrase.events.len(), 1);
    }

    #[test]
    fn multifn_switch_in_step_mode_inserts_rest_at_index() {
        let (mut ctx, mut presets, mut seq) = setup();
        let mut sf = SystemFunc::new(SystemFuncType::MultifnSwitch);
        sf.num = 0;
        dispatch_system_func(&sf, &mut ctx, &mut presets, &mut seq);
        assert!(seq.step.step(0).is_rest());
    }

    #[test]
    fn vcf_cutoff_link_reconciles_live_special_cases() {
        let (mut ctx, mut presets, mut seq) = setup();
        let saved = ctx
            .registry
            .register(crate::param::Param::new(
                duotone_shared::ParamHandle(0),
                ModuleId::Daw,
                1,
                "daw/vcf/cutoff_link",
                duotone_shared::Scope::PresetCommon,
            ))
            .unwrap()
            .unwrap();
        let button = ctx
            .registry
            .register(crate::param::Param::new(
                duotone_shared::ParamHandle(0),
                ModuleId::System,
                2,
                "system/vcf_cutoff_link_button",
                duotone_shared::Scope::Global,
            ))
            .unwrap()
            .unwrap();
        ctx.registry.get_mut(saved).unwrap().set_value(duotone_shared::LayerMask::BOTH, StateId::A, 1.0);
        let sf = SystemFunc::new(SystemFuncType::VcfCutoffLink);
        dispatch_system_func(&sf, &mut ctx, &mut presets, &mut seq);
        assert_eq!(ctx.registry.get(button).unwrap().value(LayerId::D0, StateId::A), 1.0);
    }
}
