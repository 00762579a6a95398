//! Headless driver binary: brings up the control engine against stub
//! DAW/GUI/surface collaborators and runs it long enough to exercise the
//! startup sequence and a handful of MIDI events, for manual and CI
//! smoke-testing (grounded on the teacher's `bin/headless_test`).

use duotone_engine::config::{self, ConfigPaths};
use duotone_engine::context::EngineContext;
use duotone_engine::daw_bridge::{DawBridge, DawBridgeDriver};
use duotone_engine::dispatch::{self, SequencerState};
use duotone_engine::gui_bridge::GuiBridge;
use duotone_engine::midi_device::{MidiDeviceManager, NullEchoBus};
use duotone_engine::param::Param;
use duotone_engine::preset::PresetManager;
use duotone_engine::router::EventRouter;
use duotone_engine::sequencer::{PhraseEventKind, SeqMode};
use duotone_engine::surface_bridge::SurfaceBridge;
use duotone_shared::{Event, EventKind, MidiEvent, MidiEventKind, MidiSource, ModuleId, Scope};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// No-op audio engine stand-in: the real DSP engine lives outside this crate.
struct StubDaw;

impl DawBridge for StubDaw {
    fn set_param(&mut self, handle: duotone_shared::ParamHandle, value: f32) {
        log::debug!("daw <- {handle} = {value:.3}");
    }
}

/// Registers the handful of parameters this driver exercises. A production
/// build of the firmware defines its full parameter set in code; this is
/// a representative slice covering every scope the fanout algorithm and
/// file manager need to demonstrate.
fn register_demo_params(ctx: &mut EngineContext) {
    let mut register = |module, id, path: &str, scope| {
        ctx.registry.register(Param::new(duotone_shared::ParamHandle(0), module, id, path, scope))
    };

    register(ModuleId::System, 1, "global/tempo", Scope::Global).unwrap();
    register(ModuleId::System, 2, "system/all_notes_off", Scope::Global).unwrap();
    register(ModuleId::Daw, 10, "daw/vcf/cutoff_link", Scope::PresetCommon).unwrap();
    register(ModuleId::System, 11, "system/vcf_cutoff_link_button", Scope::Global).unwrap();
    register(ModuleId::Daw, 12, "daw/lfo1/tempo_sync", Scope::PatchCommon).unwrap();
    register(ModuleId::Daw, 13, "daw/lfo1/rate_state", Scope::PatchState).unwrap();
    register(ModuleId::Daw, 14, "daw/vcf/resonance_mode", Scope::PatchCommon).unwrap();
    register(ModuleId::Daw, 15, "daw/osc1/wave", Scope::PatchCommon).unwrap();
    register(ModuleId::Daw, 16, "daw/vcf/lp_slope", Scope::PatchCommon).unwrap();
    register(ModuleId::System, 17, "system/vcf_lp_slope_button", Scope::Global).unwrap();
    register(ModuleId::Daw, 18, "daw/fx/macro_select", Scope::PresetCommon).unwrap();
    register(ModuleId::Daw, 19, "daw/fx/macro_level", Scope::PatchState).unwrap();
    register(ModuleId::System, 21, "system/fx_macro_level_button", Scope::PatchState).unwrap();
    register(ModuleId::Midi, 22, "midi/cc/0/74", Scope::MidiShim).unwrap();
    if let Some(handle) = ctx.registry.lookup_by_path("midi/cc/0/74") {
        let p = ctx.registry.get_mut(handle).unwrap();
        p.midi_shim_channel = 0;
        p.midi_shim_cc = Some(74);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    log::info!("duotone_host starting");

    let data_dir = std::env::args().nth(1).unwrap_or_else(|| "./runtime_data".to_string());
    let paths = ConfigPaths::new(data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;

    // Steps 1-2: global config, then the blacklist (applied before any
    // parameter registration, spec.md §4.5).
    let config_doc = config::load_or_init_config(&paths)?;
    let blacklist = config::load_blacklist(&paths)?;

    let router = Arc::new(EventRouter::new());
    let mut ctx = EngineContext::new(router.clone());
    config::apply_blacklist(&mut ctx, &blacklist);

    register_demo_params(&mut ctx);

    // Steps 3-7: param map, attributes, lists, global values, haptic modes.
    let param_map = config::load_param_map(&paths)?;
    config::apply_param_map(&mut ctx, &param_map);

    let param_attrs = config::load_param_attrs(&paths)?;
    config::apply_param_attrs(&mut ctx, &param_attrs);

    let param_list = config::load_param_list(&paths)?;
    config::apply_param_list(&mut ctx, &param_list);

    let global_values = config::load_global_values(&paths)?;
    config::apply_global_values(&mut ctx, &global_values);

    if let Some(haptic) = config::load_haptic_modes(&paths)? {
        log::info!(
            "loaded {} haptic mode(s), default knob/switch: {}/{}",
            haptic.haptic_modes.len(),
            haptic.default_knob_haptic_mode,
            haptic.default_switch_haptic_mode
        );
    }

    // Step 8: load the startup preset via the shadow-save protocol.
    let mut presets = PresetManager::new(paths.clone(), format!("{data_dir}/banks"), config_doc);
    match presets.load_startup() {
        Ok(()) => log::info!("startup preset loaded: {}", presets.config.preset_id),
        Err(e) => log::warn!("no startup preset available ({e}), running with the embedded INIT patch"),
    }

    let mut daw = StubDaw;
    let mut gui = GuiBridge::new(32);
    let mut surface = SurfaceBridge::new(8);
    let midi = MidiDeviceManager::new();
    let mut seq = SequencerState::default();

    // SystemFunc has no fixed producer (it rides whichever module's write
    // triggered the fanout), so every module is subscribed.
    let sys_func_listeners = dispatch::subscribe_system_funcs(&router);
    let seq_midi = router.subscribe(ModuleId::Seq, EventKind::Midi);

    {
        let mut driver = DawBridgeDriver { ctx: &mut ctx, daw: &mut daw };
        if let Some(handle) = driver.ctx.registry.lookup_by_path("global/tempo") {
            driver.set_param(handle, 0.5);
        }
    }
    gui.send(duotone_shared::GuiMsg::HomeScreenRefresh);
    surface.handle(&duotone_shared::SfcFunc::new(duotone_shared::SfcFuncType::ResetMultifnSwitches));

    log::info!("ingesting a short demo MIDI phrase");
    let demo_notes = [60u8, 64, 67];
    for note in demo_notes {
        midi.ingest(
            &mut ctx,
            MidiEvent::new(MidiSource::Usb, 0, MidiEventKind::NoteOn { note, velocity: 100 }),
            &NullEchoBus,
        );
        thread::sleep(Duration::from_millis(20));
        midi.ingest(
            &mut ctx,
            MidiEvent::new(MidiSource::Usb, 0, MidiEventKind::NoteOff { note, velocity: 0 }),
            &NullEchoBus,
        );
    }

    // Notes on the seq/arp channel land on `ModuleId::Seq` rather than the
    // DAW bridge (`midi_device::should_route_to_sequencer`); feed them into
    // whichever sequencer mode is live.
    for event in seq_midi.iter_available() {
        let Event::Midi(midi_event) = event else { continue };
        match (seq.mode, midi_event.kind) {
            (SeqMode::Step, MidiEventKind::NoteOn { note, .. }) => seq.step.key_on(note),
            (SeqMode::Step, MidiEventKind::NoteOff { note, .. }) => seq.step.key_off(note),
            (SeqMode::PhraseLooper, MidiEventKind::NoteOn { note, velocity }) => {
                seq.phrase.record_note(midi_event.channel, note, velocity, PhraseEventKind::NoteOn)
            }
            (SeqMode::PhraseLooper, MidiEventKind::NoteOff { note, velocity }) => {
                seq.phrase.record_note(midi_event.channel, note, velocity, PhraseEventKind::NoteOff)
            }
            _ => {}
        }
    }

    log::info!("feeding one MIDI-clock-derived tempo pulse into the live sequencer");
    for event in seq.step.on_clock_pulse() {
        log::debug!("step sequencer <- {event:?}");
    }
    if let Some(click) = seq.phrase.advance_tick() {
        log::debug!("metronome <- {click:?}");
    }

    log::info!("demonstrating a program-change bank/preset load");
    midi.ingest(
        &mut ctx,
        MidiEvent::new(MidiSource::Usb, 0, MidiEventKind::Cc { controller: duotone_shared::CC_BANK_SELECT, value: 0 }),
        &NullEchoBus,
    );
    midi.ingest(
        &mut ctx,
        MidiEvent::new(MidiSource::Usb, 0, MidiEventKind::ProgramChange { program: 0 }),
        &NullEchoBus,
    );
    for event in midi.coalescing.drain() {
        let MidiEventKind::ProgramChange { program } = event.kind else { continue };
        let Some((bank, preset)) = midi.on_program_change(program) else { continue };
        let Some(preset_id) = presets.resolve_by_index(bank as u32, preset as u32) else { continue };
        match presets.load_preset(&mut ctx, preset_id) {
            Ok(()) => log::info!("program change loaded {bank}/{preset}"),
            Err(e) => log::warn!("program change {bank}/{preset} failed to load: {e}"),
        }
    }

    for listener in &sys_func_listeners {
        for event in listener.iter_available() {
            if let Event::SystemFunc(sf) = event {
                dispatch::dispatch_system_func(&sf, &mut ctx, &mut presets, &mut seq);
            }
        }
    }

    for msg in gui.drain() {
        log::debug!("gui <- {msg:?}");
    }

    log::info!("running for a short settle period before shutdown");
    thread::sleep(Duration::from_millis(200));

    presets.save_shadow().ok();
    log::info!("duotone_host exiting cleanly");
    Ok(())
}
