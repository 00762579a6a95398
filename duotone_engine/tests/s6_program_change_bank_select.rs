//! spec.md §8 S6 — Program change with bank select.
//!
//! Inject CC0 (bank select) value 2, then ProgramChange value 5. The pending
//! bank/program pair is captured as the raw wire values `(2, 5)`; loading a
//! preset from a wire pair uses 1-based folder/file indices, so the preset
//! actually loaded is bank-folder index 3, preset index 6.

use duotone_engine::config::ConfigPaths;
use duotone_engine::context::EngineContext;
use duotone_engine::midi_device::{MidiDeviceManager, NullEchoBus};
use duotone_engine::preset::PresetManager;
use duotone_engine::router::EventRouter;
use duotone_shared::{ConfigDocument, MidiEvent, MidiEventKind, MidiSource, PresetDocument};
use std::sync::Arc;

#[test]
fn bank_select_and_program_change_resolve_to_one_based_preset() {
    let dir = tempfile::tempdir().unwrap();
    let banks_root = dir.path().join("banks");
    let preset_dir = banks_root.join("003_LEAD");
    std::fs::create_dir_all(&preset_dir).unwrap();
    std::fs::write(
        preset_dir.join("006_SCREAMER.json"),
        serde_json::to_string_pretty(&PresetDocument {
            version: "1.0".to_string(),
            revision: 0,
            params: Vec::new(),
            layers: vec![
                duotone_shared::LayerDocument {
                    layer_id: "d0".to_string(),
                    params: Vec::new(),
                    patch: duotone_shared::PatchDocument { name: "SCREAMER".to_string(), ..Default::default() },
                    voice_count: 8,
                },
                duotone_shared::LayerDocument {
                    layer_id: "d1".to_string(),
                    params: Vec::new(),
                    patch: duotone_shared::PatchDocument { name: "SCREAMER".to_string(), ..Default::default() },
                    voice_count: 8,
                },
            ],
        })
        .unwrap(),
    )
    .unwrap();

    let router = Arc::new(EventRouter::new());
    let mut ctx = EngineContext::new(router);
    let mgr = MidiDeviceManager::new();

    mgr.ingest(
        &mut ctx,
        MidiEvent::new(MidiSource::Usb, 0, MidiEventKind::Cc { controller: 0, value: 2 }),
        &NullEchoBus,
    );
    let (raw_bank, raw_program) = mgr.on_program_change(5).expect("bank select was pending");
    assert_eq!((raw_bank, raw_program), (2, 5));

    let mut presets = PresetManager::new(ConfigPaths::new(dir.path()), &banks_root, ConfigDocument::default());
    let preset_id = presets
        .resolve_by_index(raw_bank as u32 + 1, raw_program as u32 + 1)
        .expect("bank 3 / preset 6 should resolve from the on-disk layout");
    assert_eq!(preset_id.bank_index, 3);
    assert_eq!(preset_id.preset_index, 6);

    presets.load_preset(&mut ctx, preset_id).unwrap();
    assert_eq!(presets.document.layer("d0").unwrap().patch.name, "SCREAMER");
}
