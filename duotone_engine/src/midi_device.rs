//! MIDI Device Manager (C6): three ingress paths unified into one processing
//! pipeline — the high-priority fast path, the coalescing queue, echo
//! filtering, bank-select/program-change preset loading, and MIDI clock
//! tempo estimation (spec.md §4.7; supplemented in SPEC_FULL.md §4.7).

use crate::context::EngineContext;
use duotone_shared::{
    is_all_notes_off_cc, CoalesceKey, Event, LayerId, LayerMask, MidiEvent, MidiEventKind,
    MidiSource, ModuleId, StateId, CC_BANK_SELECT,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Echo-filter suppression window: entries older than this are dropped on
/// every ingress pass, not by a separate timer (SPEC_FULL §4.7).
pub const ECHO_FILTER_WINDOW: Duration = Duration::from_millis(300);

/// Quantised the same way as `data_conversion.cpp`'s `NUM_ECHO_FILTERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEchoFilter {
    NoFilter,
    EchoFilter,
    FilterAll,
}

impl MidiEchoFilter {
    pub const NUM_ECHO_FILTERS: u32 = 3;
}

/// MIDI channel 0 is "local" for the keyboard (both layers listen) and
/// "omni" for the seq/arp channel filter (SPEC_FULL §4.7).
pub const LOCAL_OR_OMNI_CHANNEL: u8 = 0;

/// Tracks recently-emitted (channel, note) pairs to suppress an echoed
/// note re-entering through another ingress path.
#[derive(Default)]
struct EchoFilter {
    recent: Vec<(u8, u8, Instant)>,
}

impl EchoFilter {
    fn note_on(&mut self, channel: u8, note: u8) {
        self.prune();
        self.recent.push((channel, note, Instant::now()));
    }

    fn prune(&mut self) {
        let now = Instant::now();
        self.recent.retain(|(_, _, t)| now.duration_since(*t) < ECHO_FILTER_WINDOW);
    }

    fn was_recently_sent(&mut self, channel: u8, note: u8) -> bool {
        self.prune();
        self.recent.iter().any(|(c, n, _)| *c == channel && *n == note)
    }
}

/// Estimates tempo from an incoming 24-pulses-per-quarter-note MIDI clock
/// stream (SPEC_FULL §4.6 `NUM_MIDI_CLOCK_PULSES_PER_QTR_NOTE_BEAT = 24`).
pub struct ClockSlave {
    pulses: VecDeque<Instant>,
    capacity: usize,
}

impl Default for ClockSlave {
    fn default() -> Self {
        Self { pulses: VecDeque::new(), capacity: 24 }
    }
}

impl ClockSlave {
    /// Record a pulse; returns an updated BPM estimate once enough pulses
    /// have been observed to average one quarter note.
    pub fn on_pulse(&mut self) -> Option<f32> {
        let now = Instant::now();
        self.pulses.push_back(now);
        if self.pulses.len() > self.capacity {
            self.pulses.pop_front();
        }
        if self.pulses.len() < 2 {
            return None;
        }
        let span = now.duration_since(*self.pulses.front().unwrap());
        let intervals = (self.pulses.len() - 1) as f32;
        let avg_interval = span.as_secs_f32() / intervals;
        if avg_interval <= 0.0 {
            return None;
        }
        // 24 pulses per quarter note.
        Some(60.0 / (avg_interval * 24.0))
    }
}

/// The double-buffered coalescing queue for non-high-priority events
/// (spec.md §4.7). Realised as a single map swapped out on drain, which is
/// observably identical to a push/pop double buffer under one mutex.
#[derive(Default)]
pub struct CoalescingQueue {
    pending: Mutex<HashMap<CoalesceKey, MidiEvent>>,
}

impl CoalescingQueue {
    pub fn push(&self, event: MidiEvent) {
        if let Some(key) = event.coalesce_key() {
            self.pending.lock().insert(key, event);
        }
    }

    /// Drained at ~50Hz by a `clock::Timer` owned by the caller.
    pub fn drain(&self) -> Vec<MidiEvent> {
        std::mem::take(&mut *self.pending.lock()).into_values().collect()
    }
}

pub struct MidiDeviceManager {
    pub keyboard_channel: u8,
    pub seq_arp_channel: u8,
    pub echo_filter_mode: MidiEchoFilter,
    echo_filter: Mutex<EchoFilter>,
    pub clock_slave: Mutex<ClockSlave>,
    pub coalescing: CoalescingQueue,
    pending_bank_index: Mutex<Option<u8>>,
    excluded_usb_clients: Vec<String>,
}

impl Default for MidiDeviceManager {
    fn default() -> Self {
        Self {
            keyboard_channel: LOCAL_OR_OMNI_CHANNEL,
            seq_arp_channel: LOCAL_OR_OMNI_CHANNEL,
            echo_filter_mode: MidiEchoFilter::EchoFilter,
            echo_filter: Mutex::new(EchoFilter::default()),
            clock_slave: Mutex::new(ClockSlave::default()),
            coalescing: CoalescingQueue::default(),
            pending_bank_index: Mutex::new(None),
            excluded_usb_clients: vec!["system".to_string(), "through".to_string(), "engine".to_string()],
        }
    }
}

impl MidiDeviceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_excluded_usb_client(&self, client_name: &str) -> bool {
        self.excluded_usb_clients.iter().any(|c| c == client_name)
    }

    fn should_route_to_sequencer(&self, channel: u8) -> bool {
        (channel == self.seq_arp_channel || self.seq_arp_channel == LOCAL_OR_OMNI_CHANNEL)
            && self.keyboard_channel == LOCAL_OR_OMNI_CHANNEL
    }

    /// Ingest one decoded event from any of the three paths.
    pub fn ingest(&self, ctx: &mut EngineContext, mut event: MidiEvent, bus: &EchoBus) {
        event.kind = event.kind.canonicalise();
        if self.echo_filter_mode == MidiEchoFilter::FilterAll && event.source != MidiSource::Usb {
            return;
        }
        if event.source == MidiSource::Keyboard {
            event.channel =
                if self.keyboard_channel == LOCAL_OR_OMNI_CHANNEL { LOCAL_OR_OMNI_CHANNEL } else { self.keyboard_channel };
        }

        if event.kind == MidiEventKind::Clock {
            if let Some(bpm) = self.clock_slave.lock().on_pulse() {
                log::debug!("midi clock slave estimate: {bpm:.1} bpm");
                if let Some(handle) = ctx.registry.lookup_by_path("global/tempo") {
                    let norm = crate::convert::bpm_to_normalised(bpm.clamp(
                        crate::convert::MIN_TEMPO_BPM,
                        crate::convert::MAX_TEMPO_BPM,
                    ));
                    ctx.write_param_silent(
                        handle,
                        norm,
                        LayerMask::BOTH,
                        StateId::A,
                        ModuleId::Midi,
                        Default::default(),
                    );
                }
            }
        }

        if event.is_high_priority() {
            self.dispatch_high_priority(ctx, event, bus);
            return;
        }

        if self.echo_filter_mode == MidiEchoFilter::EchoFilter
            && matches!(event.kind, MidiEventKind::Cc { .. })
            && self.echo_filter.lock().was_recently_sent(event.channel, 0)
        {
            return;
        }

        if let MidiEventKind::Cc { controller, value } = event.kind {
            self.handle_cc(ctx, event.channel, controller, value);
            return;
        }

        self.coalescing.push(event);
    }

    fn dispatch_high_priority(&self, ctx: &mut EngineContext, event: MidiEvent, bus: &EchoBus) {
        if let MidiEventKind::NoteOff { note, .. } | MidiEventKind::NoteOn { note, .. } = event.kind {
            if event.source != MidiSource::Keyboard
                && self.echo_filter.lock().was_recently_sent(event.channel, note)
            {
                return;
            }
        }

        let to_sequencer = matches!(
            event.kind,
            MidiEventKind::NoteOn { .. } | MidiEventKind::NoteOff { .. }
        ) && self.should_route_to_sequencer(event.channel);

        let target = if to_sequencer { ModuleId::Seq } else { ModuleId::Daw };
        ctx.router.emit_direct(ModuleId::Midi, &Event::Midi(event));
        ctx.router.emit(target, Event::Midi(event));

        if let MidiEventKind::NoteOn { note, .. } = event.kind {
            self.echo_filter.lock().note_on(event.channel, note);
        }

        bus.mirror(event);
    }

    fn handle_cc(&self, ctx: &mut EngineContext, channel: u8, controller: u8, value: u8) {
        if controller == CC_BANK_SELECT {
            *self.pending_bank_index.lock() = Some(value);
            return;
        }
        if is_all_notes_off_cc(controller) {
            if let Some(handle) = ctx.registry.lookup_by_path("system/all_notes_off") {
                ctx.write_param(
                    handle,
                    1.0,
                    LayerMask::BOTH,
                    StateId::A,
                    ModuleId::Midi,
                    Default::default(),
                );
            }
            return;
        }
        let path = format!("midi/cc/{channel}/{controller}");
        if let Some(handle) = ctx.registry.lookup_by_path(&path) {
            let norm = crate::convert::midi_cc_to_normalised(value as f32);
            let mask = if self.keyboard_channel == LOCAL_OR_OMNI_CHANNEL {
                LayerMask::BOTH
            } else {
                LayerMask::single(LayerId::D0)
            };
            ctx.write_param(handle, norm, mask, StateId::A, ModuleId::Midi, Default::default());
        }
    }

    /// Program change with a captured bank-select index: load the preset
    /// whose bank/preset file prefixes match (spec.md §4.7).
    pub fn on_program_change(&self, program: u8) -> Option<(u8, u8)> {
        self.pending_bank_index.lock().take().map(|bank| (bank, program))
    }
}

/// Abstracts "re-emit on the external serial port" and "mirror to USB
/// subscribers for events not received via USB" — the concrete transports
/// (`serialport`/`midir`) live in `duotone_host`'s wiring, not here.
pub trait EchoBus {
    fn mirror(&self, event: MidiEvent);
}

pub struct NullEchoBus;
impl EchoBus for NullEchoBus {
    fn mirror(&self, _event: MidiEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::EventRouter;
    use std::sync::Arc;
    use std::thread;

    fn ctx() -> EngineContext {
        EngineContext::new(Arc::new(EventRouter::new()))
    }

    #[test]
    fn zero_velocity_note_on_is_canonicalised_to_note_off() {
        let mgr = MidiDeviceManager::new();
        let mut c = ctx();
        let listener = c.router.subscribe(ModuleId::Seq, duotone_shared::EventKind::Midi);
        mgr.ingest(
            &mut c,
            MidiEvent::new(MidiSource::Usb, 1, MidiEventKind::NoteOn { note: 60, velocity: 0 }),
            &NullEchoBus,
        );
        match listener.try_recv() {
            Some(Event::Midi(e)) => assert!(matches!(e.kind, MidiEventKind::NoteOff { .. })),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn bank_select_then_program_change_yields_pending_pair() {
        let mgr = MidiDeviceManager::new();
        let mut c = ctx();
        mgr.ingest(&mut c, MidiEvent::new(MidiSource::Usb, 0, MidiEventKind::Cc { controller: 0, value: 3 }), &NullEchoBus);
        assert_eq!(mgr.on_program_change(7), Some((3, 7)));
        // second call has nothing pending
        assert_eq!(mgr.on_program_change(7), None);
    }

    #[test]
    fn clock_slave_estimates_tempo_from_pulse_spacing() {
        let mut slave = ClockSlave::default();
        for _ in 0..25 {
            slave.on_pulse();
            thread::sleep(Duration::from_millis(2));
        }
        let bpm = slave.on_pulse().unwrap();
        assert!(bpm > 0.0);
    }

    #[test]
    fn echo_filter_suppresses_repeated_note_within_window() {
        let mut f = EchoFilter::default();
        f.note_on(1, 60);
        assert!(f.was_recently_sent(1, 60));
    }

    #[test]
    fn notes_route_to_sequencer_only_when_channel_matches_and_keyboard_is_local() {
        let mut mgr = MidiDeviceManager::new();
        mgr.seq_arp_channel = 3;
        mgr.keyboard_channel = LOCAL_OR_OMNI_CHANNEL;
        assert!(mgr.should_route_to_sequencer(3));
        assert!(!mgr.should_route_to_sequencer(4));

        mgr.keyboard_channel = 2;
        assert!(!mgr.should_route_to_sequencer(3));
    }

    #[test]
    fn notes_route_to_daw_when_keyboard_channel_is_not_local() {
        let mut mgr = MidiDeviceManager::new();
        let mut c = ctx();
        let seq_listener = c.router.subscribe(ModuleId::Seq, duotone_shared::EventKind::Midi);
        let daw_listener = c.router.subscribe(ModuleId::Daw, duotone_shared::EventKind::Midi);
        mgr.keyboard_channel = 5;
        mgr.seq_arp_channel = LOCAL_OR_OMNI_CHANNEL;
        mgr.ingest(
            &mut c,
            MidiEvent::new(MidiSource::Usb, 5, MidiEventKind::NoteOn { note: 60, velocity: 100 }),
            &NullEchoBus,
        );
        assert!(seq_listener.try_recv().is_none());
        assert!(matches!(daw_listener.try_recv(), Some(Event::Midi(_))));
    }
}
