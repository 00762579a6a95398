//! Decoded MIDI event types shared between the device manager, the
//! sequencer, and the event router's `Midi` payload.

use serde::{Deserialize, Serialize};

/// Which physical ingress path produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MidiSource {
    /// Internal keyboard UART (1 MBaud serial).
    Keyboard,
    /// USB sequencer/ALSA-style client subscription.
    Usb,
    /// External 5-pin DIN serial (31250 baud).
    Din,
}

/// A decoded MIDI event, source-tagged and timestamped for echo filtering
/// and MIDI-clock tempo estimation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MidiEvent {
    pub source: MidiSource,
    pub channel: u8,
    pub kind: MidiEventKind,
}

impl MidiEvent {
    pub fn new(source: MidiSource, channel: u8, kind: MidiEventKind) -> Self {
        Self { source, channel, kind }
    }

    /// High-priority events bypass the coalescing queue and are dispatched
    /// synchronously (spec.md §4.7, Glossary "High-priority MIDI event").
    pub fn is_high_priority(&self) -> bool {
        matches!(
            self.kind,
            MidiEventKind::NoteOn { .. }
                | MidiEventKind::NoteOff { .. }
                | MidiEventKind::Clock
                | MidiEventKind::Start
                | MidiEventKind::Stop
        )
    }

    /// Coalescing key: events with the same key and non-`None` result
    /// overwrite rather than append in the double-buffered queue.
    pub fn coalesce_key(&self) -> Option<CoalesceKey> {
        match self.kind {
            MidiEventKind::PitchBend { .. } => Some(CoalesceKey::PitchBend(self.channel)),
            MidiEventKind::ChannelPressure { .. } => {
                Some(CoalesceKey::ChannelPressure(self.channel))
            }
            MidiEventKind::Cc { controller, .. } => {
                Some(CoalesceKey::Cc(self.channel, controller))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoalesceKey {
    PitchBend(u8),
    ChannelPressure(u8),
    Cc(u8, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MidiEventKind {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    PolyKeyPressure { note: u8, value: u8 },
    Cc { controller: u8, value: u8 },
    PitchBend { value: i16 },
    ChannelPressure { value: u8 },
    ProgramChange { program: u8 },
    Clock,
    Start,
    Stop,
}

impl MidiEventKind {
    /// Zero-velocity note-on is canonicalised to note-off (spec.md §4.7).
    pub fn canonicalise(self) -> Self {
        match self {
            MidiEventKind::NoteOn { note, velocity: 0 } => {
                MidiEventKind::NoteOff { note, velocity: 0 }
            }
            other => other,
        }
    }
}

pub const MIDI_PITCH_BEND_MIN_VALUE: i32 = -8192;
pub const MIDI_PITCH_BEND_MAX_VALUE: i32 = 8191;
pub const MIDI_CHANPRESS_MIN_VALUE: i32 = 0;
pub const MIDI_CHANPRESS_MAX_VALUE: i32 = 127;
pub const MIDI_CC_MIN_VALUE: i32 = 0;
pub const MIDI_CC_MAX_VALUE: i32 = 127;

/// All-notes-off family, CC 123-127 (spec.md §4.7).
pub fn is_all_notes_off_cc(controller: u8) -> bool {
    (123..=127).contains(&controller)
}

/// Bank-select controller number.
pub const CC_BANK_SELECT: u8 = 0;
