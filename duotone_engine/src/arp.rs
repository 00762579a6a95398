//! Arpeggiator interface (C8): interface-only, per spec.md §4.8 — a full
//! arpeggiator is a non-goal. This gives the sequencer's MIDI entry point a
//! concrete type to call into.

/// Direction modes (`arp_manager.h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpDirMode {
    Up,
    Down,
    UpDown,
    Random,
    Assigned,
}

impl ArpDirMode {
    pub const NUM_DIR_MODES: u32 = 5;
}

/// Sink the sequencer drives notes and clock pulses into.
pub trait ArpSink {
    fn note_on(&mut self, note: u8, velocity: u8);
    fn note_off(&mut self, note: u8);
    fn pulse(&mut self);
}

/// No-op sink used wherever an arpeggiator isn't wired up.
#[derive(Default)]
pub struct NullArp;

impl ArpSink for NullArp {
    fn note_on(&mut self, _note: u8, _velocity: u8) {}
    fn note_off(&mut self, _note: u8) {}
    fn pulse(&mut self) {}
}
