//! Step mode (spec.md §4.6.1): programming, playback, and the 26-hex-char
//! persistence encoding.

use super::{step_attr, TempoNoteValue, MAX_NOTES_PER_STEP, PPQN_CLOCK_PULSES_PER_MIDI_CLOCK, STEP_SEQ_MAX_STEPS};
use crate::error::SequencerError;
use std::collections::BTreeSet;

/// A note the playback driver wants sounded or silenced this pulse (spec.md
/// §4.6.1 Playback).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPlaybackEvent {
    NoteOn(u8),
    NoteOff(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Idle,
    Programming,
    StartPlaying,
    PlayingNoteOn,
    PlayingNoteOff,
    PlayingLastNoteOff,
}

/// One step's recorded content: an attribute byte plus up to
/// `MAX_NOTES_PER_STEP` notes (absolute for the first note of step 0,
/// signed offsets from the step's base note otherwise — spec.md §4.6.1).
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub attr: u8,
    pub notes: [u8; MAX_NOTES_PER_STEP],
}

impl Default for Step {
    fn default() -> Self {
        Self { attr: 0, notes: [step_attr::NOTE_SENTINEL; MAX_NOTES_PER_STEP] }
    }
}

impl Step {
    pub fn is_rest(&self) -> bool {
        self.attr & step_attr::REST != 0
    }

    pub fn is_tie_start(&self) -> bool {
        self.attr & step_attr::START_TIE != 0
    }

    pub fn is_tie_middle(&self) -> bool {
        self.attr & step_attr::TIE != 0
    }

    pub fn is_tie_end(&self) -> bool {
        self.attr & step_attr::END_TIE != 0
    }

    /// Note-off is only sent at END_TIE or at a NORMAL (non-tied) step
    /// (spec.md §4.6.1).
    pub fn sends_note_off(&self) -> bool {
        self.is_tie_end() || (!self.is_tie_start() && !self.is_tie_middle())
    }

    pub fn active_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.notes.iter().copied().filter(|&n| n != step_attr::NOTE_SENTINEL)
    }

    /// Encode as `AA{NN×12}`, 26 hex characters (spec.md §4.6.1).
    pub fn encode(&self) -> String {
        let mut s = format!("{:02X}", self.attr);
        for n in self.notes {
            s.push_str(&format!("{n:02X}"));
        }
        s
    }

    pub fn decode(s: &str) -> Result<Step, SequencerError> {
        if s.len() != 2 + MAX_NOTES_PER_STEP * 2 {
            return Err(SequencerError::MalformedStepString(s.to_string()));
        }
        let byte = |i: usize| -> Result<u8, SequencerError> {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| SequencerError::MalformedStepString(s.to_string()))
        };
        let attr = byte(0)?;
        let mut notes = [step_attr::NOTE_SENTINEL; MAX_NOTES_PER_STEP];
        for (i, note) in notes.iter_mut().enumerate() {
            *note = byte(2 + i * 2)?;
        }
        Ok(Step { attr, notes })
    }
}

pub struct StepSequencer {
    pub state: StepState,
    steps: [Step; STEP_SEQ_MAX_STEPS],
    pub num_selected_steps: usize,
    num_programmed_steps: usize,
    pub current_step: usize,
    base_note: Option<u8>,
    played_notes: BTreeSet<u8>,
    pending_tie_target: Option<usize>,
    pub hold: bool,
    tempo_note: TempoNoteValue,
    use_internal_clock: bool,
    pulses_remaining: u32,
    playback_anchor: Option<u8>,
    sounding_notes: BTreeSet<u8>,
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self {
            state: StepState::Idle,
            steps: [Step::default(); STEP_SEQ_MAX_STEPS],
            num_selected_steps: STEP_SEQ_MAX_STEPS,
            num_programmed_steps: 0,
            current_step: 0,
            base_note: None,
            played_notes: BTreeSet::new(),
            pending_tie_target: None,
            hold: false,
            tempo_note: TempoNoteValue::Sixteenth,
            use_internal_clock: false,
            pulses_remaining: 0,
            playback_anchor: None,
            sounding_notes: BTreeSet::new(),
        }
    }
}

impl StepSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self, index: usize) -> &Step {
        &self.steps[index]
    }

    pub fn active_step_count(&self) -> usize {
        self.num_selected_steps.min(self.num_programmed_steps.max(1))
    }

    /// A note-on during REC appends to the current step (spec.md §4.6.1).
    pub fn rec_note_on(&mut self, note: u8) {
        self.state = StepState::Programming;
        let current = &mut self.steps[self.current_step];
        let base = *self.base_note.get_or_insert(note);
        let encoded = if self.current_step == 0 && self.base_note == Some(note) {
            note
        } else {
            (note as i16 - base as i16) as u8
        };
        if let Some(slot) = current.notes.iter_mut().find(|n| **n == step_attr::NOTE_SENTINEL) {
            *slot = encoded;
        }
        self.played_notes.insert(note);
    }

    /// A step advances once the played-notes set becomes empty (spec.md
    /// §4.6.1).
    pub fn rec_note_off(&mut self, note: u8) {
        self.played_notes.remove(&note);
        if self.played_notes.is_empty() && self.state == StepState::Programming {
            self.num_programmed_steps = (self.current_step + 1).max(self.num_programmed_steps);
            self.advance_rec_step();
        }
    }

    fn advance_rec_step(&mut self) {
        if self.current_step + 1 >= STEP_SEQ_MAX_STEPS {
            return;
        }
        self.current_step += 1;
        self.base_note = None;
    }

    /// A multifunction switch pressed at the current index inserts a REST;
    /// pressed beyond it schedules a tie; pressing the same end index again
    /// cancels the tie (spec.md §4.6.1).
    pub fn multifn_pressed(&mut self, index: usize) {
        if index == self.current_step {
            self.steps[index].attr |= step_attr::REST;
            self.num_programmed_steps = (index + 1).max(self.num_programmed_steps);
            self.advance_rec_step();
            return;
        }
        if self.pending_tie_target == Some(index) {
            self.cancel_tie(index);
            self.pending_tie_target = None;
            return;
        }
        self.materialise_tie(self.current_step, index);
        self.pending_tie_target = Some(index);
        self.num_programmed_steps = (index + 1).max(self.num_programmed_steps);
    }

    fn materialise_tie(&mut self, start: usize, end: usize) {
        if start >= end || end >= STEP_SEQ_MAX_STEPS {
            return;
        }
        self.steps[start].attr |= step_attr::START_TIE;
        for s in &mut self.steps[(start + 1)..end] {
            s.attr |= step_attr::TIE;
        }
        self.steps[end].attr |= step_attr::END_TIE;
    }

    fn cancel_tie(&mut self, end: usize) {
        for step in &mut self.steps[..=end] {
            step.attr &= !(step_attr::START_TIE | step_attr::TIE | step_attr::END_TIE);
        }
    }

    /// Exiting REC resets the multifunction switch bank and the caller
    /// should emit the step-count parameter update (spec.md §4.6.1).
    pub fn exit_rec(&mut self) -> usize {
        self.state = StepState::Idle;
        self.pending_tie_target = None;
        self.current_step = 0;
        self.base_note = None;
        self.played_notes.clear();
        self.num_programmed_steps
    }

    /// Wrap-around: send note-offs for any still-held notes so ties don't
    /// hang (spec.md §4.6.1).
    pub fn notes_held_at_wrap(&self) -> Vec<u8> {
        self.sounding_notes.iter().copied().collect()
    }

    pub fn set_selected_steps(&mut self, count: usize) {
        self.num_selected_steps = count.clamp(1, STEP_SEQ_MAX_STEPS);
    }

    /// Select the tempo-note grid and whether playback is driven by the
    /// internal clock (scaled) or raw incoming MIDI clock pulses (spec.md
    /// §4.6.1 "Tempo grid").
    pub fn configure_tempo(&mut self, note: TempoNoteValue, use_internal_clock: bool) {
        self.tempo_note = note;
        self.use_internal_clock = use_internal_clock;
    }

    /// A key physically held during hold=false playback: gates advancement
    /// and supplies the transposition anchor (spec.md §4.6.1 Playback).
    pub fn key_on(&mut self, note: u8) {
        self.played_notes.insert(note);
        self.playback_anchor = Some(note);
    }

    pub fn key_off(&mut self, note: u8) {
        self.played_notes.remove(&note);
    }

    /// Enter playback at step 0 (spec.md §4.6.1 state diagram).
    pub fn run_on(&mut self) {
        self.state = StepState::StartPlaying;
        self.current_step = 0;
        self.pulses_remaining = 0;
        self.sounding_notes.clear();
    }

    pub fn stop(&mut self) {
        self.state = StepState::Idle;
        self.sounding_notes.clear();
    }

    fn step_pulse_count(&self) -> u32 {
        let tp = self.tempo_note.midi_pulse_count();
        if self.use_internal_clock {
            tp * PPQN_CLOCK_PULSES_PER_MIDI_CLOCK
        } else {
            tp
        }
    }

    /// Translate a recorded note byte into a sounding MIDI note, transposed
    /// against the current playback anchor (the most recently held key when
    /// hold=false, or middle C when free-running with no key held).
    fn playback_note(&self, encoded: u8) -> u8 {
        let anchor = self.playback_anchor.unwrap_or(60) as i16;
        (anchor + encoded as i8 as i16).clamp(0, 127) as u8
    }

    /// Every note recorded at a step, resolved to a sounding pitch. The very
    /// first note ever recorded (step 0, first slot) was stored as an
    /// absolute pitch rather than an anchor-relative offset (`rec_note_on`);
    /// every other slot is transposed against the playback anchor.
    fn resolved_notes(&self, step_index: usize, step: &Step) -> Vec<u8> {
        step.notes
            .iter()
            .enumerate()
            .filter(|(_, &n)| n != step_attr::NOTE_SENTINEL)
            .map(|(slot, &n)| if step_index == 0 && slot == 0 { n } else { self.playback_note(n) })
            .collect()
    }

    fn begins_note(step: &Step) -> bool {
        !step.is_rest() && !step.is_tie_middle() && !step.is_tie_end()
    }

    fn begin_step(&mut self, index: usize) -> Vec<StepPlaybackEvent> {
        let mut out = Vec::new();
        self.current_step = index;
        let step = self.steps[index];
        if Self::begins_note(&step) {
            for played in self.resolved_notes(index, &step) {
                self.sounding_notes.insert(played);
                out.push(StepPlaybackEvent::NoteOn(played));
            }
        }
        self.state = StepState::PlayingNoteOn;
        self.pulses_remaining = self.step_pulse_count() / 2;
        out
    }

    /// Drive one incoming clock pulse through the playback state machine:
    /// `START_PLAYING -> PLAYING_NOTE_ON -> PLAYING_NOTE_OFF -> ... ->
    /// PLAYING_LAST_NOTE_OFF -> START_PLAYING` (spec.md §4.6.1 Playback).
    /// Returns any note-on/note-off events the caller should emit.
    pub fn on_clock_pulse(&mut self) -> Vec<StepPlaybackEvent> {
        if !matches!(
            self.state,
            StepState::StartPlaying
                | StepState::PlayingNoteOn
                | StepState::PlayingNoteOff
                | StepState::PlayingLastNoteOff
        ) {
            return Vec::new();
        }
        if !self.hold && self.played_notes.is_empty() {
            return Vec::new();
        }
        if self.state == StepState::StartPlaying {
            return self.begin_step(self.current_step);
        }
        if self.pulses_remaining > 0 {
            self.pulses_remaining -= 1;
            if self.pulses_remaining > 0 {
                return Vec::new();
            }
        }
        match self.state {
            StepState::PlayingNoteOn => {
                let mut out = Vec::new();
                let step = self.steps[self.current_step];
                if step.sends_note_off() {
                    for played in self.resolved_notes(self.current_step, &step) {
                        self.sounding_notes.remove(&played);
                        out.push(StepPlaybackEvent::NoteOff(played));
                    }
                }
                let is_last = self.current_step + 1 >= self.active_step_count();
                self.state = if is_last { StepState::PlayingLastNoteOff } else { StepState::PlayingNoteOff };
                let tp = self.step_pulse_count();
                self.pulses_remaining = tp - tp / 2;
                out
            }
            StepState::PlayingNoteOff => self.begin_step(self.current_step + 1),
            StepState::PlayingLastNoteOff => {
                let mut out: Vec<StepPlaybackEvent> =
                    self.notes_held_at_wrap().into_iter().map(StepPlaybackEvent::NoteOff).collect();
                self.sounding_notes.clear();
                out.extend(self.begin_step(0));
                out
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_round_trips_through_hex_encoding() {
        let mut step = Step::default();
        step.attr = step_attr::START_TIE;
        step.notes[0] = 60;
        step.notes[1] = 3;
        let encoded = step.encode();
        assert_eq!(encoded.len(), 26);
        let decoded = Step::decode(&encoded).unwrap();
        assert_eq!(decoded.attr, step.attr);
        assert_eq!(decoded.notes, step.notes);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(Step::decode("AB").is_err());
    }

    #[test]
    fn step_advances_when_played_notes_empty() {
        let mut seq = StepSequencer::new();
        seq.rec_note_on(60);
        assert_eq!(seq.current_step, 0);
        seq.rec_note_off(60);
        assert_eq!(seq.current_step, 1);
    }

    #[test]
    fn multifn_press_at_current_step_inserts_rest() {
        let mut seq = StepSequencer::new();
        seq.multifn_pressed(0);
        assert!(seq.step(0).is_rest());
        assert_eq!(seq.current_step, 1);
    }

    #[test]
    fn multifn_press_beyond_current_schedules_tie_then_cancel_reverts() {
        let mut seq = StepSequencer::new();
        seq.multifn_pressed(2);
        assert!(seq.step(0).is_tie_start());
        assert!(seq.step(1).is_tie_middle());
        assert!(seq.step(2).is_tie_end());
        seq.multifn_pressed(2);
        assert!(!seq.step(0).is_tie_start());
        assert!(!seq.step(2).is_tie_end());
    }

    #[test]
    fn sends_note_off_only_at_end_tie_or_normal_step() {
        let mut normal = Step::default();
        assert!(normal.sends_note_off());
        normal.attr = step_attr::TIE;
        assert!(!normal.sends_note_off());
        normal.attr = step_attr::END_TIE;
        assert!(normal.sends_note_off());
    }

    fn two_step_pattern() -> StepSequencer {
        let mut seq = StepSequencer::new();
        seq.rec_note_on(60);
        seq.rec_note_off(60);
        seq.multifn_pressed(1); // rest at step 1, advances to step 2
        seq.exit_rec();
        seq.set_selected_steps(2);
        seq
    }

    #[test]
    fn playback_sounds_note_on_then_note_off_within_a_step() {
        let mut seq = two_step_pattern();
        seq.hold = true;
        seq.configure_tempo(TempoNoteValue::Sixteenth, false);
        seq.run_on();

        // StartPlaying -> begin_step(0): note-on fires immediately.
        let events = seq.on_clock_pulse();
        assert_eq!(events, vec![StepPlaybackEvent::NoteOn(60)]);

        // Half of the 6-pulse step (Sixteenth = 6 midi pulses) elapses
        // silently, then the note-off fires.
        for _ in 0..2 {
            assert!(seq.on_clock_pulse().is_empty());
        }
        let events = seq.on_clock_pulse();
        assert_eq!(events, vec![StepPlaybackEvent::NoteOff(60)]);
    }

    #[test]
    fn rest_step_produces_no_note_events() {
        let mut seq = two_step_pattern();
        seq.hold = true;
        seq.configure_tempo(TempoNoteValue::Sixteenth, false);
        seq.run_on();

        // Drive through all of step 0's pulses (note-on, then note-off).
        for _ in 0..6 {
            seq.on_clock_pulse();
        }
        // Now in step 1, which is a rest: begin_step(1) should emit nothing.
        assert!(seq.step(1).is_rest());
        let mut saw_event = false;
        for _ in 0..6 {
            if !seq.on_clock_pulse().is_empty() {
                saw_event = true;
            }
        }
        assert!(!saw_event);
    }

    #[test]
    fn hold_false_playback_gates_on_held_keys_and_transposes() {
        let mut seq = two_step_pattern();
        seq.hold = false;
        seq.configure_tempo(TempoNoteValue::Sixteenth, false);
        seq.run_on();

        // No key held: playback does not advance at all.
        assert!(seq.on_clock_pulse().is_empty());

        seq.key_on(72);
        let events = seq.on_clock_pulse();
        assert_eq!(events, vec![StepPlaybackEvent::NoteOn(60)]);
    }

    #[test]
    fn wrap_around_flushes_notes_still_sounding() {
        let mut seq = StepSequencer::new();
        seq.steps[0].attr = step_attr::START_TIE;
        seq.steps[0].notes[0] = 60;
        seq.num_programmed_steps = 1;
        seq.set_selected_steps(1);
        seq.hold = true;
        seq.configure_tempo(TempoNoteValue::Sixteenth, false);
        seq.run_on();

        // Tie-start: note-on fires, but the note-off half never fires since
        // a tie doesn't send note-off mid-pattern.
        let events = seq.on_clock_pulse();
        assert_eq!(events, vec![StepPlaybackEvent::NoteOn(60)]);
        for _ in 0..5 {
            seq.on_clock_pulse();
        }
        // Wrapping back to step 0 flushes the still-sounding tie note.
        let events = seq.on_clock_pulse();
        assert!(events.contains(&StepPlaybackEvent::NoteOff(60)));
    }
}
