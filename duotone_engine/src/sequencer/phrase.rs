//! Phrase looper mode (spec.md §4.6.2): 96 PPQN tick recording, quantisation,
//! overdub, end-of-phrase rounding, and chunked persistence.

use super::PHRASE_PPQN;
use crate::error::SequencerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseState {
    Idle,
    StartPlaying,
    Playing,
}

/// Quantisation grid (spec.md §4.6.2): `Tq` in internal ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseQuantisation {
    None,
    Quarter,
    QuarterTriplet,
    Eighth,
    EighthTriplet,
    Sixteenth,
    SixteenthTriplet,
    ThirtySecond,
    ThirtySecondTriplet,
}

impl PhraseQuantisation {
    pub const NUM_VALUES: u32 = 9;

    pub fn tq(self) -> Option<u32> {
        match self {
            PhraseQuantisation::None => None,
            PhraseQuantisation::Quarter => Some(PHRASE_PPQN),
            PhraseQuantisation::QuarterTriplet => Some(PHRASE_PPQN * 2 / 3),
            PhraseQuantisation::Eighth => Some(PHRASE_PPQN / 2),
            PhraseQuantisation::EighthTriplet => Some(PHRASE_PPQN / 3),
            PhraseQuantisation::Sixteenth => Some(PHRASE_PPQN / 4),
            PhraseQuantisation::SixteenthTriplet => Some(PHRASE_PPQN / 6),
            PhraseQuantisation::ThirtySecond => Some(PHRASE_PPQN / 8),
            PhraseQuantisation::ThirtySecondTriplet => Some(PHRASE_PPQN / 12),
        }
    }
}

/// Quantised tick = `round_nearest(ticks / Tq) * Tq + 1`, except
/// `round_up=true` always rounds up (spec.md §4.6.2).
pub fn quantise_tick(ticks: u32, q: PhraseQuantisation, round_up: bool) -> u32 {
    let Some(tq) = q.tq() else { return ticks };
    let t = ticks as f32 / tq as f32;
    let n = if round_up { t.ceil() } else { t.round() };
    (n as u32) * tq + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatsPerBar {
    None,
    Two,
    Three,
    Four,
    Five,
}

impl BeatsPerBar {
    pub const NUM_VALUES: u32 = 5;

    pub fn beats(self) -> Option<u32> {
        match self {
            BeatsPerBar::None => None,
            BeatsPerBar::Two => Some(2),
            BeatsPerBar::Three => Some(3),
            BeatsPerBar::Four => Some(4),
            BeatsPerBar::Five => Some(5),
        }
    }
}

/// Whether a recorded entry is a note-on or a note-off (spec.md §4.6.2 event
/// list). Distinguished on the wire by [`NOTE_OFF_FLAG`] in the channel byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseEventKind {
    NoteOn,
    NoteOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseEvent {
    pub tick: u32,
    pub quantised_tick: u32,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub kind: PhraseEventKind,
}

/// End-of-phrase sentinel channel value (spec.md §4.6.2).
pub const CHUNK_END_SENTINEL_CHANNEL: u8 = 0xFE;
/// Events per chunk parameter (spec.md §4.6.2).
pub const EVENTS_PER_CHUNK: usize = 10;
/// High bit of the encoded channel byte marks a note-off entry. MIDI channels
/// only ever occupy the low nibble, so this never collides with a real
/// channel; it does collide with [`CHUNK_END_SENTINEL_CHANNEL`]'s high bit,
/// so the sentinel must be checked before the flag is stripped.
const NOTE_OFF_FLAG: u8 = 0x80;

fn encode_entry(tick: u32, channel: u8, note: u8, velocity: u8, kind: PhraseEventKind) -> String {
    let chan_byte = if kind == PhraseEventKind::NoteOff { channel | NOTE_OFF_FLAG } else { channel };
    format!("{tick:08X}{chan_byte:02X}{note:02X}{velocity:02X}")
}

fn decode_entry(s: &str) -> Result<(u32, u8, u8, u8), SequencerError> {
    if s.len() != 14 {
        return Err(SequencerError::MalformedChunk(s.to_string()));
    }
    let err = || SequencerError::MalformedChunk(s.to_string());
    let tick = u32::from_str_radix(&s[0..8], 16).map_err(|_| err())?;
    let chan_byte = u8::from_str_radix(&s[8..10], 16).map_err(|_| err())?;
    let note = u8::from_str_radix(&s[10..12], 16).map_err(|_| err())?;
    let velocity = u8::from_str_radix(&s[12..14], 16).map_err(|_| err())?;
    Ok((tick, chan_byte, note, velocity))
}

/// Encode up to `EVENTS_PER_CHUNK` events, followed by an end-of-phrase
/// sentinel if `end_tick` falls within this chunk's slice.
pub fn encode_chunk(events: &[PhraseEvent], end_tick: Option<u32>) -> String {
    let mut s = String::new();
    for e in events.iter().take(EVENTS_PER_CHUNK) {
        s.push_str(&encode_entry(e.quantised_tick, e.channel, e.note, e.velocity, e.kind));
    }
    if let Some(end) = end_tick {
        s.push_str(&encode_entry(end, CHUNK_END_SENTINEL_CHANNEL, 0, 0, PhraseEventKind::NoteOn));
    }
    s
}

pub fn decode_chunk(s: &str) -> Result<(Vec<PhraseEvent>, Option<u32>), SequencerError> {
    let mut events = Vec::new();
    let mut end_tick = None;
    for chunk in s.as_bytes().chunks(14) {
        let entry = std::str::from_utf8(chunk).map_err(|_| SequencerError::MalformedChunk(s.to_string()))?;
        if entry.len() != 14 {
            break;
        }
        let (tick, chan_byte, note, velocity) = decode_entry(entry)?;
        if chan_byte == CHUNK_END_SENTINEL_CHANNEL {
            end_tick = Some(tick);
            break;
        }
        let kind = if chan_byte & NOTE_OFF_FLAG != 0 { PhraseEventKind::NoteOff } else { PhraseEventKind::NoteOn };
        let channel = chan_byte & !NOTE_OFF_FLAG;
        events.push(PhraseEvent { tick, quantised_tick: tick, channel, note, velocity, kind });
    }
    Ok((events, end_tick))
}

pub struct PhraseLooper {
    pub state: PhraseState,
    pub ticks: u32,
    pub events: Vec<PhraseEvent>,
    pub end_tick: Option<u32>,
    pub quantisation: PhraseQuantisation,
    pub beats_per_bar: BeatsPerBar,
    rec_active: bool,
    run_active: bool,
    overdub_started: bool,
    seen_first_note: bool,
    metronome_pulse_count: u32,
    metronome_beat_index: u32,
}

impl Default for PhraseLooper {
    fn default() -> Self {
        Self {
            state: PhraseState::Idle,
            ticks: 1,
            events: Vec::new(),
            end_tick: None,
            quantisation: PhraseQuantisation::Sixteenth,
            beats_per_bar: BeatsPerBar::Four,
            rec_active: false,
            run_active: false,
            overdub_started: false,
            seen_first_note: false,
            metronome_pulse_count: 0,
            metronome_beat_index: 0,
        }
    }
}

/// A metronome click emitted while the initial take is being recorded
/// (spec.md §4.6.2 Metronome) — REC active, RUN not yet started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetronomeClick {
    Beat,
    Downbeat,
}

impl PhraseLooper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rec_on(&mut self) {
        self.rec_active = true;
        if self.run_active {
            self.overdub_started = true;
        } else {
            self.seen_first_note = false;
            self.metronome_pulse_count = 0;
            self.metronome_beat_index = 0;
        }
    }

    pub fn rec_off(&mut self) {
        self.rec_active = false;
    }

    pub fn run_on(&mut self) {
        self.run_active = true;
        self.state = PhraseState::StartPlaying;
    }

    /// One internal tick advances (either from the scaled MIDI clock or the
    /// internal clock, spec.md §4.6.2). Returns a metronome click while the
    /// initial take is being recorded (REC active, RUN not yet started).
    pub fn advance_tick(&mut self) -> Option<MetronomeClick> {
        if !self.rec_active && !self.run_active {
            return None;
        }
        self.ticks += 1;
        if let Some(end) = self.end_tick {
            if self.ticks > end {
                self.ticks = 1;
                self.state = PhraseState::Playing;
                if self.overdub_started {
                    self.events.sort_by_key(|e| e.quantised_tick);
                    self.overdub_started = false;
                }
            }
        }
        if !self.rec_active || self.run_active {
            return None;
        }
        self.metronome_pulse_count += 1;
        if self.metronome_pulse_count < PHRASE_PPQN {
            return None;
        }
        self.metronome_pulse_count = 0;
        match self.beats_per_bar.beats() {
            Some(beats) => {
                let at_downbeat = self.metronome_beat_index == 0;
                self.metronome_beat_index = (self.metronome_beat_index + 1) % beats;
                Some(if at_downbeat { MetronomeClick::Downbeat } else { MetronomeClick::Beat })
            }
            None => Some(MetronomeClick::Beat),
        }
    }

    /// The first note-on at or after REC-on resets `ticks := 1` (spec.md
    /// §4.6.2).
    pub fn record_note(&mut self, channel: u8, note: u8, velocity: u8, kind: PhraseEventKind) {
        if !self.rec_active {
            return;
        }
        if !self.seen_first_note {
            self.ticks = 1;
            self.seen_first_note = true;
        }
        let quantised = quantise_tick(self.ticks, self.quantisation, false);
        self.events.push(PhraseEvent { tick: self.ticks, quantised_tick: quantised, channel, note, velocity, kind });
    }

    /// Note-ons still sounding at `stop_tick` get a synthesized note-off
    /// there (spec.md §4.6.2 end-of-phrase rounding needs a note-off tick
    /// even when the player never released the key before stopping REC).
    /// Returns the latest note-off tick across both recorded and synthesized
    /// events, for use in the rounding formula below.
    fn synthesize_missing_note_offs(&mut self, stop_tick: u32) -> Option<u32> {
        let mut held: std::collections::BTreeSet<(u8, u8)> = std::collections::BTreeSet::new();
        let mut last_off = None;
        for e in &self.events {
            match e.kind {
                PhraseEventKind::NoteOn => {
                    held.insert((e.channel, e.note));
                }
                PhraseEventKind::NoteOff => {
                    held.remove(&(e.channel, e.note));
                    last_off = Some(last_off.map_or(e.tick, |t: u32| t.max(e.tick)));
                }
            }
        }
        for (channel, note) in held {
            self.events.push(PhraseEvent {
                tick: stop_tick,
                quantised_tick: stop_tick,
                channel,
                note,
                velocity: 0,
                kind: PhraseEventKind::NoteOff,
            });
            last_off = Some(last_off.map_or(stop_tick, |t: u32| t.max(stop_tick)));
        }
        last_off
    }

    /// End-of-phrase rounding (spec.md §4.6.2).
    pub fn stop_rec_and_round(&mut self, stop_tick: u32) {
        self.rec_active = false;
        let last_note_off_tick = self.synthesize_missing_note_offs(stop_tick);
        let end = match self.beats_per_bar.beats() {
            None => {
                let rounded_note_off = last_note_off_tick
                    .map(|t| round_up_to_beat(t))
                    .unwrap_or(0);
                let rounded_stop = round_to_nearest_beat(stop_tick);
                rounded_note_off.max(rounded_stop)
            }
            Some(beats) => {
                let bar_ticks = beats * PHRASE_PPQN;
                let mut end = round_up_to_multiple(stop_tick, bar_ticks);
                if let Some(note_off) = last_note_off_tick {
                    let bar_start = end.saturating_sub(bar_ticks);
                    let midpoint = bar_start + bar_ticks / 2;
                    if note_off > midpoint {
                        end += bar_ticks;
                    }
                }
                end
            }
        };
        self.end_tick = Some(end.max(1));
        for e in &mut self.events {
            if e.quantised_tick > end {
                e.quantised_tick = end;
            }
        }
    }

    /// SEQ_RESET: walk chunks (represented here as the in-memory event
    /// list) and clear them (spec.md §4.6.2).
    pub fn reset(&mut self) {
        self.events.clear();
        self.end_tick = None;
        self.state = PhraseState::Idle;
        self.run_active = false;
        self.rec_active = false;
        self.metronome_pulse_count = 0;
        self.metronome_beat_index = 0;
    }
}

fn round_up_to_beat(tick: u32) -> u32 {
    round_up_to_multiple(tick, PHRASE_PPQN)
}

fn round_to_nearest_beat(tick: u32) -> u32 {
    let beats = (tick as f32 / PHRASE_PPQN as f32).round() as u32;
    beats * PHRASE_PPQN
}

fn round_up_to_multiple(tick: u32, step: u32) -> u32 {
    if step == 0 {
        return tick;
    }
    ((tick + step - 1) / step) * step
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_round_trips_with_end_sentinel() {
        let events = vec![
            PhraseEvent { tick: 1, quantised_tick: 1, channel: 0, note: 60, velocity: 100, kind: PhraseEventKind::NoteOn },
            PhraseEvent { tick: 96, quantised_tick: 97, channel: 0, note: 64, velocity: 90, kind: PhraseEventKind::NoteOff },
        ];
        let encoded = encode_chunk(&events, Some(385));
        let (decoded, end) = decode_chunk(&encoded).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].quantised_tick, 1);
        assert_eq!(decoded[0].kind, PhraseEventKind::NoteOn);
        assert_eq!(decoded[1].quantised_tick, 97);
        assert_eq!(decoded[1].channel, 0);
        assert_eq!(decoded[1].kind, PhraseEventKind::NoteOff);
        assert_eq!(end, Some(385));
    }

    #[test]
    fn quantise_rounds_nearest_unless_forced_up() {
        // Tq = 24 (sixteenth at 96ppqn).
        assert_eq!(quantise_tick(13, PhraseQuantisation::Sixteenth, false), 25);
        assert_eq!(quantise_tick(10, PhraseQuantisation::Sixteenth, true), 25);
    }

    #[test]
    fn s3_phrase_looper_overdub_scenario() {
        // spec.md S3: 2 bars at 120bpm 4/4, quarter-note melody at
        // {1, 96, 192, 288, 385}; stop record; end = 385.
        let mut looper = PhraseLooper::new();
        looper.beats_per_bar = BeatsPerBar::Four;
        looper.quantisation = PhraseQuantisation::None;
        looper.rec_on();
        for tick in [1, 96, 192, 288] {
            looper.ticks = tick;
            looper.record_note(0, 60, 100, PhraseEventKind::NoteOn);
        }
        looper.stop_rec_and_round(385);
        assert_eq!(looper.end_tick, Some(385));
        // no note-off was ever recorded for the held note; one is synthesized
        // at the stop tick so the rounding formula sees a last-note-off.
        assert!(looper.events.iter().any(|e| e.kind == PhraseEventKind::NoteOff && e.tick == 385));

        looper.run_on();
        looper.rec_on(); // REC again while RUN active => overdub
        assert!(looper.overdub_started);
        looper.ticks = 50;
        looper.record_note(0, 67, 110, PhraseEventKind::NoteOn);
        // wrap triggers the sort
        looper.ticks = looper.end_tick.unwrap();
        looper.advance_tick();
        assert!(!looper.overdub_started);
        assert!(looper.events.windows(2).all(|w| w[0].quantised_tick <= w[1].quantised_tick));
    }

    #[test]
    fn metronome_clicks_once_per_beat_only_during_initial_record() {
        let mut looper = PhraseLooper::new();
        looper.beats_per_bar = BeatsPerBar::Two;
        looper.rec_on();
        let mut clicks = Vec::new();
        for _ in 0..(PHRASE_PPQN * 3) {
            if let Some(click) = looper.advance_tick() {
                clicks.push(click);
            }
        }
        assert_eq!(clicks, vec![MetronomeClick::Downbeat, MetronomeClick::Beat, MetronomeClick::Downbeat]);

        // once RUN starts the metronome stops, even with REC still asserted
        // (overdub doesn't re-click).
        looper.stop_rec_and_round(PHRASE_PPQN * 3 + 1);
        looper.run_on();
        looper.rec_on();
        assert!(looper.advance_tick().is_none());
    }
}
