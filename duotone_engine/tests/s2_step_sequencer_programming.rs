//! spec.md §8 S2 — Step sequencer programming.
//!
//! In STEP mode with REC on, press notes 60, 64, 67 simultaneously and
//! release. Step 0 stores the three notes (absolute 60 for the first note
//! of step 0, offsets +4/+7 from that base for the rest); exactly one step
//! is programmed; the sequencer has advanced to step 1 ready for the next
//! one.

use duotone_engine::sequencer::step::StepSequencer;

#[test]
fn simultaneous_chord_press_and_release_programs_one_step() {
    let mut seq = StepSequencer::new();

    seq.rec_note_on(60);
    seq.rec_note_on(64);
    seq.rec_note_on(67);

    // Order of release doesn't matter — the step only advances once every
    // held note has been released.
    seq.rec_note_off(64);
    seq.rec_note_off(67);
    seq.rec_note_off(60);

    assert_eq!(seq.active_step_count(), 1);
    assert_eq!(seq.current_step, 1);

    let notes: Vec<u8> = seq.step(0).active_notes().collect();
    assert_eq!(notes, vec![60, 4, 7]);
    assert!(!seq.step(0).is_rest());
}
