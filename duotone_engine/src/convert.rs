//! Data Conversion (C12): pure, idempotent value conversions between the
//! normalised `[0,1]` float every `Param` stores and human-readable/wire
//! representations (spec.md §4.12, exact formulas resolved from
//! `data_conversion.cpp` — see SPEC_FULL.md §4.12).

pub const MIN_TEMPO_BPM: f32 = 30.0;
pub const MAX_TEMPO_BPM: f32 = 250.0;

/// Tempo BPM → normalised float, a cubic fit over the clamped BPM range.
pub fn bpm_to_normalised(bpm: f32) -> f32 {
    let t = bpm.clamp(MIN_TEMPO_BPM, MAX_TEMPO_BPM);
    -0.1059 + (0.005330 * t) - (0.00000167 * t * t) - (0.00000000557 * t * t * t)
}

/// Normalised float → tempo BPM, quantised to 0.1 BPM below 100, else 0.5 BPM.
pub fn normalised_to_bpm(value: f32) -> f32 {
    let value = value.clamp(0.0, 1.0);
    let val = 1.9f32.powf(3.0 + 3.106 * value) + 176.5 * value + 13.16;
    if val >= 100.0 {
        (val * 2.0).round() / 2.0
    } else {
        (val * 10.0).round() / 10.0
    }
}

/// MIDI channel (0-16, 0 = local/omni) → normalised float.
pub fn channel_to_normalised(channel: f32) -> f32 {
    channel.clamp(0.0, 16.0) / 17.0
}

pub fn normalised_to_channel(value: f32) -> f32 {
    (value.clamp(0.0, 1.0) * 17.0).clamp(0.0, 16.0)
}

/// A generic enumerated parameter with `n` variants, encoded as integer
/// codes `0..n`.
pub fn enum_to_normalised(code: f32, n: u32) -> f32 {
    let n = n as f32;
    code.clamp(0.0, n - 1.0) / n
}

pub fn normalised_to_enum(value: f32, n: u32) -> f32 {
    let n = n as f32;
    (value.clamp(0.0, 1.0) * n).clamp(0.0, n - 1.0)
}

/// Sequencer step count (1..=max_steps).
pub fn num_steps_to_normalised(steps: f32, max_steps: u32) -> f32 {
    let max_steps = max_steps as f32;
    let val = steps.clamp(1.0, max_steps);
    (val - 1.0) / max_steps
}

pub fn normalised_to_num_steps(value: f32, max_steps: u32) -> f32 {
    let max_steps = max_steps as f32;
    let val = value.clamp(0.0, 1.0) * max_steps + 1.0;
    val.clamp(1.0, max_steps)
}

fn linear_to_normalised(value: f32, min: f32, max: f32) -> f32 {
    let val = value.clamp(min, max);
    (val - min) / (max - min)
}

fn normalised_to_linear(value: f32, min: f32, max: f32) -> f32 {
    let value = value.clamp(0.0, 1.0);
    (value * (max - min) + min).clamp(min, max)
}

/// 14-bit pitch bend, wire range `[-8192, 8191]`.
pub fn pitch_bend_to_normalised(value: f32) -> f32 {
    linear_to_normalised(
        value,
        duotone_shared::MIDI_PITCH_BEND_MIN_VALUE as f32,
        duotone_shared::MIDI_PITCH_BEND_MAX_VALUE as f32,
    )
}

pub fn normalised_to_pitch_bend(value: f32) -> f32 {
    normalised_to_linear(
        value,
        duotone_shared::MIDI_PITCH_BEND_MIN_VALUE as f32,
        duotone_shared::MIDI_PITCH_BEND_MAX_VALUE as f32,
    )
}

/// Channel pressure / aftertouch, wire range `[0, 127]`.
pub fn aftertouch_to_normalised(value: f32) -> f32 {
    linear_to_normalised(
        value,
        duotone_shared::MIDI_CHANPRESS_MIN_VALUE as f32,
        duotone_shared::MIDI_CHANPRESS_MAX_VALUE as f32,
    )
}

pub fn normalised_to_aftertouch(value: f32) -> f32 {
    normalised_to_linear(
        value,
        duotone_shared::MIDI_CHANPRESS_MIN_VALUE as f32,
        duotone_shared::MIDI_CHANPRESS_MAX_VALUE as f32,
    )
}

/// MIDI CC value, wire range `[0, 127]`.
pub fn midi_cc_to_normalised(value: f32) -> f32 {
    linear_to_normalised(
        value,
        duotone_shared::MIDI_CC_MIN_VALUE as f32,
        duotone_shared::MIDI_CC_MAX_VALUE as f32,
    )
}

pub fn normalised_to_midi_cc(value: f32) -> f32 {
    normalised_to_linear(
        value,
        duotone_shared::MIDI_CC_MIN_VALUE as f32,
        duotone_shared::MIDI_CC_MAX_VALUE as f32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tempo_round_trips_within_quantisation_step() {
        for bpm in [30.0, 60.0, 90.0, 120.0, 140.0, 200.0, 250.0] {
            let n = bpm_to_normalised(bpm);
            let back = normalised_to_bpm(n);
            assert!((back - bpm).abs() <= 1.0, "bpm={bpm} back={back}");
        }
    }

    #[test]
    fn tempo_is_clamped_to_range() {
        assert_eq!(bpm_to_normalised(10.0), bpm_to_normalised(MIN_TEMPO_BPM));
        assert_eq!(bpm_to_normalised(400.0), bpm_to_normalised(MAX_TEMPO_BPM));
    }

    #[test]
    fn channel_round_trips() {
        for ch in 0..=16 {
            let n = channel_to_normalised(ch as f32);
            let back = normalised_to_channel(n);
            assert_relative_eq!(back, ch as f32, epsilon = 0.001);
        }
    }

    #[test]
    fn enum_round_trips_for_each_code() {
        let n_variants = 5;
        for code in 0..n_variants {
            let norm = enum_to_normalised(code as f32, n_variants);
            let back = normalised_to_enum(norm, n_variants);
            assert_relative_eq!(back.round(), code as f32, epsilon = 0.001);
        }
    }

    #[test]
    fn num_steps_round_trips() {
        for steps in 1..=16 {
            let n = num_steps_to_normalised(steps as f32, 16);
            let back = normalised_to_num_steps(n, 16);
            assert!((back.round() - steps as f32).abs() < 1.0);
        }
    }

    #[test]
    fn pitch_bend_extremes_map_to_unit_interval() {
        assert_relative_eq!(
            pitch_bend_to_normalised(duotone_shared::MIDI_PITCH_BEND_MIN_VALUE as f32),
            0.0,
            epsilon = 0.0001
        );
        assert_relative_eq!(
            pitch_bend_to_normalised(duotone_shared::MIDI_PITCH_BEND_MAX_VALUE as f32),
            1.0,
            epsilon = 0.0001
        );
    }

    #[test]
    fn midi_cc_round_trips() {
        for v in [0, 1, 64, 100, 127] {
            let n = midi_cc_to_normalised(v as f32);
            let back = normalised_to_midi_cc(n);
            assert!((back.round() - v as f32).abs() < 1.0);
        }
    }
}
