//! Period, note and frame-rate conversions.
//!
//! Notes live in the canonical space where note 1 is C-1 and note 96 is
//! B-8. Note 47 sits on period 480; each semitone scales the period by
//! 2^(1/12). Fractional notes are allowed so that finetune and vibrato can
//! bend the pitch between semitones.

/// Amiga NTSC clock rate used for period -> frame rate conversion.
pub const NTSC_CLOCK: f64 = 7_159_090.5;

/// Amiga PAL clock rate.
pub const PAL_CLOCK: f64 = 7_093_789.2;

/// Period of the reference note.
const REFERENCE_PERIOD: f64 = 480.0;

/// Note number that plays at `REFERENCE_PERIOD`.
const REFERENCE_NOTE: f64 = 47.0;

/// Frames per second the Amiga would play a sample at for the given period.
pub fn period_to_framerate(period: f64, pal: bool) -> f64 {
    let clock = if pal { PAL_CLOCK } else { NTSC_CLOCK };
    clock / (period * 2.0)
}

/// Convert a (possibly fractional) note to an Amiga period.
pub fn note_to_period(note: f64) -> f64 {
    REFERENCE_PERIOD * ((REFERENCE_NOTE - note) / 12.0).exp2()
}

/// Convert a period to the nearest whole note.
///
/// Returns `None` for non-positive or non-finite periods.
pub fn period_to_note(period: f64) -> Option<i32> {
    if !period.is_finite() || period <= 0.0 {
        return None;
    }
    let note = (REFERENCE_NOTE - (period / REFERENCE_PERIOD).log2() * 12.0).round();
    note.is_finite().then_some(note as i32)
}

/// Frames per second for a (possibly fractional) note.
pub fn note_to_framerate(note: f64, pal: bool) -> f64 {
    period_to_framerate(note_to_period(note), pal)
}

/// Playback-rate multiplier for a note on a device running at `sample_rate`.
pub fn note_to_playback_rate(note: f64, pal: bool, sample_rate: f64) -> f64 {
    note_to_framerate(note, pal) / sample_rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reference_note_is_period_480() {
        assert_relative_eq!(note_to_period(47.0), 480.0);
        assert_eq!(period_to_note(480.0), Some(47));
    }

    #[test]
    fn octave_halves_period() {
        assert_relative_eq!(note_to_period(59.0), 240.0, epsilon = 1e-9);
        assert_relative_eq!(note_to_period(35.0), 960.0, epsilon = 1e-9);
    }

    #[test]
    fn note_period_roundtrip() {
        for note in 1..=96 {
            assert_eq!(period_to_note(note_to_period(note as f64)), Some(note));
        }
    }

    #[test]
    fn amiga_table_periods_map_to_notes() {
        assert_eq!(period_to_note(1712.0), Some(25));
        assert_eq!(period_to_note(856.0), Some(37));
        assert_eq!(period_to_note(428.0), Some(49));
        assert_eq!(period_to_note(214.0), Some(61));
        assert_eq!(period_to_note(113.0), Some(72));
    }

    #[test]
    fn framerate_at_c_period() {
        assert_relative_eq!(period_to_framerate(428.0, false), 8363.42, epsilon = 0.01);
        assert_relative_eq!(period_to_framerate(428.0, true), 8287.14, epsilon = 0.01);
    }

    #[test]
    fn framerate_roundtrips_through_note() {
        for note in 1..=96 {
            let rate = note_to_framerate(note as f64, false);
            let period = NTSC_CLOCK / (rate * 2.0);
            assert_eq!(period_to_note(period), Some(note));
        }
    }

    #[test]
    fn invalid_periods_have_no_note() {
        assert_eq!(period_to_note(0.0), None);
        assert_eq!(period_to_note(-10.0), None);
        assert_eq!(period_to_note(f64::NAN), None);
        assert_eq!(period_to_note(f64::INFINITY), None);
    }

    #[test]
    fn playback_rate_scales_with_device_rate() {
        let at_44k = note_to_playback_rate(49.0, false, 44_100.0);
        let at_22k = note_to_playback_rate(49.0, false, 22_050.0);
        assert_relative_eq!(at_22k, at_44k * 2.0, epsilon = 1e-12);
    }
}
