//! MOD decoding against synthetic files.

use approx::assert_relative_eq;
use mp_formats::testing::{mod_cell, ModBuilder, ModSample};
use mp_formats::{load_mod, load_module, FormatError};
use mp_ir::{LoopType, ModuleFormat, Note, Song};

fn assert_mod_invariants(song: &Song) {
    assert_eq!(song.format, ModuleFormat::Mod);
    assert_eq!(song.initial_tempo, 125);
    assert_eq!(song.initial_speed, 6);
    assert!(song.position_count == 0 || song.restart < song.position_count);
    assert_eq!(song.instruments.len(), song.samples.len());

    for (i, pat) in song.patterns.iter().enumerate() {
        assert_eq!(pat.rows, 64, "Pattern {} rows", i);
        assert_eq!(pat.channels, song.channel_count, "Pattern {} channels", i);
    }
    for (i, sample) in song.samples.iter().enumerate() {
        assert!(sample.volume <= 64, "Sample {} volume {}", i, sample.volume);
        assert!(
            sample.loop_length == 0 || sample.loop_length > 2,
            "Sample {} loop length {}",
            i,
            sample.loop_length
        );
    }
    // one instrument per sample, in order
    for (i, inst) in song.instruments.iter().enumerate() {
        assert_eq!(inst.default_sample, Some(i));
        assert_eq!(inst.id as usize, i + 1);
    }
}

#[test]
fn tagged_file_structure() {
    let data = ModBuilder::tagged(b"M.K.", 4)
        .title("synthetic")
        .sample(ModSample::new("lead", vec![0, 64, 127, -128], 48))
        .positions(&[0, 1, 0])
        .cell(0, 0, 0, mod_cell(1, 428, 0xC, 0x20))
        .cell(1, 63, 3, mod_cell(1, 214, 0xF, 0x03))
        .build();

    let song = load_module(&data).unwrap();
    assert_mod_invariants(&song);
    assert_eq!(song.title.as_str(), "synthetic");
    assert_eq!(song.sub_format, "M.K.");
    assert_eq!(song.channel_count, 4);
    assert_eq!(song.samples.len(), 31);
    assert_eq!(song.patterns.len(), 2);
    assert_eq!(song.position_count, 3);
    assert_eq!(&song.pattern_table[..3], &[0, 1, 0]);

    let cell = song.patterns[0].cell(0, 0);
    assert_eq!(cell.instrument, 1);
    assert_eq!(cell.note, Note::On(49));
    assert_eq!(cell.effect.map(|t| t.to_string()), Some("MOD:C".to_string()));
    assert_eq!(cell.effect_value, 0x20);
    assert_eq!(song.patterns[1].cell(63, 3).note, Note::On(61));

    let lead = &song.samples[0];
    assert_eq!(lead.name.as_str(), "lead");
    assert_eq!(lead.volume, 48);
    assert_eq!(lead.len(), 4);
    assert_relative_eq!(lead.data[1], 0.5);
    assert_relative_eq!(lead.data[2], 127.0 / 128.0);
    assert_relative_eq!(lead.data[3], -1.0);
}

#[test]
fn untagged_file_has_15_samples_and_4_channels() {
    let data = ModBuilder::untagged()
        .sample(ModSample::new("a", vec![1; 8], 64))
        .cell(0, 1, 2, mod_cell(1, 856, 0, 0))
        .build();
    let song = load_mod(&data).unwrap();
    assert_mod_invariants(&song);
    assert_eq!(song.samples.len(), 15);
    assert_eq!(song.channel_count, 4);
    assert_eq!(song.sub_format, "");
    assert_eq!(song.patterns[0].cell(1, 2).note, Note::On(37));
    assert_eq!(song.samples[0].len(), 8);
}

#[test]
fn channel_count_follows_tag() {
    for (tag, channels) in [
        (b"6CHN", 6u8),
        (b"8CHN", 8),
        (b"2CHN", 2),
        (b"FLT8", 8),
        (b"FLT4", 4),
        (b"OCTA", 4),
        (b"M!K!", 4),
    ] {
        let data = ModBuilder::tagged(tag, channels)
            .cell(0, 10, channels as usize - 1, mod_cell(0, 0, 0xA, 0x0F))
            .build();
        let song = load_mod(&data).unwrap();
        assert_eq!(song.channel_count, channels, "{}", String::from_utf8_lossy(tag));
        assert_eq!(song.patterns[0].channels, channels);
        assert_eq!(song.patterns[0].cell(10, channels - 1).effect_value, 0x0F);
    }
}

#[test]
fn restart_past_end_is_reset() {
    let data = ModBuilder::tagged(b"M.K.", 4).positions(&[0, 0]).restart(5).build();
    let song = load_mod(&data).unwrap();
    assert_eq!(song.restart, 0);

    let data = ModBuilder::tagged(b"M.K.", 4).positions(&[0, 0]).restart(1).build();
    assert_eq!(load_mod(&data).unwrap().restart, 1);
}

#[test]
fn position_count_is_clamped_to_table() {
    let data = ModBuilder::tagged(b"M.K.", 4).position_count(200).build();
    let song = load_mod(&data).unwrap();
    assert_eq!(song.position_count, 128);
}

#[test]
fn pattern_count_comes_from_highest_table_entry() {
    let data = ModBuilder::tagged(b"M.K.", 4).positions(&[3]).build();
    let song = load_mod(&data).unwrap();
    assert_eq!(song.patterns.len(), 4);
}

#[test]
fn loops_are_decoded_in_frames() {
    let mut looped = ModSample::new("loop", vec![0; 100], 64);
    looped.loop_start = 10;
    looped.loop_length = 20;
    let mut tiny = ModSample::new("tiny", vec![0; 100], 64);
    tiny.loop_length = 1;

    let data = ModBuilder::tagged(b"M.K.", 4).sample(looped).sample(tiny).build();
    let song = load_mod(&data).unwrap();
    assert_eq!(song.samples[0].loop_start, 20);
    assert_eq!(song.samples[0].loop_length, 40);
    assert_eq!(song.samples[0].loop_type, LoopType::Forward);
    assert_eq!(song.samples[1].loop_length, 0);
    assert_eq!(song.samples[1].loop_type, LoopType::None);
}

#[test]
fn unknown_sample_reference_fails() {
    let data = ModBuilder::untagged().cell(0, 0, 0, mod_cell(20, 428, 0, 0)).build();
    assert_eq!(load_mod(&data).unwrap_err(), FormatError::InvalidSampleId(20));
}

#[test]
fn truncated_sample_data_fails() {
    let mut data = ModBuilder::tagged(b"M.K.", 4)
        .sample(ModSample::new("cut", vec![0; 64], 64))
        .build();
    data.truncate(data.len() - 10);
    assert!(matches!(load_mod(&data), Err(FormatError::BufferUnderrun { .. })));
}

#[test]
fn empty_input_underruns() {
    assert!(matches!(load_module(&[]), Err(FormatError::BufferUnderrun { offset: 0, .. })));
}
