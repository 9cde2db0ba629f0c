//! FastTracker 2 XM format decoder.

use std::sync::Arc;

use binrw::Endian;
use mp_engine::frequency::note_to_period;
use mp_ir::{
    AutoVibrato, Cell, EffectTag, Envelope, EnvelopeFlags, Instrument, LoopType, ModuleFormat,
    Note, Pattern, Sample, Song, KEYMAP_SIZE, NOTE_OFF,
};
use tracing::{debug, trace};

use crate::reader::BinaryReader;
use crate::FormatError;

const MAGIC_LEN: usize = 17;
const PATTERN_TABLE_LEN: usize = 256;
const MAX_INSTRUMENTS: usize = 128;
const MAX_PATTERNS: usize = 256;
const ENVELOPE_POINTS: usize = 24;
/// Header size is counted from this offset
const HEADER_BASE: usize = 60;
/// Rows of the placeholder pattern backing out-of-range table entries
const EMPTY_PATTERN_ROWS: u16 = 64;

// Pattern record flag bits
const HAS_NOTE: u8 = 0x01;
const HAS_INSTRUMENT: u8 = 0x02;
const HAS_VOLUME: u8 = 0x04;
const HAS_EFFECT_TYPE: u8 = 0x08;
const HAS_EFFECT_VALUE: u8 = 0x10;
const PACKED: u8 = 0x80;

/// Load an XM file from bytes.
pub fn load_xm(data: &[u8]) -> Result<Song, FormatError> {
    let mut r = BinaryReader::with_endian(data, Endian::Little);
    r.seek(MAGIC_LEN);

    let title = r.read_string(20)?;
    let mut song = Song::new(&title, ModuleFormat::Xm);

    song.stripped = match r.read::<u8>()? {
        0x00 => true,
        0x1A => false,
        other => {
            return Err(FormatError::MalformedHeader(format!(
                "invalid marker byte 0x{other:02X}"
            )))
        }
    };
    song.tracker_name = mp_ir::song::truncated_name(&r.read_string(20)?);
    song.version = r.read::<u16>()?;

    let header_size = r.read::<u32>()? as usize;
    let position_count = r.read::<u16>()? as usize;
    song.restart = r.read::<u16>()?;
    let channel_count = r.read::<u16>()?;
    let pattern_count = r.read::<u16>()? as usize;
    let instrument_count = r.read::<u16>()? as usize;
    let flags = r.read::<u16>()?;
    song.initial_speed = r.read::<u16>()?;
    song.initial_tempo = r.read::<u16>()?;
    song.pattern_table = r.read_bytes(PATTERN_TABLE_LEN)?.to_vec();

    song.channel_count = u8::try_from(channel_count)
        .ok()
        .filter(|&c| c > 0)
        .ok_or_else(|| FormatError::MalformedHeader(format!("{channel_count} channels")))?;
    if position_count > PATTERN_TABLE_LEN {
        debug!(position_count, "position count exceeds table, clamping");
    }
    song.position_count = position_count.min(PATTERN_TABLE_LEN) as u16;
    song.normalize_restart();
    song.linear_frequencies = flags & 0x01 != 0;

    if pattern_count > MAX_PATTERNS {
        return Err(FormatError::MalformedHeader(format!("{pattern_count} patterns")));
    }
    if instrument_count > MAX_INSTRUMENTS {
        return Err(FormatError::InvalidInstrumentId(instrument_count));
    }

    r.seek(header_size.saturating_add(HEADER_BASE));

    for index in 0..pattern_count {
        let pattern = read_pattern(&mut r, song.channel_count, &mut song.instruments)?;
        trace!(index, rows = pattern.rows, "decoded pattern");
        song.patterns.push(pattern);
    }
    pad_missing_patterns(&mut song);

    read_instruments(&mut r, &mut song, instrument_count)?;

    debug!(
        title = %song.title,
        tracker = %song.tracker_name,
        version = song.version,
        channels = song.channel_count,
        patterns = song.patterns.len(),
        instruments = song.instruments.len(),
        samples = song.samples.len(),
        linear = song.linear_frequencies,
        "decoded XM"
    );

    Ok(song)
}

fn read_pattern(
    r: &mut BinaryReader,
    channels: u8,
    instruments: &mut Vec<Instrument>,
) -> Result<Pattern, FormatError> {
    let _header_length = r.read::<u32>()?;
    let packing = r.read::<u8>()?;
    if packing != 0 {
        return Err(FormatError::MalformedHeader(format!("packing type {packing}")));
    }
    let rows = r.read::<u16>()?;
    if !(1..=256).contains(&rows) {
        return Err(FormatError::InvalidPatternRows(rows));
    }
    let packed_size = r.read::<u16>()?;

    let mut pattern = Pattern::new(rows, channels);
    if packed_size == 0 {
        return Ok(pattern);
    }

    for row in 0..rows {
        for channel in 0..channels {
            *pattern.cell_mut(row, channel) = read_cell(r, instruments)?;
        }
    }
    Ok(pattern)
}

/// Decode one cell record.
///
/// A flag byte without the high bit is itself the note, followed by all
/// other fields. With the high bit set, bits 0-4 gate note, instrument,
/// volume, effect type and effect value.
fn read_cell(r: &mut BinaryReader, instruments: &mut Vec<Instrument>) -> Result<Cell, FormatError> {
    let mut cell = Cell::empty();
    let mut raw_note = 0u8;

    let mut flags = r.read::<u8>()?;
    if flags & PACKED == 0 {
        raw_note = flags;
        flags = PACKED | HAS_INSTRUMENT | HAS_VOLUME | HAS_EFFECT_TYPE | HAS_EFFECT_VALUE;
    }
    if flags & HAS_NOTE != 0 {
        raw_note = r.read::<u8>()?;
    }
    if flags & HAS_INSTRUMENT != 0 {
        let id = r.read::<u8>()?;
        ensure_instrument(instruments, id as usize)?;
        cell.instrument = id;
    }
    if flags & HAS_VOLUME != 0 {
        cell.volume = r.read::<u8>()?;
    }
    if flags & HAS_EFFECT_TYPE != 0 {
        cell.effect = Some(EffectTag::from_xm_type(r.read::<u8>()?));
    }
    if flags & HAS_EFFECT_VALUE != 0 {
        cell.effect_value = r.read::<u8>()?;
    }

    match raw_note {
        1..=96 => {
            cell.note = Note::On(raw_note);
            cell.period = note_to_period(raw_note as f64).round() as u16;
        }
        NOTE_OFF => cell.note = Note::Off,
        _ => {}
    }
    Ok(cell)
}

/// Synthesize placeholder instruments up to `id`.
fn ensure_instrument(instruments: &mut Vec<Instrument>, id: usize) -> Result<(), FormatError> {
    if id > MAX_INSTRUMENTS {
        return Err(FormatError::InvalidInstrumentId(id));
    }
    while instruments.len() < id {
        let next = instruments.len() as u16 + 1;
        instruments.push(Instrument::new(next, ""));
    }
    Ok(())
}

/// Back pattern table entries that name undecoded patterns with empty ones.
fn pad_missing_patterns(song: &mut Song) {
    let needed = song
        .pattern_table
        .iter()
        .take(song.position_count as usize)
        .map(|&p| p as usize + 1)
        .max()
        .unwrap_or(0);
    if needed > song.patterns.len() {
        debug!(
            decoded = song.patterns.len(),
            needed, "pattern table references missing patterns"
        );
        let channels = song.channel_count;
        song.patterns
            .resize_with(needed, || Pattern::new(EMPTY_PATTERN_ROWS, channels));
    }
}

struct SampleHeader {
    sample: Sample,
    byte_len: usize,
    sixteen_bit: bool,
}

fn read_instruments(
    r: &mut BinaryReader,
    song: &mut Song,
    count: usize,
) -> Result<(), FormatError> {
    let mut next_offset: Option<usize> = None;

    for i in 0..count {
        if let Some(offset) = next_offset {
            r.seek(offset);
        }
        let start = r.tell();
        let header_size = r.read::<u32>()? as usize;
        next_offset = Some(start.saturating_add(header_size));

        ensure_instrument(&mut song.instruments, i + 1)?;
        let name = r.read_string(22)?;
        let _kind = r.read::<u8>()?;
        let sample_count = r.read::<u16>()? as usize;

        let instrument = &mut song.instruments[i];
        instrument.name = mp_ir::song::truncated_name(&name);

        if sample_count == 0 {
            trace!(instrument = i + 1, "instrument without samples");
            continue;
        }
        // sample headers and data follow this header directly
        next_offset = None;

        let _sample_header_size = r.read::<u32>()?;
        let base = song.samples.len();
        let keymap: Vec<usize> = r
            .read_bytes(KEYMAP_SIZE)?
            .iter()
            .map(|&local| base + local as usize)
            .collect();

        let mut volume = read_envelope_points(r)?;
        let mut panning = read_envelope_points(r)?;
        let volume_points = r.read::<u8>()? as usize;
        let panning_points = r.read::<u8>()? as usize;
        volume.values.truncate(volume_points);
        panning.values.truncate(panning_points);

        volume.sustain_point = r.read::<u8>()?;
        volume.loop_start = r.read::<u8>()?;
        volume.loop_end = r.read::<u8>()?;
        panning.sustain_point = r.read::<u8>()?;
        panning.loop_start = r.read::<u8>()?;
        panning.loop_end = r.read::<u8>()?;
        volume.flags = EnvelopeFlags::from_bits_truncate(r.read::<u8>()?);
        panning.flags = EnvelopeFlags::from_bits_truncate(r.read::<u8>()?);

        let vibrato = AutoVibrato {
            waveform: r.read::<u8>()?,
            sweep: r.read::<u8>()?,
            depth: r.read::<u8>()?,
            rate: r.read::<u8>()?,
        };
        let fadeout = r.read::<u16>()?;
        r.skip(22)?;

        let mut headers = Vec::with_capacity(sample_count);
        for _ in 0..sample_count {
            let id = (song.samples.len() + headers.len() + 1) as u16;
            headers.push(read_sample_header(r, id)?);
        }
        for header in headers {
            let mut sample = header.sample;
            let bytes = r.read_bytes(header.byte_len)?;
            let pcm = if header.sixteen_bit {
                decode_delta_16(bytes)
            } else {
                decode_delta_8(bytes)
            };
            sample.data = Arc::from(pcm);
            song.samples.push(sample);
        }

        if let Some(&bad) = keymap.iter().find(|&&idx| idx >= song.samples.len()) {
            return Err(FormatError::InvalidSampleId(bad + 1));
        }

        let instrument = &mut song.instruments[i];
        instrument.keymap = keymap;
        instrument.volume_envelope = volume;
        instrument.panning_envelope = panning;
        instrument.vibrato = vibrato;
        instrument.fadeout = fadeout;
        trace!(instrument = i + 1, samples = sample_count, "decoded instrument");
    }
    Ok(())
}

fn read_envelope_points(r: &mut BinaryReader) -> Result<Envelope, FormatError> {
    let mut envelope = Envelope::new();
    for _ in 0..ENVELOPE_POINTS {
        envelope.values.push(r.read::<u16>()?);
    }
    Ok(envelope)
}

fn read_sample_header(r: &mut BinaryReader, id: u16) -> Result<SampleHeader, FormatError> {
    let byte_len = r.read::<u32>()? as usize;
    let loop_start = r.read::<u32>()?;
    let loop_length = r.read::<u32>()?;
    let volume = r.read::<u8>()?;
    let finetune = r.read::<i8>()?;
    let kind = r.read::<u8>()?;
    let panning = r.read::<u8>()?;
    let relative_note = r.read::<i8>()?;
    r.skip(1)?;
    let name = r.read_string(22)?;

    // bit 4 marks 16-bit data; bit 3 is accepted as well
    let sixteen_bit = kind & 0x18 != 0;
    let loop_type = match kind & 0x03 {
        1 => LoopType::Forward,
        2 => LoopType::PingPong,
        _ => LoopType::None,
    };

    let mut sample = Sample::new(id, &name);
    sample.volume = volume.min(64);
    sample.panning = panning;
    sample.finetune = finetune as i32 + relative_note as i32 * 128;
    sample.bits = if sixteen_bit { 16 } else { 8 };
    if sixteen_bit {
        sample.set_loop(loop_start / 2, loop_length / 2, loop_type);
    } else {
        sample.set_loop(loop_start, loop_length, loop_type);
    }

    Ok(SampleHeader {
        sample,
        byte_len,
        sixteen_bit,
    })
}

/// Decode 8-bit delta PCM.
///
/// The running level wraps by 0xFF when it leaves the signed 8-bit range.
pub(crate) fn decode_delta_8(bytes: &[u8]) -> Vec<f32> {
    let mut level: i32 = 0;
    bytes
        .iter()
        .map(|&b| {
            level += b as i8 as i32;
            if level > 0x7F {
                level -= 0xFF;
            } else if level < -0x80 {
                level += 0xFF;
            }
            ((level + 0x80) as f32 / 255.0) * 2.0 - 1.0
        })
        .collect()
}

/// Decode little-endian 16-bit delta PCM. A trailing odd byte is ignored.
pub(crate) fn decode_delta_16(bytes: &[u8]) -> Vec<f32> {
    let mut level: i32 = 0;
    bytes
        .chunks_exact(2)
        .map(|pair| {
            level += i16::from_le_bytes([pair[0], pair[1]]) as i32;
            if level > 0x7FFF {
                level -= 0x10000;
            } else if level < -0x8000 {
                level += 0x10000;
            }
            ((level + 0x8000) as f32 / 65535.0) * 2.0 - 1.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn delta_8_accumulates_and_normalizes() {
        let pcm = decode_delta_8(&[0x7F, 0x81, 0x01]);
        // levels 127, 0, 1
        assert_relative_eq!(pcm[0], 1.0);
        assert_relative_eq!(pcm[1], 128.0 / 255.0 * 2.0 - 1.0);
        assert_relative_eq!(pcm[2], 129.0 / 255.0 * 2.0 - 1.0);
    }

    #[test]
    fn delta_8_wraps() {
        // 127 + 1 = 128 wraps to -127
        let pcm = decode_delta_8(&[0x7F, 0x01]);
        assert_relative_eq!(pcm[1], 1.0 / 255.0 * 2.0 - 1.0);
        // -128 - 1 wraps to 126
        let pcm = decode_delta_8(&[0x80, 0xFF]);
        assert_relative_eq!(pcm[0], -1.0);
        assert_relative_eq!(pcm[1], 254.0 / 255.0 * 2.0 - 1.0);
    }

    #[test]
    fn delta_16_accumulates() {
        let mut bytes = Vec::new();
        for delta in [0x7FFFi16, -0x7FFF, 100] {
            bytes.extend_from_slice(&delta.to_le_bytes());
        }
        bytes.push(0xAA);
        let pcm = decode_delta_16(&bytes);
        assert_eq!(pcm.len(), 3);
        assert_relative_eq!(pcm[0], 1.0);
        assert_relative_eq!(pcm[1], 32768.0 / 65535.0 * 2.0 - 1.0);
        assert_relative_eq!(pcm[2], 32868.0 / 65535.0 * 2.0 - 1.0);
    }

    #[test]
    fn delta_16_wraps() {
        let mut bytes = Vec::new();
        for delta in [0x7FFFi16, 0x0002] {
            bytes.extend_from_slice(&delta.to_le_bytes());
        }
        // 32767 + 2 = 32769 wraps to -32767
        let pcm = decode_delta_16(&bytes);
        assert_relative_eq!(pcm[1], 1.0 / 65535.0 * 2.0 - 1.0);
    }

    #[test]
    fn unpacked_record_reads_all_fields() {
        let bytes = [49, 2, 0x40, 0x0C, 0x20];
        let mut r = BinaryReader::with_endian(&bytes, Endian::Little);
        let mut instruments = Vec::new();
        let cell = read_cell(&mut r, &mut instruments).unwrap();
        assert_eq!(cell.note, Note::On(49));
        assert_eq!(cell.period, 428);
        assert_eq!(cell.instrument, 2);
        assert_eq!(cell.volume, 0x40);
        assert_eq!(cell.effect.map(|t| t.code), Some('C'));
        assert_eq!(cell.effect_value, 0x20);
        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[1].id, 2);
    }

    #[test]
    fn packed_record_reads_flagged_fields() {
        let bytes = [PACKED | HAS_NOTE | HAS_EFFECT_TYPE, 97, 0x10];
        let mut r = BinaryReader::with_endian(&bytes, Endian::Little);
        let cell = read_cell(&mut r, &mut Vec::new()).unwrap();
        assert_eq!(cell.note, Note::Off);
        assert_eq!(cell.instrument, 0);
        assert_eq!(cell.effect.map(|t| t.code), Some('G'));
        assert_eq!(cell.effect_value, 0);
        assert_eq!(r.tell(), 3);
    }

    #[test]
    fn empty_packed_record() {
        let mut r = BinaryReader::with_endian(&[PACKED], Endian::Little);
        assert!(read_cell(&mut r, &mut Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn instrument_ids_are_capped() {
        let bytes = [PACKED | HAS_INSTRUMENT, 129];
        let mut r = BinaryReader::with_endian(&bytes, Endian::Little);
        assert_eq!(
            read_cell(&mut r, &mut Vec::new()),
            Err(FormatError::InvalidInstrumentId(129))
        );
    }

    #[test]
    fn sixteen_bit_loops_are_in_frames() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&200u32.to_le_bytes());
        bytes.extend_from_slice(&20u32.to_le_bytes());
        bytes.extend_from_slice(&100u32.to_le_bytes());
        bytes.extend_from_slice(&[48, 0xF0, 0x11, 0x80, 0xFE, 0]);
        bytes.extend_from_slice(&[b'x'; 22]);
        let mut r = BinaryReader::with_endian(&bytes, Endian::Little);
        let header = read_sample_header(&mut r, 1).unwrap();
        assert!(header.sixteen_bit);
        assert_eq!(header.byte_len, 200);
        assert_eq!(header.sample.loop_start, 10);
        assert_eq!(header.sample.loop_length, 50);
        assert_eq!(header.sample.loop_type, LoopType::Forward);
        assert_eq!(header.sample.finetune, -16 - 256);
        assert_eq!(header.sample.bits, 16);
    }
}
