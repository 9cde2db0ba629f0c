//! ProTracker MOD format decoder.

use std::collections::BTreeSet;
use std::sync::Arc;

use binrw::Endian;
use mp_engine::frequency::period_to_note;
use mp_ir::{Cell, EffectTag, Instrument, LoopType, ModuleFormat, Note, Pattern, Sample, Song};
use tracing::{debug, trace};

use crate::reader::BinaryReader;
use crate::FormatError;

/// Offset of the four-byte format tag in 31-sample files.
const TAG_OFFSET: usize = 0x438;
const POSITION_TABLE_LEN: usize = 128;
const ROWS_PER_PATTERN: u16 = 64;

/// Channel count implied by a format tag, or `None` for an untagged file.
fn tag_channels(tag: &[u8]) -> Option<u8> {
    match tag {
        b"M.K." | b"M!K!" | b"OCTA" | b"FLT4" => Some(4),
        b"FLT8" => Some(8),
        [digit @ b'1'..=b'9', b'C', b'H', b'N'] => Some(digit - b'0'),
        _ => None,
    }
}

/// Sample header plus the frame count still to be read.
struct SampleHeader {
    sample: Sample,
    frames: usize,
}

/// Load a MOD file from bytes.
pub fn load_mod(data: &[u8]) -> Result<Song, FormatError> {
    let mut r = BinaryReader::with_endian(data, Endian::Big);

    r.seek(TAG_OFFSET);
    let tag = r.read_bytes(4).ok().filter(|tag| tag_channels(tag).is_some());
    r.rewind();

    let (sample_count, channel_count) = match tag {
        Some(tag) => (31, tag_channels(tag).unwrap_or(4)),
        None => (15, 4),
    };

    let title = r.read_string(20)?;
    let mut song = Song::new(&title, ModuleFormat::Mod);
    song.channel_count = channel_count;
    song.sub_format = tag.map(|t| t.iter().map(|&b| char::from(b)).collect()).unwrap_or_default();

    let mut headers = Vec::with_capacity(sample_count);
    for i in 0..sample_count {
        headers.push(read_sample_header(&mut r, i as u16 + 1)?);
    }

    let position_count = r.read::<u8>()? as usize;
    if position_count > POSITION_TABLE_LEN {
        debug!(position_count, "position count exceeds table, clamping");
    }
    song.position_count = position_count.min(POSITION_TABLE_LEN) as u16;
    song.restart = r.read::<u8>()? as u16;
    song.normalize_restart();

    song.pattern_table = r.read_bytes(POSITION_TABLE_LEN)?.to_vec();
    let pattern_count = song.pattern_table.iter().copied().max().map_or(0, |max| max as usize + 1);

    if tag.is_some() {
        r.skip(4)?;
    }

    let mut effects_used = BTreeSet::new();
    for index in 0..pattern_count {
        let pattern = read_pattern(&mut r, channel_count, sample_count, &mut effects_used)?;
        trace!(index, "decoded pattern");
        song.patterns.push(pattern);
    }

    for header in headers {
        let SampleHeader { mut sample, frames } = header;
        if frames > 0 {
            let pcm: Vec<f32> = r
                .read_bytes(frames)?
                .iter()
                .map(|&b| b as i8 as f32 / 128.0)
                .collect();
            sample.data = Arc::from(pcm);
        }
        song.instruments
            .push(Instrument::with_default_sample(sample.id, &sample.name, song.samples.len()));
        song.samples.push(sample);
    }

    song.initial_tempo = 125;
    song.initial_speed = 6;

    debug!(
        title = %song.title,
        tag = %song.sub_format,
        channels = channel_count,
        samples = song.samples.len(),
        patterns = song.patterns.len(),
        positions = song.position_count,
        "decoded MOD"
    );
    let effects: Vec<String> = effects_used.into_iter().collect();
    debug!(effects = %effects.join(", "), "effects used");

    Ok(song)
}

fn read_sample_header(r: &mut BinaryReader, id: u16) -> Result<SampleHeader, FormatError> {
    let name = r.read_string(22)?;
    let frames = r.read::<u16>()? as usize * 2;
    let finetune = r.read::<i8>()?;
    let volume = r.read::<u8>()?;
    let loop_start = r.read::<u16>()? as u32 * 2;
    let loop_length = r.read::<u16>()? as u32 * 2;

    let mut sample = Sample::new(id, &name);
    sample.finetune = finetune as i32;
    sample.volume = volume.min(64);
    sample.bits = 8;
    sample.set_loop(loop_start, loop_length, LoopType::Forward);

    Ok(SampleHeader { sample, frames })
}

fn read_pattern(
    r: &mut BinaryReader,
    channels: u8,
    sample_count: usize,
    effects_used: &mut BTreeSet<String>,
) -> Result<Pattern, FormatError> {
    let mut pattern = Pattern::new(ROWS_PER_PATTERN, channels);
    for row in 0..ROWS_PER_PATTERN {
        for channel in 0..channels {
            let cell = read_cell(r, sample_count)?;
            if let Some(tag) = cell.effect {
                effects_used.insert(tag.to_string());
            }
            *pattern.cell_mut(row, channel) = cell;
        }
    }
    Ok(pattern)
}

/// Decode one packed 32-bit cell.
///
/// ```text
/// ssss pppp pppppppp ssss eeee vvvvvvvv
/// ```
/// High sample nibble, 12-bit period, low sample nibble, effect, value.
fn read_cell(r: &mut BinaryReader, sample_count: usize) -> Result<Cell, FormatError> {
    let d = r.read::<u32>()?;

    let sample_id = (((d >> 12) & 0x0F) | ((d >> 24) & 0xF0)) as usize;
    if sample_id > sample_count {
        return Err(FormatError::InvalidSampleId(sample_id));
    }

    let period = ((d >> 16) & 0x0FFF) as u16;
    let note = if period == 0 {
        Note::None
    } else {
        period_to_note(period as f64)
            .and_then(|n| u8::try_from(n).ok())
            .filter(|&n| n > 0)
            .map_or(Note::None, Note::On)
    };

    Ok(Cell {
        instrument: sample_id as u8,
        period,
        note,
        effect: EffectTag::from_mod_command(((d >> 8) & 0x0F) as u8),
        effect_value: (d & 0xFF) as u8,
        volume: 0,
    })
}
