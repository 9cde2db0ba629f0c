//! Builders for synthetic module files.
//!
//! Enabled for this crate's tests and, through the `test-util` feature,
//! for downstream test suites.

/// A sample slot in a MOD file.
#[derive(Clone, Debug, Default)]
pub struct ModSample {
    pub name: String,
    pub pcm: Vec<i8>,
    pub finetune: i8,
    pub volume: u8,
    /// Loop start in words
    pub loop_start: u16,
    /// Loop length in words
    pub loop_length: u16,
}

impl ModSample {
    pub fn new(name: &str, pcm: Vec<i8>, volume: u8) -> Self {
        Self {
            name: name.to_string(),
            pcm,
            volume,
            ..Self::default()
        }
    }
}

/// Pack a MOD cell.
pub fn mod_cell(sample: u8, period: u16, effect: u8, value: u8) -> [u8; 4] {
    [
        (sample & 0xF0) | ((period >> 8) as u8 & 0x0F),
        period as u8,
        ((sample & 0x0F) << 4) | (effect & 0x0F),
        value,
    ]
}

/// Assembles a MOD file byte by byte.
#[derive(Clone, Debug)]
pub struct ModBuilder {
    title: String,
    tag: Option<[u8; 4]>,
    channels: u8,
    samples: Vec<ModSample>,
    positions: Vec<u8>,
    position_count: Option<u8>,
    restart: u8,
    patterns: Vec<Vec<[u8; 4]>>,
}

impl ModBuilder {
    /// 31-sample file with a format tag.
    pub fn tagged(tag: &[u8; 4], channels: u8) -> Self {
        Self {
            title: String::new(),
            tag: Some(*tag),
            channels,
            samples: Vec::new(),
            positions: vec![0],
            position_count: None,
            restart: 0,
            patterns: Vec::new(),
        }
    }

    /// 15-sample, 4-channel file without a tag.
    pub fn untagged() -> Self {
        Self {
            tag: None,
            ..Self::tagged(b"M.K.", 4)
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn sample(mut self, sample: ModSample) -> Self {
        self.samples.push(sample);
        self
    }

    pub fn positions(mut self, table: &[u8]) -> Self {
        self.positions = table.to_vec();
        self
    }

    /// Override the stored position count byte.
    pub fn position_count(mut self, count: u8) -> Self {
        self.position_count = Some(count);
        self
    }

    pub fn restart(mut self, restart: u8) -> Self {
        self.restart = restart;
        self
    }

    pub fn cell(mut self, pattern: usize, row: usize, channel: usize, cell: [u8; 4]) -> Self {
        let size = 64 * self.channels as usize;
        while self.patterns.len() <= pattern {
            self.patterns.push(vec![[0; 4]; size]);
        }
        self.patterns[pattern][row * self.channels as usize + channel] = cell;
        self
    }

    fn sample_slots(&self) -> usize {
        if self.tag.is_some() {
            31
        } else {
            15
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_padded(&mut out, self.title.as_bytes(), 20);

        for i in 0..self.sample_slots() {
            let sample = self.samples.get(i).cloned().unwrap_or_default();
            push_padded(&mut out, sample.name.as_bytes(), 22);
            out.extend_from_slice(&((sample.pcm.len() / 2) as u16).to_be_bytes());
            out.push(sample.finetune as u8);
            out.push(sample.volume);
            out.extend_from_slice(&sample.loop_start.to_be_bytes());
            out.extend_from_slice(&sample.loop_length.to_be_bytes());
        }

        out.push(self.position_count.unwrap_or(self.positions.len() as u8));
        out.push(self.restart);
        let mut table = [0u8; 128];
        for (slot, &p) in table.iter_mut().zip(&self.positions) {
            *slot = p;
        }
        out.extend_from_slice(&table);
        if let Some(tag) = self.tag {
            out.extend_from_slice(&tag);
        }

        let pattern_count = table.iter().copied().max().unwrap_or(0) as usize + 1;
        let empty = vec![[0u8; 4]; 64 * self.channels as usize];
        for i in 0..pattern_count {
            for cell in self.patterns.get(i).unwrap_or(&empty) {
                out.extend_from_slice(cell);
            }
        }

        for sample in self.samples.iter().take(self.sample_slots()) {
            let frames = sample.pcm.len() / 2 * 2;
            out.extend(sample.pcm[..frames].iter().map(|&s| s as u8));
        }
        out
    }
}

/// A sample inside an XM instrument. `data` is stored as-is.
#[derive(Clone, Debug, Default)]
pub struct XmSample {
    pub name: String,
    pub data: Vec<u8>,
    pub loop_start: u32,
    pub loop_length: u32,
    pub volume: u8,
    pub finetune: i8,
    /// Loop type bits and the 16-bit flag
    pub kind: u8,
    pub panning: u8,
    pub relative_note: i8,
}

impl XmSample {
    /// 8-bit sample delta-encoded from absolute levels.
    pub fn from_levels(name: &str, levels: &[i8], volume: u8) -> Self {
        let mut prev = 0i8;
        let data = levels
            .iter()
            .map(|&level| {
                let delta = level.wrapping_sub(prev);
                prev = level;
                delta as u8
            })
            .collect();
        Self {
            name: name.to_string(),
            data,
            volume,
            panning: 0x80,
            ..Self::default()
        }
    }

    /// 16-bit sample delta-encoded from absolute levels.
    pub fn from_levels_16(name: &str, levels: &[i16], volume: u8) -> Self {
        let mut prev = 0i16;
        let mut data = Vec::with_capacity(levels.len() * 2);
        for &level in levels {
            data.extend_from_slice(&level.wrapping_sub(prev).to_le_bytes());
            prev = level;
        }
        Self {
            name: name.to_string(),
            data,
            volume,
            kind: 0x10,
            panning: 0x80,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug)]
pub struct XmInstrument {
    pub name: String,
    pub samples: Vec<XmSample>,
    pub keymap: [u8; 96],
    pub volume_envelope: Vec<u16>,
    pub volume_flags: u8,
    pub fadeout: u16,
}

impl XmInstrument {
    pub fn new(name: &str, samples: Vec<XmSample>) -> Self {
        Self {
            name: name.to_string(),
            samples,
            keymap: [0; 96],
            volume_envelope: Vec::new(),
            volume_flags: 0,
            fadeout: 0,
        }
    }
}

/// An XM pattern as raw packed data.
#[derive(Clone, Debug)]
pub struct XmPattern {
    pub rows: u16,
    pub packing: u8,
    pub data: Vec<u8>,
}

impl XmPattern {
    /// Pattern where every cell is an empty packed record except `cells`.
    pub fn with_cells(rows: u16, channels: u16, cells: &[(u16, u16, Vec<u8>)]) -> Self {
        let mut data = Vec::new();
        for row in 0..rows {
            for channel in 0..channels {
                match cells.iter().find(|(r, c, _)| *r == row && *c == channel) {
                    Some((_, _, record)) => data.extend_from_slice(record),
                    None => data.push(0x80),
                }
            }
        }
        Self {
            rows,
            packing: 0,
            data,
        }
    }
}

/// Unpacked XM cell record: note, instrument, volume, effect, value.
pub fn xm_cell(note: u8, instrument: u8, volume: u8, effect: u8, value: u8) -> Vec<u8> {
    vec![note, instrument, volume, effect, value]
}

/// Assembles an XM file byte by byte.
#[derive(Clone, Debug)]
pub struct XmBuilder {
    pub title: String,
    pub tracker: String,
    pub marker: u8,
    pub version: u16,
    /// Extra bytes after the standard header, counted in the header size
    pub header_padding: usize,
    pub positions: Vec<u8>,
    pub restart: u16,
    pub channels: u16,
    pub flags: u16,
    pub speed: u16,
    pub tempo: u16,
    pub patterns: Vec<XmPattern>,
    pub instruments: Vec<XmInstrument>,
}

impl XmBuilder {
    pub fn new(channels: u16) -> Self {
        Self {
            title: String::new(),
            tracker: "FastTracker v2.00".to_string(),
            marker: 0x1A,
            version: 0x0104,
            header_padding: 0,
            positions: vec![0],
            restart: 0,
            channels,
            flags: 1,
            speed: 6,
            tempo: 125,
            patterns: Vec::new(),
            instruments: Vec::new(),
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"Extended Module: ");
        push_padded(&mut out, self.title.as_bytes(), 20);
        out.push(self.marker);
        push_padded(&mut out, self.tracker.as_bytes(), 20);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&(276 + self.header_padding as u32).to_le_bytes());
        for value in [
            self.positions.len() as u16,
            self.restart,
            self.channels,
            self.patterns.len() as u16,
            self.instruments.len() as u16,
            self.flags,
            self.speed,
            self.tempo,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }
        let mut table = [0u8; 256];
        for (slot, &p) in table.iter_mut().zip(&self.positions) {
            *slot = p;
        }
        out.extend_from_slice(&table);
        out.extend(std::iter::repeat(0).take(self.header_padding));

        for pattern in &self.patterns {
            out.extend_from_slice(&9u32.to_le_bytes());
            out.push(pattern.packing);
            out.extend_from_slice(&pattern.rows.to_le_bytes());
            out.extend_from_slice(&(pattern.data.len() as u16).to_le_bytes());
            out.extend_from_slice(&pattern.data);
        }

        for instrument in &self.instruments {
            push_instrument(&mut out, instrument);
        }
        out
    }
}

fn push_instrument(out: &mut Vec<u8>, instrument: &XmInstrument) {
    let header_size: u32 = if instrument.samples.is_empty() { 29 } else { 263 };
    out.extend_from_slice(&header_size.to_le_bytes());
    push_padded(out, instrument.name.as_bytes(), 22);
    out.push(0);
    out.extend_from_slice(&(instrument.samples.len() as u16).to_le_bytes());
    if instrument.samples.is_empty() {
        return;
    }

    out.extend_from_slice(&40u32.to_le_bytes());
    out.extend_from_slice(&instrument.keymap);
    for i in 0..24 {
        let point = instrument.volume_envelope.get(i).copied().unwrap_or(0);
        out.extend_from_slice(&point.to_le_bytes());
    }
    out.extend(std::iter::repeat(0).take(48));
    out.push(instrument.volume_envelope.len() as u8);
    out.push(0);
    out.extend_from_slice(&[0; 6]);
    out.push(instrument.volume_flags);
    out.push(0);
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&instrument.fadeout.to_le_bytes());
    out.extend_from_slice(&[0; 22]);

    for sample in &instrument.samples {
        out.extend_from_slice(&(sample.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&sample.loop_start.to_le_bytes());
        out.extend_from_slice(&sample.loop_length.to_le_bytes());
        out.push(sample.volume);
        out.push(sample.finetune as u8);
        out.push(sample.kind);
        out.push(sample.panning);
        out.push(sample.relative_note as u8);
        out.push(0);
        push_padded(out, sample.name.as_bytes(), 22);
    }
    for sample in &instrument.samples {
        out.extend_from_slice(&sample.data);
    }
}

fn push_padded(out: &mut Vec<u8>, bytes: &[u8], len: usize) {
    let take = bytes.len().min(len);
    out.extend_from_slice(&bytes[..take]);
    out.extend(std::iter::repeat(0).take(len - take));
}
