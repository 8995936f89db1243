//! Streaming WebM (Matroska) writer for raw PCM
//!
//! Produces a header chunk followed by one self-contained cluster per call,
//! so the concatenation of every emitted chunk in order is a playable file.
//! The segment uses the "unknown size" marker, as live recorders do.

// Element IDs
const EBML: u32 = 0x1A45_DFA3;
const EBML_VERSION: u32 = 0x4286;
const EBML_READ_VERSION: u32 = 0x42F7;
const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
const DOC_TYPE: u32 = 0x4282;
const DOC_TYPE_VERSION: u32 = 0x4287;
const DOC_TYPE_READ_VERSION: u32 = 0x4285;
const SEGMENT: u32 = 0x1853_8067;
const INFO: u32 = 0x1549_A966;
const TIMECODE_SCALE: u32 = 0x2A_D7B1;
const MUXING_APP: u32 = 0x4D80;
const WRITING_APP: u32 = 0x5741;
const TRACKS: u32 = 0x1654_AE6B;
const TRACK_ENTRY: u32 = 0xAE;
const TRACK_NUMBER: u32 = 0xD7;
const TRACK_UID: u32 = 0x73C5;
const TRACK_TYPE: u32 = 0x83;
const CODEC_ID: u32 = 0x86;
const AUDIO: u32 = 0xE1;
const SAMPLING_FREQUENCY: u32 = 0xB5;
const CHANNELS: u32 = 0x9F;
const BIT_DEPTH: u32 = 0x6264;
const CLUSTER: u32 = 0x1F43_B675;
const TIMECODE: u32 = 0xE7;
const SIMPLE_BLOCK: u32 = 0xA3;

const TRACK_TYPE_AUDIO: u64 = 2;
const PCM_CODEC: &str = "A_PCM/INT/LIT";
const APP_NAME: &str = concat!("audio-vault ", env!("CARGO_PKG_VERSION"));

/// Write an element ID; IDs already carry their length marker bits
pub fn write_ebml_id(buf: &mut Vec<u8>, id: u32) {
    let bytes = id.to_be_bytes();
    let skip = (id.leading_zeros() / 8).min(3) as usize;
    buf.extend_from_slice(&bytes[skip..]);
}

/// Write an element data size as a variable-length integer
pub fn write_ebml_size(buf: &mut Vec<u8>, size: u64) {
    if size <= 0x7E {
        buf.push((size | 0x80) as u8);
    } else if size <= 0x3FFE {
        buf.push(((size >> 8) | 0x40) as u8);
        buf.push(size as u8);
    } else if size <= 0x1F_FFFE {
        buf.push(((size >> 16) | 0x20) as u8);
        buf.push((size >> 8) as u8);
        buf.push(size as u8);
    } else if size <= 0x0FFF_FFFE {
        buf.push(((size >> 24) | 0x10) as u8);
        buf.push((size >> 16) as u8);
        buf.push((size >> 8) as u8);
        buf.push(size as u8);
    } else {
        buf.push(0x01);
        buf.extend_from_slice(&size.to_be_bytes()[1..]);
    }
}

/// Write the reserved "unknown size" marker
pub fn write_ebml_unknown_size(buf: &mut Vec<u8>) {
    buf.extend_from_slice(&[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
}

pub fn write_ebml_uint(buf: &mut Vec<u8>, id: u32, value: u64) {
    write_ebml_id(buf, id);
    let len = if value == 0 {
        1
    } else {
        (64 - value.leading_zeros()).div_ceil(8) as usize
    };
    write_ebml_size(buf, len as u64);
    buf.extend_from_slice(&value.to_be_bytes()[8 - len..]);
}

pub fn write_ebml_string(buf: &mut Vec<u8>, id: u32, value: &str) {
    write_ebml_binary(buf, id, value.as_bytes());
}

pub fn write_ebml_binary(buf: &mut Vec<u8>, id: u32, data: &[u8]) {
    write_ebml_id(buf, id);
    write_ebml_size(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

pub fn write_ebml_float(buf: &mut Vec<u8>, id: u32, value: f64) {
    write_ebml_id(buf, id);
    write_ebml_size(buf, 8);
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Write a master element whose children are already serialized
fn write_ebml_master(buf: &mut Vec<u8>, id: u32, children: &[u8]) {
    write_ebml_binary(buf, id, children);
}

/// Muxes interleaved 16-bit PCM into a single-track WebM stream
#[derive(Debug, Clone)]
pub struct PcmWebmWriter {
    sample_rate: u32,
    channels: u16,
    frames_written: u64,
}

impl PcmWebmWriter {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            frames_written: 0,
        }
    }

    /// Position of the next cluster in milliseconds
    pub fn position_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.frames_written * 1000 / u64::from(self.sample_rate)
    }

    /// EBML header plus the opening of the segment with info and tracks
    pub fn header(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128);

        let mut ebml = Vec::new();
        write_ebml_uint(&mut ebml, EBML_VERSION, 1);
        write_ebml_uint(&mut ebml, EBML_READ_VERSION, 1);
        write_ebml_uint(&mut ebml, EBML_MAX_ID_LENGTH, 4);
        write_ebml_uint(&mut ebml, EBML_MAX_SIZE_LENGTH, 8);
        write_ebml_string(&mut ebml, DOC_TYPE, "webm");
        write_ebml_uint(&mut ebml, DOC_TYPE_VERSION, 4);
        write_ebml_uint(&mut ebml, DOC_TYPE_READ_VERSION, 2);
        write_ebml_master(&mut buf, EBML, &ebml);

        write_ebml_id(&mut buf, SEGMENT);
        write_ebml_unknown_size(&mut buf);

        let mut info = Vec::new();
        write_ebml_uint(&mut info, TIMECODE_SCALE, 1_000_000);
        write_ebml_string(&mut info, MUXING_APP, APP_NAME);
        write_ebml_string(&mut info, WRITING_APP, APP_NAME);
        write_ebml_master(&mut buf, INFO, &info);

        let mut audio = Vec::new();
        write_ebml_float(&mut audio, SAMPLING_FREQUENCY, f64::from(self.sample_rate));
        write_ebml_uint(&mut audio, CHANNELS, u64::from(self.channels));
        write_ebml_uint(&mut audio, BIT_DEPTH, 16);

        let mut entry = Vec::new();
        write_ebml_uint(&mut entry, TRACK_NUMBER, 1);
        write_ebml_uint(&mut entry, TRACK_UID, 1);
        write_ebml_uint(&mut entry, TRACK_TYPE, TRACK_TYPE_AUDIO);
        write_ebml_string(&mut entry, CODEC_ID, PCM_CODEC);
        write_ebml_master(&mut entry, AUDIO, &audio);

        let mut tracks = Vec::new();
        write_ebml_master(&mut tracks, TRACK_ENTRY, &entry);
        write_ebml_master(&mut buf, TRACKS, &tracks);

        buf
    }

    /// One cluster holding a single keyframe block with `samples`.
    ///
    /// Trailing samples that do not fill a whole frame are dropped.
    pub fn cluster(&mut self, samples: &[i16]) -> Vec<u8> {
        let channels = usize::from(self.channels);
        let whole = samples.len() - samples.len() % channels;
        let samples = &samples[..whole];

        let mut block = Vec::with_capacity(4 + samples.len() * 2);
        block.push(0x81); // track number 1 as a vint
        block.extend_from_slice(&0i16.to_be_bytes());
        block.push(0x80); // keyframe
        for sample in samples {
            block.extend_from_slice(&sample.to_le_bytes());
        }

        let mut cluster = Vec::with_capacity(block.len() + 16);
        write_ebml_uint(&mut cluster, TIMECODE, self.position_ms());
        write_ebml_binary(&mut cluster, SIMPLE_BLOCK, &block);

        let mut buf = Vec::with_capacity(cluster.len() + 12);
        write_ebml_master(&mut buf, CLUSTER, &cluster);

        self.frames_written += (samples.len() / channels) as u64;
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recording::AudioMimeType;

    #[test]
    fn ids_are_written_without_leading_zero_bytes() {
        let mut buf = Vec::new();
        write_ebml_id(&mut buf, 0xA3);
        write_ebml_id(&mut buf, 0x4286);
        write_ebml_id(&mut buf, 0x2AD7B1);
        write_ebml_id(&mut buf, 0x1A45DFA3);
        assert_eq!(
            buf,
            vec![0xA3, 0x42, 0x86, 0x2A, 0xD7, 0xB1, 0x1A, 0x45, 0xDF, 0xA3]
        );
    }

    #[test]
    fn sizes_use_shortest_vint() {
        let mut buf = Vec::new();
        write_ebml_size(&mut buf, 5);
        assert_eq!(buf, vec![0x85]);

        buf.clear();
        write_ebml_size(&mut buf, 0x7F);
        assert_eq!(buf, vec![0x40, 0x7F]);

        buf.clear();
        write_ebml_size(&mut buf, 0x4000);
        assert_eq!(buf, vec![0x20, 0x40, 0x00]);
    }

    #[test]
    fn uint_uses_minimal_bytes() {
        let mut buf = Vec::new();
        write_ebml_uint(&mut buf, TRACK_NUMBER, 0);
        assert_eq!(buf, vec![0xD7, 0x81, 0x00]);

        buf.clear();
        write_ebml_uint(&mut buf, TIMECODE_SCALE, 1_000_000);
        assert_eq!(buf, vec![0x2A, 0xD7, 0xB1, 0x83, 0x0F, 0x42, 0x40]);
    }

    #[test]
    fn header_declares_webm_doctype() {
        let header = PcmWebmWriter::new(48_000, 1).header();
        assert_eq!(AudioMimeType::sniff(&header), Some(AudioMimeType::Webm));
        assert!(header.windows(4).any(|w| w == b"webm"));
        assert!(header.windows(PCM_CODEC.len()).any(|w| w == PCM_CODEC.as_bytes()));
    }

    #[test]
    fn cluster_advances_timecode() {
        let mut writer = PcmWebmWriter::new(1000, 1);
        let first = writer.cluster(&[0; 250]);
        assert_eq!(writer.position_ms(), 250);
        let second = writer.cluster(&[0; 250]);
        assert_eq!(writer.position_ms(), 500);

        assert_eq!(&first[..4], &[0x1F, 0x43, 0xB6, 0x75]);
        assert_eq!(first.len(), second.len());
        assert_ne!(first, second);
    }

    #[test]
    fn cluster_drops_partial_frames() {
        let mut writer = PcmWebmWriter::new(1000, 2);
        writer.cluster(&[1, 2, 3]);
        assert_eq!(writer.position_ms(), 1);
    }
}
