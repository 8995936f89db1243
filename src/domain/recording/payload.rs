//! Audio payload value object

use std::fmt;

/// EBML header ID that opens every WebM file
pub const WEBM_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Supported audio container types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioMimeType {
    #[default]
    Webm,
}

impl AudioMimeType {
    /// Get the MIME type string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Webm => "audio/webm",
        }
    }

    /// Get the file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Webm => "webm",
        }
    }

    /// Number of leading bytes [`sniff`](Self::sniff) looks at
    pub const SNIFF_LEN: usize = WEBM_MAGIC.len();

    /// Detect the container from the leading bytes of a file
    pub fn sniff(head: &[u8]) -> Option<Self> {
        head.starts_with(&WEBM_MAGIC).then_some(Self::Webm)
    }
}

impl fmt::Display for AudioMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The assembled bytes of one finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    data: Vec<u8>,
    mime_type: AudioMimeType,
}

impl AudioPayload {
    /// Create a payload from raw bytes
    pub fn new(data: Vec<u8>, mime_type: AudioMimeType) -> Self {
        Self { data, mime_type }
    }

    /// Concatenate chunks in the order given.
    ///
    /// Container formats are only valid when chunks keep their capture order.
    pub fn from_chunks<I, C>(chunks: I, mime_type: AudioMimeType) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        let mut data = Vec::new();
        for chunk in chunks {
            data.extend_from_slice(chunk.as_ref());
        }
        Self { data, mime_type }
    }

    /// Get the raw bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume and return the raw bytes
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the MIME type
    pub fn mime_type(&self) -> AudioMimeType {
        self.mime_type
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Whether no bytes were captured
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get human-readable size string
    pub fn human_readable_size(&self) -> String {
        human_readable_size(self.data.len() as u64)
    }
}

/// Format a byte count as B/KB/MB
pub fn human_readable_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_as_str() {
        assert_eq!(AudioMimeType::Webm.as_str(), "audio/webm");
        assert_eq!(AudioMimeType::Webm.to_string(), "audio/webm");
    }

    #[test]
    fn sniff_requires_ebml_header() {
        assert_eq!(
            AudioMimeType::sniff(&[0x1A, 0x45, 0xDF, 0xA3, 0x9F]),
            Some(AudioMimeType::Webm)
        );
        assert_eq!(AudioMimeType::sniff(b"OggS"), None);
        assert_eq!(AudioMimeType::sniff(&[0x1A, 0x45]), None);
        assert_eq!(AudioMimeType::sniff(b""), None);
    }

    #[test]
    fn default_mime_type_is_webm() {
        assert_eq!(AudioMimeType::default(), AudioMimeType::Webm);
        assert_eq!(AudioMimeType::default().extension(), "webm");
    }

    #[test]
    fn from_chunks_preserves_order() {
        let chunks = vec![vec![1u8, 2], vec![3], vec![4, 5, 6]];
        let payload = AudioPayload::from_chunks(&chunks, AudioMimeType::Webm);
        assert_eq!(payload.data(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(payload.size_bytes(), 6);
    }

    #[test]
    fn from_no_chunks_is_empty() {
        let payload = AudioPayload::from_chunks(Vec::<Vec<u8>>::new(), AudioMimeType::Webm);
        assert!(payload.is_empty());
    }

    #[test]
    fn human_readable_sizes() {
        assert_eq!(human_readable_size(500), "500 B");
        assert_eq!(human_readable_size(2048), "2.0 KB");
        assert_eq!(human_readable_size(2 * 1024 * 1024), "2.0 MB");
    }
}
