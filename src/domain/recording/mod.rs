//! Recording domain: metadata records and audio payloads

mod metadata;
mod payload;

pub use metadata::{
    file_name_for, name_from_file, InvalidRecord, MetadataRecord, SortKey, SortKeyParseError,
};
pub use payload::{human_readable_size, AudioMimeType, AudioPayload, WEBM_MAGIC};
