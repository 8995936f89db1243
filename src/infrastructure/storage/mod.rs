//! File persistence adapters

mod audio_dir;

pub use audio_dir::AudioDirectory;
