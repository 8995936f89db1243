//! Audio Vault - local-first audio recording library
//!
//! Captures microphone audio, stores each recording as `<name>.webm` in an
//! audio directory and keeps a reactive, schema-versioned metadata store
//! describing every recording.
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Schema descriptors and fingerprints, metadata records,
//!   payloads, the capture lifecycle and configuration values
//! - **Application**: Metadata store, schema registry, capture controller,
//!   session coordinator and the port traits they depend on
//! - **Infrastructure**: Adapters for JSON persistence, the audio directory,
//!   XDG config and audio devices (cpal microphone, channel-fed device)
//! - **CLI**: Command-line interface, argument parsing, logging and signals

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
