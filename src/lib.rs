//! Purpose: Library crate for the fixed-width PIR record codec and the `pircodec` CLI.
//! Exports: `core` (scalar, record, batch codecs, container file, errors), `api` (stable surface).
//! Role: Pure, synchronous encode/decode of typed rows into 256-byte buffers.
//! Invariants: Every encoded record is exactly 256 bytes with zeroed padding.
//! Invariants: Schemas are explicit inputs to every decode; nothing is inferred from buffers.
pub mod api;
pub mod core;
