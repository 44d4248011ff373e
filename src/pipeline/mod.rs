//! Pipeline stages for RAW-to-PNG conversion.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the external decoders can be swapped for stubs.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ decode (presets) ──▶ encode ──▶ output file
//!              │ all presets failed
//!              └──▶ fallback ──▶ encode
//! ```
//!
//! 1. [`input`]: resolve a path or URL; read the RAW bytes
//! 2. [`decode`]: run decoder presets in order, first non-empty wins
//! 3. [`fallback`]: lenient container decode of the original bytes
//! 4. [`encode`]: PNG encode and atomic write

pub mod decode;
pub mod encode;
pub mod fallback;
pub mod input;
