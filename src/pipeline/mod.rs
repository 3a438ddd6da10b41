//! Pipeline stages for turning one inbox entry into one outbox artifact.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the adapter can be swapped without touching naming or storage.
//!
//! ## Data Flow
//!
//! ```text
//! naming ──▶ adapter ──▶ (decode ──▶ encode)
//! (name)     (opaque)     ImageConverter only
//! ```
//!
//! 1. [`naming`]: derive the outbox name from the inbox name and format
//! 2. [`adapter`]: the [`adapter::Converter`] seam: source path + format in,
//!    encoded bytes or a verbatim failure message out
//! 3. [`encode`]: `DynamicImage` → JPEG/PNG bytes, used by the in-process
//!    adapter; runs inside `spawn_blocking`

pub mod adapter;
pub mod encode;
pub mod naming;
