//! # heic2raster
//!
//! Upload HEIC/HEIF photos, convert them to JPEG or PNG, and hand back a
//! download link.
//!
//! ## Why this crate?
//!
//! Phones save photos as HEIC, and much of the web still cannot show them.
//! This crate is the orchestration around the conversion: it persists
//! uploads, runs the decoder, tracks each attempt as a job, stores the
//! results, and keeps the download catalog in sync with what is on disk.
//! The decode itself is pluggable through [`Converter`].
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload / inbox entry
//!  │
//!  ├─ 1. Ingest   validate extension, write to inbox (atomic rename)
//!  ├─ 2. Job      pending → converting
//!  ├─ 3. Convert  Converter adapter (heif-convert, or in-process `image`)
//!  ├─ 4. Store    derived name → outbox (atomic rename)
//!  └─ 5. Report   job → converted | failed; batch → {succeeded, failed[]}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use heic2raster::{ImageConverter, Orchestrator, ServiceConfig, TargetFormat};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .inbox_dir("uploads")
//!         .outbox_dir("converted")
//!         .converter(Arc::new(ImageConverter::default()))
//!         .build()?;
//!     let orchestrator = Orchestrator::new(config);
//!     orchestrator.storage().ensure_directories().await?;
//!
//!     let bytes = std::fs::read("IMG_0001.heic")?;
//!     let source = orchestrator.ingest("IMG_0001.heic", &bytes).await?;
//!     let artifact = orchestrator.convert_one(&source, TargetFormat::Png).await?;
//!     println!("{} -> {}", source.name, artifact.locator);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `heic2raster` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when embedding only the library:
//! ```toml
//! heic2raster = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;
pub mod storage;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::{router, serve, AppState};
pub use catalog::ArtifactCatalog;
pub use config::{ServiceConfig, ServiceConfigBuilder, TargetFormat};
pub use convert::{FileOutcome, Orchestrator, Submission};
pub use error::{ErrorKind, FileFailure, HeicError};
pub use job::{ConversionJob, JobId, JobStatus};
pub use output::{Artifact, ArtifactEntry, BatchReport, ClearReport, SourceFile, SourceId};
pub use pipeline::adapter::{CommandConverter, Converter, ConverterError, ImageConverter};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{SessionEntry, SessionView};
pub use storage::StorageManager;
pub use stream::{convert_stream, BatchStream};
