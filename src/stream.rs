//! Streaming batch API: emit per-file outcomes as they complete.
//!
//! [`crate::convert::Orchestrator::convert_all`] only returns once every
//! inbox entry has been attempted. [`convert_stream`] yields a
//! [`FileOutcome`] per entry instead, so callers can print or forward
//! results while slower files are still converting. Outcomes arrive in
//! completion order; sort by `source` if order matters.

use crate::config::TargetFormat;
use crate::convert::{FileOutcome, Orchestrator};
use crate::error::HeicError;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file batch outcomes.
pub type BatchStream = Pin<Box<dyn Stream<Item = FileOutcome> + Send>>;

/// Convert every inbox entry, streaming outcomes as they are ready.
///
/// The inbox is listed once, up front; entries added afterwards are not part
/// of this batch. Listing failure is the only `Err`.
///
/// Progress callbacks fire per file exactly as for the eager batch, except
/// `on_batch_complete`, which has no natural point in a stream the caller may
/// drop early.
///
/// # Example
/// ```rust,no_run
/// use heic2raster::{convert_stream, Orchestrator, ServiceConfig, TargetFormat};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let orchestrator = Arc::new(Orchestrator::new(ServiceConfig::default()));
/// let mut outcomes = convert_stream(&orchestrator, TargetFormat::Png).await?;
/// while let Some(outcome) = outcomes.next().await {
///     match outcome.result {
///         Ok(artifact) => println!("{} -> {}", outcome.source, artifact.locator),
///         Err(failure) => eprintln!("{failure}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream(
    orchestrator: &Arc<Orchestrator>,
    format: TargetFormat,
) -> Result<BatchStream, HeicError> {
    let entries = orchestrator.storage().list_inbox().await?;
    let concurrency = orchestrator.config().concurrency;
    info!(total = entries.len(), format = %format, "Starting streaming batch conversion");

    if let Some(ref cb) = orchestrator.config().progress_callback {
        cb.on_batch_start(entries.len());
    }

    let orchestrator = Arc::clone(orchestrator);
    let s = stream::iter(entries.into_iter().map(move |entry| {
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.convert_entry(entry, format).await }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use crate::pipeline::adapter::{Converter, ConverterError};
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    struct FailOnB;

    #[async_trait]
    impl Converter for FailOnB {
        fn name(&self) -> &str {
            "fail-on-b"
        }

        async fn convert(&self, source: &Path, _format: TargetFormat) -> Result<Vec<u8>, ConverterError> {
            if source.ends_with("b.heic") {
                Err(ConverterError::new("corrupt"))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    #[tokio::test]
    async fn yields_one_outcome_per_entry() {
        let tmp = TempDir::new().unwrap();
        let config = ServiceConfig::builder()
            .inbox_dir(tmp.path().join("in"))
            .outbox_dir(tmp.path().join("out"))
            .concurrency(2)
            .converter(Arc::new(FailOnB))
            .build()
            .unwrap();
        let orch = Arc::new(Orchestrator::new(config));
        orch.storage().ensure_directories().await.unwrap();
        for name in ["a.heic", "b.heic", "c.heic"] {
            orch.ingest(name, b"x").await.unwrap();
        }

        let mut outcomes: Vec<FileOutcome> = convert_stream(&orch, TargetFormat::Jpeg)
            .await
            .unwrap()
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.source.cmp(&b.source));

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].result.as_ref().unwrap().name, "a.jpeg");
        assert_eq!(outcomes[1].result.as_ref().unwrap_err().reason, "corrupt");
        assert!(outcomes[2].result.is_ok());
        assert!(outcomes.iter().all(|o| o.job_id.is_some()));
    }
}
