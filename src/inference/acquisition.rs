//! Model acquisition fallback
//!
//! Pulls a missing model and relays the formatted progress into the
//! client's stream as notices.

use crate::llm::{format_progress_line, AcquisitionError, ModelCache, ModelRuntime};
use crate::stream::TokenSink;

pub const DOWNLOAD_NOTICE: &str = "Model not found locally. Downloading the model, please wait...";
pub const DOWNLOAD_COMPLETE: &str = "Download completed!";

/// Pull `model`, streaming progress lines into `sink`.
///
/// The handle cache is cleared afterwards either way, so the next request
/// resolves the model afresh.
pub async fn acquire(
    runtime: &dyn ModelRuntime,
    cache: &ModelCache,
    model: &str,
    sink: &mut TokenSink,
) -> Result<(), AcquisitionError> {
    let result = runtime
        .pull(model, &mut |line: String| {
            let mut progress = format_progress_line(&line);
            progress.push('\n');
            sink.notice(&progress);
        })
        .await;

    let dropped = cache.clear().await;
    tracing::debug!(dropped, "Cleared model handles after pull");

    match result {
        Ok(()) => {
            tracing::info!(model = %model, "Model acquired");
            sink.notice(DOWNLOAD_COMPLETE);
            Ok(())
        }
        Err(e) => {
            tracing::error!(model = %model, error = %e, "Model acquisition failed");
            sink.notice(&format!("Download failed: {}", e));
            Err(e)
        }
    }
}
