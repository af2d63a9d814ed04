//! `assetlens analyze <IMAGE>`

use std::path::Path;

use anyhow::{bail, Context, Result};
use assetlens_core::Notification;
use assetlens_media::decode_upload;
use assetlens_pipeline::{Admission, AnalysisPipeline};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::render::{note_warn, print_notification, render_findings};

pub async fn run(pipeline: &AnalysisPipeline, image: &Path) -> Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read image: {}", image.display()))?;
    analyze_bytes(pipeline, &bytes).await
}

/// Submit an uploaded image and print the findings once the analysis settles.
pub async fn analyze_bytes(pipeline: &AnalysisPipeline, bytes: &[u8]) -> Result<()> {
    let frame = decode_upload(bytes)?;
    let mut rx = pipeline.subscribe();
    match pipeline.submit_frame(frame)? {
        Admission::Queued => wait_for_analysis(&mut rx).await,
        Admission::Skipped(reason) => {
            note_warn(&format!("Not analyzed: {reason}"));
            Ok(())
        }
    }
}

/// Print notifications until the analysis completes or fails.
pub async fn wait_for_analysis(rx: &mut broadcast::Receiver<Notification>) -> Result<()> {
    loop {
        let notification = match rx.recv().await {
            Ok(n) => n,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Notification receiver lagged");
                continue;
            }
            Err(RecvError::Closed) => bail!("Session closed before the analysis finished"),
        };
        print_notification(&notification);
        match notification {
            Notification::AnalysisComplete { findings } => {
                print!("{}", render_findings(&findings));
                return Ok(());
            }
            Notification::AnalysisFailed { message } => bail!(message),
            _ => {}
        }
    }
}
