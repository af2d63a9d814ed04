//! `assetlens watch <DIR>`: treat the newest image in a directory as a live camera.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use assetlens_core::Notification;
use assetlens_media::{capture_loop, DirectorySource};
use assetlens_pipeline::{Admission, AnalysisPipeline};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::render::{note_info, print_notification, render_findings};

pub async fn run(pipeline: &AnalysisPipeline, dir: &Path, interval: Duration) -> Result<()> {
    let cancel = CancellationToken::new();
    let printer = tokio::spawn(print_results(pipeline.subscribe(), cancel.clone()));

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    note_info(&format!("Watching {} (Ctrl-C to stop)", dir.display()));
    let mut source = DirectorySource::new(dir);
    capture_loop(&mut source, interval, cancel.clone(), |frame| match pipeline.submit_frame(frame) {
        Ok(Admission::Queued) => debug!("Frame queued"),
        Ok(Admission::Skipped(reason)) => debug!(%reason, "Frame skipped"),
        Err(e) => warn!(error = %e, "Frame rejected"),
    })
    .await;

    pipeline.cancel_retry();
    cancel.cancel();
    let _ = printer.await;
    Ok(())
}

async fn print_results(
    mut rx: tokio::sync::broadcast::Receiver<Notification>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(Notification::AnalysisComplete { findings }) => print!("{}", render_findings(&findings)),
                Ok(other) => print_notification(&other),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = cancel.cancelled() => break,
        }
    }
}
