//! Drives one export from submission to a terminal outcome.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;

use super::capability::ExportCapability;
use super::domain::{export_path, ExportDomain};
use super::types::{ExportFormat, ExportJob, ExportOutcome, ExportPhase, ExportRequest, ExportStatus};
use crate::config::ExportPollConfig;
use crate::errors::{ServiceError, ServiceResult};

/// Shell navigation hook fired after a verified export
pub trait ExportNavigator: Send + Sync {
    fn reveal_export(&self, path: &Path);
}

/// Clears the in-flight flag on every exit path
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ExportJobCoordinator {
    capability: Arc<dyn ExportCapability>,
    navigator: Arc<dyn ExportNavigator>,
    documents_dir: PathBuf,
    poll: ExportPollConfig,
    in_flight: AtomicBool,
    phase: watch::Sender<ExportPhase>,
}

impl ExportJobCoordinator {
    pub fn new(
        capability: Arc<dyn ExportCapability>,
        navigator: Arc<dyn ExportNavigator>,
        documents_dir: PathBuf,
        poll: ExportPollConfig,
    ) -> Self {
        let (phase, _) = watch::channel(ExportPhase::Idle);
        Self {
            capability,
            navigator,
            documents_dir,
            poll,
            in_flight: AtomicBool::new(false),
            phase,
        }
    }

    pub fn domain(&self) -> ExportDomain {
        self.capability.domain()
    }

    pub fn subscribe(&self) -> watch::Receiver<ExportPhase> {
        self.phase.subscribe()
    }

    /// Export the selected ids and wait for the job to finish.
    ///
    /// An empty selection is a no-op. On completion the selection is cleared;
    /// a completed job that wrote zero records is reported as
    /// `NoRecordsExported`, not success. `ServiceError::Timeout` means the job
    /// was still running when polling gave up and may still complete.
    pub async fn export_selected_items(
        &self,
        selection: &mut BTreeSet<String>,
        include_blobs: bool,
        format: ExportFormat,
        auth_token: &str,
    ) -> ServiceResult<ExportOutcome> {
        if selection.is_empty() {
            log::debug!("Export requested with empty selection, nothing to do");
            return Ok(ExportOutcome::NoSelection);
        }
        let _in_flight = InFlight::acquire(&self.in_flight).ok_or(ServiceError::ExportInProgress)?;

        let result = self.run(selection, include_blobs, format, auth_token).await;
        self.phase.send_replace(match &result {
            Ok(_) => ExportPhase::Succeeded,
            Err(ServiceError::Timeout { .. }) => ExportPhase::TimedOut,
            Err(_) => ExportPhase::Failed,
        });
        result
    }

    async fn run(
        &self,
        selection: &mut BTreeSet<String>,
        include_blobs: bool,
        format: ExportFormat,
        auth_token: &str,
    ) -> ServiceResult<ExportOutcome> {
        let domain = self.domain();
        let target_path = export_path(&self.documents_dir, domain, &format, Utc::now());
        if let Some(dir) = target_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let request = ExportRequest {
            ids: selection.iter().cloned().collect(),
            include_blobs,
            format,
            target_path,
            auth_token: auth_token.to_string(),
        };

        self.phase.send_replace(ExportPhase::Submitting);
        let mut job = self.capability.submit(&request).await?;
        log::info!(
            "Export job {} submitted for {} {} ({:?})",
            job.id,
            request.ids.len(),
            domain,
            job.status
        );

        let mut attempts = 0;
        loop {
            match job.status {
                ExportStatus::Completed => return Ok(self.finish(job, request.target_path, selection)),
                ExportStatus::Failed => {
                    let message = job
                        .error_message
                        .unwrap_or_else(|| "export failed without a message".to_string());
                    log::error!("Export job {} failed: {}", job.id, message);
                    return Err(ServiceError::JobFailed { job_id: job.id, message });
                }
                ExportStatus::Requested | ExportStatus::InProgress => {}
            }

            if attempts >= self.poll.max_attempts {
                log::warn!("Export job {} still {:?} after {} checks", job.id, job.status, attempts);
                return Err(ServiceError::Timeout { job_id: job.id, attempts });
            }
            attempts += 1;
            self.phase.send_replace(ExportPhase::Polling { attempt: attempts });
            tokio::time::sleep(self.poll.interval).await;
            job = self.capability.poll(job.id).await?;
        }
    }

    fn finish(&self, job: ExportJob, path: PathBuf, selection: &mut BTreeSet<String>) -> ExportOutcome {
        selection.clear();
        match job.total_entities {
            Some(total) if total > 0 => {
                log::info!("Export job {} wrote {} records to {}", job.id, total, path.display());
                self.navigator.reveal_export(&path);
                ExportOutcome::Exported {
                    job_id: job.id,
                    path,
                    total_entities: total,
                }
            }
            _ => {
                log::warn!("Export job {} completed with no records", job.id);
                ExportOutcome::NoRecordsExported { job_id: job.id, path }
            }
        }
    }
}
