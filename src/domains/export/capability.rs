use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use super::domain::ExportDomain;
use super::types::{ExportByIdsOptions, ExportJob, ExportRequest, JobEnvelope};
use crate::errors::ServiceResult;
use crate::ffi::{EngineCall, EngineClient};

/// Submit/poll access to one domain's export jobs
#[async_trait]
pub trait ExportCapability: Send + Sync {
    fn domain(&self) -> ExportDomain;

    async fn submit(&self, request: &ExportRequest) -> ServiceResult<ExportJob>;

    async fn poll(&self, job_id: Uuid) -> ServiceResult<ExportJob>;
}

#[derive(Debug, Serialize)]
struct JobStatusRequest {
    job_id: Uuid,
}

/// Export capability backed by the engine's by-ids export entry points
#[derive(Clone)]
pub struct EngineExportCapability {
    domain: ExportDomain,
    client: EngineClient,
}

impl EngineExportCapability {
    pub fn new(domain: ExportDomain, client: EngineClient) -> Self {
        Self { domain, client }
    }
}

#[async_trait]
impl ExportCapability for EngineExportCapability {
    fn domain(&self) -> ExportDomain {
        self.domain
    }

    async fn submit(&self, request: &ExportRequest) -> ServiceResult<ExportJob> {
        let options = ExportByIdsOptions::from(request);
        let envelope: JobEnvelope = self
            .client
            .call_json(EngineCall::ExportByIds(self.domain), &options, Some(&request.auth_token))
            .await?;
        Ok(envelope.job)
    }

    async fn poll(&self, job_id: Uuid) -> ServiceResult<ExportJob> {
        let envelope: JobEnvelope = self
            .client
            .call_json(EngineCall::GetExportStatus, &JobStatusRequest { job_id }, None)
            .await?;
        Ok(envelope.job)
    }
}
