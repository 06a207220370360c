// src/ffi/client.rs
// =============================================================================
// TYPED ENGINE CLIENT
// =============================================================================
// Wraps an `EngineBridge` with the conventions every call site shares:
//   (1) encode the request as JSON,
//   (2) invoke the entry point on tokio's blocking pool so the coordinator's
//       execution context never waits on the engine,
//   (3) copy the response body out and release the engine buffer on that same
//       thread, together with the engine's last-error detail,
//   (4) classify the status / error envelope and decode the payload.
// -----------------------------------------------------------------------------

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{EngineErrorPayload, ErrorCode};
use super::{EngineBridge, EngineCall};
use crate::errors::{ServiceError, ServiceResult};

/// Engine reply with the body already copied out of the engine buffer
#[derive(Debug, Clone)]
pub struct EngineReply {
    pub call: EngineCall,
    pub status: i32,
    pub body: Option<String>,
    pub last_error: Option<String>,
}

impl EngineReply {
    /// Error envelope written into the body, if any
    pub fn error_envelope(&self) -> Option<EngineErrorPayload> {
        self.body.as_deref().and_then(EngineErrorPayload::parse)
    }

    pub fn is_success(&self) -> bool {
        self.status == ErrorCode::Success as i32 && self.error_envelope().is_none()
    }

    /// Best message available for a failed call
    pub fn best_message(&self) -> String {
        if let Some(envelope) = self.error_envelope() {
            return envelope.full_message();
        }
        match &self.last_error {
            Some(detail) if !detail.trim().is_empty() => detail.clone(),
            _ => ErrorCode::describe(self.status),
        }
    }

    pub fn into_rejection(self) -> ServiceError {
        let code = match (self.status, self.error_envelope()) {
            (0, Some(envelope)) => envelope.status(),
            (status, _) => status,
        };
        ServiceError::EngineRejected {
            call: self.call.symbol().to_string(),
            code,
            message: self.best_message(),
        }
    }
}

#[derive(Clone)]
pub struct EngineClient {
    bridge: Arc<dyn EngineBridge>,
}

impl EngineClient {
    pub fn new(bridge: Arc<dyn EngineBridge>) -> Self {
        Self { bridge }
    }

    pub fn encode<T: Serialize + ?Sized>(call: EngineCall, request: &T) -> ServiceResult<String> {
        serde_json::to_string(request).map_err(|e| ServiceError::Encode {
            call: call.symbol().to_string(),
            message: e.to_string(),
        })
    }

    /// Invoke `call` off the current task and return the raw reply.
    pub async fn send(
        &self,
        call: EngineCall,
        payload: String,
        auth_token: Option<String>,
    ) -> ServiceResult<EngineReply> {
        let bridge = Arc::clone(&self.bridge);
        log::debug!("Engine call {} ({} bytes)", call, payload.len());

        let joined = tokio::task::spawn_blocking(move || {
            let raw = bridge.invoke(call, &payload, auth_token.as_deref());
            let status = raw.status;
            let body = match raw.buffer {
                // Buffer is released at the end of this arm, on this thread
                Some(buffer) => match buffer.to_str() {
                    Ok(text) => Some(text.to_owned()),
                    Err(e) => {
                        return Err(ServiceError::Decode {
                            call: call.symbol().to_string(),
                            message: format!("response is not valid UTF-8: {}", e),
                        })
                    }
                },
                None => None,
            };
            let last_error = if status != ErrorCode::Success as i32 {
                bridge.last_error()
            } else {
                None
            };
            Ok(EngineReply { call, status, body, last_error })
        })
        .await
        .map_err(|e| ServiceError::Transport {
            call: call.symbol().to_string(),
            message: format!("engine task did not complete: {}", e),
        })?;

        let reply = joined?;
        if reply.status != ErrorCode::Success as i32 {
            log::debug!("Engine call {} returned {}", call, ErrorCode::describe(reply.status));
        }
        Ok(reply)
    }

    /// Encode, invoke, classify and decode in one step.
    pub async fn call_json<Req, Resp>(
        &self,
        call: EngineCall,
        request: &Req,
        auth_token: Option<&str>,
    ) -> ServiceResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = Self::encode(call, request)?;
        let reply = self.send(call, payload, auth_token.map(str::to_owned)).await?;
        Self::decode(reply)
    }

    /// Like [`call_json`](Self::call_json) for entry points that take no request.
    pub async fn fetch<Resp: DeserializeOwned>(&self, call: EngineCall) -> ServiceResult<Resp> {
        let reply = self.send(call, String::new(), None).await?;
        Self::decode(reply)
    }

    /// Invoke a status-only entry point.
    pub async fn call_status<Req: Serialize + ?Sized>(&self, call: EngineCall, request: &Req) -> ServiceResult<()> {
        let payload = Self::encode(call, request)?;
        let reply = self.send(call, payload, None).await?;
        if reply.is_success() {
            Ok(())
        } else {
            Err(reply.into_rejection())
        }
    }

    pub fn decode<Resp: DeserializeOwned>(reply: EngineReply) -> ServiceResult<Resp> {
        if !reply.is_success() {
            return Err(reply.into_rejection());
        }
        let call = reply.call;
        let body = reply.body.ok_or_else(|| ServiceError::Decode {
            call: call.symbol().to_string(),
            message: "engine returned no response body".to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| ServiceError::Decode {
            call: call.symbol().to_string(),
            message: e.to_string(),
        })
    }
}
