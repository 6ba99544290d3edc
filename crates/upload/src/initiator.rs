//! Upload session creation.

use reqwest::Url;
use resumable_protocol::{ApiErrorBody, ProtocolError, StateRecord};
use tracing::{debug, warn};

use crate::error::{TransportError, UploadError};
use crate::transport::{HttpReply, InitiationRequest, UploadTransport};

const LOCATION: &str = "Location";

/// Creates upload sessions at a fixed endpoint.
#[derive(Debug, Clone)]
pub struct SessionInitiator {
    endpoint: String,
}

impl SessionInitiator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Requests a new session for the upload described by `state` and
    /// returns its URL.
    ///
    /// Every call creates an independent session on the service, so callers
    /// only invoke this while `state` has no session URL yet.
    pub async fn initiate(
        &self,
        transport: &dyn UploadTransport,
        state: &StateRecord,
    ) -> Result<String, UploadError> {
        let metadata = serde_json::to_vec(&state.resource_metadata)?;
        let request = InitiationRequest {
            endpoint: self.endpoint.clone(),
            token: state.credential_token.clone(),
            metadata,
            upload_content_length: state.total_size,
            upload_content_type: state.content_type.clone(),
        };

        let reply = transport.send_initiation(request).await?;
        let session_url = self.classify(reply)?;
        debug!(session_url = %session_url, "upload session created");
        Ok(session_url)
    }

    fn classify(&self, reply: HttpReply) -> Result<String, UploadError> {
        if reply.is_success() {
            if let Some(location) = reply.header(LOCATION) {
                return self.resolve(location);
            }
        }

        if let Ok(body) = serde_json::from_slice::<ApiErrorBody>(&reply.body) {
            let api = body.error;
            if reply.status == 401 || api.is_auth_rejection() {
                warn!(status = reply.status, error = %api, "initiation rejected credentials");
                return Err(UploadError::Auth(api.to_string()));
            }
            if reply.status < 500 {
                warn!(status = reply.status, error = %api, "initiation rejected metadata");
                return Err(UploadError::Metadata(api));
            }
        }

        if reply.is_success() {
            return Err(ProtocolError::MissingHeader(LOCATION).into());
        }
        if reply.status == 401 {
            return Err(UploadError::Auth(reply.body_text()));
        }

        Err(TransportError::with_status(reply.status, reply.body_text()).into())
    }

    /// Resolves a possibly relative `Location` against the endpoint.
    fn resolve(&self, location: &str) -> Result<String, UploadError> {
        let malformed = || ProtocolError::MalformedHeader {
            header: LOCATION,
            value: location.to_string(),
        };
        if location.trim().is_empty() {
            return Err(malformed().into());
        }
        if let Ok(url) = Url::parse(location) {
            return Ok(url.to_string());
        }
        let base = Url::parse(&self.endpoint).map_err(|_| malformed())?;
        let url = base.join(location).map_err(|_| malformed())?;
        Ok(url.to_string())
    }
}
