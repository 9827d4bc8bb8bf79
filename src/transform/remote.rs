//! Transformer backed by an external HTTP endpoint.
//!
//! The origin bytes are POSTed to the endpoint with the parameters in the
//! query string (`w`, `h`, `f`, `q`, `fit`). Any 2xx response body is taken as
//! the derivative, with whatever content type the endpoint reports.
//!
//! Since the endpoint receives bytes rather than an asset URL, it never calls
//! back into the gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;
use url::Url;

use super::{TransformInput, TransformOutput, Transformer};
use crate::error::TransformError;
use crate::params::TransformParameters;

/// `Accept` value sent when the caller did not provide one.
pub const DEFAULT_ACCEPT: &str = "image/*";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Delegates transformation to an external service.
#[derive(Debug, Clone)]
pub struct RemoteTransformer {
    client: reqwest::Client,
    endpoint: Url,
}

impl RemoteTransformer {
    /// Create a transformer for `endpoint` with a 30 second request timeout.
    pub fn new(endpoint: Url) -> Result<Self, TransformError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| TransformError::Connection(e.to_string()))?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Create a transformer using an existing client.
    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The endpoint URL with `params` appended as query pairs.
    fn request_url(&self, params: &TransformParameters) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(w) = params.width {
                pairs.append_pair("w", &w.to_string());
            }
            if let Some(h) = params.height {
                pairs.append_pair("h", &h.to_string());
            }
            if let Some(f) = params.format {
                pairs.append_pair("f", f.as_str());
            }
            if let Some(q) = params.quality {
                pairs.append_pair("q", &q.to_string());
            }
            if let Some(fit) = params.fit {
                pairs.append_pair("fit", fit.as_str());
            }
        }
        url
    }
}

#[async_trait]
impl Transformer for RemoteTransformer {
    async fn transform(
        &self,
        input: TransformInput,
        params: &TransformParameters,
    ) -> Result<TransformOutput, TransformError> {
        let url = self.request_url(params);
        let accept = input.accept.as_deref().unwrap_or(DEFAULT_ACCEPT);

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, input.content_type.as_str())
            .header(ACCEPT, accept)
            .body(input.bytes)
            .send()
            .await
            .map_err(|e| TransformError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransformError::Remote {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransformError::Connection(e.to_string()))?;

        debug!(
            asset_id = %input.asset_id,
            size = bytes.len(),
            content_type = content_type.as_deref().unwrap_or("-"),
            "Remote transform completed"
        );

        Ok(TransformOutput {
            bytes,
            content_type,
        })
    }
}
