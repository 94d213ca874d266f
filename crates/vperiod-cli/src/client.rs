//! Shared client utilities, error types, and the remote query gateway.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use tracing::debug;
use vperiod_api::{ProblemDetails, StateResponse};
use vperiod_chaincode::{
    ChaincodeInvocationSpec, GatewayError, GatewayResult, QueryGateway, QueryResponse,
    SYSTEM_INVOKER, VALIDITY_PERIOD_KEY, decode_validity_period,
};

use crate::cli::Cli;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<GatewayError> for CliError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected {
                status: Some(status),
                detail,
            } if status == StatusCode::BAD_REQUEST.as_u16() => Self::validation(detail),
            GatewayError::Rejected { status, detail } => Self::failure(anyhow!(
                "chaincode rejected query (status {}): {detail}",
                status.map_or_else(|| "none".to_string(), |s| s.to_string())
            )),
            GatewayError::Parse { reason, payload } => Self::failure(anyhow!(
                "gateway payload malformed ({reason}): {}",
                payload.unwrap_or_default()
            )),
            GatewayError::Transport { operation, source } => {
                Self::failure(anyhow!("gateway transport failure during {operation}: {source}"))
            }
        }
    }
}

/// HTTP client configured from CLI flags.
pub(crate) fn build_http_client(cli: &Cli, trace_id: &str) -> CliResult<Client> {
    let mut default_headers = HeaderMap::new();
    let request_id = HeaderValue::from_str(trace_id)
        .map_err(|_| CliError::failure(anyhow!("trace identifier contains invalid characters")))?;
    default_headers.insert(HEADER_REQUEST_ID, request_id);

    Client::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .default_headers(default_headers)
        .build()
        .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))
}

/// Parse the gateway URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Query gateway reached over HTTP.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: Url,
    chaincode_id: String,
    invoker_token: String,
}

impl GatewayClient {
    /// Client for `chaincode_id` behind the gateway at `base_url`, presenting
    /// the system invoker token.
    #[must_use]
    pub fn new(base_url: Url, chaincode_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            chaincode_id: chaincode_id.into(),
            invoker_token: SYSTEM_INVOKER.to_string(),
        }
    }

    /// Use a preconfigured HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Present a different invoker token.
    #[must_use]
    pub fn with_invoker_token(mut self, token: impl Into<String>) -> Self {
        self.invoker_token = token.into();
        self
    }

    /// Chaincode this client queries.
    #[must_use]
    pub fn chaincode_id(&self) -> &str {
        &self.chaincode_id
    }

    /// Base URL extended with escaped path segments.
    fn endpoint(&self, segments: &[&str]) -> GatewayResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Transport {
                operation: "gateway.url",
                source: format!("'{}' cannot be a base URL", self.base_url).into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Invoke the chaincode `query` function and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] when the request fails in flight and
    /// [`GatewayError::Rejected`] for non-success statuses.
    pub async fn query(&self, args: Vec<String>) -> GatewayResult<QueryResponse> {
        let spec = ChaincodeInvocationSpec::query(self.chaincode_id.clone(), args)
            .with_secure_context(self.invoker_token.clone());
        let response = self
            .client
            .post(self.endpoint(&["v1", "chaincode", "query"])?)
            .json(&spec)
            .send()
            .await
            .map_err(transport("gateway.query"))?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        response
            .json::<QueryResponse>()
            .await
            .map_err(|_| GatewayError::Parse {
                reason: "invalid_response",
                payload: None,
            })
    }

    /// Read a key straight from the peer's ledger, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] when the request fails in flight and
    /// [`GatewayError::Rejected`] for other non-success statuses.
    pub async fn get_state(
        &self,
        chaincode_id: &str,
        key: &str,
    ) -> GatewayResult<Option<StateResponse>> {
        let response = self
            .client
            .get(self.endpoint(&["v1", "state", chaincode_id, key])?)
            .send()
            .await
            .map_err(transport("gateway.get_state"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        response
            .json::<StateResponse>()
            .await
            .map(Some)
            .map_err(|_| GatewayError::Parse {
                reason: "invalid_response",
                payload: None,
            })
    }
}

#[async_trait]
impl QueryGateway for GatewayClient {
    async fn query_validity_period(&self) -> GatewayResult<i64> {
        let response = self.query(vec![VALIDITY_PERIOD_KEY.to_string()]).await?;
        debug!(chaincode_id = %self.chaincode_id, msg = %response.msg, "gateway query answered");
        decode_validity_period(response.msg.as_bytes())
    }
}

fn transport(operation: &'static str) -> impl FnOnce(reqwest::Error) -> GatewayError {
    move |source| GatewayError::Transport {
        operation,
        source: Box::new(source),
    }
}

/// Turn a non-success response into [`GatewayError::Rejected`], preferring the
/// problem document's detail.
async fn rejection(response: reqwest::Response) -> GatewayError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();
    let detail = serde_json::from_slice::<ProblemDetails>(&bytes)
        .ok()
        .map_or(body_text, |problem| problem.detail.unwrap_or(problem.title));
    GatewayError::Rejected {
        status: Some(status.as_u16()),
        detail,
    }
}
