//! Content fetching seam.
//!
//! The engine never talks HTTP directly; it goes through [`ContentFetcher`]
//! so tests can wire in-memory gateways. The HTTP implementation surfaces
//! the two gateway headers the pipeline cares about: the ArNS resolution
//! result and the served content digest.

use crate::error::VerificationError;
use std::future::Future;
use std::time::Duration;

/// Gateway header carrying the transaction ID an ArNS name resolved to.
pub const RESOLVED_ID_HEADER: &str = "x-arns-resolved-id";

/// Gateway header carrying the hex SHA-256 digest of the served body.
pub const DIGEST_HEADER: &str = "x-ar-io-digest";

/// Timeout for a single content fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A fetched response body plus the headers the pipeline inspects.
#[derive(Clone, Debug, Default)]
pub struct FetchedContent {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    /// `x-arns-resolved-id`, when the gateway resolved a name.
    pub resolved_id: Option<String>,
    /// `x-ar-io-digest`, when the gateway attests the body digest.
    pub digest: Option<String>,
}

/// Fetches content from gateways. Tests substitute in-memory fakes.
///
/// Futures are required to be `Send` because engine runs execute inside
/// spawned worker tasks.
pub trait ContentFetcher: Send + Sync {
    /// GET the full body.
    fn fetch(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FetchedContent, VerificationError>> + Send;

    /// HEAD request: headers only, empty body.
    fn head(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FetchedContent, VerificationError>> + Send;
}

#[derive(Clone, Debug)]
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn content_from_headers(response: &reqwest::Response) -> FetchedContent {
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        FetchedContent {
            body: Vec::new(),
            content_type: header("content-type"),
            resolved_id: header(RESOLVED_ID_HEADER),
            digest: header(DIGEST_HEADER),
        }
    }
}

impl Default for HttpContentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentFetcher for HttpContentFetcher {
    fn fetch(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FetchedContent, VerificationError>> + Send {
        let request = self.client.get(url).timeout(FETCH_TIMEOUT);
        async move {
            let response = request
                .send()
                .await
                .map_err(|e| VerificationError::Fetch(e.to_string()))?
                .error_for_status()
                .map_err(|e| VerificationError::Fetch(e.to_string()))?;

            let mut content = Self::content_from_headers(&response);
            content.body = response
                .bytes()
                .await
                .map_err(|e| VerificationError::Fetch(e.to_string()))?
                .to_vec();
            Ok(content)
        }
    }

    fn head(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FetchedContent, VerificationError>> + Send {
        let request = self.client.head(url).timeout(FETCH_TIMEOUT);
        async move {
            let response = request
                .send()
                .await
                .map_err(|e| VerificationError::Fetch(e.to_string()))?
                .error_for_status()
                .map_err(|e| VerificationError::Fetch(e.to_string()))?;

            Ok(Self::content_from_headers(&response))
        }
    }
}
