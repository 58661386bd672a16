//! HTTP transport for the collaborators.
//!
//! [`HttpApi`] implements every collaborator trait against the Sealpost
//! REST API. It is a thin layer: request shaping and status mapping only,
//! no retries.
//!
//! | Failure                       | Error                        |
//! |-------------------------------|------------------------------|
//! | connect / timeout / DNS       | `ServiceError::Unreachable`  |
//! | non-2xx status                | `ServiceError::Rejected`     |
//! | body not the expected JSON    | `ServiceError::Malformed`    |

mod accounts;
mod crypto;
mod messages;
mod users;

use reqwest::{RequestBuilder, Response, Url};
use sealpost_core::ServiceError;
use serde::{Deserialize, de::DeserializeOwned};

use crate::config::HttpConfig;

/// Client for the Sealpost REST API.
///
/// Clone is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpApi {
    base_url: Url,
    http: reqwest::Client,
}

/// Error body returned by the API on rejection.
#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

impl HttpApi {
    /// Build a client for `config`.
    ///
    /// # Errors
    ///
    /// `Malformed` if the base URL does not parse, `Unreachable` if the HTTP
    /// client cannot be constructed.
    pub fn new(config: &HttpConfig) -> Result<Self, ServiceError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| ServiceError::Malformed(format!("base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::Malformed(format!("base url: {base_url} cannot be a base")));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ServiceError::Unreachable(format!("client: {e}")))?;

        Ok(Self { base_url, http })
    }

    /// URL for `segments` under the base URL. Each segment is
    /// percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::Malformed("base url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ServiceError> {
        let response =
            request.send().await.map_err(|e| ServiceError::Unreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.detail)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());

        Err(ServiceError::Rejected { status: status.as_u16(), reason })
    }

    async fn parse_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        self.execute(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpApi {
        HttpApi::new(&HttpConfig::with_base_url(base)).unwrap()
    }

    #[test]
    fn endpoint_encodes_segments() {
        let url = api("http://localhost:8000").endpoint(&["users", "search", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/users/search/a%20b%2Fc");
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let url = api("http://api.test/v1/").endpoint(&["users", ""]).unwrap();
        assert_eq!(url.as_str(), "http://api.test/v1/users/");
    }

    #[test]
    fn invalid_base_url_is_malformed() {
        let err = HttpApi::new(&HttpConfig::with_base_url("not a url")).unwrap_err();
        assert!(matches!(err, ServiceError::Malformed(_)));
    }
}
