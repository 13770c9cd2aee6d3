use crate::error::{CinemaError, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, instrument};

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("cinema-flash/0.1.0")
            .build()?;

        Ok(Self { client })
    }

    /// POSTs a JSON body with extra headers and decodes a JSON reply.
    /// Header values are never logged.
    #[instrument(skip(self, body, headers), fields(url = %url))]
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
    ) -> Result<T> {
        debug!("Making POST request");
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await?;
        let response = check_status(response)?;
        let json = response
            .json::<T>()
            .await
            .map_err(|e| CinemaError::MalformedResponse(e.without_url().to_string()))?;
        Ok(json)
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    error!("HTTP request failed with status: {}", status);
    Err(status_error(status))
}

pub(crate) fn status_error(status: StatusCode) -> CinemaError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => CinemaError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CinemaError::CredentialInvalid(status.to_string())
        }
        other => CinemaError::UpstreamUnavailable(format!("HTTP request failed: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS),
            CinemaError::RateLimited
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN),
            CinemaError::CredentialInvalid(_)
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE),
            CinemaError::UpstreamUnavailable(_)
        ));
    }
}
