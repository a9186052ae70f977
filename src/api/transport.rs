use std::io::Read;

use super::ApiError;

/// Raw HTTP response handed back by a [`Transport`], whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests. Non-2xx statuses are returned as responses, not errors;
/// only connection-level failures become [`ApiError::Transport`].
pub trait Transport: Send + Sync {
    /// Perform a GET against `url` with the given headers.
    ///
    /// # Errors
    ///
    /// Returns an error when no HTTP response could be obtained.
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    #[must_use]
    pub fn new(user_agent: Option<&str>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent);
        }
        Self {
            agent: builder.build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, ApiError> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }

        let response = match request.call() {
            Ok(response) | Err(ureq::Error::Status(_, response)) => response,
            Err(err @ ureq::Error::Transport(_)) => {
                return Err(ApiError::Transport(err.to_string()));
            }
        };

        let status = response.status();
        let status_text = response.status_text().to_string();
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|err| ApiError::Transport(format!("failed to read response body: {err}")))?;

        Ok(HttpResponse {
            status,
            status_text,
            body,
        })
    }
}
