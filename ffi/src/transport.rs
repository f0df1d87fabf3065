//! Blocking HTTP transport for hosts that embed the coordinator.

use std::time::Duration;

use async_trait::async_trait;
use todolist_core::{HttpMethod, HttpRequest, HttpResponse, StoreError, Transport};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `Transport` backed by a ureq agent, run on the blocking pool.
///
/// 4xx/5xx responses are returned as data so the core client can interpret
/// them; only connection-level failures become `StoreError::Transport`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build()
            .new_agent();
        Self { agent }
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, StoreError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || execute(&agent, request))
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?
            .map_err(|e| StoreError::Transport(e.to_string()))
    }
}

fn execute(agent: &ureq::Agent, req: HttpRequest) -> Result<HttpResponse, ureq::Error> {
    macro_rules! with_headers {
        ($builder:expr) => {{
            let mut builder = $builder;
            for (key, value) in &req.headers {
                builder = builder.header(key, value);
            }
            builder
        }};
    }

    let body = req.body.clone().unwrap_or_default();
    let mut response = match req.method {
        HttpMethod::Get => with_headers!(agent.get(&req.path)).call()?,
        HttpMethod::Delete => with_headers!(agent.delete(&req.path)).call()?,
        HttpMethod::Post => with_headers!(agent.post(&req.path)).send(body.as_bytes())?,
        HttpMethod::Patch => with_headers!(agent.patch(&req.path)).send(body.as_bytes())?,
    };

    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;
    Ok(HttpResponse {
        status,
        headers: Vec::new(),
        body,
    })
}
