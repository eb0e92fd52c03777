//! Typed wrappers over the agent's HTTP API.
//!
//! `AgentClient` is a pure translator between domain values and HTTP: it
//! owns no state beyond the endpoint, an optional ACL token, and a shared
//! transport handle, and is freely shareable across tasks.

use crate::error::AgentError;
use crate::transport::{Method, Request, Response, Transport};
use crate::types::{Discovered, Node, Service, Status};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Default agent endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8500";

/// Filters for a `services` discovery query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceFilter {
    /// Sort results by round-trip time from the local agent.
    Near(bool),
    /// Only instances carrying this tag.
    Tag(String),
    /// Query a specific datacenter.
    Dc(String),
    /// Only instances whose checks are passing.
    Passing,
}

/// Options for `session_create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionOptions {
    #[serde(rename = "LockDelay", skip_serializing_if = "Option::is_none")]
    pub lock_delay: Option<String>,

    #[serde(rename = "TTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,

    #[serde(rename = "Behavior", skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
}

/// Client for a Consul-compatible agent.
pub struct AgentClient {
    endpoint: String,
    token: Option<String>,
    transport: Arc<dyn Transport>,
}

impl AgentClient {
    pub fn new(
        endpoint: impl Into<String>,
        token: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            token,
            transport,
        }
    }

    /// Issue a request against an agent path.
    ///
    /// Injects the configured ACL token into `params` unless the caller
    /// already passed one (an explicit caller token wins), sends
    /// `accept: application/json`, and `content-type: application/json` on
    /// bodied requests. Any status other than 200 is an error.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        mut params: Vec<(String, String)>,
    ) -> Result<Response, AgentError> {
        let url = format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        if let Some(token) = &self.token {
            if !params.iter().any(|(key, _)| key == "token") {
                params.push(("token".to_string(), token.clone()));
            }
        }

        let mut request = Request::new(method, url)
            .header("accept", "application/json")
            .params(params);
        if let Some(body) = body {
            request = request.header("content-type", "application/json").body(body);
        }

        let response = self.transport.request(request).await?;
        debug!(path, status = response.status, "Agent call completed");

        if response.status == 200 {
            Ok(response)
        } else {
            Err(AgentError::Http {
                status: response.status,
                headers: response.headers,
                payload: response.payload,
            })
        }
    }

    /// Register a service with the local agent.
    pub async fn service_register(&self, service: &Service) -> Result<(), AgentError> {
        let body = serde_json::to_vec(service)?;
        self.request(
            Method::Put,
            "/v1/agent/service/register",
            Some(body),
            Vec::new(),
        )
        .await?;
        Ok(())
    }

    /// Remove a service from the local agent.
    pub async fn service_deregister(&self, id: &str) -> Result<(), AgentError> {
        self.request(
            Method::Post,
            &format!("/v1/agent/service/deregister/{id}"),
            None,
            Vec::new(),
        )
        .await?;
        Ok(())
    }

    /// Push a status update for the service's TTL check.
    ///
    /// Fails with `NotFound` when the service has no check id (neither an id
    /// nor a name).
    pub async fn check_update(
        &self,
        service: &Service,
        status: &Status,
    ) -> Result<(), AgentError> {
        let check_id = service.check_id().ok_or(AgentError::NotFound)?;
        let body = serde_json::to_vec(status)?;
        self.request(
            Method::Put,
            &format!("/v1/agent/check/update/{check_id}"),
            Some(body),
            Vec::new(),
        )
        .await?;
        Ok(())
    }

    /// Discover instances of a named service, with their health status.
    pub async fn services(
        &self,
        name: &str,
        filters: &[ServiceFilter],
    ) -> Result<Vec<Discovered>, AgentError> {
        let params = encode_filters(filters);
        let response = self
            .request(
                Method::Get,
                &format!("/v1/health/service/{name}"),
                None,
                params,
            )
            .await?;
        let data = parse_json(&response)?;
        shape_services(name, &data)
    }

    /// Create a session, returning its id.
    pub async fn session_create(&self, options: &SessionOptions) -> Result<String, AgentError> {
        let body = serde_json::to_vec(options)?;
        let response = self
            .request(Method::Put, "/v1/session/create", Some(body), Vec::new())
            .await?;
        let data = parse_json(&response)?;
        data.get("ID")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AgentError::Decode("session create reply missing ID".to_string()))
    }

    /// Renew a session's TTL.
    pub async fn session_renew(&self, id: &str) -> Result<(), AgentError> {
        self.request(
            Method::Put,
            &format!("/v1/session/renew/{id}"),
            None,
            Vec::new(),
        )
        .await?;
        Ok(())
    }

    /// Destroy a session.
    pub async fn session_destroy(&self, id: &str) -> Result<(), AgentError> {
        self.request(
            Method::Put,
            &format!("/v1/session/destroy/{id}"),
            None,
            Vec::new(),
        )
        .await?;
        Ok(())
    }

    /// Fetch session data, plus the agent's `x-consul-*` response headers.
    ///
    /// Fails with `NotFound` when the agent no longer knows the session
    /// (payload `null` or `[]`).
    pub async fn session_info(
        &self,
        id: &str,
    ) -> Result<(Value, Vec<(String, String)>), AgentError> {
        let response = self
            .request(
                Method::Get,
                &format!("/v1/session/info/{id}"),
                None,
                Vec::new(),
            )
            .await?;
        let data = parse_json(&response)?;
        if data.is_null() || data.as_array().is_some_and(Vec::is_empty) {
            return Err(AgentError::NotFound);
        }

        let headers = response
            .headers
            .iter()
            .filter(|(name, _)| name.to_ascii_lowercase().starts_with("x-consul-"))
            .cloned()
            .collect();
        Ok((data, headers))
    }

    /// Store raw bytes under a key, returning the decoded reply.
    pub async fn kv_put(&self, key: &str, body: Vec<u8>) -> Result<Value, AgentError> {
        let response = self
            .request(Method::Put, &format!("/v1/kv/{key}"), Some(body), Vec::new())
            .await?;
        parse_json(&response)
    }

    /// Fetch a key, returning the decoded reply.
    pub async fn kv_get(&self, key: &str) -> Result<Value, AgentError> {
        let response = self
            .request(Method::Get, &format!("/v1/kv/{key}"), None, Vec::new())
            .await?;
        parse_json(&response)
    }

    /// Delete a key.
    pub async fn kv_delete(&self, key: &str) -> Result<(), AgentError> {
        self.request(Method::Delete, &format!("/v1/kv/{key}"), None, Vec::new())
            .await?;
        Ok(())
    }
}

/// Translate discovery filters to query parameters.
fn encode_filters(filters: &[ServiceFilter]) -> Vec<(String, String)> {
    let mut params = Vec::new();
    for filter in filters {
        match filter {
            ServiceFilter::Near(true) => params.push(("near".to_string(), "_agent".to_string())),
            ServiceFilter::Near(false) => {}
            ServiceFilter::Tag(tag) => params.push(("tag".to_string(), tag.clone())),
            ServiceFilter::Dc(dc) => params.push(("dc".to_string(), dc.clone())),
            // The passing filter discards every filter accumulated before
            // it. Observable wire behavior the agent tolerates; kept as-is.
            ServiceFilter::Passing => params = vec![("passing".to_string(), String::new())],
        }
    }
    params
}

/// Shape a `/v1/health/service/{name}` reply into discovery tuples.
fn shape_services(name: &str, data: &Value) -> Result<Vec<Discovered>, AgentError> {
    let items = data
        .as_array()
        .ok_or_else(|| AgentError::Decode("health reply is not an array".to_string()))?;

    let mut discovered = Vec::with_capacity(items.len());
    for item in items {
        let node: Node = serde_json::from_value(item.get("Node").cloned().unwrap_or_default())?;

        let mut service =
            Service::load(Some(name), item.get("Service").unwrap_or(&Value::Null))?;
        if service.address.as_deref().map_or(true, str::is_empty) {
            service.address = node.address.clone();
        }

        // The agent reports every check on the node; only the one whose
        // CheckID matches this service's check id belongs to it.
        let status = match service.check_id() {
            Some(check_id) => {
                let entry = item
                    .get("Checks")
                    .and_then(Value::as_array)
                    .and_then(|checks| {
                        checks.iter().find(|check| {
                            check.get("CheckID").and_then(Value::as_str)
                                == Some(check_id.as_str())
                        })
                    });
                match entry {
                    Some(check) => Some(serde_json::from_value(check.clone())?),
                    None => None,
                }
            }
            None => None,
        };

        discovered.push(Discovered {
            node,
            service,
            status,
        });
    }
    Ok(discovered)
}

fn parse_json(response: &Response) -> Result<Value, AgentError> {
    let value = serde_json::from_slice(response.payload.as_bytes())?;
    Ok(value)
}
