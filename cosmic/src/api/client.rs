use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tfplug::context::Context;

use super::common::{ApiParams, AsyncJobStatus, ErrorEnvelope, JOB_FAILED, JOB_SUCCEEDED};
use super::error::ApiError;
use super::signing;

/// Parameters never written to the debug log
const REDACTED_PARAMS: &[&str] = &["apikey", "signature", "ipsecpsk", "password", "userdata"];

/// Response fields masked before a body is written to the debug log
const REDACTED_FIELDS: &[&str] = &[
    "privatekey",
    "ipsecpsk",
    "presharedkey",
    "password",
    "secretkey",
    "apikey",
    "userdata",
];

/// Cosmic API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    secret_key: String,
    http_get_only: bool,
    async_timeout: Duration,
    poll_interval: Duration,
    retry_config: RetryConfig,
}

/// Transport-level retry for throttling and gateway errors
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 60,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub api_key: String,
    pub secret_key: String,
    /// Send every command as GET instead of a POST form
    pub http_get_only: bool,
    /// How long to wait for an async job
    pub async_timeout: Duration,
    pub poll_interval: Duration,
    pub retry_config: RetryConfig,
}

impl ClientConfig {
    pub fn new(api_url: &str, api_key: &str, secret_key: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            secret_key: secret_key.to_string(),
            http_get_only: false,
            async_timeout: Duration::from_secs(900),
            poll_interval: Duration::from_secs(1),
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_http_get_only(mut self, http_get_only: bool) -> Self {
        self.http_get_only = http_get_only;
        self
    }

    pub fn with_async_timeout(mut self, seconds: u64) -> Self {
        self.async_timeout = Duration::from_secs(seconds);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }
}

impl Client {
    /// Create a new API client
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.retry_config.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                api_url: config.api_url.trim_end_matches('/').to_string(),
                api_key: config.api_key,
                secret_key: config.secret_key,
                http_get_only: config.http_get_only,
                async_timeout: config.async_timeout,
                poll_interval: config.poll_interval,
                retry_config: config.retry_config,
            }),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.inner.api_url
    }

    pub fn async_timeout(&self) -> Duration {
        self.inner.async_timeout
    }

    /// Execute a command and return the body of its response envelope
    pub async fn request(&self, command: &str, params: ApiParams) -> Result<Value, ApiError> {
        let query = self.signed_query(command, params)?;

        self.execute_with_retry(
            || async {
                if self.inner.http_get_only {
                    self.inner
                        .http_client
                        .get(format!("{}?{}", self.inner.api_url, query))
                        .send()
                        .await
                } else {
                    self.inner
                        .http_client
                        .post(&self.inner.api_url)
                        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                        .body(query.clone())
                        .send()
                        .await
                }
            },
            command,
        )
        .await
    }

    /// Execute a command and deserialize the entity stored under `key`
    pub async fn request_entity<T: DeserializeOwned>(
        &self,
        command: &str,
        params: ApiParams,
        key: &str,
    ) -> Result<T, ApiError> {
        let body = self.request(command, params).await?;
        entity_from(command, body, key)
    }

    /// Execute an async command and wait for its job result
    pub async fn request_async(
        &self,
        ctx: &Context,
        command: &str,
        params: ApiParams,
    ) -> Result<Value, ApiError> {
        let body = self.request(command, params).await?;

        match body.get("jobid").and_then(Value::as_str) {
            Some(job_id) => self.wait_for_job(ctx, job_id).await,
            // Some versions answer inline
            None => Ok(body),
        }
    }

    /// Execute an async command and deserialize the job result entity under `key`
    pub async fn request_async_entity<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        command: &str,
        params: ApiParams,
        key: &str,
    ) -> Result<T, ApiError> {
        let result = self.request_async(ctx, command, params).await?;
        entity_from(command, result, key)
    }

    /// Execute a list command; an empty result yields an empty vector
    pub async fn list<T: DeserializeOwned>(
        &self,
        command: &str,
        key: &str,
        params: ApiParams,
    ) -> Result<Vec<T>, ApiError> {
        let mut body = self.request(command, params).await?;

        match body.get_mut(key).map(Value::take) {
            Some(items) => serde_json::from_value(items).map_err(|e| {
                tracing::error!("Failed to deserialize {} result: {}", command, e);
                ApiError::ParseError(format!("{}: {}", command, e))
            }),
            None => Ok(vec![]),
        }
    }

    /// Look up a single entity by ID; `None` when the control plane no longer knows it
    pub async fn get_by_id<T: DeserializeOwned>(
        &self,
        command: &str,
        key: &str,
        id: &str,
        params: ApiParams,
    ) -> Result<Option<T>, ApiError> {
        match self.list::<T>(command, key, params.add("id", id)).await {
            Ok(mut items) => Ok(if items.is_empty() {
                None
            } else {
                Some(items.swap_remove(0))
            }),
            Err(e) if e.is_entity_gone(id) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn wait_for_job(&self, ctx: &Context, job_id: &str) -> Result<Value, ApiError> {
        let started = Instant::now();

        loop {
            let body = self
                .request("queryAsyncJobResult", ApiParams::new().add("jobid", job_id))
                .await?;
            let status: AsyncJobStatus = serde_json::from_value(body)
                .map_err(|e| ApiError::ParseError(format!("queryAsyncJobResult: {}", e)))?;

            match status.jobstatus {
                JOB_SUCCEEDED => return Ok(status.jobresult),
                JOB_FAILED => {
                    let envelope: ErrorEnvelope =
                        serde_json::from_value(status.jobresult).unwrap_or_default();
                    return Err(ApiError::ApiError {
                        code: envelope.errorcode,
                        cs_code: envelope.cserrorcode,
                        message: envelope.errortext,
                    });
                }
                _ => {}
            }

            if started.elapsed() >= self.inner.async_timeout {
                return Err(ApiError::AsyncTimeout {
                    job_id: job_id.to_string(),
                    seconds: self.inner.async_timeout.as_secs(),
                });
            }

            tracing::debug!("Async job {} still pending", job_id);
            tokio::select! {
                _ = tokio::time::sleep(self.inner.poll_interval) => {}
                _ = ctx.cancelled() => return Err(ApiError::Cancelled(job_id.to_string())),
            }
        }
    }

    fn signed_query(&self, command: &str, params: ApiParams) -> Result<String, ApiError> {
        let params = params
            .add("command", command)
            .add("apikey", &self.inner.api_key)
            .add("response", "json")
            .into_inner();

        tracing::debug!(
            "API request {}: {}",
            command,
            params
                .iter()
                .filter(|(k, _)| !REDACTED_PARAMS.contains(&k.as_str()))
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&")
        );

        signing::signed_query(&params, &self.inner.secret_key)
    }

    /// Execute request with retry logic
    async fn execute_with_retry<F, Fut>(&self, request_fn: F, command: &str) -> Result<Value, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    self.inner.retry_config.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                    self.inner.retry_config.max_backoff_ms,
                );
                tracing::debug!(
                    "Retrying {} after {}ms (attempt {})",
                    command,
                    backoff,
                    attempt
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if matches!(status.as_u16(), 502..=504) {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return self.parse_response(command, response).await;
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error =
                            Some(ApiError::Timeout(self.inner.retry_config.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Unwraps `{"<command>response": {...}}` and surfaces error envelopes
    async fn parse_response(
        &self,
        command: &str,
        response: reqwest::Response,
    ) -> Result<Value, ApiError> {
        let status = response.status();
        let text = response.text().await?;

        let root: Value = match serde_json::from_str(&text) {
            Ok(root) => {
                tracing::debug!("API response body for {}: {}", command, redacted(&root));
                root
            }
            Err(e) if status.is_success() => {
                tracing::error!(
                    "Failed to parse {} response: {} ({} bytes)",
                    command,
                    e,
                    text.len()
                );
                return Err(ApiError::ParseError(format!("{}: {}", command, e)));
            }
            Err(_) => {
                return Err(ApiError::HttpError {
                    status: status.as_u16(),
                    message: text,
                })
            }
        };

        let body = unwrap_envelope(command, root).ok_or_else(|| {
            if status.is_success() {
                ApiError::ParseError(format!("{}: missing response envelope", command))
            } else {
                ApiError::HttpError {
                    status: status.as_u16(),
                    message: text.clone(),
                }
            }
        })?;

        if body.get("errorcode").is_some() || body.get("errortext").is_some() {
            let envelope: ErrorEnvelope = serde_json::from_value(body).unwrap_or_default();
            return Err(ApiError::ApiError {
                code: envelope.errorcode,
                cs_code: envelope.cserrorcode,
                message: envelope.errortext,
            });
        }

        if !status.is_success() {
            return Err(ApiError::HttpError {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(body)
    }

    /// Affinity group operations
    pub fn affinity_groups(&self) -> super::affinity_groups::AffinityGroupsApi<'_> {
        super::affinity_groups::AffinityGroupsApi::new(self)
    }

    /// Public IP address and static NAT operations
    pub fn addresses(&self) -> super::addresses::AddressesApi<'_> {
        super::addresses::AddressesApi::new(self)
    }

    /// Ingress and egress firewall rule operations
    pub fn firewall(&self) -> super::firewall::FirewallApi<'_> {
        super::firewall::FirewallApi::new(self)
    }

    /// Load balancer rule operations
    pub fn load_balancer(&self) -> super::load_balancer::LoadBalancerApi<'_> {
        super::load_balancer::LoadBalancerApi::new(self)
    }

    /// Network ACL list and ACL rule operations
    pub fn network_acls(&self) -> super::network_acls::NetworkAclsApi<'_> {
        super::network_acls::NetworkAclsApi::new(self)
    }

    /// Network operations
    pub fn networks(&self) -> super::networks::NetworksApi<'_> {
        super::networks::NetworksApi::new(self)
    }

    /// Port forwarding rule operations
    pub fn port_forwarding(&self) -> super::port_forwarding::PortForwardingApi<'_> {
        super::port_forwarding::PortForwardingApi::new(self)
    }

    /// Security group operations
    pub fn security_groups(&self) -> super::security_groups::SecurityGroupsApi<'_> {
        super::security_groups::SecurityGroupsApi::new(self)
    }

    /// SSH key pair operations
    pub fn ssh_keypairs(&self) -> super::ssh_keypairs::SshKeyPairsApi<'_> {
        super::ssh_keypairs::SshKeyPairsApi::new(self)
    }

    /// Resource tag operations
    pub fn tags(&self) -> super::tags::TagsApi<'_> {
        super::tags::TagsApi::new(self)
    }

    /// Template operations
    pub fn templates(&self) -> super::templates::TemplatesApi<'_> {
        super::templates::TemplatesApi::new(self)
    }

    /// Virtual machine, NIC and secondary IP operations
    pub fn virtual_machines(&self) -> super::virtual_machines::VirtualMachinesApi<'_> {
        super::virtual_machines::VirtualMachinesApi::new(self)
    }

    /// Volume operations
    pub fn volumes(&self) -> super::volumes::VolumesApi<'_> {
        super::volumes::VolumesApi::new(self)
    }

    /// VPC, private gateway and static route operations
    pub fn vpcs(&self) -> super::vpcs::VpcsApi<'_> {
        super::vpcs::VpcsApi::new(self)
    }

    /// Site-to-site VPN operations
    pub fn vpn(&self) -> super::vpn::VpnApi<'_> {
        super::vpn::VpnApi::new(self)
    }
}

fn unwrap_envelope(command: &str, root: Value) -> Option<Value> {
    let Value::Object(mut map) = root else {
        return None;
    };

    let expected = format!("{}response", command.to_lowercase());
    if let Some(body) = map.remove(&expected) {
        return Some(body);
    }

    // Authentication failures come back as `errorresponse`
    let key = map.keys().find(|k| k.ends_with("response"))?.clone();
    map.remove(&key)
}

fn entity_from<T: DeserializeOwned>(command: &str, mut body: Value, key: &str) -> Result<T, ApiError> {
    let entity = body
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| ApiError::ParseError(format!("{}: missing '{}' in result", command, key)))?;

    serde_json::from_value(entity).map_err(|e| {
        tracing::error!("Failed to deserialize {} result: {}", command, e);
        ApiError::ParseError(format!("{}: {}", command, e))
    })
}

/// Copy of `value` with every secret field replaced by a marker
fn redacted(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if REDACTED_FIELDS.contains(&k.to_lowercase().as_str()) {
                        (k.clone(), Value::String("<redacted>".to_string()))
                    } else {
                        (k.clone(), redacted(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redacted).collect()),
        other => other.clone(),
    }
}
