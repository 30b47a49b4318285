//! Test helpers for the Cosmic API

use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{json, Value};
use std::time::Duration;

use super::{Client, ClientConfig, RetryConfig};

pub const API_PATH: &str = "/client/api";

/// Client against a mock server with fast polling and retries
pub fn create_test_client(url: &str) -> Client {
    let retry = RetryConfig {
        max_retries: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        timeout_seconds: 5,
    };

    Client::new(
        ClientConfig::new(&format!("{}{}", url, API_PATH), "test-api-key", "test-secret-key")
            .with_poll_interval(Duration::from_millis(5))
            .with_async_timeout(5)
            .with_retry_config(retry),
    )
    .unwrap()
}

/// Mock matching a POSTed command
pub fn mock_command(server: &mut ServerGuard, command: &str) -> Mock {
    server
        .mock("POST", API_PATH)
        .match_body(Matcher::UrlEncoded("command".into(), command.into()))
}

/// Mock matching a POSTed command with extra parameters
pub fn mock_command_with(server: &mut ServerGuard, command: &str, params: &[(&str, &str)]) -> Mock {
    let mut matchers = vec![Matcher::UrlEncoded("command".into(), command.into())];
    matchers.extend(
        params
            .iter()
            .map(|(k, v)| Matcher::UrlEncoded((*k).into(), (*v).into())),
    );

    server
        .mock("POST", API_PATH)
        .match_body(Matcher::AllOf(matchers))
}

/// `{"<command>response": body}`
pub fn response_body(command: &str, body: Value) -> String {
    json!({ (format!("{}response", command.to_lowercase())): body }).to_string()
}

/// Error envelope the control plane returns for an unknown ID
pub fn entity_gone_body(command: &str, id: &str) -> String {
    response_body(
        command,
        json!({
            "errorcode": 431,
            "cserrorcode": 4350,
            "errortext": format!(
                "Invalid parameter id value={} due to incorrect long value format, or entity does not exist",
                id
            ),
        }),
    )
}

/// List response with `count` and the items under `key`
pub fn list_body(command: &str, key: &str, items: Value) -> String {
    let count = items.as_array().map(Vec::len).unwrap_or(0);
    if count == 0 {
        return response_body(command, json!({}));
    }
    response_body(command, json!({ "count": count, (key): items }))
}

/// Mocks an async command that completes immediately with `result`
pub async fn mock_async_job(
    server: &mut ServerGuard,
    command: &str,
    job_id: &str,
    result: Value,
) -> (Mock, Mock) {
    let start = mock_command(server, command)
        .with_body(response_body(command, json!({ "jobid": job_id })))
        .create_async()
        .await;

    let job = mock_command_with(server, "queryAsyncJobResult", &[("jobid", job_id)])
        .with_body(response_body(
            "queryAsyncJobResult",
            json!({ "jobid": job_id, "jobstatus": 1, "jobresult": result }),
        ))
        .create_async()
        .await;

    (start, job)
}

/// Like [`mock_async_job`] but only for requests carrying `params`
pub async fn mock_async_job_with(
    server: &mut ServerGuard,
    command: &str,
    params: &[(&str, &str)],
    job_id: &str,
    result: Value,
) -> (Mock, Mock) {
    let start = mock_command_with(server, command, params)
        .with_body(response_body(command, json!({ "jobid": job_id })))
        .create_async()
        .await;

    let job = mock_command_with(server, "queryAsyncJobResult", &[("jobid", job_id)])
        .with_body(response_body(
            "queryAsyncJobResult",
            json!({ "jobid": job_id, "jobstatus": 1, "jobresult": result }),
        ))
        .create_async()
        .await;

    (start, job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 100);
        assert_eq!(config.max_backoff_ms, 10000);
    }

    #[test]
    fn empty_list_body_has_no_count() {
        assert_eq!(
            list_body("listVPCs", "vpc", json!([])),
            r#"{"listvpcsresponse":{}}"#
        );
    }
}
