// ABOUTME: HTTP/1 liveness prober built on hyper's client connection API.
// ABOUTME: Success requires the expected status and a JSON body with status "ok".

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use http_body_util::{BodyExt, Empty};
use hyper::Request;
use hyper::header::HOST;
use hyper_util::rt::TokioIo;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use crate::config::HealthConfig;
use crate::remote::InstanceHandle;

use super::{HealthResult, HealthVerify, VerifyError, accepts};

/// HTTP health verifier probing the externally advertised address.
pub struct HttpVerifier;

impl HttpVerifier {
    pub fn new() -> Self {
        Self
    }

    async fn probe_once(
        &self,
        instance: &InstanceHandle,
        health: &HealthConfig,
    ) -> HealthResult {
        let probed_at = Utc::now();
        let start = Instant::now();

        let outcome = tokio::time::timeout(
            health.timeout,
            request_health(&instance.host, instance.port, &health.path),
        )
        .await;

        let latency = start.elapsed();

        match outcome {
            Ok(Ok((status, body))) => HealthResult {
                healthy: status == health.expect_status && body_reports_ok(&body),
                status: Some(status),
                latency,
                probed_at,
            },
            Ok(Err(reason)) => {
                tracing::debug!("health probe failed: {reason}");
                HealthResult {
                    healthy: false,
                    status: None,
                    latency,
                    probed_at,
                }
            }
            Err(_) => {
                tracing::debug!("health probe timed out after {:?}", health.timeout);
                HealthResult {
                    healthy: false,
                    status: None,
                    latency,
                    probed_at,
                }
            }
        }
    }
}

impl Default for HttpVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthVerify for HttpVerifier {
    async fn verify(
        &self,
        instance: &InstanceHandle,
        health: &HealthConfig,
    ) -> Result<HealthResult, VerifyError> {
        // Internal reachability proves nothing about what users see; the
        // probe must go to the externally advertised address.
        if is_loopback(&instance.host) {
            tracing::warn!(
                host = %instance.host,
                "probing a loopback address; this does not prove external reachability"
            );
        }

        let mut attempts = 0;
        while attempts < health.max_attempts {
            let result = self.probe_once(instance, health).await;
            attempts += 1;

            if accepts(&result, instance) {
                tracing::info!(
                    status = ?result.status,
                    latency_ms = result.latency.as_millis() as u64,
                    "instance healthy"
                );
                return Ok(result);
            }

            tracing::debug!(
                attempt = attempts,
                max = health.max_attempts,
                status = ?result.status,
                "probe not accepted"
            );

            if attempts < health.max_attempts {
                tokio::time::sleep(health.interval).await;
            }
        }

        Err(VerifyError::Timeout { attempts })
    }
}

/// One GET against host:port/path. Returns status and body on any HTTP
/// response, or a failure description otherwise.
async fn request_health(host: &str, port: u16, path: &str) -> Result<(u16, Bytes), String> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| format!("connect {host}:{port}: {e}"))?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| format!("handshake: {e}"))?;

    // Drive the connection until the request completes.
    let conn_task = tokio::spawn(conn);

    let request = Request::builder()
        .uri(path)
        .header(HOST, host)
        .body(Empty::<Bytes>::new())
        .map_err(|e| format!("build request: {e}"))?;

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| format!("send request: {e}"))?;

    let status = response.status().as_u16();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| format!("read body: {e}"))?
        .to_bytes();

    conn_task.abort();
    Ok((status, body))
}

/// A well-formed success body: a JSON object whose `status` field is "ok".
fn body_reports_ok(body: &[u8]) -> bool {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("status").and_then(|s| s.as_str()).map(|s| s == "ok"))
        .unwrap_or(false)
}

fn is_loopback(host: &str) -> bool {
    host == "localhost"
        || host
            .parse::<std::net::IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}
