// HTTP readiness probe implementation

use crate::model_identity::{served_model_ids, serves_model};
use crate::{NotReadyReason, ProbeOutcome, ReadinessEndpoint, ReadinessProbe};
use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

const USER_AGENT: &str = "loadbench/0.1";

/// Readiness probe that issues `GET` requests with hyper.
pub struct HttpReadinessProbe {
    client: Client<HttpConnector, Empty<Bytes>>,
    request_timeout: Duration,
}

impl HttpReadinessProbe {
    pub fn new(request_timeout: Duration) -> Self {
        // No idle pooling: every probe must prove the server accepts a new connection.
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build_http();

        Self {
            client,
            request_timeout,
        }
    }

    /// GET `url`, returning the status code and, if asked, the body.
    /// The per-request timeout covers connect, response and body.
    async fn get(&self, url: &str, read_body: bool) -> Result<(u16, Bytes), NotReadyReason> {
        let uri = url
            .parse::<Uri>()
            .map_err(|e| NotReadyReason::InvalidRequest(format!("Invalid URI {}: {}", url, e)))?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("User-Agent", USER_AGENT)
            .body(Empty::<Bytes>::new())
            .map_err(|e| NotReadyReason::InvalidRequest(format!("Failed to build request: {}", e)))?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| NotReadyReason::ConnectionFailed(e.to_string()))?;

            let status = response.status().as_u16();
            let body = if read_body {
                response
                    .into_body()
                    .collect()
                    .await
                    .map_err(|e| NotReadyReason::ConnectionFailed(format!("Failed to read body: {}", e)))?
                    .to_bytes()
            } else {
                Bytes::new()
            };

            Ok::<_, NotReadyReason>((status, body))
        };

        match timeout(self.request_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(NotReadyReason::Timeout),
        }
    }

    async fn check_model(&self, endpoint: &ReadinessEndpoint, expected: &str) -> Option<NotReadyReason> {
        let (status, body) = match self.get(&endpoint.models_url, true).await {
            Ok(response) => response,
            Err(reason) => return Some(reason),
        };

        if !is_success(status) {
            return Some(NotReadyReason::Status(status));
        }

        match served_model_ids(&body) {
            Ok(served) if serves_model(&served, expected) => None,
            Ok(served) => Some(NotReadyReason::ModelMismatch {
                expected: expected.to_string(),
                served,
            }),
            Err(e) => Some(NotReadyReason::InvalidResponse(format!(
                "Unparsable model list from {}: {}",
                endpoint.models_url, e
            ))),
        }
    }
}

#[async_trait]
impl ReadinessProbe for HttpReadinessProbe {
    async fn check(&self, endpoint: &ReadinessEndpoint) -> ProbeOutcome {
        let status = match self.get(&endpoint.health_url, false).await {
            Ok((status, _)) => status,
            Err(reason) => {
                debug!("Readiness probe not ready: {} - {}", endpoint.health_url, reason);
                return ProbeOutcome::NotReady(reason);
            }
        };

        if !is_success(status) {
            debug!("Readiness probe got status {}: {}", status, endpoint.health_url);
            return ProbeOutcome::NotReady(NotReadyReason::Status(status));
        }

        if let Some(expected) = &endpoint.expected_model {
            if let Some(reason) = self.check_model(endpoint, expected).await {
                debug!("Readiness probe healthy but {}", reason);
                return ProbeOutcome::NotReady(reason);
            }
        }

        debug!("Readiness probe succeeded: {} - status={}", endpoint.health_url, status);
        ProbeOutcome::Ready { status }
    }
}

/// Any 2xx counts as success.
fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Incoming;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use tokio::net::TcpListener;

    /// Serve `/health` with `status` and `/v1/models` with `models`.
    async fn serve(status: StatusCode, models: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let io = TokioIo::new(stream);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<Incoming>| async move {
                        let (code, body) = if req.uri().path() == "/v1/models" {
                            (StatusCode::OK, models)
                        } else {
                            (status, "OK\n")
                        };
                        Ok::<_, hyper::Error>(
                            Response::builder()
                                .status(code)
                                .body(Full::new(Bytes::from(body)))
                                .unwrap(),
                        )
                    });
                    let _ = http1::Builder::new().serve_connection(io, service).await;
                });
            }
        });

        port
    }

    fn endpoint(port: u16) -> ReadinessEndpoint {
        ReadinessEndpoint::new("127.0.0.1", port, "/health")
    }

    #[tokio::test]
    async fn test_ok_is_ready() {
        let port = serve(StatusCode::OK, "{}").await;
        let probe = HttpReadinessProbe::new(Duration::from_secs(1));

        assert_eq!(probe.check(&endpoint(port)).await, ProbeOutcome::Ready { status: 200 });
    }

    #[tokio::test]
    async fn test_any_2xx_is_ready() {
        let port = serve(StatusCode::NO_CONTENT, "{}").await;
        let probe = HttpReadinessProbe::new(Duration::from_secs(1));

        assert!(probe.check(&endpoint(port)).await.is_ready());
    }

    #[tokio::test]
    async fn test_503_is_not_ready() {
        let port = serve(StatusCode::SERVICE_UNAVAILABLE, "{}").await;
        let probe = HttpReadinessProbe::new(Duration::from_secs(1));

        assert_eq!(
            probe.check(&endpoint(port)).await,
            ProbeOutcome::NotReady(NotReadyReason::Status(503))
        );
    }

    #[tokio::test]
    async fn test_refused_connection_is_not_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = HttpReadinessProbe::new(Duration::from_secs(1));
        let outcome = probe.check(&endpoint(port)).await;
        assert!(matches!(
            outcome,
            ProbeOutcome::NotReady(NotReadyReason::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept and hold connections without ever answering
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let probe = HttpReadinessProbe::new(Duration::from_millis(200));
        assert_eq!(
            probe.check(&endpoint(port)).await,
            ProbeOutcome::NotReady(NotReadyReason::Timeout)
        );
    }

    #[tokio::test]
    async fn test_invalid_url_is_not_ready() {
        let probe = HttpReadinessProbe::new(Duration::from_secs(1));
        let endpoint = ReadinessEndpoint {
            health_url: "not a url".to_string(),
            models_url: "not a url".to_string(),
            expected_model: None,
        };

        assert!(matches!(
            probe.check(&endpoint).await,
            ProbeOutcome::NotReady(NotReadyReason::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_model_identity_match() {
        let port = serve(StatusCode::OK, r#"{"data":[{"id":"s3://models/llama"}]}"#).await;
        let probe = HttpReadinessProbe::new(Duration::from_secs(1));

        let endpoint = endpoint(port).with_expected_model("s3://models/llama");
        assert!(probe.check(&endpoint).await.is_ready());
    }

    #[tokio::test]
    async fn test_model_identity_mismatch() {
        let port = serve(StatusCode::OK, r#"{"data":[{"id":"s3://models/mistral"}]}"#).await;
        let probe = HttpReadinessProbe::new(Duration::from_secs(1));

        let endpoint = endpoint(port).with_expected_model("s3://models/llama");
        match probe.check(&endpoint).await {
            ProbeOutcome::NotReady(NotReadyReason::ModelMismatch { expected, served }) => {
                assert_eq!(expected, "s3://models/llama");
                assert_eq!(served, vec!["s3://models/mistral".to_string()]);
            }
            other => panic!("expected model mismatch, got {:?}", other),
        }
    }
}
