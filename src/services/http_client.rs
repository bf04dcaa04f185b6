use async_trait::async_trait;
use axum::http::header::{CONTENT_LENGTH, HOST, SET_COOKIE};
use reqwest::{Certificate, Client, Identity};
use std::fs;
use std::time::Instant;
use tracing::{debug, info};

use crate::models::{
    BackendResponse, Communication, FetchError, InboundRequest, ProxyConfig, ProxyError, ProxyResult,
};

/// Performs one round trip against a backend with a copy of the inbound request.
#[async_trait]
pub trait BackendFetcher: Send + Sync {
    async fn fetch(&self, request: &InboundRequest, url: &str) -> Result<BackendResponse, FetchError>;
}

pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Builds the outbound client, wiring TLS options from the configuration.
    pub fn from_config(config: &ProxyConfig) -> ProxyResult<Self> {
        let mut builder = Client::builder().danger_accept_invalid_certs(config.insecure_skip_verify);

        if config.are_https_client_params_set() {
            let (Some(ca_cert), Some(client_cert), Some(client_key)) =
                (&config.ca_cert, &config.client_cert, &config.client_key)
            else {
                return Err(ProxyError::InvalidConfiguration(
                    "caCert, clientCert and clientKey must all be provided".to_string(),
                ));
            };

            let ca = Certificate::from_pem(&read_pem(ca_cert)?).map_err(|e| {
                ProxyError::InvalidConfiguration(format!("Invalid CA certificate {}: {}", ca_cert, e))
            })?;
            let mut identity_pem = read_pem(client_cert)?;
            identity_pem.push(b'\n');
            identity_pem.extend(read_pem(client_key)?);
            let identity = Identity::from_pem(&identity_pem).map_err(|e| {
                ProxyError::InvalidConfiguration(format!("Invalid client certificate or key: {}", e))
            })?;

            builder = builder.add_root_certificate(ca).identity(identity);
            info!(ca_cert = %ca_cert, client_cert = %client_cert, "Using https client certificates");
        }

        let client = builder
            .build()
            .map_err(|e| ProxyError::InternalError(format!("Cannot build http client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn read_pem(path: &str) -> ProxyResult<Vec<u8>> {
    fs::read(path).map_err(|e| ProxyError::InvalidConfiguration(format!("Cannot read {}: {}", path, e)))
}

#[async_trait]
impl BackendFetcher for ReqwestFetcher {
    async fn fetch(&self, request: &InboundRequest, url: &str) -> Result<BackendResponse, FetchError> {
        let mut headers = request.headers.clone();
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);

        debug!(method = %request.method, url = %url, "Forwarding request");
        let start = Instant::now();
        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let headers = response.headers().clone();
        let cookies = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|header| header.to_str().ok().map(|s| s.to_string()))
            .collect();
        let content = response.bytes().await?;
        let elapsed = start.elapsed();

        Ok(BackendResponse {
            communication: Communication {
                content,
                status_code,
                headers,
                cookies,
            },
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue, Method, Uri};
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(method: Method, uri: &str, body: &'static str) -> InboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        headers.insert(HOST, HeaderValue::from_static("proxy.local"));
        InboundRequest::new(method, uri.parse::<Uri>().unwrap(), headers, Bytes::from_static(body.as_bytes()))
    }

    #[tokio::test]
    async fn test_fetch_returns_status_headers_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/recommendation"))
            .and(query_param("user", "7"))
            .and(header("x-request-id", "abc"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("set-cookie", "session=1")
                    .set_body_raw(r#"{"id": 1}"#, "application/json"),
            )
            .mount(&mock_server)
            .await;

        let fetcher = ReqwestFetcher::new();
        let url = format!("{}/recommendation?user=7", mock_server.uri());
        let response = fetcher
            .fetch(&request(Method::GET, "/recommendation?user=7", ""), &url)
            .await
            .unwrap();

        let communication = response.communication;
        assert_eq!(communication.status_code, 201);
        assert_eq!(communication.content_type(), Some("application/json"));
        assert_eq!(communication.cookies, vec!["session=1".to_string()]);
        assert_eq!(&communication.content[..], br#"{"id": 1}"#);
    }

    #[tokio::test]
    async fn test_fetch_replays_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(body_string("{\"qty\":2}"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&mock_server)
            .await;

        let fetcher = ReqwestFetcher::new();
        let url = format!("{}/orders", mock_server.uri());
        let inbound = request(Method::POST, "/orders", "{\"qty\":2}");

        for _ in 0..2 {
            let response = fetcher.fetch(&inbound, &url).await.unwrap();
            assert_eq!(response.communication.status_code, 200);
        }
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = ReqwestFetcher::new();
        let url = format!("{}/missing", mock_server.uri());
        let response = fetcher.fetch(&request(Method::GET, "/missing", ""), &url).await.unwrap();
        assert_eq!(response.communication.status_code, 404);
    }

    #[tokio::test]
    async fn test_connection_failure_is_an_error() {
        let fetcher = ReqwestFetcher::new();
        let result = fetcher
            .fetch(&request(Method::GET, "/", ""), "http://127.0.0.1:1/")
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_from_config_rejects_unreadable_certificates() {
        let mut config = ProxyConfig::new("https://primary", "https://candidate");
        config.ca_cert = Some("/nonexistent/ca.pem".to_string());
        config.client_cert = Some("/nonexistent/client.pem".to_string());
        config.client_key = Some("/nonexistent/client.key".to_string());
        assert!(matches!(
            ReqwestFetcher::from_config(&config),
            Err(ProxyError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_from_config_without_tls_options() {
        let mut config = ProxyConfig::new("https://primary", "https://candidate");
        config.insecure_skip_verify = true;
        assert!(ReqwestFetcher::from_config(&config).is_ok());
    }
}
