//! Single kept-alive connection to the provider API.
//!
//! The provider only needs one HTTP/1.1 connection per application token, so
//! the transport keeps at most one socket open and re-dials on demand.
//! Holding the cached sender behind a mutex for the duration of a round trip
//! serializes concurrent provider calls at the transport layer.

use crate::error::PushError;
use bytes::Bytes;
use futures::FutureExt;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::SendRequest;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::OnceCell;
use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{Duration, timeout};
use tokio_rustls::TlsConnector;
use url::Url;

/// Shared TLS configuration to avoid recreating the root store per dial.
static TLS_CONFIG: OnceCell<Arc<ClientConfig>> = OnceCell::new();

fn shared_tls_config() -> Arc<ClientConfig> {
    TLS_CONFIG
        .get_or_init(|| {
            let mut root_cert_store = RootCertStore::empty();
            root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

            let config = ClientConfig::builder()
                .with_root_certificates(root_cert_store)
                .with_no_client_auth();

            Arc::new(config)
        })
        .clone()
}

#[derive(Debug)]
struct Endpoint {
    host: String,
    port: u16,
    tls: bool,
    /// Path prefix all API paths are resolved under, always `/`-terminated.
    base_path: String,
    /// Value for the `Host` header; includes the port when non-default.
    authority: String,
}

impl Endpoint {
    fn from_url(url: &Url) -> Result<Self, PushError> {
        let tls = match url.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(PushError::InvalidEndpoint(format!(
                    "unsupported scheme: {other}"
                )));
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| PushError::InvalidEndpoint("missing host".to_string()))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| PushError::InvalidEndpoint("missing port".to_string()))?;
        let mut base_path = url.path().to_string();
        if !base_path.ends_with('/') {
            base_path.push('/');
        }
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        };
        Ok(Self {
            host,
            port,
            tls,
            base_path,
            authority,
        })
    }
}

pub(crate) struct Transport {
    endpoint: Endpoint,
    request_timeout: Duration,
    sender: Mutex<Option<SendRequest<Full<Bytes>>>>,
}

impl Transport {
    pub(crate) fn new(api_url: &Url, request_timeout: Duration) -> Result<Self, PushError> {
        Ok(Self {
            endpoint: Endpoint::from_url(api_url)?,
            request_timeout,
            sender: Mutex::new(None),
        })
    }

    /// One request/response exchange with the provider.
    ///
    /// `path` is resolved against the endpoint's base path and may carry a
    /// query string. A `Some` body is sent form-encoded.
    #[tracing::instrument(name = "provider_round_trip", level = "debug", skip(self, form_body))]
    pub(crate) async fn round_trip(
        &self,
        method: Method,
        path: &str,
        form_body: Option<String>,
    ) -> Result<(StatusCode, Bytes), PushError> {
        let mut guard = self.sender.lock().await;
        let mut sender = match guard.take() {
            Some(mut cached) => {
                if cached.ready().now_or_never().is_some_and(|r| r.is_ok()) {
                    tracing::debug!(
                        host = %self.endpoint.host,
                        message = "Reusing kept-alive provider connection"
                    );
                    cached
                } else {
                    self.dial().await?
                }
            }
            None => self.dial().await?,
        };

        let req = self.build_request(method, path, form_body)?;
        let exchange = timeout(self.request_timeout, async {
            let res = sender
                .send_request(req)
                .await
                .map_err(|e| PushError::Network(e.to_string()))?;
            let status = res.status();
            let body = res
                .into_body()
                .collect()
                .await
                .map_err(|e| PushError::Network(e.to_string()))?
                .to_bytes();
            Ok::<_, PushError>((status, body))
        })
        .await;

        match exchange {
            Ok(Ok(out)) => {
                // Keep the socket for the next call.
                *guard = Some(sender);
                Ok(out)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PushError::Timeout(self.request_timeout)),
        }
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        form_body: Option<String>,
    ) -> Result<Request<Full<Bytes>>, PushError> {
        let uri = format!("{}{}", self.endpoint.base_path, path);
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(hyper::header::HOST, self.endpoint.authority.as_str())
            .header(
                hyper::header::USER_AGENT,
                concat!("pushover-relay/", env!("CARGO_PKG_VERSION")),
            );
        let req = match form_body {
            Some(form) => builder
                .header(
                    hyper::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(Full::new(Bytes::from(form))),
            None => builder.body(Full::new(Bytes::new())),
        };
        req.map_err(|e| PushError::Network(e.to_string()))
    }

    async fn dial(&self) -> Result<SendRequest<Full<Bytes>>, PushError> {
        tracing::debug!(
            host = %self.endpoint.host,
            port = self.endpoint.port,
            tls = self.endpoint.tls,
            message = "Dialing provider"
        );
        let stream = timeout(
            self.request_timeout,
            TcpStream::connect((self.endpoint.host.as_str(), self.endpoint.port)),
        )
        .await
        .map_err(|_| PushError::Timeout(self.request_timeout))
        .and_then(|r| r.map_err(|e| PushError::Network(e.to_string())))?;

        if self.endpoint.tls {
            let connector = TlsConnector::from(shared_tls_config());
            let domain = ServerName::try_from(self.endpoint.host.clone())
                .map_err(|_| PushError::InvalidEndpoint(self.endpoint.host.clone()))?;
            let tls_stream = connector
                .connect(domain, stream)
                .await
                .map_err(|e| PushError::Tls(e.to_string()))?;
            let (sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(tls_stream))
                .await
                .map_err(|e| PushError::Network(e.to_string()))?;
            tokio::task::spawn(async move {
                if let Err(err) = conn.await {
                    tracing::debug!(error = ?err, message = "Provider connection closed");
                }
            });
            Ok(sender)
        } else {
            let (sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
                .await
                .map_err(|e| PushError::Network(e.to_string()))?;
            tokio::task::spawn(async move {
                if let Err(err) = conn.await {
                    tracing::debug!(error = ?err, message = "Provider connection closed");
                }
            });
            Ok(sender)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_https_url() {
        let url = Url::parse("https://api.pushover.net/1/").unwrap();
        let endpoint = Endpoint::from_url(&url).unwrap();
        assert_eq!(endpoint.host, "api.pushover.net");
        assert_eq!(endpoint.port, 443);
        assert!(endpoint.tls);
        assert_eq!(endpoint.base_path, "/1/");
        assert_eq!(endpoint.authority, "api.pushover.net");
    }

    #[test]
    fn endpoint_keeps_explicit_port_in_authority() {
        let url = Url::parse("http://127.0.0.1:8080/1").unwrap();
        let endpoint = Endpoint::from_url(&url).unwrap();
        assert_eq!(endpoint.port, 8080);
        assert!(!endpoint.tls);
        assert_eq!(endpoint.base_path, "/1/");
        assert_eq!(endpoint.authority, "127.0.0.1:8080");
    }

    #[test]
    fn endpoint_rejects_unknown_scheme() {
        let url = Url::parse("ftp://api.pushover.net/").unwrap();
        assert!(matches!(
            Endpoint::from_url(&url),
            Err(PushError::InvalidEndpoint(_))
        ));
    }
}
