//! HTTPS request plumbing for JSON APIs behind mutual TLS.
//!
//! Each call opens a fresh TCP connection, runs the TLS handshake, and
//! drives a single hyper http1 exchange. Calls are rare (one add, a
//! handful of health polls) so there is no pooling.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::error::{MemberError, MemberResult};

const USER_AGENT_VALUE: &str = concat!("keel/", env!("CARGO_PKG_VERSION"));

/// Target of one storage endpoint, ready to send requests.
pub struct HttpsTransport {
    endpoint: String,
    host: String,
    port: u16,
    authority: String,
    server_name: ServerName<'static>,
    tls: Arc<ClientConfig>,
    connector: TlsConnector,
    timeout: Duration,
}

impl HttpsTransport {
    /// Parse `https://host:port` and bind it to a TLS config.
    pub fn new(endpoint: &str, tls: Arc<ClientConfig>, timeout: Duration) -> MemberResult<Self> {
        let endpoint_err = |reason: String| MemberError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let uri: Uri = endpoint
            .parse()
            .map_err(|e| endpoint_err(format!("invalid endpoint URL: {e}")))?;
        if uri.scheme_str() != Some("https") {
            return Err(endpoint_err("endpoint must use https".to_string()));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| endpoint_err("endpoint has no host".to_string()))?;
        let port = authority
            .port_u16()
            .ok_or_else(|| endpoint_err("endpoint has no port".to_string()))?;
        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| endpoint_err(format!("invalid server name {host:?}: {e}")))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            host,
            port,
            authority: authority.to_string(),
            server_name,
            connector: TlsConnector::from(Arc::clone(&tls)),
            tls,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn tls_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.tls)
    }

    /// Send one request; any status is returned, only transport
    /// failures are errors.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> MemberResult<(StatusCode, Bytes)> {
        let request_err = |reason: String| MemberError::Request {
            endpoint: self.endpoint.clone(),
            reason,
        };

        let exchange = async {
            let tcp = TcpStream::connect((self.host.as_str(), self.port))
                .await
                .map_err(|e| request_err(format!("connect: {e}")))?;
            let tls = self
                .connector
                .connect(self.server_name.clone(), tcp)
                .await
                .map_err(|e| request_err(format!("tls handshake: {e}")))?;

            let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(tls))
                .await
                .map_err(|e| request_err(format!("http handshake: {e}")))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let req = http::Request::builder()
                .method(method.clone())
                .uri(path)
                .header(HOST, self.authority.as_str())
                .header(USER_AGENT, USER_AGENT_VALUE)
                .header(CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(body.unwrap_or_default())))
                .map_err(|e| request_err(format!("build request: {e}")))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| request_err(format!("send: {e}")))?;
            let status = resp.status();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| request_err(format!("read body: {e}")))?
                .to_bytes();

            debug!(endpoint = %self.endpoint, %method, %path, %status, "storage request done");
            Ok((status, bytes))
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(request_err(format!("timed out after {:?}", self.timeout))),
        }
    }
}
