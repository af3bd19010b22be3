//! Pluggable delivery clients. The sender only sees [`MetricClient`]; the
//! transport (HTTP or gRPC) is chosen once at startup from config.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use prost::Message;
use pulsemon_common::envelope;
use pulsemon_common::hash;
use pulsemon_common::model::Metric;
use pulsemon_common::netutil;
use pulsemon_common::proto::metrics_service_client::MetricsServiceClient;
use pulsemon_common::proto::UpdateMetricsRequest;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use rsa::RsaPublicKey;
use std::net::IpAddr;
use std::time::Duration;

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait MetricClient: Send + Sync {
    async fn send_metrics(&self, metrics: &[Metric]) -> Result<()>;
}

/// HTTP delivery to `POST /updates/`.
///
/// The integrity tag covers the pre-compression JSON; the body on the wire
/// is gzip-compressed and, when a public key is configured, hybrid-encrypted.
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    key: Option<String>,
    public_key: Option<RsaPublicKey>,
    local_ip: IpAddr,
}

impl HttpClient {
    pub fn new(
        server_address: &str,
        key: Option<String>,
        public_key: Option<RsaPublicKey>,
    ) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{server_address}"),
            key,
            public_key,
            local_ip: netutil::local_outbound_ip()
                .context("failed to discover local outbound address")?,
        })
    }
}

#[async_trait]
impl MetricClient for HttpClient {
    async fn send_metrics(&self, metrics: &[Metric]) -> Result<()> {
        let payload = envelope::pack(metrics, self.public_key.as_ref())?;

        let mut request = self
            .client
            .post(format!("{}/updates/", self.base_url))
            .header("X-Real-IP", self.local_ip.to_string())
            .header(CONTENT_ENCODING, "gzip")
            .header(CONTENT_TYPE, "application/json");

        if let Some(key) = &self.key {
            request = request.header("HashSHA256", hash::sign(key, &payload.plaintext));
        }
        if let Some(encrypted_key) = &payload.encrypted_key {
            request = request.header("Encrypted-AES-Key", encrypted_key);
        }

        let response = request
            .body(payload.body)
            .send()
            .await
            .context("failed to send metrics")?;

        if response.status() != StatusCode::OK {
            bail!("metrics rejected with status {}", response.status());
        }
        Ok(())
    }
}

/// gRPC delivery via the unary `UpdateMetrics` call.
///
/// The envelope travels in the request's `data` field; the integrity tag is
/// computed over the encoded request message (post-transform scope) and sent
/// as `hashsha256` metadata.
pub struct GrpcClient {
    endpoint: String,
    key: Option<String>,
    public_key: Option<RsaPublicKey>,
    local_ip: IpAddr,
}

impl GrpcClient {
    pub fn new(
        server_address: &str,
        key: Option<String>,
        public_key: Option<RsaPublicKey>,
    ) -> Result<Self> {
        Ok(Self {
            endpoint: format!("http://{server_address}"),
            key,
            public_key,
            local_ip: netutil::local_outbound_ip()
                .context("failed to discover local outbound address")?,
        })
    }
}

#[async_trait]
impl MetricClient for GrpcClient {
    async fn send_metrics(&self, metrics: &[Metric]) -> Result<()> {
        let payload = envelope::pack(metrics, self.public_key.as_ref())?;

        let message = UpdateMetricsRequest { data: payload.body };
        let encoded = message.encode_to_vec();

        let mut request = tonic::Request::new(message);
        request.set_timeout(RPC_TIMEOUT);

        let metadata = request.metadata_mut();
        metadata.insert("x-real-ip", self.local_ip.to_string().parse()?);
        metadata.insert("content-encoding", "gzip".parse()?);
        if let Some(encrypted_key) = &payload.encrypted_key {
            metadata.insert("encrypted-aes-key", encrypted_key.parse()?);
        }
        if let Some(key) = &self.key {
            metadata.insert("hashsha256", hash::sign(key, &encoded).parse()?);
        }

        let mut client = MetricsServiceClient::connect(self.endpoint.clone())
            .await
            .context("failed to connect to metrics server")?;
        let response = client
            .update_metrics(request)
            .await
            .context("metrics update rejected")?;

        tracing::debug!(status = %response.get_ref().status, "metrics delivered");
        Ok(())
    }
}
