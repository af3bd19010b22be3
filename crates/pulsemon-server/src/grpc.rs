//! gRPC transport: one unary `UpdateMetrics` call whose `data` field
//! carries the same envelope the HTTP batch endpoint accepts.
//!
//! The middleware semantics of the HTTP chain are applied inline, in the
//! same order: allowlist, request hash verification (over the encoded
//! request, before any inverse transformation), decryption, decompression.

use crate::state::{AppState, Security};
use prost::Message;
use pulsemon_common::envelope;
use pulsemon_common::hash;
use pulsemon_common::model::Metric;
use pulsemon_common::proto::metrics_service_server::MetricsService;
use pulsemon_common::proto::{UpdateMetricsRequest, UpdateMetricsResponse};
use pulsemon_storage::{Storage, StorageError};
use std::net::IpAddr;
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};

pub struct MetricsServiceImpl {
    storage: Arc<dyn Storage>,
    security: Arc<Security>,
}

impl MetricsServiceImpl {
    pub fn new(state: AppState) -> Self {
        Self {
            storage: state.storage,
            security: state.security,
        }
    }

    fn check_allowlist(&self, metadata: &MetadataMap) -> Result<(), Status> {
        let Some(subnet) = &self.security.trusted_subnet else {
            return Ok(());
        };

        let real_ip = metadata
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::error!("x-real-ip metadata is missing");
                Status::permission_denied("x-real-ip metadata is missing")
            })?;
        let ip: IpAddr = real_ip.parse().map_err(|_| {
            tracing::error!(real_ip, "invalid address in x-real-ip metadata");
            Status::permission_denied("invalid address in x-real-ip metadata")
        })?;
        if !subnet.contains(&ip) {
            tracing::error!(ip = %ip, subnet = %subnet, "address is not in the trusted subnet");
            return Err(Status::permission_denied(
                "address is not in the trusted subnet",
            ));
        }
        Ok(())
    }

    fn verify_request_hash(
        &self,
        metadata: &MetadataMap,
        message: &UpdateMetricsRequest,
    ) -> Result<(), Status> {
        let Some(key) = &self.security.hash_key else {
            return Ok(());
        };

        let received = metadata
            .get("hashsha256")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::error!("hashsha256 metadata is missing");
                Status::permission_denied("hashsha256 metadata is missing")
            })?;

        if !hash::verify(key, &message.encode_to_vec(), received) {
            tracing::error!(%received, "request hash mismatch");
            return Err(Status::invalid_argument("hash mismatch"));
        }
        Ok(())
    }
}

#[tonic::async_trait]
impl MetricsService for MetricsServiceImpl {
    async fn update_metrics(
        &self,
        request: Request<UpdateMetricsRequest>,
    ) -> Result<Response<UpdateMetricsResponse>, Status> {
        let metadata = request.metadata();

        self.check_allowlist(metadata)?;
        self.verify_request_hash(metadata, request.get_ref())?;

        let gzipped = metadata
            .get("content-encoding")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("gzip"));
        let encrypted_key = metadata
            .get("encrypted-aes-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let mut data = request.into_inner().data;

        if let Some(private_key) = &self.security.private_key {
            let encrypted_key = encrypted_key.ok_or_else(|| {
                tracing::error!("encrypted-aes-key metadata is missing");
                Status::internal("encrypted-aes-key metadata is missing")
            })?;
            data = pulsemon_common::crypto::open(&data, &encrypted_key, private_key).map_err(
                |err| {
                    tracing::error!(error = %err, "failed to decrypt request payload");
                    Status::internal("failed to decrypt request payload")
                },
            )?;
        }

        if gzipped {
            data = envelope::decompress(&data).map_err(|err| {
                tracing::error!(error = %err, "failed to decompress request payload");
                Status::internal("failed to decompress request payload")
            })?;
        }

        let metrics: Vec<Metric> = serde_json::from_slice(&data).map_err(|err| {
            tracing::error!(error = %err, "failed to decode metrics batch");
            Status::invalid_argument("failed to decode metrics batch")
        })?;

        self.storage.update_batch(&metrics).await.map_err(|err| match err {
            StorageError::MissingPayload { .. } => {
                tracing::error!(error = %err, "invalid metric in batch");
                Status::invalid_argument("invalid metric in batch")
            }
            err => {
                tracing::error!(error = %err, "failed to update metrics");
                Status::internal("failed to update metrics")
            }
        })?;

        tracing::debug!(count = metrics.len(), "metrics ingested");

        let mut response = Response::new(UpdateMetricsResponse {
            status: "ok".to_string(),
            message: "metrics updated".to_string(),
        });
        if let Some(key) = &self.security.hash_key {
            let tag = hash::sign(key, &response.get_ref().encode_to_vec());
            if let Ok(value) = tag.parse() {
                response.metadata_mut().insert("hashsha256", value);
            }
        }
        Ok(response)
    }
}
