mod common;

use common::{build_test_context, build_test_context_with_security, TestContext};
use prost::Message;
use pulsemon_common::model::Metric;
use pulsemon_common::proto::metrics_service_server::MetricsService;
use pulsemon_common::proto::UpdateMetricsRequest;
use pulsemon_common::{envelope, hash};
use pulsemon_server::grpc::MetricsServiceImpl;
use pulsemon_server::state::Security;
use pulsemon_storage::Storage as _;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tonic::Request;

fn batch() -> Vec<Metric> {
    vec![Metric::gauge("g", 1.5), Metric::counter("c", 2)]
}

fn service(ctx: &TestContext) -> MetricsServiceImpl {
    MetricsServiceImpl::new(ctx.state.clone())
}

/// Builds the request the way the agent's gRPC client does: envelope in the
/// `data` field, transformations described in metadata, tag over the
/// encoded request.
fn agent_request(
    public_key: Option<&RsaPublicKey>,
    hash_key: Option<&str>,
    real_ip: Option<&str>,
) -> Request<UpdateMetricsRequest> {
    let payload = envelope::pack(&batch(), public_key).unwrap();
    let message = UpdateMetricsRequest { data: payload.body };
    let encoded = message.encode_to_vec();

    let mut request = Request::new(message);
    let metadata = request.metadata_mut();
    metadata.insert("content-encoding", "gzip".parse().unwrap());
    if let Some(ip) = real_ip {
        metadata.insert("x-real-ip", ip.parse().unwrap());
    }
    if let Some(encrypted_key) = &payload.encrypted_key {
        metadata.insert("encrypted-aes-key", encrypted_key.parse().unwrap());
    }
    if let Some(key) = hash_key {
        metadata.insert("hashsha256", hash::sign(key, &encoded).parse().unwrap());
    }
    request
}

#[tokio::test]
async fn plain_batch_is_ingested() {
    let ctx = build_test_context();
    let response = service(&ctx)
        .update_metrics(agent_request(None, None, None))
        .await
        .unwrap();
    assert_eq!(response.get_ref().status, "ok");
    assert_eq!(ctx.storage.gauge("g").await.unwrap(), 1.5);
    assert_eq!(ctx.storage.counter("c").await.unwrap(), 2);
}

#[tokio::test]
async fn counter_deltas_accumulate_across_calls() {
    let ctx = build_test_context();
    let svc = service(&ctx);
    svc.update_metrics(agent_request(None, None, None)).await.unwrap();
    svc.update_metrics(agent_request(None, None, None)).await.unwrap();
    assert_eq!(ctx.storage.counter("c").await.unwrap(), 4);
}

#[tokio::test]
async fn malformed_batch_is_invalid_argument() {
    let ctx = build_test_context();
    let data = envelope::compress(b"definitely not json").unwrap();
    let mut request = Request::new(UpdateMetricsRequest { data });
    request
        .metadata_mut()
        .insert("content-encoding", "gzip".parse().unwrap());

    let err = service(&ctx).update_metrics(request).await.unwrap_err();
    assert_eq!(err.code(), tonic::Code::InvalidArgument);
}

#[tokio::test]
async fn hash_mismatch_is_rejected() {
    let ctx = build_test_context_with_security(Security {
        hash_key: Some("right-key".to_string()),
        private_key: None,
        trusted_subnet: None,
    });

    let err = service(&ctx)
        .update_metrics(agent_request(None, Some("wrong-key"), None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::InvalidArgument);
}

#[tokio::test]
async fn missing_hash_metadata_is_permission_denied() {
    let ctx = build_test_context_with_security(Security {
        hash_key: Some("right-key".to_string()),
        private_key: None,
        trusted_subnet: None,
    });

    let err = service(&ctx)
        .update_metrics(agent_request(None, None, None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::PermissionDenied);
}

#[tokio::test]
async fn matching_hash_is_accepted_and_response_is_signed() {
    let ctx = build_test_context_with_security(Security {
        hash_key: Some("right-key".to_string()),
        private_key: None,
        trusted_subnet: None,
    });

    let response = service(&ctx)
        .update_metrics(agent_request(None, Some("right-key"), None))
        .await
        .unwrap();

    let tag = response
        .metadata()
        .get("hashsha256")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let encoded = response.get_ref().encode_to_vec();
    assert!(hash::verify("right-key", &encoded, &tag));
}

#[tokio::test]
async fn allowlist_rejects_outside_addresses() {
    let ctx = build_test_context_with_security(Security {
        hash_key: None,
        private_key: None,
        trusted_subnet: Some("10.0.0.0/8".parse().unwrap()),
    });
    let svc = service(&ctx);

    let err = svc
        .update_metrics(agent_request(None, None, None))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::PermissionDenied);

    let err = svc
        .update_metrics(agent_request(None, None, Some("192.168.0.9")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), tonic::Code::PermissionDenied);

    svc.update_metrics(agent_request(None, None, Some("10.3.2.1")))
        .await
        .unwrap();
    assert_eq!(ctx.storage.counter("c").await.unwrap(), 2);
}

#[tokio::test]
async fn encrypted_envelope_is_decrypted_before_ingest() {
    let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let public = RsaPublicKey::from(&private);
    let ctx = build_test_context_with_security(Security {
        hash_key: None,
        private_key: Some(private),
        trusted_subnet: None,
    });

    service(&ctx)
        .update_metrics(agent_request(Some(&public), None, None))
        .await
        .unwrap();
    assert_eq!(ctx.storage.gauge("g").await.unwrap(), 1.5);
}
