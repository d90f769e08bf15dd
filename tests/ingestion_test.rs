//! Integration tests for the receiver's ingestion handlers

use lantern::adapters::broker::{
    process_messages, InMemoryBroker, MessageBroker, MessageHandler, QueueTarget,
};
use lantern::adapters::chpl::PublisherMatcher;
use lantern::adapters::database::{EndpointStore, InMemoryEndpointStore};
use lantern::config::AckPolicy;
use lantern::core::ingest::{CapabilityIngestHandler, IngestOutcome, VersionsIngestHandler};
use lantern::core::metrics::PipelineMetrics;
use lantern::domain::{
    CapabilityRequest, EndpointInfo, EndpointMetadata, HistoryOperation, LanternError,
    RequestedVersion,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const URL: &str = "https://fhir.example.com/api";

fn capability_message(version: &str, tls: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "url": URL,
        "err": "",
        "tlsVersion": tls,
        "requestedFhirVersion": version,
        "defaultFhirVersion": "4.0",
        "mimeTypes": ["application/fhir+json"],
        "httpResponse": 200,
        "smarthttpResponse": 200,
        "capabilityStatement": {
            "resourceType": "CapabilityStatement",
            "fhirVersion": "4.0.1",
            "publisher": "Example Health",
            "software": {"name": "Example FHIR Server", "version": "2.1"},
            "rest": [{"resource": [{"type": "Patient", "interaction": [{"code": "read"}]}]}]
        },
        "smartResp": {"authorization_endpoint": "https://auth.example.com"},
        "responseTime": 0.42
    }))
    .unwrap()
}

fn capability_handler(store: Arc<InMemoryEndpointStore>) -> CapabilityIngestHandler {
    CapabilityIngestHandler::new(
        store,
        Arc::new(PublisherMatcher::new()),
        None,
        Arc::new(PipelineMetrics::new()),
    )
}

#[tokio::test]
async fn test_same_message_twice_refreshes_telemetry_only() {
    let store = Arc::new(InMemoryEndpointStore::new());
    let vendor = store.add_vendor("Example Health").await;
    let handler = capability_handler(Arc::clone(&store));

    let first = handler.ingest(&capability_message("4.0", "TLS 1.2")).await.unwrap();
    let stored = store.info_rows().await;
    let second = handler.ingest(&capability_message("4.0", "TLS 1.2")).await.unwrap();

    assert_eq!(first, IngestOutcome::Inserted);
    assert_eq!(second, IngestOutcome::Refreshed);

    let rows = store.info_rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(store.metadata_rows().await.len(), 2);
    assert_eq!(rows[0].vendor_id, Some(vendor));
    assert_eq!(rows[0].id, stored[0].id);
    assert_ne!(rows[0].metadata_id, stored[0].metadata_id);
    assert!(rows[0].equal_excluding_metadata(&stored[0]));
    assert_eq!(
        rows[0].operation_resource.get("read"),
        Some(&vec!["Patient".to_string()])
    );
}

#[tokio::test]
async fn test_changed_content_supersedes_row() {
    let store = Arc::new(InMemoryEndpointStore::new());
    let handler = capability_handler(Arc::clone(&store));

    handler.ingest(&capability_message("4.0", "TLS 1.2")).await.unwrap();
    let outcome = handler.ingest(&capability_message("4.0", "TLS 1.3")).await.unwrap();
    assert_eq!(outcome, IngestOutcome::Updated);

    let rows = store.info_rows().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tls_version, "TLS 1.3");

    let history = store.history_rows().await;
    assert_eq!(history.last().unwrap().operation, HistoryOperation::Update);
    assert_eq!(history.last().unwrap().info.tls_version, "TLS 1.3");
}

#[tokio::test]
async fn test_empty_requested_version_keys_as_none() {
    let store = Arc::new(InMemoryEndpointStore::new());
    let handler = capability_handler(Arc::clone(&store));

    handler.ingest(&capability_message("", "TLS 1.2")).await.unwrap();
    let info = store
        .get_current_info(URL, &RequestedVersion::none())
        .await
        .unwrap();
    assert!(info.is_some());
}

async fn seed(store: &InMemoryEndpointStore, version: &str) {
    let version = RequestedVersion::new(version);
    let metadata_id = store
        .insert_metadata(&EndpointMetadata::new(URL, version.clone()))
        .await
        .unwrap();
    store
        .insert_info(&EndpointInfo::new(URL, version), metadata_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_versions_response_prunes_unadvertised_rows() {
    let store = Arc::new(InMemoryEndpointStore::new());
    seed(&store, "None").await;
    seed(&store, "STU3").await;

    let broker = InMemoryBroker::new();
    let ch = broker.create_channel().await.unwrap();
    broker.declare_queue(ch, "endpoints-to-capability").await.unwrap();
    let handler = VersionsIngestHandler::new(
        store.clone(),
        QueueTarget::new(Arc::new(broker.clone()), ch, "endpoints-to-capability"),
        CancellationToken::new(),
        Arc::new(PipelineMetrics::new()),
    );

    let payload = serde_json::to_vec(&json!({
        "url": URL,
        "versionsResponse": {"versions": ["R4"], "default": "R4"}
    }))
    .unwrap();
    handler.handle(&payload).await.unwrap();

    let remaining: Vec<String> = store
        .info_rows()
        .await
        .iter()
        .map(|i| i.requested_fhir_version.to_string())
        .collect();
    assert_eq!(remaining, vec!["None"]);

    let history = store.history_rows().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].operation, HistoryOperation::Delete);
    assert_eq!(history[0].info.requested_fhir_version.as_str(), "STU3");

    let requests: Vec<CapabilityRequest> = broker
        .queued("endpoints-to-capability")
        .await
        .iter()
        .map(|p| serde_json::from_slice(p).unwrap())
        .collect();
    let versions: Vec<&str> = requests.iter().map(|r| r.request_version.as_str()).collect();
    assert_eq!(versions, vec!["R4", "None"]);
    assert!(requests.iter().all(|r| r.default_version == "R4" && r.url == URL));

    let saved = store.get_versions_response(URL).await.unwrap().unwrap();
    assert_eq!(saved.versions, vec!["R4"]);
}

#[tokio::test]
async fn test_missing_url_is_acknowledged_without_redelivery() {
    let store = Arc::new(InMemoryEndpointStore::new());
    let handler: Arc<dyn MessageHandler> = Arc::new(capability_handler(Arc::clone(&store)));

    let broker = InMemoryBroker::new();
    let ch = broker.create_channel().await.unwrap();
    broker.declare_queue(ch, "capability-statements").await.unwrap();
    broker
        .publish(ch, "capability-statements", br#"{"err": "", "httpResponse": 200}"#)
        .await
        .unwrap();
    let stream = broker.consume(ch, "capability-statements").await.unwrap();
    broker.close().await.unwrap();

    let (tx, mut rx) = mpsc::channel(4);
    process_messages(
        stream,
        handler,
        AckPolicy::AckAlways,
        tx,
        Arc::new(PipelineMetrics::new()),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let err = rx.recv().await.unwrap();
    assert!(matches!(err, LanternError::MalformedMessage(ref m) if m.contains("url")));

    let stats = broker.stats().await;
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.acked, 1);
    assert_eq!(stats.redelivered, 0);
    assert!(store.info_rows().await.is_empty());
}
