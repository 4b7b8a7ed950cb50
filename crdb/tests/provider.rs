use crdb::error::ErrorKind;
use crdb::k8s::K8sClient;
use crdb::provider::Provider;
use crdb::resources::{DatabaseDataSource, DatabaseResource, UserResource};
use crdb_config::shared::{DEFAULT_TUNNEL_READY_TIMEOUT_MS, KubeConfig, ProviderConfig};
use crdb_telemetry::init_test_tracing;
use std::sync::Arc;

use crate::support::mocks::{MockK8sClient, UnreachableConnector};
use crate::support::net::{free_port, port_is_free, spawn_closing_server};

mod support;

fn tunnel_config() -> ProviderConfig {
    ProviderConfig {
        username: "root".to_owned(),
        password: "secret".into(),
        dns: None,
        kube_config: Some(KubeConfig::new("db", "cockroachdb-public")),
        tunnel_ready_timeout_ms: DEFAULT_TUNNEL_READY_TIMEOUT_MS,
    }
}

fn provider(k8s_client: MockK8sClient) -> Provider {
    Provider::with_k8s_client(&tunnel_config(), Some(Arc::new(k8s_client) as Arc<dyn K8sClient>))
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_kube_config_is_rejected_up_front() {
    init_test_tracing();
    let mut config = tunnel_config();
    config.kube_config = Some(KubeConfig::new("", "cockroachdb-public"));

    let err = Provider::with_k8s_client(&config, None).err().unwrap();

    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
}

#[tokio::test(flavor = "multi_thread")]
async fn tunnel_is_released_when_the_database_hangs_up() {
    init_test_tracing();
    // Arrange
    let remote = spawn_closing_server().await;
    let provider = provider(MockK8sClient::forwarding_to(remote));
    let local_port = free_port();

    // Act
    let err = DatabaseResource::with_local_port(&provider, local_port.to_string())
        .read("analytics")
        .await
        .unwrap_err();

    // Assert
    assert_eq!(err.kind(), ErrorKind::DatabaseConnectionFailed);
    assert!(port_is_free(local_port).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn tunnel_failure_is_reported_over_the_connection_error() {
    init_test_tracing();
    let provider = provider(MockK8sClient::with_connector(Arc::new(UnreachableConnector)));
    let local_port = free_port();

    let err = UserResource::with_local_port(&provider, local_port.to_string())
        .read("app_user")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RemoteUnreachableError);
    assert!(port_is_free(local_port).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn configuration_errors_surface_before_connecting() {
    init_test_tracing();
    let provider = provider(MockK8sClient::without_pods());

    let err = DatabaseDataSource::with_local_port(&provider, "")
        .read("analytics")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_names_are_rejected_without_a_tunnel() {
    init_test_tracing();
    let provider = provider(MockK8sClient::without_pods());

    let err = DatabaseResource::new(&provider).read("").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

#[tokio::test(flavor = "multi_thread")]
async fn direct_mode_connects_without_a_tunnel() {
    init_test_tracing();
    let remote = spawn_closing_server().await;
    let config = ProviderConfig {
        dns: Some(
            format!("postgresql://root:secret@{remote}/system?sslmode=disable").into(),
        ),
        kube_config: None,
        ..tunnel_config()
    };
    let k8s_client = Arc::new(MockK8sClient::without_pods());
    let provider =
        Provider::with_k8s_client(&config, Some(k8s_client.clone() as Arc<dyn K8sClient>)).unwrap();

    let err = DatabaseResource::new(&provider)
        .read("analytics")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DatabaseConnectionFailed);
    assert_eq!(k8s_client.pod_lookups(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn padded_local_port_fails_before_the_cluster_is_touched() {
    init_test_tracing();
    let remote = spawn_closing_server().await;
    let k8s_client = Arc::new(MockK8sClient::forwarding_to(remote));
    let provider = Provider::with_k8s_client(
        &tunnel_config(),
        Some(k8s_client.clone() as Arc<dyn K8sClient>),
    )
    .unwrap();
    let local_port = free_port();

    let err = DatabaseResource::with_local_port(&provider, format!(" {local_port}"))
        .read("analytics")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
    assert_eq!(k8s_client.pod_lookups(), 0);
    assert!(port_is_free(local_port).await);
}
