//! Common test utilities for gateway-service integration tests.

use gateway_service::config::{
    AppConfig, BillingConfig, DatabaseConfig, GatewayConfig, ProvidersConfig,
};
use gateway_service::services::providers::mock::MockChatProvider;
use gateway_service::services::providers::{ChatProvider, ProviderRegistry};
use gateway_service::services::store::MemoryStore;
use gateway_service::startup::Application;
use rust_decimal::Decimal;
use service_core::config::Config as CommonConfig;
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,gateway_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Configuration for tests: random port, in-memory-friendly defaults,
/// 0.01 credits per 1k tokens and 10 starting credits.
pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        common: CommonConfig {
            port: 0,
            log_level: "debug".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 2,
            min_connections: 1,
        },
        providers: ProvidersConfig {
            openrouter_api_key: None,
            huggingface_api_key: None,
            enable_mock: false,
        },
        app: AppConfig {
            url: "http://localhost:3000".to_string(),
            title: "Relay Gateway".to_string(),
        },
        billing: BillingConfig {
            cost_per_1k_tokens: Decimal::new(1, 2),
            starting_credits: Decimal::new(10, 0),
            default_account: "default-account".to_string(),
        },
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<MemoryStore>,
    pub mock_provider: Arc<MockChatProvider>,
}

/// Spawn the application on a random port with the in-memory store and the
/// mock provider registered.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(Vec::new()).await
}

/// Like [`spawn_app`], with extra adapters registered alongside the mock.
pub async fn spawn_app_with(extra_providers: Vec<Arc<dyn ChatProvider>>) -> TestApp {
    init_tracing();

    let store = Arc::new(MemoryStore::new());
    let mock_provider = Arc::new(MockChatProvider::new());

    let mut registry = ProviderRegistry::new();
    registry.register(mock_provider.clone());
    for provider in extra_providers {
        registry.register(provider);
    }

    let app = Application::build_with(test_config(), store.clone(), registry)
        .await
        .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", app.port());

    // Spawn the server in the background
    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    TestApp {
        address,
        store,
        mock_provider,
    }
}

/// Split an SSE body into its `data:` payloads, in arrival order.
pub fn sse_data_payloads(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(str::to_string)
        .collect()
}
