use super::*;
use crate::provider::tests::MockProvider;
use std::fs;
use tempfile::TempDir;

fn isolated_settings(dir: &TempDir) -> Settings {
    Settings::default()
        .with_path(dir.path().join(".secrets"))
        .with_system_env(false)
}

fn store_with_mock(dir: &TempDir, content: &str, mock: &MockProvider) -> Secrets {
    fs::write(dir.path().join(".secrets"), content).unwrap();
    Secrets::with_provider(isolated_settings(dir), Box::new(mock.clone()))
}

#[test]
fn test_new_builds_provider_from_uri() {
    let dir = TempDir::new().unwrap();

    let secrets = Secrets::new(isolated_settings(&dir).with_provider("memory://")).unwrap();
    assert_eq!(secrets.provider_name(), "memory");

    match Secrets::new(isolated_settings(&dir).with_provider("warehouse://")) {
        Err(SecretGateError::ProviderNotFound(name)) => assert_eq!(name, "warehouse"),
        _ => panic!("Expected ProviderNotFound error"),
    }
}

#[tokio::test]
async fn test_file_values_resolve_through_chains() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::new();
    let secrets = store_with_mock(
        &dir,
        "KIKE=12345\nDEBUG=true\nTOKEN=abc-123\nPORT=8080\n",
        &mock,
    );

    assert_eq!(secrets.get("KIKE").required().await.unwrap(), "12345");
    assert!(secrets.get("DEBUG").boolean().is_true().await.unwrap());
    assert_eq!(
        secrets
            .get("TOKEN")
            .regex("(?i)^[-a-z0-9]+$", "token must be a slug")
            .await
            .unwrap(),
        "abc-123"
    );

    // File-backed keys are cached up front, so the sync channel works too.
    let port = secrets
        .get("PORT")
        .number()
        .between(1.0, 65535.0)
        .value()
        .unwrap();
    assert_eq!(port, 8080.0);
    assert_eq!(mock.fetch_count(), 0);
}

#[tokio::test]
async fn test_absent_key_resolves_to_empty_string() {
    let dir = TempDir::new().unwrap();
    let secrets = store_with_mock(&dir, "", &MockProvider::new());

    assert_eq!(secrets.get("SHOULD_THROW").await.unwrap(), "");

    match secrets.get("SHOULD_THROW").required().await {
        Err(SecretGateError::Validation { key, rule, .. }) => {
            assert_eq!(key, "SHOULD_THROW");
            assert_eq!(rule, "required");
        }
        _ => panic!("Expected Validation error"),
    }
}

#[test]
fn test_sync_access_before_preload_is_refused() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::with_entries([("API_TOKEN", "sk-1")]);
    let secrets = store_with_mock(&dir, "", &mock);

    let err = secrets.get("API_TOKEN").value().unwrap_err();
    match &err {
        SecretGateError::SyncAccessWithoutPreload { key } => assert_eq!(key, "API_TOKEN"),
        _ => panic!("Expected SyncAccessWithoutPreload error"),
    }
    assert!(err.to_string().contains("preload"));

    // Rules do not change the outcome; the value is simply not there yet.
    match secrets.get("API_TOKEN").required().value() {
        Err(SecretGateError::SyncAccessWithoutPreload { .. }) => {}
        _ => panic!("Expected SyncAccessWithoutPreload error"),
    }
    assert_eq!(mock.fetch_count(), 0);
}

#[tokio::test]
async fn test_public_keys_are_always_synchronous() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::new();
    let secrets = store_with_mock(&dir, "PUBLIC_APP_NAME=demo\nSECRET=hidden\n", &mock);

    assert_eq!(secrets.get("PUBLIC_APP_NAME").value().unwrap(), "demo");
    assert_eq!(secrets.get("PUBLIC_APP_NAME").await.unwrap(), "demo");
    assert_eq!(secrets.get("PUBLIC_MISSING").value().unwrap(), "");

    assert_eq!(
        secrets.get_public_sync("PUBLIC_APP_NAME").unwrap(),
        Some("demo".to_string())
    );
    assert_eq!(secrets.get_public_sync("SECRET").unwrap(), None);
    assert_eq!(mock.fetch_count(), 0);
}

#[tokio::test]
async fn test_public_keys_never_reach_the_provider() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::with_entries([("PUBLIC_BRAND", "provider-value")]).sync_capable();
    let secrets = store_with_mock(&dir, "PUBLIC_APP_NAME=Widget\n", &mock);

    // Both load paths answer public keys from the file state alone.
    assert_eq!(
        secrets.load("PUBLIC_APP_NAME").await.unwrap(),
        Some("Widget".to_string())
    );
    assert_eq!(
        secrets.load_sync("PUBLIC_APP_NAME").unwrap(),
        Some("Widget".to_string())
    );

    // A provider-side value under a public name stays invisible, even
    // though this provider would happily serve it.
    assert_eq!(secrets.load("PUBLIC_BRAND").await.unwrap(), None);
    assert_eq!(secrets.load_sync("PUBLIC_BRAND").unwrap(), None);
    assert_eq!(mock.fetch_count(), 0);

    // Nothing leaked into the private cache, so push sends nothing.
    let report = secrets.push().await.unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(mock.stored("PUBLIC_APP_NAME"), None);
}

#[test]
fn test_get_sync_if_cached_answers_from_files_only() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::with_entries([("REMOTE", "r")]);
    let secrets = store_with_mock(&dir, "LOCAL=file-value\n", &mock);

    assert_eq!(
        secrets.get_sync_if_cached("LOCAL").unwrap(),
        Some("file-value".to_string())
    );
    assert_eq!(secrets.get_sync_if_cached("REMOTE").unwrap(), None);
    assert_eq!(mock.fetch_count(), 0);
}

#[tokio::test]
async fn test_provider_fetch_is_cached_after_first_resolution() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::with_entries([("API_TOKEN", "sk-live-1")]);
    let secrets = store_with_mock(&dir, "", &mock);

    assert_eq!(secrets.get("API_TOKEN").await.unwrap(), "sk-live-1");
    assert_eq!(mock.fetch_count(), 1);

    // The second access is served from the cache, synchronously.
    assert_eq!(secrets.get("API_TOKEN").value().unwrap(), "sk-live-1");
    assert_eq!(mock.fetch_count(), 1);
}

#[tokio::test]
async fn test_clones_share_cache_and_provider() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::with_entries([("SHARED", "v")]);
    let secrets = store_with_mock(&dir, "", &mock);
    let clone = secrets.clone();

    assert_eq!(clone.load("SHARED").await.unwrap(), Some("v".to_string()));
    assert_eq!(secrets.get("SHARED").value().unwrap(), "v");
    assert_eq!(mock.fetch_count(), 1);
}

#[tokio::test]
async fn test_preload_enables_sync_access() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::with_entries([("ALPHA", "1"), ("BETA", "2")]);
    let secrets = store_with_mock(&dir, "", &mock);
    assert!(!secrets.is_preloaded());

    secrets
        .preload(["ALPHA", "BETA", "ALPHA", "PUBLIC_SKIPPED"])
        .await
        .unwrap();

    assert!(secrets.is_preloaded());
    assert_eq!(mock.fetch_count(), 2);
    assert_eq!(secrets.get("ALPHA").value().unwrap(), "1");
    assert_eq!(secrets.get("BETA").number().value().unwrap(), 2.0);

    // After preload, keys that stayed missing read as empty.
    assert_eq!(secrets.get("GAMMA").value().unwrap(), "");

    // A second preload finds everything cached already.
    secrets.preload(["ALPHA", "BETA"]).await.unwrap();
    assert_eq!(mock.fetch_count(), 2);
}

#[tokio::test]
async fn test_preload_tolerates_transport_failures() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::new().failing_transport();
    let secrets = store_with_mock(&dir, "", &mock);

    secrets.preload(["UNREACHABLE"]).await.unwrap();

    assert!(secrets.is_preloaded());
    assert_eq!(secrets.get("UNREACHABLE").value().unwrap(), "");
}

#[tokio::test]
async fn test_transport_failure_reads_as_absent() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::new().failing_transport();
    let secrets = store_with_mock(&dir, "", &mock);

    assert_eq!(secrets.load("FLAKY").await.unwrap(), None);
    assert_eq!(secrets.get("FLAKY").await.unwrap(), "");
    assert!(mock.fetch_count() >= 1);
}

#[test]
fn test_load_sync_consults_only_sync_capable_providers() {
    let dir = TempDir::new().unwrap();
    let sync_mock = MockProvider::with_entries([("KEY", "from-sync")]).sync_capable();
    let secrets = store_with_mock(&dir, "", &sync_mock);

    assert_eq!(
        secrets.load_sync("KEY").unwrap(),
        Some("from-sync".to_string())
    );
    assert_eq!(sync_mock.fetch_count(), 1);
    assert_eq!(secrets.get("KEY").value().unwrap(), "from-sync");

    let dir = TempDir::new().unwrap();
    let async_mock = MockProvider::with_entries([("KEY", "unreachable")]);
    let secrets = store_with_mock(&dir, "", &async_mock);

    assert_eq!(secrets.load_sync("KEY").unwrap(), None);
    assert_eq!(async_mock.fetch_count(), 0);
}

#[tokio::test]
async fn test_provider_swap_keeps_cached_values() {
    let dir = TempDir::new().unwrap();
    let first = MockProvider::with_entries([("KEY", "one")]);
    let secrets = store_with_mock(&dir, "", &first);
    assert_eq!(secrets.load("KEY").await.unwrap(), Some("one".to_string()));

    let second = MockProvider::with_entries([("KEY", "two"), ("FRESH", "f")]).named("memory");
    secrets.set_provider(Box::new(second.clone()));

    assert_eq!(secrets.provider_name(), "memory");
    assert_eq!(secrets.get("KEY").value().unwrap(), "one");
    assert_eq!(secrets.load("FRESH").await.unwrap(), Some("f".to_string()));
}

#[tokio::test]
async fn test_fetch_normalizes_keys_for_the_provider() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::with_entries([("MY_KEY", "42")]).named("env");
    let secrets = store_with_mock(&dir, "", &mock);

    assert_eq!(secrets.load("my.key").await.unwrap(), Some("42".to_string()));

    // The cache keeps the canonical spelling, not the provider's.
    assert_eq!(
        secrets.get_sync_if_cached("my.key").unwrap(),
        Some("42".to_string())
    );
    assert_eq!(secrets.get_sync_if_cached("MY_KEY").unwrap(), None);
}

#[test]
fn test_key_rewrite_warns_exactly_once() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct WarnCount(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCount {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    let dir = TempDir::new().unwrap();
    let mock = MockProvider::with_entries([("MY_KEY", "42"), ("PLAIN", "p")])
        .named("env")
        .sync_capable();
    let secrets = store_with_mock(&dir, "", &mock);

    let warns = WarnCount::default();
    let subscriber = tracing_subscriber::registry().with(warns.clone());
    let value = tracing::subscriber::with_default(subscriber, || {
        // A key already in the provider's format resolves silently.
        assert_eq!(secrets.load_sync("PLAIN").unwrap(), Some("p".to_string()));
        assert_eq!(warns.0.load(Ordering::SeqCst), 0);

        secrets.load_sync("my.key").unwrap()
    });

    assert_eq!(value, Some("42".to_string()));
    assert_eq!(warns.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_push_sends_only_private_entries() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::new();
    let secrets = store_with_mock(&dir, "API_TOKEN=t-1\nPUBLIC_APP_NAME=demo\n", &mock);

    let report = secrets.push().await.unwrap();

    assert_eq!(report.pushed, 1);
    assert!(report.is_complete());
    assert_eq!(mock.stored("API_TOKEN"), Some("t-1".to_string()));
    assert_eq!(mock.stored("PUBLIC_APP_NAME"), None);
}

#[tokio::test]
async fn test_push_normalizes_keys_for_strict_providers() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::new().named("env");
    let secrets = store_with_mock(&dir, "lower_key=v\n", &mock);

    let report = secrets.push().await.unwrap();

    assert_eq!(report.pushed, 1);
    assert_eq!(mock.stored("LOWER_KEY"), Some("v".to_string()));
    assert_eq!(mock.stored("lower_key"), None);
}

#[tokio::test]
async fn test_push_collects_per_key_failures() {
    let dir = TempDir::new().unwrap();
    let mock = MockProvider::new().fail_pushes_for(["BAD"]);
    let secrets = store_with_mock(&dir, "GOOD=1\nBAD=2\n", &mock);

    let report = secrets.push().await.unwrap();

    assert_eq!(report.pushed, 1);
    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "BAD");
    assert_eq!(mock.stored("GOOD"), Some("1".to_string()));
}

#[tokio::test]
async fn test_push_rejects_read_only_providers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".secrets"), "TOKEN=x\n").unwrap();
    let secrets = Secrets::new(isolated_settings(&dir).with_provider("env://")).unwrap();

    match secrets.push().await {
        Err(SecretGateError::PushNotSupported(name)) => assert_eq!(name, "env"),
        _ => panic!("Expected PushNotSupported error"),
    }
}

#[test]
fn test_environment_specific_files_override_the_base() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".secrets"),
        "DATABASE_URL=postgres://localhost/dev\n",
    )
    .unwrap();
    fs::write(
        dir.path().join(".secrets.staging"),
        "DATABASE_URL=postgres://db.internal/staging\n",
    )
    .unwrap();

    let settings = isolated_settings(&dir).with_environment("staging");
    let secrets = Secrets::with_provider(settings, Box::new(MockProvider::new()));

    assert_eq!(
        secrets.get("DATABASE_URL").value().unwrap(),
        "postgres://db.internal/staging"
    );
}

#[tokio::test]
async fn test_initialization_failure_surfaces_and_later_retries() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".secrets.enc"), "not really encrypted").unwrap();
    let secrets = Secrets::with_provider(isolated_settings(&dir), Box::new(MockProvider::new()));

    // get() never panics; the wrapper carries the failure on both channels.
    match secrets.get("KEY").value() {
        Err(SecretGateError::Initialization(_)) => {}
        _ => panic!("Expected Initialization error"),
    }
    match secrets.load("KEY").await {
        Err(SecretGateError::EncryptionKeyMissing { path }) => {
            assert!(path.ends_with(".secrets.enc"));
        }
        _ => panic!("Expected EncryptionKeyMissing error"),
    }

    // The failed load did not pin the store; a plain file appearing later
    // is picked up on the next access.
    fs::write(dir.path().join(".secrets"), "KEY=recovered\n").unwrap();
    assert_eq!(secrets.get("KEY").value().unwrap(), "recovered");
    assert_eq!(secrets.get("KEY").await.unwrap(), "recovered");
}
