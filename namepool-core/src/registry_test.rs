#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::clock::SystemClock;
    use crate::engine::Engine;
    use crate::error::{Error, Result};
    use crate::manager::NameManager;
    use crate::registry::{Backend, BackendRegistry};
    use crate::store_memory::MemoryStore;

    fn test_backend(scheme: &'static str) -> Backend {
        fn create(_backend_url: &str) -> Result<Arc<dyn NameManager>> {
            Ok(Arc::new(Engine::new(
                MemoryStore::new(),
                Arc::new(SystemClock),
                None,
            )))
        }
        Backend {
            scheme,
            description: "test backend",
            create,
        }
    }

    #[test]
    fn test_create_from_url_dispatches_on_scheme() {
        let mut registry = BackendRegistry::new();
        registry.register(test_backend("backend"));

        let manager = registry.create("backend://my/url").unwrap();
        assert_eq!(manager.acquire("foo").unwrap(), "0");
    }

    #[test]
    fn test_invalid_url() {
        let registry = BackendRegistry::with_defaults();
        for url in ["not-a-url", "mem://", "://x"] {
            let err = registry.create(url).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{url} must be rejected");
        }
    }

    #[test]
    fn test_unregistered_scheme() {
        let registry = BackendRegistry::with_defaults();
        let err = registry.create("carrier-pigeon://coop").unwrap_err();
        assert!(err.to_string().contains("has not been registered"));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_double_registration_panics() {
        let mut registry = BackendRegistry::new();
        registry.register(test_backend("dup"));
        registry.register(test_backend("dup"));
    }

    #[test]
    fn test_default_backends() {
        let registry = BackendRegistry::with_defaults();
        let schemes: Vec<&str> = registry.backends().map(|b| b.scheme).collect();
        assert_eq!(schemes, vec!["local", "mem", "rest"]);
    }

    #[test]
    fn test_memory_backend_from_url() {
        let registry = BackendRegistry::with_defaults();
        let manager = registry.create("mem://scratch;autoReleaseAfter=15s").unwrap();
        assert_eq!(manager.acquire("foo").unwrap(), "0");
        assert_eq!(
            manager.keep_alive_interval(),
            Some(std::time::Duration::from_secs(5))
        );
    }

    #[test]
    fn test_local_backend_from_url() {
        let dir = TempDir::new().unwrap();
        let url = format!("local://{}", dir.path().join("names.db").display());
        let registry = BackendRegistry::with_defaults();
        let manager = registry.create(&url).unwrap();
        assert_eq!(manager.acquire("foo").unwrap(), "0");
        assert_eq!(manager.keep_alive_interval(), None);
    }

    #[test]
    fn test_rest_backend_from_url() {
        let registry = BackendRegistry::with_defaults();
        // Construction does not touch the network.
        let manager = registry
            .create("rest://localhost:9008;keepAliveInterval=5s")
            .unwrap();
        assert_eq!(
            manager.keep_alive_interval(),
            Some(std::time::Duration::from_secs(5))
        );
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let registry = BackendRegistry::with_defaults();
        let err = registry.create("mem://scratch;variant=cosmosDB").unwrap_err();
        assert!(err.to_string().contains("variant"));
    }
}
