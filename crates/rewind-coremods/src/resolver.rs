use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use rewind_backend::ModRegistry;
use rewind_core::{FetchError, HttpTransport, Loader, SharedCache};
use tokio_util::sync::CancellationToken;

use crate::error::CoreModError;
use crate::model::{CoreModDescriptor, CoreModIndex, CoreModsEntry};

pub const DEFAULT_CORE_MODS_URL: &str =
    "https://raw.githubusercontent.com/QuestPackageManager/bs-coremods/main/core_mods.json";

#[derive(Debug, Clone)]
pub struct CoreModsConfig {
    pub index_url: String,
}

impl Default for CoreModsConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_CORE_MODS_URL.to_string(),
        }
    }
}

/// Outcome of checking the installed mods against the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreModStatus {
    /// No app is installed, or nothing is published for its version.
    NoData,
    Verified {
        /// Core mods that must be installed or upgraded.
        missing: Vec<CoreModDescriptor>,
        /// Ids of installed core mods that were switched back on.
        enabled: Vec<String>,
    },
}

impl CoreModStatus {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Verified { missing, .. } if missing.is_empty())
    }
}

struct CoreModsLoader {
    transport: HttpTransport,
    url: String,
}

#[async_trait]
impl Loader<CoreModIndex> for CoreModsLoader {
    type Error = FetchError;

    fn name(&self) -> &'static str {
        "core mod index"
    }

    async fn load(
        &self,
        _cancel: CancellationToken,
        _previous: Option<Arc<CoreModIndex>>,
    ) -> Result<CoreModIndex, FetchError> {
        info!("Loading core mods");
        let entries: HashMap<String, CoreModsEntry> = self.transport.fetch_json(&self.url).await?;
        let index = CoreModIndex::from_entries(entries);
        debug!("Loaded core mods for {} versions", index.len());
        Ok(index)
    }
}

pub struct CoreModResolver {
    cache: Arc<SharedCache<CoreModIndex, FetchError>>,
}

impl CoreModResolver {
    #[must_use]
    pub fn new(transport: HttpTransport, config: &CoreModsConfig) -> Self {
        Self {
            cache: Arc::new(SharedCache::new(CoreModsLoader {
                transport,
                url: config.index_url.clone(),
            })),
        }
    }

    async fn index(&self, refresh: bool) -> Result<Arc<CoreModIndex>, CoreModError> {
        self.cache.get_or_load(refresh).await.map_err(CoreModError::from)
    }

    /// # Errors
    /// Returns an error when the index cannot be loaded.
    pub async fn core_mods_for(
        &self,
        game_version: &str,
        refresh: bool,
    ) -> Result<Vec<CoreModDescriptor>, CoreModError> {
        Ok(self.index(refresh).await?.mods_for(game_version).to_vec())
    }

    /// # Errors
    /// Returns an error when the index cannot be loaded.
    pub async fn is_available(
        &self,
        game_version: &str,
        refresh: bool,
    ) -> Result<bool, CoreModError> {
        Ok(!self.index(refresh).await?.mods_for(game_version).is_empty())
    }

    /// Game versions with at least one published core mod.
    ///
    /// # Errors
    /// Returns an error when the index cannot be loaded.
    pub async fn available_versions(&self, refresh: bool) -> Result<HashSet<String>, CoreModError> {
        let index = self.index(refresh).await?;
        Ok(index
            .versions()
            .filter(|version| !index.mods_for(version).is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Compare the installed mods with the core mods of `installed_version`,
    /// enabling installed core mods that are switched off.
    ///
    /// An installed mod never counts as missing when it is at least as new as
    /// the published one; older index entries are not a reason to downgrade.
    ///
    /// # Errors
    /// Returns an error when the index cannot be loaded or the registry fails.
    pub async fn verify(
        &self,
        installed_version: Option<&str>,
        registry: &dyn ModRegistry,
        refresh: bool,
    ) -> Result<CoreModStatus, CoreModError> {
        info!("Verifying core mods");
        let Some(game_version) = installed_version else {
            warn!("Checking core mods without the game installed");
            return Ok(CoreModStatus::NoData);
        };

        let core_mods = self.core_mods_for(game_version, refresh).await?;
        if core_mods.is_empty() {
            debug!("No core mods published for {game_version}");
            return Ok(CoreModStatus::NoData);
        }

        let installed = registry
            .installed_mods()
            .await
            .map_err(|error| CoreModError::registry("list", "*", error))?;

        let mut missing = Vec::new();
        let mut enabled = Vec::new();
        for core_mod in core_mods {
            let Some(existing) = installed.iter().find(|m| m.id == core_mod.id) else {
                debug!("Core mod {} is not installed", core_mod.id);
                missing.push(core_mod);
                continue;
            };

            if core_mod
                .sem_version()
                .is_some_and(|published| published.cmp_precedence(&existing.version).is_gt())
            {
                debug!(
                    "Core mod {} {} is older than published {}",
                    core_mod.id, existing.version, core_mod.version
                );
                missing.push(core_mod);
            } else if !existing.enabled {
                info!("Enabling core mod {}", core_mod.id);
                registry
                    .enable_mod(&core_mod.id)
                    .await
                    .map_err(|error| CoreModError::registry("enable", &core_mod.id, error))?;
                enabled.push(core_mod.id);
            }
        }

        Ok(CoreModStatus::Verified { missing, enabled })
    }

    pub fn init(&self) {
        self.cache.init();
    }

    pub fn dispose(&self) {
        self.cache.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use rewind_backend::{BackendError, InstalledMod, ModRegistry};
    use rewind_core::HttpTransport;
    use semver::Version;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{CoreModResolver, CoreModStatus, CoreModsConfig};
    use crate::error::CoreModError;

    const GAME: &str = "1.35.0_8016709773";

    struct MockRegistry {
        mods: Vec<InstalledMod>,
        enabled: Mutex<Vec<String>>,
    }

    impl MockRegistry {
        fn new(mods: Vec<InstalledMod>) -> Self {
            Self {
                mods,
                enabled: Mutex::new(Vec::new()),
            }
        }

        fn enabled(&self) -> Vec<String> {
            self.enabled.lock().expect("enabled lock").clone()
        }
    }

    #[async_trait]
    impl ModRegistry for MockRegistry {
        async fn installed_mods(&self) -> Result<Vec<InstalledMod>, BackendError> {
            Ok(self.mods.clone())
        }

        async fn enable_mod(&self, id: &str) -> Result<(), BackendError> {
            self.enabled.lock().expect("enabled lock").push(id.to_string());
            Ok(())
        }
    }

    fn installed(id: &str, version: &str, enabled: bool) -> InstalledMod {
        InstalledMod {
            id: id.to_string(),
            version: version.parse::<Version>().expect("valid semver in test"),
            enabled,
        }
    }

    async fn resolver() -> (MockServer, CoreModResolver) {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "1.35.0_8016709773": {
                "mods": [
                    {"id": "beatsaber-hook", "version": "5.1.6"},
                    {"id": "bs-utils", "version": "0.8.0"},
                    {"id": "custom-types", "version": "0.17.5"}
                ]
            },
            "1.34.2_4356567356": {"mods": [{"id": "beatsaber-hook", "version": "5.1.0"}]},
            "1.28.0_4124311467": {"mods": []}
        });
        Mock::given(method("GET"))
            .and(path("/core_mods.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(&server)
            .await;

        let config = CoreModsConfig {
            index_url: format!("{}/core_mods.json", server.uri()),
        };
        let transport = HttpTransport::new(Duration::from_secs(5)).expect("client builds");
        (server, CoreModResolver::new(transport, &config))
    }

    #[tokio::test]
    async fn index_queries_ignore_versions_without_mods() {
        let (_server, resolver) = resolver().await;

        assert!(resolver.is_available(GAME, false).await.expect("index loads"));
        assert!(!resolver.is_available("1.28.0_4124311467", false).await.expect("cached"));
        assert_eq!(resolver.core_mods_for(GAME, false).await.expect("cached").len(), 3);

        let versions = resolver.available_versions(false).await.expect("cached");
        assert_eq!(versions.len(), 2);
        assert!(versions.contains("1.34.2_4356567356"));
    }

    #[tokio::test]
    async fn verify_reports_missing_and_outdated_and_enables_disabled() {
        let (_server, resolver) = resolver().await;
        let registry = MockRegistry::new(vec![
            installed("beatsaber-hook", "5.1.2", true),
            installed("bs-utils", "0.8.0", false),
        ]);

        let status = resolver
            .verify(Some(GAME), &registry, false)
            .await
            .expect("verification runs");

        let CoreModStatus::Verified { missing, enabled } = status else {
            panic!("expected core mods to be verified");
        };
        let missing_ids: Vec<&str> = missing.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(missing_ids, vec!["beatsaber-hook", "custom-types"]);
        assert_eq!(enabled, vec!["bs-utils".to_string()]);
        assert_eq!(registry.enabled(), vec!["bs-utils".to_string()]);
    }

    #[tokio::test]
    async fn newer_installed_core_mod_is_never_downgraded() {
        let (_server, resolver) = resolver().await;
        let registry = MockRegistry::new(vec![
            installed("beatsaber-hook", "6.0.0", true),
            installed("bs-utils", "0.8.0", true),
            installed("custom-types", "0.17.5", true),
        ]);

        let status = resolver
            .verify(Some(GAME), &registry, false)
            .await
            .expect("verification runs");

        assert!(status.is_complete());
        assert!(registry.enabled().is_empty());
    }

    #[tokio::test]
    async fn no_app_or_no_published_mods_is_no_data() {
        let (_server, resolver) = resolver().await;
        let registry = MockRegistry::new(Vec::new());

        assert_eq!(
            resolver.verify(None, &registry, false).await.expect("runs"),
            CoreModStatus::NoData
        );
        assert_eq!(
            resolver
                .verify(Some("1.28.0_4124311467"), &registry, false)
                .await
                .expect("runs"),
            CoreModStatus::NoData
        );
    }

    #[tokio::test]
    async fn unreachable_index_is_a_download_failure() {
        let server = MockServer::start().await;
        let config = CoreModsConfig {
            index_url: format!("{}/core_mods.json", server.uri()),
        };
        let transport = HttpTransport::new(Duration::from_secs(5)).expect("client builds");
        let resolver = CoreModResolver::new(transport, &config);

        let error = resolver.is_available(GAME, false).await.expect_err("404");
        assert!(error.is_download_failure());

        resolver.dispose();
        assert_eq!(
            resolver.is_available(GAME, false).await.expect_err("disposed"),
            CoreModError::Disposed
        );
    }
}
