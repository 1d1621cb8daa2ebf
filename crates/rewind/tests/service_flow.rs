use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rewind::{
    ApkInfo, AppError, AppPaths, AppSettings, BackendError, CoreModStatus, DeviceController,
    HostCapabilities, InstalledMod, ModRegistry, PatchApplier, RejectUnverified, RewindService,
    TargetSelection,
};
use semver::Version;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CURRENT: &str = "1.37.0_9064817954";
const TARGET: &str = "1.35.0_8016709773";

/// Headset that must never be touched by these flows.
struct UntouchedDevice;

#[async_trait]
impl DeviceController for UntouchedDevice {
    async fn force_stop(&self, _app_id: &str) -> Result<(), BackendError> {
        panic!("force_stop called");
    }

    async fn uninstall(&self, _app_id: &str) -> Result<(), BackendError> {
        panic!("uninstall called");
    }

    async fn install(&self, _apk_path: &Path) -> Result<(), BackendError> {
        panic!("install called");
    }

    async fn pull_file(
        &self,
        _remote_name: &str,
        _dest_dir: &Path,
    ) -> Result<Option<PathBuf>, BackendError> {
        panic!("pull_file called");
    }

    async fn push_replace(
        &self,
        _remote_name: &str,
        _local_output_name: &str,
        _local_path: &Path,
    ) -> Result<(), BackendError> {
        panic!("push_replace called");
    }

    async fn backup_data(&self) -> Result<PathBuf, BackendError> {
        panic!("backup_data called");
    }

    async fn backup_assets(&self) -> Result<PathBuf, BackendError> {
        panic!("backup_assets called");
    }

    async fn restore_data(&self, _backup_path: &Path) -> Result<(), BackendError> {
        panic!("restore_data called");
    }

    async fn restore_assets(&self, _backup_path: &Path) -> Result<(), BackendError> {
        panic!("restore_assets called");
    }
}

struct NoPatches;

#[async_trait]
impl PatchApplier for NoPatches {
    async fn apply_patch(
        &self,
        _source: &Path,
        _diff: &Path,
        _output: &Path,
    ) -> Result<(), BackendError> {
        Err(BackendError::Unsupported {
            operation: "apply_patch",
        })
    }
}

#[derive(Default)]
struct Registry {
    mods: Vec<InstalledMod>,
    enabled: Mutex<Vec<String>>,
}

#[async_trait]
impl ModRegistry for Registry {
    async fn installed_mods(&self) -> Result<Vec<InstalledMod>, BackendError> {
        Ok(self.mods.clone())
    }

    async fn enable_mod(&self, id: &str) -> Result<(), BackendError> {
        self.enabled.lock().expect("enabled lock").push(id.to_string());
        Ok(())
    }
}

struct Setup {
    temp: TempDir,
    server: MockServer,
    registry: Arc<Registry>,
    service: RewindService,
}

fn diff_index() -> serde_json::Value {
    serde_json::json!([{
        "from_version": CURRENT,
        "to_version": TARGET,
        "apk_diff": {
            "diff_name": "bs-1.37-1.35.apk.diff",
            "file_name": "base.apk",
            "file_crc": 1,
            "output_file_name": "bs-1.35.apk",
            "output_crc": 2,
            "output_size": 3
        }
    }])
}

async fn serve(server: &MockServer, route: &str, body: &serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

async fn setup(core_mods: serde_json::Value, installed: Vec<InstalledMod>) -> Setup {
    let server = MockServer::start().await;
    serve(&server, "/core_mods.json", &core_mods).await;

    let temp = tempfile::tempdir().expect("create temp dir");
    let paths = AppPaths::rooted_at(temp.path());
    let settings = AppSettings {
        diff_index_url: format!("{}/index.json", server.uri()),
        diff_checksums_url: format!("{}/assets.crc32.json", server.uri()),
        diff_base_url: format!("{}/diffs/", server.uri()),
        core_mods_url: format!("{}/core_mods.json", server.uri()),
        retry_delays_secs: vec![0],
        ..AppSettings::default()
    };

    let registry = Arc::new(Registry {
        mods: installed,
        ..Registry::default()
    });
    let service = RewindService::new(
        settings,
        paths,
        HostCapabilities {
            device: Arc::new(UntouchedDevice),
            applier: Arc::new(NoPatches),
            prompter: Arc::new(RejectUnverified),
            registry: registry.clone(),
        },
    )
    .expect("service builds");

    Setup {
        temp,
        server,
        registry,
        service,
    }
}

fn installed_apk() -> ApkInfo {
    ApkInfo::new(CURRENT, None, true, "/sdcard/base.apk")
}

fn installed_mod(id: &str, version: &str, enabled: bool) -> InstalledMod {
    InstalledMod {
        id: id.to_string(),
        version: Version::parse(version).expect("valid semver in test"),
        enabled,
    }
}

#[tokio::test]
async fn current_version_with_core_mods_skips_the_diff_index() {
    let core_mods = serde_json::json!({
        "1.37.0_9064817954": {"mods": [{"id": "beatsaber-hook", "version": "6.0.0"}]}
    });
    let s = setup(core_mods, Vec::new()).await;
    Mock::given(method("GET"))
        .and(path("/index.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&s.server)
        .await;

    let selection = s
        .service
        .select_target(&installed_apk(), false)
        .await
        .expect("selection runs");

    assert_eq!(selection, TargetSelection::UseCurrent);
}

#[tokio::test]
async fn missing_core_mods_select_the_moddable_downgrade() {
    let core_mods = serde_json::json!({
        "1.35.0_8016709773": {"mods": [{"id": "beatsaber-hook", "version": "5.1.6"}]}
    });
    let s = setup(core_mods, Vec::new()).await;
    serve(&s.server, "/index.json", &diff_index()).await;
    serve(&s.server, "/assets.crc32.json", &serde_json::json!({})).await;

    let selection = s
        .service
        .select_target(&installed_apk(), false)
        .await
        .expect("selection runs");

    let TargetSelection::Downgrade(diff) = selection else {
        panic!("expected a downgrade");
    };
    assert_eq!(diff.to_version, TARGET);
    assert!(s.service.downgrade_available(Some(&installed_apk())));
}

#[tokio::test]
async fn unreachable_index_is_reported_as_download_failure() {
    let s = setup(serde_json::json!({}), Vec::new()).await;

    let error = s
        .service
        .select_target(&installed_apk(), false)
        .await
        .expect_err("index is not served");

    assert!(error.is_download_failure(), "{error}");
}

#[tokio::test]
async fn downgrade_is_rejected_while_another_operation_runs() {
    let s = setup(serde_json::json!({}), Vec::new()).await;
    let apk = installed_apk();
    let diff: Vec<rewind::AppDiff> =
        serde_json::from_value(diff_index()).expect("fixture deserializes");

    let _held = s
        .service
        .operation_lock()
        .try_acquire("patch")
        .expect("lock is free");

    let error = s
        .service
        .downgrade(Some(&apk), &diff[0])
        .await
        .expect_err("lock is held");
    assert_eq!(error, AppError::OperationInProgress);

    let error = s
        .service
        .verify_core_mods(Some(&apk), false)
        .await
        .expect_err("lock is held");
    assert_eq!(error, AppError::OperationInProgress);
}

#[tokio::test]
async fn mismatched_source_version_fails_before_any_device_call() {
    let s = setup(serde_json::json!({}), Vec::new()).await;
    let apk = ApkInfo::new("1.36.2_7373719935", None, true, "/sdcard/base.apk");
    let diff: Vec<rewind::AppDiff> =
        serde_json::from_value(diff_index()).expect("fixture deserializes");

    let error = s
        .service
        .downgrade(Some(&apk), &diff[0])
        .await
        .expect_err("versions differ");

    assert!(matches!(
        error,
        AppError::DowngradeFailed {
            stage: "sanity check",
            ..
        }
    ));
    assert!(!s.service.operation_lock().is_busy());
}

#[tokio::test]
async fn verify_core_mods_enables_disabled_mods() {
    let core_mods = serde_json::json!({
        "1.37.0_9064817954": {"mods": [
            {"id": "beatsaber-hook", "version": "6.0.0"},
            {"id": "custom-types", "version": "0.18.0"}
        ]}
    });
    let s = setup(
        core_mods,
        vec![
            installed_mod("beatsaber-hook", "6.0.0", false),
            installed_mod("custom-types", "0.18.1", true),
        ],
    )
    .await;

    let status = s
        .service
        .verify_core_mods(Some(&installed_apk()), false)
        .await
        .expect("verification runs");

    assert!(status.is_complete());
    assert_eq!(
        status,
        CoreModStatus::Verified {
            missing: Vec::new(),
            enabled: vec!["beatsaber-hook".to_string()],
        }
    );
    assert_eq!(
        *s.registry.enabled.lock().expect("enabled lock"),
        vec!["beatsaber-hook".to_string()]
    );
}

#[tokio::test]
async fn saved_settings_are_loaded_back() {
    let mut s = setup(serde_json::json!({}), Vec::new()).await;
    let settings = AppSettings {
        expert_mode: true,
        ..s.service.settings().clone()
    };

    s.service.save_settings(settings).expect("settings save");

    let paths = AppPaths::rooted_at(s.temp.path());
    assert!(AppSettings::load(&paths).expert_mode);
    assert!(s.service.settings().expert_mode);
}
