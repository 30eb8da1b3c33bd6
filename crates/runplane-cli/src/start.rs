//! `runplane start`.

use std::ffi::OsString;
use std::path::PathBuf;

use runplane_instance::Instance;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::StartArgs;
use crate::components::{ComponentLocator, API_COMPONENT, DAEMON_COMPONENT};
use crate::error::SupervisorError;
use crate::home::{resolve_storage_home, HOME_ENV};
use crate::supervisor::{ServiceSpec, Supervisor, SupervisorConfig};
use crate::target::WorkspaceTarget;

/// Everything `start` takes from the environment, resolved once up front.
#[derive(Debug, Clone)]
pub struct StartContext {
    /// Value of the storage home variable, if set.
    pub home: Option<PathBuf>,
    pub cwd: PathBuf,
    pub components: ComponentLocator,
    pub supervisor: SupervisorConfig,
}

impl StartContext {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, SupervisorError> {
        let cwd = std::env::current_dir()?;
        let current_exe = std::env::current_exe().ok();
        let path_var = std::env::var_os("PATH");

        Ok(Self {
            home: std::env::var_os(HOME_ENV).map(PathBuf::from),
            cwd,
            components: ComponentLocator::from_search_path(
                current_exe.as_deref(),
                path_var.as_deref(),
            ),
            supervisor: SupervisorConfig::default(),
        })
    }
}

/// Start the web server and daemon, and supervise them until one exits or
/// `cancel` fires.
pub async fn start(
    args: StartArgs,
    context: StartContext,
    cancel: CancellationToken,
) -> Result<(), SupervisorError> {
    let api = context.components.find(API_COMPONENT).ok_or_else(|| {
        SupervisorError::Usage(format!(
            "The {} component must be installed in order to use the start command.",
            API_COMPONENT
        ))
    })?;
    let daemon = context
        .components
        .find(DAEMON_COMPONENT)
        .unwrap_or_else(|| PathBuf::from(DAEMON_COMPONENT));

    let target = WorkspaceTarget::from_args(&args, &context.cwd)?;

    let home = resolve_storage_home(context.home, &context.cwd);
    if let Some(warning) = &home.warning {
        warn!("{}", warning);
    }

    let instance = Instance::from_config(&home.path).await?;
    let instance_ref = instance.reference().to_json()?;

    println!("Launching runplane services...");
    info!(
        home = %home.path.display(),
        api = %api.display(),
        daemon = %daemon.display(),
        "Launching services"
    );

    let mut service_args: Vec<OsString> = vec![
        "--instance-ref".into(),
        instance_ref.into(),
        "--log-level".into(),
        args.log_level.as_str().into(),
    ];
    service_args.extend(target.to_args());

    let mut daemon_args = vec![OsString::from("run")];
    daemon_args.extend(service_args.iter().cloned());

    let services = vec![
        ServiceSpec::new(API_COMPONENT, api, service_args),
        ServiceSpec::new(DAEMON_COMPONENT, daemon, daemon_args),
    ];

    let result = Supervisor::new(context.supervisor)
        .run(services, cancel)
        .await;
    drop(instance);

    let reports = result?;
    for report in &reports {
        info!(service = %report.service, outcome = ?report.outcome, "Service stopped");
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cli::LogLevel;
    use runplane_core::InstanceRef;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::time::Duration;

    /// Executable that records its arguments one per line, then sleeps.
    fn fake_component(dir: &Path, name: &str) {
        let path = dir.join(name);
        let out = dir.join(format!("{}.args", name));
        let script = format!(
            "#!/bin/sh\nprintf '%s\\n' \"$@\" > '{out}.tmp'\nmv '{out}.tmp' '{out}'\nexec sleep 30\n",
            out = out.display()
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn context(bin: &Path, home: &Path, cwd: &Path) -> StartContext {
        StartContext {
            home: Some(home.to_path_buf()),
            cwd: cwd.to_path_buf(),
            components: ComponentLocator::new(vec![bin.to_path_buf()]),
            supervisor: SupervisorConfig {
                poll_interval: Duration::from_millis(50),
                shutdown_timeout: Duration::from_secs(5),
            },
        }
    }

    async fn read_args(path: &Path) -> Vec<String> {
        for _ in 0..100 {
            if let Ok(raw) = tokio::fs::read_to_string(path).await {
                if !raw.is_empty() {
                    return raw.lines().map(str::to_string).collect();
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} was never written", path.display());
    }

    #[tokio::test]
    async fn test_missing_api_component_is_usage_error() {
        let bin = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        fake_component(bin.path(), DAEMON_COMPONENT);

        let args = StartArgs {
            module: Some("jobs".to_string()),
            ..Default::default()
        };
        let err = start(
            args,
            context(bin.path(), home.path(), cwd.path()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SupervisorError::Usage(ref msg) if msg.contains(API_COMPONENT)));
        assert!(!bin.path().join(format!("{}.args", DAEMON_COMPONENT)).exists());
    }

    #[tokio::test]
    async fn test_invalid_target_spawns_nothing() {
        let bin = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        fake_component(bin.path(), API_COMPONENT);
        fake_component(bin.path(), DAEMON_COMPONENT);

        let err = start(
            StartArgs::default(),
            context(bin.path(), home.path(), cwd.path()),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SupervisorError::Usage(_)));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!bin.path().join(format!("{}.args", API_COMPONENT)).exists());
    }

    #[tokio::test]
    async fn test_start_passes_instance_ref_and_target_until_cancelled() {
        let bin = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        fake_component(bin.path(), API_COMPONENT);
        fake_component(bin.path(), DAEMON_COMPONENT);

        let cancel = CancellationToken::new();
        let args = StartArgs {
            module: Some("jobs".to_string()),
            log_level: LogLevel::Debug,
            ..Default::default()
        };
        let handle = tokio::spawn(start(
            args,
            context(bin.path(), home.path(), cwd.path()),
            cancel.clone(),
        ));

        let api_args = read_args(&bin.path().join(format!("{}.args", API_COMPONENT))).await;
        let daemon_args = read_args(&bin.path().join(format!("{}.args", DAEMON_COMPONENT))).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(api_args[0], "--instance-ref");
        let instance_ref = InstanceRef::from_json(&api_args[1]).unwrap();
        assert_eq!(instance_ref.home, home.path());
        assert_eq!(&api_args[2..], ["--log-level", "debug", "--module", "jobs"]);

        assert_eq!(daemon_args[0], "run");
        assert_eq!(&daemon_args[1..], &api_args[..]);
    }

    #[tokio::test]
    async fn test_unset_home_falls_back_to_cwd() {
        let bin = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        fake_component(bin.path(), API_COMPONENT);
        fake_component(bin.path(), DAEMON_COMPONENT);

        let context = StartContext {
            home: None,
            ..context(bin.path(), cwd.path(), cwd.path())
        };
        let cancel = CancellationToken::new();
        let args = StartArgs {
            module: Some("jobs".to_string()),
            ..Default::default()
        };
        let handle = tokio::spawn(start(args, context, cancel.clone()));

        let api_args = read_args(&bin.path().join(format!("{}.args", API_COMPONENT))).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        let instance_ref = InstanceRef::from_json(&api_args[1]).unwrap();
        assert_eq!(instance_ref.home, cwd.path());
        assert_eq!(instance_ref.storage_dir, cwd.path().join("storage"));
        assert!(cwd.path().join("storage").is_dir());
    }
}
