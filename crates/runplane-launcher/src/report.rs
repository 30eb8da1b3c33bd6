//! Engine events shared by both launchers.

use runplane_core::{EngineEvent, Run, SerializableErrorInfo, SUBPROCESS_INIT_MARKER};
use runplane_instance::Instance;
use tracing::warn;

use crate::error::LaunchError;

/// The event recorded right before a worker is asked to start.
pub(crate) fn start_event(run: &Run) -> EngineEvent {
    EngineEvent::new(format!(
        "About to start process for job \"{}\" (run_id: {}).",
        run.job_name, run.id
    ))
    .with_marker_start(SUBPROCESS_INIT_MARKER)
}

/// The event recorded when start-up fails with `error`.
pub(crate) fn launch_error_event(error: &LaunchError) -> EngineEvent {
    EngineEvent::new(format!("Failed to start worker: {}", error))
        .with_marker_end(SUBPROCESS_INIT_MARKER)
        .with_error(SerializableErrorInfo::from_error(error))
}

/// Record `error` against `run` and mark the run failed unless
/// `already_failed` says this attempt already did.
///
/// Storage problems are logged rather than returned so the caller still
/// surfaces the original error.
pub(crate) async fn record_launch_failure(
    instance: &Instance,
    run: &Run,
    error: &LaunchError,
    already_failed: &mut bool,
) {
    if let Err(e) = instance
        .report_engine_event(run, launch_error_event(error))
        .await
    {
        warn!(run_id = %run.id, error = %e, "Failed to record launch error");
    }

    if !*already_failed {
        *already_failed = true;
        if let Err(e) = instance.report_run_failed(run).await {
            warn!(run_id = %run.id, error = %e, "Failed to mark run as failed");
        }
    }
}
