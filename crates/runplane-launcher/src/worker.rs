//! Launch a run on a persistent worker service.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use runplane_core::{
    EngineEvent, Event, ExecutionRequest, InstanceRef, Origin, Run, SUBPROCESS_INIT_MARKER,
};
use runplane_instance::Instance;
use tokio_stream::Stream;
use tracing::{debug, info, warn};

use crate::client::{WorkerClient, WorkerEventStream};
use crate::error::LaunchError;
use crate::report::{record_launch_failure, start_event};

/// Events of one run executed by a worker service.
pub type RunEventStream = Pin<Box<dyn Stream<Item = Result<Event, LaunchError>> + Send>>;

/// Launches runs whose origin is a [`Origin::WorkerServiceAddress`].
///
/// Nothing happens until the returned stream is polled. The first item is the
/// recorded start event; after that the worker's events are forwarded in
/// arrival order, except that `ipc_error` records are stored as engine events
/// and yielded in their place. The first such error also fails the run, and
/// the resulting [`Event::RunFailure`] follows the engine event.
#[derive(Clone)]
pub struct WorkerLauncher {
    client: Arc<dyn WorkerClient>,
}

enum Stage {
    Init {
        instance_ref: InstanceRef,
        origin: Origin,
        run: Run,
    },
    Connect {
        instance: Instance,
        request: ExecutionRequest,
        run: Run,
    },
    Streaming {
        instance: Instance,
        run: Run,
        events: WorkerEventStream,
        run_did_fail: bool,
        queued: Option<Event>,
    },
    Done,
}

struct LaunchState {
    client: Arc<dyn WorkerClient>,
    stage: Stage,
}

impl WorkerLauncher {
    pub fn new(client: Arc<dyn WorkerClient>) -> Self {
        Self { client }
    }

    /// Stream the events of `run` as the worker produces them.
    pub fn launch(&self, instance_ref: InstanceRef, origin: Origin, run: Run) -> RunEventStream {
        let state = LaunchState {
            client: Arc::clone(&self.client),
            stage: Stage::Init {
                instance_ref,
                origin,
                run,
            },
        };

        Box::pin(stream::unfold(state, |mut state| async move {
            let item = state.step().await?;
            Some((item, state))
        }))
    }

    /// Drive [`launch`](Self::launch) to completion and collect every event.
    pub async fn launch_to_end(
        &self,
        instance_ref: InstanceRef,
        origin: Origin,
        run: Run,
    ) -> Result<Vec<Event>, LaunchError> {
        self.launch(instance_ref, origin, run).try_collect().await
    }
}

impl LaunchState {
    async fn step(&mut self) -> Option<Result<Event, LaunchError>> {
        loop {
            match std::mem::replace(&mut self.stage, Stage::Done) {
                Stage::Init {
                    instance_ref,
                    origin,
                    run,
                } => {
                    let instance = match Instance::from_ref(&instance_ref).await {
                        Ok(instance) => instance,
                        Err(e) => return Some(Err(e.into())),
                    };

                    if !matches!(origin, Origin::WorkerServiceAddress { .. }) {
                        return Some(Err(LaunchError::InvalidOrigin {
                            expected: "worker_service_address",
                            found: origin.kind(),
                        }));
                    }

                    let started = match instance.report_engine_event(&run, start_event(&run)).await
                    {
                        Ok(event) => event,
                        Err(e) => return Some(Err(e.into())),
                    };

                    info!(run_id = %run.id, origin = %origin, "Sending run to worker service");
                    let request = ExecutionRequest::new(origin, run.id.clone(), instance_ref);
                    self.stage = Stage::Connect {
                        instance,
                        request,
                        run,
                    };
                    return Some(Ok(Event::Engine(started)));
                }

                Stage::Connect {
                    instance,
                    request,
                    run,
                } => match self.client.execute_run(&request).await {
                    Ok(events) => {
                        self.stage = Stage::Streaming {
                            instance,
                            run,
                            events,
                            run_did_fail: false,
                            queued: None,
                        };
                    }
                    Err(error) => {
                        warn!(run_id = %run.id, error = %error, "Worker service unavailable");
                        record_launch_failure(&instance, &run, &error, &mut false).await;
                        return Some(Err(error));
                    }
                },

                Stage::Streaming {
                    instance,
                    run,
                    events,
                    run_did_fail,
                    queued: Some(event),
                } => {
                    self.stage = Stage::Streaming {
                        instance,
                        run,
                        events,
                        run_did_fail,
                        queued: None,
                    };
                    return Some(Ok(event));
                }

                Stage::Streaming {
                    instance,
                    run,
                    mut events,
                    mut run_did_fail,
                    queued: None,
                } => match events.next().await {
                    None | Some(Ok(Event::StreamEnd)) => {
                        debug!(run_id = %run.id, "Worker event stream ended");
                        return None;
                    }
                    Some(Ok(Event::IpcError {
                        message,
                        error_info,
                    })) => {
                        let event = EngineEvent::new(message)
                            .with_marker_end(SUBPROCESS_INIT_MARKER)
                            .with_error(error_info);
                        let (event, failure) =
                            record_worker_error(&instance, &run, event, &mut run_did_fail).await;
                        self.stage = Stage::Streaming {
                            instance,
                            run,
                            events,
                            run_did_fail,
                            queued: failure,
                        };
                        return Some(Ok(Event::Engine(event)));
                    }
                    Some(Ok(event)) => {
                        self.stage = Stage::Streaming {
                            instance,
                            run,
                            events,
                            run_did_fail,
                            queued: None,
                        };
                        return Some(Ok(event));
                    }
                    Some(Err(error)) => {
                        warn!(run_id = %run.id, error = %error, "Lost worker event stream");
                        record_launch_failure(&instance, &run, &error, &mut run_did_fail).await;
                        return Some(Err(error));
                    }
                },

                Stage::Done => return None,
            }
        }
    }
}

/// Store an error reported by the worker and mark the run failed once.
///
/// Returns the recorded event, plus the run failure the first time through.
async fn record_worker_error(
    instance: &Instance,
    run: &Run,
    event: EngineEvent,
    run_did_fail: &mut bool,
) -> (EngineEvent, Option<Event>) {
    let event = match instance.report_engine_event(run, event.clone()).await {
        Ok(recorded) => recorded,
        Err(e) => {
            warn!(run_id = %run.id, error = %e, "Failed to record worker error");
            event
        }
    };

    if *run_did_fail {
        return (event, None);
    }
    *run_did_fail = true;
    match instance.report_run_failed(run).await {
        Ok(failure) => (event, Some(failure)),
        Err(e) => {
            warn!(run_id = %run.id, error = %e, "Failed to mark run as failed");
            (event, None)
        }
    }
}
