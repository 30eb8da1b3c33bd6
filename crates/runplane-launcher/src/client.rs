//! Clients for persistent worker services.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use runplane_core::{Event, ExecutionRequest, Origin};
use runplane_ipc::IpcError;
use runplane_proto::pb;
use runplane_proto::WorkerServiceClient;
use tokio_stream::Stream;
use tonic::codec::Streaming;
use tonic::transport::Endpoint;
use tracing::{debug, info};

use crate::error::LaunchError;

/// Live events coming back from a worker service.
pub type WorkerEventStream = Pin<Box<dyn Stream<Item = Result<Event, LaunchError>> + Send>>;

/// Connection to a worker service able to execute runs.
///
/// Implement this trait to plug in another transport; tests use an
/// in-memory implementation.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Send `request` and return the worker's event stream.
    async fn execute_run(&self, request: &ExecutionRequest)
        -> Result<WorkerEventStream, LaunchError>;
}

/// Worker client calling the `ExecuteRun` gRPC method.
///
/// Each streamed message carries one JSON event; the stream ends at
/// `stream_end` or when the server closes it.
#[derive(Debug, Clone)]
pub struct GrpcWorkerClient {
    endpoint: String,
    connect_timeout: Duration,
}

impl GrpcWorkerClient {
    pub fn new(host: impl AsRef<str>, port: u16) -> Self {
        Self {
            endpoint: format!("http://{}:{}", host.as_ref(), port),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Client for a [`Origin::WorkerServiceAddress`].
    pub fn for_origin(origin: &Origin) -> Result<Self, LaunchError> {
        match origin {
            Origin::WorkerServiceAddress { host, port } => Ok(Self::new(host, *port)),
            other => Err(LaunchError::InvalidOrigin {
                expected: "worker_service_address",
                found: other.kind(),
            }),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

struct Inbound {
    messages: Streaming<pb::ExecuteRunEvent>,
    /// Index of the next message, reported as the offset of a bad record.
    index: u64,
    done: bool,
}

#[async_trait]
impl WorkerClient for GrpcWorkerClient {
    async fn execute_run(
        &self,
        request: &ExecutionRequest,
    ) -> Result<WorkerEventStream, LaunchError> {
        info!(endpoint = %self.endpoint, run_id = %request.run_id, "Connecting to worker service");

        let channel = Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| {
                LaunchError::Transport(format!("invalid worker address {}: {}", self.endpoint, e))
            })?
            .connect_timeout(self.connect_timeout)
            .connect()
            .await
            .map_err(|e| {
                LaunchError::Transport(format!("failed to connect to {}: {}", self.endpoint, e))
            })?;

        let message = pb::ExecuteRunRequest::try_from(request)
            .map_err(|source| LaunchError::Channel(IpcError::Serialization(source)))?;
        let response = WorkerServiceClient::new(channel)
            .execute_run(message)
            .await
            .map_err(|status| {
                LaunchError::Transport(format!("ExecuteRun failed: {}", status.message()))
            })?;

        debug!(endpoint = %self.endpoint, "Request accepted, streaming events");

        let state = Inbound {
            messages: response.into_inner(),
            index: 0,
            done: false,
        };

        let events = stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }

            match state.messages.message().await {
                Ok(Some(message)) => {
                    let index = state.index;
                    state.index += 1;
                    match Event::try_from(&message) {
                        Ok(Event::StreamEnd) => None,
                        Ok(event) => Some((Ok(event), state)),
                        Err(source) => {
                            state.done = true;
                            let error = IpcError::Deserialization {
                                offset: index,
                                source,
                            };
                            Some((Err(error.into()), state))
                        }
                    }
                }
                Ok(None) => None,
                Err(status) => {
                    state.done = true;
                    let error = LaunchError::Transport(format!(
                        "failed to read from worker: {}",
                        status.message()
                    ));
                    Some((Err(error), state))
                }
            }
        });

        Ok(Box::pin(events))
    }
}
