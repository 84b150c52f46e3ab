//! Channel runtime: runs every enabled chat channel side by side.
//!
//! Each [`Component`] owns its connection and the shared `CommsState` it was
//! built with. [`spawn_components`] puts them on one `JoinSet` and hands back
//! a [`SubsystemHandle`]. A channel that fails or panics cancels the shared
//! token so the others stop too, and the first failure is what `join`
//! returns. A channel that simply runs out of input (console EOF) does not
//! stop its siblings.

use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::AppError;

pub type ComponentFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// A channel that can be run to completion on its own task.
pub trait Component: Send + 'static {
    /// Channel id used in logs, e.g. `"discord0"`.
    fn id(&self) -> &str;

    /// Return once `shutdown` fires or the channel's input is exhausted, and
    /// only after replies already in flight have been delivered.
    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture;
}

pub struct SubsystemHandle {
    inner: JoinHandle<Result<(), AppError>>,
}

impl SubsystemHandle {
    /// Wait for every channel; the first failure wins.
    pub async fn join(self) -> Result<(), AppError> {
        self.inner
            .await
            .unwrap_or_else(|e| Err(AppError::Comms(format!("channel runtime panicked: {e}"))))
    }
}

pub fn spawn_components(
    components: Vec<Box<dyn Component>>,
    shutdown: CancellationToken,
) -> SubsystemHandle {
    let inner = tokio::spawn(async move {
        let mut running = JoinSet::new();
        for component in components {
            let id = component.id().to_string();
            debug!(component = %id, "spawning component");
            let run = component.run(shutdown.clone());
            running.spawn(async move { (id, run.await) });
        }

        let mut first_failure = None;
        while let Some(joined) = running.join_next().await {
            let failure = match joined {
                Ok((id, Ok(()))) => {
                    info!(component = %id, remaining = running.len(), "component exited");
                    continue;
                }
                Ok((id, Err(e))) => {
                    error!(component = %id, error = %e, "component failed; stopping the others");
                    e
                }
                Err(e) => {
                    error!(error = %e, "component panicked; stopping the others");
                    AppError::Comms(format!("component panicked: {e}"))
                }
            };
            shutdown.cancel();
            first_failure.get_or_insert(failure);
        }

        first_failure.map_or(Ok(()), Err)
    });

    SubsystemHandle { inner }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    enum Behaviour {
        Finish,
        Fail(&'static str),
        Panic,
        AwaitShutdown(Arc<AtomicBool>),
    }

    struct Channel(&'static str, Behaviour);

    impl Component for Channel {
        fn id(&self) -> &str {
            self.0
        }

        fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
            let Channel(id, behaviour) = *self;
            Box::pin(async move {
                match behaviour {
                    Behaviour::Finish => Ok(()),
                    Behaviour::Fail(msg) => Err(AppError::Comms(msg.into())),
                    Behaviour::Panic => panic!("channel {id} blew up"),
                    Behaviour::AwaitShutdown(stopped) => {
                        shutdown.cancelled().await;
                        stopped.store(true, Ordering::SeqCst);
                        Ok(())
                    }
                }
            })
        }
    }

    fn boxed(id: &'static str, behaviour: Behaviour) -> Box<dyn Component> {
        Box::new(Channel(id, behaviour))
    }

    #[tokio::test]
    async fn no_channels_resolves() {
        let handle = spawn_components(Vec::new(), CancellationToken::new());
        assert!(handle.join().await.is_ok());
    }

    #[tokio::test]
    async fn exhausted_channel_leaves_siblings_running() {
        let shutdown = CancellationToken::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let handle = spawn_components(
            vec![boxed("pty0", Behaviour::Finish), boxed("discord0", Behaviour::AwaitShutdown(stopped.clone()))],
            shutdown.clone(),
        );

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!shutdown.is_cancelled());
        assert!(!stopped.load(Ordering::SeqCst));

        shutdown.cancel();
        assert!(handle.join().await.is_ok());
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failing_channel_stops_siblings_and_is_returned() {
        let shutdown = CancellationToken::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let handle = spawn_components(
            vec![boxed("discord0", Behaviour::AwaitShutdown(stopped.clone())), boxed("telegram0", Behaviour::Fail("boom"))],
            shutdown.clone(),
        );
        let err = handle.join().await.unwrap_err();
        assert_eq!(err.to_string(), "comms error: boom");
        assert!(shutdown.is_cancelled());
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn panicking_channel_is_reported_as_failure() {
        let shutdown = CancellationToken::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let handle = spawn_components(
            vec![boxed("pty0", Behaviour::AwaitShutdown(stopped.clone())), boxed("discord0", Behaviour::Panic)],
            shutdown.clone(),
        );
        let err = handle.join().await.unwrap_err();
        assert!(err.to_string().contains("component panicked"));
        assert!(stopped.load(Ordering::SeqCst));
    }
}
