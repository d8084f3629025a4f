//! Status polling shared by create, snapshot, attach, and detach.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use super::super::api::BlockStorageApi;
use super::super::native::HasStatus;
use super::super::{DriverError, OpenStackDriver};
use crate::volume::Volume;

/// Why a poll stopped without reaching its target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum PollError<E> {
    Timeout,
    Cancelled,
    Check(E),
}

/// Calls `check` until it yields a value, the deadline passes, or `cancel`
/// fires. The deadline is fixed before the first check and is exclusive, so
/// a budget of `n` intervals allows `n` checks; an error from `check` ends
/// the poll immediately.
pub(crate) async fn poll_until<T, E, F, Fut>(
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        if let Some(value) = check().await.map_err(PollError::Check)? {
            return Ok(value);
        }
        tokio::select! {
            () = cancel.cancelled() => return Err(PollError::Cancelled),
            () = sleep(interval) => {}
        }
    }

    Err(PollError::Timeout)
}

impl<A: BlockStorageApi> OpenStackDriver<A> {
    fn poll_failure(
        err: PollError<DriverError>,
        action: &str,
        resource_id: &str,
        timeout: Duration,
    ) -> DriverError {
        match err {
            PollError::Timeout => DriverError::Timeout {
                action: action.to_owned(),
                resource_id: resource_id.to_owned(),
                timeout,
            },
            PollError::Cancelled => DriverError::Cancelled {
                action: action.to_owned(),
                resource_id: resource_id.to_owned(),
            },
            PollError::Check(inner) => inner,
        }
    }

    /// Re-fetches a resource until its status equals `target`, returning the
    /// observation that matched.
    pub(super) async fn wait_for_status<T, F, Fut>(
        &self,
        action: &str,
        resource_id: &str,
        target: &str,
        timeout: Duration,
        cancel: &CancellationToken,
        mut fetch: F,
    ) -> Result<T, DriverError>
    where
        T: HasStatus,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        poll_until(self.timeouts.poll_interval, timeout, cancel, move || {
            let pending = fetch();
            async move {
                let current = pending.await?;
                Ok((current.status() == target).then_some(current))
            }
        })
        .await
        .map_err(|err| Self::poll_failure(err, action, resource_id, timeout))
    }

    /// Re-fetches a volume until its attachment list is non-empty
    /// (`attached`) or empty (`!attached`).
    pub(super) async fn wait_for_attachments(
        &self,
        volume_id: &str,
        attached: bool,
        cancel: &CancellationToken,
    ) -> Result<Volume, DriverError> {
        let action = if attached {
            "volume attach"
        } else {
            "volume detach"
        };
        let timeout = self.timeouts.attachment;
        poll_until(
            self.timeouts.poll_interval,
            timeout,
            cancel,
            move || async move {
                let volume = self.inspect_volume(volume_id, true).await?;
                Ok((volume.attachments.is_empty() != attached).then_some(volume))
            },
        )
        .await
        .map_err(|err| Self::poll_failure(err, action, volume_id, timeout))
    }
}
