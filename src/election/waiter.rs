//! Background promotion of a STANDBY node.
//!
//! The waiter suspends on the lock until it is granted or its token is
//! cancelled. Cancellation and the grant can race, so the token is checked
//! again after a successful acquire.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing::Instrument;

use super::elector::ElectorInner;
use super::elector::Promotion;
use super::elector::PromotionKind;
use crate::ClusterRegistry;
use crate::ElectionError;
use crate::LockService;
use crate::Result;

pub(crate) struct PromotionWaiter<L, R>
where
    L: LockService,
    R: ClusterRegistry,
{
    inner: Arc<ElectorInner<L, R>>,
    cancel: CancellationToken,
}

/// Owned by the elector; consumed by `stop()`.
pub(crate) struct WaiterHandle {
    cancel: CancellationToken,
    handle: JoinHandle<Result<()>>,
}

impl WaiterHandle {
    /// Requests cooperative cancellation and waits for the task to exit.
    pub(crate) async fn cancel_and_join(self) -> Result<()> {
        self.cancel.cancel();
        match self.handle.await {
            Ok(res) => res,
            Err(e) => Err(ElectionError::WaiterFailed(e.to_string()).into()),
        }
    }
}

impl<L, R> PromotionWaiter<L, R>
where
    L: LockService,
    R: ClusterRegistry,
{
    pub(crate) fn spawn(
        inner: Arc<ElectorInner<L, R>>,
        cancel: CancellationToken,
    ) -> WaiterHandle {
        let waiter = Self {
            inner,
            cancel: cancel.clone(),
        };
        // keep the caller's span so waiter logs stay attributed to the node
        let handle = tokio::spawn(waiter.run().instrument(tracing::Span::current()));
        WaiterHandle { cancel, handle }
    }

    async fn run(self) -> Result<()> {
        let inner = self.inner;
        debug!("{} promotion waiter started", inner.identity);

        let acquired = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("{} promotion waiter interrupted", inner.identity);
                return Ok(());
            }
            res = inner.lock.lock(&inner.owner) => res,
        };

        if let Err(e) = acquired {
            error!(
                "{} promotion waiter failed, node stays in STANDBY: {:?}",
                inner.identity, e
            );
            inner.record_waiter_failure(e.to_string());
            return Err(e);
        }

        if self.cancel.is_cancelled() {
            info!(
                "{} lock granted after stop was requested, releasing it",
                inner.identity
            );
            inner.lock.unlock(&inner.owner).await?;
            return Ok(());
        }

        if inner.promote(PromotionKind::Deferred).await == Promotion::Refused {
            if let Err(e) = inner.lock.unlock(&inner.owner).await {
                warn!("{} failed to release refused lock: {:?}", inner.identity, e);
            }
        }
        Ok(())
    }
}
