//! Coordinating object for the sampling and notification pipeline
//!
//! Owns the per-connection state (sync session, peer slot) and the frame
//! buffer, and borrows the reference clock, which the tick source also needs.
//! The BLE glue and the sample worker call into it; nothing here talks to
//! hardware directly.

use log::{info, warn};

use crate::clock::ReferenceClock;
use crate::config::NodeConfig;
use crate::link::{ConnHandle, LinkError, NotifyLink};
use crate::notifier::{Delivery, Notifier};
use crate::sampler::Sampler;
use crate::sensors::{Sensor, SensorError};
use crate::time_sync::{SyncAction, SyncEvent, TimeSyncClient};

/// Result of one sample work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// No new reading this period; nothing was published
    Skipped,
    /// A frame was produced and handed to the notifier
    Published(Delivery),
}

/// Ties the reference clock, the time sync client, the sampler and the
/// notifier together for one peripheral.
pub struct TelemetryNode<'a, S, L, H> {
    clock: &'a ReferenceClock,
    sync: TimeSyncClient<H>,
    sampler: Sampler<S>,
    notifier: Notifier<L>,
}

impl<'a, S, L, H> TelemetryNode<'a, S, L, H>
where
    S: Sensor,
    L: NotifyLink,
    H: Clone,
{
    pub fn new(clock: &'a ReferenceClock, config: &NodeConfig, sensor: S, link: L) -> Self {
        Self {
            clock,
            sync: TimeSyncClient::new(config.sync.max_retries),
            sampler: Sampler::new(sensor, config.device_id),
            notifier: Notifier::new(link),
        }
    }

    /// Bring up the sensor and prime the frame buffer with a first sample.
    pub async fn start(&mut self) -> Result<(), SensorError> {
        let init = self.sampler.init().await;
        self.sampler.sample(self.clock.now_ms()).await;
        init
    }

    /// A central connected. Starts a fresh sync session.
    ///
    /// A second concurrent connection is refused and leaves the current
    /// session alone.
    pub fn on_connected(&mut self, handle: ConnHandle) -> Result<SyncAction<H>, LinkError> {
        self.notifier.connect(handle)?;
        info!("Connected: {:?}", handle);
        Ok(self.sync.handle(SyncEvent::Connected))
    }

    /// The central went away. All per-connection state is dropped.
    pub fn on_disconnected(&mut self, reason: u8) {
        match self.notifier.disconnect() {
            Some(peer) => info!("Disconnected {:?}, reason {:#04x}", peer.handle, reason),
            None => warn!("Disconnect (reason {:#04x}) without a connected peer", reason),
        }
        self.sync.handle(SyncEvent::Disconnected);
    }

    pub fn on_subscription_changed(&mut self, enabled: bool) {
        if let Err(e) = self.notifier.set_subscribed(enabled) {
            warn!("Ignoring subscription change: {}", e);
        }
    }

    /// Feed a discovery or read result into the sync client.
    ///
    /// A successful read is applied to the reference clock here; the returned
    /// action is what is left for the BLE glue to do.
    pub fn on_sync_event(&mut self, event: SyncEvent<H>) -> SyncAction<H> {
        let action = self.sync.handle(event);
        if let SyncAction::SetClock(ms) = action {
            self.clock.set(ms);
        }
        action
    }

    /// One sample period: read, encode with the current clock value, publish.
    pub async fn on_sample_tick(&mut self) -> SampleOutcome {
        let now_ms = self.clock.now_ms();
        match self.sampler.sample(now_ms).await {
            Some(frame) => {
                let frame = *frame;
                SampleOutcome::Published(self.notifier.publish(&frame).await)
            }
            None => SampleOutcome::Skipped,
        }
    }

    pub fn sync(&self) -> &TimeSyncClient<H> {
        &self.sync
    }

    pub fn sampler(&self) -> &Sampler<S> {
        &self.sampler
    }

    pub fn notifier(&self) -> &Notifier<L> {
        &self.notifier
    }
}
