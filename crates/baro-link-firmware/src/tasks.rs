//! Embassy tasks
//!
//! Tasks cannot be generic, so each one is pinned to the firmware's concrete
//! node and controller types.

use baro_link_core::config::NodeConfig;
use baro_link_core::node::SampleOutcome;
use baro_link_core::notifier::Delivery;
use baro_link_core::work::{SampleQueue, SampleTick, submit};
use baro_link_core::ReferenceClock;
use bt_hci::controller::ExternalController;
use embassy_time::{Duration, Ticker};
use esp_radio::ble::controller::BleConnector;
use log::{info, trace, warn};

use crate::app_state::NodeMutex;

/// HCI command slots for the external controller
pub const HCI_SLOTS: usize = 20;

pub type BleController = ExternalController<BleConnector<'static>, HCI_SLOTS>;

/// Advance the reference clock by one millisecond per elapsed millisecond.
#[embassy_executor::task]
pub async fn clock_task(clock: &'static ReferenceClock, period: Duration) {
    let mut ticker = Ticker::every(period);
    let step = period.as_millis();
    loop {
        ticker.next().await;
        for _ in 0..step {
            clock.tick();
        }
    }
}

/// Periodic sample timer. Only enqueues; the worker does the read.
#[embassy_executor::task]
pub async fn sample_timer_task(queue: &'static SampleQueue, period: Duration) {
    let mut ticker = Ticker::every(period);
    let mut seq = 0u32;
    loop {
        ticker.next().await;
        submit(queue, SampleTick { seq });
        seq = seq.wrapping_add(1);
    }
}

/// Drain the sample queue: read, encode and publish one frame per token.
#[embassy_executor::task]
pub async fn sample_worker_task(node: &'static NodeMutex, queue: &'static SampleQueue) {
    info!("Sample worker started");
    loop {
        let tick = queue.receive().await;
        match node.lock().await.on_sample_tick().await {
            SampleOutcome::Published(Delivery::Failed(e)) => {
                warn!("Tick {}: notify failed: {}", tick.seq, e)
            }
            outcome => trace!("Tick {}: {:?}", tick.seq, outcome),
        }
    }
}

#[embassy_executor::task]
pub async fn ble_task(
    controller: BleController,
    node: &'static NodeMutex,
    config: &'static NodeConfig,
) {
    crate::ble::run(controller, node, config).await;
    warn!("BLE task exited");
}
