//! BLE peripheral for the telemetry node
//!
//! The node never touches the trouble-host stack directly. Frames leave
//! through [`FrameOutbox`], a [`NotifyLink`] that hands them to the
//! connection task over [`FRAME_OUTBOX`]; stack events come back in through
//! the node's `on_*` methods.

mod peripheral;
mod server;
mod time_client;

pub use peripheral::run;
pub use server::{SensorService, Server};

use baro_link_core::link::{ConnHandle, LinkError, NotifyLink};
use baro_link_core::FRAME_LEN;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::debug;
use trouble_host::prelude::*;

/// A frame on its way to the connection task.
#[derive(Debug, Clone, Copy)]
pub struct OutboundFrame {
    pub value: [u8; FRAME_LEN],
    /// Connection to notify, or `None` to only refresh the readable value
    pub notify: Option<ConnHandle>,
}

/// Latest frame waiting for the connection task. A newer frame replaces one
/// that has not been picked up yet.
pub static FRAME_OUTBOX: Signal<CriticalSectionRawMutex, OutboundFrame> = Signal::new();

/// Notification link used by the node on the device.
#[derive(Debug, Default)]
pub struct FrameOutbox;

fn frame_value(payload: &[u8]) -> Result<[u8; FRAME_LEN], LinkError> {
    <[u8; FRAME_LEN]>::try_from(payload).map_err(|_| LinkError::MalformedValue)
}

impl NotifyLink for FrameOutbox {
    fn set_value(&mut self, payload: &[u8]) -> Result<(), LinkError> {
        FRAME_OUTBOX.signal(OutboundFrame {
            value: frame_value(payload)?,
            notify: None,
        });
        Ok(())
    }

    async fn notify(&mut self, conn: ConnHandle, payload: &[u8]) -> Result<(), LinkError> {
        FRAME_OUTBOX.signal(OutboundFrame {
            value: frame_value(payload)?,
            notify: Some(conn),
        });
        Ok(())
    }
}

pub(crate) fn link_error<E: core::fmt::Debug>(error: BleHostError<E>) -> LinkError {
    debug!("BLE host error: {:?}", error);
    match error {
        BleHostError::BleHost(Error::Timeout) => LinkError::Timeout,
        BleHostError::BleHost(Error::Disconnected) => LinkError::NotConnected,
        BleHostError::BleHost(Error::Att(code)) => LinkError::Att(code.into()),
        _ => LinkError::Stack,
    }
}
