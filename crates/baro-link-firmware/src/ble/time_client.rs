//! Current Time Service client
//!
//! Turns the sync client's requested actions into GATT requests against the
//! central and feeds the results back as [`SyncEvent`]s. Every request is
//! bounded by the configured timeout.

use baro_link_core::clock::{CURRENT_TIME_LEN, CurrentTime};
use baro_link_core::gatt::{CURRENT_TIME_CHARACTERISTIC_UUID16, CURRENT_TIME_SERVICE_UUID16};
use baro_link_core::link::LinkError;
use baro_link_core::time_sync::{SyncAction, SyncEvent};
use embassy_futures::yield_now;
use embassy_time::{Duration, with_timeout};
use log::{debug, info, warn};
use trouble_host::prelude::*;

use super::link_error;
use crate::app_state::{CtsCharacteristic, NodeMutex};

/// Services the client keeps track of during discovery.
pub const MAX_SERVICES: usize = 4;

pub type CtsClient<'a, C> = GattClient<'a, C, DefaultPacketPool, MAX_SERVICES>;

async fn lookup_current_time<C: Controller>(
    client: &CtsClient<'_, C>,
) -> Result<Option<CtsCharacteristic>, BleHostError<C::Error>> {
    let services = client
        .services_by_uuid(&Uuid::new_short(CURRENT_TIME_SERVICE_UUID16))
        .await?;
    let Some(service) = services.first() else {
        return Ok(None);
    };

    match client
        .characteristic_by_uuid(service, &Uuid::new_short(CURRENT_TIME_CHARACTERISTIC_UUID16))
        .await
    {
        Ok(characteristic) => Ok(Some(characteristic)),
        Err(BleHostError::BleHost(Error::NotFound)) => Ok(None),
        Err(e) => Err(e),
    }
}

async fn discover<C: Controller>(
    client: &CtsClient<'_, C>,
    timeout: Duration,
) -> SyncEvent<CtsCharacteristic> {
    match with_timeout(timeout, lookup_current_time(client)).await {
        Ok(Ok(Some(characteristic))) => SyncEvent::DiscoveryOk(characteristic),
        Ok(Ok(None)) => SyncEvent::DiscoveryNotFound,
        Ok(Err(e)) => SyncEvent::DiscoveryError(link_error(e)),
        Err(_) => SyncEvent::DiscoveryError(LinkError::Timeout),
    }
}

async fn read_current_time<C: Controller>(
    client: &CtsClient<'_, C>,
    characteristic: &CtsCharacteristic,
    timeout: Duration,
) -> SyncEvent<CtsCharacteristic> {
    let mut value = [0u8; CURRENT_TIME_LEN];
    let len = match with_timeout(timeout, client.read_characteristic(characteristic, &mut value))
        .await
    {
        Ok(Ok(len)) => len,
        Ok(Err(e)) => return SyncEvent::ReadError(link_error(e)),
        Err(_) => return SyncEvent::ReadError(LinkError::Timeout),
    };

    match CurrentTime::from_bytes(&value[..len]) {
        Ok(time) => SyncEvent::ReadOk(time),
        Err(e) => {
            warn!("Central sent an unusable current time: {}", e);
            SyncEvent::ReadError(LinkError::MalformedValue)
        }
    }
}

/// Work through the sync client's actions until it settles or gives up.
///
/// Never returns, so it can sit in a `select` with the connection's other
/// futures; the connection ending cancels it.
pub async fn drive_time_sync<C: Controller>(
    client: &CtsClient<'_, C>,
    node: &NodeMutex,
    first: SyncAction<CtsCharacteristic>,
    timeout: Duration,
) {
    let mut action = first;
    loop {
        let event = match action {
            SyncAction::StartDiscovery => discover(client, timeout).await,
            SyncAction::RetryDiscovery { attempt } => {
                debug!("Retrying CTS discovery, attempt {}", attempt);
                // Let the connection's event handler run before the next request
                yield_now().await;
                discover(client, timeout).await
            }
            SyncAction::ReadCurrentTime(characteristic) => {
                read_current_time(client, &characteristic, timeout).await
            }
            SyncAction::SetClock(ms) => {
                info!("Time sync finished at {} ms", ms);
                break;
            }
            SyncAction::Abandon(failure) => {
                warn!("Time sync abandoned: {}", failure);
                break;
            }
            SyncAction::None => break,
        };
        action = node.lock().await.on_sync_event(event);
    }

    core::future::pending::<()>().await
}
