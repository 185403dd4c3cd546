//! Advertising, connection handling and frame notification
//!
//! One connection at a time. While it lasts three futures run side by side:
//! the GATT event loop (CCCD writes, disconnect), the frame forwarder and the
//! Current Time sync. The event loop returning on disconnect tears down the
//! other two.

use baro_link_core::gatt::cccd_enables_notify;
use baro_link_core::link::ConnHandle;
use baro_link_core::{FRAME_LEN, NodeConfig};
use embassy_futures::join::join;
use embassy_futures::select::{select, select3};
use embassy_time::Timer;
use log::{error, info, warn};
use trouble_host::prelude::*;

use super::server::Server;
use super::time_client::{CtsClient, drive_time_sync};
use super::{FRAME_OUTBOX, link_error};
use crate::app_state::NodeMutex;

/// The node serves a single central
const CONNECTIONS_MAX: usize = 1;

/// Signalling channel plus the ATT channel
const L2CAP_CHANNELS_MAX: usize = 2;

const ADVERTISE_RETRY_SECS: u64 = 1;

type Conn<'values, 'server> = GattConnection<'values, 'server, DefaultPacketPool>;

/// Run the BLE host and serve centrals forever.
pub async fn run<C: Controller>(controller: C, node: &'static NodeMutex, config: &NodeConfig) {
    // Static random address; the top two bits of the last byte must be set
    let address = Address::random([
        config.device_id.get(),
        0x4c,
        0x49,
        0x4e,
        0x4b,
        0xc4,
    ]);
    info!("BLE address {:?}", address);

    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();
    let stack = trouble_host::new(controller, &mut resources).set_random_address(address);
    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: config.device_name.as_str(),
        appearance: &appearance::sensor::GENERIC_SENSOR,
    })) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to build GATT server: {:?}", e);
            return;
        }
    };

    let host = async {
        if let Err(e) = runner.run().await {
            error!("BLE host stopped: {:?}", e);
        }
    };

    let serve = async {
        loop {
            match advertise(config.device_name.as_str(), &mut peripheral, &server).await {
                Ok(conn) => serve_connection(&stack, &server, conn, node, config).await,
                Err(e) => {
                    warn!("Advertising failed: {:?}", e);
                    Timer::after_secs(ADVERTISE_RETRY_SECS).await;
                }
            }
        }
    };

    join(host, serve).await;
}

async fn advertise<'values, 'server, C: Controller>(
    name: &str,
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
    server: &'server Server<'values>,
) -> Result<Conn<'values, 'server>, BleHostError<C::Error>> {
    let mut adv_data = [0; 31];
    let len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::CompleteLocalName(name.as_bytes()),
        ],
        &mut adv_data[..],
    )?;

    let advertiser = peripheral
        .advertise(
            &Default::default(),
            Advertisement::ConnectableScannableUndirected {
                adv_data: &adv_data[..len],
                scan_data: &[],
            },
        )
        .await?;
    info!("Advertising as {}", name);

    let conn = advertiser.accept().await?.with_attribute_server(server)?;
    Ok(conn)
}

async fn serve_connection<C: Controller>(
    stack: &Stack<'_, C, DefaultPacketPool>,
    server: &Server<'_>,
    conn: Conn<'_, '_>,
    node: &NodeMutex,
    config: &NodeConfig,
) {
    let handle = ConnHandle(conn.raw().handle().raw());

    let first = {
        let mut node = node.lock().await;
        match node.on_connected(handle) {
            Ok(action) => {
                // Reads before the first notification see the primed frame
                if let Some(frame) = node.sampler().last_frame() {
                    if let Ok(value) = <[u8; FRAME_LEN]>::try_from(frame.as_bytes()) {
                        if let Err(e) = server.sensor.frame.set(server, &value) {
                            warn!("Failed to seed frame characteristic: {:?}", e);
                        }
                    }
                }
                action
            }
            Err(e) => {
                // Dropping the connection disconnects the extra central
                warn!("Refusing {:?}: {}", handle, e);
                return;
            }
        }
    };

    // Anything queued for a previous connection is stale
    FRAME_OUTBOX.reset();

    let client = match CtsClient::<C>::new(stack, conn.raw()).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create GATT client: {:?}", e);
            node.lock().await.on_disconnected(0);
            return;
        }
    };

    let timeout = config.sync.request_timeout();
    let sync = async {
        select(
            async {
                if let Err(e) = client.task().await {
                    warn!("GATT client stopped: {}", link_error(e));
                }
                core::future::pending::<()>().await
            },
            drive_time_sync(&client, node, first, timeout),
        )
        .await;
    };

    select3(
        connection_events(server, &conn, node),
        forward_frames(server, &conn, handle),
        sync,
    )
    .await;
}

/// Handle GATT events until the central disconnects.
async fn connection_events(server: &Server<'_>, conn: &Conn<'_, '_>, node: &NodeMutex) {
    let cccd = server.sensor.frame.cccd_handle;

    loop {
        match conn.next().await {
            GattConnectionEvent::Disconnected { reason } => {
                node.lock().await.on_disconnected(reason.into_inner());
                return;
            }
            GattConnectionEvent::Gatt { event } => {
                if let GattEvent::Write(write) = &event {
                    if Some(write.handle()) == cccd {
                        node.lock()
                            .await
                            .on_subscription_changed(cccd_enables_notify(write.data()));
                    }
                }

                match event.accept() {
                    Ok(reply) => reply.send().await,
                    Err(e) => warn!("Failed to answer GATT request: {:?}", e),
                }
            }
            _ => {}
        }
    }
}

/// Keep the frame characteristic's value current and notify the frames
/// addressed to this connection.
async fn forward_frames(server: &Server<'_>, conn: &Conn<'_, '_>, handle: ConnHandle) {
    loop {
        let outbound = FRAME_OUTBOX.wait().await;
        if let Err(e) = server.sensor.frame.set(server, &outbound.value) {
            warn!("Failed to update frame characteristic: {:?}", e);
        }
        if outbound.notify != Some(handle) {
            continue;
        }
        if let Err(e) = server.sensor.frame.notify(conn, &outbound.value).await {
            warn!("Notify failed: {:?}", e);
        }
    }
}
