//! Single-peer, best-effort frame delivery
//!
//! Frames are live telemetry: with no subscribed peer they are dropped, never
//! queued.

use log::{debug, info, warn};

use crate::frame::Frame;
use crate::link::{ConnHandle, LinkError, NotifyLink};

/// The one active link to a central.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerConnection {
    pub handle: ConnHandle,
    /// Whether the peer enabled notifications on the frame characteristic
    pub subscribed: bool,
}

/// What happened to a published frame.
///
/// In every case the frame has become the characteristic's readable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Notified to the subscribed peer
    Sent,
    NoPeer,
    /// A peer is connected but has not enabled notifications
    NotSubscribed,
    /// The stack refused the notification; the frame is not retried
    Failed(LinkError),
}

/// Holds the single peer slot and gates notifications on its subscription.
pub struct Notifier<L> {
    link: L,
    peer: Option<PeerConnection>,
}

impl<L: NotifyLink> Notifier<L> {
    pub const fn new(link: L) -> Self {
        Self { link, peer: None }
    }

    /// Record a new connection. Only one peer may be connected at a time.
    pub fn connect(&mut self, handle: ConnHandle) -> Result<(), LinkError> {
        if let Some(peer) = self.peer {
            warn!(
                "Rejecting connection {:?}: peer {:?} already connected",
                handle, peer.handle
            );
            return Err(LinkError::AlreadyConnected);
        }

        self.peer = Some(PeerConnection {
            handle,
            subscribed: false,
        });
        Ok(())
    }

    /// Drop the peer slot along with its subscription flag.
    pub fn disconnect(&mut self) -> Option<PeerConnection> {
        self.peer.take()
    }

    pub fn set_subscribed(&mut self, subscribed: bool) -> Result<(), LinkError> {
        let peer = self.peer.as_mut().ok_or(LinkError::NotConnected)?;
        peer.subscribed = subscribed;
        info!(
            "Frame notifications {} by {:?}",
            if subscribed { "enabled" } else { "disabled" },
            peer.handle
        );
        Ok(())
    }

    pub fn peer(&self) -> Option<PeerConnection> {
        self.peer
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Expose `frame` as the readable value, then notify it to the subscribed
    /// peer or silently drop the notification.
    pub async fn publish(&mut self, frame: &Frame) -> Delivery {
        if let Err(e) = self.link.set_value(frame.as_bytes()) {
            warn!("Failed to update frame value: {}", e);
        }

        let Some(peer) = self.peer else {
            return Delivery::NoPeer;
        };
        if !peer.subscribed {
            return Delivery::NotSubscribed;
        }

        match self.link.notify(peer.handle, frame.as_bytes()).await {
            Ok(()) => Delivery::Sent,
            Err(e) => {
                debug!("Notification to {:?} failed: {}", peer.handle, e);
                Delivery::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{DeviceId, encode};
    use crate::testing::RecordingLink;
    use embassy_futures::block_on;

    fn frame() -> Frame {
        encode(DeviceId::new(3).unwrap(), 45, 1013)
    }

    #[test]
    fn test_no_peer_makes_no_outbound_call() {
        let mut notifier = Notifier::new(RecordingLink::default());

        assert_eq!(block_on(notifier.publish(&frame())), Delivery::NoPeer);
        assert!(notifier.link().sent.is_empty());
    }

    #[test]
    fn test_unsubscribed_peer_makes_no_outbound_call() {
        let mut notifier = Notifier::new(RecordingLink::default());
        notifier.connect(ConnHandle(1)).unwrap();

        assert_eq!(block_on(notifier.publish(&frame())), Delivery::NotSubscribed);
        assert!(notifier.link().sent.is_empty());
    }

    #[test]
    fn test_readable_value_tracks_every_frame_without_subscription() {
        let mut notifier = Notifier::new(RecordingLink::default());
        notifier.connect(ConnHandle(1)).unwrap();

        let first = encode(DeviceId::new(3).unwrap(), 20, 101_000);
        let second = encode(DeviceId::new(3).unwrap(), 40, 101_001);
        block_on(notifier.publish(&first));
        assert_eq!(
            block_on(notifier.publish(&second)),
            Delivery::NotSubscribed
        );

        assert_eq!(
            notifier.link().value.as_deref(),
            Some(b"3,00000040,101001\n".as_slice())
        );
        assert!(notifier.link().sent.is_empty());
    }

    #[test]
    fn test_subscribed_peer_receives_frame_bytes() {
        let mut notifier = Notifier::new(RecordingLink::default());
        notifier.connect(ConnHandle(7)).unwrap();
        notifier.set_subscribed(true).unwrap();

        assert_eq!(block_on(notifier.publish(&frame())), Delivery::Sent);

        let sent = &notifier.link().sent;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ConnHandle(7));
        assert_eq!(sent[0].1.as_slice(), b"3,00000045,001013\n");
    }

    #[test]
    fn test_link_failure_is_reported_not_retried() {
        let mut link = RecordingLink::default();
        link.fail_with = Some(LinkError::Stack);
        let mut notifier = Notifier::new(link);
        notifier.connect(ConnHandle(1)).unwrap();
        notifier.set_subscribed(true).unwrap();

        assert_eq!(
            block_on(notifier.publish(&frame())),
            Delivery::Failed(LinkError::Stack)
        );
        assert_eq!(notifier.link().attempts, 1);
    }

    #[test]
    fn test_single_peer_and_disconnect_clears_subscription() {
        let mut notifier = Notifier::new(RecordingLink::default());
        notifier.connect(ConnHandle(1)).unwrap();
        notifier.set_subscribed(true).unwrap();

        assert_eq!(
            notifier.connect(ConnHandle(2)),
            Err(LinkError::AlreadyConnected)
        );

        notifier.disconnect();
        assert_eq!(notifier.set_subscribed(true), Err(LinkError::NotConnected));

        notifier.connect(ConnHandle(2)).unwrap();
        assert_eq!(notifier.peer().map(|p| p.subscribed), Some(false));
    }
}
