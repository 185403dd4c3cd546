//! BLE stack collaborator interface

use thiserror_no_std::Error;

/// Stack-assigned identity of a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub u16);

/// Failures reported by the BLE stack, for notifications and for the
/// Current Time discovery and read requests.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    #[error("no peer connected")]
    NotConnected,
    #[error("a peer is already connected")]
    AlreadyConnected,
    /// The request outlived the configured timeout
    #[error("request timed out")]
    Timeout,
    /// ATT protocol error code returned by the peer
    #[error("ATT error {0:#04x}")]
    Att(u8),
    #[error("peer returned a malformed value")]
    MalformedValue,
    /// Any other host stack failure
    #[error("BLE stack error")]
    Stack,
}

/// The stack's view of the frame characteristic.
pub trait NotifyLink {
    /// Replace the value a GATT read of the frame characteristic returns.
    ///
    /// Called for every new frame, whether or not a peer is subscribed.
    fn set_value(&mut self, payload: &[u8]) -> Result<(), LinkError>;

    /// Fire-and-forget notification to a subscribed peer.
    fn notify(
        &mut self,
        conn: ConnHandle,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), LinkError>>;
}
