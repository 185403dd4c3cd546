//! Current Time Service client state machine
//!
//! ```text
//!            Connected                 DiscoveryOk
//!   Idle ─────────────► Discovering ──────────────► Reading ──ReadOk──► Synced
//!    ▲                   │   ▲  │                      │
//!    │  DiscoveryNotFound│   │  │ DiscoveryError       │ ReadError
//!    └───────────────────┘   └──┴──────(retries < max)─┘
//!    ▲                              │
//!    └────────(retries == max)──────┘
//! ```
//!
//! [`transition`] is a pure function of (state, event); the BLE glue performs
//! the returned [`SyncAction`]. `H` is the stack's handle to the discovered
//! Current Time characteristic.
//!
//! The clock is corrected once per connection. There is no periodic re-sync.

use core::mem;

use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::clock::CurrentTime;
use crate::link::LinkError;

/// Per-connection retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSession<H> {
    /// Failed discovery/read attempts so far on this connection
    pub retries: u8,
    /// Current Time characteristic once discovered
    pub handles: Option<H>,
}

impl<H> SyncSession<H> {
    pub const fn new() -> Self {
        Self {
            retries: 0,
            handles: None,
        }
    }
}

impl<H> Default for SyncSession<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the client is in the sync procedure for the current connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState<H> {
    /// No connection, or the last attempt was abandoned
    Idle,
    Discovering(SyncSession<H>),
    Reading(SyncSession<H>),
    /// Clock corrected; nothing more to do until the next connection
    Synced,
}

/// Inputs from the BLE stack: connection lifecycle plus the outcome of each
/// discovery and read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent<H> {
    Connected,
    Disconnected,
    DiscoveryOk(H),
    DiscoveryNotFound,
    DiscoveryError(LinkError),
    ReadOk(CurrentTime),
    ReadError(LinkError),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFailure {
    #[error("Current Time Service not found on peer")]
    ServiceNotFound,
    #[error("time sync gave up after {attempts} failed attempts (last: {last})")]
    RetriesExhausted { attempts: u8, last: LinkError },
}

/// Work the BLE glue must carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction<H> {
    None,
    /// Start discovery of the Current Time Service
    StartDiscovery,
    /// Yield to the scheduler, then start discovery again
    RetryDiscovery { attempt: u8 },
    /// Issue exactly one read of the Current Time characteristic
    ReadCurrentTime(H),
    /// Overwrite the reference clock
    SetClock(u64),
    /// Stop syncing on this connection
    Abandon(SyncFailure),
}

fn fail<H>(
    session: SyncSession<H>,
    error: LinkError,
    max_retries: u8,
) -> (SyncState<H>, SyncAction<H>) {
    let retries = session.retries.saturating_add(1);
    if retries < max_retries {
        (
            SyncState::Discovering(SyncSession {
                retries,
                handles: None,
            }),
            SyncAction::RetryDiscovery { attempt: retries },
        )
    } else {
        (
            SyncState::Idle,
            SyncAction::Abandon(SyncFailure::RetriesExhausted {
                attempts: retries,
                last: error,
            }),
        )
    }
}

/// Compute the next state and the action it requires.
///
/// Events that do not apply to the current state (late results after a
/// disconnect, duplicates) leave the state unchanged and yield no action.
pub fn transition<H: Clone>(
    state: SyncState<H>,
    event: SyncEvent<H>,
    max_retries: u8,
) -> (SyncState<H>, SyncAction<H>) {
    match (state, event) {
        (_, SyncEvent::Connected) => (
            SyncState::Discovering(SyncSession::new()),
            SyncAction::StartDiscovery,
        ),
        (_, SyncEvent::Disconnected) => (SyncState::Idle, SyncAction::None),

        (SyncState::Discovering(session), SyncEvent::DiscoveryOk(handles)) => (
            SyncState::Reading(SyncSession {
                retries: session.retries,
                handles: Some(handles.clone()),
            }),
            SyncAction::ReadCurrentTime(handles),
        ),
        (SyncState::Discovering(_), SyncEvent::DiscoveryNotFound) => (
            SyncState::Idle,
            SyncAction::Abandon(SyncFailure::ServiceNotFound),
        ),
        (SyncState::Discovering(session), SyncEvent::DiscoveryError(e)) => {
            fail(session, e, max_retries)
        }

        (SyncState::Reading(_), SyncEvent::ReadOk(time)) => {
            (SyncState::Synced, SyncAction::SetClock(time.to_millis()))
        }
        (SyncState::Reading(session), SyncEvent::ReadError(e)) => fail(session, e, max_retries),

        (state, _) => (state, SyncAction::None),
    }
}

/// Owns the sync state for the current connection.
pub struct TimeSyncClient<H> {
    state: SyncState<H>,
    max_retries: u8,
}

impl<H: Clone> TimeSyncClient<H> {
    pub const fn new(max_retries: u8) -> Self {
        Self {
            state: SyncState::Idle,
            max_retries,
        }
    }

    /// Feed one event and return the action to perform.
    pub fn handle(&mut self, event: SyncEvent<H>) -> SyncAction<H> {
        let state = mem::replace(&mut self.state, SyncState::Idle);
        let (next, action) = transition(state, event, self.max_retries);
        self.state = next;

        match &action {
            SyncAction::StartDiscovery => info!("Discovering Current Time Service"),
            SyncAction::RetryDiscovery { attempt } => warn!(
                "Time sync attempt failed, retrying discovery ({}/{})",
                attempt, self.max_retries
            ),
            SyncAction::ReadCurrentTime(_) => info!("Current Time Service found, reading time"),
            SyncAction::SetClock(ms) => info!("Time synced: {} ms", ms),
            SyncAction::Abandon(SyncFailure::ServiceNotFound) => warn!(
                "Current Time Service not found on peer; enable the CTS server on the central"
            ),
            SyncAction::Abandon(failure) => error!("{}", failure),
            SyncAction::None => {}
        }

        action
    }

    pub fn state(&self) -> &SyncState<H> {
        &self.state
    }

    /// Active session, if a sync is in progress.
    pub fn session(&self) -> Option<&SyncSession<H>> {
        match &self.state {
            SyncState::Discovering(session) | SyncState::Reading(session) => Some(session),
            SyncState::Idle | SyncState::Synced => None,
        }
    }

    /// Failed attempts on the current connection; 0 without a session.
    pub fn retries(&self) -> u8 {
        self.session().map_or(0, |s| s.retries)
    }

    pub fn is_synced(&self) -> bool {
        matches!(self.state, SyncState::Synced)
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Handle = u16;
    const CTS: Handle = 0x002a;

    fn time(h: u8, m: u8, s: u8, f: u8) -> CurrentTime {
        CurrentTime {
            year: 2024,
            month: 1,
            day: 1,
            hours: h,
            minutes: m,
            seconds: s,
            fractions256: f,
            ..Default::default()
        }
    }

    fn is_discovery(action: &SyncAction<Handle>) -> bool {
        matches!(
            action,
            SyncAction::StartDiscovery | SyncAction::RetryDiscovery { .. }
        )
    }

    #[test]
    fn test_happy_path() {
        let mut client = TimeSyncClient::<Handle>::new(5);

        assert_eq!(client.handle(SyncEvent::Connected), SyncAction::StartDiscovery);
        assert_eq!(
            client.handle(SyncEvent::DiscoveryOk(CTS)),
            SyncAction::ReadCurrentTime(CTS)
        );
        assert_eq!(
            client.state(),
            &SyncState::Reading(SyncSession {
                retries: 0,
                handles: Some(CTS),
            })
        );
        assert_eq!(
            client.handle(SyncEvent::ReadOk(time(1, 2, 3, 128))),
            SyncAction::SetClock(3_723_500)
        );
        assert!(client.is_synced());

        // No further reads are scheduled
        assert_eq!(
            client.handle(SyncEvent::ReadOk(time(0, 0, 0, 0))),
            SyncAction::None
        );
    }

    #[test]
    fn test_service_not_found_is_not_retried() {
        let mut client = TimeSyncClient::<Handle>::new(5);
        client.handle(SyncEvent::Connected);

        assert_eq!(
            client.handle(SyncEvent::DiscoveryNotFound),
            SyncAction::Abandon(SyncFailure::ServiceNotFound)
        );
        assert_eq!(client.state(), &SyncState::Idle);
        assert_eq!(
            client.handle(SyncEvent::DiscoveryError(LinkError::Stack)),
            SyncAction::None
        );
    }

    #[test]
    fn test_gives_up_after_five_failures() {
        let mut client = TimeSyncClient::<Handle>::new(5);
        let mut discoveries = 0;

        let first = client.handle(SyncEvent::Connected);
        assert!(is_discovery(&first));
        discoveries += 1;

        // Mix discovery and read failures; both count
        let failures = [
            SyncEvent::DiscoveryError(LinkError::Att(0x0e)),
            SyncEvent::DiscoveryError(LinkError::Timeout),
            SyncEvent::ReadError(LinkError::Att(0x02)),
            SyncEvent::DiscoveryError(LinkError::Stack),
            SyncEvent::DiscoveryError(LinkError::Stack),
        ];

        for (i, failure) in failures.into_iter().enumerate() {
            // A read failure has to come from the Reading state
            if matches!(failure, SyncEvent::ReadError(_)) {
                assert_eq!(
                    client.handle(SyncEvent::DiscoveryOk(CTS)),
                    SyncAction::ReadCurrentTime(CTS)
                );
            }
            let action = client.handle(failure);
            if i < 4 {
                assert_eq!(action, SyncAction::RetryDiscovery { attempt: i as u8 + 1 });
                discoveries += 1;
            } else {
                assert_eq!(
                    action,
                    SyncAction::Abandon(SyncFailure::RetriesExhausted {
                        attempts: 5,
                        last: LinkError::Stack,
                    })
                );
            }
        }

        assert_eq!(discoveries, 5);
        assert_eq!(client.state(), &SyncState::Idle);

        // Late results on this connection start nothing
        assert!(!is_discovery(
            &client.handle(SyncEvent::DiscoveryError(LinkError::Stack))
        ));
        assert!(!is_discovery(&client.handle(SyncEvent::DiscoveryOk(CTS))));
    }

    #[test]
    fn test_disconnect_resets_retries() {
        let mut client = TimeSyncClient::<Handle>::new(5);
        client.handle(SyncEvent::Connected);
        client.handle(SyncEvent::DiscoveryError(LinkError::Timeout));
        client.handle(SyncEvent::DiscoveryError(LinkError::Timeout));
        assert_eq!(client.retries(), 2);

        assert_eq!(client.handle(SyncEvent::Disconnected), SyncAction::None);
        assert_eq!(client.state(), &SyncState::Idle);
        assert_eq!(client.retries(), 0);

        assert_eq!(client.handle(SyncEvent::Connected), SyncAction::StartDiscovery);
        assert_eq!(client.session(), Some(&SyncSession::new()));
    }

    #[test]
    fn test_success_clears_session() {
        let (state, _) = transition(
            SyncState::Reading(SyncSession {
                retries: 3,
                handles: Some(CTS),
            }),
            SyncEvent::ReadOk(time(0, 0, 1, 0)),
            5,
        );
        assert_eq!(state, SyncState::Synced);
    }

    #[test]
    fn test_retry_drops_discovered_handles() {
        let (state, action) = transition(
            SyncState::Reading(SyncSession {
                retries: 0,
                handles: Some(CTS),
            }),
            SyncEvent::ReadError(LinkError::Timeout),
            5,
        );
        assert_eq!(action, SyncAction::RetryDiscovery { attempt: 1 });
        assert_eq!(
            state,
            SyncState::Discovering(SyncSession {
                retries: 1,
                handles: None,
            })
        );
    }
}
