//! Deferred sample work
//!
//! The sample timer runs in a context that must stay short, so it only drops a
//! [`SampleTick`] token into [`SampleQueue`]. A separate task drains the queue
//! and does the sensor read, encode and notify as one unit of work.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

/// Tokens that may be pending before the timer starts dropping them.
/// Two covers one period of consumer lag.
pub const SAMPLE_QUEUE_DEPTH: usize = 2;

/// One firing of the sample timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTick {
    /// Firing counter since start, wrapping
    pub seq: u32,
}

pub type SampleQueue = Channel<CriticalSectionRawMutex, SampleTick, SAMPLE_QUEUE_DEPTH>;

/// Enqueue a tick without blocking. Returns `false` if the consumer is behind
/// and the token was dropped.
pub fn submit(queue: &SampleQueue, tick: SampleTick) -> bool {
    match queue.try_send(tick) {
        Ok(()) => true,
        Err(_) => {
            warn!("Sample work overrun, dropped tick {}", tick.seq);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_is_fifo_and_bounded() {
        let queue = SampleQueue::new();

        assert!(submit(&queue, SampleTick { seq: 0 }));
        assert!(submit(&queue, SampleTick { seq: 1 }));
        assert!(!submit(&queue, SampleTick { seq: 2 }), "queue should be full");

        assert_eq!(queue.try_receive().ok(), Some(SampleTick { seq: 0 }));
        assert_eq!(queue.try_receive().ok(), Some(SampleTick { seq: 1 }));
        assert!(queue.try_receive().is_err());
    }
}
