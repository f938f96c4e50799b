use crate::errors::{HalError, HalResult};
use std::collections::BTreeMap;
use tokio::time::{sleep_until, Duration, Instant};

/// Period used until `set_delay` is called (the HAL "normal" rate)
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(200);

#[derive(Debug)]
struct Slot {
    enabled: bool,
    period: Duration,
    next_due: Instant,
}

/// Activation and interval bookkeeping for backends that sample on demand.
///
/// Each handle has its own period. [`Sampler::wait_due`] sleeps until the earliest
/// deadline among enabled handles and reports every handle due at that moment.
#[derive(Debug)]
pub struct Sampler {
    slots: BTreeMap<i32, Slot>,
}

impl Sampler {
    pub fn new(handles: impl IntoIterator<Item = i32>) -> Self {
        let now = Instant::now();
        let slots = handles
            .into_iter()
            .map(|h| {
                (
                    h,
                    Slot {
                        enabled: false,
                        period: DEFAULT_PERIOD,
                        next_due: now,
                    },
                )
            })
            .collect();
        Self { slots }
    }

    fn slot_mut(&mut self, handle: i32) -> HalResult<&mut Slot> {
        self.slots.get_mut(&handle).ok_or(HalError::BadHandle { handle })
    }

    pub fn set_enabled(&mut self, handle: i32, enabled: bool) -> HalResult<()> {
        let slot = self.slot_mut(handle)?;
        if enabled && !slot.enabled {
            slot.next_due = Instant::now();
        }
        slot.enabled = enabled;
        Ok(())
    }

    pub fn set_period(&mut self, handle: i32, interval_ns: i64) -> HalResult<()> {
        if interval_ns <= 0 {
            return Err(HalError::InvalidDelay { handle, interval_ns });
        }
        let slot = self.slot_mut(handle)?;
        slot.period = Duration::from_nanos(interval_ns as u64);
        Ok(())
    }

    /// Wait for the next due handles, at most `limit` of them. Pends forever
    /// while nothing is enabled.
    ///
    /// Handles are returned longest-overdue first. Only the returned handles are
    /// rescheduled, so a due handle left out stays due for the next call.
    pub async fn wait_due(&mut self, limit: usize) -> Vec<i32> {
        let earliest = self
            .slots
            .values()
            .filter(|s| s.enabled)
            .map(|s| s.next_due)
            .min();
        let Some(deadline) = earliest else {
            return std::future::pending().await;
        };
        sleep_until(deadline).await;

        let now = Instant::now();
        let mut due: Vec<(Instant, i32)> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.enabled && slot.next_due <= now)
            .map(|(handle, slot)| (slot.next_due, *handle))
            .collect();
        due.sort_unstable();
        due.truncate(limit);

        for (_, handle) in due.iter() {
            if let Some(slot) = self.slots.get_mut(handle) {
                slot.next_due += slot.period;
                // Skip missed periods instead of bursting to catch up
                if slot.next_due <= now {
                    slot.next_due = now + slot.period;
                }
            }
        }
        due.into_iter().map(|(_, handle)| handle).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_handle_rejected() {
        let mut sampler = Sampler::new([1, 2]);
        assert!(matches!(sampler.set_enabled(7, true), Err(HalError::BadHandle { handle: 7 })));
        assert!(matches!(
            sampler.set_period(1, 0),
            Err(HalError::InvalidDelay { handle: 1, interval_ns: 0 })
        ));
    }

    #[tokio::test]
    async fn test_only_enabled_handles_are_due() {
        let mut sampler = Sampler::new([1, 2, 3]);
        sampler.set_enabled(2, true).unwrap();
        sampler.set_period(2, 1_000_000).unwrap();
        assert_eq!(sampler.wait_due(8).await, vec![2]);
        assert_eq!(sampler.wait_due(8).await, vec![2]);
    }

    #[tokio::test]
    async fn test_nothing_enabled_pends() {
        let mut sampler = Sampler::new([1]);
        let res = tokio::time::timeout(Duration::from_millis(20), sampler.wait_due(8)).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_disable_stops_sampling() {
        let mut sampler = Sampler::new([1]);
        sampler.set_enabled(1, true).unwrap();
        assert_eq!(sampler.wait_due(8).await, vec![1]);
        sampler.set_enabled(1, false).unwrap();
        let res = tokio::time::timeout(Duration::from_millis(20), sampler.wait_due(8)).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_limited_batch_rotates_through_due_handles() {
        let mut sampler = Sampler::new([1, 2, 3]);
        for h in [1, 2, 3] {
            sampler.set_enabled(h, true).unwrap();
            sampler.set_period(h, 1_000_000).unwrap();
        }
        let mut seen = Vec::new();
        for _ in 0..6 {
            let due = sampler.wait_due(1).await;
            assert_eq!(due.len(), 1);
            seen.extend(due);
        }
        for h in [1, 2, 3] {
            assert!(seen.contains(&h), "handle {} never due in {:?}", h, seen);
        }
    }
}
