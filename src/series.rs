//! Per-edge tick history buffers.
//!
//! Every edge owns a fixed-capacity ring of its most recent (time, value)
//! samples. Capacity is chosen at graph finalization from the deepest
//! per-subscription history request, so the cycle loop never allocates.

use crate::error::RuntimeError;
use crate::types::Time;
use crate::value::Value;

/// Outcome of a buffer write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Write {
    /// A new sample was appended; consumers must be notified.
    Appended,
    /// The sample at the same time was overwritten; consumers already saw
    /// a tick at this time and must not be re-notified.
    Rewritten,
}

/// A fixed-capacity ring buffer of (time, value) samples.
///
/// Samples are strictly increasing in time; a write at the current last
/// time replaces the last sample in place, and a write behind it fails
/// with [`RuntimeError::TimeRegression`].
#[derive(Debug)]
pub struct TickBuffer {
    times: Box<[Time]>,
    values: Vec<Option<Value>>,
    /// Index of the most recent sample, valid when `len > 0`.
    head: usize,
    len: usize,
}

impl TickBuffer {
    /// Creates a buffer holding up to `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            times: vec![0; capacity].into_boxed_slice(),
            values: vec![None; capacity],
            head: 0,
            len: 0,
        }
    }

    /// Maximum number of retained samples.
    pub fn capacity(&self) -> usize {
        self.times.len()
    }

    /// Number of samples currently retained.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no sample has ever been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Writes a sample at time `t`.
    ///
    /// Appends if `t` is past the last sample; overwrites in place if `t`
    /// equals the last sample's time. Writes behind the last sample fail
    /// with [`RuntimeError::TimeRegression`].
    pub fn write(&mut self, t: Time, value: Value) -> Result<Write, RuntimeError> {
        if let Some(last) = self.last_time() {
            if t < last {
                return Err(RuntimeError::TimeRegression { last, attempted: t });
            }
            if t == last {
                self.values[self.head] = Some(value);
                return Ok(Write::Rewritten);
            }
        }
        self.head = if self.len == 0 {
            0
        } else {
            (self.head + 1) % self.capacity()
        };
        self.times[self.head] = t;
        self.values[self.head] = Some(value);
        if self.len < self.capacity() {
            self.len += 1;
        }
        Ok(Write::Appended)
    }

    /// Time of the most recent sample.
    pub fn last_time(&self) -> Option<Time> {
        if self.len == 0 {
            None
        } else {
            Some(self.times[self.head])
        }
    }

    /// The most recent sample.
    pub fn last(&self) -> Option<(Time, &Value)> {
        self.at(0).ok()
    }

    /// The sample `k` ticks ago (`k == 0` is the latest).
    ///
    /// Fails with [`RuntimeError::HistoryUnderflow`] when fewer than `k + 1`
    /// samples are retained.
    pub fn at(&self, k: usize) -> Result<(Time, &Value), RuntimeError> {
        if k >= self.len {
            return Err(RuntimeError::HistoryUnderflow {
                requested: k,
                available: self.len,
            });
        }
        let cap = self.capacity();
        let idx = (self.head + cap - k) % cap;
        let value = self.values[idx]
            .as_ref()
            .ok_or_else(|| RuntimeError::InvariantViolation("empty ring slot".to_string()))?;
        Ok((self.times[idx], value))
    }

    /// True iff the buffer's last sample is stamped exactly `t`.
    pub fn ticked_at(&self, t: Time) -> bool {
        self.last_time() == Some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        let buf = TickBuffer::new(3);
        assert!(buf.is_empty());
        assert_eq!(buf.last_time(), None);
        assert!(buf.last().is_none());
        assert!(!buf.ticked_at(0));
        assert!(matches!(
            buf.at(0),
            Err(RuntimeError::HistoryUnderflow { requested: 0, available: 0 })
        ));
    }

    #[test]
    fn test_append_and_last() {
        let mut buf = TickBuffer::new(2);
        assert_eq!(buf.write(10, Value::Int(1)).unwrap(), Write::Appended);
        assert_eq!(buf.write(20, Value::Int(2)).unwrap(), Write::Appended);
        assert_eq!(buf.last_time(), Some(20));
        let (t, v) = buf.last().unwrap();
        assert_eq!(t, 20);
        assert_eq!(v.as_int(), Some(2));
        assert!(buf.ticked_at(20));
        assert!(!buf.ticked_at(10));
    }

    #[test]
    fn test_history_access() {
        let mut buf = TickBuffer::new(3);
        for (t, v) in [(10, 1), (20, 2), (30, 3), (40, 4)] {
            buf.write(t, Value::Int(v)).unwrap();
        }
        // Capacity 3: oldest sample (10, 1) was evicted
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.at(0).unwrap().0, 40);
        assert_eq!(buf.at(1).unwrap().0, 30);
        assert_eq!(buf.at(2).unwrap().0, 20);
        assert!(matches!(
            buf.at(3),
            Err(RuntimeError::HistoryUnderflow { requested: 3, available: 3 })
        ));
    }

    #[test]
    fn test_same_time_rewrite() {
        let mut buf = TickBuffer::new(2);
        buf.write(10, Value::Int(1)).unwrap();
        assert_eq!(buf.write(10, Value::Int(7)).unwrap(), Write::Rewritten);
        // Still one sample, holding the second value
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.last().unwrap().1.as_int(), Some(7));
    }

    #[test]
    fn test_time_regression() {
        let mut buf = TickBuffer::new(2);
        buf.write(10, Value::Int(1)).unwrap();
        assert!(matches!(
            buf.write(5, Value::Int(2)),
            Err(RuntimeError::TimeRegression { last: 10, attempted: 5 })
        ));
        // Buffer unchanged after a rejected write
        assert_eq!(buf.last_time(), Some(10));
    }

    #[test]
    fn test_minimum_capacity() {
        let mut buf = TickBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.write(1, Value::Bool(true)).unwrap();
        buf.write(2, Value::Bool(false)).unwrap();
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.last_time(), Some(2));
    }

    #[test]
    fn test_time_order_preserved() {
        let mut buf = TickBuffer::new(4);
        for t in [5, 6, 9, 12] {
            buf.write(t, Value::Time(t)).unwrap();
        }
        let times: Vec<Time> = (0..4).map(|k| buf.at(k).unwrap().0).collect();
        assert_eq!(times, vec![12, 9, 6, 5]);
    }
}
