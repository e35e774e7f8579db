//! Reassembly of streams from chunks arriving in any order.
//!
//! Partial streams are bounded three ways: by age ([`ChunkReassembler::expire`]),
//! by count (the oldest stream is evicted when a new one would exceed
//! `max_pending_streams`) and by size (a stream over `max_stream_bytes` is
//! dropped).
//!
//! Completed stream ids are remembered for `max_age_secs`, up to
//! `max_completed_streams` of them, so late duplicate chunks cannot complete
//! a stream a second time.

use bmp_core::StreamId;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::chunker::Chunk;
use crate::error::{ChunkError, Result};

/// Limits on in-flight partial streams.
#[derive(Debug, Clone)]
pub struct ReassemblyConfig {
    /// Seconds after its first chunk before a partial stream expires.
    pub max_age_secs: u64,

    /// Partial streams held at once.
    pub max_pending_streams: usize,

    /// Bytes buffered for a single stream.
    pub max_stream_bytes: usize,

    /// Completed stream ids remembered for duplicate suppression.
    pub max_completed_streams: usize,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 300,
            max_pending_streams: 64,
            max_stream_bytes: 16 * 1024 * 1024,
            max_completed_streams: 1024,
        }
    }
}

#[derive(Debug)]
struct PendingStream {
    total: u32,
    chunks: BTreeMap<u32, Bytes>,
    first_received: u64,
    /// Arrival order among streams, for eviction.
    arrival: u64,
    buffer_size: usize,
}

impl PendingStream {
    fn is_complete(&self) -> bool {
        self.chunks.len() == self.total as usize
    }

    fn is_expired(&self, now: u64, max_age_secs: u64) -> bool {
        now.saturating_sub(self.first_received) > max_age_secs
    }

    /// Concatenate in sequence order.
    fn assemble(self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.buffer_size);
        for piece in self.chunks.into_values() {
            data.extend_from_slice(&piece);
        }
        data
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Collects chunks per stream and yields each stream once, when complete.
#[derive(Debug, Default)]
pub struct ChunkReassembler {
    pending: HashMap<StreamId, PendingStream>,
    /// Completion time per finished stream id.
    completed: HashMap<StreamId, u64>,
    /// Finished stream ids, oldest first.
    completed_order: VecDeque<StreamId>,
    config: ReassemblyConfig,
    arrivals: u64,
}

impl ChunkReassembler {
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            pending: HashMap::new(),
            completed: HashMap::new(),
            completed_order: VecDeque::new(),
            config,
            arrivals: 0,
        }
    }

    pub fn config(&self) -> &ReassemblyConfig {
        &self.config
    }

    /// Add a chunk, timestamped with the current wall clock.
    pub fn add(&mut self, chunk: Chunk) -> Result<Option<Vec<u8>>> {
        self.add_at(chunk, now_secs())
    }

    /// Add a chunk received at `now` (Unix seconds).
    ///
    /// Returns the payload, ordered by sequence, on the call that supplies
    /// the last missing chunk of its stream and `None` on every other call.
    /// Duplicate chunks are ignored, including chunks of a stream that has
    /// already completed.
    pub fn add_at(&mut self, chunk: Chunk, now: u64) -> Result<Option<Vec<u8>>> {
        chunk.validate()?;
        if self.completed.contains_key(&chunk.stream_id) {
            debug!(stream = %chunk.stream_id, sequence = chunk.sequence, "chunk for completed stream ignored");
            return Ok(None);
        }
        let max = self.config.max_stream_bytes;

        if let Some(stream) = self.pending.get_mut(&chunk.stream_id) {
            if stream.total != chunk.total {
                return Err(ChunkError::TotalMismatch {
                    expected: stream.total,
                    actual: chunk.total,
                });
            }
            if stream.chunks.contains_key(&chunk.sequence) {
                return Ok(None);
            }

            let size = stream.buffer_size.saturating_add(chunk.data.len());
            if size > max {
                self.pending.remove(&chunk.stream_id);
                warn!(stream = %chunk.stream_id, size, max, "dropping oversized stream");
                return Err(ChunkError::StreamTooLarge { size, max });
            }
            stream.buffer_size = size;
            stream.chunks.insert(chunk.sequence, chunk.data);

            if stream.is_complete() {
                let Some(stream) = self.pending.remove(&chunk.stream_id) else {
                    return Ok(None);
                };
                debug!(stream = %chunk.stream_id, total = stream.total, "stream complete");
                self.mark_completed(chunk.stream_id, now);
                return Ok(Some(stream.assemble()));
            }
            return Ok(None);
        }

        if chunk.data.len() > max {
            return Err(ChunkError::StreamTooLarge {
                size: chunk.data.len(),
                max,
            });
        }
        if chunk.total == 1 {
            let data = chunk.data.to_vec();
            self.mark_completed(chunk.stream_id, now);
            return Ok(Some(data));
        }

        while self.pending.len() >= self.config.max_pending_streams.max(1) {
            self.evict_oldest();
        }

        self.arrivals += 1;
        let mut chunks = BTreeMap::new();
        let buffer_size = chunk.data.len();
        chunks.insert(chunk.sequence, chunk.data);
        self.pending.insert(
            chunk.stream_id,
            PendingStream {
                total: chunk.total,
                chunks,
                first_received: now,
                arrival: self.arrivals,
                buffer_size,
            },
        );
        Ok(None)
    }

    fn mark_completed(&mut self, stream_id: StreamId, now: u64) {
        let capacity = self.config.max_completed_streams;
        if capacity == 0 {
            return;
        }
        while self.completed_order.len() >= capacity {
            match self.completed_order.pop_front() {
                Some(oldest) => {
                    self.completed.remove(&oldest);
                }
                None => break,
            }
        }
        self.completed.insert(stream_id.clone(), now);
        self.completed_order.push_back(stream_id);
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .pending
            .iter()
            .min_by_key(|(_, s)| s.arrival)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            warn!(stream = %id, "evicting oldest partial stream");
            self.pending.remove(&id);
        }
    }

    /// Drop partial streams older than `max_age_secs` at `now`.
    ///
    /// Returns the number of partial streams dropped. Completed stream ids
    /// past the same age are forgotten too.
    pub fn expire(&mut self, now: u64) -> usize {
        let max_age = self.config.max_age_secs;
        while let Some(oldest) = self.completed_order.front() {
            let finished = self.completed.get(oldest).copied().unwrap_or(0);
            if now.saturating_sub(finished) <= max_age {
                break;
            }
            if let Some(oldest) = self.completed_order.pop_front() {
                self.completed.remove(&oldest);
            }
        }

        let before = self.pending.len();
        self.pending.retain(|id, stream| {
            let keep = !stream.is_expired(now, max_age);
            if !keep {
                debug!(stream = %id, received = stream.chunks.len(), "expired partial stream");
            }
            keep
        });
        before - self.pending.len()
    }

    /// [`ChunkReassembler::expire`] against the wall clock.
    pub fn expire_now(&mut self) -> usize {
        self.expire(now_secs())
    }

    /// Drop a partial stream. Returns whether it was pending.
    pub fn discard(&mut self, stream_id: &StreamId) -> bool {
        self.pending.remove(stream_id).is_some()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, stream_id: &StreamId) -> bool {
        self.pending.contains_key(stream_id)
    }

    /// Whether `stream_id` completed recently enough to be remembered.
    pub fn is_completed(&self, stream_id: &StreamId) -> bool {
        self.completed.contains_key(stream_id)
    }

    /// Chunks received so far for a partial stream.
    pub fn received(&self, stream_id: &StreamId) -> Option<usize> {
        self.pending.get(stream_id).map(|s| s.chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk;

    fn part(stream: &str, sequence: u32, total: u32, data: &[u8]) -> Chunk {
        Chunk {
            stream_id: StreamId::new(stream),
            sequence,
            total,
            data: Bytes::copy_from_slice(data),
        }
    }

    #[test]
    fn test_in_order() {
        let mut r = ChunkReassembler::default();
        assert_eq!(r.add_at(part("s", 0, 3, b"ab"), 0).unwrap(), None);
        assert_eq!(r.add_at(part("s", 1, 3, b"cd"), 0).unwrap(), None);
        assert_eq!(r.add_at(part("s", 2, 3, b"e"), 0).unwrap(), Some(b"abcde".to_vec()));
        assert_eq!(r.pending_count(), 0);
    }

    #[test]
    fn test_out_of_order_concatenates_by_sequence() {
        let mut r = ChunkReassembler::default();
        assert_eq!(r.add_at(part("s", 2, 3, b"e"), 0).unwrap(), None);
        assert_eq!(r.add_at(part("s", 0, 3, b"ab"), 0).unwrap(), None);
        assert_eq!(r.add_at(part("s", 1, 3, b"cd"), 0).unwrap(), Some(b"abcde".to_vec()));
    }

    #[test]
    fn test_duplicates_ignored() {
        let mut r = ChunkReassembler::default();
        assert_eq!(r.add_at(part("s", 0, 2, b"a"), 0).unwrap(), None);
        assert_eq!(r.add_at(part("s", 0, 2, b"a"), 0).unwrap(), None);
        assert_eq!(r.received(&StreamId::new("s")), Some(1));
        assert_eq!(r.add_at(part("s", 1, 2, b"b"), 0).unwrap(), Some(b"ab".to_vec()));
    }

    #[test]
    fn test_single_chunk_completes_immediately() {
        let mut r = ChunkReassembler::default();
        assert_eq!(r.add_at(part("s", 0, 1, b"solo"), 0).unwrap(), Some(b"solo".to_vec()));
        assert_eq!(r.pending_count(), 0);
        assert_eq!(r.add_at(part("s", 0, 1, b"solo"), 0).unwrap(), None);
    }

    #[test]
    fn test_late_duplicates_do_not_complete_again() {
        let mut r = ChunkReassembler::default();
        assert_eq!(r.add_at(part("s", 0, 2, b"a"), 0).unwrap(), None);
        assert_eq!(r.add_at(part("s", 1, 2, b"b"), 0).unwrap(), Some(b"ab".to_vec()));
        assert!(r.is_completed(&StreamId::new("s")));

        assert_eq!(r.add_at(part("s", 1, 2, b"b"), 1).unwrap(), None);
        assert_eq!(r.add_at(part("s", 0, 2, b"a"), 1).unwrap(), None);
        assert_eq!(r.pending_count(), 0);
    }

    #[test]
    fn test_completed_ids_expire_and_stay_bounded() {
        let mut r = ChunkReassembler::new(ReassemblyConfig {
            max_age_secs: 10,
            max_completed_streams: 2,
            ..Default::default()
        });
        r.add_at(part("a", 0, 1, b"a"), 0).unwrap();
        r.add_at(part("b", 0, 1, b"b"), 5).unwrap();
        r.add_at(part("c", 0, 1, b"c"), 5).unwrap();
        assert!(!r.is_completed(&StreamId::new("a")));
        assert!(r.is_completed(&StreamId::new("b")));

        assert_eq!(r.expire(16), 0);
        assert!(!r.is_completed(&StreamId::new("b")));
        assert!(!r.is_completed(&StreamId::new("c")));
    }

    #[test]
    fn test_streams_are_independent() {
        let mut r = ChunkReassembler::default();
        assert_eq!(r.add_at(part("a", 0, 2, b"a0"), 0).unwrap(), None);
        assert_eq!(r.add_at(part("b", 1, 2, b"b1"), 0).unwrap(), None);
        assert_eq!(r.add_at(part("b", 0, 2, b"b0"), 0).unwrap(), Some(b"b0b1".to_vec()));
        assert!(r.is_pending(&StreamId::new("a")));
        assert_eq!(r.add_at(part("a", 1, 2, b"a1"), 0).unwrap(), Some(b"a0a1".to_vec()));
    }

    #[test]
    fn test_invalid_chunks_rejected() {
        let mut r = ChunkReassembler::default();
        assert_eq!(r.add_at(part("s", 0, 0, b""), 0), Err(ChunkError::InvalidTotal));
        assert_eq!(
            r.add_at(part("s", 3, 3, b""), 0),
            Err(ChunkError::SequenceOutOfRange { sequence: 3, total: 3 })
        );
        r.add_at(part("s", 0, 3, b"x"), 0).unwrap();
        assert_eq!(
            r.add_at(part("s", 1, 4, b"y"), 0),
            Err(ChunkError::TotalMismatch { expected: 3, actual: 4 })
        );
    }

    #[test]
    fn test_expire_drops_old_streams() {
        let mut r = ChunkReassembler::new(ReassemblyConfig {
            max_age_secs: 10,
            ..Default::default()
        });
        r.add_at(part("old", 0, 2, b"x"), 100).unwrap();
        r.add_at(part("new", 0, 2, b"y"), 105).unwrap();

        assert_eq!(r.expire(110), 0);
        assert_eq!(r.expire(111), 1);
        assert!(!r.is_pending(&StreamId::new("old")));
        assert!(r.is_pending(&StreamId::new("new")));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut r = ChunkReassembler::new(ReassemblyConfig {
            max_pending_streams: 2,
            ..Default::default()
        });
        r.add_at(part("first", 0, 2, b"1"), 0).unwrap();
        r.add_at(part("second", 0, 2, b"2"), 0).unwrap();
        r.add_at(part("third", 0, 2, b"3"), 0).unwrap();

        assert_eq!(r.pending_count(), 2);
        assert!(!r.is_pending(&StreamId::new("first")));
        assert!(r.is_pending(&StreamId::new("third")));
    }

    #[test]
    fn test_oversized_stream_dropped() {
        let mut r = ChunkReassembler::new(ReassemblyConfig {
            max_stream_bytes: 4,
            ..Default::default()
        });
        assert_eq!(
            r.add_at(part("big", 0, 2, b"12345"), 0),
            Err(ChunkError::StreamTooLarge { size: 5, max: 4 })
        );

        r.add_at(part("s", 0, 3, b"123"), 0).unwrap();
        assert_eq!(
            r.add_at(part("s", 1, 3, b"45"), 0),
            Err(ChunkError::StreamTooLarge { size: 5, max: 4 })
        );
        assert!(!r.is_pending(&StreamId::new("s")));
    }

    #[test]
    fn test_discard() {
        let mut r = ChunkReassembler::default();
        r.add_at(part("s", 0, 2, b"x"), 0).unwrap();
        assert!(r.discard(&StreamId::new("s")));
        assert!(!r.discard(&StreamId::new("s")));
        // A late chunk starts over rather than completing.
        assert_eq!(r.add_at(part("s", 1, 2, b"y"), 0).unwrap(), None);
    }

    #[test]
    fn test_chunker_roundtrip() {
        let data: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let mut r = ChunkReassembler::default();
        let mut completed = None;
        for c in chunk(&data, 1024).unwrap() {
            if let Some(out) = r.add(c).unwrap() {
                completed = Some(out);
            }
        }
        assert_eq!(completed, Some(data));
    }
}
