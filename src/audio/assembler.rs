//! Fixed-length frame assembly.
//!
//! Audio arrives in bursts whose size is decided by whoever delivers it: a
//! driver with its own buffer size, a microphone callback, or a bulk file read.
//! The engines only accept frames of exactly `frame_length` samples. The
//! assembler sits between the two and re-slices the stream without dropping,
//! duplicating or reordering samples.

use crate::error::{Result, WakegateError};

/// Re-slices an arbitrary chunked sample stream into fixed-length frames.
///
/// Holds at most one partial frame. Once configured it never fails on its own;
/// the only errors `ingest` returns come from the frame consumer.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<i16>,
    filled: usize,
    frames_emitted: u64,
}

impl FrameAssembler {
    /// Allocates the frame buffer.
    ///
    /// # Errors
    /// `InvalidArgument` if `frame_length` is zero, `OutOfMemory` if the buffer
    /// cannot be allocated.
    pub fn new(frame_length: usize) -> Result<Self> {
        if frame_length == 0 {
            return Err(WakegateError::invalid_argument(
                "frame length must be greater than zero",
            ));
        }

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(frame_length)
            .map_err(|e| WakegateError::OutOfMemory {
                message: format!("frame buffer of {} samples: {}", frame_length, e),
            })?;
        buffer.resize(frame_length, 0);

        Ok(Self {
            buffer,
            filled: 0,
            frames_emitted: 0,
        })
    }

    /// Appends `samples` and hands every completed frame to `consumer`.
    ///
    /// The input may be shorter than, equal to, or longer than the free space.
    /// Completed frames are delivered synchronously in stream order, and the
    /// cursor is reset before the consumer runs, so a frame is never
    /// delivered twice.
    ///
    /// Returns the number of frames emitted by this call.
    ///
    /// # Errors
    /// Stops at the first consumer error and returns it. Samples following the
    /// failing frame in this call are not retained.
    pub fn ingest<F>(&mut self, samples: &[i16], mut consumer: F) -> Result<usize>
    where
        F: FnMut(&[i16]) -> Result<()>,
    {
        let frame_length = self.buffer.len();
        let mut remaining = samples;
        let mut emitted = 0;

        while !remaining.is_empty() {
            let take = (frame_length - self.filled).min(remaining.len());
            let (head, tail) = remaining.split_at(take);
            self.buffer[self.filled..self.filled + take].copy_from_slice(head);
            self.filled += take;
            remaining = tail;

            if self.filled == frame_length {
                self.filled = 0;
                self.frames_emitted += 1;
                emitted += 1;
                consumer(&self.buffer)?;
            }
        }

        Ok(emitted)
    }

    /// Discards any partial frame.
    pub fn reset(&mut self) {
        self.filled = 0;
    }

    pub fn frame_length(&self) -> usize {
        self.buffer.len()
    }

    /// Samples waiting for the current frame to complete.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Total frames handed to consumers since construction.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<i16> {
        (0..len).map(|i| (i % 30000) as i16).collect()
    }

    /// Feeds `stream` in the given chunk sizes and collects every frame.
    fn assemble(frame_length: usize, stream: &[i16], chunk_sizes: &[usize]) -> Vec<Vec<i16>> {
        let mut assembler = FrameAssembler::new(frame_length).unwrap();
        let mut frames = Vec::new();
        let mut offset = 0;
        for &size in chunk_sizes {
            let end = (offset + size).min(stream.len());
            assembler
                .ingest(&stream[offset..end], |frame| {
                    frames.push(frame.to_vec());
                    Ok(())
                })
                .unwrap();
            offset = end;
        }
        assert_eq!(offset, stream.len(), "chunk sizes must cover the stream");
        frames
    }

    fn reference_frames(frame_length: usize, stream: &[i16]) -> Vec<Vec<i16>> {
        stream
            .chunks_exact(frame_length)
            .map(|c| c.to_vec())
            .collect()
    }

    #[test]
    fn test_zero_frame_length_is_rejected() {
        let result = FrameAssembler::new(0);
        assert!(matches!(
            result,
            Err(WakegateError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_new_assembler_is_empty() {
        let assembler = FrameAssembler::new(512).unwrap();
        assert_eq!(assembler.frame_length(), 512);
        assert_eq!(assembler.filled(), 0);
        assert_eq!(assembler.frames_emitted(), 0);
    }

    #[test]
    fn test_exact_frame_chunks() {
        let stream = ramp(512 * 4);
        let frames = assemble(512, &stream, &[512, 512, 512, 512]);
        assert_eq!(frames, reference_frames(512, &stream));
    }

    #[test]
    fn test_small_chunks_accumulate() {
        let stream = ramp(160 * 16);
        let chunks = vec![160; 16];
        let frames = assemble(512, &stream, &chunks);
        // 2560 samples -> 5 frames, nothing left over
        assert_eq!(frames.len(), 5);
        assert_eq!(frames, reference_frames(512, &stream));
    }

    #[test]
    fn test_single_large_chunk_emits_many_frames() {
        let stream = ramp(512 * 7);
        let frames = assemble(512, &stream, &[stream.len()]);
        assert_eq!(frames.len(), 7);
        assert_eq!(frames, reference_frames(512, &stream));
    }

    #[test]
    fn test_irregular_chunking_matches_reference() {
        let frame_length = 480;
        let stream = ramp(frame_length * 9);

        // Deterministic pseudo-random chunk sizes in 1..=1500
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut chunk_sizes = Vec::new();
        let mut total = 0;
        while total < stream.len() {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let size = ((state >> 33) as usize % 1500 + 1).min(stream.len() - total);
            chunk_sizes.push(size);
            total += size;
        }

        let frames = assemble(frame_length, &stream, &chunk_sizes);
        assert_eq!(frames.len(), 9);
        assert_eq!(frames, reference_frames(frame_length, &stream));
    }

    #[test]
    fn test_partial_frame_is_held_back() {
        let mut assembler = FrameAssembler::new(4).unwrap();
        let mut frames = Vec::new();

        let emitted = assembler
            .ingest(&[1, 2, 3], |f| {
                frames.push(f.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(emitted, 0);
        assert!(frames.is_empty());
        assert_eq!(assembler.filled(), 3);

        let emitted = assembler
            .ingest(&[4, 5, 6, 7, 8, 9], |f| {
                frames.push(f.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(emitted, 2);
        assert_eq!(frames, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);
        assert_eq!(assembler.filled(), 1);
        assert_eq!(assembler.frames_emitted(), 2);
    }

    #[test]
    fn test_every_frame_is_full_length() {
        let stream = ramp(1000);
        let frames = assemble(7, &stream, &[3, 11, 1, 400, 585]);
        assert!(frames.iter().all(|f| f.len() == 7));
        assert_eq!(frames.len(), 1000 / 7);
    }

    #[test]
    fn test_empty_ingest_is_noop() {
        let mut assembler = FrameAssembler::new(8).unwrap();
        let emitted = assembler
            .ingest(&[], |_| panic!("consumer must not run"))
            .unwrap();
        assert_eq!(emitted, 0);
        assert_eq!(assembler.filled(), 0);
    }

    #[test]
    fn test_consumer_error_propagates() {
        let mut assembler = FrameAssembler::new(2).unwrap();
        let mut calls = 0;
        let result = assembler.ingest(&[1, 2, 3, 4, 5, 6], |_| {
            calls += 1;
            if calls == 2 {
                Err(WakegateError::invalid_state("engine gave up"))
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(WakegateError::InvalidState { .. })));
        assert_eq!(calls, 2, "ingest must stop at the failing frame");
        assert_eq!(assembler.filled(), 0);
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let mut assembler = FrameAssembler::new(4).unwrap();
        assembler.ingest(&[1, 2], |_| Ok(())).unwrap();
        assembler.reset();
        assert_eq!(assembler.filled(), 0);

        let mut frames = Vec::new();
        assembler
            .ingest(&[10, 11, 12, 13], |f| {
                frames.push(f.to_vec());
                Ok(())
            })
            .unwrap();
        assert_eq!(frames, vec![vec![10, 11, 12, 13]]);
    }
}
