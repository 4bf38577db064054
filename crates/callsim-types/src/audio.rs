//! Telephony audio format constants and frame chunking.
//!
//! The media leg carries 8 kHz single-channel μ-law audio in 20 ms frames
//! (160 bytes each). Synthesis providers return audio in arbitrarily sized
//! chunks; [`FrameChunker`] re-slices those chunks into wire frames while
//! carrying any remainder across chunk boundaries.

/// Sample rate of the telephony media leg.
pub const SAMPLE_RATE_HZ: u32 = 8_000;

/// Duration of one wire frame in milliseconds.
pub const FRAME_MILLIS: u64 = 20;

/// Size of one wire frame: 20 ms of μ-law audio at 8 kHz, one byte per sample.
pub const FRAME_BYTES: usize = 160;

/// μ-law encoding of a zero-amplitude sample, used to pad short frames.
pub const MULAW_SILENCE: u8 = 0xFF;

/// Re-slices arbitrarily sized audio chunks into [`FRAME_BYTES`] frames.
///
/// Bytes left over from one `push` are prepended to the next. Call
/// [`FrameChunker::flush`] at end of stream to get the final short frame,
/// if any.
#[derive(Debug, Default)]
pub struct FrameChunker {
    pending: Vec<u8>,
}

impl FrameChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorbs `chunk` and returns every complete frame now available.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::with_capacity(self.pending.len() / FRAME_BYTES);
        let whole = (self.pending.len() / FRAME_BYTES) * FRAME_BYTES;
        for frame in self.pending[..whole].chunks(FRAME_BYTES) {
            frames.push(frame.to_vec());
        }
        self.pending.drain(..whole);
        frames
    }

    /// Returns the trailing partial frame, if any bytes remain buffered.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunker_emits_whole_frames() {
        let mut chunker = FrameChunker::new();
        let frames = chunker.push(&[0u8; FRAME_BYTES * 3]);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == FRAME_BYTES));
        assert!(chunker.flush().is_none());
    }

    #[test]
    fn chunker_carries_remainder_across_pushes() {
        let mut chunker = FrameChunker::new();
        assert!(chunker.push(&[1u8; 100]).is_empty());

        // 100 buffered + 100 new = one frame plus 40 bytes pending.
        let frames = chunker.push(&[2u8; 100]);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..100], &[1u8; 100][..]);
        assert_eq!(&frames[0][100..], &[2u8; 60][..]);

        let tail = chunker.flush().unwrap();
        assert_eq!(tail, vec![2u8; 40]);
        assert!(chunker.flush().is_none());
    }

    #[test]
    fn frame_constants_describe_twenty_millis_of_audio() {
        let bytes_per_ms = SAMPLE_RATE_HZ as u64 / 1_000;
        assert_eq!(FRAME_BYTES as u64, bytes_per_ms * FRAME_MILLIS);
    }
}
