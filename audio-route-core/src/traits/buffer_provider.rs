use crate::models::error::HardwareError;

/// Pull interface a resampler uses to fetch hardware frames.
///
/// The resampler borrows a chunk with [`next_chunk`](Self::next_chunk),
/// copies what it needs, then reports the consumed frame count with
/// [`release_chunk`](Self::release_chunk). Frames that were fetched but
/// not released stay available for the next call.
pub trait BufferProvider {
    /// Interleaved channel count of the chunks.
    fn channels(&self) -> usize;

    /// Borrow up to `max_frames` interleaved frames. An empty slice
    /// means the source has nothing to give.
    fn next_chunk(&mut self, max_frames: usize) -> Result<&[i16], HardwareError>;

    /// Mark `frames` frames of the last chunk as consumed.
    fn release_chunk(&mut self, frames: usize);
}
