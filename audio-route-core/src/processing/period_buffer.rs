use crate::models::error::HardwareError;
use crate::models::format::SampleFormat;
use crate::processing::sample_codec;
use crate::traits::buffer_provider::BufferProvider;
use crate::traits::pcm::PcmHandle;

/// Capture frames read from hardware one period at a time.
///
/// Frames the resampler has not consumed yet stay here between reads and
/// are handed out before the next period is fetched.
#[derive(Debug, Clone)]
pub struct PeriodBuffer {
    samples: Vec<i16>,
    offset: usize,
    channels: usize,
    period_frames: usize,
}

impl PeriodBuffer {
    pub fn new(channels: usize, period_frames: usize) -> Self {
        Self {
            samples: Vec::with_capacity(channels * period_frames),
            offset: 0,
            channels,
            period_frames,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames fetched but not yet consumed.
    pub fn frames_left(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        (self.samples.len() - self.offset) / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.frames_left() == 0
    }

    /// Forget any retained frames.
    pub fn clear(&mut self) {
        self.samples.clear();
        self.offset = 0;
    }

    /// Replace the contents with one period read from `pcm`.
    pub fn refill(&mut self, pcm: &mut dyn PcmHandle, format: SampleFormat) -> Result<(), HardwareError> {
        let mut raw = vec![0u8; self.period_frames * self.channels * format.bytes_per_sample()];
        pcm.read(&mut raw)?;
        self.samples = sample_codec::decode(format, &raw);
        self.offset = 0;
        Ok(())
    }

    /// Borrow up to `max_frames` unconsumed frames.
    pub fn peek(&self, max_frames: usize) -> &[i16] {
        let end = (self.offset + max_frames * self.channels).min(self.samples.len());
        &self.samples[self.offset..end]
    }

    /// Mark `frames` frames as consumed.
    pub fn consume(&mut self, frames: usize) {
        self.offset = (self.offset + frames * self.channels).min(self.samples.len());
    }
}

/// [`BufferProvider`] reading a new hardware period whenever the
/// retained frames run out.
pub struct HardwareProvider<'a> {
    buffer: &'a mut PeriodBuffer,
    pcm: &'a mut dyn PcmHandle,
    format: SampleFormat,
}

impl<'a> HardwareProvider<'a> {
    pub fn new(buffer: &'a mut PeriodBuffer, pcm: &'a mut dyn PcmHandle, format: SampleFormat) -> Self {
        Self { buffer, pcm, format }
    }
}

impl BufferProvider for HardwareProvider<'_> {
    fn channels(&self) -> usize {
        self.buffer.channels()
    }

    fn next_chunk(&mut self, max_frames: usize) -> Result<&[i16], HardwareError> {
        if self.buffer.is_empty() {
            self.buffer.refill(&mut *self.pcm, self.format)?;
            if self.buffer.is_empty() {
                return Err(HardwareError::Underrun);
            }
        }
        Ok(self.buffer.peek(max_frames))
    }

    fn release_chunk(&mut self, frames: usize) {
        self.buffer.consume(frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryPcm;
    use crate::models::format::PcmFormat;
    use crate::traits::pcm::{PcmBackend, PcmConfig, PcmDirection};

    fn capture(pcm: &MemoryPcm, channels: u16, period: u32) -> Box<dyn PcmHandle> {
        pcm.open(&PcmConfig {
            card: 0,
            device: 0,
            direction: PcmDirection::Capture,
            format: PcmFormat::new(8000, channels, SampleFormat::Pcm16),
            period_size: period,
            period_count: 2,
        })
        .unwrap()
    }

    #[test]
    fn peek_and_consume_track_remainder() {
        let pcm = MemoryPcm::new();
        pcm.push_capture_samples(&[1, 2, 3, 4, 5, 6]);
        let mut handle = capture(&pcm, 2, 3);

        let mut buffer = PeriodBuffer::new(2, 3);
        assert!(buffer.is_empty());
        buffer.refill(handle.as_mut(), SampleFormat::Pcm16).unwrap();
        assert_eq!(buffer.frames_left(), 3);
        assert_eq!(buffer.peek(2), &[1, 2, 3, 4]);

        buffer.consume(2);
        assert_eq!(buffer.frames_left(), 1);
        assert_eq!(buffer.peek(5), &[5, 6]);
    }

    #[test]
    fn provider_reads_one_period_when_empty() {
        let pcm = MemoryPcm::new();
        pcm.push_capture_samples(&[10, 20, 30, 40]);
        let mut handle = capture(&pcm, 1, 2);
        let mut buffer = PeriodBuffer::new(1, 2);

        {
            let mut provider = HardwareProvider::new(&mut buffer, handle.as_mut(), SampleFormat::Pcm16);
            assert_eq!(provider.next_chunk(8).unwrap(), &[10, 20]);
            provider.release_chunk(1);
            assert_eq!(provider.next_chunk(8).unwrap(), &[20]);
            provider.release_chunk(1);
            assert_eq!(provider.next_chunk(8).unwrap(), &[30, 40]);
        }
        assert_eq!(pcm.read_sizes(), vec![4, 4]);
        // The unreleased frames survive the provider.
        assert_eq!(buffer.frames_left(), 2);
    }

    #[test]
    fn read_failure_is_reported() {
        let pcm = MemoryPcm::new();
        let mut handle = capture(&pcm, 1, 2);
        pcm.fail_io(Some("xrun"));
        let mut buffer = PeriodBuffer::new(1, 2);
        let mut provider = HardwareProvider::new(&mut buffer, handle.as_mut(), SampleFormat::Pcm16);
        assert!(matches!(provider.next_chunk(1), Err(HardwareError::Read(_))));
    }
}
