//! Linear-interpolation sample rate conversion on interleaved 16-bit audio.
//!
//! Two shapes are provided:
//! - [`resample_batch`] converts a whole buffer to an exact output frame
//!   count (playback path).
//! - [`StreamingResampler`] pulls input through a [`BufferProvider`] and
//!   keeps its phase across calls (capture path).

use crate::models::error::{HardwareError, RouteError};
use crate::traits::buffer_provider::BufferProvider;

/// Resample `input` (interleaved, `channels` wide) to exactly `out_frames`.
///
/// Output frame `i` sits at input position `i * in_frames / out_frames`
/// and is interpolated between its two neighbouring input frames. Past
/// the last input frame, the last frame is held.
pub fn resample_batch(input: &[i16], channels: usize, out_frames: usize) -> Vec<i16> {
    let in_frames = if channels == 0 { 0 } else { input.len() / channels };
    if in_frames == 0 || out_frames == 0 {
        return vec![0; out_frames * channels];
    }

    let mut output = Vec::with_capacity(out_frames * channels);
    for i in 0..out_frames {
        let position = (i * in_frames) as u64;
        let index = (position / out_frames as u64) as usize;
        let frac = (position % out_frames as u64) as i64;
        let next = (index + 1).min(in_frames - 1);

        for ch in 0..channels {
            let a = input[index * channels + ch] as i64;
            let b = input[next * channels + ch] as i64;
            output.push((a + (b - a) * frac / out_frames as i64) as i16);
        }
    }
    output
}

/// Stateful linear resampler fed by a [`BufferProvider`].
///
/// Holds the two input frames surrounding the current output position
/// and the fractional phase between them, so consecutive calls produce
/// one continuous signal.
#[derive(Debug, Clone)]
pub struct StreamingResampler {
    in_rate: u32,
    out_rate: u32,
    channels: usize,
    /// Position between `prev` and `next` in units of `1 / out_rate`.
    phase: u64,
    prev: Vec<i16>,
    next: Vec<i16>,
    primed: bool,
}

impl StreamingResampler {
    pub fn new(in_rate: u32, out_rate: u32, channels: usize) -> Result<Self, RouteError> {
        if in_rate == 0 || out_rate == 0 {
            return Err(RouteError::InvalidArgument("sample rate must be positive".into()));
        }
        if channels == 0 {
            return Err(RouteError::InvalidArgument("channel count must be positive".into()));
        }
        Ok(Self {
            in_rate,
            out_rate,
            channels,
            phase: 0,
            prev: vec![0; channels],
            next: vec![0; channels],
            primed: false,
        })
    }

    pub fn in_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn out_rate(&self) -> u32 {
        self.out_rate
    }

    /// Drop the retained frames and phase.
    pub fn reset(&mut self) {
        self.phase = 0;
        self.prev.iter_mut().for_each(|s| *s = 0);
        self.next.iter_mut().for_each(|s| *s = 0);
        self.primed = false;
    }

    fn pull_frame(
        provider: &mut dyn BufferProvider,
        channels: usize,
        dst: &mut [i16],
    ) -> Result<bool, HardwareError> {
        let chunk = provider.next_chunk(1)?;
        if chunk.len() < channels {
            return Ok(false);
        }
        dst.copy_from_slice(&chunk[..channels]);
        provider.release_chunk(1);
        Ok(true)
    }

    /// Produce up to `output.len() / channels` frames into `output`.
    ///
    /// Returns the number of frames written, fewer than asked for when
    /// the provider runs dry.
    pub fn resample(&mut self, provider: &mut dyn BufferProvider, output: &mut [i16]) -> Result<usize, RouteError> {
        if provider.channels() != self.channels {
            return Err(RouteError::InvalidArgument(format!(
                "provider has {} channels, resampler expects {}",
                provider.channels(),
                self.channels
            )));
        }

        let channels = self.channels;
        if !self.primed {
            if !Self::pull_frame(provider, channels, &mut self.prev)? {
                return Ok(0);
            }
            if !Self::pull_frame(provider, channels, &mut self.next)? {
                self.next.copy_from_slice(&self.prev);
            }
            self.primed = true;
        }

        let out_rate = self.out_rate as u64;
        let mut produced = 0;
        for frame in output.chunks_exact_mut(channels) {
            while self.phase >= out_rate {
                self.phase -= out_rate;
                std::mem::swap(&mut self.prev, &mut self.next);
                if !Self::pull_frame(provider, channels, &mut self.next)? {
                    // Undo the step so the next call resumes at the same spot.
                    std::mem::swap(&mut self.prev, &mut self.next);
                    self.phase += out_rate;
                    return Ok(produced);
                }
            }

            let frac = self.phase as i64;
            for (ch, sample) in frame.iter_mut().enumerate() {
                let a = self.prev[ch] as i64;
                let b = self.next[ch] as i64;
                *sample = (a + (b - a) * frac / out_rate as i64) as i16;
            }
            self.phase += self.in_rate as u64;
            produced += 1;
        }
        Ok(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Provider over a fixed sample vector.
    struct VecProvider {
        samples: Vec<i16>,
        channels: usize,
        offset: usize,
    }

    impl VecProvider {
        fn new(samples: Vec<i16>, channels: usize) -> Self {
            Self {
                samples,
                channels,
                offset: 0,
            }
        }
    }

    impl BufferProvider for VecProvider {
        fn channels(&self) -> usize {
            self.channels
        }

        fn next_chunk(&mut self, max_frames: usize) -> Result<&[i16], HardwareError> {
            let end = (self.offset + max_frames * self.channels).min(self.samples.len());
            Ok(&self.samples[self.offset..end])
        }

        fn release_chunk(&mut self, frames: usize) {
            self.offset += frames * self.channels;
        }
    }

    #[test]
    fn batch_produces_exact_frame_count() {
        let input: Vec<i16> = (0..17).collect();
        let output = resample_batch(&input, 1, 32);
        assert_eq!(output.len(), 32);
        assert_eq!(output[0], 0);
    }

    #[test]
    fn batch_interpolates_between_frames() {
        let output = resample_batch(&[0, 100], 1, 4);
        assert_eq!(output, vec![0, 50, 100, 100]);
    }

    #[test]
    fn batch_keeps_channels_separate() {
        let output = resample_batch(&[0, 1000, 100, 1000], 2, 4);
        assert_eq!(output, vec![0, 1000, 50, 1000, 100, 1000, 100, 1000]);
    }

    #[test]
    fn batch_same_count_is_identity() {
        let input = vec![5, -5, 7, -7];
        assert_eq!(resample_batch(&input, 2, 2), input);
    }

    #[test]
    fn streaming_upsample_by_two_interpolates() {
        let mut provider = VecProvider::new(vec![0, 100, 200, 300], 1);
        let mut resampler = StreamingResampler::new(1, 2, 1).unwrap();
        let mut output = [0i16; 6];

        let produced = resampler.resample(&mut provider, &mut output).unwrap();
        assert_eq!(produced, 6);
        assert_eq!(output, [0, 50, 100, 150, 200, 250]);
    }

    #[test]
    fn streaming_keeps_phase_across_calls() {
        let samples: Vec<i16> = (0..64).map(|i| i * 10).collect();
        let mut whole = VecProvider::new(samples.clone(), 1);
        let mut split = VecProvider::new(samples, 1);

        let mut a = StreamingResampler::new(3, 2, 1).unwrap();
        let mut expected = [0i16; 20];
        a.resample(&mut whole, &mut expected).unwrap();

        let mut b = StreamingResampler::new(3, 2, 1).unwrap();
        let mut first = [0i16; 7];
        let mut second = [0i16; 13];
        assert_eq!(b.resample(&mut split, &mut first).unwrap(), 7);
        assert_eq!(b.resample(&mut split, &mut second).unwrap(), 13);

        assert_eq!(&expected[..7], &first[..]);
        assert_eq!(&expected[7..], &second[..]);
    }

    #[test]
    fn streaming_stops_when_provider_runs_dry() {
        let mut provider = VecProvider::new(vec![0, 10, 20], 1);
        let mut resampler = StreamingResampler::new(2, 1, 1).unwrap();
        let mut output = [0i16; 8];
        // The second output frame needs the frame after 20, which never comes.
        assert_eq!(resampler.resample(&mut provider, &mut output).unwrap(), 1);
        assert_eq!(output[0], 0);

        let mut more = VecProvider::new(vec![30, 40, 50], 1);
        assert_eq!(resampler.resample(&mut more, &mut output[..2]).unwrap(), 2);
        assert_eq!(&output[..2], &[20, 40]);
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(StreamingResampler::new(0, 44100, 2).is_err());
    }
}
