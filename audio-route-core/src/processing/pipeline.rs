use crate::models::error::{HardwareError, RouteError};
use crate::models::format::PcmFormat;
use crate::processing::channel_mix;
use crate::processing::period_buffer::{HardwareProvider, PeriodBuffer};
use crate::processing::resampler::{resample_batch, StreamingResampler};
use crate::processing::sample_codec;
use crate::traits::pcm::PcmHandle;

/// Round a frame count up to the next multiple of 16.
pub fn round_up16(frames: usize) -> usize {
    frames.div_ceil(16) * 16
}

/// Client-side frames matching one hardware period, rounded up to 16.
pub fn buffer_frames(period_size: u32, client_rate: u32, hw_rate: u32) -> usize {
    if hw_rate == 0 {
        return 0;
    }
    round_up16((period_size as u64 * client_rate as u64 / hw_rate as u64) as usize)
}

fn frames_in(bytes: usize, format: &PcmFormat) -> Result<usize, RouteError> {
    let frame_size = format.frame_size();
    if frame_size == 0 || bytes % frame_size != 0 {
        return Err(RouteError::InvalidArgument(format!(
            "{} bytes is not a whole number of {}-byte frames",
            bytes, frame_size
        )));
    }
    Ok(bytes / frame_size)
}

/// Playback conversion from client format to hardware format.
#[derive(Debug, Clone)]
pub struct OutputPipeline {
    client: PcmFormat,
    hw: PcmFormat,
    downmix: usize,
}

impl OutputPipeline {
    /// Fails when the hardware has more channels than the client
    /// supplies, or the channel counts are not a whole ratio apart.
    pub fn new(client: PcmFormat, hw: PcmFormat) -> Result<Self, RouteError> {
        let downmix = channel_mix::downmix_ratio(client.channels, hw.channels)?;
        Ok(Self { client, hw, downmix })
    }

    pub fn client(&self) -> &PcmFormat {
        &self.client
    }

    pub fn hardware(&self) -> &PcmFormat {
        &self.hw
    }

    pub fn resamples(&self) -> bool {
        self.client.sample_rate != self.hw.sample_rate
    }

    /// Hardware frames written for `client_frames` client frames.
    pub fn hw_frames_for(&self, client_frames: usize) -> usize {
        if !self.resamples() {
            return client_frames;
        }
        round_up16((client_frames as u64 * self.hw.sample_rate as u64 / self.client.sample_rate as u64) as usize)
    }

    /// Convert a client buffer into bytes ready for the hardware.
    pub fn process(&self, bytes: &[u8]) -> Result<Vec<u8>, RouteError> {
        let frames = frames_in(bytes.len(), &self.client)?;
        if self.client == self.hw {
            return Ok(bytes.to_vec());
        }

        let mut samples = sample_codec::decode(self.client.format, bytes);
        if self.resamples() {
            samples = resample_batch(&samples, self.client.channels as usize, self.hw_frames_for(frames));
        }
        let samples = channel_mix::downmix(&samples, self.downmix);
        Ok(sample_codec::encode(self.hw.format, &samples))
    }
}

/// Capture conversion from hardware format to client format.
///
/// Owns the frames pulled from hardware but not yet consumed by the
/// resampler.
#[derive(Debug, Clone)]
pub struct InputPipeline {
    client: PcmFormat,
    hw: PcmFormat,
    downmix: usize,
    resampler: Option<StreamingResampler>,
    buffer: PeriodBuffer,
}

impl InputPipeline {
    /// Fails when the client asks for more channels than the hardware
    /// captures, or the channel counts are not a whole ratio apart.
    pub fn new(client: PcmFormat, hw: PcmFormat, period_frames: usize) -> Result<Self, RouteError> {
        let downmix = channel_mix::downmix_ratio(hw.channels, client.channels)?;
        let resampler = if client.sample_rate != hw.sample_rate {
            Some(StreamingResampler::new(
                hw.sample_rate,
                client.sample_rate,
                hw.channels as usize,
            )?)
        } else {
            None
        };
        Ok(Self {
            client,
            hw,
            downmix,
            resampler,
            buffer: PeriodBuffer::new(hw.channels as usize, period_frames),
        })
    }

    pub fn client(&self) -> &PcmFormat {
        &self.client
    }

    pub fn hardware(&self) -> &PcmFormat {
        &self.hw
    }

    pub fn resamples(&self) -> bool {
        self.resampler.is_some()
    }

    /// Drop retained frames and resampler phase. Called when the
    /// hardware handle is reopened.
    pub fn reset(&mut self) {
        self.buffer.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    /// Read `bytes` bytes of client-format audio from `pcm`.
    pub fn read(&mut self, pcm: &mut dyn PcmHandle, bytes: usize) -> Result<Vec<u8>, RouteError> {
        let frames = frames_in(bytes, &self.client)?;
        let hw_channels = self.hw.channels as usize;

        let samples = match self.resampler.as_mut() {
            Some(resampler) => {
                let mut samples = vec![0i16; frames * hw_channels];
                let mut produced = 0;
                while produced < frames {
                    let mut provider = HardwareProvider::new(&mut self.buffer, &mut *pcm, self.hw.format);
                    let got = resampler.resample(&mut provider, &mut samples[produced * hw_channels..])?;
                    if got == 0 {
                        return Err(HardwareError::Underrun.into());
                    }
                    produced += got;
                }
                samples
            }
            None => {
                let mut raw = vec![0u8; frames * self.hw.frame_size()];
                pcm.read(&mut raw)?;
                if self.client == self.hw {
                    return Ok(raw);
                }
                sample_codec::decode(self.hw.format, &raw)
            }
        };

        let samples = channel_mix::downmix(&samples, self.downmix);
        Ok(sample_codec::encode(self.client.format, &samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryPcm;
    use crate::models::format::SampleFormat;
    use crate::traits::pcm::{PcmBackend, PcmConfig, PcmDirection};

    fn fmt(rate: u32, channels: u16) -> PcmFormat {
        PcmFormat::new(rate, channels, SampleFormat::Pcm16)
    }

    fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
        sample_codec::encode(SampleFormat::Pcm16, samples)
    }

    fn capture_handle(pcm: &MemoryPcm, hw: PcmFormat, period: u32) -> Box<dyn PcmHandle> {
        pcm.open(&PcmConfig {
            card: 0,
            device: 0,
            direction: PcmDirection::Capture,
            format: hw,
            period_size: period,
            period_count: 2,
        })
        .unwrap()
    }

    #[test]
    fn round_up_to_sixteen() {
        assert_eq!(round_up16(17), 32);
        assert_eq!(round_up16(16), 16);
        assert_eq!(round_up16(0), 0);
    }

    #[test]
    fn buffer_frames_scale_with_rate_ratio() {
        assert_eq!(buffer_frames(512, 88200, 44100), ((512 * 2 + 15) / 16) * 16);
        assert_eq!(buffer_frames(1024, 44100, 44100), 1024);
    }

    #[test]
    fn output_resampling_rounds_hardware_frames() {
        let pipeline = OutputPipeline::new(fmt(48000, 2), fmt(44100, 2)).unwrap();
        assert!(pipeline.resamples());
        assert_eq!(pipeline.hw_frames_for(1024), 944);

        let out = pipeline.process(&vec![0u8; 1024 * 4]).unwrap();
        assert_eq!(out.len(), 944 * 4);
    }

    #[test]
    fn output_downmixes_stereo_to_mono() {
        let pipeline = OutputPipeline::new(fmt(44100, 2), fmt(44100, 1)).unwrap();
        let out = pipeline.process(&samples_to_bytes(&[100, 300, -10, 10])).unwrap();
        assert_eq!(out, samples_to_bytes(&[200, 0]));
    }

    #[test]
    fn output_rejects_more_hardware_channels() {
        assert!(OutputPipeline::new(fmt(44100, 1), fmt(44100, 2)).is_err());
        assert!(OutputPipeline::new(fmt(44100, 6), fmt(44100, 4)).is_err());
    }

    #[test]
    fn output_rejects_partial_frames() {
        let pipeline = OutputPipeline::new(fmt(44100, 2), fmt(44100, 2)).unwrap();
        assert!(matches!(pipeline.process(&[0u8; 6]), Err(RouteError::InvalidArgument(_))));
    }

    #[test]
    fn output_converts_sample_format() {
        let client = PcmFormat::new(44100, 1, SampleFormat::Pcm8);
        let pipeline = OutputPipeline::new(client, fmt(44100, 1)).unwrap();
        assert_eq!(pipeline.process(&[128, 0]).unwrap(), samples_to_bytes(&[0, i16::MIN]));
    }

    #[test]
    fn input_without_resampler_reads_directly() {
        let pcm = MemoryPcm::new();
        pcm.push_capture_samples(&[100, 300, 50, 150]);
        let hw = fmt(16000, 2);
        let mut handle = capture_handle(&pcm, hw, 256);

        let mut pipeline = InputPipeline::new(fmt(16000, 1), hw, 256).unwrap();
        assert!(!pipeline.resamples());
        let out = pipeline.read(handle.as_mut(), 4).unwrap();
        assert_eq!(out, samples_to_bytes(&[200, 100]));
        assert_eq!(pcm.read_sizes(), vec![8]);
    }

    #[test]
    fn input_resampling_loops_until_request_is_filled() {
        let pcm = MemoryPcm::new();
        let ramp: Vec<i16> = (0..64).map(|i| i * 100).collect();
        pcm.push_capture_samples(&ramp);
        let hw = fmt(8000, 1);
        let mut handle = capture_handle(&pcm, hw, 4);

        let mut pipeline = InputPipeline::new(fmt(16000, 1), hw, 4).unwrap();
        assert!(pipeline.resamples());
        let out = pipeline.read(handle.as_mut(), 10 * 2).unwrap();
        let samples = sample_codec::decode(SampleFormat::Pcm16, &out);
        assert_eq!(samples, vec![0, 50, 100, 150, 200, 250, 300, 350, 400, 450]);
        // Every hardware read is one whole period.
        assert!(pcm.read_sizes().iter().all(|&size| size == 8));
    }

    #[test]
    fn input_rejects_more_client_channels() {
        assert!(InputPipeline::new(fmt(8000, 2), fmt(8000, 1), 256).is_err());
    }
}
