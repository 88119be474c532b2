pub mod channel_mix;
pub mod period_buffer;
pub mod pipeline;
pub mod resampler;
pub mod sample_codec;
