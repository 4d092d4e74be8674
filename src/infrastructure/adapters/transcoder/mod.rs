//! Transcoder Adapter - 音频容器封装

mod wav_encoder;

pub use wav_encoder::{encode_pcm16_wav, PcmFormat};
