use serde::{Deserialize, Serialize};

pub const SAMPLE_RATE: u32 = 16_000;

/// Inline audio sent over REST is wrapped in a RIFF/WAVE container.
pub const WAV_MIME: &str = "audio/wav";

const WAV_HEADER_LEN: usize = 44;

/// Mono little-endian 16-bit PCM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunk {
    pub sample_rate: u32,
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn pcm16(data: Vec<u8>) -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            data,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        let samples = (self.data.len() / 2) as u64;
        samples * 1000 / u64::from(self.sample_rate.max(1))
    }

    /// Mono 16-bit PCM prefixed with a canonical 44-byte WAV header.
    pub fn to_wav(&self) -> Vec<u8> {
        let data_len = self.data.len() as u32;
        let byte_rate = self.sample_rate * 2;
        let mut out = Vec::with_capacity(WAV_HEADER_LEN + self.data.len());
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

pub fn pcm16_from_f32(samples: &[f32]) -> AudioChunk {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * f32::from(i16::MAX)) as i16;
        data.extend_from_slice(&value.to_le_bytes());
    }
    AudioChunk::pcm16(data)
}
