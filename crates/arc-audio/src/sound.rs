use std::io::Cursor;

use crate::{Error, Result};

/// A decoded sound effect: interleaved stereo f32 at the device rate.
///
/// Mono sources are upmixed by duplication and the source rate is
/// converted by linear resampling at load, so the mixer's per-voice pitch
/// of 1.0 always means device-rate playback.
pub struct SoundData {
    samples: Vec<f32>,
    frames: usize,
}

impl SoundData {
    /// Decodes a WAV (8/16/24/32-bit int or 32-bit float PCM, mono or
    /// stereo) and resamples it to `device_rate`.
    pub fn decode_wav(bytes: &[u8], device_rate: u32) -> Result<Self> {
        let mut reader =
            hound::WavReader::new(Cursor::new(bytes)).map_err(|err| Error::Decode(err.to_string()))?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.channels > 2 {
            return Err(Error::Decode(format!(
                "{} channels not supported",
                spec.channels
            )));
        }

        let raw: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|err| Error::Decode(err.to_string()))?,
            (hound::SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
                let scale = 1.0 / f32::from(2_u16).powi(i32::from(bits) - 1);
                let samples: Result<Vec<i32>, _> = reader.samples::<i32>().collect();
                samples
                    .map_err(|err| Error::Decode(err.to_string()))?
                    .into_iter()
                    .map(|sample| sample as f32 * scale)
                    .collect()
            }
            (format, bits) => {
                return Err(Error::Decode(format!(
                    "unsupported sample format {:?}/{}",
                    format, bits
                )))
            }
        };

        // Interleave to stereo.
        let stereo: Vec<f32> = if spec.channels == 1 {
            raw.iter().flat_map(|&sample| [sample, sample]).collect()
        } else {
            raw
        };
        let frames = stereo.len() / 2;

        if spec.sample_rate == device_rate || frames == 0 {
            return Ok(Self {
                samples: stereo,
                frames,
            });
        }

        // Deterministic linear resample to the device rate.
        let ratio = f64::from(spec.sample_rate) / f64::from(device_rate);
        let out_frames = ((frames as f64) / ratio).floor() as usize;
        let mut samples = Vec::with_capacity(out_frames * 2);
        for frame in 0..out_frames {
            let pos = frame as f64 * ratio;
            let base = pos.floor() as usize;
            let frac = (pos - base as f64) as f32;
            let next = (base + 1).min(frames - 1);
            for channel in 0..2 {
                let a = stereo[base * 2 + channel];
                let b = stereo[next * 2 + channel];
                samples.push(a + (b - a) * frac);
            }
        }
        Ok(Self {
            samples,
            frames: out_frames,
        })
    }

    /// Raw constructor for tests and synthesized sounds (interleaved
    /// stereo at device rate).
    pub fn from_stereo_samples(samples: Vec<f32>) -> Self {
        let frames = samples.len() / 2;
        Self { samples, frames }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Sample pair at an integral frame index.
    #[inline]
    pub fn frame(&self, index: usize) -> (f32, f32) {
        let base = index * 2;
        (self.samples[base], self.samples[base + 1])
    }

    pub fn byte_size(&self) -> u64 {
        (self.samples.len() * 4) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(spec: hound::WavSpec, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &sample in samples {
                writer.write_sample(sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn mono_is_upmixed_by_duplication() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, &[i16::MAX, 0, i16::MIN]);
        let sound = SoundData::decode_wav(&bytes, 48_000).unwrap();
        assert_eq!(sound.frames(), 3);
        let (l, r) = sound.frame(0);
        assert_eq!(l, r);
        assert!((l - 1.0).abs() < 1e-3);
    }

    #[test]
    fn resampling_halves_frames_at_double_rate() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 96_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, &[0; 960]);
        let sound = SoundData::decode_wav(&bytes, 48_000).unwrap();
        assert_eq!(sound.frames(), 480);
    }

    #[test]
    fn resampling_is_deterministic() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let samples: Vec<i16> = (0..882).map(|i| (i * 37 % 1000) as i16).collect();
        let bytes = wav_bytes(spec, &samples);
        let a = SoundData::decode_wav(&bytes, 48_000).unwrap();
        let b = SoundData::decode_wav(&bytes, 48_000).unwrap();
        assert_eq!(a.samples, b.samples);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(SoundData::decode_wav(b"not a wav", 48_000).is_err());
    }
}
