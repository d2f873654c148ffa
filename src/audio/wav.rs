//! WAV file audio source for offline replay.

use crate::audio::recorder::AudioSource;
use crate::defaults;
use crate::error::{Result, WakegateError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Audio source that replays a 16-bit mono WAV file in fixed-size deliveries.
///
/// The file must already match the engine sample rate; no resampling is done.
pub struct WavAudioSource {
    samples: Vec<i16>,
    position: usize,
    chunk_size: usize,
    sample_rate: u32,
}

impl WavAudioSource {
    /// Parse WAV data from any reader, requiring `expected_rate`.
    ///
    /// # Errors
    /// `AudioFormatMismatch` if the file is not mono 16-bit integer PCM at the
    /// expected rate, `AudioCapture` if the data cannot be decoded.
    pub fn from_reader(reader: Box<dyn Read + Send>, expected_rate: u32) -> Result<Self> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| WakegateError::AudioCapture {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();
        if spec.sample_rate != expected_rate {
            return Err(WakegateError::AudioFormatMismatch {
                expected: format!("{} Hz", expected_rate),
                actual: format!("{} Hz", spec.sample_rate),
            });
        }
        if spec.channels != 1 {
            return Err(WakegateError::AudioFormatMismatch {
                expected: "1 channel".to_string(),
                actual: format!("{} channels", spec.channels),
            });
        }
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(WakegateError::AudioFormatMismatch {
                expected: "16-bit signed PCM".to_string(),
                actual: format!("{}-bit {:?}", spec.bits_per_sample, spec.sample_format),
            });
        }

        let samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| WakegateError::AudioCapture {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        Ok(Self {
            samples,
            position: 0,
            chunk_size: defaults::FILE_CHUNK_SAMPLES,
            sample_rate: expected_rate,
        })
    }

    /// Open a WAV file from disk.
    pub fn open(path: &Path, expected_rate: u32) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(Box::new(BufReader::new(file)), expected_rate)
    }

    /// Set the number of samples handed out per read.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Duration of the whole file in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / self.sample_rate.max(1) as u64
    }

    /// Consume the source and return all samples as a single buffer.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

/// Write 16-bit mono samples to a WAV file at `path`.
///
/// # Errors
/// `AudioCapture` if the file cannot be created or written.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let failed = |e: hound::Error| WakegateError::AudioCapture {
        message: format!("Failed to write {}: {}", path.display(), e),
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(failed)?;
    for &sample in samples {
        writer.write_sample(sample).map_err(failed)?;
    }
    writer.finalize().map_err(failed)
}

impl AudioSource for WavAudioSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.position >= self.samples.len() {
            return Ok(Vec::new());
        }

        let end = std::cmp::min(self.position + self.chunk_size, self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;

        Ok(chunk)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_finite(&self) -> bool {
        true
    }
}

#[cfg(test)]
pub(crate) fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn from_reader_16khz_mono_matches_exactly() {
        let input_samples = vec![100i16, 200, 300, 400, 500];
        let wav_data = make_wav_data(16000, 1, &input_samples);

        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data)), 16000).unwrap();

        assert_eq!(source.samples, input_samples);
        assert_eq!(source.position, 0);
        assert_eq!(source.chunk_size, defaults::FILE_CHUNK_SAMPLES);
    }

    #[test]
    fn from_reader_rejects_wrong_sample_rate() {
        let wav_data = make_wav_data(44100, 1, &[0i16; 100]);

        let result = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data)), 16000);

        match result {
            Err(WakegateError::AudioFormatMismatch { expected, actual }) => {
                assert_eq!(expected, "16000 Hz");
                assert_eq!(actual, "44100 Hz");
            }
            _ => panic!("Expected AudioFormatMismatch"),
        }
    }

    #[test]
    fn from_reader_rejects_stereo() {
        let wav_data = make_wav_data(16000, 2, &[0i16; 100]);

        let result = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data)), 16000);
        assert!(matches!(
            result,
            Err(WakegateError::AudioFormatMismatch { .. })
        ));
    }

    #[test]
    fn from_reader_rejects_garbage() {
        let result =
            WavAudioSource::from_reader(Box::new(Cursor::new(b"not a wav".to_vec())), 16000);
        assert!(matches!(result, Err(WakegateError::AudioCapture { .. })));
    }

    #[test]
    fn read_samples_returns_chunks_of_configured_size() {
        let wav_data = make_wav_data(16000, 1, &[1i16; 2500]);

        let mut source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data)), 16000)
            .unwrap()
            .with_chunk_size(1000);

        assert_eq!(source.read_samples().unwrap().len(), 1000);
        assert_eq!(source.read_samples().unwrap().len(), 1000);
        assert_eq!(source.read_samples().unwrap().len(), 500);
        assert!(source.read_samples().unwrap().is_empty());
        assert!(source.is_finite());
    }

    #[test]
    fn duration_is_derived_from_sample_count() {
        let wav_data = make_wav_data(16000, 1, &[0i16; 8000]);
        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav_data)), 16000).unwrap();
        assert_eq!(source.duration_ms(), 500);
    }

    #[test]
    fn write_wav_produces_a_replayable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.wav");
        let samples: Vec<i16> = (0..1200).map(|i| (i * 7 - 4000) as i16).collect();

        write_wav(&path, &samples, 16000).unwrap();

        let source = WavAudioSource::open(&path, 16000).unwrap();
        assert_eq!(source.into_samples(), samples);
    }

    #[test]
    fn write_wav_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("capture.wav");
        assert!(matches!(
            write_wav(&path, &[0i16; 10], 16000),
            Err(WakegateError::AudioCapture { .. })
        ));
    }
}
