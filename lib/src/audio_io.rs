//! Audio loading and saving for the phase scrambler
//!
//! Decoding goes through Symphonia (any format it can probe), writing
//! produces 32-bit float WAV through hound. Channel data is channel-major:
//! one `Vec<f64>` per channel.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::{Result, ScrambleError};

/// Audio metadata carried alongside the samples
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub duration_samples: usize,
    pub duration_seconds: f64,
}

impl AudioInfo {
    pub fn new(sample_rate: u32, channels: usize, duration_samples: usize) -> Self {
        let duration_seconds = duration_samples as f64 / sample_rate as f64;
        Self {
            sample_rate,
            channels,
            duration_samples,
            duration_seconds,
        }
    }
}

fn decode_stream(mss: MediaSourceStream, hint: &Hint) -> Result<(AudioInfo, Vec<Vec<f64>>)> {
    let probed = symphonia::default::get_probe().format(
        hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| ScrambleError::Audio("no default track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| ScrambleError::Audio("sample rate not specified".to_string()))?;
    let channels = codec_params
        .channels
        .ok_or_else(|| ScrambleError::Audio("channel layout not specified".to_string()))?
        .count();

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut channel_data: Vec<Vec<f64>> = vec![Vec::new(); channels];
    let mut sample_buf: Option<SampleBuffer<f64>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f64>::new(decoded.capacity() as u64, *decoded.spec())
        });
        buf.copy_interleaved_ref(decoded);

        for frame in buf.samples().chunks(channels) {
            for (channel, &sample) in channel_data.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
    }

    let duration_samples = channel_data.first().map_or(0, |c| c.len());
    log::info!(
        "Decoded {} channel(s), {} Hz, {} samples",
        channels,
        sample_rate,
        duration_samples
    );

    Ok((
        AudioInfo::new(sample_rate, channels, duration_samples),
        channel_data,
    ))
}

/// Decode an audio file from disk
pub fn read_audio_file<P: AsRef<Path>>(path: P) -> Result<(AudioInfo, Vec<Vec<f64>>)> {
    let path = path.as_ref();
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    decode_stream(mss, &hint)
}

/// Decode audio held in memory
pub fn read_audio_bytes(data: Vec<u8>) -> Result<(AudioInfo, Vec<Vec<f64>>)> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
    decode_stream(mss, &Hint::new())
}

fn write_wav<W: Write + Seek>(
    writer: W,
    sample_rate: u32,
    channel_data: &[Vec<f64>],
) -> Result<()> {
    let samples = channel_data.first().map_or(0, |c| c.len());
    if channel_data.iter().any(|c| c.len() != samples) {
        return Err(ScrambleError::shape("channels have different lengths"));
    }

    let spec = WavSpec {
        channels: channel_data.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut wav = WavWriter::new(writer, spec)?;
    for idx in 0..samples {
        for channel in channel_data {
            wav.write_sample(channel[idx] as f32)?;
        }
    }
    wav.finalize()?;
    Ok(())
}

/// Write channel data as a 32-bit float WAV file
pub fn write_audio_file<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channel_data: &[Vec<f64>],
) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    write_wav(file, sample_rate, channel_data)?;
    log::info!(
        "Wrote {} channel(s) to {}",
        channel_data.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// Encode channel data as 32-bit float WAV bytes
pub fn write_audio_bytes(sample_rate: u32, channel_data: &[Vec<f64>]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_wav(&mut cursor, sample_rate, channel_data)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_info() {
        let info = AudioInfo::new(48000, 2, 24000);
        assert_eq!(info.channels, 2);
        assert!((info.duration_seconds - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_wav_bytes_roundtrip() {
        let sample_rate = 44100;
        let data: Vec<Vec<f64>> = (0..2)
            .map(|ch| {
                (0..1001)
                    .map(|i| {
                        let t = i as f64 / sample_rate as f64;
                        0.5 * (2.0 * std::f64::consts::PI * 440.0 * (ch + 1) as f64 * t).sin()
                    })
                    .collect()
            })
            .collect();

        let bytes = write_audio_bytes(sample_rate, &data).unwrap();
        let (info, decoded) = read_audio_bytes(bytes).unwrap();

        assert_eq!(info.sample_rate, sample_rate);
        assert_eq!(info.channels, 2);
        for (original, read) in data.iter().zip(&decoded) {
            assert_eq!(original.len(), read.len());
            for (a, b) in original.iter().zip(read) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_ragged_channels_rejected() {
        let data = vec![vec![0.0; 4], vec![0.0; 3]];
        assert!(matches!(
            write_audio_bytes(8000, &data),
            Err(ScrambleError::ShapeMismatch(_))
        ));
    }
}
