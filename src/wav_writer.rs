use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::constants::BITS_PER_SAMPLE;
use crate::error::RecorderError;

/// Returns the `.recording.wav` temporary sibling for the given final path.
fn tmp_wav_path(final_path: &Path) -> PathBuf {
    let stem = final_path
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    final_path.with_file_name(format!("{stem}.recording.wav"))
}

/// Write 16-bit PCM blocks to `path` in capture order and return the number
/// of frames written.
///
/// Samples go to a temporary sibling first, which is renamed into place once
/// the header is finalized, so a failed save never leaves a truncated file at
/// `path`.
pub fn write_wav(
    path: &Path,
    blocks: &[Vec<i16>],
    channels: u16,
    sample_rate: u32,
) -> Result<u64, RecorderError> {
    if channels == 0 {
        return Err(RecorderError::Wav("Channel count must be at least 1".to_string()));
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let tmp_path = tmp_wav_path(path);
    let result = write_samples(&tmp_path, spec, blocks).and_then(|samples| {
        fs::rename(&tmp_path, path)?;
        Ok(samples)
    });

    match result {
        Ok(samples) => {
            let frames = samples / u64::from(channels);
            info!(
                "Saved {} frames ({} Hz, {} ch) to {}",
                frames,
                sample_rate,
                channels,
                path.display()
            );
            Ok(frames)
        }
        Err(e) => {
            if tmp_path.exists()
                && let Err(cleanup) = fs::remove_file(&tmp_path)
            {
                warn!(
                    "Could not remove partial file {}: {}",
                    tmp_path.display(),
                    cleanup
                );
            }
            Err(e)
        }
    }
}

fn write_samples(
    tmp_path: &Path,
    spec: hound::WavSpec,
    blocks: &[Vec<i16>],
) -> Result<u64, RecorderError> {
    let mut writer = hound::WavWriter::create(tmp_path, spec)
        .map_err(|e| RecorderError::Wav(format!("Failed to create WAV file: {}", e)))?;

    let mut samples: u64 = 0;
    for block in blocks {
        for &sample in block {
            writer
                .write_sample(sample)
                .map_err(|e| RecorderError::Wav(format!("Failed to write sample: {}", e)))?;
        }
        samples += block.len() as u64;
    }

    debug!("Wrote {} samples from {} blocks", samples, blocks.len());

    writer
        .finalize()
        .map_err(|e| RecorderError::Wav(format!("Error finalizing WAV file: {}", e)))?;

    Ok(samples)
}
