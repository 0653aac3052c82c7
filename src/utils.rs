use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::constants::OUTPUT_FILE_PREFIX;
use crate::error::RecorderError;
#[cfg(target_os = "linux")]
use log::warn;
#[cfg(target_os = "linux")]
use std::process::Command;

/// How precisely auto-generated file names encode the save time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPrecision {
    Seconds,
    Millis,
}

/// Build an auto-generated recording name such as
/// `speaker_recording_20240115_143005.wav`.
pub fn recording_file_name(now: &DateTime<Local>, precision: TimestampPrecision) -> String {
    let stamp = match precision {
        TimestampPrecision::Seconds => now.format("%Y%m%d_%H%M%S").to_string(),
        TimestampPrecision::Millis => now.format("%Y%m%d_%H%M%S_%3f").to_string(),
    };
    format!("{OUTPUT_FILE_PREFIX}_{stamp}.wav")
}

/// Return `path` unchanged if nothing exists there, otherwise the first free
/// `<stem>_<n>.<ext>` sibling.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let stem = path
        .file_stem()
        .map_or_else(|| OUTPUT_FILE_PREFIX.to_string(), |s| s.to_string_lossy().into_owned());
    let ext = path
        .extension()
        .map_or_else(|| "wav".to_string(), |s| s.to_string_lossy().into_owned());
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    (1_u32..)
        .map(|n| parent.join(format!("{stem}_{n}.{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Pick where a finished session is written: the explicit path when one was
/// chosen, otherwise a fresh timestamped name inside `output_dir`.
pub fn resolve_output_path(
    explicit: Option<&Path>,
    output_dir: &Path,
    precision: TimestampPrecision,
) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => unique_path(&output_dir.join(recording_file_name(&Local::now(), precision))),
    }
}

/// Warn when neither ALSA nor a sound server is around to provide a
/// monitor source. Loopback on Linux relies on PulseAudio/PipeWire exposing
/// one, so this never fails, it only explains a later device error.
#[cfg(target_os = "linux")]
pub fn check_loopback_support() -> Result<(), RecorderError> {
    let alsa = Command::new("pkg-config")
        .args(["--exists", "alsa"])
        .output()
        .is_ok_and(|o| o.status.success());

    if !alsa {
        warn!("ALSA libraries not found. Capture might not work on this system.");
        warn!("Try installing libasound2-dev: sudo apt-get install libasound2-dev");
    }

    let sound_server = ["pactl", "pw-cli"].iter().any(|tool| {
        Command::new(tool)
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    });

    if !sound_server {
        warn!("No PulseAudio or PipeWire tools found; speaker monitor sources may be unavailable.");
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn check_loopback_support() -> Result<(), RecorderError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn fixed_time() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 1, 15, 14, 30, 5)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn test_file_name_second_precision() {
        assert_eq!(
            recording_file_name(&fixed_time(), TimestampPrecision::Seconds),
            "speaker_recording_20240115_143005.wav"
        );
    }

    #[test]
    fn test_file_name_millisecond_precision() {
        let name = recording_file_name(&fixed_time(), TimestampPrecision::Millis);
        assert_eq!(name, "speaker_recording_20240115_143005_000.wav");
    }

    #[test]
    fn test_unique_path_appends_counter() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("take.wav");
        assert_eq!(unique_path(&first), first);

        std::fs::write(&first, b"x").unwrap();
        let second = unique_path(&first);
        assert_eq!(second, dir.path().join("take_1.wav"));

        std::fs::write(&second, b"x").unwrap();
        assert_eq!(unique_path(&first), dir.path().join("take_2.wav"));
    }

    #[test]
    fn test_resolve_prefers_explicit_path() {
        let dir = tempdir().unwrap();
        let explicit = dir.path().join("chosen.wav");
        let resolved = resolve_output_path(
            Some(&explicit),
            Path::new("/nonexistent"),
            TimestampPrecision::Seconds,
        );
        assert_eq!(resolved, explicit);
    }

    #[test]
    fn test_resolve_auto_names_inside_output_dir() {
        let dir = tempdir().unwrap();
        let resolved = resolve_output_path(None, dir.path(), TimestampPrecision::Millis);
        assert_eq!(resolved.parent(), Some(dir.path()));
        let name = resolved.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("speaker_recording_"));
        assert!(name.ends_with(".wav"));
    }
}
