use std::path::Path;

use anyhow::{Context, Result};

const FEET_PER_METER: f32 = 3.280_84;

/// Format a frequency value with appropriate unit suffix (Hz, kHz)
pub fn format_frequency(freq: f32) -> String {
    if freq >= 1000.0 {
        format!("{:.2} kHz", freq / 1000.0)
    } else {
        format!("{:.1} Hz", freq)
    }
}

pub fn meters_to_feet(meters: f32) -> f32 {
    meters * FEET_PER_METER
}

/// Meters with the imperial equivalent, e.g. `1.25 m (4.10 ft)`
pub fn format_distance(meters: f32) -> String {
    format!("{:.2} m ({:.2} ft)", meters, meters_to_feet(meters))
}

/// Format a time value with appropriate unit suffix (ms, s)
pub fn format_time(time_in_seconds: f32) -> String {
    if time_in_seconds >= 1.0 {
        format!("{:.2} s", time_in_seconds)
    } else {
        format!("{:.0} ms", time_in_seconds * 1000.0)
    }
}

/// Calculate decibels from a linear amplitude value
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    // Avoid log of zero
    if amplitude <= 0.0 {
        -96.0
    } else {
        20.0 * amplitude.log10()
    }
}

pub fn peak_amplitude(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |max, &s| max.max(s.abs()))
}

/// Write mono 32-bit float samples as a WAV file
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample).context("Failed to write WAV sample")?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_frequency() {
        assert_eq!(format_frequency(261.63), "261.6 Hz");
        assert_eq!(format_frequency(4186.01), "4.19 kHz");
    }

    #[test]
    fn test_distance_conversion() {
        assert!((meters_to_feet(1.0) - 3.28084).abs() < 1e-5);
        assert_eq!(format_distance(0.5), "0.50 m (1.64 ft)");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.75), "750 ms");
        assert_eq!(format_time(2.5), "2.50 s");
    }

    #[test]
    fn test_db_conversion() {
        assert_eq!(amplitude_to_db(0.0), -96.0);
        assert!(amplitude_to_db(1.0).abs() < 1e-6);
        assert!((amplitude_to_db(0.5) + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn test_wav_round_trip() {
        let dir = std::env::temp_dir().join(format!("sector-piano-wav-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tone.wav");

        let samples: Vec<f32> = (0..441).map(|i| (i as f32 * 0.1).sin() * 0.5).collect();
        write_wav(&path, &samples, 44_100).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 44_100);
        assert_eq!(reader.spec().channels, 1);
        let read: Vec<f32> = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);
        assert!((peak_amplitude(&read) - peak_amplitude(&samples)).abs() < 1e-6);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
