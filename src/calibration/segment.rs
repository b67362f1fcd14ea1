// Sample segmentation - turns a completed recording buffer into a SoundSample

use crate::analysis::Frame;
use crate::calibration::profile::SoundSample;

/// Recordings shorter than this are discarded
pub const MIN_SAMPLE_FRAMES: usize = 3;

/// Level fraction of the peak that marks the end of the attack
pub const ATTACK_PEAK_RATIO: f32 = 0.8;

/// Attack time reported when the very first frame is already at the peak
pub const INSTANT_ATTACK_MS: f32 = 50.0;

/// Summarize a recording buffer
///
/// # Returns
/// * `Some(SoundSample)` - Buffer held at least `MIN_SAMPLE_FRAMES` frames
/// * `None` - Buffer too short to describe an event
pub fn segment(frames: &[Frame]) -> Option<SoundSample> {
    if frames.len() < MIN_SAMPLE_FRAMES {
        return None;
    }
    let first = frames.first()?;
    let last = frames.last()?;
    let count = frames.len() as f32;

    let peak_level = frames.iter().map(|f| f.level).fold(0.0_f32, f32::max);
    let avg_level = frames.iter().map(|f| f.level).sum::<f32>() / count;

    let bins = first.frequency_vector.len();
    let mut frequency_data = vec![0.0_f32; bins];
    for frame in frames {
        for (acc, value) in frequency_data.iter_mut().zip(&frame.frequency_vector) {
            *acc += value;
        }
    }
    frequency_data.iter_mut().for_each(|v| *v /= count);

    let attack_frame = frames
        .iter()
        .position(|f| f.level >= peak_level * ATTACK_PEAK_RATIO)
        .unwrap_or(0);
    let attack_time_ms = if attack_frame == 0 {
        INSTANT_ATTACK_MS
    } else {
        frames[attack_frame].timestamp_ms.saturating_sub(first.timestamp_ms) as f32
    };

    let duration_ms = last.timestamp_ms.saturating_sub(first.timestamp_ms) as f32;

    Some(SoundSample {
        peak_level,
        avg_level,
        frequency_data,
        attack_time_ms,
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(level: f32, bins: Vec<f32>, timestamp_ms: u64) -> Frame {
        Frame {
            level,
            frequency_vector: bins,
            timestamp_ms,
        }
    }

    #[test]
    fn test_short_buffer_discarded() {
        assert!(segment(&[]).is_none());
        let two = [frame(0.5, vec![], 0), frame(0.4, vec![], 16)];
        assert!(segment(&two).is_none());
    }

    #[test]
    fn test_segment_statistics() {
        let frames = [
            frame(0.2, vec![0.1, 0.3], 1000),
            frame(0.6, vec![0.3, 0.5], 1020),
            frame(1.0, vec![0.5, 0.7], 1040),
            frame(0.2, vec![0.1, 0.1], 1060),
        ];
        let sample = segment(&frames).unwrap();

        assert_eq!(sample.peak_level, 1.0);
        assert!((sample.avg_level - 0.5).abs() < 1e-6);
        assert!((sample.frequency_data[0] - 0.25).abs() < 1e-6);
        assert!((sample.frequency_data[1] - 0.4).abs() < 1e-6);
        // First frame at >= 0.8 of peak is the third one
        assert_eq!(sample.attack_time_ms, 40.0);
        assert_eq!(sample.duration_ms, 60.0);
    }

    #[test]
    fn test_instant_attack_defaults_to_50ms() {
        let frames = [
            frame(0.9, vec![], 0),
            frame(1.0, vec![], 16),
            frame(0.3, vec![], 33),
        ];
        let sample = segment(&frames).unwrap();
        assert_eq!(sample.attack_time_ms, 50.0);
        assert_eq!(sample.duration_ms, 33.0);
    }
}
