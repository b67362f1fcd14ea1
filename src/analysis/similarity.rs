// Similarity scoring against a calibrated sound profile
//
// score = 0.6 * level_score + 0.4 * freq_score
//
// Loudness match dominates spectral match. Untrained profiles collapse to a
// plain level gate.

use crate::calibration::SoundProfile;

/// Weight of the loudness match in the blended score
pub const LEVEL_WEIGHT: f32 = 0.6;

/// Weight of the spectral match in the blended score
pub const FREQUENCY_WEIGHT: f32 = 0.4;

/// Fraction of the profile trigger floor below which a frame is rejected outright
pub const REJECT_FLOOR_RATIO: f32 = 0.7;

/// Cosine similarity over the common prefix of two vectors
///
/// Returns 0.0 when either vector has zero norm. For non-negative inputs the
/// result lies in [0, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Score how well a frame matches a profile
///
/// # Arguments
/// * `level` - Frame level in [0, 1]
/// * `frequency_vector` - Frame spectral shape
/// * `profile` - Calibrated (or untrained fallback) profile
///
/// # Returns
/// Similarity in [0, 1]
pub fn score(level: f32, frequency_vector: &[f32], profile: &SoundProfile) -> f32 {
    if !profile.is_trained() {
        return if level >= profile.min_trigger_level {
            1.0
        } else {
            0.0
        };
    }

    if level < profile.min_trigger_level * REJECT_FLOOR_RATIO {
        return 0.0;
    }

    let level_score = if profile.peak_level > 0.0 {
        (level / profile.peak_level).min(1.0)
    } else {
        1.0
    };

    let freq_score = if profile.frequency_signature.is_empty() || frequency_vector.is_empty() {
        1.0
    } else {
        cosine_similarity(&profile.frequency_signature, frequency_vector)
    };

    LEVEL_WEIGHT * level_score + FREQUENCY_WEIGHT * freq_score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained(peak: f32, min: f32, signature: Vec<f32>) -> SoundProfile {
        SoundProfile {
            peak_level: peak,
            avg_level: peak * 0.6,
            min_trigger_level: min,
            frequency_signature: signature,
            attack_time_ms: 50.0,
            duration_ms: 120.0,
            sample_count: 3,
        }
    }

    #[test]
    fn test_cosine_identical_is_one() {
        let v = [0.2, 0.5, 1.0, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = [0.1, 0.9, 0.3];
        let b = [0.7, 0.2, 0.4];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.5]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.5], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_uses_common_prefix() {
        let a = [1.0, 0.0, 0.0, 0.0];
        let b = [1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_untrained_is_level_gate() {
        let profile = SoundProfile::untrained(0.4);
        assert_eq!(score(0.4, &[], &profile), 1.0);
        assert_eq!(score(0.39, &[1.0, 1.0], &profile), 0.0);
    }

    #[test]
    fn test_trained_rejects_quiet_frames() {
        let profile = trained(0.9, 0.5, vec![1.0, 0.5]);
        // 0.5 * 0.7 = 0.35
        assert_eq!(score(0.34, &[1.0, 0.5], &profile), 0.0);
        assert!(score(0.36, &[1.0, 0.5], &profile) > 0.0);
    }

    #[test]
    fn test_trained_blend() {
        let profile = trained(0.8, 0.48, vec![1.0, 0.5]);
        let s = score(0.4, &[1.0, 0.5], &profile);
        // 0.6 * 0.5 + 0.4 * 1.0
        assert!((s - 0.7).abs() < 1e-5);
    }

    #[test]
    fn test_level_score_capped() {
        let profile = trained(0.5, 0.3, Vec::new());
        assert!((score(1.0, &[0.2], &profile) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_signature_ignores_shape() {
        let profile = trained(1.0, 0.3, Vec::new());
        let a = score(0.5, &[1.0, 0.0], &profile);
        let b = score(0.5, &[0.0, 1.0], &profile);
        assert_eq!(a, b);
    }
}
