// Frame - one normalized snapshot of level and spectral shape
//
// A frame is produced once per tick from the magnitude snapshot of the
// analysis tap and is consumed by exactly one processing step.

/// Largest value a byte magnitude snapshot can hold
pub const BYTE_MAGNITUDE_MAX: f32 = 255.0;

/// Normalized audio frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Mean spectral energy in [0, 1]
    pub level: f32,
    /// Per-bin magnitudes in [0, 1]
    pub frequency_vector: Vec<f32>,
    /// Monotonic timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl Frame {
    /// Build a frame from raw bin magnitudes
    ///
    /// `level = Σm / (N·M)` and `frequency_vector[i] = m[i] / M`.
    ///
    /// # Returns
    /// `None` when the snapshot has no bins
    pub fn from_magnitudes(magnitudes: &[f32], max_magnitude: f32, timestamp_ms: u64) -> Option<Self> {
        if magnitudes.is_empty() || max_magnitude <= 0.0 {
            return None;
        }

        let sum: f32 = magnitudes.iter().sum();
        let level = sum / (magnitudes.len() as f32 * max_magnitude);
        let frequency_vector = magnitudes.iter().map(|m| m / max_magnitude).collect();

        Some(Self {
            level,
            frequency_vector,
            timestamp_ms,
        })
    }

    /// Build a frame from a byte snapshot (M = 255)
    pub fn from_bytes(magnitudes: &[u8], timestamp_ms: u64) -> Option<Self> {
        if magnitudes.is_empty() {
            return None;
        }

        let sum: u32 = magnitudes.iter().map(|&m| u32::from(m)).sum();
        let level = sum as f32 / (magnitudes.len() as f32 * BYTE_MAGNITUDE_MAX);
        let frequency_vector = magnitudes
            .iter()
            .map(|&m| f32::from(m) / BYTE_MAGNITUDE_MAX)
            .collect();

        Some(Self {
            level,
            frequency_vector,
            timestamp_ms,
        })
    }

    /// Frame carrying only a level, used by tests and synthetic sources
    pub fn with_level(level: f32, timestamp_ms: u64) -> Self {
        Self {
            level,
            frequency_vector: Vec::new(),
            timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes_full_scale() {
        let frame = Frame::from_bytes(&[255, 255, 255, 255], 10).unwrap();
        assert!((frame.level - 1.0).abs() < 1e-6);
        assert_eq!(frame.frequency_vector, vec![1.0; 4]);
        assert_eq!(frame.timestamp_ms, 10);
    }

    #[test]
    fn test_from_bytes_mixed() {
        let frame = Frame::from_bytes(&[0, 255], 0).unwrap();
        assert!((frame.level - 0.5).abs() < 1e-6);
        assert_eq!(frame.frequency_vector, vec![0.0, 1.0]);
    }

    #[test]
    fn test_from_magnitudes_custom_scale() {
        let frame = Frame::from_magnitudes(&[1.0, 3.0], 4.0, 5).unwrap();
        assert!((frame.level - 0.5).abs() < 1e-6);
        assert_eq!(frame.frequency_vector, vec![0.25, 0.75]);
    }

    #[test]
    fn test_empty_snapshot_yields_no_frame() {
        assert!(Frame::from_bytes(&[], 0).is_none());
        assert!(Frame::from_magnitudes(&[], 255.0, 0).is_none());
    }
}
