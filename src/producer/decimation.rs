//! Frame-rate decimation and the slot <-> index mapping.

/// Which source frames are kept when displaying at a lower rate.
///
/// Display slot `k` shows source frame `k * stride`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decimation {
    source_fps: f64,
    stride: u64,
}

impl Decimation {
    /// Keep every `round(source / target)`-th frame when the target rate is
    /// below the source rate, otherwise keep every frame.
    pub fn new(source_fps: f64, target_fps: Option<u32>) -> Self {
        let stride = match target_fps {
            Some(target) if target > 0 && (target as f64) < source_fps => {
                (source_fps / target as f64).round().max(1.0) as u64
            }
            _ => 1,
        };
        Self { source_fps, stride }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn source_fps(&self) -> f64 {
        self.source_fps
    }

    /// Rate at which display slots advance.
    pub fn display_fps(&self) -> f64 {
        self.source_fps / self.stride as f64
    }

    pub fn keeps(&self, index: u64) -> bool {
        index % self.stride == 0
    }

    pub fn slot_of(&self, index: u64) -> u64 {
        index / self.stride
    }

    pub fn index_of(&self, slot: u64) -> u64 {
        slot.saturating_mul(self.stride)
    }

    /// Number of kept frames out of `total` source frames.
    pub fn kept_of(&self, total: u64) -> u64 {
        total.div_ceil(self.stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimation_30_to_10() {
        let d = Decimation::new(30.0, Some(10));
        assert_eq!(d.stride(), 3);
        let kept: Vec<u64> = (0..12).filter(|i| d.keeps(*i)).collect();
        assert_eq!(kept, vec![0, 3, 6, 9]);
        assert_eq!(d.display_fps(), 10.0);
    }

    #[test]
    fn test_decimation_rounds_stride() {
        // 29.97 / 12 = 2.4975
        assert_eq!(Decimation::new(29.97, Some(12)).stride(), 2);
        // 25 / 10 = 2.5
        assert_eq!(Decimation::new(25.0, Some(10)).stride(), 3);
    }

    #[test]
    fn test_decimation_keeps_all_when_target_not_lower() {
        assert_eq!(Decimation::new(30.0, Some(30)).stride(), 1);
        assert_eq!(Decimation::new(30.0, Some(60)).stride(), 1);
        assert_eq!(Decimation::new(30.0, None).stride(), 1);
        assert_eq!(Decimation::new(24.0, None).display_fps(), 24.0);
    }

    #[test]
    fn test_slot_mapping() {
        let d = Decimation::new(60.0, Some(20));
        assert_eq!(d.index_of(4), 12);
        assert_eq!(d.slot_of(12), 4);
        assert_eq!(d.kept_of(10), 4);
        assert_eq!(d.kept_of(9), 3);
    }
}
