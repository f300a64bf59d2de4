use crate::config::TierConfig;

/// Index of the first tier whose range strictly exceeds `distance`.
///
/// Tiers are scanned in stored order, so with ascending ranges the nearest
/// (most urgent) matching tier wins. None means no warning: beyond every
/// range, an empty list, or a NaN distance.
pub fn classify(tiers: &[TierConfig], distance: f64) -> Option<usize> {
    tiers.iter().position(|tier| tier.range > distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttenuationCurve, CueId};

    fn tier(range: f64, priority: i32) -> TierConfig {
        TierConfig {
            range,
            cue: CueId::new("beep"),
            cue_frequency: 1.0,
            priority,
            rolloff: AttenuationCurve::default(),
        }
    }

    fn tiers() -> Vec<TierConfig> {
        vec![tier(1.0, 1), tier(2.5, 2), tier(5.0, 3)]
    }

    #[test]
    fn test_nearest_tier_wins() {
        assert_eq!(classify(&tiers(), 0.3), Some(0));
        assert_eq!(classify(&tiers(), 1.7), Some(1));
        assert_eq!(classify(&tiers(), 4.9), Some(2));
    }

    #[test]
    fn test_range_is_strict() {
        assert_eq!(classify(&tiers(), 1.0), Some(1));
        assert_eq!(classify(&tiers(), 5.0), None);
    }

    #[test]
    fn test_beyond_all_ranges() {
        assert_eq!(classify(&tiers(), 12.0), None);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(classify(&[], 0.0), None);
        assert_eq!(classify(&tiers(), f64::NAN), None);
    }

    #[test]
    fn test_unsorted_list_scans_in_stored_order() {
        // Misconfigured: wide range first. Stored order still decides.
        let unsorted = vec![tier(5.0, 3), tier(1.0, 1)];
        assert_eq!(classify(&unsorted, 0.5), Some(0));
    }
}
