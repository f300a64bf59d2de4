use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use proxwarn_core::{
    AttenuationCurve, CategoryConfig, CategorySet, CueId, CurvePoint, EngineSettings, TierConfig,
};
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// A validated configuration, ready to build an engine from.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub categories: CategorySet,
    pub settings: EngineSettings,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    engine: RawEngine,
    #[serde(default, rename = "category")]
    categories: Vec<RawCategory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEngine {
    channels: Option<usize>,
    refresh_interval_ms: Option<u64>,
    cluster_threshold: Option<f64>,
    use_floor_projection: Option<bool>,
    initial_cooldown_factor: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCategory {
    name: String,
    #[serde(default)]
    layers: Vec<u8>,
    layer_mask: Option<u32>,
    #[serde(default, rename = "tier")]
    tiers: Vec<RawTier>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTier {
    range: f64,
    cue: String,
    cue_frequency: f64,
    priority: i32,
    /// `[distance, gain]` pairs. Absent means "use the tier range".
    rolloff: Option<Vec<[f64; 2]>>,
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<LoadedConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    tracing::debug!(
        path = %path.display(),
        categories = config.categories.len(),
        channels = config.settings.channels,
        "loaded config"
    );
    Ok(config)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<LoadedConfig> {
    let raw: RawConfig = toml::from_str(content)?;
    let settings = engine_settings(raw.engine)?;

    if raw.categories.is_empty() {
        return Err(invalid("at least one [[category]] is required"));
    }
    let mut seen = HashSet::new();
    let mut categories = Vec::with_capacity(raw.categories.len());
    for category in raw.categories {
        if category.name.trim().is_empty() {
            return Err(invalid("category name must not be empty"));
        }
        if !seen.insert(category.name.clone()) {
            return Err(invalid(format!("duplicate category `{}`", category.name)));
        }
        categories.push(category_config(category)?);
    }

    Ok(LoadedConfig {
        categories: CategorySet::new(categories),
        settings,
    })
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

fn engine_settings(raw: RawEngine) -> Result<EngineSettings> {
    let defaults = EngineSettings::default();

    let channels = raw.channels.unwrap_or(defaults.channels);
    if channels == 0 {
        return Err(invalid("engine.channels must be at least 1"));
    }
    let refresh_interval = match raw.refresh_interval_ms {
        Some(0) => return Err(invalid("engine.refresh_interval_ms must be at least 1")),
        Some(ms) => Duration::from_millis(ms),
        None => defaults.refresh_interval,
    };
    let cluster_threshold = raw.cluster_threshold.unwrap_or(defaults.cluster_threshold);
    if !(cluster_threshold.is_finite() && cluster_threshold > 0.0) {
        return Err(invalid("engine.cluster_threshold must be a positive number"));
    }
    let initial_cooldown_factor = raw
        .initial_cooldown_factor
        .unwrap_or(defaults.initial_cooldown_factor);
    if !(initial_cooldown_factor.is_finite() && initial_cooldown_factor >= 0.0) {
        return Err(invalid(
            "engine.initial_cooldown_factor must be a non-negative number",
        ));
    }

    Ok(EngineSettings {
        channels,
        refresh_interval,
        cluster_threshold,
        use_floor_projection: raw
            .use_floor_projection
            .unwrap_or(defaults.use_floor_projection),
        initial_cooldown_factor,
    })
}

fn category_config(raw: RawCategory) -> Result<CategoryConfig> {
    let name = raw.name;
    let layer_mask = match (raw.layer_mask, raw.layers.is_empty()) {
        (Some(_), false) => {
            return Err(invalid(format!(
                "category `{name}`: give either `layers` or `layer_mask`, not both"
            )));
        }
        (Some(mask), true) => mask,
        (None, _) => {
            let mut mask = 0u32;
            for &layer in &raw.layers {
                if layer >= 32 {
                    return Err(invalid(format!(
                        "category `{name}`: layer {layer} is out of range 0..32"
                    )));
                }
                mask |= 1 << layer;
            }
            mask
        }
    };
    if layer_mask == 0 {
        return Err(invalid(format!("category `{name}` matches no layers")));
    }
    if raw.tiers.is_empty() {
        return Err(invalid(format!("category `{name}` has no tiers")));
    }

    let mut tiers = Vec::with_capacity(raw.tiers.len());
    let mut previous = 0.0;
    for (index, tier) in raw.tiers.into_iter().enumerate() {
        let tier = tier_config(tier).map_err(|msg| {
            invalid(format!("category `{name}` tier {index}: {msg}"))
        })?;
        if tier.range <= previous {
            return Err(invalid(format!(
                "category `{name}` tier {index}: ranges must be positive and strictly ascending"
            )));
        }
        previous = tier.range;
        tiers.push(tier);
    }

    Ok(CategoryConfig {
        name,
        layer_mask,
        tiers,
    })
}

fn tier_config(raw: RawTier) -> std::result::Result<TierConfig, String> {
    if !raw.range.is_finite() {
        return Err("range must be finite".into());
    }
    if !(raw.cue_frequency.is_finite() && raw.cue_frequency >= 0.0) {
        return Err("cue_frequency must be a non-negative number".into());
    }
    if raw.cue.trim().is_empty() {
        return Err("cue must not be empty".into());
    }

    let rolloff = match raw.rolloff {
        None => AttenuationCurve::default(),
        Some(points) => {
            if points.is_empty() {
                return Err("rolloff needs at least one point".into());
            }
            if points.iter().flatten().any(|v| !v.is_finite()) {
                return Err("rolloff values must be finite".into());
            }
            if points.windows(2).any(|w| w[1][0] < w[0][0]) {
                return Err("rolloff distances must not decrease".into());
            }
            AttenuationCurve::new(
                points
                    .into_iter()
                    .map(|[distance, gain]| CurvePoint { distance, gain })
                    .collect(),
            )
        }
    };

    Ok(TierConfig {
        range: raw.range,
        cue: CueId::new(&raw.cue),
        cue_frequency: raw.cue_frequency,
        priority: raw.priority,
        rolloff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxwarn_core::CategoryId;

    const SAMPLE: &str = r#"
[engine]
channels = 2
refresh_interval_ms = 250
cluster_threshold = 1.0

[[category]]
name = "wall"
layers = [8, 9]

  [[category.tier]]
  range = 1.0
  cue = "wall_close"
  cue_frequency = 0.5
  priority = 1
  rolloff = [[0.0, 1.0], [4.0, 0.0]]

  [[category.tier]]
  range = 3.0
  cue = "wall_far"
  cue_frequency = 1.5
  priority = 4

[[category]]
name = "stairs"
layer_mask = 1024

  [[category.tier]]
  range = 2.5
  cue = "stairs"
  cue_frequency = 1.0
  priority = 2
"#;

    fn with_tier(tier: &str) -> String {
        format!("[[category]]\nname = \"c\"\nlayers = [0]\n[[category.tier]]\n{tier}\n")
    }

    fn expect_invalid(content: &str, needle: &str) {
        match parse_config(content) {
            Err(ConfigError::Invalid(msg)) => {
                assert!(msg.contains(needle), "`{msg}` should mention `{needle}`")
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.settings.channels, 2);
        assert_eq!(config.settings.refresh_interval, Duration::from_millis(250));
        assert_eq!(config.settings.cluster_threshold, 1.0);
        assert!(config.settings.use_floor_projection);

        let wall = config.categories.by_name("wall").unwrap();
        let cfg = config.categories.get(wall).unwrap();
        assert_eq!(cfg.layer_mask, (1 << 8) | (1 << 9));
        assert_eq!(cfg.tiers.len(), 2);
        assert_eq!(cfg.tiers[0].cue.as_str(), "wall_close");
        assert_eq!(cfg.tiers[0].rolloff.bounds(), Some((0.0, 4.0)));
        assert!(cfg.tiers[1].rolloff.points.is_empty());

        assert_eq!(config.categories.resolve_layer(10), Some(CategoryId(1)));
        assert_eq!(config.categories.resolve_layer(7), None);
    }

    #[test]
    fn test_engine_table_optional() {
        let config = parse_config(&with_tier(
            "range = 1.0\ncue = \"x\"\ncue_frequency = 1.0\npriority = 1",
        ))
        .unwrap();
        assert_eq!(config.settings, EngineSettings::default());
    }

    #[test]
    fn test_rejects_no_categories() {
        expect_invalid("[engine]\nchannels = 1\n", "at least one");
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let one = with_tier("range = 1.0\ncue = \"x\"\ncue_frequency = 1.0\npriority = 1");
        expect_invalid(&format!("{one}{one}"), "duplicate");
    }

    #[test]
    fn test_rejects_descending_ranges() {
        let content = format!(
            "{}[[category.tier]]\nrange = 0.5\ncue = \"y\"\ncue_frequency = 1.0\npriority = 2\n",
            with_tier("range = 1.0\ncue = \"x\"\ncue_frequency = 1.0\npriority = 1")
        );
        expect_invalid(&content, "strictly ascending");
    }

    #[test]
    fn test_rejects_equal_ranges() {
        let content = format!(
            "{}[[category.tier]]\nrange = 1.0\ncue = \"y\"\ncue_frequency = 1.0\npriority = 2\n",
            with_tier("range = 1.0\ncue = \"x\"\ncue_frequency = 1.0\npriority = 1")
        );
        expect_invalid(&content, "strictly ascending");
    }

    #[test]
    fn test_rejects_bad_tier_values() {
        expect_invalid(
            &with_tier("range = 0.0\ncue = \"x\"\ncue_frequency = 1.0\npriority = 1"),
            "strictly ascending",
        );
        expect_invalid(
            &with_tier("range = 1.0\ncue = \"x\"\ncue_frequency = -1.0\npriority = 1"),
            "cue_frequency",
        );
        expect_invalid(
            &with_tier("range = 1.0\ncue = \" \"\ncue_frequency = 1.0\npriority = 1"),
            "cue must not be empty",
        );
        expect_invalid(
            &with_tier("range = 1.0\ncue = \"x\"\ncue_frequency = 1.0\npriority = 1\nrolloff = []"),
            "at least one point",
        );
        expect_invalid(
            &with_tier(
                "range = 1.0\ncue = \"x\"\ncue_frequency = 1.0\npriority = 1\n\
                 rolloff = [[2.0, 1.0], [1.0, 0.0]]",
            ),
            "must not decrease",
        );
    }

    #[test]
    fn test_rejects_bad_layers() {
        let tier = "[[category.tier]]\nrange = 1.0\ncue = \"x\"\ncue_frequency = 1.0\npriority = 1\n";
        expect_invalid(
            &format!("[[category]]\nname = \"c\"\n{tier}"),
            "matches no layers",
        );
        expect_invalid(
            &format!("[[category]]\nname = \"c\"\nlayers = [40]\n{tier}"),
            "out of range",
        );
        expect_invalid(
            &format!("[[category]]\nname = \"c\"\nlayers = [1]\nlayer_mask = 2\n{tier}"),
            "not both",
        );
    }

    #[test]
    fn test_rejects_bad_engine_values() {
        let body = with_tier("range = 1.0\ncue = \"x\"\ncue_frequency = 1.0\npriority = 1");
        expect_invalid(&format!("[engine]\nchannels = 0\n{body}"), "channels");
        expect_invalid(
            &format!("[engine]\nrefresh_interval_ms = 0\n{body}"),
            "refresh_interval_ms",
        );
        expect_invalid(
            &format!("[engine]\ncluster_threshold = -1.0\n{body}"),
            "cluster_threshold",
        );
    }

    #[test]
    fn test_unknown_keys_are_parse_errors() {
        let err = parse_config("[engine]\nchanels = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
