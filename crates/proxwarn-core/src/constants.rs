/// Merge radius for clustering same-category obstacles (metres)
pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 1.5;

/// Cadence of the refresh loop (milliseconds)
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 500;

/// Size of the audio channel pool when not configured
pub const DEFAULT_CHANNEL_COUNT: usize = 3;

/// Fraction of a tier's cue frequency a freshly-appeared cluster waits
/// before its first cue.
pub const DEFAULT_INITIAL_COOLDOWN_FACTOR: f64 = 0.5;
