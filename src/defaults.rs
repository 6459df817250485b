//! Default configuration constants for signstream.
//!
//! Shared by the per-component config structs and the TOML config layer so
//! both agree on every tunable.

/// Landmarks reported per detected hand.
pub const LANDMARKS_PER_HAND: usize = 21;

/// Hand slots in a feature vector (left, right).
pub const HAND_SLOTS: usize = 2;

/// Coordinates forwarded per landmark (x, y; z is dropped).
pub const COORDS_PER_LANDMARK: usize = 2;

/// Values contributed by one hand block.
pub const HAND_BLOCK_LEN: usize = LANDMARKS_PER_HAND * COORDS_PER_LANDMARK;

/// Total feature vector length: 21 landmarks × 2 coordinates × 2 hands.
pub const FEATURE_LEN: usize = HAND_BLOCK_LEN * HAND_SLOTS;

/// Classifier confidence at or below which a prediction is discarded.
pub const CONFIDENCE_THRESHOLD: f32 = 0.9;

/// Upper bound on a single classifier call before the frame is treated as empty.
pub const CLASSIFIER_TIMEOUT_MS: u64 = 500;

/// Number of recent labels kept in the consensus window.
pub const STABILIZER_WINDOW: usize = 4;

/// Identical non-empty labels required inside the window to settle a token.
pub const STABILIZER_CONSENSUS: usize = 3;

/// Minimum gap after any settlement before a different token may settle.
pub const SWITCH_COOLDOWN_MS: u64 = 500;

/// Minimum gap before the same token may settle again.
pub const REPEAT_COOLDOWN_MS: u64 = 2000;

/// Frames without an accepted settlement before the window is cleared.
pub const RESET_AFTER_FRAMES: usize = 10;

/// Idle time after the last settled token before the buffer is flushed.
pub const IDLE_FLUSH_MS: u64 = 1500;

/// Maximum number of completion suggestions.
pub const MAX_SUGGESTIONS: usize = 3;

/// Similarity a non-prefix candidate must exceed to be suggested.
pub const MIN_SIMILARITY: f32 = 0.1;

/// Channel capacity between pipeline stations.
///
/// At 30 fps this holds a little over two seconds of frames, enough to ride
/// out one slow classifier call without dropping input.
pub const STATION_BUFFER: usize = 64;
