use std::time::Duration;

/// Minimum gap before the same code may be reported again.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2000);

/// Pause between two decode attempts, measured from the end of the first.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(200);

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Display offset for timestamps (UTC+7).
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 7 * 60 * 60;

/// Number of sessions listed in the statistics report.
pub const RECENT_SESSIONS_LIMIT: usize = 5;

/// Placeholder for missing student fields in reports.
pub const MISSING_FIELD: &str = "N/A";
