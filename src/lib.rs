pub mod portal;

// ============================================================================
// Profiling Macros
// ============================================================================

/// Conditionally log messages every 100 frames when the perf_stats feature is enabled.
///
/// The first argument is any integer frame or tick counter. When the perf_stats
/// feature is disabled this macro compiles to nothing and the arguments are not
/// evaluated.
///
/// # Example
/// ```ignore
/// profile_log!(frame, "Processed {} work groups", processed);
/// ```
#[macro_export]
#[cfg(feature = "perf_stats")]
macro_rules! profile_log {
    ($frame:expr, $($arg:tt)*) => {
        if ($frame as u64) % 100 == 0 {
            bevy::prelude::info!($($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "perf_stats"))]
macro_rules! profile_log {
    ($frame:expr, $($arg:tt)*) => {};
}
