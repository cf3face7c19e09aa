//! Console rendering helpers for sample output.

use gridstream_core::time::{nanos_to_millis, NANOS_PER_SEC};

const BAR_WIDTH: usize = 50;

/// Renders `value` as a fixed-width ASCII bar over `[min, max]`.
pub fn value_bar(value: f64, min: f64, max: f64) -> String {
    let span = max - min;
    let fraction = if span > 0.0 {
        ((value - min) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = (fraction * BAR_WIDTH as f64).round() as usize;
    format!(
        "{:>9.4} |{}{}|",
        value,
        "#".repeat(filled),
        " ".repeat(BAR_WIDTH - filled)
    )
}

/// Formats a nanosecond offset as `hh:mm:ss.mmm`.
pub fn format_elapsed(nanos: i64) -> String {
    let total_seconds = nanos / NANOS_PER_SEC;
    let millis = nanos_to_millis(nanos % NANOS_PER_SEC);
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total_seconds / 3600,
        (total_seconds / 60) % 60,
        total_seconds % 60,
        millis
    )
}
