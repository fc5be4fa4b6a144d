//! Human readable sizes and durations for user-facing messages.

use std::time::Duration;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;
const TB: u64 = GB * 1024;

/// Format a byte count, e.g. `1.50 MB` or `2 kB`.
pub fn size(bytes: u64) -> String {
    let scaled = |unit: u64, suffix: &str| {
        let s = format!("{:.2}", bytes as f64 / unit as f64);
        let s = s.strip_suffix(".00").unwrap_or(&s);
        format!("{s} {suffix}")
    };

    if bytes > TB {
        scaled(TB, "TB")
    } else if bytes > GB {
        scaled(GB, "GB")
    } else if bytes > MB {
        scaled(MB, "MB")
    } else if bytes > KB {
        scaled(KB, "kB")
    } else {
        format!("{bytes} B")
    }
}

/// Format an elapsed time, e.g. `850ms`, `1.25s` or `2m 5s`.
pub fn duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        let secs = d.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_bytes() {
        assert_eq!(size(0), "0 B");
        assert_eq!(size(1024), "1024 B");
    }

    #[test]
    fn test_size_trims_zero_decimals() {
        assert_eq!(size(2 * MB + 1), "2 MB");
        assert_eq!(size(3 * KB + 1), "3 kB");
    }

    #[test]
    fn test_size_fraction() {
        assert_eq!(size(MB + MB / 2), "1.50 MB");
        assert_eq!(size(5 * GB / 4), "1.25 GB");
    }

    #[test]
    fn test_duration() {
        assert_eq!(duration(Duration::from_millis(850)), "850ms");
        assert_eq!(duration(Duration::from_millis(1250)), "1.25s");
        assert_eq!(duration(Duration::from_secs(125)), "2m 5s");
    }
}
