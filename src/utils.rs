use std::time::{Duration, Instant};

/// Logs the time spent since the previous step and returns the new running total.
pub(crate) fn trace(l_type: &str, l_step: &str, start: Instant, previous: Duration) -> Duration {
    let elapsed = start.elapsed();
    log::trace!(
        "{} | Total={:.2?} | {}={:.2?}",
        l_type,
        elapsed,
        l_step,
        elapsed.saturating_sub(previous)
    );
    elapsed
}

pub(crate) fn human_bytes(size: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = size.max(0.0);
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size:.0} {}", UNITS[unit])
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_scaled() {
        assert_eq!(human_bytes(512.0), "512 B");
        assert_eq!(human_bytes(1536.0), "1.5 KiB");
        assert_eq!(human_bytes(350.0 * 1024.0 * 1024.0), "350.0 MiB");
    }
}
