use std::time::Duration;

use chrono::{Local, TimeZone};

pub const SECS_PER_MIN: i64 = 60;
pub const SECS_PER_HOUR: i64 = 3600;
pub const SECS_PER_DAY: i64 = 86400;

/// How often the displayed uptime is recomputed
pub const UPTIME_REFRESH: Duration = Duration::from_secs(60);

/// Format elapsed seconds as `DDd:HHh:MMm`. Negative values (clock skew) show as zero.
pub fn format_uptime(seconds: i64) -> String {
    let seconds = seconds.max(0);

    let days = seconds / SECS_PER_DAY;
    let hours = (seconds % SECS_PER_DAY) / SECS_PER_HOUR;
    let minutes = (seconds % SECS_PER_HOUR) / SECS_PER_MIN;

    format!("{days:02}d:{hours:02}h:{minutes:02}m")
}

/// Format a unix timestamp as a local `dd/mm/YYYY HH:MM:SS` date.
pub fn format_started_at(epoch: i64) -> Option<String> {
    Local.timestamp_opt(epoch, 0)
        .single()
        .map(|time| time.format("%d/%m/%Y %H:%M:%S").to_string())
}

/// Uptime derived from the controller's boot time.
///
/// Runs until stopped; once stopped it never produces another value.
#[derive(Clone, Debug, Default)]
pub struct UptimeClock {
    start: Option<i64>,
    stopped: bool,
}

impl UptimeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_start(&mut self, epoch: i64) {
        self.start = Some(epoch);
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Current uptime string, if the boot time is known and the clock is running.
    pub fn uptime(&self, now: i64) -> Option<String> {
        if self.stopped {
            return None;
        }

        self.start.map(|start| format_uptime(now - start))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        let now = 1_700_000_000;
        let start = now - (2 * SECS_PER_DAY + 3 * SECS_PER_HOUR + 5 * SECS_PER_MIN);
        assert_eq!(format_uptime(now - start), "02d:03h:05m");

        assert_eq!(format_uptime(0), "00d:00h:00m");
        assert_eq!(format_uptime(59), "00d:00h:00m");
        assert_eq!(format_uptime(SECS_PER_DAY - 1), "00d:23h:59m");
        assert_eq!(format_uptime(123 * SECS_PER_DAY), "123d:00h:00m");
        assert_eq!(format_uptime(-300), "00d:00h:00m");
    }

    #[test]
    fn test_started_at() {
        let started = format_started_at(1_700_000_000).expect("valid timestamp");

        // 14/11/2023 22:13:20 UTC, shifted by the local offset
        assert_eq!(started.len(), "dd/mm/YYYY HH:MM:SS".len());
        assert!(started.contains("/11/2023 "));
        assert_eq!(&started[2..3], "/");
        assert_eq!(&started[13..14], ":");

        assert_eq!(format_started_at(i64::MAX), None);
    }

    #[test]
    fn test_clock() {
        let mut clock = UptimeClock::new();
        assert_eq!(clock.uptime(1000), None);

        clock.set_start(1000);
        assert_eq!(clock.uptime(1000 + 61 * SECS_PER_MIN).as_deref(), Some("00d:01h:01m"));

        // last value wins
        clock.set_start(1000 + SECS_PER_HOUR);
        assert_eq!(clock.uptime(1000 + 61 * SECS_PER_MIN).as_deref(), Some("00d:00h:01m"));

        clock.stop();
        assert_eq!(clock.uptime(1000 + SECS_PER_DAY), None);
    }
}
