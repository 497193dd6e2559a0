use chrono::{DateTime, Utc};

/// Current wall-clock time in epoch milliseconds.
///
/// All timestamps in this crate are epoch milliseconds, matching the unit of
/// the grace period constant.
#[inline]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Formats an epoch-millisecond timestamp for logs and operator output.
#[inline]
pub fn to_rfc2822(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc2822()
}

#[cfg(test)]
mod tests {
    use super::to_rfc2822;

    #[test]
    fn formats_epoch_millis() {
        assert_eq!(to_rfc2822(0), "Thu, 1 Jan 1970 00:00:00 +0000");
    }
}
