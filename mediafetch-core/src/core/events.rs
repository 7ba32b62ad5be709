use serde::{Deserialize, Serialize};

/// One tick of a streaming download. `percent` is only meaningful when the
/// server sent a content-length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub percent: Option<f64>,
}

impl ProgressSnapshot {
    pub fn new(downloaded_bytes: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes
            .filter(|t| *t > 0)
            .map(|t| (downloaded_bytes as f64 / t as f64) * 100.0);
        Self {
            downloaded_bytes,
            total_bytes,
            percent,
        }
    }

    /// Percent rounded to two decimals, e.g. `"42.17"`.
    pub fn percent_label(&self) -> Option<String> {
        self.percent.map(|p| format!("{:.2}", p))
    }

    pub fn downloaded_mb(&self) -> f64 {
        self.downloaded_bytes as f64 / 1024.0 / 1024.0
    }

    pub fn total_mb(&self) -> Option<f64> {
        self.total_bytes.map(|t| t as f64 / 1024.0 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_from_known_total() {
        let snap = ProgressSnapshot::new(512, Some(2048));
        assert_eq!(snap.percent, Some(25.0));
        assert_eq!(snap.percent_label().as_deref(), Some("25.00"));
    }

    #[test]
    fn no_percent_without_total() {
        let snap = ProgressSnapshot::new(512, None);
        assert_eq!(snap.percent, None);
        assert_eq!(snap.total_mb(), None);
    }

    #[test]
    fn zero_total_has_no_percent() {
        assert_eq!(ProgressSnapshot::new(0, Some(0)).percent, None);
    }

    #[test]
    fn megabyte_conversion() {
        let snap = ProgressSnapshot::new(3 * 1024 * 1024, Some(6 * 1024 * 1024));
        assert_eq!(snap.downloaded_mb(), 3.0);
        assert_eq!(snap.total_mb(), Some(6.0));
    }
}
