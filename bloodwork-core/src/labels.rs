//! Nhãn hiển thị theo ngôn ngữ cho trạng thái và kết luận.

use serde::{Deserialize, Serialize};

use crate::{Status, Verdict};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusLabels {
    pub locale: String,
    pub normal: String,
    pub low: String,
    pub high: String,
    pub critical: String,
    pub unknown: String,
    pub all_normal: String,
    pub abnormalities_detected: String,
}

impl StatusLabels {
    pub fn english() -> Self {
        Self {
            locale: "en".to_string(),
            normal: "Within normal range".to_string(),
            low: "Below normal range".to_string(),
            high: "Above normal range".to_string(),
            critical: "Critical value - requires immediate attention".to_string(),
            unknown: "Not evaluated".to_string(),
            all_normal: "All Results Normal".to_string(),
            abnormalities_detected: "Abnormalities Detected".to_string(),
        }
    }

    pub fn vietnamese() -> Self {
        Self {
            locale: "vi".to_string(),
            normal: "Trong giới hạn bình thường".to_string(),
            low: "Thấp hơn giới hạn bình thường".to_string(),
            high: "Cao hơn giới hạn bình thường".to_string(),
            critical: "Giá trị nguy hiểm - cần xử lý ngay".to_string(),
            unknown: "Chưa đánh giá".to_string(),
            all_normal: "Tất cả kết quả bình thường".to_string(),
            abnormalities_detected: "Phát hiện bất thường".to_string(),
        }
    }

    /// Bảng nhãn dựng sẵn theo mã ngôn ngữ (`en`, `vi`, `vi-VN`...).
    pub fn for_locale(tag: &str) -> Option<Self> {
        let language = tag.split(['-', '_']).next().unwrap_or_default();
        match language.to_ascii_lowercase().as_str() {
            "en" => Some(Self::english()),
            "vi" => Some(Self::vietnamese()),
            _ => None,
        }
    }

    pub fn status(&self, status: Status) -> &str {
        match status {
            Status::Normal => &self.normal,
            Status::Low => &self.low,
            Status::High => &self.high,
            Status::Critical => &self.critical,
            Status::Unknown => &self.unknown,
        }
    }

    pub fn verdict(&self, verdict: Verdict) -> &str {
        match verdict {
            Verdict::AllNormal => &self.all_normal,
            Verdict::AbnormalitiesDetected => &self.abnormalities_detected,
        }
    }
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self::english()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_builtin_locales() {
        assert_eq!(StatusLabels::for_locale("en").unwrap().locale, "en");
        assert_eq!(StatusLabels::for_locale("vi-VN").unwrap().locale, "vi");
        assert_eq!(StatusLabels::for_locale("EN_us").unwrap().locale, "en");
        assert!(StatusLabels::for_locale("fr").is_none());
    }

    #[test]
    fn maps_status_and_verdict() {
        let labels = StatusLabels::english();
        assert_eq!(labels.status(Status::High), "Above normal range");
        assert_eq!(labels.status(Status::Low), "Below normal range");
        assert_eq!(labels.verdict(Verdict::AllNormal), "All Results Normal");
        assert_eq!(
            labels.status(Status::Critical),
            "Critical value - requires immediate attention"
        );

        let vi = StatusLabels::vietnamese();
        assert_eq!(vi.status(Status::Unknown), "Chưa đánh giá");
    }

    #[test]
    fn custom_table_loads_from_json() {
        let json = r#"{
            "locale": "de",
            "normal": "Im Normbereich",
            "low": "Unter dem Normbereich",
            "high": "Über dem Normbereich",
            "critical": "Kritischer Wert",
            "unknown": "Nicht bewertet",
            "all_normal": "Alle Werte normal",
            "abnormalities_detected": "Auffälligkeiten gefunden"
        }"#;
        let labels: StatusLabels = serde_json::from_str(json).unwrap();
        assert_eq!(labels.status(Status::Critical), "Kritischer Wert");
    }
}
