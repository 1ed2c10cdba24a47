//! Phân loại một giá trị so với khoảng tham chiếu.

use serde::{Deserialize, Serialize};

use crate::ReferenceInterval;

/// Trạng thái lâm sàng của một chỉ số.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Normal,
    Low,
    High,
    /// Chỉ dịch vụ phân tích từ xa mới gán trạng thái này.
    Critical,
    /// Giá trị thiếu hoặc không đọc được.
    Unknown,
}

impl Status {
    pub fn is_normal(self) -> bool {
        self == Status::Normal
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Normal => "normal",
            Status::Low => "low",
            Status::High => "high",
            Status::Critical => "critical",
            Status::Unknown => "unknown",
        }
    }
}

/// Cách xử lý giá trị thiếu hoặc không phải số.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Gán `Status::Unknown`.
    #[default]
    Unknown,
    /// Coi như bình thường, giữ tương thích với client web cũ.
    Normal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeClassifier {
    missing: MissingValuePolicy,
}

impl RangeClassifier {
    pub fn new(missing: MissingValuePolicy) -> Self {
        Self { missing }
    }

    pub fn missing_value_policy(&self) -> MissingValuePolicy {
        self.missing
    }

    /// So sánh `value` với `interval`, hai cận đều tính là bình thường.
    pub fn classify(&self, value: Option<f64>, interval: &ReferenceInterval) -> Status {
        match value.filter(|v| !v.is_nan()) {
            None => match self.missing {
                MissingValuePolicy::Unknown => Status::Unknown,
                MissingValuePolicy::Normal => Status::Normal,
            },
            Some(v) if v < interval.min() => Status::Low,
            Some(v) if v > interval.max() => Status::High,
            Some(_) => Status::Normal,
        }
    }
}

/// Phân loại với chính sách mặc định (`Unknown` cho giá trị thiếu).
pub fn classify(value: Option<f64>, interval: &ReferenceInterval) -> Status {
    RangeClassifier::default().classify(value, interval)
}
