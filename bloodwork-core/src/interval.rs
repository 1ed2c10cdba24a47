//! Khoảng tham chiếu `[min, max]` và bộ đọc số chịu được dấu phẩy thập phân.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::PanelError;

/// Đọc số từ chuỗi do người dùng nhập hoặc do phòng xét nghiệm ghi.
///
/// Bỏ mọi khoảng trắng, chấp nhận `,` làm dấu thập phân. Trả về `None`
/// khi chuỗi rỗng, không phải số, hoặc không hữu hạn.
pub fn parse_lab_number(raw: &str) -> Option<f64> {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if normalized.is_empty() {
        return None;
    }

    normalized.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Khoảng tham chiếu, hai cận đều tính là bình thường.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceInterval {
    min: f64,
    max: f64,
}

impl ReferenceInterval {
    pub fn new(min: f64, max: f64) -> Result<Self, PanelError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(PanelError::NonFiniteBound { min, max });
        }
        if min > max {
            return Err(PanelError::InvertedInterval { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl FromStr for ReferenceInterval {
    type Err = PanelError;

    /// Đọc dạng `"min-max"`, ví dụ `"4.5-11.0"`, `"4,5 - 11,0"`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let malformed = || PanelError::MalformedInterval(text.to_string());

        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let (lower, upper) = split_bounds(&compact).ok_or_else(malformed)?;
        let min = parse_lab_number(lower).ok_or_else(malformed)?;
        let max = parse_lab_number(upper).ok_or_else(malformed)?;

        Self::new(min, max)
    }
}

/// Tách hai cận tại dấu gạch đầu tiên sau ký tự đầu (giữ dấu âm của cận dưới).
fn split_bounds(text: &str) -> Option<(&str, &str)> {
    let mut chars = text.char_indices();
    chars.next()?;
    let (idx, sep) = chars.find(|(_, c)| matches!(c, '-' | '\u{2013}'))?;
    Some((&text[..idx], &text[idx + sep.len_utf8()..]))
}

impl fmt::Display for ReferenceInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

impl Serialize for ReferenceInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntervalRepr {
    Text(String),
    Pair([f64; 2]),
    Bounds { min: f64, max: f64 },
}

impl<'de> Deserialize<'de> for ReferenceInterval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match IntervalRepr::deserialize(deserializer)? {
            IntervalRepr::Text(text) => text.parse(),
            IntervalRepr::Pair([min, max]) | IntervalRepr::Bounds { min, max } => {
                Self::new(min, max)
            }
        };
        parsed.map_err(serde::de::Error::custom)
    }
}
