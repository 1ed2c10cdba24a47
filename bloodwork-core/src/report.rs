//! Dựng báo cáo từ bảng chỉ số và các giá trị đo.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{MissingValuePolicy, PanelDefinition, RangeClassifier, ReferenceInterval, Status};

/// Giá trị đo theo mã chỉ số (hoặc bí danh); `None` là thiếu/không đọc được.
pub type Measurements = HashMap<String, Option<f64>>;

/// Một chỉ số đã được phân loại.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedMeasurement {
    pub analyte_id: String,
    pub name: String,
    pub value: Option<f64>,
    pub unit: String,
    pub reference_range: ReferenceInterval,
    pub status: Status,
}

/// Kết luận chung hiển thị trên màn hình kết quả.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    AllNormal,
    AbnormalitiesDetected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportSummary {
    pub total: usize,
    pub normal: usize,
    pub abnormal: usize,
    pub verdict: Verdict,
}

/// Báo cáo theo đúng thứ tự khai báo của bảng chỉ số.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    panel_id: String,
    results: Vec<ClassifiedMeasurement>,
}

impl Report {
    pub fn panel_id(&self) -> &str {
        &self.panel_id
    }

    pub fn results(&self) -> &[ClassifiedMeasurement] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Các chỉ số bình thường, giữ nguyên thứ tự.
    pub fn normal(&self) -> impl Iterator<Item = &ClassifiedMeasurement> {
        self.results.iter().filter(|r| r.status.is_normal())
    }

    /// Các chỉ số khác `normal` (kể cả `unknown`), giữ nguyên thứ tự.
    pub fn abnormal(&self) -> impl Iterator<Item = &ClassifiedMeasurement> {
        self.results.iter().filter(|r| !r.status.is_normal())
    }

    pub fn summary(&self) -> ReportSummary {
        let normal = self.normal().count();
        let abnormal = self.len() - normal;
        ReportSummary {
            total: self.len(),
            normal,
            abnormal,
            verdict: if abnormal == 0 {
                Verdict::AllNormal
            } else {
                Verdict::AbnormalitiesDetected
            },
        }
    }

    /// Tạo báo cáo mới với trạng thái do `reclassify` quyết định cho từng dòng.
    pub fn reclassify<F>(self, mut reclassify: F) -> Report
    where
        F: FnMut(&ClassifiedMeasurement) -> Status,
    {
        let results = self
            .results
            .into_iter()
            .map(|record| {
                let status = reclassify(&record);
                ClassifiedMeasurement { status, ..record }
            })
            .collect();
        Report {
            panel_id: self.panel_id,
            results,
        }
    }
}

/// Dựng `Report` cho một bảng chỉ số cố định.
#[derive(Debug, Clone, Copy)]
pub struct ReportBuilder<'a> {
    panel: &'a PanelDefinition,
    classifier: RangeClassifier,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(panel: &'a PanelDefinition) -> Self {
        Self {
            panel,
            classifier: RangeClassifier::default(),
        }
    }

    pub fn with_missing_value_policy(mut self, policy: MissingValuePolicy) -> Self {
        self.classifier = RangeClassifier::new(policy);
        self
    }

    /// Mỗi chỉ số của bảng cho đúng một dòng, kể cả khi không có giá trị.
    pub fn build(&self, measurements: &Measurements) -> Report {
        for key in measurements.keys() {
            if self.panel.resolve_key(key).is_none() {
                debug!(panel = %self.panel.id, key = %key, "ignoring measurement outside panel");
            }
        }

        let results: Vec<ClassifiedMeasurement> = self
            .panel
            .analytes
            .iter()
            .map(|analyte| {
                let value = analyte
                    .keys()
                    .find_map(|candidate| lookup_value(measurements, candidate));
                ClassifiedMeasurement {
                    analyte_id: analyte.id.clone(),
                    name: analyte.name.clone(),
                    value,
                    unit: analyte.unit.clone(),
                    reference_range: analyte.reference_range,
                    status: self.classifier.classify(value, &analyte.reference_range),
                }
            })
            .collect();

        debug!(
            panel = %self.panel.id,
            analytes = results.len(),
            supplied = measurements.len(),
            "built report"
        );

        Report {
            panel_id: self.panel.id.clone(),
            results,
        }
    }
}

/// Giá trị cho một khóa: khớp chính xác trước, sau đó khớp không phân biệt
/// hoa thường (bỏ khoảng trắng hai đầu), chọn khóa nhỏ nhất để ổn định.
fn lookup_value(measurements: &Measurements, candidate: &str) -> Option<f64> {
    if let Some(value) = measurements.get(candidate).copied().flatten() {
        return Some(value);
    }

    measurements
        .iter()
        .filter(|(key, value)| value.is_some() && key.trim().eq_ignore_ascii_case(candidate))
        .min_by(|(left, _), (right, _)| left.cmp(right))
        .and_then(|(_, value)| *value)
}
