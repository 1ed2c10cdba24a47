//! Logic lõi phân loại chỉ số xét nghiệm máu theo khoảng tham chiếu.

use serde::{Deserialize, Serialize};

mod classify;
mod interval;
mod labels;
mod panel;
mod report;

pub use classify::{classify, MissingValuePolicy, RangeClassifier, Status};
pub use interval::{parse_lab_number, ReferenceInterval};
pub use labels::StatusLabels;
pub use panel::{AnalyteDefinition, PanelCatalog, PanelDefinition};
pub use report::{
    ClassifiedMeasurement, Measurements, Report, ReportBuilder, ReportSummary, Verdict,
};

/// Cấu hình chọn bảng chỉ số và cách xử lý giá trị thiếu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportConfig {
    /// Mã bảng chỉ số trong catalog (vd. `cbc-basic`).
    pub panel: String,
    /// Trạng thái gán cho giá trị thiếu hoặc không đọc được.
    #[serde(default)]
    pub missing_value_policy: MissingValuePolicy,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            panel: PanelCatalog::BASIC_CBC.to_string(),
            missing_value_policy: MissingValuePolicy::default(),
        }
    }
}

/// Lỗi cấu hình bảng chỉ số, phát hiện ngay khi nạp.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PanelError {
    #[error("Khoảng tham chiếu không hợp lệ: {0:?}")]
    MalformedInterval(String),
    #[error("Cận của khoảng tham chiếu phải là số hữu hạn: {min}-{max}")]
    NonFiniteBound { min: f64, max: f64 },
    #[error("Cận dưới lớn hơn cận trên: {min}-{max}")]
    InvertedInterval { min: f64, max: f64 },
    #[error("Bảng chỉ số {0:?} không có chỉ số nào")]
    EmptyPanel(String),
    #[error("Bảng chỉ số {0:?} có mã chỉ số rỗng")]
    BlankAnalyteId(String),
    #[error("Mã hoặc bí danh {key:?} bị trùng trong bảng {panel:?}")]
    DuplicateKey { panel: String, key: String },
    #[error("Không tìm thấy bảng chỉ số {0:?}")]
    UnknownPanel(String),
}

/// Dựng báo cáo từ catalog theo cấu hình đã chọn.
pub fn build_report(
    catalog: &PanelCatalog,
    measurements: &Measurements,
    config: &ReportConfig,
) -> Result<Report, PanelError> {
    let panel = catalog.get(&config.panel)?;
    Ok(ReportBuilder::new(panel)
        .with_missing_value_policy(config.missing_value_policy)
        .build(measurements))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_basic_panel_with_unknown_fallback() {
        let config = ReportConfig::default();
        assert_eq!(config.panel, "cbc-basic");
        assert_eq!(config.missing_value_policy, MissingValuePolicy::Unknown);
    }

    #[test]
    fn config_without_policy_deserializes_to_default() {
        let config: ReportConfig =
            serde_json::from_str(r#"{ "panel": "cbc-extended" }"#).unwrap();
        assert_eq!(config.panel, "cbc-extended");
        assert_eq!(config.missing_value_policy, MissingValuePolicy::Unknown);
    }

    #[test]
    fn build_report_rejects_unknown_panel() {
        let catalog = PanelCatalog::builtin().unwrap();
        let config = ReportConfig {
            panel: "lipid".to_string(),
            ..ReportConfig::default()
        };
        let err = build_report(&catalog, &Measurements::new(), &config).unwrap_err();
        assert_eq!(err, PanelError::UnknownPanel("lipid".to_string()));
    }

    #[test]
    fn build_report_applies_configured_policy() {
        let catalog = PanelCatalog::builtin().unwrap();
        let config = ReportConfig {
            panel: PanelCatalog::EXTENDED_CBC.to_string(),
            missing_value_policy: MissingValuePolicy::Normal,
        };
        let report = build_report(&catalog, &Measurements::new(), &config).unwrap();
        assert_eq!(report.panel_id(), "cbc-extended");
        assert!(report.results().iter().all(|r| r.status == Status::Normal));
    }
}
