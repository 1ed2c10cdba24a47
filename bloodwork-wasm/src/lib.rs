//! Bridge WASM <-> JavaScript trung lập framework.

use std::collections::HashMap;

use bloodwork_core::{MissingValuePolicy, PanelCatalog, Report, ReportConfig};
use bloodwork_intake::{
    apply_interpretation, build_report_value, catalog_with_panels, patient_from_form,
    AnalysisRequest, IntakeError, InterpretationResponse,
};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

#[derive(Default, Deserialize)]
struct JsReportConfig {
    #[serde(default)]
    panel: Option<String>,
    #[serde(default)]
    missing_value_policy: Option<MissingValuePolicy>,
    /// Bảng chỉ số bổ sung, cùng định dạng JSON với file cấu hình.
    #[serde(default)]
    panels: Option<serde_json::Value>,
}

impl JsReportConfig {
    fn report_config(&self) -> ReportConfig {
        let mut base = ReportConfig::default();
        if let Some(panel) = &self.panel {
            base.panel = panel.clone();
        }
        if let Some(policy) = self.missing_value_policy {
            base.missing_value_policy = policy;
        }
        base
    }

    fn catalog(&self) -> Result<PanelCatalog, IntakeError> {
        match &self.panels {
            Some(panels) => catalog_with_panels(&panels.to_string()),
            None => Ok(PanelCatalog::builtin()?),
        }
    }
}

fn read_config(config: Option<JsValue>) -> Result<JsReportConfig, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => from_value(js_cfg)
            .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}"))),
        _ => Ok(JsReportConfig::default()),
    }
}

/// Dựng báo cáo từ object giá trị xét nghiệm (form hoặc kết quả parse).
#[wasm_bindgen]
pub fn build_report(values: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let values = from_value::<serde_json::Value>(values)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được giá trị xét nghiệm: {err}")))?;

    let cfg = read_config(config)?;
    let catalog = cfg.catalog().map_err(format_intake_error)?;
    let report = build_report_value(&values, &catalog, &cfg.report_config())
        .map_err(format_intake_error)?;

    to_js(&report, "báo cáo")
}

/// Payload gửi dịch vụ phân tích từ xa, dựng từ một báo cáo đã có.
#[wasm_bindgen]
pub fn analysis_request(report: JsValue) -> Result<JsValue, JsValue> {
    let report: Report = from_value(report)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được báo cáo: {err}")))?;
    let request = AnalysisRequest::from_report(&report).map_err(format_intake_error)?;

    to_js(&request, "payload")
}

/// Kiểm tra tuổi (1-120) và giới tính trong form nhập tay trước khi gửi.
#[wasm_bindgen]
pub fn patient_details(fields: JsValue) -> Result<JsValue, JsValue> {
    let fields: HashMap<String, String> = from_value(fields)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được form: {err}")))?;
    let patient = patient_from_form(&fields).map_err(format_intake_error)?;

    to_js(&patient, "thông tin bệnh nhân")
}

/// Gộp phản hồi của dịch vụ phân tích vào báo cáo để chuyển sang màn hình kết quả.
#[wasm_bindgen]
pub fn interpret_report(report: JsValue, response: JsValue) -> Result<JsValue, JsValue> {
    let report: Report = from_value(report)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được báo cáo: {err}")))?;
    let response: InterpretationResponse = from_value(response)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được phản hồi: {err}")))?;

    let interpreted = apply_interpretation(report, response);

    to_js(&interpreted, "kết quả")
}

// Object JS thuần và `null` thay cho `Map`/`undefined`.
fn to_js<T: Serialize>(value: &T, what: &str) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Không serialize {what}: {err}")))
}

fn format_intake_error(err: IntakeError) -> JsValue {
    JsValue::from_str(&format!("Report error: {err}"))
}
