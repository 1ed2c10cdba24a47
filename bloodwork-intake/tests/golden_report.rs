use std::fs;

use bloodwork_core::{PanelCatalog, ReportConfig};
use bloodwork_intake::{apply_interpretation, build_report_str, AnalysisRequest, InterpretationResponse};
use serde_json::Value;

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("Không đọc được file mẫu")
}

fn extended_config() -> ReportConfig {
    ReportConfig {
        panel: PanelCatalog::EXTENDED_CBC.to_string(),
        ..ReportConfig::default()
    }
}

#[test]
fn parsed_values_match_golden_report() {
    let catalog = PanelCatalog::builtin().expect("Catalog dựng sẵn không hợp lệ");
    let report = build_report_str(&read_fixture("parsed_values.json"), &catalog, &extended_config())
        .expect("Không tạo được báo cáo");

    let actual = serde_json::to_value(&report).expect("Không serialize báo cáo");
    let expected: Value =
        serde_json::from_str(&read_fixture("parsed_report.json")).expect("Golden không hợp lệ");

    assert_eq!(actual, expected);
}

#[test]
fn request_payload_matches_golden() {
    let catalog = PanelCatalog::builtin().expect("Catalog dựng sẵn không hợp lệ");
    let report = build_report_str(&read_fixture("parsed_values.json"), &catalog, &extended_config())
        .expect("Không tạo được báo cáo");

    let request = AnalysisRequest::from_report(&report).expect("Đơn vị không khớp hợp đồng");
    let actual = serde_json::to_value(request).expect("Không serialize payload");
    let expected: Value = serde_json::from_str(&read_fixture("analysis_request.json"))
        .expect("Golden không hợp lệ");

    assert_eq!(actual, expected);
}

#[test]
fn interpretation_escalates_critical_rows_only() {
    let catalog = PanelCatalog::builtin().expect("Catalog dựng sẵn không hợp lệ");
    let report = build_report_str(&read_fixture("parsed_values.json"), &catalog, &extended_config())
        .expect("Không tạo được báo cáo");
    let response = InterpretationResponse::from_json_str(&read_fixture("interpretation_response.json"))
        .expect("Phản hồi mẫu không hợp lệ");

    let interpreted = apply_interpretation(report, response);

    let mut actual = serde_json::to_value(&interpreted).expect("Không serialize kết quả");
    normalize_dynamic_fields(&mut actual);

    let statuses: Vec<&str> = actual["report"]["results"]
        .as_array()
        .expect("Thiếu danh sách kết quả")
        .iter()
        .filter_map(|row| row["status"].as_str())
        .collect();
    assert_eq!(
        statuses,
        vec![
            "normal", "high", "normal", "critical", "high", "high", "normal", "normal", "normal",
            "normal", "normal", "unknown", "normal", "unknown"
        ]
    );

    assert_eq!(actual["received_at"], Value::String("__DYNAMIC_TIMESTAMP__".to_string()));
    assert_eq!(actual["summary"]["abnormal"], Value::from(6));
    assert_eq!(actual["summary"]["verdict"], Value::from("abnormalities_detected"));
    assert_eq!(actual["inflammation_index"], Value::from(5.37));
    assert_eq!(actual["recommendations"].as_array().map(Vec::len), Some(2));
}

fn normalize_dynamic_fields(value: &mut Value) {
    if let Some(obj) = value.as_object_mut() {
        if obj.contains_key("received_at") {
            obj.insert(
                "received_at".to_string(),
                Value::String("__DYNAMIC_TIMESTAMP__".to_string()),
            );
        }
    }
}
