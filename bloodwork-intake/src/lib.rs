//! Intake for blood-test values: form fields and parse-endpoint JSON in,
//! `Report` out, plus the request/response contract of the remote
//! interpretation service.

use std::collections::HashMap;

use bloodwork_core::{
    parse_lab_number, Measurements, PanelCatalog, PanelDefinition, PanelError, Report,
    ReportBuilder, ReportConfig, ReportSummary, Status,
};
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

/// Analyte keys accepted by the remote interpretation service, in payload order.
pub const REQUEST_KEYS: [&str; 14] = [
    "hemoglobin",
    "white_blood_cells",
    "red_blood_cells",
    "platelets",
    "neutrophils_percent",
    "neutrophils_absolute",
    "lymphocytes_percent",
    "lymphocytes_absolute",
    "monocytes_percent",
    "monocytes_absolute",
    "eosinophils_percent",
    "eosinophils_absolute",
    "basophils_percent",
    "basophils_absolute",
];

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Invalid panel configuration: {0}")]
    Panel(#[from] PanelError),
    #[error("Could not read JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected a JSON object of analyte values, received {0}")]
    NotAnObject(&'static str),
    #[error("{analyte} is reported in {unit:?}, the interpretation service expects {expected:?}")]
    UnitMismatch {
        analyte: String,
        unit: String,
        expected: &'static str,
    },
    #[error("Required form field {0:?} is missing")]
    MissingField(&'static str),
    #[error("Form field {field:?} has an invalid value {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Normalize manual-entry form fields (keyed by analyte id or alias).
///
/// Blank fields count as missing. Fields that belong to no analyte of the
/// panel are skipped; age and gender are read by `patient_from_form`.
pub fn measurements_from_form(
    fields: &HashMap<String, String>,
    panel: &PanelDefinition,
) -> Measurements {
    let mut measurements = Measurements::new();

    for (key, raw) in fields {
        let Some(analyte) = panel.resolve_key(key) else {
            debug!(field = %key, "form field outside panel");
            continue;
        };

        let value = parse_lab_number(raw);
        if value.is_none() && !raw.trim().is_empty() {
            warn!(analyte = %analyte.id, input = %raw, "unparseable form value");
        }

        merge_value(&mut measurements, &analyte.id, value);
    }

    measurements
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// Patient details the manual-entry form requires before submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatientDetails {
    pub age: u8,
    pub gender: Gender,
}

/// Read and check `age` (1-120) and `gender` (`male` / `female`) form fields.
pub fn patient_from_form(fields: &HashMap<String, String>) -> Result<PatientDetails, IntakeError> {
    let age_raw = form_field(fields, "age").ok_or(IntakeError::MissingField("age"))?;
    let age = age_raw
        .parse::<u8>()
        .ok()
        .filter(|age| (1..=120).contains(age))
        .ok_or_else(|| IntakeError::InvalidField {
            field: "age",
            value: age_raw.to_string(),
        })?;

    let gender_raw = form_field(fields, "gender").ok_or(IntakeError::MissingField("gender"))?;
    let gender = match gender_raw.to_ascii_lowercase().as_str() {
        "male" => Gender::Male,
        "female" => Gender::Female,
        _ => {
            return Err(IntakeError::InvalidField {
                field: "gender",
                value: gender_raw.to_string(),
            })
        }
    };

    Ok(PatientDetails { age, gender })
}

// Trimmed, non-blank value of a field whose key matches case-insensitively.
fn form_field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// Normalize a parse-endpoint response from a JSON string.
pub fn measurements_from_str(
    values_json: &str,
    panel: &PanelDefinition,
) -> Result<Measurements, IntakeError> {
    let value: Value = serde_json::from_str(values_json)?;
    measurements_from_value(&value, panel)
}

/// Normalize a parse-endpoint response.
///
/// Accepts `{ "values": { ... } }` or a flat object. Each value may be a
/// number, a numeric string, `null`, or an object carrying a `value` field.
pub fn measurements_from_value(
    response: &Value,
    panel: &PanelDefinition,
) -> Result<Measurements, IntakeError> {
    let object = response
        .as_object()
        .ok_or_else(|| IntakeError::NotAnObject(json_kind(response)))?;

    let values = match object.get("values") {
        Some(Value::Object(inner)) => inner,
        Some(other) => return Err(IntakeError::NotAnObject(json_kind(other))),
        None => object,
    };

    let mut measurements = Measurements::new();

    for (key, raw) in values {
        let Some(analyte) = panel.resolve_key(key) else {
            debug!(key = %key, "parsed value outside panel");
            continue;
        };

        let value = numeric_value(raw);
        if value.is_none() && !raw.is_null() {
            warn!(analyte = %analyte.id, input = %raw, "unparseable parsed value");
        }

        merge_value(&mut measurements, &analyte.id, value);
    }

    Ok(measurements)
}

// A value already supplied under another key for the same analyte wins over a missing one.
fn merge_value(measurements: &mut Measurements, id: &str, value: Option<f64>) {
    let slot = measurements.entry(id.to_string()).or_insert(None);
    if value.is_some() {
        *slot = value;
    }
}

fn numeric_value(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_lab_number(text),
        Value::Object(inner) => inner.get("value").and_then(numeric_value),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Build a report from parse-endpoint JSON using a panel from `catalog`.
pub fn build_report_str(
    values_json: &str,
    catalog: &PanelCatalog,
    config: &ReportConfig,
) -> Result<Report, IntakeError> {
    let value: Value = serde_json::from_str(values_json)?;
    build_report_value(&value, catalog, config)
}

pub fn build_report_value(
    values: &Value,
    catalog: &PanelCatalog,
    config: &ReportConfig,
) -> Result<Report, IntakeError> {
    let panel = catalog.get(&config.panel)?;
    let measurements = measurements_from_value(values, panel)?;
    Ok(ReportBuilder::new(panel)
        .with_missing_value_policy(config.missing_value_policy)
        .build(&measurements))
}

/// Load one panel or an array of panels from JSON.
///
/// Intervals and panel structure are checked while deserializing.
pub fn load_panels_str(panels_json: &str) -> Result<Vec<PanelDefinition>, IntakeError> {
    let value: Value = serde_json::from_str(panels_json)?;
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

/// Built-in catalog extended with (or overridden by) panels loaded from JSON.
pub fn catalog_with_panels(panels_json: &str) -> Result<PanelCatalog, IntakeError> {
    let mut catalog = PanelCatalog::builtin()?;
    for panel in load_panels_str(panels_json)? {
        debug!(panel = %panel.id, analytes = panel.len(), "loaded panel");
        catalog.insert(panel)?;
    }
    Ok(catalog)
}

/// Unit the interpretation service expects for a request key.
pub fn contract_unit(key: &str) -> &'static str {
    match key {
        "hemoglobin" => "g/L",
        "red_blood_cells" => "×10¹²/L",
        key if key.ends_with("_percent") => "%",
        _ => "×10⁹/L",
    }
}

// Convert a panel value into the contract unit, or refuse an unknown unit.
fn to_contract_unit(key: &str, value: f64, unit: &str) -> Result<f64, IntakeError> {
    let expected = contract_unit(key);
    let factor = match (expected, unit.trim()) {
        (expected, unit) if expected == unit => 1.0,
        ("g/L", "g/dL") => 10.0,
        ("×10⁹/L", "×10³/µL") | ("×10¹²/L", "×10⁶/µL") => 1.0,
        _ => {
            return Err(IntakeError::UnitMismatch {
                analyte: key.to_string(),
                unit: unit.to_string(),
                expected,
            })
        }
    };
    Ok(value * factor)
}

/// Flat payload for the remote interpretation service.
///
/// Values are always in the contract units of `contract_unit`: panels
/// reported in conventional units (g/dL, ×10³/µL, ×10⁶/µL) are converted,
/// anything else is rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisRequest {
    values: Vec<(&'static str, f64)>,
}

impl AnalysisRequest {
    /// Keep the contract keys that carry a value, using the panel's units.
    /// Missing values and keys the panel does not define are omitted.
    pub fn from_measurements(
        measurements: &Measurements,
        panel: &PanelDefinition,
    ) -> Result<Self, IntakeError> {
        let mut values = Vec::new();
        for key in REQUEST_KEYS {
            let (Some(analyte), Some(value)) =
                (panel.get(key), measurements.get(key).copied().flatten())
            else {
                continue;
            };
            values.push((key, to_contract_unit(key, value, &analyte.unit)?));
        }
        Ok(Self { values })
    }

    pub fn from_report(report: &Report) -> Result<Self, IntakeError> {
        let mut values = Vec::new();
        for key in REQUEST_KEYS {
            let Some((record, value)) = report
                .results()
                .iter()
                .find(|record| record.analyte_id == key)
                .and_then(|record| record.value.map(|value| (record, value)))
            else {
                continue;
            };
            values.push((key, to_contract_unit(key, value, &record.unit)?));
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, value)| *value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for AnalysisRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// One result row as returned by the remote service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResult {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub reference_range: String,
    pub status: Status,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InterpretationResponse {
    #[serde(default)]
    pub results: Vec<RemoteResult>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default, alias = "inflammationIndex")]
    pub inflammation_index: Option<f64>,
}

impl InterpretationResponse {
    pub fn from_json_str(response_json: &str) -> Result<Self, IntakeError> {
        Ok(serde_json::from_str(response_json)?)
    }
}

/// Report plus the remote narrative, handed to the results screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterpretedReport {
    pub received_at: DateTime<Utc>,
    pub report: Report,
    pub summary: ReportSummary,
    pub explanation: String,
    pub recommendations: Vec<String>,
    pub inflammation_index: Option<f64>,
}

/// Merge a remote verdict into a locally built report.
///
/// Rows are matched by display name (case-insensitive) or analyte id. Only a
/// remote `critical` replaces the local status; range statuses stay local.
pub fn apply_interpretation(
    report: Report,
    response: InterpretationResponse,
) -> InterpretedReport {
    let report = report.reclassify(|record| {
        let remote = response.results.iter().find(|remote| {
            let name = remote.name.trim();
            name.eq_ignore_ascii_case(&record.name) || name.eq_ignore_ascii_case(&record.analyte_id)
        });

        match remote {
            Some(remote) if remote.status == Status::Critical => Status::Critical,
            Some(remote) => {
                if remote.status != record.status {
                    debug!(
                        analyte = %record.analyte_id,
                        local = record.status.as_str(),
                        remote = remote.status.as_str(),
                        "remote status differs"
                    );
                }
                record.status
            }
            None => record.status,
        }
    });

    InterpretedReport {
        received_at: Utc::now(),
        summary: report.summary(),
        report,
        explanation: response.explanation,
        recommendations: response.recommendations,
        inflammation_index: response.inflammation_index,
    }
}
