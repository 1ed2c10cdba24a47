//! Bảng chỉ số (panel) và catalog các bảng có sẵn.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{PanelError, ReferenceInterval};

/// Một chỉ số trong bảng: mã, tên hiển thị, đơn vị, khoảng tham chiếu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyteDefinition {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub reference_range: ReferenceInterval,
    /// Tên khác của chỉ số trong form nhập tay (vd. `wbc`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl AnalyteDefinition {
    /// Các khóa nhận diện chỉ số: mã trước, sau đó tới bí danh.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    fn matches_key(&self, key: &str) -> bool {
        self.keys().any(|candidate| candidate.eq_ignore_ascii_case(key))
    }
}

/// Bảng chỉ số cố định, thứ tự khai báo là thứ tự hiển thị.
///
/// Khi đọc từ JSON, bảng được kiểm tra bằng `validate` ngay lúc deserialize.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "PanelDefinitionRepr")]
pub struct PanelDefinition {
    pub id: String,
    pub name: String,
    /// Loại mẫu bệnh phẩm, nếu phòng xét nghiệm ghi rõ.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specimen: Option<String>,
    pub analytes: Vec<AnalyteDefinition>,
}

#[derive(Deserialize)]
struct PanelDefinitionRepr {
    id: String,
    name: String,
    #[serde(default)]
    specimen: Option<String>,
    analytes: Vec<AnalyteDefinition>,
}

impl TryFrom<PanelDefinitionRepr> for PanelDefinition {
    type Error = PanelError;

    fn try_from(repr: PanelDefinitionRepr) -> Result<Self, Self::Error> {
        let panel = Self {
            id: repr.id,
            name: repr.name,
            specimen: repr.specimen,
            analytes: repr.analytes,
        };
        panel.validate()?;
        Ok(panel)
    }
}

impl PanelDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        analytes: Vec<AnalyteDefinition>,
    ) -> Result<Self, PanelError> {
        let panel = Self {
            id: id.into(),
            name: name.into(),
            specimen: None,
            analytes,
        };
        panel.validate()?;
        Ok(panel)
    }

    pub fn with_specimen(mut self, specimen: impl Into<String>) -> Self {
        self.specimen = Some(specimen.into());
        self
    }

    /// Kiểm tra cấu trúc bảng: không rỗng, không trùng mã hay bí danh.
    ///
    /// Khoảng tham chiếu đã được kiểm tra khi dựng `ReferenceInterval`.
    pub fn validate(&self) -> Result<(), PanelError> {
        if self.analytes.is_empty() {
            return Err(PanelError::EmptyPanel(self.id.clone()));
        }

        let mut seen = HashSet::new();
        for analyte in &self.analytes {
            if analyte.id.trim().is_empty() {
                return Err(PanelError::BlankAnalyteId(self.id.clone()));
            }
            for key in analyte.keys() {
                if !seen.insert(key.to_ascii_lowercase()) {
                    return Err(PanelError::DuplicateKey {
                        panel: self.id.clone(),
                        key: key.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.analytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analytes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AnalyteDefinition> {
        self.analytes.iter().find(|analyte| analyte.id == id)
    }

    /// Tìm chỉ số theo mã hoặc bí danh, không phân biệt hoa thường.
    pub fn resolve_key(&self, key: &str) -> Option<&AnalyteDefinition> {
        let key = key.trim();
        self.analytes.iter().find(|analyte| analyte.matches_key(key))
    }

    /// Tổng phân tích tế bào máu cơ bản, công thức bạch cầu chỉ theo %.
    pub fn basic_cbc() -> Result<Self, PanelError> {
        from_rows(PanelCatalog::BASIC_CBC, "Complete Blood Count", BASIC_CBC_ROWS)
    }

    /// Bảng mở rộng theo đơn vị SI, có cả số lượng tuyệt đối.
    pub fn extended_cbc() -> Result<Self, PanelError> {
        Ok(from_rows(
            PanelCatalog::EXTENDED_CBC,
            "Complete Blood Count with Differential",
            EXTENDED_CBC_ROWS,
        )?
        .with_specimen("Venous whole blood (EDTA)"))
    }
}

struct AnalyteRow {
    id: &'static str,
    name: &'static str,
    unit: &'static str,
    range: &'static str,
    aliases: &'static [&'static str],
}

const fn row(
    id: &'static str,
    name: &'static str,
    unit: &'static str,
    range: &'static str,
    aliases: &'static [&'static str],
) -> AnalyteRow {
    AnalyteRow {
        id,
        name,
        unit,
        range,
        aliases,
    }
}

const BASIC_CBC_ROWS: &[AnalyteRow] = &[
    row("hemoglobin", "Hemoglobin", "g/dL", "13.5-17.5", &["hgb", "hb"]),
    row("white_blood_cells", "White Blood Cells", "×10³/µL", "4.5-11.0", &["wbc"]),
    row("red_blood_cells", "Red Blood Cells", "×10⁶/µL", "4.5-5.9", &["rbc"]),
    row("platelets", "Platelets", "×10³/µL", "150-450", &["plt"]),
    row("hematocrit", "Hematocrit", "%", "41-50", &["hct"]),
    row("mcv", "MCV", "fL", "80-96", &[]),
    row("mch", "MCH", "pg", "27-33", &[]),
    row("mchc", "MCHC", "g/dL", "32-36", &[]),
    row("neutrophils_percent", "Neutrophils", "%", "40-60", &["neutrophils"]),
    row("lymphocytes_percent", "Lymphocytes", "%", "20-40", &["lymphocytes"]),
    row("monocytes_percent", "Monocytes", "%", "2-8", &["monocytes"]),
    row("eosinophils_percent", "Eosinophils", "%", "1-4", &["eosinophils"]),
    row("basophils_percent", "Basophils", "%", "0-1", &["basophils"]),
];

// Một số khoảng được ghi theo kiểu châu Âu (dấu phẩy thập phân).
const EXTENDED_CBC_ROWS: &[AnalyteRow] = &[
    row("hemoglobin", "Hemoglobin", "g/L", "120-140", &["hgb", "hb"]),
    row("white_blood_cells", "White Blood Cells", "×10⁹/L", "4.5-11.0", &["wbc"]),
    row("red_blood_cells", "Red Blood Cells", "×10¹²/L", "3,8 - 5,3", &["rbc"]),
    row("platelets", "Platelets", "×10⁹/L", "150-450", &["plt"]),
    row("neutrophils_percent", "Neutrophils, %", "%", "47-72", &["neutrophils"]),
    row("neutrophils_absolute", "Neutrophils, abs.", "×10⁹/L", "1,8 - 7,7", &[]),
    row("lymphocytes_percent", "Lymphocytes, %", "%", "19-37", &["lymphocytes"]),
    row("lymphocytes_absolute", "Lymphocytes, abs.", "×10⁹/L", "1,0 - 4,8", &[]),
    row("monocytes_percent", "Monocytes, %", "%", "3-11", &["monocytes"]),
    row("monocytes_absolute", "Monocytes, abs.", "×10⁹/L", "0,05 - 0,82", &[]),
    row("eosinophils_percent", "Eosinophils, %", "%", "0.5-5", &["eosinophils"]),
    row("eosinophils_absolute", "Eosinophils, abs.", "×10⁹/L", "0,02 - 0,5", &[]),
    row("basophils_percent", "Basophils, %", "%", "0-1", &["basophils"]),
    row("basophils_absolute", "Basophils, abs.", "×10⁹/L", "0 - 0,08", &[]),
];

fn from_rows(id: &str, name: &str, rows: &[AnalyteRow]) -> Result<PanelDefinition, PanelError> {
    let analytes = rows
        .iter()
        .map(|row| -> Result<AnalyteDefinition, PanelError> {
            Ok(AnalyteDefinition {
                id: row.id.to_string(),
                name: row.name.to_string(),
                unit: row.unit.to_string(),
                reference_range: row.range.parse()?,
                aliases: row.aliases.iter().map(|alias| alias.to_string()).collect(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    PanelDefinition::new(id, name, analytes)
}

/// Tập các bảng chỉ số có thể chọn theo mã.
#[derive(Debug, Clone, Default)]
pub struct PanelCatalog {
    panels: Vec<PanelDefinition>,
}

impl PanelCatalog {
    pub const BASIC_CBC: &'static str = "cbc-basic";
    pub const EXTENDED_CBC: &'static str = "cbc-extended";

    /// Catalog gồm hai bảng dựng sẵn.
    pub fn builtin() -> Result<Self, PanelError> {
        let mut catalog = Self::default();
        catalog.insert(PanelDefinition::basic_cbc()?)?;
        catalog.insert(PanelDefinition::extended_cbc()?)?;
        Ok(catalog)
    }

    /// Thêm bảng mới hoặc thay bảng trùng mã.
    pub fn insert(&mut self, panel: PanelDefinition) -> Result<(), PanelError> {
        panel.validate()?;
        match self.panels.iter_mut().find(|existing| existing.id == panel.id) {
            Some(existing) => *existing = panel,
            None => self.panels.push(panel),
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&PanelDefinition, PanelError> {
        self.panels
            .iter()
            .find(|panel| panel.id == id)
            .ok_or_else(|| PanelError::UnknownPanel(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.panels.iter().map(|panel| panel.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyte(id: &str, range: &str, aliases: &[&str]) -> AnalyteDefinition {
        AnalyteDefinition {
            id: id.to_string(),
            name: id.to_uppercase(),
            unit: "u".to_string(),
            reference_range: range.parse().unwrap(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn builtin_panels_load() {
        let basic = PanelDefinition::basic_cbc().unwrap();
        assert_eq!(basic.len(), 13);
        assert_eq!(basic.analytes[0].id, "hemoglobin");
        assert_eq!(basic.get("hemoglobin").unwrap().unit, "g/dL");

        let extended = PanelDefinition::extended_cbc().unwrap();
        assert_eq!(extended.len(), 14);
        assert_eq!(extended.get("hemoglobin").unwrap().unit, "g/L");
        assert!(extended.specimen.is_some());

        let rbc = extended.get("red_blood_cells").unwrap().reference_range;
        assert_eq!((rbc.min(), rbc.max()), (3.8, 5.3));
    }

    #[test]
    fn resolves_aliases_case_insensitively() {
        let panel = PanelDefinition::basic_cbc().unwrap();
        assert_eq!(panel.resolve_key("WBC").unwrap().id, "white_blood_cells");
        assert_eq!(panel.resolve_key(" neutrophils ").unwrap().id, "neutrophils_percent");
        assert_eq!(panel.resolve_key("platelets").unwrap().id, "platelets");
        assert!(panel.resolve_key("ferritin").is_none());
    }

    #[test]
    fn empty_panel_is_rejected() {
        assert_eq!(
            PanelDefinition::new("empty", "Empty", Vec::new()),
            Err(PanelError::EmptyPanel("empty".to_string()))
        );
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let err = PanelDefinition::new(
            "dup",
            "Dup",
            vec![analyte("a", "1-2", &["x"]), analyte("b", "1-2", &["X"])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            PanelError::DuplicateKey {
                panel: "dup".to_string(),
                key: "X".to_string()
            }
        );
    }

    #[test]
    fn blank_id_is_rejected() {
        let err = PanelDefinition::new("p", "P", vec![analyte("  ", "1-2", &[])]).unwrap_err();
        assert_eq!(err, PanelError::BlankAnalyteId("p".to_string()));
    }

    #[test]
    fn panel_deserialization_validates_intervals() {
        let json = r#"{
            "id": "custom",
            "name": "Custom",
            "analytes": [
                { "id": "hemoglobin", "name": "Hb", "unit": "g/L", "reference_range": "140-120" }
            ]
        }"#;
        assert!(serde_json::from_str::<PanelDefinition>(json).is_err());
    }

    #[test]
    fn panel_deserialization_validates_structure() {
        let empty = r#"{ "id": "empty", "name": "Empty", "analytes": [] }"#;
        let err = serde_json::from_str::<PanelDefinition>(empty).unwrap_err();
        assert!(err.to_string().contains("không có chỉ số nào"));

        let duplicate = r#"{
            "id": "dup",
            "name": "Dup",
            "analytes": [
                { "id": "a", "name": "A", "unit": "u", "reference_range": "1-2", "aliases": ["x"] },
                { "id": "b", "name": "B", "unit": "u", "reference_range": "1-2", "aliases": ["X"] }
            ]
        }"#;
        let err = serde_json::from_str::<PanelDefinition>(duplicate).unwrap_err();
        assert!(err.to_string().contains("bị trùng"));
    }

    #[test]
    fn builtin_panel_survives_json_round_trip() {
        let panel = PanelDefinition::extended_cbc().unwrap();
        let json = serde_json::to_string(&panel).unwrap();
        let back: PanelDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, panel);
    }

    #[test]
    fn catalog_lookup_and_replace() {
        let mut catalog = PanelCatalog::builtin().unwrap();
        assert_eq!(
            catalog.ids().collect::<Vec<_>>(),
            vec!["cbc-basic", "cbc-extended"]
        );

        let replacement =
            PanelDefinition::new("cbc-basic", "Tiny", vec![analyte("hemoglobin", "1-2", &[])])
                .unwrap();
        catalog.insert(replacement).unwrap();
        assert_eq!(catalog.get("cbc-basic").unwrap().len(), 1);
        assert_eq!(catalog.ids().count(), 2);

        assert_eq!(
            catalog.get("lipid").unwrap_err(),
            PanelError::UnknownPanel("lipid".to_string())
        );
    }

    #[test]
    fn catalog_rejects_invalid_panel() {
        let mut catalog = PanelCatalog::default();
        let invalid = PanelDefinition {
            id: "bad".to_string(),
            name: "Bad".to_string(),
            specimen: None,
            analytes: Vec::new(),
        };
        assert!(catalog.insert(invalid).is_err());
        assert_eq!(catalog.ids().count(), 0);
    }
}
