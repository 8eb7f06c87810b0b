//! Typed decoding of the IMF SDMX-JSON documents.
//!
//! The upstream serializes XML into JSON, so any element that may repeat is
//! emitted as a bare object when it occurs once and as an array otherwise.
//! [`OneOrMany`] absorbs both shapes.

use crate::registry::IndicatorInfo;
use serde::Deserialize;
use thiserror::Error;

pub const FREQUENCY_LIST: &str = "CL_FREQ";
pub const AREA_LIST: &str = "CL_AREA_PCPS";
pub const INDICATOR_LIST: &str = "CL_INDICATOR_PCPS";
pub const UNIT_LIST: &str = "CL_UNIT_PCPS";

const MISSING_DESCRIPTION: &str = "N/A";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed SDMX document: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single element or an array of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.first(),
        }
    }
}

fn flatten<T>(items: Option<OneOrMany<T>>) -> Vec<T> {
    items.map(OneOrMany::into_vec).unwrap_or_default()
}

/// Scalar attribute that may arrive as a JSON string or a JSON number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(f64),
}

impl Scalar {
    pub fn into_text(self) -> String {
        match self {
            Scalar::Text(text) => text,
            Scalar::Number(n) => n.to_string(),
        }
    }
}

// DataStructure/PCPS

#[derive(Debug, Deserialize)]
struct StructureDocument {
    #[serde(rename = "Structure")]
    structure: Structure,
}

#[derive(Debug, Deserialize)]
struct Structure {
    #[serde(rename = "CodeLists")]
    code_lists: Option<CodeLists>,
}

#[derive(Debug, Deserialize)]
struct CodeLists {
    #[serde(rename = "CodeList")]
    code_list: Option<OneOrMany<RawCodeList>>,
}

#[derive(Debug, Deserialize)]
struct RawCodeList {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "Code")]
    codes: Option<OneOrMany<RawCode>>,
}

#[derive(Debug, Deserialize)]
struct RawCode {
    #[serde(rename = "@value")]
    value: String,
    #[serde(rename = "Description")]
    description: Option<OneOrMany<RawDescription>>,
}

#[derive(Debug, Deserialize)]
struct RawDescription {
    #[serde(rename = "#text")]
    text: Option<String>,
}

/// One code of a code list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeEntry {
    pub code: String,
    pub description: String,
}

/// The code lists the ingestion plan is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataStructure {
    pub frequencies: Vec<CodeEntry>,
    pub areas: Vec<CodeEntry>,
    pub indicators: Vec<CodeEntry>,
    pub units: Vec<CodeEntry>,
}

impl DataStructure {
    pub fn from_json(body: &str) -> Result<Self, DecodeError> {
        let document: StructureDocument = serde_json::from_str(body)?;
        let lists = document
            .structure
            .code_lists
            .map(|lists| flatten(lists.code_list))
            .unwrap_or_default();

        let mut structure = DataStructure::default();
        for list in lists {
            let target = match list.id.as_str() {
                FREQUENCY_LIST => &mut structure.frequencies,
                AREA_LIST => &mut structure.areas,
                INDICATOR_LIST => &mut structure.indicators,
                UNIT_LIST => &mut structure.units,
                _ => continue,
            };
            let placeholder = format!("All_{}", list.id);
            target.extend(
                flatten(list.codes)
                    .into_iter()
                    .filter(|code| !code.value.starts_with(&placeholder))
                    .map(|code| CodeEntry {
                        description: code
                            .description
                            .as_ref()
                            .and_then(OneOrMany::first)
                            .and_then(|d| d.text.clone())
                            .unwrap_or_else(|| MISSING_DESCRIPTION.to_string()),
                        code: code.value,
                    }),
            );
        }
        Ok(structure)
    }

    /// The indicator code list as a registry listing.
    pub fn indicator_listing(&self) -> Vec<IndicatorInfo> {
        self.indicators
            .iter()
            .map(|entry| IndicatorInfo::new(entry.code.clone(), entry.description.clone()))
            .collect()
    }

    pub fn has_unit(&self, code: &str) -> bool {
        self.units.iter().any(|unit| unit.code == code)
    }
}

// CompactData/PCPS/{key}

#[derive(Debug, Deserialize)]
struct CompactDocument {
    #[serde(rename = "CompactData")]
    compact_data: CompactData,
}

#[derive(Debug, Deserialize)]
struct CompactData {
    #[serde(rename = "DataSet")]
    data_set: DataSet,
}

#[derive(Debug, Deserialize)]
struct DataSet {
    #[serde(rename = "Series")]
    series: Option<OneOrMany<RawSeries>>,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    #[serde(rename = "@FREQ")]
    frequency: Option<String>,
    #[serde(rename = "@REF_AREA")]
    area: Option<String>,
    #[serde(rename = "@COMMODITY")]
    commodity: Option<String>,
    #[serde(rename = "@UNIT_MEASURE")]
    unit: Option<String>,
    #[serde(rename = "@BASE_YEAR")]
    base_year: Option<Scalar>,
    #[serde(rename = "Obs")]
    observations: Option<OneOrMany<RawObs>>,
}

#[derive(Debug, Deserialize)]
struct RawObs {
    #[serde(rename = "@TIME_PERIOD")]
    time_period: Option<String>,
    #[serde(rename = "@OBS_VALUE")]
    value: Option<Scalar>,
}

/// One undecoded observation: period text and value text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationRow {
    pub time_period: String,
    pub value: String,
}

/// One series of a CompactData response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdmxSeries {
    pub frequency: Option<String>,
    pub area: Option<String>,
    pub commodity: Option<String>,
    pub unit: Option<String>,
    pub base_year: Option<String>,
    pub rows: Vec<ObservationRow>,
    /// Observations missing a period or a value
    pub incomplete: usize,
}

/// Decodes a CompactData response. A response without any series decodes
/// to an empty vector.
pub fn decode_compact_data(body: &str) -> Result<Vec<SdmxSeries>, DecodeError> {
    let document: CompactDocument = serde_json::from_str(body)?;
    Ok(flatten(document.compact_data.data_set.series)
        .into_iter()
        .map(|raw| {
            let mut series = SdmxSeries {
                frequency: raw.frequency,
                area: raw.area,
                commodity: raw.commodity,
                unit: raw.unit,
                base_year: raw.base_year.map(Scalar::into_text),
                ..SdmxSeries::default()
            };
            for obs in flatten(raw.observations) {
                match (obs.time_period, obs.value) {
                    (Some(time_period), Some(value)) => series.rows.push(ObservationRow {
                        time_period,
                        value: value.into_text(),
                    }),
                    _ => series.incomplete += 1,
                }
            }
            series
        })
        .collect())
}
