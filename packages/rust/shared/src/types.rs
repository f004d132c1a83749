//! Domain types for the Codex Alimentarius pesticide-residue data.
//!
//! The remote service publishes a four-level commodity taxonomy:
//!
//! ```text
//! CommodityCategory
//!     └── CommoditySubCategory
//!             └── CommodityType
//!                     └── Commodity        (leaf, used for detail lookups)
//! ```
//!
//! Leaf commodities resolve to [`CommodityDetail`] records whose MRL entries
//! reference pesticides, which in turn resolve to [`PesticideDetail`] records.
//! Wire names (`commCode`, `mrlFormatted`, ...) are mapped to domain names
//! explicitly via serde renames, one table per record type.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Taxonomy tree
// ---------------------------------------------------------------------------

/// Uniform child iteration over the three non-leaf taxonomy levels.
///
/// The returned iterator is forward-only and re-derived from the held
/// children list on every call, so callers may restart it freely.
pub trait ParentNode {
    type Child;

    /// Iterate immediate children. Empty when no children are present.
    fn children(&self) -> std::slice::Iter<'_, Self::Child>;
}

/// Top level of the commodity taxonomy.
#[derive(Debug, Clone, Deserialize)]
pub struct CommodityCategory {
    pub id: String,
    pub metadata: HashMap<String, String>,
    pub data: String,
    pub children: Vec<CommoditySubCategory>,
}

/// Second level of the commodity taxonomy.
#[derive(Debug, Clone, Deserialize)]
pub struct CommoditySubCategory {
    pub id: String,
    pub metadata: HashMap<String, String>,
    pub data: String,
    pub children: Vec<CommodityType>,
}

/// Third level of the commodity taxonomy. The remote omits `children`
/// entirely for types with no commodities underneath.
#[derive(Debug, Clone, Deserialize)]
pub struct CommodityType {
    pub id: String,
    pub metadata: HashMap<String, String>,
    pub data: String,
    #[serde(default)]
    pub children: Option<Vec<Commodity>>,
}

/// Leaf of the commodity taxonomy.
#[derive(Debug, Clone, Deserialize)]
pub struct Commodity {
    pub id: String,
    pub metadata: HashMap<String, String>,
    pub data: String,
}

impl Commodity {
    /// The remote lookup key (`metadata["id"]`), distinct from the node's
    /// own `id`.
    pub fn lookup_id(&self) -> Option<&str> {
        self.metadata.get("id").map(String::as_str)
    }
}

impl ParentNode for CommodityCategory {
    type Child = CommoditySubCategory;

    fn children(&self) -> std::slice::Iter<'_, Self::Child> {
        self.children.iter()
    }
}

impl ParentNode for CommoditySubCategory {
    type Child = CommodityType;

    fn children(&self) -> std::slice::Iter<'_, Self::Child> {
        self.children.iter()
    }
}

impl ParentNode for CommodityType {
    type Child = Commodity;

    fn children(&self) -> std::slice::Iter<'_, Self::Child> {
        self.children.as_deref().unwrap_or(&[]).iter()
    }
}

// ---------------------------------------------------------------------------
// MRL records
// ---------------------------------------------------------------------------

/// The commodity a single MRL entry applies to.
#[derive(Debug, Clone, Deserialize)]
pub struct CommodityRef {
    #[serde(rename = "commCode")]
    pub comm_code: String,
    pub name: String,
}

/// The pesticide a commodity MRL entry references.
#[derive(Debug, Clone, Deserialize)]
pub struct PesticideRef {
    pub name: String,
    pub id: String,
}

/// Codex procedure step for a pesticide MRL entry.
#[derive(Debug, Clone, Deserialize)]
pub struct StepRef {
    #[serde(rename = "stepCode")]
    pub step_code: String,
}

/// Fields shared by both MRL variants.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseMrl {
    /// Numeric limit in mg/kg. The wire sends an empty string when no value
    /// has been established; that must parse as absent, never as zero.
    #[serde(default, deserialize_with = "de_optional_number")]
    pub mrl: Option<f64>,
    #[serde(rename = "mrlFormatted", default)]
    pub mrl_formatted: String,
    pub jmpr: String,
    pub ccpr: String,
    #[serde(rename = "priorCcpr")]
    pub prior_ccpr: String,
    #[serde(rename = "cacYear")]
    pub cac_year: String,
    pub lod: String,
    #[serde(rename = "sourceOfRes")]
    pub source_of_res: String,
    #[serde(rename = "fatPh")]
    pub fat_ph: String,
    pub tev: String,
    pub footnote: String,
    #[serde(rename = "footnoteCcpr")]
    pub footnote_ccpr: String,
    pub commodity: CommodityRef,
}

/// An MRL entry as it appears under a commodity detail.
#[derive(Debug, Clone, Deserialize)]
pub struct CommodityMrl {
    #[serde(flatten)]
    pub base: BaseMrl,
    pub pesticide: PesticideRef,
}

impl CommodityMrl {
    /// Flatten into one tabular row. `commodity_name` is the display name of
    /// the detail record this entry came from, not the nested `name` field.
    pub fn to_row(&self, commodity_name: &str) -> CommodityMrlRow {
        CommodityMrlRow {
            mrl: self.base.mrl,
            mrl_formatted: self.base.mrl_formatted.clone(),
            jmpr: self.base.jmpr.clone(),
            ccpr: self.base.ccpr.clone(),
            prior_ccpr: self.base.prior_ccpr.clone(),
            cac_year: self.base.cac_year.clone(),
            lod: self.base.lod.clone(),
            source_of_res: self.base.source_of_res.clone(),
            fat_ph: self.base.fat_ph.clone(),
            tev: self.base.tev.clone(),
            footnote: self.base.footnote.clone(),
            footnote_ccpr: self.base.footnote_ccpr.clone(),
            pesticide: self.pesticide.name.clone(),
            commodity_code: self.base.commodity.comm_code.clone(),
            commodity_name: commodity_name.to_string(),
        }
    }
}

/// An MRL entry as it appears under a pesticide detail.
#[derive(Debug, Clone, Deserialize)]
pub struct PesticideMrl {
    #[serde(flatten)]
    pub base: BaseMrl,
    pub step: StepRef,
}

impl PesticideMrl {
    /// Flatten into one tabular row. `pesticide` is the display name of the
    /// detail record this entry came from; `step` collapses to its code.
    pub fn to_row(&self, pesticide_name: &str) -> PesticideMrlRow {
        PesticideMrlRow {
            mrl: self.base.mrl,
            mrl_formatted: self.base.mrl_formatted.clone(),
            jmpr: self.base.jmpr.clone(),
            ccpr: self.base.ccpr.clone(),
            prior_ccpr: self.base.prior_ccpr.clone(),
            cac_year: self.base.cac_year.clone(),
            lod: self.base.lod.clone(),
            source_of_res: self.base.source_of_res.clone(),
            fat_ph: self.base.fat_ph.clone(),
            tev: self.base.tev.clone(),
            footnote: self.base.footnote.clone(),
            footnote_ccpr: self.base.footnote_ccpr.clone(),
            step: self.step.step_code.clone(),
            pesticide: pesticide_name.to_string(),
            commodity_code: self.base.commodity.comm_code.clone(),
            commodity_name: self.base.commodity.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Detail records
// ---------------------------------------------------------------------------

/// Detail payload for one commodity.
///
/// `mrls` is `None` when the remote record carries no MRL data for the
/// commodity; that is a silent skip for the pipeline, not an error. The
/// wire-level `{"mrl": [...]}` wrapper is unwrapped during deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct CommodityDetail {
    pub commodity: String,
    #[serde(rename = "commCode")]
    pub comm_code: String,
    #[serde(default, deserialize_with = "de_mrl_envelope")]
    pub mrls: Option<Vec<CommodityMrl>>,
}

impl CommodityDetail {
    /// The display name and MRL list, or `None` when the record has no MRL
    /// data (skip vs flatten signal for the pipeline).
    pub fn commodity_mrls(&self) -> Option<(&str, &[CommodityMrl])> {
        self.mrls
            .as_deref()
            .map(|mrls| (self.commodity.as_str(), mrls))
    }
}

/// Detail payload for one pesticide.
#[derive(Debug, Clone, Deserialize)]
pub struct PesticideDetail {
    pub name: String,
    #[serde(rename = "pestIdCodex", deserialize_with = "de_string_or_number")]
    pub pest_id_codex: String,
    pub pesticide: String,
    pub adi: String,
    #[serde(rename = "adiUnit")]
    pub adi_unit: String,
    #[serde(rename = "adiNote")]
    pub adi_note: String,
    #[serde(rename = "vetdFlag")]
    pub vetd_flag: String,
    pub residue: String,
    /// Language-keyed note text, collapsed to `"en"` in detail rows.
    #[serde(default)]
    pub note: HashMap<String, String>,
    #[serde(default, deserialize_with = "de_mrl_envelope")]
    pub mrls: Option<Vec<PesticideMrl>>,
}

impl PesticideDetail {
    /// The display name and MRL list, or `None` when the record has no MRL
    /// data.
    pub fn pesticide_mrls(&self) -> Option<(&str, &[PesticideMrl])> {
        self.mrls
            .as_deref()
            .map(|mrls| (self.pesticide.as_str(), mrls))
    }

    /// Flatten the scalar fields into one tabular row. The note collapses to
    /// its English entry (empty when absent); the MRL list is excluded.
    pub fn to_detail_row(&self) -> PesticideRow {
        PesticideRow {
            name: self.name.clone(),
            pest_id_codex: self.pest_id_codex.clone(),
            pesticide: self.pesticide.clone(),
            adi: self.adi.clone(),
            adi_unit: self.adi_unit.clone(),
            adi_note: self.adi_note.clone(),
            vetd_flag: self.vetd_flag.clone(),
            residue: self.residue.clone(),
            note: self.note.get("en").cloned().unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Flat output rows
// ---------------------------------------------------------------------------

/// One row of the commodity-MRL dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommodityMrlRow {
    pub mrl: Option<f64>,
    pub mrl_formatted: String,
    pub jmpr: String,
    pub ccpr: String,
    pub prior_ccpr: String,
    pub cac_year: String,
    pub lod: String,
    pub source_of_res: String,
    pub fat_ph: String,
    pub tev: String,
    pub footnote: String,
    pub footnote_ccpr: String,
    pub pesticide: String,
    pub commodity_code: String,
    pub commodity_name: String,
}

/// One row of the pesticide-MRL dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PesticideMrlRow {
    pub mrl: Option<f64>,
    pub mrl_formatted: String,
    pub jmpr: String,
    pub ccpr: String,
    pub prior_ccpr: String,
    pub cac_year: String,
    pub lod: String,
    pub source_of_res: String,
    pub fat_ph: String,
    pub tev: String,
    pub footnote: String,
    pub footnote_ccpr: String,
    pub step: String,
    pub pesticide: String,
    pub commodity_code: String,
    pub commodity_name: String,
}

/// One row of the pesticide metadata dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PesticideRow {
    pub name: String,
    pub pest_id_codex: String,
    pub pesticide: String,
    pub adi: String,
    pub adi_unit: String,
    pub adi_note: String,
    pub vetd_flag: String,
    pub residue: String,
    pub note: String,
}

// ---------------------------------------------------------------------------
// Wire-format helpers
// ---------------------------------------------------------------------------

/// Numeric field that may arrive as a number, a numeric string, an empty
/// string (meaning absent), or be missing entirely.
fn de_optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_f64()),
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed.parse::<f64>().map(Some).map_err(|_| {
                    serde::de::Error::custom(format!("invalid numeric value {s:?}"))
                })
            }
        }
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected number or string, got {other}"
        ))),
    }
}

/// String field the remote sometimes encodes as a bare number.
fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    match raw {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// The MRL list arrives wrapped in a single-key mapping: `{"mrl": [...]}`.
/// Unwrap it here so the rest of the code only sees an optional list.
#[derive(Debug, Deserialize)]
struct MrlEnvelope<T> {
    mrl: Vec<T>,
}

fn de_mrl_envelope<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let envelope = Option::<MrlEnvelope<T>>::deserialize(deserializer)?;
    Ok(envelope.map(|e| e.mrl))
}
