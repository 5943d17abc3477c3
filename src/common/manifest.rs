use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::error::{BinError, Result};

/// Display attributes for one candidate, as sent by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateAttributes {
    #[serde(rename = "normalizedName", default, skip_serializing_if = "Option::is_none")]
    pub normalized_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Passed through untouched.
    #[serde(default)]
    pub quantity: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub attributes: CandidateAttributes,
}

impl Candidate {
    /// `normalizedName` wins over `name`.
    pub fn display_name(&self) -> Option<&str> {
        self.attributes
            .normalized_name
            .as_deref()
            .or(self.attributes.name.as_deref())
    }
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(rename = "BIN_FCSKU_DATA", default)]
    candidates: Option<Map<String, Value>>,
    #[serde(rename = "EXPECTED_QUANTITY", default)]
    expected_quantity: Option<Value>,
}

/// Candidates in the order the caller listed them, plus the expected bin total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateManifest {
    pub candidates: Vec<Candidate>,
    pub expected_quantity: Option<Value>,
}

impl CandidateManifest {
    /// Parses the `bin_data` form field.
    ///
    /// A missing `BIN_FCSKU_DATA` is an empty manifest. Anything that is not a JSON
    /// object at the top level, or a candidate entry that is not an object, is a
    /// [`BinError::ManifestParse`].
    pub fn parse(bin_data: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(bin_data)
            .map_err(|e| BinError::ManifestParse(format!("bin_data is not valid JSON: {e}")))?;
        if !value.is_object() {
            return Err(BinError::ManifestParse(
                "bin_data must be a JSON object".to_string(),
            ));
        }
        let raw: RawManifest = serde_json::from_value(value)
            .map_err(|e| BinError::ManifestParse(format!("BIN_FCSKU_DATA must be an object: {e}")))?;

        let candidates = raw
            .candidates
            .unwrap_or_default()
            .into_iter()
            .map(|(id, attributes)| {
                serde_json::from_value::<CandidateAttributes>(attributes)
                    .map(|attributes| Candidate { id: id.clone(), attributes })
                    .map_err(|e| BinError::ManifestParse(format!("candidate {id:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            candidates,
            expected_quantity: raw.expected_quantity,
        })
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }
}
