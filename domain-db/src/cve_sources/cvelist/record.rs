use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

/// Array parsed one element at a time. Malformed elements are logged and
/// dropped; each kept element remembers its position in the source array.
#[derive(Debug, Clone)]
pub struct Lenient<T>(pub Vec<(usize, T)>);

impl<T> Default for Lenient<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> Lenient<T> {
    pub fn iter(&self) -> impl Iterator<Item = &(usize, T)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = match Value::deserialize(deserializer)? {
            Value::Array(items) => items,
            Value::Null => return Ok(Self::default()),
            other => {
                log::warn!("expected an array, found {}", kind(&other));
                return Ok(Self::default());
            }
        };

        let kept = items
            .into_iter()
            .enumerate()
            .filter_map(|(ordinal, item)| match serde_json::from_value::<T>(item) {
                Ok(parsed) => Some((ordinal, parsed)),
                Err(e) => {
                    log::warn!(
                        "skipping malformed {} at index {}: {}",
                        std::any::type_name::<T>().rsplit("::").next().unwrap_or("element"),
                        ordinal,
                        e
                    );
                    None
                }
            })
            .collect();

        Ok(Self(kept))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn short_type_name<T>() -> &'static str {
    std::any::type_name::<T>()
        .rsplit("::")
        .next()
        .unwrap_or("value")
        .trim_end_matches('>')
}

/// Scalar field read on its own: a value of the wrong type is logged and
/// read as absent instead of failing the enclosing object.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }

    let found = kind(&value);
    match serde_json::from_value::<T>(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(_) => {
            log::warn!("ignoring {} where {} was expected", found, short_type_name::<T>());
            Ok(None)
        }
    }
}

/// Like [`lenient`], also accepting integers written as strings.
fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(text) => text.trim().parse::<i32>().ok(),
        _ => None,
    };

    if parsed.is_none() {
        log::warn!("ignoring {} where an integer was expected", kind(&value));
    }
    Ok(parsed)
}

/// Removes NUL characters from every string and object key of `value`,
/// returning how many were removed. PostgreSQL text cannot hold them.
pub fn strip_nul(value: &mut Value) -> usize {
    match value {
        Value::String(text) => strip_nul_str(text),
        Value::Array(items) => items.iter_mut().map(strip_nul).sum(),
        Value::Object(map) => {
            let mut removed = 0;
            if map.keys().any(|key| key.contains('\0')) {
                for (mut key, item) in std::mem::take(map) {
                    removed += strip_nul_str(&mut key);
                    map.insert(key, item);
                }
            }
            removed + map.values_mut().map(strip_nul).sum::<usize>()
        }
        _ => 0,
    }
}

fn strip_nul_str(text: &mut String) -> usize {
    let before = text.len();
    text.retain(|c| c != '\0');
    before - text.len()
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, deserialize_with = "lenient")]
    pub data_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub data_version: Option<String>,
    pub cve_metadata: Option<Metadata>,
    pub containers: Option<Containers>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, deserialize_with = "lenient")]
    pub cve_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub assigner_org_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub assigner_short_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub requester_user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub serial: Option<i32>,
    #[serde(default, deserialize_with = "lenient")]
    pub date_reserved: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub date_published: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub date_updated: Option<String>,
}

/// Containers are kept raw so their content hash covers every field, known or not.
#[derive(Debug, Default, Deserialize, Clone)]
pub struct Containers {
    pub cna: Option<Value>,
    pub adp: Option<Value>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(default, deserialize_with = "lenient")]
    pub provider_metadata: Option<ProviderMetadata>,
    #[serde(default, deserialize_with = "lenient")]
    pub date_assigned: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub date_public: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    pub source: Option<Value>,
    #[serde(default)]
    pub timeline: Lenient<TimelineEvent>,
    #[serde(default)]
    pub descriptions: Lenient<Description>,
    #[serde(default)]
    pub references: Lenient<Reference>,
    #[serde(default)]
    pub problem_types: Lenient<ProblemType>,
    #[serde(default)]
    pub credits: Lenient<Credit>,
    #[serde(default)]
    pub affected: Lenient<Affected>,
    #[serde(default)]
    pub configurations: Lenient<Narrative>,
    #[serde(default)]
    pub workarounds: Lenient<Narrative>,
    #[serde(default)]
    pub solutions: Lenient<Narrative>,
    #[serde(default)]
    pub exploits: Lenient<Narrative>,
    #[serde(default)]
    pub impacts: Lenient<Impact>,
    #[serde(default)]
    pub taxonomy_mappings: Lenient<TaxonomyMapping>,
    #[serde(default)]
    pub tags: Lenient<String>,
    #[serde(default)]
    pub cpe_applicability: Lenient<Applicability>,
    #[serde(default)]
    pub metrics: Lenient<Metric>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    #[serde(default, deserialize_with = "lenient")]
    pub org_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub short_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub date_updated: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct TimelineEvent {
    pub time: Option<String>,
    pub lang: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    pub lang: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub supporting_media: Lenient<SupportingMedia>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct SupportingMedia {
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub base64: Option<bool>,
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Reference {
    pub url: Option<String>,
    pub name: Option<String>,
    pub tags: Option<Value>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ProblemType {
    #[serde(default)]
    pub descriptions: Lenient<ProblemTypeDescription>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProblemTypeDescription {
    pub lang: Option<String>,
    pub description: Option<String>,
    pub cwe_id: Option<String>,
    #[serde(rename = "type")]
    pub description_type: Option<String>,
    #[serde(default)]
    pub references: Lenient<Reference>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Credit {
    pub lang: Option<String>,
    pub value: Option<String>,
    pub user: Option<String>,
    #[serde(rename = "type")]
    pub credit_type: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Affected {
    pub vendor: Option<String>,
    pub product: Option<String>,
    #[serde(rename = "collectionURL")]
    pub collection_url: Option<String>,
    pub package_name: Option<String>,
    pub default_status: Option<String>,
    pub repo: Option<String>,
    #[serde(default)]
    pub cpes: Lenient<String>,
    #[serde(default)]
    pub platforms: Lenient<String>,
    #[serde(default)]
    pub modules: Lenient<String>,
    #[serde(default)]
    pub program_files: Lenient<String>,
    #[serde(default)]
    pub program_routines: Lenient<ProgramRoutine>,
    #[serde(default)]
    pub versions: Lenient<Version>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct ProgramRoutine {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub version: Option<String>,
    pub status: Option<String>,
    pub version_type: Option<String>,
    pub less_than: Option<String>,
    pub less_than_or_equal: Option<String>,
    pub changes: Option<Value>,
}

/// Free text with optional supporting media, shared by configurations,
/// workarounds, solutions, exploits and impact descriptions.
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Narrative {
    pub lang: Option<String>,
    pub value: Option<String>,
    pub supporting_media: Option<Value>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Impact {
    pub capec_id: Option<String>,
    #[serde(default)]
    pub descriptions: Lenient<Narrative>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyMapping {
    pub taxonomy_name: Option<String>,
    pub taxonomy_version: Option<String>,
    #[serde(default)]
    pub taxonomy_relations: Lenient<TaxonomyRelation>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyRelation {
    pub taxonomy_id: Option<String>,
    pub relationship_name: Option<String>,
    pub relationship_value: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Applicability {
    pub operator: Option<String>,
    pub negate: Option<bool>,
    #[serde(default)]
    pub nodes: Lenient<CpeNode>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CpeNode {
    pub operator: Option<String>,
    pub negate: Option<bool>,
    #[serde(default)]
    pub cpe_match: Lenient<CpeMatch>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CpeMatch {
    pub vulnerable: Option<bool>,
    pub criteria: Option<String>,
    pub match_criteria_id: Option<String>,
    pub version_start_excluding: Option<String>,
    pub version_start_including: Option<String>,
    pub version_end_excluding: Option<String>,
    pub version_end_including: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Metric {
    #[serde(default, deserialize_with = "lenient")]
    pub format: Option<String>,
    #[serde(default)]
    pub scenarios: Lenient<Scenario>,
    #[serde(default, deserialize_with = "lenient")]
    pub other: Option<OtherMetric>,
    #[serde(rename = "cvssV4_0")]
    pub cvss_v4_0: Option<Value>,
    #[serde(rename = "cvssV3_1")]
    pub cvss_v3_1: Option<Value>,
    #[serde(rename = "cvssV3_0")]
    pub cvss_v3_0: Option<Value>,
    #[serde(rename = "cvssV2_0")]
    pub cvss_v2_0: Option<Value>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Scenario {
    pub lang: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct OtherMetric {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub other_type: Option<String>,
    pub content: Option<Value>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn lenient_arrays_keep_source_positions() {
        let parsed: Lenient<Description> = serde_json::from_value(json!([
            {"lang": "en", "value": "first"},
            {"lang": 42},
            {"lang": "es", "value": "tercero"}
        ]))
        .unwrap();

        let ordinals: Vec<usize> = parsed.iter().map(|(i, _)| *i).collect();
        assert_eq!(ordinals, vec![0, 2]);
        assert_eq!(parsed.0[1].1.value.as_deref(), Some("tercero"));
    }

    #[test]
    fn lenient_arrays_tolerate_wrong_shapes() {
        let container: Container = serde_json::from_value(json!({
            "descriptions": "not an array",
            "tags": null,
            "references": [{"url": "https://example.com"}]
        }))
        .unwrap();

        assert!(container.descriptions.is_empty());
        assert!(container.tags.is_empty());
        assert_eq!(container.references.0.len(), 1);
        assert!(container.metrics.is_empty());
    }

    #[test]
    fn strip_nul_counts_removed_characters() {
        let mut value = json!({"a\u{0}": ["x\u{0}y", {"b": "\u{0}\u{0}"}], "c": 1});

        assert_eq!(strip_nul(&mut value), 4);
        assert_eq!(value, json!({"a": ["xy", {"b": ""}], "c": 1}));
        assert_eq!(strip_nul(&mut value), 0);
    }

    #[test]
    fn mistyped_metadata_scalars_are_absent() {
        let metadata: Metadata = serde_json::from_value(json!({
            "cveId": "CVE-2024-0001",
            "state": "PUBLISHED",
            "assignerOrgId": 17,
            "serial": "3",
            "dateUpdated": false
        }))
        .unwrap();

        assert_eq!(metadata.cve_id.as_deref(), Some("CVE-2024-0001"));
        assert_eq!(metadata.assigner_org_id, None);
        assert_eq!(metadata.serial, Some(3));
        assert_eq!(metadata.date_updated, None);
    }
}
