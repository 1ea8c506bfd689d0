use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::db::models::{CvssV2Row, CvssV30Row, CvssV31Row, CvssV4Row};

use super::record::Metric;

// Enumerated CVSS attributes fall back to the value the CVSS documents
// assign to an omitted metric.
macro_rules! enumerated {
    ($name:ident, $default:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(pub String);

        impl Default for $name {
            fn default() -> Self {
                Self($default.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(Option::<String>::deserialize(deserializer)?
                    .map(Self)
                    .unwrap_or_default())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.0
            }
        }
    };
}

enumerated!(OrNone, "NONE");
enumerated!(OrNotDefined, "NOT_DEFINED");

/// Scores are numbers, but some producers quote them.
fn score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CvssV4 {
    pub version: Option<String>,
    pub vector_string: Option<String>,
    #[serde(deserialize_with = "score")]
    pub base_score: Option<f64>,
    pub base_severity: OrNone,
    pub attack_vector: Option<String>,
    pub attack_complexity: Option<String>,
    pub attack_requirements: OrNone,
    pub privileges_required: OrNone,
    pub user_interaction: OrNone,
    pub vuln_confidentiality_impact: OrNone,
    pub vuln_integrity_impact: OrNone,
    pub vuln_availability_impact: OrNone,
    pub sub_confidentiality_impact: OrNone,
    pub sub_integrity_impact: OrNone,
    pub sub_availability_impact: OrNone,
    pub exploit_maturity: OrNotDefined,
    pub confidentiality_requirement: OrNotDefined,
    pub integrity_requirement: OrNotDefined,
    pub availability_requirement: OrNotDefined,
    pub modified_attack_vector: OrNotDefined,
    pub modified_attack_complexity: OrNotDefined,
    pub modified_attack_requirements: OrNotDefined,
    pub modified_privileges_required: OrNotDefined,
    pub modified_user_interaction: OrNotDefined,
    pub modified_vuln_confidentiality_impact: OrNotDefined,
    pub modified_vuln_integrity_impact: OrNotDefined,
    pub modified_vuln_availability_impact: OrNotDefined,
    pub modified_sub_confidentiality_impact: OrNotDefined,
    pub modified_sub_integrity_impact: OrNotDefined,
    pub modified_sub_availability_impact: OrNotDefined,
    #[serde(rename = "Safety")]
    pub safety: OrNotDefined,
    #[serde(rename = "Automatable")]
    pub automatable: OrNotDefined,
    #[serde(rename = "Recovery")]
    pub recovery: OrNotDefined,
    pub value_density: OrNotDefined,
    pub vulnerability_response_effort: OrNotDefined,
    pub provider_urgency: OrNotDefined,
}

/// Shared by CVSS 3.0 and 3.1, which differ in scoring rules but not in shape.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CvssV3 {
    pub version: Option<String>,
    pub vector_string: Option<String>,
    #[serde(deserialize_with = "score")]
    pub base_score: Option<f64>,
    pub base_severity: OrNone,
    pub attack_vector: Option<String>,
    pub attack_complexity: Option<String>,
    pub privileges_required: OrNone,
    pub user_interaction: OrNone,
    pub scope: Option<String>,
    pub confidentiality_impact: OrNone,
    pub integrity_impact: OrNone,
    pub availability_impact: OrNone,
    pub exploit_code_maturity: OrNotDefined,
    pub remediation_level: OrNotDefined,
    pub report_confidence: OrNotDefined,
    #[serde(deserialize_with = "score")]
    pub temporal_score: Option<f64>,
    pub temporal_severity: OrNone,
    pub confidentiality_requirement: OrNotDefined,
    pub integrity_requirement: OrNotDefined,
    pub availability_requirement: OrNotDefined,
    pub modified_attack_vector: OrNotDefined,
    pub modified_attack_complexity: OrNotDefined,
    pub modified_privileges_required: OrNotDefined,
    pub modified_user_interaction: OrNotDefined,
    pub modified_scope: OrNotDefined,
    pub modified_confidentiality_impact: OrNotDefined,
    pub modified_integrity_impact: OrNotDefined,
    pub modified_availability_impact: OrNotDefined,
    #[serde(deserialize_with = "score")]
    pub environmental_score: Option<f64>,
    pub environmental_severity: OrNone,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CvssV2 {
    pub version: Option<String>,
    pub vector_string: Option<String>,
    #[serde(deserialize_with = "score")]
    pub base_score: Option<f64>,
    pub access_vector: Option<String>,
    pub access_complexity: Option<String>,
    pub authentication: OrNone,
    pub confidentiality_impact: OrNone,
    pub integrity_impact: OrNone,
    pub availability_impact: OrNone,
    pub exploitability: OrNotDefined,
    pub remediation_level: OrNotDefined,
    pub report_confidence: OrNotDefined,
    #[serde(deserialize_with = "score")]
    pub temporal_score: Option<f64>,
    pub collateral_damage_potential: OrNotDefined,
    pub target_distribution: OrNotDefined,
    pub confidentiality_requirement: OrNotDefined,
    pub integrity_requirement: OrNotDefined,
    pub availability_requirement: OrNotDefined,
    #[serde(deserialize_with = "score")]
    pub environmental_score: Option<f64>,
}

/// The scoring payload of one metric entry.
#[derive(Debug, Clone, PartialEq)]
pub enum CvssPayload {
    V4_0(CvssV4),
    V3_1(CvssV3),
    V3_0(CvssV3),
    V2_0(CvssV2),
}

impl CvssPayload {
    /// Picks the highest CVSS version present on `metric`. A payload that
    /// fails to parse is logged and the next version down is tried.
    pub fn from_metric(metric: &Metric) -> Option<Self> {
        let candidates: [(&str, Option<&Value>); 4] = [
            ("cvssV4_0", metric.cvss_v4_0.as_ref()),
            ("cvssV3_1", metric.cvss_v3_1.as_ref()),
            ("cvssV3_0", metric.cvss_v3_0.as_ref()),
            ("cvssV2_0", metric.cvss_v2_0.as_ref()),
        ];

        let present: Vec<(&str, &Value)> = candidates
            .into_iter()
            .filter_map(|(key, value)| match value {
                None | Some(Value::Null) => None,
                Some(value) => Some((key, value)),
            })
            .collect();

        let mut chosen = None;
        for (key, value) in &present {
            match Self::parse(key, value) {
                Ok(payload) => {
                    chosen = Some((*key, payload));
                    break;
                }
                Err(e) => log::warn!("skipping malformed {} payload: {}", key, e),
            }
        }

        let (key, payload) = chosen?;
        if present.len() > 1 {
            log::warn!(
                "metric carries {} CVSS payloads, keeping {}",
                present.len(),
                key
            );
        }
        Some(payload)
    }

    fn parse(key: &str, value: &Value) -> serde_json::Result<Self> {
        let value = value.clone();
        Ok(match key {
            "cvssV4_0" => Self::V4_0(serde_json::from_value(value)?),
            "cvssV3_1" => Self::V3_1(serde_json::from_value(value)?),
            "cvssV3_0" => Self::V3_0(serde_json::from_value(value)?),
            _ => Self::V2_0(serde_json::from_value(value)?),
        })
    }

    /// Suffix hashed with the metric id to form the payload id.
    pub fn id_suffix(&self) -> &'static str {
        match self {
            Self::V4_0(_) => "cvssv4",
            Self::V3_1(_) => "cvssv3_1",
            Self::V3_0(_) => "cvssv3",
            Self::V2_0(_) => "cvssv2",
        }
    }
}

impl CvssV4 {
    pub fn into_row(self, cvss_id: String, metric_id: String) -> CvssV4Row {
        CvssV4Row {
            cvss_id,
            metric_id,
            version: self.version,
            vector_string: self.vector_string,
            base_score: self.base_score,
            base_severity: self.base_severity.into(),
            attack_vector: self.attack_vector,
            attack_complexity: self.attack_complexity,
            attack_requirements: self.attack_requirements.into(),
            privileges_required: self.privileges_required.into(),
            user_interaction: self.user_interaction.into(),
            vuln_confidentiality_impact: self.vuln_confidentiality_impact.into(),
            vuln_integrity_impact: self.vuln_integrity_impact.into(),
            vuln_availability_impact: self.vuln_availability_impact.into(),
            sub_confidentiality_impact: self.sub_confidentiality_impact.into(),
            sub_integrity_impact: self.sub_integrity_impact.into(),
            sub_availability_impact: self.sub_availability_impact.into(),
            exploit_maturity: self.exploit_maturity.into(),
            confidentiality_requirement: self.confidentiality_requirement.into(),
            integrity_requirement: self.integrity_requirement.into(),
            availability_requirement: self.availability_requirement.into(),
            modified_attack_vector: self.modified_attack_vector.into(),
            modified_attack_complexity: self.modified_attack_complexity.into(),
            modified_attack_requirements: self.modified_attack_requirements.into(),
            modified_privileges_required: self.modified_privileges_required.into(),
            modified_user_interaction: self.modified_user_interaction.into(),
            modified_vuln_confidentiality_impact: self.modified_vuln_confidentiality_impact.into(),
            modified_vuln_integrity_impact: self.modified_vuln_integrity_impact.into(),
            modified_vuln_availability_impact: self.modified_vuln_availability_impact.into(),
            modified_sub_confidentiality_impact: self.modified_sub_confidentiality_impact.into(),
            modified_sub_integrity_impact: self.modified_sub_integrity_impact.into(),
            modified_sub_availability_impact: self.modified_sub_availability_impact.into(),
            safety: self.safety.into(),
            automatable: self.automatable.into(),
            recovery: self.recovery.into(),
            value_density: self.value_density.into(),
            vulnerability_response_effort: self.vulnerability_response_effort.into(),
            provider_urgency: self.provider_urgency.into(),
        }
    }
}

macro_rules! v3_row {
    ($row:ident, $payload:expr, $cvss_id:expr, $metric_id:expr) => {{
        let p = $payload;
        $row {
            cvss_id: $cvss_id,
            metric_id: $metric_id,
            version: p.version,
            vector_string: p.vector_string,
            base_score: p.base_score,
            base_severity: p.base_severity.into(),
            attack_vector: p.attack_vector,
            attack_complexity: p.attack_complexity,
            privileges_required: p.privileges_required.into(),
            user_interaction: p.user_interaction.into(),
            scope: p.scope,
            confidentiality_impact: p.confidentiality_impact.into(),
            integrity_impact: p.integrity_impact.into(),
            availability_impact: p.availability_impact.into(),
            exploit_code_maturity: p.exploit_code_maturity.into(),
            remediation_level: p.remediation_level.into(),
            report_confidence: p.report_confidence.into(),
            temporal_score: p.temporal_score,
            temporal_severity: p.temporal_severity.into(),
            confidentiality_requirement: p.confidentiality_requirement.into(),
            integrity_requirement: p.integrity_requirement.into(),
            availability_requirement: p.availability_requirement.into(),
            modified_attack_vector: p.modified_attack_vector.into(),
            modified_attack_complexity: p.modified_attack_complexity.into(),
            modified_privileges_required: p.modified_privileges_required.into(),
            modified_user_interaction: p.modified_user_interaction.into(),
            modified_scope: p.modified_scope.into(),
            modified_confidentiality_impact: p.modified_confidentiality_impact.into(),
            modified_integrity_impact: p.modified_integrity_impact.into(),
            modified_availability_impact: p.modified_availability_impact.into(),
            environmental_score: p.environmental_score,
            environmental_severity: p.environmental_severity.into(),
        }
    }};
}

impl CvssV3 {
    pub fn into_v3_1_row(self, cvss_id: String, metric_id: String) -> CvssV31Row {
        v3_row!(CvssV31Row, self, cvss_id, metric_id)
    }

    pub fn into_v3_0_row(self, cvss_id: String, metric_id: String) -> CvssV30Row {
        v3_row!(CvssV30Row, self, cvss_id, metric_id)
    }
}

impl CvssV2 {
    pub fn into_row(self, cvss_id: String, metric_id: String) -> CvssV2Row {
        CvssV2Row {
            cvss_id,
            metric_id,
            version: self.version,
            vector_string: self.vector_string,
            base_score: self.base_score,
            access_vector: self.access_vector,
            access_complexity: self.access_complexity,
            authentication: self.authentication.into(),
            confidentiality_impact: self.confidentiality_impact.into(),
            integrity_impact: self.integrity_impact.into(),
            availability_impact: self.availability_impact.into(),
            exploitability: self.exploitability.into(),
            remediation_level: self.remediation_level.into(),
            report_confidence: self.report_confidence.into(),
            temporal_score: self.temporal_score,
            collateral_damage_potential: self.collateral_damage_potential.into(),
            target_distribution: self.target_distribution.into(),
            confidentiality_requirement: self.confidentiality_requirement.into(),
            integrity_requirement: self.integrity_requirement.into(),
            availability_requirement: self.availability_requirement.into(),
            environmental_score: self.environmental_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn metric(value: Value) -> Metric {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn missing_attributes_take_cvss_defaults() {
        let payload = CvssPayload::from_metric(&metric(json!({
            "cvssV3_1": {
                "version": "3.1",
                "vectorString": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H",
                "baseScore": 9.8,
                "baseSeverity": "CRITICAL"
            }
        })));

        let Some(CvssPayload::V3_1(cvss)) = payload else {
            panic!("expected a v3.1 payload, got {payload:?}");
        };
        assert_eq!(cvss.base_score, Some(9.8));
        assert_eq!(cvss.base_severity.0, "CRITICAL");
        assert_eq!(cvss.privileges_required.0, "NONE");
        assert_eq!(cvss.modified_scope.0, "NOT_DEFINED");
        assert_eq!(cvss.temporal_score, None);

        let row = cvss.into_v3_1_row("id".into(), "metric".into());
        assert_eq!(row.environmental_severity, "NONE");
        assert_eq!(row.report_confidence, "NOT_DEFINED");
    }

    #[test]
    fn null_attributes_take_defaults_and_quoted_scores_parse() {
        let payload = CvssPayload::from_metric(&metric(json!({
            "cvssV2_0": {"version": "2.0", "baseScore": "5.0", "authentication": null}
        })));

        let Some(CvssPayload::V2_0(cvss)) = payload else {
            panic!("expected a v2.0 payload, got {payload:?}");
        };
        assert_eq!(cvss.base_score, Some(5.0));
        assert_eq!(cvss.authentication.0, "NONE");
        assert_eq!(cvss.exploitability.0, "NOT_DEFINED");
    }

    #[test]
    fn v4_capitalized_supplemental_keys() {
        let payload = CvssPayload::from_metric(&metric(json!({
            "cvssV4_0": {"version": "4.0", "baseScore": 8.7, "Safety": "PRESENT", "Automatable": "YES"}
        })));

        let Some(CvssPayload::V4_0(cvss)) = payload else {
            panic!("expected a v4.0 payload, got {payload:?}");
        };
        assert_eq!(cvss.safety.0, "PRESENT");
        assert_eq!(cvss.automatable.0, "YES");
        assert_eq!(cvss.recovery.0, "NOT_DEFINED");
    }

    #[test]
    fn highest_version_wins() {
        let payload = CvssPayload::from_metric(&metric(json!({
            "cvssV2_0": {"version": "2.0", "baseScore": 5.0},
            "cvssV3_0": {"version": "3.0", "baseScore": 7.5}
        })))
        .unwrap();

        assert_eq!(payload.id_suffix(), "cvssv3");
    }

    #[test]
    fn malformed_payload_falls_back_to_the_next_version() {
        let payload = CvssPayload::from_metric(&metric(json!({
            "cvssV3_1": "garbage",
            "cvssV2_0": {"version": "2.0"}
        })))
        .unwrap();

        assert_eq!(payload.id_suffix(), "cvssv2");
    }

    #[test]
    fn metric_without_payload() {
        assert_eq!(
            CvssPayload::from_metric(&metric(json!({"format": "CVSS", "cvssV3_1": null}))),
            None
        );
    }
}
