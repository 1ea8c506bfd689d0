use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::schema::*;

/// A row that can be addressed by its primary key and, for every table but
/// `cves`, the key of the row that owns it.
pub trait Row: std::fmt::Debug {
    fn key(&self) -> String;
    fn parent_key(&self) -> Option<&str>;
}

macro_rules! impl_row {
    ($row:ty, $key:ident) => {
        impl Row for $row {
            fn key(&self) -> String {
                self.$key.clone()
            }

            fn parent_key(&self) -> Option<&str> {
                None
            }
        }
    };
    ($row:ty, $key:ident, $parent:ident) => {
        impl Row for $row {
            fn key(&self) -> String {
                self.$key.clone()
            }

            fn parent_key(&self) -> Option<&str> {
                Some(&self.$parent)
            }
        }
    };
    ($row:ty, ($parent:ident, $other:ident)) => {
        impl Row for $row {
            fn key(&self) -> String {
                format!("{}\u{1f}{}", self.$parent, self.$other)
            }

            fn parent_key(&self) -> Option<&str> {
                Some(&self.$parent)
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = cves)]
pub struct CveRow {
    pub cve_id: String,
    pub data_type: Option<String>,
    pub data_version: Option<String>,
    pub state: Option<String>,
    pub assigner_org_id: Option<String>,
    pub assigner_short_name: Option<String>,
    pub requester_user_id: Option<String>,
    pub serial: Option<i32>,
    pub date_reserved: Option<NaiveDateTime>,
    pub date_published: Option<NaiveDateTime>,
    pub date_updated: Option<NaiveDateTime>,
}

/// Primary (`cna`) or secondary (`adp`) container, with its provider
/// metadata folded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = containers)]
pub struct ContainerRow {
    pub container_id: String,
    pub cve_id: String,
    pub container_type: String,
    pub sequence: i32,
    pub content_hash: String,
    pub provider_org_id: Option<String>,
    pub provider_short_name: Option<String>,
    pub provider_date_updated: Option<NaiveDateTime>,
    pub date_assigned: Option<NaiveDateTime>,
    pub date_public: Option<NaiveDateTime>,
    pub title: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = timelines)]
pub struct TimelineRow {
    pub timeline_id: String,
    pub container_id: String,
    pub event_time: Option<NaiveDateTime>,
    pub lang: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = descriptions)]
pub struct DescriptionRow {
    pub description_id: String,
    pub container_id: String,
    pub lang: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = description_supporting_media)]
pub struct SupportingMediaRow {
    pub media_id: String,
    pub description_id: String,
    pub media_type: Option<String>,
    pub base64: Option<bool>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = cve_references)]
pub struct ReferenceRow {
    pub reference_id: String,
    pub container_id: String,
    pub url: Option<String>,
    pub name: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = problem_types)]
pub struct ProblemTypeRow {
    pub problem_type_id: String,
    pub container_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = problem_type_descriptions)]
pub struct ProblemTypeDescriptionRow {
    pub description_id: String,
    pub problem_type_id: String,
    pub lang: Option<String>,
    pub description: Option<String>,
    pub description_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = problem_type_references)]
pub struct ProblemTypeReferenceRow {
    pub reference_id: String,
    pub description_id: String,
    pub url: Option<String>,
    pub name: Option<String>,
    pub tags: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = problem_type_weaknesses)]
pub struct WeaknessRow {
    pub description_id: String,
    pub cwe_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = credits)]
pub struct CreditRow {
    pub credit_id: String,
    pub container_id: String,
    pub lang: Option<String>,
    pub value: Option<String>,
    pub user_id: Option<String>,
    pub credit_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = affected_products)]
pub struct AffectedProductRow {
    pub product_id: String,
    pub container_id: String,
    pub vendor: Option<String>,
    pub product: Option<String>,
    pub collection_url: Option<String>,
    pub package_name: Option<String>,
    pub default_status: Option<String>,
    pub repo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = affected_product_cpes)]
pub struct ProductCpeRow {
    pub cpe_id: String,
    pub product_id: String,
    pub cpe23: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = affected_product_platforms)]
pub struct PlatformRow {
    pub platform_id: String,
    pub product_id: String,
    pub platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = affected_product_modules)]
pub struct ModuleRow {
    pub module_id: String,
    pub product_id: String,
    pub module: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = affected_product_program_files)]
pub struct ProgramFileRow {
    pub file_id: String,
    pub product_id: String,
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = affected_product_versions)]
pub struct VersionRow {
    pub version_id: String,
    pub product_id: String,
    pub version: Option<String>,
    pub status: Option<String>,
    pub version_type: Option<String>,
    pub less_than: Option<String>,
    pub less_than_or_equal: Option<String>,
    pub changes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = affected_product_program_routines)]
pub struct ProgramRoutineRow {
    pub routine_id: String,
    pub product_id: String,
    pub routine: Option<String>,
}

// configurations, workarounds, solutions and exploits share one shape
macro_rules! narrative_row {
    ($name:ident, $table:ident, $key:ident) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
        #[diesel(table_name = $table)]
        pub struct $name {
            pub $key: String,
            pub container_id: String,
            pub lang: Option<String>,
            pub value: Option<String>,
            pub supporting_media: Option<String>,
        }

        impl_row!($name, $key, container_id);
    };
}

narrative_row!(ConfigurationRow, configurations, configuration_id);
narrative_row!(WorkaroundRow, workarounds, workaround_id);
narrative_row!(SolutionRow, solutions, solution_id);
narrative_row!(ExploitRow, exploits, exploit_id);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = impacts)]
pub struct ImpactRow {
    pub impact_id: String,
    pub container_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = impact_descriptions)]
pub struct ImpactDescriptionRow {
    pub description_id: String,
    pub impact_id: String,
    pub lang: Option<String>,
    pub value: Option<String>,
    pub supporting_media: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = impact_attack_patterns)]
pub struct AttackPatternRow {
    pub impact_id: String,
    pub capec_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = taxonomy_mappings)]
pub struct TaxonomyMappingRow {
    pub mapping_id: String,
    pub container_id: String,
    pub taxonomy_name: Option<String>,
    pub taxonomy_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = taxonomy_relations)]
pub struct TaxonomyRelationRow {
    pub relation_id: String,
    pub mapping_id: String,
    pub taxonomy_id: Option<String>,
    pub relationship_name: Option<String>,
    pub relationship_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = tags)]
pub struct TagRow {
    pub container_id: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = cpe_applicability)]
pub struct ApplicabilityRow {
    pub applicability_id: String,
    pub container_id: String,
    pub operator: Option<String>,
    pub negate: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = cpe_nodes)]
pub struct CpeNodeRow {
    pub node_id: String,
    pub applicability_id: String,
    pub operator: Option<String>,
    pub negate: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = cpe_matches)]
pub struct CpeMatchRow {
    pub match_id: String,
    pub node_id: String,
    pub vulnerable: Option<bool>,
    pub criteria: Option<String>,
    pub match_criteria_id: Option<String>,
    pub version_start_excluding: Option<String>,
    pub version_start_including: Option<String>,
    pub version_end_excluding: Option<String>,
    pub version_end_including: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = metrics)]
pub struct MetricRow {
    pub metric_id: String,
    pub container_id: String,
    pub format: Option<String>,
    pub other_type: Option<String>,
    pub other_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = metric_scenarios)]
pub struct MetricScenarioRow {
    pub scenario_id: String,
    pub metric_id: String,
    pub lang: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = cvss_v4_0)]
pub struct CvssV4Row {
    pub cvss_id: String,
    pub metric_id: String,
    pub version: Option<String>,
    pub vector_string: Option<String>,
    pub base_score: Option<f64>,
    pub base_severity: String,
    pub attack_vector: Option<String>,
    pub attack_complexity: Option<String>,
    pub attack_requirements: String,
    pub privileges_required: String,
    pub user_interaction: String,
    pub vuln_confidentiality_impact: String,
    pub vuln_integrity_impact: String,
    pub vuln_availability_impact: String,
    pub sub_confidentiality_impact: String,
    pub sub_integrity_impact: String,
    pub sub_availability_impact: String,
    pub exploit_maturity: String,
    pub confidentiality_requirement: String,
    pub integrity_requirement: String,
    pub availability_requirement: String,
    pub modified_attack_vector: String,
    pub modified_attack_complexity: String,
    pub modified_attack_requirements: String,
    pub modified_privileges_required: String,
    pub modified_user_interaction: String,
    pub modified_vuln_confidentiality_impact: String,
    pub modified_vuln_integrity_impact: String,
    pub modified_vuln_availability_impact: String,
    pub modified_sub_confidentiality_impact: String,
    pub modified_sub_integrity_impact: String,
    pub modified_sub_availability_impact: String,
    pub safety: String,
    pub automatable: String,
    pub recovery: String,
    pub value_density: String,
    pub vulnerability_response_effort: String,
    pub provider_urgency: String,
}

// v3.1 and v3.0 payloads are stored in twin tables
macro_rules! cvss_v3_row {
    ($name:ident, $table:ident) => {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
        #[diesel(table_name = $table)]
        pub struct $name {
            pub cvss_id: String,
            pub metric_id: String,
            pub version: Option<String>,
            pub vector_string: Option<String>,
            pub base_score: Option<f64>,
            pub base_severity: String,
            pub attack_vector: Option<String>,
            pub attack_complexity: Option<String>,
            pub privileges_required: String,
            pub user_interaction: String,
            pub scope: Option<String>,
            pub confidentiality_impact: String,
            pub integrity_impact: String,
            pub availability_impact: String,
            pub exploit_code_maturity: String,
            pub remediation_level: String,
            pub report_confidence: String,
            pub temporal_score: Option<f64>,
            pub temporal_severity: String,
            pub confidentiality_requirement: String,
            pub integrity_requirement: String,
            pub availability_requirement: String,
            pub modified_attack_vector: String,
            pub modified_attack_complexity: String,
            pub modified_privileges_required: String,
            pub modified_user_interaction: String,
            pub modified_scope: String,
            pub modified_confidentiality_impact: String,
            pub modified_integrity_impact: String,
            pub modified_availability_impact: String,
            pub environmental_score: Option<f64>,
            pub environmental_severity: String,
        }

        impl_row!($name, cvss_id, metric_id);
    };
}

cvss_v3_row!(CvssV31Row, cvss_v3_1);
cvss_v3_row!(CvssV30Row, cvss_v3_0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Insertable)]
#[diesel(table_name = cvss_v2_0)]
pub struct CvssV2Row {
    pub cvss_id: String,
    pub metric_id: String,
    pub version: Option<String>,
    pub vector_string: Option<String>,
    pub base_score: Option<f64>,
    pub access_vector: Option<String>,
    pub access_complexity: Option<String>,
    pub authentication: String,
    pub confidentiality_impact: String,
    pub integrity_impact: String,
    pub availability_impact: String,
    pub exploitability: String,
    pub remediation_level: String,
    pub report_confidence: String,
    pub temporal_score: Option<f64>,
    pub collateral_damage_potential: String,
    pub target_distribution: String,
    pub confidentiality_requirement: String,
    pub integrity_requirement: String,
    pub availability_requirement: String,
    pub environmental_score: Option<f64>,
}

impl_row!(CveRow, cve_id);
impl_row!(ContainerRow, container_id, cve_id);
impl_row!(TimelineRow, timeline_id, container_id);
impl_row!(DescriptionRow, description_id, container_id);
impl_row!(SupportingMediaRow, media_id, description_id);
impl_row!(ReferenceRow, reference_id, container_id);
impl_row!(ProblemTypeRow, problem_type_id, container_id);
impl_row!(ProblemTypeDescriptionRow, description_id, problem_type_id);
impl_row!(ProblemTypeReferenceRow, reference_id, description_id);
impl_row!(WeaknessRow, (description_id, cwe_id));
impl_row!(CreditRow, credit_id, container_id);
impl_row!(AffectedProductRow, product_id, container_id);
impl_row!(ProductCpeRow, cpe_id, product_id);
impl_row!(PlatformRow, platform_id, product_id);
impl_row!(ModuleRow, module_id, product_id);
impl_row!(ProgramFileRow, file_id, product_id);
impl_row!(VersionRow, version_id, product_id);
impl_row!(ProgramRoutineRow, routine_id, product_id);
impl_row!(ImpactRow, impact_id, container_id);
impl_row!(ImpactDescriptionRow, description_id, impact_id);
impl_row!(AttackPatternRow, (impact_id, capec_id));
impl_row!(TaxonomyMappingRow, mapping_id, container_id);
impl_row!(TaxonomyRelationRow, relation_id, mapping_id);
impl_row!(TagRow, (container_id, tag));
impl_row!(ApplicabilityRow, applicability_id, container_id);
impl_row!(CpeNodeRow, node_id, applicability_id);
impl_row!(CpeMatchRow, match_id, node_id);
impl_row!(MetricRow, metric_id, container_id);
impl_row!(MetricScenarioRow, scenario_id, metric_id);
impl_row!(CvssV4Row, cvss_id, metric_id);
impl_row!(CvssV2Row, cvss_id, metric_id);

/// What a bulk insert does when the key is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Overwrite every non-key column.
    Update,
    /// Keep the stored row, used for association rows whose whole content is the key.
    Ignore,
}

/// Keeps the last occurrence of every key, preserving first-seen order.
fn dedup_rows<R: Row>(rows: &mut Vec<R>) -> usize {
    let before = rows.len();
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(before);
    let mut unique: Vec<R> = Vec::with_capacity(before);

    for row in rows.drain(..) {
        match slots.get(&row.key()) {
            Some(&slot) => unique[slot] = row,
            None => {
                slots.insert(row.key(), unique.len());
                unique.push(row);
            }
        }
    }

    *rows = unique;
    before - rows.len()
}

macro_rules! categories {
    ($(
        $variant:ident => $table:ident : $row:ty, parent = $parent:ident, columns = $columns:literal, $policy:ident;
    )*) => {
        /// One row category per storage table, listed in load order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Category {
            $($variant),*
        }

        impl Category {
            /// Every parent precedes its children.
            pub const LOAD_ORDER: &'static [Category] = &[$(Category::$variant),*];

            pub fn table_name(self) -> &'static str {
                match self {
                    $(Category::$variant => stringify!($table)),*
                }
            }

            pub fn parent(self) -> Option<Category> {
                match self {
                    $(Category::$variant => categories!(@parent $parent)),*
                }
            }

            pub fn columns(self) -> usize {
                match self {
                    $(Category::$variant => $columns),*
                }
            }

            pub fn on_conflict(self) -> OnConflict {
                match self {
                    $(Category::$variant => OnConflict::$policy),*
                }
            }
        }

        /// Rows produced by the transformer, grouped by category.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct RowSet {
            $(pub $table: Vec<$row>,)*
        }

        impl RowSet {
            pub fn len(&self, category: Category) -> usize {
                match category {
                    $(Category::$variant => self.$table.len()),*
                }
            }

            pub fn total(&self) -> usize {
                0 $(+ self.$table.len())*
            }

            pub fn is_empty(&self) -> bool {
                self.total() == 0
            }

            /// Appends `other`, keeping the relative order of its rows.
            pub fn append(&mut self, other: RowSet) {
                $(self.$table.extend(other.$table);)*
            }

            pub fn rows(&self, category: Category) -> Vec<&dyn Row> {
                match category {
                    $(Category::$variant => self.$table.iter().map(|row| row as &dyn Row).collect()),*
                }
            }

            pub fn keys(&self, category: Category) -> Vec<String> {
                match category {
                    $(Category::$variant => self.$table.iter().map(Row::key).collect()),*
                }
            }

            /// Removes repeated keys within each category, returning how many rows were dropped.
            pub fn dedup(&mut self) -> usize {
                0 $(+ dedup_rows(&mut self.$table))*
            }

            pub fn counts(&self) -> Vec<(Category, usize)> {
                Category::LOAD_ORDER
                    .iter()
                    .map(|category| (*category, self.len(*category)))
                    .collect()
            }
        }
    };
    (@parent None) => { None };
    (@parent $parent:ident) => { Some(Category::$parent) };
}

categories! {
    Cves => cves: CveRow, parent = None, columns = 11, Update;
    Containers => containers: ContainerRow, parent = Cves, columns = 12, Update;
    Timelines => timelines: TimelineRow, parent = Containers, columns = 5, Update;
    Descriptions => descriptions: DescriptionRow, parent = Containers, columns = 4, Update;
    SupportingMedia => description_supporting_media: SupportingMediaRow, parent = Descriptions, columns = 5, Update;
    References => cve_references: ReferenceRow, parent = Containers, columns = 5, Update;
    ProblemTypes => problem_types: ProblemTypeRow, parent = Containers, columns = 2, Update;
    ProblemTypeDescriptions => problem_type_descriptions: ProblemTypeDescriptionRow, parent = ProblemTypes, columns = 5, Update;
    ProblemTypeReferences => problem_type_references: ProblemTypeReferenceRow, parent = ProblemTypeDescriptions, columns = 5, Update;
    Weaknesses => problem_type_weaknesses: WeaknessRow, parent = ProblemTypeDescriptions, columns = 2, Ignore;
    Credits => credits: CreditRow, parent = Containers, columns = 6, Update;
    AffectedProducts => affected_products: AffectedProductRow, parent = Containers, columns = 8, Update;
    ProductCpes => affected_product_cpes: ProductCpeRow, parent = AffectedProducts, columns = 3, Update;
    Platforms => affected_product_platforms: PlatformRow, parent = AffectedProducts, columns = 3, Update;
    Modules => affected_product_modules: ModuleRow, parent = AffectedProducts, columns = 3, Update;
    ProgramFiles => affected_product_program_files: ProgramFileRow, parent = AffectedProducts, columns = 3, Update;
    Versions => affected_product_versions: VersionRow, parent = AffectedProducts, columns = 8, Update;
    ProgramRoutines => affected_product_program_routines: ProgramRoutineRow, parent = AffectedProducts, columns = 3, Update;
    Configurations => configurations: ConfigurationRow, parent = Containers, columns = 5, Update;
    Workarounds => workarounds: WorkaroundRow, parent = Containers, columns = 5, Update;
    Solutions => solutions: SolutionRow, parent = Containers, columns = 5, Update;
    Exploits => exploits: ExploitRow, parent = Containers, columns = 5, Update;
    Impacts => impacts: ImpactRow, parent = Containers, columns = 2, Update;
    ImpactDescriptions => impact_descriptions: ImpactDescriptionRow, parent = Impacts, columns = 5, Update;
    AttackPatterns => impact_attack_patterns: AttackPatternRow, parent = Impacts, columns = 2, Ignore;
    TaxonomyMappings => taxonomy_mappings: TaxonomyMappingRow, parent = Containers, columns = 4, Update;
    TaxonomyRelations => taxonomy_relations: TaxonomyRelationRow, parent = TaxonomyMappings, columns = 5, Update;
    Tags => tags: TagRow, parent = Containers, columns = 2, Ignore;
    Applicability => cpe_applicability: ApplicabilityRow, parent = Containers, columns = 4, Update;
    CpeNodes => cpe_nodes: CpeNodeRow, parent = Applicability, columns = 4, Update;
    CpeMatches => cpe_matches: CpeMatchRow, parent = CpeNodes, columns = 9, Update;
    Metrics => metrics: MetricRow, parent = Containers, columns = 5, Update;
    MetricScenarios => metric_scenarios: MetricScenarioRow, parent = Metrics, columns = 4, Update;
    CvssV4 => cvss_v4_0: CvssV4Row, parent = Metrics, columns = 38, Update;
    CvssV31 => cvss_v3_1: CvssV31Row, parent = Metrics, columns = 32, Update;
    CvssV30 => cvss_v3_0: CvssV30Row, parent = Metrics, columns = 32, Update;
    CvssV2 => cvss_v2_0: CvssV2Row, parent = Metrics, columns = 21, Update;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description(id: &str, value: &str) -> DescriptionRow {
        DescriptionRow {
            description_id: id.to_string(),
            container_id: "c".to_string(),
            lang: Some("en".to_string()),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn load_order_has_every_parent_first() {
        assert_eq!(Category::LOAD_ORDER.len(), 37);
        for (position, category) in Category::LOAD_ORDER.iter().enumerate() {
            if let Some(parent) = category.parent() {
                let parent_position = Category::LOAD_ORDER
                    .iter()
                    .position(|c| *c == parent)
                    .unwrap();
                assert!(
                    parent_position < position,
                    "{} loaded before {}",
                    category.table_name(),
                    parent.table_name()
                );
            }
        }
    }

    #[test]
    fn only_association_tables_ignore_conflicts() {
        let ignored: Vec<_> = Category::LOAD_ORDER
            .iter()
            .filter(|c| c.on_conflict() == OnConflict::Ignore)
            .map(|c| c.table_name())
            .collect();
        assert_eq!(
            ignored,
            vec!["problem_type_weaknesses", "impact_attack_patterns", "tags"]
        );
    }

    #[test]
    fn dedup_keeps_last_occurrence_in_first_seen_order() {
        let mut rows = RowSet::default();
        rows.descriptions = vec![
            description("a", "first"),
            description("b", "only"),
            description("a", "second"),
        ];

        assert_eq!(rows.dedup(), 1);
        assert_eq!(
            rows.descriptions,
            vec![description("a", "second"), description("b", "only")]
        );
    }

    #[test]
    fn composite_keys_distinguish_both_columns() {
        let mut rows = RowSet::default();
        rows.tags = vec![
            TagRow {
                container_id: "c1".into(),
                tag: "x".into(),
            },
            TagRow {
                container_id: "c1".into(),
                tag: "y".into(),
            },
            TagRow {
                container_id: "c1".into(),
                tag: "x".into(),
            },
        ];

        assert_eq!(rows.dedup(), 1);
        assert_eq!(rows.len(Category::Tags), 2);
        let tags = rows.rows(Category::Tags);
        let parents: Vec<Option<&str>> = tags.iter().map(|row| row.parent_key()).collect();
        assert_eq!(parents, vec![Some("c1"), Some("c1")]);
    }

    #[test]
    fn append_and_counts() {
        let mut left = RowSet::default();
        left.descriptions.push(description("a", "x"));
        let mut right = RowSet::default();
        right.descriptions.push(description("b", "y"));

        left.append(right);

        assert_eq!(left.total(), 2);
        assert!(!left.is_empty());
        assert_eq!(
            left.keys(Category::Descriptions),
            vec!["a".to_string(), "b".to_string()]
        );
        let counts = left.counts();
        assert_eq!(counts.len(), 37);
        assert!(counts.contains(&(Category::Descriptions, 2)));
    }
}
