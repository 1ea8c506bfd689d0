use std::ops::Range;

use anyhow::{anyhow, Context, Result};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PoolError, PooledConnection};
use diesel::upsert::excluded;
use diesel::{insert_into, result};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub mod loader;
pub mod models;
pub mod schema;

use loader::RowSink;
use models::{Category, RowSet};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(thiserror::Error, Debug)]
#[error("Database error.")]
pub struct DatabaseError {
    #[from]
    source: PoolError,
}

pub struct PostgresRepository {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl PostgresRepository {
    pub fn new(database_url: &str) -> Result<Self, DatabaseError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder().build(manager)?;
        Ok(Self { pool })
    }
}

impl PostgresRepository {
    pub fn any_pending_migrations(&self) -> Result<bool> {
        let mut conn = self.pool.get()?;
        conn.has_pending_migration(MIGRATIONS)
            .map_err(|e| anyhow!("failed checking pending migrations: {e}"))
    }

    pub fn run_pending_migrations(&self) -> Result<()> {
        let mut conn = self.pool.get()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("failed running pending migrations: {e}"))?;
        for version in applied {
            log::info!("applied migration {}", version);
        }
        Ok(())
    }

    /// Checks out the connection a [`PgSink`] writes through.
    pub fn connection(&self) -> Result<PooledConnection<ConnectionManager<PgConnection>>> {
        self.pool
            .get()
            .context("could not get a database connection")
    }
}

/// Writes one batch per transaction on a borrowed connection.
pub struct PgSink<'a> {
    conn: &'a mut PgConnection,
}

impl<'a> PgSink<'a> {
    pub fn new(conn: &'a mut PgConnection) -> Self {
        Self { conn }
    }
}

// INSERT .. ON CONFLICT (key) DO UPDATE SET every listed column to its EXCLUDED value
macro_rules! upsert {
    ($conn:expr, $rows:expr, $table:ident, $key:ident, [$($column:ident),+ $(,)?]) => {{
        use schema::$table::dsl;
        insert_into(schema::$table::table)
            .values($rows)
            .on_conflict(dsl::$key)
            .do_update()
            .set(($(dsl::$column.eq(excluded(dsl::$column)),)+))
            .execute($conn)
    }};
}

macro_rules! insert_or_ignore {
    ($conn:expr, $rows:expr, $table:ident) => {
        insert_into(schema::$table::table)
            .values($rows)
            .on_conflict_do_nothing()
            .execute($conn)
    };
}

// cvss_v3_1 and cvss_v3_0 have identical columns
macro_rules! upsert_cvss_v3 {
    ($conn:expr, $rows:expr, $table:ident) => {
        upsert!($conn, $rows, $table, cvss_id, [
            metric_id,
            version,
            vector_string,
            base_score,
            base_severity,
            attack_vector,
            attack_complexity,
            privileges_required,
            user_interaction,
            scope,
            confidentiality_impact,
            integrity_impact,
            availability_impact,
            exploit_code_maturity,
            remediation_level,
            report_confidence,
            temporal_score,
            temporal_severity,
            confidentiality_requirement,
            integrity_requirement,
            availability_requirement,
            modified_attack_vector,
            modified_attack_complexity,
            modified_privileges_required,
            modified_user_interaction,
            modified_scope,
            modified_confidentiality_impact,
            modified_integrity_impact,
            modified_availability_impact,
            environmental_score,
            environmental_severity,
        ])
    };
}

impl RowSink for PgSink<'_> {
    fn write(&mut self, category: Category, rows: &RowSet, range: Range<usize>) -> Result<usize> {
        let table = category.table_name();
        let written = self
            .conn
            .transaction::<_, result::Error, _>(|conn| match category {
                Category::Cves => upsert!(conn, &rows.cves[range], cves, cve_id, [
                    data_type,
                    data_version,
                    state,
                    assigner_org_id,
                    assigner_short_name,
                    requester_user_id,
                    serial,
                    date_reserved,
                    date_published,
                    date_updated,
                ]),
                Category::Containers => upsert!(conn, &rows.containers[range], containers, container_id, [
                    cve_id,
                    container_type,
                    sequence,
                    content_hash,
                    provider_org_id,
                    provider_short_name,
                    provider_date_updated,
                    date_assigned,
                    date_public,
                    title,
                    source,
                ]),
                Category::Timelines => upsert!(conn, &rows.timelines[range], timelines, timeline_id, [
                    container_id,
                    event_time,
                    lang,
                    value,
                ]),
                Category::Descriptions => upsert!(conn, &rows.descriptions[range], descriptions, description_id, [
                    container_id,
                    lang,
                    value,
                ]),
                Category::SupportingMedia => upsert!(
                    conn,
                    &rows.description_supporting_media[range],
                    description_supporting_media,
                    media_id,
                    [description_id, media_type, base64, value]
                ),
                Category::References => upsert!(conn, &rows.cve_references[range], cve_references, reference_id, [
                    container_id,
                    url,
                    name,
                    tags,
                ]),
                Category::ProblemTypes => upsert!(conn, &rows.problem_types[range], problem_types, problem_type_id, [
                    container_id,
                ]),
                Category::ProblemTypeDescriptions => upsert!(
                    conn,
                    &rows.problem_type_descriptions[range],
                    problem_type_descriptions,
                    description_id,
                    [problem_type_id, lang, description, description_type]
                ),
                Category::ProblemTypeReferences => upsert!(
                    conn,
                    &rows.problem_type_references[range],
                    problem_type_references,
                    reference_id,
                    [description_id, url, name, tags]
                ),
                Category::Weaknesses => {
                    insert_or_ignore!(conn, &rows.problem_type_weaknesses[range], problem_type_weaknesses)
                }
                Category::Credits => upsert!(conn, &rows.credits[range], credits, credit_id, [
                    container_id,
                    lang,
                    value,
                    user_id,
                    credit_type,
                ]),
                Category::AffectedProducts => upsert!(
                    conn,
                    &rows.affected_products[range],
                    affected_products,
                    product_id,
                    [container_id, vendor, product, collection_url, package_name, default_status, repo]
                ),
                Category::ProductCpes => upsert!(
                    conn,
                    &rows.affected_product_cpes[range],
                    affected_product_cpes,
                    cpe_id,
                    [product_id, cpe23]
                ),
                Category::Platforms => upsert!(
                    conn,
                    &rows.affected_product_platforms[range],
                    affected_product_platforms,
                    platform_id,
                    [product_id, platform]
                ),
                Category::Modules => upsert!(
                    conn,
                    &rows.affected_product_modules[range],
                    affected_product_modules,
                    module_id,
                    [product_id, module]
                ),
                Category::ProgramFiles => upsert!(
                    conn,
                    &rows.affected_product_program_files[range],
                    affected_product_program_files,
                    file_id,
                    [product_id, file_path]
                ),
                Category::Versions => upsert!(
                    conn,
                    &rows.affected_product_versions[range],
                    affected_product_versions,
                    version_id,
                    [product_id, version, status, version_type, less_than, less_than_or_equal, changes]
                ),
                Category::ProgramRoutines => upsert!(
                    conn,
                    &rows.affected_product_program_routines[range],
                    affected_product_program_routines,
                    routine_id,
                    [product_id, routine]
                ),
                Category::Configurations => upsert!(conn, &rows.configurations[range], configurations, configuration_id, [
                    container_id,
                    lang,
                    value,
                    supporting_media,
                ]),
                Category::Workarounds => upsert!(conn, &rows.workarounds[range], workarounds, workaround_id, [
                    container_id,
                    lang,
                    value,
                    supporting_media,
                ]),
                Category::Solutions => upsert!(conn, &rows.solutions[range], solutions, solution_id, [
                    container_id,
                    lang,
                    value,
                    supporting_media,
                ]),
                Category::Exploits => upsert!(conn, &rows.exploits[range], exploits, exploit_id, [
                    container_id,
                    lang,
                    value,
                    supporting_media,
                ]),
                Category::Impacts => upsert!(conn, &rows.impacts[range], impacts, impact_id, [container_id]),
                Category::ImpactDescriptions => upsert!(
                    conn,
                    &rows.impact_descriptions[range],
                    impact_descriptions,
                    description_id,
                    [impact_id, lang, value, supporting_media]
                ),
                Category::AttackPatterns => {
                    insert_or_ignore!(conn, &rows.impact_attack_patterns[range], impact_attack_patterns)
                }
                Category::TaxonomyMappings => upsert!(
                    conn,
                    &rows.taxonomy_mappings[range],
                    taxonomy_mappings,
                    mapping_id,
                    [container_id, taxonomy_name, taxonomy_version]
                ),
                Category::TaxonomyRelations => upsert!(
                    conn,
                    &rows.taxonomy_relations[range],
                    taxonomy_relations,
                    relation_id,
                    [mapping_id, taxonomy_id, relationship_name, relationship_value]
                ),
                Category::Tags => insert_or_ignore!(conn, &rows.tags[range], tags),
                Category::Applicability => upsert!(
                    conn,
                    &rows.cpe_applicability[range],
                    cpe_applicability,
                    applicability_id,
                    [container_id, operator, negate]
                ),
                Category::CpeNodes => upsert!(conn, &rows.cpe_nodes[range], cpe_nodes, node_id, [
                    applicability_id,
                    operator,
                    negate,
                ]),
                Category::CpeMatches => upsert!(conn, &rows.cpe_matches[range], cpe_matches, match_id, [
                    node_id,
                    vulnerable,
                    criteria,
                    match_criteria_id,
                    version_start_excluding,
                    version_start_including,
                    version_end_excluding,
                    version_end_including,
                ]),
                Category::Metrics => upsert!(conn, &rows.metrics[range], metrics, metric_id, [
                    container_id,
                    format,
                    other_type,
                    other_content,
                ]),
                Category::MetricScenarios => upsert!(
                    conn,
                    &rows.metric_scenarios[range],
                    metric_scenarios,
                    scenario_id,
                    [metric_id, lang, value]
                ),
                Category::CvssV4 => upsert!(conn, &rows.cvss_v4_0[range], cvss_v4_0, cvss_id, [
                    metric_id,
                    version,
                    vector_string,
                    base_score,
                    base_severity,
                    attack_vector,
                    attack_complexity,
                    attack_requirements,
                    privileges_required,
                    user_interaction,
                    vuln_confidentiality_impact,
                    vuln_integrity_impact,
                    vuln_availability_impact,
                    sub_confidentiality_impact,
                    sub_integrity_impact,
                    sub_availability_impact,
                    exploit_maturity,
                    confidentiality_requirement,
                    integrity_requirement,
                    availability_requirement,
                    modified_attack_vector,
                    modified_attack_complexity,
                    modified_attack_requirements,
                    modified_privileges_required,
                    modified_user_interaction,
                    modified_vuln_confidentiality_impact,
                    modified_vuln_integrity_impact,
                    modified_vuln_availability_impact,
                    modified_sub_confidentiality_impact,
                    modified_sub_integrity_impact,
                    modified_sub_availability_impact,
                    safety,
                    automatable,
                    recovery,
                    value_density,
                    vulnerability_response_effort,
                    provider_urgency,
                ]),
                Category::CvssV31 => upsert_cvss_v3!(conn, &rows.cvss_v3_1[range], cvss_v3_1),
                Category::CvssV30 => upsert_cvss_v3!(conn, &rows.cvss_v3_0[range], cvss_v3_0),
                Category::CvssV2 => upsert!(conn, &rows.cvss_v2_0[range], cvss_v2_0, cvss_id, [
                    metric_id,
                    version,
                    vector_string,
                    base_score,
                    access_vector,
                    access_complexity,
                    authentication,
                    confidentiality_impact,
                    integrity_impact,
                    availability_impact,
                    exploitability,
                    remediation_level,
                    report_confidence,
                    temporal_score,
                    collateral_damage_potential,
                    target_distribution,
                    confidentiality_requirement,
                    integrity_requirement,
                    availability_requirement,
                    environmental_score,
                ]),
            })
            .with_context(|| format!("batch insert into {table} failed"))?;

        Ok(written)
    }
}

#[cfg(all(test, feature = "long-running-test"))]
mod tests {
    use super::*;
    use crate::cve_sources::cvelist;

    fn repository() -> PostgresRepository {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point to a scratch database");
        let repository = PostgresRepository::new(&url).unwrap();
        repository.run_pending_migrations().unwrap();
        assert!(!repository.any_pending_migrations().unwrap());
        repository
    }

    fn count(repository: &PostgresRepository, cve: &str) -> (i64, i64, i64) {
        let mut pooled = repository.pool.get().unwrap();
        let conn: &mut PgConnection = &mut pooled;
        let cves = schema::cves::table
            .filter(schema::cves::cve_id.eq(cve))
            .count()
            .get_result(&mut *conn)
            .unwrap();
        let containers = schema::containers::table
            .filter(schema::containers::cve_id.eq(cve))
            .count()
            .get_result(&mut *conn)
            .unwrap();
        let tags = schema::tags::table
            .inner_join(schema::containers::table)
            .filter(schema::containers::cve_id.eq(cve))
            .count()
            .get_result(&mut *conn)
            .unwrap();
        (cves, containers, tags)
    }

    #[test]
    fn loads_fixture_records_idempotently() {
        let repository = repository();

        let mut rows = cvelist::transform(include_bytes!("../cve_sources/cvelist/fixtures/CVE-2023-4863.json"));
        rows.append(cvelist::transform(include_bytes!("../cve_sources/cvelist/fixtures/CVE-2024-0001.json")));
        rows.dedup();

        let mut conn = repository.connection().unwrap();
        let first = loader::load(&mut PgSink::new(&mut conn), &rows, 7).unwrap();
        let second = loader::load(&mut PgSink::new(&mut conn), &rows, 10_000).unwrap();

        assert_eq!(first.submitted, rows.total());
        assert_eq!(second.submitted, rows.total());
        assert_eq!(count(&repository, "CVE-2023-4863"), (1, 3, 2));
        assert_eq!(count(&repository, "CVE-2024-0001"), (1, 1, 0));
    }
}
