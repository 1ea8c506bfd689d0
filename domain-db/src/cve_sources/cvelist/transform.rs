use std::{fs, path::Path};

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::db::models::*;

use super::{
    ids::{
        adp_container_id, child_id, cna_container_id, content_hash, json_text, parse_timestamp,
        singleton_id,
    },
    metric::CvssPayload,
    record::{strip_nul, Affected, Container, Document, Metadata, Metric, ProblemType},
};

pub const PUBLISHED: &str = "PUBLISHED";

/// Why a document produced no rows.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Rejection {
    #[error("not a valid CVE document: {0}")]
    Malformed(String),
    #[error("missing cveMetadata")]
    MissingMetadata,
    #[error("missing cveMetadata.cveId")]
    MissingCveId,
    #[error("{cve_id} is {state}, not {PUBLISHED}")]
    NotPublished { cve_id: String, state: String },
    #[error("{0} has no usable cna container")]
    MissingCna(String),
}

/// Reads and transforms one document file. Unreadable files yield no rows.
pub fn transform_file(path: &Path) -> RowSet {
    match fs::read(path) {
        Ok(bytes) => {
            let rows = transform(&bytes);
            if rows.is_empty() {
                log::debug!("{} produced no rows", path.display());
            }
            rows
        }
        Err(e) => {
            log::warn!("could not read {}: {}", path.display(), e);
            RowSet::default()
        }
    }
}

/// Decomposes one CVE JSON 5 document into rows. Never fails: rejected
/// documents are logged and yield an empty set.
pub fn transform(bytes: &[u8]) -> RowSet {
    match try_transform(bytes) {
        Ok(rows) => rows,
        Err(rejection @ Rejection::NotPublished { .. }) => {
            log::debug!("skipping document: {}", rejection);
            RowSet::default()
        }
        Err(rejection) => {
            log::warn!("skipping document: {}", rejection);
            RowSet::default()
        }
    }
}

pub fn try_transform(bytes: &[u8]) -> Result<RowSet, Rejection> {
    let mut raw: Value =
        serde_json::from_slice(bytes).map_err(|e| Rejection::Malformed(e.to_string()))?;
    let nul_count = strip_nul(&mut raw);
    let document: Document =
        serde_json::from_value(raw).map_err(|e| Rejection::Malformed(e.to_string()))?;

    let metadata = document.cve_metadata.ok_or(Rejection::MissingMetadata)?;
    let cve_id = metadata
        .cve_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or(Rejection::MissingCveId)?;

    if nul_count > 0 {
        log::warn!("{}: removed {} NUL characters", cve_id, nul_count);
    }

    let state = metadata.state.clone().unwrap_or_default();
    if state != PUBLISHED {
        return Err(Rejection::NotPublished { cve_id, state });
    }

    let containers = document.containers.unwrap_or_default();
    let cna_raw = containers
        .cna
        .filter(Value::is_object)
        .ok_or_else(|| Rejection::MissingCna(cve_id.clone()))?;
    let cna: Container = serde_json::from_value(cna_raw.clone()).map_err(|e| {
        log::warn!("{}: malformed cna container: {}", cve_id, e);
        Rejection::MissingCna(cve_id.clone())
    })?;

    let mut rows = RowSet::default();
    rows.cves.push(record_row(
        &cve_id,
        document.data_type,
        document.data_version,
        metadata,
    ));

    walk_container(
        &mut rows,
        &cve_id,
        cna_container_id(&cve_id),
        "cna",
        0,
        &cna_raw,
        cna,
    );

    match containers.adp {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => {
            for (index, raw) in entries.iter().enumerate() {
                let sequence = index + 1;
                match serde_json::from_value::<Container>(raw.clone()) {
                    Ok(adp) if raw.is_object() => walk_container(
                        &mut rows,
                        &cve_id,
                        adp_container_id(&cve_id, sequence),
                        "adp",
                        sequence as i32,
                        raw,
                        adp,
                    ),
                    Ok(_) => log::warn!("{}: adp {} is not an object", cve_id, sequence),
                    Err(e) => log::warn!("{}: skipping malformed adp {}: {}", cve_id, sequence, e),
                }
            }
        }
        Some(_) => log::warn!("{}: containers.adp is not an array", cve_id),
    }

    Ok(rows)
}

fn timestamp(owner: &str, field: &str, raw: Option<&str>) -> Option<NaiveDateTime> {
    let raw = raw?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        log::warn!("{}: unparseable {} {:?}", owner, field, raw);
    }
    parsed
}

fn record_row(
    cve_id: &str,
    data_type: Option<String>,
    data_version: Option<String>,
    metadata: Metadata,
) -> CveRow {
    CveRow {
        cve_id: cve_id.to_string(),
        data_type,
        data_version,
        date_reserved: timestamp(cve_id, "dateReserved", metadata.date_reserved.as_deref()),
        date_published: timestamp(cve_id, "datePublished", metadata.date_published.as_deref()),
        date_updated: timestamp(cve_id, "dateUpdated", metadata.date_updated.as_deref()),
        state: metadata.state,
        assigner_org_id: metadata.assigner_org_id,
        assigner_short_name: metadata.assigner_short_name,
        requester_user_id: metadata.requester_user_id,
        serial: metadata.serial,
    }
}

fn walk_container(
    rows: &mut RowSet,
    cve_id: &str,
    container_id: String,
    container_type: &str,
    sequence: i32,
    raw: &Value,
    container: Container,
) {
    let id = container_id.as_str();
    let provider = container.provider_metadata.unwrap_or_default();

    rows.containers.push(ContainerRow {
        container_id: container_id.clone(),
        cve_id: cve_id.to_string(),
        container_type: container_type.to_string(),
        sequence,
        content_hash: content_hash(raw),
        provider_org_id: provider.org_id,
        provider_short_name: provider.short_name,
        provider_date_updated: timestamp(id, "providerMetadata.dateUpdated", provider.date_updated.as_deref()),
        date_assigned: timestamp(id, "dateAssigned", container.date_assigned.as_deref()),
        date_public: timestamp(id, "datePublic", container.date_public.as_deref()),
        title: container.title,
        source: json_text(container.source.as_ref()),
    });

    for (i, event) in container.timeline.0 {
        rows.timelines.push(TimelineRow {
            timeline_id: child_id(id, "timeline", i),
            container_id: container_id.clone(),
            event_time: timestamp(id, "timeline.time", event.time.as_deref()),
            lang: event.lang,
            value: event.value,
        });
    }

    for (i, description) in container.descriptions.0 {
        let description_id = child_id(id, "desc", i);
        for (m, media) in description.supporting_media.0 {
            rows.description_supporting_media.push(SupportingMediaRow {
                media_id: child_id(&description_id, "supporting_media", m),
                description_id: description_id.clone(),
                media_type: media.media_type,
                base64: media.base64,
                value: media.value,
            });
        }
        rows.descriptions.push(DescriptionRow {
            description_id,
            container_id: container_id.clone(),
            lang: description.lang,
            value: description.value,
        });
    }

    for (i, reference) in container.references.0 {
        rows.cve_references.push(ReferenceRow {
            reference_id: child_id(id, "ref", i),
            container_id: container_id.clone(),
            url: reference.url,
            name: reference.name,
            tags: json_text(reference.tags.as_ref()),
        });
    }

    for (i, problem_type) in container.problem_types.0 {
        walk_problem_type(rows, id, child_id(id, "problem_type", i), problem_type);
    }

    for (i, credit) in container.credits.0 {
        rows.credits.push(CreditRow {
            credit_id: child_id(id, "credit", i),
            container_id: container_id.clone(),
            lang: credit.lang,
            value: credit.value,
            user_id: credit.user,
            credit_type: credit.credit_type,
        });
    }

    for (i, affected) in container.affected.0 {
        walk_affected(rows, id, child_id(id, "affected", i), affected);
    }

    for (i, narrative) in container.configurations.0 {
        rows.configurations.push(ConfigurationRow {
            configuration_id: child_id(id, "config", i),
            container_id: container_id.clone(),
            lang: narrative.lang,
            value: narrative.value,
            supporting_media: json_text(narrative.supporting_media.as_ref()),
        });
    }

    for (i, narrative) in container.workarounds.0 {
        rows.workarounds.push(WorkaroundRow {
            workaround_id: child_id(id, "workaround", i),
            container_id: container_id.clone(),
            lang: narrative.lang,
            value: narrative.value,
            supporting_media: json_text(narrative.supporting_media.as_ref()),
        });
    }

    for (i, narrative) in container.solutions.0 {
        rows.solutions.push(SolutionRow {
            solution_id: child_id(id, "solution", i),
            container_id: container_id.clone(),
            lang: narrative.lang,
            value: narrative.value,
            supporting_media: json_text(narrative.supporting_media.as_ref()),
        });
    }

    for (i, narrative) in container.exploits.0 {
        rows.exploits.push(ExploitRow {
            exploit_id: child_id(id, "exploit", i),
            container_id: container_id.clone(),
            lang: narrative.lang,
            value: narrative.value,
            supporting_media: json_text(narrative.supporting_media.as_ref()),
        });
    }

    for (i, impact) in container.impacts.0 {
        let impact_id = child_id(id, "impact", i);
        for (d, description) in impact.descriptions.0 {
            rows.impact_descriptions.push(ImpactDescriptionRow {
                description_id: child_id(&impact_id, "desc", d),
                impact_id: impact_id.clone(),
                lang: description.lang,
                value: description.value,
                supporting_media: json_text(description.supporting_media.as_ref()),
            });
        }
        if let Some(capec_id) = impact.capec_id.filter(|c| !c.is_empty()) {
            rows.impact_attack_patterns.push(AttackPatternRow {
                impact_id: impact_id.clone(),
                capec_id,
            });
        }
        rows.impacts.push(ImpactRow {
            impact_id,
            container_id: container_id.clone(),
        });
    }

    for (i, mapping) in container.taxonomy_mappings.0 {
        let mapping_id = child_id(id, "mapping", i);
        for (r, relation) in mapping.taxonomy_relations.0 {
            rows.taxonomy_relations.push(TaxonomyRelationRow {
                relation_id: child_id(&mapping_id, "relation", r),
                mapping_id: mapping_id.clone(),
                taxonomy_id: relation.taxonomy_id,
                relationship_name: relation.relationship_name,
                relationship_value: relation.relationship_value,
            });
        }
        rows.taxonomy_mappings.push(TaxonomyMappingRow {
            mapping_id,
            container_id: container_id.clone(),
            taxonomy_name: mapping.taxonomy_name,
            taxonomy_version: mapping.taxonomy_version,
        });
    }

    for (_, tag) in container.tags.0 {
        rows.tags.push(TagRow {
            container_id: container_id.clone(),
            tag,
        });
    }

    for (i, applicability) in container.cpe_applicability.0 {
        let applicability_id = child_id(id, "cpe_applicability", i);
        for (n, node) in applicability.nodes.0 {
            let node_id = child_id(&applicability_id, "node", n);
            for (m, cpe_match) in node.cpe_match.0 {
                rows.cpe_matches.push(CpeMatchRow {
                    match_id: child_id(&node_id, "match", m),
                    node_id: node_id.clone(),
                    vulnerable: cpe_match.vulnerable,
                    criteria: cpe_match.criteria,
                    match_criteria_id: cpe_match.match_criteria_id,
                    version_start_excluding: cpe_match.version_start_excluding,
                    version_start_including: cpe_match.version_start_including,
                    version_end_excluding: cpe_match.version_end_excluding,
                    version_end_including: cpe_match.version_end_including,
                });
            }
            rows.cpe_nodes.push(CpeNodeRow {
                node_id,
                applicability_id: applicability_id.clone(),
                operator: node.operator,
                negate: node.negate,
            });
        }
        rows.cpe_applicability.push(ApplicabilityRow {
            applicability_id,
            container_id: container_id.clone(),
            operator: applicability.operator,
            negate: applicability.negate,
        });
    }

    for (i, metric) in container.metrics.0 {
        walk_metric(rows, id, child_id(id, "metric", i), metric);
    }
}

fn walk_problem_type(rows: &mut RowSet, container_id: &str, problem_type_id: String, problem_type: ProblemType) {
    for (d, description) in problem_type.descriptions.0 {
        // references hang off the description, not the problem type
        let description_id = child_id(&problem_type_id, "desc", d);
        for (r, reference) in description.references.0 {
            rows.problem_type_references.push(ProblemTypeReferenceRow {
                reference_id: child_id(&description_id, "ref", r),
                description_id: description_id.clone(),
                url: reference.url,
                name: reference.name,
                tags: json_text(reference.tags.as_ref()),
            });
        }
        if let Some(cwe_id) = description.cwe_id.filter(|c| !c.is_empty()) {
            rows.problem_type_weaknesses.push(WeaknessRow {
                description_id: description_id.clone(),
                cwe_id,
            });
        }
        rows.problem_type_descriptions.push(ProblemTypeDescriptionRow {
            description_id,
            problem_type_id: problem_type_id.clone(),
            lang: description.lang,
            description: description.description,
            description_type: description.description_type,
        });
    }

    rows.problem_types.push(ProblemTypeRow {
        problem_type_id,
        container_id: container_id.to_string(),
    });
}

fn walk_affected(rows: &mut RowSet, container_id: &str, product_id: String, affected: Affected) {
    let product = product_id.as_str();

    for (i, cpe23) in affected.cpes.0 {
        rows.affected_product_cpes.push(ProductCpeRow {
            cpe_id: child_id(product, "cpe", i),
            product_id: product_id.clone(),
            cpe23: Some(cpe23),
        });
    }
    for (i, platform) in affected.platforms.0 {
        rows.affected_product_platforms.push(PlatformRow {
            platform_id: child_id(product, "platform", i),
            product_id: product_id.clone(),
            platform: Some(platform),
        });
    }
    for (i, module) in affected.modules.0 {
        rows.affected_product_modules.push(ModuleRow {
            module_id: child_id(product, "module", i),
            product_id: product_id.clone(),
            module: Some(module),
        });
    }
    for (i, file_path) in affected.program_files.0 {
        rows.affected_product_program_files.push(ProgramFileRow {
            file_id: child_id(product, "program_file", i),
            product_id: product_id.clone(),
            file_path: Some(file_path),
        });
    }
    for (i, version) in affected.versions.0 {
        rows.affected_product_versions.push(VersionRow {
            version_id: child_id(product, "version", i),
            product_id: product_id.clone(),
            version: version.version,
            status: version.status,
            version_type: version.version_type,
            less_than: version.less_than,
            less_than_or_equal: version.less_than_or_equal,
            changes: json_text(version.changes.as_ref()),
        });
    }
    for (i, routine) in affected.program_routines.0 {
        rows.affected_product_program_routines.push(ProgramRoutineRow {
            routine_id: child_id(product, "program_routine", i),
            product_id: product_id.clone(),
            routine: routine.name,
        });
    }

    rows.affected_products.push(AffectedProductRow {
        product_id,
        container_id: container_id.to_string(),
        vendor: affected.vendor,
        product: affected.product,
        collection_url: affected.collection_url,
        package_name: affected.package_name,
        default_status: affected.default_status,
        repo: affected.repo,
    });
}

fn walk_metric(rows: &mut RowSet, container_id: &str, metric_id: String, metric: Metric) {
    for (s, scenario) in metric.scenarios.iter() {
        rows.metric_scenarios.push(MetricScenarioRow {
            scenario_id: child_id(&metric_id, "scenario", *s),
            metric_id: metric_id.clone(),
            lang: scenario.lang.clone(),
            value: scenario.value.clone(),
        });
    }

    if let Some(payload) = CvssPayload::from_metric(&metric) {
        let cvss_id = singleton_id(&metric_id, payload.id_suffix());
        let owner = metric_id.clone();
        match payload {
            CvssPayload::V4_0(cvss) => rows.cvss_v4_0.push(cvss.into_row(cvss_id, owner)),
            CvssPayload::V3_1(cvss) => rows.cvss_v3_1.push(cvss.into_v3_1_row(cvss_id, owner)),
            CvssPayload::V3_0(cvss) => rows.cvss_v3_0.push(cvss.into_v3_0_row(cvss_id, owner)),
            CvssPayload::V2_0(cvss) => rows.cvss_v2_0.push(cvss.into_row(cvss_id, owner)),
        }
    }

    let other = metric.other.unwrap_or_default();
    rows.metrics.push(MetricRow {
        metric_id,
        container_id: container_id.to_string(),
        format: metric.format,
        other_type: other.other_type,
        other_content: json_text(other.content.as_ref()),
    });
}
