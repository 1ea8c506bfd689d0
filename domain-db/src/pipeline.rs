use std::{
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    thread,
    time::Instant,
};

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::bounded;
use rayon::prelude::*;

use crate::{cve_sources::cvelist, db::models::RowSet};

const PROGRESS_EVERY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Worker threads, 0 for one per available core.
    pub workers: usize,
    /// Per-document results that may wait for the aggregator.
    pub channel_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: 0,
            channel_capacity: 256,
        }
    }
}

/// Transforms every file in parallel and merges the results.
pub fn transform_all(paths: &[PathBuf], settings: &PipelineSettings) -> Result<RowSet> {
    fan_out(paths, settings, |path| cvelist::transform_file(path))
}

/// Single-threaded equivalent of [`transform_all`].
pub fn transform_sequential(paths: &[PathBuf]) -> RowSet {
    let mut rows = RowSet::default();
    for path in paths {
        rows.append(cvelist::transform_file(path));
    }
    rows
}

/// Runs `unit` over `inputs` on a dedicated worker pool. Results stream
/// through a bounded channel into a single aggregator, so at most
/// `channel_capacity` unmerged results exist at any time. A panicking unit
/// contributes no rows.
pub fn fan_out<I, F>(inputs: &[I], settings: &PipelineSettings, unit: F) -> Result<RowSet>
where
    I: Sync,
    F: Fn(&I) -> RowSet + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.workers)
        .thread_name(|index| format!("transform-{index}"))
        .build()
        .context("could not build the worker pool")?;

    let total = inputs.len();
    let start = Instant::now();

    log::info!(
        "transforming {} documents on {} workers ...",
        total,
        pool.current_num_threads()
    );

    let (sender, receiver) = bounded::<RowSet>(settings.channel_capacity.max(1));

    let merged = thread::scope(|scope| {
        let aggregator = scope.spawn(move || {
            let mut rows = RowSet::default();
            let mut done = 0usize;
            for unit_rows in receiver {
                rows.append(unit_rows);
                done += 1;
                if done % PROGRESS_EVERY == 0 {
                    log::info!("transformed {}/{} documents", done, total);
                }
            }
            rows
        });

        pool.install(|| {
            inputs
                .par_iter()
                .enumerate()
                .for_each_with(sender, |sender, (index, input)| {
                    let rows = match panic::catch_unwind(AssertUnwindSafe(|| unit(input))) {
                        Ok(rows) => rows,
                        Err(_) => {
                            log::error!("document {} panicked during transformation, skipping it", index);
                            RowSet::default()
                        }
                    };

                    if sender.send(rows).is_err() {
                        log::error!("aggregator is gone, dropping document {}", index);
                    }
                });
        });

        aggregator.join()
    });

    let rows = merged.map_err(|_| anyhow!("the aggregator thread panicked"))?;

    log::info!(
        "transformed {} documents into {} rows in {:?}",
        total,
        rows.total(),
        start.elapsed()
    );

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;
    use crate::db::models::Category;

    /// A published record whose shape varies with `n`, or a rejected one every 97th.
    fn synthetic(n: usize) -> Vec<u8> {
        let cve_id = format!("CVE-2030-{:05}", n);
        let state = if n % 97 == 0 { "REJECTED" } else { "PUBLISHED" };
        let descriptions: Vec<_> = (0..1 + n % 3)
            .map(|i| json!({"lang": "en", "value": format!("description {i} of {cve_id}")}))
            .collect();
        let references: Vec<_> = (0..n % 4)
            .map(|i| json!({"url": format!("https://example.com/{cve_id}/{i}"), "tags": ["patch"]}))
            .collect();
        let metrics = if n % 5 == 0 {
            json!([{"format": "CVSS", "cvssV2_0": {"version": "2.0", "baseScore": 5.0}}])
        } else {
            json!([{"format": "CVSS", "cvssV3_1": {"version": "3.1", "baseScore": 7.5}}])
        };
        let adp = if n % 7 == 0 {
            json!([{"providerMetadata": {"orgId": "adp"}, "tags": ["disputed"]}])
        } else {
            json!([])
        };

        serde_json::to_vec(&json!({
            "dataType": "CVE_RECORD",
            "dataVersion": "5.1",
            "cveMetadata": {"cveId": cve_id, "state": state, "datePublished": "2030-01-01T00:00:00Z"},
            "containers": {
                "cna": {
                    "providerMetadata": {"orgId": "cna"},
                    "descriptions": descriptions,
                    "references": references,
                    "metrics": metrics
                },
                "adp": adp
            }
        }))
        .unwrap()
    }

    fn sorted_keys(rows: &RowSet, category: Category) -> Vec<String> {
        let mut keys = rows.keys(category);
        keys.sort();
        keys
    }

    #[test]
    fn parallel_and_sequential_runs_agree() {
        let documents: Vec<Vec<u8>> = (0..10_000).map(synthetic).collect();
        let settings = PipelineSettings {
            workers: 4,
            channel_capacity: 8,
        };

        let parallel = fan_out(&documents, &settings, |bytes| cvelist::transform(bytes)).unwrap();

        let mut sequential = RowSet::default();
        for bytes in &documents {
            sequential.append(cvelist::transform(bytes));
        }

        assert_eq!(parallel.counts(), sequential.counts());
        assert_eq!(parallel.len(Category::Cves), 10_000 - 104);
        for category in Category::LOAD_ORDER {
            assert_eq!(
                sorted_keys(&parallel, *category),
                sorted_keys(&sequential, *category),
                "{}",
                category.table_name()
            );
        }
    }

    #[test]
    fn each_document_keeps_its_row_order() {
        let documents: Vec<Vec<u8>> = (1..200).map(synthetic).collect();
        let rows = fan_out(&documents, &PipelineSettings::default(), |bytes| {
            cvelist::transform(bytes)
        })
        .unwrap();

        // containers of one record arrive together, cna first
        for (position, container) in rows.containers.iter().enumerate() {
            if container.container_type == "adp" {
                let previous = &rows.containers[position - 1];
                assert_eq!(previous.cve_id, container.cve_id);
                assert_eq!(previous.container_type, "cna");
            }
        }
    }

    #[test]
    fn a_panicking_unit_only_loses_its_own_rows() {
        let documents: Vec<usize> = (1..=50).collect();
        let settings = PipelineSettings {
            workers: 2,
            channel_capacity: 1,
        };

        let rows = fan_out(&documents, &settings, |n| {
            if *n == 13 {
                panic!("unlucky document");
            }
            cvelist::transform(&synthetic(*n))
        })
        .unwrap();

        assert_eq!(rows.len(Category::Cves), 49);
        assert!(rows.cves.iter().all(|cve| cve.cve_id != "CVE-2030-00013"));
    }

    #[test]
    fn transform_all_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for n in 1..=20 {
            let path = dir.path().join(format!("CVE-2030-{:05}.json", n));
            fs::write(&path, synthetic(n)).unwrap();
            paths.push(path);
        }
        paths.push(dir.path().join("CVE-2030-99999.json"));

        let parallel = transform_all(&paths, &PipelineSettings::default()).unwrap();
        let sequential = transform_sequential(&paths);

        assert_eq!(parallel.len(Category::Cves), 20);
        assert_eq!(parallel.counts(), sequential.counts());
    }
}
