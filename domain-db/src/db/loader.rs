use std::{collections::HashSet, ops::Range, time::Instant};

use anyhow::{Context, Result};

use super::models::{Category, RowSet};

/// PostgreSQL accepts at most this many bind parameters per statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Storage for row batches.
pub trait RowSink {
    /// Persists `rows[range]` of `category` and commits them, returning the
    /// number of rows the store reports as written.
    fn write(&mut self, category: Category, rows: &RowSet, range: Range<usize>) -> Result<usize>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Rows submitted, per table in load order.
    pub tables: Vec<(Category, usize)>,
    pub submitted: usize,
    pub written: usize,
    pub batches: usize,
}

/// Rows per statement for `category`, never more than `batch_size`.
pub fn batch_rows(category: Category, batch_size: usize) -> usize {
    let limit = (MAX_BIND_PARAMS / category.columns()).max(1);
    batch_size.clamp(1, limit)
}

/// Writes every category of `rows` in dependency order, in batches.
///
/// Rows must be unique per key within a category (see [`RowSet::dedup`]).
/// On error the loader stops; batches already written stay written.
pub fn load<S: RowSink>(sink: &mut S, rows: &RowSet, batch_size: usize) -> Result<LoadReport> {
    let total = rows.total();
    let start = Instant::now();
    let mut report = LoadReport::default();

    log::info!("loading {} rows ...", total);
    for (category, count) in rows.counts() {
        if count > 0 {
            log::info!("{:>8} rows for {}", count, category.table_name());
        }
    }

    for &category in Category::LOAD_ORDER {
        let table = category.table_name();
        let len = rows.len(category);
        if len == 0 {
            continue;
        }

        debug_assert_eq!(
            first_orphan(rows, category),
            None,
            "{table} row without its parent in the same load"
        );

        let step = batch_rows(category, batch_size);
        let mut offset = 0;
        while offset < len {
            let end = (offset + step).min(len);

            report.written += sink
                .write(category, rows, offset..end)
                .with_context(|| format!("failed loading rows {offset}..{end} into {table}"))?;
            report.submitted += end - offset;
            report.batches += 1;

            log::info!("progress: {}/{} rows processed ({})", report.submitted, total, table);
            offset = end;
        }

        report.tables.push((category, len));
    }

    log::info!(
        "loaded {} rows in {} batches in {:?}",
        report.submitted,
        report.batches,
        start.elapsed()
    );

    Ok(report)
}

/// Key of the first `category` row whose parent is not part of `rows`.
fn first_orphan(rows: &RowSet, category: Category) -> Option<String> {
    let parent = category.parent()?;
    let parents: HashSet<String> = rows.keys(parent).into_iter().collect();

    rows.rows(category)
        .into_iter()
        .find(|row| row.parent_key().is_some_and(|key| !parents.contains(key)))
        .map(|row| row.key())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap, HashSet};

    use anyhow::bail;

    use super::*;
    use crate::cve_sources::cvelist;

    const MINIMAL: &[u8] = include_bytes!("../cve_sources/cvelist/fixtures/CVE-2024-0001.json");
    const FULL: &[u8] = include_bytes!("../cve_sources/cvelist/fixtures/CVE-2023-4863.json");

    /// Keeps rows the way the upsert statements would: one entry per key,
    /// later writes replace earlier ones.
    #[derive(Default)]
    struct MemorySink {
        tables: HashMap<Category, BTreeMap<String, String>>,
        committed: Vec<Category>,
        batch_lengths: Vec<(Category, usize)>,
    }

    impl MemorySink {
        fn count(&self, category: Category) -> usize {
            self.tables.get(&category).map_or(0, BTreeMap::len)
        }

        fn get(&self, category: Category, key: &str) -> Option<&str> {
            self.tables.get(&category)?.get(key).map(String::as_str)
        }
    }

    impl RowSink for MemorySink {
        fn write(&mut self, category: Category, rows: &RowSet, range: Range<usize>) -> Result<usize> {
            let all = rows.rows(category);
            let batch = &all[range];

            if let Some(parent) = category.parent() {
                let loaded: HashSet<&String> = self
                    .tables
                    .get(&parent)
                    .map(|t| t.keys().collect())
                    .unwrap_or_default();
                for row in batch {
                    let parent_key = row.parent_key().unwrap_or_default().to_string();
                    if !loaded.contains(&parent_key) {
                        bail!("{} row {} has no parent in {}", category.table_name(), row.key(), parent.table_name());
                    }
                }
            }

            let table = self.tables.entry(category).or_default();
            for row in batch {
                table.insert(row.key(), format!("{row:?}"));
            }
            if self.committed.last() != Some(&category) {
                self.committed.push(category);
            }
            self.batch_lengths.push((category, batch.len()));
            Ok(batch.len())
        }
    }

    struct FailingSink {
        inner: MemorySink,
        fail_on: Category,
    }

    impl RowSink for FailingSink {
        fn write(&mut self, category: Category, rows: &RowSet, range: Range<usize>) -> Result<usize> {
            if category == self.fail_on {
                bail!("connection reset");
            }
            self.inner.write(category, rows, range)
        }
    }

    fn fixture_rows() -> RowSet {
        let mut rows = cvelist::transform(FULL);
        rows.append(cvelist::transform(MINIMAL));
        rows
    }

    #[test]
    fn parents_are_committed_before_children() {
        let rows = fixture_rows();
        let mut sink = MemorySink::default();

        let report = load(&mut sink, &rows, 10_000).unwrap();

        assert_eq!(report.submitted, rows.total());
        assert_eq!(report.written, rows.total());
        for category in &sink.committed {
            if let Some(parent) = category.parent() {
                let child_at = sink.committed.iter().position(|c| c == category).unwrap();
                let parent_at = sink.committed.iter().position(|c| *c == parent).unwrap();
                assert!(parent_at < child_at);
            }
        }
    }

    #[test]
    fn loading_twice_changes_nothing() {
        let rows = fixture_rows();
        let mut sink = MemorySink::default();

        load(&mut sink, &rows, 3).unwrap();
        let first = sink.tables.clone();
        load(&mut sink, &rows, 3).unwrap();

        assert_eq!(sink.tables, first);
        for (category, count) in rows.counts() {
            assert_eq!(sink.count(category), count, "{}", category.table_name());
        }
    }

    #[test]
    fn reload_overwrites_changed_text_in_place() {
        let mut sink = MemorySink::default();
        load(&mut sink, &cvelist::transform(MINIMAL), 10_000).unwrap();

        let mut document: serde_json::Value = serde_json::from_slice(MINIMAL).unwrap();
        document["containers"]["cna"]["descriptions"][0]["value"] =
            serde_json::json!("Only the description changed.");
        let changed = cvelist::transform(&serde_json::to_vec(&document).unwrap());
        load(&mut sink, &changed, 10_000).unwrap();

        let description_id = &changed.descriptions[0].description_id;
        assert_eq!(sink.count(Category::Descriptions), 1);
        assert!(sink
            .get(Category::Descriptions, description_id)
            .unwrap()
            .contains("Only the description changed."));
    }

    #[test]
    fn batches_respect_the_configured_size() {
        let rows = fixture_rows();
        let mut sink = MemorySink::default();

        let report = load(&mut sink, &rows, 2).unwrap();

        assert!(sink.batch_lengths.iter().all(|(_, len)| (1..=2).contains(len)));
        let metric_batches: Vec<usize> = sink
            .batch_lengths
            .iter()
            .filter(|(c, _)| *c == Category::Metrics)
            .map(|(_, len)| *len)
            .collect();
        assert_eq!(metric_batches, vec![2, 2, 1]);
        assert_eq!(report.batches, sink.batch_lengths.len());
    }

    #[test]
    fn batch_rows_stay_under_the_bind_parameter_limit() {
        assert_eq!(batch_rows(Category::Descriptions, 10_000), 10_000);
        assert_eq!(batch_rows(Category::Cves, 10_000), 65_535 / 11);
        assert_eq!(batch_rows(Category::CvssV4, 10_000), 65_535 / 38);
        assert_eq!(batch_rows(Category::CvssV4, 100), 100);
        assert_eq!(batch_rows(Category::Tags, 0), 1);
        for &category in Category::LOAD_ORDER {
            assert!(batch_rows(category, usize::MAX) * category.columns() <= MAX_BIND_PARAMS);
        }
    }

    #[test]
    fn failure_names_the_table_and_keeps_earlier_batches() {
        let rows = fixture_rows();
        let mut sink = FailingSink {
            inner: MemorySink::default(),
            fail_on: Category::Credits,
        };

        let err = load(&mut sink, &rows, 10_000).unwrap_err();

        assert!(format!("{err:#}").contains("into credits"), "{err:#}");
        assert!(format!("{err:#}").contains("connection reset"));
        assert_eq!(sink.inner.count(Category::Cves), 2);
        assert_eq!(sink.inner.count(Category::ProblemTypes), 2);
        assert_eq!(sink.inner.count(Category::AffectedProducts), 0);
    }

    #[test]
    fn empty_row_set_writes_nothing() {
        let mut sink = MemorySink::default();
        let report = load(&mut sink, &RowSet::default(), 10_000).unwrap();

        assert_eq!(report, LoadReport::default());
        assert!(sink.committed.is_empty());
    }

    #[test]
    fn orphans_are_detected() {
        let mut rows = cvelist::transform(MINIMAL);
        assert_eq!(first_orphan(&rows, Category::Descriptions), None);
        assert_eq!(first_orphan(&rows, Category::Cves), None);

        rows.containers.clear();
        assert_eq!(
            first_orphan(&rows, Category::Descriptions),
            Some(rows.descriptions[0].description_id.clone())
        );
    }
}
