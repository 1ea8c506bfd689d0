use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use regex::Regex;
use walkdir::WalkDir;

pub mod ids;
pub mod metric;
pub mod record;
pub mod transform;

pub use transform::{transform, transform_file};

pub const SOURCE_NAME: &str = "CVEProject/cvelistV5";
pub const VERSION: &str = "5";

const RECORD_FILE_PATTERN: &str = r"^CVE-\d{4}-\d{4,}\.json$";

/// Lists every CVE record file below `root`, sorted by path.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let record_file_name = Regex::new(RECORD_FILE_PATTERN)?;

    log::info!("scanning {} for CVE records ...", root.display());

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_file()
            && entry.file_name().to_str().is_some_and(|name| record_file_name.is_match(name))
        {
            files.push(entry.into_path());
        }
    }
    files.sort();

    log::info!("found {} CVE record files", files.len());

    Ok(files)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use test_case::test_case;

    use super::*;

    #[test_case("CVE-2024-0001.json", true)]
    #[test_case("CVE-2021-44228.json", true)]
    #[test_case("CVE-2021-1234567.json", true)]
    #[test_case("CVE-2024-001.json", false ; "short sequence")]
    #[test_case("cve-2024-0001.json", false ; "lowercase prefix")]
    #[test_case("CVE-2024-0001.json.bak", false ; "trailing extension")]
    #[test_case("CVE-2024-0001.txt", false ; "wrong extension")]
    #[test_case("delta.json", false ; "feed metadata")]
    fn record_file_names(name: &str, expected: bool) {
        let pattern = Regex::new(RECORD_FILE_PATTERN).unwrap();
        assert_eq!(pattern.is_match(name), expected);
    }

    #[test]
    fn discovers_nested_record_files_in_order() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("cves/2024/0xxx");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(root.path().join("cves/2021/44xxx")).unwrap();

        fs::write(nested.join("CVE-2024-0002.json"), "{}").unwrap();
        fs::write(nested.join("CVE-2024-0001.json"), "{}").unwrap();
        fs::write(root.path().join("cves/2021/44xxx/CVE-2021-44228.json"), "{}").unwrap();
        fs::write(root.path().join("cves/delta.json"), "{}").unwrap();
        fs::write(root.path().join("README.md"), "").unwrap();
        // a directory named like a record is not a record
        fs::create_dir_all(root.path().join("CVE-2020-0001.json")).unwrap();

        let found: Vec<PathBuf> = discover(root.path())
            .unwrap()
            .into_iter()
            .map(|p| p.strip_prefix(root.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            found,
            vec![
                PathBuf::from("cves/2021/44xxx/CVE-2021-44228.json"),
                PathBuf::from("cves/2024/0xxx/CVE-2024-0001.json"),
                PathBuf::from("cves/2024/0xxx/CVE-2024-0002.json"),
            ]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        assert!(discover(&root.path().join("absent")).is_err());
    }
}
