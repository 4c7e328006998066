//! Artifact collection.
//!
//! After the test command exits, its output directory is walked recursively
//! and every `*.xml` file is decoded into an [`Artifact`]. Entries are visited
//! depth-first in lexical file-name order, so the same tree always yields the
//! same report order.
//!
//! Failure policy is split in two. Problems with an individual file (it
//! cannot be read, or does not decode) are tolerated and recorded as
//! [`Artifact::Unparsed`]. Problems walking the tree itself (the directory
//! is missing, a subdirectory cannot be listed) abort collection.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::report::Artifact;

/// Errors raised while walking the output directory.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Summary counts for a collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub parsed: usize,
    pub unparsed: usize,
}

impl CollectStats {
    pub fn from_artifacts(artifacts: &[Artifact]) -> Self {
        let parsed = artifacts.iter().filter(|a| a.is_parsed()).count();
        Self {
            parsed,
            unparsed: artifacts.len() - parsed,
        }
    }
}

/// Collects XML artifacts from a test output directory.
#[derive(Debug, Clone)]
pub struct ArtifactCollector {
    root: PathBuf,
}

impl ArtifactCollector {
    /// Creates a collector rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walks the directory and decodes every `*.xml` file found.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Walk`] if the root is missing or any part of
    /// the tree cannot be traversed.
    pub fn collect(&self) -> Result<Vec<Artifact>, CollectError> {
        let mut artifacts = Vec::new();

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|source| CollectError::Walk {
                root: self.root.clone(),
                source,
            })?;

            let path = entry.path();
            if !is_xml_artifact(path) {
                continue;
            }

            let artifact = read_artifact(path);
            if let Artifact::Unparsed { path, reason } = &artifact {
                warn!("Could not decode {}: {}", path.display(), reason);
            } else {
                debug!("Collected {}", path.display());
            }
            artifacts.push(artifact);
        }

        let stats = CollectStats::from_artifacts(&artifacts);
        info!(
            "Logs collected: {} artifacts ({} unparsed) from {}",
            artifacts.len(),
            stats.unparsed,
            self.root.display()
        );

        Ok(artifacts)
    }
}

/// Matches on the extension only, exactly `xml`.
fn is_xml_artifact(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("xml"))
}

fn read_artifact(path: &Path) -> Artifact {
    match std::fs::read(path) {
        Ok(bytes) => Artifact::decode(path, &String::from_utf8_lossy(&bytes)),
        Err(e) => Artifact::Unparsed {
            path: path.to_path_buf(),
            reason: format!("failed to read file: {}", e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TestFailures;
    use std::fs;
    use tempfile::TempDir;

    fn artifact_xml(duration: &str, names: &[&str]) -> String {
        let cases: String = names
            .iter()
            .map(|n| format!(r#"<testcase classname="C" name="{n}" message="m"/>"#))
            .collect();
        format!(r#"<testfailures duration="{duration}">{cases}</testfailures>"#)
    }

    #[test]
    fn test_is_xml_artifact() {
        assert!(is_xml_artifact(Path::new("out/TEST-Foo.xml")));
        assert!(!is_xml_artifact(Path::new("out/TEST-Foo.XML")));
        assert!(!is_xml_artifact(Path::new("out/TEST-Foo.xml.bak")));
        assert!(!is_xml_artifact(Path::new("out/xml")));
        assert!(!is_xml_artifact(Path::new("out/report.json")));
    }

    #[test]
    fn test_collect_recurses_and_filters() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("module-a/nested")).unwrap();
        fs::write(root.join("top.xml"), artifact_xml("1", &["t1"])).unwrap();
        fs::write(
            root.join("module-a/nested/deep.xml"),
            artifact_xml("2", &["t2", "t3"]),
        )
        .unwrap();
        fs::write(root.join("module-a/output.txt"), "not an artifact").unwrap();

        let artifacts = ArtifactCollector::new(root).collect().unwrap();

        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.iter().all(Artifact::is_parsed));
        let mut cases: Vec<usize> = artifacts
            .into_iter()
            .map(|a| a.into_failures().test_cases.len())
            .collect();
        cases.sort();
        assert_eq!(cases, vec![1, 2]);
    }

    #[test]
    fn test_collect_order_is_lexical() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("b-dir")).unwrap();
        fs::write(root.join("c.xml"), artifact_xml("3", &["c"])).unwrap();
        fs::write(root.join("b-dir/inner.xml"), artifact_xml("2", &["inner"])).unwrap();
        fs::write(root.join("a.xml"), artifact_xml("1", &["a"])).unwrap();

        let names: Vec<String> = ArtifactCollector::new(root)
            .collect()
            .unwrap()
            .into_iter()
            .map(|a| a.into_failures().test_cases[0].name.clone())
            .collect();

        assert_eq!(names, vec!["a", "inner", "c"]);
    }

    #[test]
    fn test_malformed_file_does_not_stop_walk() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.xml"), artifact_xml("1", &["ok"])).unwrap();
        fs::write(root.join("b.xml"), "<testfailures><testcase").unwrap();
        fs::write(root.join("c.xml"), artifact_xml("3", &["also_ok"])).unwrap();

        let artifacts = ArtifactCollector::new(root).collect().unwrap();

        assert_eq!(artifacts.len(), 3);
        assert_eq!(
            CollectStats::from_artifacts(&artifacts),
            CollectStats {
                parsed: 2,
                unparsed: 1
            }
        );
        let broken = artifacts
            .into_iter()
            .find(|a| a.path().ends_with("b.xml"))
            .unwrap();
        assert_eq!(broken.into_failures(), TestFailures::default());
    }

    #[test]
    fn test_empty_directory_yields_no_artifacts() {
        let temp_dir = TempDir::new().unwrap();
        let artifacts = ArtifactCollector::new(temp_dir.path()).collect().unwrap();
        assert!(artifacts.is_empty());
    }

    #[test]
    fn test_missing_directory_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("FLAKY_TEST_OUTPUT");

        let err = ArtifactCollector::new(&missing).collect().unwrap_err();
        assert!(err.to_string().contains("FLAKY_TEST_OUTPUT"));
    }

    #[test]
    fn test_non_utf8_content_is_tolerated() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("bin.xml"), [0xff, 0xfe, 0x00, 0x3c]).unwrap();

        let artifacts = ArtifactCollector::new(temp_dir.path()).collect().unwrap();

        assert_eq!(artifacts.len(), 1);
        assert!(!artifacts[0].is_parsed());
    }
}
