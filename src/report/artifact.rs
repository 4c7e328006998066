//! Decoding of `<testfailures>` XML artifacts.
//!
//! The test command writes one artifact per suite or class:
//!
//! ```xml
//! <testfailures duration="1.52">
//!   <testcase classname="com.acme.CartTest" displayName="adds item"
//!             message="expected 2 but was 1" name="addsItem"
//!             stacktrace="java.lang.AssertionError: ..."/>
//! </testfailures>
//! ```
//!
//! Decoding is permissive. Unknown elements and attributes are skipped, even
//! between `<testcase>` siblings, and a missing attribute decodes as an empty
//! string. A document that cannot be
//! decoded at all becomes [`Artifact::Unparsed`] instead of an error, so a
//! single garbled file never blocks the report.

use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;

use super::{TestCase, TestFailures};

/// Root element every artifact must have.
pub const ROOT_ELEMENT: &str = "testfailures";

/// Outcome of decoding one artifact file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// The file decoded into a failure report (possibly with no test cases).
    Parsed {
        path: PathBuf,
        failures: TestFailures,
    },

    /// The file could not be read or decoded.
    Unparsed { path: PathBuf, reason: String },
}

impl Artifact {
    /// Decodes artifact `content` read from `path`.
    pub fn decode(path: &Path, content: &str) -> Self {
        match decode_test_failures(content) {
            Ok(failures) => Artifact::Parsed {
                path: path.to_path_buf(),
                failures,
            },
            Err(reason) => Artifact::Unparsed {
                path: path.to_path_buf(),
                reason,
            },
        }
    }

    /// The file this artifact came from.
    pub fn path(&self) -> &Path {
        match self {
            Artifact::Parsed { path, .. } | Artifact::Unparsed { path, .. } => path,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Artifact::Parsed { .. })
    }

    /// The entry this artifact contributes to the report.
    ///
    /// Unparsed artifacts contribute an empty [`TestFailures`] so the report
    /// keeps one entry per discovered file.
    pub fn into_failures(self) -> TestFailures {
        match self {
            Artifact::Parsed { failures, .. } => failures,
            Artifact::Unparsed { .. } => TestFailures::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTestFailures {
    #[serde(rename = "@duration")]
    duration: String,
    #[serde(rename = "testcase")]
    test_cases: Vec<RawTestCase>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTestCase {
    #[serde(rename = "@classname")]
    classname: String,
    #[serde(rename = "@displayName")]
    display_name: String,
    #[serde(rename = "@message")]
    message: String,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@stacktrace")]
    stacktrace: String,
}

impl From<RawTestCase> for TestCase {
    fn from(raw: RawTestCase) -> Self {
        TestCase {
            classname: raw.classname,
            display_name: raw.display_name,
            message: raw.message,
            name: raw.name,
            stacktrace: raw.stacktrace,
        }
    }
}

/// Decodes a `<testfailures>` document.
///
/// Returns a human-readable reason on failure.
fn decode_test_failures(content: &str) -> Result<TestFailures, String> {
    match root_element(content)? {
        Some(root) if root == ROOT_ELEMENT => {}
        Some(root) => {
            return Err(format!(
                "expected <{}> root element, found <{}>",
                ROOT_ELEMENT, root
            ));
        }
        None => return Err("document has no root element".to_string()),
    }

    let raw: RawTestFailures = quick_xml::de::from_str(content).map_err(|e| e.to_string())?;

    Ok(TestFailures {
        duration: raw.duration,
        test_cases: raw.test_cases.into_iter().map(TestCase::from).collect(),
    })
}

/// Finds the name of the first element in the document.
fn root_element(content: &str) -> Result<Option<String>, String> {
    let mut reader = Reader::from_str(content);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                return Ok(Some(name));
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => {
                return Err(format!(
                    "malformed XML at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
        }
    }
}
