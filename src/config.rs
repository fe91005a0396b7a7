use crate::error::{LocatorError, Result};
use crate::request::{FileRequest, MethodRequest};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Methods and lines an exclusion request selects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeSpec {
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub lines: Vec<usize>,
}

/// One entry of a JSON request file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub file_path: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub lines: Vec<usize>,
    #[serde(default)]
    pub exclude: Option<ExcludeSpec>,
}

impl RequestSpec {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            methods: Vec::new(),
            lines: Vec::new(),
            exclude: None,
        }
    }

    pub fn into_file_request(self, seed: Option<u64>) -> FileRequest {
        let mut request = FileRequest::new(
            self.file_path.clone(),
            self.methods.into_iter().map(MethodRequest::new).collect(),
            self.lines,
        );
        if let Some(exclude) = self.exclude {
            request.set_exclude_file_request(Arc::new(FileRequest::new(
                self.file_path,
                exclude.methods.into_iter().map(MethodRequest::new).collect(),
                exclude.lines,
            )));
        }
        match seed {
            Some(seed) => request.with_random_seed(seed),
            None => request,
        }
    }
}

pub fn load_requests(path: &Path) -> Result<Vec<RequestSpec>> {
    let content = fs::read_to_string(path)?;
    let requests: Vec<RequestSpec> = serde_json::from_str(&content)?;
    if let Some(empty) = requests.iter().find(|r| r.file_path.trim().is_empty()) {
        return Err(LocatorError::InvalidInput(format!(
            "Request without file_path in {}: {:?}",
            path.display(),
            empty
        )));
    }
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ElementTree, NodeKind, SourcePosition};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_requests() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(
            temp_file,
            r#"[
                {{"file_path": "src/A.java", "methods": ["foo"], "lines": [3, 4]}},
                {{"file_path": "src/B.java", "exclude": {{"lines": [15]}}}}
            ]"#
        )
        .unwrap();

        let requests = load_requests(temp_file.path()).unwrap();

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].methods, vec!["foo".to_string()]);
        assert_eq!(requests[0].lines, vec![3, 4]);
        assert!(requests[0].exclude.is_none());
        assert_eq!(requests[1].exclude.as_ref().unwrap().lines, vec![15]);
    }

    #[test]
    fn test_rejects_blank_file_path() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, r#"[{{"file_path": " "}}]"#).unwrap();

        assert!(matches!(
            load_requests(temp_file.path()),
            Err(LocatorError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_into_file_request_wires_exclusion() {
        let spec = RequestSpec {
            file_path: "A.java".to_string(),
            methods: vec!["foo".to_string(), "bar".to_string()],
            lines: vec![],
            exclude: Some(ExcludeSpec {
                methods: vec![],
                lines: vec![15],
            }),
        };
        let request = spec.into_file_request(Some(7));

        let mut tree = ElementTree::new("A.java");
        let foo = tree.add_method(NodeKind::Method, "foo", "foo()", "", SourcePosition::lines(10, 20));
        let bar = tree.add_method(NodeKind::Method, "bar", "bar()", "", SourcePosition::lines(30, 40));

        assert!(request.is_method_to_mutate(tree.get(foo).unwrap()));
        assert!(!request.is_method_to_mutate(tree.get(bar).unwrap()));
        assert_eq!(request.file_path(), "A.java");
    }
}
