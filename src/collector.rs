use crate::error::Result;
use crate::location::MBertLocation;
use crate::selection::{CodePosition, MethodInfo};
use crate::source::NodeKind;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Sink for accepted locations and unhandled-element counts.
pub trait LocationsCollector {
    fn add_location(
        &mut self,
        file_path: &str,
        class_name: &str,
        method: &MethodInfo,
        line: usize,
        location: MBertLocation,
    );

    fn add_unhandled_mutation(&mut self, node_type: NodeKind);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineLocation {
    pub line: usize,
    pub location: MBertLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodLocations {
    pub signature: String,
    pub start_line: usize,
    pub end_line: usize,
    pub code_position: CodePosition,
    pub locations: Vec<LineLocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassLocations {
    pub qualified_name: String,
    pub methods: Vec<MethodLocations>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileLocations {
    pub file_path: String,
    pub classes: Vec<ClassLocations>,
}

/// Groups locations by file, class and method, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonLocationsCollector {
    pub files: Vec<FileLocations>,
    pub unhandled_mutations: BTreeMap<NodeKind, usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LocationsReport {
    pub date: String,
    pub tool_version: String,
    pub total_locations: usize,
    pub files: Vec<FileLocations>,
    pub unhandled_mutations: BTreeMap<NodeKind, usize>,
}

impl JsonLocationsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn location_count(&self) -> usize {
        self.locations().count()
    }

    pub fn unhandled_count(&self) -> usize {
        self.unhandled_mutations.values().sum()
    }

    pub fn locations(&self) -> impl Iterator<Item = &MBertLocation> {
        self.files
            .iter()
            .flat_map(|f| &f.classes)
            .flat_map(|c| &c.methods)
            .flat_map(|m| &m.locations)
            .map(|l| &l.location)
    }

    /// Appends everything `other` collected.
    pub fn merge(&mut self, other: JsonLocationsCollector) {
        for file in other.files {
            for class in file.classes {
                for method in class.methods {
                    let info = MethodInfo {
                        signature: method.signature,
                        start_line: method.start_line,
                        end_line: method.end_line,
                        code_position: method.code_position,
                    };
                    for entry in method.locations {
                        self.add_location(
                            &file.file_path,
                            &class.qualified_name,
                            &info,
                            entry.line,
                            entry.location,
                        );
                    }
                }
            }
        }
        for (node_type, count) in other.unhandled_mutations {
            *self.unhandled_mutations.entry(node_type).or_insert(0) += count;
        }
    }

    pub fn report(&self) -> LocationsReport {
        let now: DateTime<Local> = Local::now();
        LocationsReport {
            date: now.format("%d/%m/%Y %H:%M:%S").to_string(),
            tool_version: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            total_locations: self.location_count(),
            files: self.files.clone(),
            unhandled_mutations: self.unhandled_mutations.clone(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json_content = serde_json::to_string_pretty(&self.report())?;
        fs::write(path, json_content)?;
        info!(
            path = %path.display(),
            locations = self.location_count(),
            "locations saved"
        );
        Ok(())
    }

    fn method_entry(&mut self, file_path: &str, class_name: &str, method: &MethodInfo) -> &mut MethodLocations {
        let files = &mut self.files;
        let file_index = match files.iter().position(|f| f.file_path == file_path) {
            Some(index) => index,
            None => {
                files.push(FileLocations {
                    file_path: file_path.to_string(),
                    classes: Vec::new(),
                });
                files.len() - 1
            }
        };

        let classes = &mut files[file_index].classes;
        let class_index = match classes.iter().position(|c| c.qualified_name == class_name) {
            Some(index) => index,
            None => {
                classes.push(ClassLocations {
                    qualified_name: class_name.to_string(),
                    methods: Vec::new(),
                });
                classes.len() - 1
            }
        };

        let methods = &mut classes[class_index].methods;
        let method_index = match methods.iter().position(|m| {
            m.signature == method.signature && m.start_line == method.start_line
        }) {
            Some(index) => index,
            None => {
                methods.push(MethodLocations {
                    signature: method.signature.clone(),
                    start_line: method.start_line,
                    end_line: method.end_line,
                    code_position: method.code_position,
                    locations: Vec::new(),
                });
                methods.len() - 1
            }
        };

        &mut methods[method_index]
    }
}

impl LocationsCollector for JsonLocationsCollector {
    fn add_location(
        &mut self,
        file_path: &str,
        class_name: &str,
        method: &MethodInfo,
        line: usize,
        location: MBertLocation,
    ) {
        self.method_entry(file_path, class_name, method)
            .locations
            .push(LineLocation { line, location });
    }

    fn add_unhandled_mutation(&mut self, node_type: NodeKind) {
        *self.unhandled_mutations.entry(node_type).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn location(mutant_id: usize, line: usize) -> MBertLocation {
        MBertLocation {
            mutant_id,
            node_type: NodeKind::Return,
            line,
            end_line: line,
            source_start: 0,
            source_end: 0,
            masked_code: "x".to_string(),
            fingerprint: String::new(),
        }
    }

    fn method(signature: &str, start_line: usize) -> MethodInfo {
        MethodInfo {
            signature: signature.to_string(),
            start_line,
            end_line: start_line + 10,
            code_position: CodePosition::default(),
        }
    }

    #[test]
    fn test_groups_by_file_class_and_method() {
        let mut collector = JsonLocationsCollector::new();
        collector.add_location("A.java", "a.A", &method("foo()", 1), 2, location(0, 2));
        collector.add_location("A.java", "a.A", &method("foo()", 1), 3, location(5, 3));
        collector.add_location("A.java", "a.A", &method("bar()", 20), 21, location(10, 21));
        collector.add_location("B.java", "b.B", &method("baz()", 1), 4, location(0, 4));

        assert_eq!(collector.files.len(), 2);
        assert_eq!(collector.files[0].classes[0].methods.len(), 2);
        assert_eq!(collector.files[0].classes[0].methods[0].locations.len(), 2);
        assert_eq!(collector.location_count(), 4);
    }

    #[test]
    fn test_unhandled_tally_and_merge() {
        let mut first = JsonLocationsCollector::new();
        first.add_unhandled_mutation(NodeKind::Break);
        first.add_unhandled_mutation(NodeKind::Break);
        first.add_location("A.java", "A", &method("foo()", 1), 2, location(0, 2));

        let mut second = JsonLocationsCollector::new();
        second.add_unhandled_mutation(NodeKind::Block);
        second.add_unhandled_mutation(NodeKind::Break);
        second.add_location("A.java", "A", &method("foo()", 1), 3, location(5, 3));

        first.merge(second);

        assert_eq!(first.unhandled_mutations[&NodeKind::Break], 3);
        assert_eq!(first.unhandled_mutations[&NodeKind::Block], 1);
        assert_eq!(first.unhandled_count(), 4);
        assert_eq!(first.files.len(), 1);
        assert_eq!(first.location_count(), 2);
    }

    #[test]
    fn test_write_json_report() {
        let temp_dir = tempdir().unwrap();
        let output = temp_dir.path().join("locations.json");

        let mut collector = JsonLocationsCollector::new();
        collector.add_location("A.java", "A", &method("foo()", 1), 2, location(0, 2));
        collector.add_unhandled_mutation(NodeKind::Continue);
        collector.write_json(&output).unwrap();

        let content = fs::read_to_string(&output).unwrap();
        let report: LocationsReport = serde_json::from_str(&content).unwrap();
        assert_eq!(report.total_locations, 1);
        assert_eq!(report.files[0].classes[0].methods[0].signature, "foo()");
        assert_eq!(report.unhandled_mutations[&NodeKind::Continue], 1);
    }
}
