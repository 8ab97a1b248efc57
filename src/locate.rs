//! Error location: map a failing `(file, line)` to the nearest declared entity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::graph::types::{ClassInfo, FunctionInfo, LineSpan, SourceFileRecord};

/// One frame of a failure trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    /// File as written in the trace, absolute or relative.
    pub file: String,
    /// 1-based line number.
    pub line: usize,
}

impl ErrorLocation {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Project-relative path (`./pkg/mod.py`) of the frame's file.
    ///
    /// Absolute paths must lie under one of `bases` (the project root, or a
    /// staged copy of it); relative paths are taken as already relative.
    /// Frames outside every base (standard library, site-packages) give `None`.
    pub fn project_path(&self, bases: &[&Path]) -> Option<String> {
        let file = normalize(Path::new(&self.file))?;
        if file.is_relative() {
            return join_normal(&file);
        }

        // Compare both as written and canonicalized; symlinked temp dirs differ.
        let files: Vec<PathBuf> = std::iter::once(file.clone())
            .chain(file.canonicalize().ok())
            .collect();
        let bases: Vec<PathBuf> = bases
            .iter()
            .flat_map(|b| std::iter::once(b.to_path_buf()).chain(b.canonicalize().ok()))
            .filter_map(|b| normalize(&b))
            .collect();

        files
            .iter()
            .find_map(|f| bases.iter().find_map(|b| f.strip_prefix(b).ok()))
            .and_then(join_normal)
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File: {}, Line: {}", self.file, self.line)
    }
}

/// Lexically resolve `.` and `..`. A `..` that climbs above the start of a
/// relative path, or above the root of an absolute one, gives `None`.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    return None;
                }
                out.pop();
            }
            other => out.push(other),
        }
    }
    Some(out)
}

fn join_normal(rel: &Path) -> Option<String> {
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    (!parts.is_empty()).then(|| format!("./{}", parts.join("/")))
}

/// The entity a line was attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityMatch {
    Method { class: String, method: String },
    InsideClass { class: String },
    Function { name: String },
    NearFunction { name: String },
    NotFound,
}

impl fmt::Display for EntityMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityMatch::Method { class, method } => write!(f, "Method {method} of class {class}"),
            EntityMatch::InsideClass { class } => write!(f, "Inside class {class}"),
            EntityMatch::Function { name } => write!(f, "Function {name}"),
            EntityMatch::NearFunction { name } => write!(f, "Near function {name}"),
            EntityMatch::NotFound => write!(f, "No nearby entity found"),
        }
    }
}

/// Keeps the lowest-distance candidate; the first one offered wins ties.
#[derive(Default)]
struct Nearest {
    best: Option<(usize, EntityMatch)>,
}

impl Nearest {
    fn offer(&mut self, distance: usize, candidate: EntityMatch) {
        if self.best.as_ref().map_or(true, |(d, _)| distance < *d) {
            self.best = Some((distance, candidate));
        }
    }

    fn finish(self) -> EntityMatch {
        self.best.map(|(_, m)| m).unwrap_or(EntityMatch::NotFound)
    }
}

/// Find the entity nearest to `line` in a file's record.
///
/// Classes containing the line are checked first: a method containing it wins
/// outright, otherwise the class itself matches at its boundary distance. Only
/// when no class contains the line do all classes and top-level functions
/// compete by distance. Entities are scanned by start line, then name.
pub fn find_nearest_entity(record: Option<&SourceFileRecord>, line: usize) -> EntityMatch {
    let Some(record) = record else {
        return EntityMatch::NotFound;
    };
    let classes: Vec<&ClassInfo> = by_position(record.classes.values());
    let mut nearest = Nearest::default();

    let containing: Vec<&ClassInfo> = classes
        .iter()
        .copied()
        .filter(|c| c.contains_line(line))
        .collect();

    if !containing.is_empty() {
        for class in containing {
            let methods: Vec<&FunctionInfo> = by_position(class.methods.values());
            match methods.into_iter().find(|m| m.contains_line(line)) {
                Some(method) => nearest.offer(
                    0,
                    EntityMatch::Method {
                        class: class.name.clone(),
                        method: method.name.clone(),
                    },
                ),
                None => nearest.offer(
                    class.boundary_distance(line),
                    EntityMatch::InsideClass {
                        class: class.name.clone(),
                    },
                ),
            }
        }
        return nearest.finish();
    }

    for class in classes {
        nearest.offer(
            class.boundary_distance(line),
            EntityMatch::InsideClass {
                class: class.name.clone(),
            },
        );
    }
    for function in by_position(record.functions.values()) {
        let name = function.name.clone();
        if function.contains_line(line) {
            nearest.offer(0, EntityMatch::Function { name });
        } else {
            nearest.offer(
                function.boundary_distance(line),
                EntityMatch::NearFunction { name },
            );
        }
    }
    nearest.finish()
}

fn by_position<'a, T, I>(items: I) -> Vec<&'a T>
where
    T: LineSpan + Named + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut items: Vec<&T> = items.collect();
    items.sort_by(|a, b| {
        a.start_line()
            .cmp(&b.start_line())
            .then_with(|| a.name().cmp(b.name()))
    });
    items
}

trait Named {
    fn name(&self) -> &str;
}

impl Named for ClassInfo {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for FunctionInfo {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::EntityKind;

    fn record() -> SourceFileRecord {
        let mut class = ClassInfo::new("C".into(), 10, 40);
        class.methods.insert(
            "m".into(),
            FunctionInfo::new("m".into(), EntityKind::Method, 15, 20),
        );
        let mut record = SourceFileRecord {
            path: "./app.py".into(),
            ..Default::default()
        };
        record.classes.insert("C".into(), class);
        record
    }

    #[test]
    fn test_line_inside_method() {
        let found = find_nearest_entity(Some(&record()), 17);
        assert_eq!(found.to_string(), "Method m of class C");
    }

    #[test]
    fn test_line_in_class_body_outside_methods() {
        let found = find_nearest_entity(Some(&record()), 30);
        assert_eq!(found, EntityMatch::InsideClass { class: "C".into() });
    }

    #[test]
    fn test_line_after_class_without_functions() {
        let found = find_nearest_entity(Some(&record()), 45);
        assert_eq!(found.to_string(), "Inside class C");
    }

    #[test]
    fn test_functions_compete_when_no_class_contains_line() {
        let mut record = record();
        record.functions.insert(
            "helper".into(),
            FunctionInfo::new("helper".into(), EntityKind::Function, 44, 50),
        );
        record.functions.insert(
            "far".into(),
            FunctionInfo::new("far".into(), EntityKind::Function, 80, 90),
        );

        assert_eq!(
            find_nearest_entity(Some(&record), 45).to_string(),
            "Function helper"
        );
        assert_eq!(
            find_nearest_entity(Some(&record), 70).to_string(),
            "Near function far"
        );
        assert_eq!(
            find_nearest_entity(Some(&record), 2).to_string(),
            "Inside class C"
        );
    }

    #[test]
    fn test_ties_resolve_to_earliest_declaration() {
        let mut record = SourceFileRecord::default();
        record.functions.insert(
            "b_first".into(),
            FunctionInfo::new("b_first".into(), EntityKind::Function, 1, 5),
        );
        record.functions.insert(
            "a_second".into(),
            FunctionInfo::new("a_second".into(), EntityKind::Function, 11, 15),
        );
        assert_eq!(
            find_nearest_entity(Some(&record), 8).to_string(),
            "Near function b_first"
        );
    }

    #[test]
    fn test_missing_record_or_empty_file() {
        assert_eq!(find_nearest_entity(None, 3), EntityMatch::NotFound);
        assert_eq!(
            find_nearest_entity(Some(&SourceFileRecord::default()), 3).to_string(),
            "No nearby entity found"
        );
    }

    #[test]
    fn test_project_path() {
        let root = Path::new("/work/proj");
        assert_eq!(
            ErrorLocation::new("/work/proj/pkg/mod.py", 3)
                .project_path(&[root])
                .as_deref(),
            Some("./pkg/mod.py")
        );
        assert_eq!(
            ErrorLocation::new("main.py", 1).project_path(&[root]).as_deref(),
            Some("./main.py")
        );
        assert_eq!(
            ErrorLocation::new("/usr/lib/python3/json/decoder.py", 9).project_path(&[root]),
            None
        );
    }

    #[test]
    fn test_project_path_resolves_parent_components() {
        let root = Path::new("/work/proj");
        assert_eq!(
            ErrorLocation::new("/work/proj/pkg/../util.py", 2)
                .project_path(&[root])
                .as_deref(),
            Some("./util.py")
        );
        assert_eq!(
            ErrorLocation::new("./pkg/./mod.py", 2).project_path(&[root]).as_deref(),
            Some("./pkg/mod.py")
        );
        assert_eq!(
            ErrorLocation::new("/work/proj/../elsewhere/x.py", 1).project_path(&[root]),
            None
        );
        assert_eq!(ErrorLocation::new("../other/x.py", 1).project_path(&[root]), None);
        assert_eq!(ErrorLocation::new("pkg/../../x.py", 1).project_path(&[root]), None);
    }
}
