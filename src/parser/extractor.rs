//! Entity extraction from a Python syntax tree.
//!
//! A single pre-order walk keeps a stack of enclosing class/function scopes.
//! Classes are registered file-wide; a function directly under the module is a
//! top-level function, one directly under a class is a method of that class,
//! and a function nested in another function is folded into its parent: its
//! calls and variables attach to the nearest registered function.

use std::collections::BTreeMap;
use tree_sitter::Node;

use super::names::{annotation_text, decorator_name, docstring, dotted_name, node_text};
use crate::graph::types::{ClassInfo, EntityKind, FunctionInfo, Parameter};

/// Entities and raw imports of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileEntities {
    pub classes: BTreeMap<String, ClassInfo>,
    pub functions: BTreeMap<String, FunctionInfo>,
    /// Raw dotted import strings in source order.
    pub imports: Vec<String>,
}

/// Walk a parsed module and collect its entities.
pub fn extract_entities(root: &Node, source: &[u8]) -> FileEntities {
    let mut walker = EntityWalker {
        source,
        scopes: Vec::new(),
        entities: FileEntities::default(),
    };
    walker.walk(root, NameContext::Load);
    walker.entities
}

/// How an identifier is being used at its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameContext {
    Load,
    Store,
    Del,
}

enum Scope {
    Class(ClassInfo),
    Function(FunctionInfo),
}

struct EntityWalker<'s> {
    source: &'s [u8],
    scopes: Vec<Scope>,
    entities: FileEntities,
}

impl<'s> EntityWalker<'s> {
    fn walk(&mut self, node: &Node, ctx: NameContext) {
        match node.kind() {
            "import_statement" => self.record_import(node),
            "import_from_statement" | "future_import_statement" => self.record_from_import(node),
            "decorated_definition" => self.visit_decorated(node),
            "function_definition" => self.visit_function(node, &[]),
            "class_definition" => self.visit_class(node, &[]),
            "call" => self.visit_call(node),
            "identifier" => self.record_name(node, ctx),

            "assignment" | "augmented_assignment" | "for_statement" | "for_in_clause" => self
                .walk_children(node, |field| match field {
                    Some("left") => Some(NameContext::Store),
                    _ => Some(NameContext::Load),
                }),
            "named_expression" => self.walk_children(node, |field| match field {
                Some("name") => Some(NameContext::Store),
                _ => Some(NameContext::Load),
            }),
            "as_pattern" => self.walk_children(node, |field| match field {
                Some("alias") => Some(NameContext::Store),
                _ => Some(NameContext::Load),
            }),
            "keyword_argument" => self.walk_children(node, |field| match field {
                Some("name") => None,
                _ => Some(NameContext::Load),
            }),
            "attribute" => self.walk_children(node, |field| match field {
                Some("object") => Some(NameContext::Load),
                _ => None,
            }),
            "subscript" => self.walk_children(node, |_| Some(NameContext::Load)),
            "lambda" => {
                if let Some(params) = node.child_by_field_name("parameters") {
                    self.visit_parameter_expressions(&params);
                }
                self.walk_children(node, |field| match field {
                    Some("parameters") => None,
                    _ => Some(NameContext::Load),
                });
            }
            "except_clause" | "except_group_clause" => self.visit_except(node),
            "delete_statement" => self.walk_children(node, |_| Some(NameContext::Del)),
            "global_statement" | "nonlocal_statement" | "dotted_name" | "comment" => {}
            _ => self.walk_children(node, |_| Some(ctx)),
        }
    }

    /// Walk each child with the context chosen from its field name; `None` skips it.
    fn walk_children<F>(&mut self, node: &Node, ctx_for: F)
    where
        F: Fn(Option<&str>) -> Option<NameContext>,
    {
        let mut cursor = node.walk();
        if !cursor.goto_first_child() {
            return;
        }
        loop {
            let child = cursor.node();
            if let Some(ctx) = ctx_for(cursor.field_name()) {
                self.walk(&child, ctx);
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }

    /// Innermost registered function; a class body nested in a function
    /// still belongs to it.
    fn active_function(&mut self) -> Option<&mut FunctionInfo> {
        self.scopes.iter_mut().rev().find_map(|scope| match scope {
            Scope::Function(info) => Some(info),
            Scope::Class(_) => None,
        })
    }

    // ─── Names & Calls ──────────────────────────────────────────

    fn record_name(&mut self, node: &Node, ctx: NameContext) {
        let name = node_text(node, self.source);
        let Some(function) = self.active_function() else {
            return;
        };
        match ctx {
            NameContext::Load => function.variables.record_use(name),
            NameContext::Store => function.variables.record_assignment(name),
            NameContext::Del => {}
        }
    }

    fn visit_call(&mut self, node: &Node) {
        let callee = node
            .child_by_field_name("function")
            .map(|f| dotted_name(&f, self.source))
            .unwrap_or_default();
        if let Some(function) = self.active_function() {
            function.calls.push(callee);
        }
        self.walk_children(node, |_| Some(NameContext::Load));
    }

    /// `except E as e:` binds `e` without it being a variable reference.
    fn visit_except(&mut self, node: &Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        let mut after_as = false;
        for child in &children {
            match child.kind() {
                "as" => after_as = true,
                _ if after_as => after_as = false,
                "as_pattern" => {
                    let mut inner = child.walk();
                    let expression = child.named_children(&mut inner).next();
                    if let Some(expression) = expression {
                        self.walk(&expression, NameContext::Load);
                    }
                }
                _ => self.walk(child, NameContext::Load),
            }
        }
    }

    // ─── Imports ────────────────────────────────────────────────

    fn record_import(&mut self, node: &Node) {
        let mut cursor = node.walk();
        let names: Vec<String> = node
            .children_by_field_name("name", &mut cursor)
            .filter_map(|n| self.imported_name(&n))
            .collect();
        self.entities.imports.extend(names);
    }

    fn record_from_import(&mut self, node: &Node) {
        let module = if node.kind() == "future_import_statement" {
            "__future__".to_string()
        } else {
            node.child_by_field_name("module_name")
                .map(|m| self.from_module(&m))
                .unwrap_or_default()
        };

        let mut names: Vec<String> = {
            let mut cursor = node.walk();
            node.children_by_field_name("name", &mut cursor)
                .filter_map(|n| self.imported_name(&n))
                .collect()
        };
        let mut cursor = node.walk();
        if node
            .children(&mut cursor)
            .any(|c| c.kind() == "wildcard_import")
        {
            names.push("*".to_string());
        }

        for name in names {
            let full = if module.is_empty() {
                name
            } else {
                format!("{module}.{name}")
            };
            self.entities.imports.push(full);
        }
    }

    /// Module part of a `from` import. Relative imports keep only their dotted
    /// name: `from .pkg import x` → `pkg`, `from . import x` → empty.
    fn from_module(&self, node: &Node) -> String {
        match node.kind() {
            "relative_import" => {
                let mut cursor = node.walk();
                let dotted = node
                    .named_children(&mut cursor)
                    .find(|c| c.kind() == "dotted_name");
                dotted
                    .map(|d| node_text(&d, self.source).to_string())
                    .unwrap_or_default()
            }
            _ => node_text(node, self.source).to_string(),
        }
    }

    /// The imported name of a module or symbol, ignoring any `as` alias.
    fn imported_name(&self, node: &Node) -> Option<String> {
        let target = match node.kind() {
            "aliased_import" => node.child_by_field_name("name")?,
            _ => *node,
        };
        let text = node_text(&target, self.source);
        (!text.is_empty()).then(|| text.to_string())
    }

    // ─── Declarations ───────────────────────────────────────────

    fn visit_decorated(&mut self, node: &Node) {
        let mut cursor = node.walk();
        let decorators: Vec<Node> = node
            .children(&mut cursor)
            .filter(|c| c.kind() == "decorator")
            .collect();
        match node.child_by_field_name("definition") {
            Some(def) if def.kind() == "function_definition" => {
                self.visit_function(&def, &decorators)
            }
            Some(def) if def.kind() == "class_definition" => self.visit_class(&def, &decorators),
            Some(def) => {
                for decorator in &decorators {
                    self.walk(decorator, NameContext::Load);
                }
                self.walk(&def, NameContext::Load);
            }
            None => {}
        }
    }

    fn visit_class(&mut self, node: &Node, decorators: &[Node]) {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(&n, self.source).to_string())
            .unwrap_or_default();
        let mut info = ClassInfo::new(name.clone(), start_line(node), end_line(node));
        let body = node.child_by_field_name("body");
        info.docstring = body.as_ref().and_then(|b| docstring(b, self.source));

        // Decorators and bases are evaluated in the enclosing scope.
        for decorator in decorators {
            self.walk(decorator, NameContext::Load);
        }
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            info.bases = superclasses
                .named_children(&mut cursor)
                .filter(|c| c.kind() != "keyword_argument" && c.kind() != "comment")
                .map(|c| dotted_name(&c, self.source))
                .collect();
            self.walk(&superclasses, NameContext::Load);
        }

        self.scopes.push(Scope::Class(info));
        if let Some(body) = body {
            self.walk(&body, NameContext::Load);
        }
        if let Some(Scope::Class(info)) = self.scopes.pop() {
            self.entities.classes.insert(name, info);
        }
    }

    fn visit_function(&mut self, node: &Node, decorators: &[Node]) {
        let kind = match self.scopes.last() {
            None => Some(EntityKind::Function),
            Some(Scope::Class(_)) => Some(EntityKind::Method),
            Some(Scope::Function(_)) => None,
        };
        let params = node.child_by_field_name("parameters");
        let return_type = node.child_by_field_name("return_type");
        let body = node.child_by_field_name("body");

        let Some(kind) = kind else {
            // Nested function: everything inside belongs to the enclosing one.
            for decorator in decorators {
                self.walk(decorator, NameContext::Load);
            }
            if let Some(params) = params {
                self.visit_parameter_expressions(&params);
            }
            if let Some(return_type) = return_type {
                self.walk(&return_type, NameContext::Load);
            }
            if let Some(body) = body {
                self.walk(&body, NameContext::Load);
            }
            return;
        };

        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(&n, self.source).to_string())
            .unwrap_or_default();
        let mut info = FunctionInfo::new(name.clone(), kind, start_line(node), end_line(node));
        info.docstring = body.as_ref().and_then(|b| docstring(b, self.source));
        info.decorators = decorators
            .iter()
            .map(|d| decorator_name(d, self.source))
            .collect();
        info.returns = return_type.map(|r| annotation_text(&r, self.source));
        info.parameters = params
            .map(|p| self.collect_parameters(&p))
            .unwrap_or_default();

        self.scopes.push(Scope::Function(info));
        for decorator in decorators {
            self.walk(decorator, NameContext::Load);
        }
        if let Some(params) = params {
            self.visit_parameter_expressions(&params);
        }
        if let Some(return_type) = return_type {
            self.walk(&return_type, NameContext::Load);
        }
        if let Some(body) = body {
            self.walk(&body, NameContext::Load);
        }

        let Some(Scope::Function(info)) = self.scopes.pop() else {
            return;
        };
        match self.scopes.last_mut() {
            Some(Scope::Class(class)) => {
                class.methods.insert(name, info);
            }
            _ => {
                self.entities.functions.insert(name, info);
            }
        }
    }

    /// Named parameters in declaration order. `*args` / `**kwargs` and the bare
    /// `*` and `/` separators are not listed.
    fn collect_parameters(&self, params: &Node) -> Vec<Parameter> {
        let mut cursor = params.walk();
        let mut out = Vec::new();
        for param in params.named_children(&mut cursor) {
            let (name_node, type_node) = match param.kind() {
                "identifier" => (Some(param), None),
                "typed_parameter" => {
                    let mut inner = param.walk();
                    let first = param.named_children(&mut inner).next();
                    (
                        first.filter(|n| n.kind() == "identifier"),
                        param.child_by_field_name("type"),
                    )
                }
                "default_parameter" => (param.child_by_field_name("name"), None),
                "typed_default_parameter" => (
                    param.child_by_field_name("name"),
                    param.child_by_field_name("type"),
                ),
                _ => (None, None),
            };
            let Some(name_node) = name_node.filter(|n| n.kind() == "identifier") else {
                continue;
            };
            out.push(Parameter {
                name: node_text(&name_node, self.source).to_string(),
                annotation: type_node.map(|t| annotation_text(&t, self.source)),
            });
        }
        out
    }

    /// Default values and annotations of a parameter list are ordinary reads;
    /// the parameter names themselves are not variable references.
    fn visit_parameter_expressions(&mut self, params: &Node) {
        let mut cursor = params.walk();
        let params: Vec<Node> = params.named_children(&mut cursor).collect();
        for param in &params {
            for field in ["type", "value"] {
                if let Some(expr) = param.child_by_field_name(field) {
                    self.walk(&expr, NameContext::Load);
                }
            }
        }
    }
}

fn start_line(node: &Node) -> usize {
    node.start_position().row + 1
}

/// 1-based last line of a node. A node ending at column 0 ends on the
/// previous line.
fn end_line(node: &Node) -> usize {
    let end = node.end_position();
    if end.column == 0 && end.row > node.start_position().row {
        end.row
    } else {
        end.row + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use std::path::Path;

    fn extract(source: &str) -> FileEntities {
        let tree = parse_source(Path::new("test.py"), source).unwrap();
        extract_entities(&tree.root_node(), source.as_bytes())
    }

    #[test]
    fn test_class_and_method_line_ranges() {
        let mut lines = vec!["# header"; 9];
        lines.push("class C:");
        lines.extend(["    a = 1"; 4]);
        lines.push("    def m(self):");
        lines.extend(["        step()"; 5]);
        lines.extend(["    b = 2"; 20]);
        let source = lines.join("\n") + "\n";

        let entities = extract(&source);
        let class = &entities.classes["C"];
        assert_eq!((class.start_line, class.end_line), (10, 40));
        let method = &class.methods["m"];
        assert_eq!((method.start_line, method.end_line), (15, 20));
        assert_eq!(method.kind, EntityKind::Method);
        assert!(entities.functions.is_empty());
    }

    #[test]
    fn test_import_forms() {
        let entities = extract(
            r#"
import os, pkg.mod as m
from a.b import C, D as E
from . import sibling
from .rel import thing
from tools import *
from __future__ import annotations
"#,
        );
        assert_eq!(
            entities.imports,
            vec![
                "os",
                "pkg.mod",
                "a.b.C",
                "a.b.D",
                "sibling",
                "rel.thing",
                "tools.*",
                "__future__.annotations",
            ]
        );
    }

    #[test]
    fn test_imports_inside_functions_are_collected() {
        let entities = extract("def load():\n    import json\n    return json.loads('1')\n");
        assert_eq!(entities.imports, vec!["json"]);
        assert_eq!(entities.functions["load"].calls, vec!["json.loads"]);
    }

    #[test]
    fn test_calls_keep_order_and_duplicates() {
        let entities = extract(
            r#"
setup()

def main():
    run(parse(args))
    run(other)
    self.db.find(1)

class Service:
    registry = build_registry()
"#,
        );
        let main = &entities.functions["main"];
        assert_eq!(main.calls, vec!["run", "parse", "run", "self.db.find"]);
        assert!(entities.classes["Service"].methods.is_empty());
    }

    #[test]
    fn test_variable_contexts() {
        let entities = extract(
            r#"
TOTAL = 0

def work(items, limit=DEFAULT):
    count = 0
    for item in items:
        count += item.size
    first, *rest = items
    data[key] = value
    obj.attr = count
    report(total=count)
    if (n := len(rest)) > limit:
        pass
    with open(path) as fh:
        del fh
    return [x for x in rest]
"#,
        );
        let vars = &entities.functions["work"].variables;
        assert_eq!(
            vars.assigned,
            vec!["count", "item", "first", "rest", "n", "fh", "x"]
        );
        for used in ["DEFAULT", "items", "count", "item", "data", "key", "value", "obj", "report", "len", "rest", "limit", "open", "path", "x"] {
            assert!(vars.used.iter().any(|u| u == used), "missing used name {used}");
        }
        for absent in ["size", "attr", "total", "TOTAL", "work"] {
            assert!(!vars.used.iter().any(|u| u == absent), "unexpected used name {absent}");
        }
    }

    #[test]
    fn test_except_alias_is_not_a_variable() {
        let entities = extract(
            "def f():\n    try:\n        go()\n    except ValueError as err:\n        log(err)\n",
        );
        let vars = &entities.functions["f"].variables;
        assert!(vars.used.iter().any(|u| u == "ValueError"));
        assert!(!vars.assigned.iter().any(|a| a == "err"));
        assert_eq!(entities.functions["f"].calls, vec!["go", "log"]);
    }

    #[test]
    fn test_nested_function_folds_into_parent() {
        let entities = extract(
            r#"
def outer():
    before()
    def inner():
        inside()
    after()
"#,
        );
        assert_eq!(entities.functions.len(), 1);
        let outer = &entities.functions["outer"];
        assert_eq!(outer.calls, vec!["before", "inside", "after"]);
    }

    #[test]
    fn test_class_body_inside_function_attributes_to_function() {
        let entities = extract(
            r#"
def outer():
    class K:
        attr = build()

        def method(self):
            own()
    after()
"#,
        );
        let outer = &entities.functions["outer"];
        assert_eq!(outer.calls, vec!["build", "after"]);
        assert!(outer.variables.assigned.contains(&"attr".to_string()));
        assert_eq!(entities.classes["K"].methods["method"].calls, vec!["own"]);
    }

    #[test]
    fn test_function_details() {
        let entities = extract(
            r#"
class Repo(base.Model, Mixin, metaclass=Meta):
    """Stores things."""

    @staticmethod
    @app.route("/items")
    def get(self, item_id: int, flag=False, *args, opt: Optional[str] = None, **kw) -> Optional[dict]:
        """Fetch one item.

        Returns None when missing.
        """
        return None
"#,
        );
        let class = &entities.classes["Repo"];
        assert_eq!(class.bases, vec!["base.Model", "Mixin"]);
        assert_eq!(class.docstring.as_deref(), Some("Stores things."));

        let get = &class.methods["get"];
        assert_eq!(get.decorators, vec!["staticmethod", "app.route"]);
        assert_eq!(get.calls, vec!["app.route"]);
        assert_eq!(get.returns.as_deref(), Some("Optional"));
        assert_eq!(
            get.docstring.as_deref(),
            Some("Fetch one item.\n\nReturns None when missing.")
        );
        let params: Vec<(&str, Option<&str>)> = get
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.annotation.as_deref()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("self", None),
                ("item_id", Some("int")),
                ("flag", None),
                ("opt", Some("Optional")),
            ]
        );
    }

    #[test]
    fn test_name_collision_last_declaration_wins() {
        let entities = extract(
            r#"
def handler():
    first()

def handler():
    second()
"#,
        );
        assert_eq!(entities.functions.len(), 1);
        assert_eq!(entities.functions["handler"].calls, vec!["second"]);
        assert_eq!(entities.functions["handler"].start_line, 5);
    }

    #[test]
    fn test_nested_class_is_registered_with_its_methods() {
        let entities = extract(
            r#"
class Outer:
    class Inner:
        def run(self):
            pass

    def go(self):
        pass
"#,
        );
        assert!(entities.classes["Inner"].methods.contains_key("run"));
        assert!(entities.classes["Outer"].methods.contains_key("go"));
        assert!(!entities.classes["Outer"].methods.contains_key("run"));
    }

    #[test]
    fn test_async_function_is_recorded() {
        let entities = extract("async def fetch(url):\n    await get(url)\n");
        let fetch = &entities.functions["fetch"];
        assert_eq!(fetch.kind, EntityKind::Function);
        assert_eq!(fetch.calls, vec!["get"]);
    }
}
