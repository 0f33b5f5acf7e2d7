//! Declaration extraction from Python source.
//!
//! Only module-level structure is pulled out: classes (with their methods),
//! top-level functions, import statements anywhere in the file, and the
//! module docstring. Malformed input never panics or propagates; it comes
//! back as a [`ParseError`] value.

use tree_sitter::{Node, Parser};

use crate::core::{
    ClassDecl, FunctionDecl, ImportKind, ImportRef, Parameter, ParseError, SourceFile,
};

/// Parses one file's text into its declarations.
pub fn parse_source(text: &str, path: &str) -> Result<SourceFile, ParseError> {
    let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();

    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&language) {
        return Err(parse_error(path, format!("Parser setup failed: {}", e)));
    }

    let tree = match parser.parse(text, None) {
        Some(t) => t,
        None => return Err(parse_error(path, "Parser produced no tree".to_string())),
    };

    let root = tree.root_node();
    if root.has_error() {
        return Err(syntax_error(root, path));
    }

    let src = text.as_bytes();
    let mut file = SourceFile::new(path);
    file.docstring = leading_docstring(root, src, false);

    for child in named_children(root) {
        match classify(child) {
            Statement::Class { node, decorators } => {
                file.classes
                    .push(extract_class(node, &decorators, src, path));
            }
            Statement::Function { node, decorators } => {
                file.functions
                    .push(extract_function(node, &decorators, src, None));
            }
            Statement::Other => {}
        }
    }

    collect_imports(root, src, &mut file.imports);
    Ok(file)
}

/// The closed set of statement shapes the extractor distinguishes.
enum Statement<'t> {
    Class {
        node: Node<'t>,
        decorators: Vec<Node<'t>>,
    },
    Function {
        node: Node<'t>,
        decorators: Vec<Node<'t>>,
    },
    Other,
}

fn classify(node: Node<'_>) -> Statement<'_> {
    match node.kind() {
        "class_definition" => Statement::Class {
            node,
            decorators: Vec::new(),
        },
        "function_definition" => Statement::Function {
            node,
            decorators: Vec::new(),
        },
        "decorated_definition" => {
            let decorators: Vec<Node> = named_children(node)
                .into_iter()
                .filter(|c| c.kind() == "decorator")
                .collect();
            match node.child_by_field_name("definition") {
                Some(def) if def.kind() == "class_definition" => Statement::Class {
                    node: def,
                    decorators,
                },
                Some(def) if def.kind() == "function_definition" => Statement::Function {
                    node: def,
                    decorators,
                },
                _ => Statement::Other,
            }
        }
        _ => Statement::Other,
    }
}

fn extract_class(node: Node, decorators: &[Node], src: &[u8], path: &str) -> ClassDecl {
    let name = field_text(node, "name", src).unwrap_or_default();

    let base_names = node
        .child_by_field_name("superclasses")
        .map(|args| {
            named_children(args)
                .into_iter()
                .filter(|a| {
                    !matches!(
                        a.kind(),
                        "keyword_argument" | "comment" | "list_splat" | "dictionary_splat"
                    )
                })
                .map(|a| dotted_name(a, src))
                .collect()
        })
        .unwrap_or_default();

    let body = node.child_by_field_name("body");
    let docstring = body.and_then(|b| leading_docstring(b, src, true));

    let mut methods = Vec::new();
    if let Some(body) = body {
        for item in named_children(body) {
            if let Statement::Function {
                node: func,
                decorators: method_decorators,
            } = classify(item)
            {
                methods.push(extract_function(
                    func,
                    &method_decorators,
                    src,
                    Some(name.as_str()),
                ));
            }
        }
    }

    ClassDecl {
        decorators: decorator_names(decorators, src),
        name,
        methods,
        base_names,
        docstring,
        owning_file: path.to_string(),
    }
}

fn extract_function(
    node: Node,
    decorators: &[Node],
    src: &[u8],
    owning_class: Option<&str>,
) -> FunctionDecl {
    let is_async = node
        .child(0)
        .is_some_and(|first| !first.is_named() && first.kind() == "async");

    let parameters = node
        .child_by_field_name("parameters")
        .map(|p| extract_parameters(p, src))
        .unwrap_or_default();

    FunctionDecl {
        name: field_text(node, "name", src).unwrap_or_default(),
        parameters,
        return_type: field_text(node, "return_type", src),
        decorators: decorator_names(decorators, src),
        docstring: node
            .child_by_field_name("body")
            .and_then(|b| leading_docstring(b, src, true)),
        is_method: owning_class.is_some(),
        is_async,
        owning_class: owning_class.map(String::from),
    }
}

fn extract_parameters(params: Node, src: &[u8]) -> Vec<Parameter> {
    let mut parameters = Vec::new();
    for param in named_children(params) {
        let (name, annotation) = match param.kind() {
            "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                (node_text(param, src), None)
            }
            "typed_parameter" => {
                let annotation = field_text(param, "type", src);
                let name = named_children(param)
                    .into_iter()
                    .find(|c| c.kind() != "type")
                    .map(|c| node_text(c, src))
                    .unwrap_or_default();
                (name, annotation)
            }
            "default_parameter" | "typed_default_parameter" => (
                field_text(param, "name", src).unwrap_or_default(),
                field_text(param, "type", src),
            ),
            // `*` and `/` separators, comments
            _ => continue,
        };
        if !name.is_empty() {
            parameters.push(Parameter { name, annotation });
        }
    }
    parameters
}

fn decorator_names(decorators: &[Node], src: &[u8]) -> Vec<String> {
    decorators
        .iter()
        .filter_map(|d| d.named_child(0))
        .map(|expr| dotted_name(expr, src))
        .collect()
}

/// Resolves an expression to its dotted textual name. Attribute chains join
/// with `.`; a call resolves to the thing being called, not its arguments.
fn dotted_name(node: Node, src: &[u8]) -> String {
    match node.kind() {
        "attribute" => {
            let object = node
                .child_by_field_name("object")
                .map(|o| dotted_name(o, src))
                .unwrap_or_default();
            let attr = field_text(node, "attribute", src).unwrap_or_default();
            format!("{}.{}", object, attr)
        }
        "call" => node
            .child_by_field_name("function")
            .map(|f| dotted_name(f, src))
            .unwrap_or_else(|| node_text(node, src)),
        _ => node_text(node, src),
    }
}

/// Walks the whole tree, since imports may sit inside functions or
/// conditional blocks.
fn collect_imports(root: Node, src: &[u8], imports: &mut Vec<ImportRef>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_statement" => {
                for name in field_children(node, "name") {
                    let (module, alias) = split_alias(name, src);
                    imports.push(ImportRef {
                        kind: ImportKind::Direct,
                        module,
                        imported_name: None,
                        alias,
                        level: 0,
                    });
                }
            }
            "import_from_statement" | "future_import_statement" => {
                let (module, level) = if node.kind() == "future_import_statement" {
                    ("__future__".to_string(), 0)
                } else {
                    from_module(node, src)
                };

                let mut names: Vec<(String, Option<String>)> = field_children(node, "name")
                    .into_iter()
                    .map(|n| split_alias(n, src))
                    .collect();
                if named_children(node)
                    .iter()
                    .any(|c| c.kind() == "wildcard_import")
                {
                    names.push(("*".to_string(), None));
                }

                for (name, alias) in names {
                    imports.push(ImportRef {
                        kind: ImportKind::From,
                        module: module.clone(),
                        imported_name: Some(name),
                        alias,
                        level,
                    });
                }
            }
            _ => {
                // Reverse so the stack pops children in source order.
                let mut children = named_children(node);
                children.reverse();
                stack.extend(children);
            }
        }
    }
}

fn from_module(node: Node, src: &[u8]) -> (String, usize) {
    let Some(module) = node.child_by_field_name("module_name") else {
        return (String::new(), 0);
    };
    if module.kind() != "relative_import" {
        return (node_text(module, src), 0);
    }

    let mut level = 0;
    let mut dotted = String::new();
    for part in named_children(module) {
        match part.kind() {
            "import_prefix" => level = node_text(part, src).matches('.').count(),
            "dotted_name" => dotted = node_text(part, src),
            _ => {}
        }
    }
    (dotted, level)
}

fn split_alias(node: Node, src: &[u8]) -> (String, Option<String>) {
    if node.kind() == "aliased_import" {
        (
            field_text(node, "name", src).unwrap_or_default(),
            field_text(node, "alias", src),
        )
    } else {
        (node_text(node, src), None)
    }
}

/// Returns the docstring of a module or block: the first statement, when it
/// is a bare (non-f, non-bytes) string literal expression.
fn leading_docstring(body: Node, src: &[u8], clean: bool) -> Option<String> {
    let first = named_children(body)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let expr = first.named_child(0)?;
    if expr.kind() != "string" || first.named_child_count() != 1 {
        return None;
    }

    let value = string_literal_value(&node_text(expr, src))?;
    Some(if clean { clean_docstring(&value) } else { value })
}

fn string_literal_value(raw: &str) -> Option<String> {
    let prefix_len = raw
        .find(|c: char| c == '"' || c == '\'')
        .unwrap_or(raw.len());
    let prefix = raw[..prefix_len].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }

    let quoted = &raw[prefix_len..];
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if quoted.len() >= 2 * quote.len() && quoted.starts_with(quote) && quoted.ends_with(quote)
        {
            return Some(quoted[quote.len()..quoted.len() - quote.len()].to_string());
        }
    }
    None
}

/// Strips the uniform indentation of docstring continuation lines and trims
/// blank lines at either end.
fn clean_docstring(doc: &str) -> String {
    let expanded = doc.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let margin = lines
        .iter()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_width(l))
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = Vec::with_capacity(lines.len());
    cleaned.push(lines[0].trim_start().to_string());
    for line in &lines[1..] {
        let cut = margin.min(indent_width(line));
        cleaned.push(line[cut..].trim_end().to_string());
    }

    while cleaned.first().is_some_and(|l| l.trim().is_empty()) {
        cleaned.remove(0);
    }
    while cleaned.last().is_some_and(|l| l.trim().is_empty()) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn syntax_error(root: Node, path: &str) -> ParseError {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let position = node.start_position();
            let message = if node.is_missing() {
                format!("Syntax error: missing {}", node.kind())
            } else {
                "Syntax error: invalid syntax".to_string()
            };
            return ParseError {
                path: path.to_string(),
                message,
                line: Some(position.row + 1),
                column: Some(position.column + 1),
            };
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let mut children: Vec<Node> = node.children(&mut cursor).collect();
            children.reverse();
            stack.extend(children);
        }
    }
    parse_error(path, "Syntax error".to_string())
}

fn parse_error(path: &str, message: String) -> ParseError {
    ParseError {
        path: path.to_string(),
        message,
        line: None,
        column: None,
    }
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

fn field_text(node: Node, field: &str, src: &[u8]) -> Option<String> {
    node.child_by_field_name(field).map(|n| node_text(n, src))
}

fn node_text(node: Node, src: &[u8]) -> String {
    node.utf8_text(src).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_function() {
        let code = r#"
def hello_world(name: str) -> str:
    """Greet someone."""
    return f"Hello, {name}!"
"#;
        let file = parse_source(code, "greet.py").unwrap();
        assert_eq!(file.functions.len(), 1);

        let func = &file.functions[0];
        assert_eq!(func.name, "hello_world");
        assert_eq!(func.return_type.as_deref(), Some("str"));
        assert_eq!(func.docstring.as_deref(), Some("Greet someone."));
        assert_eq!(
            func.parameters,
            vec![Parameter {
                name: "name".into(),
                annotation: Some("str".into())
            }]
        );
        assert!(!func.is_method);
        assert!(func.owning_class.is_none());
    }

    #[test]
    fn test_parse_class_with_methods() {
        let code = r#"
@dataclass(frozen=True)
class ClaimService(base.Service, Mixin, metaclass=Meta):
    """Handles claims.

    More detail here.
    """

    @app.route("/claims", methods=["GET"])
    def list_claims(self, limit=10, *args, **kwargs) -> list:
        pass

    async def fetch(self, claim_id: int = 0):
        pass
"#;
        let file = parse_source(code, "services/claims.py").unwrap();
        assert_eq!(file.classes.len(), 1);
        assert!(file.functions.is_empty(), "methods are not top-level");

        let class = &file.classes[0];
        assert_eq!(class.name, "ClaimService");
        assert_eq!(class.owning_file, "services/claims.py");
        assert_eq!(class.decorators, vec!["dataclass"]);
        assert_eq!(class.base_names, vec!["base.Service", "Mixin"]);
        assert_eq!(
            class.docstring.as_deref(),
            Some("Handles claims.\n\nMore detail here.")
        );

        assert_eq!(class.methods.len(), 2);
        let list = &class.methods[0];
        assert_eq!(list.name, "list_claims");
        assert_eq!(list.decorators, vec!["app.route"]);
        assert!(list.is_method);
        assert_eq!(list.owning_class.as_deref(), Some("ClaimService"));
        let names: Vec<_> = list.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["self", "limit", "*args", "**kwargs"]);

        let fetch = &class.methods[1];
        assert!(fetch.is_async);
        assert_eq!(fetch.parameters[1].annotation.as_deref(), Some("int"));
    }

    #[test]
    fn test_parse_imports() {
        let code = r#"
import os
import numpy as np, json
from app.models import User as U, Claim
from . import helpers
from ..core.db import *

def lazy():
    from services.cache import get_cache
    return get_cache()
"#;
        let file = parse_source(code, "app/routes.py").unwrap();
        let imports = &file.imports;
        assert_eq!(imports.len(), 8);

        assert_eq!(imports[0].kind, ImportKind::Direct);
        assert_eq!(imports[0].module, "os");
        assert_eq!(imports[1].alias.as_deref(), Some("np"));
        assert_eq!(imports[2].module, "json");

        assert_eq!(imports[3].kind, ImportKind::From);
        assert_eq!(imports[3].module, "app.models");
        assert_eq!(imports[3].imported_name.as_deref(), Some("User"));
        assert_eq!(imports[3].alias.as_deref(), Some("U"));
        assert_eq!(imports[4].imported_name.as_deref(), Some("Claim"));

        assert_eq!(imports[5].module, "");
        assert_eq!(imports[5].level, 1);
        assert_eq!(imports[5].imported_name.as_deref(), Some("helpers"));

        assert_eq!(imports[6].module, "core.db");
        assert_eq!(imports[6].level, 2);
        assert_eq!(imports[6].imported_name.as_deref(), Some("*"));

        assert_eq!(imports[7].module, "services.cache");
        assert_eq!(file.functions.len(), 1);
    }

    #[test]
    fn test_module_docstring() {
        let code = "\"\"\"Repository analyzer service.\"\"\"\nimport os\n";
        let file = parse_source(code, "a.py").unwrap();
        assert_eq!(
            file.docstring.as_deref(),
            Some("Repository analyzer service.")
        );

        let no_doc = parse_source("x = 1\n\"\"\"not a docstring\"\"\"\n", "b.py").unwrap();
        assert!(no_doc.docstring.is_none());

        let fstring = parse_source("f\"\"\"templated {x}\"\"\"\n", "c.py").unwrap();
        assert!(fstring.docstring.is_none());
    }

    #[test]
    fn test_syntax_error_is_value() {
        let code = "def broken(:\n    pass\n";
        let err = parse_source(code, "broken.py").unwrap_err();
        assert_eq!(err.path, "broken.py");
        assert!(err.message.starts_with("Syntax error"));
        assert_eq!(err.line, Some(1));
    }

    #[test]
    fn test_decorator_call_on_attribute_chain() {
        let code = r#"
@a.b.c(1, 2)
def f():
    pass

@plain
def g():
    pass
"#;
        let file = parse_source(code, "d.py").unwrap();
        assert_eq!(file.functions[0].decorators, vec!["a.b.c"]);
        assert_eq!(file.functions[1].decorators, vec!["plain"]);
    }

    #[test]
    fn test_clean_docstring() {
        let doc = "Summary line.\n\n        Indented body.\n            Deeper.\n    ";
        assert_eq!(
            clean_docstring(doc),
            "Summary line.\n\nIndented body.\n    Deeper."
        );
    }

    #[test]
    fn test_empty_file() {
        let file = parse_source("", "empty.py").unwrap();
        assert!(file.classes.is_empty());
        assert!(file.functions.is_empty());
        assert!(file.imports.is_empty());
        assert!(file.docstring.is_none());
    }
}
