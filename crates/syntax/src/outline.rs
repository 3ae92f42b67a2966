use crate::error::{Result, SyntaxError};
use crate::language::OutlineLanguage;
use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

/// Inclusive, 0-based line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }

    #[must_use]
    pub const fn span(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
}

/// One entry of a hierarchical symbol outline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolNode {
    pub name: String,
    pub range: LineRange,
    #[serde(default)]
    pub children: Vec<SymbolNode>,
}

impl SymbolNode {
    #[must_use]
    pub fn new(name: impl Into<String>, range: LineRange) -> Self {
        Self {
            name: name.into(),
            range,
            children: Vec::new(),
        }
    }

    /// Builder: attach a child symbol
    #[must_use]
    pub fn with_child(mut self, child: SymbolNode) -> Self {
        self.children.push(child);
        self
    }
}

/// Symbols whose ranges nest down to `line`, outermost first.
///
/// At each level the smallest range containing the line wins; the walk stops
/// at the first level where no symbol contains it.
#[must_use]
pub fn containing_path(roots: &[SymbolNode], line: usize) -> Vec<&SymbolNode> {
    let mut path = Vec::new();
    let mut level = roots;
    while let Some(next) = level
        .iter()
        .filter(|node| node.range.contains(line))
        .min_by_key(|node| node.range.span())
    {
        path.push(next);
        level = &next.children;
    }
    path
}

/// Tree-sitter backed outline builder for one language
pub struct OutlineBuilder {
    parser: Parser,
    language: OutlineLanguage,
}

impl OutlineBuilder {
    pub fn new(language: OutlineLanguage) -> Result<Self> {
        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| SyntaxError::tree_sitter(format!("Failed to set language: {e}")))?;
        Ok(Self { parser, language })
    }

    /// Parse `content` and return its top-level symbols
    pub fn outline(&mut self, content: &str) -> Result<Vec<SymbolNode>> {
        let tree = self
            .parser
            .parse(content, None)
            .ok_or_else(|| SyntaxError::parse("Failed to parse source code"))?;
        let mut roots = Vec::new();
        self.collect(content, tree.root_node(), &mut roots);
        Ok(roots)
    }

    fn collect(&self, content: &str, node: Node, out: &mut Vec<SymbolNode>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match self.symbol_name(content, child) {
                Some(name) => {
                    let range =
                        LineRange::new(child.start_position().row, child.end_position().row);
                    let mut symbol = SymbolNode::new(name, range);
                    self.collect(content, child, &mut symbol.children);
                    out.push(symbol);
                }
                None => self.collect(content, child, out),
            }
        }
    }

    fn symbol_name(&self, content: &str, node: Node) -> Option<String> {
        let field = match (self.language, node.kind()) {
            (
                OutlineLanguage::Rust,
                "function_item" | "function_signature_item" | "struct_item" | "enum_item"
                | "union_item" | "trait_item" | "mod_item" | "const_item" | "static_item"
                | "type_item" | "macro_definition",
            ) => "name",
            (OutlineLanguage::Rust, "impl_item") => "type",
            (OutlineLanguage::Python, "function_definition" | "class_definition") => "name",
            (
                OutlineLanguage::JavaScript | OutlineLanguage::TypeScript,
                "function_declaration"
                | "generator_function_declaration"
                | "class_declaration"
                | "abstract_class_declaration"
                | "method_definition"
                | "interface_declaration"
                | "enum_declaration"
                | "type_alias_declaration"
                | "internal_module",
            ) => "name",
            (OutlineLanguage::JavaScript | OutlineLanguage::TypeScript, "variable_declarator") => {
                let value = node.child_by_field_name("value")?;
                if !matches!(
                    value.kind(),
                    "arrow_function" | "function_expression" | "function" | "class"
                ) {
                    return None;
                }
                "name"
            }
            _ => return None,
        };
        let name_node = node.child_by_field_name(field)?;
        let name = name_node.utf8_text(content.as_bytes()).ok()?.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// Outline for a language id, `None` when no grammar is bundled for it
pub fn outline_for(content: &str, language_id: &str) -> Result<Option<Vec<SymbolNode>>> {
    let Some(language) = OutlineLanguage::from_language_id(language_id) else {
        return Ok(None);
    };
    let mut builder = OutlineBuilder::new(language)?;
    builder.outline(content).map(Some)
}
