use crate::error::{Result, SyntaxError};
use std::path::Path;

/// Comment delimiters used to embed a marker at the end of a line.
///
/// An empty `right` denotes a line comment that runs to end of line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommentDelimiters {
    pub left: &'static str,
    pub right: &'static str,
}

impl CommentDelimiters {
    const fn line(left: &'static str) -> Self {
        Self { left, right: "" }
    }

    const fn block(left: &'static str, right: &'static str) -> Self {
        Self { left, right }
    }

    /// True when the comment is terminated by end of line
    #[must_use]
    pub const fn is_line_comment(&self) -> bool {
        self.right.is_empty()
    }
}

/// Fallback for language ids missing from the table
pub const DEFAULT_DELIMITERS: CommentDelimiters = CommentDelimiters::line("//");

struct LanguageEntry {
    ids: &'static [&'static str],
    comment: CommentDelimiters,
    keywords: &'static [&'static str],
}

const C_FAMILY_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef", "union",
    "unsigned", "void", "volatile", "while", "class", "namespace", "public", "private",
    "protected", "virtual", "template", "typename", "using", "new", "delete", "this", "true",
    "false", "nullptr", "bool", "override",
];

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while",
];

const JS_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "export", "extends", "false", "finally", "for",
    "function", "if", "import", "in", "instanceof", "let", "new", "null", "return", "static",
    "super", "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void",
    "while", "with", "yield",
];

const TS_KEYWORDS: &[&str] = &[
    "abstract", "any", "as", "async", "await", "boolean", "break", "case", "catch", "class",
    "const", "constructor", "continue", "declare", "default", "delete", "do", "else", "enum",
    "export", "extends", "false", "finally", "for", "from", "function", "if", "implements",
    "import", "in", "instanceof", "interface", "keyof", "let", "module", "namespace", "never",
    "new", "null", "number", "private", "protected", "public", "readonly", "return", "static",
    "string", "super", "switch", "this", "throw", "true", "try", "type", "typeof",
    "undefined", "unknown", "var", "void", "while", "yield",
];

const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield", "self",
];

const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var", "nil", "true", "false",
];

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally",
    "float", "for", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "null", "package", "private", "protected", "public", "return", "short",
    "static", "super", "switch", "synchronized", "this", "throw", "throws", "try", "void",
    "volatile", "while", "true", "false", "var",
];

const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "base", "bool", "break", "case", "catch", "class",
    "const", "continue", "default", "do", "else", "enum", "false", "finally", "for",
    "foreach", "if", "in", "int", "interface", "internal", "is", "namespace", "new", "null",
    "out", "override", "private", "protected", "public", "readonly", "ref", "return",
    "sealed", "static", "string", "struct", "switch", "this", "throw", "true", "try", "using",
    "var", "virtual", "void", "while",
];

const KOTLIN_KEYWORDS: &[&str] = &[
    "as", "break", "class", "continue", "do", "else", "false", "for", "fun", "if", "in",
    "interface", "is", "null", "object", "package", "return", "super", "this", "throw", "true",
    "try", "typealias", "val", "var", "when", "while", "private", "public", "override",
    "data", "sealed",
];

const SWIFT_KEYWORDS: &[&str] = &[
    "class", "deinit", "enum", "extension", "func", "import", "init", "let", "private",
    "public", "internal", "fileprivate", "protocol", "static", "struct", "subscript",
    "typealias", "var", "break", "case", "continue", "default", "defer", "do", "else",
    "fallthrough", "for", "guard", "if", "in", "repeat", "return", "switch", "where", "while",
    "self", "Self", "super", "throw", "throws", "true", "false", "nil", "try",
];

const PHP_KEYWORDS: &[&str] = &[
    "abstract", "array", "as", "break", "case", "catch", "class", "const", "continue",
    "default", "do", "echo", "else", "elseif", "extends", "final", "for", "foreach",
    "function", "global", "if", "implements", "interface", "namespace", "new", "private",
    "protected", "public", "return", "static", "switch", "throw", "trait", "try", "use",
    "var", "while", "null", "true", "false",
];

const RUBY_KEYWORDS: &[&str] = &[
    "alias", "and", "begin", "break", "case", "class", "def", "do", "else", "elsif", "end",
    "ensure", "false", "for", "if", "in", "module", "next", "nil", "not", "or", "redo",
    "rescue", "retry", "return", "self", "super", "then", "true", "undef", "unless", "until",
    "when", "while", "yield",
];

const SHELL_KEYWORDS: &[&str] = &[
    "if", "then", "else", "elif", "fi", "case", "esac", "for", "while", "until", "do", "done",
    "in", "function", "select", "local", "export", "return",
];

const LUA_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

const SQL_KEYWORDS: &[&str] = &[
    "select", "from", "where", "insert", "into", "update", "delete", "create", "table",
    "drop", "alter", "join", "on", "and", "or", "not", "null", "as", "SELECT", "FROM",
    "WHERE", "INSERT", "INTO", "UPDATE", "DELETE", "CREATE", "TABLE", "DROP", "ALTER", "JOIN",
    "ON", "AND", "OR", "NOT", "NULL", "AS",
];

const NO_KEYWORDS: &[&str] = &[];

static LANGUAGES: &[LanguageEntry] = &[
    LanguageEntry {
        ids: &["c", "cpp", "objective-c", "objective-cpp", "cuda-cpp", "hlsl", "glsl"],
        comment: CommentDelimiters::line("//"),
        keywords: C_FAMILY_KEYWORDS,
    },
    LanguageEntry {
        ids: &["rust"],
        comment: CommentDelimiters::line("//"),
        keywords: RUST_KEYWORDS,
    },
    LanguageEntry {
        ids: &["javascript", "javascriptreact", "jsonc"],
        comment: CommentDelimiters::line("//"),
        keywords: JS_KEYWORDS,
    },
    LanguageEntry {
        ids: &["typescript", "typescriptreact"],
        comment: CommentDelimiters::line("//"),
        keywords: TS_KEYWORDS,
    },
    LanguageEntry {
        ids: &["go"],
        comment: CommentDelimiters::line("//"),
        keywords: GO_KEYWORDS,
    },
    LanguageEntry {
        ids: &["java", "groovy", "scala", "dart"],
        comment: CommentDelimiters::line("//"),
        keywords: JAVA_KEYWORDS,
    },
    LanguageEntry {
        ids: &["csharp", "fsharp"],
        comment: CommentDelimiters::line("//"),
        keywords: CSHARP_KEYWORDS,
    },
    LanguageEntry {
        ids: &["kotlin"],
        comment: CommentDelimiters::line("//"),
        keywords: KOTLIN_KEYWORDS,
    },
    LanguageEntry {
        ids: &["swift"],
        comment: CommentDelimiters::line("//"),
        keywords: SWIFT_KEYWORDS,
    },
    LanguageEntry {
        ids: &["php"],
        comment: CommentDelimiters::line("//"),
        keywords: PHP_KEYWORDS,
    },
    LanguageEntry {
        ids: &["python"],
        comment: CommentDelimiters::line("#"),
        keywords: PYTHON_KEYWORDS,
    },
    LanguageEntry {
        ids: &["ruby"],
        comment: CommentDelimiters::line("#"),
        keywords: RUBY_KEYWORDS,
    },
    LanguageEntry {
        ids: &["shellscript", "powershell"],
        comment: CommentDelimiters::line("#"),
        keywords: SHELL_KEYWORDS,
    },
    LanguageEntry {
        ids: &[
            "perl", "r", "yaml", "toml", "makefile", "dockerfile", "elixir", "julia", "nim",
            "coffeescript", "properties",
        ],
        comment: CommentDelimiters::line("#"),
        keywords: NO_KEYWORDS,
    },
    LanguageEntry {
        ids: &["lua"],
        comment: CommentDelimiters::line("--"),
        keywords: LUA_KEYWORDS,
    },
    LanguageEntry {
        ids: &["sql"],
        comment: CommentDelimiters::line("--"),
        keywords: SQL_KEYWORDS,
    },
    LanguageEntry {
        ids: &["haskell", "ada", "elm"],
        comment: CommentDelimiters::line("--"),
        keywords: NO_KEYWORDS,
    },
    LanguageEntry {
        ids: &["latex", "tex", "erlang", "matlab", "bibtex"],
        comment: CommentDelimiters::line("%"),
        keywords: NO_KEYWORDS,
    },
    LanguageEntry {
        ids: &["clojure", "lisp", "scheme", "racket", "ini"],
        comment: CommentDelimiters::line(";"),
        keywords: NO_KEYWORDS,
    },
    LanguageEntry {
        ids: &["html", "xml", "xsl", "markdown", "vue", "svelte"],
        comment: CommentDelimiters::block("<!--", "-->"),
        keywords: NO_KEYWORDS,
    },
    LanguageEntry {
        ids: &["css", "scss", "less"],
        comment: CommentDelimiters::block("/*", "*/"),
        keywords: NO_KEYWORDS,
    },
];

fn entry(language_id: &str) -> Option<&'static LanguageEntry> {
    LANGUAGES
        .iter()
        .find(|entry| entry.ids.iter().any(|id| id.eq_ignore_ascii_case(language_id)))
}

/// Comment delimiters for a language id, `(//, "")` when unlisted
#[must_use]
pub fn comment_delimiters(language_id: &str) -> CommentDelimiters {
    entry(language_id).map_or(DEFAULT_DELIMITERS, |entry| entry.comment)
}

/// Keyword set for a language id; empty when unlisted
#[must_use]
pub fn keywords(language_id: &str) -> &'static [&'static str] {
    entry(language_id).map_or(NO_KEYWORDS, |entry| entry.keywords)
}

/// Map a file extension to a language id (lowercase, case-insensitive match)
#[must_use]
pub fn language_id_for_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "rs" => "rust",
        "py" | "pyw" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "php" => "php",
        "sh" | "bash" | "zsh" => "shellscript",
        "lua" => "lua",
        "sql" => "sql",
        "hs" => "haskell",
        "tex" => "latex",
        "html" | "htm" => "html",
        "xml" => "xml",
        "md" | "markdown" => "markdown",
        "css" => "css",
        "scss" => "scss",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        _ => "plaintext",
    }
}

/// Language id for a file path, `plaintext` when the extension is unknown
#[must_use]
pub fn language_id_for_path(path: impl AsRef<Path>) -> &'static str {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or("plaintext", language_id_for_extension)
}

/// Languages with a tree-sitter grammar for symbol outlines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutlineLanguage {
    Rust,
    Python,
    JavaScript,
    TypeScript,
}

impl OutlineLanguage {
    /// Resolve a language id; `None` when no grammar is bundled
    #[must_use]
    pub fn from_language_id(language_id: &str) -> Option<Self> {
        match language_id {
            "rust" => Some(Self::Rust),
            "python" => Some(Self::Python),
            "javascript" | "javascriptreact" => Some(Self::JavaScript),
            "typescript" => Some(Self::TypeScript),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
        }
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Self::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Self::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Self::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Self::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        }
    }
}

/// Fails with `UnsupportedLanguage` for ids that have no grammar
pub fn outline_language(language_id: &str) -> Result<OutlineLanguage> {
    OutlineLanguage::from_language_id(language_id)
        .ok_or_else(|| SyntaxError::unsupported_language(language_id))
}
