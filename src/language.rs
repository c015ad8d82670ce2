use tree_sitter::{Language, Parser};

/// A language grammar handled by codegraph.
///
/// Plain enum rather than trait objects: cheap to copy and matched at
/// dispatch boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageKind {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Hcl,
}

/// File extensions the walker tracks. Files with other extensions are never
/// enumerated.
pub const TRACKED_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "tf", "hcl"];

impl LanguageKind {
    /// Map a file extension to its grammar.
    ///
    /// `.ts` and `.tsx` MUST use different grammars: the TypeScript grammar
    /// cannot parse JSX, and the TSX grammar breaks angle-bracket type
    /// assertions (`<T>expr`).
    pub fn for_extension(ext: &str) -> Option<LanguageKind> {
        match ext {
            "ts" => Some(LanguageKind::TypeScript),
            "tsx" => Some(LanguageKind::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(LanguageKind::JavaScript),
            "py" => Some(LanguageKind::Python),
            "tf" | "hcl" => Some(LanguageKind::Hcl),
            _ => None,
        }
    }

    pub fn for_path(path: &std::path::Path) -> Option<LanguageKind> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        LanguageKind::for_extension(ext)
    }

    /// The tree-sitter grammar for this language.
    pub fn grammar(&self) -> Language {
        match self {
            LanguageKind::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            LanguageKind::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            LanguageKind::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            LanguageKind::Python => tree_sitter_python::LANGUAGE.into(),
            LanguageKind::Hcl => tree_sitter_hcl::LANGUAGE.into(),
        }
    }

    /// Human-readable name for diagnostics.
    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageKind::TypeScript => "TypeScript",
            LanguageKind::Tsx => "TSX",
            LanguageKind::JavaScript => "JavaScript",
            LanguageKind::Python => "Python",
            LanguageKind::Hcl => "HCL",
        }
    }

}

/// Which optional grammars initialized successfully.
///
/// Probed once at startup; consulted everywhere else instead of re-attempting
/// grammar loads. Files whose grammar is absent are skipped with a single
/// per-run warning (emitted by the build pipeline, not here).
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    python: bool,
    hcl: bool,
}

impl Capabilities {
    /// Probe each optional grammar by attempting to configure a parser with it.
    /// An ABI-incompatible or otherwise broken grammar is recorded as absent.
    pub fn probe() -> Capabilities {
        Capabilities {
            python: grammar_loads(tree_sitter_python::LANGUAGE.into()),
            hcl: grammar_loads(tree_sitter_hcl::LANGUAGE.into()),
        }
    }

    pub fn supports(&self, lang: LanguageKind) -> bool {
        match lang {
            LanguageKind::Python => self.python,
            LanguageKind::Hcl => self.hcl,
            _ => true,
        }
    }

    /// Optional languages recorded as absent, for the single per-run warning.
    pub fn missing(&self) -> Vec<LanguageKind> {
        let mut out = Vec::new();
        if !self.python {
            out.push(LanguageKind::Python);
        }
        if !self.hcl {
            out.push(LanguageKind::Hcl);
        }
        out
    }
}

fn grammar_loads(language: Language) -> bool {
    Parser::new().set_language(&language).is_ok()
}
