use serde::{Deserialize, Serialize};

/// Error categories recognised by the auto-fix classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    InfiniteLoop,
    Import,
    Syntax,
    Type,
    NullAccess,
    HookMisuse,
    Styling,
    Runtime,
    Build,
    Network,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Repair strategy, selected from the (kind, severity) table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixStrategy {
    /// Cheap single-pass rewrite for mechanical problems.
    FastFixer,
    /// Full diagnose-and-patch loop.
    DeepDebugger,
    /// Not auto-fixable; surfaced to the user.
    Manual,
}

/// A runtime/build error from a generated app sandbox, classified for the
/// auto-fix pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedError {
    /// Original error text, untouched.
    pub message: String,
    pub kind: ErrorKind,
    pub severity: Severity,
    pub auto_fixable: bool,
    pub strategy: FixStrategy,
    /// Classifier confidence in [0, 1].
    pub confidence: f64,
    /// Stable content hash; identical up to timestamps/line/column noise.
    pub error_hash: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub stack: Option<String>,
}
