/*!
 * Error Classifier
 *
 * Pattern tables over raw error text: one table for the error kind, one for
 * severity. The content hash strips location and timing noise so the same
 * underlying error always dedups to the same bucket.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use forgehook_domain::fix::{ClassifiedError, ErrorKind, FixStrategy, Severity};

/// Kind patterns, first match wins. Null-access runs before the generic
/// runtime/type buckets so "TypeError: Cannot read property ... of
/// undefined" lands in the right one.
fn detect_kind(lower: &str) -> ErrorKind {
    if lower.contains("maximum update depth exceeded") || lower.contains("too many re-renders") {
        ErrorKind::InfiniteLoop
    } else if lower.contains("cannot read propert") && (lower.contains("of undefined") || lower.contains("of null"))
        || lower.contains("undefined is not an object")
        || lower.contains("null is not an object")
    {
        ErrorKind::NullAccess
    } else if lower.contains("invalid hook call")
        || lower.contains("rendered more hooks than")
        || lower.contains("change in the order of hooks")
    {
        ErrorKind::HookMisuse
    } else if lower.contains("cannot find module")
        || lower.contains("module not found")
        || lower.contains("failed to resolve import")
    {
        ErrorKind::Import
    } else if lower.contains("syntaxerror")
        || lower.contains("unexpected token")
        || lower.contains("unterminated string")
    {
        ErrorKind::Syntax
    } else if lower.contains("is not assignable to")
        || lower.contains("type error ts")
        || lower.contains("ts(2")
    {
        ErrorKind::Type
    } else if lower.contains("unknown utility class")
        || lower.contains("invalid css")
        || lower.contains("unknown style property")
    {
        ErrorKind::Styling
    } else if lower.contains("build failed")
        || lower.contains("compilation failed")
        || lower.contains("failed to compile")
    {
        ErrorKind::Build
    } else if lower.contains("fetch failed")
        || lower.contains("network error")
        || lower.contains("econnrefused")
        || lower.contains("blocked by cors")
    {
        ErrorKind::Network
    } else if lower.contains("referenceerror")
        || lower.contains("is not defined")
        || lower.contains("is not a function")
        || lower.contains("uncaught")
    {
        ErrorKind::Runtime
    } else {
        ErrorKind::Unknown
    }
}

/// Severity patterns, separate from the kind table.
fn detect_severity(lower: &str) -> Severity {
    if lower.contains("maximum update depth exceeded")
        || lower.contains("cannot read propert")
        || lower.contains("of undefined")
        || lower.contains("invalid hook call")
        || lower.contains("build failed")
        || lower.contains("failed to compile")
    {
        Severity::Critical
    } else if lower.contains("syntaxerror")
        || lower.contains("unexpected token")
        || lower.contains("cannot find module")
        || lower.contains("is not a function")
        || lower.contains("is not defined")
        || lower.contains("uncaught")
    {
        Severity::High
    } else if lower.contains("warning") || lower.contains("deprecated") {
        Severity::Low
    } else {
        Severity::Medium
    }
}

/// Strategy table over (kind, severity).
fn pick_strategy(kind: ErrorKind, severity: Severity) -> FixStrategy {
    use ErrorKind::*;
    match kind {
        Import | Syntax | Styling if severity != Severity::Critical => FixStrategy::FastFixer,
        Import | Syntax | Styling => FixStrategy::DeepDebugger,
        InfiniteLoop | HookMisuse | NullAccess => FixStrategy::DeepDebugger,
        Runtime | Build | Type => FixStrategy::DeepDebugger,
        Unknown | Network => FixStrategy::Manual,
    }
}

fn confidence_for(kind: ErrorKind, severity: Severity) -> f64 {
    match kind {
        ErrorKind::Unknown => 0.3,
        ErrorKind::Import | ErrorKind::Syntax => 0.95,
        _ if severity == Severity::Critical => 0.9,
        _ => 0.7,
    }
}

static ISO_TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:?\d{2})?")
        .expect("timestamp regex compiles")
});
static LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bline\s+\d+").expect("line regex compiles"));
static COLUMN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcolumn\s+\d+").expect("column regex compiles"));
static POSITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[@:]\d+:\d+").expect("position regex compiles"));
static MS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d+\s?ms\b").expect("ms regex compiles"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex compiles"));

static FILE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\w./-]+\.(?:tsx?|jsx?|mjs|cjs)):(\d+)").expect("file regex compiles")
});

/// Stable content hash: location and timing noise stripped, lowercased,
/// whitespace collapsed, then SHA-256.
fn content_hash(message: &str) -> String {
    let mut residue = ISO_TIMESTAMP_RE.replace_all(message, "").into_owned();
    residue = LINE_RE.replace_all(&residue, "").into_owned();
    residue = COLUMN_RE.replace_all(&residue, "").into_owned();
    residue = POSITION_RE.replace_all(&residue, "").into_owned();
    residue = MS_RE.replace_all(&residue, "").into_owned();

    let normalized = WS_RE
        .replace_all(residue.to_lowercase().trim(), " ")
        .into_owned();

    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}

/// Classify a raw error string.
pub fn classify(message: &str) -> ClassifiedError {
    let lower = message.to_lowercase();

    let kind = detect_kind(&lower);
    let severity = detect_severity(&lower);
    let strategy = pick_strategy(kind, severity);
    let (file, line) = FILE_LINE_RE
        .captures(message)
        .map(|c| {
            (
                Some(c[1].to_string()),
                c[2].parse::<u32>().ok(),
            )
        })
        .unwrap_or((None, None));

    ClassifiedError {
        message: message.to_string(),
        kind,
        severity,
        auto_fixable: strategy != FixStrategy::Manual,
        strategy,
        confidence: confidence_for(kind, severity),
        error_hash: content_hash(message),
        file,
        line,
        stack: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_access_classification() {
        let c = classify(
            "TypeError: Cannot read property 'x' of undefined at /a/b.ts:17:4 at 2024-06-01T00:00:00Z",
        );
        assert_eq!(c.kind, ErrorKind::NullAccess);
        assert_eq!(c.severity, Severity::Critical);
        assert_eq!(c.strategy, FixStrategy::DeepDebugger);
        assert!(c.auto_fixable);
        assert_eq!(c.confidence, 0.9);
        assert_eq!(c.file.as_deref(), Some("/a/b.ts"));
        assert_eq!(c.line, Some(17));
    }

    #[test]
    fn test_hash_ignores_location_and_timestamp_noise() {
        let a = classify(
            "TypeError: Cannot read property 'x' of undefined at /a/b.ts:17:4 at 2024-06-01T00:00:00Z",
        );
        let b = classify(
            "TypeError: Cannot read property 'x' of undefined at /a/b.ts:42:9 at 2024-07-14T11:22:33Z",
        );
        assert_eq!(a.error_hash, b.error_hash);

        let different = classify("TypeError: Cannot read property 'y' of undefined at /a/b.ts:17:4");
        assert_ne!(a.error_hash, different.error_hash);
    }

    #[test]
    fn test_hash_ignores_line_column_and_ms_noise() {
        let a = classify("SyntaxError: Unexpected token '}' at line 12 column 8 (took 340 ms)");
        let b = classify("SyntaxError: Unexpected token '}' at line 99 column 1 (took 12ms)");
        assert_eq!(a.error_hash, b.error_hash);
    }

    #[test]
    fn test_infinite_loop_detection() {
        let c = classify("Error: Maximum update depth exceeded in component <App>");
        assert_eq!(c.kind, ErrorKind::InfiniteLoop);
        assert_eq!(c.severity, Severity::Critical);
        assert_eq!(c.strategy, FixStrategy::DeepDebugger);
    }

    #[test]
    fn test_import_gets_fast_fixer_and_high_confidence() {
        let c = classify("Error: Cannot find module './components/Button'");
        assert_eq!(c.kind, ErrorKind::Import);
        assert_eq!(c.strategy, FixStrategy::FastFixer);
        assert!(c.auto_fixable);
        assert_eq!(c.confidence, 0.95);
    }

    #[test]
    fn test_syntax_gets_fast_fixer() {
        let c = classify("SyntaxError: Unexpected token ')' at line 3");
        assert_eq!(c.kind, ErrorKind::Syntax);
        assert_eq!(c.severity, Severity::High);
        assert_eq!(c.strategy, FixStrategy::FastFixer);
        assert_eq!(c.confidence, 0.95);
    }

    #[test]
    fn test_hook_misuse() {
        let c = classify("Error: Invalid hook call. Hooks can only be called inside a component");
        assert_eq!(c.kind, ErrorKind::HookMisuse);
        assert_eq!(c.strategy, FixStrategy::DeepDebugger);
    }

    #[test]
    fn test_network_is_manual() {
        let c = classify("TypeError: fetch failed due to network error");
        assert_eq!(c.kind, ErrorKind::Network);
        assert_eq!(c.strategy, FixStrategy::Manual);
        assert!(!c.auto_fixable);
    }

    #[test]
    fn test_unknown_is_manual_low_confidence() {
        let c = classify("something inexplicable happened");
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert_eq!(c.strategy, FixStrategy::Manual);
        assert!(!c.auto_fixable);
        assert_eq!(c.confidence, 0.3);
    }

    #[test]
    fn test_runtime_reference_error() {
        let c = classify("ReferenceError: frobnicate is not defined");
        assert_eq!(c.kind, ErrorKind::Runtime);
        assert_eq!(c.strategy, FixStrategy::DeepDebugger);
        assert!(c.auto_fixable);
    }

    #[test]
    fn test_fixability_agrees_with_strategy_table() {
        // Every classified error is auto-fixable iff its strategy is not Manual
        let samples = [
            "Cannot find module 'x'",
            "SyntaxError: Unexpected token",
            "Maximum update depth exceeded",
            "TypeError: Cannot read property 'a' of undefined",
            "Invalid hook call",
            "ReferenceError: y is not defined",
            "Build failed with 3 errors",
            "fetch failed network error",
            "mystery text",
        ];
        for s in samples {
            let c = classify(s);
            assert_eq!(c.auto_fixable, c.strategy != FixStrategy::Manual, "for {s:?}");
        }
    }

    #[test]
    fn test_classification_is_deterministic() {
        let a = classify("Error: Cannot find module 'left-pad'");
        let b = classify("Error: Cannot find module 'left-pad'");
        assert_eq!(a.error_hash, b.error_hash);
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.severity, b.severity);
    }
}
