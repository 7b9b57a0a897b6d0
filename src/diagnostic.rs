//! Classification of clang diagnostics emitted while the binding generator
//! parses a wrapper.
//!
//! Nothing here retries generation. A failed run is reported with the symbol
//! it could not resolve and, where one exists, the shim or declaration that
//! would get the parser past it.

use crate::error::{Result, WrapError};
use crate::shim::{Shim, ShimSet};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static DIAGNOSTIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:(?P<file>[^:\s][^:]*):(?P<line>\d+):(?P<col>\d+):\s+)?(?P<sev>fatal error|error|warning|note):\s+(?P<msg>.*)$",
    )
    .expect("diagnostic pattern")
});

static UNDECLARED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^use of undeclared identifier '([^']+)'").expect("undeclared pattern")
});

static UNKNOWN_BUILTIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:use of unknown builtin|implicit declaration of function|call to undeclared (?:library )?function) '([^']+)'",
    )
    .expect("builtin pattern")
});

static FILE_NOT_FOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^'([^']+)' file not found").expect("file pattern"));

static MACRO_REDEFINED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^'([^']+)' macro redefined").expect("redefined pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    UndeclaredIdentifier(String),
    UnknownBuiltin(String),
    FileNotFound(String),
    MacroRedefined(String),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub location: Option<Location>,
    pub severity: Severity,
    pub message: String,
    pub kind: DiagnosticKind,
    /// Source line clang echoed below the diagnostic, if any.
    pub snippet: Option<String>,
}

impl Diagnostic {
    /// Parse one `file:line:col: severity: message` line.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = DIAGNOSTIC.captures(line.trim_end())?;
        let location = match (caps.name("file"), caps.name("line"), caps.name("col")) {
            (Some(file), Some(line), Some(col)) => Some(Location {
                file: file.as_str().to_string(),
                line: line.as_str().parse().ok()?,
                column: col.as_str().parse().ok()?,
            }),
            _ => None,
        };
        let severity = match &caps["sev"] {
            "fatal error" => Severity::Fatal,
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            _ => Severity::Note,
        };
        let message = caps["msg"].to_string();
        let kind = classify_message(&message);
        Some(Self {
            location,
            severity,
            message,
            kind,
            snippet: None,
        })
    }

    /// Parse every diagnostic in a stderr dump, attaching the echoed source
    /// line that follows each one.
    pub fn parse_all(output: &str) -> Vec<Self> {
        let mut diagnostics: Vec<Self> = Vec::new();
        let mut awaiting_snippet = false;
        for line in output.lines() {
            if let Some(diag) = Diagnostic::parse(line) {
                diagnostics.push(diag);
                awaiting_snippet = true;
            } else if awaiting_snippet {
                if let Some(last) = diagnostics.last_mut() {
                    last.snippet = Some(strip_gutter(line).to_string());
                }
                awaiting_snippet = false;
            }
        }
        diagnostics
    }

    pub fn is_error(&self) -> bool {
        self.severity >= Severity::Error
    }

    /// The symbol this diagnostic is about, if it names one.
    pub fn symbol(&self) -> Option<&str> {
        match &self.kind {
            DiagnosticKind::UndeclaredIdentifier(s)
            | DiagnosticKind::UnknownBuiltin(s)
            | DiagnosticKind::FileNotFound(s)
            | DiagnosticKind::MacroRedefined(s) => Some(s),
            DiagnosticKind::Other => None,
        }
    }

    pub fn remedy(&self) -> Remedy {
        match &self.kind {
            DiagnosticKind::UnknownBuiltin(name) => Remedy::AddBuiltinShim {
                name: name.clone(),
                arity: self.call_arity(name),
            },
            DiagnosticKind::UndeclaredIdentifier(name) if name.starts_with("__builtin_") => {
                Remedy::AddBuiltinShim {
                    name: name.clone(),
                    arity: self.call_arity(name),
                }
            }
            DiagnosticKind::UndeclaredIdentifier(name) if is_macro_case(name) => {
                Remedy::AddArchMacro { name: name.clone() }
            }
            DiagnosticKind::UndeclaredIdentifier(name)
                if self
                    .snippet
                    .as_deref()
                    .is_some_and(|s| s.contains(&format!("{}::", name))) =>
            {
                Remedy::ForwardNamespace { name: name.clone() }
            }
            DiagnosticKind::MacroRedefined(name) => Remedy::GuardMacro { name: name.clone() },
            _ => Remedy::Unrecoverable {
                reason: self.message.clone(),
            },
        }
    }

    /// Number of arguments of the first `name(...)` call in the snippet.
    ///
    /// A `<` directly after an identifier opens a template argument list whose
    /// commas do not separate call arguments. If such a `<` is never closed it
    /// was a comparison, and every top-level comma counts.
    fn call_arity(&self, name: &str) -> Option<usize> {
        let snippet = self.snippet.as_deref()?;
        let start = snippet.find(&format!("{}(", name))? + name.len() + 1;
        let chars: Vec<char> = snippet[start..].chars().collect();

        let mut depth = 0usize;
        let mut angles = 0usize;
        let mut commas = 0usize;
        let mut commas_outside_angles = 0usize;
        let mut empty = true;
        let mut prev: Option<char> = None;
        for (i, &c) in chars.iter().enumerate() {
            let next = chars.get(i + 1).copied();
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth == 0 => {
                    let commas = if angles == 0 { commas_outside_angles } else { commas };
                    return Some(if empty { 0 } else { commas + 1 });
                }
                ')' | ']' | '}' => depth -= 1,
                '<' if depth == 0
                    && prev.is_some_and(is_identifier_char)
                    && next != Some('<')
                    && next != Some('=') =>
                {
                    angles += 1
                }
                '>' if depth == 0 && angles > 0 && prev != Some('-') => angles -= 1,
                ',' if depth == 0 => {
                    commas += 1;
                    if angles == 0 {
                        commas_outside_angles += 1;
                    }
                }
                _ => {}
            }
            if !c.is_whitespace() {
                empty = false;
            }
            prev = Some(c);
        }
        None
    }
}

fn is_identifier_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "{}:{}:{}: ", loc.file, loc.line, loc.column)?;
        }
        let severity = match self.severity {
            Severity::Fatal => "fatal error",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        };
        write!(f, "{}: {}", severity, self.message)
    }
}

fn classify_message(message: &str) -> DiagnosticKind {
    if let Some(c) = UNKNOWN_BUILTIN.captures(message) {
        return DiagnosticKind::UnknownBuiltin(c[1].to_string());
    }
    if let Some(c) = UNDECLARED.captures(message) {
        return DiagnosticKind::UndeclaredIdentifier(c[1].to_string());
    }
    if let Some(c) = FILE_NOT_FOUND.captures(message) {
        return DiagnosticKind::FileNotFound(c[1].to_string());
    }
    if let Some(c) = MACRO_REDEFINED.captures(message) {
        return DiagnosticKind::MacroRedefined(c[1].to_string());
    }
    DiagnosticKind::Other
}

/// Clang prefixes echoed source with `   10 | `.
fn strip_gutter(line: &str) -> &str {
    match line.split_once(" | ") {
        Some((gutter, code)) if gutter.trim().chars().all(|c| c.is_ascii_digit()) => code,
        _ => line,
    }
}

fn is_macro_case(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c == '_' || c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// What a human should add to the wrapper to get past a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remedy {
    AddBuiltinShim { name: String, arity: Option<usize> },
    AddArchMacro { name: String },
    ForwardNamespace { name: String },
    GuardMacro { name: String },
    /// Not fixable from the wrapper, e.g. a header missing on this system.
    Unrecoverable { reason: String },
}

impl Remedy {
    /// Shim implementing this remedy. Arch macros take `value`; builtins
    /// whose arity could not be read from the diagnostic take `arity`.
    pub fn shim(&self, fallback_arity: usize, value: &str) -> Option<Result<Shim>> {
        match self {
            Remedy::AddBuiltinShim { name, arity } => {
                Some(ShimSet::builtin(name, arity.unwrap_or(fallback_arity)))
            }
            Remedy::AddArchMacro { name } => Some(ShimSet::arch(name, value)),
            _ => None,
        }
    }
}

impl fmt::Display for Remedy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remedy::AddBuiltinShim { name, arity: Some(n) } => {
                write!(f, "add a builtin shim for {} taking {} arguments", name, n)
            }
            Remedy::AddBuiltinShim { name, arity: None } => {
                write!(f, "add a builtin shim for {}", name)
            }
            Remedy::AddArchMacro { name } => write!(f, "define arch macro {}", name),
            Remedy::ForwardNamespace { name } => {
                write!(f, "forward-declare namespace {}", name)
            }
            Remedy::GuardMacro { name } => write!(f, "guard the definition of {}", name),
            Remedy::Unrecoverable { reason } => write!(f, "not fixable by shimming: {}", reason),
        }
    }
}

/// Remedies for every error in `output`, deduplicated, in order.
pub fn suggest(output: &str) -> Vec<Remedy> {
    let mut remedies: Vec<Remedy> = Vec::new();
    for diag in Diagnostic::parse_all(output).iter().filter(|d| d.is_error()) {
        let remedy = diag.remedy();
        if !remedies.contains(&remedy) {
            tracing::debug!(diagnostic = %diag, remedy = %remedy, "suggested remedy");
            remedies.push(remedy);
        }
    }
    remedies
}

/// Turn a failed generator run into the error naming what went wrong.
pub fn classify_failure(module: &str, output: &str) -> WrapError {
    let diagnostics = Diagnostic::parse_all(output);
    let errors = || diagnostics.iter().filter(|d| d.is_error());

    let actionable = errors().find(|d| d.kind != DiagnosticKind::Other);
    match actionable.map(|d| (&d.kind, d)) {
        Some((DiagnosticKind::FileNotFound(header), _)) => WrapError::MissingVendorHeader {
            header: header.clone(),
            searched: Vec::new(),
        },
        Some((DiagnosticKind::UndeclaredIdentifier(symbol), d))
        | Some((DiagnosticKind::UnknownBuiltin(symbol), d)) => WrapError::UnresolvedSymbol {
            symbol: symbol.clone(),
            diagnostic: d.to_string(),
        },
        _ => WrapError::Generation {
            module: module.to_string(),
            message: errors()
                .next()
                .map(|d| d.to_string())
                .unwrap_or_else(|| output.trim().to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BPERMUTE: &str = "\
/opt/rocm/include/rocwmma/internal/permute.hpp:88:20: error: use of undeclared identifier '__builtin_amdgcn_ds_bpermute'
   88 |             return __builtin_amdgcn_ds_bpermute(laneId << 2, v);
      |                    ^
1 error generated.
";

    #[test]
    fn parses_location_and_message() {
        let diag = Diagnostic::parse(BPERMUTE.lines().next().unwrap()).unwrap();
        let loc = diag.location.as_ref().unwrap();
        assert_eq!(loc.file, "/opt/rocm/include/rocwmma/internal/permute.hpp");
        assert_eq!((loc.line, loc.column), (88, 20));
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(
            diag.kind,
            DiagnosticKind::UndeclaredIdentifier("__builtin_amdgcn_ds_bpermute".into())
        );
    }

    #[test]
    fn builtin_arity_from_snippet() {
        let diags = Diagnostic::parse_all(BPERMUTE);
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].remedy(),
            Remedy::AddBuiltinShim {
                name: "__builtin_amdgcn_ds_bpermute".into(),
                arity: Some(2)
            }
        );
    }

    #[test]
    fn nested_call_arguments_count_once() {
        let out = "x.hpp:1:1: error: use of unknown builtin '__builtin_amdgcn_mov_dpp' [-Wimplicit-function-declaration]\n    1 | r = __builtin_amdgcn_mov_dpp(f(a, b), 0x111, 0xF, 0xF, false);\n";
        let diags = Diagnostic::parse_all(out);
        assert_eq!(
            diags[0].remedy(),
            Remedy::AddBuiltinShim {
                name: "__builtin_amdgcn_mov_dpp".into(),
                arity: Some(5)
            }
        );
    }

    #[test]
    fn template_arguments_are_not_call_arguments() {
        let out = "x.hpp:1:5: error: use of undeclared identifier '__builtin_amdgcn_ds_bpermute'\n    1 | r = __builtin_amdgcn_ds_bpermute(f<int, int>(l), v);\n";
        assert_eq!(
            suggest(out),
            [Remedy::AddBuiltinShim {
                name: "__builtin_amdgcn_ds_bpermute".into(),
                arity: Some(2)
            }]
        );
    }

    #[test]
    fn comparisons_and_shifts_keep_their_commas() {
        let arity = |code: &str| {
            let out = format!(
                "x.hpp:1:5: error: use of undeclared identifier '__builtin_amdgcn_uicmp'\n    1 | {}\n",
                code
            );
            match &suggest(&out)[0] {
                Remedy::AddBuiltinShim { arity, .. } => *arity,
                other => panic!("unexpected {:?}", other),
            }
        };
        assert_eq!(arity("m = __builtin_amdgcn_uicmp(x<y, z, 34);"), Some(3));
        assert_eq!(arity("m = __builtin_amdgcn_uicmp(lane<<2, v>>1, 34);"), Some(3));
        assert_eq!(arity("m = __builtin_amdgcn_uicmp(p->x, std::max<int>(a, b), 34);"), Some(3));
        assert_eq!(arity("m = __builtin_amdgcn_uicmp();"), Some(0));
    }

    #[test]
    fn namespace_and_arch_macro_remedies() {
        let out = "\
a.hpp:5:9: error: use of undeclared identifier '__hip_internal'
    5 |         __hip_internal::is_standard_layout<T>::value,
b.hpp:7:3: error: use of undeclared identifier '__AMDGCN_WAVEFRONT_SIZE'
";
        let remedies = suggest(out);
        assert_eq!(
            remedies,
            vec![
                Remedy::ForwardNamespace {
                    name: "__hip_internal".into()
                },
                Remedy::AddArchMacro {
                    name: "__AMDGCN_WAVEFRONT_SIZE".into()
                },
            ]
        );
        let shim = remedies[1].shim(0, "64").unwrap().unwrap();
        assert_eq!(shim.def().definition(), "__AMDGCN_WAVEFRONT_SIZE 64");
        assert!(remedies[0].shim(0, "").is_none());
    }

    #[test]
    fn missing_header_is_unrecoverable() {
        let out = "include/rocwmma.h:40:10: fatal error: 'rocwmma/rocwmma.hpp' file not found\n";
        match classify_failure("rocwmma", out) {
            WrapError::MissingVendorHeader { header, .. } => {
                assert_eq!(header, "rocwmma/rocwmma.hpp")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(suggest(out)[0], Remedy::Unrecoverable { .. }));
    }

    #[test]
    fn unresolved_symbol_names_the_builtin() {
        match classify_failure("rocwmma", BPERMUTE) {
            WrapError::UnresolvedSymbol { symbol, diagnostic } => {
                assert_eq!(symbol, "__builtin_amdgcn_ds_bpermute");
                assert!(diagnostic.starts_with("/opt/rocm/include/rocwmma/internal/permute.hpp:88:20: error:"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unclassified_failure_keeps_first_error() {
        let out = "warning: something\nx.h:1:2: error: expected ';' after struct\n";
        match classify_failure("hip", out) {
            WrapError::Generation { module, message } => {
                assert_eq!(module, "hip");
                assert_eq!(message, "x.h:1:2: error: expected ';' after struct");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            classify_failure("hip", "  boom  "),
            WrapError::Generation { message, .. } if message == "boom"
        ));
    }

    #[test]
    fn warnings_do_not_produce_remedies() {
        let out = "x.h:1:9: warning: '__HIP_PLATFORM_AMD__' macro redefined [-Wmacro-redefined]\n";
        let diag = Diagnostic::parse(out.trim_end()).unwrap();
        assert_eq!(diag.remedy(), Remedy::GuardMacro { name: "__HIP_PLATFORM_AMD__".into() });
        assert!(suggest(out).is_empty());
    }
}
