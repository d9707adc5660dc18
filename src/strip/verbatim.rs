//! Verbatim-like contexts: regions where `%` is literal text.
//!
//! Two kinds of regions are recognized:
//! - environments from [`ENVIRONMENTS`] (plus names a project declares through
//!   one of the defining commands in [`collect_definitions`]),
//! - inline commands from [`inline_kind`] whose argument is read verbatim
//!   (`\verb|..|`, `\lstinline{..}`, `\url{..}` ...).
//!
//! Treating text as verbatim only ever preserves it, so the list errs on the
//! side of inclusion.

use regex::Regex;
use std::sync::LazyLock;

/// Environments whose body is passed through unmodified.
pub const ENVIRONMENTS: &[&str] = &[
    // LaTeX kernel / verbatim package
    "verbatim",
    "verbatim*",
    "comment",
    // fancyvrb
    "Verbatim",
    "Verbatim*",
    "BVerbatim",
    "LVerbatim",
    "SaveVerbatim",
    "VerbatimOut",
    // other literal environments
    "alltt",
    "lstlisting",
    "minted",
    "filecontents",
    "filecontents*",
    "spverbatim",
    "boxedverbatim",
    "tcblisting",
    "luacode*",
];

/// Commands with a verbatim argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InlineKind {
    /// `\verb*|..|`: any delimiter, must close on the same line.
    Verb,
    /// `\Verb[..]|..|`: fancyvrb flavour with options.
    FancyVerb,
    /// `\lstinline[..]{..}` or `\lstinline[..]|..|`
    Listing,
    /// `\mintinline[..]{lang}{..}` or `\mintinline[..]{lang}|..|`
    Minted,
    /// `\url{..}`, `\nolinkurl{..}` (also `|..|` delimited)
    Url,
    /// `\path{..}` or `\path|..|` from the url package. TikZ uses the same
    /// name for drawing, so anything else is ordinary TeX.
    Path,
    /// `\href[..]{url}{text}`: only the url argument is verbatim.
    Href,
}

pub(super) fn inline_kind(command: &str) -> Option<InlineKind> {
    Some(match command {
        "verb" | "spverb" => InlineKind::Verb,
        "Verb" => InlineKind::FancyVerb,
        "lstinline" => InlineKind::Listing,
        "mintinline" => InlineKind::Minted,
        "url" | "nolinkurl" => InlineKind::Url,
        "path" => InlineKind::Path,
        "href" => InlineKind::Href,
        _ => return None,
    })
}

/// Why an inline region could not be delimited.
pub(super) type InlineFault = &'static str;

/// Scan the argument of an inline verbatim command that ends at `pos`.
///
/// Returns the position just after the region, `Ok(pos)` unchanged when the
/// command is not followed by a verbatim argument (`\href` without braces,
/// TikZ `\path`).
pub(super) fn scan_inline(bytes: &[u8], pos: usize, kind: InlineKind) -> Result<usize, InlineFault> {
    match kind {
        InlineKind::Verb => {
            let mut p = pos;
            if bytes.get(p) == Some(&b'*') {
                p += 1;
            }
            delimited(bytes, p)
        }
        InlineKind::FancyVerb => {
            let p = skip_optional(bytes, pos)?;
            delimited(bytes, p)
        }
        InlineKind::Listing | InlineKind::Url => {
            let p = skip_optional(bytes, skip_blanks(bytes, pos))?;
            let p = skip_blanks(bytes, p);
            match bytes.get(p) {
                Some(b'{') => braced(bytes, p),
                _ => delimited(bytes, p),
            }
        }
        InlineKind::Minted => {
            let p = skip_optional(bytes, skip_blanks(bytes, pos))?;
            let p = skip_blanks(bytes, p);
            if bytes.get(p) != Some(&b'{') {
                return Err("missing language argument");
            }
            let p = skip_blanks(bytes, braced(bytes, p)?);
            match bytes.get(p) {
                Some(b'{') => braced(bytes, p),
                _ => delimited(bytes, p),
            }
        }
        InlineKind::Path => {
            let p = skip_blanks(bytes, pos);
            match bytes.get(p) {
                Some(b'{') => braced(bytes, p),
                Some(b'(' | b'[' | b'\\' | b';') => Ok(pos),
                _ => Ok(delimited(bytes, p).unwrap_or(pos)),
            }
        }
        InlineKind::Href => {
            let p = skip_optional(bytes, skip_blanks(bytes, pos))?;
            let p = skip_blanks(bytes, p);
            match bytes.get(p) {
                Some(b'{') => braced(bytes, p),
                _ => Ok(pos),
            }
        }
    }
}

fn skip_blanks(bytes: &[u8], mut pos: usize) -> usize {
    while matches!(bytes.get(pos), Some(b' ' | b'\t')) {
        pos += 1;
    }
    pos
}

/// Skip an optional `[...]` argument on the current line.
fn skip_optional(bytes: &[u8], pos: usize) -> Result<usize, InlineFault> {
    if bytes.get(pos) != Some(&b'[') {
        return Ok(pos);
    }
    let mut p = pos + 1;
    while let Some(&b) = bytes.get(p) {
        match b {
            b']' => return Ok(p + 1),
            b'\n' => break,
            _ => p += 1,
        }
    }
    Err("unterminated optional argument")
}

/// `<d>...<d>` on a single line; the delimiter is the byte at `pos`.
fn delimited(bytes: &[u8], pos: usize) -> Result<usize, InlineFault> {
    let delim = match bytes.get(pos) {
        None | Some(b'\n' | b'\r' | b' ' | b'\t') => return Err("missing delimiter"),
        Some(&d) if d.is_ascii_alphabetic() || !d.is_ascii() => return Err("invalid delimiter"),
        Some(&d) => d,
    };
    let mut p = pos + 1;
    while let Some(&b) = bytes.get(p) {
        if b == delim {
            return Ok(p + 1);
        }
        if b == b'\n' {
            break;
        }
        p += 1;
    }
    Err("not closed on the same line")
}

/// Balanced `{...}` starting at `pos`; escaped braces do not count.
fn braced(bytes: &[u8], pos: usize) -> Result<usize, InlineFault> {
    let mut depth = 0usize;
    let mut p = pos;
    while let Some(&b) = bytes.get(p) {
        match b {
            b'\\' => p += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(p + 1);
                }
            }
            _ => {}
        }
        p += 1;
    }
    Err("unbalanced braces")
}

/// Parse `{name}` after `\begin` / `\end` (blanks allowed before the brace).
///
/// Returns the name and the position after the closing brace.
pub(super) fn environment_name(text: &str, pos: usize) -> Option<(&str, usize)> {
    let bytes = text.as_bytes();
    let open = skip_blanks(bytes, pos);
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let start = open + 1;
    let mut p = start;
    while let Some(&b) = bytes.get(p) {
        match b {
            b'}' => return Some((&text[start..p], p + 1)),
            b'{' | b'\\' | b'\n' => return None,
            _ => p += 1,
        }
    }
    None
}

static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\(?:lstnewenvironment|DefineVerbatimEnvironment|RecustomVerbatimEnvironment|newtcblisting|NewTCBListing|DeclareTCBListing|excludecomment|specialcomment)\s*\*?\s*\{([^{}\n]+)\}",
    )
    .expect("verbatim definition pattern is valid")
});

static MINTED_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\newminted\s*(?:\[([^\]\n]+)\])?\s*\{([^{}\n]+)\}")
        .expect("minted definition pattern is valid")
});

/// Names of verbatim-like environments a document declares itself.
///
/// `\newminted{python}{..}` declares `pythoncode`; `\newminted[pycode]{python}`
/// declares `pycode`. Starred variants are added alongside.
pub fn collect_definitions(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    for caps in DEFINITION.captures_iter(text) {
        names.push(caps[1].trim().to_string());
    }
    for caps in MINTED_DEFINITION.captures_iter(text) {
        let name = match caps.get(1) {
            Some(explicit) => explicit.as_str().trim().to_string(),
            None => format!("{}code", caps[2].trim()),
        };
        names.push(format!("{name}*"));
        names.push(name);
    }
    names
}
