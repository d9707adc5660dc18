//! LaTeX comment stripping.
//!
//! A single left-to-right scan over the source:
//!
//! ```text
//! \foo{bar} % note      →  \foo{bar}
//! 100\% done % note     →  100\% done
//! \macro{x}%            →  \macro{x}%        (marker kept, see below)
//! % whole-line comment  →  (empty line)
//! \begin{verbatim} % x  →  unchanged up to \end{verbatim}
//! ```
//!
//! Newlines are never removed, so line numbers stay aligned with the
//! original file. Blanks before a comment are only dropped when a line break
//! follows, where TeX would discard them anyway. A `%` glued to preceding
//! text is kept as a bare marker: it swallows the end-of-line space, and
//! dropping it would change spacing inside macro definitions.
//!
//! Anything that cannot be delimited with certainty (an unterminated
//! verbatim environment, an orphan `\end{verbatim}`, an inline `\verb`
//! without closing delimiter) makes [`Stripper::strip`] fail closed with
//! [`UnbalancedVerbatimRegion`]; callers ship the original text instead.

mod verbatim;

pub use verbatim::{ENVIRONMENTS, collect_definitions};

use rustc_hash::FxHashSet;
use thiserror::Error;
use verbatim::{environment_name, inline_kind, scan_inline};

/// The source could not be stripped safely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unbalanced verbatim region at line {line}: {reason}")]
pub struct UnbalancedVerbatimRegion {
    /// 1-based line where the offending region starts.
    pub line: usize,
    pub reason: String,
}

/// Comment stripper configured with a set of verbatim environment names.
#[derive(Debug, Clone)]
pub struct Stripper {
    environments: FxHashSet<String>,
}

impl Default for Stripper {
    fn default() -> Self {
        Self {
            environments: ENVIRONMENTS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl Stripper {
    /// Stripper recognizing [`ENVIRONMENTS`] plus `extra` names.
    pub fn with_environments<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stripper = Self::default();
        stripper.environments.extend(extra.into_iter().map(Into::into));
        stripper
    }

    pub fn is_verbatim(&self, env: &str) -> bool {
        self.environments.contains(env)
    }

    /// Remove comments from `text`.
    ///
    /// Pure and idempotent: `strip(strip(t)) == strip(t)`.
    pub fn strip(&self, text: &str) -> Result<String, UnbalancedVerbatimRegion> {
        let bytes = text.as_bytes();
        let len = bytes.len();
        let mut out = String::with_capacity(len);
        // Start of the input span not yet copied into `out`.
        let mut pending = 0;
        let mut i = 0;

        while i < len {
            match bytes[i] {
                b'\\' => i = self.skip_control_sequence(text, i)?,
                b'%' => {
                    let eol = line_end(bytes, i);
                    let has_newline = eol < len;
                    let end = if has_newline && eol > i && bytes[eol - 1] == b'\r' {
                        eol - 1
                    } else {
                        eol
                    };

                    let attached = is_attached(&text[..i]);
                    out.push_str(&text[pending..i]);
                    if attached {
                        out.push('%');
                    } else if has_newline {
                        trim_trailing_blanks(&mut out);
                    }

                    pending = end;
                    i = end;
                }
                _ => i += 1,
            }
        }

        out.push_str(&text[pending..]);
        Ok(out)
    }

    /// Advance past the control sequence starting at `start` (a backslash),
    /// including any verbatim region it opens.
    fn skip_control_sequence(&self, text: &str, start: usize) -> Result<usize, UnbalancedVerbatimRegion> {
        let bytes = text.as_bytes();
        let name_start = start + 1;
        let Some(&first) = bytes.get(name_start) else {
            return Ok(name_start);
        };

        // Control symbol: `\%`, `\\`, `\{` ... consume both characters.
        if !first.is_ascii_alphabetic() {
            return Ok(if first == b'\n' || !first.is_ascii() {
                name_start
            } else {
                name_start + 1
            });
        }

        let mut name_end = name_start;
        while bytes.get(name_end).is_some_and(u8::is_ascii_alphabetic) {
            name_end += 1;
        }
        let name = &text[name_start..name_end];

        match name {
            "begin" => match environment_name(text, name_end) {
                Some((env, body)) if self.is_verbatim(env) => {
                    let close = format!("\\end{{{env}}}");
                    match text[body..].find(&close) {
                        Some(offset) => Ok(body + offset + close.len()),
                        None => Err(fault(text, start, format!("`\\begin{{{env}}}` is never closed"))),
                    }
                }
                _ => Ok(name_end),
            },
            "end" => match environment_name(text, name_end) {
                Some((env, _)) if self.is_verbatim(env) => Err(fault(
                    text,
                    start,
                    format!("`\\end{{{env}}}` without matching begin"),
                )),
                _ => Ok(name_end),
            },
            _ => match inline_kind(name) {
                Some(kind) => scan_inline(bytes, name_end, kind)
                    .map_err(|reason| fault(text, start, format!("`\\{name}`: {reason}"))),
                None => Ok(name_end),
            },
        }
    }
}

/// 1-based first lines of runs where stripping left only blank lines
/// between two lines of text, and none of them was blank before.
///
/// TeX reads such a run as a paragraph break that the original, whose
/// comments swallowed the line ends, did not have. Runs before
/// `\begin{document}` are ignored; `original` and `stripped` must have the
/// same line count, which [`Stripper::strip`] guarantees.
pub fn paragraph_breaks(original: &str, stripped: &str) -> Vec<usize> {
    let before: Vec<&str> = original.split('\n').collect();
    let after: Vec<&str> = stripped.split('\n').collect();
    if before.len() != after.len() {
        return Vec::new();
    }
    let blank = |line: &str| line.trim().is_empty();
    let body = after
        .iter()
        .position(|line| line.contains("\\begin{document}"))
        .map_or(0, |i| i + 1);

    let mut breaks = Vec::new();
    let mut i = body;
    while i < after.len() {
        if !blank(after[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < after.len() && blank(after[i]) {
            i += 1;
        }
        let enclosed = start > body && i < after.len();
        if enclosed && before[start..i].iter().all(|line| !blank(line)) {
            breaks.push(start + 1);
        }
    }
    breaks
}

fn fault(text: &str, pos: usize, reason: String) -> UnbalancedVerbatimRegion {
    UnbalancedVerbatimRegion {
        line: line_of(text, pos),
        reason,
    }
}

fn line_of(text: &str, pos: usize) -> usize {
    text.as_bytes()[..pos].iter().filter(|&&b| b == b'\n').count() + 1
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| from + p)
}

/// Number of consecutive backslashes at the end of `s`.
fn trailing_backslashes(s: &str) -> usize {
    s.bytes().rev().take_while(|&b| b == b'\\').count()
}

/// Whether a `%` following `before` is glued to content on its line.
///
/// True for a non-blank predecessor, and for a control space (`\ `) whose
/// blank must not be trimmed.
fn is_attached(before: &str) -> bool {
    match before.as_bytes().last() {
        None | Some(b'\n' | b'\r') => false,
        Some(b' ' | b'\t') => trailing_backslashes(&before[..before.len() - 1]) % 2 == 1,
        Some(_) => true,
    }
}

/// Drop trailing spaces/tabs on the current output line, stopping at a
/// control space.
fn trim_trailing_blanks(out: &mut String) {
    while let Some(last) = out.as_bytes().last().copied() {
        if last != b' ' && last != b'\t' {
            break;
        }
        if trailing_backslashes(&out[..out.len() - 1]) % 2 == 1 {
            break;
        }
        out.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(text: &str) -> Result<String, UnbalancedVerbatimRegion> {
        Stripper::default().strip(text)
    }

    fn s(text: &str) -> String {
        strip(text).unwrap()
    }

    #[test]
    fn test_escaped_percent_preserved() {
        assert_eq!(s("100\\% done % note"), "100\\% done ");
        assert_eq!(s("100\\% done % note\n"), "100\\% done\n");
    }

    #[test]
    fn test_blank_line_preserved() {
        assert_eq!(s("text % comment\n\nnext\n"), "text\n\nnext\n");
    }

    #[test]
    fn test_whole_line_comment_becomes_empty_line() {
        assert_eq!(s("a\n% note\nb\n"), "a\n\nb\n");
        assert_eq!(s("a\n    % indented\nb"), "a\n\nb");
        assert_eq!(s("% only"), "");
    }

    #[test]
    fn test_attached_comment_keeps_marker() {
        assert_eq!(s("\\newcommand{\\x}{a}% no space\n"), "\\newcommand{\\x}{a}%\n");
        assert_eq!(s("word%\n"), "word%\n");
    }

    #[test]
    fn test_double_backslash_then_comment() {
        // `\\` is a line break, the `%` after it is a real comment
        assert_eq!(s("a \\\\ % c\n"), "a \\\\\n");
        assert_eq!(s("a\\\\% c\n"), "a\\\\%\n");
        // three backslashes: `\\` then `\%`
        assert_eq!(s("a\\\\\\% kept\n"), "a\\\\\\% kept\n");
    }

    #[test]
    fn test_control_space_not_trimmed() {
        assert_eq!(s("\\LaTeX\\ % c\n"), "\\LaTeX\\ %\n");
    }

    #[test]
    fn test_crlf_line_endings() {
        assert_eq!(s("a % c\r\nb\r\n"), "a\r\nb\r\n");
    }

    #[test]
    fn test_verbatim_environment_untouched() {
        let text = "x % c\n\\begin{verbatim}\n50% off % really\n\\end{verbatim}\ny % d\n";
        assert_eq!(
            s(text),
            "x\n\\begin{verbatim}\n50% off % really\n\\end{verbatim}\ny\n"
        );
    }

    #[test]
    fn test_fancy_and_listing_environments() {
        for env in ["Verbatim", "lstlisting", "minted", "comment", "filecontents*"] {
            let text = format!("\\begin{{{env}}}\n% kept\n\\end{{{env}}}\n");
            assert_eq!(s(&text), text, "{env}");
        }
    }

    #[test]
    fn test_unknown_environment_is_stripped() {
        assert_eq!(
            s("\\begin{itemize}\n\\item a % c\n\\end{itemize}\n"),
            "\\begin{itemize}\n\\item a\n\\end{itemize}\n"
        );
    }

    #[test]
    fn test_inline_verbatim() {
        assert_eq!(s("use \\verb|%| here % c\n"), "use \\verb|%| here\n");
        assert_eq!(s("\\url{https://x.org/a%20b} % c\n"), "\\url{https://x.org/a%20b}\n");
        assert_eq!(s("\\lstinline{x % y}\n"), "\\lstinline{x % y}\n");
    }

    #[test]
    fn test_tikz_path_stripped() {
        assert_eq!(
            s("\\path coordinate (a) at (0,0); % private note\n"),
            "\\path coordinate (a) at (0,0);\n"
        );
        assert_eq!(
            s("\\path[draw] node {x}; % a\n\\path\n  (0,0) -- (1,1); % b\n"),
            "\\path[draw] node {x};\n\\path\n  (0,0) -- (1,1);\n"
        );
        assert_eq!(s("\\path{C:/50%/x} % c\n"), "\\path{C:/50%/x}\n");
    }

    #[test]
    fn test_paragraph_breaks_reported() {
        let text = "\\usepackage{a}\n% preamble note\n\\usepackage{b}\n\\begin{document}\nOne\n% aside\n% more\ntwo.\n\n% after a real break\nThree\n";
        let stripped = s(text);
        assert_eq!(paragraph_breaks(text, &stripped), vec![6]);
    }

    #[test]
    fn test_no_paragraph_breaks_without_comment_lines() {
        let text = "\\begin{document}\nOne % a\ntwo.\n\nThree\n";
        assert!(paragraph_breaks(text, &s(text)).is_empty());
        let input = "a\n% x\nb\n";
        assert_eq!(paragraph_breaks(input, &s(input)), vec![2]);
    }

    #[test]
    fn test_verbatim_begin_inside_comment_ignored() {
        assert_eq!(s("a % \\begin{verbatim}\nb % c\n"), "a\nb\n");
    }

    #[test]
    fn test_unterminated_verbatim_fails_closed() {
        let err = strip("a\n\\begin{verbatim}\n% x\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_orphan_end_fails_closed() {
        let err = strip("a\nb\n\\end{lstlisting}\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_unterminated_verb_fails_closed() {
        let err = strip("\\verb|50%\n|").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.reason.contains("verb"));
    }

    #[test]
    fn test_custom_environments() {
        let stripper = Stripper::with_environments(["pylisting"]);
        let text = "\\begin{pylisting}\nprint('%d' % 3)\n\\end{pylisting}\n";
        assert_eq!(stripper.strip(text).unwrap(), text);
        assert_eq!(s(text), "\\begin{pylisting}\nprint('%\n\\end{pylisting}\n");
    }

    #[test]
    fn test_non_ascii_text() {
        assert_eq!(s("Größe % Kommentar\nü\n"), "Größe\nü\n");
        assert_eq!(s("\\ü % c\n"), "\\ü\n");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "100\\% done % note",
            "text % comment\n\nnext",
            "a\\\\% c\n\\LaTeX\\ % d\n",
            "\\begin{verbatim}\n% x\n\\end{verbatim} % y\n",
            "x%\n  %\n\t% z\r\n",
            "\\verb+%+ % c\n\\href{a%b}{t % u} % v\n",
        ];
        for sample in samples {
            let once = s(sample);
            assert_eq!(s(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_no_comments_is_identity() {
        let text = "\\documentclass{article}\n\\begin{document}\nHi.\n\\end{document}\n";
        assert_eq!(s(text), text);
    }
}
