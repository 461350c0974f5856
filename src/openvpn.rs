//! Just enough OpenVPN config syntax to read and rewrite client configs
//!
//! A line is a directive name followed by arguments. Arguments may be
//! single- or double-quoted. `#` and `;` start a comment, either on a line
//! of their own or after the last argument. Inline file blocks such as
//! `<ca> ... </ca>` are opaque.

use crate::system::Files;
use anyhow::{Context, Result};
use std::fmt;
use regex::Regex;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Virtual device flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Tun,
    Tap,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tun => "tun",
            Self::Tap => "tap",
        }
    }

    /// Kind named by the first three characters of `s`
    pub fn from_prefix(s: &str) -> Option<Self> {
        if s.starts_with("tun") {
            Some(Self::Tun)
        } else if s.starts_with("tap") {
            Some(Self::Tap)
        } else {
            None
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An argument with its byte range in the source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Unquoted text
    pub text: String,
    /// Range of the raw token, quotes included
    pub span: Range<usize>,
    pub quoted: bool,
}

/// A parsed directive line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub args: Vec<Token>,
}

impl Directive {
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(|t| t.text.as_str())
    }
}

/// Next argument at the start of the remaining input; comments end the line
static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:[#;]|(?P<tok>"(?P<dq>(?:[^"\\]|\\.)*)"?|'(?P<sq>[^']*)'?|\S+))"#)
        .expect("token pattern is valid")
});

/// Backslash escape inside double quotes
static ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(.)").expect("escape pattern is valid"));

/// Opening tag of an inline file block such as `<ca>`
static BLOCK_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<([A-Za-z][\w-]*)>\s*$").expect("block pattern is valid"));

/// Parse one line; `None` for blanks and comments
pub fn parse_line(line: &str) -> Option<Directive> {
    let mut tokens = tokenize(line).into_iter();
    let name = tokens.next()?;
    Some(Directive {
        name: name.text,
        args: tokens.collect(),
    })
}

fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while let Some(caps) = TOKEN.captures(&line[pos..]) {
        let Some(tok) = caps.name("tok") else {
            break;
        };
        let span = pos + tok.start()..pos + tok.end();
        let (text, quoted) = if let Some(dq) = caps.name("dq") {
            (ESCAPE.replace_all(dq.as_str(), "$1").into_owned(), true)
        } else if let Some(sq) = caps.name("sq") {
            (sq.as_str().to_string(), true)
        } else {
            (tok.as_str().to_string(), false)
        };
        pos = span.end;
        tokens.push(Token { text, span, quoted });
    }

    tokens
}

/// Closing tag when `line` opens an inline block, e.g. `</ca>` for `<ca>`
pub fn block_close(line: &str) -> Option<String> {
    BLOCK_OPEN
        .captures(line)
        .map(|caps| format!("</{}>", &caps[1]))
}

/// Lines outside inline blocks; block contents and their tags are skipped
pub fn directive_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut close: Option<String> = None;
    text.lines().filter(move |line| {
        if let Some(tag) = &close {
            if line.trim() == tag.as_str() {
                close = None;
            }
            return false;
        }
        close = block_close(line);
        close.is_none()
    })
}

/// First whitespace-separated word of a command argument
pub fn command_word(arg: &str) -> Option<&str> {
    arg.split_whitespace().next()
}

/// Replace the command word of argument `index` in `line`
///
/// Everything else on the line, including a trailing comment, is kept.
pub fn replace_command(line: &str, index: usize, replacement: &str) -> Option<String> {
    let directive = parse_line(line)?;
    let token = directive.args.get(index)?;

    let inner_start = token.span.start + usize::from(token.quoted);
    let mut inner_end = token.span.end;
    if token.quoted && inner_end > inner_start {
        let quote = &line[token.span.start..=token.span.start];
        if line[..inner_end].ends_with(quote) {
            inner_end -= 1;
        }
    }
    let raw = &line[inner_start..inner_end];
    let word_start = inner_start + (raw.len() - raw.trim_start().len());
    let word = command_word(&line[word_start..inner_end])?;
    let word_end = word_start + word.len();

    let mut out = String::with_capacity(line.len() + replacement.len());
    out.push_str(&line[..word_start]);
    out.push_str(replacement);
    out.push_str(&line[word_end..]);
    Some(out)
}

/// Whether a `plugin` directive loads the down-root plugin
pub fn is_down_root(directive: &Directive) -> bool {
    directive.name == "plugin"
        && directive
            .arg(0)
            .is_some_and(|module| module.contains("down-root"))
}

/// The source client configuration
#[derive(Debug, Clone)]
pub struct OldConfig {
    path: PathBuf,
    text: String,
    directives: Vec<Directive>,
}

impl OldConfig {
    pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let directives = directive_lines(&text).filter_map(parse_line).collect();
        Self {
            path: path.into(),
            text,
            directives,
        }
    }

    pub fn load(files: &dyn Files, path: &Path) -> Result<Self> {
        let text = files
            .read(path)
            .with_context(|| format!("Could not read OpenVPN config {}", path.display()))?;
        Ok(Self::parse(path, text))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Directory relative paths in the config are resolved against
    pub fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    }

    /// First occurrence of a directive
    pub fn directive(&self, name: &str) -> Option<&Directive> {
        self.directives.iter().find(|d| d.name == name)
    }

    /// First argument of the first occurrence of `name`, if non-blank
    pub fn value(&self, name: &str) -> Option<String> {
        self.directive(name)
            .and_then(|d| d.arg(0))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    }

    pub fn has(&self, name: &str) -> bool {
        self.directive(name).is_some()
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// Whether any directive name starts with `prefix`
    pub fn has_prefixed(&self, prefix: &str) -> bool {
        self.directives.iter().any(|d| d.name.starts_with(prefix))
    }

    /// Script run by `up`
    pub fn up_command(&self) -> Option<String> {
        self.value("up")
            .as_deref()
            .and_then(command_word)
            .map(String::from)
    }

    /// Script run by `down`, or by the down-root plugin
    pub fn down_command(&self) -> Option<String> {
        if let Some(down) = self.value("down") {
            return command_word(&down).map(String::from);
        }
        self.directives
            .iter()
            .filter(|d| is_down_root(d))
            .find_map(|d| d.arg(1).and_then(command_word).map(String::from))
    }
}
