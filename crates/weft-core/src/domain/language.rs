//! File languages and their comment syntax.
//!
//! The patch engine only needs to know how to write a single-line comment in
//! a file, so a language here is little more than a comment style plus the
//! extensions it is recognised by.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;

/// How a one-line comment is opened and (optionally) closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentStyle {
    pub open: &'static str,
    pub close: Option<&'static str>,
}

impl CommentStyle {
    pub const SLASHES: Self = Self::line("//");
    pub const HASH: Self = Self::line("#");
    pub const DASHES: Self = Self::line("--");
    pub const C_BLOCK: Self = Self::block("/*", "*/");
    pub const XML: Self = Self::block("<!--", "-->");

    pub const fn line(open: &'static str) -> Self {
        Self { open, close: None }
    }

    pub const fn block(open: &'static str, close: &'static str) -> Self {
        Self {
            open,
            close: Some(close),
        }
    }

    /// Wrap `text` in this comment syntax on a single line.
    pub fn wrap(&self, text: &str) -> String {
        match self.close {
            Some(close) => format!("{} {text} {close}", self.open),
            None => format!("{} {text}", self.open),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Kotlin,
    Swift,
    Java,
    TypeScript,
    JavaScript,
    C,
    Css,
    Gradle,
    Toml,
    Yaml,
    Shell,
    Python,
    Sql,
    Xml,
    Html,
    Markdown,
}

impl Language {
    pub const fn comment_style(&self) -> CommentStyle {
        match self {
            Self::Rust
            | Self::Kotlin
            | Self::Swift
            | Self::Java
            | Self::TypeScript
            | Self::JavaScript
            | Self::Gradle => CommentStyle::SLASHES,
            Self::C | Self::Css => CommentStyle::C_BLOCK,
            Self::Toml | Self::Yaml | Self::Shell | Self::Python => CommentStyle::HASH,
            Self::Sql => CommentStyle::DASHES,
            Self::Xml | Self::Html | Self::Markdown => CommentStyle::XML,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Kotlin => "kotlin",
            Self::Swift => "swift",
            Self::Java => "java",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::C => "c",
            Self::Css => "css",
            Self::Gradle => "gradle",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Shell => "shell",
            Self::Python => "python",
            Self::Sql => "sql",
            Self::Xml => "xml",
            Self::Html => "html",
            Self::Markdown => "markdown",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let lang = match ext.to_ascii_lowercase().as_str() {
            "rs" => Self::Rust,
            "kt" | "kts" => Self::Kotlin,
            "swift" => Self::Swift,
            "java" => Self::Java,
            "ts" | "tsx" | "mts" | "cts" => Self::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "c" | "h" | "m" | "mm" => Self::C,
            "css" | "scss" => Self::Css,
            "gradle" => Self::Gradle,
            "toml" => Self::Toml,
            "yml" | "yaml" => Self::Yaml,
            "sh" | "bash" | "zsh" => Self::Shell,
            "py" => Self::Python,
            "sql" => Self::Sql,
            "xml" | "plist" => Self::Xml,
            "html" | "htm" | "svelte" | "vue" => Self::Html,
            "md" => Self::Markdown,
            _ => return None,
        };
        Some(lang)
    }

    /// Detect from a path's extension. `build.gradle.kts` resolves to Kotlin.
    pub fn detect(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" => Ok(Self::Rust),
            "kotlin" => Ok(Self::Kotlin),
            "swift" => Ok(Self::Swift),
            "java" => Ok(Self::Java),
            "typescript" => Ok(Self::TypeScript),
            "javascript" => Ok(Self::JavaScript),
            "c" => Ok(Self::C),
            "css" => Ok(Self::Css),
            "gradle" => Ok(Self::Gradle),
            "toml" => Ok(Self::Toml),
            "yaml" => Ok(Self::Yaml),
            "shell" => Ok(Self::Shell),
            "python" => Ok(Self::Python),
            "sql" => Ok(Self::Sql),
            "xml" => Ok(Self::Xml),
            "html" => Ok(Self::Html),
            "markdown" => Ok(Self::Markdown),
            other => Self::from_extension(other)
                .ok_or_else(|| DomainError::UnknownLanguage(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_wrapping() {
        assert_eq!(Language::Rust.comment_style().wrap("x"), "// x");
        assert_eq!(Language::Toml.comment_style().wrap("x"), "# x");
        assert_eq!(Language::Xml.comment_style().wrap("x"), "<!-- x -->");
        assert_eq!(Language::Css.comment_style().wrap("x"), "/* x */");
    }

    #[test]
    fn detection_by_extension() {
        assert_eq!(Language::detect(Path::new("src/lib.rs")), Some(Language::Rust));
        assert_eq!(
            Language::detect(Path::new("app/build.gradle.kts")),
            Some(Language::Kotlin)
        );
        assert_eq!(
            Language::detect(Path::new("AndroidManifest.xml")),
            Some(Language::Xml)
        );
        assert_eq!(Language::detect(Path::new("Makefile")), None);
    }

    #[test]
    fn parse_accepts_names_and_extensions() {
        assert_eq!("Kotlin".parse::<Language>().unwrap(), Language::Kotlin);
        assert_eq!("ts".parse::<Language>().unwrap(), Language::TypeScript);
        assert!("cobol".parse::<Language>().is_err());
    }
}
