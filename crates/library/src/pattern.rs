//! Naming-pattern resolution
//!
//! A pattern is a `/`-separated relative path with `{placeholder}` fields filled
//! from book metadata. Text wrapped in `<...>` is kept only when every
//! placeholder inside it has a value, so `<{series}/>` disappears for
//! standalone books.

use folio_core::BookMetadata;
use std::path::Path;

/// Characters that cannot appear inside a single path segment
const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Turns a naming pattern into a path relative to a library root
pub trait PatternResolver: Send + Sync {
    /// Resolves `pattern` for `metadata`.
    ///
    /// The result always ends in a file name. `fallback_file_name` supplies the
    /// extension and is used verbatim when the pattern resolves to nothing.
    fn resolve(&self, metadata: &BookMetadata, pattern: &str, fallback_file_name: &str) -> String;
}

/// Default resolver understanding the standard placeholder set
#[derive(Debug, Clone, Copy, Default)]
pub struct PathPatternResolver;

impl PathPatternResolver {
    pub fn new() -> Self {
        Self
    }

    /// Outer `None` means the placeholder is unknown, inner `None` means it is empty
    fn field(metadata: &BookMetadata, name: &str, current_file_name: &str) -> Option<Option<String>> {
        let value = match name {
            "title" => non_blank(&metadata.title),
            "subtitle" => metadata.subtitle.as_deref().and_then(non_blank),
            "authors" => non_blank(&metadata.authors_display()),
            "year" => metadata.published_year.map(|y| y.to_string()),
            "series" => metadata.series_name.as_deref().and_then(non_blank),
            "seriesIndex" => metadata.series_number_display(),
            "language" => metadata.language.as_deref().and_then(non_blank),
            "publisher" => metadata.publisher.as_deref().and_then(non_blank),
            "isbn" => metadata.isbn.as_deref().and_then(non_blank),
            "currentFilename" => Path::new(current_file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(non_blank),
            _ => return None,
        };
        Some(value.map(|v| sanitize(&v)).filter(|v| !v.is_empty()))
    }

    /// Expands placeholders in `text`; the flag reports whether all of them had values
    fn expand_fields(metadata: &BookMetadata, text: &str, current_file_name: &str) -> (String, bool) {
        let mut out = String::with_capacity(text.len());
        let mut complete = true;
        let mut rest = text;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let name = &after[..end];
            match Self::field(metadata, name, current_file_name) {
                Some(Some(value)) => out.push_str(&value),
                Some(None) => complete = false,
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);

        (out, complete)
    }

    fn expand(metadata: &BookMetadata, pattern: &str, current_file_name: &str) -> String {
        let mut out = String::with_capacity(pattern.len());
        let mut rest = pattern;

        while let Some(open) = rest.find('<') {
            let (text, _) = Self::expand_fields(metadata, &rest[..open], current_file_name);
            out.push_str(&text);

            let after = &rest[open + 1..];
            match after.find('>') {
                Some(close) => {
                    let (block, complete) =
                        Self::expand_fields(metadata, &after[..close], current_file_name);
                    if complete {
                        out.push_str(&block);
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    // Unbalanced `<` is dropped
                    rest = after;
                }
            }
        }

        let (text, _) = Self::expand_fields(metadata, rest, current_file_name);
        out.push_str(&text);
        out
    }
}

impl PatternResolver for PathPatternResolver {
    fn resolve(&self, metadata: &BookMetadata, pattern: &str, fallback_file_name: &str) -> String {
        let keep_file_name = pattern.trim_end().ends_with('/');
        let expanded = Self::expand(metadata, pattern, fallback_file_name);

        let mut segments: Vec<String> = expanded
            .split('/')
            .map(|segment| segment.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|segment| !segment.is_empty() && segment != "." && segment != "..")
            .collect();

        if keep_file_name {
            segments.push(fallback_file_name.to_string());
            return segments.join("/");
        }

        let Some(last) = segments.last_mut() else {
            return fallback_file_name.to_string();
        };

        if let Some(ext) = Path::new(fallback_file_name)
            .extension()
            .and_then(|e| e.to_str())
        {
            let suffix = format!(".{}", ext.to_lowercase());
            if !last.to_lowercase().ends_with(&suffix) {
                last.push('.');
                last.push_str(ext);
            }
        }

        segments.join("/")
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Removes characters that would split or break a path segment
fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
