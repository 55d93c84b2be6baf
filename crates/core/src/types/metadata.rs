//! Descriptive book metadata

use serde::{Deserialize, Serialize};

/// Metadata consumed by file naming patterns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub series_name: Option<String>,
    pub series_number: Option<f32>,
    pub published_year: Option<i32>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub isbn: Option<String>,
}

impl BookMetadata {
    /// Creates metadata with only a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }

    pub fn with_series(mut self, name: impl Into<String>, number: Option<f32>) -> Self {
        self.series_name = Some(name.into());
        self.series_number = number;
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.published_year = Some(year);
        self
    }

    /// Authors joined the way they appear in folder names
    pub fn authors_display(&self) -> String {
        self.authors
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Series position formatted without a trailing `.0`
    pub fn series_number_display(&self) -> Option<String> {
        self.series_number.map(|n| {
            if n.fract() == 0.0 {
                format!("{}", n as i64)
            } else {
                format!("{}", n)
            }
        })
    }
}
