//! Computes where a book's files should live. No filesystem access.

use crate::pattern::PatternResolver;
use folio_core::{Book, BookFile, BookFileId};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Current and target location of one file
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLocation {
    pub file_id: BookFileId,
    pub source: PathBuf,
    pub target: PathBuf,
    pub new_file_name: String,
    pub new_file_sub_path: String,
}

impl PlannedLocation {
    pub fn is_changed(&self) -> bool {
        self.source != self.target
    }
}

/// Target locations for every file of one book
#[derive(Debug, Clone)]
pub struct MovePlan {
    pub primary: PlannedLocation,
    pub additional: Vec<PlannedLocation>,
}

impl MovePlan {
    pub fn primary_changed(&self) -> bool {
        self.primary.is_changed()
    }

    /// All locations, primary first
    pub fn locations(&self) -> impl Iterator<Item = &PlannedLocation> {
        std::iter::once(&self.primary).chain(self.additional.iter())
    }

    /// Locations whose path actually changes
    pub fn changed(&self) -> impl Iterator<Item = &PlannedLocation> {
        self.locations().filter(|loc| loc.is_changed())
    }

    /// Writes the planned names and sub-paths into `book`'s file records
    pub fn apply_to(&self, book: &mut Book) {
        for file in book.files_mut() {
            if let Some(loc) = self.locations().find(|loc| loc.file_id == file.id) {
                file.file_name = loc.new_file_name.clone();
                file.file_sub_path = loc.new_file_sub_path.clone();
            }
        }
    }
}

/// Applies a naming pattern to a book's files
pub struct PathPlanner<'a> {
    resolver: &'a dyn PatternResolver,
}

impl<'a> PathPlanner<'a> {
    pub fn new(resolver: &'a dyn PatternResolver) -> Self {
        Self { resolver }
    }

    /// Plans new locations for every file of `book`.
    ///
    /// The primary file is placed by `pattern` under `target_root`. Additional
    /// files follow it into the same directory; book-format alternates are
    /// renamed by the pattern with their own extension unless that name is
    /// already taken. A blank pattern keeps each file's sub-path and name.
    pub fn plan(
        &self,
        book: &Book,
        source_root: &Path,
        target_root: &Path,
        pattern: &str,
    ) -> MovePlan {
        if pattern.trim().is_empty() {
            return MovePlan {
                primary: keep_relative(&book.primary_file, source_root, target_root),
                additional: book
                    .additional_files
                    .iter()
                    .map(|file| keep_relative(file, source_root, target_root))
                    .collect(),
            };
        }

        let resolved = self
            .resolver
            .resolve(&book.metadata, pattern, &book.primary_file.file_name);
        let (sub_path, primary_name) = split_relative(&resolved);

        let primary = located(
            &book.primary_file,
            source_root,
            target_root,
            &sub_path,
            primary_name,
        );

        let mut taken: HashSet<String> = HashSet::new();
        taken.insert(primary.new_file_name.clone());

        let additional = book
            .additional_files
            .iter()
            .map(|file| {
                let mut name = file.file_name.clone();
                if file.is_book {
                    let renamed = self
                        .resolver
                        .resolve(&book.metadata, pattern, &file.file_name);
                    let (_, renamed_name) = split_relative(&renamed);
                    if !taken.contains(&renamed_name) {
                        name = renamed_name;
                    }
                }
                taken.insert(name.clone());
                located(file, source_root, target_root, &sub_path, name)
            })
            .collect();

        MovePlan {
            primary,
            additional,
        }
    }
}

fn keep_relative(file: &BookFile, source_root: &Path, target_root: &Path) -> PlannedLocation {
    PlannedLocation {
        file_id: file.id,
        source: file.full_path(source_root),
        target: file.full_path(target_root),
        new_file_name: file.file_name.clone(),
        new_file_sub_path: file.file_sub_path.clone(),
    }
}

fn located(
    file: &BookFile,
    source_root: &Path,
    target_root: &Path,
    sub_path: &str,
    name: String,
) -> PlannedLocation {
    let mut target = target_root.to_path_buf();
    for segment in sub_path.split('/').filter(|s| !s.is_empty()) {
        target.push(segment);
    }
    target.push(&name);

    PlannedLocation {
        file_id: file.id,
        source: file.full_path(source_root),
        target,
        new_file_name: name,
        new_file_sub_path: sub_path.to_string(),
    }
}

/// Splits `a/b/name.ext` into (`a/b`, `name.ext`)
fn split_relative(relative: &str) -> (String, String) {
    match relative.rsplit_once('/') {
        Some((dir, name)) => (dir.to_string(), name.to_string()),
        None => (String::new(), relative.to_string()),
    }
}
