//! # Collaborators
//!
//! The engine reads users, courses and grades, resolves uploaded files and
//! checks permissions through the traits in this module. The host
//! application implements them; the engine ships only trivial versions
//! for previews, tests and the CLI.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ParchmentError, Result};
use crate::model::Id;

/// The person a certificate is rendered for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl User {
    pub fn new(id: Id, first_name: &str, last_name: &str) -> Self {
        Self {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: String::new(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Stand-in recipient for previews rendered without a real user.
    pub fn preview() -> Self {
        Self::new(0, "Jane", "Doe")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Id,
    pub full_name: String,
    pub short_name: String,
    pub category_name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Enrolment window for one user.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Enrolment {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Which grade a grade or date element refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GradeItemRef {
    /// The course total.
    Course,
    /// A grade item by id.
    Item(Id),
    /// The grade item of a course module.
    Module(Id),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeInfo {
    pub percentage: f64,
    pub points: f64,
    pub max_points: f64,
    pub letter: String,
    pub date_graded: Option<DateTime<Utc>>,
}

/// Read-only course, completion and grade data consumed at render time.
pub trait DomainLookups {
    fn course(&self) -> Option<Course>;
    fn completion_date(&self, user: &User) -> Option<DateTime<Utc>>;
    fn enrolment(&self, user: &User) -> Option<Enrolment>;
    fn grade(&self, user: &User, item: &GradeItemRef) -> Option<GradeInfo>;
}

/// No course data at all. Every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDomainData;

impl DomainLookups for NoDomainData {
    fn course(&self) -> Option<Course> {
        None
    }
    fn completion_date(&self, _user: &User) -> Option<DateTime<Utc>> {
        None
    }
    fn enrolment(&self, _user: &User) -> Option<Enrolment> {
        None
    }
    fn grade(&self, _user: &User, _item: &GradeItemRef) -> Option<GradeInfo> {
        None
    }
}

/// Fixed course data held in memory, for the CLI and for tests.
#[derive(Debug, Default, Clone)]
pub struct StaticLookups {
    course: Option<Course>,
    completions: HashMap<Id, DateTime<Utc>>,
    enrolments: HashMap<Id, Enrolment>,
    grades: Vec<(Id, GradeItemRef, GradeInfo)>,
}

impl StaticLookups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_course(mut self, course: Course) -> Self {
        self.course = Some(course);
        self
    }

    pub fn with_completion(mut self, user_id: Id, date: DateTime<Utc>) -> Self {
        self.completions.insert(user_id, date);
        self
    }

    pub fn with_enrolment(mut self, user_id: Id, enrolment: Enrolment) -> Self {
        self.enrolments.insert(user_id, enrolment);
        self
    }

    pub fn with_grade(mut self, user_id: Id, item: GradeItemRef, grade: GradeInfo) -> Self {
        self.grades.push((user_id, item, grade));
        self
    }
}

impl DomainLookups for StaticLookups {
    fn course(&self) -> Option<Course> {
        self.course.clone()
    }
    fn completion_date(&self, user: &User) -> Option<DateTime<Utc>> {
        self.completions.get(&user.id).copied()
    }
    fn enrolment(&self, user: &User) -> Option<Enrolment> {
        self.enrolments.get(&user.id).copied()
    }
    fn grade(&self, user: &User, item: &GradeItemRef) -> Option<GradeInfo> {
        self.grades
            .iter()
            .find(|(id, i, _)| *id == user.id && i == item)
            .map(|(_, _, g)| g.clone())
    }
}

/// A reference to an uploaded file, as stored in image payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    pub context_id: Id,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Resolves uploaded images and signatures.
pub trait FileStorage {
    /// `None` when the file no longer exists.
    fn resolve(&self, file: &FileRef) -> Option<StoredFile>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoFiles;

impl FileStorage for NoFiles {
    fn resolve(&self, _file: &FileRef) -> Option<StoredFile> {
        None
    }
}

/// Files held in memory, keyed by reference.
#[derive(Debug, Default, Clone)]
pub struct MemoryFiles {
    files: HashMap<FileRef, StoredFile>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: FileRef, bytes: Vec<u8>) {
        let mime = crate::image_loader::sniff_mime(&bytes).to_string();
        self.files.insert(file, StoredFile { bytes, mime });
    }
}

impl FileStorage for MemoryFiles {
    fn resolve(&self, file: &FileRef) -> Option<StoredFile> {
        self.files.get(file).cloned()
    }
}

/// Enforces the "manage templates" capability.
pub trait SecurityContext {
    fn require_manage(&self, context_id: Id) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl SecurityContext for AllowAll {
    fn require_manage(&self, _context_id: Id) -> Result<()> {
        Ok(())
    }
}

/// Grants management only in the listed contexts.
#[derive(Debug, Default, Clone)]
pub struct ContextAllowList {
    allowed: Vec<Id>,
}

impl ContextAllowList {
    pub fn new(allowed: impl IntoIterator<Item = Id>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl SecurityContext for ContextAllowList {
    fn require_manage(&self, context_id: Id) -> Result<()> {
        if self.allowed.contains(&context_id) {
            Ok(())
        } else {
            Err(ParchmentError::PermissionDenied { context_id })
        }
    }
}

/// The kinds of ids a course restore remaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappedKind {
    CourseModule,
    GradeItem,
    Context,
}

/// Old id → new id tables produced by a restore.
pub trait IdMapping {
    fn map(&self, kind: MappedKind, old: Id) -> Option<Id>;
}

#[derive(Debug, Default, Clone)]
pub struct RestoreMapping {
    ids: HashMap<(MappedKind, Id), Id>,
}

impl RestoreMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: MappedKind, old: Id, new: Id) -> &mut Self {
        self.ids.insert((kind, old), new);
        self
    }
}

impl IdMapping for RestoreMapping {
    fn map(&self, kind: MappedKind, old: Id) -> Option<Id> {
        self.ids.get(&(kind, old)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name_trims() {
        assert_eq!(User::new(1, "Ada", "Lovelace").full_name(), "Ada Lovelace");
        assert_eq!(User::new(1, "Cher", "").full_name(), "Cher");
    }

    #[test]
    fn test_allow_list() {
        let security = ContextAllowList::new([5]);
        assert!(security.require_manage(5).is_ok());
        assert!(matches!(
            security.require_manage(6),
            Err(ParchmentError::PermissionDenied { context_id: 6 })
        ));
    }

    #[test]
    fn test_restore_mapping_is_per_kind() {
        let mut mapping = RestoreMapping::new();
        mapping.insert(MappedKind::CourseModule, 10, 110);
        assert_eq!(mapping.map(MappedKind::CourseModule, 10), Some(110));
        assert_eq!(mapping.map(MappedKind::GradeItem, 10), None);
    }

    #[test]
    fn test_memory_files_sniff_mime() {
        let mut files = MemoryFiles::new();
        let file = FileRef { context_id: 1, path: "/sig.png".to_string() };
        files.insert(file.clone(), vec![0x89, 0x50, 0x4E, 0x47, 0]);
        assert_eq!(files.resolve(&file).unwrap().mime, "image/png");
        assert!(NoFiles.resolve(&file).is_none());
    }
}
