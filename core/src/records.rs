//! Record shapes for the two dataset representations.
//!
//! Both describe the same kind of person-like entity. The flat shape keeps
//! hobbies as one delimited column; the nested shape keeps them as a list and
//! carries an extra [`Metadata`] sub-record.

use crate::pools::HOBBY_DELIMITER;
use serde::{Deserialize, Serialize};

/// One row of the flat (tabular) dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord {
    pub id: u64,
    pub name: String,
    pub age: u32,
    pub city: String,
    /// Hobby tags joined with [`HOBBY_DELIMITER`].
    pub hobbies: String,
}

impl FlatRecord {
    /// Split the delimited hobby column back into tags.
    pub fn hobby_tags(&self) -> impl Iterator<Item = &str> {
        split_hobbies(&self.hobbies)
    }
}

/// Extra fields only the nested representation carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub created_year: u32,
    pub active: bool,
    pub score: f64,
}

/// One document of the nested dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedRecord {
    pub id: u64,
    pub name: String,
    pub age: u32,
    pub city: String,
    pub hobbies: Vec<String>,
    pub metadata: Metadata,
}

impl NestedRecord {
    pub fn has_hobby(&self, tag: &str) -> bool {
        self.hobbies.iter().any(|h| h == tag)
    }
}

/// Join tags into the flat column encoding.
pub fn join_hobbies<S: AsRef<str>>(tags: &[S]) -> String {
    let mut out = String::new();
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            out.push(HOBBY_DELIMITER);
        }
        out.push_str(tag.as_ref());
    }
    out
}

/// Split the flat column encoding into tags, skipping empty pieces.
pub fn split_hobbies(encoded: &str) -> impl Iterator<Item = &str> {
    encoded
        .split(HOBBY_DELIMITER)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
}
