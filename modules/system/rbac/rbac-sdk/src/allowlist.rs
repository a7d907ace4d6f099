//! Allow-list algebra.
//!
//! An allow-list bounds the concrete resources a scope or token may touch.
//! Elements are `{type, id}` pairs where either side may be `*`:
//!
//! - `{*, *}` admits everything and absorbs any list it appears in
//! - `{type, *}` admits every resource of one type
//! - `{*, id}` admits the resource with that id, whatever its type
//! - `{type, id}` admits exactly one resource
//!
//! All operations return normalized lists: deduplicated, shadowed entries
//! removed, sorted by type then id, and at most [`MAX_ALLOW_LIST_SIZE`] long.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{self, WILDCARD};
use crate::error::AllowListError;
use crate::models::Object;

/// Upper bound on the number of entries in any allow-list.
pub const MAX_ALLOW_LIST_SIZE: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllowListElement {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
}

impl AllowListElement {
    #[must_use]
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// The global wildcard `{*, *}`.
    #[must_use]
    pub fn all() -> Self {
        Self::new(WILDCARD, WILDCARD)
    }

    /// Every resource of one type: `{type, *}`.
    #[must_use]
    pub fn of_type(resource_type: impl Into<String>) -> Self {
        Self::new(resource_type, WILDCARD)
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        self.resource_type == WILDCARD && self.id == WILDCARD
    }

    #[must_use]
    pub fn matches(&self, object: &Object) -> bool {
        (self.resource_type == WILDCARD || self.resource_type == object.resource_type)
            && (self.id == WILDCARD || self.id == object.id)
    }
}

impl fmt::Display for AllowListElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

impl FromStr for AllowListElement {
    type Err = AllowListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_element(s)
    }
}

/// Parse one `type:id` entry.
///
/// # Errors
/// Returns [`AllowListError`] if the entry is empty, has no separator, names an
/// unknown resource type, or has an id that is neither a uuid nor `*`.
pub fn parse_element(entry: &str) -> Result<AllowListElement, AllowListError> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err(AllowListError::EmptyEntry);
    }
    let Some((resource_type, id)) = entry.split_once(':') else {
        return Err(AllowListError::MissingSeparator(entry.to_owned()));
    };
    if catalog::resource(resource_type).is_none() {
        return Err(AllowListError::UnknownResourceType(entry.to_owned()));
    }
    let id = if id == WILDCARD {
        WILDCARD.to_owned()
    } else {
        Uuid::parse_str(id)
            .map_err(|_| AllowListError::InvalidId(entry.to_owned()))?
            .to_string()
    };
    Ok(AllowListElement::new(resource_type, id))
}

/// Parse a list of `type:id` entries into a normalized allow-list.
///
/// # Errors
/// Returns [`AllowListError::TooManyEntries`] when there are more than
/// `max_entries` inputs (the list is never truncated), or the first entry
/// error encountered.
pub fn parse<S: AsRef<str>>(
    entries: &[S],
    max_entries: usize,
) -> Result<Vec<AllowListElement>, AllowListError> {
    if entries.len() > max_entries {
        return Err(AllowListError::TooManyEntries {
            count: entries.len(),
            max: max_entries,
        });
    }
    let mut parsed = Vec::with_capacity(entries.len());
    for entry in entries {
        let element = parse_element(entry.as_ref())?;
        if element.is_all() {
            return Ok(vec![element]);
        }
        parsed.push(element);
    }
    normalize(&parsed)
}

/// Whether any element of `list` admits `object`.
#[must_use]
pub fn matches_any(list: &[AllowListElement], object: &Object) -> bool {
    list.iter().any(|e| e.matches(object))
}

/// Deduplicate, drop shadowed entries and sort.
///
/// An empty input yields an empty list.
///
/// # Errors
/// Returns [`AllowListError::TooManyEntries`] if the normalized list is longer
/// than [`MAX_ALLOW_LIST_SIZE`].
pub fn normalize(elements: &[AllowListElement]) -> Result<Vec<AllowListElement>, AllowListError> {
    if elements.iter().any(AllowListElement::is_all) {
        return Ok(vec![AllowListElement::all()]);
    }

    let typed_wildcards: BTreeSet<&str> = elements
        .iter()
        .filter(|e| e.id == WILDCARD)
        .map(|e| e.resource_type.as_str())
        .collect();
    let id_wildcards: BTreeSet<&str> = elements
        .iter()
        .filter(|e| e.resource_type == WILDCARD)
        .map(|e| e.id.as_str())
        .collect();

    let kept: BTreeSet<&AllowListElement> = elements
        .iter()
        .filter(|e| {
            let shadowed_by_type =
                e.id != WILDCARD && typed_wildcards.contains(e.resource_type.as_str());
            let shadowed_by_id =
                e.resource_type != WILDCARD && id_wildcards.contains(e.id.as_str());
            !shadowed_by_type && !shadowed_by_id
        })
        .collect();

    if kept.len() > MAX_ALLOW_LIST_SIZE {
        return Err(AllowListError::TooManyEntries {
            count: kept.len(),
            max: MAX_ALLOW_LIST_SIZE,
        });
    }
    Ok(kept.into_iter().cloned().collect())
}

/// Set union of several lists.
///
/// # Errors
/// Returns [`AllowListError::TooManyEntries`] if the union is too large.
pub fn union<'a, I>(lists: I) -> Result<Vec<AllowListElement>, AllowListError>
where
    I: IntoIterator<Item = &'a [AllowListElement]>,
{
    let mut merged = Vec::new();
    for list in lists {
        if list.iter().any(AllowListElement::is_all) {
            return Ok(vec![AllowListElement::all()]);
        }
        merged.extend_from_slice(list);
    }
    normalize(&merged)
}

/// Intersect a scope's allow-list with the list persisted for one token.
///
/// The persisted list is expected to be non-empty; an empty one fails closed
/// and yields an empty result. When either side is the global wildcard, the
/// other side is returned (normalized).
///
/// # Errors
/// Returns [`AllowListError::TooManyEntries`] if the result is too large.
pub fn intersect(
    scope_list: &[AllowListElement],
    db_list: &[AllowListElement],
) -> Result<Vec<AllowListElement>, AllowListError> {
    if db_list.is_empty() {
        return Ok(Vec::new());
    }
    if scope_list.iter().any(AllowListElement::is_all) {
        return normalize(db_list);
    }
    if db_list.iter().any(AllowListElement::is_all) {
        return normalize(scope_list);
    }

    let narrowed: Vec<AllowListElement> = scope_list
        .iter()
        .flat_map(|a| db_list.iter().filter_map(move |b| intersect_element(a, b)))
        .collect();
    normalize(&narrowed)
}

fn intersect_element(a: &AllowListElement, b: &AllowListElement) -> Option<AllowListElement> {
    let resource_type = narrow(&a.resource_type, &b.resource_type)?;
    let id = narrow(&a.id, &b.id)?;
    Some(AllowListElement::new(resource_type, id))
}

/// The more specific of two values, or `None` if they are disjoint.
fn narrow<'a>(a: &'a str, b: &'a str) -> Option<&'a str> {
    if a == WILDCARD {
        Some(b)
    } else if b == WILDCARD || a == b {
        Some(a)
    } else {
        None
    }
}
