//! URL Classifier
//!
//! Decides which copy topology a set of source URLs and a target URL form.
//! Pure: no I/O, the same input always yields the same result.

use serde::Serialize;

use crate::url::ClientUrl;

/// Copy topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    /// One object to one explicit destination key
    TypeA,
    /// One object into a container, keyed by its base name
    TypeB,
    /// One recursive source into a container
    TypeC,
    /// Several recursive sources merged under one target
    TypeD,
    /// Rejected combination
    Invalid,
}

impl Classification {
    pub fn is_valid(&self) -> bool {
        !matches!(self, Classification::Invalid)
    }

    /// Whether sources are walked recursively
    pub fn is_recursive(&self) -> bool {
        matches!(self, Classification::TypeC | Classification::TypeD)
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Classification::TypeA => "type-a",
            Classification::TypeB => "type-b",
            Classification::TypeC => "type-c",
            Classification::TypeD => "type-d",
            Classification::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// Classify a copy request
///
/// Strings that do not parse as URLs make the request `Invalid`.
pub fn classify<S: AsRef<str>>(sources: &[S], target: &str) -> Classification {
    if sources.is_empty() || target.trim().is_empty() {
        return Classification::Invalid;
    }
    let Ok(target) = ClientUrl::parse(target) else {
        return Classification::Invalid;
    };
    let parsed: Option<Vec<ClientUrl>> = sources
        .iter()
        .map(|s| ClientUrl::parse(s.as_ref()).ok())
        .collect();
    let Some(sources) = parsed else {
        return Classification::Invalid;
    };

    match sources.as_slice() {
        [source] if source.is_recursive() => Classification::TypeC,
        [_] if target.is_container() => Classification::TypeB,
        [_] => Classification::TypeA,
        many if many.iter().all(ClientUrl::is_recursive) => Classification::TypeD,
        _ => Classification::Invalid,
    }
}
