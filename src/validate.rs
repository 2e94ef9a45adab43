use std::collections::HashSet;
use std::fmt;

use crate::config::CrawlMode;

/// Substrings that mark a listing as a facility rather than a person.
const ORGANIZATION_TERMS: &[&str] = &[
    "clínica",
    "clinica",
    "hospital",
    "centro",
    "center",
    "policlínico",
    "policlinico",
    "policlínica",
    "policlinica",
    "servicios médicos",
    "servicios medicos",
    "medical",
    "instituto",
    "consultorios",
    "laboratorio",
    "oncosalud",
    "essalud",
    "medicentro",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Organization,
    CorporateCaps,
    NameIsCategory,
    NoSurname,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Organization => "name contains an organization term",
            Rejection::CorporateCaps => "name is all caps with spaces",
            Rejection::NameIsCategory => "name equals the category label",
            Rejection::NoSurname => "name has fewer than two tokens",
        };
        f.write_str(reason)
    }
}

pub fn looks_like_organization(text: &str) -> bool {
    let lower = text.to_lowercase();
    ORGANIZATION_TERMS.iter().any(|term| lower.contains(term))
}

/// First rule that rejects an extracted name, if any. Anything not rejected
/// is accepted.
pub fn rejection(full_name: &str, category: &str, mode: CrawlMode) -> Option<Rejection> {
    let name = full_name.trim();
    if looks_like_organization(name) {
        return Some(Rejection::Organization);
    }
    if name.contains(' ') && name.chars().any(char::is_alphabetic) && name == name.to_uppercase() {
        return Some(Rejection::CorporateCaps);
    }
    if mode == CrawlMode::Specialty && name == category.trim() {
        return Some(Rejection::NameIsCategory);
    }
    if name.split_whitespace().count() < 2 {
        return Some(Rejection::NoSurname);
    }
    None
}

/// Canonical source URLs already accepted in this run.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    /// Returns false when the URL was already present.
    pub fn insert(&mut self, url: &str) -> bool {
        self.seen.insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
