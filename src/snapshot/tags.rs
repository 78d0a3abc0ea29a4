//! Tag predicates deciding which relations and ways end up in the snapshot.

use std::sync::LazyLock;

use osmpbfreader::Tags;
use regex::Regex;

use crate::models::{Area, AreaKey, AreaLevel};

const REGIONAL_KEY_TAG: &str = "de:amtlicher_gemeindeschluessel";

/// Rejects purely numeric, punctuation-only and parenthesized names.
static BAD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\?|\+|-|_|\d*|\(.*\))$").expect("static regex"));

const STREET_HIGHWAYS: [&str; 9] = [
    "primary",
    "secondary",
    "tertiary",
    "unclassified",
    "residential",
    "living_street",
    "footway",
    "road",
    "pedestrian",
];

const RESTRICTED_ACCESS: [&str; 3] = ["private", "forestry", "military"];

fn tag<'a>(tags: &'a Tags, key: &str) -> Option<&'a str> {
    tags.get(key).map(|v| v.as_str())
}

/// `name:de` wins over `name`.
pub fn preferred_name(tags: &Tags) -> Option<String> {
    tag(tags, "name:de")
        .or_else(|| tag(tags, "name"))
        .map(str::to_string)
}

pub fn is_bad_name(name: &str) -> bool {
    BAD_NAME.is_match(name)
}

/// Postal area notes start with the postal code ("72793 Pfullingen"); the
/// first six characters are dropped along with any leading separator left over.
pub fn postal_area_name(note: &str) -> String {
    let rest: String = note.chars().skip(6).collect();
    rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace())
        .to_string()
}

pub fn normalize_street_name(name: &str) -> String {
    name.replace("straße", "str.")
        .replace("Straße", "Str.")
        .replace(['„', '“'], "\"")
}

pub fn normalize_area_name(name: &str) -> String {
    name.replace(" - ", "-")
}

fn is_postal_code_area(tags: &Tags) -> bool {
    tag(tags, "postal_code").is_some_and(|code| code.chars().count() == 5)
        && tags.contains_key("note")
        && tags.contains("boundary", "postal_code")
        && tags.contains("type", "boundary")
}

fn is_municipality(tags: &Tags) -> bool {
    tags.contains_key("name")
        && tag(tags, REGIONAL_KEY_TAG).is_some_and(|key| key.chars().count() == 8)
        && tags.contains("boundary", "administrative")
        && !tags.contains("admin_level", "9")
}

fn is_admin_level(tags: &Tags, level: &str) -> bool {
    tags.contains_key("name")
        && tags.contains("admin_level", level)
        && tags.contains("boundary", "administrative")
}

fn optional_regional_key(tags: &Tags) -> AreaKey {
    match tag(tags, REGIONAL_KEY_TAG) {
        Some(key) if key.chars().count() == 8 => AreaKey::RegionalKey(key.to_string()),
        _ => AreaKey::None,
    }
}

/// Classify a relation into one of the four area kinds. The returned area has
/// no ways yet. Checks run in order: postal code, municipality, borough, suburb.
pub fn classify_relation(tags: &Tags) -> Option<(AreaLevel, Area)> {
    if is_postal_code_area(tags) {
        let code = tag(tags, "postal_code")?.to_string();
        let name = postal_area_name(tag(tags, "note")?);
        return Some((AreaLevel::PostalCode, Area::new(name, AreaKey::PostalCode(code))));
    }

    if is_municipality(tags) {
        let key = tag(tags, REGIONAL_KEY_TAG)?.to_string();
        let name = preferred_name(tags)?;
        return Some((AreaLevel::Municipality, Area::new(name, AreaKey::RegionalKey(key))));
    }

    if is_admin_level(tags, "9") {
        let name = preferred_name(tags)?;
        return Some((AreaLevel::Borough, Area::new(name, optional_regional_key(tags))));
    }

    if is_admin_level(tags, "10") {
        let name = preferred_name(tags)?;
        return Some((AreaLevel::Suburb, Area::new(name, optional_regional_key(tags))));
    }

    None
}

/// Named, publicly accessible ways of a street-like type.
pub fn is_street(tags: &Tags) -> bool {
    let Some(name) = tag(tags, "name") else {
        return false;
    };

    if RESTRICTED_ACCESS
        .iter()
        .any(|access| tags.contains("access", access))
    {
        return false;
    }

    if is_bad_name(name) {
        return false;
    }

    tags.contains("place", "square")
        || tags.contains("leisure", "park")
        || STREET_HIGHWAYS
            .iter()
            .any(|highway| tags.contains("highway", highway))
        || (tags.contains("highway", "track") && tags.contains("tracktype", "grade1"))
        || (tags.contains("highway", "service") && tags.contains("service", "alley"))
}

#[cfg(test)]
pub(crate) fn tags_of(pairs: &[(&str, &str)]) -> Tags {
    let mut tags = Tags::new();
    for (key, value) in pairs {
        tags.insert((*key).into(), (*value).into());
    }
    tags
}
