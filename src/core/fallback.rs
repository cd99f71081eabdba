//! Nearby-postcode candidates tried when the exact postcode does not resolve.
//!
//! Generation is pure: the same key always yields the same ordered list.

use crate::core::{Country, LookupKey};

const UK_STEPS: u8 = 3;
const NUMERIC_STEPS: u64 = 5;

/// Candidates for a raw `(postcode, country)` pair. Anything that cannot be
/// normalized, or an unsupported country, yields an empty list.
pub fn nearby(postcode: &str, country: &str) -> Vec<String> {
    let Some(country) = Country::parse(country) else {
        return Vec::new();
    };
    match LookupKey::new(postcode, country) {
        Ok(key) => nearby_postcodes(&key),
        Err(_) => Vec::new(),
    }
}

pub fn nearby_postcodes(key: &LookupKey) -> Vec<String> {
    match key.country() {
        Country::Uk => uk_neighbours(key.postcode()),
        Country::Us | Country::Australia => numeric_neighbours(key.postcode()),
    }
}

/// Same as [`nearby_postcodes`], already wrapped as lookup keys.
pub fn nearby_keys(key: &LookupKey) -> Vec<LookupKey> {
    nearby_postcodes(key)
        .iter()
        .filter_map(|postcode| LookupKey::new(postcode, key.country()).ok())
        .collect()
}

/// `SW1A 1AA` -> `SW1A 1BA`, `SW1A 1CA`, `SW1A 1DA`. Steps past `Z` are dropped.
fn uk_neighbours(postcode: &str) -> Vec<String> {
    if postcode.len() <= 3 || !postcode.is_ascii() {
        return Vec::new();
    }
    let (outward, inward) = postcode.split_at(postcode.len() - 3);
    let outward = outward.trim();
    if outward.is_empty() {
        return Vec::new();
    }

    let Some(pos) = inward.bytes().position(|b| b.is_ascii_uppercase()) else {
        return Vec::new();
    };
    let letter = inward.as_bytes()[pos];

    (1..=UK_STEPS)
        .map_while(|step| {
            let next = letter.checked_add(step).filter(|c| *c <= b'Z')?;
            let mut shifted = inward.as_bytes().to_vec();
            shifted[pos] = next;
            let shifted = String::from_utf8(shifted).ok()?;
            Some(format!("{} {}", outward, shifted))
        })
        .collect()
}

/// `90210` -> `90211` ... `90215`, keeping the original width and leading zeros.
fn numeric_neighbours(postcode: &str) -> Vec<String> {
    let width = postcode.len();
    let Ok(value) = postcode.parse::<u64>() else {
        return Vec::new();
    };

    (1..=NUMERIC_STEPS)
        .filter_map(|step| value.checked_add(step))
        .map(|next| format!("{:0width$}", next, width = width))
        .filter(|candidate| candidate.len() == width)
        .collect()
}
