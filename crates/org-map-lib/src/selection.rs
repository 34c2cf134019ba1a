//! Selection models
//!
//! Two independent models live side by side and are never merged:
//!
//! - [`HierarchySelection`] stores region, country and city keys exactly as toggled.
//!   Composite keys join segments with [`KEY_DELIMITER`], e.g. `"NA||US||Austin"`.
//! - [`LocationSelection`] stores stable location ids.
//!
//! Both produce a [`NavigationPayload`] through [`NavigationSource`].

use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Separator between key segments
pub const KEY_DELIMITER: &str = "||";

pub fn region_key(region: &str) -> String {
    region.to_string()
}

pub fn country_key(region: &str, country: &str) -> String {
    format!("{region}{KEY_DELIMITER}{country}")
}

pub fn city_key(region: &str, country: &str, city: &str) -> String {
    format!("{region}{KEY_DELIMITER}{country}{KEY_DELIMITER}{city}")
}

/// Granularity of a selection key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyLevel {
    Region,
    Country,
    City,
}

/// Classify `region||country||city||orgId` by its last non-empty segment
///
/// Returns `None` for empty keys and for keys naming an org, which belong to the
/// location id model.
pub fn classify(key: &str) -> Option<KeyLevel> {
    let segments: Vec<&str> = key.split(KEY_DELIMITER).collect();
    let last = segments.iter().rposition(|segment| !segment.is_empty())?;
    match last {
        0 => Some(KeyLevel::Region),
        1 => Some(KeyLevel::Country),
        2 => Some(KeyLevel::City),
        _ => None,
    }
}

/// Flattened view of a hierarchical selection
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SelectionSummary {
    pub regions: Vec<String>,
    pub countries: Vec<String>,
    pub cities: Vec<String>,
}

impl SelectionSummary {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.countries.is_empty() && self.cities.is_empty()
    }
}

/// Region, country and city keys, stored exactly as toggled
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HierarchySelection {
    regions: BTreeSet<String>,
    countries: BTreeSet<String>,
    cities: BTreeSet<String>,
}

impl HierarchySelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the key is selected afterwards
    pub fn toggle_region(&mut self, region: &str) -> bool {
        toggle(&mut self.regions, region_key(region))
    }

    pub fn toggle_country(&mut self, region: &str, country: &str) -> bool {
        toggle(&mut self.countries, country_key(region, country))
    }

    pub fn toggle_city(&mut self, region: &str, country: &str, city: &str) -> bool {
        toggle(&mut self.cities, city_key(region, country, city))
    }

    /// Toggle a composite key at the level given by [`classify`]
    ///
    /// Trailing empty segments are dropped before storing. Returns `None` if the key is not
    /// a hierarchical key.
    pub fn toggle(&mut self, key: &str) -> Option<bool> {
        let level = classify(key)?;
        let segments: Vec<&str> = key.split(KEY_DELIMITER).collect();
        Some(match level {
            KeyLevel::Region => self.toggle_region(segments[0]),
            KeyLevel::Country => self.toggle_country(segments[0], segments[1]),
            KeyLevel::City => self.toggle_city(segments[0], segments[1], segments[2]),
        })
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.regions.contains(key) || self.countries.contains(key) || self.cities.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.countries.is_empty() && self.cities.is_empty()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
        self.countries.clear();
        self.cities.clear();
    }

    /// Keys of each level as stored
    ///
    /// Country and city entries keep their full composite key, so `NA||US||Springfield`
    /// and `NA||CA||Springfield` stay distinct.
    pub fn summarize(&self) -> SelectionSummary {
        SelectionSummary {
            regions: self.regions.iter().cloned().collect(),
            countries: self.countries.iter().cloned().collect(),
            cities: self.cities.iter().cloned().collect(),
        }
    }
}

fn toggle(set: &mut BTreeSet<String>, key: String) -> bool {
    if set.remove(&key) {
        false
    } else {
        set.insert(key);
        true
    }
}

/// Set of stable location ids
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocationSelection {
    ids: BTreeSet<String>,
}

impl LocationSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the id is selected afterwards; empty ids are ignored
    pub fn toggle(&mut self, location_id: &str) -> bool {
        if location_id.is_empty() {
            return false;
        }
        toggle(&mut self.ids, location_id.to_string())
    }

    /// Replace the whole set, skipping empty ids
    pub fn replace<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| !id.is_empty())
            .collect();
    }

    pub fn contains(&self, location_id: &str) -> bool {
        self.ids.contains(location_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Payload of the "view orgs" navigation: hierarchy lists or location ids, never both
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum NavigationPayload {
    // Listed first so untagged deserialization does not read ids as an empty hierarchy
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    Locations { location_ids: Vec<String> },
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    Hierarchy {
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
        sales_region: Vec<String>,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
        country: Vec<String>,
        #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Vec::is_empty"))]
        city: Vec<String>,
    },
}

/// A selection that can be turned into a navigation payload
pub trait NavigationSource {
    fn navigation_payload(&self) -> NavigationPayload;
}

impl NavigationSource for HierarchySelection {
    fn navigation_payload(&self) -> NavigationPayload {
        let summary = self.summarize();
        NavigationPayload::Hierarchy {
            sales_region: summary.regions,
            country: summary.countries,
            city: summary.cities,
        }
    }
}

impl NavigationSource for LocationSelection {
    fn navigation_payload(&self) -> NavigationPayload {
        NavigationPayload::Locations {
            location_ids: self.ids(),
        }
    }
}
