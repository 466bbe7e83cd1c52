//! Domain types for shelter service requests and responses.

use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use pawhub_core::dog::Dog;
use serde::{Deserialize, Serialize};

/// Identifiers are opaque strings minted by the service.
pub type DogId = String;

/// Results per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// The service accepts at most this many ids per detail or match call.
pub const MAX_ID_BATCH: usize = 100;

/// Age bounds submitted when the caller sets no explicit range.
/// The service treats them as an unconstrained filter in practice.
pub const AGE_SENTINEL_MIN: u32 = 0;
pub const AGE_SENTINEL_MAX: u32 = 20;

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum SortField {
    #[default]
    #[display("breed")]
    Breed,
    #[display("name")]
    Name,
    #[display("age")]
    Age,
    #[display("zip_code")]
    ZipCode,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breed" => Ok(SortField::Breed),
            "name" => Ok(SortField::Name),
            "age" => Ok(SortField::Age),
            "zip_code" => Ok(SortField::ZipCode),
            other => Err(format!(
                "unknown sort field '{other}', expected breed, name, age or zip_code"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum SortDirection {
    #[default]
    #[display("asc")]
    Asc,
    #[display("desc")]
    Desc,
}

/// Sort specification, encoded on the wire as `field:direction`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.direction)
    }
}

// ---------------------------------------------------------------------------
// Search criteria
// ---------------------------------------------------------------------------

/// User-selected filter criteria for one search.
///
/// Built with the `with_*` setters. Every setter that changes a filter
/// dimension resets the page to the first page; only [with_page] moves
/// within the current filters.
///
/// [with_page]: SearchCriteria::with_page
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SearchCriteria {
    breeds: Vec<String>,
    zip_codes: Vec<String>,
    age_min: Option<u32>,
    age_max: Option<u32>,
    sort: SortSpec,
    page: u32,
    page_size: u32,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        SearchCriteria {
            breeds: Vec::new(),
            zip_codes: Vec::new(),
            age_min: None,
            age_max: None,
            sort: SortSpec::default(),
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty list means "no constraint on breed".
    pub fn with_breeds(mut self, breeds: Vec<String>) -> Self {
        self.breeds = breeds;
        self.page = 0;
        self
    }

    /// An empty list means "no constraint on zip code".
    pub fn with_zip_codes(mut self, zip_codes: Vec<String>) -> Self {
        self.zip_codes = zip_codes;
        self.page = 0;
        self
    }

    pub fn with_age_range(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.age_min = min;
        self.age_max = max;
        self.page = 0;
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self.page = 0;
        self
    }

    /// Page size is fixed for the life of a session; changing it restarts
    /// pagination.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self.page = 0;
        self
    }

    /// Move to a page (0-based) within the current filters.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub(crate) fn age_bounds(&self) -> (u32, u32) {
        (
            self.age_min.unwrap_or(AGE_SENTINEL_MIN),
            self.age_max.unwrap_or(AGE_SENTINEL_MAX),
        )
    }

    /// Encode as query parameters for the search capability.
    ///
    /// Breed and zip filters are repeated-value parameters and omitted
    /// entirely when empty; age bounds are always sent (sentinel range when
    /// unset); pagination is offset based.
    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        for breed in &self.breeds {
            query.push(("breeds", breed.clone()));
        }
        for zip_code in &self.zip_codes {
            query.push(("zipCodes", zip_code.clone()));
        }
        let (age_min, age_max) = self.age_bounds();
        query.push(("ageMin", age_min.to_string()));
        query.push(("ageMax", age_max.to_string()));
        query.push(("size", self.page_size.to_string()));
        query.push(("from", (self.page * self.page_size).to_string()));
        query.push(("sort", self.sort.to_string()));
        query
    }
}

// ---------------------------------------------------------------------------
// Wire responses
// ---------------------------------------------------------------------------

/// One page of search results as returned by the service: ids only, in
/// server-determined order, plus the total count and pagination cursors.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub result_ids: Vec<DogId>,
    #[serde(default)]
    pub total: u64,
    pub next: Option<String>,
    pub prev: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MatchResponse {
    #[serde(rename = "match")]
    pub matched: DogId,
}

/// Credentials submitted to the login capability.
#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub name: String,
    pub email: String,
}

// ---------------------------------------------------------------------------
// Resolved results
// ---------------------------------------------------------------------------

/// A fully resolved page of search results.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Entities in the order the service returned their ids.
    pub dogs: Vec<Dog>,
    pub total: u64,
    /// 0-based page this outcome belongs to.
    pub page: u32,
    pub page_count: u32,
}

impl SearchOutcome {
    /// The degraded outcome shown when search is unavailable.
    pub fn empty(page: u32) -> Self {
        SearchOutcome {
            dogs: Vec::new(),
            total: 0,
            page,
            page_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn filter_changes_reset_the_page() {
        let criteria = SearchCriteria::new().with_page(3);
        assert_eq!(criteria.page(), 3);

        assert_eq!(
            criteria
                .clone()
                .with_breeds(vec!["Akita".to_string()])
                .page(),
            0
        );
        assert_eq!(
            criteria
                .clone()
                .with_zip_codes(vec!["10001".to_string()])
                .page(),
            0
        );
        assert_eq!(criteria.clone().with_age_range(Some(2), Some(5)).page(), 0);
        assert_eq!(
            criteria
                .clone()
                .with_sort(SortSpec {
                    field: SortField::Age,
                    direction: SortDirection::Desc,
                })
                .page(),
            0
        );
        assert_eq!(criteria.clone().with_page_size(25).page(), 0);
    }

    #[test]
    fn empty_filters_send_no_breed_or_zip_params() {
        let query = SearchCriteria::new().to_query();
        assert!(query.iter().all(|(key, _)| *key != "breeds"));
        assert!(query.iter().all(|(key, _)| *key != "zipCodes"));
    }

    #[test]
    fn query_encoding_matches_the_wire_format() {
        let criteria = SearchCriteria::new()
            .with_breeds(vec!["Akita".to_string(), "Beagle".to_string()])
            .with_zip_codes(vec!["10001".to_string()])
            .with_age_range(Some(2), Some(5))
            .with_sort(SortSpec {
                field: SortField::Age,
                direction: SortDirection::Desc,
            })
            .with_page(2);

        let query = criteria.to_query();
        assert_eq!(query, vec![
            ("breeds", "Akita".to_string()),
            ("breeds", "Beagle".to_string()),
            ("zipCodes", "10001".to_string()),
            ("ageMin", "2".to_string()),
            ("ageMax", "5".to_string()),
            ("size", "20".to_string()),
            ("from", "40".to_string()),
            ("sort", "age:desc".to_string()),
        ]);
    }

    #[test]
    fn unset_age_bounds_fall_back_to_the_sentinel_range() {
        let query = SearchCriteria::new().to_query();
        assert!(query.contains(&("ageMin", "0".to_string())));
        assert!(query.contains(&("ageMax", "20".to_string())));
    }

    #[test]
    fn sort_field_parses_from_cli_spellings() {
        assert_eq!("breed".parse::<SortField>().unwrap(), SortField::Breed);
        assert_eq!("zip_code".parse::<SortField>().unwrap(), SortField::ZipCode);
        assert!("height".parse::<SortField>().is_err());
    }
}
