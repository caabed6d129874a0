//! Query state and the request descriptors derived from it.

use std::fmt;

use shared::domain::{AppId, SortDirection, SortField};
use url::form_urlencoded;

use crate::error::QueryError;

/// Label of the "no category filter" choice.
pub const ALL_CATEGORIES: &str = "All";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_RATING: f64 = 5.0;

const APPS_PATH: [&str; 2] = ["api", "apps"];
const CATEGORIES_PATH: [&str; 2] = ["api", "categories"];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    /// Reads a category picked in a filter control; blank or "All" means no filter.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(ALL_CATEGORIES) {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(raw.to_string())
        }
    }

    pub fn as_param(&self) -> Option<&str> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Only(name) => Some(name),
        }
    }

    pub fn label(&self) -> &str {
        self.as_param().unwrap_or(ALL_CATEGORIES)
    }
}

/// Parses a minimum-rating form value. The empty string clears the filter.
pub fn parse_min_rating(raw: &str) -> Result<Option<f64>, QueryError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = raw
        .parse::<f64>()
        .map_err(|_| QueryError::InvalidMinRating(raw.to_string()))?;
    validate_min_rating(Some(value)).map_err(|_| QueryError::InvalidMinRating(raw.to_string()))
}

fn validate_min_rating(value: Option<f64>) -> Result<Option<f64>, QueryError> {
    match value {
        Some(v) if !v.is_finite() || !(0.0..=MAX_RATING).contains(&v) => {
            Err(QueryError::InvalidMinRating(v.to_string()))
        }
        other => Ok(other),
    }
}

/// Everything the user has selected. Mutations other than page moves reset
/// `page` to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub category: CategoryFilter,
    pub min_rating: Option<f64>,
    pub search: String,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub page: u32,
    pub per_page: u32,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            category: CategoryFilter::All,
            min_rating: None,
            search: String::new(),
            sort_field: SortField::Name,
            sort_direction: SortDirection::Ascending,
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl QueryState {
    pub fn with_page_size(per_page: u32) -> Result<Self, QueryError> {
        Self::default().page_size(per_page)
    }

    pub fn category(&self, category: CategoryFilter) -> Self {
        Self {
            category,
            page: 1,
            ..self.clone()
        }
    }

    pub fn min_rating(&self, min_rating: Option<f64>) -> Result<Self, QueryError> {
        Ok(Self {
            min_rating: validate_min_rating(min_rating)?,
            page: 1,
            ..self.clone()
        })
    }

    pub fn search(&self, search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            page: 1,
            ..self.clone()
        }
    }

    pub fn page_size(&self, per_page: u32) -> Result<Self, QueryError> {
        if per_page == 0 {
            return Err(QueryError::ZeroPageSize);
        }
        Ok(Self {
            per_page,
            page: 1,
            ..self.clone()
        })
    }

    /// Moves to `page` without touching any filter. Bounds are the
    /// pagination controller's business.
    pub fn page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }

    /// Same field flips the direction; another field sorts ascending by it.
    pub fn toggle_sort(&self, field: SortField) -> Self {
        let (sort_field, sort_direction) = if self.sort_field == field {
            (field, self.sort_direction.flipped())
        } else {
            (field, SortDirection::Ascending)
        };
        Self {
            sort_field,
            sort_direction,
            page: 1,
            ..self.clone()
        }
    }

    /// Pulls `page` back inside `1..=total_pages` once the page count is known.
    /// Returns whether the page moved.
    pub fn clamp_page(&mut self, total_pages: u32) -> bool {
        let clamped = self.page.clamp(1, total_pages.max(1));
        let moved = clamped != self.page;
        self.page = clamped;
        moved
    }

    pub fn sort_indicator(&self, field: SortField) -> Option<&'static str> {
        (self.sort_field == field).then(|| self.sort_direction.indicator())
    }
}

/// A fully-resolved read against the catalog backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestDescriptor {
    segments: Vec<String>,
    params: Vec<(String, String)>,
}

impl RequestDescriptor {
    fn new(segments: &[&str], params: Vec<(String, String)>) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            params,
        }
    }

    pub fn categories() -> Self {
        Self::new(&CATEGORIES_PATH, Vec::new())
    }

    pub fn app(id: &AppId) -> Self {
        Self::new(&[APPS_PATH[0], APPS_PATH[1], id.0.as_str()], Vec::new())
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish()
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))?;
        if !self.params.is_empty() {
            write!(f, "?{}", self.query_string())?;
        }
        Ok(())
    }
}

/// Derives the list request for `state`. Parameter order is fixed so equal
/// states always produce equal descriptors.
pub fn build(state: &QueryState) -> RequestDescriptor {
    let mut params = Vec::with_capacity(7);
    if let Some(category) = state.category.as_param() {
        params.push(("category".to_string(), category.to_string()));
    }
    if let Some(min_rating) = state.min_rating {
        params.push(("min_rating".to_string(), min_rating.to_string()));
    }
    let search = state.search.trim();
    if !search.is_empty() {
        params.push(("q".to_string(), search.to_string()));
    }
    params.push((
        "sort_by".to_string(),
        state.sort_field.wire_name().to_string(),
    ));
    params.push((
        "sort_order".to_string(),
        state.sort_direction.wire_value().to_string(),
    ));
    params.push(("page".to_string(), state.page.to_string()));
    params.push(("per_page".to_string(), state.per_page.to_string()));
    RequestDescriptor::new(&APPS_PATH, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn games_state() -> QueryState {
        QueryState::default()
            .category(CategoryFilter::parse("Games"))
            .min_rating(Some(4.0))
            .expect("rating")
    }

    #[test]
    fn builds_documented_example_request() {
        let request = build(&games_state());
        assert_eq!(
            request.query_string(),
            "category=Games&min_rating=4&sort_by=app_name&sort_order=1&page=1&per_page=10"
        );
        assert_eq!(request.param("q"), None);
        assert_eq!(request.segments(), ["api", "apps"]);
    }

    #[test]
    fn all_sentinel_and_blank_filters_are_omitted() {
        for raw in ["All", "all", "", "  "] {
            let state = QueryState::default()
                .category(CategoryFilter::parse(raw))
                .search("   ");
            let request = build(&state);
            assert_eq!(request.param("category"), None, "category {raw:?}");
            assert_eq!(request.param("q"), None);
            assert_eq!(request.param("min_rating"), None);
        }
    }

    #[test]
    fn descending_sort_and_search_are_encoded() {
        let state = QueryState::default()
            .toggle_sort(SortField::Reviews)
            .toggle_sort(SortField::Reviews)
            .search(" beat saber ");
        let request = build(&state);
        assert_eq!(request.param("sort_by"), Some("num_reviews"));
        assert_eq!(request.param("sort_order"), Some("-1"));
        assert_eq!(request.param("q"), Some("beat saber"));
        assert_eq!(
            request.to_string(),
            "/api/apps?q=beat+saber&sort_by=num_reviews&sort_order=-1&page=1&per_page=10"
        );
    }

    #[test]
    fn equal_states_build_equal_requests() {
        assert_eq!(build(&games_state()), build(&games_state()));
        assert_ne!(build(&games_state()), build(&games_state().page(2)));
    }

    #[test]
    fn filter_mutations_reset_page() {
        let paged = games_state().page(4);
        assert_eq!(paged.category(CategoryFilter::All).page, 1);
        assert_eq!(paged.min_rating(Some(3.0)).expect("rating").page, 1);
        assert_eq!(paged.search("vr").page, 1);
        assert_eq!(paged.page_size(25).expect("size").page, 1);
        assert_eq!(paged.toggle_sort(SortField::Rating).page, 1);
    }

    #[test]
    fn page_moves_keep_filters() {
        let moved = games_state().page(3);
        assert_eq!(moved.page, 3);
        assert_eq!(moved.category, CategoryFilter::Only("Games".into()));
        assert_eq!(moved.min_rating, Some(4.0));
    }

    #[test]
    fn toggle_sort_flips_or_switches() {
        let state = QueryState::default();
        let flipped = state.toggle_sort(SortField::Name);
        assert_eq!(flipped.sort_field, SortField::Name);
        assert_eq!(flipped.sort_direction, SortDirection::Descending);

        let switched = flipped.toggle_sort(SortField::Rating);
        assert_eq!(switched.sort_field, SortField::Rating);
        assert_eq!(switched.sort_direction, SortDirection::Ascending);
        assert_eq!(switched.sort_indicator(SortField::Rating), Some(" ↑"));
        assert_eq!(switched.sort_indicator(SortField::Name), None);
    }

    #[test]
    fn min_rating_parsing() {
        assert_eq!(parse_min_rating(""), Ok(None));
        assert_eq!(parse_min_rating(" 3 "), Ok(Some(3.0)));
        assert!(parse_min_rating("five").is_err());
        assert!(parse_min_rating("7").is_err());
        assert!(QueryState::default().min_rating(Some(f64::NAN)).is_err());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert_eq!(
            QueryState::default().page_size(0),
            Err(QueryError::ZeroPageSize)
        );
    }

    #[test]
    fn clamp_page_pulls_back_inside_known_bounds() {
        let mut state = QueryState::default().page(12);
        assert!(state.clamp_page(10));
        assert_eq!(state.page, 10);
        assert!(!state.clamp_page(10));

        let mut state = QueryState::default().page(3);
        assert!(state.clamp_page(0));
        assert_eq!(state.page, 1);
    }

    #[test]
    fn app_request_path_carries_the_identifier() {
        let request = RequestDescriptor::app(&AppId("beat saber".into()));
        assert_eq!(request.segments(), ["api", "apps", "beat saber"]);
        assert!(request.params().is_empty());
        assert_eq!(RequestDescriptor::categories().to_string(), "/api/categories");
    }
}
