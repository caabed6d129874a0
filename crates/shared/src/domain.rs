use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppId(pub String);

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog entry as received from the remote store. Never mutated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppRecord {
    pub id: AppId,
    pub name: String,
    pub category: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub source_url: Option<String>,
}

impl AppRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: AppId(id.into()),
            name: name.into(),
            category: None,
            rating: None,
            review_count: None,
            description: None,
            image_url: None,
            source_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Name,
    Category,
    Rating,
    Reviews,
}

impl SortField {
    pub const ALL: [SortField; 4] = [
        SortField::Name,
        SortField::Category,
        SortField::Rating,
        SortField::Reviews,
    ];

    /// Field name the backend sorts on.
    pub fn wire_name(self) -> &'static str {
        match self {
            SortField::Name => "app_name",
            SortField::Category => "category",
            SortField::Rating => "ratings",
            SortField::Reviews => "num_reviews",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortField::Name => "Name",
            SortField::Category => "Category",
            SortField::Rating => "Rating",
            SortField::Reviews => "Reviews",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    /// `1` / `-1`, matching the backend's `sort_order` parameter.
    pub fn wire_value(self) -> i8 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    pub fn indicator(self) -> &'static str {
        match self {
            SortDirection::Ascending => " ↑",
            SortDirection::Descending => " ↓",
        }
    }
}
