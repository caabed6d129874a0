//! Display-ready views of fetched records and the category facet list.

use shared::domain::{AppId, AppRecord};

use crate::query::ALL_CATEGORIES;

pub const STAR_SLOTS: u8 = 5;
pub const DESCRIPTION_LIMIT: usize = 150;
pub const ELLIPSIS: &str = "...";
pub const NO_DESCRIPTION: &str = "No description available.";
pub const UNCATEGORIZED: &str = "Uncategorized";
pub const NO_IMAGE_MARKER: &str = "No Image Available";
pub const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/300x200?text=No+Image";
pub const NO_RATING: &str = "No ratings yet";
pub const NO_REVIEWS: &str = "No reviews";
pub const SOURCE_LINK_LABEL: &str = "View on Meta Store";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StarRating {
    pub full: u8,
    pub half: bool,
    pub empty: u8,
}

impl StarRating {
    /// Full stars for the whole part, a half star when the fraction is at
    /// least one half, empty stars for the rest.
    pub fn from_rating(rating: f64) -> Self {
        let rating = if rating.is_nan() {
            0.0
        } else {
            rating.clamp(0.0, f64::from(STAR_SLOTS))
        };
        let full = rating.floor() as u8;
        let half = full < STAR_SLOTS && rating.fract() >= 0.5;
        let empty = STAR_SLOTS - full - u8::from(half);
        Self { full, half, empty }
    }

    pub fn units(&self) -> u8 {
        self.full + u8::from(self.half) + self.empty
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(usize::from(STAR_SLOTS) * 3);
        out.extend(std::iter::repeat('★').take(usize::from(self.full)));
        if self.half {
            out.push('⯪');
        }
        out.extend(std::iter::repeat('☆').take(usize::from(self.empty)));
        out
    }
}

pub fn truncate_description(description: Option<&str>) -> String {
    let Some(description) = description else {
        return NO_DESCRIPTION.to_string();
    };
    match description.char_indices().nth(DESCRIPTION_LIMIT) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &description[..cut]),
        None => description.to_string(),
    }
}

/// Image slot of a card. A failed load swaps in the placeholder once; the
/// placeholder itself failing does not swap again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSlot {
    Missing,
    Remote { url: String, fell_back: bool },
}

impl ImageSlot {
    pub fn from_url(url: Option<&str>) -> Self {
        match url {
            Some(url) if !url.trim().is_empty() => ImageSlot::Remote {
                url: url.to_string(),
                fell_back: false,
            },
            _ => ImageSlot::Missing,
        }
    }

    /// Image reference to load, or `None` when the card shows [`NO_IMAGE_MARKER`].
    pub fn src(&self) -> Option<&str> {
        match self {
            ImageSlot::Missing => None,
            ImageSlot::Remote {
                fell_back: true, ..
            } => Some(PLACEHOLDER_IMAGE_URL),
            ImageSlot::Remote { url, .. } => Some(url),
        }
    }

    /// Records a load failure. Returns `true` only for the one substitution.
    pub fn mark_load_failed(&mut self) -> bool {
        match self {
            ImageSlot::Remote { fell_back, .. } if !*fell_back => {
                *fell_back = true;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRecord {
    pub id: AppId,
    pub name: String,
    pub category_label: String,
    pub stars: Option<StarRating>,
    pub rating_text: String,
    pub reviews_text: Option<String>,
    pub description: String,
    pub image: ImageSlot,
    pub source_url: Option<String>,
}

impl DisplayRecord {
    pub fn from_record(record: &AppRecord) -> Self {
        // A zero rating is how the scraper stores "not rated".
        let rating = record.rating.filter(|r| *r > 0.0 && r.is_finite());
        let (stars, rating_text, reviews_text) = match rating {
            Some(r) => (
                Some(StarRating::from_rating(r)),
                format!("{r:.1}"),
                Some(reviews_text(record.review_count)),
            ),
            None => (None, NO_RATING.to_string(), None),
        };

        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            category_label: record
                .category
                .clone()
                .unwrap_or_else(|| UNCATEGORIZED.to_string()),
            stars,
            rating_text,
            reviews_text,
            description: truncate_description(record.description.as_deref()),
            image: ImageSlot::from_url(record.image_url.as_deref()),
            source_url: record.source_url.clone(),
        }
    }
}

fn reviews_text(count: Option<u64>) -> String {
    match count {
        Some(n) if n > 0 => format!("{n} reviews"),
        _ => NO_REVIEWS.to_string(),
    }
}

pub fn project(records: &[AppRecord]) -> Vec<DisplayRecord> {
    records.iter().map(DisplayRecord::from_record).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFacet {
    All,
    Category(String),
}

impl CategoryFacet {
    pub fn label(&self) -> &str {
        match self {
            CategoryFacet::All => ALL_CATEGORIES,
            CategoryFacet::Category(name) => name,
        }
    }
}

/// Distinct categories of the given page in first-seen order, behind "All".
pub fn facets(records: &[AppRecord]) -> Vec<CategoryFacet> {
    let mut out = vec![CategoryFacet::All];
    for category in records.iter().filter_map(|r| r.category.as_deref()) {
        if category == ALL_CATEGORIES {
            continue;
        }
        if !out.iter().any(|facet| facet.label() == category) {
            out.push(CategoryFacet::Category(category.to_string()));
        }
    }
    out
}
