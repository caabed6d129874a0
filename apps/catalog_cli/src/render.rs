use std::fmt::Write;

use catalog_core::{
    projection::NO_IMAGE_MARKER, projection::SOURCE_LINK_LABEL, CatalogView, DisplayRecord,
    ViewStatus,
};
use shared::domain::{AppRecord, SortField};

const LOADING: &str = "Loading apps...";
const EMPTY: &str = "No apps found. Try a different category or check your connection.";

pub fn render_view(view: &CatalogView) -> String {
    let mut out = String::new();
    match &view.status {
        ViewStatus::Idle => return out,
        ViewStatus::Loading => {
            out.push_str(LOADING);
            out.push('\n');
            return out;
        }
        ViewStatus::Error(message) => {
            let _ = writeln!(out, "Error: {message}");
            return out;
        }
        ViewStatus::Empty => {
            out.push_str(EMPTY);
            out.push('\n');
        }
        ViewStatus::Ready => {
            let _ = writeln!(out, "{}", sort_header(view));
            for record in &view.records {
                out.push('\n');
                out.push_str(&render_record(record));
            }
            out.push('\n');
        }
    }

    let categories: Vec<&str> = view.facets.iter().map(|f| f.label()).collect();
    let _ = writeln!(out, "Categories: {}", categories.join(" | "));
    let _ = writeln!(
        out,
        "{} {} {}  ({} apps)",
        if view.page.can_go_back() { "<" } else { " " },
        view.page.label(),
        if view.page.can_go_forward() { ">" } else { " " },
        view.page.total
    );
    if let Some(at) = view.fetched_at {
        let _ = writeln!(out, "Fetched {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    out
}

fn sort_header(view: &CatalogView) -> String {
    SortField::ALL
        .iter()
        .map(|field| {
            format!(
                "{}{}",
                field.label(),
                view.sort_indicator(*field).unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

pub fn render_record(record: &DisplayRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}  [{}]", record.name, record.category_label);

    let mut rating = String::new();
    if let Some(stars) = &record.stars {
        rating.push_str(&stars.render());
        rating.push(' ');
    }
    rating.push_str(&record.rating_text);
    if let Some(reviews) = &record.reviews_text {
        let _ = write!(rating, " ({reviews})");
    }
    let _ = writeln!(out, "  {rating}");
    let _ = writeln!(out, "  {}", record.description);
    let _ = writeln!(out, "  Image: {}", record.image.src().unwrap_or(NO_IMAGE_MARKER));
    if let Some(url) = &record.source_url {
        let _ = writeln!(out, "  {SOURCE_LINK_LABEL}: {url}");
    }
    out
}

/// Single-app view. Unlike the list cards the description is not shortened.
pub fn render_detail(record: &AppRecord) -> String {
    let display = DisplayRecord::from_record(record);
    let mut out = render_record(&display);
    if let Some(full) = record.description.as_deref() {
        if full != display.description {
            let _ = writeln!(out, "\n{full}");
        }
    }
    out
}

pub fn render_categories(categories: &[String]) -> String {
    let mut out = String::new();
    for category in categories {
        let _ = writeln!(out, "{category}");
    }
    out
}
