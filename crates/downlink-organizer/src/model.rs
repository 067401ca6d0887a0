//! Domain models for the media organizer.
//!
//! # Design
//! - Keep request types lightweight and copyable.
//! - Avoid embedding IO handles; callers supply references.

use downlink_data::Category;

/// Where a completed download's file should land inside a library.
#[derive(Debug, Clone)]
pub struct Placement<'a> {
    /// Media classification; picks the top-level `Movies`/`Series`/`Other` directory.
    pub category: Category,
    /// Display title; becomes (sanitized) the title directory.
    pub title: &'a str,
    /// Season number, TV only. Defaults to `1` when absent (§6).
    pub season: Option<i64>,
    /// Episode number, TV only. Defaults to `1` when absent (§6).
    pub episode: Option<i64>,
}
