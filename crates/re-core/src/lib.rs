//! rate-everything/crates/re-core/src/lib.rs
//!
//! Domain models, the document-store port, and error types shared by the
//! RateEverything services and store plugins.

pub mod document;
pub mod error;
pub mod live;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use document::*;
pub use error::*;
pub use live::*;
pub use models::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;

    fn rating(id: &str, value: u8) -> Rating {
        Rating {
            id: id.to_string(),
            item_id: "42".to_string(),
            rating: value,
            review: None,
            user_id: format!("user-{id}"),
            timestamp: chrono::Utc::now(),
            user_name: None,
            user_email: None,
        }
    }

    #[test]
    fn stats_of_no_ratings_are_zero() {
        let stats = ItemStats::from_ratings(Vec::new());
        assert_eq!(stats.total_ratings, 0);
        assert_eq!(stats.average_rating, 0.0);
        assert!(stats.ratings.is_empty());
    }

    #[test]
    fn stats_average_is_unrounded_mean() {
        let stats = ItemStats::from_ratings(vec![rating("a", 5), rating("b", 4), rating("c", 4)]);
        assert_eq!(stats.total_ratings, 3);
        assert!((stats.average_rating - 13.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.ratings["b"].rating, 4);
    }
}
