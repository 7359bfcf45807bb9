pub mod backend;
pub mod favorites;
pub mod identity;
pub mod providers;
pub mod sanitize;

pub use favorites::{FavoritesSynchronizer, FavoritesView, LoadState, ToggleOutcome};
