//! Dashboard module
//!
//! Provides the wall-display page with one panel per record kind, and the
//! list fragments the page reloads when filters change or new data arrives.
//! Search and tag filters are applied on the server.

mod cards;
mod filter;
mod grouping;
mod handlers;

pub use handlers::{get_dashboard_page, get_panel_list, post_visibility};
