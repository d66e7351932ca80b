//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod codes;
pub mod health;
pub mod redirect;

pub use codes::{
    add_sub_code_handler, deactivate_code_handler, delete_chapter_codes_handler,
    issue_chapter_codes_handler, list_chapter_codes_handler, list_children_handler,
    shorten_url_handler,
};
pub use health::health_handler;
pub use redirect::{missing_code_handler, scan_handler, short_url_handler};
