pub mod operation_tracker;
pub mod query_cache;
pub mod use_cases;
pub mod viewer_registry;
