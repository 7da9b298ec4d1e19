pub mod external_apis;
pub mod session_store;
