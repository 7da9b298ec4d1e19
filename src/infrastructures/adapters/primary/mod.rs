pub mod errors;
pub mod route_gate;
pub mod session_cookie;
pub mod views;
pub mod web;
