pub mod repository;
pub mod run;
pub mod session;
