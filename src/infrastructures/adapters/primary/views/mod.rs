pub mod columns;
pub mod pages;
pub mod paths;
pub mod table;
