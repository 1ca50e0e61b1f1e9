pub mod pages;
pub mod priority;
