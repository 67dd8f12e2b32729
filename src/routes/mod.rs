pub mod pages;
pub mod service;
pub mod user;
pub mod vehicle;
