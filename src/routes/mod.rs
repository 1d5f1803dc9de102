pub mod auth;
pub mod categories;
pub mod home;
pub mod pages;
pub mod search;
