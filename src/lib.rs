pub mod adapters;
pub mod app;
pub mod domain;
pub mod test_support;
