// Election data: read-only access to results, polls and candidates,
// and the conversion of those rows into prompt context.

pub mod context;
pub mod models;
pub mod repository;
