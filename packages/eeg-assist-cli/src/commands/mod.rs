pub mod batch;
pub mod classify;
pub mod info;
pub mod report;
pub mod validate;
