// Job postings: creation from JSON or an uploaded PDF, listing and detail.
// Keywords are always re-derived from raw_text on write.

pub mod handlers;
pub mod service;
