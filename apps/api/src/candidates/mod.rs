// Candidate records: one per (email, job). Submissions are scored and then
// merged into the existing record or inserted, under a per-key lock.

pub mod handlers;
pub mod merge;
pub mod queries;
pub mod submit;
