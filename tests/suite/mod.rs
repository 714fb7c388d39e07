//! Engine scenario tests, grouped by concern.

mod capability;
mod hydration;
mod qa_session;
mod sync;
