//! Gateway-only middleware.  Authentication, tracing and CORS come from
//! `graphchat-app-core`.

pub mod admission;
