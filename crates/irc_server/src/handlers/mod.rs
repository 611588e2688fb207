//! Command handlers (§4.C7): one module per related group of IRC verbs.

pub mod channels;
pub mod messages;
pub mod oper;
pub mod query;
pub mod registration;
pub mod support;
