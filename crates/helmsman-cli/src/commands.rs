//! Command handlers grouped by concern.

pub(crate) mod list;
pub(crate) mod options;
pub(crate) mod remove;
pub(crate) mod show;
pub(crate) mod whoami;
