//! Access token records, refresh credentials, and redacted secret material.

pub mod record;
pub mod refresh;
pub mod secret;
