//! Auth-domain identifiers, accounts, identity payloads, scope sets, and token models.

pub mod account;
pub mod claims;
pub mod id;
pub mod scope;
pub mod token;

pub use account::*;
pub use claims::*;
pub use id::*;
pub use scope::*;
pub use token::{record::*, refresh::*, secret::*};
