//! Host and path based routing.
//!
//! [`Rule`] is the matching predicate, [`ServiceEndpoint`] the backend it
//! points at, [`RouteTable`] the live set of bindings, and
//! [`matcher::best_match`] the most-specific-wins selection over a
//! [`RouteSnapshot`].

pub mod endpoint;
pub mod matcher;
pub mod rule;
pub mod table;

pub use endpoint::ServiceEndpoint;
pub use rule::{HostPattern, Rule, Specificity};
pub use table::{Binding, RouteSnapshot, RouteTable};
