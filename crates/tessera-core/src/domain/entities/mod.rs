//! Domain objects exposed by the DAOs.

mod access_requirement;
mod acl;
mod change;
mod node;
mod team;
mod user_group;
mod wiki;

pub use access_requirement::*;
pub use acl::*;
pub use change::*;
pub use node::*;
pub use team::*;
pub use user_group::*;
pub use wiki::*;
