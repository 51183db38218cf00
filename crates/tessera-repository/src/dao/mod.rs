//! DAO (Data Access Object) layer.
//!
//! Each trait couples one domain object to its tables. Implementations live
//! under [`r#impl`], organized by technology.
//!
//! ```text
//! caller → Arc<dyn XxxDao> → SqliteXxxDaoImpl → SQLite
//! ```

pub mod access_approval_dao;
pub mod access_requirement_dao;
pub mod acl_dao;
pub mod change_dao;
pub mod group_members_dao;
pub mod r#impl;
pub mod node_dao;
pub mod principal_alias_dao;
pub mod team_dao;
pub mod user_group_dao;
pub mod wiki_page_dao;

pub use access_approval_dao::AccessApprovalDao;
pub use access_requirement_dao::AccessRequirementDao;
pub use acl_dao::AccessControlListDao;
pub use change_dao::ChangeDao;
pub use group_members_dao::GroupMembersDao;
pub use node_dao::NodeDao;
pub use principal_alias_dao::PrincipalAliasDao;
pub use r#impl::sqlite::*;
pub use team_dao::TeamDao;
pub use user_group_dao::UserGroupDao;
pub use wiki_page_dao::WikiPageDao;
