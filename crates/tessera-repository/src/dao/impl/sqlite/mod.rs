//! SQLite DAO implementations.

mod access_approval_dao_impl;
mod access_requirement_dao_impl;
mod acl_dao_impl;
mod change_dao_impl;
mod group_members_dao_impl;
mod node_dao_impl;
mod principal_alias_dao_impl;
mod support;
mod team_dao_impl;
mod user_group_dao_impl;
mod wiki_page_dao_impl;

pub use access_approval_dao_impl::SqliteAccessApprovalDaoImpl;
pub use access_requirement_dao_impl::SqliteAccessRequirementDaoImpl;
pub use acl_dao_impl::SqliteAccessControlListDaoImpl;
pub use change_dao_impl::SqliteChangeDaoImpl;
pub use group_members_dao_impl::SqliteGroupMembersDaoImpl;
pub use node_dao_impl::SqliteNodeDaoImpl;
pub use principal_alias_dao_impl::SqlitePrincipalAliasDaoImpl;
pub use team_dao_impl::SqliteTeamDaoImpl;
pub use user_group_dao_impl::SqliteUserGroupDaoImpl;
pub use wiki_page_dao_impl::SqliteWikiPageDaoImpl;

pub(crate) use change_dao_impl::record_change;
