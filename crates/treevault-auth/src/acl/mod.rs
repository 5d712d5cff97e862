//! Group-based access control with ancestor inheritance.

pub mod checker;
pub mod groups;
pub mod resolver;

pub use checker::PermissionChecker;
pub use groups::{CachedGroupMembership, GroupMembershipProvider, GroupSet, StaticGroupMembership};
pub use resolver::PermissionTreeBuilder;
