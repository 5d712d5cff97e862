//! # treevault-auth
//!
//! Authorization for TreeVault path resources.
//!
//! - `acl::groups` - group membership providers and the caller's group set
//! - `acl::resolver` - permission resolution while building resource trees
//! - `acl::checker` - turning resolved bits into permission errors

pub mod acl;

pub use acl::{
    CachedGroupMembership, GroupMembershipProvider, GroupSet, PermissionChecker,
    PermissionTreeBuilder, StaticGroupMembership,
};
