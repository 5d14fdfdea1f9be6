//! Permissions: the catalog of known API permissions, feature availability,
//! permission sets and the warnings they produce.

pub mod catalog;
pub mod features;
pub mod messages;
pub mod set;

pub use catalog::{
    ApiPermission, PermissionCheck, PermissionFlags, PermissionInfo, SocketOperation, SocketRule,
};
pub use features::{
    Availability, Channel, FeatureContext, FeatureProvider, FeatureTable, SimpleFeature,
    UnavailableReason,
};
pub use messages::{PermissionMessage, PermissionMessageId};
pub use set::{ApiPermissionSet, PermissionSet};
