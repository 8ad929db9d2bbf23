pub mod permission;
pub mod role;
pub mod user;
pub mod video;

pub use permission::{NewPermission, Permission};
pub use role::{NewRole, Role, RoleChanges, RoleStatus};
pub use user::{NewUser, PublicUser, UserChanges, UserRecord};
pub use video::{NewVideo, Video};
