//! Support teams and their members.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTeamStore;
pub use store::{TeamError, TeamStore};
pub use types::{
    CreateMemberRequest, CreateTeamRequest, Member, MemberRole, Team, UnknownMemberRole,
    UpdateMemberRequest, UpdateTeamRequest,
};
