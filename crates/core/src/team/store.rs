//! Team storage trait.

use thiserror::Error;

use super::{
    CreateMemberRequest, CreateTeamRequest, Member, Team, UpdateMemberRequest, UpdateTeamRequest,
};

#[derive(Debug, Error)]
pub enum TeamError {
    #[error("Team not found: {0}")]
    TeamNotFound(i64),

    #[error("Member {member_id} not found in team {team_id}")]
    MemberNotFound { team_id: i64, member_id: i64 },

    #[error("Team name already taken: {0}")]
    Conflict(String),

    #[error("Invalid team data: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for team storage backends.
pub trait TeamStore: Send + Sync {
    fn create_team(&self, request: CreateTeamRequest) -> Result<Team, TeamError>;

    /// Get a team with its members.
    fn get_team(&self, id: i64) -> Result<Option<Team>, TeamError>;

    /// All teams with their members, ordered by name.
    fn list_teams(&self) -> Result<Vec<Team>, TeamError>;

    fn update_team(&self, id: i64, request: UpdateTeamRequest) -> Result<Team, TeamError>;

    /// Delete a team and its members, returning how many members were removed.
    fn delete_team(&self, id: i64) -> Result<usize, TeamError>;

    fn add_member(&self, team_id: i64, request: CreateMemberRequest) -> Result<Member, TeamError>;

    fn update_member(
        &self,
        team_id: i64,
        member_id: i64,
        request: UpdateMemberRequest,
    ) -> Result<Member, TeamError>;

    fn remove_member(&self, team_id: i64, member_id: i64) -> Result<(), TeamError>;
}
