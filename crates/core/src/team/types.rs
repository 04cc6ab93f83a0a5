use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role of a member within a support team.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Lead,
    Engineer,
    Analyst,
    Support,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown member role: {0}")]
pub struct UnknownMemberRole(pub String);

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Lead => "lead",
            MemberRole::Engineer => "engineer",
            MemberRole::Analyst => "analyst",
            MemberRole::Support => "support",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberRole {
    type Err = UnknownMemberRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lead" => Ok(MemberRole::Lead),
            "engineer" => Ok(MemberRole::Engineer),
            "analyst" => Ok(MemberRole::Analyst),
            "support" => Ok(MemberRole::Support),
            _ => Err(UnknownMemberRole(s.to_string())),
        }
    }
}

/// A support team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Ordered by member id.
    pub members: Vec<Member>,
}

/// A team member. Members are contact entries, not dashboard accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: i64,
    pub team_id: i64,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CreateTeamRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTeamRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMemberRequest {
    pub name: String,
    pub email: String,
    pub role: MemberRole,
}

impl CreateMemberRequest {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: MemberRole) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMemberRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<MemberRole>,
}
