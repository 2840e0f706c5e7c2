use serde::{Deserialize, Serialize};

/// Competition as seen by the attempt core: identity plus the catalog that judges answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompetitionEntity {
    /// Stable identifier for the competition.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Base URL of the catalog server hosting the puzzles.
    pub catalog_address: String,
    /// Catalog theme the competition draws its puzzles from.
    pub catalog_theme: String,
}

/// Group a user belongs to; copied into broadcast snapshots for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupEntity {
    /// Stable identifier for the group.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Participant with their group memberships.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier for the user, also used as the puzzle seed.
    pub id: String,
    /// Given name.
    pub firstname: String,
    /// Family name.
    pub lastname: String,
    /// Groups the user is a member of.
    #[serde(default)]
    pub groups: Vec<GroupEntity>,
}
