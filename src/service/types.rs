use serde::{Deserialize, Deserializer, Serialize};

/// Faucet-side user record
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,

    #[serde(default)]
    pub username: Option<String>,

    /// Sent as `0`/`1` by the faucet service, `true`/`false` also accepted
    #[serde(default, deserialize_with = "flag")]
    pub claimed: bool,
}

impl User {
    pub fn new(id: u64, claimed: bool) -> Self {
        Self {
            id,
            username: None,
            claimed,
        }
    }
}

/// Response to `PATCH /claim/{userId}/{publicKey}`
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClaimSubmitResult {
    /// A response without any marker counts as a rejection
    #[serde(default, alias = "status", deserialize_with = "flag")]
    pub accepted: bool,

    #[serde(default)]
    pub user: Option<User>,

    #[serde(default, alias = "text")]
    pub message: Option<String>,
}

impl ClaimSubmitResult {
    pub fn accepted(user: User) -> Self {
        Self {
            accepted: true,
            user: Some(user),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            user: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Number(i64),
    Null(()),
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Number(value) => value != 0,
        Flag::Null(()) => false,
    })
}
