use crate::{Uuid, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn stub() -> UserId {
        UserId(STUB_UUID)
    }
}

/// Public display attributes of a comment's author
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub image: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum Role {
    Member,
    Admin,
    Director,
}

/// The signed-in user, as supplied by the authentication context
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Session {
    pub user: Author,
    pub roles: Vec<Role>,
}

impl Session {
    pub fn new(user: Author) -> Session {
        Session {
            user,
            roles: vec![Role::Member],
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn is_moderator(&self) -> bool {
        self.roles
            .iter()
            .any(|r| matches!(r, Role::Admin | Role::Director))
    }

    /// Authors may delete their comments, moderators may delete any
    pub fn can_delete(&self, author: &UserId) -> bool {
        self.user.id == *author || self.is_moderator()
    }
}
