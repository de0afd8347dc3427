//! Directed subscriptions from a reader to an author.

use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
pub struct Follow {
    pub user: Id<UserMarker>,
    pub author: Id<UserMarker>,
}

impl Follow {
    #[must_use]
    pub fn new(user: Id<UserMarker>, author: Id<UserMarker>) -> Self {
        Self { user, author }
    }

    /// Following oneself is never stored.
    #[must_use]
    pub fn is_self_follow(self) -> bool {
        self.user == self.author
    }
}

/// What a subscribe request ended up doing.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
pub enum FollowOutcome {
    Created,
    AlreadyFollowing,
    SelfFollow,
}
