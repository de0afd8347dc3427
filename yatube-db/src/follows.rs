use crate::client::{DbClient, Result};
use sqlx::{query, query_scalar};
use tracing::debug;
use yatube_common::model::{
    Id,
    follow::{Follow, FollowOutcome},
    user::UserMarker,
};

impl DbClient {
    /// Subscribes `user` to `author`. Following oneself or an author that is
    /// already followed changes nothing.
    pub async fn follow(
        &self,
        user: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<FollowOutcome> {
        let follow = Follow::new(user, author);
        if follow.is_self_follow() {
            return Ok(FollowOutcome::SelfFollow);
        }

        let inserted = query(
            "
            INSERT INTO follows (user_id, author_id)
            VALUES (?, ?)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(follow.user.get())
        .bind(follow.author.get())
        .execute(&self.pool)
        .await?
        .rows_affected();

        let outcome = if inserted == 0 {
            FollowOutcome::AlreadyFollowing
        } else {
            FollowOutcome::Created
        };
        debug!(%user, %author, ?outcome, "Processed follow");
        Ok(outcome)
    }

    /// Returns whether an edge was removed.
    pub async fn unfollow(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let deleted = query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user.get())
            .bind(author.get())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    pub async fn is_following(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let following: i64 = query_scalar(
            "
            SELECT EXISTS (
                SELECT 1 FROM follows WHERE user_id = ? AND author_id = ?
            )
            ",
        )
        .bind(user.get())
        .bind(author.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(following != 0)
    }
}
