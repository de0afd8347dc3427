use crate::{
    client::{DbClient, Result},
    record::GroupRecord,
};
use sqlx::{query, query_as, query_scalar};
use tracing::debug;
use yatube_common::model::{
    Id,
    group::{CreateGroup, Group, GroupMarker, GroupSlug},
};

impl DbClient {
    pub async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT
                post_groups.group_id,
                post_groups.title,
                post_groups.slug,
                post_groups.description
            FROM
                post_groups
            WHERE
                post_groups.group_id = ?
            ",
        )
        .bind(group_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    pub async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT
                post_groups.group_id,
                post_groups.title,
                post_groups.slug,
                post_groups.description
            FROM
                post_groups
            WHERE
                post_groups.slug = ?
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    /// Every group, by title. These are the choices offered by the post form.
    pub async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT
                post_groups.group_id,
                post_groups.title,
                post_groups.slug,
                post_groups.description
            FROM
                post_groups
            ORDER BY
                post_groups.title, post_groups.group_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    pub async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let group_id: i64 = query_scalar(
            "
            INSERT INTO post_groups (title, slug, description)
            VALUES (?, ?, ?)
            RETURNING group_id
            ",
        )
        .bind(group.title.get())
        .bind(group.slug.get())
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await?;

        debug!(group_id, slug = %group.slug, "Created group");
        Ok(Group {
            id: group_id.into(),
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        })
    }

    /// Posts of a deleted group stay, without a group.
    pub async fn delete_group(&self, group_id: Id<GroupMarker>) -> Result<bool> {
        let deleted = query("DELETE FROM post_groups WHERE group_id = ?")
            .bind(group_id.get())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{DbClient, tests::create_user};
    use yatube_common::model::{
        group::{CreateGroup, GroupSlug, GroupTitle},
        post::{PostContent, PostFilter, PostText},
    };

    fn group(slug: &str) -> CreateGroup {
        CreateGroup {
            title: GroupTitle::new(format!("Группа {slug}")).unwrap(),
            slug: GroupSlug::new(slug.to_owned()).unwrap(),
            description: "Тестовое описание".to_owned(),
        }
    }

    #[tokio::test]
    async fn groups_by_id_and_slug() {
        let db = DbClient::in_memory().await.unwrap();
        let created = db.create_group(&group("test-slug")).await.unwrap();

        assert_eq!(db.fetch_group(created.id).await.unwrap(), Some(created.clone()));
        assert_eq!(
            db.fetch_group_by_slug(&created.slug).await.unwrap(),
            Some(created.clone())
        );
        assert_eq!(db.fetch_groups().await.unwrap(), vec![created]);
    }

    #[tokio::test]
    async fn slugs_are_unique() {
        let db = DbClient::in_memory().await.unwrap();
        db.create_group(&group("test-slug")).await.unwrap();

        let err = db.create_group(&group("test-slug")).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn deleting_a_group_keeps_its_posts() {
        let db = DbClient::in_memory().await.unwrap();
        let author = create_user(&db, "auth").await;
        let created = db.create_group(&group("test-slug")).await.unwrap();
        let post_id = db
            .create_post(
                &PostContent {
                    text: PostText::new("Тестовый пост".to_owned()).unwrap(),
                    group: Some(created.id),
                    image: None,
                },
                author.id,
            )
            .await
            .unwrap();

        assert!(db.delete_group(created.id).await.unwrap());

        let post = db.fetch_post(post_id).await.unwrap().unwrap();
        assert_eq!(post.group, None);
        let group_page = db
            .fetch_posts_page(PostFilter::Group(created.id), None)
            .await
            .unwrap();
        assert_eq!(group_page.count, 0);
    }
}
