use crate::{
    client::{DbClient, Result},
    record::{CommentRecord, FullPostRecord, to_primitive},
};
use sqlx::{QueryBuilder, Sqlite, query, query_as, query_scalar};
use time::UtcDateTime;
use tracing::debug;
use yatube_common::{
    model::{
        Id,
        comment::{Comment, CommentMarker, CommentText},
        post::{Post, PostContent, PostFilter, PostMarker},
        user::UserMarker,
    },
    paginator::{POSTS_PER_PAGE, Page, Paginator},
};

const FULL_POST_SELECT: &str = "
    SELECT
        posts.post_id,
        posts.text,
        posts.pub_date,
        posts.image,
        users.user_id,
        users.handle,
        users.is_admin,
        post_groups.group_id,
        post_groups.title AS group_title,
        post_groups.slug AS group_slug,
        post_groups.description AS group_description
    FROM
        posts
        JOIN users ON users.user_id = posts.author_id
        LEFT JOIN post_groups ON post_groups.group_id = posts.group_id
";

fn push_post_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: PostFilter) {
    match filter {
        PostFilter::All => {}
        PostFilter::Group(group_id) => {
            builder
                .push(" WHERE posts.group_id = ")
                .push_bind(group_id.get());
        }
        PostFilter::Author(author_id) => {
            builder
                .push(" WHERE posts.author_id = ")
                .push_bind(author_id.get());
        }
        PostFilter::FollowedBy(user_id) => {
            builder
                .push(
                    " WHERE posts.author_id IN \
                    (SELECT follows.author_id FROM follows WHERE follows.user_id = ",
                )
                .push_bind(user_id.get())
                .push(")");
        }
    }
}

impl DbClient {
    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let mut builder = QueryBuilder::<Sqlite>::new(FULL_POST_SELECT);
        builder
            .push(" WHERE posts.post_id = ")
            .push_bind(post_id.get());

        let record = builder
            .build_query_as::<FullPostRecord>()
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    /// One page of the posts matching `filter`, newest first.
    ///
    /// `requested_page` is the raw page parameter of the request; it is
    /// clamped to the existing pages. Counting and slicing share a
    /// transaction so both see the same rows.
    pub async fn fetch_posts_page(
        &self,
        filter: PostFilter,
        requested_page: Option<&str>,
    ) -> Result<Page<Post>> {
        let mut transaction = self.pool.begin().await?;

        let mut count_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM posts");
        push_post_filter(&mut count_builder, filter);
        let count: i64 = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&mut *transaction)
            .await?;

        let paginator = Paginator::new(count.cast_unsigned(), POSTS_PER_PAGE);
        let number = paginator.page_number(requested_page);

        let mut builder = QueryBuilder::<Sqlite>::new(FULL_POST_SELECT);
        push_post_filter(&mut builder, filter);
        builder
            .push(" ORDER BY posts.pub_date DESC, posts.post_id DESC LIMIT ")
            .push_bind(paginator.per_page().cast_signed())
            .push(" OFFSET ")
            .push_bind(paginator.offset(number).cast_signed());

        let records = builder
            .build_query_as::<FullPostRecord>()
            .fetch_all(&mut *transaction)
            .await?;
        transaction.commit().await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(?filter, count, number, "Fetched page of posts");
        Ok(paginator.page(number, posts))
    }

    pub async fn create_post(
        &self,
        post: &PostContent,
        author: Id<UserMarker>,
    ) -> Result<Id<PostMarker>> {
        let post_id: i64 = query_scalar(
            "
            INSERT INTO posts (text, pub_date, author_id, group_id, image)
            VALUES (?, ?, ?, ?, ?)
            RETURNING post_id
            ",
        )
        .bind(post.text.get())
        .bind(to_primitive(UtcDateTime::now()))
        .bind(author.get())
        .bind(post.group.map(Id::get))
        .bind(post.image.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(post_id.into())
    }

    /// Replaces text, group and image. Author and date stay untouched.
    pub async fn update_post(&self, post_id: Id<PostMarker>, post: &PostContent) -> Result<bool> {
        let updated = query(
            "
            UPDATE posts
            SET text = ?, group_id = ?, image = ?
            WHERE post_id = ?
            ",
        )
        .bind(post.text.get())
        .bind(post.group.map(Id::get))
        .bind(post.image.as_deref())
        .bind(post_id.get())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    pub async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        text: &CommentText,
    ) -> Result<Id<CommentMarker>> {
        let comment_id: i64 = query_scalar(
            "
            INSERT INTO comments (post_id, author_id, text, pub_date)
            VALUES (?, ?, ?, ?)
            RETURNING comment_id
            ",
        )
        .bind(post_id.get())
        .bind(author.get())
        .bind(text.get())
        .bind(to_primitive(UtcDateTime::now()))
        .fetch_one(&self.pool)
        .await?;

        Ok(comment_id.into())
    }

    /// Comments of a post, oldest first.
    pub async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_id,
                comments.post_id,
                comments.text,
                comments.pub_date,
                users.user_id,
                users.handle,
                users.is_admin
            FROM
                comments
                JOIN users ON users.user_id = comments.author_id
            WHERE
                comments.post_id = ?
            ORDER BY
                comments.comment_id
            ",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use crate::client::{DbClient, tests::create_user};
    use yatube_common::model::{
        Id,
        comment::CommentText,
        group::{CreateGroup, GroupSlug, GroupTitle},
        post::{PostContent, PostFilter, PostText},
        user::UserMarker,
    };

    fn content(text: &str) -> PostContent {
        PostContent {
            text: PostText::new(text.to_owned()).unwrap(),
            ..PostContent::default()
        }
    }

    async fn create_posts(db: &DbClient, author: Id<UserMarker>, count: usize) {
        for i in 0..count {
            db.create_post(&content(&format!("Пост номер {i}")), author)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first() {
        let db = DbClient::in_memory().await.unwrap();
        let author = create_user(&db, "auth").await;
        let first = db.create_post(&content("first"), author.id).await.unwrap();
        let second = db.create_post(&content("second"), author.id).await.unwrap();

        let page = db.fetch_posts_page(PostFilter::All, None).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|post| post.id).collect();

        assert_eq!(ids, vec![second, first]);
        assert_eq!(page.items[0].author, author);
    }

    #[tokio::test]
    async fn pages_hold_at_most_ten_posts() {
        let db = DbClient::in_memory().await.unwrap();
        let author = create_user(&db, "TestUser").await;
        create_posts(&db, author.id, 13).await;

        let first = db.fetch_posts_page(PostFilter::All, None).await.unwrap();
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.num_pages, 2);
        assert!(first.has_next);

        let second = db
            .fetch_posts_page(PostFilter::Author(author.id), Some("2"))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 3);
        assert!(!second.has_next);

        let clamped = db
            .fetch_posts_page(PostFilter::All, Some("1000"))
            .await
            .unwrap();
        assert_eq!(clamped.number, 2);
        assert_eq!(clamped.items, second.items);
    }

    #[tokio::test]
    async fn filters_select_matching_posts() {
        let db = DbClient::in_memory().await.unwrap();
        let author = create_user(&db, "author").await;
        let other = create_user(&db, "other").await;
        let group = db
            .create_group(&CreateGroup {
                title: GroupTitle::new("Группа".to_owned()).unwrap(),
                slug: GroupSlug::new("group".to_owned()).unwrap(),
                description: "Описание".to_owned(),
            })
            .await
            .unwrap();

        let in_group = db
            .create_post(
                &PostContent {
                    group: Some(group.id),
                    ..content("in group")
                },
                author.id,
            )
            .await
            .unwrap();
        let by_other = db.create_post(&content("by other"), other.id).await.unwrap();

        let group_page = db
            .fetch_posts_page(PostFilter::Group(group.id), None)
            .await
            .unwrap();
        assert_eq!(group_page.count, 1);
        assert_eq!(group_page.items[0].id, in_group);
        assert_eq!(group_page.items[0].group.as_ref(), Some(&group));

        let author_page = db
            .fetch_posts_page(PostFilter::Author(other.id), None)
            .await
            .unwrap();
        assert_eq!(author_page.count, 1);
        assert_eq!(author_page.items[0].id, by_other);

        let feed = db
            .fetch_posts_page(PostFilter::FollowedBy(author.id), None)
            .await
            .unwrap();
        assert!(feed.items.is_empty());

        db.follow(author.id, other.id).await.unwrap();
        let feed = db
            .fetch_posts_page(PostFilter::FollowedBy(author.id), None)
            .await
            .unwrap();
        assert_eq!(feed.count, 1);
        assert_eq!(feed.items[0].id, by_other);
    }

    #[tokio::test]
    async fn editing_replaces_content() {
        let db = DbClient::in_memory().await.unwrap();
        let author = create_user(&db, "auth").await;
        let post_id = db.create_post(&content("before"), author.id).await.unwrap();

        let edited = PostContent {
            image: Some("posts/small.gif".to_owned()),
            ..content("after")
        };
        assert!(db.update_post(post_id, &edited).await.unwrap());
        assert!(!db.update_post(Id::new(9999), &edited).await.unwrap());

        let post = db.fetch_post(post_id).await.unwrap().unwrap();
        assert_eq!(post.text.get(), "after");
        assert_eq!(post.image.as_deref(), Some("posts/small.gif"));
        assert_eq!(post.author, author);
    }

    #[tokio::test]
    async fn comments_belong_to_their_post() {
        let db = DbClient::in_memory().await.unwrap();
        let author = create_user(&db, "author").await;
        let reader = create_user(&db, "reader").await;
        let post_id = db.create_post(&content("post"), author.id).await.unwrap();
        let other_post = db.create_post(&content("other"), author.id).await.unwrap();

        let text = CommentText::new("Тестовый комментарий".to_owned()).unwrap();
        let first = db.create_comment(post_id, reader.id, &text).await.unwrap();
        let second = db.create_comment(post_id, author.id, &text).await.unwrap();

        let comments = db.fetch_post_comments(post_id).await.unwrap();
        let ids: Vec<_> = comments.iter().map(|comment| comment.id).collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(comments[0].author, reader);
        assert!(db.fetch_post_comments(other_post).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn comments_need_an_existing_post() {
        let db = DbClient::in_memory().await.unwrap();
        let author = create_user(&db, "author").await;
        let text = CommentText::new("text".to_owned()).unwrap();

        assert!(db.create_comment(Id::new(42), author.id, &text).await.is_err());
    }

    #[tokio::test]
    async fn deleting_an_author_removes_their_posts_and_comments() {
        let db = DbClient::in_memory().await.unwrap();
        let author = create_user(&db, "author").await;
        let reader = create_user(&db, "reader").await;
        let post_id = db.create_post(&content("post"), author.id).await.unwrap();
        let reader_post = db.create_post(&content("reader"), reader.id).await.unwrap();
        let text = CommentText::new("text".to_owned()).unwrap();
        db.create_comment(reader_post, author.id, &text).await.unwrap();
        db.follow(reader.id, author.id).await.unwrap();

        assert!(db.delete_user(author.id).await.unwrap());

        assert!(db.fetch_post(post_id).await.unwrap().is_none());
        assert!(db.fetch_post_comments(reader_post).await.unwrap().is_empty());
        assert!(!db.is_following(reader.id, author.id).await.unwrap());
        assert!(db.fetch_post(reader_post).await.unwrap().is_some());
    }
}
