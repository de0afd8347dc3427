use crate::{
    model::{
        Id,
        form::{FormErrors, REQUIRED_FIELD},
        group::{Group, GroupMarker},
        user::{User, UserMarker},
    },
    util::{has_content, truncate_chars},
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::OffsetDateTime;

/// Number of characters a post shows when printed on its own.
pub const POST_PREVIEW_LEN: usize = 15;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: PostText,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub author: User,
    pub group: Option<Group>,
    pub image: Option<String>,
}

impl Post {
    #[must_use]
    pub fn preview(&self) -> &str {
        truncate_chars(self.text.get(), POST_PREVIEW_LEN)
    }
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.preview())
    }
}

/// The author-controlled part of a post, shared by creation and editing.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub text: PostText,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostForm {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub group: Option<Id<GroupMarker>>,
    #[serde(default)]
    pub image: Option<String>,
}

impl PostForm {
    /// Checks the fields that need no lookup. The group still has to be
    /// checked against the stored groups.
    pub fn validate(self) -> Result<PostContent, FormErrors> {
        let text = PostText::new(self.text)
            .map_err(|_| FormErrors::single("text", REQUIRED_FIELD))?;
        let image = self.image.filter(|image| has_content(image));

        Ok(PostContent {
            text,
            group: self.group,
            image,
        })
    }
}

impl From<&Post> for PostForm {
    fn from(post: &Post) -> Self {
        Self {
            text: post.text.get().to_owned(),
            group: post.group.as_ref().map(|group| group.id),
            image: post.image.clone(),
        }
    }
}

/// Which posts a listing shows. Every listing is ordered newest first.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    /// Posts by every author the given user follows.
    FollowedBy(Id<UserMarker>),
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct PostText(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The post text is empty")]
pub struct InvalidPostTextError(String);

impl PostText {
    pub fn new(text: String) -> Result<Self, InvalidPostTextError> {
        if has_content(&text) {
            Ok(Self(text))
        } else {
            Err(InvalidPostTextError(text))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PostText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        PostText::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"PostText"))
    }
}
