//! Raw question payload as returned by the question endpoint.

use serde::{Deserialize, Deserializer, Serialize};

/// One topic tag attached to a question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicTag {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub slug: String,
}

/// The fetch result for one identifier.
///
/// Every field defaults when absent or `null`; `stats` and
/// `similar_questions` are JSON documents encoded as strings and are decoded
/// later by [`crate::record::RecordBuilder`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawPayload {
    #[serde(deserialize_with = "null_as_default")]
    pub question_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub question_frontend_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title_slug: String,
    #[serde(deserialize_with = "null_as_default")]
    pub difficulty: String,
    /// Statement HTML. Empty for paid-only questions.
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(deserialize_with = "null_as_default")]
    pub topic_tags: Vec<TopicTag>,
    #[serde(deserialize_with = "null_as_default")]
    pub stats: String,
    #[serde(deserialize_with = "null_as_default")]
    pub similar_questions: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hints: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub category_title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_paid_only: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
