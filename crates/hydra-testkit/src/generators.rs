//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use hydra_core::{Blake3Hash, Post, PostId};

/// Generate a random PostId.
pub fn post_id() -> impl Strategy<Value = PostId> {
    any::<[u8; 32]>().prop_map(PostId::from_bytes)
}

/// Generate a random Blake3Hash.
pub fn blake3_hash() -> impl Strategy<Value = Blake3Hash> {
    any::<[u8; 32]>().prop_map(Blake3Hash::from_bytes)
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=1_800_000_000_000i64
}

/// Generate content bytes of specified max length.
pub fn content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a subject line.
pub fn subject() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ,.!?-]{0,64}".prop_map(String::from)
}

/// Generate a mime type.
pub fn mime_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("text/plain".to_string()),
        Just("application/octet-stream".to_string()),
        Just("image/png".to_string()),
        "[a-z]{1,10}/[a-z0-9.+-]{1,20}".prop_map(String::from),
    ]
}

/// Parameters for generating a post.
#[derive(Debug, Clone)]
pub struct PostParams {
    pub subject: String,
    pub timestamp: i64,
    pub parent_id: Option<PostId>,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl Arbitrary for PostParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            subject(),
            timestamp(),
            any::<Option<[u8; 32]>>(),
            mime_type(),
            content(4096),
        )
            .prop_map(|(subject, timestamp, parent, mime_type, content)| PostParams {
                subject,
                timestamp,
                parent_id: parent.map(PostId::from_bytes),
                mime_type,
                content,
            })
            .boxed()
    }
}

/// Build a post from parameters.
pub fn post_from_params(params: &PostParams) -> Post {
    Post::builder(params.subject.clone())
        .timestamp(params.timestamp)
        .parent_opt(params.parent_id)
        .mime_type(params.mime_type.clone())
        .data(Bytes::from(params.content.clone()))
        .build()
        .expect("generated post")
}
