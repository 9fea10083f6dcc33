//! Decide what to do with a request that reached the comment handler.

use axum::http::{HeaderMap, Method};
use bytes::Bytes;

use crate::config::model::CommentPolicy;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const POST_ID_FIELD: &str = "comment_post_ID";
const COMMENT_FIELD: &str = "comment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Path does not end with the configured suffix.
    NotFound,
    /// Forward once to the pass-through origin, untouched.
    PassThrough,
    /// Primary write awaited, secondary write queued.
    DualWrite,
}

/// `GET` and `HEAD` carry no body; anything else is buffered in full.
#[must_use]
pub fn carries_body(method: &Method) -> bool {
    *method != Method::GET && *method != Method::HEAD
}

/// A form-encoded body that names both a post and the comment text.
///
/// Form decoding is lossy and never fails, so a garbled body simply lacks
/// the fields and is not a comment.
#[must_use]
pub fn is_comment_submission(headers: &HeaderMap, body: Option<&Bytes>) -> bool {
    let is_form = headers
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains(FORM_CONTENT_TYPE));
    let Some(body) = body.filter(|_| is_form) else {
        return false;
    };

    let mut has_post_id = false;
    let mut has_comment = false;
    for (key, _) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            POST_ID_FIELD => has_post_id = true,
            COMMENT_FIELD => has_comment = true,
            _ => {}
        }
    }
    has_post_id && has_comment
}

#[must_use]
pub fn classify(
    policy: CommentPolicy,
    path_suffix: &str,
    path: &str,
    headers: &HeaderMap,
    body: Option<&Bytes>,
) -> Disposition {
    if !path.ends_with(path_suffix) {
        return Disposition::NotFound;
    }

    match policy {
        CommentPolicy::DuplicateAll => Disposition::DualWrite,
        CommentPolicy::ContentAware if is_comment_submission(headers, body) => {
            Disposition::DualWrite
        }
        CommentPolicy::ContentAware => Disposition::PassThrough,
    }
}
