//! Subscriber hash computation
//!
//! Mailchimp addresses list members by the MD5 digest of their email address,
//! so the writer can PUT/PATCH/DELETE a member without looking it up first.

/// Compute the subscriber hash for an email address
///
/// The digest is taken over the exact UTF-8 bytes; no case folding or trimming
/// happens here.
pub fn subscriber_hash(email: &str) -> String {
    format!("{:x}", md5::compute(email.as_bytes()))
}
