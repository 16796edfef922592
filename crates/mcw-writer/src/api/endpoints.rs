//! API endpoint path and URL builders
//!
//! Resource paths are relative to the API root so they can go straight into
//! batch operation descriptors; the `*_url` helpers join them to a base URL.

/// Build the Mailchimp API root for a data center
pub fn api_root(data_center: &str) -> String {
    format!("https://{}.api.mailchimp.com/3.0", data_center)
}

/// Path of the list collection
pub fn lists_path() -> String {
    "/lists".to_string()
}

/// Path of one list
pub fn list_path(list_id: &str) -> String {
    format!("/lists/{}", list_id)
}

/// Path of a list's merge-field collection
pub fn merge_fields_path(list_id: &str) -> String {
    format!("/lists/{}/merge-fields", list_id)
}

/// Path of one list member, addressed by subscriber hash
pub fn member_path(list_id: &str, subscriber_hash: &str) -> String {
    format!("/lists/{}/members/{}", list_id, subscriber_hash)
}

/// Build the API root URL used for credential checks
pub fn root_url(base_url: &str) -> String {
    format!("{}/", base_url.trim_end_matches('/'))
}

/// Build a URL for a relative resource path
pub fn resource_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Build batch collection URL
pub fn batches_url(base_url: &str) -> String {
    resource_url(base_url, "/batches")
}

/// Build single batch status URL
pub fn batch_url(base_url: &str, batch_id: &str) -> String {
    resource_url(base_url, &format!("/batches/{}", batch_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_root() {
        assert_eq!(api_root("us19"), "https://us19.api.mailchimp.com/3.0");
    }

    #[test]
    fn test_resource_paths() {
        assert_eq!(lists_path(), "/lists");
        assert_eq!(list_path("abc123"), "/lists/abc123");
        assert_eq!(merge_fields_path("abc123"), "/lists/abc123/merge-fields");
        assert_eq!(
            member_path("abc123", "a2a362ca5ce6dc7e069b6f7323342079"),
            "/lists/abc123/members/a2a362ca5ce6dc7e069b6f7323342079"
        );
    }

    #[test]
    fn test_urls_tolerate_trailing_slash() {
        assert_eq!(root_url("http://localhost:8080"), "http://localhost:8080/");
        assert_eq!(root_url("http://localhost:8080/"), "http://localhost:8080/");
        assert_eq!(
            resource_url("http://localhost:8080/", "/lists"),
            "http://localhost:8080/lists"
        );
        assert_eq!(batches_url("http://x"), "http://x/batches");
        assert_eq!(batch_url("http://x", "b1"), "http://x/batches/b1");
    }
}
