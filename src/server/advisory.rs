//! Auth-required advisory wrapping (§4.H step 4, §6).

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::auth::AuthRequiredInfo;
use crate::config;
use crate::protocol::Content;

/// Appends an advisory text block and attaches the structured
/// `AuthRequiredInfo` list under the namespaced metadata key. A no-op
/// when the poller's cache is empty.
pub fn wrap_with_advisory(mut content: Vec<Content>, poller_cache: &[AuthRequiredInfo]) -> (Vec<Content>, Option<Value>) {
    if poller_cache.is_empty() {
        return (content, None);
    }

    let mut body = String::from("Authentication Required:\n");
    for info in poller_cache {
        body.push_str(&format!(
            "- {}: call 'core_auth_login' with server='{}' to sign in\n",
            info.server, info.server
        ));
    }
    if shares_an_issuer(poller_cache) {
        body.push_str(
            "Note: these servers share the same identity provider; signing in to one may authenticate the others via SSO.\n",
        );
    }

    content.push(Content::text(body));

    let metadata = json!(poller_cache);
    (content, Some(metadata))
}

fn shares_an_issuer(entries: &[AuthRequiredInfo]) -> bool {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.issuer.as_str()).or_insert(0) += 1;
    }
    counts.values().any(|&count| count >= 2)
}

/// The metadata key under which the advisory list travels (§6).
pub fn metadata_key() -> &'static str {
    config::AUTH_METADATA_KEY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(server: &str, issuer: &str) -> AuthRequiredInfo {
        AuthRequiredInfo {
            server: server.to_string(),
            issuer: issuer.to_string(),
            scope: None,
            auth_tool_name: format!("x_{server}_auth"),
        }
    }

    #[test]
    fn empty_cache_is_a_no_op() {
        let (content, metadata) = wrap_with_advisory(vec![Content::text("ok")], &[]);
        assert_eq!(content.len(), 1);
        assert!(metadata.is_none());
    }

    #[test]
    fn shared_issuer_adds_sso_note_and_metadata() {
        let cache = vec![
            info("gitlab", "https://idp.example/"),
            info("jira", "https://idp.example/"),
        ];
        let (content, metadata) = wrap_with_advisory(vec![Content::text("ok")], &cache);
        let text = content
            .iter()
            .find_map(|c| c.as_text())
            .expect("advisory text present");
        assert!(text.contains("gitlab"));
        assert!(text.contains("jira"));
        assert!(text.contains("identity provider"));

        let metadata = metadata.expect("metadata present");
        assert_eq!(metadata.as_array().unwrap().len(), 2);
    }
}
