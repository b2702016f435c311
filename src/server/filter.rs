//! `filter_tools` wildcard matching (§4.H).
//!
//! `*` at either end, both ends, or interior positions; each non-empty
//! segment between stars must appear in order (AND of parts). Combines
//! conjunctively with an optional description filter; case sensitivity
//! is opt-in.

use crate::protocol::Tool;

/// Splits a pattern on `*` and checks that every non-empty part occurs,
/// in order, within `haystack`. An empty pattern or bare `"*"` matches
/// everything.
fn wildcard_matches(pattern: &str, haystack: &str) -> bool {
    if pattern.is_empty() || pattern == "*" {
        return true;
    }

    let parts: Vec<&str> = pattern.split('*').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        return true;
    }

    let mut cursor = 0usize;
    for (i, part) in parts.iter().enumerate() {
        let Some(found) = haystack[cursor..].find(part) else {
            return false;
        };
        let absolute = cursor + found;

        if i == 0 && !pattern.starts_with('*') && absolute != 0 {
            return false;
        }

        cursor = absolute + part.len();
    }

    if !pattern.ends_with('*') && cursor != haystack.len() {
        return false;
    }

    true
}

pub struct FilterOptions<'a> {
    pub pattern: Option<&'a str>,
    pub description_filter: Option<&'a str>,
    pub case_sensitive: bool,
}

impl<'a> Default for FilterOptions<'a> {
    fn default() -> Self {
        Self {
            pattern: None,
            description_filter: None,
            case_sensitive: false,
        }
    }
}

pub fn filter_tools(tools: &[Tool], options: &FilterOptions) -> Vec<Tool> {
    tools
        .iter()
        .filter(|tool| {
            let name = normalize(&tool.name, options.case_sensitive);
            let pattern_matches = match options.pattern {
                Some(pattern) => wildcard_matches(&normalize(pattern, options.case_sensitive), &name),
                None => true,
            };
            if !pattern_matches {
                return false;
            }

            match options.description_filter {
                Some(filter) => {
                    let description = tool
                        .description
                        .as_deref()
                        .map(|d| normalize(d, options.case_sensitive))
                        .unwrap_or_default();
                    wildcard_matches(&normalize(filter, options.case_sensitive), &description)
                }
                None => true,
            }
        })
        .cloned()
        .collect()
}

fn normalize(s: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        s.to_string()
    } else {
        s.to_lowercase()
    }
}

/// `list_core_tools` is exactly `filter_tools` with pattern `core*`.
pub fn list_core_tools(tools: &[Tool]) -> Vec<Tool> {
    filter_tools(
        tools,
        &FilterOptions {
            pattern: Some("core*"),
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            description: None,
            input_schema: serde_json::json!({}),
        }
    }

    #[test]
    fn empty_pattern_returns_all() {
        let tools = vec![tool("a"), tool("b")];
        let result = filter_tools(&tools, &FilterOptions::default());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn star_alone_returns_all() {
        let tools = vec![tool("a"), tool("b")];
        let options = FilterOptions {
            pattern: Some("*"),
            ..Default::default()
        };
        assert_eq!(filter_tools(&tools, &options).len(), 2);
    }

    #[test]
    fn interior_stars_match_a_then_b_in_order() {
        let tools = vec![
            tool("abc"),
            tool("a_middle_b"),
            tool("bca"),
            tool("ba"),
        ];
        let options = FilterOptions {
            pattern: Some("*a*b*"),
            ..Default::default()
        };
        let matched: Vec<&str> = filter_tools(&tools, &options)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(matched, vec!["abc", "a_middle_b"]);
    }

    #[test]
    fn exact_match_without_stars_requires_full_equality() {
        let tools = vec![tool("core_list"), tool("core_list_extra")];
        let options = FilterOptions {
            pattern: Some("core_list"),
            ..Default::default()
        };
        let matched: Vec<&str> = filter_tools(&tools, &options)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(matched, vec!["core_list"]);
    }

    #[test]
    fn list_core_tools_is_filter_tools_with_core_star() {
        let tools = vec![tool("core_login"), tool("other_tool")];
        let matched = list_core_tools(&tools);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "core_login");
    }
}
