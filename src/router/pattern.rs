use std::collections::HashMap;

use regex::Regex;

/// A compiled route pattern such as `/users/:id/posts/:post_id`.
///
/// `:name` (letters, digits, underscore) matches one or more characters other
/// than `/` and binds the matched text to `name`. Everything else must match
/// literally, and the whole path must match.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    raw: String,
    regex: Regex,
    param_names: Vec<String>,
}

impl RoutePattern {
    pub fn new(pattern: &str) -> Self {
        let (regex, param_names) = Self::pattern_to_regex(pattern);
        Self {
            raw: pattern.to_string(),
            regex,
            param_names,
        }
    }

    fn pattern_to_regex(pattern: &str) -> (Regex, Vec<String>) {
        let mut source = String::with_capacity(pattern.len() + 16);
        source.push('^');
        let mut param_names = Vec::with_capacity(pattern.matches(':').count());

        let mut rest = pattern;
        while let Some(colon) = rest.find(':') {
            source.push_str(&regex::escape(&rest[..colon]));

            let after = &rest[colon + 1..];
            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());

            if name_len == 0 {
                // A lone ':' is literal text.
                source.push_str(&regex::escape(":"));
            } else {
                source.push_str("([^/]+)");
                param_names.push(after[..name_len].to_string());
            }
            rest = &after[name_len..];
        }
        source.push_str(&regex::escape(rest));
        source.push('$');

        // Every piece is escaped or a fixed group, so the source is always valid.
        let regex = Regex::new(&source).expect("route pattern compiles to a valid regex");
        (regex, param_names)
    }

    /// Matches `path` against the pattern and binds its parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(path)?;

        let mut params = HashMap::with_capacity(self.param_names.len());
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(value) = captures.get(i + 1) {
                params.insert(name.clone(), value.as_str().to_string());
            }
        }
        Some(params)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }
}
