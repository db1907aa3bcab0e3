//! `publish=<bool>` marker parsing.
//!
//! Catalog comments are free text. A marker is the first `publish` token
//! followed by `=` and a value, matched case-insensitively and with optional
//! whitespace around `=`. The value ends at whitespace, `&`, `;` or `,`, so
//! url-encoded comments such as `publish=true&title=Roads` work too.

use martin_config_core::PublishDirective;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bpublish\s*=\s*("[^"]*"|'[^']*'|[^\s&;,]*)"#)
        .expect("marker pattern is valid")
});

const TRUE_LITERALS: &[&str] = &["true", "t", "yes", "y", "on", "1"];
const FALSE_LITERALS: &[&str] = &["false", "f", "no", "n", "off", "0"];

/// Result of parsing one comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMarker {
    pub directive: PublishDirective,
    /// Value of a `publish=` token that is not a boolean literal.
    pub malformed_value: Option<String>,
}

impl ParsedMarker {
    fn unmarked() -> Self {
        Self {
            directive: PublishDirective::Unmarked,
            malformed_value: None,
        }
    }
}

/// A `publish=` token whose value could not be read. The object is treated
/// as unmarked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerWarning {
    /// `schema.table` or `schema.table.column`.
    pub object: String,
    pub value: String,
}

impl fmt::Display for MarkerWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed publish marker on {}: '{}' is not a boolean, treating as unmarked",
            self.object, self.value
        )
    }
}

/// Parse the publish directive out of an optional comment.
///
/// Only the first `publish=` token counts. An unreadable value degrades to
/// [`PublishDirective::Unmarked`] and is reported through `malformed_value`.
pub fn parse_marker(comment: Option<&str>) -> ParsedMarker {
    let Some(comment) = comment.filter(|c| !c.trim().is_empty()) else {
        return ParsedMarker::unmarked();
    };

    let Some(caps) = MARKER_RE.captures(comment) else {
        return ParsedMarker::unmarked();
    };

    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let value = raw.trim_matches(|c| c == '"' || c == '\'').trim();

    match parse_bool_literal(value) {
        Some(v) => ParsedMarker {
            directive: PublishDirective::Marked(v),
            malformed_value: None,
        },
        None => ParsedMarker {
            directive: PublishDirective::Unmarked,
            malformed_value: Some(raw.to_string()),
        },
    }
}

fn parse_bool_literal(value: &str) -> Option<bool> {
    let lowered = value.to_ascii_lowercase();
    if TRUE_LITERALS.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSE_LITERALS.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(comment: &str) -> PublishDirective {
        parse_marker(Some(comment)).directive
    }

    #[test]
    fn test_absent_or_empty_comment() {
        assert_eq!(parse_marker(None), ParsedMarker::unmarked());
        assert_eq!(parse_marker(Some("")), ParsedMarker::unmarked());
        assert_eq!(parse_marker(Some("   \n")), ParsedMarker::unmarked());
    }

    #[test]
    fn test_comments_without_marker() {
        for comment in [
            "Road network, updated weekly",
            "publish",
            "publishing=true",
            "republish=true",
            "do not publish",
            "title=Roads&source=osm",
        ] {
            assert_eq!(directive(comment), PublishDirective::Unmarked, "{comment}");
        }
    }

    #[test]
    fn test_true_variants() {
        for comment in [
            "publish=true",
            "publish = True",
            "PUBLISH=true",
            "Publish= TRUE",
            "publish =\ttrue",
            "publish=yes",
            "publish=1",
            "publish='true'",
            "publish=\"True\"",
            "Admin boundaries. publish=true",
            "title=Roads&publish=True&source=osm",
        ] {
            assert_eq!(directive(comment), PublishDirective::Marked(true), "{comment}");
        }
    }

    #[test]
    fn test_false_variants() {
        for comment in [
            "publish=false",
            "publish = False",
            "PUBLISH=FALSE",
            "Publish= false ",
            "publish=no",
            "publish=0",
            "internal;publish=off;",
        ] {
            assert_eq!(directive(comment), PublishDirective::Marked(false), "{comment}");
        }
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(
            directive("publish=false and later publish=true"),
            PublishDirective::Marked(false)
        );
        assert_eq!(
            directive("publish=true&publish=false"),
            PublishDirective::Marked(true)
        );
    }

    #[test]
    fn test_malformed_value_degrades_to_unmarked() {
        let parsed = parse_marker(Some("publish=maybe"));
        assert_eq!(parsed.directive, PublishDirective::Unmarked);
        assert_eq!(parsed.malformed_value.as_deref(), Some("maybe"));

        let parsed = parse_marker(Some("publish="));
        assert_eq!(parsed.directive, PublishDirective::Unmarked);
        assert_eq!(parsed.malformed_value.as_deref(), Some(""));
    }

    #[test]
    fn test_malformed_first_token_is_not_skipped() {
        let parsed = parse_marker(Some("publish=tru publish=true"));
        assert_eq!(parsed.directive, PublishDirective::Unmarked);
        assert_eq!(parsed.malformed_value.as_deref(), Some("tru"));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let comment = Some("Publish = TRUE");
        assert_eq!(parse_marker(comment), parse_marker(comment));
    }

    #[test]
    fn test_warning_display() {
        let w = MarkerWarning {
            object: "public.roads".to_string(),
            value: "maybe".to_string(),
        };
        assert!(w.to_string().contains("public.roads"));
        assert!(w.to_string().contains("'maybe'"));
    }
}
