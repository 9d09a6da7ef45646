//! Submission endpoint resolution
//!
//! Each strategy is a pure function from the page to an optional endpoint.
//! They run in a fixed order and the first hit wins; a page with no
//! recognisable endpoint yields `None`, which the controller treats as a
//! structured abort rather than an error.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

static ABSOLUTE_SUBMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s"'<>]+/submit[^\s"'<>]*"#).expect("valid absolute submit pattern")
});

static RELATIVE_SUBMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[\s"'=(>:])(/submit[^\s"'<>]*)"#).expect("valid relative submit pattern")
});

static ORIGIN_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<[a-z][a-z0-9]*\b[^>]*\b(?:class|id)\s*=\s*["'][^"']*origin[^"']*["'][^>]*>\s*(https?://[^\s"'<>]+)\s*<"#,
    )
    .expect("valid origin element pattern")
});

const SENTENCE_PUNCTUATION: [char; 4] = ['.', ',', ';', ':'];

/// What a strategy gets to look at
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    pub markup: &'a str,
    pub text: &'a str,
    pub page_url: &'a str,
}

type Strategy = fn(&PageView<'_>) -> Option<String>;

/// Strategies in priority order
const STRATEGIES: &[(&str, Strategy)] = &[
    ("absolute", absolute_match),
    ("split_origin", split_origin_match),
    ("relative", relative_match),
];

/// Finds the endpoint a page wants its answer posted to
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmitUrlResolver;

impl SubmitUrlResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, markup: &str, text: &str, page_url: &str) -> Option<String> {
        let view = PageView {
            markup,
            text,
            page_url,
        };

        STRATEGIES.iter().find_map(|(name, strategy)| {
            let found = strategy(&view)?;
            debug!(strategy = *name, endpoint = %found, "Resolved submit URL");
            Some(found)
        })
    }
}

/// An absolute URL with a `/submit` path, searched in markup then text
pub fn absolute_match(view: &PageView<'_>) -> Option<String> {
    [view.markup, view.text]
        .into_iter()
        .find_map(|source| ABSOLUTE_SUBMIT.find(source))
        .map(|found| clean(found.as_str()))
}

/// An origin carried by a dedicated element plus a bare `/submit` path elsewhere
pub fn split_origin_match(view: &PageView<'_>) -> Option<String> {
    let origin = ORIGIN_ELEMENT.captures(view.markup)?;
    let origin = clean(&origin[1]);
    let path = relative_path(view.markup)?;
    Some(format!("{}{}", origin.trim_end_matches('/'), path))
}

/// A bare `/submit` path resolved against the page's own origin
pub fn relative_match(view: &PageView<'_>) -> Option<String> {
    let path = relative_path(view.markup).or_else(|| relative_path(view.text))?;
    let origin = page_origin(view.page_url)?;
    Some(format!("{origin}{path}"))
}

fn relative_path(source: &str) -> Option<String> {
    RELATIVE_SUBMIT
        .captures(source)
        .map(|caps| clean(&caps[1]))
}

/// `scheme://host[:port]` of a page URL
fn page_origin(page_url: &str) -> Option<String> {
    let url = Url::parse(page_url).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Drop what surrounding prose glued on: sentence punctuation and a closing
/// parenthesis with no opening partner inside the URL
fn clean(candidate: &str) -> String {
    let mut end = candidate;
    loop {
        let trimmed = end.trim_end_matches(SENTENCE_PUNCTUATION);
        let trimmed = match trimmed.strip_suffix(')') {
            Some(rest) if rest.matches('(').count() <= rest.matches(')').count() => rest,
            _ => trimmed,
        };
        if trimmed.len() == end.len() {
            return trimmed.to_string();
        }
        end = trimmed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn resolve(markup: &str, text: &str, page_url: &str) -> Option<String> {
        SubmitUrlResolver::new().resolve(markup, text, page_url)
    }

    #[test]
    fn test_no_pattern_resolves_to_none() {
        assert_eq!(resolve("<html></html>", "", "https://q.example/x"), None);
    }

    #[test]
    fn test_absolute_url_in_markup() {
        let markup = r#"<p>Post to <a href="https://tds.example/submit">here</a></p>"#;
        assert_eq!(
            resolve(markup, "", "https://q.example/x"),
            Some("https://tds.example/submit".to_string())
        );
    }

    #[test]
    fn test_absolute_url_in_text_only() {
        let text = "POST your answer to https://tds.example/submit/3.";
        assert_eq!(
            resolve("<div></div>", text, "https://q.example/x"),
            Some("https://tds.example/submit/3".to_string())
        );
    }

    #[test]
    fn test_absolute_url_keeps_balanced_parentheses() {
        let text = "POST to https://q.example/submit?id=(a) now";
        assert_eq!(
            resolve("<div></div>", text, "https://q.example/x"),
            Some("https://q.example/submit?id=(a)".to_string())
        );
    }

    #[test]
    fn test_prose_punctuation_is_trimmed() {
        assert_eq!(clean("https://q.example/submit."), "https://q.example/submit");
        assert_eq!(clean("https://q.example/submit)."), "https://q.example/submit");
        assert_eq!(clean("https://q.example/submit?id=(a))"), "https://q.example/submit?id=(a)");
        assert_eq!(clean("https://q.example/submit?id=(a)"), "https://q.example/submit?id=(a)");
        assert_eq!(clean("/submit/3:"), "/submit/3");
    }

    #[test]
    fn test_absolute_wins_over_relative() {
        let markup = r#"<form action="/submit"></form> or https://other.example/submit"#;
        assert_eq!(
            resolve(markup, "", "https://q.example/x"),
            Some("https://other.example/submit".to_string())
        );
    }

    #[test]
    fn test_split_origin() {
        let markup = r#"<p>Post to <span class="origin">https://tds.example:8443</span>/submit</p>"#;
        assert_eq!(
            resolve(markup, "", "https://q.example/x"),
            Some("https://tds.example:8443/submit".to_string())
        );
    }

    #[test]
    fn test_split_origin_wins_over_page_origin() {
        let markup = r#"<code id="api-origin">https://api.example/</code> <code>/submit</code>"#;
        assert_eq!(
            resolve(markup, "", "https://q.example/x"),
            Some("https://api.example/submit".to_string())
        );
    }

    #[test]
    fn test_origin_element_without_path_falls_through() {
        let markup = r#"<span class="origin">https://tds.example</span>"#;
        assert_eq!(resolve(markup, "", "https://q.example/x"), None);
    }

    #[test]
    fn test_relative_path_uses_page_origin() {
        let markup = r#"<form action="/submit?quiz=4"></form>"#;
        assert_eq!(
            resolve(markup, "", "http://localhost:3000/quiz/4?x=1"),
            Some("http://localhost:3000/submit?quiz=4".to_string())
        );
    }

    #[test]
    fn test_relative_path_in_text() {
        assert_eq!(
            resolve("<div></div>", "Send it to /submit.", "https://q.example/x"),
            Some("https://q.example/submit".to_string())
        );
    }

    #[test]
    fn test_relative_path_needs_parseable_page_url() {
        assert_eq!(resolve(r#"<a href="/submit">s</a>"#, "", "not a url"), None);
    }

    #[test]
    fn test_path_fragment_inside_word_is_ignored() {
        assert_eq!(
            resolve("<p>resubmit later</p>", "a/submit b", "https://q.example/x"),
            None
        );
    }

    proptest! {
        #[test]
        fn prop_relative_path_joins_page_origin(
            host in "[a-z]{1,10}\\.example",
            path in "/submit(/[a-z0-9]{1,8}){0,3}",
            page in "/[a-z0-9]{0,8}",
        ) {
            let markup = format!("<p>POST to <code>{path}</code></p>");
            let page_url = format!("https://{host}{page}");

            prop_assert_eq!(
                resolve(&markup, "", &page_url),
                Some(format!("https://{host}{path}"))
            );
        }

        #[test]
        fn prop_absolute_url_returned_verbatim(
            host in "[a-z]{1,10}\\.example",
            tail in "(/[a-z0-9]{1,8}){0,2}",
            relative in "/submit(/[a-z]{1,4})?",
        ) {
            let absolute = format!("https://{host}/submit{tail}");
            let markup = format!(
                r#"<span class="origin">https://decoy.example</span><a href="{relative}">x</a> {absolute}"#
            );

            prop_assert_eq!(
                resolve(&markup, "", "https://page.example/q"),
                Some(absolute)
            );
        }
    }
}
