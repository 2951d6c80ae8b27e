//! Tab enumeration and selection over the Chrome debug HTTP endpoint.

use crate::error::StreamError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// URL keywords that mark a tab as the automation target, checked first.
const PREFERRED_KEYWORDS: &[&str] = &["job", "application", "career", "apply", "ashby"];

/// One tab as reported by `GET /json/list`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TabInfo {
    /// Target id.
    #[serde(default)]
    pub id: String,
    /// Current URL.
    #[serde(default)]
    pub url: String,
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Per-tab debugger WebSocket URL, absent for targets that cannot be
    /// attached to.
    #[serde(default, rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: Option<String>,
}

/// Fetch the tab list from a browser's debug endpoint.
pub async fn list_tabs(base_url: &str) -> Result<Vec<TabInfo>, StreamError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|err| StreamError::ConnectionFailure {
            context: err.to_string(),
        })?;
    let response = client
        .get(format!("{base_url}/json/list"))
        .send()
        .await
        .map_err(|err| StreamError::ConnectionFailure {
            context: err.to_string(),
        })?;
    response
        .json::<Vec<TabInfo>>()
        .await
        .map_err(|err| StreamError::ConnectionFailure {
            context: err.to_string(),
        })
}

/// Pick the tab to stream.
///
/// Preference order: first tab whose URL contains a job-domain keyword,
/// then the first non-internal tab, then the first tab. Whatever wins must
/// expose a debugger URL; otherwise the first tab that does is used.
/// `NoTabAvailable` when the list is empty or nothing is attachable.
pub fn select_tab(tabs: &[TabInfo]) -> Result<&TabInfo, StreamError> {
    if tabs.is_empty() {
        return Err(StreamError::NoTabAvailable);
    }

    let preferred = tabs
        .iter()
        .find(|tab| {
            let url = tab.url.to_lowercase();
            PREFERRED_KEYWORDS.iter().any(|kw| url.contains(kw))
        })
        .or_else(|| tabs.iter().find(|tab| !is_internal(&tab.url)))
        .or_else(|| tabs.first())
        .ok_or(StreamError::NoTabAvailable)?;

    if preferred.web_socket_debugger_url.is_some() {
        return Ok(preferred);
    }
    tabs.iter()
        .find(|tab| tab.web_socket_debugger_url.is_some())
        .ok_or(StreamError::NoTabAvailable)
}

/// Fetch the tab list and select the streaming target in one step.
pub async fn pick_target(base_url: &str) -> Result<TabInfo, StreamError> {
    let tabs = list_tabs(base_url).await?;
    select_tab(&tabs).cloned()
}

fn is_internal(url: &str) -> bool {
    url.is_empty() || url.starts_with("chrome://") || url.starts_with("about:")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tab(url: &str, ws: Option<&str>) -> TabInfo {
        TabInfo {
            id: "t".to_owned(),
            url: url.to_owned(),
            title: String::new(),
            web_socket_debugger_url: ws.map(str::to_owned),
        }
    }

    #[test]
    fn empty_list_has_no_tab() {
        assert_matches!(select_tab(&[]), Err(StreamError::NoTabAvailable));
    }

    #[test]
    fn keyword_tab_wins_over_earlier_tabs() {
        let tabs = vec![
            tab("https://example.com", Some("ws://a")),
            tab("https://jobs.example.com/apply", Some("ws://b")),
        ];
        let selected = select_tab(&tabs).unwrap();
        assert_eq!(selected.url, "https://jobs.example.com/apply");
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let tabs = vec![
            tab("https://example.com", Some("ws://a")),
            tab("https://example.com/Careers", Some("ws://b")),
        ];
        assert_eq!(select_tab(&tabs).unwrap().url, "https://example.com/Careers");
    }

    #[test]
    fn non_internal_tab_beats_internal_ones() {
        let tabs = vec![
            tab("chrome://settings", Some("ws://a")),
            tab("about:blank", Some("ws://b")),
            tab("https://example.com", Some("ws://c")),
        ];
        assert_eq!(select_tab(&tabs).unwrap().url, "https://example.com");
    }

    #[test]
    fn all_internal_falls_back_to_first() {
        let tabs = vec![
            tab("about:blank", Some("ws://a")),
            tab("chrome://gpu", Some("ws://b")),
        ];
        assert_eq!(select_tab(&tabs).unwrap().url, "about:blank");
    }

    #[test]
    fn preferred_tab_without_debugger_url_yields_to_attachable_one() {
        let tabs = vec![
            tab("https://jobs.example.com", None),
            tab("https://example.com", Some("ws://b")),
        ];
        assert_eq!(select_tab(&tabs).unwrap().url, "https://example.com");
    }

    #[test]
    fn no_attachable_tab_at_all() {
        let tabs = vec![tab("https://example.com", None), tab("about:blank", None)];
        assert_matches!(select_tab(&tabs), Err(StreamError::NoTabAvailable));
    }

    #[tokio::test]
    async fn list_tabs_parses_debug_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": "AB12",
                    "url": "https://jobs.example.com/apply",
                    "title": "Apply",
                    "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/AB12"
                },
                {
                    "id": "CD34",
                    "url": "chrome://newtab",
                    "title": "New Tab"
                }
            ])))
            .mount(&server)
            .await;

        let tabs = list_tabs(&server.uri()).await.unwrap();
        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs[0].id, "AB12");
        assert!(tabs[0].web_socket_debugger_url.is_some());
        assert!(tabs[1].web_socket_debugger_url.is_none());
    }

    #[tokio::test]
    async fn pick_target_combines_fetch_and_selection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": "a", "url": "about:blank", "webSocketDebuggerUrl": "ws://x/a"},
                {"id": "b", "url": "https://example.com/career", "webSocketDebuggerUrl": "ws://x/b"}
            ])))
            .mount(&server)
            .await;

        let target = pick_target(&server.uri()).await.unwrap();
        assert_eq!(target.id, "b");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_connection_failure() {
        assert_matches!(
            list_tabs("http://127.0.0.1:1").await,
            Err(StreamError::ConnectionFailure { .. })
        );
    }
}
