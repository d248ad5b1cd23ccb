//! Search URL construction
//!
//! The search page is the only wire-level contract exposed outward:
//! `{base}?where=<location>&q=<title>&tm=<recency>`.

use serde::{Deserialize, Serialize};
use url::Url;

/// Parameters of one search pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text job title, may be empty for "all jobs"
    pub title_query: String,
    /// Location filter, may be empty
    pub location: String,
    /// Recency window in days (`tm`)
    pub recency_window: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            title_query: String::new(),
            location: String::new(),
            recency_window: 1,
        }
    }
}

/// Appends the search parameters to `base_url` in `where`, `q`, `tm` order.
pub fn build_search_url(base_url: &str, query: &SearchQuery) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base_url)?;
    url.query_pairs_mut()
        .append_pair("where", &query.location)
        .append_pair("q", &query.title_query)
        .append_pair("tm", &query.recency_window.to_string());

    tracing::debug!(url = %url, "Built search url");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE: &str = "https://www.monster.com/jobs/search/";

    #[test]
    fn builds_url_in_parameter_order() {
        let query = SearchQuery {
            title_query: "Data Analyst".to_string(),
            location: "New York, NY".to_string(),
            recency_window: 1,
        };

        let url = build_search_url(BASE, &query).unwrap();

        assert_eq!(
            url.as_str(),
            "https://www.monster.com/jobs/search/?where=New+York%2C+NY&q=Data+Analyst&tm=1"
        );
    }

    #[test]
    fn empty_query_keeps_all_parameters() {
        let url = build_search_url(BASE, &SearchQuery::default()).unwrap();
        assert_eq!(url.query(), Some("where=&q=&tm=1"));
    }

    #[test]
    fn rejects_invalid_base() {
        assert!(build_search_url("not a url", &SearchQuery::default()).is_err());
    }

    proptest! {
        #[test]
        fn query_pairs_survive_encoding(title in ".{0,40}", location in ".{0,40}", tm in 0u32..365) {
            let query = SearchQuery { title_query: title.clone(), location: location.clone(), recency_window: tm };
            let url = build_search_url(BASE, &query).unwrap();
            let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

            prop_assert_eq!(pairs.len(), 3);
            prop_assert_eq!(&pairs[0], &("where".to_string(), location));
            prop_assert_eq!(&pairs[1], &("q".to_string(), title));
            prop_assert_eq!(&pairs[2], &("tm".to_string(), tm.to_string()));
        }
    }
}
