//! Pagination descriptors

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::param::PredicateFn;
use super::Params;
use crate::util::{path, value};

/// Next-page parameters derived from the previous request and its response
#[derive(Debug, Clone, PartialEq)]
pub enum NextPage {
    /// Continue serially with one parameter set
    Single(Params),
    /// Fan out into several parameter sets, fetched concurrently
    Fanout(Vec<Params>),
}

/// Builds next-page parameters from `(previous params, response)`
pub type NextPageFn = Arc<dyn Fn(&Params, &Value) -> Result<NextPage, String> + Send + Sync>;

/// Decides whether a response is a partial result
#[derive(Clone)]
pub enum Indicator {
    /// Incomplete when the value at this path is truthy
    Path(String),
    Predicate(PredicateFn),
}

impl fmt::Debug for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Predicate(_) => write!(f, "Predicate(<fn>)"),
        }
    }
}

impl Indicator {
    pub fn is_incomplete(&self, response: &Value) -> bool {
        match self {
            Self::Path(p) => value::is_truthy(path::get(response, p)),
            Self::Predicate(predicate) => predicate(response),
        }
    }
}

#[derive(Clone)]
pub struct Pagination {
    pub incomplete: Indicator,
    pub next: NextPageFn,
}

impl fmt::Debug for Pagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pagination")
            .field("incomplete", &self.incomplete)
            .finish_non_exhaustive()
    }
}

impl Pagination {
    pub fn new(
        incomplete: Indicator,
        next: impl Fn(&Params, &Value) -> Result<NextPage, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            incomplete,
            next: Arc::new(next),
        }
    }

    /// Continuation-token pagination
    ///
    /// The response is incomplete while `token_path` is truthy; the next
    /// request repeats the previous params with `param` set to that token.
    pub fn token(token_path: impl Into<String>, param: impl Into<String>) -> Self {
        let token_path = token_path.into();
        let param = param.into();
        let lookup = token_path.clone();
        Self::new(Indicator::Path(token_path), move |params, response| {
            let token = path::get(response, &lookup)
                .cloned()
                .ok_or_else(|| format!("response has no '{}' token", lookup))?;
            let mut next = params.clone();
            next.insert(param.clone(), token);
            Ok(NextPage::Single(next))
        })
    }

    pub fn is_incomplete(&self, response: &Value) -> bool {
        self.incomplete.is_incomplete(response)
    }

    pub fn next_page(&self, params: &Params, response: &Value) -> Result<NextPage, String> {
        (self.next)(params, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_indicator() {
        let indicator = Indicator::Path("meta.more".into());
        assert!(indicator.is_incomplete(&json!({"meta": {"more": true}})));
        assert!(!indicator.is_incomplete(&json!({"meta": {"more": false}})));
        assert!(!indicator.is_incomplete(&json!({})));
    }

    #[test]
    fn test_token_pagination_chains_params() {
        let pagination = Pagination::token("NextToken", "nextToken");
        let mut params = Params::new();
        params.insert("group".into(), json!("g"));

        let response = json!({"NextToken": "abc", "items": []});
        assert!(pagination.is_incomplete(&response));

        let next = pagination.next_page(&params, &response).unwrap();
        let NextPage::Single(next) = next else {
            panic!("expected a single next page");
        };
        assert_eq!(next.get("group"), Some(&json!("g")));
        assert_eq!(next.get("nextToken"), Some(&json!("abc")));

        assert!(!pagination.is_incomplete(&json!({"NextToken": null})));
    }
}
