//! Picks the offending value out of the API's free-text error `reason`.
//!
//! Contract: the reason must contain `invalid String value <VALUE>`, where
//! `<VALUE>` runs to the next whitespace and loses any trailing `.`. An
//! optional ` for parameter '<KEY>'` or ` for key <KEY>` right after it names
//! the query key. Anything else is not an invalid-parameter reason.
//!
//! This tracks the server's English wording and will silently stop matching
//! if that wording changes; callers must treat `None` as "generic API error".

const MARKER: &str = "invalid String value ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidParameter {
    pub value: String,
    pub query_key: Option<String>,
}

pub fn parse_invalid_parameter(reason: &str) -> Option<InvalidParameter> {
    let (_, rest) = reason.split_once(MARKER)?;

    let value_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let value = trim_token(&rest[..value_end]);
    if value.is_empty() {
        return None;
    }

    let tail = &rest[value_end..];
    let query_key = ["for parameter ", "for key "]
        .into_iter()
        .find_map(|prefix| tail.trim_start().strip_prefix(prefix))
        .and_then(|after| after.split_whitespace().next())
        .map(trim_token)
        .filter(|key| !key.is_empty())
        .map(str::to_owned);

    Some(InvalidParameter { value: value.to_owned(), query_key })
}

fn trim_token(token: &str) -> &str {
    token.trim_end_matches('.').trim_matches(|c| c == '\'' || c == '"')
}
