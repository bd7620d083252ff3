//! Merging extra driver options into connection strings.

use crate::error::{HotloadError, Result};
use std::collections::BTreeMap;
use url::Url;

/// Merge `options` into the query of a URI-shaped connection string.
///
/// Options override existing keys of the same name; other existing keys are kept.
/// Query keys are written back sorted. With no options the connection string is
/// returned untouched, so non-URI formats (`host=a dbname=b`) keep working as
/// long as nothing needs to be merged into them.
///
/// # Errors
///
/// Returns [`HotloadError::OptionMergeFailure`] if options are given and the
/// connection string is not a URI.
///
/// # Examples
///
/// ```rust
/// use hotload::core::merge_connection_options;
/// use std::collections::BTreeMap;
///
/// let options = BTreeMap::from([("sslmode".to_string(), "disable".to_string())]);
/// let merged =
///     merge_connection_options("postgres://app@db/orders?sslmode=require", &options).unwrap();
/// assert_eq!(merged, "postgres://app@db/orders?sslmode=disable");
/// ```
pub fn merge_connection_options(dsn: &str, options: &BTreeMap<String, String>) -> Result<String> {
    if options.is_empty() {
        return Ok(dsn.to_string());
    }

    let mut url = Url::parse(dsn).map_err(|e| {
        HotloadError::OptionMergeFailure(format!(
            "unable to parse connection string when specifying extra driver options: {}",
            e
        ))
    })?;
    if url.cannot_be_a_base() {
        return Err(HotloadError::OptionMergeFailure(
            "connection string has no authority or path to attach options to".to_string(),
        ));
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !options.contains_key(&**key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
    // Stable: values of a repeated key keep their order.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    url.query_pairs_mut().clear().extend_pairs(pairs);
    Ok(url.to_string())
}

/// Layer address-level options over a driver's registered defaults.
pub(crate) fn layer_options(
    defaults: &BTreeMap<String, String>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = defaults.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
