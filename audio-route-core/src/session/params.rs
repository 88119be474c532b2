//! `key=value;key=value` parameter strings exchanged with the framework.

use crate::models::device::RouteTarget;
use crate::models::error::RouteError;

pub const KEY_ROUTING: &str = "routing";

/// Split a parameter string into its key/value pairs, in order.
///
/// Empty segments are skipped and a segment without `=` yields an empty
/// value. Keys and values are trimmed.
pub fn parse(params: &str) -> Vec<(&str, &str)> {
    params
        .split(';')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (segment, ""),
        })
        .collect()
}

/// Value of the first occurrence of `key`.
pub fn get<'a>(params: &'a str, key: &str) -> Option<&'a str> {
    parse(params).into_iter().find(|(k, _)| *k == key).map(|(_, v)| v)
}

/// Leading decimal number of `value`, 0 when there is none.
fn leading_u32(value: &str) -> u32 {
    let digits: &str = {
        let end = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
        &value[..end]
    };
    digits.parse().unwrap_or(0)
}

/// The route request carried by the `routing` key.
///
/// The value is read like a C integer prefix, so `routing=2;` and
/// `routing=2abc` both mean speaker and an unparsable value means
/// standby.
pub fn routing_target(params: &str) -> Result<RouteTarget, RouteError> {
    let value = get(params, KEY_ROUTING)
        .ok_or_else(|| RouteError::InvalidArgument(format!("missing {} key in {:?}", KEY_ROUTING, params)))?;
    RouteTarget::from_raw(leading_u32(value))
}
