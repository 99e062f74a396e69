//! Job-id range syntax: a bare non-negative integer, or `"A-B"`
//! (inclusive, order-insensitive). Any other form is an error.

use std::collections::BTreeSet;

/// Resolve a single range-syntax token into the set of ids it denotes.
fn resolve_one(token: &str) -> crate::Result<Vec<i64>> {
    let parts: Vec<&str> = token.split('-').collect();
    match parts.as_slice() {
        [single] => Ok(vec![to_id(single)?]),
        [a, b] => {
            let start = to_id(a)?;
            let end = to_id(b)?;
            let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
            Ok((lo..=hi).collect())
        }
        _ => Err(crate::Error::Parser(format!(
            "unable to guess a job range from '{token}'"
        ))),
    }
}

fn to_id(s: &str) -> crate::Result<i64> {
    let v: i64 = s
        .parse()
        .map_err(|_| crate::Error::Parser(format!("'{s}' is not a valid job id")))?;
    if v < 0 {
        return Err(crate::Error::Parser(
            "job ids have to be >= 0".to_string(),
        ));
    }
    Ok(v)
}

/// Resolve a list of range-syntax strings into the deduplicated, sorted set
/// of ids they denote.
pub fn resolve_job_range<S: AsRef<str>>(ids: &[S]) -> crate::Result<BTreeSet<i64>> {
    let mut out = BTreeSet::new();
    for token in ids {
        for id in resolve_one(token.as_ref())? {
            out.insert(id);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_integer_resolves_to_singleton() {
        let r = resolve_job_range(&["7"]).unwrap();
        assert_eq!(r, [7].into_iter().collect());
    }

    #[test]
    fn range_is_inclusive() {
        let r = resolve_job_range(&["3-7"]).unwrap();
        assert_eq!(r, (3..=7).collect());
    }

    #[test]
    fn reversed_range_is_normalized() {
        let forward = resolve_job_range(&["3-7"]).unwrap();
        let backward = resolve_job_range(&["7-3"]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn negative_id_is_rejected() {
        assert!(resolve_job_range(&["-5"]).is_err() || resolve_job_range(&["-5-3"]).is_err());
        assert!(to_id("-1").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(resolve_job_range(&["abc"]).is_err());
        assert!(resolve_job_range(&["1-2-3"]).is_err());
    }

    #[test]
    fn multiple_tokens_are_unioned_and_deduplicated() {
        let r = resolve_job_range(&["1-3", "2-4"]).unwrap();
        assert_eq!(r, (1..=4).collect());
    }
}
