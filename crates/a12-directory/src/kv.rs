//! KV mediation wire grammar (§4.5 "KV store mediation"), grounded on
//! `dir_lua.c`'s `controller_dispatch`.
//!
//! The runner cannot reach the registry database directly; it sends these
//! tagged requests over its control channel, and the controller replies
//! (directly, or via [`crate::kv_store`] and the resource/launch gateways).

use crate::argstr::ArgStr;
use crate::error::DirectoryError;

/// One request a runner may send over its control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerRequest {
    /// Opens a KV transaction against the runner's own appl domain.
    BeginKvTransaction,
    /// Sets `key` to `value` inside the currently open transaction.
    SetKey {
        /// Key name.
        key: String,
        /// Value to associate with `key`.
        value: String,
    },
    /// Closes the currently open transaction, committing its writes.
    EndKvTransaction,
    /// Queries a domain for keys matching `pattern`, tagged with `id` so
    /// the reply (an `Event` stream or a fresh `BinaryTransfer`, depending
    /// on result size) can be correlated.
    Match {
        /// Key pattern to match.
        pattern: String,
        /// Caller-supplied correlation id.
        id: u64,
    },
    /// Requests launching a target, optionally directed at a specific
    /// joined client (`dst`).
    Launch {
        /// Target name to launch.
        target: String,
        /// Caller-supplied correlation id.
        id: u64,
        /// Destination client identity, resolved against the runner's
        /// joined appl membership exactly once (§9: the original's second,
        /// redundant lookup is a TOCTOU bug and is not reproduced here).
        dst: Option<String>,
    },
    /// Forces re-sending of the appl bundle (hot reload).
    Reload,
}

/// Parses a packed control-channel string into a [`RunnerRequest`].
///
/// # Errors
///
/// `DirectoryError::MalformedKey` if the string matches none of the known
/// request shapes, or a required companion field (`value` for `setkey`,
/// `id` for `match`/`launch`) is missing.
pub fn parse_runner_request(text: &str) -> Result<RunnerRequest, DirectoryError> {
    let args = ArgStr::parse(text);

    if args.has_flag("begin_kv_transaction") {
        return Ok(RunnerRequest::BeginKvTransaction);
    }
    if args.has_flag("end_kv_transaction") {
        return Ok(RunnerRequest::EndKvTransaction);
    }
    if args.has_flag("reload") {
        return Ok(RunnerRequest::Reload);
    }
    if let Some(key) = args.get("setkey") {
        let value = args
            .get("value")
            .ok_or_else(|| DirectoryError::MalformedKey(format!("setkey={key} missing value=")))?;
        return Ok(RunnerRequest::SetKey { key: key.to_string(), value: value.to_string() });
    }
    if let Some(pattern) = args.get("match") {
        if !args.contains("domain") {
            return Err(DirectoryError::MalformedKey("match missing domain".to_string()));
        }
        let id = parse_id(&args, "match")?;
        return Ok(RunnerRequest::Match { pattern: pattern.to_string(), id });
    }
    if let Some(target) = args.get("launch") {
        let id = parse_id(&args, "launch")?;
        let dst = args.get("dst").map(str::to_string);
        return Ok(RunnerRequest::Launch { target: target.to_string(), id, dst });
    }

    Err(DirectoryError::MalformedKey(text.to_string()))
}

fn parse_id(args: &ArgStr, what: &str) -> Result<u64, DirectoryError> {
    let raw = args.get("id").ok_or_else(|| DirectoryError::MalformedKey(format!("{what} missing id=")))?;
    raw.parse::<u64>().map_err(|_| DirectoryError::MalformedKey(format!("{what} id={raw} is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_begin_setkey_end_sequence() {
        assert_eq!(parse_runner_request("begin_kv_transaction").unwrap(), RunnerRequest::BeginKvTransaction);
        assert_eq!(
            parse_runner_request("setkey=foo:value=bar").unwrap(),
            RunnerRequest::SetKey { key: "foo".to_string(), value: "bar".to_string() }
        );
        assert_eq!(parse_runner_request("end_kv_transaction").unwrap(), RunnerRequest::EndKvTransaction);
    }

    #[test]
    fn setkey_without_value_is_malformed() {
        let err = parse_runner_request("setkey=foo").unwrap_err();
        assert!(matches!(err, DirectoryError::MalformedKey(_)));
    }

    #[test]
    fn match_requires_domain_and_id() {
        let parsed = parse_runner_request("match=foo:domain=appl:id=4").unwrap();
        assert_eq!(parsed, RunnerRequest::Match { pattern: "foo".to_string(), id: 4 });

        assert!(parse_runner_request("match=foo:id=4").is_err());
    }

    #[test]
    fn launch_resolves_dst_exactly_once() {
        let parsed = parse_runner_request("launch=testsource:id=7:dst=abcd").unwrap();
        assert_eq!(
            parsed,
            RunnerRequest::Launch { target: "testsource".to_string(), id: 7, dst: Some("abcd".to_string()) }
        );
    }

    #[test]
    fn launch_without_dst_broadcasts() {
        let parsed = parse_runner_request("launch=testsource:id=7").unwrap();
        assert_eq!(parsed, RunnerRequest::Launch { target: "testsource".to_string(), id: 7, dst: None });
    }

    #[test]
    fn reload_is_recognised() {
        assert_eq!(parse_runner_request("reload").unwrap(), RunnerRequest::Reload);
    }

    #[test]
    fn unrecognised_string_is_malformed() {
        assert!(parse_runner_request("frobnicate=1").is_err());
    }
}
