//! Fuzz target for the runner control-channel grammar (§4.5 "KV store
//! mediation"), grounded on `dir_lua.c`'s packed `key=value:...` tokenizer.
//!
//! `ArgStr::parse` never fails (it tolerates empty tokens by design) so the
//! interesting property is that `parse_runner_request` built on top of it
//! never panics on adversarial strings — including ones crafted to look
//! like a `setkey` into a foreign domain, which must still come back as a
//! plain `RunnerRequest::SetKey` for the controller to prefix-check, not
//! something the parser itself interprets.

#![no_main]

use a12_directory::argstr::ArgStr;
use a12_directory::kv::parse_runner_request;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = ArgStr::parse(data);
    let _ = parse_runner_request(data);
});
