//! Fuzz target for the admin channel's packed command grammar (§4.5
//! "Admin channel").

#![no_main]

use a12_directory::admin::parse_admin_command;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = parse_admin_command(data);
});
