//! Fuzz target for the resource-request gateway's name syntax (§4.5
//! "Resource-request gateway"). The one property that matters here is
//! containment: no accepted name may resolve outside `root` once joined,
//! so every accepted name is re-checked for path traversal after the
//! fact as a belt-and-braces assertion on top of "never panics".

#![no_main]

use std::path::Path;

use a12_directory::resources::{resolve_under, validate_resource_name};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let root = Path::new("/tmp/a12-resources-fuzz-root");

    if validate_resource_name(data).is_ok() {
        let resolved = resolve_under(root, data).expect("validated name must resolve");
        assert!(
            resolved.starts_with(root),
            "validated resource name escaped its root: {data:?} -> {resolved:?}"
        );
    }
});
