//! Object key layout for chunk backends
//!
//! `{prefix}/{hex[0..2]}/{hex[2..4]}/{hex}`. Two levels of 256-way sharding
//! keep directory sizes bounded on filesystem backends.

use strata_core::Address;

/// Object path for `address` under `prefix`. An empty prefix puts the
/// shard directories at the backend root.
pub fn chunk_path(prefix: &str, address: &Address) -> String {
    let hex = address.to_hex();
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}/{hex}", &hex[0..2], &hex[2..4])
    } else {
        format!("{prefix}/{}/{}/{hex}", &hex[0..2], &hex[2..4])
    }
}

/// Directory under which all chunk objects live (with trailing slash)
pub fn chunk_root(prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        "/".to_string()
    } else {
        format!("{prefix}/")
    }
}

/// Recover the address from an object path produced by `chunk_path`.
///
/// Returns `None` for directories and foreign objects.
pub fn address_from_path(path: &str) -> Option<Address> {
    let name = path.rsplit('/').next()?;
    if name.len() != 64 {
        return None;
    }
    Address::from_hex(name).ok()
}
