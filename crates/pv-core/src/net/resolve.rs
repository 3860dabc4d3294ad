//! Best-effort reverse DNS and uid resolution.
//!
//! Lookups here never fail the caller: on any failure the literal input
//! comes back unchanged. Results are memoized per resolver instance so a
//! scan performs one lookup per unique address or uid.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use tracing::debug;

/// Memoizing resolver for reverse DNS and uid-to-username lookups.
#[derive(Debug, Default)]
pub struct NameResolver {
    hosts: HashMap<IpAddr, String>,
    users: HashMap<u32, String>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reverse-resolve an address, falling back to its literal form.
    pub fn hostname(&mut self, addr: IpAddr) -> String {
        if let Some(name) = self.hosts.get(&addr) {
            return name.clone();
        }
        let name = match dns_lookup::lookup_addr(&addr) {
            Ok(name) => name,
            Err(err) => {
                debug!(address = %addr, error = %err, "reverse DNS lookup failed");
                addr.to_string()
            }
        };
        self.hosts.insert(addr, name.clone());
        name
    }

    /// Resolve a uid to its username, falling back to the numeric form.
    pub fn username(&mut self, uid: u32) -> String {
        self.username_at(Path::new("/etc/passwd"), uid)
    }

    /// Resolve against a specific passwd-format file (for testing).
    pub fn username_at(&mut self, passwd: &Path, uid: u32) -> String {
        if let Some(name) = self.users.get(&uid) {
            return name.clone();
        }
        let name = lookup_username(passwd, uid).unwrap_or_else(|| uid.to_string());
        self.users.insert(uid, name.clone());
        name
    }
}

fn lookup_username(passwd: &Path, uid: u32) -> Option<String> {
    let content = std::fs::read_to_string(passwd).ok()?;
    for line in content.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 3 {
            continue;
        }
        if let Ok(entry_uid) = fields[2].parse::<u32>() {
            if entry_uid == uid {
                return Some(fields[0].to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_passwd(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_username_lookup() {
        let passwd = write_passwd(
            "root:x:0:0:root:/root:/bin/bash\n\
             daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin\n\
             alice:x:1000:1000:Alice:/home/alice:/bin/zsh\n",
        );
        let mut resolver = NameResolver::new();
        assert_eq!(resolver.username_at(passwd.path(), 0), "root");
        assert_eq!(resolver.username_at(passwd.path(), 1000), "alice");
    }

    #[test]
    fn test_username_falls_back_to_numeric() {
        let passwd = write_passwd("root:x:0:0:root:/root:/bin/bash\n");
        let mut resolver = NameResolver::new();
        assert_eq!(resolver.username_at(passwd.path(), 4242), "4242");
    }

    #[test]
    fn test_username_skips_malformed_lines() {
        let passwd = write_passwd(
            "garbage line\n\
             broken:x\n\
             bob:x:1001:1001::/home/bob:/bin/sh\n",
        );
        let mut resolver = NameResolver::new();
        assert_eq!(resolver.username_at(passwd.path(), 1001), "bob");
    }

    #[test]
    fn test_username_missing_file_falls_back() {
        let mut resolver = NameResolver::new();
        assert_eq!(
            resolver.username_at(Path::new("/definitely/not/passwd"), 7),
            "7"
        );
    }

    #[test]
    fn test_username_memoized() {
        let passwd = write_passwd("carol:x:1002:1002::/home/carol:/bin/sh\n");
        let mut resolver = NameResolver::new();
        assert_eq!(resolver.username_at(passwd.path(), 1002), "carol");
        // A second call must hit the memo, not the file.
        drop(passwd);
        assert_eq!(resolver.username_at(Path::new("/gone"), 1002), "carol");
    }

    #[test]
    fn test_hostname_never_fails() {
        // TEST-NET-1 has no PTR record anywhere; the call must still
        // return a usable string rather than erroring.
        let mut resolver = NameResolver::new();
        let name = resolver.hostname("192.0.2.1".parse().unwrap());
        assert!(!name.is_empty());
    }

    #[test]
    #[ignore] // requires a working resolver for the loopback address
    fn test_hostname_loopback_live() {
        let mut resolver = NameResolver::new();
        let name = resolver.hostname("127.0.0.1".parse().unwrap());
        assert!(!name.is_empty());
    }
}
