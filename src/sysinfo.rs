// src/sysinfo.rs

//! Read-only environment and version strings, computed once on first use.
//!
//! Mirrors the string constants the engine exports at load time: library
//! version, host machine name, OS version, and account name.

use log::warn;
use nix::sys::utsname::uname;
use nix::unistd::{gethostname, getuid, User};
use once_cell::sync::Lazy;

/// Identification strings for this library and the machine it runs on.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    /// This crate's version.
    pub version: &'static str,
    /// Host machine name.
    pub hostname: String,
    /// Kernel name and release.
    pub os_version: String,
    /// Name of the account the process runs under.
    pub account: String,
}

static RUNTIME: Lazy<RuntimeInfo> = Lazy::new(|| {
    let hostname = gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|e| {
            warn!("gethostname failed: {}", e);
            String::from("unknown")
        });

    let os_version = match uname() {
        Ok(uts) => format!(
            "{} {}",
            uts.sysname().to_string_lossy(),
            uts.release().to_string_lossy()
        ),
        Err(e) => {
            warn!("uname failed: {}", e);
            String::from("unknown")
        }
    };

    let account = match User::from_uid(getuid()) {
        Ok(Some(user)) => user.name,
        _ => std::env::var("USER").unwrap_or_else(|_| String::from("unknown")),
    };

    RuntimeInfo {
        version: env!("CARGO_PKG_VERSION"),
        hostname,
        os_version,
        account,
    }
});

/// The process-wide identification block.
pub fn runtime() -> &'static RuntimeInfo {
    &RUNTIME
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_present_and_stable() {
        let info = runtime();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(!info.hostname.is_empty());
        assert!(!info.os_version.is_empty());
        assert!(!info.account.is_empty());
        // computed once: the same block comes back
        assert_eq!(runtime().hostname, info.hostname);
    }
}
