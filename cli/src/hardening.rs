//! Keep email contents and the API key out of core dumps.

use anyhow::{Context, Result};
use std::env;

const BECWATCH_ALLOW_COREDUMPS: &str = "BECWATCH_ALLOW_COREDUMPS";

pub fn apply() -> Result<()> {
    if coredumps_allowed_by_override() {
        tracing::warn!(
            env_var = BECWATCH_ALLOW_COREDUMPS,
            "Core dump suppression disabled by environment override"
        );
        return Ok(());
    }

    apply_platform_hardening().context("failed to suppress core dumps")?;
    tracing::debug!("Core dumps suppressed");
    Ok(())
}

fn coredumps_allowed_by_override() -> bool {
    env::var(BECWATCH_ALLOW_COREDUMPS).is_ok_and(|raw| is_truthy(&raw))
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

#[cfg(unix)]
fn apply_platform_hardening() -> Result<()> {
    set_rlimit_core_zero().context("setrlimit(RLIMIT_CORE=0) failed")?;

    #[cfg(target_os = "linux")]
    {
        set_linux_dumpable_zero().context("prctl(PR_SET_DUMPABLE=0) failed")?;
    }

    Ok(())
}

#[cfg(unix)]
fn set_rlimit_core_zero() -> std::io::Result<()> {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    let rc = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &raw const limit) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(target_os = "linux")]
fn set_linux_dumpable_zero() -> std::io::Result<()> {
    let rc = unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn apply_platform_hardening() -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::is_truthy;

    #[test]
    fn override_values() {
        for yes in ["1", "true", "TRUE", " yes "] {
            assert!(is_truthy(yes), "{yes:?}");
        }
        for no in ["", "0", "false", "on"] {
            assert!(!is_truthy(no), "{no:?}");
        }
    }
}
