use std::future::Future;
use std::path::Path;

use crate::errors::{Result, TestingError};

pub const DESTRUCTIVE_ENV: &str = "LVMD_TESTING_ENABLE_DESTRUCTIVE";

pub fn skip<T>(reason: impl Into<String>) -> Result<T> {
    Err(TestingError::TestSkipped {
        reason: reason.into(),
    })
}

pub fn failure<T>(reason: impl Into<String>) -> Result<T> {
    Err(TestingError::TestFailed {
        reason: reason.into(),
    })
}

pub fn ensure(condition: bool, reason: impl Into<String>) -> Result<()> {
    if condition { Ok(()) } else { failure(reason) }
}

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

pub fn require_root() -> Result<()> {
    if is_root() {
        Ok(())
    } else {
        skip("requires root")
    }
}

pub fn lvm_available() -> bool {
    Path::new("/sbin/lvm").exists() || which::which("lvm").is_ok()
}

/// Root and an `lvm` binary, enough for commands that change nothing.
pub fn require_lvm() -> Result<()> {
    require_root()?;
    if lvm_available() {
        Ok(())
    } else {
        skip("lvm not installed")
    }
}

pub fn destructive_enabled() -> bool {
    std::env::var(DESTRUCTIVE_ENV).ok().as_deref() == Some("1")
}

pub fn require_destructive(label: &str) -> Result<()> {
    require_lvm()?;
    if destructive_enabled() {
        Ok(())
    } else {
        skip(format!("destructive test disabled for {label}, set {DESTRUCTIVE_ENV}=1"))
    }
}

/// Runs `body` as test `label`: a skip prints `SKIP` and passes, any other
/// error fails the test.
pub async fn run_test<F>(label: &str, body: F)
where
    F: Future<Output = Result<()>>,
{
    match body.await {
        Ok(()) => {}
        Err(TestingError::TestSkipped { reason }) => println!("SKIP {label}: {reason}"),
        Err(error) => panic!("{label}: {error}"),
    }
}
