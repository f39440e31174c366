// SPEC_FULL.md §7: error kinds callers can match on without downcasting,
// layered on top of rtc_base::Error the same way submerge-base centralizes
// "new error + backtrace + log" behind one constructor.

use std::fmt;

use rtc_base::Error as BaseError;

/// Expected, nameable failure modes of the RTC surface. `Deadlock` and
/// `NotLockable` are deliberately absent here: per §7 they are returned as
/// `LockResult` values, never as errors.
#[derive(Debug)]
pub enum RtcError {
    /// The master has no record of this session. Per §4.1 step 5 and §7,
    /// this is always propagated; the slave interprets it as "master
    /// switched, abort and rebind".
    NoSuchSession,
    /// `commitSingleResourceTransaction` named a resource the
    /// `DataSourceSet` doesn't know about.
    UnknownResource(String),
    /// I/O failure while applying a commit or streaming a commit-tail.
    /// Per §7 this is propagated; the session's transaction is not
    /// silently rolled back.
    IoError(BaseError),
    /// Anything else: a bug, or a collaborator violating its contract.
    Internal(BaseError),
}

impl fmt::Display for RtcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RtcError::NoSuchSession => write!(f, "no such session"),
            RtcError::UnknownResource(name) => write!(f, "unknown resource: {name}"),
            RtcError::IoError(e) => write!(f, "I/O error: {e:?}"),
            RtcError::Internal(e) => write!(f, "internal error: {e:?}"),
        }
    }
}

impl std::error::Error for RtcError {}

pub type Result<T> = std::result::Result<T, RtcError>;
