//! The error taxonomy (C10): a closed, tagged union over POSIX and name
//! resolution errors.
//!
//! Every kernel call the reactor makes bottoms out in [`std::io::Error`], but
//! callers of the facade (C9) never see a bare `io::Error` in a completion.
//! Instead they see an [`ErrorCode`], which preserves which half of the union
//! produced it and supports equality against either closed enumeration. This
//! mirrors the original C++ `n3::error::code` enum (`error.h`), which is
//! itself a closed `enum class` over `errno` values rather than an open
//! `std::error_code` category.

use std::fmt;
use std::io;

/// Every `errno` value the reactor's syscalls (C5) can produce, named the way
/// `std::io::ErrorKind` names things rather than shouting `SCREAMING_CASE`
/// `errno` macros, matching `error::code` in the original `error.h`.
///
/// This enumeration is intentionally closed: a new kernel error the reactor
/// has never seen maps to [`PosixError::Other`] carrying the raw `errno`,
/// rather than silently growing the enum at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PosixError {
    AddressFamilyNotSupported,
    AddressInUse,
    AddressNotAvailable,
    AlreadyConnected,
    ArgumentListTooLong,
    ArgumentOutOfDomain,
    BadAddress,
    BadFileDescriptor,
    BadMessage,
    BrokenPipe,
    ConnectionAborted,
    ConnectionAlreadyInProgress,
    ConnectionRefused,
    ConnectionReset,
    CrossDeviceLink,
    DestinationAddressRequired,
    DeviceOrResourceBusy,
    DirectoryNotEmpty,
    ExecutableFormatError,
    FileExists,
    FileTooLarge,
    FilenameTooLong,
    FunctionNotSupported,
    HostUnreachable,
    IdentifierRemoved,
    IllegalByteSequence,
    InappropriateIoControlOperation,
    /// A blocking syscall was interrupted by a signal. The reactor retries
    /// transparently on data syscalls and absorbs this on the kernel wait
    /// (§7 propagation policy); callers normally never see this variant.
    Interrupted,
    InvalidArgument,
    InvalidSeek,
    IoError,
    IsADirectory,
    MessageSize,
    NetworkDown,
    NetworkReset,
    NetworkUnreachable,
    NoBufferSpace,
    NoChildProcess,
    NoLink,
    NoLockAvailable,
    NoMessage,
    NoProtocolOption,
    NoSpaceOnDevice,
    NoSuchDeviceOrAddress,
    NoSuchDevice,
    NoSuchFileOrDirectory,
    NoSuchProcess,
    NotADirectory,
    NotASocket,
    NotConnected,
    NotEnoughMemory,
    /// The caller cancelled an in-flight intent (§5 Cancellation).
    OperationCanceled,
    /// A non-blocking connect is still in flight. Never surfaced to a
    /// completion; the façade treats it as a write-readiness wait (§4.6).
    OperationInProgress,
    OperationNotPermitted,
    OperationNotSupported,
    OwnerDead,
    PermissionDenied,
    ProtocolError,
    ProtocolNotSupported,
    ReadOnlyFileSystem,
    ResourceDeadlockWouldOccur,
    /// EAGAIN / EWOULDBLOCK. Never surfaced to a completion; the reactor
    /// translates this into suspension (enqueue the intent, clear the
    /// readiness cache bit).
    ResourceUnavailableTryAgain,
    ResultOutOfRange,
    StateNotRecoverable,
    TextFileBusy,
    TimedOut,
    TooManyFilesOpenInSystem,
    TooManyFilesOpen,
    TooManyLinks,
    TooManySymbolicLinkLevels,
    ValueTooLarge,
    WrongProtocolType,
    /// An `errno` this taxonomy does not separately name. Carries the raw
    /// value so callers can still branch on it if they must.
    Other(i32),
}

impl PosixError {
    /// Classify a raw `errno` value. Total: every `i32` maps to something.
    pub fn from_errno(errno: i32) -> PosixError {
        use PosixError::*;
        match errno {
            libc::EAFNOSUPPORT => AddressFamilyNotSupported,
            libc::EADDRINUSE => AddressInUse,
            libc::EADDRNOTAVAIL => AddressNotAvailable,
            libc::EISCONN => AlreadyConnected,
            libc::E2BIG => ArgumentListTooLong,
            libc::EDOM => ArgumentOutOfDomain,
            libc::EFAULT => BadAddress,
            libc::EBADF => BadFileDescriptor,
            libc::EBADMSG => BadMessage,
            libc::EPIPE => BrokenPipe,
            libc::ECONNABORTED => ConnectionAborted,
            libc::EALREADY => ConnectionAlreadyInProgress,
            libc::ECONNREFUSED => ConnectionRefused,
            libc::ECONNRESET => ConnectionReset,
            libc::EXDEV => CrossDeviceLink,
            libc::EDESTADDRREQ => DestinationAddressRequired,
            libc::EBUSY => DeviceOrResourceBusy,
            libc::ENOTEMPTY => DirectoryNotEmpty,
            libc::ENOEXEC => ExecutableFormatError,
            libc::EEXIST => FileExists,
            libc::EFBIG => FileTooLarge,
            libc::ENAMETOOLONG => FilenameTooLong,
            libc::ENOSYS => FunctionNotSupported,
            libc::EHOSTUNREACH => HostUnreachable,
            libc::EIDRM => IdentifierRemoved,
            libc::EILSEQ => IllegalByteSequence,
            libc::ENOTTY => InappropriateIoControlOperation,
            libc::EINTR => Interrupted,
            libc::EINVAL => InvalidArgument,
            libc::ESPIPE => InvalidSeek,
            libc::EIO => IoError,
            libc::EISDIR => IsADirectory,
            libc::EMSGSIZE => MessageSize,
            libc::ENETDOWN => NetworkDown,
            libc::ENETRESET => NetworkReset,
            libc::ENETUNREACH => NetworkUnreachable,
            libc::ENOBUFS => NoBufferSpace,
            libc::ECHILD => NoChildProcess,
            libc::ENOLINK => NoLink,
            libc::ENOLCK => NoLockAvailable,
            libc::ENOMSG => NoMessage,
            libc::ENOPROTOOPT => NoProtocolOption,
            libc::ENOSPC => NoSpaceOnDevice,
            libc::ENXIO => NoSuchDeviceOrAddress,
            libc::ENODEV => NoSuchDevice,
            libc::ENOENT => NoSuchFileOrDirectory,
            libc::ESRCH => NoSuchProcess,
            libc::ENOTDIR => NotADirectory,
            libc::ENOTSOCK => NotASocket,
            libc::ENOTCONN => NotConnected,
            libc::ENOMEM => NotEnoughMemory,
            libc::ECANCELED => OperationCanceled,
            libc::EINPROGRESS => OperationInProgress,
            libc::EPERM => OperationNotPermitted,
            libc::ENOTSUP => OperationNotSupported,
            libc::EOWNERDEAD => OwnerDead,
            libc::EACCES => PermissionDenied,
            libc::EPROTO => ProtocolError,
            libc::EPROTONOSUPPORT => ProtocolNotSupported,
            libc::EROFS => ReadOnlyFileSystem,
            libc::EDEADLK => ResourceDeadlockWouldOccur,
            libc::EAGAIN => ResourceUnavailableTryAgain,
            libc::ERANGE => ResultOutOfRange,
            libc::ENOTRECOVERABLE => StateNotRecoverable,
            libc::ETXTBSY => TextFileBusy,
            libc::ETIMEDOUT => TimedOut,
            libc::ENFILE => TooManyFilesOpenInSystem,
            libc::EMFILE => TooManyFilesOpen,
            libc::EMLINK => TooManyLinks,
            libc::ELOOP => TooManySymbolicLinkLevels,
            libc::EOVERFLOW => ValueTooLarge,
            libc::EPROTOTYPE => WrongProtocolType,
            other => Other(other),
        }
    }

    /// True for EAGAIN/EWOULDBLOCK and EINPROGRESS: the two codes the
    /// propagation policy (§7) forbids from ever reaching a completion.
    pub fn is_suspend(&self) -> bool {
        matches!(
            self,
            PosixError::ResourceUnavailableTryAgain | PosixError::OperationInProgress
        )
    }
}

impl fmt::Display for PosixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PosixError::Other(errno) => write!(f, "{}", io::Error::from_raw_os_error(*errno)),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Name-resolution outcomes, closed over the `EAI_*` constants `getaddrinfo`
/// can return, per the original `dns.cpp`'s use of `getaddrinfo`'s return
/// code alongside `errno` for the `EAI_SYSTEM` case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResolverError {
    AgainTemporarily,
    BadFlags,
    PermanentFailure,
    FamilyNotSupported,
    Memory,
    NoData,
    NoName,
    ServiceNotSupported,
    SocketTypeNotSupported,
    /// `EAI_SYSTEM`: an underlying `errno` is available and is rewritten
    /// into the corresponding [`PosixError`] by [`ErrorCode::from_eai`]
    /// (§7: "A resolver system-error is rewritten into the corresponding
    /// POSIX kind").
    System,
    Other(i32),
}

impl ResolverError {
    #[cfg(all(unix, feature = "net"))]
    pub(crate) fn from_eai(code: i32) -> ResolverError {
        use ResolverError::*;
        match code {
            libc::EAI_AGAIN => AgainTemporarily,
            libc::EAI_BADFLAGS => BadFlags,
            libc::EAI_FAIL => PermanentFailure,
            libc::EAI_FAMILY => FamilyNotSupported,
            libc::EAI_MEMORY => Memory,
            libc::EAI_NODATA => NoData,
            libc::EAI_NONAME => NoName,
            libc::EAI_SERVICE => ServiceNotSupported,
            libc::EAI_SOCKTYPE => SocketTypeNotSupported,
            libc::EAI_SYSTEM => System,
            other => Other(other),
        }
    }
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A unified error, tagged by which half of the taxonomy produced it.
///
/// `ErrorCode` supports equality comparison against either enumeration
/// directly (`err == PosixError::ConnectionReset`) via [`PartialEq`] impls
/// below, without the caller needing to match on the variant first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Posix(PosixError),
    Resolver(ResolverError),
}

impl ErrorCode {
    /// Classify a raw `errno`, as returned by a failed syscall (C5).
    pub fn from_errno(errno: i32) -> ErrorCode {
        ErrorCode::Posix(PosixError::from_errno(errno))
    }

    /// Classify a `std::io::Error` produced by a syscall wrapper.
    ///
    /// Falls back to [`PosixError::Other`] with a sentinel of `0` for
    /// errors that carry no raw OS error (these do not occur on the
    /// syscall boundary this crate uses, since every `io::Error` it
    /// produces comes from `io::Error::last_os_error()`, but the
    /// conversion stays total).
    pub fn from_io_error(err: &io::Error) -> ErrorCode {
        ErrorCode::Posix(PosixError::from_errno(err.raw_os_error().unwrap_or(0)))
    }

    /// True for the two codes the propagation policy (§7) translates into
    /// suspension rather than surfacing as a completion error.
    pub fn is_suspend(&self) -> bool {
        matches!(self, ErrorCode::Posix(p) if p.is_suspend())
    }

    /// A human-readable message suitable for logging. Never parsed.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Posix(p) => fmt::Display::fmt(p, f),
            ErrorCode::Resolver(r) => fmt::Display::fmt(r, f),
        }
    }
}

impl std::error::Error for ErrorCode {}

impl PartialEq<PosixError> for ErrorCode {
    fn eq(&self, other: &PosixError) -> bool {
        matches!(self, ErrorCode::Posix(p) if p == other)
    }
}

impl PartialEq<ResolverError> for ErrorCode {
    fn eq(&self, other: &ResolverError) -> bool {
        matches!(self, ErrorCode::Resolver(r) if r == other)
    }
}

impl From<PosixError> for ErrorCode {
    fn from(p: PosixError) -> ErrorCode {
        ErrorCode::Posix(p)
    }
}

impl From<ResolverError> for ErrorCode {
    fn from(r: ResolverError) -> ErrorCode {
        ErrorCode::Resolver(r)
    }
}

/// Converts an `io::Error` coming off a syscall wrapper into the closed
/// taxonomy. This is the one place `io::Error` and `ErrorCode` meet.
impl From<io::Error> for ErrorCode {
    fn from(err: io::Error) -> ErrorCode {
        ErrorCode::from_io_error(&err)
    }
}

/// A `Result` whose error half is the unified [`ErrorCode`].
pub type Result<T> = std::result::Result<T, ErrorCode>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_errno_is_total_and_stable() {
        assert_eq!(
            PosixError::from_errno(libc::ECONNRESET),
            PosixError::ConnectionReset
        );
        assert!(matches!(PosixError::from_errno(999_999), PosixError::Other(999_999)));
    }

    #[test]
    fn would_block_and_in_progress_are_marked_suspend() {
        assert!(ErrorCode::from_errno(libc::EAGAIN).is_suspend());
        assert!(ErrorCode::from_errno(libc::EINPROGRESS).is_suspend());
        assert!(!ErrorCode::from_errno(libc::ECONNRESET).is_suspend());
    }

    #[test]
    fn equality_against_either_enumeration() {
        let err = ErrorCode::Posix(PosixError::ConnectionReset);
        assert_eq!(err, PosixError::ConnectionReset);
        let err = ErrorCode::Resolver(ResolverError::NoName);
        assert_eq!(err, ResolverError::NoName);
    }
}
