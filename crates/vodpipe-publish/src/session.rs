//! Resumable upload session state.

/// Protocol state for one publish attempt.
///
/// Created when the session is initiated and discarded on terminal success
/// or failure; never persisted. A lost session (404-class response) cannot
/// be revived; the caller starts over with a fresh session from byte 0.
#[derive(Debug)]
pub struct UploadSession {
    /// Session URI assigned by the platform at initiation.
    pub session_uri: String,
    /// Byte offset confirmed received by the platform.
    pub confirmed_offset: u64,
    /// Total file size in bytes.
    pub total_size: u64,
    /// Consecutive transient failures since the last successful transfer.
    pub transient_failures: u32,
}

impl UploadSession {
    pub fn new(session_uri: String, total_size: u64) -> Self {
        Self {
            session_uri,
            confirmed_offset: 0,
            total_size,
            transient_failures: 0,
        }
    }

    /// Record platform-confirmed progress and reset the failure streak.
    pub fn confirm(&mut self, offset: u64) {
        self.confirmed_offset = offset.min(self.total_size);
        self.transient_failures = 0;
    }

    /// Record a transient failure, returning the new streak length.
    pub fn record_transient(&mut self) -> u32 {
        self.transient_failures += 1;
        self.transient_failures
    }
}

/// Parse a `Range: bytes=0-N` response header into the next offset (N+1).
pub fn offset_from_range_header(value: &str) -> Option<u64> {
    let (_, end) = value.trim().strip_prefix("bytes=")?.split_once('-')?;
    end.parse::<u64>().ok().map(|n| n + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_resets_failures() {
        let mut session = UploadSession::new("https://platform/session/1".into(), 100);
        session.record_transient();
        session.record_transient();
        assert_eq!(session.transient_failures, 2);

        session.confirm(42);
        assert_eq!(session.confirmed_offset, 42);
        assert_eq!(session.transient_failures, 0);
    }

    #[test]
    fn test_confirm_clamps_to_total() {
        let mut session = UploadSession::new("uri".into(), 100);
        session.confirm(500);
        assert_eq!(session.confirmed_offset, 100);
    }

    #[test]
    fn test_offset_from_range_header() {
        assert_eq!(offset_from_range_header("bytes=0-524287"), Some(524288));
        assert_eq!(offset_from_range_header("bytes=0-0"), Some(1));
        assert_eq!(offset_from_range_header("garbage"), None);
    }
}
