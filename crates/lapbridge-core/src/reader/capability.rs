// ── Reader capability flags ──
//
// Compatibility shim: the lap-timing firmware only reports usable phase
// values when the phase-diff operation flag is set, and older reader
// configurations ship with it off. It is forced on before every stream
// start. Nothing else in the crate touches operation flags.

use tracing::debug;

use super::ReaderTransport;
use crate::error::ReaderError;

/// Operation flag enabling per-read phase difference reporting.
pub const PHASE_DIFF_OPFLAG: u32 = 1 << 17;

/// Set [`PHASE_DIFF_OPFLAG`] on the reader, leaving other flags untouched.
///
/// Skips the write when the bit is already set.
pub async fn negotiate_phase_diff<R: ReaderTransport>(reader: &R) -> Result<(), ReaderError> {
    let flags = reader.op_flags().await?;
    if flags & PHASE_DIFF_OPFLAG != 0 {
        debug!(flags = format_args!("{flags:#x}"), "phase-diff already enabled");
        return Ok(());
    }

    let updated = flags | PHASE_DIFF_OPFLAG;
    debug!(
        from = format_args!("{flags:#x}"),
        to = format_args!("{updated:#x}"),
        "enabling phase-diff"
    );
    reader.set_op_flags(updated).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::reader::{SimReader, event_channel};

    #[tokio::test]
    async fn sets_bit_and_keeps_others() {
        let (tx, _rx) = event_channel();
        let reader = SimReader::new(tx);
        reader.connect().await.unwrap();
        reader.set_op_flags(0b101).await.unwrap();

        negotiate_phase_diff(&reader).await.unwrap();

        assert_eq!(reader.op_flags().await.unwrap(), 0b101 | PHASE_DIFF_OPFLAG);
    }

    #[tokio::test]
    async fn already_set_is_untouched() {
        let (tx, _rx) = event_channel();
        let reader = SimReader::new(tx);
        reader.connect().await.unwrap();
        reader.set_op_flags(PHASE_DIFF_OPFLAG).await.unwrap();
        let writes_before = reader.calls().iter().filter(|c| c.starts_with("set_op_flags")).count();

        negotiate_phase_diff(&reader).await.unwrap();

        let writes_after = reader.calls().iter().filter(|c| c.starts_with("set_op_flags")).count();
        assert_eq!(writes_before, writes_after);
    }

    #[tokio::test]
    async fn propagates_reader_failure() {
        let (tx, _rx) = event_channel();
        let reader = SimReader::new(tx);
        let err = negotiate_phase_diff(&reader).await.unwrap_err();
        assert!(matches!(err, ReaderError::NotConnected));
    }
}
