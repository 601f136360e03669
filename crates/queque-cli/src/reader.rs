use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Reads lines from `reader` on a background task and forwards them over a
/// bounded channel, so producing can batch lines while stdin is still open.
///
/// Lines are sent without the trailing newline. The task stops at EOF, on the
/// first I/O error (logged), or as soon as the receiver is dropped. When the
/// channel is full the reader waits, which keeps a fast stdin from running
/// ahead of slow send calls.
pub fn concurrent_lines<R: AsyncRead + Unpin + Send + 'static>(
    reader: R,
    channel_capacity: usize,
) -> (JoinHandle<()>, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel::<String>(channel_capacity);
    let buffer = BufReader::new(reader);

    let task = tokio::spawn(async move {
        let mut lines = buffer.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Err(e) = tx.send(line).await {
                        log::debug!("line receiver dropped, stopping reader: {e}");
                        break;
                    }
                }
                Ok(None) => {
                    log::trace!("reached EOF, exiting reader task");
                    break;
                }
                Err(e) => {
                    log::error!("I/O error while reading lines: {e}. Stopping reader.");
                    break;
                }
            }
        }
    });

    (task, rx)
}
