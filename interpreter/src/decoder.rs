use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use xyzzy_protocol::Output;

use crate::error::DecodeError;
use crate::input_router::InputRouter;
use crate::lifecycle::Lifecycle;
use crate::window_cache::WindowStateCache;

/// Upper bound for bytes buffered while waiting for a frame to complete.
pub const MAX_PENDING_BYTES: usize = 8 * 1024 * 1024;

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Splits a byte stream into JSON frames.
///
/// Frames have no length prefix or delimiter beyond JSON's own structure, so bytes are buffered
/// until a complete value parses. A malformed frame discards everything buffered so far.
///
/// An object can only complete on a closing brace, so an incomplete buffer is re-parsed only once
/// newly pushed bytes contain one or a newline. The newline lets junk lines fail before the next
/// frame arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    pending: Vec<u8>,
    /// Prefix of `pending` already known not to hold a complete frame.
    incomplete: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Number of buffered bytes that are not just whitespace.
    pub fn pending_len(&self) -> usize {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            0
        } else {
            self.pending.len()
        }
    }

    /// Returns the next complete frame, a decode error for a malformed one, or `None` when more
    /// bytes are needed.
    pub fn next_frame(&mut self) -> Option<Result<Output, DecodeError>> {
        if self.pending.is_empty() {
            return None;
        }
        if !self.pending[self.incomplete..]
            .iter()
            .any(|byte| matches!(byte, b'}' | b'\n'))
        {
            self.incomplete = self.pending.len();
            return self.check_oversized();
        }

        let (next, consumed) = {
            let mut frames =
                serde_json::Deserializer::from_slice(&self.pending).into_iter::<Output>();
            let next = frames.next();
            (next, frames.byte_offset())
        };

        match next {
            Some(Ok(output)) => {
                self.pending.drain(..consumed);
                self.incomplete = 0;
                Some(Ok(output))
            }
            Some(Err(err)) if err.is_eof() => {
                self.incomplete = self.pending.len();
                self.check_oversized()
            }
            Some(Err(source)) => {
                let discarded = self.discard();
                Some(Err(DecodeError::Malformed { discarded, source }))
            }
            None => {
                self.discard();
                None
            }
        }
    }

    fn check_oversized(&mut self) -> Option<Result<Output, DecodeError>> {
        if self.pending.len() <= MAX_PENDING_BYTES {
            return None;
        }
        let discarded = self.discard();
        Some(Err(DecodeError::Oversized {
            limit: MAX_PENDING_BYTES,
            discarded,
        }))
    }

    fn discard(&mut self) -> usize {
        self.incomplete = 0;
        std::mem::take(&mut self.pending).len()
    }
}

/// Consumes interpreter stdout: decodes frames, reconciles them, updates the input router and
/// forwards them to the bounded output channel.
pub(crate) struct DecodeTask {
    pub(crate) cache: WindowStateCache,
    pub(crate) router: InputRouter,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) output_tx: mpsc::Sender<Output>,
    pub(crate) killing: CancellationToken,
}

impl DecodeTask {
    /// Runs until end of stream or until a kill is requested. The output channel closes when
    /// this returns; after a kill the remaining stdout is drained to EOF first.
    pub(crate) async fn run<R>(self, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let DecodeTask {
            mut cache,
            router,
            lifecycle,
            output_tx,
            killing,
        } = self;
        let mut decoder = FrameDecoder::new();
        let mut chunk = vec![0u8; READ_CHUNK_BYTES];

        'decode: loop {
            while let Some(next) = decoder.next_frame() {
                // A kill closes the pipes underneath us; that is not a protocol fault.
                if killing.is_cancelled() {
                    break 'decode;
                }

                let mut output = match next {
                    Ok(output) => output,
                    Err(err) => {
                        warn!(error = %err, "skipping undecodable frame");
                        continue;
                    }
                };

                if output.is_error() {
                    warn!(
                        generation = output.generation,
                        error_message = output.message.as_deref().unwrap_or_default(),
                        "interpreter reported an error"
                    );
                }

                cache.reconcile(&mut output);
                router.observe(&output);
                if lifecycle.mark_running() {
                    info!("interpreter is running");
                }

                tokio::select! {
                    biased;
                    _ = killing.cancelled() => break 'decode,
                    sent = output_tx.send(output) => {
                        if sent.is_err() {
                            debug!("output receiver dropped; discarding further frames");
                            break 'decode;
                        }
                    }
                }
            }

            let read = tokio::select! {
                biased;
                _ = killing.cancelled() => break 'decode,
                read = reader.read(&mut chunk) => read,
            };

            match read {
                Ok(0) => {
                    if killing.is_cancelled() {
                        break 'decode;
                    }
                    let truncated = decoder.pending_len();
                    if truncated > 0 {
                        warn!(bytes = truncated, "discarding truncated frame at end of stream");
                    }
                    info!("interpreter closed stdout");
                    return;
                }
                Ok(n) => decoder.push(&chunk[..n]),
                Err(err) => {
                    if killing.is_cancelled() {
                        break 'decode;
                    }
                    error!(error = %err, "reading interpreter stdout");
                    return;
                }
            }
        }

        drop(output_tx);
        info!("stopped decoding interpreter output");
        match tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
            Ok(bytes) => debug!(bytes, "drained interpreter stdout"),
            Err(err) => debug!(error = %err, "draining interpreter stdout"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::task::Context;
    use std::task::Poll;

    use pretty_assertions::assert_eq;
    use tokio::io::ReadBuf;
    use xyzzy_protocol::SpanStyle;

    use super::*;
    use crate::input_router::InputTarget;
    use crate::lifecycle::SessionState;

    const FIRST_FRAME: &str = r#"{"type":"update","gen":1,"windows":[{"ID":1,"Type":"buffer","Left":0,"Top":0,"Width":80,"Height":25}],"content":[{"ID":1,"Text":[{"Content":[{"Style":"normal","Text":"Hello."}]}]}],"input":[{"ID":1,"Gen":1,"Type":"line","MaxLen":80}]}"#;
    const SECOND_FRAME: &str = r#"{"type":"update","gen":2,"content":[{"ID":1,"Text":[{"Content":[{"Style":"emphasized","Text":"Again."}]}]}]}"#;

    /// Yields exactly one queued chunk per read, then EOF.
    struct ChunkedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkedReader {
        fn new(chunks: &[&str]) -> Self {
            Self {
                chunks: chunks.iter().map(|chunk| chunk.as_bytes().to_vec()).collect(),
            }
        }
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if let Some(chunk) = self.chunks.pop_front() {
                buf.put_slice(&chunk);
            }
            Poll::Ready(Ok(()))
        }
    }

    fn decode_task(router: InputRouter) -> (DecodeTask, mpsc::Receiver<Output>, CancellationToken) {
        let (output_tx, output_rx) = mpsc::channel(5);
        let killing = CancellationToken::new();
        let lifecycle = Lifecycle::new();
        lifecycle.set(SessionState::Started);
        let task = DecodeTask {
            cache: WindowStateCache::new(),
            router,
            lifecycle,
            output_tx,
            killing: killing.clone(),
        };
        (task, output_rx, killing)
    }

    async fn collect(mut output_rx: mpsc::Receiver<Output>) -> Vec<Output> {
        let mut outputs = Vec::new();
        while let Some(output) = output_rx.recv().await {
            outputs.push(output);
        }
        outputs
    }

    fn first_text(output: &Output, window: u32) -> Option<(SpanStyle, String)> {
        let content = output.window(window)?.content.as_ref()?;
        let span = content.text.first()?.content.first()?;
        Some((span.style, span.text.clone()))
    }

    #[test]
    fn decodes_back_to_back_frames_from_one_chunk() {
        let mut decoder = FrameDecoder::new();
        decoder.push(format!("{FIRST_FRAME}\n{SECOND_FRAME}\n").as_bytes());

        let first = decoder.next_frame().expect("first").expect("decode first");
        let second = decoder.next_frame().expect("second").expect("decode second");

        assert_eq!((first.generation, second.generation), (1, 2));
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn waits_for_frame_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        let (head, tail) = FIRST_FRAME.split_at(40);

        decoder.push(head.as_bytes());
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.pending_len(), 40);

        decoder.push(tail.as_bytes());
        let output = decoder.next_frame().expect("frame").expect("decode");
        assert_eq!(output.generation, 1);
    }

    #[test]
    fn malformed_frame_discards_buffer_then_recovers() {
        let mut decoder = FrameDecoder::new();
        decoder.push(br#"{"type":"update","gen":oops} trailing"#);

        let err = decoder.next_frame().expect("error").expect_err("malformed");
        assert!(matches!(err, DecodeError::Malformed { discarded: 37, .. }));
        assert!(decoder.next_frame().is_none());

        decoder.push(SECOND_FRAME.as_bytes());
        let output = decoder.next_frame().expect("frame").expect("decode");
        assert_eq!(output.generation, 2);
    }

    #[test]
    fn oversized_pending_frame_is_discarded() {
        let mut decoder = FrameDecoder::new();
        decoder.push(br#"{"type":"update","gen":1,"message":""#);
        decoder.push(&vec![b'x'; MAX_PENDING_BYTES]);

        let err = decoder.next_frame().expect("error").expect_err("oversized");
        assert!(matches!(
            err,
            DecodeError::Oversized {
                limit: MAX_PENDING_BYTES,
                discarded,
            } if discarded > MAX_PENDING_BYTES
        ));
        assert_eq!(decoder.pending_len(), 0);

        decoder.push(SECOND_FRAME.as_bytes());
        let output = decoder.next_frame().expect("frame").expect("decode");
        assert_eq!(output.generation, 2);
    }

    #[test]
    fn incomplete_frame_waits_for_a_closing_brace() {
        let mut decoder = FrameDecoder::new();
        let (head, tail) = FIRST_FRAME.split_at(FIRST_FRAME.len() - 1);

        decoder.push(head.as_bytes());
        assert!(decoder.next_frame().is_none());
        decoder.push(b"   ");
        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.pending_len(), head.len() + 3);

        decoder.push(tail.as_bytes());
        let output = decoder.next_frame().expect("frame").expect("decode");
        assert_eq!(output.generation, 1);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn junk_line_fails_without_waiting_for_a_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"not json at all\n");

        let err = decoder.next_frame().expect("error").expect_err("malformed");
        assert!(matches!(err, DecodeError::Malformed { discarded: 16, .. }));
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn whitespace_only_buffer_yields_nothing() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"\n\n  \t");

        assert!(decoder.next_frame().is_none());
        assert_eq!(decoder.pending_len(), 0);
    }

    #[tokio::test]
    async fn end_to_end_frames_reconcile_and_route_input() {
        let router = InputRouter::default();
        let (task, output_rx, _killing) = decode_task(router.clone());

        task.run(ChunkedReader::new(&[FIRST_FRAME, SECOND_FRAME]))
            .await;
        let outputs = collect(output_rx).await;

        assert_eq!(outputs.len(), 2);
        assert_eq!(
            first_text(&outputs[0], 1),
            Some((SpanStyle::Normal, "Hello.".to_string()))
        );
        assert_eq!(
            first_text(&outputs[1], 1),
            Some((SpanStyle::Emphasized, "Again.".to_string()))
        );
        let first = outputs[0].window(1).expect("window in first frame");
        let second = outputs[1].window(1).expect("window in second frame");
        assert_eq!(
            (second.left, second.top, second.width, second.height),
            (first.left, first.top, first.width, first.height)
        );
        assert_eq!(
            router.current(),
            InputTarget {
                window: 1,
                generation: 1
            }
        );
    }

    #[tokio::test]
    async fn malformed_frame_does_not_stop_later_frames() {
        let (task, output_rx, _killing) = decode_task(InputRouter::default());

        task.run(ChunkedReader::new(&[
            FIRST_FRAME,
            r#"{"type":"update","gen":"#,
            "]}\n",
            SECOND_FRAME,
        ]))
        .await;
        let outputs = collect(output_rx).await;

        let generations: Vec<u32> = outputs.iter().map(|output| output.generation).collect();
        assert_eq!(generations, vec![1, 2]);
    }

    #[tokio::test]
    async fn truncated_frame_at_eof_closes_channel() {
        let (task, output_rx, _killing) = decode_task(InputRouter::default());

        task.run(ChunkedReader::new(&[r#"{"type":"update","gen":1,"windows":["#]))
            .await;

        assert!(collect(output_rx).await.is_empty());
    }

    #[tokio::test]
    async fn kill_closes_channel_and_drains_reader() {
        let (task, output_rx, killing) = decode_task(InputRouter::default());
        let mut reader = ChunkedReader::new(&[FIRST_FRAME, SECOND_FRAME]);
        killing.cancel();

        task.run(&mut reader).await;

        assert!(collect(output_rx).await.is_empty());
        assert!(reader.chunks.is_empty());
    }

    #[tokio::test]
    async fn kill_unblocks_a_full_output_channel() {
        let (output_tx, mut output_rx) = mpsc::channel(1);
        let killing = CancellationToken::new();
        let lifecycle = Lifecycle::new();
        lifecycle.set(SessionState::Started);
        let task = DecodeTask {
            cache: WindowStateCache::new(),
            router: InputRouter::default(),
            lifecycle: lifecycle.clone(),
            output_tx,
            killing: killing.clone(),
        };
        let frames = [FIRST_FRAME, SECOND_FRAME, SECOND_FRAME, SECOND_FRAME];
        let handle = tokio::spawn(task.run(ChunkedReader::new(&frames)));

        // Wait until the task has filled the channel and is parked on the next send.
        while lifecycle.get() != SessionState::Running {
            tokio::task::yield_now().await;
        }
        killing.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("decode task did not stop")
            .expect("decode task panicked");
        let mut received = 0;
        while output_rx.recv().await.is_some() {
            received += 1;
        }
        assert!(received <= 1, "received {received} frames after kill");
    }
}
