//! Per-message attachment handling: pick a target path, settle collisions,
//! ask for confirmation, then transfer with cleanup on interrupt.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Abort, Skip, TransferError};
use crate::models::{MessageRecord, attachment_filename};
use crate::prompt::{Prompter, Reply};

/// Media transfer capability of the messaging client.
#[allow(async_fn_in_trait)]
pub trait Transfer {
    /// Whatever the client needs to fetch one attachment.
    type Handle;

    /// Write the attachment to `target`, calling `progress(received, expected)` as bytes arrive.
    async fn transfer(
        &self,
        handle: &Self::Handle,
        target: &Path,
        expected: Option<u64>,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<(), TransferError>;
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub download_dir: PathBuf,
    /// Ask before retrying a collision under an id-prefixed name.
    pub interactive: bool,
    /// Pre-accept the per-file confirmation.
    pub assume_yes: bool,
    /// Case-insensitive filter over the message's JSON rendering.
    pub search: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub downloaded: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub enum Outcome {
    Downloaded(PathBuf),
    Skipped(Skip),
}

enum Resolved {
    Target(PathBuf),
    Skipped(Skip),
}

pub struct Downloader<'a, T, P> {
    transfer: &'a T,
    prompter: &'a mut P,
    options: DownloadOptions,
    cancel: CancellationToken,
    summary: Summary,
}

impl<'a, T: Transfer, P: Prompter> Downloader<'a, T, P> {
    pub fn new(transfer: &'a T, prompter: &'a mut P, options: DownloadOptions, cancel: CancellationToken) -> Self {
        Self {
            transfer,
            prompter,
            options,
            cancel,
            summary: Summary::default(),
        }
    }

    pub fn summary(&self) -> Summary {
        self.summary
    }

    /// Process one message. Only an `Abort` ends the run; everything else is a logged skip.
    pub async fn handle(&mut self, record: &MessageRecord, handle: &T::Handle) -> Result<Outcome, Abort> {
        if self.cancel.is_cancelled() {
            return Err(Abort::Interrupted { removed: None });
        }

        let outcome = self.process(record, handle).await?;
        match &outcome {
            Outcome::Downloaded(path) => {
                self.summary.downloaded += 1;
                info!(message_id = record.id, path = %path.display(), "downloaded");
            }
            Outcome::Skipped(skip) => {
                self.summary.skipped += 1;
                match skip {
                    // Structural skips already warned with the raw payload.
                    Skip::FilteredOut | Skip::TextOnly | Skip::NoFilename | Skip::Structural(_) => {
                        debug!(message_id = record.id, reason = %skip, "skipped")
                    }
                    Skip::Transfer(_) => warn!(message_id = record.id, reason = %skip, "skipped"),
                    _ => info!(message_id = record.id, reason = %skip, "skipped"),
                }
            }
        }
        Ok(outcome)
    }

    async fn process(&mut self, record: &MessageRecord, handle: &T::Handle) -> Result<Outcome, Abort> {
        if let Some(needle) = &self.options.search
            && !record.matches_search(needle)
        {
            return Ok(Outcome::Skipped(Skip::FilteredOut));
        }

        let Some(media) = &record.media else {
            debug!(message_id = record.id, message = %record.to_json_pretty(), "text-only message");
            return Ok(Outcome::Skipped(Skip::TextOnly));
        };

        let attributes = match media.attributes() {
            Ok(attributes) => attributes,
            Err(e) => {
                warn!(message_id = record.id, error = %e, raw = %record.to_json(), "unexpected media structure");
                return Ok(Outcome::Skipped(e.into()));
            }
        };

        let Some(filename) = attachment_filename(attributes).and_then(final_component) else {
            debug!(message_id = record.id, raw = %record.to_json(), "couldn't find a filename");
            return Ok(Outcome::Skipped(Skip::NoFilename));
        };
        debug!(message_id = record.id, filename = %filename, "found attachment");

        let target = match self.resolve_target(record.id, filename)? {
            Resolved::Target(target) => target,
            Resolved::Skipped(skip) => return Ok(Outcome::Skipped(skip)),
        };

        if !self.options.assume_yes {
            match self.prompter.confirm(&format!("Download {filename}?"), true)? {
                Reply::Answer(true) => {}
                Reply::Answer(false) => return Ok(Outcome::Skipped(Skip::Declined)),
                Reply::Cancelled => return Err(Abort::Cancelled),
                Reply::Interrupted => return Err(interrupted(&target)),
            }
        }

        self.fetch(record.id, media.size(), handle, target).await
    }

    /// Collision handling: a free target is used as-is; a taken one is either
    /// skipped or, interactively, retried once as `<message id>-<filename>`.
    fn resolve_target(&mut self, message_id: i32, filename: &str) -> Result<Resolved, Abort> {
        let target = self.options.download_dir.join(filename);
        if !target.exists() {
            return Ok(Resolved::Target(target));
        }

        if !self.options.interactive {
            return Ok(Resolved::Skipped(Skip::AlreadyDownloaded(target)));
        }

        let question = format!(
            "Filename already exists: {}, do you want to try the message id based name?",
            target.display()
        );
        match self.prompter.confirm(&question, false)? {
            Reply::Answer(true) => {}
            Reply::Interrupted => return Err(Abort::Interrupted { removed: None }),
            Reply::Answer(false) | Reply::Cancelled => {
                return Ok(Resolved::Skipped(Skip::CollisionUnresolved(target)));
            }
        }

        let fallback = self.options.download_dir.join(format!("{message_id}-{filename}"));
        if fallback.exists() {
            return Ok(Resolved::Skipped(Skip::CollisionUnresolved(fallback)));
        }
        Ok(Resolved::Target(fallback))
    }

    async fn fetch(
        &mut self,
        message_id: i32,
        expected: Option<u64>,
        handle: &T::Handle,
        target: PathBuf,
    ) -> Result<Outcome, Abort> {
        info!(message_id, path = %target.display(), "downloading");

        let transfer = self.transfer;
        let cancel = self.cancel.clone();
        let mut received = 0u64;
        let mut progress = |bytes: u64, total: Option<u64>| {
            received = bytes;
            match total.filter(|&t| t > 0) {
                Some(total) => {
                    let percent = 100.0 * bytes as f64 / total as f64;
                    debug!(total, percent = format!("{percent:.2}"), "download progress");
                }
                None => debug!(received = bytes, "download progress"),
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = transfer.transfer(handle, &target, expected, &mut progress) => Some(result),
        };

        match result {
            None => {
                warn!(path = %target.display(), "you interrupted this, removing partial file");
                Err(interrupted(&target))
            }
            Some(Ok(())) => match expected {
                Some(total) if received < total => Ok(Outcome::Skipped(Skip::Transfer(TransferError::Truncated {
                    received,
                    total,
                }))),
                _ => Ok(Outcome::Downloaded(target)),
            },
            // Partial files are left in place here, unlike the interrupt path.
            Some(Err(e)) => Ok(Outcome::Skipped(Skip::Transfer(e))),
        }
    }
}

/// Remove whatever was written to `target` and build the abort.
fn interrupted(target: &Path) -> Abort {
    let removed = match std::fs::remove_file(target) {
        Ok(()) => Some(target.to_path_buf()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %target.display(), error = %e, "failed to remove partial file");
            None
        }
    };
    Abort::Interrupted { removed }
}

/// Platform filenames are untrusted: keep only the last path component.
fn final_component(name: &str) -> Option<&str> {
    Path::new(name).file_name().and_then(|n| n.to_str()).filter(|n| !n.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::{Layer, Registry};

    use super::*;
    use crate::error::StructuralMediaError;
    use crate::models::{DocumentAttribute, DocumentRecord, MediaRecord};
    use crate::prompt::scripted::{ScriptedPrompter, Step};

    enum Behaviour {
        Complete,
        /// Writes `written` bytes and reports them, then returns Ok.
        ShortRead { written: u64 },
        /// Writes a partial file, fires the interrupt, never finishes.
        Interrupt(CancellationToken),
        Fail,
    }

    struct FakeTransfer {
        behaviour: Behaviour,
        writes: Mutex<Vec<PathBuf>>,
    }

    impl FakeTransfer {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                writes: Mutex::new(Vec::new()),
            }
        }

        fn writes(&self) -> Vec<PathBuf> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl Transfer for FakeTransfer {
        type Handle = Vec<u8>;

        async fn transfer(
            &self,
            handle: &Vec<u8>,
            target: &Path,
            expected: Option<u64>,
            progress: &mut dyn FnMut(u64, Option<u64>),
        ) -> Result<(), TransferError> {
            self.writes.lock().unwrap().push(target.to_path_buf());
            match &self.behaviour {
                Behaviour::Complete => {
                    std::fs::write(target, handle)?;
                    progress(handle.len() as u64, expected);
                    Ok(())
                }
                Behaviour::ShortRead { written } => {
                    std::fs::write(target, &handle[..*written as usize])?;
                    progress(*written, expected);
                    Ok(())
                }
                Behaviour::Interrupt(token) => {
                    std::fs::write(target, &handle[..1])?;
                    progress(1, expected);
                    token.cancel();
                    std::future::pending::<()>().await;
                    Ok(())
                }
                Behaviour::Fail => Err(TransferError::Request("FILE_REFERENCE_EXPIRED".to_string())),
            }
        }
    }

    const PAYLOAD: &[u8] = b"jpegdata";

    fn options(dir: &Path) -> DownloadOptions {
        DownloadOptions {
            download_dir: dir.to_path_buf(),
            interactive: false,
            assume_yes: false,
            search: None,
        }
    }

    fn text_message(id: i32) -> MessageRecord {
        MessageRecord {
            id,
            date: Utc::now(),
            text: "hello".to_string(),
            media: None,
        }
    }

    fn media_message(id: i32, attributes: Option<Vec<DocumentAttribute>>) -> MessageRecord {
        MessageRecord {
            id,
            date: Utc::now(),
            text: String::new(),
            media: Some(MediaRecord {
                kind: "document".to_string(),
                document: Some(DocumentRecord {
                    id: 99,
                    mime_type: "image/jpeg".to_string(),
                    size: PAYLOAD.len() as i64,
                    attributes,
                }),
            }),
        }
    }

    fn file_message(id: i32, name: &str) -> MessageRecord {
        media_message(
            id,
            Some(vec![
                DocumentAttribute::Other {
                    kind: "image_size".to_string(),
                },
                DocumentAttribute::Filename {
                    file_name: name.to_string(),
                },
            ]),
        )
    }

    fn dir_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn text_only_message_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([]);
        let mut dl = Downloader::new(&transfer, &mut prompter, options(tmp.path()), CancellationToken::new());

        let outcome = dl.handle(&text_message(1), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(outcome, Outcome::Skipped(Skip::TextOnly)));
        assert!(transfer.writes().is_empty());
        assert_eq!(dir_entries(tmp.path()), 0);
        assert_eq!(dl.summary(), Summary { downloaded: 0, skipped: 1 });
    }

    #[tokio::test]
    async fn photo_without_document_is_structural_skip() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([]);
        let mut dl = Downloader::new(&transfer, &mut prompter, options(tmp.path()), CancellationToken::new());

        let mut record = text_message(2);
        record.media = Some(MediaRecord {
            kind: "photo".to_string(),
            document: None,
        });
        let outcome = dl.handle(&record, &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(
            outcome,
            Outcome::Skipped(Skip::Structural(StructuralMediaError::MissingDocument))
        ));

        let outcome = dl.handle(&media_message(3, None), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(
            outcome,
            Outcome::Skipped(Skip::Structural(StructuralMediaError::MissingAttributes))
        ));
        assert!(transfer.writes().is_empty());
    }

    /// Counts warn-level events.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn structural_skip_warns_once() {
        let warns = Arc::new(AtomicUsize::new(0));
        let _guard = tracing::subscriber::set_default(Registry::default().with(WarnCounter(warns.clone())));

        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([]);
        let mut dl = Downloader::new(&transfer, &mut prompter, options(tmp.path()), CancellationToken::new());

        let outcome = dl.handle(&media_message(3, None), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(outcome, Outcome::Skipped(Skip::Structural(_))));
        assert_eq!(warns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unnamed_attachment_is_never_downloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([]);
        let mut opts = options(tmp.path());
        opts.assume_yes = true;
        opts.interactive = true;
        let mut dl = Downloader::new(&transfer, &mut prompter, opts, CancellationToken::new());

        let record = media_message(
            4,
            Some(vec![DocumentAttribute::Other {
                kind: "video".to_string(),
            }]),
        );
        let outcome = dl.handle(&record, &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(outcome, Outcome::Skipped(Skip::NoFilename)));
        assert!(transfer.writes().is_empty());
        assert_eq!(dir_entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn confirmed_fresh_target_is_written_once() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([Step::Confirm(Reply::Answer(true))]);
        let mut dl = Downloader::new(&transfer, &mut prompter, options(tmp.path()), CancellationToken::new());

        let outcome = dl.handle(&file_message(5, "photo.jpg"), &PAYLOAD.to_vec()).await.unwrap();
        let expected = tmp.path().join("photo.jpg");
        match outcome {
            Outcome::Downloaded(path) => assert_eq!(path, expected),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(transfer.writes(), vec![expected.clone()]);
        assert_eq!(std::fs::read(&expected).unwrap(), PAYLOAD);
        assert_eq!(dl.summary(), Summary { downloaded: 1, skipped: 0 });
        drop(dl);
        assert_eq!(prompter.remaining(), 0);
    }

    #[tokio::test]
    async fn collision_without_interaction_leaves_file_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = tmp.path().join("photo.jpg");
        std::fs::write(&existing, b"original").unwrap();

        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([]);
        let mut dl = Downloader::new(&transfer, &mut prompter, options(tmp.path()), CancellationToken::new());

        let outcome = dl.handle(&file_message(6, "photo.jpg"), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(outcome, Outcome::Skipped(Skip::AlreadyDownloaded(_))));

        // next message still gets processed
        let outcome = dl.handle(&text_message(7), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(outcome, Outcome::Skipped(Skip::TextOnly)));

        assert!(transfer.writes().is_empty());
        assert_eq!(std::fs::read(&existing).unwrap(), b"original");
        drop(dl);
        assert!(prompter.asked.is_empty());
    }

    #[tokio::test]
    async fn collision_retry_uses_message_id_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("photo.jpg"), b"original").unwrap();

        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([
            Step::Confirm(Reply::Answer(true)),
            Step::Confirm(Reply::Answer(true)),
        ]);
        let mut opts = options(tmp.path());
        opts.interactive = true;
        let mut dl = Downloader::new(&transfer, &mut prompter, opts, CancellationToken::new());

        let outcome = dl.handle(&file_message(42, "photo.jpg"), &PAYLOAD.to_vec()).await.unwrap();
        let expected = tmp.path().join("42-photo.jpg");
        assert!(matches!(outcome, Outcome::Downloaded(ref p) if *p == expected));
        assert_eq!(transfer.writes(), vec![expected]);
        assert_eq!(std::fs::read(tmp.path().join("photo.jpg")).unwrap(), b"original");
    }

    #[tokio::test]
    async fn collision_retry_declined_skips() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("photo.jpg"), b"original").unwrap();

        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([Step::Confirm(Reply::Answer(false))]);
        let mut opts = options(tmp.path());
        opts.interactive = true;
        let mut dl = Downloader::new(&transfer, &mut prompter, opts, CancellationToken::new());

        let outcome = dl.handle(&file_message(42, "photo.jpg"), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(outcome, Outcome::Skipped(Skip::CollisionUnresolved(_))));
        assert!(transfer.writes().is_empty());
    }

    #[tokio::test]
    async fn collision_retry_has_only_one_fallback_level() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("photo.jpg"), b"original").unwrap();
        std::fs::write(tmp.path().join("42-photo.jpg"), b"earlier").unwrap();

        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([Step::Confirm(Reply::Answer(true))]);
        let mut opts = options(tmp.path());
        opts.interactive = true;
        let mut dl = Downloader::new(&transfer, &mut prompter, opts, CancellationToken::new());

        let outcome = dl.handle(&file_message(42, "photo.jpg"), &PAYLOAD.to_vec()).await.unwrap();
        match outcome {
            Outcome::Skipped(Skip::CollisionUnresolved(path)) => {
                assert_eq!(path, tmp.path().join("42-photo.jpg"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(transfer.writes().is_empty());
        assert_eq!(std::fs::read(tmp.path().join("42-photo.jpg")).unwrap(), b"earlier");
        drop(dl);
        assert_eq!(prompter.asked.len(), 1);
    }

    #[tokio::test]
    async fn declined_confirmation_skips_only_that_message() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([
            Step::Confirm(Reply::Answer(false)),
            Step::Confirm(Reply::Answer(true)),
        ]);
        let mut dl = Downloader::new(&transfer, &mut prompter, options(tmp.path()), CancellationToken::new());

        let first = dl.handle(&file_message(1, "a.pdf"), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(first, Outcome::Skipped(Skip::Declined)));
        let second = dl.handle(&file_message(2, "b.pdf"), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(second, Outcome::Downloaded(_)));
        assert_eq!(transfer.writes(), vec![tmp.path().join("b.pdf")]);
    }

    #[tokio::test]
    async fn cancelled_confirmation_halts_the_run() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([Step::Confirm(Reply::Cancelled)]);
        let mut dl = Downloader::new(&transfer, &mut prompter, options(tmp.path()), CancellationToken::new());

        let messages = [file_message(1, "a.pdf"), file_message(2, "b.pdf"), file_message(3, "c.pdf")];
        let mut processed = 0;
        let result: Result<(), Abort> = async {
            for message in &messages {
                dl.handle(message, &PAYLOAD.to_vec()).await?;
                processed += 1;
            }
            Ok(())
        }
        .await;

        assert!(matches!(result, Err(Abort::Cancelled)));
        assert_eq!(processed, 0);
        assert!(transfer.writes().is_empty());
        assert_eq!(dir_entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn assume_yes_skips_confirmation() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([]);
        let mut opts = options(tmp.path());
        opts.assume_yes = true;
        let mut dl = Downloader::new(&transfer, &mut prompter, opts, CancellationToken::new());

        let outcome = dl.handle(&file_message(1, "a.pdf"), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(outcome, Outcome::Downloaded(_)));
        drop(dl);
        assert!(prompter.asked.is_empty());
    }

    #[tokio::test]
    async fn search_filter_skips_non_matching() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([]);
        let mut opts = options(tmp.path());
        opts.assume_yes = true;
        opts.search = Some("REPORT".to_string());
        let mut dl = Downloader::new(&transfer, &mut prompter, opts, CancellationToken::new());

        let skipped = dl.handle(&file_message(1, "holiday.jpg"), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(skipped, Outcome::Skipped(Skip::FilteredOut)));
        let taken = dl.handle(&file_message(2, "q3-report.pdf"), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(taken, Outcome::Downloaded(_)));
        assert_eq!(transfer.writes(), vec![tmp.path().join("q3-report.pdf")]);
    }

    #[tokio::test]
    async fn truncated_transfer_is_skipped_and_run_continues() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::ShortRead { written: 3 });
        let mut prompter = ScriptedPrompter::new([]);
        let mut opts = options(tmp.path());
        opts.assume_yes = true;
        let mut dl = Downloader::new(&transfer, &mut prompter, opts, CancellationToken::new());

        let outcome = dl.handle(&file_message(1, "a.pdf"), &PAYLOAD.to_vec()).await.unwrap();
        match outcome {
            Outcome::Skipped(Skip::Transfer(TransferError::Truncated { received, total })) => {
                assert_eq!(received, 3);
                assert_eq!(total, PAYLOAD.len() as u64);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // partial file stays behind
        assert!(tmp.path().join("a.pdf").exists());

        let next = dl.handle(&text_message(2), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(next, Outcome::Skipped(Skip::TextOnly)));
    }

    #[tokio::test]
    async fn failed_transfer_is_isolated() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Fail);
        let mut prompter = ScriptedPrompter::new([]);
        let mut opts = options(tmp.path());
        opts.assume_yes = true;
        let mut dl = Downloader::new(&transfer, &mut prompter, opts, CancellationToken::new());

        let outcome = dl.handle(&file_message(1, "a.pdf"), &PAYLOAD.to_vec()).await.unwrap();
        assert!(matches!(outcome, Outcome::Skipped(Skip::Transfer(TransferError::Request(_)))));
        assert_eq!(dl.summary().skipped, 1);
    }

    #[tokio::test]
    async fn interrupt_mid_transfer_removes_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let transfer = FakeTransfer::new(Behaviour::Interrupt(cancel.clone()));
        let mut prompter = ScriptedPrompter::new([]);
        let mut opts = options(tmp.path());
        opts.assume_yes = true;
        let mut dl = Downloader::new(&transfer, &mut prompter, opts, cancel);

        let target = tmp.path().join("big.iso");
        let err = dl.handle(&file_message(1, "big.iso"), &PAYLOAD.to_vec()).await.unwrap_err();
        match err {
            Abort::Interrupted { removed } => assert_eq!(removed, Some(target.clone())),
            other => panic!("unexpected abort: {other:?}"),
        }
        assert!(!target.exists());

        // nothing further is processed once interrupted
        let err = dl.handle(&file_message(2, "next.iso"), &PAYLOAD.to_vec()).await.unwrap_err();
        assert!(matches!(err, Abort::Interrupted { removed: None }));
        assert_eq!(transfer.writes(), vec![target]);
    }

    #[tokio::test]
    async fn interrupt_at_confirmation_aborts_without_files() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([Step::Confirm(Reply::Interrupted)]);
        let mut dl = Downloader::new(&transfer, &mut prompter, options(tmp.path()), CancellationToken::new());

        let err = dl.handle(&file_message(1, "a.pdf"), &PAYLOAD.to_vec()).await.unwrap_err();
        assert!(matches!(err, Abort::Interrupted { removed: None }));
        assert!(transfer.writes().is_empty());
    }

    #[tokio::test]
    async fn path_in_filename_stays_inside_download_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let transfer = FakeTransfer::new(Behaviour::Complete);
        let mut prompter = ScriptedPrompter::new([]);
        let mut opts = options(tmp.path());
        opts.assume_yes = true;
        let mut dl = Downloader::new(&transfer, &mut prompter, opts, CancellationToken::new());

        let outcome = dl
            .handle(&file_message(1, "../../etc/evil.sh"), &PAYLOAD.to_vec())
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Downloaded(ref p) if *p == tmp.path().join("evil.sh")));
    }

    #[test]
    fn final_component_rejects_empty_names() {
        assert_eq!(final_component("photo.jpg"), Some("photo.jpg"));
        assert_eq!(final_component("a/b/c.txt"), Some("c.txt"));
        assert_eq!(final_component(""), None);
        assert_eq!(final_component(".."), None);
    }
}
