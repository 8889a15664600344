//! Step-wise batch render engine.
//!
//! [`BatchRenderDriver`] owns the host for the duration of a run and processes one work item per
//! [`BatchRenderDriver::step`] call, so a caller's event loop can repaint or poll for cancellation
//! between items. [`BatchRenderDriver::run_to_end`] pumps the steps in a loop for callers that do
//! not need that.

pub mod progress;
pub mod state;

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::Instant;

use chrono::NaiveDateTime;

use crate::channel::ChannelSelection;
use crate::foundation::core::FrameNumber;
use crate::foundation::error::{FramepassError, FramepassResult};
use crate::host::{RenderHost, RenderedImage, document_stem};
use crate::naming::{FilenamePattern, RenderContext, sanitize_file_stem};
use crate::output::format::OutputFormat;
use crate::output::locate::{ensure_writable, resolve_output_dir};
use crate::output::writer::{DiskWriter, ImageWriter};
use crate::pipeline::configurator::ChannelScope;
use crate::plan::{RenderPlan, WorkItem};

pub use progress::{ItemStatus, ProgressEvent, RunSummary};
pub use state::{CancelToken, DriverState};

/// Knobs for a batch run.
#[derive(Clone, Debug)]
pub struct DriverOpts {
    /// Output folder. `None` uses the document's folder, then the working directory.
    pub output_dir: Option<PathBuf>,
    /// Image format for the run. `None` uses the host's render settings.
    pub format: Option<OutputFormat>,
    /// Keep render data between items for the run's duration.
    pub persistent_data: bool,
    /// Ask the host to save its render result directly when a written file cannot be found.
    pub fallback_save: bool,
}

impl Default for DriverOpts {
    fn default() -> Self {
        Self {
            output_dir: None,
            format: None,
            persistent_data: true,
            fallback_save: true,
        }
    }
}

/// Result of one [`BatchRenderDriver::step`].
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// An item was processed; more may follow.
    Progress(ProgressEvent),
    /// The run reached a terminal state.
    Finished(RunSummary),
}

/// Host settings the driver changes for a run and puts back at the end.
#[derive(Clone, Copy, Debug)]
struct HostSnapshot {
    frame: i64,
    format: OutputFormat,
    persistent_data: bool,
}

#[derive(Debug)]
struct RunState {
    plan: RenderPlan,
    index: usize,
    succeeded: usize,
    degraded: usize,
    failed: usize,
    started: Instant,
    start_time: NaiveDateTime,
    output_dir: PathBuf,
    format: OutputFormat,
    file_name: String,
    camera: Option<String>,
    view_layer: String,
    snapshot: HostSnapshot,
    last_failure: Option<(WorkItem, FramepassError)>,
}

struct ItemOutcome {
    path: PathBuf,
    status: ItemStatus,
    fallback_used: bool,
    error: Option<FramepassError>,
}

/// Sequential render engine over a [`RenderHost`].
pub struct BatchRenderDriver<H: RenderHost> {
    host: H,
    opts: DriverOpts,
    writer: Box<dyn ImageWriter>,
    cancel: CancelToken,
    progress: Option<Sender<ProgressEvent>>,
    state: DriverState,
    run: Option<RunState>,
    summary: Option<RunSummary>,
}

impl<H: RenderHost> BatchRenderDriver<H> {
    /// Idle driver writing with [`DiskWriter`].
    pub fn new(host: H, opts: DriverOpts) -> Self {
        Self {
            host,
            opts,
            writer: Box::new(DiskWriter),
            cancel: CancelToken::new(),
            progress: None,
            state: DriverState::Idle,
            run: None,
            summary: None,
        }
    }

    /// Replace the image writer.
    pub fn with_writer(mut self, writer: impl ImageWriter + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    /// Send a [`ProgressEvent`] per item to `tx`. A dropped receiver is ignored.
    pub fn with_progress(mut self, tx: Sender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Handle that cancels the current run at the next item boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Summary of the last finished run.
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Shared access to the host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Give the host back.
    pub fn into_host(self) -> H {
        self.host
    }

    /// Begin a run over `plan`.
    ///
    /// Refused while another run is in progress. Resolves and creates the output folder, checks it
    /// can be written, snapshots the host settings the run changes and clears the cancellation
    /// flag. If the output folder cannot be used the run ends `Failed` before any item is rendered.
    pub fn start(&mut self, plan: RenderPlan) -> FramepassResult<()> {
        if self.state == DriverState::Running {
            return Err(FramepassError::driver(
                "a batch render is already running on this host",
            ));
        }
        let Some(&first) = plan.items().first() else {
            return Err(FramepassError::validation("render plan has no work items"));
        };

        self.cancel.reset();
        self.summary = None;
        let started = Instant::now();
        let snapshot = HostSnapshot {
            frame: self.host.current_frame(),
            format: self.host.output_format(),
            persistent_data: self.host.persistent_data(),
        };

        let resolved = resolve_output_dir(self.opts.output_dir.as_deref(), &self.host)
            .and_then(|dir| ensure_writable(&dir).map(|()| dir));
        let output_dir = match resolved {
            Ok(dir) => dir,
            Err(err) => {
                tracing::error!(error = %err, "output folder unusable; run aborted");
                self.state = DriverState::Failed;
                self.summary = Some(RunSummary {
                    state: DriverState::Failed,
                    items_total: plan.len(),
                    items_done: 0,
                    items_succeeded: 0,
                    items_degraded: 0,
                    items_failed: 0,
                    elapsed: started.elapsed(),
                    output_dir: None,
                });
                return Err(fatal(first, err));
            }
        };

        let format = self.opts.format.unwrap_or(snapshot.format).for_stills();
        if format != snapshot.format {
            if snapshot.format.is_movie() {
                tracing::info!(from = %snapshot.format, "movie output format switched to PNG for the run");
            }
            self.host.set_output_format(format);
        }
        if self.opts.persistent_data && !snapshot.persistent_data {
            self.host.set_persistent_data(true);
        }

        tracing::info!(
            items = plan.len(),
            frames = %plan.frames(),
            channels = plan.selection().len(),
            output_dir = %output_dir.display(),
            %format,
            "batch render started"
        );

        self.run = Some(RunState {
            plan,
            index: 0,
            succeeded: 0,
            degraded: 0,
            failed: 0,
            started,
            start_time: now(),
            output_dir,
            format,
            file_name: document_stem(&self.host),
            camera: self.host.active_camera(),
            view_layer: self.host.view_layer(),
            snapshot,
            last_failure: None,
        });
        self.state = DriverState::Running;
        Ok(())
    }

    /// Process the next work item, or finish the run.
    ///
    /// Cancellation is observed here, before an item starts. A renderer failure ends the run
    /// `Failed` and is returned as [`FramepassError::Fatal`]; the summary is still recorded. So does
    /// reaching the end of a plan in which no item could be written.
    pub fn step(&mut self) -> FramepassResult<Step> {
        let Some(run) = self.run.as_mut() else {
            return Err(FramepassError::driver("no batch render in progress"));
        };

        if self.cancel.is_cancelled() {
            tracing::info!(done = run.index, total = run.plan.len(), "batch render cancelled");
            return Ok(Step::Finished(self.finish(DriverState::Cancelled)));
        }
        let Some(&item) = run.plan.items().get(run.index) else {
            if run.failed == run.index
                && let Some((last, err)) = run.last_failure.take()
            {
                tracing::error!(failed = run.failed, "no item could be written; run failed");
                self.finish(DriverState::Failed);
                return Err(fatal(last, err));
            }
            return Ok(Step::Finished(self.finish(DriverState::Completed)));
        };

        let outcome = render_item(
            &mut self.host,
            self.writer.as_mut(),
            self.opts.fallback_save,
            run,
            item,
        );
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, frame = %item.frame, channel = %item.channel, "render failed; run aborted");
                self.finish(DriverState::Failed);
                return Err(fatal(item, err));
            }
        };

        match outcome.status {
            ItemStatus::Written => run.succeeded += 1,
            ItemStatus::Degraded => run.degraded += 1,
            ItemStatus::Failed => run.failed += 1,
        }
        if let Some(err) = outcome.error {
            run.last_failure = Some((item, err));
        }
        run.index += 1;

        let event = ProgressEvent {
            items_done: run.index,
            items_total: run.plan.len(),
            frame: item.frame,
            channel: item.channel,
            path: outcome.path,
            status: outcome.status,
            fallback_used: outcome.fallback_used,
        };
        tracing::debug!(
            done = event.items_done,
            total = event.items_total,
            frame = %event.frame,
            channel = %event.channel,
            path = %event.path.display(),
            status = ?event.status,
            "item finished"
        );
        if let Some(tx) = &self.progress {
            let _ = tx.send(event.clone());
        }
        Ok(Step::Progress(event))
    }

    /// Start `plan` and step until it ends.
    pub fn run_to_end(&mut self, plan: RenderPlan) -> FramepassResult<RunSummary> {
        self.start(plan)?;
        loop {
            if let Step::Finished(summary) = self.step()? {
                return Ok(summary);
            }
        }
    }

    /// Render the host's current frame once per selected channel.
    pub fn render_current_frame(
        &mut self,
        selection: &ChannelSelection,
        pattern: FilenamePattern,
    ) -> FramepassResult<RunSummary> {
        let current = self.host.current_frame();
        let frame = u32::try_from(current)
            .map_err(|_| FramepassError::validation(format!("current frame {current} is not renderable")))
            .and_then(FrameNumber::new)?;
        let plan = RenderPlan::single_frame(frame, selection, pattern)?;
        self.run_to_end(plan)
    }

    fn finish(&mut self, terminal: DriverState) -> RunSummary {
        let Some(run) = self.run.take() else {
            self.state = terminal;
            return self.summary.clone().unwrap_or(RunSummary {
                state: terminal,
                items_total: 0,
                items_done: 0,
                items_succeeded: 0,
                items_degraded: 0,
                items_failed: 0,
                elapsed: Default::default(),
                output_dir: None,
            });
        };

        let snap = run.snapshot;
        self.host.set_frame(snap.frame);
        if self.host.output_format() != snap.format {
            self.host.set_output_format(snap.format);
        }
        if self.host.persistent_data() != snap.persistent_data {
            self.host.set_persistent_data(snap.persistent_data);
        }

        let summary = RunSummary {
            state: terminal,
            items_total: run.plan.len(),
            items_done: run.index,
            items_succeeded: run.succeeded,
            items_degraded: run.degraded,
            items_failed: run.failed,
            elapsed: run.started.elapsed(),
            output_dir: Some(run.output_dir),
        };
        tracing::info!(%summary, "batch render finished");
        self.state = terminal;
        self.summary = Some(summary.clone());
        summary
    }
}

/// Render one item and write it. `Err` only for conditions that end the run.
#[tracing::instrument(skip_all, fields(position = item.position, frame = %item.frame, channel = %item.channel))]
fn render_item<H: RenderHost>(
    host: &mut H,
    writer: &mut dyn ImageWriter,
    fallback_save: bool,
    run: &RunState,
    item: WorkItem,
) -> FramepassResult<ItemOutcome> {
    host.set_frame(item.frame.as_i64());

    let mut scope = ChannelScope::configure(host, item.channel);
    let degraded = scope.degraded();
    let image = scope.host().render()?;

    let ctx = RenderContext {
        file_name: run.file_name.clone(),
        camera: run.camera.clone(),
        view_layer: run.view_layer.clone(),
        frame: item.frame,
        channel: item.channel,
        start_time: run.start_time,
        end_time: now(),
    };
    let stem = sanitize_file_stem(&run.plan.pattern().render(&ctx));
    let path = run
        .output_dir
        .join(format!("{stem}{}", run.format.extension()));

    let written = write_verified(scope.host(), writer, &image, &path, run.format, fallback_save);
    scope.finish();

    let (status, fallback_used, error) = match written {
        Ok(fallback_used) if degraded => (ItemStatus::Degraded, fallback_used, None),
        Ok(fallback_used) => (ItemStatus::Written, fallback_used, None),
        Err(err) => {
            tracing::warn!(error = %err, path = %path.display(), "item not written");
            (ItemStatus::Failed, false, Some(err))
        }
    };
    Ok(ItemOutcome {
        path,
        status,
        fallback_used,
        error,
    })
}

/// Write `image` and check the file exists. On a missing file, try the host's direct save once.
/// Returns whether the fallback was needed.
fn write_verified<H: RenderHost>(
    host: &mut H,
    writer: &mut dyn ImageWriter,
    image: &RenderedImage,
    path: &Path,
    format: OutputFormat,
    fallback_save: bool,
) -> FramepassResult<bool> {
    let first = match writer.write(image, path, format) {
        Ok(()) if path.is_file() => return Ok(false),
        Ok(()) => FramepassError::render(format!(
            "'{}' missing after write",
            path.display()
        )),
        Err(err) => err,
    };
    if !fallback_save {
        return Err(first);
    }

    tracing::warn!(error = %first, path = %path.display(), "write not verified; saving render result directly");
    host.save_render_result(path, format)?;
    if path.is_file() {
        Ok(true)
    } else {
        Err(FramepassError::render(format!(
            "'{}' missing after direct save",
            path.display()
        )))
    }
}

fn fatal(item: WorkItem, err: FramepassError) -> FramepassError {
    FramepassError::Fatal {
        position: item.position,
        frame: item.frame,
        channel: item.channel,
        source: Box::new(err),
    }
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
