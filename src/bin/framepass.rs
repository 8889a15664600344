use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use framepass::{
    BatchRenderDriver, Channel, ChannelSelection, DriverOpts, DriverState, FilenamePattern,
    FrameChannelPlan, OutputFormat, Preferences, ProgressEvent, RenderContext, RenderHost,
    RunSummary, SceneHost,
};

/// Exit status for a run stopped with Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "framepass", version)]
struct Cli {
    /// Directory holding `framepass_prefs.json`.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log filter (`info`, `debug`, `framepass=trace`). Overrides `RUST_LOG`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render every selected frame for every selected channel.
    Render(RenderArgs),
    /// Render the scene's current frame (or `--frame`) for every selected channel.
    Frame(FrameArgs),
    /// Print keyframes worth rendering.
    Suggest(SuggestArgs),
    /// Show or change saved preferences.
    Prefs {
        #[command(subcommand)]
        cmd: PrefsCommand,
    },
    /// Find the file a previous run wrote for one frame and channel.
    Locate(LocateArgs),
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Channels, comma separated (`combined,depth,normal`).
    #[arg(long, default_value = "combined")]
    channels: String,

    /// Filename pattern. Defaults to the saved pattern.
    #[arg(long)]
    pattern: Option<String>,

    /// Output folder. Defaults to the saved folder, then the scene's folder.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Image format (png, jpeg, tiff, exr, bmp). Defaults to the scene's render settings.
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Leave the scene's persistent-data setting alone during the run.
    #[arg(long)]
    no_persistent_data: bool,

    /// Do not fall back to a direct save when a written file cannot be found.
    #[arg(long)]
    no_fallback_save: bool,
}

#[derive(clap::Args, Debug)]
struct RenderArgs {
    /// Scene JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Frames, e.g. `1,5,10-15`.
    #[arg(long)]
    frames: String,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(clap::Args, Debug)]
struct FrameArgs {
    /// Scene JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Frame to render instead of the scene's current frame.
    #[arg(long)]
    frame: Option<u32>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(clap::Args, Debug)]
struct SuggestArgs {
    /// Scene JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Current frame expression; its min/max bound the scan.
    #[arg(long)]
    frames: Option<String>,
}

#[derive(Subcommand, Debug)]
enum PrefsCommand {
    /// Print the saved preferences.
    Show,
    /// Save a default output folder.
    SetOutput { dir: PathBuf },
    /// Forget the default output folder.
    ClearOutput,
    /// Save a default filename pattern.
    SetPattern { pattern: String },
}

#[derive(clap::Args, Debug)]
struct LocateArgs {
    /// Scene JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Frame. Defaults to the scene's current frame.
    #[arg(long)]
    frame: Option<u32>,

    /// Channel.
    #[arg(long, default_value = "combined")]
    channel: Channel,

    /// Filename pattern. Defaults to the saved pattern.
    #[arg(long)]
    pattern: Option<String>,

    /// Folder to search. Defaults to the saved folder, then the scene's folder.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config_dir = framepass::prefs::config_dir(cli.config_dir.as_deref());
    let prefs = config_dir
        .as_deref()
        .map(Preferences::load)
        .unwrap_or_default();

    match cli.cmd {
        Command::Render(args) => cmd_render(args, &prefs),
        Command::Frame(args) => cmd_frame(args, &prefs),
        Command::Suggest(args) => cmd_suggest(args).map(|()| ExitCode::SUCCESS),
        Command::Prefs { cmd } => {
            let dir = config_dir.context("no config directory; pass --config-dir")?;
            cmd_prefs(cmd, &dir, prefs).map(|()| ExitCode::SUCCESS)
        }
        Command::Locate(args) => cmd_locate(args, &prefs),
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_scene(path: &Path) -> anyhow::Result<SceneHost> {
    SceneHost::load(path).with_context(|| format!("load scene '{}'", path.display()))
}

fn resolve_pattern(
    explicit: Option<&str>,
    prefs: &Preferences,
    channel_count: usize,
) -> anyhow::Result<FilenamePattern> {
    let pattern = match explicit {
        Some(p) => FilenamePattern::new(p)?,
        None => prefs.pattern_for(channel_count)?,
    };
    Ok(pattern)
}

fn driver_opts(args: &OutputArgs, prefs: &Preferences) -> DriverOpts {
    DriverOpts {
        output_dir: args
            .out_dir
            .clone()
            .or_else(|| prefs.default_output_folder.clone()),
        format: args.format,
        persistent_data: !args.no_persistent_data,
        fallback_save: !args.no_fallback_save,
    }
}

fn cmd_render(args: RenderArgs, prefs: &Preferences) -> anyhow::Result<ExitCode> {
    let host = load_scene(&args.scene)?;
    let selection = ChannelSelection::parse(&args.output.channels)?;
    let pattern = resolve_pattern(args.output.pattern.as_deref(), prefs, selection.len())?;
    let plan = FrameChannelPlan::build(&args.frames, &selection, pattern)
        .context("invalid render request")?;

    let total = plan.len();
    let (mut driver, progress) = spawn_driver(host, driver_opts(&args.output, prefs), total)?;
    let result = driver.run_to_end(plan);
    finish(driver, progress, result)
}

fn cmd_frame(args: FrameArgs, prefs: &Preferences) -> anyhow::Result<ExitCode> {
    let mut host = load_scene(&args.scene)?;
    if let Some(frame) = args.frame {
        host.set_frame(i64::from(frame));
    }
    let selection = ChannelSelection::parse(&args.output.channels)?;
    let pattern = resolve_pattern(args.output.pattern.as_deref(), prefs, selection.len())?;

    let (mut driver, progress) =
        spawn_driver(host, driver_opts(&args.output, prefs), selection.len())?;
    let result = driver.render_current_frame(&selection, pattern);
    finish(driver, progress, result)
}

type ProgressThread = std::thread::JoinHandle<()>;

/// Driver wired to a Ctrl-C handler and a progress bar fed from its event channel.
fn spawn_driver(
    host: SceneHost,
    opts: DriverOpts,
    total: usize,
) -> anyhow::Result<(BatchRenderDriver<SceneHost>, ProgressThread)> {
    let (tx, rx) = std::sync::mpsc::channel::<ProgressEvent>();
    let driver = BatchRenderDriver::new(host, opts).with_progress(tx);

    let token = driver.cancel_token();
    ctrlc::set_handler(move || token.cancel()).context("install Ctrl-C handler")?;

    let handle = std::thread::spawn(move || {
        let pb = indicatif::ProgressBar::new(total as u64);
        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("{elapsed} {wide_bar} [{pos}/{len}] {msg}")
        {
            pb.set_style(style);
        }
        for event in rx {
            pb.set_position(event.items_done as u64);
            pb.set_message(format!("frame {} {}", event.frame, event.channel_name()));
        }
        pb.finish_and_clear();
    });
    Ok((driver, handle))
}

fn finish(
    driver: BatchRenderDriver<SceneHost>,
    progress: ProgressThread,
    result: framepass::FramepassResult<RunSummary>,
) -> anyhow::Result<ExitCode> {
    // Dropping the driver closes the progress channel so the bar thread ends.
    let summary = driver.summary().cloned();
    drop(driver);
    let _ = progress.join();

    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            if let Some(summary) = summary {
                eprintln!("{summary}");
            }
            return Err(err).context("batch render failed");
        }
    };
    eprintln!("{summary}");
    Ok(ExitCode::from(exit_status(&summary)))
}

/// Cancelled runs exit 130; failed runs and runs with any unwritten item exit 1.
fn exit_status(summary: &RunSummary) -> u8 {
    match summary.state {
        DriverState::Cancelled => EXIT_CANCELLED,
        DriverState::Failed => 1,
        _ if summary.items_failed > 0 => 1,
        _ => 0,
    }
}

fn cmd_suggest(args: SuggestArgs) -> anyhow::Result<()> {
    let host = load_scene(&args.scene)?;
    match framepass::suggest_frames(&host, args.frames.as_deref(), host.frame_range()) {
        Some(suggestion) => println!("{}", suggestion.frames),
        None => eprintln!("no keyframes found in range"),
    }
    Ok(())
}

fn cmd_prefs(cmd: PrefsCommand, dir: &Path, mut prefs: Preferences) -> anyhow::Result<()> {
    match cmd {
        PrefsCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&prefs)?);
            return Ok(());
        }
        PrefsCommand::SetOutput { dir: out } => {
            std::fs::create_dir_all(&out)
                .with_context(|| format!("create output folder '{}'", out.display()))?;
            prefs.default_output_folder = Some(out);
        }
        PrefsCommand::ClearOutput => prefs.default_output_folder = None,
        PrefsCommand::SetPattern { pattern } => {
            FilenamePattern::new(pattern.as_str())?;
            prefs.filename_pattern = Some(pattern);
        }
    }
    prefs
        .save(dir)
        .with_context(|| format!("save preferences in '{}'", dir.display()))?;
    eprintln!("saved {}", Preferences::path(dir).display());
    Ok(())
}

fn cmd_locate(args: LocateArgs, prefs: &Preferences) -> anyhow::Result<ExitCode> {
    let host = load_scene(&args.scene)?;
    let frame = match args.frame {
        Some(f) => framepass::FrameNumber::new(f)?,
        None => {
            let current = u32::try_from(host.current_frame()).unwrap_or(0);
            framepass::FrameNumber::new(current)?
        }
    };
    let pattern = resolve_pattern(args.pattern.as_deref(), prefs, 1)?;
    let dir = framepass::resolve_output_dir(
        args.out_dir
            .as_deref()
            .or(prefs.default_output_folder.as_deref()),
        &host,
    )?;

    let now = chrono::Local::now().naive_local();
    let ctx = RenderContext {
        file_name: framepass::host::document_stem(&host),
        camera: host.active_camera(),
        view_layer: host.view_layer(),
        frame,
        channel: args.channel,
        start_time: now,
        end_time: now,
    };
    let stem = framepass::sanitize_file_stem(&pattern.render(&ctx));
    match framepass::locate_output(&dir, &stem, host.output_format()) {
        Some(path) => {
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("no rendered output for '{stem}' in {}", dir.display());
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn summary(state: DriverState, failed: usize) -> RunSummary {
        RunSummary {
            state,
            items_total: 4,
            items_done: 4,
            items_succeeded: 4 - failed,
            items_degraded: 0,
            items_failed: failed,
            elapsed: Duration::from_millis(10),
            output_dir: None,
        }
    }

    #[test]
    fn partial_write_failures_exit_non_zero() {
        assert_eq!(exit_status(&summary(DriverState::Completed, 0)), 0);
        assert_eq!(exit_status(&summary(DriverState::Completed, 1)), 1);
        assert_eq!(exit_status(&summary(DriverState::Failed, 4)), 1);
        assert_eq!(exit_status(&summary(DriverState::Cancelled, 0)), EXIT_CANCELLED);
    }
}
