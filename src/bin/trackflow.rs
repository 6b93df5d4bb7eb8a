//! Run an image or an image directory through a recorded model and export
//! the annotated frames, coordinate log and trajectory info.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use trackflow::sink::{ChannelSink, PipelineEvent};
use trackflow::{ModelLoader, PipelineConfig, ReplayLoader, SourceSpec, StreamingPipeline, Task};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TaskArg {
    Detect,
    Segment,
    Pose,
    Track,
    Landmarks,
}

impl From<TaskArg> for Task {
    fn from(arg: TaskArg) -> Self {
        match arg {
            TaskArg::Detect => Task::Detect,
            TaskArg::Segment => Task::Segment,
            TaskArg::Pose => Task::Pose,
            TaskArg::Track => Task::Track,
            TaskArg::Landmarks => Task::LandmarkOnly,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Streaming detection and trajectory tracking", long_about = None)]
struct Args {
    /// Image file, or a directory of frames read in file-name order
    #[arg(short, long)]
    source: PathBuf,

    /// Recorded model output, one JSON object per frame
    #[arg(short, long)]
    model: String,

    #[arg(short, long, value_enum, default_value = "track")]
    task: TaskArg,

    /// JSON pipeline configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured confidence threshold
    #[arg(long)]
    conf: Option<f32>,

    /// Where results are saved
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Print results without saving them
    #[arg(long)]
    no_save: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(conf) = args.conf {
        config.run.confidence_threshold = conf;
    }
    config.validate()?;

    let model = ReplayLoader.load(&args.model)?;
    let step = config.build_step(args.task.into(), model);
    let source = if args.source.is_dir() {
        SourceSpec::ImageSequence(args.source.clone())
    } else {
        SourceSpec::Image(args.source.clone())
    };

    let (sink, events) = ChannelSink::unbounded();
    let mut pipeline = StreamingPipeline::new(config);
    pipeline
        .start(source, step, sink)
        .with_context(|| format!("cannot start on {}", args.source.display()))?;

    for event in events {
        match event {
            PipelineEvent::Result(result) => {
                for line in result.info_lines() {
                    println!("{line}");
                }
            }
            PipelineEvent::Error(event) => warn!(frame_index = ?event.frame_index, "{}", event.message),
            PipelineEvent::Finished(reason) => {
                info!(%reason, frames = pipeline.frames_processed(), "run finished");
                break;
            }
        }
    }
    pipeline.wait();

    if !args.no_save {
        let paths = pipeline.save_results(&args.out)?;
        println!("frames saved to {}", paths.frames_dir.display());
        println!("coordinates saved to {}", paths.coordinates.display());
        println!("info saved to {}", paths.info.display());
    }
    Ok(())
}
