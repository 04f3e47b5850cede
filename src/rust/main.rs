use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use toxiscope::{DebouncedPredictor, LazyClassifier, OnnxLoader, OnnxModelConfig, Panel, PredictorConfig, RuntimeConfig};

/// Scores each line read from stdin for toxicity once typing settles.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Probability above which a category counts as a match
    #[arg(short, long, default_value_t = toxiscope::config::DEFAULT_THRESHOLD)]
    threshold: f32,

    /// Idle time in milliseconds before a prediction is requested
    #[arg(short, long, default_value_t = 300)]
    delay_ms: u64,

    /// Directory holding model.onnx and tokenizer.json
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Longer inputs are truncated to this many tokens
    #[arg(long, default_value_t = toxiscope::config::DEFAULT_MAX_SEQUENCE_LENGTH)]
    max_sequence_length: usize,

    /// Threads ONNX Runtime may use inside one operator (0 lets it decide)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Print prediction sets as JSON instead of the text panel
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    toxiscope::init_logger();
    let args = Args::parse();

    let config = PredictorConfig::default()
        .with_threshold(args.threshold)?
        .with_delay(Duration::from_millis(args.delay_ms));
    let model = OnnxModelConfig::new(args.model_dir.unwrap_or_else(OnnxModelConfig::default_model_dir))
        .with_max_sequence_length(args.max_sequence_length)?;
    info!("Using model directory {:?}", model.model_dir);

    let runtime = RuntimeConfig::default().with_intra_threads(args.threads);
    let classifier = Arc::new(LazyClassifier::new(OnnxLoader::new(model, runtime)));
    let mut predictor = DebouncedPredictor::new(classifier, config);
    let mut updates = predictor.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Write something ✍️");
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(line) => {
                    predictor.set_text(line);
                    show(&predictor, args.json)?;
                }
                None => break,
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                show(&predictor, args.json)?;
            }
        }
    }

    // Input closed: score whatever was typed last without waiting out the delay,
    // and let a request issued before EOF finish
    predictor.wait_idle().await;
    if updates.has_changed().unwrap_or(false) {
        show(&predictor, args.json)?;
    }

    Ok(())
}

fn show(predictor: &DebouncedPredictor, json: bool) -> anyhow::Result<()> {
    let panel = predictor.panel();
    if !panel.is_visible() {
        return Ok(());
    }
    match (json, predictor.predictions(), &panel) {
        (true, Some(predictions), Panel::Results(_)) => {
            println!("{}", serde_json::to_string(&*predictions)?);
        }
        _ => println!("{}", panel),
    }
    Ok(())
}
