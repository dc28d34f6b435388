//! 記録済みランドマークを再生して回数を数える CLI
//!
//! ```bash
//! jack_counter replay session.jsonl
//! jack_counter replay two_people.jsonl --dual --calibrate-at 0 --calibrate-at 300
//! ```

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};

use jack_counter::config::{Config, TrackingMode};
use jack_counter::logging::Logger;
use jack_counter::replay::{ReplayDetector, ReplaySource};
use jack_counter::session::StreamingSession;

const DEFAULT_CONFIG_PATH: &str = "jack_counter.toml";

#[derive(Parser, Debug)]
#[command(name = "jack_counter")]
#[command(about = "2D 姿勢ランドマークによるジャンピングジャック回数カウンタ")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// JSON-lines のランドマーク記録を再生して回数を数える
    Replay(ReplayArgs),
    /// ビルドのバージョンを表示
    Version,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// 記録ファイル（1 行 1 フレーム）
    file: PathBuf,

    /// 中央の縦線で左右二人に分けて数える
    #[arg(long)]
    dual: bool,

    /// このフレーム番号の直前でキャリブレーションを要求（複数指定可）
    #[arg(long = "calibrate-at", value_name = "FRAME")]
    calibrate_at: Vec<u64>,

    /// 毎フレームの判定をログに出す
    #[arg(short, long)]
    verbose: bool,

    /// 最終結果だけを表示
    #[arg(short, long)]
    quiet: bool,

    /// 設定ファイル（省略時は ./jack_counter.toml があれば使う）
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Replay(args) => run_replay(args),
        Commands::Version => {
            println!("jack_counter {}", env!("GIT_VERSION"));
            Ok(())
        }
    }
}

fn run_replay(args: ReplayArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(DEFAULT_CONFIG_PATH),
    };
    let dual = args.dual || config.session.mode == TrackingMode::Dual;

    let mut session_config = config.session.clone();
    session_config.verbose |= args.verbose;
    let logger = if args.quiet { Logger::silent() } else { Logger::stderr() };

    let source = ReplaySource::open(&args.file)?;
    let source = if dual { source } else { source.single_person() };
    let session = if dual {
        StreamingSession::dual(source, ReplayDetector, ReplayDetector, &config.counter)
    } else {
        StreamingSession::single(source, ReplayDetector, &config.counter)
    };
    let mut session = session.with_session_config(&session_config).with_logger(logger);
    let control = session.control();

    let mut frame_index = 0u64;
    let mut last_status = None;
    loop {
        if args.calibrate_at.contains(&frame_index) {
            control.request_calibration();
        }
        let Some(tick) = session.step()? else {
            break;
        };
        last_status = Some(tick.status);
        frame_index += 1;
    }

    let Some(status) = last_status else {
        bail!("{} contains no frames", args.file.display());
    };
    println!("{}", serde_json::to_string_pretty(&status.to_web_json())?);
    Ok(())
}
