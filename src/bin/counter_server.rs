//! Counter server: runs the rep counter on a camera or video and streams
//! status (and optionally annotated JPEG frames) to TCP consumers.
//!
//! Console input: `c` + Enter → calibrate, `r` + Enter → reset.
//! `kill -USR1 <pid>` also requests calibration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::StreamExt as _;
use opencv::core::Mat;
use tokio::sync::broadcast;

use jack_counter::camera::OpenCvSource;
use jack_counter::config::{Config, SourceSpec, TrackingMode};
use jack_counter::log;
use jack_counter::logging::Logger;
use jack_counter::pose::OnnxPoseDetector;
use jack_counter::protocol::{self, ClientMessage, EncodedFrame, ServerMessage};
use jack_counter::render::{draw_overlay, encode_jpeg};
use jack_counter::session::{SessionControl, StatusBoard, StreamingSession};

const CONFIG_PATH: &str = "jack_counter.toml";

type Session = StreamingSession<Mat, OpenCvSource, OnnxPoseDetector>;

// ---------------------------------------------------------------------------
// Counting thread
// ---------------------------------------------------------------------------

fn build_session(config: &Config, source: OpenCvSource, control: SessionControl, logger: &Logger) -> Result<Session> {
    let session = match config.session.mode {
        TrackingMode::Single => {
            let detector = OnnxPoseDetector::from_config(&config.detector)?;
            StreamingSession::single(source, detector, &config.counter)
        }
        TrackingMode::Dual => {
            let left = OnnxPoseDetector::from_config(&config.detector)?;
            let right = OnnxPoseDetector::from_config(&config.detector)?;
            StreamingSession::dual(source, left, right, &config.counter)
        }
    };
    Ok(session
        .with_session_config(&config.session)
        .with_logger(logger.clone())
        .with_control(control))
}

fn open_source(spec: &SourceSpec, logger: &Logger) -> Result<OpenCvSource> {
    let source = OpenCvSource::open(spec)?;
    let (w, h) = source.resolution();
    log!(logger, "[source] opened {} ({}x{})", spec, w, h);
    Ok(source)
}

/// 次のソース指定を待つ。停止要求なら None。
fn wait_for_source(requests: &Receiver<SourceSpec>, running: &AtomicBool) -> Option<SourceSpec> {
    while running.load(Ordering::Relaxed) {
        match requests.recv_timeout(Duration::from_millis(200)) {
            Ok(spec) => return Some(spec),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
    None
}

fn run_counting(
    config: Config,
    mut session: Session,
    requests: Receiver<SourceSpec>,
    events: broadcast::Sender<ServerMessage>,
    running: Arc<AtomicBool>,
    logger: Logger,
) {
    let mut fps_counter: u32 = 0;
    let mut fps_timer = Instant::now();

    while running.load(Ordering::Relaxed) {
        // ソース切り替え要求は最新のものだけ採用
        if let Some(spec) = requests.try_iter().last() {
            match open_source(&spec, &logger) {
                Ok(source) => session.restart(source),
                Err(e) => {
                    log!(logger, "[source] failed to open {}: {e:#}", spec);
                    let _ = events.send(ServerMessage::Error { message: format!("{e:#}") });
                }
            }
        }

        let tick = match session.step() {
            Ok(Some(tick)) => tick,
            Ok(None) => {
                log!(logger, "[source] ended");
                let _ = events.send(ServerMessage::SourceEnded);
                match wait_for_source(&requests, &running) {
                    Some(spec) => match open_source(&spec, &logger) {
                        Ok(source) => session.restart(source),
                        Err(e) => {
                            log!(logger, "[source] failed to open {}: {e:#}", spec);
                            let _ = events.send(ServerMessage::Error { message: format!("{e:#}") });
                        }
                    },
                    None => break,
                }
                continue;
            }
            Err(e) => {
                log!(logger, "[session] {e:#}");
                let _ = events.send(ServerMessage::Error { message: format!("{e:#}") });
                continue;
            }
        };

        let mut image = tick.image;
        let frame_index = tick.status.frame_index;
        let _ = events.send(ServerMessage::Status(tick.status.clone()));

        if config.server.stream_frames {
            let encoded = draw_overlay(&mut image, &tick.status, &tick.landmarks)
                .and_then(|_| encode_jpeg(&image, config.server.jpeg_quality))
                .and_then(|jpeg_data| EncodedFrame::new(frame_index, image.cols(), image.rows(), jpeg_data));
            match encoded {
                Ok(frame) => {
                    let _ = events.send(ServerMessage::Frame(frame));
                }
                Err(e) => log!(logger, "[jpeg] frame {} not sent: {e:#}", frame_index),
            }
        }

        fps_counter += 1;
        if fps_timer.elapsed() >= Duration::from_secs(1) {
            log!(logger, "[fps] {}", fps_counter);
            fps_counter = 0;
            fps_timer = Instant::now();
        }
    }
    log!(logger, "[session] counting thread stopped");
}

// ---------------------------------------------------------------------------
// TCP consumer
// ---------------------------------------------------------------------------

fn handle_client_message(
    msg: ClientMessage,
    control: &SessionControl,
    requests: &mpsc::Sender<SourceSpec>,
    logger: &Logger,
) {
    match msg {
        ClientMessage::Calibrate => {
            log!(logger, "[tcp] calibrate requested");
            control.request_calibration();
        }
        ClientMessage::Reset => {
            log!(logger, "[tcp] reset requested");
            control.request_reset();
        }
        ClientMessage::OpenSource { source } => {
            log!(logger, "[tcp] open source requested: {}", source);
            let _ = requests.send(SourceSpec::parse(&source));
        }
    }
}

async fn run_client(
    tcp: tokio::net::TcpStream,
    dual: bool,
    board: StatusBoard,
    mut events: broadcast::Receiver<ServerMessage>,
    control: SessionControl,
    requests: mpsc::Sender<SourceSpec>,
    logger: Logger,
) -> Result<()> {
    let mut stream = protocol::message_stream(tcp);
    protocol::send_message(
        &mut stream,
        &ServerMessage::Hello {
            version: env!("GIT_VERSION").to_string(),
            dual,
        },
    )
    .await?;
    if let Some(status) = board.latest() {
        protocol::send_message(&mut stream, &ServerMessage::Status(status)).await?;
    }

    let (mut sink, mut reader) = stream.split();

    let reader_logger = logger.clone();
    let mut reader_task = tokio::spawn(async move {
        while let Some(frame) = reader.next().await {
            match frame {
                Ok(bytes) => match bincode::deserialize::<ClientMessage>(&bytes) {
                    Ok(msg) => handle_client_message(msg, &control, &requests, &reader_logger),
                    Err(e) => log!(reader_logger, "[tcp] deserialize error: {}", e),
                },
                Err(e) => {
                    log!(reader_logger, "[tcp] reader error: {}", e);
                    break;
                }
            }
        }
    });

    let result: Result<()> = async {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(msg) => protocol::send_to_sink(&mut sink, &msg).await?,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log!(logger, "[tcp] consumer lagging, dropped {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = &mut reader_task => break,
            }
        }
        Ok(())
    }
    .await;

    reader_task.abort();
    result
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);
    let logger = Logger::open("counter")?;
    log!(logger, "Counter Server ({})", env!("GIT_VERSION"));
    log!(
        logger,
        "[config] mode={:?} source={} listen={} stream_frames={} jpeg_quality={}",
        config.session.mode,
        config.session.source,
        config.server.listen_addr,
        config.server.stream_frames,
        config.server.jpeg_quality
    );

    let control = SessionControl::new();
    let source = open_source(&config.session.source, &logger)?;
    let session = build_session(&config, source, control.clone(), &logger)?;
    let dual = session.is_dual();
    let board = session.status_board();

    // SIGUSR1 → キャリブレーション
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, control.calibration_flag())?;

    // コンソール入力: 'c' → キャリブレーション, 'r' → リセット
    {
        let control = control.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => match line.trim() {
                        "c" => {
                            eprintln!("[input] calibration triggered");
                            control.request_calibration();
                        }
                        "r" => {
                            eprintln!("[input] reset triggered");
                            control.request_reset();
                        }
                        _ => {}
                    },
                }
            }
        });
    }

    let running = Arc::new(AtomicBool::new(true));
    let (request_tx, request_rx) = mpsc::channel::<SourceSpec>();
    let (event_tx, _) = broadcast::channel::<ServerMessage>(64);

    let counting = {
        let config = config.clone();
        let events = event_tx.clone();
        let running = Arc::clone(&running);
        let logger = logger.clone();
        std::thread::spawn(move || run_counting(config, session, request_rx, events, running, logger))
    };

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr).await?;
    log!(logger, "[tcp] listening on {}", config.server.listen_addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (tcp, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        log!(logger, "[tcp] accept failed: {e}");
                        continue;
                    }
                };
                tcp.set_nodelay(true)?;
                log!(logger, "[tcp] consumer connected: {}", addr);
                let board = board.clone();
                let events = event_tx.subscribe();
                let control = control.clone();
                let requests = request_tx.clone();
                let logger = logger.clone();
                tokio::spawn(async move {
                    if let Err(e) = run_client(tcp, dual, board, events, control, requests, logger.clone()).await {
                        log!(logger, "[tcp] consumer {} error: {e:#}", addr);
                    }
                    log!(logger, "[tcp] consumer {} disconnected", addr);
                });
            }
            _ = tokio::signal::ctrl_c() => {
                log!(logger, "[main] shutting down");
                break;
            }
        }
    }

    running.store(false, Ordering::Relaxed);
    drop(request_tx);
    if counting.join().is_err() {
        log!(logger, "[main] counting thread panicked");
    }
    Ok(())
}
