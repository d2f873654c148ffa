//! Application entry points.
//!
//! Wires configuration, engine provider, audio source and event output
//! together for each CLI command.

use crate::audio::{AudioSource, WavAudioSource};
#[cfg(feature = "cpal-audio")]
use crate::audio::{capture::CpalAudioSource, write_wav};
use crate::cli::{EngineArgs, OutputFormat};
use crate::config::Config;
use crate::control::{ControlLink, ControlMessage, MessageChannel, MessageSender};
use crate::engine::{EngineProvider, Inference, provider_from_config};
use crate::error::{Result, WakegateError};
use crate::pipeline::profile::{audio_duration, realtime_report};
use crate::pipeline::{Orchestrator, OrchestratorBuilder, Profiler, Session, SessionStats};
use owo_colors::OwoColorize;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Load configuration from file or use defaults, then apply overrides.
///
/// Priority order:
/// 1. Command-line engine flags
/// 2. Environment variables (WAKEGATE_*)
/// 3. Custom config path from CLI (--config), else the default path
/// 4. Built-in defaults
pub fn load_config(custom_path: Option<&Path>, args: &EngineArgs) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };

    let mut config = config.with_env_overrides();
    apply_engine_args(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_engine_args(config: &mut Config, args: &EngineArgs) {
    let engine = &mut config.engine;
    if let Some(provider) = &args.provider {
        engine.provider = provider.clone();
    }
    if let Some(path) = &args.keyword {
        engine.keyword_path = Some(path.clone());
    }
    if let Some(path) = &args.context {
        engine.context_path = Some(path.clone());
    }
    if let Some(value) = args.wake_sensitivity {
        engine.wake_sensitivity = value;
    }
    if let Some(value) = args.inference_sensitivity {
        engine.inference_sensitivity = value;
    }
    if let Some(value) = args.endpoint_duration {
        engine.endpoint_duration_sec = value;
    }
    if args.no_require_endpoint {
        engine.require_endpoint = false;
    }
}

/// Writes pipeline events to a byte sink in the chosen format.
///
/// Write failures are logged, never propagated: a closed stdout must not stop
/// the trigger pipeline.
pub struct EventPrinter<T: Write> {
    format: OutputFormat,
    out: T,
}

impl<T: Write> EventPrinter<T> {
    pub fn new(format: OutputFormat, out: T) -> Self {
        Self { format, out }
    }

    pub fn wake(&mut self) {
        let result = match self.format {
            OutputFormat::Text => self.line(&"wake word detected".green().to_string()),
            OutputFormat::Json => self.json(&serde_json::json!({ "event": "wake" })),
            OutputFormat::Control => MessageSender::new(&mut self.out).send_wake(),
        };
        log_failure(result);
    }

    pub fn inference(&mut self, inference: &Inference) {
        let result = match self.format {
            OutputFormat::Text => self.line(&describe_inference(inference)),
            OutputFormat::Json => {
                let slots: serde_json::Map<String, serde_json::Value> = inference
                    .slots
                    .iter()
                    .map(|(slot, value)| (slot.clone(), serde_json::Value::from(value.as_str())))
                    .collect();
                self.json(&serde_json::json!({
                    "event": "inference",
                    "understood": inference.understood,
                    "intent": inference.intent,
                    "slots": slots,
                }))
            }
            OutputFormat::Control => MessageSender::new(&mut self.out).send_inference(inference),
        };
        log_failure(result);
    }

    /// Startup banner: version, context and sensitivities.
    pub fn announce(&mut self, version: &str, context: &str, wake: f32, inference: f32) {
        let result = match self.format {
            OutputFormat::Text => self.line(&format!(
                "{} {}\n{} {}",
                "Engines:".dimmed(),
                version,
                "Context:".dimmed(),
                context
            )),
            OutputFormat::Json => self.json(&serde_json::json!({
                "event": "ready",
                "version": version,
                "context": context,
                "wake_sensitivity": wake,
                "inference_sensitivity": inference,
            })),
            OutputFormat::Control => {
                let mut sender = MessageSender::new(&mut self.out);
                sender
                    .send_handshake(version)
                    .and_then(|()| sender.send_context(context))
                    .and_then(|()| sender.send_sensitivity(wake, inference))
            }
        };
        log_failure(result);
    }

    pub fn cpu_usage(&mut self, ratio: f64) {
        let result = match self.format {
            OutputFormat::Text => self.line(&format!("cpu usage {:.2}%", ratio * 100.0)),
            OutputFormat::Json => self.json(&serde_json::json!({
                "event": "cpu_usage",
                "ratio": ratio,
            })),
            OutputFormat::Control => MessageSender::new(&mut self.out).send_cpu_usage(ratio),
        };
        log_failure(result);
    }

    pub fn info(&mut self, message: &str) {
        let result = match self.format {
            OutputFormat::Text => self.line(message),
            OutputFormat::Json => self.json(&serde_json::json!({
                "event": "info",
                "message": message,
            })),
            OutputFormat::Control => MessageSender::new(&mut self.out).send_info(message),
        };
        log_failure(result);
    }

    /// A message received on the control channel.
    pub fn received(&mut self, message: &ControlMessage) {
        let result = match self.format {
            OutputFormat::Text => self.line(&format!(
                "{} {}",
                format!("{:>18}", message.code.as_str()).cyan(),
                message.payload
            )),
            OutputFormat::Json => self.json(message),
            OutputFormat::Control => {
                MessageSender::new(&mut self.out).send(message.code, &message.payload)
            }
        };
        log_failure(result);
    }

    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()?;
        Ok(())
    }

    fn json<S: serde::Serialize + ?Sized>(&mut self, value: &S) -> Result<()> {
        let text = serde_json::to_string(value)
            .map_err(|e| WakegateError::Other(format!("Failed to encode event: {}", e)))?;
        self.line(&text)
    }

    pub fn into_inner(self) -> T {
        self.out
    }
}

fn log_failure(result: Result<()>) {
    if let Err(e) = result {
        warn!("Failed to write event: {}", e);
    }
}

fn describe_inference(inference: &Inference) -> String {
    if !inference.understood {
        return format!("{}", "not understood".yellow());
    }
    let mut text = format!("{}", inference.intent.as_deref().unwrap_or("").bold());
    for (slot, value) in &inference.slots {
        text.push_str(&format!(" {}={}", slot, value));
    }
    text
}

/// Build the orchestrator with callbacks printing to stdout.
fn build_orchestrator(
    provider: &dyn EngineProvider,
    config: &Config,
    format: OutputFormat,
) -> Result<Orchestrator<impl FnMut(), impl FnMut(Inference)>> {
    let mut wake_printer = EventPrinter::new(format, io::stdout());
    let mut inference_printer = EventPrinter::new(format, io::stdout());

    let orchestrator = OrchestratorBuilder::new(
        provider,
        move || wake_printer.wake(),
        move |inference: Inference| inference_printer.inference(&inference),
    )
    .with_config(&config.engine)
    .init()?;

    EventPrinter::new(format, io::stdout()).announce(
        &orchestrator.version(),
        &orchestrator.context_info(),
        config.engine.wake_sensitivity,
        config.engine.inference_sensitivity,
    );
    Ok(orchestrator)
}

/// Run a WAV file through the pipeline in fixed-size deliveries.
pub fn run_file(
    config: &Config,
    input: &Path,
    chunk_samples: Option<usize>,
    format: OutputFormat,
) -> Result<SessionStats> {
    let provider = provider_from_config(&config.engine)?;
    let orchestrator = build_orchestrator(provider.as_ref(), config, format)?;

    let chunk = chunk_samples.unwrap_or(config.audio.chunk_samples);
    let mut source = WavAudioSource::open(input, orchestrator.sample_rate())?.with_chunk_size(chunk);
    info!(
        path = %input.display(),
        duration_ms = source.duration_ms(),
        chunk,
        "replaying file"
    );

    let mut session = Session::new(orchestrator)?;
    let stats = session.run(&mut source, &AtomicBool::new(true))?;
    info!(
        triggers = session.orchestrator().triggers(),
        frames = stats.frames,
        "file processed"
    );
    Ok(stats)
}

/// Listen on a microphone until Ctrl-C or a failure.
///
/// With `output`, everything captured is written to that WAV file on the way
/// out, even when listening ended with an error.
#[cfg(feature = "cpal-audio")]
pub fn run_mic(
    config: &Config,
    device: Option<String>,
    cpu_report: Option<u64>,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let provider = provider_from_config(&config.engine)?;
    let orchestrator = build_orchestrator(provider.as_ref(), config, format)?;
    let sample_rate = orchestrator.sample_rate();

    let device = device.or_else(|| config.audio.device.clone());
    let mut source = CpalAudioSource::new(device.as_deref(), sample_rate)?;
    let mut session = Session::new(orchestrator)?;
    let mut reporter = EventPrinter::new(format, io::stdout());
    let mut recording = output.map(|_| Vec::new());

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst)).map_err(|e| {
        WakegateError::Other(format!("Failed to install interrupt handler: {}", e))
    })?;

    source.start()?;
    info!(device = device.as_deref().unwrap_or("default"), "listening");

    let result = listen(
        &mut session,
        &mut source,
        &running,
        cpu_report.map(Duration::from_secs),
        &mut reporter,
        recording.as_mut(),
    );
    if let Err(e) = source.stop() {
        warn!("Failed to stop audio capture: {}", e);
    }
    info!(
        triggers = session.orchestrator().triggers(),
        frames = session.stats().frames,
        "stopped listening"
    );

    if let (Some(path), Some(samples)) = (output, recording) {
        write_wav(path, &samples, sample_rate)?;
        info!(path = %path.display(), samples = samples.len(), "capture saved");
    }
    result.map(|_| ())
}

/// Feed `source` into `session` until `running` goes false, a finite source
/// runs dry, or something fails.
///
/// Delivered samples are appended to `recording` when given. Returns the
/// number of samples ingested.
pub fn listen<W, I, S, T>(
    session: &mut Session<W, I>,
    source: &mut S,
    running: &AtomicBool,
    cpu_report: Option<Duration>,
    reporter: &mut EventPrinter<T>,
    mut recording: Option<&mut Vec<i16>>,
) -> Result<u64>
where
    W: FnMut(),
    I: FnMut(Inference),
    S: AudioSource + ?Sized,
    T: Write,
{
    let mut last_report = Instant::now();
    let mut ingested = 0u64;

    while running.load(Ordering::SeqCst) {
        let samples = source.read_samples()?;
        if samples.is_empty() {
            if source.is_finite() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        } else {
            if let Some(recording) = recording.as_mut() {
                recording.extend_from_slice(&samples);
            }
            session.ingest(&samples)?;
            ingested += samples.len() as u64;
        }

        if let Some(interval) = cpu_report
            && last_report.elapsed() >= interval
        {
            last_report = Instant::now();
            if let Some(ratio) = session.profiler().elapsed_ratio() {
                reporter.cpu_usage(ratio);
            }
        }
    }
    Ok(ingested)
}

/// Measure processing time over a file and over the same length of silence.
///
/// Returns the two report lines (speech first).
pub fn run_profile(
    config: &Config,
    input: &Path,
    repetitions: u32,
    format: OutputFormat,
) -> Result<Vec<String>> {
    let provider = provider_from_config(&config.engine)?;
    let orchestrator = OrchestratorBuilder::new(provider.as_ref(), || {}, |_inference: Inference| {})
        .with_config(&config.engine)
        .init()?;
    let sample_rate = orchestrator.sample_rate();
    let speech = WavAudioSource::open(input, sample_rate)?.into_samples();
    let silence = vec![0i16; speech.len()];

    let mut session = Session::new(orchestrator)?;
    let mut printer = EventPrinter::new(format, io::stdout());
    let repetitions = repetitions.max(1);
    let audio = audio_duration(speech.len() * repetitions as usize, sample_rate);

    let mut reports = Vec::new();
    for (label, samples) in [("speech", &speech), ("silence", &silence)] {
        let mut profiler = Profiler::new();
        profiler.tic();
        for _ in 0..repetitions {
            session.ingest(samples)?;
        }
        profiler.toc();

        let elapsed = profiler.elapsed().unwrap_or_default();
        let line = format!("{}: {}", label, realtime_report(audio, elapsed));
        printer.info(&line);
        reports.push(line);
    }
    Ok(reports)
}

/// Print every control message read from `input` (or stdin) until the
/// transport closes.
///
/// Returns the number of messages printed.
pub fn run_monitor(config: &Config, input: Option<PathBuf>, format: OutputFormat) -> Result<u64> {
    let transport: Box<dyn Read + Send> = match input {
        Some(path) => Box::new(BufReader::new(File::open(&path)?)),
        None => Box::new(io::stdin()),
    };
    monitor(config, transport, EventPrinter::new(format, io::stdout())).map(|(count, _)| count)
}

fn monitor<T: Write>(
    config: &Config,
    transport: Box<dyn Read + Send>,
    mut printer: EventPrinter<T>,
) -> Result<(u64, EventPrinter<T>)> {
    let channel = Arc::new(MessageChannel::new(config.control.payload_capacity)?);
    let link = ControlLink::spawn(transport, Arc::clone(&channel))?;

    let mut handled = 0;
    let mut printed = 0;
    loop {
        let attempts = channel.attempts();
        if attempts > handled {
            handled = attempts;
            if let Some(message) = channel.take() {
                printer.received(&message);
                printed += 1;
            }
            if link.rearm().is_err() {
                break;
            }
        } else if !link.is_running() {
            break;
        } else {
            thread::sleep(Duration::from_millis(5));
        }
    }

    info!(
        printed,
        rejected = channel.rejected(),
        "control transport closed"
    );
    link.join()?;
    Ok((printed, printer))
}
