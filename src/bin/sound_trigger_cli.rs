use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sound_trigger::audio::{CpalCapture, WavCapture};
use sound_trigger::engine::{FixedStepTicker, IntervalTicker};
use sound_trigger::error::log_calibration_error;
use sound_trigger::{
    AppConfig, CalibrationSession, DetectionOptions, DetectionSession, SoundProfile, StopHandle,
};

#[derive(Parser, Debug)]
#[command(
    name = "sound_trigger_cli",
    about = "Calibrate and run the acoustic knock/clap trigger"
)]
struct Cli {
    /// JSON configuration file (defaults apply when missing)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record the target sound from the microphone and save a profile
    Calibrate {
        /// Samples to record (defaults to calibration.target_samples)
        #[arg(long)]
        samples: Option<usize>,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Listen on the microphone and print a JSON line per trigger
    Listen {
        #[arg(long)]
        profile: Option<PathBuf>,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        cooldown_ms: Option<u64>,
        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Run detection over a WAV file and print a JSON report
    Replay {
        #[arg(long)]
        wav: PathBuf,
        #[arg(long)]
        profile: Option<PathBuf>,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        cooldown_ms: Option<u64>,
    },
}

#[derive(Serialize)]
struct TriggerLine {
    event: &'static str,
    elapsed_ms: u64,
    count: u64,
}

#[derive(Serialize)]
struct ReplayReport {
    file: String,
    mode: &'static str,
    duration_ms: u64,
    frames: u64,
    triggers: Vec<u64>,
}

fn main() -> ExitCode {
    sound_trigger::init_logging("sound_trigger=info");
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = cli
        .config
        .as_deref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Calibrate {
            samples,
            output,
            timeout_secs,
        } => run_calibrate(&config, samples, &output, timeout_secs),
        Commands::Listen {
            profile,
            threshold,
            cooldown_ms,
            duration_secs,
        } => {
            let options = detection_options(&config, profile.as_deref(), threshold, cooldown_ms)?;
            run_listen(&config, options, duration_secs)
        }
        Commands::Replay {
            wav,
            profile,
            threshold,
            cooldown_ms,
        } => {
            let options = detection_options(&config, profile.as_deref(), threshold, cooldown_ms)?;
            run_replay(&config, options, &wav)
        }
    }
}

fn detection_options(
    config: &AppConfig,
    profile: Option<&Path>,
    threshold: Option<f32>,
    cooldown_ms: Option<u64>,
) -> Result<DetectionOptions> {
    let mut options = DetectionOptions::from_config(&config.detection);
    options.enabled = true;
    if let Some(threshold) = threshold {
        if !(0.0..=1.0).contains(&threshold) {
            bail!("threshold must be within 0..=1, got {threshold}");
        }
        options.threshold = threshold;
    }
    if let Some(cooldown_ms) = cooldown_ms {
        options.cooldown_ms = cooldown_ms;
    }
    if let Some(path) = profile {
        options.sound_profile = Some(load_profile(path)?);
    }
    Ok(options)
}

fn load_profile(path: &Path) -> Result<SoundProfile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading profile {}", path.display()))?;
    let profile: SoundProfile = serde_json::from_str(&contents)
        .with_context(|| format!("parsing profile {}", path.display()))?;
    if !profile.is_trained() {
        log::warn!(
            "[Profile] {} has no samples, falling back to the level threshold",
            path.display()
        );
    }
    Ok(profile)
}

/// Request a stop on Ctrl-C
fn stop_on_ctrl_c(handle: StopHandle) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                log::warn!("[CLI] Ctrl-C handler unavailable: {}", err);
                return;
            }
        };
        runtime.block_on(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.request_stop();
            }
        });
    });
}

fn run_calibrate(
    config: &AppConfig,
    samples: Option<usize>,
    output: &Path,
    timeout_secs: Option<u64>,
) -> Result<ExitCode> {
    let target = samples.unwrap_or(config.calibration.target_samples).max(1);
    let timeout = Duration::from_secs(timeout_secs.unwrap_or(config.calibration.timeout_secs));

    let mut session = CalibrationSession::new(CpalCapture::new(&config.capture));
    stop_on_ctrl_c(session.stop_handle());

    eprintln!("Stay quiet for a moment, then make the sound {target} times.");
    let mut ticker = IntervalTicker::from_config(&config.capture).with_timeout(timeout);
    let recorded = session
        .run(&mut ticker, target)
        .context("running calibration")?;

    if recorded < target {
        log::warn!("[CLI] Recorded {} of {} samples", recorded, target);
    }
    let profile = match session.try_build_profile() {
        Ok(profile) => profile,
        Err(err) => {
            log_calibration_error(&err, "calibrate");
            bail!("no samples recorded within {}s", timeout.as_secs());
        }
    };

    let json = serde_json::to_string_pretty(&profile)?;
    fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
    eprintln!(
        "Profile from {} samples written to {}",
        profile.sample_count,
        output.display()
    );
    Ok(ExitCode::from(0))
}

fn run_listen(
    config: &AppConfig,
    options: DetectionOptions,
    duration_secs: Option<u64>,
) -> Result<ExitCode> {
    let started = Instant::now();
    let mut count = 0u64;
    let mut session = DetectionSession::new(CpalCapture::new(&config.capture), options)
        .on_trigger(move || {
            count += 1;
            let line = TriggerLine {
                event: "trigger",
                elapsed_ms: started.elapsed().as_millis() as u64,
                count,
            };
            match serde_json::to_string(&line) {
                Ok(json) => println!("{json}"),
                Err(err) => log::error!("[CLI] Failed to encode trigger: {}", err),
            }
        });
    stop_on_ctrl_c(session.stop_handle());

    let mut ticker = IntervalTicker::from_config(&config.capture);
    if let Some(secs) = duration_secs {
        ticker = ticker.with_timeout(Duration::from_secs(secs));
    }
    let summary = session.run(&mut ticker).context("listening on microphone")?;
    eprintln!(
        "Stopped after {} frames, {} triggers",
        summary.frames,
        summary.trigger_times_ms.len()
    );
    Ok(ExitCode::from(0))
}

fn run_replay(config: &AppConfig, options: DetectionOptions, wav: &Path) -> Result<ExitCode> {
    let capture = WavCapture::open(wav, &config.capture)
        .with_context(|| format!("opening {}", wav.display()))?;
    let duration_ms = capture.duration_ms();
    let mut ticker =
        FixedStepTicker::new(capture.read_interval_ms()).with_limit(capture.tick_count() as u64);

    let mode = if options
        .sound_profile
        .as_ref()
        .is_some_and(SoundProfile::is_trained)
    {
        "trained"
    } else {
        "threshold"
    };

    let mut session = DetectionSession::new(capture, options);
    let summary = session.run(&mut ticker).context("replaying wav")?;

    let report = ReplayReport {
        file: wav.display().to_string(),
        mode,
        duration_ms,
        frames: summary.frames,
        triggers: summary.trigger_times_ms,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}
