use anyhow::{anyhow, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use signscribe::capture::{CaptureSource, ClipSequenceSource, VideoFileSource};
use signscribe::cli::{CliArgs, Command};
use signscribe::managers::detection::{
    CaptureMode, DetectionConfig, DetectionEvent, DetectionManager,
};
use signscribe::predict_client::PredictClient;
use signscribe::settings::{load_or_create_settings, AppSettings, SETTINGS_FILE_NAME};
use signscribe::speech::{CommandSpeech, NullSpeech, SpeechSink};
use tokio::sync::mpsc::UnboundedReceiver;

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn print_event(event: &DetectionEvent) {
    match event {
        DetectionEvent::Result { prediction } => {
            println!(
                "  {} ({:.1}%)",
                prediction.prediction,
                prediction.confidence * 100.0
            );
            for alt in &prediction.all_predictions {
                println!("    {:<24} {:.3}", alt.sign, alt.score);
            }
        }
        DetectionEvent::Accepted { label } => {
            println!("accepted: {}", label);
        }
        DetectionEvent::Error { message } => {
            eprintln!("error: {}", message);
        }
        DetectionEvent::Started { mode, session_id } => {
            info!("Session {} started in {:?} mode", session_id, mode);
        }
        DetectionEvent::Processing { session_id } => {
            info!("Session {}: chunk submitted", session_id);
        }
        DetectionEvent::Stopped => {}
    }
}

/// Drain the event stream until the session returns to idle, stopping the
/// session on Ctrl-C.
async fn run_session(
    manager: &DetectionManager,
    events: &mut UnboundedReceiver<DetectionEvent>,
) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                manager.stop();
            }
            event = events.recv() => {
                match event {
                    Some(DetectionEvent::Stopped) | None => break,
                    Some(event) => print_event(&event),
                }
            }
        }
    }
}

fn finish_session(manager: &DetectionManager, settings: &AppSettings, speak: bool) {
    manager.shutdown();
    let transcript = manager.transcript();
    let text = transcript.to_text();
    if text.is_empty() {
        println!("(no signs accepted)");
        return;
    }
    println!("transcript: {}", text);

    let sink: Box<dyn SpeechSink> = if speak {
        Box::new(CommandSpeech::new(&settings.speech_command))
    } else {
        Box::new(NullSpeech)
    };
    transcript.speak(sink.as_ref());
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.debug);

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE_NAME));
    let mut settings = load_or_create_settings(&settings_path);
    if let Some(server) = &args.server {
        settings.backend_base_url = server.clone();
    }

    let client = Arc::new(
        PredictClient::new(
            &settings.backend_base_url,
            Duration::from_secs(settings.request_timeout_secs),
        )
        .map_err(|e| anyhow!(e))?,
    );

    match &args.command {
        Command::Predict { video } => {
            let source = Arc::new(VideoFileSource::with_file(video.clone()));
            let config = DetectionConfig::from_settings(&settings);
            let (manager, mut events) = DetectionManager::new(source, client, config);
            manager.set_mode(CaptureMode::Upload);
            manager.start()?;
            run_session(&manager, &mut events).await;
            finish_session(&manager, &settings, args.speak);
        }
        Command::Live { clips } => {
            let source: Arc<dyn CaptureSource> = Arc::new(ClipSequenceSource::from_dir(clips)?);
            let config = DetectionConfig::from_settings(&settings);
            let (manager, mut events) = DetectionManager::new(source, client, config);
            manager.set_mode(CaptureMode::Camera);
            manager.start()?;
            println!("Detecting; press Ctrl-C to stop.");
            run_session(&manager, &mut events).await;
            finish_session(&manager, &settings, args.speak);
        }
        Command::Signs => {
            let signs = client.list_signs().await.map_err(|e| anyhow!(e))?;
            for sign in &signs {
                println!("{:<24} {}", sign.name, sign.video_url);
            }
            info!("{} reference signs listed", signs.len());
        }
        Command::Health => {
            let health = client.health().await.map_err(|e| anyhow!(e))?;
            println!(
                "status: {} (model {})",
                health.status,
                if health.model_loaded { "loaded" } else { "not loaded" }
            );
        }
    }

    Ok(())
}
