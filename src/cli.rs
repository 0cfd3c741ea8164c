use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "signscribe", about = "Signscribe - Sign Language Detection")]
pub struct CliArgs {
    /// Prediction service base URL (overrides the settings file)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Path to the settings file
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Speak the final transcript through the configured TTS command
    #[arg(long, global = true)]
    pub speak: bool,

    /// Enable debug mode with verbose logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit one video file for prediction (upload mode)
    Predict {
        /// The video file to submit
        #[arg(long)]
        video: PathBuf,
    },
    /// Run a repeating detection session over a directory of clips
    /// played back as camera segments (camera mode); stop with Ctrl-C
    Live {
        /// Directory of pre-recorded video clips
        #[arg(long)]
        clips: PathBuf,
    },
    /// List the reference sign gallery
    Signs,
    /// Check prediction service health
    Health,
}
