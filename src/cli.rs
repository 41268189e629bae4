use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vidtrim::export::{ContainerFormat, QualityPreset};

#[derive(Parser)]
#[command(name = "vidtrim")]
#[command(author, version, about = "Trim videos and strip their audio")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Write each result to its own file in this directory
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Quality preset (highest, medium, low, passthrough)
    #[arg(long, global = true)]
    pub preset: Option<QualityPreset>,

    /// Output container (mp4, mov, m4v)
    #[arg(long, global = true)]
    pub container: Option<ContainerFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export a time range of a video
    Trim {
        /// Input file
        #[arg(required = true)]
        input: PathBuf,

        /// Range start in seconds
        #[arg(long)]
        start: f64,

        /// Range end in seconds
        #[arg(long)]
        end: f64,
    },

    /// Export a video without its audio streams
    StripAudio {
        /// Input file
        #[arg(required = true)]
        input: PathBuf,
    },

    /// Probe a media file and display its streams
    Probe {
        /// File to probe
        #[arg(required = true)]
        input: PathBuf,
    },
}
