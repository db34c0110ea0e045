//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "sector-piano")]
#[command(about = "Play notes by moving through depth-camera sectors", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive the live synthesizer from a synthetic depth scene
    Play {
        /// Sector configuration (JSON); defaults to the user config or built-in layout
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// How long to play
        #[arg(long, value_name = "SECONDS", default_value = "10")]
        seconds: f32,

        /// Depth frames per second
        #[arg(long, default_value = "30")]
        fps: f32,

        /// Uniform depth noise added to every pixel
        #[arg(long, value_name = "MM", default_value = "0")]
        noise: f32,
    },

    /// Render a synthetic performance to a WAV file
    Render {
        #[arg(long, short, value_name = "PATH")]
        output: PathBuf,

        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        #[arg(long, value_name = "SECONDS", default_value = "10")]
        seconds: f32,
    },

    /// Print each sector's note/distance table
    Table {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Place a melody on the sectors and optionally play it
    Orchestrate {
        /// Note names separated by commas; an empty slot is a rest
        #[arg(long, value_name = "NOTES")]
        notes: String,

        #[arg(long, default_value = "20")]
        bpm: f32,

        /// Play the melody through the output device
        #[arg(long)]
        play: bool,

        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Write the default sector configuration
    InitConfig {
        /// Destination; defaults to the user config directory
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_render() {
        let args = Args::try_parse_from(["sector-piano", "render", "-o", "out.wav", "--seconds", "2"]).unwrap();
        match args.command {
            Command::Render { output, seconds, config } => {
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(seconds, 2.0);
                assert!(config.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_orchestrate_defaults() {
        let args = Args::try_parse_from(["sector-piano", "orchestrate", "--notes", "E4,D4,C4"]).unwrap();
        match args.command {
            Command::Orchestrate { notes, bpm, play, .. } => {
                assert_eq!(notes, "E4,D4,C4");
                assert_eq!(bpm, 20.0);
                assert!(!play);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_init_config_subcommand_name() {
        let args = Args::try_parse_from(["sector-piano", "init-config", "--force"]).unwrap();
        assert!(matches!(args.command, Command::InitConfig { force: true, output: None }));
    }
}
