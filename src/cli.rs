use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Frame range expressions, render output verification and path versioning
#[derive(Parser, Debug)]
#[command(name = "loom", author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging to file (default: loom.log in the data directory)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true, require_equals = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Expand a frame expression like "1-10,15,^3-4x2"
    Frames(FrameArgs),
    /// List the gaps inside a frame expression
    Missing(FrameArgs),
    /// Report frames of an expression that are not rendered yet
    Verify(VerifyArgs),
    /// Replace or add a version tag in an output path
    Version(VersionArgs),
    /// Frame expression for a timeline range
    Timeline(TimelineArgs),
    /// Find the sequence a rendered frame belongs to and list its frames on disk
    Detect(DetectArgs),
    /// Show the settings file, optionally writing it
    Config(ConfigArgs),
}

/// Frame expression input shared by the frame commands
#[derive(Parser, Debug)]
pub struct ExprArgs {
    /// Frame expression, e.g. "1-100x5,^50"
    #[arg(value_name = "EXPR", allow_hyphen_values = true)]
    pub expression: String,

    /// Step for ranges without their own "xN" (default from settings: 1)
    #[arg(short = 'i', long = "increment", value_name = "N")]
    pub increment: Option<f64>,

    /// Keep every exclusion independent; frames re-added after "^" are restored
    #[arg(short = 'I', long = "individual")]
    pub individual: bool,
}

#[derive(Parser, Debug)]
pub struct FrameArgs {
    #[command(flatten)]
    pub expr: ExprArgs,

    /// Print in range notation ("1-3,5") instead of every frame
    #[arg(short = 'r', long = "ranges", conflicts_with = "json")]
    pub ranges: bool,

    /// Print as a JSON array
    #[arg(short = 'j', long = "json")]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Render output path, hashes mark the frame digits ("/renders/shot_####.exr")
    #[arg(value_name = "OUTPUT")]
    pub output: String,

    #[command(flatten)]
    pub expr: ExprArgs,

    /// Print the report as JSON
    #[arg(short = 'j', long = "json")]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct VersionArgs {
    /// Output path to version
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Version number
    #[arg(value_name = "NUMBER")]
    pub number: u32,

    /// Separator around the version tag (default from settings: "_")
    #[arg(short = 'd', long = "delimiter")]
    pub delimiter: Option<String>,

    /// Minimum digits of a new version tag (default from settings: 2)
    #[arg(short = 'm', long = "min-lead", value_name = "N")]
    pub min_lead: Option<usize>,
}

#[derive(Parser, Debug)]
pub struct TimelineArgs {
    /// First frame
    #[arg(value_name = "START", allow_hyphen_values = true)]
    pub start: i64,

    /// Last frame
    #[arg(value_name = "END", allow_hyphen_values = true)]
    pub end: i64,

    /// Frame step
    #[arg(short = 's', long = "step", default_value_t = 1)]
    pub step: i64,
}

#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// One frame of the sequence ("/renders/shot_0042.exr")
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print the frames as a JSON array
    #[arg(short = 'j', long = "json")]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Write the current settings (defaults if none exist) to the settings file
    #[arg(short = 's', long = "save")]
    pub save: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_frames_command() {
        let args = Args::try_parse_from(["loom", "-vv", "frames", "1-10^3", "-i", "2", "--ranges"]).unwrap();
        assert_eq!(args.verbosity, 2);
        let Command::Frames(frames) = args.command else {
            panic!("expected frames command");
        };
        assert_eq!(frames.expr.expression, "1-10^3");
        assert_eq!(frames.expr.increment, Some(2.0));
        assert!(frames.ranges);
        assert!(!frames.json);
    }

    #[test]
    fn test_negative_expression_is_not_a_flag() {
        let args = Args::try_parse_from(["loom", "frames", "-3--1"]).unwrap();
        let Command::Frames(frames) = args.command else {
            panic!("expected frames command");
        };
        assert_eq!(frames.expr.expression, "-3--1");
    }

    #[test]
    fn test_ranges_conflicts_with_json() {
        assert!(Args::try_parse_from(["loom", "frames", "1-3", "-r", "-j"]).is_err());
    }

    #[test]
    fn test_parse_verify_command() {
        let args = Args::try_parse_from(["loom", "verify", "/r/shot_####.exr", "1-100", "-I"]).unwrap();
        let Command::Verify(verify) = args.command else {
            panic!("expected verify command");
        };
        assert_eq!(verify.output, "/r/shot_####.exr");
        assert!(verify.expr.individual);
    }

    #[test]
    fn test_parse_detect_command() {
        let args = Args::try_parse_from(["loom", "detect", "/r/shot_0042.exr", "--json"]).unwrap();
        let Command::Detect(detect) = args.command else {
            panic!("expected detect command");
        };
        assert_eq!(detect.file, PathBuf::from("/r/shot_0042.exr"));
        assert!(detect.json);
    }

    #[test]
    fn test_parse_config_command() {
        let args = Args::try_parse_from(["loom", "-c", "/tmp/loom", "config", "--save"]).unwrap();
        assert_eq!(args.config_dir, Some(PathBuf::from("/tmp/loom")));
        let Command::Config(config) = args.command else {
            panic!("expected config command");
        };
        assert!(config.save);

        let args = Args::try_parse_from(["loom", "config"]).unwrap();
        assert!(matches!(args.command, Command::Config(ConfigArgs { save: false })));
    }
}
