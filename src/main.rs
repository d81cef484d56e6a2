use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info};

use loom::cli::{
    Args, Command, ConfigArgs, DetectArgs, ExprArgs, FrameArgs, TimelineArgs, VerifyArgs,
    VersionArgs,
};
use loom::config::{Settings, SETTINGS_FILE};
use loom::frames::Frames;
use loom::paths::{self, PathConfig};
use loom::sequence::{self, OutputPattern};
use loom::utils::{missing_frames, plural, rangify, timeline_expression};
use loom::version::version_number;

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    init_logging(&args, &path_config)?;

    info!("Loom {} starting", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let settings = Settings::load(&path_config);
    debug!("Settings: {:?}", settings);

    match args.command {
        Command::Frames(a) => cmd_frames(a, &settings),
        Command::Missing(a) => cmd_missing(a, &settings),
        Command::Verify(a) => cmd_verify(a, &settings),
        Command::Version(a) => cmd_version(a, &settings),
        Command::Timeline(a) => cmd_timeline(a),
        Command::Detect(a) => cmd_detect(a),
        Command::Config(a) => cmd_config(a, &settings, &path_config),
    }
}

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = match log_path_opt {
            Some(path) => path.clone(),
            None => {
                paths::ensure_dirs(path_config)?;
                paths::data_file("loom.log", path_config)
            }
        };

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging respects RUST_LOG if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }

    Ok(())
}

/// Parse the expression with CLI flags layered over settings
fn parse_frames(expr: &ExprArgs, settings: &Settings) -> Result<Option<Frames>> {
    let mut filter = settings.frame_filter();
    if let Some(increment) = expr.increment {
        filter = filter.increment(increment);
    }
    if expr.individual {
        filter = filter.individual(true);
    }

    filter
        .filter(&expr.expression)
        .with_context(|| format!("Invalid frame expression {:?}", expr.expression))
}

fn cmd_frames(args: FrameArgs, settings: &Settings) -> Result<()> {
    let Some(frames) = parse_frames(&args.expr, settings)? else {
        bail!("No frames specified in {:?}", args.expr.expression);
    };
    info!("{} frame{}", frames.len(), plural(frames.len()));

    if args.json {
        println!("{}", serde_json::to_string(&frames)?);
    } else if args.ranges {
        match frames.as_ints() {
            Some(ints) => println!("{}", rangify(ints)),
            None => println!("{}", frames),
        }
    } else {
        println!("{}", frames);
    }
    Ok(())
}

fn cmd_missing(args: FrameArgs, settings: &Settings) -> Result<()> {
    let Some(frames) = parse_frames(&args.expr, settings)? else {
        bail!("No frames specified in {:?}", args.expr.expression);
    };
    let Some(ints) = frames.as_ints() else {
        bail!("Gaps are only defined for whole frames");
    };

    let missing = missing_frames(ints);
    if args.json {
        println!("{}", serde_json::to_string(&missing)?);
    } else if args.ranges {
        println!("{}", rangify(&missing));
    } else {
        let parts: Vec<String> = missing.iter().map(|f| f.to_string()).collect();
        println!("{}", parts.join(","));
    }
    Ok(())
}

fn cmd_verify(args: VerifyArgs, settings: &Settings) -> Result<()> {
    let Some(frames) = parse_frames(&args.expr, settings)? else {
        bail!("No frames specified in {:?}", args.expr.expression);
    };
    let pattern = OutputPattern::parse_with_padding(&args.output, settings.padding)?;
    let report = sequence::verify(&pattern, &frames)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_complete() {
        println!(
            "All {} frame{} of {} are rendered in {}",
            report.expected,
            plural(report.expected),
            report.sequence,
            pattern.dir().display()
        );
    } else {
        let count = report.missing.len();
        println!(
            "{} missing frame{} of {}: [{}]",
            count,
            plural(count),
            report.sequence,
            report.missing_expression()
        );
    }
    Ok(())
}

fn cmd_version(args: VersionArgs, settings: &Settings) -> Result<()> {
    let delimiter = args.delimiter.as_deref().unwrap_or(&settings.delimiter);
    let min_lead = args.min_lead.unwrap_or(settings.min_lead);
    println!("{}", version_number(&args.path, args.number, delimiter, min_lead));
    Ok(())
}

fn cmd_timeline(args: TimelineArgs) -> Result<()> {
    if args.step < 1 {
        bail!("Frame step must be at least 1, got {}", args.step);
    }
    println!("{}", timeline_expression(args.start, args.end, args.step));
    Ok(())
}

fn cmd_detect(args: DetectArgs) -> Result<()> {
    let Some(pattern) = sequence::pattern_from_frame(&args.file) else {
        bail!("No frame number at the end of {}", args.file.display());
    };
    if !sequence::is_sequence(&args.file) {
        info!("{} has no neighbouring frames on disk", args.file.display());
    }

    let frames: Vec<i64> = pattern.scan()?.into_keys().collect();
    if args.json {
        println!("{}", serde_json::to_string(&frames)?);
    } else {
        println!(
            "{} ({} frame{}): {}",
            pattern.dir().join(pattern.display_name()).display(),
            frames.len(),
            plural(frames.len()),
            rangify(&frames)
        );
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs, settings: &Settings, path_config: &PathConfig) -> Result<()> {
    let path = paths::config_file(SETTINGS_FILE, path_config);
    if args.save {
        paths::ensure_dirs(path_config)?;
        settings.to_json(&path)?;
        info!("Settings saved to {}", path.display());
    }

    println!("{}", path.display());
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}
