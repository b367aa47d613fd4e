use std::env;
use std::path::Path;
use std::str::FromStr;

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Root};
use log4rs::config::runtime::ConfigErrors;
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

/// Diagnostics on stderr, keeping stdout free for the instrumentation summaries.
pub fn config_default() -> Result<Config, ConfigErrors> {
    Config::builder()
        .appender(appender_stderr("stderr"))
        .build(Root::builder().appender("stderr").build(log_level()))
}

/// Like [`config_default`], additionally writing every record to `path`.
pub fn config_to_file<P>(path: P) -> Result<Config, Box<dyn std::error::Error>>
where
    P: AsRef<Path>,
{
    let config = Config::builder()
        .appender(appender_stderr("stderr"))
        .appender(appender_tofile("tofile", path)?)
        .build(
            Root::builder()
                .appender("stderr")
                .appender("tofile")
                .build(log_level()),
        )?;

    Ok(config)
}

fn appender_stderr<S>(name: S) -> Appender
where
    S: AsRef<str>,
{
    Appender::builder().build(
        name.as_ref(),
        Box::new(
            ConsoleAppender::builder()
                .target(Target::Stderr)
                .encoder(Box::new(PatternEncoder::new(
                    "{h({d(%Y-%m-%dT%H:%M:%S%Z)}\t{m}{n})}",
                )))
                .build(),
        ),
    )
}

fn appender_tofile<S, P>(name: S, log_path: P) -> std::io::Result<Appender>
where
    S: AsRef<str>,
    P: AsRef<Path>,
{
    let appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d}\t{l}\t{m}{n}")))
        .build(log_path)?;

    Ok(Appender::builder().build(name.as_ref(), Box::new(appender)))
}

fn log_level() -> LevelFilter {
    env::var("RUST_LOG")
        .ok()
        .and_then(|level| LevelFilter::from_str(&level).ok())
        .unwrap_or(LevelFilter::Info)
}
