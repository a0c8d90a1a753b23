//! Replays a markdown document through a streaming session in fixed-size
//! chunks, the way a model's output would arrive.

mod args;
mod error;

use std::io::{Read, Write};
use std::process::ExitCode;

use streammark::{RenderResult, Session, SessionConfig, SessionOptions};
use tracing::{debug, info};

use crate::args::{Args, Format};
use crate::error::CliError;

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("streammark=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

fn read_input(args: &Args) -> Result<String, CliError> {
    match &args.input {
        Some(path) => std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        }),
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

fn load_options(args: &Args) -> Result<SessionOptions, CliError> {
    let Some(path) = &args.config else {
        return Ok(SessionOptions::default());
    };
    let json = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// Split on character boundaries into chunks of `size` characters.
fn chunks(input: &str, size: usize) -> impl Iterator<Item = &str> {
    let mut rest = input;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .char_indices()
            .nth(size)
            .map_or(rest.len(), |(i, _)| i);
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

fn write_result(
    out: &mut impl Write,
    format: Format,
    session: &Session,
    result: &RenderResult,
) -> Result<(), CliError> {
    match format {
        Format::Html => writeln!(out, "{}", result.to_html())?,
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(result)?)?,
        Format::Tokens => writeln!(out, "{}", serde_json::to_string_pretty(session.tokens())?)?,
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), CliError> {
    let input = read_input(args)?;
    let options = load_options(args)?;
    let mut session = Session::new(SessionConfig::from_options(options))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut chunk_count = 0;
    let mut ticks = 0;
    for chunk in chunks(&input, args.chunk_size) {
        let result = session.append(chunk);
        chunk_count += 1;
        if args.trace {
            write_result(&mut out, args.format, &session, &result)?;
        }

        // one animation step per chunk keeps reveal roughly in step with input
        if let Some(timer) = session.timer() {
            if args.realtime {
                std::thread::sleep(timer.interval);
            }
            if session.tick(&timer).is_some() {
                ticks += 1;
            }
        }
    }

    let mut result = session.set_streaming_state(false);
    while let Some(timer) = session.timer() {
        if args.realtime {
            std::thread::sleep(timer.interval);
        }
        match session.tick(&timer) {
            Some(next) => {
                result = next;
                ticks += 1;
            }
            None => break,
        }
    }

    debug!(stats = ?session.render_stats(), "last render");
    info!(
        chunks = chunk_count,
        ticks,
        tokens = session.tokens().len(),
        "stream replayed"
    );
    write_result(&mut out, args.format, &session, &result)
}

fn main() -> ExitCode {
    setup_logging();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let result = Args::parse(&argv).and_then(|args| run(&args));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("streammark: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_char_boundaries() {
        let parts: Vec<_> = chunks("héllo wörld", 4).collect();
        assert_eq!(parts, vec!["héll", "o wö", "rld"]);
    }

    #[test]
    fn chunks_of_empty_input() {
        assert_eq!(chunks("", 3).count(), 0);
    }
}
