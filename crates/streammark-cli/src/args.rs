use std::path::PathBuf;

use crate::error::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Html,
    Json,
    Tokens,
}

impl Format {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "html" => Some(Format::Html),
            "json" => Some(Format::Json),
            "tokens" => Some(Format::Tokens),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Args {
    /// Markdown input, stdin when absent or `-`
    pub input: Option<PathBuf>,
    /// Characters per simulated chunk
    pub chunk_size: usize,
    /// JSON file with session options
    pub config: Option<PathBuf>,
    pub format: Format,
    /// Sleep for the animation interval between ticks
    pub realtime: bool,
    /// Print every intermediate render instead of just the final one
    pub trace: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            input: None,
            chunk_size: 8,
            config: None,
            format: Format::default(),
            realtime: false,
            trace: false,
        }
    }
}

pub const USAGE: &str = "usage: streammark [--chunk-size N] [--config FILE] \
[--format html|json|tokens] [--realtime] [--trace] [FILE]";

impl Args {
    pub fn parse(args: &[String]) -> Result<Self, CliError> {
        let mut res = Args::default();

        let mut i = 0;
        let len = args.len();
        while i < len {
            let arg = &args[i];

            if arg == "--chunk-size" || arg == "-n" {
                i += 1;
                let Some(size) = args.get(i) else {
                    return Err(CliError::Usage(format!("{arg} needs a value")));
                };
                res.chunk_size = match size.parse() {
                    Ok(0) | Err(_) => {
                        return Err(CliError::Usage(format!(
                            "chunk size must be a positive integer, got '{size}'"
                        )))
                    }
                    Ok(n) => n,
                };
            } else if arg == "--config" || arg == "-c" {
                i += 1;
                let Some(path) = args.get(i) else {
                    return Err(CliError::Usage(format!("{arg} needs a file")));
                };
                res.config = Some(PathBuf::from(path));
            } else if arg == "--format" || arg == "-f" {
                i += 1;
                let format = args.get(i).and_then(|f| Format::parse(f));
                let Some(format) = format else {
                    return Err(CliError::Usage(
                        "--format expects html, json or tokens".to_string(),
                    ));
                };
                res.format = format;
            } else if arg == "--realtime" {
                res.realtime = true;
            } else if arg == "--trace" {
                res.trace = true;
            } else if arg == "--help" || arg == "-h" {
                return Err(CliError::Usage(USAGE.to_string()));
            } else if arg.starts_with('-') && arg != "-" {
                return Err(CliError::Usage(format!("unknown argument '{arg}'")));
            } else if res.input.is_some() {
                return Err(CliError::Usage(format!("unexpected argument '{arg}'")));
            } else if arg != "-" {
                res.input = Some(PathBuf::from(arg));
            }

            i += 1;
        }

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, CliError> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        Args::parse(&args)
    }

    #[test]
    fn defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.chunk_size, 8);
        assert_eq!(args.format, Format::Html);
        assert!(args.input.is_none());
    }

    #[test]
    fn all_flags() {
        let args = parse(&[
            "--chunk-size",
            "3",
            "--format",
            "json",
            "--config",
            "opts.json",
            "--realtime",
            "doc.md",
        ])
        .unwrap();
        assert_eq!(args.chunk_size, 3);
        assert_eq!(args.format, Format::Json);
        assert_eq!(args.config, Some(PathBuf::from("opts.json")));
        assert!(args.realtime);
        assert_eq!(args.input, Some(PathBuf::from("doc.md")));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse(&["--chunk-size", "0"]), Err(CliError::Usage(_))));
        assert!(matches!(parse(&["--format", "pdf"]), Err(CliError::Usage(_))));
        assert!(matches!(parse(&["--nope"]), Err(CliError::Usage(_))));
        assert!(matches!(parse(&["a.md", "b.md"]), Err(CliError::Usage(_))));
    }
}
