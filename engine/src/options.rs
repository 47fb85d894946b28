// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::k_limits;

use clap::error::ErrorKind;
use clap::{value_parser, Arg, ArgAction, Command, Error};
use itertools::Itertools;

/// Creates the clap::Command metadata for argument parsing.
fn make_options_parser() -> Command {
    Command::new("shadow-vm")
        .no_binary_name(true)
        .version(env!("CARGO_PKG_VERSION"))
        .arg(Arg::new("gc_threshold")
            .long("gc_threshold")
            .value_parser(value_parser!(u64))
            .help("The number of heap operations between symbolic heap sweeps.")
            .long_help("The default is 9000000. Smaller values bound memory use more tightly at the cost of more frequent sweeps."))
        .arg(Arg::new("log_instructions")
            .long("log_instructions")
            .action(ArgAction::SetTrue)
            .help("Log every replayed instruction at info level."))
        .arg(Arg::new("compact")
            .long("compact")
            .action(ArgAction::SetTrue)
            .help("Print the path constraint as compact rather than pretty JSON."))
        .arg(Arg::new("trace_file")
            .value_name("TRACE")
            .help("A JSON file with the instruction trace to replay."))
}

/// Represents options passed to the engine.
#[derive(Clone, Debug)]
pub struct Options {
    pub gc_threshold: u64,
    pub log_instructions: bool,
    pub trace_file: Option<String>,
    pub pretty: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            gc_threshold: k_limits::DEFAULT_GC_THRESHOLD,
            log_instructions: false,
            trace_file: None,
            pretty: true,
        }
    }
}

impl Options {
    /// Parse options from an argument string. The argument string will be split using unix
    /// shell escaping rules.
    pub fn parse_from_str(&mut self, s: &str) -> Result<(), Error> {
        let args = shellwords::split(s).map_err(|e| {
            Error::raw(
                ErrorKind::InvalidValue,
                format!("Cannot parse argument string: {:?}\n", e),
            )
        })?;
        self.parse(&args)
    }

    /// Parses options from a list of strings. Options seen here override options seen earlier.
    /// A `--` token ends the options, and the first argument after it is taken as the trace
    /// file if none was given before it.
    pub fn parse(&mut self, args: &[String]) -> Result<(), Error> {
        let mut options_end = args.len();
        let mut rest_start = args.len();
        if let Some((p, _)) = args.iter().find_position(|s| s.as_str() == "--") {
            options_end = p;
            rest_start = p + 1;
        }
        let matches = make_options_parser().try_get_matches_from(args[0..options_end].iter())?;

        if let Some(threshold) = matches.get_one::<u64>("gc_threshold") {
            self.gc_threshold = *threshold;
        }
        if matches.get_flag("log_instructions") {
            self.log_instructions = true;
        }
        if matches.get_flag("compact") {
            self.pretty = false;
        }
        if let Some(file) = matches.get_one::<String>("trace_file") {
            self.trace_file = Some(file.clone());
        } else if let Some(file) = args.get(rest_start) {
            self.trace_file = Some(file.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults() {
        let options = Options::default();
        assert_eq!(options.gc_threshold, k_limits::DEFAULT_GC_THRESHOLD);
        assert!(options.pretty);
        assert!(!options.log_instructions);
    }

    #[test]
    fn parses_flags_and_trace_file() {
        let mut options = Options::default();
        options
            .parse(&strings(&["--gc_threshold", "10", "--log_instructions", "run.json"]))
            .unwrap();
        assert_eq!(options.gc_threshold, 10);
        assert!(options.log_instructions);
        assert_eq!(options.trace_file.as_deref(), Some("run.json"));
    }

    #[test]
    fn trace_file_may_follow_double_dash() {
        let mut options = Options::default();
        options.parse(&strings(&["--compact", "--", "-odd.json"])).unwrap();
        assert!(!options.pretty);
        assert_eq!(options.trace_file.as_deref(), Some("-odd.json"));
    }

    #[test]
    fn flags_can_come_from_a_string() {
        let mut options = Options::default();
        options.parse_from_str("--gc_threshold '25'").unwrap();
        assert_eq!(options.gc_threshold, 25);
        assert!(options.parse_from_str("--gc_threshold 'x").is_err());
        assert!(options.parse_from_str("--gc_threshold many").is_err());
    }
}
