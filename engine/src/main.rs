// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

extern crate env_logger;

use log::info;
use shadow_vm::options::Options;
use shadow_vm::trace::TraceReplayer;
use std::env;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize loggers.
    if env::var("SHADOW_VM_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("SHADOW_VM_LOG")
            .write_style("SHADOW_VM_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    // Flags from the environment come first, so that the command line can override them.
    let mut options = Options::default();
    if let Ok(flags) = env::var("SHADOW_VM_FLAGS") {
        if let Err(e) = options.parse_from_str(&flags) {
            e.exit();
        }
    }
    let command_line_arguments: Vec<String> = env::args().skip(1).collect();
    if let Err(e) = options.parse(&command_line_arguments) {
        e.exit();
    }

    let trace_file = match &options.trace_file {
        Some(file) => file.clone(),
        None => {
            eprintln!("shadow-vm: no trace file given, see --help");
            std::process::exit(2);
        }
    };
    let events = TraceReplayer::load(Path::new(&trace_file))?;
    info!("replaying {} events from {}", events.len(), trace_file);

    let pretty = options.pretty;
    let mut replayer = TraceReplayer::new(options);
    let outcome = replayer.replay(events);
    let executor = replayer.into_executor();

    let snapshot = executor.snapshot();
    let statistics = executor.statistics();
    if pretty {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        println!("{}", serde_json::to_string_pretty(&statistics)?);
    } else {
        println!("{}", serde_json::to_string(&snapshot)?);
        println!("{}", serde_json::to_string(&statistics)?);
    }

    if let Err(e) = outcome {
        if e.is_desynchronization() {
            eprintln!("shadow-vm: instrumentation inconsistency: {}", e);
        } else {
            eprintln!("shadow-vm: {}", e);
        }
        std::process::exit(1);
    }
    Ok(())
}
