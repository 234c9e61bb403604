// Copyright 2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use highstate_render::{cli, config, render, ui};
use log::debug;
use serde_json::Value;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

fn main() {
    env_logger::init();

    // Parse CLI arguments
    let args = cli::CliArgs::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        ui::print_error(&e);
        std::process::exit(1);
    }

    // Resolve render options
    let options = match config::build_render_options(&args) {
        Ok(o) => o,
        Err(e) => {
            ui::print_error(&format!("Configuration error: {}", e));
            std::process::exit(1);
        }
    };

    // Read the state return
    let data = match read_input(args.input_path().map(|p| p.as_path())) {
        Ok(d) => d,
        Err(e) => {
            ui::print_error(&e);
            std::process::exit(1);
        }
    };

    println!("{}", render(&data, &options));
}

/// Read and parse the JSON state return from `path`, or stdin when None
fn read_input(path: Option<&Path>) -> Result<Value, String> {
    let (content, source) = match path {
        Some(path) => {
            let content =
                fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            (content, path.display().to_string())
        }
        None => {
            let mut content = String::new();
            io::stdin().read_to_string(&mut content).map_err(|e| format!("Failed to read stdin: {}", e))?;
            (content, "stdin".to_string())
        }
    };

    debug!("Read {} bytes from {}", content.len(), source);
    serde_json::from_str(&content).map_err(|e| format!("Invalid JSON in {}: {}", source, e))
}
