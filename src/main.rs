//! flux: interactive front end for flux-shell.
//!
//! Usage:
//!   flux                 read lines from the terminal until `quit` or EOF
//!   flux -c LINE         run a single line and exit with its code
//!   flux --dump-config   print the effective configuration as JSON
//!
//! Configuration is the embedded default merged with
//! `~/.config/flux-shell/config.toml` when present.

use std::cell::RefCell;
use std::rc::Rc;

use flux_shell::config::Config;
use flux_shell::host::Host;
use flux_shell::host::os::{LocalSession, OsFs, OsLauncher, TerminalConsole};
use flux_shell::logging;
use flux_shell::shell::Shell;

// ─── Arguments ───────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Interactive,
    Command(String),
    DumpConfig,
}

fn parse_args(args: &[String]) -> Result<Mode, String> {
    match args {
        [] => Ok(Mode::Interactive),
        [flag] if flag == "--dump-config" => Ok(Mode::DumpConfig),
        [flag, line] if flag == "-c" => Ok(Mode::Command(line.clone())),
        [flag] if flag == "-c" => Err("-c requires a command line".into()),
        [other, ..] => Err(format!("unexpected argument: {other}")),
    }
}

// ─── Main ────────────────────────────────────────────

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = match parse_args(&args) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("flux: {e}");
            eprintln!("usage: flux [-c LINE | --dump-config]");
            std::process::exit(2);
        }
    };

    let config = Config::load();

    if mode == Mode::DumpConfig {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("flux: could not serialize config: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    logging::init(&config.settings);

    let host = Host::new(OsFs, OsLauncher).with_session(LocalSession::from_env());
    let console = Rc::new(RefCell::new(TerminalConsole::new(config.settings.color_errors)));
    let mut shell = Shell::new(&config.settings, host, console).with_store(&config.store());

    let code = match mode {
        Mode::Command(line) => shell.handle_input(&line),
        _ => shell.start_input_loop(None),
    };
    shell.shutdown();
    std::process::exit(code.code());
}
