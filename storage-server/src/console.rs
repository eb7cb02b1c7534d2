//! Operator console (spec §6): `help`, `exit`, `dlog [subsys 0|1]`,
//! `dlog_file [path]`, `dlog_std 0|1`. A plain line loop rather than
//! the teacher's raw-mode editor (`steel::logger::CommandLogger`) —
//! proportionate to this flat, tab-completion-free command set.

use std::sync::Arc;

use fabric_utils::logger::DebugLog;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

const HELP: &str = "\
commands:
  help                  show this text
  exit                  stop the server
  dlog [subsys 0|1]     list, or toggle, a debug-log subsystem
  dlog_file [path]      mirror log lines to a file, or stop mirroring
  dlog_std 0|1          toggle the stdout echo of log lines";

pub async fn run(debug_log: Arc<DebugLog>, history_path: String, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };
        let Ok(Some(line)) = line else {
            // EOF on stdin (no controlling terminal): stop reading but
            // keep the server running.
            return;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        append_history(&history_path, line).await;

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("help") => println!("{HELP}"),
            Some("exit") => {
                cancel.cancel();
                std::process::exit(1);
            }
            Some("dlog") => handle_dlog(&debug_log, parts.collect::<Vec<_>>().as_slice()),
            Some("dlog_file") => match parts.next() {
                Some(path) => match debug_log.set_mirror_file(Some(path)) {
                    Ok(()) => println!("mirroring debug log to {path}"),
                    Err(err) => println!("failed to open {path}: {err}"),
                },
                None => {
                    let _ = debug_log.set_mirror_file(None);
                    println!("debug log mirror disabled");
                }
            },
            Some("dlog_std") => match parts.next() {
                Some("0") => debug_log.set_echo_stdout(false),
                Some("1") => debug_log.set_echo_stdout(true),
                _ => println!("usage: dlog_std 0|1"),
            },
            Some(other) => println!("unknown command '{other}', try 'help'"),
            None => {}
        }
    }
}

fn handle_dlog(debug_log: &DebugLog, args: &[&str]) {
    match args {
        [] => {
            for (name, enabled) in debug_log.subsystems() {
                println!("{name}: {}", if enabled { "on" } else { "off" });
            }
        }
        [subsys, state] => {
            let enabled = match *state {
                "0" => false,
                "1" => true,
                _ => {
                    println!("usage: dlog [subsys 0|1]");
                    return;
                }
            };
            debug_log.set_subsystem(subsys, enabled);
            println!("{subsys}: {}", if enabled { "on" } else { "off" });
        }
        _ => println!("usage: dlog [subsys 0|1]"),
    }
}

async fn append_history(path: &str, line: &str) {
    if let Ok(mut file) = tokio::fs::OpenOptions::new().create(true).append(true).open(path).await {
        let _ = file.write_all(format!("{line}\n").as_bytes()).await;
    }
}
