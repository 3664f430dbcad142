//! AORUS Helper (aorus-helper)
//!
//! Privileged helper for the AORUS laptop platform attributes. Runs under
//! pkexec and performs exactly one node access per invocation.
//!
//! # Commands
//! - `read <node>` prints the trimmed node content
//! - `write <node> <value>` writes a validated value
//! - `check` reads `fan_mode` to confirm access
//!
//! # Security Model
//! - **Allowlist**: Only the platform nodes known to the control core
//! - **Validation**: Per-node value rules before any write
//! - **Environment**: Dangerous variables cleared before anything else
//!
//! Output goes to stdout; failures print `Error: ...` on stderr and exit 1.

use std::path::Path;

use ac_core::constants::{nodes, paths};
use ac_core::{read_node_file, write_node_file};
use ac_error::{AorusError, Result};
use tracing::{debug, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Security Hardening
// ============================================================================

/// Sanitize the process environment by removing dangerous variables
fn sanitize_environment() {
    const DANGEROUS_VARS: &[&str] = &[
        "LD_PRELOAD",
        "LD_LIBRARY_PATH",
        "LD_AUDIT",
        "LD_DEBUG",
        "LD_PROFILE",
        "MALLOC_CHECK_",
        "HOSTALIASES",
        "LOCALDOMAIN",
        "RES_OPTIONS",
        "TMPDIR",
        "IFS",
        "PATH",
    ];

    for var in DANGEROUS_VARS {
        std::env::remove_var(var);
    }

    std::env::set_var("PATH", "/usr/sbin:/usr/bin:/sbin:/bin");
    std::env::set_var("LC_ALL", "C");
    std::env::set_var("LANG", "C");
}

/// Disable core dumps
fn disable_core_dumps() {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: setrlimit is called with a valid resource constant and an initialized struct.
    unsafe {
        if libc::setrlimit(libc::RLIMIT_CORE, &limit) != 0 {
            warn!("Failed to disable core dumps");
        }
    }
}

fn log_privileges() {
    // SAFETY: geteuid and getuid only return the process's user IDs.
    let (uid, euid) = unsafe { (libc::getuid(), libc::geteuid()) };
    if euid != 0 {
        debug!(uid, euid, "Not running as root, relying on node permissions");
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Read { node: String },
    Write { node: String, value: String },
    Check,
    Help,
    Version,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let command = args.get(1).map(String::as_str).ok_or_else(|| {
        AorusError::generic("Usage: aorus-helper <command> [args...]")
    })?;

    match command {
        "read" => match args.get(2) {
            Some(node) => Ok(Command::Read { node: node.clone() }),
            None => Err(AorusError::generic("Usage: aorus-helper read <attribute>")),
        },
        "write" => match (args.get(2), args.get(3)) {
            (Some(node), Some(value)) => Ok(Command::Write {
                node: node.clone(),
                value: value.clone(),
            }),
            _ => Err(AorusError::generic(
                "Usage: aorus-helper write <attribute> <value>",
            )),
        },
        "check" => Ok(Command::Check),
        "-h" | "--help" => Ok(Command::Help),
        "-v" | "--version" => Ok(Command::Version),
        other => Err(AorusError::generic(format!("Unknown command: {}", other))),
    }
}

/// Execute one command against the platform directory
///
/// Returns the text to print on stdout.
fn execute(command: &Command, base: &Path) -> Result<String> {
    match command {
        Command::Read { node } => read_node_file(base, node),
        Command::Write { node, value } => {
            write_node_file(base, node, value)?;
            info!(node = %node, value = %value, "Wrote platform node");
            Ok(String::new())
        }
        Command::Check => read_node_file(base, nodes::FAN_MODE)
            .map(|_| "ok".to_string())
            .map_err(|e| AorusError::PermissionDenied(format!("Permission check failed: {}", e))),
        Command::Help => Ok(help_text()),
        Command::Version => Ok(format!("aorus-helper {}", VERSION)),
    }
}

fn help_text() -> String {
    format!(
        "aorus-helper {} - AORUS laptop platform access\n\n\
         USAGE:\n    \
         aorus-helper read <attribute>\n    \
         aorus-helper write <attribute> <value>\n    \
         aorus-helper check\n\n\
         ATTRIBUTES:\n    {}",
        VERSION,
        nodes::ALLOWED.join(", ")
    )
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    sanitize_environment();
    disable_core_dumps();

    // stdout is the value channel, so logs go to stderr
    let log_level = std::env::var("AORUS_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(&log_level)
        .init();

    log_privileges();

    let args: Vec<String> = std::env::args().collect();
    let result = parse_args(&args)
        .and_then(|command| execute(&command, Path::new(paths::PLATFORM_BASE)));

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("aorus-helper")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(
            parse_args(&args(&["read", "fan_mode"])).unwrap(),
            Command::Read {
                node: "fan_mode".into()
            }
        );
        assert_eq!(
            parse_args(&args(&["write", "gpu_boost", "2"])).unwrap(),
            Command::Write {
                node: "gpu_boost".into(),
                value: "2".into()
            }
        );
        assert_eq!(parse_args(&args(&["check"])).unwrap(), Command::Check);
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["read"])).is_err());
        assert!(parse_args(&args(&["write", "gpu_boost"])).is_err());
        assert!(parse_args(&args(&["erase"])).is_err());
    }

    #[test]
    fn test_execute_against_fake_platform() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fan_mode"), "3\n").unwrap();
        fs::write(dir.path().join("gpu_boost"), "0\n").unwrap();

        let read = Command::Read {
            node: "fan_mode".into(),
        };
        assert_eq!(execute(&read, dir.path()).unwrap(), "3");
        assert_eq!(execute(&Command::Check, dir.path()).unwrap(), "ok");

        let write = Command::Write {
            node: "gpu_boost".into(),
            value: "2".into(),
        };
        assert_eq!(execute(&write, dir.path()).unwrap(), "");
        assert_eq!(fs::read_to_string(dir.path().join("gpu_boost")).unwrap(), "2");
    }

    #[test]
    fn test_execute_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("gpu_boost"), "0\n").unwrap();

        let outside = Command::Read {
            node: "../../etc/shadow".into(),
        };
        assert!(matches!(
            execute(&outside, dir.path()),
            Err(AorusError::AttributeNotAllowed(_))
        ));

        let bad_value = Command::Write {
            node: "gpu_boost".into(),
            value: "9".into(),
        };
        assert!(execute(&bad_value, dir.path()).is_err());
        assert_eq!(fs::read_to_string(dir.path().join("gpu_boost")).unwrap(), "0\n");

        let empty = TempDir::new().unwrap();
        assert!(matches!(
            execute(&Command::Check, empty.path()),
            Err(AorusError::PermissionDenied(_))
        ));
    }
}
