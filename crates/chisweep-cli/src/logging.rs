use crate::error::Result;
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn default_directive(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "off";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initializes the global tracing subscriber.
///
/// Verbosity flags set the default level; an explicit `RUST_LOG` still
/// wins. Console output goes to stderr so structure output on stdout
/// stays clean; `--log-file` mirrors everything into a plain-text file
/// with thread ids.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity, quiet)));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let registry = tracing_subscriber::registry().with(filter).with(console);

    match log_file {
        Some(path) => {
            let sink = File::create(&path)?;
            registry
                .with(
                    fmt::layer()
                        .with_writer(sink)
                        .with_ansi(false)
                        .with_thread_ids(true),
                )
                .init();
        }
        None => registry.init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use serial_test::serial;
    use std::sync::Once;
    use tracing::{debug, info, warn};

    static INIT: Once = Once::new();

    #[test]
    #[serial]
    fn initialization_and_macros_work() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("global logger should initialize");
        });

        warn!("warning goes to stderr");
        info!("info goes to stderr");
        debug!("debug goes to stderr");
    }

    #[test]
    fn verbosity_maps_onto_level_directives() {
        assert_eq!(default_directive(0, false), "warn");
        assert_eq!(default_directive(1, false), "info");
        assert_eq!(default_directive(2, false), "debug");
        assert_eq!(default_directive(9, false), "trace");
        assert_eq!(default_directive(3, true), "off");
    }

    #[test]
    #[serial]
    fn invalid_log_file_path_propagates_error() {
        let invalid_path = PathBuf::from("/");

        if cfg!(unix) && invalid_path.is_dir() {
            let result = setup_logging(0, false, Some(invalid_path));
            assert!(matches!(result, Err(CliError::Io(_))));
        }
    }
}
