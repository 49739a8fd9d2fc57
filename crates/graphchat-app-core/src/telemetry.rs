//! `tracing` subscriber initialisation.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `log_level` is used, falling back to
/// `info` (with a warning on stderr) when it is not a valid filter.  With
/// `json` set, records are emitted as newline-delimited JSON.
pub fn init(log_level: &str, json: bool) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: log filter '{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
