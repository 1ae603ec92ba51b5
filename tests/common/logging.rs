use std::{io, sync::Once, thread};

use log::LevelFilter;
use sbft_rs::types::data_types::ReplicaID;

static LOGGER_INIT: Once = Once::new();

// Set up a logger that logs all log messages with `level` and above.
pub(crate) fn setup_logger(level: LevelFilter) {
    LOGGER_INIT.call_once(|| {
        fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "[{:?}][{}] {}",
                    thread::current().id(),
                    record.level(),
                    message
                ))
            })
            .level(level)
            .chain(io::stdout())
            .apply()
            .unwrap();
    })
}

// Log a test step, optionally attributing it to a replica.
pub(crate) fn log_with_context(replica: Option<ReplicaID>, msg: &str) {
    match replica {
        Some(replica) => log::info!("Replica {}: {}", replica, msg),
        None => log::info!("{}", msg),
    }
}
