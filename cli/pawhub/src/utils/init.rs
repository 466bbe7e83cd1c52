use once_cell::sync::OnceCell;
use tracing::error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::commands::Verbosity;

type FilterHandle = Handle<EnvFilter, Registry>;

static LOGGER_HANDLE: OnceCell<FilterHandle> = OnceCell::new();

pub(crate) fn init_logger(verbosity: Option<Verbosity>) {
    let verbosity = verbosity.unwrap_or_default();

    let log_filter = match verbosity {
        // Show only errors
        Verbosity::Quiet => "off,pawhub=error",
        // Only show warnings
        Verbosity::Verbose(0) => "off,pawhub=warn",
        // Show our own info logs
        Verbosity::Verbose(1) => "off,pawhub=info,pawhub_client=info",
        // Also show debug from our libraries
        Verbosity::Verbose(2) => "off,pawhub=debug,pawhub_client=debug,pawhub_core=debug",
        // Also show trace from our libraries
        Verbosity::Verbose(3) => "off,pawhub=trace,pawhub_client=trace,pawhub_core=trace",
        Verbosity::Verbose(_) => "trace",
    };

    let filter_handle = LOGGER_HANDLE.get_or_init(|| {
        let (filter, reload_handle) =
            tracing_subscriber::reload::Layer::new(EnvFilter::default());
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false);
        Registry::default().with(filter).with(fmt_layer).init();
        reload_handle
    });

    update_filter(filter_handle, log_filter);
}

fn update_filter(filter_handle: &FilterHandle, log_filter: &str) {
    let result = filter_handle.modify(|layer| {
        match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_filter)) {
            Ok(new_filter) => *layer = new_filter,
            Err(err) => {
                error!("updating logger filter failed: {err}");
            },
        };
    });
    if let Err(err) = result {
        error!("updating logger filter failed: {err}");
    }
}
