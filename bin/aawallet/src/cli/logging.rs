// This file is part of AAWallet.
//
// AAWallet is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// AAWallet is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with AAWallet.
// If not, see https://www.gnu.org/licenses/.

use std::{ffi::OsString, io, path::PathBuf};

use anyhow::Context;
use tracing::{Level, Metadata};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_log::LogTracer;
use tracing_subscriber::{filter::filter_fn, fmt, layer::SubscriberExt, EnvFilter, Layer};

use super::LogsArgs;

/// Used when `RUST_LOG` is unset or unparsable.
const DEFAULT_DIRECTIVES: &str = "info";

/// HTTP and transport internals under the key server, the wallet clients and
/// the alloy provider. Only their warnings and errors are kept.
const QUIET_TARGETS: &[&str] = &[
    "h2",
    "hyper",
    "hyper_util",
    "tower",
    "jsonrpsee_server::transport",
    "jsonrpsee_http_client",
    "jsonrpsee_core::client",
    "alloy_transport_http",
    "alloy_rpc_client",
];

/// Installs the global subscriber. The returned guard flushes buffered lines
/// on drop, so keep it alive for the whole process.
pub fn configure_logging(config: &LogsArgs) -> anyhow::Result<WorkerGuard> {
    let (writer, guard) = log_writer(config.file.as_deref())?;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let fmt_layer = if config.json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer()
            .with_ansi(config.file.is_none())
            .with_writer(writer)
            .boxed()
    };
    let subscriber = tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter_fn(keep_event)))
        .with(env_filter);
    tracing::subscriber::set_global_default(subscriber)?;

    LogTracer::init()?;

    Ok(guard)
}

// stdout carries command output for the client subcommands, so the default
// sink is stderr
fn log_writer(file: Option<&str>) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    match file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            Ok(tracing_appender::non_blocking(
                tracing_appender::rolling::never(dir, name),
            ))
        }
        None => Ok(tracing_appender::non_blocking(io::stderr())),
    }
}

fn split_log_path(path: &str) -> anyhow::Result<(PathBuf, OsString)> {
    let path = PathBuf::from(path);
    let name = path
        .file_name()
        .with_context(|| format!("log file {} has no file name", path.display()))?
        .to_os_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name))
}

fn keep_event(metadata: &Metadata<'_>) -> bool {
    *metadata.level() <= Level::WARN || !is_quiet_target(metadata.target())
}

fn is_quiet_target(target: &str) -> bool {
    QUIET_TARGETS.iter().any(|quiet| {
        target
            .strip_prefix(quiet)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_targets() {
        assert!(is_quiet_target("hyper"));
        assert!(is_quiet_target("hyper::proto::h1::conn"));
        assert!(is_quiet_target("jsonrpsee_server::transport::http"));
        assert!(is_quiet_target("alloy_transport_http"));

        assert!(!is_quiet_target("hyperlane"));
        assert!(!is_quiet_target("jsonrpsee_server::server"));
        assert!(!is_quiet_target("aawallet_wallet::manager"));
        assert!(!is_quiet_target("aawallet"));
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path("aawallet.log").unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, "aawallet.log");

        let (dir, name) = split_log_path("/var/log/aawallet/keys.log").unwrap();
        assert_eq!(dir, PathBuf::from("/var/log/aawallet"));
        assert_eq!(name, "keys.log");

        assert!(split_log_path("/").is_err());
    }
}
