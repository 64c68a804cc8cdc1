//! `portalctl` entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: read the optional TOML file named by `--config`
//!    and hand it to [`PortalConfig::from_toml_str`].
//! 2. **Wire observability**: install `tracing-subscriber` with an `EnvFilter`
//!    (default `info`) writing to stderr, plain or JSON. Every event emitted by
//!    the portal and loopback crates flows through it.
//! 3. **Construct the stack**: build a [`PortalFactory`] from the configuration
//!    and bind a loopback backend into a portal.
//! 4. **Drive it**: start, listen on `--prefix`, send `--count` interests under
//!    it and receive each one back, stop, release.
//!
//! Any failure ends the process with a non-zero exit code and the error chain
//! on stderr.

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use clap::Parser;
use loopback::loopback_portal;
use portal::factory::property;
use portal::{Message, Name, Portal, PortalConfig, PortalFactory, Timeout};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "portalctl", version, about = "Drive a loopback portal stack", long_about = None)]
struct Args {
    /// Factory configuration file (TOML)
    #[arg(short, long, env = "PORTALCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Name prefix to listen on; interests are sent beneath it
    #[arg(short, long, env = "PORTALCTL_PREFIX", default_value = "/portalctl")]
    prefix: Name,

    /// Number of interests to exchange
    #[arg(short = 'n', long, env = "PORTALCTL_COUNT", default_value_t = 4)]
    count: usize,

    /// Per-call timeout in milliseconds [default: portal.receive_timeout_ms, else none]
    #[arg(short, long, env = "PORTALCTL_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, env = "PORTALCTL_JSON")]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json);

    let config = load_config(args.config.as_deref())?;
    let factory = PortalFactory::from_config(config);
    let timeout = call_timeout(args.timeout_ms, &factory)?;
    let portal = loopback_portal(&factory).context("building loopback portal")?;

    info!(
        stack = %portal.id(),
        prefix = %args.prefix,
        count = args.count,
        %timeout,
        "driving portal"
    );
    let outcome = exchange(&portal, &args.prefix, args.count, timeout);
    portal.release();
    let received = outcome?;

    println!("exchanged {received} interests under {}", args.prefix);
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PortalConfig> {
    let Some(path) = path else {
        return Ok(PortalConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    PortalConfig::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// The flag wins over the configured property; neither means wait forever.
fn call_timeout(flag: Option<u64>, factory: &PortalFactory) -> anyhow::Result<Timeout> {
    if let Some(millis) = flag {
        return Ok(Timeout::from_millis(millis));
    }
    let configured = factory
        .properties()
        .get_parsed::<u64>(property::RECEIVE_TIMEOUT_MS)
        .transpose()
        .with_context(|| format!("invalid property {}", property::RECEIVE_TIMEOUT_MS))?;
    Ok(configured.map_or(Timeout::Never, Timeout::from_millis))
}

/// Sends each interest and receives it back before sending the next, so a
/// count larger than the queue capacity cannot stall. Returns the number of
/// messages received.
fn exchange(
    portal: &Portal,
    prefix: &Name,
    count: usize,
    timeout: Timeout,
) -> anyhow::Result<usize> {
    portal.start().context("starting portal")?;
    portal
        .listen(prefix, timeout)
        .with_context(|| format!("listening on {prefix}"))?;

    for index in 0..count {
        let name = prefix
            .child(format!("item-{index}"))
            .context("building interest name")?;
        let interest = Message::interest(name);
        portal
            .send(&interest, timeout)
            .with_context(|| format!("sending interest {index}"))?;
        let received = portal
            .receive(timeout)
            .with_context(|| format!("receiving interest {index}"))?;
        ensure!(
            received == interest,
            "interest {index} came back as {:?}",
            received.name()
        );
        if let Some(name) = received.name() {
            println!("{:?} {name}", received.kind());
        }
    }

    portal.stop().context("stopping portal")?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use portal::Properties;

    use super::*;

    #[test]
    fn argument_definitions_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn prefix_must_be_rooted() {
        assert!(Args::try_parse_from(["portalctl", "--prefix", "relative"]).is_err());
        let args = Args::try_parse_from(["portalctl", "--prefix", "lci:/demo", "-n", "2"]).unwrap();
        assert_eq!(args.prefix.to_string(), "/demo");
        assert_eq!(args.count, 2);
    }

    #[test]
    fn flag_timeout_overrides_property() {
        let factory = PortalFactory::new(
            None,
            Properties::new().with(property::RECEIVE_TIMEOUT_MS, "1200"),
        );
        assert_eq!(call_timeout(Some(5), &factory).unwrap(), Timeout::from_millis(5));
        assert_eq!(call_timeout(None, &factory).unwrap(), Timeout::from_millis(1200));
    }

    #[test]
    fn missing_timeout_waits_forever() {
        let factory = PortalFactory::new(None, Properties::new());
        assert_eq!(call_timeout(None, &factory).unwrap(), Timeout::Never);
    }

    #[test]
    fn malformed_timeout_property_is_reported() {
        let factory = PortalFactory::new(
            None,
            Properties::new().with(property::RECEIVE_TIMEOUT_MS, "soon"),
        );
        let err = call_timeout(None, &factory).unwrap_err();
        assert!(err.to_string().contains(property::RECEIVE_TIMEOUT_MS));
    }

    #[test]
    fn exchange_round_trips_more_than_queue_capacity() {
        let factory = PortalFactory::new(
            None,
            Properties::new().with(property::LOOPBACK_QUEUE_CAPACITY, "1"),
        );
        let portal = loopback_portal(&factory).unwrap();
        let prefix = Name::new("/test").unwrap();

        let received = exchange(&portal, &prefix, 3, Timeout::from_millis(500)).unwrap();
        assert_eq!(received, 3);
        assert!(portal.error_code().is_none());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/portal.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/portal.toml"));
    }
}
