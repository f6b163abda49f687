/*!
 * Subcommand handlers
 */

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use btswitch_core::{
    Action, BatchParams, BluetoothPort, Connector, Device, DevicePicker, Disconnector, GatedPicker,
    ListFilter, Lister, PairParams, Pairer, Progress, RepairParams, Repairer, SelectParams, TerminalGate,
};
use crossterm::tty::IsTty;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::blueutil::BlueutilClient;
use crate::config::Config;
use crate::errors::UsageError;
use crate::output::{write_devices, write_names};
use crate::picker::TerminalPicker;
use crate::{ListArgs, PairArgs, RepairArgs, SelectArgs};

/// Everything one invocation needs, wired once in `main`.
pub struct Env {
    pub bluetooth: Arc<dyn BluetoothPort>,
    /// Only present when both stdin and stdout are terminals.
    pub picker: Option<Arc<dyn DevicePicker>>,
    pub progress: Progress,
    pub is_tty: bool,
    pub config: Config,
}

impl Env {
    pub fn new(config: Config, gate: TerminalGate) -> Self {
        let is_tty = io::stdin().is_tty() && io::stdout().is_tty();
        let picker: Option<Arc<dyn DevicePicker>> = if is_tty {
            Some(Arc::new(GatedPicker::new(
                Arc::new(TerminalPicker::new()),
                gate.clone(),
            )))
        } else {
            None
        };
        debug!(is_tty, blueutil = %config.blueutil_path, "environment");
        Self {
            bluetooth: Arc::new(BlueutilClient::new(config.blueutil_path.clone())),
            picker,
            progress: Progress::new(io::stderr(), gate),
            is_tty,
            config,
        }
    }

    /// A token cancelled by Ctrl-C.
    pub fn cancel_on_interrupt(&self) -> CancellationToken {
        let cancel = CancellationToken::new();
        let interrupted = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    debug!("interrupted");
                    interrupted.cancel();
                }
                Err(e) => warn!("cannot listen for Ctrl-C: {e}"),
            }
        });
        cancel
    }

    fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.config.action_timeout_secs)
    }
}

/// Child of `cancel` that also fires after `secs`.
fn with_deadline(cancel: &CancellationToken, secs: u64) -> CancellationToken {
    let child = cancel.child_token();
    let timer = child.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                debug!(secs, "deadline reached");
                timer.cancel();
            }
            _ = timer.cancelled() => {}
        }
    });
    child
}

pub async fn list(env: &Env, args: &ListArgs, cancel: &CancellationToken) -> Result<()> {
    let filter = if args.connected {
        ListFilter::Connected
    } else if args.disconnected {
        ListFilter::Disconnected
    } else {
        ListFilter::All
    };
    let devices = Lister::new(Arc::clone(&env.bluetooth))
        .list(filter, cancel)
        .await?;

    let mut out = io::stdout().lock();
    if args.names_only {
        write_names(&mut out, &devices)?;
        return Ok(());
    }
    write_devices(&mut out, &devices, args.format, !args.no_header)
}

/// Whether the picker is in play for connect/disconnect.
///
/// Omitting the name means interactive; `--multi` always is.
fn resolve_interactive(args: &SelectArgs, is_tty: bool) -> Result<bool, UsageError> {
    let mut interactive = args.interactive || args.name.is_none();
    if args.multi {
        if args.name.is_some() {
            return Err(UsageError::new("--multi cannot be used with a name argument"));
        }
        interactive = true;
    }
    if interactive && !is_tty {
        return Err(UsageError::new("--interactive requires a TTY"));
    }
    Ok(interactive)
}

pub async fn select(
    env: &Env,
    action: Action,
    args: &SelectArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let interactive = resolve_interactive(args, env.is_tty)?;
    let picker = if interactive { env.picker.clone() } else { None };
    let bluetooth = Arc::clone(&env.bluetooth);

    let devices = if args.multi {
        let params = BatchParams {
            dry_run: args.dry_run,
            action_timeout: env.action_timeout(),
        };
        match action {
            Action::Connect => Connector::new(bluetooth, picker).connect_many(&params, cancel).await?,
            Action::Disconnect => {
                Disconnector::new(bluetooth, picker)
                    .disconnect_many(&params, cancel)
                    .await?
            }
        }
    } else {
        let params = SelectParams {
            name: args.name.clone().unwrap_or_default(),
            exact: args.exact,
            interactive,
            is_tty: env.is_tty,
            dry_run: args.dry_run,
            action_timeout: env.action_timeout(),
        };
        let device = match action {
            Action::Connect => Connector::new(bluetooth, picker).connect(&params, cancel).await?,
            Action::Disconnect => {
                Disconnector::new(bluetooth, picker)
                    .disconnect(&params, cancel)
                    .await?
            }
        };
        vec![device]
    };

    if !args.dry_run {
        for device in &devices {
            env.progress
                .line(format_args!("{}ed: {} ({})", action.verb(), device.name, device.address));
        }
    }

    let mut out = io::stdout().lock();
    write_devices(&mut out, &devices, args.format, !args.no_header)
}

/// Rejects an interactive pair/repair without a terminal before any backend call.
fn pair_params(config: &Config, args: &PairArgs, is_tty: bool) -> Result<PairParams, UsageError> {
    if args.interactive && !is_tty {
        return Err(UsageError::new("--interactive requires a TTY"));
    }
    Ok(PairParams {
        interactive: args.interactive,
        is_tty,
        inquiry_secs: args.inquiry.unwrap_or(config.pair.inquiry_secs),
        pin: args.pin.clone().filter(|p| !p.is_empty()),
        wait_connect_secs: args.wait_connect.unwrap_or(config.pair.wait_connect_secs),
        max_attempts: args.max_attempts.unwrap_or(config.pair.max_attempts),
    })
}

pub async fn pair(env: &Env, args: &PairArgs, cancel: &CancellationToken) -> Result<()> {
    let params = pair_params(&env.config, args, env.is_tty)?;
    let cancel = with_deadline(cancel, env.config.repair_deadline_secs);

    let pairer = Pairer::new(
        Arc::clone(&env.bluetooth),
        env.picker.clone(),
        env.progress.clone(),
    );
    let device = pairer.pair(&params, &cancel).await?;
    print_line(format_args!("paired: {}", describe(&device)))
}

pub async fn repair(env: &Env, args: &RepairArgs, cancel: &CancellationToken) -> Result<()> {
    let pairing = pair_params(&env.config, &args.pair, env.is_tty)?;
    let params = RepairParams {
        interactive: pairing.interactive,
        is_tty: pairing.is_tty,
        inquiry_secs: pairing.inquiry_secs,
        pin: pairing.pin,
        skip_unpair: args.skip_unpair,
        wait_connect_secs: pairing.wait_connect_secs,
        max_attempts: pairing.max_attempts,
    };
    let cancel = with_deadline(cancel, env.config.repair_deadline_secs);

    let repairer = Repairer::new(
        Arc::clone(&env.bluetooth),
        env.picker.clone(),
        env.progress.clone(),
    );
    let repaired = repairer.repair(&params, &cancel).await?;
    print_line(format_args!(
        "repaired: {} -> {}",
        describe(&repaired.from),
        describe(&repaired.to)
    ))
}

fn describe(device: &Device) -> String {
    format!("{} ({})", device.name, device.address)
}

fn print_line(line: std::fmt::Arguments<'_>) -> Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{line}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> SelectArgs {
        SelectArgs {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn omitted_name_means_interactive() {
        assert!(resolve_interactive(&SelectArgs::default(), true).unwrap());
        assert!(!resolve_interactive(&named("MX"), false).unwrap());
    }

    #[test]
    fn explicit_interactive_needs_a_tty() {
        let args = SelectArgs {
            interactive: true,
            ..named("MX")
        };
        let err = resolve_interactive(&args, false).unwrap_err();
        assert_eq!(err.to_string(), "--interactive requires a TTY");
        assert!(resolve_interactive(&SelectArgs::default(), false).is_err());
    }

    #[test]
    fn multi_rejects_a_name_and_implies_interactive() {
        let args = SelectArgs {
            multi: true,
            ..named("MX")
        };
        assert_eq!(
            resolve_interactive(&args, true).unwrap_err().to_string(),
            "--multi cannot be used with a name argument"
        );

        let args = SelectArgs {
            multi: true,
            ..Default::default()
        };
        assert!(resolve_interactive(&args, true).unwrap());
    }

    #[test]
    fn pair_flags_override_config() {
        let config = Config::default();
        let params = pair_params(&config, &PairArgs::default(), true).unwrap();
        assert_eq!(params.inquiry_secs, 60);
        assert_eq!(params.wait_connect_secs, 10);
        assert_eq!(params.max_attempts, 6);
        assert!(params.interactive && params.is_tty);
        assert_eq!(params.pin, None);

        let args = PairArgs {
            interactive: false,
            inquiry: Some(15),
            pin: Some(String::new()),
            wait_connect: Some(0),
            max_attempts: Some(1),
        };
        let params = pair_params(&config, &args, false).unwrap();
        assert!(!params.interactive);
        assert_eq!(params.inquiry_secs, 15);
        assert_eq!(params.wait_connect_secs, 0);
        assert_eq!(params.max_attempts, 1);
        assert_eq!(params.pin, None);
    }

    #[test]
    fn interactive_pair_needs_a_tty() {
        let err = pair_params(&Config::default(), &PairArgs::default(), false).unwrap_err();
        assert_eq!(err.to_string(), "--interactive requires a TTY");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_the_child_only() {
        let parent = CancellationToken::new();
        let child = with_deadline(&parent, 180);
        tokio::time::sleep(Duration::from_secs(181)).await;
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn parent_cancel_reaches_the_deadline_token() {
        let parent = CancellationToken::new();
        let child = with_deadline(&parent, 180);
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
