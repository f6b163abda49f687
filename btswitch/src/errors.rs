/*!
 * Exit codes and user-facing error text
 */

use btswitch_core::{BackendError, CoreError};
use thiserror::Error;

pub const EXIT_OK: i32 = 0;
pub const EXIT_GENERIC: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_DEPENDENCY_MISSING: i32 = 3;
pub const EXIT_UNSUPPORTED: i32 = 4;

const AMBIGUOUS_HINT: &str = "try --exact or use --interactive to choose";

/// Flag combinations rejected before any device work starts.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UsageError(pub String);

impl UsageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if !cfg!(target_os = "macos") {
        return EXIT_UNSUPPORTED;
    }
    exit_code_on_supported(err)
}

fn exit_code_on_supported(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<UsageError>().is_some() {
        return EXIT_USAGE;
    }
    match err.downcast_ref::<CoreError>().map(CoreError::root) {
        Some(CoreError::Backend(BackendError::DependencyMissing(_))) => EXIT_DEPENDENCY_MISSING,
        Some(
            CoreError::NotFound { .. }
            | CoreError::Ambiguous { .. }
            | CoreError::Canceled
            | CoreError::Precondition(_),
        ) => EXIT_USAGE,
        _ => EXIT_GENERIC,
    }
}

pub fn user_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<CoreError>().map(CoreError::root) {
        Some(CoreError::NotFound { query }) if query.is_empty() => "no device selected".to_string(),
        Some(CoreError::NotFound { query }) => format!("no device matched {query:?}"),
        Some(CoreError::Ambiguous { query, .. }) if query.is_empty() => {
            format!("device selection is ambiguous ({AMBIGUOUS_HINT})")
        }
        Some(CoreError::Ambiguous { query, count: 0 }) => {
            format!("{query:?} matched multiple devices ({AMBIGUOUS_HINT})")
        }
        Some(CoreError::Ambiguous { query, count }) => {
            format!("{query:?} matched {count} devices ({AMBIGUOUS_HINT})")
        }
        Some(CoreError::Canceled) => "canceled".to_string(),
        Some(CoreError::Backend(BackendError::DependencyMissing(dependency))) => format!(
            "missing dependency: {dependency} (install via Homebrew: brew install blueutil)"
        ),
        _ => format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use btswitch_core::Device;

    fn wrap(err: CoreError) -> anyhow::Error {
        anyhow::Error::new(err)
    }

    #[test]
    fn messages_for_resolution_failures() {
        assert_eq!(user_message(&wrap(CoreError::not_found(""))), "no device selected");
        assert_eq!(
            user_message(&wrap(CoreError::not_found("AirPods"))),
            "no device matched \"AirPods\""
        );
        assert_eq!(
            user_message(&wrap(CoreError::Ambiguous {
                query: "MX".into(),
                count: 2
            })),
            "\"MX\" matched 2 devices (try --exact or use --interactive to choose)"
        );
        assert_eq!(user_message(&wrap(CoreError::Canceled)), "canceled");
    }

    #[test]
    fn missing_dependency_mentions_homebrew() {
        let err = wrap(BackendError::DependencyMissing("blueutil".into()).into());
        assert_eq!(
            user_message(&err),
            "missing dependency: blueutil (install via Homebrew: brew install blueutil)"
        );
        assert_eq!(exit_code_on_supported(&err), EXIT_DEPENDENCY_MISSING);
    }

    #[test]
    fn repair_context_is_peeled_for_classification() {
        let err = wrap(CoreError::Repair {
            from: Device::new("Old", "aa"),
            source: Box::new(CoreError::Canceled),
        });
        assert_eq!(user_message(&err), "canceled");
        assert_eq!(exit_code_on_supported(&err), EXIT_USAGE);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(exit_code_on_supported(&wrap(CoreError::not_found("x"))), EXIT_USAGE);
        assert_eq!(
            exit_code_on_supported(&wrap(CoreError::precondition("pair requires a TTY"))),
            EXIT_USAGE
        );
        assert_eq!(
            exit_code_on_supported(&anyhow::Error::new(UsageError::new("--multi cannot be used with a name argument"))),
            EXIT_USAGE
        );
        assert_eq!(
            exit_code_on_supported(&wrap(BackendError::failed("blueutil: exit status: 1").into())),
            EXIT_GENERIC
        );
        assert_eq!(exit_code_on_supported(&wrap(CoreError::ConnectFailed)), EXIT_GENERIC);
    }

    #[test]
    fn context_does_not_hide_the_core_error() {
        let err = Err::<(), _>(CoreError::Canceled)
            .context("connect")
            .unwrap_err();
        assert_eq!(user_message(&err), "canceled");
    }

    #[test]
    fn other_errors_print_their_chain() {
        let err = anyhow::anyhow!("disk on fire").context("cannot read config");
        assert_eq!(user_message(&err), "cannot read config: disk on fire");
        assert_eq!(exit_code_on_supported(&err), EXIT_GENERIC);
    }
}
