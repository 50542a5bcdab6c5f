use async_trait::async_trait;
use rss_types::{CommandKey, CommandMap};

use crate::util::Error;

/// Outcome of an exec into a pod's application container.
///
/// The original reconciler threads a `(stdout, stderr, err, rc)` tuple
/// through every call site; here `err` only covers failure to exec at all
/// (container gone, API unreachable) and is surfaced as `Err`, while a
/// non-zero `rc` from a process that *did* run is `Ok` — the caller
/// decides what a given rc means.
#[derive(Clone, Debug, Default)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub rc: i32,
}

/// Runs commands inside a member's application container. The core never
/// talks to the orchestration API directly; it depends on this trait so
/// [`crate::core::reconcile::tick`] and [`crate::core::replicate`] can be
/// exercised against a fake in tests.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn exec(
        &self,
        namespace: &str,
        pod_name: &str,
        container: &str,
        args: &[String],
    ) -> Result<ExecOutcome, Error>;
}

/// Looks up a command by key, erroring if it isn't configured.
pub fn require_command<'a>(commands: &'a CommandMap, key: CommandKey) -> Result<&'a Vec<String>, Error> {
    commands.get(&key).ok_or(Error::MissingCommand { key })
}

/// Resolves the command used to bring a member up as the seed / first
/// primary: `StartSeedCommand` if configured, else `StartPrimaryCommand`.
pub fn resolve_seed_command(commands: &CommandMap) -> Result<&Vec<String>, Error> {
    commands
        .get(&CommandKey::StartSeedCommand)
        .or_else(|| commands.get(&CommandKey::StartPrimaryCommand))
        .ok_or(Error::MissingCommand {
            key: CommandKey::StartPrimaryCommand,
        })
}

/// Resolves the command used to bring a member up as a secondary:
/// `StartSecondaryCommand` if configured, else `StartPrimaryCommand`.
pub fn resolve_secondary_command(commands: &CommandMap) -> Result<&Vec<String>, Error> {
    commands
        .get(&CommandKey::StartSecondaryCommand)
        .or_else(|| commands.get(&CommandKey::StartPrimaryCommand))
        .ok_or(Error::MissingCommand {
            key: CommandKey::StartPrimaryCommand,
        })
}

/// Builds the peer-discovery arguments appended to every start command:
/// one `<memberName>.<serviceName>` entry per currently-online primary.
pub fn peer_args<'a>(online_primaries: impl Iterator<Item = &'a str>, service_name: &str) -> Vec<String> {
    online_primaries
        .map(|name| format!("{name}.{service_name}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn commands(pairs: &[(CommandKey, &str)]) -> CommandMap {
        let mut map = BTreeMap::new();
        for (key, arg) in pairs {
            map.insert(*key, vec![arg.to_string()]);
        }
        map
    }

    #[test]
    fn seed_command_falls_back_to_primary() {
        let cmds = commands(&[(CommandKey::StartPrimaryCommand, "start-primary")]);
        assert_eq!(resolve_seed_command(&cmds).unwrap(), &vec!["start-primary".to_string()]);
    }

    #[test]
    fn seed_command_prefers_dedicated_seed_command() {
        let cmds = commands(&[
            (CommandKey::StartPrimaryCommand, "start-primary"),
            (CommandKey::StartSeedCommand, "start-seed"),
        ]);
        assert_eq!(resolve_seed_command(&cmds).unwrap(), &vec!["start-seed".to_string()]);
    }

    #[test]
    fn secondary_command_falls_back_to_primary() {
        let cmds = commands(&[(CommandKey::StartPrimaryCommand, "start-primary")]);
        assert_eq!(
            resolve_secondary_command(&cmds).unwrap(),
            &vec!["start-primary".to_string()]
        );
    }

    #[test]
    fn missing_primary_command_is_an_error() {
        let cmds = commands(&[]);
        assert!(resolve_seed_command(&cmds).is_err());
        assert!(resolve_secondary_command(&cmds).is_err());
    }

    #[test]
    fn peer_args_join_name_and_service() {
        let names = vec!["rss-0", "rss-1"];
        let args = peer_args(names.into_iter(), "rss-headless");
        assert_eq!(args, vec!["rss-0.rss-headless", "rss-1.rss-headless"]);
    }
}
