//! The `@` command language.
//!
//! A REPL line starting with `@` is a special command; anything else is a
//! command for every connected host. While interactive, only `@?`, `@n` and
//! `@@` mean anything and all other input passes through to the remote shells.
//!
//! Forms are matched first-match-wins in the order of [`parse_special`].
//! Input that matches nothing is silently ignored.

use crate::broadcast::BroadcastExecutor;
use crate::hosts::{Host, HostId, HostRegistry};

pub const HELP: &str = "
Entering a command starting with '@' may have special meaning:

@? or @help\t\tdisplay help
@list\t\t\tlist hosts
@-ID or @drop ID\tdisconnect and remove from list host with specified ID
@--\t\t\tdrop all disconnected hosts
@ID command\t\texecute command only on host with specified ID
@i\t\t\tenter interactive mode (keystrokes go to every connected host)
@= command\t\trun command in parallel on many hosts
@{} command\t\texecute command substituting {ID} with id, {IP} with address, {USER} with user
@scp local remote\tcopy file to all hosts (not implemented)
@n\t\t\texit interactive mode
@@\t\t\tinput @

In interactive mode only @?, @n and @@ do anything, and only at the start of a line.
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    LiteralAt,
    ExitInteractive,
    PassThrough(Vec<u8>),
    EnterInteractive,
    List,
    Drop(HostId),
    PruneDisconnected,
    ExecOn { id: HostId, command: String },
    Template(String),
    Scp { source: String, destination: String },
    Parallel(String),
    /// A line without the `@` prefix.
    Broadcast(String),
    Unrecognized,
}

/// What the caller should do after a command has been dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Print(String),
    Run { command: String, parallel: bool },
    EnterInteractive,
    ExitInteractive,
    /// Bytes for every interactive channel.
    Send(Vec<u8>),
}

/// Classify a full input line.
pub fn parse_line(line: &str, interactive: bool) -> Command {
    if let Some(spec) = line.strip_prefix('@') {
        return parse_special(spec, interactive);
    }
    if interactive {
        return Command::PassThrough(line.as_bytes().to_vec());
    }
    if line.trim().is_empty() {
        return Command::Unrecognized;
    }
    Command::Broadcast(line.to_string())
}

/// Classify the text after `@`.
pub fn parse_special(spec: &str, interactive: bool) -> Command {
    let word = spec.trim_end();

    match word {
        "?" | "help" => return Command::Help,
        "@" => return Command::LiteralAt,
        "n" => return Command::ExitInteractive,
        _ => {}
    }

    if interactive {
        return Command::PassThrough(spec.as_bytes().to_vec());
    }

    match word {
        "i" => return Command::EnterInteractive,
        "list" => return Command::List,
        _ => {}
    }

    if let Some(id) = word
        .strip_prefix("drop ")
        .or_else(|| word.strip_prefix('-'))
        .and_then(parse_id)
    {
        return Command::Drop(id);
    }

    if word == "--" {
        return Command::PruneDisconnected;
    }

    if let Some((id, command)) = spec.split_once(' ') {
        if let Some(id) = parse_id(id) {
            let command = command.trim_end();
            if !command.is_empty() {
                return Command::ExecOn {
                    id,
                    command: command.to_string(),
                };
            }
        }
    }

    if let Some(template) = spec.strip_prefix("{} ") {
        return Command::Template(template.trim_end().to_string());
    }

    if let Some((source, destination)) = word.strip_prefix("scp ").and_then(|r| r.split_once(' '))
    {
        if !source.contains(char::is_whitespace) && !destination.contains(char::is_whitespace) {
            return Command::Scp {
                source: source.to_string(),
                destination: destination.to_string(),
            };
        }
    }

    if let Some(command) = spec.strip_prefix("= ") {
        return Command::Parallel(command.to_string());
    }

    Command::Unrecognized
}

/// Classify the byte typed after `@` at the start of an interactive line.
pub fn parse_escape(byte: u8) -> Command {
    match byte {
        b'?' => Command::Help,
        b'@' => Command::LiteralAt,
        b'n' => Command::ExitInteractive,
        other => Command::PassThrough(vec![other]),
    }
}

fn parse_id(text: &str) -> Option<HostId> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Fill `{ID}`, `{USER}` and `{IP}` for one host. The credential is never substituted.
pub fn substitute(template: &str, host: &Host) -> String {
    template
        .replace("{ID}", &host.id.to_string())
        .replace("{USER}", &host.username)
        .replace("{IP}", &host.address)
}

/// Render the `@list` output.
pub fn list_hosts(registry: &HostRegistry) -> String {
    let mut out = String::new();
    for host in registry.iter() {
        out.push_str(&host.to_string());
        out.push('\n');
    }
    let (connected, disconnected) = registry.counts();
    out.push_str(&format!(
        "Connected: {}, disconnected: {}\n",
        connected, disconnected
    ));
    out
}

#[derive(Debug, Default)]
pub struct CommandRouter {
    interactive: bool,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Drop back to command mode, whatever ended interactive mode.
    pub fn leave_interactive(&mut self) {
        self.interactive = false;
    }

    pub async fn handle_line(
        &mut self,
        line: &str,
        registry: &mut HostRegistry,
        executor: &BroadcastExecutor,
    ) -> Action {
        let command = parse_line(line, self.interactive);
        self.dispatch(command, registry, executor).await
    }

    /// Resolve an interactive escape. Only the interactive subset applies, so
    /// nothing here touches the registry.
    pub fn resolve_escape(&mut self, byte: u8) -> Action {
        match parse_escape(byte) {
            Command::Help => Action::Print(HELP.to_string()),
            Command::LiteralAt => Action::Send(b"@".to_vec()),
            Command::ExitInteractive => {
                self.interactive = false;
                Action::ExitInteractive
            }
            Command::PassThrough(bytes) => Action::Send(bytes),
            _ => Action::None,
        }
    }

    pub async fn dispatch(
        &mut self,
        command: Command,
        registry: &mut HostRegistry,
        executor: &BroadcastExecutor,
    ) -> Action {
        match command {
            Command::Help => Action::Print(HELP.to_string()),
            Command::LiteralAt if self.interactive => Action::Send(b"@".to_vec()),
            Command::LiteralAt => Action::Run {
                command: "@".to_string(),
                parallel: false,
            },
            Command::ExitInteractive => {
                if self.interactive {
                    self.interactive = false;
                    Action::ExitInteractive
                } else {
                    Action::None
                }
            }
            Command::PassThrough(bytes) => Action::Send(bytes),
            Command::EnterInteractive => self.enter_interactive(registry),
            Command::List => Action::Print(list_hosts(registry)),
            Command::Drop(id) => {
                tracing::info!("Dropping {}...", id);
                match registry.remove(id) {
                    Some(mut host) => host.disconnect().await,
                    None => tracing::warn!("No host with ID {}", id),
                }
                Action::None
            }
            Command::PruneDisconnected => {
                let removed = registry.remove_where(|host| !host.is_connected());
                tracing::info!("Dropped {} disconnected hosts.", removed.len());
                Action::None
            }
            Command::ExecOn { id, command } => {
                match registry.get_mut(id) {
                    Some(host) => {
                        if executor.execute_one(host, &command).await {
                            tracing::info!("Host {} OK.", id);
                        } else {
                            tracing::error!("Host {} FAILED.", id);
                        }
                    }
                    None => tracing::warn!("No host with ID {}", id),
                }
                Action::None
            }
            Command::Template(template) => {
                let report = executor
                    .execute_on(registry, false, |host| substitute(&template, host))
                    .await;
                report.log();
                Action::None
            }
            Command::Scp { source, destination } => {
                tracing::error!("scp {} {}: not implemented yet", source, destination);
                Action::None
            }
            Command::Parallel(command) => Action::Run {
                command,
                parallel: true,
            },
            Command::Broadcast(command) => Action::Run {
                command,
                parallel: false,
            },
            Command::Unrecognized => Action::None,
        }
    }

    fn enter_interactive(&mut self, registry: &HostRegistry) -> Action {
        if !registry.first().is_some_and(|host| host.is_connected()) {
            tracing::warn!("Can't start interactive, as first host is not connected!");
            return Action::None;
        }
        self.interactive = true;
        Action::EnterInteractive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::TaskPool;
    use crate::session::Credential;
    use crate::testing::{FakeConnector, FakeSession};
    use std::sync::Arc;

    fn executor() -> BroadcastExecutor {
        BroadcastExecutor::new(Arc::new(FakeConnector::new()), TaskPool::new(4))
    }

    fn connected(registry: &mut HostRegistry, id: HostId) -> FakeSession {
        let session = FakeSession::healthy();
        registry
            .get_mut(id)
            .unwrap()
            .attach_session(session.clone().into_session());
        session
    }

    fn registry(count: usize) -> HostRegistry {
        let mut registry = HostRegistry::new();
        for i in 0..count {
            registry.add(format!("10.0.0.{}", i + 1), format!("user{}", i), Credential::new("hunter2"));
        }
        registry
    }

    #[test]
    fn test_parse_fixed_words() {
        assert_eq!(parse_line("@?", false), Command::Help);
        assert_eq!(parse_line("@help  ", false), Command::Help);
        assert_eq!(parse_line("@@", false), Command::LiteralAt);
        assert_eq!(parse_line("@n", false), Command::ExitInteractive);
        assert_eq!(parse_line("@i", false), Command::EnterInteractive);
        assert_eq!(parse_line("@list", false), Command::List);
        assert_eq!(parse_line("@--", false), Command::PruneDisconnected);
    }

    #[test]
    fn test_parse_drop_forms() {
        assert_eq!(parse_line("@-3", false), Command::Drop(3));
        assert_eq!(parse_line("@drop 12", false), Command::Drop(12));
        assert_eq!(parse_line("@-x", false), Command::Unrecognized);
        assert_eq!(parse_line("@drop", false), Command::Unrecognized);
    }

    #[test]
    fn test_parse_commands_with_payload() {
        assert_eq!(
            parse_line("@2 uname -a", false),
            Command::ExecOn {
                id: 2,
                command: "uname -a".to_string()
            }
        );
        assert_eq!(
            parse_line("@{} echo {ID}", false),
            Command::Template("echo {ID}".to_string())
        );
        assert_eq!(
            parse_line("@scp a.txt /tmp/b.txt", false),
            Command::Scp {
                source: "a.txt".to_string(),
                destination: "/tmp/b.txt".to_string()
            }
        );
        assert_eq!(
            parse_line("@= sleep 1; date", false),
            Command::Parallel("sleep 1; date".to_string())
        );
    }

    #[test]
    fn test_unmatched_is_silent() {
        assert_eq!(parse_line("@bogus", false), Command::Unrecognized);
        assert_eq!(parse_line("@", false), Command::Unrecognized);
        assert_eq!(parse_line("@=nospace", false), Command::Unrecognized);
        assert_eq!(parse_line("", false), Command::Unrecognized);
    }

    #[test]
    fn test_plain_line_is_broadcast() {
        assert_eq!(
            parse_line("df -h", false),
            Command::Broadcast("df -h".to_string())
        );
    }

    #[test]
    fn test_interactive_short_circuit() {
        assert_eq!(parse_line("@n", true), Command::ExitInteractive);
        assert_eq!(parse_line("@?", true), Command::Help);
        assert_eq!(parse_line("@i", true), Command::PassThrough(b"i".to_vec()));
        assert_eq!(
            parse_line("@list", true),
            Command::PassThrough(b"list".to_vec())
        );
        assert_eq!(parse_line("ls", true), Command::PassThrough(b"ls".to_vec()));
    }

    #[test]
    fn test_parse_escape() {
        assert_eq!(parse_escape(b'?'), Command::Help);
        assert_eq!(parse_escape(b'n'), Command::ExitInteractive);
        assert_eq!(parse_escape(b'@'), Command::LiteralAt);
        assert_eq!(parse_escape(b'x'), Command::PassThrough(vec![b'x']));
        assert_eq!(parse_escape(0xc3), Command::PassThrough(vec![0xc3]));
    }

    #[test]
    fn test_substitute_never_uses_credential() {
        let registry = registry(1);
        let host = registry.get(0).unwrap();
        assert_eq!(
            substitute("{ID} {USER} {IP} {PASS} hunter2", host),
            "0 user0 10.0.0.1 {PASS} hunter2"
        );
    }

    #[tokio::test]
    async fn test_template_runs_per_host() {
        let executor = executor();
        let mut registry = registry(2);
        let first = connected(&mut registry, 0);
        let second = connected(&mut registry, 1);
        let mut router = CommandRouter::new();

        let action = router
            .handle_line("@{} echo {ID}-{USER} {PASS}", &mut registry, &executor)
            .await;

        assert_eq!(action, Action::None);
        assert_eq!(first.commands(), vec!["echo 0-user0 {PASS}"]);
        assert_eq!(second.commands(), vec!["echo 1-user1 {PASS}"]);
        for command in first.commands().iter().chain(second.commands().iter()) {
            assert!(!command.contains("hunter2"));
        }
    }

    #[tokio::test]
    async fn test_drop_disconnects_and_removes() {
        let executor = executor();
        let mut registry = registry(2);
        let session = connected(&mut registry, 0);
        connected(&mut registry, 1);
        let mut router = CommandRouter::new();

        router.handle_line("@-0", &mut registry, &executor).await;

        assert!(session.is_closed());
        let ids: Vec<_> = registry.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1]);

        router.handle_line("@drop 1", &mut registry, &executor).await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_prune_removes_only_disconnected() {
        let executor = executor();
        let mut registry = registry(3);
        connected(&mut registry, 1);
        let mut router = CommandRouter::new();

        router.handle_line("@--", &mut registry, &executor).await;

        let ids: Vec<_> = registry.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test]
    async fn test_exec_on_single_host() {
        let executor = executor();
        let mut registry = registry(2);
        let first = connected(&mut registry, 0);
        let second = connected(&mut registry, 1);
        let mut router = CommandRouter::new();

        router.handle_line("@1 whoami", &mut registry, &executor).await;
        router.handle_line("@7 whoami", &mut registry, &executor).await;

        assert!(first.commands().is_empty());
        assert_eq!(second.commands(), vec!["whoami"]);
    }

    #[tokio::test]
    async fn test_list_counts() {
        let executor = executor();
        let mut registry = registry(2);
        connected(&mut registry, 1);
        let mut router = CommandRouter::new();

        let Action::Print(text) = router.handle_line("@list", &mut registry, &executor).await
        else {
            panic!("expected list output");
        };

        assert!(text.contains("0:\tuser0@10.0.0.1\t(Disconnected)"));
        assert!(text.contains("1:\tuser1@10.0.0.2\t(Connected)"));
        assert!(text.ends_with("Connected: 1, disconnected: 1\n"));
        assert!(!text.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_enter_interactive_requires_first_host() {
        let executor = executor();
        let mut registry = registry(2);
        connected(&mut registry, 1);
        let mut router = CommandRouter::new();

        let action = router.handle_line("@i", &mut registry, &executor).await;
        assert_eq!(action, Action::None);
        assert!(!router.is_interactive());

        connected(&mut registry, 0);
        let action = router.handle_line("@i", &mut registry, &executor).await;
        assert_eq!(action, Action::EnterInteractive);
        assert!(router.is_interactive());

        // Already interactive: `@i` is just input
        let action = router.handle_line("@i", &mut registry, &executor).await;
        assert_eq!(action, Action::Send(b"i".to_vec()));

        let action = router.handle_line("@n", &mut registry, &executor).await;
        assert_eq!(action, Action::ExitInteractive);
        assert!(!router.is_interactive());
    }

    #[tokio::test]
    async fn test_run_actions() {
        let executor = executor();
        let mut registry = registry(1);
        let mut router = CommandRouter::new();

        assert_eq!(
            router.handle_line("uptime", &mut registry, &executor).await,
            Action::Run {
                command: "uptime".to_string(),
                parallel: false
            }
        );
        assert_eq!(
            router.handle_line("@= uptime", &mut registry, &executor).await,
            Action::Run {
                command: "uptime".to_string(),
                parallel: true
            }
        );
        assert_eq!(
            router.handle_line("@@", &mut registry, &executor).await,
            Action::Run {
                command: "@".to_string(),
                parallel: false
            }
        );
        assert_eq!(
            router.handle_line("@scp a b", &mut registry, &executor).await,
            Action::None
        );
        assert_eq!(
            router.handle_line("@n", &mut registry, &executor).await,
            Action::None
        );
    }

    #[test]
    fn test_resolve_escape() {
        let mut router = CommandRouter {
            interactive: true,
        };
        assert_eq!(router.resolve_escape(b'@'), Action::Send(b"@".to_vec()));
        assert_eq!(router.resolve_escape(b'l'), Action::Send(b"l".to_vec()));
        assert!(matches!(router.resolve_escape(b'?'), Action::Print(_)));
        assert!(router.is_interactive());
        assert_eq!(router.resolve_escape(b'n'), Action::ExitInteractive);
        assert!(!router.is_interactive());
    }
}
