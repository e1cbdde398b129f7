//! External `jj` invocation and refresh lifecycle.
//!
//! Running `jj` is blocking, so every refresh happens on a dedicated
//! worker thread: the worker fetches the revision metadata listing, spawns
//! the graph-log subprocess, and drives the streaming row parser, handing
//! [`RefreshEvent`]s back to the UI loop. Backpressure is the parser's
//! own: batches only flow when the consumer signals
//! [`Control::More`][crate::parser::Control] through the handle.
//!
//! Superseded refreshes are handled by [`RefreshRegistry`] — an explicit,
//! caller-owned generation counter per operation key, passed by reference
//! (no process-wide state). A newer `begin` makes older generations stale;
//! the UI drops their events and cancels their handles, which stops the
//! producer and kills the child process.

use crate::model::CommandError;
use crate::parser::{parse_rows_streaming, Control, RevisionMeta, RowBatch};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

/// Registry key for graph-log refreshes.
pub const REFRESH_LOG: &str = "log";

/// Revision metadata template: one pipe-delimited record per revision.
const META_TEMPLATE: &str = r#"change_id.short(8) ++ "|" ++ commit_id ++ "|" ++ author.email() ++ "|" ++ parents.map(|p| p.change_id().short(8)).join(" ") ++ "\n""#;

// ===== JjCommand =====

/// Builder for `jj` invocations against one repository.
#[derive(Debug, Clone)]
pub struct JjCommand {
    program: String,
    repo: Option<PathBuf>,
}

impl JjCommand {
    /// Command runner for the given repository (current directory when
    /// `None`).
    pub fn new(repo: Option<PathBuf>) -> Self {
        Self {
            program: "jj".to_string(),
            repo,
        }
    }

    /// Override the binary name. Test hook.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Repository this runner points at.
    pub fn repo(&self) -> Option<&PathBuf> {
        self.repo.as_ref()
    }

    fn base(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(repo) = &self.repo {
            cmd.arg("--repository").arg(repo);
        }
        cmd
    }

    /// Arguments of the graph-log invocation.
    pub fn log_args(revset: Option<&str>) -> Vec<String> {
        let mut args = vec!["log".to_string(), "--color".to_string(), "always".to_string()];
        if let Some(revset) = revset {
            args.push("-r".to_string());
            args.push(revset.to_string());
        }
        args
    }

    /// Arguments of the metadata invocation.
    pub fn meta_args(revset: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "log".to_string(),
            "--no-graph".to_string(),
            "--color".to_string(),
            "never".to_string(),
            "-T".to_string(),
            META_TEMPLATE.to_string(),
        ];
        if let Some(revset) = revset {
            args.push("-r".to_string());
            args.push(revset.to_string());
        }
        args
    }

    /// Spawn the graph-log subprocess with piped stdout/stderr.
    pub fn spawn_log(&self, revset: Option<&str>) -> Result<Child, CommandError> {
        self.base()
            .args(Self::log_args(revset))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    /// Run the metadata query to completion. Blocking; called from the
    /// refresh worker.
    pub fn revision_meta(&self, revset: Option<&str>) -> Result<Vec<RevisionMeta>, CommandError> {
        let output = self
            .base()
            .args(Self::meta_args(revset))
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(CommandError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(crate::parser::parse_revision_meta(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }

    /// Run an arbitrary mutation verb (rebase, squash, ...) to completion
    /// and return its combined output for affected-revision marking.
    pub fn run_verb(&self, args: &[&str]) -> Result<String, CommandError> {
        let output = self
            .base()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(CommandError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }
}

// ===== RefreshRegistry =====

/// Generation counters for in-flight async work, keyed by operation.
///
/// Owned by the application shell and passed by reference. Starting a new
/// refresh for a key makes every earlier generation of that key stale;
/// consumers check [`RefreshRegistry::is_current`] before applying
/// results, so a superseded producer's output is ignored rather than
/// interleaved with newer results.
#[derive(Debug, Default)]
pub struct RefreshRegistry {
    generations: HashMap<String, u64>,
}

impl RefreshRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation for `key`, superseding any earlier one.
    pub fn begin(&mut self, key: &str) -> u64 {
        let entry = self.generations.entry(key.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Whether `generation` is still the latest for `key`.
    pub fn is_current(&self, key: &str, generation: u64) -> bool {
        self.generations.get(key) == Some(&generation)
    }
}

// ===== LogRefresh =====

/// Event stream of one refresh.
#[derive(Debug)]
pub enum RefreshEvent {
    /// The metadata listing arrived (parents, full ids, authors).
    Meta(Vec<RevisionMeta>),
    /// A batch of parsed rows. Request more through the handle to keep
    /// them coming.
    Batch(RowBatch),
    /// The refresh finished: `Ok` after a clean exit, `Err` when the
    /// subprocess failed. Errors leave the previous snapshot intact.
    Finished(Result<(), CommandError>),
}

/// Handle to an in-flight refresh. Dropping it cancels the refresh.
pub struct LogRefresh {
    generation: u64,
    events: Receiver<RefreshEvent>,
    control: Sender<Control>,
    child: Arc<Mutex<Option<Child>>>,
}

impl LogRefresh {
    /// Start a refresh on a worker thread.
    ///
    /// Spawn and exit failures are reported through the event stream, not
    /// the return value, so the UI loop has a single error path.
    pub fn start(
        cmd: &JjCommand,
        registry: &mut RefreshRegistry,
        revset: Option<String>,
        batch_size: usize,
    ) -> LogRefresh {
        let generation = registry.begin(REFRESH_LOG);
        let (events_tx, events_rx) = channel::<RefreshEvent>();
        let (control_tx, control_rx) = channel::<Control>();
        let child_slot: Arc<Mutex<Option<Child>>> = Arc::new(Mutex::new(None));

        let worker_cmd = cmd.clone();
        let worker_slot = Arc::clone(&child_slot);
        thread::spawn(move || {
            let revset = revset.as_deref();
            let meta = match worker_cmd.revision_meta(revset) {
                Ok(meta) => meta,
                Err(e) => {
                    let _ = events_tx.send(RefreshEvent::Finished(Err(e)));
                    return;
                }
            };
            let _ = events_tx.send(RefreshEvent::Meta(meta));

            let mut child = match worker_cmd.spawn_log(revset) {
                Ok(child) => child,
                Err(e) => {
                    let _ = events_tx.send(RefreshEvent::Finished(Err(e)));
                    return;
                }
            };
            let Some(stdout) = child.stdout.take() else {
                let _ = events_tx.send(RefreshEvent::Finished(Err(CommandError::Failed {
                    code: -1,
                    stderr: "no stdout pipe".to_string(),
                })));
                return;
            };
            let stderr = child.stderr.take();
            if let Ok(mut slot) = worker_slot.lock() {
                *slot = Some(child);
            }

            let batches = parse_rows_streaming(stdout, control_rx, batch_size);
            for batch in batches {
                if events_tx.send(RefreshEvent::Batch(batch)).is_err() {
                    break;
                }
            }

            let result = wait_child(&worker_slot, stderr);
            let _ = events_tx.send(RefreshEvent::Finished(result));
        });

        LogRefresh {
            generation,
            events: events_rx,
            control: control_tx,
            child: child_slot,
        }
    }

    /// Generation of this refresh, for staleness checks against the
    /// registry.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Ask the producer for the next batch.
    pub fn request_more(&self) {
        let _ = self.control.send(Control::More);
    }

    /// Non-blocking poll of the event stream.
    pub fn try_event(&self) -> Option<RefreshEvent> {
        self.events.try_recv().ok()
    }

    /// Stop the producer and kill the subprocess.
    pub fn cancel(&self) {
        let _ = self.control.send(Control::Stop);
        if let Ok(mut slot) = self.child.lock() {
            if let Some(child) = slot.as_mut() {
                let _ = child.kill();
            }
        }
    }
}

impl Drop for LogRefresh {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Reap the child and map its exit status to the refresh outcome.
fn wait_child(
    slot: &Arc<Mutex<Option<Child>>>,
    stderr: Option<impl Read>,
) -> Result<(), CommandError> {
    let child = match slot.lock() {
        Ok(mut slot) => slot.take(),
        Err(_) => None,
    };
    let Some(mut child) = child else {
        return Ok(());
    };
    // Drain stderr before waiting so a chatty child cannot block on a full
    // pipe.
    let mut captured = String::new();
    if let Some(mut stderr) = stderr {
        let _ = stderr.read_to_string(&mut captured);
    }
    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(CommandError::Failed {
            code: status.code().unwrap_or(-1),
            stderr: captured.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // ===== argument construction =====

    #[test]
    fn log_args_request_color_always() {
        let args = JjCommand::log_args(None);
        assert_eq!(args, vec!["log", "--color", "always"]);
    }

    #[test]
    fn log_args_carry_revset() {
        let args = JjCommand::log_args(Some("::@"));
        assert!(args.contains(&"-r".to_string()));
        assert!(args.contains(&"::@".to_string()));
    }

    #[test]
    fn meta_args_disable_graph_and_color() {
        let args = JjCommand::meta_args(None);
        assert!(args.contains(&"--no-graph".to_string()));
        assert!(args.contains(&"never".to_string()));
        assert!(args.contains(&"-T".to_string()));
    }

    // ===== registry =====

    #[test]
    fn begin_increments_generation_per_key() {
        let mut registry = RefreshRegistry::new();
        assert_eq!(registry.begin(REFRESH_LOG), 1);
        assert_eq!(registry.begin(REFRESH_LOG), 2);
        assert_eq!(registry.begin("other"), 1);
    }

    #[test]
    fn newer_generation_supersedes_older() {
        let mut registry = RefreshRegistry::new();
        let old = registry.begin(REFRESH_LOG);
        assert!(registry.is_current(REFRESH_LOG, old));
        let new = registry.begin(REFRESH_LOG);
        assert!(!registry.is_current(REFRESH_LOG, old));
        assert!(registry.is_current(REFRESH_LOG, new));
    }

    #[test]
    fn unknown_key_is_never_current() {
        let registry = RefreshRegistry::new();
        assert!(!registry.is_current("nope", 1));
    }

    // ===== refresh lifecycle =====

    fn wait_for_finished(refresh: &LogRefresh) -> Option<Result<(), CommandError>> {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while std::time::Instant::now() < deadline {
            match refresh.try_event() {
                Some(RefreshEvent::Finished(result)) => return Some(result),
                Some(_) => continue,
                None => std::thread::sleep(Duration::from_millis(5)),
            }
        }
        None
    }

    #[test]
    fn missing_binary_reports_spawn_failure_via_events() {
        let cmd = JjCommand::new(None).with_program("jjlv-definitely-not-installed");
        let mut registry = RefreshRegistry::new();
        let refresh = LogRefresh::start(&cmd, &mut registry, None, 64);
        refresh.request_more();
        match wait_for_finished(&refresh) {
            Some(Err(CommandError::Spawn { program, .. })) => {
                assert_eq!(program, "jjlv-definitely-not-installed");
            }
            other => panic!("expected spawn failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn harmless_binary_finishes_cleanly() {
        // `true` ignores the jj arguments and exits 0 with no output: the
        // refresh produces no rows and finishes Ok.
        let cmd = JjCommand::new(None).with_program("true");
        let mut registry = RefreshRegistry::new();
        let refresh = LogRefresh::start(&cmd, &mut registry, None, 64);
        refresh.request_more();
        match wait_for_finished(&refresh) {
            Some(Ok(())) => {}
            other => panic!("expected clean finish, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn run_verb_output_feeds_affected_marking() {
        use crate::model::{Revision, Row};
        use crate::parser::mark_affected;

        let cmd = JjCommand::new(None).with_program("echo");
        let output = cmd.run_verb(&["Rebased 1 commits onto xvq"]).unwrap();

        let mut rows = vec![
            Row::new(Revision::new("xvq", "1a2b", 0)),
            Row::new(Revision::new("wqp", "5e6f", 1)),
        ];
        mark_affected(&mut rows, &output);
        assert!(rows[0].is_affected);
        assert!(!rows[1].is_affected);
    }

    #[cfg(unix)]
    #[test]
    fn failing_binary_surfaces_exit_status() {
        let cmd = JjCommand::new(None).with_program("false");
        let mut registry = RefreshRegistry::new();
        let refresh = LogRefresh::start(&cmd, &mut registry, None, 64);
        refresh.request_more();
        match wait_for_finished(&refresh) {
            Some(Err(CommandError::Failed { code, .. })) => assert_ne!(code, 0),
            other => panic!("expected exit failure, got {other:?}"),
        }
    }
}
