//! Rebuilds on file changes.
//!
//! Every registration pairs a glob with what to do when a matching file
//! changes: either rerun a chain of tasks or just reload the browser. Events
//! are debounced, and each registration fires at most once per batch.
//!
//! Chains run their tasks strictly one after another, so `clean:css` is
//! always done before `sass` starts writing.

use std::collections::HashSet;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use console::style;
use glob::Pattern;
use notify::event::{Event, EventKind, ModifyKind};
use notify::RecursiveMode;
use notify_debouncer_full::new_debouncer;

use crate::engine::TaskGraph;
use crate::error::WatchError;
use crate::paths::{MATCH, PathRegistry};
use crate::{Context, Reload, tasks};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Tasks(&'static [&'static str]),
    Reload,
}

#[derive(Debug)]
struct Registration {
    pattern: Pattern,
    trigger: Trigger,
}

/// Globs under watch and what they trigger.
pub(crate) fn registrations(paths: &PathRegistry) -> Vec<(String, Trigger)> {
    let mut list = vec![
        (paths.watch_styles(), Trigger::Tasks(tasks::STYLE_CHAIN)),
        (paths.watch_scripts(), Trigger::Tasks(tasks::SCRIPT_CHAIN)),
    ];
    list.extend(paths.watch_reload().into_iter().map(|glob| (glob, Trigger::Reload)));
    list
}

pub fn watch(ctx: &Context, graph: &TaskGraph<Context>) -> Result<(), WatchError> {
    let root = ctx.root().canonicalize_utf8()?;
    let (watched, list) = register(&root, &ctx.paths)?;

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(250), None, tx)?;

    // Collapse watched paths to reduce the number of watches
    for path in collapse_watch_paths(watched) {
        tracing::info!("watching {}", path);
        debouncer.watch(&path, RecursiveMode::Recursive)?;
    }

    loop {
        match rx.recv()? {
            Ok(events) => {
                for trigger in fired(events.iter().map(|de| &de.event), &list, &root) {
                    match trigger {
                        // failures are logged by the runner
                        Trigger::Tasks(names) => {
                            graph.run_sequence(ctx, names)?;
                        }
                        Trigger::Reload => ctx.reload(Reload::Page),
                    }
                }
            }
            Err(errors) => {
                for e in errors {
                    tracing::error!("watch error: {e}");
                }
            }
        }
    }
}

/// Compiles the registrations against `root`, returning them along with the
/// directories to watch.
fn register(
    root: &Utf8Path,
    paths: &PathRegistry,
) -> Result<(HashSet<Utf8PathBuf>, Vec<Registration>), WatchError> {
    let mut watched = HashSet::new();
    let mut list = Vec::new();
    for (glob, trigger) in registrations(paths) {
        let (path, pattern) =
            resolve_watch_path(root, &glob).map_err(|e| WatchError::Resolve(glob.clone(), e))?;
        watched.insert(path);
        list.push(Registration { pattern, trigger });
    }
    Ok((watched, list))
}

/// Triggers fired by a debounced batch of events, each at most once and in
/// order of first match. Every matching path is logged once.
fn fired<'a>(
    events: impl IntoIterator<Item = &'a Event>,
    list: &[Registration],
    root: &Utf8Path,
) -> Vec<Trigger> {
    let mut fired = Vec::new();
    let mut seen = HashSet::new();

    for event in events {
        let Some(change) = describe(&event.kind) else {
            continue;
        };

        for path in &event.paths {
            let hits: Vec<_> = list
                .iter()
                .filter(|reg| reg.pattern.matches_path_with(path, MATCH))
                .map(|reg| reg.trigger)
                .collect();

            if hits.is_empty() || !seen.insert(path.clone()) {
                continue;
            }

            let rel = path.strip_prefix(root).unwrap_or(path);
            tracing::info!(
                "[{}] {} was {}, running tasks...",
                style("WATCH").green(),
                style(rel.display()).magenta(),
                change
            );

            for trigger in hits {
                if !fired.contains(&trigger) {
                    fired.push(trigger);
                }
            }
        }
    }

    fired
}

/// How a file changed, or `None` for events which don't change content.
fn describe(kind: &EventKind) -> Option<&'static str> {
    match kind {
        EventKind::Create(_) => Some("added"),
        EventKind::Modify(ModifyKind::Name(_)) => Some("renamed"),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some("changed"),
        EventKind::Remove(_) => Some("deleted"),
        _ => None,
    }
}

/// Splits a glob relative to `root` into a static directory (for watching)
/// and a compiled absolute Pattern (for matching).
fn resolve_watch_path(root: &Utf8Path, glob: &str) -> anyhow::Result<(Utf8PathBuf, Pattern)> {
    let path = Utf8Path::new(glob);

    // Split path into static root and dynamic suffix (containing wildcards)
    let components: Vec<_> = path.components().collect();
    let split_idx = components
        .iter()
        .position(|c| c.as_str().contains(['*', '?', '[']))
        .unwrap_or(components.len());

    let static_part: Utf8PathBuf = components.iter().take(split_idx).collect();
    let suffix_part: Utf8PathBuf = components.iter().skip(split_idx).collect();

    let base = match static_part.as_str() {
        "" => root.to_path_buf(),
        _ => root.join(&static_part),
    };

    // The static part may not exist yet, watch its closest existing ancestor
    let mut watch_root = base.clone();
    while !watch_root.is_dir() {
        match watch_root.parent() {
            Some(parent) if parent.starts_with(root) => watch_root = parent.to_path_buf(),
            _ => anyhow::bail!("{glob} is outside of {root}"),
        }
    }

    let mut pattern = Pattern::escape(base.as_str());
    if !suffix_part.as_str().is_empty() {
        pattern.push('/');
        pattern.push_str(suffix_part.as_str());
    }

    Ok((watch_root, Pattern::new(&pattern)?))
}

/// Reduces a set of paths to the minimal set of watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a` because
/// the watcher is recursive. This function sorts the paths and filters
/// out any path that is a subdirectory of a previously accepted path.
fn collapse_watch_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();

    let mut filtered = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}
