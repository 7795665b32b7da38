use crate::engine::args::{ArgBundle, ArgError};
use crate::engine::context::RunContext;
use crate::engine::error::EngineError;
use crate::engine::registry::EntryTable;
use serde_yaml::Value;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::{debug, info};

/// Directory and file scaffolding for a campaign run.
pub fn entry_table() -> EntryTable {
    EntryTable::new()
        .register("create", create)
        .register("install", install)
}

fn make_dir(path: &Path, exist_ok: bool) -> Result<(), EngineError> {
    if exist_ok {
        fs::create_dir_all(path)?;
    } else {
        // Parents may pre-exist; only the leaf must be fresh, so an
        // AlreadyExists from it surfaces to the caller.
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(path)?;
    }
    Ok(())
}

fn touch(path: &Path) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

/// `tree.create`: builds the directory scaffold under `root`. `dirs` lists
/// relative directory paths, `files` lists relative files to touch. With
/// `exist_ok: false` an existing directory fails the run with the
/// underlying I/O error.
fn create(_ctx: &mut RunContext, args: &ArgBundle) -> Result<(), EngineError> {
    let root = args.path("root")?;
    let exist_ok = args.bool_or("exist_ok", false)?;

    make_dir(&root, exist_ok)?;
    if let Some(dirs) = args.get("dirs") {
        for dir in expect_strings("dirs", dirs)? {
            make_dir(&root.join(dir), exist_ok)?;
        }
    }
    if let Some(files) = args.get("files") {
        for file in expect_strings("files", files)? {
            touch(&root.join(file))?;
        }
    }

    info!(root = %root.display(), "Campaign tree created");
    Ok(())
}

/// `tree.install`: copies local files into the campaign tree. `files` is a
/// list of `{from, to}` mappings; destination parents are created.
fn install(_ctx: &mut RunContext, args: &ArgBundle) -> Result<(), EngineError> {
    for item in args.seq("files")? {
        let pair = ArgBundle::new(item.clone())?;
        let from = pair.path("from")?;
        let to = pair.path("to")?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&from, &to)?;
        debug!(from = %from.display(), to = %to.display(), "File installed");
    }
    Ok(())
}

fn expect_strings<'a>(key: &str, value: &'a Value) -> Result<Vec<&'a str>, EngineError> {
    let seq = value.as_sequence().ok_or(ArgError::WrongType {
        key: key.to_string(),
        expected: "sequence",
    })?;
    seq.iter()
        .map(|item| {
            item.as_str().ok_or_else(|| {
                ArgError::WrongType {
                    key: key.to_string(),
                    expected: "sequence of strings",
                }
                .into()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::progress::ProgressReporter;

    fn run(entry: &str, yaml: &str) -> Result<(), EngineError> {
        let reporter = ProgressReporter::new();
        let mut ctx = RunContext::new(&reporter);
        let args = ArgBundle::new(serde_yaml::from_str(yaml).unwrap()).unwrap();
        let table = entry_table();
        table.get(entry).unwrap()(&mut ctx, &args)
    }

    #[test]
    fn create_builds_nested_scaffold() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("campaign");
        run(
            "create",
            &format!(
                "root: {}\ndirs: [trajectory, checkpoints, analysis/tables]\nfiles: [notes.txt]\n",
                root.display()
            ),
        )
        .unwrap();

        assert!(root.join("trajectory").is_dir());
        assert!(root.join("analysis/tables").is_dir());
        assert!(root.join("notes.txt").is_file());
    }

    #[test]
    fn rerun_without_exist_ok_surfaces_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("campaign");
        let yaml = format!("root: {}\ndirs: [trajectory]\n", root.display());

        run("create", &yaml).unwrap();
        let err = run("create", &yaml).unwrap_err();
        match err {
            EngineError::Io(io) => {
                assert_eq!(io.kind(), std::io::ErrorKind::AlreadyExists)
            }
            other => panic!("expected I/O error, got {:?}", other),
        }
    }

    #[test]
    fn rerun_with_exist_ok_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("campaign");
        let yaml = format!(
            "root: {}\ndirs: [trajectory]\nexist_ok: true\n",
            root.display()
        );

        run("create", &yaml).unwrap();
        run("create", &yaml).unwrap();
        assert!(root.join("trajectory").is_dir());
    }

    #[test]
    fn install_copies_into_fresh_destination_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("engine.conf");
        fs::write(&source, b"tuning = 7\n").unwrap();
        let dest = dir.path().join("campaign/config/engine.conf");

        run(
            "install",
            &format!(
                "files:\n  - {{from: {}, to: {}}}\n",
                source.display(),
                dest.display()
            ),
        )
        .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"tuning = 7\n");
    }

    #[test]
    fn install_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            "install",
            &format!(
                "files:\n  - {{from: {0}/absent, to: {0}/copy}}\n",
                dir.path().display()
            ),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
