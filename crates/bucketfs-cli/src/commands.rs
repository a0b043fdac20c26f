//! Subcommand execution.

use std::fmt::Write as _;
use std::io::Write as _;

use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};

use bucketfs_kernel::vfs::path;
use bucketfs_kernel::{FileAttr, MemFs, RenameOptions, VfsOps, WriteOptions};

use crate::Command;

pub async fn execute(fs: &MemFs, command: Command) -> Result<()> {
    match command {
        Command::Ls { path } => {
            print!("{}", list(fs, &resolve(fs, &path)).await?);
        }
        Command::Cat { path } => {
            let content = fs.read_file(&resolve(fs, &path)).await?;
            std::io::stdout()
                .write_all(&content)
                .context("failed to write to stdout")?;
        }
        Command::Stat { path } => {
            let attr = fs.stat(&resolve(fs, &path)).await?;
            print!("{}", describe(&attr));
        }
        Command::Put {
            path,
            local,
            no_overwrite,
        } => {
            let content = std::fs::read(&local)
                .with_context(|| format!("failed to read {}", local.display()))?;
            let options = if no_overwrite {
                WriteOptions::create_new()
            } else {
                WriteOptions::upsert()
            };
            fs.write_file(&resolve(fs, &path), Bytes::from(content), options)
                .await?;
        }
        Command::Rm { path } => fs.delete(&resolve(fs, &path)).await?,
        Command::Mv {
            from,
            to,
            overwrite,
        } => {
            let options = RenameOptions { overwrite };
            fs.rename(&resolve(fs, &from), &resolve(fs, &to), options)
                .await?;
        }
        Command::Mkdir { path } => fs.create_directory(&resolve(fs, &path)).await?,
        Command::Tree { path } => {
            print!("{}", tree(fs, &resolve(fs, &path)).await?);
        }
    }
    Ok(())
}

/// User paths are relative to the mount point once mounted.
fn resolve(fs: &MemFs, user_path: &str) -> String {
    match fs.remote_config() {
        Some(remote) => path::join(&remote.path_prefix, user_path),
        None => path::normalize(user_path),
    }
}

async fn list(fs: &MemFs, dir: &str) -> Result<String> {
    let mut out = String::new();
    for entry in fs.read_directory(dir).await? {
        let suffix = if entry.kind.is_dir() { "/" } else { "" };
        writeln!(out, "{}{suffix}", entry.name)?;
    }
    Ok(out)
}

fn describe(attr: &FileAttr) -> String {
    let kind = if attr.is_dir() { "directory" } else { "file" };
    let modified: DateTime<Utc> = attr.mtime.into();
    let created: DateTime<Utc> = attr.ctime.into();
    format!(
        "type: {kind}\nsize: {}\nmodified: {}\ncreated: {}\n",
        attr.size,
        modified.to_rfc3339(),
        created.to_rfc3339()
    )
}

enum Walk {
    Expand(String, usize),
    Line { name: String, dir: Option<String>, depth: usize },
}

/// Pre-order listing, children in name order, without recursion.
async fn tree(fs: &MemFs, root: &str) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "{root}")?;

    let mut stack = vec![Walk::Expand(root.to_string(), 1)];
    while let Some(item) = stack.pop() {
        match item {
            Walk::Expand(dir, depth) => {
                let entries = fs.read_directory(&dir).await?;
                for entry in entries.into_iter().rev() {
                    let child = path::join(&dir, &entry.name);
                    stack.push(Walk::Line {
                        dir: entry.kind.is_dir().then_some(child),
                        name: entry.name,
                        depth,
                    });
                }
            }
            Walk::Line { name, dir, depth } => {
                let suffix = if dir.is_some() { "/" } else { "" };
                writeln!(out, "{}{name}{suffix}", "  ".repeat(depth))?;
                if let Some(dir) = dir {
                    stack.push(Walk::Expand(dir, depth + 1));
                }
            }
        }
    }
    Ok(out)
}
