//! `declare files ["base/dir"]`: reading and writing text files.
//!
//! Relative paths resolve against the declared base directory, or the
//! process's working directory when none is given.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use async_trait::async_trait;
use marrow_core::ast::DeclArg;

use super::Capability;
use crate::environment::{Env, Mutability};
use crate::error::RuntimeError;
use crate::value::{expect_arity, NativeFunction, Value};

const NAME: &str = "files";

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesCapability;

fn resolve(base: &Option<PathBuf>, function: &str, arg: &Value) -> Result<PathBuf, RuntimeError> {
    let path = arg.as_text().ok_or_else(|| {
        RuntimeError::invalid_argument(function, format!("expected a Text path, got {}", arg.type_name()))
    })?;
    let path = Path::new(path);
    Ok(match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    })
}

fn io_error(path: &Path, err: std::io::Error) -> RuntimeError {
    RuntimeError::capability(NAME, format!("{}: {}", path.display(), err))
}

#[async_trait(?Send)]
impl Capability for FilesCapability {
    fn name(&self) -> &str {
        NAME
    }

    fn builtins(&self) -> &[&'static str] {
        &["read_file", "write_file", "file_exists"]
    }

    fn register_builtins(&self, root: &Env, argument: Option<&DeclArg>) -> Result<(), RuntimeError> {
        let base = Rc::new(argument.map(|arg| PathBuf::from(arg.as_str())));
        if let Some(dir) = &*base {
            tracing::debug!(base = %dir.display(), "file paths are relative to base directory");
        }

        let dir = Rc::clone(&base);
        root.define_or_replace(
            "read_file",
            NativeFunction::asynchronous("read_file", move |args| {
                let dir = Rc::clone(&dir);
                Box::pin(async move {
                    expect_arity("read_file", &args, 1)?;
                    let path = resolve(&dir, "read_file", &args[0])?;
                    tokio::fs::read_to_string(&path)
                        .await
                        .map(Value::Text)
                        .map_err(|e| io_error(&path, e))
                })
            }),
            Mutability::Immutable,
        );

        let dir = Rc::clone(&base);
        root.define_or_replace(
            "write_file",
            NativeFunction::asynchronous("write_file", move |args| {
                let dir = Rc::clone(&dir);
                Box::pin(async move {
                    expect_arity("write_file", &args, 2)?;
                    let path = resolve(&dir, "write_file", &args[0])?;
                    tokio::fs::write(&path, args[1].to_string())
                        .await
                        .map_err(|e| io_error(&path, e))?;
                    Ok(Value::Null)
                })
            }),
            Mutability::Immutable,
        );

        let dir = base;
        root.define_or_replace(
            "file_exists",
            NativeFunction::asynchronous("file_exists", move |args| {
                let dir = Rc::clone(&dir);
                Box::pin(async move {
                    expect_arity("file_exists", &args, 1)?;
                    let path = resolve(&dir, "file_exists", &args[0])?;
                    tokio::fs::try_exists(&path)
                        .await
                        .map(Value::Boolean)
                        .map_err(|e| io_error(&path, e))
                })
            }),
            Mutability::Immutable,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_the_base() {
        let base = Some(PathBuf::from("/srv/data"));
        assert_eq!(
            resolve(&base, "read_file", &Value::text("notes.txt")).unwrap(),
            PathBuf::from("/srv/data/notes.txt")
        );
        assert_eq!(
            resolve(&None, "read_file", &Value::text("notes.txt")).unwrap(),
            PathBuf::from("notes.txt")
        );
        assert!(resolve(&base, "read_file", &Value::number(1)).is_err());
    }
}
