//! JSON Patch (RFC 6902) documents.
//!
//! Patches are only serialized; they are never applied locally.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{SccError, SccResult};

/// JSON Patch operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Add a value.
    Add,
    /// Copy the value at `from`.
    Copy,
    /// Move the value at `from`.
    Move,
    /// Remove the value.
    Remove,
    /// Replace the value.
    Replace,
    /// Assert the value.
    Test,
}

/// One JSON Patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPatchOperation {
    /// Operation kind.
    pub op: PatchOp,

    /// JSON Pointer to the target location.
    pub path: String,

    /// JSON Pointer to the source location (`copy` and `move`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    /// Operand (`add`, `replace` and `test`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl JsonPatchOperation {
    /// Creates an `add` operation.
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_value(PatchOp::Add, path, value)
    }

    /// Creates a `replace` operation.
    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_value(PatchOp::Replace, path, value)
    }

    /// Creates a `test` operation.
    pub fn test(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_value(PatchOp::Test, path, value)
    }

    /// Creates a `remove` operation.
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            from: None,
            value: None,
        }
    }

    /// Creates a `move` operation.
    pub fn move_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_from(PatchOp::Move, from, path)
    }

    /// Creates a `copy` operation.
    pub fn copy_from(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self::with_from(PatchOp::Copy, from, path)
    }

    fn with_value(op: PatchOp, path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op,
            path: path.into(),
            from: None,
            value: Some(value.into()),
        }
    }

    fn with_from(op: PatchOp, from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            op,
            path: path.into(),
            from: Some(from.into()),
            value: None,
        }
    }

    /// Checks that the operation carries the members its kind requires.
    pub fn validate(&self) -> SccResult<()> {
        if !is_pointer(&self.path) {
            return Err(SccError::validation_field(
                "path",
                format!("patch path must be a JSON Pointer, got '{}'", self.path),
            ));
        }

        match self.op {
            PatchOp::Move | PatchOp::Copy => match &self.from {
                Some(from) if is_pointer(from) => {}
                _ => {
                    return Err(SccError::validation_field(
                        "from",
                        format!("{:?} operation requires a 'from' JSON Pointer", self.op),
                    ))
                }
            },
            PatchOp::Add | PatchOp::Replace | PatchOp::Test => {
                if self.value.is_none() {
                    return Err(SccError::validation_field(
                        "value",
                        format!("{:?} operation requires a value", self.op),
                    ));
                }
            }
            PatchOp::Remove => {}
        }
        Ok(())
    }
}

// The empty pointer addresses the whole document.
fn is_pointer(pointer: &str) -> bool {
    pointer.is_empty() || pointer.starts_with('/')
}
