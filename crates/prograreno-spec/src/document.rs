//! Isolation document: typed fields merged over the runtime template

use prograreno_core::{ContainError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mount::Mount;
use crate::rlimit::Rlimit;

/// `root` section: the container's filesystem root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub path: String,
    #[serde(default)]
    pub readonly: bool,
}

/// `process.user` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub uid: u32,
    pub gid: u32,
}

/// The `process` fields prograreno sets
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Process {
    pub terminal: bool,
    pub cwd: String,
    pub args: Vec<String>,
    pub user: User,
    pub no_new_privileges: bool,
    pub rlimits: Vec<Rlimit>,
}

/// A runtime configuration document.
///
/// Wraps the template returned by the runtime. `root` is merged over the
/// template's section. `process` is replaced as a whole, keeping only the
/// template's `env`, so the program gets no capabilities. Top-level keys
/// (namespaces, hostname, ...) keep the template's values.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecDocument {
    document: Map<String, Value>,
}

impl SpecDocument {
    /// Wrap a template, which must be a JSON object
    pub fn from_template(template: Value) -> Result<Self> {
        match template {
            Value::Object(document) => Ok(Self { document }),
            other => Err(ContainError::Runtime(format!(
                "Specification template is not an object: {}",
                other
            ))),
        }
    }

    /// Parse a serialized document
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_template(serde_json::from_str(json)?)
    }

    pub fn set_root(&mut self, root: &Root) -> Result<()> {
        self.merge_section("root", serde_json::to_value(root)?)
    }

    /// Replace the `process` section, carrying over the template's `env`
    pub fn set_process(&mut self, process: &Process) -> Result<()> {
        let mut section = into_object("process", serde_json::to_value(process)?)?;
        let env = self
            .document
            .get("process")
            .and_then(|existing| existing.get("env"))
            .cloned();
        if let Some(env) = env {
            section.insert("env".to_string(), env);
        }
        self.document
            .insert("process".to_string(), Value::Object(section));
        Ok(())
    }

    /// Append to the `mounts` array, creating it if the template has none
    pub fn push_mount(&mut self, mount: &Mount) -> Result<()> {
        mount.validate()?;
        let entry = serde_json::to_value(mount)?;
        match self
            .document
            .entry("mounts")
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(mounts) => {
                mounts.push(entry);
                Ok(())
            }
            _ => Err(ContainError::Runtime(
                "Specification template has a non-array `mounts`".to_string(),
            )),
        }
    }

    pub fn root(&self) -> Result<Root> {
        self.section("root")
    }

    pub fn process(&self) -> Result<Process> {
        self.section("process")
    }

    pub fn mounts(&self) -> Result<Vec<Mount>> {
        match self.document.get("mounts") {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(Vec::new()),
        }
    }

    /// Raw access for fields outside the typed subset
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.document.clone())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.document)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document)?)
    }

    fn section<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.document.get(key).cloned().ok_or_else(|| {
            ContainError::Runtime(format!("Specification has no `{}` section", key))
        })?;
        Ok(serde_json::from_value(value)?)
    }

    fn merge_section(&mut self, key: &str, patch: Value) -> Result<()> {
        let patch = into_object(key, patch)?;
        match self.document.get_mut(key) {
            Some(Value::Object(existing)) => {
                existing.extend(patch);
            }
            _ => {
                self.document.insert(key.to_string(), Value::Object(patch));
            }
        }
        Ok(())
    }
}

fn into_object(key: &str, value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(ContainError::Runtime(format!(
            "`{}` must serialize to an object",
            key
        ))),
    }
}
