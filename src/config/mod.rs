//! Per-module parameter store.
//!
//! Every module instance owns one `Configuration`. Modules declare their
//! parameters while they are being constructed (`add`), the driver assigns
//! values (`set`), and the module reads them back in `configure` (`get`).
//!
//! Parameter names are case-insensitive: `"NFrames"` and `"nframes"` refer
//! to the same entry. The spelling used at declaration is kept for display.
//!
//! # Example
//!
//! ```
//! use tray_rs::config::{Configuration, Value};
//!
//! let mut config = Configuration::new("dump", "Dump");
//! config.add("Prefix", "text prepended to every line", Some(Value::from(">")))?;
//! config.set("prefix", Value::from("#"))?;
//!
//! let prefix: String = config.get("PREFIX")?;
//! assert_eq!(prefix, "#");
//! # Ok::<(), tray_rs::TrayError>(())
//! ```

pub mod value;

pub use value::{FromValue, Value};

use crate::error::{TrayError, TrayResult};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name as spelled at declaration
    pub name: String,

    pub description: String,

    /// Value used when the driver never sets one
    #[serde(default)]
    pub default: Option<Value>,

    /// Value assigned by the driver
    #[serde(default)]
    pub value: Option<Value>,
}

impl Parameter {
    /// The effective value: explicit assignment wins over the default.
    pub fn current(&self) -> Option<&Value> {
        self.value.as_ref().or(self.default.as_ref())
    }
}

/// Typed parameter table for one module instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    instance_name: String,
    class_name: String,
    #[serde(default)]
    parameters: Vec<Parameter>,
}

impl Configuration {
    pub fn new(instance_name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            class_name: class_name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    fn find(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    fn error(&self, message: String) -> TrayError {
        TrayError::Config {
            module: self.instance_name.clone(),
            message,
        }
    }

    /// Whether a parameter with this name was declared.
    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Declare a parameter. Declaring the same name twice is an error.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        default: Option<Value>,
    ) -> TrayResult<()> {
        let name = name.into();
        if self.has(&name) {
            return Err(self.error(format!("parameter \"{}\" declared twice", name)));
        }
        tracing::trace!("{}: adding parameter {}", self.instance_name, name);
        self.parameters.push(Parameter {
            name,
            description: description.into(),
            default,
            value: None,
        });
        Ok(())
    }

    /// Assign a value to a declared parameter.
    pub fn set(&mut self, name: &str, value: Value) -> TrayResult<()> {
        match self.find_mut(name) {
            Some(param) => {
                param.value = Some(value);
                Ok(())
            }
            None => Err(self.error(format!(
                "no parameter named \"{}\" (known: {})",
                name,
                self.keys().join(", ")
            ))),
        }
    }

    /// Raw effective value of a parameter.
    pub fn get_value(&self, name: &str) -> TrayResult<&Value> {
        let param = self
            .find(name)
            .ok_or_else(|| self.error(format!("no parameter named \"{}\"", name)))?;
        param
            .current()
            .ok_or_else(|| self.error(format!("parameter \"{}\" has no value", param.name)))
    }

    /// Typed effective value of a parameter.
    pub fn get<T: FromValue>(&self, name: &str) -> TrayResult<T> {
        let value = self.get_value(name)?;
        T::from_value(value).ok_or_else(|| {
            self.error(format!(
                "parameter \"{}\" holds a {}, expected {}",
                name,
                value.type_name(),
                T::TYPE_NAME
            ))
        })
    }

    /// Declared parameter names, in declaration order.
    pub fn keys(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Multi-line listing of the parameters and their current values.
    pub fn inspect(&self) -> String {
        let mut out = format!("{} ({})\n", self.instance_name, self.class_name);
        for param in &self.parameters {
            let current = param
                .current()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "<unset>".to_string());
            let _ = writeln!(
                out,
                "  {:<20} = {:<20} {}",
                param.name, current, param.description
            );
        }
        out
    }

    /// JSON dump of the whole table.
    pub fn to_json(&self) -> TrayResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| self.error(e.to_string()))
    }
}
