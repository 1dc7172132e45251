//! Named parameters and the registry that parses and publishes them.
//!
//! A [`Parameter`] is a name with an optional setter (inbound) and an
//! optional getter (outbound). The [`ParameterManager`] dispatches inbound
//! `name=payload` lines to setters and turns getter values into outbound
//! lines, suppressing values that did not change since they were last sent
//! unless configured to publish every cycle.

use core::fmt;

use tracing::{debug, warn};

use crate::error::{ParameterError, RegistryError};
use crate::vital::VitalState;

/// Inbound accessor: applies a payload received at `now_ms`.
pub type Setter = Box<dyn FnMut(&mut VitalState, &str, u64) -> Result<(), ParameterError> + Send>;

/// Outbound accessor: renders the current value.
pub type Getter = Box<dyn Fn(&VitalState) -> String + Send>;

// ============================================================================
// Line grammar
// ============================================================================

/// Split a `name=payload` line. The payload may be empty or contain `=`.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (name, payload) = line.split_once('=')?;
    let name = name.trim();
    (!name.is_empty()).then_some((name, payload))
}

/// `name=payload`.
pub fn format_value(name: &str, payload: &str) -> String {
    format!("{name}={payload}")
}

/// `register(name)`.
pub fn format_registration(name: &str) -> String {
    format!("register({name})")
}

// ============================================================================
// Parameter
// ============================================================================

/// A named value exchanged with the environment.
pub struct Parameter {
    name: String,
    setter: Option<Setter>,
    getter: Option<Getter>,
    last_sent: Option<String>,
}

impl Parameter {
    /// A parameter without accessors yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setter: None,
            getter: None,
            last_sent: None,
        }
    }

    /// Attach the inbound accessor.
    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: FnMut(&mut VitalState, &str, u64) -> Result<(), ParameterError> + Send + 'static,
    {
        self.setter = Some(Box::new(setter));
        self
    }

    /// Attach the outbound accessor.
    pub fn with_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&VitalState) -> String + Send + 'static,
    {
        self.getter = Some(Box::new(getter));
        self
    }

    /// Unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Has a setter.
    pub fn is_inbound(&self) -> bool {
        self.setter.is_some()
    }

    /// Has a getter.
    pub fn is_outbound(&self) -> bool {
        self.getter.is_some()
    }

    /// Last payload published.
    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("inbound", &self.is_inbound())
            .field("outbound", &self.is_outbound())
            .field("last_sent", &self.last_sent)
            .finish()
    }
}

// ============================================================================
// Registry
// ============================================================================

/// What happened to one inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The setter accepted the payload.
    Applied,
    /// The line is not `name=payload`.
    Malformed,
    /// No parameter with a setter has this name.
    Unknown,
    /// The setter rejected the payload; state is unchanged.
    Rejected(ParameterError),
}

/// Registry of every parameter on the bus.
#[derive(Debug, Default)]
pub struct ParameterManager {
    parameters: Vec<Parameter>,
    publish_unchanged: bool,
}

impl ParameterManager {
    /// An empty registry. With `publish_unchanged` every getter is sent
    /// every cycle.
    pub fn new(publish_unchanged: bool) -> Self {
        Self {
            parameters: Vec::new(),
            publish_unchanged,
        }
    }

    /// Add a parameter.
    pub fn register(&mut self, parameter: Parameter) -> Result<(), RegistryError> {
        if !parameter.is_inbound() && !parameter.is_outbound() {
            return Err(RegistryError::NoAccessor(parameter.name));
        }
        if self.get(parameter.name()).is_some() {
            return Err(RegistryError::Duplicate(parameter.name));
        }
        self.parameters.push(parameter);
        Ok(())
    }

    /// Look a parameter up by name.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Names of parameters with a setter, in registration order.
    pub fn inbound_names(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|p| p.is_inbound())
            .map(Parameter::name)
    }

    /// Dispatch one inbound line to its setter.
    pub fn apply_line(&mut self, state: &mut VitalState, line: &str, now_ms: u64) -> LineOutcome {
        let Some((name, payload)) = parse_line(line) else {
            debug!(line, "malformed bus line ignored");
            return LineOutcome::Malformed;
        };
        let Some(setter) = self
            .parameters
            .iter_mut()
            .find(|p| p.name == name)
            .and_then(|p| p.setter.as_mut())
        else {
            debug!(name, "unknown parameter ignored");
            return LineOutcome::Unknown;
        };
        match setter(state, payload, now_ms) {
            Ok(()) => LineOutcome::Applied,
            Err(error) => {
                warn!(name, payload, %error, "parameter update discarded");
                LineOutcome::Rejected(error)
            }
        }
    }

    /// Outbound lines for this cycle.
    ///
    /// Values equal to the last one sent are skipped unless the registry
    /// publishes unchanged values.
    pub fn collect_outbound(&mut self, state: &VitalState) -> Vec<String> {
        let publish_unchanged = self.publish_unchanged;
        self.parameters
            .iter_mut()
            .filter_map(|parameter| {
                let value = (parameter.getter.as_ref()?)(state);
                if !publish_unchanged && parameter.last_sent.as_deref() == Some(value.as_str()) {
                    return None;
                }
                let line = format_value(&parameter.name, &value);
                parameter.last_sent = Some(value);
                Some(line)
            })
            .collect()
    }

    /// Forget every last-sent value so the next cycle republishes all.
    pub fn reset_last_sent(&mut self) {
        for parameter in &mut self.parameters {
            parameter.last_sent = None;
        }
    }
}
