use std::collections::HashMap;

use thiserror::Error;

use crate::world::{ObjectId, Vec3};

use super::types::{EngineValue, ScriptState, ScriptType, Variable};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("script '{0}' not found")]
    UnknownScript(String),
    #[error("script '{script}' has no block '{label}'")]
    UnknownBlock { script: String, label: String },
    #[error("function '{0}' is not registered")]
    UnknownFunction(String),
    #[error("function '{0}' is already registered")]
    DuplicateFunction(String),
    #[error("function id {id} is already used by '{existing}'")]
    DuplicateFunctionId { id: u32, existing: String },
    #[error("function '{function}' has invalid defaults: {reason}")]
    InvalidDefaults { function: String, reason: String },
    #[error("function '{function}' takes at most {max} parameters, got {found}")]
    TooManyParameters {
        function: String,
        max: usize,
        found: usize,
    },
    #[error("function '{function}' needs at least {min} parameters, got {found}")]
    MissingParameters {
        function: String,
        min: usize,
        found: usize,
    },
    #[error("function '{function}' parameter {index} expects {expected}, got {found}")]
    ParameterType {
        function: String,
        index: usize,
        expected: ScriptType,
        found: ScriptType,
    },
    #[error("script runner is already executing")]
    RunnerBusy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub return_type: ScriptType,
    pub params: Vec<ScriptType>,
}

impl FunctionSignature {
    pub fn new(return_type: ScriptType, params: &[ScriptType]) -> Self {
        Self {
            return_type,
            params: params.to_vec(),
        }
    }
}

/// The call frame a registered function reads its parameters from and
/// writes its return value into.
///
/// Parameters are type-checked against the signature before the function
/// runs, so the typed accessors fall back to zero values only when asked
/// for the wrong type.
#[derive(Debug, Clone)]
pub struct FunctionContext {
    name: String,
    caller: Option<ObjectId>,
    triggerer: Option<ObjectId>,
    current_script: Option<String>,
    params: Vec<Variable>,
    return_value: Variable,
}

impl FunctionContext {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn caller(&self) -> Option<ObjectId> {
        self.caller
    }

    pub fn triggerer(&self) -> Option<ObjectId> {
        self.triggerer
    }

    pub fn current_script(&self) -> Option<&str> {
        self.current_script.as_deref()
    }

    pub fn params(&self) -> &[Variable] {
        &self.params
    }

    pub fn int(&self, index: usize) -> i32 {
        self.params.get(index).and_then(Variable::as_int).unwrap_or(0)
    }

    pub fn float(&self, index: usize) -> f32 {
        self.params
            .get(index)
            .and_then(Variable::as_float)
            .unwrap_or(0.0)
    }

    pub fn string(&self, index: usize) -> &str {
        self.params.get(index).and_then(Variable::as_str).unwrap_or("")
    }

    pub fn object(&self, index: usize) -> Option<ObjectId> {
        self.params.get(index).and_then(Variable::as_object).flatten()
    }

    pub fn vector(&self, index: usize) -> Vec3 {
        self.params
            .get(index)
            .and_then(Variable::as_vector)
            .unwrap_or_default()
    }

    pub fn engine(&self, index: usize) -> Option<EngineValue> {
        match self.params.get(index) {
            Some(Variable::EngineType(value)) => *value,
            _ => None,
        }
    }

    pub fn state(&self, index: usize) -> Option<&ScriptState> {
        match self.params.get(index) {
            Some(Variable::ScriptState(state)) => Some(state),
            _ => None,
        }
    }

    pub fn set_return(&mut self, value: Variable) {
        self.return_value = value;
    }

    pub fn return_value(&self) -> &Variable {
        &self.return_value
    }
}

pub type FunctionCallback<E> = Box<dyn Fn(&mut FunctionContext, &mut E) + Send + Sync>;

struct FunctionEntry<E> {
    name: String,
    id: u32,
    signature: FunctionSignature,
    defaults: Vec<Variable>,
    callable: FunctionCallback<E>,
}

/// Script-visible engine functions, looked up by name or numeric id.
///
/// `E` is the environment the callables mutate, normally the module
/// controller.
pub struct FunctionRegistry<E> {
    entries: Vec<FunctionEntry<E>>,
    lookup_by_name: HashMap<String, usize>,
    lookup_by_id: HashMap<u32, usize>,
}

impl<E> Default for FunctionRegistry<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            lookup_by_name: HashMap::new(),
            lookup_by_id: HashMap::new(),
        }
    }
}

impl<E> FunctionRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `defaults` apply to the trailing parameters of `signature`.
    pub fn register_function<F>(
        &mut self,
        name: impl Into<String>,
        id: u32,
        callable: F,
        signature: FunctionSignature,
        defaults: Vec<Variable>,
    ) -> Result<(), ScriptError>
    where
        F: Fn(&mut FunctionContext, &mut E) + Send + Sync + 'static,
    {
        let name = name.into();
        if self.lookup_by_name.contains_key(&name) {
            return Err(ScriptError::DuplicateFunction(name));
        }
        if let Some(&index) = self.lookup_by_id.get(&id) {
            return Err(ScriptError::DuplicateFunctionId {
                id,
                existing: self.entries[index].name.clone(),
            });
        }
        if defaults.len() > signature.params.len() {
            return Err(ScriptError::InvalidDefaults {
                function: name,
                reason: format!(
                    "{} defaults for {} parameters",
                    defaults.len(),
                    signature.params.len()
                ),
            });
        }
        let first_defaulted = signature.params.len() - defaults.len();
        for (offset, default) in defaults.iter().enumerate() {
            let expected = signature.params[first_defaulted + offset];
            if default.script_type() != expected {
                return Err(ScriptError::InvalidDefaults {
                    function: name,
                    reason: format!(
                        "default for parameter {} is {}, expected {expected}",
                        first_defaulted + offset,
                        default.script_type()
                    ),
                });
            }
        }

        let index = self.entries.len();
        self.lookup_by_name.insert(name.clone(), index);
        self.lookup_by_id.insert(id, index);
        self.entries.push(FunctionEntry {
            name,
            id,
            signature,
            defaults,
            callable: Box::new(callable),
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup_by_name.contains_key(name)
    }

    pub fn signature(&self, name: &str) -> Option<&FunctionSignature> {
        self.entry(name).map(|entry| &entry.signature)
    }

    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.lookup_by_id
            .get(&id)
            .map(|&index| self.entries[index].name.as_str())
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.entry(name).map(|entry| entry.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls `name` with `params`, filling missing trailing parameters from
    /// the registered defaults.
    pub fn call(
        &self,
        name: &str,
        frame: CallFrame,
        mut params: Vec<Variable>,
        env: &mut E,
    ) -> Result<Variable, ScriptError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| ScriptError::UnknownFunction(name.to_string()))?;
        let expected = &entry.signature.params;
        if params.len() > expected.len() {
            return Err(ScriptError::TooManyParameters {
                function: entry.name.clone(),
                max: expected.len(),
                found: params.len(),
            });
        }
        let missing = expected.len() - params.len();
        if missing > entry.defaults.len() {
            return Err(ScriptError::MissingParameters {
                function: entry.name.clone(),
                min: expected.len() - entry.defaults.len(),
                found: params.len(),
            });
        }
        params.extend_from_slice(&entry.defaults[entry.defaults.len() - missing..]);

        for (index, (param, expected)) in params.iter().zip(expected).enumerate() {
            if param.script_type() != *expected {
                return Err(ScriptError::ParameterType {
                    function: entry.name.clone(),
                    index,
                    expected: *expected,
                    found: param.script_type(),
                });
            }
        }

        let mut context = FunctionContext {
            name: entry.name.clone(),
            caller: frame.caller,
            triggerer: frame.triggerer,
            current_script: frame.script,
            params,
            return_value: Variable::zero(entry.signature.return_type),
        };
        (entry.callable)(&mut context, env);
        Ok(context.return_value)
    }

    fn entry(&self, name: &str) -> Option<&FunctionEntry<E>> {
        self.lookup_by_name
            .get(name)
            .map(|&index| &self.entries[index])
    }
}

/// Who is calling: the object running the script, what triggered it and
/// which script it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFrame {
    pub caller: Option<ObjectId>,
    pub triggerer: Option<ObjectId>,
    pub script: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        lines: Vec<String>,
    }

    fn registry() -> FunctionRegistry<Log> {
        let mut registry = FunctionRegistry::new();
        registry
            .register_function(
                "Add",
                1,
                |ctx: &mut FunctionContext, log: &mut Log| {
                    let sum = ctx.int(0) + ctx.int(1);
                    log.lines.push(format!("{}={sum}", ctx.name()));
                    ctx.set_return(Variable::Int(sum));
                },
                FunctionSignature::new(ScriptType::Int, &[ScriptType::Int, ScriptType::Int]),
                vec![Variable::Int(10)],
            )
            .expect("register Add");
        registry
    }

    #[test]
    fn trailing_defaults_fill_missing_parameters() {
        let registry = registry();
        let mut log = Log::default();

        let result = registry
            .call("Add", CallFrame::default(), vec![Variable::Int(1)], &mut log)
            .expect("call");

        assert_eq!(result, Variable::Int(11));
        assert_eq!(log.lines, vec!["Add=11".to_string()]);
    }

    #[test]
    fn parameter_count_and_types_are_checked() {
        let registry = registry();
        let mut log = Log::default();

        assert!(matches!(
            registry.call("Add", CallFrame::default(), Vec::new(), &mut log),
            Err(ScriptError::MissingParameters { min: 1, found: 0, .. })
        ));
        assert!(matches!(
            registry.call(
                "Add",
                CallFrame::default(),
                vec![Variable::Int(1), Variable::Float(2.0)],
                &mut log
            ),
            Err(ScriptError::ParameterType {
                index: 1,
                expected: ScriptType::Int,
                found: ScriptType::Float,
                ..
            })
        ));
        assert!(matches!(
            registry.call(
                "Add",
                CallFrame::default(),
                vec![Variable::Int(1), Variable::Int(2), Variable::Int(3)],
                &mut log
            ),
            Err(ScriptError::TooManyParameters { .. })
        ));
        assert!(log.lines.is_empty());
    }

    #[test]
    fn duplicate_names_ids_and_bad_defaults_are_rejected() {
        let mut registry = registry();
        let noop = |_: &mut FunctionContext, _: &mut Log| {};

        assert_eq!(
            registry.register_function(
                "Add",
                2,
                noop,
                FunctionSignature::new(ScriptType::Void, &[]),
                Vec::new()
            ),
            Err(ScriptError::DuplicateFunction("Add".to_string()))
        );
        assert!(matches!(
            registry.register_function(
                "Other",
                1,
                noop,
                FunctionSignature::new(ScriptType::Void, &[]),
                Vec::new()
            ),
            Err(ScriptError::DuplicateFunctionId { id: 1, .. })
        ));
        assert!(matches!(
            registry.register_function(
                "Typed",
                3,
                noop,
                FunctionSignature::new(ScriptType::Void, &[ScriptType::Float]),
                vec![Variable::Int(0)]
            ),
            Err(ScriptError::InvalidDefaults { .. })
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.name_of(1), Some("Add"));
    }

    #[test]
    fn return_value_starts_as_zero_of_return_type() {
        let mut registry: FunctionRegistry<Log> = FunctionRegistry::new();
        registry
            .register_function(
                "Silent",
                7,
                |_: &mut FunctionContext, _: &mut Log| {},
                FunctionSignature::new(ScriptType::String, &[]),
                Vec::new(),
            )
            .expect("register");

        let result = registry
            .call("Silent", CallFrame::default(), Vec::new(), &mut Log::default())
            .expect("call");

        assert_eq!(result, Variable::String(String::new()));
    }
}
