use tracing::debug;

use crate::module::ModuleController;
use crate::world::ObjectId;

use super::functions::Functions;
use super::program::{ObjectArg, ScriptArg, ScriptLibrary};
use super::registry::{CallFrame, FunctionRegistry, ScriptError};
use super::types::{ScriptState, Variable};

/// One script execution request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptInvocation {
    pub script: String,
    /// Resume point captured by `DelayCommand`; `None` runs the body.
    pub state: Option<ScriptState>,
    pub owner: Option<ObjectId>,
    pub triggerer: Option<ObjectId>,
}

/// Executes scripts on behalf of the module controller.
///
/// The controller lends itself mutably for the duration of `run`; calls
/// that would tear down the running module are deferred by the controller.
pub trait ScriptRunner: Send {
    fn module_loaded(&mut self, _module: &str, _scripts: ScriptLibrary) {}
    fn module_unloaded(&mut self) {}
    fn run(
        &mut self,
        invocation: &ScriptInvocation,
        module: &mut ModuleController,
    ) -> Result<(), ScriptError>;
}

/// Runner for call-list scripts: each call is dispatched through the
/// engine function registry.
pub struct CallScriptRunner {
    registry: FunctionRegistry<ModuleController>,
    library: ScriptLibrary,
}

impl Default for CallScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CallScriptRunner {
    pub fn new() -> Self {
        Self {
            registry: Functions::registry(),
            library: ScriptLibrary::default(),
        }
    }

    pub fn registry(&self) -> &FunctionRegistry<ModuleController> {
        &self.registry
    }

    pub fn library(&self) -> &ScriptLibrary {
        &self.library
    }
}

impl ScriptRunner for CallScriptRunner {
    fn module_loaded(&mut self, module: &str, scripts: ScriptLibrary) {
        debug!(module, script_count = scripts.len(), "script_library_loaded");
        self.library = scripts;
    }

    fn module_unloaded(&mut self) {
        self.library = ScriptLibrary::default();
    }

    fn run(
        &mut self,
        invocation: &ScriptInvocation,
        module: &mut ModuleController,
    ) -> Result<(), ScriptError> {
        let program = self
            .library
            .get(&invocation.script)
            .ok_or_else(|| ScriptError::UnknownScript(invocation.script.clone()))?;
        let calls = match invocation.state.as_ref().and_then(|state| state.label.as_deref()) {
            Some(label) => program
                .blocks
                .get(label)
                .ok_or_else(|| ScriptError::UnknownBlock {
                    script: invocation.script.clone(),
                    label: label.to_string(),
                })?,
            None => &program.body,
        };

        for call in calls {
            let params = call
                .args
                .iter()
                .map(|arg| resolve_arg(arg, invocation, module))
                .collect();
            let frame = CallFrame {
                caller: invocation.owner,
                triggerer: invocation.triggerer,
                script: Some(invocation.script.clone()),
            };
            self.registry.call(&call.function, frame, params, module)?;
        }
        Ok(())
    }
}

fn resolve_arg(arg: &ScriptArg, invocation: &ScriptInvocation, module: &ModuleController) -> Variable {
    match arg {
        ScriptArg::Int(value) => Variable::Int(*value),
        ScriptArg::Float(value) => Variable::Float(*value),
        ScriptArg::String(value) => Variable::String(value.clone()),
        ScriptArg::Vector(value) => Variable::Vector(*value),
        ScriptArg::State(label) => Variable::ScriptState(ScriptState::at_label(label.clone())),
        ScriptArg::Object(object) => Variable::Object(match object {
            ObjectArg::SelfRef => invocation.owner,
            ObjectArg::Triggerer => invocation.triggerer,
            ObjectArg::Pc => module.pc_id(),
            ObjectArg::Module => module.module_object_id(),
            ObjectArg::Invalid => None,
            ObjectArg::Tag(tag) => module.find_object_by_tag(tag, None, 0),
        }),
    }
}
