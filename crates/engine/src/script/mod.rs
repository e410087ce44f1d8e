mod functions;
mod program;
mod registry;
mod runner;
mod types;

pub use functions::{format_params, Functions};
pub use program::{ObjectArg, ScriptArg, ScriptCall, ScriptLibrary, ScriptProgram};
pub use registry::{
    CallFrame, FunctionCallback, FunctionContext, FunctionRegistry, FunctionSignature,
    ScriptError,
};
pub use runner::{CallScriptRunner, ScriptInvocation, ScriptRunner};
pub use types::{EngineValue, ScriptState, ScriptType, Variable};
