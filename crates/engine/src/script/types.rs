use std::fmt;

use crate::world::{ObjectId, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    Void,
    Int,
    Float,
    String,
    Object,
    Vector,
    Struct,
    EngineType,
    ScriptState,
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Void => "void",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Object => "object",
            Self::Vector => "vector",
            Self::Struct => "struct",
            Self::EngineType => "engine",
            Self::ScriptState => "action",
        };
        f.write_str(name)
    }
}

/// Engine-defined opaque values scripts can hold but not construct freely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineValue {
    Location {
        area: Option<ObjectId>,
        position: Vec3,
        facing_degrees: f32,
    },
}

/// Captured continuation handed to `DelayCommand`.
///
/// `label` selects a block inside the owning script; `None` re-runs the
/// script body. `locals` travel with the state untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptState {
    pub label: Option<String>,
    pub locals: Vec<Variable>,
}

impl ScriptState {
    pub fn at_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            locals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    Void,
    Int(i32),
    Float(f32),
    String(String),
    Object(Option<ObjectId>),
    Vector(Vec3),
    Struct(Vec<Variable>),
    EngineType(Option<EngineValue>),
    ScriptState(ScriptState),
}

impl Variable {
    pub fn script_type(&self) -> ScriptType {
        match self {
            Self::Void => ScriptType::Void,
            Self::Int(_) => ScriptType::Int,
            Self::Float(_) => ScriptType::Float,
            Self::String(_) => ScriptType::String,
            Self::Object(_) => ScriptType::Object,
            Self::Vector(_) => ScriptType::Vector,
            Self::Struct(_) => ScriptType::Struct,
            Self::EngineType(_) => ScriptType::EngineType,
            Self::ScriptState(_) => ScriptType::ScriptState,
        }
    }

    /// The value an unimplemented function hands back for `ty`.
    pub fn zero(ty: ScriptType) -> Self {
        match ty {
            ScriptType::Void => Self::Void,
            ScriptType::Int => Self::Int(0),
            ScriptType::Float => Self::Float(0.0),
            ScriptType::String => Self::String(String::new()),
            ScriptType::Object => Self::Object(None),
            ScriptType::Vector => Self::Vector(Vec3::default()),
            ScriptType::Struct => Self::Struct(Vec::new()),
            ScriptType::EngineType => Self::EngineType(None),
            ScriptType::ScriptState => Self::ScriptState(ScriptState::default()),
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<Option<ObjectId>> {
        match self {
            Self::Object(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vec3> {
        match self {
            Self::Vector(value) => Some(*value),
            _ => None,
        }
    }
}
