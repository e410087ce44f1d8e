use std::collections::HashMap;

use crate::world::Vec3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectArg {
    /// The script's owner (`OBJECT_SELF`).
    SelfRef,
    Triggerer,
    Pc,
    Module,
    Invalid,
    Tag(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    Int(i32),
    Float(f32),
    String(String),
    Object(ObjectArg),
    Vector(Vec3),
    /// Captured continuation pointing at a labelled block of the same script.
    State(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptCall {
    pub function: String,
    pub args: Vec<ScriptArg>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptProgram {
    pub name: String,
    pub body: Vec<ScriptCall>,
    pub blocks: HashMap<String, Vec<ScriptCall>>,
}

impl ScriptProgram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn call(mut self, function: impl Into<String>, args: Vec<ScriptArg>) -> Self {
        self.body.push(ScriptCall {
            function: function.into(),
            args,
        });
        self
    }

    pub fn block(mut self, label: impl Into<String>, calls: Vec<ScriptCall>) -> Self {
        self.blocks.insert(label.into(), calls);
        self
    }
}

/// All call-list scripts shipped with one module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptLibrary {
    scripts: HashMap<String, ScriptProgram>,
}

impl ScriptLibrary {
    pub fn insert(&mut self, program: ScriptProgram) -> Option<ScriptProgram> {
        self.scripts.insert(program.name.clone(), program)
    }

    pub fn with(mut self, program: ScriptProgram) -> Self {
        self.insert(program);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ScriptProgram> {
        self.scripts.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}
