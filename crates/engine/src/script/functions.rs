use tracing::{info, warn};

use crate::module::{Event, EventKind, EntryLocation, ModuleController};
use crate::world::{ObjectId, Vec3};

use super::registry::{FunctionContext, FunctionRegistry, FunctionSignature};
use super::types::{EngineValue, ScriptType, Variable};

use super::types::ScriptType::{
    EngineType as Engine, Float, Int, Object, ScriptState as Action, String as Str, Vector,
    Void,
};

type Handler = fn(&mut FunctionContext, &mut ModuleController);

#[derive(Debug, Clone, Copy)]
enum DefaultValue {
    Int(i32),
    Float(f32),
    Str(&'static str),
}

impl DefaultValue {
    fn to_variable(self) -> Variable {
        match self {
            Self::Int(value) => Variable::Int(value),
            Self::Float(value) => Variable::Float(value),
            Self::Str(value) => Variable::String(value.to_string()),
        }
    }
}

struct FunctionDef {
    name: &'static str,
    handler: Option<Handler>,
    return_type: ScriptType,
    params: &'static [ScriptType],
    defaults: &'static [DefaultValue],
}

const fn def(
    name: &'static str,
    handler: Option<Handler>,
    return_type: ScriptType,
    params: &'static [ScriptType],
    defaults: &'static [DefaultValue],
) -> FunctionDef {
    FunctionDef {
        name,
        handler,
        return_type,
        params,
        defaults,
    }
}

const ONE: &[DefaultValue] = &[DefaultValue::Int(1)];

/// Engine functions visible to scripts, in id order. Entries without a
/// handler are known to scripts but do nothing yet.
const FUNCTIONS: &[FunctionDef] = &[
    def("Random", Some(Functions::random), Int, &[Int], &[]),
    def("PrintString", Some(Functions::print_string), Void, &[Str], &[]),
    def(
        "PrintFloat",
        Some(Functions::print_float),
        Void,
        &[Float, Int, Int],
        &[DefaultValue::Int(18), DefaultValue::Int(9)],
    ),
    def(
        "FloatToString",
        Some(Functions::float_to_string),
        Str,
        &[Float, Int, Int],
        &[DefaultValue::Int(18), DefaultValue::Int(9)],
    ),
    def("PrintInteger", Some(Functions::print_integer), Void, &[Int], &[]),
    def("PrintObject", None, Void, &[Object], &[]),
    def(
        "PrintVector",
        Some(Functions::print_vector),
        Void,
        &[Vector, Int],
        &[DefaultValue::Int(0)],
    ),
    def("IntToString", Some(Functions::int_to_string), Str, &[Int], &[]),
    def("DelayCommand", Some(Functions::delay_command), Void, &[Float, Action], &[]),
    def("ExecuteScript", Some(Functions::execute_script), Void, &[Str, Object], &[]),
    def("GetArea", Some(Functions::get_area), Object, &[Object], &[]),
    def("GetPosition", Some(Functions::get_position), Vector, &[Object], &[]),
    def("GetFacing", Some(Functions::get_facing), Float, &[Object], &[]),
    def("GetModule", Some(Functions::get_module), Object, &[], &[]),
    def("GetFirstPC", Some(Functions::get_first_pc), Object, &[], &[]),
    def("GetTag", Some(Functions::get_tag), Str, &[Object], &[]),
    def(
        "GetObjectByTag",
        Some(Functions::get_object_by_tag),
        Object,
        &[Str, Int],
        &[DefaultValue::Int(0)],
    ),
    def("DestroyObject", Some(Functions::destroy_object), Void, &[Object], &[]),
    def("GetIsObjectValid", Some(Functions::get_is_object_valid), Int, &[Object], &[]),
    def("GetLocation", Some(Functions::get_location), Engine, &[Object], &[]),
    def("Location", Some(Functions::location), Engine, &[Object, Vector, Float], &[]),
    def("JumpToLocation", Some(Functions::jump_to_location), Void, &[Engine], &[]),
    def(
        "JumpToObject",
        Some(Functions::jump_to_object),
        Void,
        &[Object, Int],
        &[DefaultValue::Int(1)],
    ),
    def(
        "StartNewModule",
        Some(Functions::start_new_module),
        Void,
        &[Str, Str],
        &[DefaultValue::Str("")],
    ),
    def("d2", Some(Functions::d2), Int, &[Int], ONE),
    def("d3", Some(Functions::d3), Int, &[Int], ONE),
    def("d4", Some(Functions::d4), Int, &[Int], ONE),
    def("d6", Some(Functions::d6), Int, &[Int], ONE),
    def("d8", Some(Functions::d8), Int, &[Int], ONE),
    def("d10", Some(Functions::d10), Int, &[Int], ONE),
    def("d12", Some(Functions::d12), Int, &[Int], ONE),
    def("d20", Some(Functions::d20), Int, &[Int], ONE),
    def("d100", Some(Functions::d100), Int, &[Int], ONE),
    def("SetCameraFacing", None, Void, &[Float], &[]),
    def("PlaySound", None, Void, &[Str], &[]),
    def("SoundObjectPlay", None, Void, &[Object], &[]),
    def(
        "ActionMoveToObject",
        None,
        Void,
        &[Object, Int, Float],
        &[DefaultValue::Int(0), DefaultValue::Float(1.0)],
    ),
];

/// The engine function table and its handlers.
pub struct Functions;

impl Functions {
    /// A registry holding every entry of the function table.
    pub fn registry() -> FunctionRegistry<ModuleController> {
        let mut registry = FunctionRegistry::new();
        Self::register_all(&mut registry);
        registry
    }

    /// Registers the function table. Names already present are skipped
    /// with a warning so embedders can pre-register their own versions.
    pub fn register_all(registry: &mut FunctionRegistry<ModuleController>) {
        for (id, function) in FUNCTIONS.iter().enumerate() {
            let handler = function.handler.unwrap_or(Self::unimplemented);
            let defaults = function
                .defaults
                .iter()
                .map(|value| value.to_variable())
                .collect();
            let signature = FunctionSignature::new(function.return_type, function.params);
            if let Err(err) =
                registry.register_function(function.name, id as u32, handler, signature, defaults)
            {
                warn!(function = function.name, error = %err, "function_registration_skipped");
            }
        }
    }

    fn unimplemented(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let params = format_params(ctx.params(), |id| {
            module.object(id).map(|object| object.tag.clone())
        });
        warn!("TODO: {}({})", ctx.name(), params);
    }

    fn random(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let value = module.random_below(ctx.int(0));
        ctx.set_return(Variable::Int(value));
    }

    fn print_string(ctx: &mut FunctionContext, _module: &mut ModuleController) {
        info!(script = ctx.current_script().unwrap_or_default(), "{}", ctx.string(0));
    }

    fn print_integer(ctx: &mut FunctionContext, _module: &mut ModuleController) {
        info!(script = ctx.current_script().unwrap_or_default(), "{}", ctx.int(0));
    }

    fn print_float(ctx: &mut FunctionContext, _module: &mut ModuleController) {
        let text = format_float(ctx.float(0), ctx.int(1), ctx.int(2));
        info!(script = ctx.current_script().unwrap_or_default(), "{}", text);
    }

    fn float_to_string(ctx: &mut FunctionContext, _module: &mut ModuleController) {
        let text = format_float(ctx.float(0), ctx.int(1), ctx.int(2));
        ctx.set_return(Variable::String(text));
    }

    fn int_to_string(ctx: &mut FunctionContext, _module: &mut ModuleController) {
        let text = ctx.int(0).to_string();
        ctx.set_return(Variable::String(text));
    }

    fn print_vector(ctx: &mut FunctionContext, _module: &mut ModuleController) {
        let vector = ctx.vector(0);
        let prefix = if ctx.int(1) != 0 { "PRINTVECTOR:" } else { "" };
        info!(
            script = ctx.current_script().unwrap_or_default(),
            "{}({}, {}, {})",
            prefix,
            vector.x,
            vector.y,
            vector.z
        );
    }

    fn delay_command(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let Some(script) = ctx.current_script().map(str::to_string) else {
            warn!("delay_command_outside_script");
            return;
        };
        let Some(state) = ctx.state(1).cloned() else {
            return;
        };
        let delay_ms = seconds_to_ms(ctx.float(0));
        if let Err(err) = module.delay_script(&script, state, ctx.caller(), ctx.triggerer(), delay_ms) {
            warn!(script = %script, error = %err, "delay_command_failed");
        }
    }

    fn execute_script(ctx: &mut FunctionContext, module: &mut ModuleController) {
        module.add_event(Event::new(
            "script",
            EventKind::ScriptTrigger {
                script: ctx.string(0).to_string(),
                owner: ctx.object(1),
                triggerer: ctx.caller(),
            },
        ));
    }

    fn get_area(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let area = ctx
            .object(0)
            .and_then(|id| module.object(id))
            .and_then(|object| object.area);
        ctx.set_return(Variable::Object(area));
    }

    fn get_position(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let position = ctx
            .object(0)
            .and_then(|id| module.object(id))
            .map(|object| object.position)
            .unwrap_or_default();
        ctx.set_return(Variable::Vector(position));
    }

    fn get_facing(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let facing = ctx
            .object(0)
            .and_then(|id| module.object(id))
            .map(|object| object.orientation_degrees)
            .unwrap_or_default();
        ctx.set_return(Variable::Float(facing));
    }

    fn get_module(ctx: &mut FunctionContext, module: &mut ModuleController) {
        ctx.set_return(Variable::Object(module.module_object_id()));
    }

    fn get_first_pc(ctx: &mut FunctionContext, module: &mut ModuleController) {
        ctx.set_return(Variable::Object(module.pc_id()));
    }

    fn get_tag(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let tag = ctx
            .object(0)
            .and_then(|id| module.object(id))
            .map(|object| object.tag.clone())
            .unwrap_or_default();
        ctx.set_return(Variable::String(tag));
    }

    fn get_object_by_tag(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let found = usize::try_from(ctx.int(1))
            .ok()
            .and_then(|nth| module.find_object_by_tag(ctx.string(0), None, nth));
        ctx.set_return(Variable::Object(found));
    }

    fn destroy_object(ctx: &mut FunctionContext, module: &mut ModuleController) {
        if let Some(id) = ctx.object(0) {
            if !module.destroy_object(id) {
                warn!(object = id.0, "destroy_object_refused");
            }
        }
    }

    fn get_is_object_valid(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let valid = ctx.object(0).is_some_and(|id| module.objects().contains(id));
        ctx.set_return(Variable::Int(i32::from(valid)));
    }

    fn get_location(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let location = ctx
            .object(0)
            .and_then(|id| module.object(id))
            .map(|object| EngineValue::Location {
                area: object.area,
                position: object.position,
                facing_degrees: object.orientation_degrees,
            });
        ctx.set_return(Variable::EngineType(location));
    }

    fn location(ctx: &mut FunctionContext, _module: &mut ModuleController) {
        let location = EngineValue::Location {
            area: ctx.object(0),
            position: ctx.vector(1),
            facing_degrees: ctx.float(2),
        };
        ctx.set_return(Variable::EngineType(Some(location)));
    }

    fn jump_to_location(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let Some(EngineValue::Location {
            area,
            position,
            facing_degrees,
        }) = ctx.engine(0)
        else {
            warn!("jump_to_invalid_location");
            return;
        };
        jump_caller(ctx, module, area, position, facing_degrees);
    }

    fn jump_to_object(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let Some(target) = ctx.object(0).and_then(|id| module.object(id)) else {
            warn!("jump_to_invalid_object");
            return;
        };
        let (area, position, facing) = (target.area, target.position, target.orientation_degrees);
        jump_caller(ctx, module, area, position, facing);
    }

    fn start_new_module(ctx: &mut FunctionContext, module: &mut ModuleController) {
        let name = ctx.string(0).to_string();
        let entry = Some(ctx.string(1))
            .filter(|tag| !tag.is_empty())
            .map(EntryLocation::tag);
        if let Err(err) = module.load(&name, entry) {
            warn!(module = %name, error = %err, "start_new_module_failed");
        }
    }

    fn d2(ctx: &mut FunctionContext, module: &mut ModuleController) {
        roll_dice(ctx, module, 2);
    }

    fn d3(ctx: &mut FunctionContext, module: &mut ModuleController) {
        roll_dice(ctx, module, 3);
    }

    fn d4(ctx: &mut FunctionContext, module: &mut ModuleController) {
        roll_dice(ctx, module, 4);
    }

    fn d6(ctx: &mut FunctionContext, module: &mut ModuleController) {
        roll_dice(ctx, module, 6);
    }

    fn d8(ctx: &mut FunctionContext, module: &mut ModuleController) {
        roll_dice(ctx, module, 8);
    }

    fn d10(ctx: &mut FunctionContext, module: &mut ModuleController) {
        roll_dice(ctx, module, 10);
    }

    fn d12(ctx: &mut FunctionContext, module: &mut ModuleController) {
        roll_dice(ctx, module, 12);
    }

    fn d20(ctx: &mut FunctionContext, module: &mut ModuleController) {
        roll_dice(ctx, module, 20);
    }

    fn d100(ctx: &mut FunctionContext, module: &mut ModuleController) {
        roll_dice(ctx, module, 100);
    }
}

fn roll_dice(ctx: &mut FunctionContext, module: &mut ModuleController, sides: i32) {
    let total = module.roll(1, sides, ctx.int(0));
    ctx.set_return(Variable::Int(total));
}

fn jump_caller(
    ctx: &FunctionContext,
    module: &mut ModuleController,
    area: Option<ObjectId>,
    position: Vec3,
    facing_degrees: f32,
) {
    let Some(caller) = ctx.caller() else {
        warn!(function = ctx.name(), "jump_without_caller");
        return;
    };
    if let Some(object) = module.object_mut(caller) {
        object.orientation_degrees = facing_degrees;
    }
    if let Err(err) = module.jump_to(caller, area, position) {
        warn!(function = ctx.name(), error = %err, "jump_failed");
    }
}

fn seconds_to_ms(seconds: f32) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (f64::from(seconds) * 1000.0).round() as u64
    } else {
        0
    }
}

const MAX_FLOAT_FORMAT: i32 = 64;

fn format_float(value: f32, width: i32, decimals: i32) -> String {
    let width = usize::try_from(width.clamp(0, MAX_FLOAT_FORMAT)).unwrap_or(0);
    let decimals = usize::try_from(decimals.clamp(0, MAX_FLOAT_FORMAT)).unwrap_or(0);
    format!("{value:>width$.decimals$}")
}

/// Renders call parameters for diagnostics, e.g.
/// `1, 2.5, "text", <object>("door_01"), (1, 2, 3)`.
pub fn format_params(params: &[Variable], tag_of: impl Fn(ObjectId) -> Option<String>) -> String {
    params
        .iter()
        .map(|param| match param {
            Variable::Void => "<void>".to_string(),
            Variable::Int(value) => value.to_string(),
            Variable::Float(value) => value.to_string(),
            Variable::String(value) => format!("\"{value}\""),
            Variable::Object(id) => match id.and_then(&tag_of) {
                Some(tag) => format!("<object>(\"{tag}\")"),
                None => "<object>(0)".to_string(),
            },
            Variable::Vector(value) => format!("({}, {}, {})", value.x, value.y, value.z),
            Variable::Struct(_) => "<struct>".to_string(),
            Variable::EngineType(_) => "<engine>".to_string(),
            Variable::ScriptState(_) => "<state>".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_registers_without_conflicts() {
        let registry = Functions::registry();

        assert_eq!(registry.len(), FUNCTIONS.len());
        for function in FUNCTIONS {
            assert!(registry.contains(function.name), "{} was skipped", function.name);
        }
        assert_eq!(registry.id_of("Random"), Some(0));
        assert_eq!(
            registry.signature("PrintFloat").map(|signature| signature.params.len()),
            Some(3)
        );
        assert!(registry.contains("d100"));
        assert!(registry.contains("SetCameraFacing"));
    }

    #[test]
    fn params_render_with_object_tags() {
        let params = vec![
            Variable::Int(1),
            Variable::Float(2.5),
            Variable::String("text".to_string()),
            Variable::Object(Some(ObjectId(4))),
            Variable::Object(Some(ObjectId(5))),
            Variable::Vector(Vec3::new(1.0, 2.0, 3.0)),
            Variable::Struct(Vec::new()),
            Variable::EngineType(None),
        ];

        let rendered = format_params(&params, |id| {
            (id == ObjectId(4)).then(|| "door_01".to_string())
        });

        assert_eq!(
            rendered,
            "1, 2.5, \"text\", <object>(\"door_01\"), <object>(0), (1, 2, 3), <struct>, <engine>"
        );
    }

    #[test]
    fn float_formatting_honours_width_and_decimals() {
        assert_eq!(format_float(1.5, 6, 2), "  1.50");
        assert_eq!(format_float(-3.0, -1, -1), "-3");
        assert_eq!(format_float(0.5, i32::MAX, 1).len(), 64);
        assert_eq!(format_float(0.5, 0, i32::MAX).len(), 66);
    }

    #[test]
    fn move_to_object_keeps_its_table_slot() {
        let registry = Functions::registry();

        assert_eq!(
            registry
                .signature("ActionMoveToObject")
                .map(|signature| signature.params.len()),
            Some(3)
        );
        assert_eq!(registry.id_of("ActionMoveToObject"), Some(FUNCTIONS.len() as u32 - 1));
    }

    #[test]
    fn negative_delays_fire_immediately() {
        assert_eq!(seconds_to_ms(-2.0), 0);
        assert_eq!(seconds_to_ms(0.25), 250);
        assert_eq!(seconds_to_ms(f32::NAN), 0);
    }
}
