//! Resolves a task's entrypoint to an invocable function.
//!
//! Two resolution paths, per the task's [`specifications::task::Entrypoint`]:
//! a dotted module path looked up in this in-process registry, or a
//! serialized callable blob. Callable-blob decoding only ever happens inside
//! the child process, never in the worker's main process, so it lives next
//! to [`resolve`] rather than behind a shared helper the main process could
//! also reach for.

use std::collections::HashMap;

use serde_json::Value as Json;

use specifications::codec::{NdArray, Value};

use crate::errors::WrkError;


/***** LIBRARY *****/
/// Everything an entrypoint function needs: its typed dynamic inputs
/// (already decoded from shared memory) and its typed static parameters
/// (already converted by the type system at materialization time).
pub struct TaskInput {
    pub dynamic: HashMap<String, Value>,
    pub static_params: HashMap<String, Json>,
}

impl TaskInput {
    pub fn dynamic_int(&self, name: &str) -> Result<i32, WrkError> {
        match self.dynamic.get(name) {
            Some(Value::Int(i)) => Ok(*i),
            Some(other) => Err(WrkError::Task(format!("input '{name}' is not an int: {other:?}"))),
            None => Err(WrkError::Task(format!("missing dynamic input '{name}'"))),
        }
    }

    pub fn static_int(&self, name: &str) -> Result<i32, WrkError> {
        self.static_params
            .get(name)
            .and_then(Json::as_i64)
            .map(|i| i as i32)
            .ok_or_else(|| WrkError::Task(format!("missing or non-integer static param '{name}'")))
    }
}

type TaskFn = fn(&TaskInput) -> Result<Value, String>;

/// `(param)`: emits the integer static param `value` as the task's output.
/// The source of a reader/increment/writer addition chain.
fn builtin_reader(input: &TaskInput) -> Result<Value, String> {
    input.static_int("value").map(Value::Int).map_err(|e| e.to_string())
}

/// `(int) -> int`: adds the static param `step` to the dynamic input
/// `input`.
fn builtin_increment(input: &TaskInput) -> Result<Value, String> {
    let base = input.dynamic_int("input").map_err(|e| e.to_string())?;
    let step = input.static_int("step").map_err(|e| e.to_string())?;
    Ok(Value::Int(base + step))
}

/// `(int) -> int`: the identity, the sink of an addition chain.
fn builtin_writer(input: &TaskInput) -> Result<Value, String> {
    input.dynamic_int("input").map(Value::Int).map_err(|e| e.to_string())
}

/// `(params rows, cols) -> ndarray`: a zeroed `f64` array of shape
/// `(rows, cols)`.
fn builtin_make_array(input: &TaskInput) -> Result<Value, String> {
    let rows = input.static_int("rows").map_err(|e| e.to_string())? as u64;
    let cols = input.static_int("cols").map_err(|e| e.to_string())? as u64;
    let n_elems = (rows * cols) as usize;
    Ok(Value::NdArray(NdArray { dtype: "f64".into(), shape: vec![rows, cols], data: vec![0u8; n_elems * 8] }))
}

/// `(ndarray) -> int`: the element count of the dynamic input `input`.
fn builtin_consume_array(input: &TaskInput) -> Result<Value, String> {
    match input.dynamic.get("input") {
        Some(Value::NdArray(arr)) => Ok(Value::Int(arr.shape.iter().product::<u64>() as i32)),
        Some(other) => Err(format!("input 'input' is not an ndarray: {other:?}")),
        None => Err("missing dynamic input 'input'".to_string()),
    }
}

fn builtins() -> HashMap<&'static str, TaskFn> {
    let mut m: HashMap<&'static str, TaskFn> = HashMap::new();
    m.insert("builtin.reader", builtin_reader);
    m.insert("builtin.increment", builtin_increment);
    m.insert("builtin.writer", builtin_writer);
    m.insert("builtin.make_array", builtin_make_array);
    m.insert("builtin.consume_array", builtin_consume_array);
    m
}

/// Resolves a dotted module path to its function and invokes it.
pub fn invoke_module(module: &str, input: &TaskInput) -> Result<Value, WrkError> {
    let f = builtins().get(module).copied().ok_or_else(|| WrkError::Task(format!("no entrypoint registered for '{module}'")))?;
    f(input).map_err(WrkError::Task)
}

/// Decodes a serialized callable blob and invokes it. Only ever reached
/// inside a task child process. The core ships no general-purpose bytecode
/// interpreter; a callable blob is expected to itself be a dotted name into
/// this same builtin registry, serialized as UTF-8 — matching how the
/// distilled scheduler treats a "callable" as just another way to name a
/// task, not as remote code execution.
pub fn invoke_callable(blob: &[u8], input: &TaskInput) -> Result<Value, WrkError> {
    let module = std::str::from_utf8(blob).map_err(|_| WrkError::Task("callable blob is not valid UTF-8".into()))?;
    invoke_module(module, input)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn empty_input() -> TaskInput { TaskInput { dynamic: HashMap::new(), static_params: HashMap::new() } }

    #[test]
    fn reader_emits_static_value() {
        let mut input = empty_input();
        input.static_params.insert("value".into(), Json::from(7));
        assert_eq!(invoke_module("builtin.reader", &input).unwrap(), Value::Int(7));
    }

    #[test]
    fn increment_adds_step_to_dynamic_input() {
        let mut input = empty_input();
        input.dynamic.insert("input".into(), Value::Int(7));
        input.static_params.insert("step".into(), Json::from(3));
        assert_eq!(invoke_module("builtin.increment", &input).unwrap(), Value::Int(10));
    }

    #[test]
    fn writer_passes_through_dynamic_input() {
        let mut input = empty_input();
        input.dynamic.insert("input".into(), Value::Int(10));
        assert_eq!(invoke_module("builtin.writer", &input).unwrap(), Value::Int(10));
    }

    #[test]
    fn make_array_then_consume_array_round_trips_element_count() {
        let mut make_input = empty_input();
        make_input.static_params.insert("rows".into(), Json::from(2));
        make_input.static_params.insert("cols".into(), Json::from(3));
        let array = invoke_module("builtin.make_array", &make_input).unwrap();

        let mut consume_input = empty_input();
        consume_input.dynamic.insert("input".into(), array);
        assert_eq!(invoke_module("builtin.consume_array", &consume_input).unwrap(), Value::Int(6));
    }

    #[test]
    fn unknown_module_errors() {
        assert!(invoke_module("no.such.module", &empty_input()).is_err());
    }

    #[test]
    fn callable_blob_resolves_as_a_dotted_name() {
        let input = {
            let mut i = empty_input();
            i.static_params.insert("value".into(), Json::from(1));
            i
        };
        assert_eq!(invoke_callable(b"builtin.reader", &input).unwrap(), Value::Int(1));
    }
}
