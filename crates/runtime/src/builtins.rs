//! Implements the fixed builtin catalogue (`yasn_core::builtins::BUILTINS`).
//!
//! Grounded on the teacher's approach of one Rust function per FFI symbol
//! dispatched by name; here the dispatch table is `yasn_core::builtins`
//! (shared with the type checker) and this module supplies the behavior side.

use std::io::BufRead;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use yasn_core::ProgramBC;

use crate::error::RuntimeError;
use crate::scheduler;
use crate::value::{deep_clone, values_equal, Value};
use crate::vm::{self, len_of};

pub fn call(
    program: &Arc<ProgramBC>,
    name: &str,
    mut args: Vec<Value>,
    globals: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    match name {
        "print" => {
            println!("{}", args[0]);
            Ok(Value::Null)
        }
        "length" => Ok(Value::Int(len_of(&args[0])? as i64)),
        "range" => {
            let Value::Int(n) = args[0] else {
                return Err(RuntimeError::other("range: expected an integer"));
            };
            let items = (0..n.max(0)).map(Value::Int).collect();
            Ok(Value::list(items))
        }
        "input" => {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| RuntimeError::other(format!("input: {e}")))?;
            if line.ends_with('\n') {
                line.pop();
                if line.ends_with('\r') {
                    line.pop();
                }
            }
            Ok(Value::Str(line))
        }
        "sleep" => {
            let Value::Int(ms) = args[0] else {
                return Err(RuntimeError::other("sleep: expected an integer"));
            };
            std::thread::sleep(std::time::Duration::from_millis(ms.max(0) as u64));
            Ok(Value::Null)
        }
        "to_string" => Ok(Value::Str(args[0].to_string())),
        "parse_int" => {
            let Value::Str(s) = &args[0] else {
                return Err(RuntimeError::other("parse_int: expected a string"));
            };
            s.trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| RuntimeError::other(format!("parse_int: '{s}' is not an integer")))
        }
        "list_append" => {
            let Value::List(items) = &args[0] else {
                return Err(RuntimeError::other("list_append: expected a list"));
            };
            items.lock().expect("list mutex poisoned").push(args[1].clone());
            Ok(Value::Null)
        }
        "list_remove" => {
            let Value::List(items) = &args[0] else {
                return Err(RuntimeError::other("list_remove: expected a list"));
            };
            let mut items = items.lock().expect("list mutex poisoned");
            match items.iter().position(|v| values_equal(v, &args[1])) {
                Some(i) => {
                    items.remove(i);
                    Ok(Value::Bool(true))
                }
                None => Ok(Value::Bool(false)),
            }
        }
        "dict_keys" => {
            let Value::Dict(d) = &args[0] else {
                return Err(RuntimeError::other("dict_keys: expected a dict"));
            };
            Ok(Value::list(d.lock().expect("dict mutex poisoned").keys()))
        }
        "dict_contains" => {
            let Value::Dict(d) = &args[0] else {
                return Err(RuntimeError::other("dict_contains: expected a dict"));
            };
            Ok(Value::Bool(d.lock().expect("dict mutex poisoned").contains_key(&args[1])))
        }
        "file_read" => {
            let Value::Str(path) = &args[0] else {
                return Err(RuntimeError::other("file_read: expected a string path"));
            };
            std::fs::read_to_string(path)
                .map(Value::Str)
                .map_err(|e| RuntimeError::other(format!("file_read: {e}")).with_path(path.clone()))
        }
        "file_write" => {
            let (Value::Str(path), Value::Str(contents)) = (&args[0], &args[1]) else {
                return Err(RuntimeError::other("file_write: expected (string, string)"));
            };
            std::fs::write(path, contents)
                .map(|_| Value::Null)
                .map_err(|e| RuntimeError::other(format!("file_write: {e}")).with_path(path.clone()))
        }
        "file_exists" => {
            let Value::Str(path) = &args[0] else {
                return Err(RuntimeError::other("file_exists: expected a string path"));
            };
            Ok(Value::Bool(std::path::Path::new(path).exists()))
        }
        "file_delete" => {
            let Value::Str(path) = &args[0] else {
                return Err(RuntimeError::other("file_delete: expected a string path"));
            };
            std::fs::remove_file(path)
                .map(|_| Value::Null)
                .map_err(|e| RuntimeError::other(format!("file_delete: {e}")).with_path(path.clone()))
        }
        "json_parse" => {
            let Value::Str(text) = &args[0] else {
                return Err(RuntimeError::other("json_parse: expected a string"));
            };
            crate::json::parse(text)
        }
        "json_stringify" => crate::json::stringify(&args[0]).map(Value::Str),
        "http_get" => {
            let Value::Str(url) = &args[0] else {
                return Err(RuntimeError::other("http_get: expected a string url"));
            };
            crate::http::get(url)
        }
        "http_post" => {
            let (Value::Str(url), Value::Str(body)) = (&args[0], &args[1]) else {
                return Err(RuntimeError::other("http_post: expected (string, string)"));
            };
            crate::http::post(url, body)
        }
        "clock_ms" => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|e| RuntimeError::other(format!("clock_ms: {e}")))?;
            Ok(Value::Int(now.as_millis() as i64))
        }
        "random_int" => {
            let (Value::Int(lo), Value::Int(hi)) = (&args[0], &args[1]) else {
                return Err(RuntimeError::other("random_int: expected (integer, integer)"));
            };
            if lo > hi {
                return Err(RuntimeError::other("random_int: min is greater than max"));
            }
            Ok(Value::Int(rand::thread_rng().gen_range(*lo..=*hi)))
        }
        "assert" => {
            if crate::value::is_truthy(&args[0]) {
                Ok(Value::Null)
            } else {
                let message = args.get(1).map(|v| v.to_string()).unwrap_or_else(|| "assertion failed".to_string());
                Err(RuntimeError::other(message))
            }
        }
        "assert_equal" => {
            let (actual, expected) = (&args[0], &args[1]);
            if values_equal(actual, expected) {
                Ok(Value::Null)
            } else {
                let base = format!("expected {expected}, got {actual}");
                let message = match args.get(2) {
                    Some(m) => format!("{m}: {base}"),
                    None => base,
                };
                Err(RuntimeError::other(message))
            }
        }
        "fail" => Err(RuntimeError::other(args[0].to_string())),
        "spawn" => {
            let Value::Str(callee) = args.remove(0) else {
                return Err(RuntimeError::other("spawn: first argument must be a function name"));
            };
            if program.find_function(&callee).is_none() && !yasn_core::builtins::is_builtin(&callee) {
                return Err(RuntimeError::other(format!("spawn: unknown function '{callee}'")));
            }
            let program = Arc::clone(program);
            let snapshot: Vec<Value> = globals.iter().map(deep_clone).collect();
            let call_args: Vec<Value> = args.into_iter().map(|v| deep_clone(&v)).collect();
            let handle = scheduler::spawn(move |_should_cancel| {
                let mut globals = snapshot;
                vm::call_named(&program, &callee, call_args, &mut globals)
            });
            Ok(Value::Task(handle))
        }
        "done" => {
            let Value::Task(t) = &args[0] else {
                return Err(RuntimeError::other("done: expected a task handle"));
            };
            Ok(Value::Bool(t.is_done()))
        }
        "wait" => {
            let Value::Task(t) = &args[0] else {
                return Err(RuntimeError::other("wait: expected a task handle"));
            };
            let timeout_ms = optional_timeout(args.get(1))?;
            t.wait(timeout_ms)
        }
        "wait_all" => {
            let Value::List(tasks) = &args[0] else {
                return Err(RuntimeError::other("wait_all: expected a list of task handles"));
            };
            let timeout_ms = optional_timeout(args.get(1))?;
            let tasks = tasks.lock().expect("list mutex poisoned").clone();
            let mut results = Vec::with_capacity(tasks.len());
            for task in &tasks {
                let Value::Task(t) = task else {
                    return Err(RuntimeError::other("wait_all: expected a list of task handles"));
                };
                results.push(t.wait(timeout_ms)?);
            }
            Ok(Value::list(results))
        }
        "cancel" => {
            let Value::Task(t) = &args[0] else {
                return Err(RuntimeError::other("cancel: expected a task handle"));
            };
            Ok(Value::Bool(t.cancel()))
        }
        other => Err(RuntimeError::other(format!("'{other}' is declared as a builtin but has no implementation"))),
    }
}

fn optional_timeout(arg: Option<&Value>) -> Result<Option<u64>, RuntimeError> {
    match arg {
        None => Ok(None),
        Some(Value::Int(ms)) if *ms >= 0 => Ok(Some(*ms as u64)),
        Some(_) => Err(RuntimeError::other("timeout_ms must be a non-negative integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yasn_core::bytecode::{FunctionBC, Instruction, Opcode};

    fn empty_program() -> Arc<ProgramBC> {
        Arc::new(ProgramBC {
            functions: Vec::new(),
            entry: FunctionBC {
                name: yasn_core::ENTRY_NAME.to_string(),
                params: Vec::new(),
                local_count: 0,
                instructions: vec![Instruction::simple(Opcode::Halt)],
            },
            global_count: 0,
        })
    }

    #[test]
    fn range_of_zero_is_empty() {
        let program = empty_program();
        let mut globals = Vec::new();
        let result = call(&program, "range", vec![Value::Int(0)], &mut globals).unwrap();
        assert!(matches!(result, Value::List(items) if items.lock().unwrap().is_empty()));
    }

    #[test]
    fn assert_equal_reports_expected_and_actual() {
        let program = empty_program();
        let mut globals = Vec::new();
        let err = call(&program, "assert_equal", vec![Value::Int(4), Value::Int(5)], &mut globals).unwrap_err();
        assert!(err.message.contains("expected 5, got 4"));
    }

    #[test]
    fn list_append_mutates_in_place() {
        let program = empty_program();
        let mut globals = Vec::new();
        let list = Value::list(vec![Value::Int(1)]);
        call(&program, "list_append", vec![list.clone(), Value::Int(2)], &mut globals).unwrap();
        let Value::List(items) = &list else { unreachable!() };
        assert_eq!(items.lock().unwrap().len(), 2);
    }

    #[test]
    fn random_int_stays_within_bounds() {
        let program = empty_program();
        let mut globals = Vec::new();
        for _ in 0..20 {
            let result = call(&program, "random_int", vec![Value::Int(1), Value::Int(3)], &mut globals).unwrap();
            let Value::Int(n) = result else { panic!("expected int") };
            assert!((1..=3).contains(&n));
        }
    }
}
