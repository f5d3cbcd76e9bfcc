//! The stack interpreter (spec §4.6 "Virtual Machine").
//!
//! One `exec_function` call per frame, recursing through plain Rust calls
//! for nested `CALL`s rather than a hand-rolled frame stack — the teacher's
//! own interpreter loops (see `codegen`'s word dispatch) likewise just let
//! the host call stack be the frame stack, since the instruction set has no
//! tail-call requirement and programs are shallow enough that this never
//! threatens the stack depth in practice.

use std::sync::Arc;

use yasn_core::{FunctionBC, Literal, Opcode, ProgramBC};

use crate::builtins;
use crate::error::RuntimeError;
use crate::value::{compare_values, is_truthy, type_name, values_equal, Value};

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn pop_stack(stack: &mut Vec<Value>) -> Value {
    stack.pop().expect("stack underflow: malformed bytecode")
}

enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(&self) -> f64 {
        match self {
            Num::Int(i) => *i as f64,
            Num::Float(f) => *f,
        }
    }
}

fn as_num(v: &Value) -> Option<Num> {
    match v {
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn type_error(op: &str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::other(format!(
        "{op}: unsupported operand types '{}' and '{}'",
        type_name(a),
        type_name(b)
    ))
}

fn add(a: Value, b: Value) -> Result<Value, RuntimeError> {
    match (&a, &b) {
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{x}{y}"))),
        (Value::List(x), Value::List(y)) => {
            let x = x.lock().expect("list mutex poisoned");
            let y = y.lock().expect("list mutex poisoned");
            let mut out = x.clone();
            out.extend(y.iter().cloned());
            Ok(Value::list(out))
        }
        _ => match (as_num(&a), as_num(&b)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(Value::Int(x.wrapping_add(y))),
            (Some(x), Some(y)) => Ok(Value::Float(x.as_f64() + y.as_f64())),
            _ => Err(type_error("add", &a, &b)),
        },
    }
}

fn numeric_binop(
    op_name: &str,
    a: Value,
    b: Value,
    int_op: impl Fn(i64, i64) -> Option<i64>,
    float_op: impl Fn(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    match (as_num(&a), as_num(&b)) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => int_op(x, y)
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::other(format!("{op_name}: division by zero"))),
        (Some(x), Some(y)) => Ok(Value::Float(float_op(x.as_f64(), y.as_f64()))),
        _ => Err(type_error(op_name, &a, &b)),
    }
}

fn index_get(container: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match container {
        Value::List(items) => {
            let items = items.lock().expect("list mutex poisoned");
            let Value::Int(i) = index else {
                return Err(RuntimeError::other("list index must be an integer"));
            };
            items
                .get(*i as usize)
                .cloned()
                .ok_or_else(|| RuntimeError::other(format!("index {i} out of bounds (length {})", items.len())))
        }
        Value::Dict(d) => {
            let d = d.lock().expect("dict mutex poisoned");
            d.get(index).cloned().ok_or_else(|| RuntimeError::other("key not found"))
        }
        other => Err(RuntimeError::other(format!("cannot index into a {}", type_name(other)))),
    }
}

fn index_set(container: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    match container {
        Value::List(items) => {
            let mut items = items.lock().expect("list mutex poisoned");
            let Value::Int(i) = index else {
                return Err(RuntimeError::other("list index must be an integer"));
            };
            let slot = items
                .get_mut(*i as usize)
                .ok_or_else(|| RuntimeError::other(format!("index {i} out of bounds")))?;
            *slot = value;
            Ok(())
        }
        Value::Dict(d) => {
            if matches!(index, Value::Null) {
                return Err(RuntimeError::other("dict key must not be null"));
            }
            let mut d = d.lock().expect("dict mutex poisoned");
            d.set(index.clone(), value);
            Ok(())
        }
        other => Err(RuntimeError::other(format!("cannot index-assign into a {}", type_name(other)))),
    }
}

pub(crate) fn len_of(v: &Value) -> Result<usize, RuntimeError> {
    match v {
        Value::List(items) => Ok(items.lock().expect("list mutex poisoned").len()),
        Value::Dict(d) => Ok(d.lock().expect("dict mutex poisoned").len()),
        Value::Str(s) => Ok(s.chars().count()),
        other => Err(RuntimeError::other(format!("{} has no length", type_name(other)))),
    }
}

/// One VM instance: one globals array, re-entrant across `call_function`
/// calls as spec §4.6's execution contract requires.
pub struct Vm {
    program: Arc<ProgramBC>,
    globals: Vec<Value>,
    entry_ran: bool,
}

impl Vm {
    pub fn new(program: Arc<ProgramBC>) -> Self {
        let n = program.global_count;
        Vm {
            program,
            globals: vec![Value::Null; n],
            entry_ran: false,
        }
    }

    /// Runs `__entry__` with a fresh globals array (spec §4.6 "Run()").
    pub fn run(&mut self) -> Result<Value, RuntimeError> {
        self.globals = vec![Value::Null; self.program.global_count];
        let result = exec_function(&self.program, &self.program.entry, Vec::new(), &mut self.globals);
        self.entry_ran = true;
        result
    }

    /// `CallFunction(name, args, reset_state)` (spec §4.6).
    pub fn call_function(&mut self, name: &str, args: Vec<Value>, reset_state: bool) -> Result<Value, RuntimeError> {
        if reset_state || !self.entry_ran {
            self.globals = vec![Value::Null; self.program.global_count];
            exec_function(&self.program, &self.program.entry, Vec::new(), &mut self.globals)?;
            self.entry_ran = true;
        }
        call_named(&self.program, name, args, &mut self.globals)
    }
}

/// Resolves `name` against the user function table first, then the builtin
/// catalogue (spec §9 "reflective name→function lookup"). Used both by the
/// main interpreter loop's `CALL` handling and by spawned tasks.
pub(crate) fn call_named(
    program: &Arc<ProgramBC>,
    name: &str,
    args: Vec<Value>,
    globals: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    if let Some(func) = program.find_function(name) {
        exec_function(program, func, args, globals)
    } else if yasn_core::builtins::is_builtin(name) {
        builtins::call(program, name, args, globals)
    } else {
        Err(RuntimeError::other(format!("unknown function '{name}'")))
    }
}

fn exec_function(
    program: &Arc<ProgramBC>,
    func: &FunctionBC,
    args: Vec<Value>,
    globals: &mut Vec<Value>,
) -> Result<Value, RuntimeError> {
    let mut locals: Vec<Value> = vec![Value::Null; func.local_count];
    for (slot, arg) in locals.iter_mut().zip(args) {
        *slot = arg;
    }
    let mut stack: Vec<Value> = Vec::new();
    let mut ip: usize = 0;

    loop {
        let instr = &func.instructions[ip];
        match instr.op {
            Opcode::Const => {
                stack.push(literal_to_value(&instr.args[0]));
                ip += 1;
            }
            Opcode::ConstNull => {
                stack.push(Value::Null);
                ip += 1;
            }
            Opcode::Load => {
                stack.push(locals[instr.int_arg(0) as usize].clone());
                ip += 1;
            }
            Opcode::Store => {
                let v = pop_stack(&mut stack);
                locals[instr.int_arg(0) as usize] = v;
                ip += 1;
            }
            Opcode::GLoad => {
                stack.push(globals[instr.int_arg(0) as usize].clone());
                ip += 1;
            }
            Opcode::GStore => {
                let v = pop_stack(&mut stack);
                globals[instr.int_arg(0) as usize] = v;
                ip += 1;
            }
            Opcode::Pop => {
                pop_stack(&mut stack);
                ip += 1;
            }
            Opcode::Add => {
                let b = pop_stack(&mut stack);
                let a = pop_stack(&mut stack);
                stack.push(add(a, b)?);
                ip += 1;
            }
            Opcode::Sub => {
                let b = pop_stack(&mut stack);
                let a = pop_stack(&mut stack);
                stack.push(numeric_binop("sub", a, b, |x, y| Some(x.wrapping_sub(y)), |x, y| x - y)?);
                ip += 1;
            }
            Opcode::Mul => {
                let b = pop_stack(&mut stack);
                let a = pop_stack(&mut stack);
                stack.push(numeric_binop("mul", a, b, |x, y| Some(x.wrapping_mul(y)), |x, y| x * y)?);
                ip += 1;
            }
            Opcode::Div => {
                let b = pop_stack(&mut stack);
                let a = pop_stack(&mut stack);
                stack.push(numeric_binop(
                    "div",
                    a,
                    b,
                    |x, y| if y == 0 { None } else { Some(x / y) },
                    |x, y| x / y,
                )?);
                ip += 1;
            }
            Opcode::Mod => {
                let b = pop_stack(&mut stack);
                let a = pop_stack(&mut stack);
                stack.push(numeric_binop(
                    "mod",
                    a,
                    b,
                    |x, y| if y == 0 { None } else { Some(x % y) },
                    |x, y| x % y,
                )?);
                ip += 1;
            }
            Opcode::Neg => {
                let a = pop_stack(&mut stack);
                stack.push(match a {
                    Value::Int(i) => Value::Int(-i),
                    Value::Float(f) => Value::Float(-f),
                    other => return Err(RuntimeError::other(format!("cannot negate a {}", type_name(&other)))),
                });
                ip += 1;
            }
            Opcode::Not => {
                let a = pop_stack(&mut stack);
                stack.push(Value::Bool(!is_truthy(&a)));
                ip += 1;
            }
            Opcode::And => {
                let b = pop_stack(&mut stack);
                let a = pop_stack(&mut stack);
                stack.push(Value::Bool(is_truthy(&a) && is_truthy(&b)));
                ip += 1;
            }
            Opcode::Or => {
                let b = pop_stack(&mut stack);
                let a = pop_stack(&mut stack);
                stack.push(Value::Bool(is_truthy(&a) || is_truthy(&b)));
                ip += 1;
            }
            Opcode::Eq => {
                let b = pop_stack(&mut stack);
                let a = pop_stack(&mut stack);
                stack.push(Value::Bool(values_equal(&a, &b)));
                ip += 1;
            }
            Opcode::Ne => {
                let b = pop_stack(&mut stack);
                let a = pop_stack(&mut stack);
                stack.push(Value::Bool(!values_equal(&a, &b)));
                ip += 1;
            }
            Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge => {
                let b = pop_stack(&mut stack);
                let a = pop_stack(&mut stack);
                let ordering = compare_values(&a, &b)
                    .ok_or_else(|| RuntimeError::other(format!("cannot compare {} and {}", type_name(&a), type_name(&b))))?;
                let result = match instr.op {
                    Opcode::Lt => ordering.is_lt(),
                    Opcode::Le => ordering.is_le(),
                    Opcode::Gt => ordering.is_gt(),
                    Opcode::Ge => ordering.is_ge(),
                    _ => unreachable!(),
                };
                stack.push(Value::Bool(result));
                ip += 1;
            }
            Opcode::Jmp => {
                ip = instr.int_arg(0) as usize;
            }
            Opcode::JmpFalse => {
                let cond = pop_stack(&mut stack);
                if is_truthy(&cond) {
                    ip += 1;
                } else {
                    ip = instr.int_arg(0) as usize;
                }
            }
            Opcode::Call => {
                let name = instr.str_arg(0).to_string();
                let argc = instr.int_arg(1) as usize;
                let mut call_args = Vec::with_capacity(argc);
                for _ in 0..argc {
                    call_args.push(pop_stack(&mut stack));
                }
                call_args.reverse();
                let result = call_named(program, &name, call_args, globals)?;
                stack.push(result);
                ip += 1;
            }
            Opcode::Ret => {
                return Ok(pop_stack(&mut stack));
            }
            Opcode::MakeList => {
                let n = instr.int_arg(0) as usize;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(pop_stack(&mut stack));
                }
                items.reverse();
                stack.push(Value::list(items));
                ip += 1;
            }
            Opcode::MakeDict => {
                let n = instr.int_arg(0) as usize;
                let mut pairs = Vec::with_capacity(n);
                for _ in 0..n {
                    let v = pop_stack(&mut stack);
                    let k = pop_stack(&mut stack);
                    pairs.push((k, v));
                }
                pairs.reverse();
                stack.push(Value::dict(pairs));
                ip += 1;
            }
            Opcode::IndexGet => {
                let index = pop_stack(&mut stack);
                let container = pop_stack(&mut stack);
                stack.push(index_get(&container, &index)?);
                ip += 1;
            }
            Opcode::IndexSet => {
                let index = pop_stack(&mut stack);
                let container = pop_stack(&mut stack);
                let value = pop_stack(&mut stack);
                index_set(&container, &index, value)?;
                ip += 1;
            }
            Opcode::Len => {
                let v = pop_stack(&mut stack);
                stack.push(Value::Int(len_of(&v)? as i64));
                ip += 1;
            }
            Opcode::Halt => {
                // Open question resolution (spec §9, DESIGN.md): HALT just
                // returns null from the current frame. For `__entry__` that
                // frame IS the whole program, so this is what stops it; for a
                // user function it behaves exactly like `RET null`.
                return Ok(Value::Null);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yasnc::build;
    use std::io::Write;

    fn run_source(src: &str) -> Result<Value, RuntimeError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.yasn");
        std::fs::File::create(&path).unwrap().write_all(src.as_bytes()).unwrap();
        let program = build(&path).expect("compiles");
        let mut vm = Vm::new(Arc::new(program));
        vm.run()
    }

    fn build_vm(src: &str) -> Vm {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.yasn");
        std::fs::File::create(&path).unwrap().write_all(src.as_bytes()).unwrap();
        let program = build(&path).expect("compiles");
        Vm::new(Arc::new(program))
    }

    #[test]
    fn arithmetic_promotes_to_float() {
        let mut vm = build_vm("function calc() -> float:\n  return 1.0 / 2\n");
        let result = vm.call_function("calc", vec![], false).unwrap();
        assert!(matches!(result, Value::Float(f) if (f - 0.5).abs() < 1e-9));
    }

    #[test]
    fn integer_division_truncates_toward_zero() {
        let mut vm = build_vm("function calc() -> int:\n  return 1 / 2\n");
        let result = vm.call_function("calc", vec![], false).unwrap();
        assert!(matches!(result, Value::Int(0)));
    }

    #[test]
    fn list_index_assignment_mutates_the_aliased_list() {
        let mut vm = build_vm(
            "function calc() -> int:\n  let xs: List[int] = [1, 2, 3]\n  xs[0] = 9\n  return xs[0]\n",
        );
        let result = vm.call_function("calc", vec![], false).unwrap();
        assert!(matches!(result, Value::Int(9)));
    }

    #[test]
    fn empty_program_runs_to_completion() {
        assert!(run_source("").is_ok());
    }
}
