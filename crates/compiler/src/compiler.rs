//! Bytecode compiler: lowers a type-checked [`Module`] to [`ProgramBC`] (spec §4.5).

use std::collections::HashMap;

use yasn_core::{FunctionBC, Instruction, Literal as BcLiteral, Opcode, ProgramBC, ENTRY_NAME};

use crate::ast::{AssignTarget, BinOp, Expr, FunctionDecl, Literal, Module, Stmt, UnOp};

struct LoopLabels {
    /// Addresses of `Jmp 0` placeholders emitted for `continue`, patched once
    /// the loop's continue-target (condition re-test for `while`, the
    /// increment step for `for`) is known.
    continue_jumps: Vec<usize>,
    break_jumps: Vec<usize>,
}

struct FnCompiler {
    instructions: Vec<Instruction>,
    locals: HashMap<String, usize>,
    next_local: usize,
    loops: Vec<LoopLabels>,
}

impl FnCompiler {
    fn new() -> Self {
        FnCompiler {
            instructions: Vec::new(),
            locals: HashMap::new(),
            next_local: 0,
            loops: Vec::new(),
        }
    }

    fn declare_local(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.locals.get(name) {
            return slot;
        }
        let slot = self.next_local;
        self.next_local += 1;
        self.locals.insert(name.to_string(), slot);
        slot
    }

    fn alloc_hidden_local(&mut self) -> usize {
        let slot = self.next_local;
        self.next_local += 1;
        slot
    }

    fn emit(&mut self, op: Opcode, args: Vec<BcLiteral>) -> usize {
        self.instructions.push(Instruction { op, args });
        self.instructions.len() - 1
    }

    fn emit_simple(&mut self, op: Opcode) -> usize {
        self.emit(op, Vec::new())
    }

    fn here(&self) -> usize {
        self.instructions.len()
    }

    fn patch_jump_target(&mut self, at: usize, target: usize) {
        self.instructions[at].args = vec![BcLiteral::Int(target as i64)];
    }
}

/// Compiles a global-slot allocator shared by entry-statement lowering.
struct ProgramCompiler<'a> {
    globals: HashMap<String, usize>,
    next_global: usize,
    functions: &'a HashMap<String, &'a FunctionDecl>,
}

impl<'a> ProgramCompiler<'a> {
    fn allocate_global(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.globals.get(name) {
            return slot;
        }
        let slot = self.next_global;
        self.next_global += 1;
        self.globals.insert(name.to_string(), slot);
        slot
    }
}

enum NameKind {
    Local(usize),
    Global(usize),
}

fn resolve_name(
    fc: &FnCompiler,
    pc: &ProgramCompiler,
    name: &str,
) -> NameKind {
    if let Some(&slot) = fc.locals.get(name) {
        NameKind::Local(slot)
    } else if let Some(&slot) = pc.globals.get(name) {
        NameKind::Global(slot)
    } else {
        // A reference to a name that exists only as a function; CALL
        // resolves those by name directly and never reaches here.
        NameKind::Global(0)
    }
}

fn compile_literal(lit: &Literal) -> BcLiteral {
    match lit {
        Literal::Null => BcLiteral::Null,
        Literal::Bool(b) => BcLiteral::Bool(*b),
        Literal::Int(n) => BcLiteral::Int(*n),
        Literal::Float(f) => BcLiteral::Float(*f),
        Literal::Str(s) => BcLiteral::Str(s.clone()),
    }
}

fn compile_expr(expr: &Expr, fc: &mut FnCompiler, pc: &mut ProgramCompiler) {
    match expr {
        Expr::Literal { value, .. } => {
            if matches!(value, Literal::Null) {
                fc.emit_simple(Opcode::ConstNull);
            } else {
                fc.emit(Opcode::Const, vec![compile_literal(value)]);
            }
        }
        Expr::Ident { name, .. } => match resolve_name(fc, pc, name) {
            NameKind::Local(slot) => {
                fc.emit(Opcode::Load, vec![BcLiteral::Int(slot as i64)]);
            }
            NameKind::Global(slot) => {
                fc.emit(Opcode::GLoad, vec![BcLiteral::Int(slot as i64)]);
            }
        },
        Expr::ListLit { items, .. } => {
            for item in items {
                compile_expr(item, fc, pc);
            }
            fc.emit(Opcode::MakeList, vec![BcLiteral::Int(items.len() as i64)]);
        }
        Expr::DictLit { entries, .. } => {
            for (k, v) in entries {
                compile_expr(k, fc, pc);
                compile_expr(v, fc, pc);
            }
            fc.emit(Opcode::MakeDict, vec![BcLiteral::Int(entries.len() as i64)]);
        }
        Expr::Index { target, index, .. } => {
            compile_expr(target, fc, pc);
            compile_expr(index, fc, pc);
            fc.emit_simple(Opcode::IndexGet);
        }
        Expr::Member { target, name, .. } => {
            compile_expr(target, fc, pc);
            fc.emit(Opcode::Const, vec![BcLiteral::Str(name.clone())]);
            fc.emit_simple(Opcode::IndexGet);
        }
        Expr::Unary { op, operand, .. } => {
            compile_expr(operand, fc, pc);
            match op {
                UnOp::Neg => fc.emit_simple(Opcode::Neg),
                UnOp::Not => fc.emit_simple(Opcode::Not),
            };
        }
        Expr::Await { operand, .. } => {
            compile_expr(operand, fc, pc);
            fc.emit(Opcode::Call, vec![BcLiteral::Str("wait".to_string()), BcLiteral::Int(1)]);
        }
        Expr::Binary { op, left, right, .. } => compile_binary(*op, left, right, fc, pc),
        Expr::Call { callee, args, .. } => compile_call(callee, args, fc, pc),
    }
}

fn compile_binary(op: BinOp, left: &Expr, right: &Expr, fc: &mut FnCompiler, pc: &mut ProgramCompiler) {
    match op {
        BinOp::And => {
            compile_expr(left, fc, pc);
            let jfalse = fc.emit(Opcode::JmpFalse, vec![BcLiteral::Int(0)]);
            compile_expr(right, fc, pc);
            let jend = fc.emit(Opcode::Jmp, vec![BcLiteral::Int(0)]);
            let else_label = fc.here();
            fc.emit(Opcode::Const, vec![BcLiteral::Bool(false)]);
            let end = fc.here();
            fc.patch_jump_target(jfalse, else_label);
            fc.patch_jump_target(jend, end);
        }
        BinOp::Or => {
            compile_expr(left, fc, pc);
            let jfalse = fc.emit(Opcode::JmpFalse, vec![BcLiteral::Int(0)]);
            fc.emit(Opcode::Const, vec![BcLiteral::Bool(true)]);
            let jend = fc.emit(Opcode::Jmp, vec![BcLiteral::Int(0)]);
            let else_label = fc.here();
            fc.patch_jump_target(jfalse, else_label);
            compile_expr(right, fc, pc);
            let end = fc.here();
            fc.patch_jump_target(jend, end);
        }
        _ => {
            compile_expr(left, fc, pc);
            compile_expr(right, fc, pc);
            let opcode = match op {
                BinOp::Add => Opcode::Add,
                BinOp::Sub => Opcode::Sub,
                BinOp::Mul => Opcode::Mul,
                BinOp::Div => Opcode::Div,
                BinOp::Mod => Opcode::Mod,
                BinOp::Eq => Opcode::Eq,
                BinOp::Ne => Opcode::Ne,
                BinOp::Lt => Opcode::Lt,
                BinOp::Le => Opcode::Le,
                BinOp::Gt => Opcode::Gt,
                BinOp::Ge => Opcode::Ge,
                BinOp::And | BinOp::Or => unreachable!("handled above"),
            };
            fc.emit_simple(opcode);
        }
    }
}

fn compile_call(callee: &Expr, args: &[Expr], fc: &mut FnCompiler, pc: &mut ProgramCompiler) {
    let Expr::Ident { name, .. } = callee else {
        unreachable!("type checker rejects non-identifier call targets");
    };
    if let Some(decl) = pc.functions.get(name) {
        if decl.is_async {
            fc.emit(Opcode::Const, vec![BcLiteral::Str(name.clone())]);
            for a in args {
                compile_expr(a, fc, pc);
            }
            fc.emit(
                Opcode::Call,
                vec![BcLiteral::Str("spawn".to_string()), BcLiteral::Int(args.len() as i64 + 1)],
            );
            return;
        }
    }
    for a in args {
        compile_expr(a, fc, pc);
    }
    fc.emit(
        Opcode::Call,
        vec![BcLiteral::Str(name.clone()), BcLiteral::Int(args.len() as i64)],
    );
}

fn compile_stmt(stmt: &Stmt, fc: &mut FnCompiler, pc: &mut ProgramCompiler, at_top_level: bool) {
    match stmt {
        Stmt::Let { name, value, .. } => {
            compile_expr(value, fc, pc);
            if at_top_level {
                let slot = pc.allocate_global(name);
                fc.emit(Opcode::GStore, vec![BcLiteral::Int(slot as i64)]);
            } else {
                let slot = fc.declare_local(name);
                fc.emit(Opcode::Store, vec![BcLiteral::Int(slot as i64)]);
            }
        }
        Stmt::Assign { target, value, .. } => {
            compile_expr(value, fc, pc);
            match target {
                AssignTarget::Name(name) => match resolve_name(fc, pc, name) {
                    NameKind::Local(slot) => {
                        fc.emit(Opcode::Store, vec![BcLiteral::Int(slot as i64)]);
                    }
                    NameKind::Global(slot) => {
                        fc.emit(Opcode::GStore, vec![BcLiteral::Int(slot as i64)]);
                    }
                },
                AssignTarget::Index { target, index } => {
                    compile_expr(target, fc, pc);
                    compile_expr(index, fc, pc);
                    fc.emit_simple(Opcode::IndexSet);
                }
            }
        }
        Stmt::Function(_) => {
            // Functions are compiled separately into the function table.
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            compile_expr(cond, fc, pc);
            let jfalse = fc.emit(Opcode::JmpFalse, vec![BcLiteral::Int(0)]);
            for s in then_branch {
                compile_stmt(s, fc, pc, at_top_level);
            }
            let jend = fc.emit(Opcode::Jmp, vec![BcLiteral::Int(0)]);
            let else_label = fc.here();
            fc.patch_jump_target(jfalse, else_label);
            if let Some(else_branch) = else_branch {
                for s in else_branch {
                    compile_stmt(s, fc, pc, at_top_level);
                }
            }
            let end = fc.here();
            fc.patch_jump_target(jend, end);
        }
        Stmt::While { cond, body, .. } => {
            let loop_start = fc.here();
            compile_expr(cond, fc, pc);
            let jend = fc.emit(Opcode::JmpFalse, vec![BcLiteral::Int(0)]);
            fc.loops.push(LoopLabels {
                continue_jumps: Vec::new(),
                break_jumps: Vec::new(),
            });
            for s in body {
                compile_stmt(s, fc, pc, at_top_level);
            }
            fc.emit(Opcode::Jmp, vec![BcLiteral::Int(loop_start as i64)]);
            let end = fc.here();
            fc.patch_jump_target(jend, end);
            let frame = fc.loops.pop().unwrap();
            for at in frame.continue_jumps {
                fc.patch_jump_target(at, loop_start);
            }
            for at in frame.break_jumps {
                fc.patch_jump_target(at, end);
            }
        }
        Stmt::For { var, iterable, body, .. } => {
            compile_expr(iterable, fc, pc);
            let iter_slot = fc.alloc_hidden_local();
            fc.emit(Opcode::Store, vec![BcLiteral::Int(iter_slot as i64)]);
            fc.emit(Opcode::Load, vec![BcLiteral::Int(iter_slot as i64)]);
            fc.emit_simple(Opcode::Len);
            let len_slot = fc.alloc_hidden_local();
            fc.emit(Opcode::Store, vec![BcLiteral::Int(len_slot as i64)]);
            fc.emit(Opcode::Const, vec![BcLiteral::Int(0)]);
            let index_slot = fc.alloc_hidden_local();
            fc.emit(Opcode::Store, vec![BcLiteral::Int(index_slot as i64)]);

            let loop_start = fc.here();
            fc.emit(Opcode::Load, vec![BcLiteral::Int(index_slot as i64)]);
            fc.emit(Opcode::Load, vec![BcLiteral::Int(len_slot as i64)]);
            fc.emit_simple(Opcode::Lt);
            let jend = fc.emit(Opcode::JmpFalse, vec![BcLiteral::Int(0)]);

            fc.emit(Opcode::Load, vec![BcLiteral::Int(iter_slot as i64)]);
            fc.emit(Opcode::Load, vec![BcLiteral::Int(index_slot as i64)]);
            fc.emit_simple(Opcode::IndexGet);
            let var_slot = fc.declare_local(var);
            fc.emit(Opcode::Store, vec![BcLiteral::Int(var_slot as i64)]);

            fc.loops.push(LoopLabels {
                continue_jumps: Vec::new(),
                break_jumps: Vec::new(),
            });
            for s in body {
                compile_stmt(s, fc, pc, at_top_level);
            }
            let tail_target = fc.here();
            fc.emit(Opcode::Load, vec![BcLiteral::Int(index_slot as i64)]);
            fc.emit(Opcode::Const, vec![BcLiteral::Int(1)]);
            fc.emit_simple(Opcode::Add);
            fc.emit(Opcode::Store, vec![BcLiteral::Int(index_slot as i64)]);
            fc.emit(Opcode::Jmp, vec![BcLiteral::Int(loop_start as i64)]);
            let end = fc.here();
            fc.patch_jump_target(jend, end);

            let frame = fc.loops.pop().unwrap();
            for at in frame.continue_jumps {
                fc.patch_jump_target(at, tail_target);
            }
            for at in frame.break_jumps {
                fc.patch_jump_target(at, end);
            }
        }
        Stmt::Return { value, .. } => {
            match value {
                Some(e) => compile_expr(e, fc, pc),
                None => {
                    fc.emit_simple(Opcode::ConstNull);
                }
            }
            fc.emit_simple(Opcode::Ret);
        }
        Stmt::Break { .. } => {
            let at = fc.emit(Opcode::Jmp, vec![BcLiteral::Int(0)]);
            fc.loops.last_mut().expect("type checker enforces loop context").break_jumps.push(at);
        }
        Stmt::Continue { .. } => {
            let at = fc.emit(Opcode::Jmp, vec![BcLiteral::Int(0)]);
            fc.loops
                .last_mut()
                .expect("type checker enforces loop context")
                .continue_jumps
                .push(at);
        }
        Stmt::Import { .. } => {}
        Stmt::ExprStmt { expr, .. } => {
            compile_expr(expr, fc, pc);
            fc.emit_simple(Opcode::Pop);
        }
    }
}

fn finish_user_function(fc: &mut FnCompiler) {
    let ends_properly = matches!(
        fc.instructions.last().map(|i| i.op),
        Some(Opcode::Ret) | Some(Opcode::Halt)
    );
    if !ends_properly {
        fc.emit_simple(Opcode::ConstNull);
        fc.emit_simple(Opcode::Ret);
    }
}

fn compile_function(decl: &FunctionDecl, pc: &mut ProgramCompiler) -> FunctionBC {
    let mut fc = FnCompiler::new();
    for p in &decl.params {
        fc.declare_local(&p.name);
    }
    for s in &decl.body {
        compile_stmt(s, &mut fc, pc, false);
    }
    finish_user_function(&mut fc);
    FunctionBC {
        name: decl.name.clone(),
        params: decl.params.iter().map(|p| p.name.clone()).collect(),
        local_count: fc.next_local,
        instructions: fc.instructions,
    }
}

/// Compiles a type-checked [`Module`] into [`ProgramBC`].
pub fn compile(module: &Module) -> ProgramBC {
    let decls: HashMap<String, &FunctionDecl> = module
        .statements
        .iter()
        .filter_map(|s| match s {
            Stmt::Function(f) => Some((f.name.clone(), f)),
            _ => None,
        })
        .collect();

    let mut pc = ProgramCompiler {
        globals: HashMap::new(),
        next_global: 0,
        functions: &decls,
    };

    for stmt in &module.statements {
        if let Stmt::Let { name, .. } = stmt {
            pc.allocate_global(name);
        }
    }

    let mut functions = Vec::new();
    for stmt in &module.statements {
        if let Stmt::Function(f) = stmt {
            let compiled = compile_function(f, &mut pc);
            functions.push((f.name.clone(), compiled));
        }
    }

    let mut entry_fc = FnCompiler::new();
    for stmt in &module.statements {
        if !matches!(stmt, Stmt::Function(_)) {
            compile_stmt(stmt, &mut entry_fc, &mut pc, true);
        }
    }
    if decls.contains_key("main") {
        let main_decl = decls["main"];
        entry_fc.emit(Opcode::Call, vec![BcLiteral::Str("main".to_string()), BcLiteral::Int(0)]);
        if main_decl.is_async {
            entry_fc.emit(Opcode::Call, vec![BcLiteral::Str("wait".to_string()), BcLiteral::Int(1)]);
        }
        entry_fc.emit_simple(Opcode::Pop);
    }
    entry_fc.emit_simple(Opcode::Halt);

    let entry = FunctionBC {
        name: ENTRY_NAME.to_string(),
        params: Vec::new(),
        local_count: entry_fc.next_local,
        instructions: entry_fc.instructions,
    };

    ProgramBC {
        functions,
        entry,
        global_count: pc.next_global,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn compile_src(src: &str) -> ProgramBC {
        let module = parse(tokenize(src).unwrap()).unwrap();
        compile(&module)
    }

    #[test]
    fn empty_source_is_halt_only() {
        let program = compile_src("");
        assert_eq!(program.entry.instructions.len(), 1);
        assert_eq!(program.entry.instructions[0].op, Opcode::Halt);
    }

    #[test]
    fn entry_dispatches_to_main() {
        let program = compile_src("function main() -> null:\n  print(\"hi\")\n");
        let calls_main = program
            .entry
            .instructions
            .iter()
            .any(|i| i.op == Opcode::Call && i.str_arg(0) == "main");
        assert!(calls_main);
        assert_eq!(program.entry.instructions.last().unwrap().op, Opcode::Halt);
    }

    #[test]
    fn user_function_gets_implicit_return() {
        let program = compile_src("function f() -> null:\n  let x = 1\n");
        let f = program.find_function("f").unwrap();
        assert_eq!(f.instructions.last().unwrap().op, Opcode::Ret);
    }

    #[test]
    fn invariants_hold() {
        let program = compile_src(
            "let total: int = 0\nfunction main() -> null:\n  let xs: List[int] = [1,2,3]\n  for x in xs:\n    print(x)\n",
        );
        program.check_invariants().unwrap();
    }

    #[test]
    fn async_call_lowers_to_spawn_and_wait() {
        let program = compile_src(
            "async function slow(n: int) -> int:\n  return n\nfunction main() -> null:\n  let t = slow(1)\n  print(wait(t))\n",
        );
        let main_fn = program.find_function("main").unwrap();
        let has_spawn = main_fn
            .instructions
            .iter()
            .any(|i| i.op == Opcode::Call && i.str_arg(0) == "spawn");
        let has_wait = main_fn
            .instructions
            .iter()
            .any(|i| i.op == Opcode::Call && i.str_arg(0) == "wait");
        assert!(has_spawn);
        assert!(has_wait);
    }
}
