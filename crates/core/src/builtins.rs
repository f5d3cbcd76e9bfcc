//! The canonical builtin-function catalogue (spec §4.4, §4.6).
//!
//! Both the type checker (`yasn-compiler::typechecker`, which additionally
//! pins a `TypeNode` to every parameter) and the VM (`yasn-runtime::builtins`,
//! which implements the behavior) look up names and arities here so the two
//! lists of "what a builtin is called and how many arguments it takes"
//! cannot drift apart — the exact reflective name→function lookup the
//! design notes call out, kept as shared data rather than duplicated in two
//! places.

/// Name and argument-count range for one builtin. `max_args` is `None` for
/// the one genuinely variadic builtin (`spawn`, whose argument count is the
/// callee's arity plus one for the callee name itself).
#[derive(Debug, Clone, Copy)]
pub struct BuiltinSig {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
}

const fn fixed(name: &'static str, n: usize) -> BuiltinSig {
    BuiltinSig {
        name,
        min_args: n,
        max_args: Some(n),
    }
}

const fn range(name: &'static str, min: usize, max: usize) -> BuiltinSig {
    BuiltinSig {
        name,
        min_args: min,
        max_args: Some(max),
    }
}

const fn variadic(name: &'static str, min: usize) -> BuiltinSig {
    BuiltinSig {
        name,
        min_args: min,
        max_args: None,
    }
}

pub static BUILTINS: &[BuiltinSig] = &[
    fixed("print", 1),
    fixed("length", 1),
    fixed("range", 1),
    fixed("input", 0),
    fixed("sleep", 1),
    fixed("to_string", 1),
    fixed("parse_int", 1),
    fixed("list_append", 2),
    fixed("list_remove", 2),
    fixed("dict_keys", 1),
    fixed("dict_contains", 2),
    fixed("file_read", 1),
    fixed("file_write", 2),
    fixed("file_exists", 1),
    fixed("file_delete", 1),
    fixed("json_parse", 1),
    fixed("json_stringify", 1),
    fixed("http_get", 1),
    fixed("http_post", 2),
    fixed("clock_ms", 0),
    fixed("random_int", 2),
    range("assert", 1, 2),
    range("assert_equal", 2, 3),
    fixed("fail", 1),
    variadic("spawn", 1),
    fixed("done", 1),
    range("wait", 1, 2),
    range("wait_all", 1, 2),
    fixed("cancel", 1),
];

pub fn lookup(name: &str) -> Option<&'static BuiltinSig> {
    BUILTINS.iter().find(|b| b.name == name)
}

pub fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

impl BuiltinSig {
    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.min_args && self.max_args.map(|max| argc <= max).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_is_unique() {
        let mut names: Vec<&str> = BUILTINS.iter().map(|b| b.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len(), "duplicate builtin name in catalogue");
    }

    #[test]
    fn spawn_is_variadic_with_at_least_the_callee_name() {
        let spawn = lookup("spawn").unwrap();
        assert!(spawn.accepts(1));
        assert!(spawn.accepts(10));
        assert!(!spawn.accepts(0));
    }

    #[test]
    fn print_takes_exactly_one() {
        let print = lookup("print").unwrap();
        assert!(print.accepts(1));
        assert!(!print.accepts(0));
        assert!(!print.accepts(2));
    }
}
