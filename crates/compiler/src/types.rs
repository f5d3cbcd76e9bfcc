//! The structural type system (spec §3, §4.4).
//!
//! `TypeNode` values are canonicalized on construction so structural equality
//! (`==`) is always the right notion of "same type": union variants are
//! flattened, deduplicated, and a singleton union collapses to its one
//! member.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeNode {
    Primitive(Primitive),
    List(Box<TypeNode>),
    Dict(Box<TypeNode>, Box<TypeNode>),
    Union(Vec<TypeNode>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Float,
    Str,
    Bool,
    Null,
    Any,
}

impl TypeNode {
    pub fn int() -> TypeNode {
        TypeNode::Primitive(Primitive::Int)
    }
    pub fn float() -> TypeNode {
        TypeNode::Primitive(Primitive::Float)
    }
    pub fn str() -> TypeNode {
        TypeNode::Primitive(Primitive::Str)
    }
    pub fn bool() -> TypeNode {
        TypeNode::Primitive(Primitive::Bool)
    }
    pub fn null() -> TypeNode {
        TypeNode::Primitive(Primitive::Null)
    }
    pub fn any() -> TypeNode {
        TypeNode::Primitive(Primitive::Any)
    }

    pub fn list(elem: TypeNode) -> TypeNode {
        TypeNode::List(Box::new(elem))
    }

    pub fn dict(key: TypeNode, value: TypeNode) -> TypeNode {
        TypeNode::Dict(Box::new(key), Box::new(value))
    }

    /// Builds a union, flattening nested unions, deduplicating structurally
    /// equal variants, and collapsing a singleton result to its one member.
    pub fn union(variants: Vec<TypeNode>) -> TypeNode {
        let mut flat = Vec::new();
        flatten_into(variants, &mut flat);
        let mut deduped: Vec<TypeNode> = Vec::new();
        for v in flat {
            if !deduped.contains(&v) {
                deduped.push(v);
            }
        }
        if deduped.len() == 1 {
            deduped.into_iter().next().unwrap()
        } else {
            TypeNode::Union(deduped)
        }
    }

    /// The assignability relation used for `let`/parameter/return checks:
    /// can a value of type `self` be used where `target` is expected?
    pub fn assignable_to(&self, target: &TypeNode) -> bool {
        if matches!(target, TypeNode::Primitive(Primitive::Any)) {
            return true;
        }
        if self == target {
            return true;
        }
        match (self, target) {
            (TypeNode::Primitive(Primitive::Int), TypeNode::Primitive(Primitive::Float)) => true,
            (TypeNode::Union(variants), _) => variants.iter().all(|v| v.assignable_to(target)),
            (_, TypeNode::Union(variants)) => variants.iter().any(|v| self.assignable_to(v)),
            (TypeNode::List(a), TypeNode::List(b)) => a.assignable_to(b),
            (TypeNode::Dict(ak, av), TypeNode::Dict(bk, bv)) => {
                ak.assignable_to(bk) && av.assignable_to(bv)
            }
            _ => false,
        }
    }

    pub fn display(&self) -> String {
        match self {
            TypeNode::Primitive(Primitive::Int) => "int".to_string(),
            TypeNode::Primitive(Primitive::Float) => "float".to_string(),
            TypeNode::Primitive(Primitive::Str) => "string".to_string(),
            TypeNode::Primitive(Primitive::Bool) => "bool".to_string(),
            TypeNode::Primitive(Primitive::Null) => "null".to_string(),
            TypeNode::Primitive(Primitive::Any) => "any".to_string(),
            TypeNode::List(elem) => format!("list[{}]", elem.display()),
            TypeNode::Dict(k, v) => format!("dict[{}, {}]", k.display(), v.display()),
            TypeNode::Union(variants) => variants
                .iter()
                .map(|v| v.display())
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

fn flatten_into(variants: Vec<TypeNode>, out: &mut Vec<TypeNode>) {
    for v in variants {
        match v {
            TypeNode::Union(inner) => flatten_into(inner, out),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_flattens_nested() {
        let t = TypeNode::union(vec![
            TypeNode::int(),
            TypeNode::union(vec![TypeNode::str(), TypeNode::int()]),
        ]);
        assert_eq!(t, TypeNode::union(vec![TypeNode::int(), TypeNode::str()]));
    }

    #[test]
    fn singleton_union_collapses() {
        let t = TypeNode::union(vec![TypeNode::int(), TypeNode::int()]);
        assert_eq!(t, TypeNode::int());
    }

    #[test]
    fn int_assignable_to_float() {
        assert!(TypeNode::int().assignable_to(&TypeNode::float()));
        assert!(!TypeNode::float().assignable_to(&TypeNode::int()));
    }

    #[test]
    fn anything_assignable_to_any() {
        assert!(TypeNode::list(TypeNode::str()).assignable_to(&TypeNode::any()));
    }

    #[test]
    fn union_member_assignable_to_whole_union() {
        let u = TypeNode::union(vec![TypeNode::int(), TypeNode::str()]);
        assert!(TypeNode::int().assignable_to(&u));
        assert!(!TypeNode::bool().assignable_to(&u));
    }

    #[test]
    fn union_assignable_only_if_all_members_assignable() {
        let u = TypeNode::union(vec![TypeNode::int(), TypeNode::str()]);
        assert!(!u.assignable_to(&TypeNode::int()));
        let u2 = TypeNode::union(vec![TypeNode::int(), TypeNode::float()]);
        assert!(u2.assignable_to(&TypeNode::float()));
    }
}
