use std::{collections::BTreeMap, rc::Rc};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{ClassDecl, FunctionDecl, Method, Visibility};

use super::{ExecutionErrorKind, Value};

pub struct Instance {
    pub class_name: String,
    pub private_methods: FxHashSet<String>,
    pub methods: Vec<Rc<FunctionDecl>>,
    pub fields: BTreeMap<String, Value>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class_name)
            .field(
                "methods",
                &self.methods.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            )
            .field("fields", &self.fields)
            .finish()
    }
}

impl Instance {
    pub fn new(class_name: String, methods: Vec<Method>) -> Self {
        let private_methods = methods
            .iter()
            .filter(|method| method.visibility == Visibility::Private)
            .map(|method| method.function.name.clone())
            .collect();

        Self {
            class_name,
            private_methods,
            methods: methods.into_iter().map(|method| method.function).collect(),
            fields: BTreeMap::new(),
        }
    }

    pub fn find_method(&self, name: &str) -> Option<&Rc<FunctionDecl>> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn is_private(&self, name: &str) -> bool {
        self.private_methods.contains(name)
    }
}

/// Effective method list of `class_name`: the superclass's resolved list
/// with this class's methods overriding same-named entries in place and
/// new ones appended. An unknown superclass contributes nothing.
pub fn resolve_methods(
    classes: &FxHashMap<String, Rc<ClassDecl>>,
    class_name: &str,
) -> Result<Vec<Method>, ExecutionErrorKind> {
    let mut chain = Vec::new();
    let mut seen = FxHashSet::default();
    let mut next = Some(class_name);

    while let Some(name) = next {
        let Some(class) = classes.get(name) else {
            break;
        };
        if !seen.insert(name) {
            return Err(ExecutionErrorKind::InheritanceCycle(class_name.to_string()));
        }
        chain.push(class);
        next = class.superclass.as_deref();
    }

    let mut methods: Vec<Method> = Vec::new();
    for class in chain.iter().rev() {
        for method in &class.methods {
            match methods
                .iter_mut()
                .find(|existing| existing.function.name == method.function.name)
            {
                Some(existing) => *existing = method.clone(),
                None => methods.push(method.clone()),
            }
        }
    }

    Ok(methods)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ast::StatementKind, parser, tokenizer};

    fn classes(source: &str) -> FxHashMap<String, Rc<ClassDecl>> {
        let program = parser::program(&tokenizer::tokens(source).unwrap()).unwrap();
        program
            .0
            .into_iter()
            .filter_map(|stmt| match stmt.kind {
                StatementKind::ClassDeclaration(class) => Some((class.name.clone(), class)),
                _ => None,
            })
            .collect()
    }

    fn names(methods: &[Method]) -> Vec<(&str, usize)> {
        methods
            .iter()
            .map(|m| (m.function.name.as_str(), m.function.span.start_line))
            .collect()
    }

    #[test]
    fn test_overrides_keep_inherited_position() {
        let classes = classes(
            "classe A {\n fonction f() { renvoie 1 }\n fonction g() { renvoie 2 }\n}\n\
             classe B herite de A {\n fonction h() { renvoie 3 }\n fonction f() { renvoie 4 }\n}",
        );
        let methods = resolve_methods(&classes, "B").unwrap();
        assert_eq!(names(&methods), vec![("f", 7), ("g", 3), ("h", 6)]);
    }

    #[test]
    fn test_unknown_superclass_contributes_nothing() {
        let classes = classes("classe B herite de Inconnue { fonction f() { renvoie 1 } }");
        let methods = resolve_methods(&classes, "B").unwrap();
        assert_eq!(methods.len(), 1);
    }

    #[test]
    fn test_cyclic_hierarchy_is_rejected() {
        let classes = classes(
            "classe A herite de B { fonction f() { renvoie 1 } }\n\
             classe B herite de A { fonction g() { renvoie 2 } }",
        );
        assert!(matches!(
            resolve_methods(&classes, "A"),
            Err(ExecutionErrorKind::InheritanceCycle(name)) if name == "A"
        ));
    }

    #[test]
    fn test_private_names_follow_overrides() {
        let classes = classes(
            "classe A { prive fonction f() { renvoie 1 } }\n\
             classe B herite de A { fonction f() { renvoie 2 } }",
        );
        let a = Instance::new("A".into(), resolve_methods(&classes, "A").unwrap());
        let b = Instance::new("B".into(), resolve_methods(&classes, "B").unwrap());
        assert!(a.is_private("f"));
        assert!(!b.is_private("f"));
    }
}
