use std::{cell::RefCell, fmt::Display, rc::Rc};

use log::trace;

use crate::ast::FunctionDecl;

use super::{
    class::Instance, environment::Environment, Completion, ExecutionErrorKind, Interpreter,
    Unwind, Value,
};

pub type NativeFn = fn(&mut Interpreter, Vec<Value>) -> Result<Value, ExecutionErrorKind>;

#[derive(Debug, Clone)]
pub enum Callable {
    Builtin {
        name: &'static str,
        function: NativeFn,
    },
    Function(Rc<FunctionDecl>),
    /// A method bound to the instance it was looked up on.
    Method {
        instance: Rc<RefCell<Instance>>,
        method: Rc<FunctionDecl>,
    },
}

impl Callable {
    pub fn call(&self, interpreter: &mut Interpreter, args: Vec<Value>) -> Result<Value, Unwind> {
        match self {
            Callable::Builtin { function, .. } => Ok(function(interpreter, args)?),
            Callable::Function(decl) => call_user(interpreter, decl, None, args),
            Callable::Method { instance, method } => {
                call_user(interpreter, method, Some(instance.clone()), args)
            }
        }
    }
}

/// Runs a user function or method in a fresh frame parented to the global
/// environment, never to the caller's. Missing arguments bind to null and
/// extra ones are dropped.
fn call_user(
    interpreter: &mut Interpreter,
    decl: &FunctionDecl,
    this: Option<Rc<RefCell<Instance>>>,
    args: Vec<Value>,
) -> Result<Value, Unwind> {
    trace!("calling {} with {} arguments", decl.name, args.len());

    let frame = Environment::boxed(Some(interpreter.globals.clone()));
    {
        let mut frame = frame.borrow_mut();
        if let Some(instance) = this {
            frame.define("ceci", Value::Instance(instance));
        }
        let mut args = args.into_iter();
        for name in &decl.args {
            frame.define(name.clone(), args.next().unwrap_or(Value::Null));
        }
    }

    interpreter.enter_call()?;
    let result = interpreter.execute_in_scope(frame, |interpreter| {
        interpreter.execute_block(&decl.body)
    });
    interpreter.leave_call();

    match result? {
        Completion::Return(value) => Ok(value),
        Completion::Normal => Ok(Value::Null),
    }
}

impl Display for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Builtin { name, .. } => write!(f, "<fonction native {}>", name),
            Callable::Function(decl) => write!(f, "<fonction {}>", decl.name),
            Callable::Method { instance, method } => {
                write!(f, "<méthode {}.{}>", instance.borrow().class_name, method.name)
            }
        }
    }
}
