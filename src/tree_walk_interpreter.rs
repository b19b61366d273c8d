mod builtins;
mod callable;
mod class;
mod environment;
mod native_tools;
mod value;

use std::{
    cell::RefCell,
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{Debug, Display},
    io::{BufRead, Write},
    path::PathBuf,
    rc::Rc,
    time::Duration,
};

use log::debug;
use rustc_hash::FxHashMap;

use crate::{
    ast::{
        CatchClause, ClassDecl, Expression, ExpressionKind, InfixOperator, Literal, Program,
        Statement, StatementKind,
    },
    parser,
    span::Span,
    tokenizer, InterpretError,
};

use self::{callable::Callable, class::Instance, environment::Environment};

pub use self::{
    native_tools::{default_tools_dir, ToolError},
    value::{format_number, Value},
};

/// Script recursion runs on native recursion; when less than the red zone is
/// left, `execute` and `evaluate` continue on a freshly allocated segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROWTH: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct InterpreterOptions {
    /// Directory holding the external scanning executables.
    pub tools_dir: PathBuf,
    /// Nesting limit for function calls, method calls and includes.
    pub max_call_depth: usize,
    pub http_timeout: Duration,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            tools_dir: default_tools_dir(),
            max_call_depth: 512,
            http_timeout: Duration::from_secs(5),
        }
    }
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    functions: FxHashMap<String, Callable>,
    classes: FxHashMap<String, Rc<ClassDecl>>,
    stdout: Rc<RefCell<dyn Write>>,
    stdin: Rc<RefCell<dyn BufRead>>,
    options: InterpreterOptions,
    depth: usize,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("environment", &self.environment)
            .field("classes", &self.classes.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("depth", &self.depth)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Rc::new(RefCell::new(std::io::stdout())))
    }
}

#[derive(Debug)]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    /// Innermost node the error was raised at.
    pub span: Option<Span>,
}

impl ExecutionError {
    fn at(mut self, span: Span) -> Self {
        self.span.get_or_insert(span);
        self
    }

    /// Fatal errors bypass `attrape` handlers and abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ExecutionErrorKind::CallDepthExceeded(_))
    }
}

impl std::error::Error for ExecutionError {}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{} {}", span, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl From<ExecutionErrorKind> for ExecutionError {
    fn from(kind: ExecutionErrorKind) -> Self {
        Self { kind, span: None }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("Erreur d'entrée/sortie: {0}")]
    IO(#[from] std::io::Error),
    #[error("Impossible de lire '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Variable non définie: {0}")]
    UndefinedVariable(String),
    #[error("Fonction non définie: {0}")]
    UndefinedFunction(String),
    #[error("Classe non définie: {0}")]
    UndefinedClass(String),
    #[error("Impossible d'instancier la classe abstraite: {0}")]
    AbstractInstantiation(String),
    #[error("Héritage cyclique: {0}")]
    InheritanceCycle(String),
    #[error("Impossible d'accéder à '{0}' de null")]
    NullAccess(String),
    #[error("Impossible d'indexer null")]
    NullIndex,
    #[error("Impossible d'assigner à une propriété de null")]
    NullAssignment,
    #[error("La méthode '{0}' est privée et ne peut être accédée de l'extérieur.")]
    PrivateAccess(String),
    #[error("Division par zéro")]
    DivisionByZero,
    #[error("Opération invalide: {0} {1} {2}")]
    InvalidOperation(&'static str, InfixOperator, &'static str),
    #[error("Nom de membre attendu après '.'")]
    InvalidMember,
    #[error("Cible d'assignation invalide")]
    InvalidAssignmentTarget,
    #[error("Index trop grand: {0}")]
    IndexTooLarge(String),
    #[error("Erreur lors de l'inclusion de '{path}': {message}")]
    Include { path: String, message: String },
    #[error("Exception non attrapée: {0}")]
    Uncaught(Value),
    #[error("renvoie en dehors d'une fonction")]
    ReturnOutsideFunction,
    #[error("Profondeur d'appel maximale dépassée ({0})")]
    CallDepthExceeded(usize),
}

/// How a statement list finished when nothing was raised.
#[derive(Debug)]
pub enum Completion {
    Normal,
    Return(Value),
}

/// Non-local exits that propagate through `?`: script-level throws and
/// interpreter errors.
#[derive(Debug)]
pub enum Unwind {
    Thrown(Value, Span),
    Error(ExecutionError),
}

impl Unwind {
    fn at(self, span: Span) -> Self {
        match self {
            Unwind::Error(e) => Unwind::Error(e.at(span)),
            thrown => thrown,
        }
    }

    fn is_fatal(&self) -> bool {
        matches!(self, Unwind::Error(e) if e.is_fatal())
    }
}

impl From<ExecutionError> for Unwind {
    fn from(e: ExecutionError) -> Self {
        Unwind::Error(e)
    }
}

impl From<ExecutionErrorKind> for Unwind {
    fn from(kind: ExecutionErrorKind) -> Self {
        Unwind::Error(kind.into())
    }
}

impl Interpreter {
    pub fn new(stdout: Rc<RefCell<dyn Write>>) -> Self {
        Self::with_options(
            stdout,
            Rc::new(RefCell::new(std::io::BufReader::new(std::io::stdin()))),
            InterpreterOptions::default(),
        )
    }

    pub fn with_options(
        stdout: Rc<RefCell<dyn Write>>,
        stdin: Rc<RefCell<dyn BufRead>>,
        options: InterpreterOptions,
    ) -> Self {
        let globals = Environment::boxed(None);
        let mut functions = FxHashMap::default();
        builtins::register(&mut functions);

        Self {
            environment: globals.clone(),
            globals,
            functions,
            classes: FxHashMap::default(),
            stdout,
            stdin,
            options,
            depth: 0,
        }
    }

    /// Tokenizes, parses and runs `source` against this interpreter's state,
    /// so definitions persist between calls.
    pub fn run_source(&mut self, source: &str) -> Result<(), InterpretError> {
        let tokens = tokenizer::tokens(source)?;
        let program = parser::program(&tokens)?;
        self.interpret(&program)?;
        Ok(())
    }

    pub fn interpret(&mut self, program: &Program) -> Result<(), ExecutionError> {
        for stmt in program.0.iter() {
            match self.execute(stmt) {
                Ok(Completion::Normal) => {}
                Ok(Completion::Return(_)) => {
                    return Err(ExecutionError::from(ExecutionErrorKind::ReturnOutsideFunction)
                        .at(stmt.span))
                }
                Err(Unwind::Thrown(value, span)) => {
                    return Err(ExecutionError {
                        kind: ExecutionErrorKind::Uncaught(value),
                        span: Some(span),
                    })
                }
                Err(Unwind::Error(e)) => return Err(e),
            }
        }

        Ok(())
    }

    fn enter_call(&mut self) -> Result<(), ExecutionErrorKind> {
        if self.depth >= self.options.max_call_depth {
            return Err(ExecutionErrorKind::CallDepthExceeded(
                self.options.max_call_depth,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave_call(&mut self) {
        self.depth -= 1;
    }

    fn execute_in_scope<T>(
        &mut self,
        environment: Rc<RefCell<Environment>>,
        f: impl FnOnce(&mut Self) -> Result<T, Unwind>,
    ) -> Result<T, Unwind> {
        let prev = std::mem::replace(&mut self.environment, environment);
        let result = f(self);
        self.environment = prev;
        result
    }

    fn execute_block(&mut self, statements: &[Statement]) -> Result<Completion, Unwind> {
        for statement in statements {
            if let Completion::Return(value) = self.execute(statement)? {
                return Ok(Completion::Return(value));
            }
        }
        Ok(Completion::Normal)
    }

    fn execute(&mut self, stmt: &Statement) -> Result<Completion, Unwind> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.execute_statement(stmt).map_err(|e| e.at(stmt.span))
        })
    }

    fn execute_statement(&mut self, stmt: &Statement) -> Result<Completion, Unwind> {
        match &stmt.kind {
            StatementKind::VarDeclaration(name, expression) => {
                let value = self.evaluate(expression)?;
                self.environment.borrow_mut().define(name.clone(), value);
            }
            StatementKind::Expression(expression) => {
                self.evaluate(expression)?;
            }
            StatementKind::Print(expressions) => {
                let mut line = Vec::with_capacity(expressions.len());
                for expression in expressions {
                    line.push(self.evaluate(expression)?.to_string());
                }
                writeln!(self.stdout.borrow_mut(), "{}", line.join(" "))
                    .map_err(ExecutionErrorKind::from)?;
            }
            StatementKind::If(condition, then_branch, else_branch) => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute_block(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute_block(else_branch);
                }
            }
            StatementKind::While(condition, body) => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Completion::Return(value) = self.execute_block(body)? {
                        return Ok(Completion::Return(value));
                    }
                }
            }
            StatementKind::FunctionDeclaration(decl) => {
                debug!("declaring function {}({})", decl.name, decl.args.join(", "));
                self.functions
                    .insert(decl.name.clone(), Callable::Function(decl.clone()));
            }
            StatementKind::Return(expression) => {
                return Ok(Completion::Return(self.evaluate(expression)?));
            }
            StatementKind::ClassDeclaration(class) => {
                debug!(
                    "declaring class {}{}",
                    class.name,
                    class
                        .superclass
                        .as_ref()
                        .map(|s| format!(" herite de {}", s))
                        .unwrap_or_default()
                );
                self.classes.insert(class.name.clone(), class.clone());
            }
            StatementKind::InterfaceDeclaration(interface) => {
                debug!(
                    "interface {} declared with {} methods",
                    interface.name,
                    interface.methods.len()
                );
            }
            StatementKind::Throw(expression) => {
                let value = self.evaluate(expression)?;
                return Err(Unwind::Thrown(value, stmt.span));
            }
            StatementKind::Try {
                block,
                handler,
                finalizer,
            } => return self.execute_try(block, handler.as_ref(), finalizer.as_deref()),
            StatementKind::Include(path) => return self.include(path),
        }

        Ok(Completion::Normal)
    }

    fn execute_try(
        &mut self,
        block: &[Statement],
        handler: Option<&CatchClause>,
        finalizer: Option<&[Statement]>,
    ) -> Result<Completion, Unwind> {
        let environment = self.environment.clone();

        let outcome = match (self.execute_block(block), handler) {
            (Err(unwind), Some(handler)) if !unwind.is_fatal() => {
                let caught = match unwind {
                    Unwind::Thrown(value, _) => value,
                    Unwind::Error(e) => Value::String(e.to_string()),
                };
                let scope = Environment::boxed(Some(environment.clone()));
                scope.borrow_mut().define(handler.param.clone(), caught);
                self.execute_in_scope(scope, |interpreter| {
                    interpreter.execute_block(&handler.body)
                })
            }
            (outcome, _) => outcome,
        };
        self.environment = environment;

        if let Some(finalizer) = finalizer {
            if let Completion::Return(value) = self.execute_block(finalizer)? {
                return Ok(Completion::Return(value));
            }
        }

        outcome
    }

    /// Runs another source file in the current environment. Throws, returns
    /// and fatal errors pass through; anything else is reported as an
    /// inclusion failure of `path`.
    fn include(&mut self, path: &str) -> Result<Completion, Unwind> {
        debug!("including {}", path);
        let failed = |message: String| ExecutionErrorKind::Include {
            path: path.to_string(),
            message,
        };

        let source = std::fs::read_to_string(path).map_err(|e| failed(e.to_string()))?;
        let tokens = tokenizer::tokens(&source).map_err(|e| failed(e.to_string()))?;
        let program = parser::program(&tokens).map_err(|e| failed(e.to_string()))?;

        self.enter_call()?;
        let result = self.execute_block(&program.0);
        self.leave_call();

        result.map_err(|unwind| match unwind {
            Unwind::Error(e) if !e.is_fatal() => failed(e.to_string()).into(),
            other => other,
        })
    }

    fn evaluate(&mut self, expression: &Expression) -> Result<Value, Unwind> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
            self.evaluate_expression(expression)
                .map_err(|e| e.at(expression.span))
        })
    }

    fn evaluate_all(&mut self, expressions: &[Expression]) -> Result<Vec<Value>, Unwind> {
        expressions.iter().map(|e| self.evaluate(e)).collect()
    }

    fn evaluate_expression(&mut self, expression: &Expression) -> Result<Value, Unwind> {
        match &expression.kind {
            ExpressionKind::Literal(literal) => Ok(match literal {
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),
            ExpressionKind::Identifier(name) => self
                .environment
                .borrow()
                .get(name)
                .ok_or_else(|| ExecutionErrorKind::UndefinedVariable(name.clone()).into()),
            ExpressionKind::Call(name, args) => {
                let callable = self
                    .functions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ExecutionErrorKind::UndefinedFunction(name.clone()))?;
                let args = self.evaluate_all(args)?;
                callable.call(self, args)
            }
            ExpressionKind::Binary(left, InfixOperator::Member, right) => {
                self.evaluate_member(left, right)
            }
            ExpressionKind::Binary(left, op, right) => {
                let a = self.evaluate(left)?;
                let b = self.evaluate(right)?;
                Ok(binary(*op, a, b)?)
            }
            ExpressionKind::Assign(target, value) => self.evaluate_assignment(target, value),
            ExpressionKind::New(name) => Ok(self.instantiate(name)?),
            ExpressionKind::List(items) => Ok(Value::list(self.evaluate_all(items)?)),
            ExpressionKind::Object(pairs) => {
                let mut entries = BTreeMap::new();
                for (key, value) in pairs {
                    let value = self.evaluate(value)?;
                    entries.insert(key.clone(), value);
                }
                Ok(Value::object(entries))
            }
            ExpressionKind::Index(object, index) => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                Ok(self.index(object, &index)?)
            }
        }
    }

    /// `receiver.name` and `receiver.name(args)`. Arguments are evaluated
    /// only when the member turns out to be callable.
    fn evaluate_member(&mut self, left: &Expression, right: &Expression) -> Result<Value, Unwind> {
        let receiver = self.evaluate(left)?;
        let (name, args) = match &right.kind {
            ExpressionKind::Identifier(name) => (name, None),
            ExpressionKind::Call(name, args) => (name, Some(args)),
            _ => return Err(ExecutionErrorKind::InvalidMember.into()),
        };

        let member = match &receiver {
            Value::Null => return Err(ExecutionErrorKind::NullAccess(name.clone()).into()),
            Value::Object(entries) => entries.borrow().get(name).cloned().unwrap_or(Value::Null),
            Value::Instance(instance) => self.instance_member(instance, name)?,
            _ => Value::Null,
        };

        match (member, args) {
            (Value::Callable(callable), Some(args)) => {
                let args = self.evaluate_all(args)?;
                callable.call(self, args)
            }
            (member, _) => Ok(member),
        }
    }

    /// Whether the running method's `ceci` is `instance` itself.
    fn is_receiver(&self, instance: &Rc<RefCell<Instance>>) -> bool {
        matches!(
            self.environment.borrow().get("ceci"),
            Some(Value::Instance(this)) if Rc::ptr_eq(&this, instance)
        )
    }

    /// A field, or else a method bound to `instance`. Private methods are
    /// only reachable from the instance's own methods.
    fn instance_member(
        &self,
        instance: &Rc<RefCell<Instance>>,
        name: &str,
    ) -> Result<Value, ExecutionErrorKind> {
        let borrowed = instance.borrow();
        if borrowed.is_private(name) && !self.is_receiver(instance) {
            return Err(ExecutionErrorKind::PrivateAccess(name.to_string()));
        }

        if let Some(value) = borrowed.fields.get(name) {
            return Ok(value.clone());
        }

        Ok(borrowed
            .find_method(name)
            .map(|method| {
                Value::Callable(Rc::new(Callable::Method {
                    instance: instance.clone(),
                    method: method.clone(),
                }))
            })
            .unwrap_or(Value::Null))
    }

    fn index(&self, object: Value, index: &Value) -> Result<Value, ExecutionErrorKind> {
        Ok(match object {
            Value::Null => return Err(ExecutionErrorKind::NullIndex),
            Value::List(items) => index
                .as_index()
                .and_then(|i| items.borrow().get(i).cloned())
                .unwrap_or(Value::Null),
            Value::String(s) => index
                .as_index()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null),
            Value::Object(entries) => entries
                .borrow()
                .get(&index.to_key())
                .cloned()
                .unwrap_or(Value::Null),
            Value::Instance(instance) => self.instance_member(&instance, &index.to_key())?,
            _ => Value::Null,
        })
    }

    fn evaluate_assignment(&mut self, target: &Expression, value: &Expression) -> Result<Value, Unwind> {
        let value = self.evaluate(value)?;

        match &target.kind {
            ExpressionKind::Identifier(name) => {
                self.environment
                    .borrow_mut()
                    .assign(name, value.clone())
                    .ok_or_else(|| ExecutionErrorKind::UndefinedVariable(name.clone()))?;
            }
            ExpressionKind::Index(object, index) => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                set_index(object, &index, value.clone())?;
            }
            _ => return Err(ExecutionErrorKind::InvalidAssignmentTarget.into()),
        }

        Ok(value)
    }

    fn instantiate(&self, name: &str) -> Result<Value, ExecutionErrorKind> {
        let class = self
            .classes
            .get(name)
            .ok_or_else(|| ExecutionErrorKind::UndefinedClass(name.to_string()))?;
        if class.is_abstract {
            return Err(ExecutionErrorKind::AbstractInstantiation(name.to_string()));
        }

        let methods = class::resolve_methods(&self.classes, name)?;
        Ok(Value::Instance(Rc::new(RefCell::new(Instance::new(
            name.to_string(),
            methods,
        )))))
    }
}

/// Writing past the end of a list pads it with `null`, up to this length.
const MAX_LIST_LEN: usize = 1 << 24;

fn set_index(object: Value, index: &Value, value: Value) -> Result<(), ExecutionErrorKind> {
    match object {
        Value::Null => return Err(ExecutionErrorKind::NullAssignment),
        Value::List(items) => {
            let i = index
                .as_index()
                .ok_or(ExecutionErrorKind::InvalidAssignmentTarget)?;
            let mut items = items.borrow_mut();
            match items.get_mut(i) {
                Some(slot) => *slot = value,
                None => {
                    let len = i
                        .checked_add(1)
                        .filter(|len| *len <= MAX_LIST_LEN)
                        .ok_or_else(|| ExecutionErrorKind::IndexTooLarge(index.to_string()))?;
                    items.resize(len, Value::Null);
                    items[i] = value;
                }
            }
        }
        Value::Object(entries) => {
            entries.borrow_mut().insert(index.to_key(), value);
        }
        Value::Instance(instance) => {
            instance.borrow_mut().fields.insert(index.to_key(), value);
        }
        _ => return Err(ExecutionErrorKind::InvalidAssignmentTarget),
    }
    Ok(())
}

fn compare(a: &Value, b: &Value) -> Option<Option<Ordering>> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Some(a.partial_cmp(b)),
        (Value::String(a), Value::String(b)) => Some(Some(a.cmp(b))),
        _ => None,
    }
}

fn binary(op: InfixOperator, a: Value, b: Value) -> Result<Value, ExecutionErrorKind> {
    let invalid = |a: &Value, b: &Value| {
        ExecutionErrorKind::InvalidOperation(a.type_name(), op, b.type_name())
    };

    let result = match op {
        InfixOperator::Equal => Value::Boolean(a.strict_equals(&b)),
        InfixOperator::NotEqual => Value::Boolean(!a.strict_equals(&b)),
        InfixOperator::Plus => match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => Value::Number(x + y),
            (Value::String(_), _) | (_, Value::String(_)) => Value::String(format!("{}{}", a, b)),
            _ => return Err(invalid(&a, &b)),
        },
        InfixOperator::Minus => match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => Value::Number(x - y),
            _ => return Err(invalid(&a, &b)),
        },
        InfixOperator::Multiply => match (&a, &b) {
            (Value::Number(x), Value::Number(y)) => Value::Number(x * y),
            _ => return Err(invalid(&a, &b)),
        },
        InfixOperator::Divide => match (&a, &b) {
            (Value::Number(_), Value::Number(y)) if *y == 0.0 => {
                return Err(ExecutionErrorKind::DivisionByZero)
            }
            (Value::Number(x), Value::Number(y)) => Value::Number(x / y),
            _ => return Err(invalid(&a, &b)),
        },
        InfixOperator::LessThan
        | InfixOperator::GreaterThan
        | InfixOperator::LessThanOrEqual
        | InfixOperator::GreaterThanOrEqual => {
            let ordering = compare(&a, &b).ok_or_else(|| invalid(&a, &b))?;
            Value::Boolean(match op {
                InfixOperator::LessThan => ordering == Some(Ordering::Less),
                InfixOperator::GreaterThan => ordering == Some(Ordering::Greater),
                InfixOperator::LessThanOrEqual => {
                    matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                }
                _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            })
        }
        InfixOperator::Member => unreachable!("member access is evaluated before its operands"),
    };

    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;

    fn run(source: &str) -> Result<String, InterpretError> {
        let stdout = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter = Interpreter::new(stdout.clone());
        interpreter.run_source(source)?;
        let output = String::from_utf8(stdout.borrow().clone()).unwrap();
        Ok(output)
    }

    #[test]
    fn test_binary_operators() {
        let n = Value::Number;
        assert!(matches!(binary(InfixOperator::Plus, n(1.0), n(2.0)), Ok(Value::Number(x)) if x == 3.0));
        assert!(matches!(
            binary(InfixOperator::Plus, Value::String("a".into()), n(1.0)),
            Ok(Value::String(s)) if s == "a1"
        ));
        assert!(matches!(
            binary(InfixOperator::Divide, n(1.0), n(0.0)),
            Err(ExecutionErrorKind::DivisionByZero)
        ));
        assert!(matches!(
            binary(InfixOperator::LessThan, Value::String("a".into()), Value::String("b".into())),
            Ok(Value::Boolean(true))
        ));
        assert!(matches!(
            binary(InfixOperator::Minus, Value::Null, n(1.0)),
            Err(ExecutionErrorKind::InvalidOperation("null", InfixOperator::Minus, "nombre"))
        ));
    }

    #[test]
    fn test_nan_comparisons_are_false() {
        let nan = Value::Number(f64::NAN);
        for op in [
            InfixOperator::LessThan,
            InfixOperator::GreaterThanOrEqual,
            InfixOperator::Equal,
        ] {
            assert!(matches!(
                binary(op, nan.clone(), nan.clone()),
                Ok(Value::Boolean(false))
            ));
        }
    }

    #[test]
    fn test_list_assignment_extends_with_null() {
        let list = Value::list(vec![Value::Number(1.0)]);
        set_index(list.clone(), &Value::Number(3.0), Value::Number(4.0)).unwrap();
        assert_eq!(list.to_string(), "[1, null, null, 4]");
    }

    #[test]
    fn test_list_assignment_rejects_huge_index() {
        let list = Value::list(vec![Value::Number(1.0)]);
        for index in [f64::from(1u32 << 30), 2f64.powi(96)] {
            let err = set_index(list.clone(), &Value::Number(index), Value::Null).unwrap_err();
            assert!(matches!(err, ExecutionErrorKind::IndexTooLarge(_)));
        }
        assert_eq!(list.to_string(), "[1]");
    }

    #[test]
    fn test_error_span_points_at_innermost_node() {
        let err = run("soit a = 1\nsoit b = a + (2 / 0)").unwrap_err();
        assert_eq!(err.to_string(), "[Ligne 2, Col 17] Division par zéro");
    }

    #[test]
    fn test_return_at_top_level() {
        let err = run("renvoie 1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "[Ligne 1, Col 1] renvoie en dehors d'une fonction"
        );
    }

    #[test]
    fn test_uncaught_throw() {
        let err = run("montre 1\nlance \"boom\"").unwrap_err();
        assert_eq!(err.to_string(), "[Ligne 2, Col 1] Exception non attrapée: boom");
    }

    #[test]
    fn test_call_depth_is_limited() {
        let stdout = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter = Interpreter::with_options(
            stdout,
            Rc::new(RefCell::new(std::io::empty())),
            InterpreterOptions {
                max_call_depth: 16,
                ..Default::default()
            },
        );
        let err = interpreter
            .run_source("fonction f() { renvoie f() }\nessaye { f() } attrape (e) { montre e }")
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err
            .to_string()
            .ends_with("Profondeur d'appel maximale dépassée (16)"));
    }

    #[test]
    fn test_depth_unwinds_after_calls() {
        let stdout = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter = Interpreter::with_options(
            stdout,
            Rc::new(RefCell::new(std::io::empty())),
            InterpreterOptions {
                max_call_depth: 4,
                ..Default::default()
            },
        );
        interpreter
            .run_source("fonction f(n) { si n > 0 { renvoie f(n - 1) } renvoie 0 }")
            .unwrap();
        for _ in 0..10 {
            interpreter.run_source("f(3)").unwrap();
        }
        assert_eq!(interpreter.depth, 0);
    }
}
