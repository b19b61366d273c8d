use std::{fmt::Display, rc::Rc};

use crate::span::Span;

#[derive(Debug)]
pub struct Program(pub Vec<Statement>);

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    VarDeclaration(String, Expression),
    Expression(Expression),
    Print(Vec<Expression>),
    If(Expression, Vec<Statement>, Option<Vec<Statement>>),
    While(Expression, Vec<Statement>),
    FunctionDeclaration(Rc<FunctionDecl>),
    Return(Expression),
    ClassDeclaration(Rc<ClassDecl>),
    InterfaceDeclaration(InterfaceDecl),
    Throw(Expression),
    Try {
        block: Vec<Statement>,
        handler: Option<CatchClause>,
        finalizer: Option<Vec<Statement>>,
    },
    Include(String),
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub args: Vec<String>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub visibility: Visibility,
    pub function: Rc<FunctionDecl>,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
    pub methods: Vec<Method>,
    pub is_abstract: bool,
}

/// Interfaces are recorded by the parser only; nothing checks implementers.
#[derive(Debug, Clone)]
pub struct InterfaceDecl {
    pub name: String,
    pub methods: Vec<Rc<FunctionDecl>>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExpressionKind {
    Literal(Literal),
    Identifier(String),
    Call(String, Vec<Expression>),
    /// `.` member access shares this node with the arithmetic and
    /// comparison operators; all of them fold left at one precedence level.
    Binary(Box<Expression>, InfixOperator, Box<Expression>),
    Assign(Box<Expression>, Box<Expression>),
    New(String),
    List(Vec<Expression>),
    Object(Vec<(String, Expression)>),
    Index(Box<Expression>, Box<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOperator {
    Plus,
    Minus,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessThanOrEqual,
    GreaterThanOrEqual,
    Member,
}

struct Body<'a>(&'a [Statement]);

impl Display for Body<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{{")?;
        for statement in self.0 {
            writeln!(f, "{}", statement)?;
        }
        write!(f, "}}")
    }
}

fn comma_separated<T: Display>(f: &mut std::fmt::Formatter<'_>, items: &[T]) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i != 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for statement in &self.0 {
            writeln!(f, "{}", statement)?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            StatementKind::VarDeclaration(name, expr) => write!(f, "soit {} = {}", name, expr),
            StatementKind::Expression(expr) => write!(f, "{}", expr),
            StatementKind::Print(args) => {
                write!(f, "montre ")?;
                comma_separated(f, args)
            }
            StatementKind::If(condition, then_branch, else_branch) => {
                write!(f, "si {} {}", condition, Body(then_branch))?;
                if let Some(else_branch) = else_branch {
                    write!(f, " sinon {}", Body(else_branch))?;
                }
                Ok(())
            }
            StatementKind::While(condition, body) => {
                write!(f, "tantque {} {}", condition, Body(body))
            }
            StatementKind::FunctionDeclaration(decl) => write!(f, "{}", decl),
            StatementKind::Return(expr) => write!(f, "renvoie {}", expr),
            StatementKind::ClassDeclaration(class) => {
                if class.is_abstract {
                    write!(f, "abstrait ")?;
                }
                write!(f, "classe {}", class.name)?;
                if let Some(superclass) = &class.superclass {
                    write!(f, " herite de {}", superclass)?;
                }
                writeln!(f, " {{")?;
                for method in &class.methods {
                    if method.visibility == Visibility::Private {
                        write!(f, "prive ")?;
                    }
                    writeln!(f, "{}", method.function)?;
                }
                write!(f, "}}")
            }
            StatementKind::InterfaceDeclaration(interface) => {
                writeln!(f, "interface {} {{", interface.name)?;
                for method in &interface.methods {
                    writeln!(f, "{}", method)?;
                }
                write!(f, "}}")
            }
            StatementKind::Throw(expr) => write!(f, "lance {}", expr),
            StatementKind::Try {
                block,
                handler,
                finalizer,
            } => {
                write!(f, "essaye {}", Body(block))?;
                if let Some(handler) = handler {
                    write!(f, " attrape ({}) {}", handler.param, Body(&handler.body))?;
                }
                if let Some(finalizer) = finalizer {
                    write!(f, " enfin {}", Body(finalizer))?;
                }
                Ok(())
            }
            StatementKind::Include(path) => write!(f, "inclure \"{}\"", path),
        }
    }
}

impl Display for FunctionDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fonction {}(", self.name)?;
        comma_separated(f, &self.args)?;
        write!(f, ") {}", Body(&self.body))
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ExpressionKind::Literal(literal) => write!(f, "{}", literal),
            ExpressionKind::Identifier(name) => write!(f, "{}", name),
            ExpressionKind::Call(name, args) => {
                write!(f, "{}(", name)?;
                comma_separated(f, args)?;
                write!(f, ")")
            }
            ExpressionKind::Binary(left, InfixOperator::Member, right) => {
                write!(f, "{}.{}", left, right)
            }
            ExpressionKind::Binary(left, op, right) => write!(f, "({} {} {})", op, left, right),
            ExpressionKind::Assign(target, value) => write!(f, "{} = {}", target, value),
            ExpressionKind::New(class) => write!(f, "nouveau {}()", class),
            ExpressionKind::List(elements) => {
                write!(f, "[")?;
                comma_separated(f, elements)?;
                write!(f, "]")
            }
            ExpressionKind::Object(pairs) => {
                write!(f, "{{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            ExpressionKind::Index(object, index) => write!(f, "{}[{}]", object, index),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl Display for InfixOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InfixOperator::Plus => write!(f, "+"),
            InfixOperator::Minus => write!(f, "-"),
            InfixOperator::Multiply => write!(f, "*"),
            InfixOperator::Divide => write!(f, "/"),
            InfixOperator::Equal => write!(f, "=="),
            InfixOperator::NotEqual => write!(f, "!="),
            InfixOperator::LessThan => write!(f, "<"),
            InfixOperator::GreaterThan => write!(f, ">"),
            InfixOperator::LessThanOrEqual => write!(f, "<="),
            InfixOperator::GreaterThanOrEqual => write!(f, ">="),
            InfixOperator::Member => write!(f, "."),
        }
    }
}
