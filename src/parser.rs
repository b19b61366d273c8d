use std::rc::Rc;

use crate::{
    ast::{
        CatchClause, ClassDecl, Expression, ExpressionKind, FunctionDecl, InfixOperator,
        InterfaceDecl, Literal, Method, Program, Statement, StatementKind, Visibility,
    },
    span::Span,
    tokenizer::{Keyword, Token, TokenType},
};

#[derive(Debug)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// `None` only while the error is bubbling up from the end of input;
    /// [`program`] replaces it with the position just past the last token.
    pub span: Option<Span>,
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{} {}", span, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("'{0}' attendu")]
    Expected(TokenType),
    #[error("Nom de {0} attendu")]
    ExpectedName(&'static str),
    #[error("Expression inattendue: {0}")]
    Unexpected(TokenType),
    #[error("Fin d'entrée inattendue")]
    UnexpectedEnd,
    #[error("Seules les fonctions sont autorisées dans une classe")]
    NonFunctionClassMember,
    #[error("Seules les déclarations de fonctions sont autorisées dans une interface")]
    NonFunctionInterfaceMember,
    #[error("'classe' attendu après 'abstrait'")]
    ClassAfterAbstract,
    #[error("Chemin de fichier attendu après inclure")]
    ExpectedIncludePath,
    #[error("Clé d'objet attendue")]
    ExpectedObjectKey,
}

type ParseResult<'a, T> = Result<(T, &'a [Token]), ParseError>;

fn error_at(tokens: &[Token], kind: ParseErrorKind) -> ParseError {
    ParseError {
        kind,
        span: tokens.first().map(|token| token.span),
    }
}

fn peek(tokens: &[Token]) -> Option<&TokenType> {
    tokens.first().map(Token::token_type)
}

fn next_is(tokens: &[Token], token_type: &TokenType) -> bool {
    peek(tokens) == Some(token_type)
}

fn next_is_keyword(tokens: &[Token], keyword: Keyword) -> bool {
    peek(tokens).is_some_and(|t| t.is_keyword(keyword))
}

pub fn program(tokens: &[Token]) -> Result<Program, ParseError> {
    let mut statements = Vec::new();
    let mut rest = tokens;

    while !rest.is_empty() {
        match statement(rest) {
            Ok((stmt, remaining)) => {
                statements.push(stmt);
                rest = remaining;
            }
            Err(mut err) => {
                if err.span.is_none() {
                    let end = tokens
                        .last()
                        .map(|t| Span::new(t.span.end_line, t.span.end_column, t.span.end_line, t.span.end_column))
                        .unwrap_or(Span::new(1, 1, 1, 1));
                    err.span = Some(end);
                }
                return Err(err);
            }
        }
    }

    Ok(Program(statements))
}

fn statement<'a>(tokens: &'a [Token]) -> ParseResult<'a, Statement> {
    let Some(first) = tokens.first() else {
        return Err(error_at(tokens, ParseErrorKind::UnexpectedEnd));
    };
    let span = first.span;
    let rest = &tokens[1..];

    let (kind, rest) = match first.token_type() {
        TokenType::Keyword(Keyword::Soit) => var_declaration(rest)?,
        TokenType::Keyword(Keyword::Montre) => print_statement(rest)?,
        TokenType::Keyword(Keyword::Si) => if_statement(rest)?,
        TokenType::Keyword(Keyword::Tantque) => while_statement(rest)?,
        TokenType::Keyword(Keyword::Fonction) => {
            let (decl, rest) = function(span, rest)?;
            (StatementKind::FunctionDeclaration(Rc::new(decl)), rest)
        }
        TokenType::Keyword(Keyword::Renvoie) => {
            let (expr, rest) = expression(rest)?;
            (StatementKind::Return(expr), rest)
        }
        TokenType::Keyword(Keyword::Classe) => class_declaration(rest, false)?,
        TokenType::Keyword(Keyword::Abstrait) => {
            if !next_is_keyword(rest, Keyword::Classe) {
                return Err(error_at(rest, ParseErrorKind::ClassAfterAbstract));
            }
            class_declaration(&rest[1..], true)?
        }
        TokenType::Keyword(Keyword::Interface) => interface_declaration(rest)?,
        TokenType::Keyword(Keyword::Essaye) => try_statement(rest)?,
        TokenType::Keyword(Keyword::Lance) => {
            let (expr, rest) = expression(rest)?;
            (StatementKind::Throw(expr), rest)
        }
        TokenType::Keyword(Keyword::Inclure) => match rest.first() {
            Some(Token {
                token_type: TokenType::String(path),
                ..
            }) => (StatementKind::Include(path.clone()), &rest[1..]),
            _ => return Err(error_at(rest, ParseErrorKind::ExpectedIncludePath)),
        },
        _ => {
            let (expr, rest) = expression(tokens)?;
            (StatementKind::Expression(expr), rest)
        }
    };

    Ok((Statement { kind, span }, rest))
}

fn var_declaration<'a>(tokens: &'a [Token]) -> ParseResult<'a, StatementKind> {
    let (name, tokens) = match_identifier(tokens, "variable")?;
    let tokens = consume(tokens, TokenType::Equal)?;
    let (value, tokens) = expression(tokens)?;
    Ok((StatementKind::VarDeclaration(name, value), tokens))
}

/// `montre a, b` or `montre(a, b)`. An opening parenthesis is consumed up
/// front and a closing one is dropped if present; nothing checks they pair.
fn print_statement<'a>(tokens: &'a [Token]) -> ParseResult<'a, StatementKind> {
    let has_paren = next_is(tokens, &TokenType::LeftParen);
    let tokens = if has_paren { &tokens[1..] } else { tokens };

    let (first, mut tokens) = expression(tokens)?;
    let mut args = vec![first];
    while next_is(tokens, &TokenType::Comma) {
        let (arg, rest) = expression(&tokens[1..])?;
        args.push(arg);
        tokens = rest;
    }

    if has_paren && next_is(tokens, &TokenType::RightParen) {
        tokens = &tokens[1..];
    }

    Ok((StatementKind::Print(args), tokens))
}

fn if_statement<'a>(tokens: &'a [Token]) -> ParseResult<'a, StatementKind> {
    let (condition, tokens) = expression(tokens)?;
    let (then_branch, tokens) = body(tokens)?;

    if next_is_keyword(tokens, Keyword::Sinon) {
        let (else_branch, tokens) = body(&tokens[1..])?;
        Ok((
            StatementKind::If(condition, then_branch, Some(else_branch)),
            tokens,
        ))
    } else {
        Ok((StatementKind::If(condition, then_branch, None), tokens))
    }
}

fn while_statement<'a>(tokens: &'a [Token]) -> ParseResult<'a, StatementKind> {
    let (condition, tokens) = expression(tokens)?;
    let (body, tokens) = body(tokens)?;
    Ok((StatementKind::While(condition, body), tokens))
}

fn function<'a>(span: Span, tokens: &'a [Token]) -> ParseResult<'a, FunctionDecl> {
    let (name, tokens) = match_identifier(tokens, "fonction")?;
    let mut tokens = consume(tokens, TokenType::LeftParen)?;

    let mut args = vec![];
    if next_is(tokens, &TokenType::RightParen) {
        tokens = &tokens[1..];
    } else {
        loop {
            let (arg_name, rest) = match_identifier(tokens, "paramètre")?;
            args.push(arg_name);
            tokens = rest;

            match peek(tokens) {
                Some(TokenType::Comma) => tokens = &tokens[1..],
                _ => {
                    tokens = consume(tokens, TokenType::RightParen)?;
                    break;
                }
            }
        }
    }

    let (body, tokens) = block(tokens)?;
    Ok((
        FunctionDecl {
            name,
            args,
            body,
            span,
        },
        tokens,
    ))
}

fn class_declaration<'a>(tokens: &'a [Token], is_abstract: bool) -> ParseResult<'a, StatementKind> {
    let (name, mut tokens) = match_identifier(tokens, "classe")?;

    let mut superclass = None;
    if next_is_keyword(tokens, Keyword::Herite) {
        let rest = consume(&tokens[1..], TokenType::Keyword(Keyword::De))?;
        let (superclass_name, rest) = match_identifier(rest, "classe")?;
        superclass = Some(superclass_name);
        tokens = rest;
    }

    let mut tokens = consume(tokens, TokenType::LeftBrace)?;
    let mut methods = Vec::new();
    loop {
        let visibility = match peek(tokens) {
            None => return Err(error_at(tokens, ParseErrorKind::Expected(TokenType::RightBrace))),
            Some(TokenType::RightBrace) => break,
            Some(TokenType::Keyword(Keyword::Prive)) => {
                tokens = &tokens[1..];
                Visibility::Private
            }
            Some(TokenType::Keyword(Keyword::Public)) => {
                tokens = &tokens[1..];
                Visibility::Public
            }
            Some(_) => Visibility::Public,
        };

        let Some(member) = tokens.first() else {
            return Err(error_at(tokens, ParseErrorKind::NonFunctionClassMember));
        };
        if !member.token_type().is_keyword(Keyword::Fonction) {
            return Err(error_at(tokens, ParseErrorKind::NonFunctionClassMember));
        }

        let (function, rest) = function(member.span, &tokens[1..])?;
        methods.push(Method {
            visibility,
            function: Rc::new(function),
        });
        tokens = rest;
    }

    Ok((
        StatementKind::ClassDeclaration(Rc::new(ClassDecl {
            name,
            superclass,
            methods,
            is_abstract,
        })),
        &tokens[1..],
    ))
}

fn interface_declaration<'a>(tokens: &'a [Token]) -> ParseResult<'a, StatementKind> {
    let (name, tokens) = match_identifier(tokens, "interface")?;
    let mut tokens = consume(tokens, TokenType::LeftBrace)?;

    let mut methods = Vec::new();
    loop {
        let Some(member) = tokens.first() else {
            return Err(error_at(tokens, ParseErrorKind::Expected(TokenType::RightBrace)));
        };
        match member.token_type() {
            TokenType::RightBrace => break,
            TokenType::Keyword(Keyword::Fonction) => {
                let (function, rest) = function(member.span, &tokens[1..])?;
                methods.push(Rc::new(function));
                tokens = rest;
            }
            _ => return Err(error_at(tokens, ParseErrorKind::NonFunctionInterfaceMember)),
        }
    }

    Ok((
        StatementKind::InterfaceDeclaration(InterfaceDecl { name, methods }),
        &tokens[1..],
    ))
}

fn try_statement<'a>(tokens: &'a [Token]) -> ParseResult<'a, StatementKind> {
    let (block_body, mut tokens) = block(tokens)?;

    let mut handler = None;
    if next_is_keyword(tokens, Keyword::Attrape) {
        let rest = consume(&tokens[1..], TokenType::LeftParen)?;
        let (param, rest) = match_identifier(rest, "variable")?;
        let rest = consume(rest, TokenType::RightParen)?;
        let (body, rest) = block(rest)?;
        handler = Some(CatchClause { param, body });
        tokens = rest;
    }

    let mut finalizer = None;
    if next_is_keyword(tokens, Keyword::Enfin) {
        let (body, rest) = block(&tokens[1..])?;
        finalizer = Some(body);
        tokens = rest;
    }

    Ok((
        StatementKind::Try {
            block: block_body,
            handler,
            finalizer,
        },
        tokens,
    ))
}

/// A braced block, or a single statement when no brace follows.
fn body<'a>(tokens: &'a [Token]) -> ParseResult<'a, Vec<Statement>> {
    if next_is(tokens, &TokenType::LeftBrace) {
        block(tokens)
    } else {
        let (stmt, rest) = statement(tokens)?;
        Ok((vec![stmt], rest))
    }
}

fn block<'a>(tokens: &'a [Token]) -> ParseResult<'a, Vec<Statement>> {
    let mut tokens = consume(tokens, TokenType::LeftBrace)?;
    let mut statements = Vec::new();

    loop {
        match peek(tokens) {
            None => return Err(error_at(tokens, ParseErrorKind::Expected(TokenType::RightBrace))),
            Some(TokenType::RightBrace) => return Ok((statements, &tokens[1..])),
            Some(_) => {
                let (stmt, rest) = statement(tokens)?;
                statements.push(stmt);
                tokens = rest;
            }
        }
    }
}

fn infix_operator(token_type: &TokenType) -> Option<InfixOperator> {
    let op = match token_type {
        TokenType::Plus => InfixOperator::Plus,
        TokenType::Minus => InfixOperator::Minus,
        TokenType::Star => InfixOperator::Multiply,
        TokenType::Slash => InfixOperator::Divide,
        TokenType::EqualEqual => InfixOperator::Equal,
        TokenType::BangEqual => InfixOperator::NotEqual,
        TokenType::Less => InfixOperator::LessThan,
        TokenType::Greater => InfixOperator::GreaterThan,
        TokenType::LessEqual => InfixOperator::LessThanOrEqual,
        TokenType::GreaterEqual => InfixOperator::GreaterThanOrEqual,
        TokenType::Dot => InfixOperator::Member,
        _ => return None,
    };
    Some(op)
}

/// One primary, then either a right-associative assignment or a left fold
/// of binary operators over single primaries. There is no precedence:
/// `1 + 2 * 3` is `(1 + 2) * 3` and `a + b.c` is `(a + b).c`.
fn expression<'a>(tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let (mut left, mut tokens) = primary(tokens)?;

    if let Some(token) = tokens.first() {
        if token.token_type() == &TokenType::Equal {
            let (value, rest) = expression(&tokens[1..])?;
            return Ok((
                Expression {
                    kind: ExpressionKind::Assign(Box::new(left), Box::new(value)),
                    span: token.span,
                },
                rest,
            ));
        }
    }

    while let Some(token) = tokens.first() {
        let Some(op) = infix_operator(token.token_type()) else {
            break;
        };
        let (right, rest) = primary(&tokens[1..])?;
        left = Expression {
            kind: ExpressionKind::Binary(Box::new(left), op, Box::new(right)),
            span: token.span,
        };
        tokens = rest;
    }

    Ok((left, tokens))
}

fn primary<'a>(tokens: &'a [Token]) -> ParseResult<'a, Expression> {
    let Some(token) = tokens.first() else {
        return Err(error_at(tokens, ParseErrorKind::UnexpectedEnd));
    };
    let span = token.span;
    let rest = &tokens[1..];

    let (kind, rest) = match token.token_type() {
        TokenType::LeftParen => {
            let (expr, rest) = expression(rest)?;
            let rest = consume(rest, TokenType::RightParen)?;
            return Ok((expr, rest));
        }
        TokenType::Number(n) => (ExpressionKind::Literal(Literal::Number(*n)), rest),
        TokenType::String(s) => (ExpressionKind::Literal(Literal::String(s.clone())), rest),
        TokenType::Keyword(Keyword::Nouveau) => {
            let (class, rest) = match_identifier(rest, "classe")?;
            let rest = consume(rest, TokenType::LeftParen)?;
            let rest = consume(rest, TokenType::RightParen)?;
            (ExpressionKind::New(class), rest)
        }
        TokenType::Identifier(name) => match peek(rest) {
            Some(TokenType::LeftParen) => {
                let (args, rest) = arguments(&rest[1..])?;
                (ExpressionKind::Call(name.clone(), args), rest)
            }
            Some(TokenType::LeftBracket) => {
                let (index, rest) = expression(&rest[1..])?;
                let rest = consume(rest, TokenType::RightBracket)?;
                let object = Expression {
                    kind: ExpressionKind::Identifier(name.clone()),
                    span,
                };
                (
                    ExpressionKind::Index(Box::new(object), Box::new(index)),
                    rest,
                )
            }
            _ => (ExpressionKind::Identifier(name.clone()), rest),
        },
        TokenType::LeftBracket => {
            let (elements, rest) = list_elements(rest)?;
            (ExpressionKind::List(elements), rest)
        }
        TokenType::LeftBrace => {
            let (pairs, rest) = object_pairs(rest)?;
            (ExpressionKind::Object(pairs), rest)
        }
        token_type => {
            return Err(error_at(
                tokens,
                ParseErrorKind::Unexpected(token_type.clone()),
            ))
        }
    };

    Ok((Expression { kind, span }, rest))
}

/// Comma separated expressions up to and including `closing`.
fn separated<'a>(tokens: &'a [Token], closing: TokenType) -> ParseResult<'a, Vec<Expression>> {
    if next_is(tokens, &closing) {
        return Ok((Vec::new(), &tokens[1..]));
    }

    let (first, mut tokens) = expression(tokens)?;
    let mut items = vec![first];
    while next_is(tokens, &TokenType::Comma) {
        let (item, rest) = expression(&tokens[1..])?;
        items.push(item);
        tokens = rest;
    }

    let tokens = consume(tokens, closing)?;
    Ok((items, tokens))
}

fn arguments<'a>(tokens: &'a [Token]) -> ParseResult<'a, Vec<Expression>> {
    separated(tokens, TokenType::RightParen)
}

fn list_elements<'a>(tokens: &'a [Token]) -> ParseResult<'a, Vec<Expression>> {
    separated(tokens, TokenType::RightBracket)
}

fn object_pairs<'a>(tokens: &'a [Token]) -> ParseResult<'a, Vec<(String, Expression)>> {
    let mut pairs = Vec::new();
    let mut tokens = tokens;

    if next_is(tokens, &TokenType::RightBrace) {
        return Ok((pairs, &tokens[1..]));
    }

    loop {
        let key = match peek(tokens) {
            Some(TokenType::Identifier(key)) | Some(TokenType::String(key)) => key.clone(),
            _ => return Err(error_at(tokens, ParseErrorKind::ExpectedObjectKey)),
        };
        let rest = consume(&tokens[1..], TokenType::Colon)?;
        let (value, rest) = expression(rest)?;
        pairs.push((key, value));
        tokens = rest;

        if next_is(tokens, &TokenType::Comma) {
            tokens = &tokens[1..];
        } else {
            break;
        }
    }

    let tokens = consume(tokens, TokenType::RightBrace)?;
    Ok((pairs, tokens))
}

fn consume(tokens: &[Token], token_type: TokenType) -> Result<&[Token], ParseError> {
    match peek(tokens) {
        Some(t) if t == &token_type => Ok(&tokens[1..]),
        _ => Err(error_at(tokens, ParseErrorKind::Expected(token_type))),
    }
}

fn match_identifier<'a>(tokens: &'a [Token], what: &'static str) -> ParseResult<'a, String> {
    match peek(tokens) {
        Some(TokenType::Identifier(name)) => Ok((name.clone(), &tokens[1..])),
        _ => Err(error_at(tokens, ParseErrorKind::ExpectedName(what))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tokenizer::tokens;

    fn parse(source: &str) -> Program {
        program(&tokens(source).unwrap()).unwrap()
    }

    fn parse_err(source: &str) -> ParseError {
        program(&tokens(source).unwrap()).unwrap_err()
    }

    #[test]
    fn test_flat_left_fold() {
        let program = parse("montre 1 + 2 * 3");
        assert_eq!(program.to_string(), "montre (* (+ 1 2) 3)\n");
    }

    #[test]
    fn test_member_binds_after_arithmetic() {
        let program = parse("a + b.c");
        assert_eq!(program.to_string(), "(+ a b).c\n");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let program = parse("a = b = 3");
        assert_eq!(program.to_string(), "a = b = 3\n");
    }

    #[test]
    fn test_brace_optional_bodies() {
        let program = parse("si x > 5 montre \"big\" sinon montre \"small\"");
        let StatementKind::If(_, then_branch, Some(else_branch)) = &program.0[0].kind else {
            panic!("expected if statement");
        };
        assert_eq!(then_branch.len(), 1);
        assert_eq!(else_branch.len(), 1);
    }

    #[test]
    fn test_print_parentheses_are_optional() {
        let program = parse("montre(1, 2)\nprint 3");
        assert_eq!(program.to_string(), "montre 1, 2\nmontre 3\n");
    }

    #[test]
    fn test_class_declaration() {
        let program = parse(
            "abstrait classe B herite de A { prive fonction f() { renvoie 1 } fonction g(x, y) { renvoie x } }",
        );
        let StatementKind::ClassDeclaration(class) = &program.0[0].kind else {
            panic!("expected class declaration");
        };
        assert!(class.is_abstract);
        assert_eq!(class.superclass.as_deref(), Some("A"));
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.methods[0].visibility, Visibility::Private);
        assert_eq!(class.methods[1].visibility, Visibility::Public);
        assert_eq!(class.methods[1].function.args, vec!["x", "y"]);
    }

    #[test]
    fn test_try_statement() {
        let program = parse("essaye { lance 1 } attrape (e) { montre e } enfin { montre 2 }");
        let StatementKind::Try {
            handler, finalizer, ..
        } = &program.0[0].kind
        else {
            panic!("expected try statement");
        };
        assert_eq!(handler.as_ref().map(|h| h.param.as_str()), Some("e"));
        assert!(finalizer.is_some());
    }

    #[test]
    fn test_literals_and_index() {
        let program = parse("soit o = {nom: \"x\", \"age\": 3}\nsoit l = [1, 2]\nmontre l[0]");
        assert_eq!(
            program.to_string(),
            "soit o = {nom: \"x\", age: 3}\nsoit l = [1, 2]\nmontre l[0]\n"
        );
    }

    #[test]
    fn test_missing_equal_in_declaration() {
        let err = parse_err("soit x 5");
        assert_eq!(err.kind, ParseErrorKind::Expected(TokenType::Equal));
        assert_eq!(err.to_string(), "[Ligne 1, Col 8] '=' attendu");
    }

    #[test]
    fn test_missing_closing_brace_reports_end_of_input() {
        let err = parse_err("fonction f() {\n montre 1");
        assert_eq!(err.kind, ParseErrorKind::Expected(TokenType::RightBrace));
        assert_eq!(err.span.map(|s| s.start_line), Some(2));
    }

    #[test]
    fn test_non_function_class_member() {
        let err = parse_err("classe A { soit x = 1 }");
        assert_eq!(err.kind, ParseErrorKind::NonFunctionClassMember);
    }

    #[test]
    fn test_unexpected_token() {
        let err = parse_err("montre )");
        assert_eq!(err.kind, ParseErrorKind::Unexpected(TokenType::RightParen));
    }
}
