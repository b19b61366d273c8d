use std::fmt::Display;

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Montre,
    Soit,
    Si,
    Sinon,
    Tantque,
    Faire,
    Fonction,
    Renvoie,
    Classe,
    Nouveau,
    Herite,
    De,
    Prive,
    Public,
    Essaye,
    Attrape,
    Enfin,
    Lance,
    Abstrait,
    Interface,
    Inclure,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Keyword> {
        let keyword = match word {
            "montre" => Keyword::Montre,
            "soit" => Keyword::Soit,
            "si" => Keyword::Si,
            "sinon" => Keyword::Sinon,
            "tantque" => Keyword::Tantque,
            "faire" => Keyword::Faire,
            "fonction" => Keyword::Fonction,
            "renvoie" => Keyword::Renvoie,
            "classe" => Keyword::Classe,
            "nouveau" => Keyword::Nouveau,
            "herite" => Keyword::Herite,
            "de" => Keyword::De,
            "prive" => Keyword::Prive,
            "public" => Keyword::Public,
            "essaye" => Keyword::Essaye,
            "attrape" => Keyword::Attrape,
            "enfin" => Keyword::Enfin,
            "lance" => Keyword::Lance,
            "abstrait" => Keyword::Abstrait,
            "interface" => Keyword::Interface,
            "inclure" => Keyword::Inclure,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Montre => "montre",
            Keyword::Soit => "soit",
            Keyword::Si => "si",
            Keyword::Sinon => "sinon",
            Keyword::Tantque => "tantque",
            Keyword::Faire => "faire",
            Keyword::Fonction => "fonction",
            Keyword::Renvoie => "renvoie",
            Keyword::Classe => "classe",
            Keyword::Nouveau => "nouveau",
            Keyword::Herite => "herite",
            Keyword::De => "de",
            Keyword::Prive => "prive",
            Keyword::Public => "public",
            Keyword::Essaye => "essaye",
            Keyword::Attrape => "attrape",
            Keyword::Enfin => "enfin",
            Keyword::Lance => "lance",
            Keyword::Abstrait => "abstrait",
            Keyword::Interface => "interface",
            Keyword::Inclure => "inclure",
        }
    }
}

/// English spellings accepted in place of the French keywords, plus two
/// builtin names. Applied before keyword classification.
pub fn canonical_word(word: &str) -> &str {
    match word {
        "print" => "montre",
        "let" => "soit",
        "if" => "si",
        "else" => "sinon",
        "while" => "tantque",
        "do" => "faire",
        "function" => "fonction",
        "return" => "renvoie",
        "class" => "classe",
        "new" => "nouveau",
        "inherits" => "herite",
        "private" => "prive",
        "try" => "essaye",
        "catch" => "attrape",
        "finally" => "enfin",
        "throw" => "lance",
        "abstract" => "abstrait",
        "include" => "inclure",
        "port_scan" => "scan_ports",
        "http_request" | "fetch" => "requete_http",
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Number,
    String,
    Operator,
    Punctuation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Operators
    LeftParen,
    RightParen,
    Plus,
    Minus,
    Star,
    Slash,
    Equal,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    // Punctuation
    Comma,
    Colon,
    Dot,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    // Literals
    Identifier(String),
    String(String),
    Number(f64),

    Keyword(Keyword),
}

impl TokenType {
    pub fn kind(&self) -> TokenKind {
        match self {
            TokenType::LeftParen
            | TokenType::RightParen
            | TokenType::Plus
            | TokenType::Minus
            | TokenType::Star
            | TokenType::Slash
            | TokenType::Equal
            | TokenType::EqualEqual
            | TokenType::BangEqual
            | TokenType::Less
            | TokenType::LessEqual
            | TokenType::Greater
            | TokenType::GreaterEqual => TokenKind::Operator,
            TokenType::Comma
            | TokenType::Colon
            | TokenType::Dot
            | TokenType::LeftBracket
            | TokenType::RightBracket
            | TokenType::LeftBrace
            | TokenType::RightBrace => TokenKind::Punctuation,
            TokenType::Identifier(_) => TokenKind::Identifier,
            TokenType::String(_) => TokenKind::String,
            TokenType::Number(_) => TokenKind::Number,
            TokenType::Keyword(_) => TokenKind::Keyword,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, TokenType::Keyword(k) if *k == keyword)
    }
}

impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::Plus => write!(f, "+"),
            TokenType::Minus => write!(f, "-"),
            TokenType::Star => write!(f, "*"),
            TokenType::Slash => write!(f, "/"),
            TokenType::Equal => write!(f, "="),
            TokenType::EqualEqual => write!(f, "=="),
            TokenType::BangEqual => write!(f, "!="),
            TokenType::Less => write!(f, "<"),
            TokenType::LessEqual => write!(f, "<="),
            TokenType::Greater => write!(f, ">"),
            TokenType::GreaterEqual => write!(f, ">="),
            TokenType::Comma => write!(f, ","),
            TokenType::Colon => write!(f, ":"),
            TokenType::Dot => write!(f, "."),
            TokenType::LeftBracket => write!(f, "["),
            TokenType::RightBracket => write!(f, "]"),
            TokenType::LeftBrace => write!(f, "{{"),
            TokenType::RightBrace => write!(f, "}}"),
            TokenType::Identifier(name) => write!(f, "{}", name),
            TokenType::String(s) => write!(f, "\"{}\"", s),
            TokenType::Number(n) => write!(f, "{}", n),
            TokenType::Keyword(keyword) => write!(f, "{}", keyword.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub span: Span,
}

impl Token {
    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }
}

#[derive(Debug, thiserror::Error)]
#[error("[Ligne {line}, Col {column}] {kind}")]
pub struct TokenizeError {
    pub kind: TokenErrorKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum TokenErrorKind {
    #[error("Caractère inattendu: {0}")]
    UnexpectedCharacter(char),
    #[error("'!' inattendu, attendu '!='")]
    LoneBang,
    #[error("Chaîne non terminée")]
    UnterminatedString,
}

pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();

    while let Some(token) = tokenizer.token()? {
        tokens.push(token);
    }

    Ok(tokens)
}

pub struct Tokenizer<'a> {
    remaining: &'a str,
    line: usize,
    column: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            remaining: source,
            line: 1,
            column: 1,
        }
    }

    /// Returns the next token, or `None` once the source is exhausted.
    pub fn token(&mut self) -> Result<Option<Token>, TokenizeError> {
        self.skip_trivia();

        let Some(first) = self.remaining.chars().next() else {
            return Ok(None);
        };

        let (line, column) = (self.line, self.column);
        let Some((token_type, rest)) = maximal(
            &[
                left_paren,
                right_paren,
                plus,
                minus,
                star,
                slash,
                equal,
                equal_equal,
                bang_equal,
                less,
                less_equal,
                greater,
                greater_equal,
                comma,
                colon,
                dot,
                left_bracket,
                right_bracket,
                left_brace,
                right_brace,
                word,
                string,
                number,
            ],
            self.remaining,
        ) else {
            let kind = match first {
                '!' => TokenErrorKind::LoneBang,
                '"' => TokenErrorKind::UnterminatedString,
                c => TokenErrorKind::UnexpectedCharacter(c),
            };
            return Err(TokenizeError { kind, line, column });
        };

        // Strings advance the column over embedded newlines without touching
        // the line counter; diagnostics after a multi-line string rely on it.
        let consumed = &self.remaining[..self.remaining.len() - rest.len()];
        self.column += consumed.chars().count();
        self.remaining = rest;

        Ok(Some(Token {
            token_type,
            span: Span::new(line, column, self.line, self.column),
        }))
    }

    fn skip_trivia(&mut self) {
        loop {
            let mut chars = self.remaining.chars();
            match chars.next() {
                Some('\n') => {
                    self.line += 1;
                    self.column = 1;
                    self.remaining = chars.as_str();
                }
                Some(c) if c.is_whitespace() => {
                    self.column += 1;
                    self.remaining = chars.as_str();
                }
                Some('#') => {
                    let len = self.remaining.find('\n').unwrap_or(self.remaining.len());
                    self.remaining = &self.remaining[len..];
                }
                _ => return,
            }
        }
    }
}

fn maximal<'a, T: std::fmt::Debug>(
    parsers: &[fn(&str) -> Option<(T, &str)>],
    source: &'a str,
) -> Option<(T, &'a str)> {
    let mut min_left = source.len() + 1;
    let mut max_match = None;

    let matching_parsers = parsers.iter().filter_map(|parser| parser(source));
    for (m, rest) in matching_parsers {
        let left = rest.len();
        if left < min_left {
            min_left = left;
            max_match = Some((m, rest));
        }
    }

    max_match
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            source.strip_prefix($word).map(|rest| ($token, rest))
        }
    };
}

match_literal! { left_paren, "(", TokenType::LeftParen }
match_literal! { right_paren, ")", TokenType::RightParen }
match_literal! { plus, "+", TokenType::Plus }
match_literal! { minus, "-", TokenType::Minus }
match_literal! { star, "*", TokenType::Star }
match_literal! { slash, "/", TokenType::Slash }
match_literal! { equal, "=", TokenType::Equal }
match_literal! { equal_equal, "==", TokenType::EqualEqual }
match_literal! { bang_equal, "!=", TokenType::BangEqual }
match_literal! { less, "<", TokenType::Less }
match_literal! { less_equal, "<=", TokenType::LessEqual }
match_literal! { greater, ">", TokenType::Greater }
match_literal! { greater_equal, ">=", TokenType::GreaterEqual }
match_literal! { comma, ",", TokenType::Comma }
match_literal! { colon, ":", TokenType::Colon }
match_literal! { dot, ".", TokenType::Dot }
match_literal! { left_bracket, "[", TokenType::LeftBracket }
match_literal! { right_bracket, "]", TokenType::RightBracket }
match_literal! { left_brace, "{", TokenType::LeftBrace }
match_literal! { right_brace, "}", TokenType::RightBrace }

fn word(source: &str) -> Option<(TokenType, &str)> {
    let mut chars = source.chars();

    let first = chars.next()?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return None;
    }

    let len = first.len_utf8()
        + chars
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum::<usize>();

    let word = canonical_word(&source[..len]);
    let token_type = match Keyword::from_word(word) {
        Some(keyword) => TokenType::Keyword(keyword),
        None => TokenType::Identifier(word.to_string()),
    };
    Some((token_type, &source[len..]))
}

fn string(source: &str) -> Option<(TokenType, &str)> {
    let body = source.strip_prefix('"')?;
    let end = body.find('"')?;
    Some((
        TokenType::String(body[..end].to_string()),
        &body[end + 1..],
    ))
}

fn number(source: &str) -> Option<(TokenType, &str)> {
    let digits = |s: &str| s.chars().take_while(char::is_ascii_digit).count();

    let mut len = digits(source);
    if len == 0 {
        return None;
    }

    if let Some(fraction) = source[len..].strip_prefix('.') {
        let fraction_len = digits(fraction);
        if fraction_len > 0 {
            len += 1 + fraction_len;
        }
    }

    let value = source[..len].parse().ok()?;
    Some((TokenType::Number(value), &source[len..]))
}

#[cfg(test)]
mod test {
    use super::*;

    fn token_types(source: &str) -> Vec<TokenType> {
        tokens(source)
            .unwrap()
            .into_iter()
            .map(|token| token.token_type)
            .collect()
    }

    #[test]
    fn test_tokens() {
        let expected = vec![
            TokenType::Keyword(Keyword::Soit),
            TokenType::Identifier("x".to_string()),
            TokenType::Equal,
            TokenType::Number(1.0),
        ];
        assert_eq!(token_types("soit x = 1"), expected);
    }

    #[test]
    fn test_tokens_with_comments() {
        let expected = vec![
            TokenType::Keyword(Keyword::Soit),
            TokenType::Identifier("x".to_string()),
            TokenType::Equal,
            TokenType::Number(1.5),
        ];
        assert_eq!(token_types("soit x = 1.5 # commentaire\n# encore"), expected);
    }

    #[test]
    fn test_english_aliases() {
        let expected = vec![
            TokenType::Keyword(Keyword::Soit),
            TokenType::Identifier("r".to_string()),
            TokenType::Equal,
            TokenType::Identifier("requete_http".to_string()),
            TokenType::LeftParen,
            TokenType::String("http://x".to_string()),
            TokenType::RightParen,
        ];
        assert_eq!(token_types("let r = fetch(\"http://x\")"), expected);
        assert_eq!(
            token_types("port_scan"),
            vec![TokenType::Identifier("scan_ports".to_string())]
        );
    }

    #[test]
    fn test_two_character_operators() {
        let expected = vec![
            TokenType::Identifier("a".to_string()),
            TokenType::LessEqual,
            TokenType::Identifier("b".to_string()),
            TokenType::Less,
            TokenType::Identifier("c".to_string()),
            TokenType::BangEqual,
            TokenType::Identifier("d".to_string()),
            TokenType::EqualEqual,
            TokenType::Number(2.0),
        ];
        assert_eq!(token_types("a<=b<c!=d==2"), expected);
    }

    #[test]
    fn test_number_without_fraction_digits() {
        let expected = vec![
            TokenType::Number(3.0),
            TokenType::Dot,
            TokenType::Identifier("x".to_string()),
        ];
        assert_eq!(token_types("3.x"), expected);
    }

    #[test]
    fn test_positions() {
        let tokens = tokens("soit x\n  montre x").unwrap();
        let positions: Vec<_> = tokens
            .iter()
            .map(|t| (t.span.start_line, t.span.start_column))
            .collect();
        assert_eq!(positions, vec![(1, 1), (1, 6), (2, 3), (2, 10)]);
    }

    #[test]
    fn test_multiline_string_keeps_line_counter() {
        let tokens = tokens("\"a\nb\" x").unwrap();
        assert_eq!(tokens[0].token_type, TokenType::String("a\nb".to_string()));
        assert_eq!((tokens[1].span.start_line, tokens[1].span.start_column), (1, 7));
    }

    #[test]
    fn test_lone_bang() {
        let err = tokens("a ! b").unwrap_err();
        assert_eq!(err.kind, TokenErrorKind::LoneBang);
        assert_eq!((err.line, err.column), (1, 3));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokens("montre \"abc").unwrap_err();
        assert_eq!(err.kind, TokenErrorKind::UnterminatedString);
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokens("soit x = 1 @").unwrap_err();
        assert_eq!(err.kind, TokenErrorKind::UnexpectedCharacter('@'));
        assert_eq!(err.to_string(), "[Ligne 1, Col 12] Caractère inattendu: @");
    }
}
