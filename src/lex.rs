//! Análisis léxico.
//!
//! # Tokenization
//! Esta es la primera fase del compilador. Descompone un [`InputStream`]
//! (flujo de caracteres) en unidades léxicas denominadas tokens. Los espacios
//! en blanco y los comentarios se descartan durante esta operación. Cada
//! token emitido esta asociado a una ubicación en el código fuente original,
//! lo cual permite rastrear errores en tanto los mismos como constructos
//! más elevados de fases posteriores.
//!
//! # Contenido de un token
//! Operadores, puntuación y palabras clave se identifican por el hecho de lo
//! que son y no incluyen lexemas. Los identificadores sí incluyen su lexema
//! original. Las constantes literales se resuelven a sus valores, incluyendo
//! las secuencias de escape de caracteres y strings.
//!
//! # Directivas
//! La única directiva reconocida es `#include`, que se emite como
//! [`Token::Include`]. La expansión textual ocurre en [`crate::include`].
//!
//! # Errores
//! El lexer es capaz de recuperarse parcialmente de condiciones de error.
//! Esto ocurre en suficiente grado como para reportar más de un error por
//! ejecución, pero no lo suficiente como para permitir el avance a las
//! demás fases de la compilación.

use crate::source::{InputStream, Located, Location};
use std::{
    fmt::{self, Display},
    iter::Peekable,
    rc::Rc,
    str::FromStr,
};

use thiserror::Error;

/// Literal entero máximo, el ancho de una dirección.
const INT_MAX: u32 = u16::MAX as u32;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LexerError {
    /// Error de E/S originado por el [`InputStream`].
    #[error("I/O error")]
    Input(#[from] std::io::Error),

    /// Carácter desconocido o inesperado en el flujo de entrada.
    #[error("Bad character {0:?} in input stream")]
    BadChar(char),

    /// Se esperaba un carácter específico en esta posición.
    #[error("Expected {0:?}")]
    Expected(char),

    /// Una constante entera se encuentra fuera de rango.
    #[error("Integer literal overflow, valid range is [0, {INT_MAX}]")]
    IntOverflow,

    /// `0x` sin dígitos hexadecimales.
    #[error("Expected hexadecimal digits after `0x`")]
    MissingHexDigits,

    /// Literal de carácter o de string sin cerrar.
    #[error("Unterminated literal")]
    Unterminated,

    /// Comentario `/* */` sin cerrar.
    #[error("Unterminated block comment")]
    UnterminatedComment,

    /// Literal de carácter sin contenido.
    #[error("Empty character literal")]
    EmptyChar,

    /// Secuencia de escape desconocida.
    #[error("Unknown escape sequence `\\{0}`")]
    BadEscape(char),

    /// Directiva de preprocesador distinta de `#include`.
    #[error("Unknown directive `#{0}`")]
    UnknownDirective(String),

    /// `#include` no seguido de una ruta literal.
    #[error("Expected a quoted path after `#include`")]
    MissingIncludePath,

    /// Un archivo incluido no pudo abrirse.
    #[error("Cannot include `{path}`: {error}")]
    Include {
        path: String,
        error: std::io::Error,
    },
}

/// Un identificador.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Rc<str>);

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(Rc::from(name))
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(&self.0)
    }
}

/// Objeto resultante del análisis léxico.
///
/// Un token contiene suficiente información para describir completamente
/// a una entidad léxica en el programa fuente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Identificador.
    Id(Identifier),

    /// Palabra clave.
    Keyword(Keyword),

    /// Literal de entero.
    IntLiteral(u16),

    /// Literal de carácter, ya resuelto a su byte.
    CharLiteral(u8),

    /// Literal de string, sin el terminador nulo.
    StrLiteral(Vec<u8>),

    /// `#include`
    Include,

    /// `=`
    Assign,

    /// `,`
    Comma,

    /// `;`
    Semicolon,

    /// `(`
    OpenParen,

    /// `)`
    CloseParen,

    /// `{`
    OpenCurly,

    /// `}`
    CloseCurly,

    /// `+`
    Plus,

    /// `-`
    Minus,

    /// `*`
    Times,

    /// `/`
    Divide,

    /// `&`
    Ampersand,

    /// `|`
    Pipe,

    /// `==`
    Equal,

    /// `!=`
    NotEqual,

    /// `<`
    Less,

    /// `<=`
    LessOrEqual,

    /// `>`
    Greater,

    /// `>=`
    GreaterOrEqual,

    /// `<<`
    ShiftLeft,

    /// `>>`
    ShiftRight,

    /// `++`
    Increment,

    /// `--`
    Decrement,
}

impl Display for Token {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Token::*;

        match self {
            Id(id) => write!(fmt, "identifier `{}`", id),
            Keyword(keyword) => write!(fmt, "keyword `{}`", keyword),
            IntLiteral(integer) => write!(fmt, "literal `{}`", integer),
            CharLiteral(byte) => write!(fmt, "character literal {:?}", *byte as char),
            StrLiteral(_) => fmt.write_str("string literal"),
            Include => fmt.write_str("`#include`"),
            Assign => fmt.write_str("`=`"),
            Comma => fmt.write_str("`,`"),
            Semicolon => fmt.write_str("`;`"),
            OpenParen => fmt.write_str("`(`"),
            CloseParen => fmt.write_str("`)`"),
            OpenCurly => fmt.write_str("`{`"),
            CloseCurly => fmt.write_str("`}`"),
            Plus => fmt.write_str("`+`"),
            Minus => fmt.write_str("`-`"),
            Times => fmt.write_str("`*`"),
            Divide => fmt.write_str("`/`"),
            Ampersand => fmt.write_str("`&`"),
            Pipe => fmt.write_str("`|`"),
            Equal => fmt.write_str("`==`"),
            NotEqual => fmt.write_str("`!=`"),
            Less => fmt.write_str("`<`"),
            LessOrEqual => fmt.write_str("`<=`"),
            Greater => fmt.write_str("`>`"),
            GreaterOrEqual => fmt.write_str("`>=`"),
            ShiftLeft => fmt.write_str("`<<`"),
            ShiftRight => fmt.write_str("`>>`"),
            Increment => fmt.write_str("`++`"),
            Decrement => fmt.write_str("`--`"),
        }
    }
}

/// Una palabra clave.
///
/// Los nombres de tipo (`void`, `char`, `int`) también son palabras clave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Void,
    Char,
    Int,
    Extern,
    Return,
    If,
    Else,
    While,
}

impl Keyword {
    /// Determina si la palabra clave nombra un tipo primitivo.
    pub fn is_type(self) -> bool {
        matches!(self, Keyword::Void | Keyword::Char | Keyword::Int)
    }
}

impl Display for Keyword {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Keyword::*;
        let string = match self {
            Void   => "void",
            Char   => "char",
            Int    => "int",
            Extern => "extern",
            Return => "return",
            If     => "if",
            Else   => "else",
            While  => "while",
        };

        fmt.write_str(string)
    }
}

impl FromStr for Keyword {
    type Err = ();

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        use Keyword::*;

        const KEYWORDS: &[(&str, Keyword)] = &[
            ("void",   Void),
            ("char",   Char),
            ("int",    Int),
            ("extern", Extern),
            ("return", Return),
            ("if",     If),
            ("else",   Else),
            ("while",  While),
        ];

        KEYWORDS
            .iter()
            .find(|&&(name, _)| name == string)
            .map(|&(_, keyword)| keyword)
            .ok_or(())
    }
}

/// Máquina de estados para análisis léxico.
///
/// Un lexer puede encontrarse en uno de diversos estados. La
/// salida del lexer, así como su siguiente estado, se define
/// a partir de tanto su estado actual como el siguiente carácter
/// encontrado en el flujo de entrada.
pub struct Lexer<S: Iterator> {
    source: Peekable<S>,
    state: State,
    start: Location,
    last: Location,
}

/// Posibles estados del lexer.
enum State {
    /// Estado que ocurre antes de encontrar el inicio de un token.
    Start,

    /// Estado de error.
    Error,

    /// Estado de completitud; siempre emite el token incluido,
    /// consume la entrada actual y pasa a [`State::Start`].
    Complete(Token),

    /// Se encontró `=`, puede seguir otro `=`.
    Equals,

    /// Se encontró `!`, debe seguir `=`.
    Bang,

    /// Se encontró `<`.
    Less,

    /// Se encontró `>`.
    Greater,

    /// Se encontró `+`.
    Plus,

    /// Se encontró `-`.
    Minus,

    /// Se encontró `/`, puede iniciar un comentario.
    Slash,

    /// Comentario de línea.
    ///
    /// Este estado vuelve a [`State::Start`] al encontrar `'\n'`.
    Comment,

    /// Comentario de bloque.
    BlockComment,

    /// Se encontró `*` dentro de un comentario de bloque.
    BlockCommentStar,

    /// Se encontró un `0` inicial, puede seguir `x`.
    Zero,

    /// Constante entera decimal.
    ///
    /// Este estado incluirá dígitos en el token mientras que
    /// el siguiente carácter sea un dígito.
    Integer(u32),

    /// Constante entera hexadecimal, `None` antes del primer dígito.
    Hex(Option<u32>),

    /// Se abrió un literal de carácter.
    CharOpen,

    /// Secuencia de escape dentro de un literal de carácter.
    CharEscape,

    /// Literal de carácter completo, falta la comilla de cierre.
    CharClose(u8),

    /// Contenido de un literal de string.
    Str(Vec<u8>),

    /// Secuencia de escape dentro de un literal de string.
    StrEscape(Vec<u8>),

    /// Nombre de directiva tras `#`.
    Directive(String),

    /// Término que puede ser un identificador o una palabra clave.
    Word(String),
}

impl<S: InputStream> Lexer<S> {
    /// Crea un lexer en estado inicial a partir de un flujo.
    pub fn new(start: Location, source: S) -> Self {
        let last = start.clone();
        Lexer {
            source: source.peekable(),
            state: State::Start,
            start,
            last,
        }
    }

    /// Reduce la entrada a sea una secuencia conocida de tokens
    /// infalibles o una secuencia de errores.
    ///
    /// En caso de que ocurra al menos un error, el lexer dejará
    /// de buscar tokens exitosos y comenzará a acumular solamente
    /// errores. El propósito de esta función es permitir la
    /// recolección de múltiples errores léxicos en una misma ejecución
    /// del compilador.
    pub fn try_exhaustive(mut self) -> Result<Vec<Located<Token>>, Vec<Located<LexerError>>> {
        let mut tokens = Vec::new();

        while let Some(result) = self.next() {
            match result {
                Ok(token) => tokens.push(token),
                Err(error) => {
                    drop(tokens);

                    let mut errors = vec![error];
                    errors.extend(self.filter_map(Result::err));

                    return Err(errors);
                }
            }
        }

        Ok(tokens)
    }

    /// Intenta construir un siguiente token.
    fn lex(&mut self) -> Result<Option<Token>, LexerError> {
        use State::*;

        loop {
            // Un error de E/S se propaga de inmediato
            if let Some(Err(_)) = self.source.peek() {
                if let Some(Err(error)) = self.source.next() {
                    return Err(error.into());
                }
            }

            let (next_char, next_location) = match self.source.peek() {
                Some(Ok((c, location))) => (Some(*c), Some(location.clone())),
                _ => (None, None),
            };

            // La posición de origen se mueve junto a la posición
            // siguiente siempre que no se haya encontrado una
            // frontera de token
            if let (Start, Some(location)) = (&self.state, next_location) {
                self.start = location;
            }

            // Switch table principal, determina cambios de estado
            // y de salida del lexer a partir de combinaciones del
            // estado actual y el siguiente carácter
            match (&mut self.state, next_char) {
                // Condiciones de error: se descarta la línea donde
                // ocurrió el error. Al llegar al final de la línea
                // el lexer se recupera y reinicia.
                (Error, None) => return Ok(None),
                (Error, Some('\n')) => self.state = Start,
                (Error, Some(_)) => (),

                // Tokens triviales
                (Start, None) => return Ok(None),
                (Start, Some(',')) => self.state = Complete(Token::Comma),
                (Start, Some(';')) => self.state = Complete(Token::Semicolon),
                (Start, Some('(')) => self.state = Complete(Token::OpenParen),
                (Start, Some(')')) => self.state = Complete(Token::CloseParen),
                (Start, Some('{')) => self.state = Complete(Token::OpenCurly),
                (Start, Some('}')) => self.state = Complete(Token::CloseCurly),
                (Start, Some('*')) => self.state = Complete(Token::Times),
                (Start, Some('&')) => self.state = Complete(Token::Ampersand),
                (Start, Some('|')) => self.state = Complete(Token::Pipe),

                // Inicios de operadores de uno o dos caracteres
                (Start, Some('=')) => self.state = Equals,
                (Start, Some('!')) => self.state = Bang,
                (Start, Some('<')) => self.state = Less,
                (Start, Some('>')) => self.state = Greater,
                (Start, Some('+')) => self.state = Plus,
                (Start, Some('-')) => self.state = Minus,
                (Start, Some('/')) => self.state = Slash,

                // Literales y directivas
                (Start, Some('\'')) => self.state = CharOpen,
                (Start, Some('"')) => self.state = Str(Vec::new()),
                (Start, Some('#')) => self.state = Directive(String::new()),

                // Identificadores y palabras clave
                (Start, Some(c)) if c.is_ascii_alphabetic() || c == '_' => {
                    self.state = Word(c.to_string())
                }

                // Inicio de una constante numérica. Un cero inicial
                // puede introducir una constante hexadecimal. Otros
                // dígitos no se consumen aquí, ya que esta lógica ya
                // está implementada en el caso de constante entera.
                (Start, Some('0')) => self.state = Zero,
                (Start, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }

                // Espacios en blanco y caracteres inesperados
                (Start, Some(c)) if c.is_ascii_whitespace() => (),
                (Start, Some(c)) => return Err(LexerError::BadChar(c)),

                // Emisión retardada de tokens cualesquiera
                (Complete(value), _) => return Ok(Some(std::mem::replace(value, Token::Comma))),

                (Equals, Some('=')) => self.state = Complete(Token::Equal),
                (Equals, _) => return Ok(Some(Token::Assign)),

                (Bang, Some('=')) => self.state = Complete(Token::NotEqual),
                (Bang, _) => return Err(LexerError::Expected('=')),

                (Less, Some('=')) => self.state = Complete(Token::LessOrEqual),
                (Less, Some('<')) => self.state = Complete(Token::ShiftLeft),
                (Less, _) => return Ok(Some(Token::Less)),

                (Greater, Some('=')) => self.state = Complete(Token::GreaterOrEqual),
                (Greater, Some('>')) => self.state = Complete(Token::ShiftRight),
                (Greater, _) => return Ok(Some(Token::Greater)),

                (Plus, Some('+')) => self.state = Complete(Token::Increment),
                (Plus, _) => return Ok(Some(Token::Plus)),

                (Minus, Some('-')) => self.state = Complete(Token::Decrement),
                (Minus, _) => return Ok(Some(Token::Minus)),

                // `/` puede iniciar cualquiera de los dos tipos de comentario
                (Slash, Some('/')) => self.state = Comment,
                (Slash, Some('*')) => self.state = BlockComment,
                (Slash, _) => return Ok(Some(Token::Divide)),

                // Los comentarios de línea descartan la línea donde ocurren
                (Comment, Some('\n')) | (Comment, None) => self.state = Start,
                (Comment, Some(_)) => (),

                (BlockComment, Some('*')) => self.state = BlockCommentStar,
                (BlockComment, Some(_)) => (),
                (BlockCommentStar, Some('/')) => self.state = Start,
                (BlockCommentStar, Some('*')) => (),
                (BlockCommentStar, Some(_)) => self.state = BlockComment,
                (BlockComment, None) | (BlockCommentStar, None) => {
                    return Err(LexerError::UnterminatedComment)
                }

                (Zero, Some('x')) | (Zero, Some('X')) => self.state = Hex(None),
                (Zero, Some(c)) if c.is_ascii_digit() => {
                    self.state = Integer(0);
                    continue;
                }
                (Zero, _) => return Ok(Some(Token::IntLiteral(0))),

                // Acumulación dígito por dígito de constantes enteras
                (Integer(accumulated), Some(digit)) if digit.is_ascii_digit() => {
                    let digit = digit.to_digit(10).unwrap_or(0);
                    *accumulated = accumulate(*accumulated, 10, digit)?;
                }

                // Si sigue algo que no es un dígito, la constante a terminado
                (Integer(integer), _) => return Ok(Some(Token::IntLiteral(*integer as u16))),

                (Hex(accumulated), Some(digit)) if digit.is_ascii_hexdigit() => {
                    let digit = digit.to_digit(16).unwrap_or(0);
                    *accumulated = Some(accumulate(accumulated.unwrap_or(0), 16, digit)?);
                }

                (Hex(None), _) => return Err(LexerError::MissingHexDigits),
                (Hex(Some(integer)), _) => return Ok(Some(Token::IntLiteral(*integer as u16))),

                // Literales de carácter: exactamente un byte entre comillas
                (CharOpen, Some('\\')) => self.state = CharEscape,
                (CharOpen, Some('\'')) => return Err(LexerError::EmptyChar),
                (CharOpen, Some('\n')) | (CharOpen, None) => return Err(LexerError::Unterminated),
                (CharOpen, Some(c)) => self.state = CharClose(byte_of(c)?),

                (CharEscape, Some(c)) => self.state = CharClose(escape(c)?),
                (CharEscape, None) => return Err(LexerError::Unterminated),

                (CharClose(byte), Some('\'')) => self.state = Complete(Token::CharLiteral(*byte)),
                (CharClose(_), _) => return Err(LexerError::Expected('\'')),

                // Literales de string
                (Str(bytes), Some('"')) => {
                    self.state = Complete(Token::StrLiteral(std::mem::take(bytes)))
                }

                (Str(bytes), Some('\\')) => self.state = StrEscape(std::mem::take(bytes)),
                (Str(_), Some('\n')) | (Str(_), None) => return Err(LexerError::Unterminated),
                (Str(bytes), Some(c)) => bytes.push(byte_of(c)?),

                (StrEscape(bytes), Some(c)) => {
                    let mut bytes = std::mem::take(bytes);
                    bytes.push(escape(c)?);
                    self.state = Str(bytes);
                }

                (StrEscape(_), None) => return Err(LexerError::Unterminated),

                // Directivas de preprocesador
                (Directive(name), Some(c)) if c.is_ascii_alphabetic() => name.push(c),
                (Directive(name), _) => {
                    return match name.as_str() {
                        "include" => Ok(Some(Token::Include)),
                        _ => Err(LexerError::UnknownDirective(std::mem::take(name))),
                    };
                }

                // Extensión de términos
                (Word(word), Some(c)) if is_word_char(c) => word.push(c),

                // Si sigue algo que no puede formar parte del término, ha terminado
                (Word(word), _) => {
                    let token = match self::Keyword::from_str(word) {
                        Ok(keyword) => Token::Keyword(keyword),
                        Err(()) => Token::Id(Identifier::from(word.as_str())),
                    };

                    return Ok(Some(token));
                }
            }

            // Si no hubo `continue`, aquí se consume el carácter que
            // se observó con lookahead anteriormente
            if let Some(Ok((_, location))) = self.source.next() {
                self.last = location;
            }
        }
    }
}

impl<S: InputStream> Iterator for Lexer<S> {
    type Item = Result<Located<Token>, Located<LexerError>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lex() {
            Ok(None) => None,
            Ok(Some(token)) => {
                self.state = State::Start;

                let location = Location::span(self.start.clone(), &self.last);
                Some(Ok(Located::at(token, location)))
            }

            Err(error) => {
                self.state = State::Error;
                Some(Err(Located::at(error, self.start.clone())))
            }
        }
    }
}

/// Agrega un dígito a una constante, fallando fuera de rango.
fn accumulate(accumulated: u32, radix: u32, digit: u32) -> Result<u32, LexerError> {
    accumulated
        .checked_mul(radix)
        .and_then(|n| n.checked_add(digit))
        .filter(|&n| n <= INT_MAX)
        .ok_or(LexerError::IntOverflow)
}

/// Resuelve el carácter que sigue a `\` en un literal.
fn escape(c: char) -> Result<u8, LexerError> {
    match c {
        'n' => Ok(b'\n'),
        't' => Ok(b'\t'),
        'r' => Ok(b'\r'),
        '0' => Ok(0),
        '\\' => Ok(b'\\'),
        '\'' => Ok(b'\''),
        '"' => Ok(b'"'),
        _ => Err(LexerError::BadEscape(c)),
    }
}

/// La máquina objetivo solo conoce bytes, por lo cual se rechaza
/// cualquier carácter fuera de ASCII.
fn byte_of(c: char) -> Result<u8, LexerError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(LexerError::BadChar(c))
    }
}

/// Determina si un carácter puede pertenecer a un término.
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source;

    fn lex(input: &str) -> Result<Vec<Token>, Vec<LexerError>> {
        let (start, stream) = source::consume(input.as_bytes(), "<test>");
        Lexer::new(start, stream)
            .try_exhaustive()
            .map(|tokens| tokens.into_iter().map(Located::into_inner).collect())
            .map_err(|errors| errors.into_iter().map(Located::into_inner).collect())
    }

    fn id(name: &str) -> Token {
        Token::Id(Identifier::from(name))
    }

    #[test]
    fn function_header() {
        let tokens = lex("char main() { return 5; }").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Char),
                id("main"),
                Token::OpenParen,
                Token::CloseParen,
                Token::OpenCurly,
                Token::Keyword(Keyword::Return),
                Token::IntLiteral(5),
                Token::Semicolon,
                Token::CloseCurly,
            ]
        );
    }

    #[test]
    fn two_character_operators() {
        let tokens = lex("a == b != c <= d >= e << f >> g ++ --").unwrap();
        let operators: Vec<_> = tokens
            .into_iter()
            .filter(|token| !matches!(token, Token::Id(_)))
            .collect();

        assert_eq!(
            operators,
            vec![
                Token::Equal,
                Token::NotEqual,
                Token::LessOrEqual,
                Token::GreaterOrEqual,
                Token::ShiftLeft,
                Token::ShiftRight,
                Token::Increment,
                Token::Decrement,
            ]
        );
    }

    #[test]
    fn literals_resolve_to_values() {
        let tokens = lex(r#"0x7000 0 255 '\n' 'A' "hi\0""#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::IntLiteral(0x7000),
                Token::IntLiteral(0),
                Token::IntLiteral(255),
                Token::CharLiteral(b'\n'),
                Token::CharLiteral(b'A'),
                Token::StrLiteral(b"hi\0".to_vec()),
            ]
        );
    }

    #[test]
    fn comments_are_discarded() {
        let tokens = lex("a // line\n/* block\n * more */ b / c").unwrap();
        assert_eq!(tokens, vec![id("a"), id("b"), Token::Divide, id("c")]);
    }

    #[test]
    fn include_directive() {
        let tokens = lex("#include \"io.h\"\n").unwrap();
        assert_eq!(tokens, vec![Token::Include, Token::StrLiteral(b"io.h".to_vec())]);
    }

    #[test]
    fn overflow_is_reported() {
        let errors = lex("char x = 65536;").unwrap_err();
        assert!(matches!(errors.as_slice(), [LexerError::IntOverflow]));
    }

    #[test]
    fn errors_recover_at_line_end() {
        let errors = lex("a @ b\n\"open\nc $").unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [
                LexerError::BadChar('@'),
                LexerError::Unterminated,
                LexerError::BadChar('$')
            ]
        ));
    }

    #[test]
    fn token_locations() {
        let (start, stream) = source::consume("char  value;".as_bytes(), "<test>");
        let tokens = Lexer::new(start, stream).try_exhaustive().unwrap();

        let value = tokens[1].location();
        assert_eq!((value.start().line(), value.start().column()), (1, 7));
        assert_eq!(value.end().column(), 12);
    }
}
