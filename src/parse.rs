//! Análisis sintáctico y semántico.
//!
//! El parser es de descenso recursivo y resuelve ámbitos y tipos a la
//! par que reconoce la gramática. No existen pasadas posteriores sobre
//! el árbol: cada nodo sale de aquí con su tipo, su ámbito y, para
//! referencias a variables, su símbolo ya resuelto.
//!
//! Las coerciones dudosas no detienen el análisis. Se acumulan como
//! advertencias y se entregan junto al programa.

use std::rc::Rc;
use thiserror::Error;

use crate::{
    ast::{BinOp, Block, Expr, ExprKind, Function, Item, Program, Statement, UnOp, Variable},
    lex::{Identifier, Keyword, Token},
    scope::{ScopeError, ScopeId, Scopes, Symbol},
    source::{Located, Location},
    types::{self, Type, TypeError, Warning},
};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Expected {0}, found {1} instead")]
    UnexpectedToken(Token, Token),

    #[error("Expected {0}, none was found instead")]
    MissingToken(Token),

    #[error("Expected identifier")]
    ExpectedId,

    #[error("Expected any of `void`, `char`, `int`")]
    ExpectedType,

    #[error("Expected an expression")]
    ExpectedExpr,

    #[error("Abrupt end of program")]
    UnexpectedEof,

    #[error("Variable `{0}` cannot have type `void`")]
    VoidVariable(Identifier),

    #[error("Initializer for global `{0}` is not a constant expression")]
    NotConstant(Identifier),

    #[error("Extern declaration `{0}` cannot have an initializer")]
    ExternInitializer(Identifier),

    #[error("`{0}` is not a function")]
    NotAFunction(Identifier),

    #[error("Function `{0}` cannot be used as a value")]
    FunctionValue(Identifier),

    #[error("Function `{name}` takes {expected} arguments, but {found} were given")]
    Arity {
        name: Identifier,
        expected: usize,
        found: usize,
    },

    #[error("Cannot dereference non-pointer type `{0}`")]
    DerefNonPointer(Type),

    #[error("Expression is not assignable")]
    NotAssignable,

    #[error("Cannot take the address of this expression")]
    NotAddressable,

    #[error("Expression of type `void` cannot be used as a value")]
    VoidValue,

    #[error("Function returning `void` cannot return a value")]
    ReturnInVoid,

    #[error("Missing return value for function returning `{0}`")]
    MissingReturnValue(Type),

    #[error("No `main` function was defined")]
    NoMain,

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Salida de un análisis exitoso.
pub struct Parsed {
    pub program: Program,
    pub warnings: Vec<Located<Warning>>,
}

/// Construye el árbol anotado a partir de una secuencia de tokens.
pub fn parse(tokens: &[Located<Token>]) -> Result<Parsed, Located<ParserError>> {
    let last_known = tokens
        .first()
        .map(|token| token.location().clone())
        .unwrap_or_else(|| Location::start_of("<input>"));

    let mut parser = Parser {
        tokens,
        position: 0,
        last_known,
        scopes: Scopes::default(),
        scope: ScopeId::GLOBAL,
        ret: None,
        warnings: Vec::new(),
    };

    let items = parser.program()?;
    let Parser {
        scopes, warnings, ..
    } = parser;

    Ok(Parsed {
        program: Program { items, scopes },
        warnings,
    })
}

type Parse<T> = Result<T, Located<ParserError>>;

struct Parser<'a> {
    tokens: &'a [Located<Token>],
    position: usize,
    last_known: Location,
    scopes: Scopes,
    scope: ScopeId,
    ret: Option<Type>,
    warnings: Vec<Located<Warning>>,
}

const LOGICAL: &[(Token, BinOp)] = &[(Token::Ampersand, BinOp::And), (Token::Pipe, BinOp::Or)];

const EQUALITY: &[(Token, BinOp)] = &[
    (Token::Equal, BinOp::Equal),
    (Token::NotEqual, BinOp::NotEqual),
];

const RELATIONAL: &[(Token, BinOp)] = &[
    (Token::Less, BinOp::Less),
    (Token::LessOrEqual, BinOp::LessOrEqual),
    (Token::Greater, BinOp::Greater),
    (Token::GreaterOrEqual, BinOp::GreaterOrEqual),
];

const SHIFT: &[(Token, BinOp)] = &[
    (Token::ShiftLeft, BinOp::ShiftLeft),
    (Token::ShiftRight, BinOp::ShiftRight),
];

const ADDITIVE: &[(Token, BinOp)] = &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)];

const TERM: &[(Token, BinOp)] = &[(Token::Times, BinOp::Mul), (Token::Divide, BinOp::Div)];

impl<'a> Parser<'a> {
    fn program(&mut self) -> Parse<Vec<Item>> {
        let mut items = Vec::new();
        while self.peek().is_some() {
            let item = if self.is_function() {
                Item::Function(self.function()?)
            } else {
                let variable = self.var_decl()?;
                self.expect(Token::Semicolon)?;

                Item::Variable(variable)
            };

            items.push(item);
        }

        match self.scopes.lookup(ScopeId::GLOBAL, &Identifier::from("main")) {
            Ok(main) if matches!(main.typ(), Type::Function { .. }) => Ok(items),
            _ => self.fail(ParserError::NoMain),
        }
    }

    /// Distingue una definición de función de una declaración de
    /// variable buscando un `(` tras el nombre.
    fn is_function(&self) -> bool {
        let mut rest = self.tokens[self.position..]
            .iter()
            .map(Located::val)
            .skip_while(|token| matches!(token, Token::Keyword(_) | Token::Times));

        matches!(
            (rest.next(), rest.next()),
            (Some(Token::Id(_)), Some(Token::OpenParen))
        )
    }

    fn function(&mut self) -> Parse<Function> {
        let ret = self.typ()?;
        let name = self.id()?;

        self.expect(Token::OpenParen)?;
        let params = self.scopes.enter(ScopeId::GLOBAL);

        let mut param_types = Vec::new();
        if self.peek() != Some(&Token::CloseParen) {
            loop {
                let typ = self.typ()?;
                let param = self.id()?;
                self.non_void(&typ, &param)?;

                param_types.push(typ.clone());
                self.declare(params, param, typ, false)?;

                if !self.optional(Token::Comma)? {
                    break;
                }
            }
        }

        self.expect(Token::CloseParen)?;

        // Dirección de retorno que empuja `call`
        self.scopes.reserve(params, 2);

        let typ = Type::Function {
            ret: Box::new(ret.clone()),
            params: param_types,
        };

        log::debug!("Function `{}` of type `{}`", name.val(), typ);
        let symbol = self.declare(ScopeId::GLOBAL, name, typ, false)?;

        self.scope = params;
        self.ret = Some(ret);

        let body = self.block()?;

        self.scope = ScopeId::GLOBAL;
        self.ret = None;

        Ok(Function {
            symbol,
            params,
            body,
        })
    }

    fn var_decl(&mut self) -> Parse<Variable> {
        let is_extern = self.optional(Token::Keyword(Keyword::Extern))?;
        let typ = self.typ()?;
        let name = self.id()?;

        if !is_extern {
            self.non_void(&typ, &name)?;
        }

        let init = if self.optional(Token::Assign)? {
            let value = self.assignment()?;
            if is_extern {
                let name = name.into_inner();
                return self.fail(ParserError::ExternInitializer(name));
            }

            self.rvalue(&value)?;
            let warning = types::assignment(&typ, &value.typ)
                .map_err(|error| Located::at(error.into(), value.location.clone()))?;

            self.warn(warning, &value.location);

            let folds = value.is_string() || value.fold().is_some();
            if self.scope == ScopeId::GLOBAL && !(value.constant && folds) {
                let error = ParserError::NotConstant(name.into_inner());
                return Err(Located::at(error, value.location));
            }

            Some(value)
        } else {
            None
        };

        log::trace!("Declaration of `{}: {}`", name.val(), typ);
        let symbol = self.declare(self.scope, name, typ, is_extern)?;

        Ok(Variable { symbol, init })
    }

    fn block(&mut self) -> Parse<Block> {
        self.expect(Token::OpenCurly)?;
        let start = self.last_known.clone();

        let outer = self.scope;
        let scope = self.scopes.enter(outer);
        self.scope = scope;

        let mut statements = Vec::new();
        while !self.optional(Token::CloseCurly)? {
            let statement = match self.peek() {
                Some(Token::Keyword(keyword)) if keyword.is_type() => self.declaration()?,
                Some(Token::Keyword(Keyword::Extern)) => self.declaration()?,
                _ => self.statement()?,
            };

            statements.push(statement);
        }

        self.scope = outer;

        Ok(Block {
            scope,
            statements,
            location: Location::span(start, &self.last_known),
        })
    }

    fn declaration(&mut self) -> Parse<Statement> {
        let variable = self.var_decl()?;
        self.expect(Token::Semicolon)?;

        Ok(Statement::Declaration(variable))
    }

    fn statement(&mut self) -> Parse<Statement> {
        match self.peek() {
            Some(Token::Keyword(Keyword::Return)) => self.return_statement(),
            Some(Token::Keyword(Keyword::If)) => self.if_statement(),
            Some(Token::Keyword(Keyword::While)) => self.while_statement(),
            Some(Token::OpenCurly) => Ok(Statement::Block(self.block()?)),

            _ => {
                let expr = self.expr()?;
                self.expect(Token::Semicolon)?;

                // Solo una llamada puede descartar un valor `void`
                if !matches!(expr.kind, ExprKind::Call { .. }) {
                    self.rvalue(&expr)?;
                }

                Ok(Statement::Expr(expr))
            }
        }
    }

    fn return_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::Return)?;
        let location = self.last_known.clone();
        let ret = self.ret.clone().unwrap_or(Type::Void);

        let value = if self.optional(Token::Semicolon)? {
            if !ret.is_void() {
                return self.fail(ParserError::MissingReturnValue(ret));
            }

            None
        } else {
            let value = self.expr()?;
            self.expect(Token::Semicolon)?;

            if ret.is_void() {
                return Err(Located::at(ParserError::ReturnInVoid, value.location));
            }

            self.rvalue(&value)?;
            let warning = types::assignment(&ret, &value.typ)
                .map_err(|error| Located::at(error.into(), value.location.clone()))?;

            self.warn(warning, &value.location);
            Some(value)
        };

        Ok(Statement::Return {
            value,
            scope: self.scope,
            location,
        })
    }

    fn if_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::If)?;
        let location = self.last_known.clone();
        let cond = self.condition()?;
        let then = Box::new(self.statement()?);

        let otherwise = if self.optional(Token::Keyword(Keyword::Else))? {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Statement::If {
            cond,
            then,
            otherwise,
            location,
        })
    }

    fn while_statement(&mut self) -> Parse<Statement> {
        self.keyword(Keyword::While)?;
        let location = self.last_known.clone();
        let cond = self.condition()?;
        let body = Box::new(self.statement()?);

        Ok(Statement::While {
            cond,
            body,
            location,
        })
    }

    fn condition(&mut self) -> Parse<Expr> {
        self.expect(Token::OpenParen)?;
        let cond = self.expr()?;
        self.expect(Token::CloseParen)?;

        self.rvalue(&cond)?;
        Ok(cond)
    }

    fn expr(&mut self) -> Parse<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Parse<Expr> {
        let start = self.peek_location();
        let target = self.logical()?;

        if !self.optional(Token::Assign)? {
            return Ok(target);
        }

        let value = self.assignment()?;
        let location = Location::span(start, &self.last_known);

        self.assign(target, value, location)
    }

    fn logical(&mut self) -> Parse<Expr> {
        self.binary_level(Parser::equality, LOGICAL)
    }

    fn equality(&mut self) -> Parse<Expr> {
        self.binary_level(Parser::relational, EQUALITY)
    }

    fn relational(&mut self) -> Parse<Expr> {
        self.binary_level(Parser::shift, RELATIONAL)
    }

    fn shift(&mut self) -> Parse<Expr> {
        self.binary_level(Parser::additive, SHIFT)
    }

    fn additive(&mut self) -> Parse<Expr> {
        self.binary_level(Parser::term, ADDITIVE)
    }

    fn term(&mut self) -> Parse<Expr> {
        self.binary_level(Parser::factor, TERM)
    }

    /// Nivel de precedencia con operadores binarios asociativos
    /// a la izquierda.
    fn binary_level<F>(&mut self, mut next: F, operators: &[(Token, BinOp)]) -> Parse<Expr>
    where
        F: FnMut(&mut Self) -> Parse<Expr>,
    {
        let start = self.peek_location();
        let mut left = next(self)?;

        loop {
            let op = match self.peek() {
                Some(token) => operators.iter().find(|(op, _)| op == token),
                None => None,
            };

            let op = match op {
                Some(&(_, op)) => op,
                None => break Ok(left),
            };

            self.next()?;
            let right = next(self)?;

            let location = Location::span(start.clone(), &self.last_known);
            left = self.binary(op, left, right, location)?;
        }
    }

    fn factor(&mut self) -> Parse<Expr> {
        let start = self.peek_location();

        let op = match self.peek() {
            Some(Token::Plus) => UnOp::Plus,
            Some(Token::Minus) => UnOp::Negate,
            Some(Token::Ampersand) => UnOp::AddressOf,
            Some(Token::Times) => UnOp::Deref,
            Some(Token::Increment) => UnOp::Increment,
            Some(Token::Decrement) => UnOp::Decrement,
            _ => return self.postfix(),
        };

        self.next()?;
        let operand = self.factor()?;
        let location = Location::span(start, &self.last_known);

        match op {
            UnOp::Increment | UnOp::Decrement => self.step(op, operand, location),
            _ => self.unary(op, operand, location),
        }
    }

    fn postfix(&mut self) -> Parse<Expr> {
        let start = self.peek_location();
        let mut expr = self.primary()?;

        loop {
            let (op, undo) = match self.peek() {
                Some(Token::Increment) => (UnOp::Increment, UnOp::Decrement),
                Some(Token::Decrement) => (UnOp::Decrement, UnOp::Increment),
                _ => break Ok(expr),
            };

            self.next()?;
            let location = Location::span(start.clone(), &self.last_known);

            // `x++` se reduce a `(x = x + 1) - 1`, que produce el valor previo
            let stepped = self.step(op, expr, location.clone())?;
            expr = self.unary(undo, stepped, location)?;
        }
    }

    fn primary(&mut self) -> Parse<Expr> {
        let (location, token) = self.next()?.split();

        let (kind, typ) = match token {
            Token::IntLiteral(value) => {
                let typ = if value <= 0xff { Type::Char } else { Type::Int };
                (ExprKind::Number(value), typ)
            }

            Token::CharLiteral(byte) => (ExprKind::Number(byte.into()), Type::Char),
            Token::StrLiteral(bytes) => (ExprKind::Str(bytes), Type::Char.pointer_to()),

            Token::Id(id) if self.peek() == Some(&Token::OpenParen) => {
                return self.call(Located::at(id, location));
            }

            Token::Id(id) => {
                let symbol = self
                    .scopes
                    .lookup(self.scope, &id)
                    .map_err(|error| Located::at(error.into(), location.clone()))?;

                if let Type::Function { .. } = symbol.typ() {
                    return Err(Located::at(ParserError::FunctionValue(id), location));
                }

                let typ = symbol.typ().clone();
                return Ok(self.node(ExprKind::Variable(symbol), typ, false, location));
            }

            Token::OpenParen => {
                let expr = self.expr()?;
                self.expect(Token::CloseParen)?;

                return Ok(expr);
            }

            _ => return self.fail(ParserError::ExpectedExpr),
        };

        Ok(self.node(kind, typ, true, location))
    }

    fn call(&mut self, name: Located<Identifier>) -> Parse<Expr> {
        let (start, name) = name.split();

        let function = self
            .scopes
            .lookup(self.scope, &name)
            .map_err(|error| Located::at(error.into(), start.clone()))?;

        let (ret, params) = match function.typ() {
            Type::Function { ret, params } => ((**ret).clone(), params.clone()),
            _ => return Err(Located::at(ParserError::NotAFunction(name), start)),
        };

        self.expect(Token::OpenParen)?;

        let mut args = Vec::new();
        if !self.optional(Token::CloseParen)? {
            loop {
                args.push(self.assignment()?);
                if !self.optional(Token::Comma)? {
                    break;
                }
            }

            self.expect(Token::CloseParen)?;
        }

        let location = Location::span(start, &self.last_known);
        if args.len() != params.len() {
            let error = ParserError::Arity {
                name,
                expected: params.len(),
                found: args.len(),
            };

            return Err(Located::at(error, location));
        }

        // Cada argumento se liga a su parámetro como una asignación
        for (param, arg) in params.iter().zip(&args) {
            self.rvalue(arg)?;

            let warning = types::assignment(param, &arg.typ)
                .map_err(|error| Located::at(error.into(), arg.location.clone()))?;

            self.warn(warning, &arg.location);
        }

        let kind = ExprKind::Call { function, args };
        Ok(self.node(kind, ret, false, location))
    }

    fn assign(&mut self, target: Expr, value: Expr, location: Location) -> Parse<Expr> {
        if !target.is_lvalue() {
            return Err(Located::at(ParserError::NotAssignable, target.location));
        }

        self.rvalue(&value)?;
        let warning = types::assignment(&target.typ, &value.typ)
            .map_err(|error| Located::at(error.into(), location.clone()))?;

        self.warn(warning, &location);

        let typ = target.typ.clone();
        let kind = ExprKind::Assign(Box::new(target), Box::new(value));

        Ok(self.node(kind, typ, false, location))
    }

    fn binary(&mut self, op: BinOp, left: Expr, right: Expr, location: Location) -> Parse<Expr> {
        self.rvalue(&left)?;
        self.rvalue(&right)?;

        let (typ, warning) = types::common_type(&left.typ, &right.typ)
            .map_err(|error| Located::at(error.into(), location.clone()))?;

        self.warn(warning, &location);

        let constant =
            left.constant && right.constant && !left.is_string() && !right.is_string();

        let kind = ExprKind::Binary(op, Box::new(left), Box::new(right));
        Ok(self.node(kind, typ, constant, location))
    }

    fn unary(&mut self, op: UnOp, operand: Expr, location: Location) -> Parse<Expr> {
        let (typ, constant) = match op {
            UnOp::AddressOf => {
                if !operand.is_lvalue() {
                    return Err(Located::at(ParserError::NotAddressable, location));
                }

                (operand.typ.clone().pointer_to(), false)
            }

            UnOp::Deref => match operand.typ.base() {
                Some(base) => (base.clone(), false),
                None => {
                    let error = ParserError::DerefNonPointer(operand.typ.clone());
                    return Err(Located::at(error, location));
                }
            },

            UnOp::Plus | UnOp::Negate | UnOp::Increment | UnOp::Decrement => {
                self.rvalue(&operand)?;

                let constant = operand.constant && !operand.is_string();
                (operand.typ.clone(), constant)
            }
        };

        let kind = ExprKind::Unary(op, Box::new(operand));
        Ok(self.node(kind, typ, constant, location))
    }

    /// `++x` o `--x`: asigna al lvalue su valor vecino.
    fn step(&mut self, op: UnOp, target: Expr, location: Location) -> Parse<Expr> {
        if !target.is_lvalue() {
            return Err(Located::at(ParserError::NotAssignable, target.location));
        }

        let value = self.unary(op, target.clone(), location.clone())?;
        self.assign(target, value, location)
    }

    fn node(&self, kind: ExprKind, typ: Type, constant: bool, location: Location) -> Expr {
        Expr {
            kind,
            typ,
            scope: self.scope,
            constant,
            location,
        }
    }

    /// Rechaza expresiones que no pueden producir un valor.
    fn rvalue(&self, expr: &Expr) -> Parse<()> {
        if expr.typ.is_void() {
            Err(Located::at(ParserError::VoidValue, expr.location.clone()))
        } else {
            Ok(())
        }
    }

    fn non_void(&self, typ: &Type, name: &Located<Identifier>) -> Parse<()> {
        if typ.is_void() {
            let error = ParserError::VoidVariable(name.val().clone());
            Err(Located::at(error, name.location().clone()))
        } else {
            Ok(())
        }
    }

    fn declare(
        &mut self,
        scope: ScopeId,
        name: Located<Identifier>,
        typ: Type,
        is_extern: bool,
    ) -> Parse<Rc<Symbol>> {
        let location = name.location().clone();
        self.scopes
            .declare(scope, name, typ, is_extern)
            .map_err(|error| Located::at(error.into(), location))
    }

    fn warn(&mut self, warning: Option<Warning>, location: &Location) {
        if let Some(warning) = warning {
            log::debug!("{}: {}", location, warning);
            self.warnings.push(Located::at(warning, location.clone()));
        }
    }

    /// Un tipo: palabra clave de tipo seguida de cero o más `*`.
    fn typ(&mut self) -> Parse<Type> {
        let mut typ = match self.next()?.into_inner() {
            Token::Keyword(Keyword::Void) => Type::Void,
            Token::Keyword(Keyword::Char) => Type::Char,
            Token::Keyword(Keyword::Int) => Type::Int,
            _ => return self.fail(ParserError::ExpectedType),
        };

        while self.optional(Token::Times)? {
            typ = typ.pointer_to();
        }

        Ok(typ)
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let (location, token) = self.next()?.split();
        match token {
            Token::Id(id) => Ok(Located::at(id, location)),
            _ => self.fail(ParserError::ExpectedId),
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.expect(Token::Keyword(keyword))
    }

    /// Consume el token indicado si es el siguiente.
    fn optional(&mut self, token: Token) -> Parse<bool> {
        if self.peek() == Some(&token) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, token: Token) -> Parse<()> {
        match self.next().map(Located::into_inner) {
            Ok(found) if found == token => Ok(()),
            Ok(found) => self.fail(ParserError::UnexpectedToken(token, found)),
            Err(_) => self.fail(ParserError::MissingToken(token)),
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position).map(Located::val)
    }

    fn peek_location(&self) -> Location {
        self.tokens
            .get(self.position)
            .map(|token| token.location().clone())
            .unwrap_or_else(|| self.last_known.clone())
    }

    fn next(&mut self) -> Parse<Located<Token>> {
        match self.tokens.get(self.position) {
            Some(token) => {
                self.position += 1;
                self.last_known = token.location().clone();

                Ok(token.clone())
            }

            None => self.fail(ParserError::UnexpectedEof),
        }
    }

    fn fail<T>(&self, error: ParserError) -> Parse<T> {
        Err(Located::at(error, self.last_known.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lex::Lexer, scope::Storage, source};

    fn parse_str(input: &str) -> Result<Parsed, ParserError> {
        let (start, stream) = source::consume(input.as_bytes(), "<test>");
        let tokens = Lexer::new(start, stream)
            .try_exhaustive()
            .unwrap_or_else(|_| panic!("lexer errors in {:?}", input));

        parse(&tokens).map_err(Located::into_inner)
    }

    fn body(parsed: &Parsed, index: usize) -> &Block {
        match &parsed.program.items[index] {
            Item::Function(function) => &function.body,
            Item::Variable(_) => panic!("expected a function"),
        }
    }

    #[test]
    fn minimal_main() {
        let parsed = parse_str("char main() { return 5; }").unwrap();
        assert_eq!(parsed.program.items.len(), 1);
        assert!(parsed.warnings.is_empty());

        let statements = &body(&parsed, 0).statements;
        match statements.as_slice() {
            [Statement::Return {
                value: Some(value), ..
            }] => {
                assert!(matches!(value.kind, ExprKind::Number(5)));
                assert_eq!(value.typ, Type::Char);
                assert!(value.constant);
            }

            _ => panic!("unexpected statements"),
        }
    }

    #[test]
    fn literal_classification() {
        let parsed = parse_str("int g = 300; char h = 'x'; char main() { return 0; }").unwrap();

        let types: Vec<_> = parsed
            .program
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Variable(variable) => variable.init.as_ref().map(|init| init.typ.clone()),
                _ => None,
            })
            .collect();

        assert_eq!(types, vec![Type::Int, Type::Char]);
    }

    #[test]
    fn missing_main() {
        let error = parse_str("char f() { return 1; }").err().unwrap();
        assert!(matches!(error, ParserError::NoMain));
    }

    #[test]
    fn redeclaration_is_fatal_only_within_a_scope() {
        let error = parse_str("char main() { char x; char x; return 0; }")
            .err()
            .unwrap();

        assert!(matches!(
            error,
            ParserError::Scope(ScopeError::Redeclaration { .. })
        ));

        assert!(parse_str("char main() { char x; { char x; } return 0; }").is_ok());
    }

    #[test]
    fn undeclared_identifier() {
        let error = parse_str("char main() { return y; }").err().unwrap();
        assert!(matches!(error, ParserError::Scope(ScopeError::Undeclared(_))));
    }

    #[test]
    fn call_arity() {
        let source = "char f(char x) { return x; } char main() { return f(1, 2); }";
        let error = parse_str(source).err().unwrap();

        assert!(matches!(
            error,
            ParserError::Arity {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn deref_requires_pointer() {
        let error = parse_str("char main() { char c; return *c; }").err().unwrap();
        assert!(matches!(error, ParserError::DerefNonPointer(Type::Char)));
    }

    #[test]
    fn pointer_int_assignment_warns() {
        let parsed = parse_str("char* terminal = 0x7000; char main() { return 0; }").unwrap();
        assert!(matches!(
            parsed.warnings.as_slice(),
            [warning] if matches!(warning.val(), Warning::PointerIntConversion { .. })
        ));
    }

    #[test]
    fn global_initializer_must_be_constant() {
        let error = parse_str("char a = 1; char b = a; char main() { return 0; }")
            .err()
            .unwrap();

        assert!(matches!(error, ParserError::NotConstant(_)));
        assert!(parse_str("char a = 2 + 3 * 4; char main() { return a; }").is_ok());
    }

    #[test]
    fn mismatched_operands() {
        let error = parse_str("char main() { char* p; char c; return p + c; }")
            .err()
            .unwrap();

        assert!(matches!(error, ParserError::Type(TypeError::Mismatch(..))));
    }

    #[test]
    fn post_increment_preserves_old_value() {
        let parsed = parse_str("char main() { char i; i++; return i; }").unwrap();
        let statements = &body(&parsed, 0).statements;

        let expr = match &statements[1] {
            Statement::Expr(expr) => expr,
            _ => panic!("expected expression statement"),
        };

        match &expr.kind {
            ExprKind::Unary(UnOp::Decrement, inner) => {
                assert!(matches!(inner.kind, ExprKind::Assign(..)));
            }

            _ => panic!("unexpected desugaring"),
        }
    }

    #[test]
    fn function_scopes() {
        let parsed = parse_str("char f(char x, int y) { char a; return a; } char main() { return 0; }")
            .unwrap();

        let function = match &parsed.program.items[0] {
            Item::Function(function) => function,
            _ => panic!("expected a function"),
        };

        let scopes = &parsed.program.scopes;
        assert_eq!(scopes.frame_size(function.params), 1 + 2 + 2);
        assert_eq!(scopes.frame_size(function.body.scope), 1);

        let params = scopes.symbols(function.params);
        assert_eq!(params[0].storage(), Storage::Local { offset: 0 });
        assert_eq!(params[1].storage(), Storage::Local { offset: 1 });
    }

    #[test]
    fn extern_in_block_and_void_pointer() {
        let source = "void* heap; char main() { extern void heap_start; heap = &heap_start; return 0; }";
        let parsed = parse_str(source).unwrap();
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn void_variable_is_rejected() {
        let error = parse_str("void v; char main() { return 0; }").err().unwrap();
        assert!(matches!(error, ParserError::VoidVariable(_)));
    }

    #[test]
    fn only_calls_discard_void() {
        let source = "void f() { return; } char main() { void* p; f(); *p; return 0; }";
        let error = parse_str(source).err().unwrap();
        assert!(matches!(error, ParserError::VoidValue));

        assert!(parse_str("void f() { return; } char main() { f(); return 0; }").is_ok());
    }

    #[test]
    fn pointer_arguments_bind_to_int_with_warning() {
        let source = "void show(int v) { return; } \
                      char main() { extern void heap_start; char* p; show(&heap_start); show(p); return 0; }";

        let parsed = parse_str(source).unwrap();
        let warnings: Vec<_> = parsed.warnings.iter().map(|w| w.val().clone()).collect();

        assert_eq!(
            warnings,
            vec![
                Warning::PointerIntConversion {
                    from: Type::Void.pointer_to(),
                    to: Type::Int,
                },
                Warning::PointerIntConversion {
                    from: Type::Char.pointer_to(),
                    to: Type::Int,
                },
            ]
        );
    }

    #[test]
    fn constant_shifts_rotate_like_runtime() {
        let source = "char g = 1 << 8; char h = 129 << 1; char k = 129 >> 1; char main() { return 0; }";
        let parsed = parse_str(source).unwrap();

        let folded: Vec<_> = parsed
            .program
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Variable(variable) => variable.init.as_ref().and_then(Expr::fold),
                _ => None,
            })
            .collect();

        assert_eq!(folded, vec![1, 3, 192]);

        let error = parse_str("int w = 300 << 1; char main() { return 0; }")
            .err()
            .unwrap();

        assert!(matches!(error, ParserError::NotConstant(_)));
    }

    #[test]
    fn statements_are_anchored_at_their_keyword() {
        let parsed = parse_str("char main() { while (0) if (1) return 5; }").unwrap();
        let column = |location: &Location| location.start().column();

        let (looped, body) = match body(&parsed, 0).statements.as_slice() {
            [Statement::While { location, body, .. }] => (column(location), body),
            _ => panic!("expected a while loop"),
        };

        let (branch, then) = match &**body {
            Statement::If { location, then, .. } => (column(location), then),
            _ => panic!("expected an if statement"),
        };

        let returned = match &**then {
            Statement::Return { location, .. } => column(location),
            _ => panic!("expected a return"),
        };

        assert_eq!((looped, branch, returned), (15, 25, 32));
    }
}
