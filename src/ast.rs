//! Árbol sintáctico anotado.
//!
//! El parser construye este árbol ya resuelto: cada expresión conoce su
//! tipo, el ámbito donde aparece y si es una constante de compilación.
//! Las referencias a variables apuntan directamente a su [`Symbol`].

use crate::{
    scope::{ScopeId, Scopes, Symbol},
    source::Location,
    types::Type,
};

use std::rc::Rc;

/// Una unidad de compilación completa.
pub struct Program {
    pub items: Vec<Item>,
    pub scopes: Scopes,
}

/// Declaración de nivel superior.
pub enum Item {
    Variable(Variable),
    Function(Function),
}

/// Declaración de variable, global o local.
#[derive(Debug)]
pub struct Variable {
    pub symbol: Rc<Symbol>,
    pub init: Option<Expr>,
}

#[derive(Debug)]
pub struct Function {
    pub symbol: Rc<Symbol>,

    /// Ámbito de parámetros, incluye la dirección de retorno.
    pub params: ScopeId,

    pub body: Block,
}

#[derive(Debug)]
pub struct Block {
    pub scope: ScopeId,
    pub statements: Vec<Statement>,
    pub location: Location,
}

#[derive(Debug)]
pub enum Statement {
    Declaration(Variable),
    Expr(Expr),

    Return {
        value: Option<Expr>,
        scope: ScopeId,
        location: Location,
    },

    If {
        cond: Expr,
        then: Box<Statement>,
        otherwise: Option<Box<Statement>>,
        location: Location,
    },

    While {
        cond: Expr,
        body: Box<Statement>,
        location: Location,
    },

    Block(Block),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub typ: Type,
    pub scope: ScopeId,
    pub constant: bool,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(u16),
    Str(Vec<u8>),
    Variable(Rc<Symbol>),
    Assign(Box<Expr>, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    Call {
        function: Rc<Symbol>,
        args: Vec<Expr>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    ShiftLeft,
    ShiftRight,
}

/// Operadores unarios.
///
/// `Increment` y `Decrement` solo calculan el valor vecino, sin
/// efectos. El parser los combina con asignaciones para construir
/// `++x`, `x++` y sus contrapartes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Negate,
    AddressOf,
    Deref,
    Increment,
    Decrement,
}

impl Expr {
    /// Determina si la expresión designa una ubicación en memoria.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExprKind::Variable(_) => true,
            ExprKind::Unary(UnOp::Deref, _) => true,
            _ => false,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, ExprKind::Str(_))
    }

    /// Evalúa una expresión constante numérica.
    ///
    /// La aritmética es modular al tamaño del tipo de la expresión.
    /// Strings, divisiones entre cero y cualquier expresión no
    /// constante producen `None`.
    pub fn fold(&self) -> Option<u16> {
        if !self.constant {
            return None;
        }

        let value = match &self.kind {
            ExprKind::Number(value) => *value,

            ExprKind::Unary(UnOp::Plus, operand) => operand.fold()?,
            ExprKind::Unary(UnOp::Negate, operand) => operand.fold()?.wrapping_neg(),

            ExprKind::Binary(op, left, right) => {
                let (left, right) = (left.fold()?, right.fold()?);

                use BinOp::*;
                match op {
                    Add => left.wrapping_add(right),
                    Sub => left.wrapping_sub(right),
                    Mul => left.wrapping_mul(right),
                    Div => left.checked_div(right)?,
                    And => left & right,
                    Or => left | right,
                    Equal => (left == right) as u16,
                    NotEqual => (left != right) as u16,
                    Less => (left < right) as u16,
                    LessOrEqual => (left <= right) as u16,
                    Greater => (left > right) as u16,
                    GreaterOrEqual => (left >= right) as u16,
                    ShiftLeft | ShiftRight => rotate(*op, left, right, self.typ.size())?,
                }
            }

            _ => return None,
        };

        Some(match self.typ.size() {
            1 => value & 0xff,
            _ => value,
        })
    }
}

/// Desplazamientos de 8 bits tal como se ejecutan: rotaciones con el
/// conteo módulo 8, y a la derecha `8 - n` rotaciones a la izquierda.
/// Los desplazamientos de 16 bits no tienen valor constante.
fn rotate(op: BinOp, value: u16, count: u16, size: u16) -> Option<u16> {
    if size != 1 {
        return None;
    }

    let count = count as u8;
    let count = match op {
        BinOp::ShiftRight => 8u8.wrapping_sub(count),
        _ => count,
    };

    Some(u16::from((value as u8).rotate_left(u32::from(count & 0b111))))
}
