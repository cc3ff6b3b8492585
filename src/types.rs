//! Sistema de tipos.
//!
//! Los tipos se comparan estructuralmente. No existe caché de tipos
//! derivados: un puntero o una firma de función se reconstruye cada
//! vez que se necesita.

use std::fmt::{self, Display};
use thiserror::Error;

/// Un tipo del lenguaje.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Void,
    Char,
    Int,
    Pointer(Box<Type>),
    Function { ret: Box<Type>, params: Vec<Type> },
}

/// Error de tipos, siempre fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Mismatched types `{0}` and `{1}`")]
    Mismatch(Type, Type),

    #[error("Cannot assign `{value}` to `{dest}`")]
    Assignment { dest: Type, value: Type },
}

/// Advertencia de coerción de tipos.
///
/// Las advertencias se reportan pero nunca detienen la compilación.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("Implicit conversion between `{from}` and `{to}`")]
    PointerIntConversion { from: Type, to: Type },

    #[error("Incompatible pointer types `{0}` and `{1}`")]
    PointerMismatch(Type, Type),

    #[error("Implicit narrowing from `{from}` to `{to}`")]
    Narrowing { from: Type, to: Type },
}

impl Type {
    /// Construye un puntero a este tipo.
    pub fn pointer_to(self) -> Type {
        Type::Pointer(Box::new(self))
    }

    /// Tamaño en bytes. Punteros y funciones miden lo mismo que una dirección.
    pub fn size(&self) -> u16 {
        match self {
            Type::Void => 0,
            Type::Char => 1,
            Type::Int | Type::Pointer(_) | Type::Function { .. } => 2,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Tipo apuntado, si se trata de un puntero.
    pub fn base(&self) -> Option<&Type> {
        match self {
            Type::Pointer(base) => Some(base),
            _ => None,
        }
    }

    /// Tipos que pueden almacenarse en una variable y operarse.
    fn is_scalar(&self) -> bool {
        matches!(self, Type::Char | Type::Int | Type::Pointer(_))
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => fmt.write_str("void"),
            Type::Char => fmt.write_str("char"),
            Type::Int => fmt.write_str("int"),
            Type::Pointer(base) => write!(fmt, "{}*", base),
            Type::Function { ret, params } => {
                write!(fmt, "{}(", ret)?;
                for (index, param) in params.iter().enumerate() {
                    if index > 0 {
                        fmt.write_str(", ")?;
                    }

                    write!(fmt, "{}", param)?;
                }

                fmt.write_str(")")
            }
        }
    }
}

/// Tipo resultante de combinar dos operandos.
///
/// `char` se promueve a `int`. Dos punteros con bases distintas
/// producen una advertencia y gana el tipo izquierdo. Cualquier
/// otra diferencia de clase es un error.
pub fn common_type(left: &Type, right: &Type) -> Result<(Type, Option<Warning>), TypeError> {
    use Type::*;

    match (left, right) {
        (Char, Char) => Ok((Char, None)),
        (Int, Int) | (Char, Int) | (Int, Char) => Ok((Int, None)),

        (Pointer(l), Pointer(r)) if l == r => Ok((left.clone(), None)),
        (Pointer(_), Pointer(_)) => {
            let warning = Warning::PointerMismatch(left.clone(), right.clone());
            Ok((left.clone(), Some(warning)))
        }

        _ => Err(TypeError::Mismatch(left.clone(), right.clone())),
    }
}

/// Valida el almacenamiento de `value` en un destino de tipo `dest`.
///
/// Conversiones entre punteros y enteros, entre punteros a bases
/// distintas y estrechamientos de `int` a `char` solo advierten.
/// `void` y funciones nunca son asignables.
pub fn assignment(dest: &Type, value: &Type) -> Result<Option<Warning>, TypeError> {
    use Type::*;

    let mismatch = || TypeError::Assignment {
        dest: dest.clone(),
        value: value.clone(),
    };

    if !dest.is_scalar() || !value.is_scalar() {
        return Err(mismatch());
    }

    let warning = match (dest, value) {
        (Pointer(_), Pointer(_)) => common_type(dest, value).map_err(|_| mismatch())?.1,

        (Pointer(_), Char | Int) | (Char | Int, Pointer(_)) => {
            Some(Warning::PointerIntConversion {
                from: value.clone(),
                to: dest.clone(),
            })
        }

        (Char, Int) => Some(Warning::Narrowing {
            from: Int,
            to: Char,
        }),

        _ => None,
    };

    Ok(warning)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(Type::Void.size(), 0);
        assert_eq!(Type::Char.size(), 1);
        assert_eq!(Type::Int.size(), 2);
        assert_eq!(Type::Char.pointer_to().size(), 2);

        let function = Type::Function {
            ret: Box::new(Type::Char),
            params: vec![Type::Int, Type::Int],
        };

        assert_eq!(function.size(), 2);
    }

    #[test]
    fn char_promotes_to_int() {
        assert_eq!(common_type(&Type::Char, &Type::Int), Ok((Type::Int, None)));
        assert_eq!(common_type(&Type::Int, &Type::Char), Ok((Type::Int, None)));
    }

    #[test]
    fn common_type_is_reflexive() {
        let types = [Type::Char, Type::Int, Type::Int.pointer_to()];
        for typ in &types {
            assert_eq!(common_type(typ, typ), Ok((typ.clone(), None)));
        }
    }

    #[test]
    fn pointer_base_mismatch_warns() {
        let left = Type::Char.pointer_to();
        let right = Type::Int.pointer_to();

        let (typ, warning) = common_type(&left, &right).unwrap();
        assert_eq!(typ, left);
        assert_eq!(warning, Some(Warning::PointerMismatch(left.clone(), right)));
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let pointer = Type::Char.pointer_to();
        assert!(common_type(&pointer, &Type::Int).is_err());
        assert!(common_type(&Type::Void, &Type::Char).is_err());
    }

    #[test]
    fn assignment_rules() {
        let pointer = Type::Char.pointer_to();

        assert_eq!(assignment(&Type::Int, &Type::Char), Ok(None));
        assert!(matches!(
            assignment(&pointer, &Type::Int),
            Ok(Some(Warning::PointerIntConversion { .. }))
        ));

        assert!(matches!(
            assignment(&Type::Int, &pointer),
            Ok(Some(Warning::PointerIntConversion { .. }))
        ));

        assert!(matches!(
            assignment(&Type::Char, &Type::Int),
            Ok(Some(Warning::Narrowing { .. }))
        ));

        assert!(assignment(&Type::Void, &Type::Int).is_err());
        assert!(assignment(&Type::Int, &Type::Void).is_err());
    }
}
