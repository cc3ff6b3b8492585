//! Detalles específicos de la arquitectura objetivo.
//!
//! El procesador objetivo es una máquina de 8 bits centrada en un
//! acumulador. Este módulo describe su banco de registros, con el
//! aliasing entre registros de 8 y 16 bits, y los operandos de memoria
//! que acepta `mov`.

use std::fmt::{self, Display};

mod acc8;

pub use acc8::Reg;

/// Registro de procesador.
pub trait Register: Copy + Eq + Display + 'static {
    /// Registros utilizables, en el orden estable en que se asignan.
    const FILE: &'static [Self];

    /// Registro en el que implícitamente opera la aritmética.
    const ACCUMULATOR: Self;

    /// Tamaño en bytes.
    fn size(self) -> u16;

    /// Registros de 8 bits (alto, bajo) que componen a un par.
    fn halves(self) -> Option<(Self, Self)>;

    /// Par de 16 bits del cual este registro es una mitad.
    fn pair(self) -> Option<Self>;

    /// Registro de retorno para valores del tamaño indicado.
    fn ret(size: u16) -> Self;

    /// Determina si dos registros comparten almacenamiento físico.
    fn overlaps(self, other: Self) -> bool {
        self == other || self.pair() == Some(other) || other.pair() == Some(self)
    }
}

/// Operando de memoria.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    /// Dirección absoluta por etiqueta, con desplazamiento.
    Label(String, u16),

    /// Relativa al puntero de pila.
    Stack(u16),

    /// Indirecta a través de un par.
    Indirect(Reg),
}

impl Address {
    /// Dirección del byte siguiente, para la mitad alta de un valor de
    /// 16 bits. Las direcciones indirectas avanzan en su propio par.
    pub fn next_byte(&self) -> Address {
        match self {
            Address::Label(label, offset) => Address::Label(label.clone(), offset + 1),
            Address::Stack(offset) => Address::Stack(offset + 1),
            Address::Indirect(pair) => Address::Indirect(*pair),
        }
    }

    /// Valor inmediato que corresponde a esta dirección, para `&x`.
    pub fn immediate(&self) -> String {
        match self {
            Address::Label(label, 0) => label.clone(),
            Address::Label(label, offset) => format!("{}+{}", label, offset),
            Address::Stack(offset) => format!("sp+{}", offset),
            Address::Indirect(pair) => pair.to_string(),
        }
    }
}

impl Display for Address {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "[{}]", self.immediate())
    }
}
