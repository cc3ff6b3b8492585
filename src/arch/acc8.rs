//! Banco de registros de la máquina de acumulador.
//!
//! Hay cinco registros de 8 bits, `a` hasta `e`. Los pares `bc` y `de`
//! son la concatenación de `b`:`c` y `d`:`e` respectivamente, con la
//! mitad alta primero. El acumulador `a` no forma parte de ningún par.
//! En memoria, un valor de 16 bits guarda su byte bajo primero.

use std::fmt;

/// Registro de procesador.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reg {
    A,
    B,
    C,
    D,
    E,
    Bc,
    De,
}

impl super::Register for Reg {
    const FILE: &'static [Self] = &[Reg::A, Reg::B, Reg::C, Reg::D, Reg::E, Reg::Bc, Reg::De];
    const ACCUMULATOR: Self = Reg::A;

    fn size(self) -> u16 {
        match self {
            Reg::Bc | Reg::De => 2,
            _ => 1,
        }
    }

    fn halves(self) -> Option<(Self, Self)> {
        match self {
            Reg::Bc => Some((Reg::B, Reg::C)),
            Reg::De => Some((Reg::D, Reg::E)),
            _ => None,
        }
    }

    fn pair(self) -> Option<Self> {
        match self {
            Reg::B | Reg::C => Some(Reg::Bc),
            Reg::D | Reg::E => Some(Reg::De),
            _ => None,
        }
    }

    fn ret(size: u16) -> Self {
        match size {
            2 => Reg::Bc,
            _ => Reg::A,
        }
    }
}

impl Reg {
    /// Mitad alta de un par, o el registro mismo.
    pub fn high(self) -> Reg {
        use super::Register;
        self.halves().map_or(self, |(high, _)| high)
    }

    /// Mitad baja de un par, o el registro mismo.
    pub fn low(self) -> Reg {
        use super::Register;
        self.halves().map_or(self, |(_, low)| low)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg::A => "a",
            Reg::B => "b",
            Reg::C => "c",
            Reg::D => "d",
            Reg::E => "e",
            Reg::Bc => "bc",
            Reg::De => "de",
        };

        formatter.write_str(name)
    }
}
