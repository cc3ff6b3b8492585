//! Asignación de registros.
//!
//! No existe spill a memoria: si ningún registro satisface una
//! solicitud la compilación se aborta con [`Exhausted`].

use crate::arch::{Reg, Register};
use bitflags::bitflags;
use std::fmt;
use thiserror::Error;

bitflags! {
    /// Conjunto de registros lógicos retenidos.
    pub struct RegSet: u8 {
        const A  = 0b0000_0001;
        const B  = 0b0000_0010;
        const C  = 0b0000_0100;
        const D  = 0b0000_1000;
        const E  = 0b0001_0000;
        const BC = 0b0010_0000;
        const DE = 0b0100_0000;
    }
}

impl RegSet {
    fn of(reg: Reg) -> RegSet {
        match reg {
            Reg::A => RegSet::A,
            Reg::B => RegSet::B,
            Reg::C => RegSet::C,
            Reg::D => RegSet::D,
            Reg::E => RegSet::E,
            Reg::Bc => RegSet::BC,
            Reg::De => RegSet::DE,
        }
    }

    /// Todo lo que comparte almacenamiento con `reg`, incluyéndolo.
    fn footprint(reg: Reg) -> RegSet {
        let mut set = RegSet::of(reg);
        if let Some(pair) = reg.pair() {
            set |= RegSet::of(pair);
        }

        if let Some((high, low)) = reg.halves() {
            set |= RegSet::of(high) | RegSet::of(low);
        }

        set
    }

    /// Registros del conjunto, en el orden del banco.
    pub fn regs(self) -> impl Iterator<Item = Reg> {
        Reg::FILE
            .iter()
            .copied()
            .filter(move |&reg| self.contains(RegSet::of(reg)))
    }
}

impl fmt::Display for RegSet {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return fmt.write_str("none");
        }

        for (index, reg) in self.regs().enumerate() {
            if index > 0 {
                fmt.write_str(", ")?;
            }

            write!(fmt, "{}", reg)?;
        }

        Ok(())
    }
}

/// Ningún registro libre satisface una solicitud.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Register exhaustion: no free register of {size} bytes (held: {held})")]
pub struct Exhausted {
    pub size: u16,
    pub held: RegSet,
}

/// Estado de ocupación del banco de registros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocations {
    held: RegSet,
}

impl Default for Allocations {
    fn default() -> Self {
        Allocations {
            held: RegSet::empty(),
        }
    }
}

impl Allocations {
    /// Toma el primer registro libre de al menos `size` bytes.
    pub fn allocate(&mut self, size: u16) -> Result<Reg, Exhausted> {
        let found = Reg::FILE
            .iter()
            .copied()
            .find(|&reg| reg.size() >= size && self.is_free(reg));

        match found {
            Some(reg) => {
                self.held |= RegSet::of(reg);
                log::trace!("Allocated {} (held: {})", reg, self.held);

                Ok(reg)
            }

            None => Err(Exhausted {
                size,
                held: self.held,
            }),
        }
    }

    /// Toma un registro específico si se encuentra libre.
    pub fn claim(&mut self, reg: Reg) -> bool {
        let free = self.is_free(reg);
        if free {
            self.held |= RegSet::of(reg);
        }

        free
    }

    pub fn free(&mut self, reg: Reg) {
        self.held.remove(RegSet::of(reg));
        log::trace!("Freed {} (held: {})", reg, self.held);
    }

    /// Un registro está libre si nada que comparta su almacenamiento
    /// se encuentra retenido.
    pub fn is_free(&self, reg: Reg) -> bool {
        !self.held.intersects(RegSet::footprint(reg))
    }

    /// Determina si este registro en particular está retenido.
    pub fn is_held(&self, reg: Reg) -> bool {
        self.held.contains(RegSet::of(reg))
    }

    pub fn held(&self) -> RegSet {
        self.held
    }
}
