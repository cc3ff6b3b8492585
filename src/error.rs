//! Presentación de diagnósticos.
//!
//! Errores y advertencias de cualquier fase se muestran de la misma
//! forma: mensaje, ubicación, la línea de código original y una
//! marca bajo el rango afectado.

use crate::source::{Located, Location};
use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

/// Un error o advertencia con ubicación en código fuente.
pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;
}

/// Conjunto de diagnósticos de una misma clase.
pub struct Diagnostics {
    kind: &'static str,
    entries: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    /// Cambia la clase de diagnóstico, `error` por defecto.
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    /// Construye diagnósticos de clase `warning`.
    pub fn warnings<E: 'static + LocatedError>(warnings: Vec<E>) -> Self {
        Diagnostics::from(warnings).kind("warning")
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_warning(&self) -> bool {
        self.kind == "warning"
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            entries: Default::default(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            entries: vec![Box::new(error)],
            ..Default::default()
        }
    }
}

impl<E: 'static + LocatedError> From<Vec<E>> for Diagnostics {
    fn from(errors: Vec<E>) -> Self {
        let entries = errors
            .into_iter()
            .map(|error| Box::new(error) as Box<dyn LocatedError>)
            .collect();

        Diagnostics {
            entries,
            ..Default::default()
        }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return writeln!(fmt, "No {}s were reported", self.kind);
        }

        for entry in &self.entries {
            writeln!(fmt, "{}: {}", self.kind, entry.source())?;
            excerpt(fmt, entry.location())?;
            writeln!(fmt)?;
        }

        let count = self.entries.len();
        let plural = if count == 1 { "" } else { "s" };

        if self.is_warning() {
            writeln!(fmt, "{} {}{} generated", count, self.kind, plural)
        } else {
            writeln!(fmt, "Build failed with {} {}{}", count, self.kind, plural)
        }
    }
}

/// Muestra las líneas cubiertas por una ubicación y subraya su rango.
fn excerpt(fmt: &mut fmt::Formatter<'_>, location: &Location) -> fmt::Result {
    writeln!(fmt, " --> {}", location)?;

    let (start, end) = (location.start(), location.end());
    let digits = end.line().to_string().len();
    writeln!(fmt, "{:digits$} |", "", digits = digits)?;

    for line_number in start.line()..=end.line() {
        location.source().with_line(line_number, |line| {
            writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
        })?;
    }

    // Rangos de varias líneas se subrayan desde la columna inicial
    let last = end.column().saturating_sub(1).max(1);
    let (min, max) = if end.line() == start.line() {
        (start.column().min(last), start.column().max(last))
    } else {
        (start.column(), start.column())
    };

    writeln!(
        fmt,
        "{:digits$} | {:skip$}{:^<highlight$}",
        "",
        "",
        "",
        digits = digits,
        skip = (min - 1) as usize,
        highlight = (max - min + 1) as usize,
    )
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("Something went wrong")]
    struct Failure;

    #[test]
    fn renders_excerpt_and_summary() {
        let (_, stream) = source::consume("char x = @;\n".as_bytes(), "test.c");
        let chars: Vec<_> = stream.map(Result::unwrap).collect();
        let (_, location) = chars[9].clone();

        let rendered = Diagnostics::from(Located::at(Failure, location)).to_string();
        let expected = "\
error: Something went wrong
 --> test.c:1:10
  |
1 | char x = @;
  |          ^

Build failed with 1 error
";

        assert_eq!(rendered, expected);
    }

    #[test]
    fn warning_summary() {
        let location = Location::start_of("test.c");
        let warnings = vec![
            Located::at(Failure, location.clone()),
            Located::at(Failure, location),
        ];

        let rendered = Diagnostics::warnings(warnings).to_string();
        assert!(rendered.starts_with("warning: Something went wrong"));
        assert!(rendered.ends_with("2 warnings generated\n"));
    }
}
