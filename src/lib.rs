//! Compilador de un lenguaje tipo C para un CPU de acumulador de 8 bits.
//!
//! # Front end
//! Cada programa deriva de un archivo de código fuente principal y de
//! los archivos que este incluya. Cada archivo se somete primero a
//! análisis léxico en [`lex`], y las directivas `#include` se expanden
//! en [`include`], de lo cual se obtiene un único flujo de tokens. El
//! flujo de tokens se dispone en un árbol anotado ([`ast`]) por medio
//! de [`parse`], que en la misma pasada resuelve nombres en [`scope`]
//! y verifica tipos en [`types`].
//!
//! # Back end
//! El generador de código en [`codegen`] recorre el árbol y emite
//! ensamblador textual para el procesador descrito en [`arch`],
//! asignando registros sobre la marcha. El ensamblado final se delega
//! a un ensamblador externo.

#[macro_use]
mod macros;

pub mod arch;
pub mod ast;
pub mod codegen;
pub mod error;
pub mod include;
pub mod lex;
pub mod parse;
pub mod scope;
pub mod source;
pub mod types;

pub use codegen::{Options, DEFAULT_ORIGIN};

use error::Diagnostics;
use include::{Preprocessor, Tokens};
use source::Located;
use std::path::Path;
use types::Warning;

/// Resultado de una compilación exitosa.
pub struct Compiled {
    /// Texto ensamblador.
    pub assembly: String,

    /// Advertencias de tipos, ninguna de ellas fatal.
    pub warnings: Vec<Located<Warning>>,
}

/// Compila código fuente en memoria. Las inclusiones se resuelven con
/// respecto al directorio actual.
pub fn compile_str(input: &str, options: &Options) -> Result<Compiled, Diagnostics> {
    let tokens = Preprocessor::default().source(input.as_bytes(), "<input>", Path::new("."));
    compile_tokens(tokens, options)
}

/// Compila un archivo en disco.
pub fn compile_file(path: &Path, options: &Options) -> Result<Compiled, Diagnostics> {
    let tokens = Preprocessor::default().file(path);
    compile_tokens(tokens, options)
}

fn compile_tokens(tokens: Tokens, options: &Options) -> Result<Compiled, Diagnostics> {
    let tokens = tokens?;
    log::debug!("Scanned {} tokens", tokens.len());

    let parsed = parse::parse(&tokens)?;

    let mut output = Vec::new();
    codegen::emit(&parsed.program, options, &mut output)?;

    Ok(Compiled {
        assembly: String::from_utf8_lossy(&output).into_owned(),
        warnings: parsed.warnings,
    })
}
