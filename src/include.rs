//! Expansión de `#include`.
//!
//! Una directiva `#include "archivo"` se sustituye por los tokens del
//! archivo indicado, resuelto de forma relativa al directorio del archivo
//! que lo incluye. Cada archivo se incluye a lo sumo una vez por
//! compilación, lo cual también corta ciclos de inclusión.

use crate::{
    lex::{Lexer, LexerError, Token},
    source::{self, Located, Location},
};

use std::{
    collections::HashSet,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

/// Resultado de escanear una unidad de compilación completa.
pub type Tokens = Result<Vec<Located<Token>>, Vec<Located<LexerError>>>;

/// Estado de inclusión de una compilación.
#[derive(Default)]
pub struct Preprocessor {
    seen: HashSet<PathBuf>,
}

impl Preprocessor {
    /// Escanea un archivo en disco junto a todo lo que este incluya.
    pub fn file(&mut self, path: &Path) -> Tokens {
        let name = path.display().to_string();
        self.seen.insert(canonical(path));

        match File::open(path) {
            Ok(file) => self.source(BufReader::new(file), name, directory_of(path)),
            Err(error) => {
                let error = LexerError::Include { path: name.clone(), error };
                Err(vec![Located::at(error, Location::start_of(name))])
            }
        }
    }

    /// Escanea un flujo arbitrario. Las inclusiones se resuelven
    /// con respecto a `directory`.
    pub fn source<R, S>(&mut self, reader: R, name: S, directory: &Path) -> Tokens
    where
        R: BufRead,
        S: Into<String>,
    {
        let (start, stream) = source::consume(reader, name);
        let mut tokens = Lexer::new(start, stream).try_exhaustive()?.into_iter();

        let mut output = Vec::new();
        let mut errors = Vec::new();

        while let Some(token) = tokens.next() {
            if *token.val() != Token::Include {
                output.push(token);
                continue;
            }

            let (location, _) = token.split();
            let path = match tokens.next().map(Located::into_inner) {
                Some(Token::StrLiteral(path)) => String::from_utf8_lossy(&path).into_owned(),
                _ => {
                    errors.push(Located::at(LexerError::MissingIncludePath, location));
                    continue;
                }
            };

            let path = directory.join(path);
            if !self.seen.insert(canonical(&path)) {
                log::debug!("Skipping repeated include of {}", path.display());
                continue;
            }

            let file = match File::open(&path) {
                Ok(file) => file,
                Err(error) => {
                    let path = path.display().to_string();
                    errors.push(Located::at(LexerError::Include { path, error }, location));
                    continue;
                }
            };

            log::debug!("Including {}", path.display());

            let name = path.display().to_string();
            match self.source(BufReader::new(file), name, directory_of(&path)) {
                Ok(included) => output.extend(included),
                Err(included) => errors.extend(included),
            }
        }

        if errors.is_empty() {
            Ok(output)
        } else {
            Err(errors)
        }
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn directory_of(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}
