//! Tabla de símbolos y ámbitos léxicos.
//!
//! Los ámbitos viven en una arena ([`Scopes`]) y se referencian por
//! índice ([`ScopeId`]). El árbol sintáctico conserva estos índices, de
//! forma que la generación de código puede consultar tamaños de frame
//! mucho después de que el parser haya salido del bloque.

use crate::{
    lex::Identifier,
    source::{Located, Location},
    types::Type,
};

use std::rc::Rc;
use thiserror::Error;

/// Identificador estable de un ámbito.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    /// El ámbito global, siempre presente.
    pub const GLOBAL: ScopeId = ScopeId(0);
}

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Redeclaration of `{name}`, previously declared at {previous}")]
    Redeclaration { name: Identifier, previous: Location },

    #[error("Undeclared identifier `{0}`")]
    Undeclared(Identifier),
}

/// Clase de almacenamiento de un símbolo.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Storage {
    /// Direccionado por etiqueta, con reserva propia.
    Global,

    /// Posición en el frame de su ámbito, en orden de declaración.
    Local { offset: u16 },

    /// Direccionado por etiqueta, definido en otra parte.
    Extern,
}

/// Un nombre declarado.
#[derive(Debug)]
pub struct Symbol {
    name: Located<Identifier>,
    typ: Type,
    storage: Storage,
    scope: ScopeId,
}

impl Symbol {
    pub fn name(&self) -> &Identifier {
        self.name.val()
    }

    pub fn location(&self) -> &Location {
        self.name.location()
    }

    pub fn typ(&self) -> &Type {
        &self.typ
    }

    pub fn storage(&self) -> Storage {
        self.storage
    }

    /// Ámbito que declaró a este símbolo.
    pub fn scope(&self) -> ScopeId {
        self.scope
    }
}

struct Scope {
    parent: Option<ScopeId>,
    depth: u32,
    symbols: Vec<Rc<Symbol>>,
    stack_size: u16,
}

/// Arena de ámbitos de una unidad de compilación.
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Default for Scopes {
    fn default() -> Self {
        let global = Scope {
            parent: None,
            depth: 0,
            symbols: Vec::new(),
            stack_size: 0,
        };

        Scopes {
            scopes: vec![global],
        }
    }
}

impl Scopes {
    /// Crea un nuevo ámbito anidado en `parent`.
    pub fn enter(&mut self, parent: ScopeId) -> ScopeId {
        let depth = self.get(parent).depth + 1;
        let id = ScopeId(self.scopes.len() as u32);

        self.scopes.push(Scope {
            parent: Some(parent),
            depth,
            symbols: Vec::new(),
            stack_size: 0,
        });

        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.get(scope).parent
    }

    /// Bytes de pila que ocupa el frame propio de un ámbito.
    pub fn frame_size(&self, scope: ScopeId) -> u16 {
        self.get(scope).stack_size
    }

    /// Símbolos declarados directamente en un ámbito, en orden.
    pub fn symbols(&self, scope: ScopeId) -> &[Rc<Symbol>] {
        &self.get(scope).symbols
    }

    /// Declara un símbolo en el ámbito indicado.
    ///
    /// En el ámbito global el símbolo queda como global. En cualquier
    /// otro toma el tamaño actual del frame como offset y el frame crece
    /// por el tamaño de su tipo. Los símbolos `extern` no ocupan pila.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: Located<Identifier>,
        typ: Type,
        is_extern: bool,
    ) -> Result<Rc<Symbol>, ScopeError> {
        let target = self.get_mut(scope);

        if let Some(previous) = target.symbols.iter().find(|s| s.name() == name.val()) {
            return Err(ScopeError::Redeclaration {
                name: name.into_inner(),
                previous: previous.location().clone(),
            });
        }

        let storage = match (is_extern, target.depth) {
            (true, _) => Storage::Extern,
            (false, 0) => Storage::Global,
            (false, _) => {
                let offset = target.stack_size;
                target.stack_size += typ.size();

                Storage::Local { offset }
            }
        };

        let symbol = Rc::new(Symbol {
            name,
            typ,
            storage,
            scope,
        });

        target.symbols.push(Rc::clone(&symbol));
        Ok(symbol)
    }

    /// Reserva bytes anónimos al final del frame de un ámbito.
    pub fn reserve(&mut self, scope: ScopeId, bytes: u16) {
        self.get_mut(scope).stack_size += bytes;
    }

    /// Busca un nombre desde `scope` hacia afuera. Gana la
    /// declaración más interna.
    pub fn lookup(&self, scope: ScopeId, name: &Identifier) -> Result<Rc<Symbol>, ScopeError> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get(id);
            if let Some(symbol) = scope.symbols.iter().find(|s| s.name() == name) {
                return Ok(Rc::clone(symbol));
            }

            current = scope.parent;
        }

        Err(ScopeError::Undeclared(name.clone()))
    }

    /// Distancia en bytes desde el puntero de pila hasta un local, vista
    /// desde el ámbito `from` sin pushes temporales.
    ///
    /// Los frames de pila crecen hacia abajo mientras que los offsets de
    /// declaración crecen hacia arriba, por lo cual el primer local de un
    /// frame queda en la dirección más alta. Para símbolos direccionados
    /// por nombre el resultado es `None`.
    pub fn stack_offset(&self, symbol: &Symbol, from: ScopeId) -> Option<u16> {
        let offset = match symbol.storage {
            Storage::Local { offset } => offset,
            Storage::Global | Storage::Extern => return None,
        };

        let mut inner = 0;
        let mut current = from;
        while current != symbol.scope {
            inner += self.frame_size(current);
            current = self.parent(current)?;
        }

        Some(inner + self.frame_size(current) - offset - symbol.typ.size())
    }

    fn get(&self, ScopeId(id): ScopeId) -> &Scope {
        &self.scopes[id as usize]
    }

    fn get_mut(&mut self, ScopeId(id): ScopeId) -> &mut Scope {
        &mut self.scopes[id as usize]
    }
}
