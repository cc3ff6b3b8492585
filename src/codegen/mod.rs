//! Generación de código.
//!
//! El generador recorre el árbol anotado y emite ensamblador textual.
//! Todo el estado mutable de una generación (registros, profundidad de
//! pushes temporales, contadores de etiquetas) vive en un [`Context`]
//! propio, por lo cual varias compilaciones pueden coexistir en un
//! mismo proceso.
//!
//! # Convención de llamada
//! Los argumentos se empujan de izquierda a derecha y `call` empuja
//! la dirección de retorno. El llamador libera los argumentos tras el
//! retorno. Un valor de retorno de 8 bits llega en `a` y uno de 16 bits
//! en `bc`. Todo registro retenido por el llamador se preserva en pila
//! alrededor de la llamada.
//!
//! # Datos
//! No existe una sección de datos. Globales y literales de string se
//! emiten en el flujo de instrucciones precedidos por un salto que los
//! evita.

use crate::{
    arch::{Address, Reg, Register},
    ast::{BinOp, Block, Expr, ExprKind, Function, Item, Program, Statement, UnOp, Variable},
    scope::{ScopeId, Scopes, Storage, Symbol},
    source::{Located, Location},
    types::Type,
};

use std::{
    collections::HashMap,
    fmt::Display,
    io::{self, Write},
};

use thiserror::Error;

mod regs;

pub use regs::{Allocations, Exhausted, RegSet};

/// Dirección de carga por defecto.
pub const DEFAULT_ORIGIN: u16 = 0x8000;

/// Configuración de la generación.
#[derive(Clone, Debug)]
pub struct Options {
    /// Dirección a partir de la cual se coloca el programa.
    pub origin: u16,

    /// Archivo de ensamblador incluido antes de todo lo demás.
    pub prelude: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            origin: DEFAULT_ORIGIN,
            prelude: None,
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GenError {
    #[error(transparent)]
    Exhausted(#[from] Exhausted),

    #[error("Failed to write output")]
    Io(#[from] io::Error),

    #[error("{0} of 16-bit operands is not supported by this target")]
    Unsupported(&'static str),

    #[error("Expression has no value")]
    VoidValue,

    #[error("Global initializer cannot be evaluated at compile time")]
    NotConstant,
}

/// Emite el programa completo.
pub fn emit<W: Write>(
    program: &Program,
    options: &Options,
    output: &mut W,
) -> Result<(), Located<GenError>> {
    let mut cx = Context {
        output,
        scopes: &program.scopes,
        regs: Allocations::default(),
        depth: 0,
        labels: HashMap::new(),
        frame: None,
        here: Location::start_of("<output>"),
    };

    cx.program(program, options)
        .map_err(|error| Located::at(error, cx.here.clone()))
}

type Gen<T> = Result<T, GenError>;

/// Contexto de emisión.
struct Context<'a, W> {
    output: &'a mut W,
    scopes: &'a Scopes,
    regs: Allocations,

    /// Bytes empujados temporalmente sobre el frame actual.
    depth: u16,

    /// Siguiente índice por familia de etiquetas.
    labels: HashMap<&'static str, u32>,

    frame: Option<Frame>,

    /// Ubicación del último nodo visitado, para errores.
    here: Location,
}

/// Función en emisión.
struct Frame {
    name: String,
    ret: u16,
    body: ScopeId,
}

/// Familia de etiquetas y par de saltos que materializan un booleano
/// tras `cmp`. Con `cmp`, Z indica igualdad y C indica izquierda mayor.
type Comparison = (&'static str, [(&'static str, &'static str); 2]);

fn comparison(op: BinOp) -> Option<Comparison> {
    let comparison = match op {
        BinOp::Equal => ("cmp_equal", [("je", "true"), ("jmp", "false")]),
        BinOp::NotEqual => ("cmp_not_equal", [("je", "false"), ("jmp", "true")]),
        BinOp::Less => ("cmp_less", [("jc", "false"), ("je", "false")]),
        BinOp::LessOrEqual => ("cmp_less_equal", [("jc", "false"), ("jmp", "true")]),
        BinOp::Greater => ("cmp_more", [("jc", "true"), ("jmp", "false")]),
        BinOp::GreaterOrEqual => ("cmp_more_equal", [("je", "true"), ("jnc", "false")]),
        _ => return None,
    };

    Some(comparison)
}

impl<'a, W: Write> Context<'a, W> {
    fn output(&mut self) -> &mut W {
        &mut *self.output
    }

    fn program(&mut self, program: &Program, options: &Options) -> Gen<()> {
        if let Some(prelude) = &options.prelude {
            writeln!(self.output, "#include \"{}\"", prelude)?;
        }

        writeln!(self.output, "#bank RAM")?;
        writeln!(self.output, "#addr {:#06x}", options.origin)?;

        self.put_label("__start")?;
        emit!(self, "call", "main")?;
        self.put_label("__halt")?;
        emit!(self, "jmp", "__halt")?;

        for item in &program.items {
            match item {
                Item::Variable(variable) => self.global(variable)?,
                Item::Function(function) => self.function(function)?,
            }
        }

        self.put_label("heap_start")
    }

    fn global(&mut self, variable: &Variable) -> Gen<()> {
        let symbol = &variable.symbol;
        if symbol.storage() == Storage::Extern {
            return Ok(());
        }

        self.here = symbol.location().clone();
        log::debug!("Emitting global `{}`", symbol.name());

        let size = symbol.typ().size();
        let data = match &variable.init {
            None => format!("#res {}", size),

            Some(init) => match &init.kind {
                ExprKind::Str(bytes) => format!("#d16 {}", self.string(bytes)?),
                _ => {
                    let value = init.fold().ok_or(GenError::NotConstant)?;
                    match size {
                        1 => format!("#d8 {}", value & 0xff),
                        _ => format!("#d16 {}", value),
                    }
                }
            },
        };

        emit!(self, "jmp", "{} + {}", symbol.name(), size)?;
        self.put_label(symbol.name())?;
        emit!(self, data)?;

        Ok(())
    }

    fn function(&mut self, function: &Function) -> Gen<()> {
        let name = function.symbol.name().to_string();
        let ret = match function.symbol.typ() {
            Type::Function { ret, .. } => ret.size(),
            _ => 0,
        };

        log::debug!("Emitting function `{}`", name);
        self.here = function.symbol.location().clone();

        self.frame = Some(Frame {
            name: name.clone(),
            ret,
            body: function.body.scope,
        });

        let size = self.scopes.frame_size(function.body.scope);

        self.put_label(&name)?;
        self.reserve(size)?;

        for statement in &function.body.statements {
            self.statement(statement)?;
        }

        self.put_label(format_args!("{}_exit", name))?;
        self.release(size)?;
        emit!(self, "ret")?;

        self.frame = None;
        Ok(())
    }

    fn block(&mut self, block: &Block) -> Gen<()> {
        let size = self.scopes.frame_size(block.scope);
        self.reserve(size)?;

        for statement in &block.statements {
            self.statement(statement)?;
        }

        self.release(size)
    }

    fn statement(&mut self, statement: &Statement) -> Gen<()> {
        match statement {
            Statement::Declaration(variable) => self.local(variable)?,
            Statement::Expr(expr) => self.discard(expr)?,
            Statement::Return {
                value,
                scope,
                location,
            } => {
                self.here = location.clone();
                self.ret(value.as_ref(), *scope)?;
            }

            Statement::Block(block) => self.block(block)?,

            Statement::If {
                cond,
                then,
                otherwise,
                location,
            } => {
                self.here = location.clone();
                let n = self.next_label("if");

                self.test(cond)?;
                emit!(self, "je", ".if_false_{}", n)?;

                self.put_label(format_args!(".if_true_{}", n))?;
                self.statement(then)?;
                emit!(self, "jmp", ".if_exit_{}", n)?;

                self.put_label(format_args!(".if_false_{}", n))?;
                if let Some(otherwise) = otherwise {
                    self.statement(otherwise)?;
                }

                self.put_label(format_args!(".if_exit_{}", n))?;
            }

            Statement::While {
                cond,
                body,
                location,
            } => {
                self.here = location.clone();
                let n = self.next_label("while");

                self.put_label(format_args!(".while_start_{}", n))?;
                self.test(cond)?;
                emit!(self, "je", ".while_exit_{}", n)?;

                self.put_label(format_args!(".while_contents_{}", n))?;
                self.statement(body)?;
                emit!(self, "jmp", ".while_start_{}", n)?;

                self.put_label(format_args!(".while_exit_{}", n))?;
            }
        }

        debug_assert_eq!(self.depth, 0, "unbalanced pushes after statement");
        Ok(())
    }

    /// Declaración local: solo los inicializadores generan código.
    fn local(&mut self, variable: &Variable) -> Gen<()> {
        let init = match &variable.init {
            Some(init) => init,
            None => return Ok(()),
        };

        let symbol = &variable.symbol;
        let reg = self.value(init)?;
        let reg = self.coerce(reg, symbol.typ().size())?;

        let address = self.address(symbol, init.scope);
        self.store(&address, reg)?;
        self.regs.free(reg);

        Ok(())
    }

    fn ret(&mut self, value: Option<&Expr>, scope: ScopeId) -> Gen<()> {
        let (name, size, body) = match &self.frame {
            Some(frame) => (frame.name.clone(), frame.ret, frame.body),
            None => return Ok(()),
        };

        if let Some(value) = value {
            let reg = self.value(value)?;
            let reg = self.coerce(reg, size)?;

            let target = Reg::ret(size);
            if reg != target {
                emit!(self, "mov", "{}, {}", target, reg)?;
            }

            self.regs.free(reg);
        }

        // Los bloques anidados liberan su frame antes de saltar al epílogo
        let mut nested = 0;
        let mut current = scope;
        while current != body {
            nested += self.scopes.frame_size(current);
            match self.scopes.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }

        self.release(nested)?;
        emit!(self, "jmp", "{}_exit", name)?;

        Ok(())
    }

    /// Evalúa una condición y deja las banderas de `cmp 0`.
    fn test(&mut self, cond: &Expr) -> Gen<()> {
        let reg = self.value(cond)?;

        match reg.halves() {
            None if reg == Reg::ACCUMULATOR => emit!(self, "cmp", "0")?,

            None => self.preserving_accumulator(|cx| {
                emit!(cx, "mov", "a, {}", reg)?;
                emit!(cx, "cmp", "0")?;
                Ok(())
            })?,

            Some((high, low)) => self.preserving_accumulator(|cx| {
                emit!(cx, "mov", "a, {}", high)?;
                emit!(cx, "or", "{}", low)?;
                emit!(cx, "cmp", "0")?;
                Ok(())
            })?,
        }

        self.regs.free(reg);
        Ok(())
    }

    /// Evalúa una expresión por sus efectos.
    fn discard(&mut self, expr: &Expr) -> Gen<()> {
        let reg = match &expr.kind {
            ExprKind::Call { function, args } => {
                self.here = expr.location.clone();
                self.call(function, args)?
            }

            _ => Some(self.value(expr)?),
        };

        if let Some(reg) = reg {
            self.regs.free(reg);
        }

        Ok(())
    }

    /// Evalúa una expresión en un registro recién asignado del tamaño
    /// de su tipo.
    fn value(&mut self, expr: &Expr) -> Gen<Reg> {
        self.here = expr.location.clone();
        let size = expr.typ.size();

        match &expr.kind {
            ExprKind::Number(value) => {
                let reg = self.regs.allocate(size)?;
                emit!(self, "mov", "{}, {}", reg, value)?;

                Ok(reg)
            }

            ExprKind::Str(bytes) => {
                let label = self.string(bytes)?;
                let reg = self.regs.allocate(2)?;
                emit!(self, "mov", "{}, {}", reg, label)?;

                Ok(reg)
            }

            ExprKind::Variable(symbol) => {
                let address = self.address(symbol, expr.scope);
                let reg = self.regs.allocate(size)?;
                self.load(reg, &address)?;

                Ok(reg)
            }

            ExprKind::Assign(target, value) => self.assign(target, value),
            ExprKind::Binary(op, left, right) => self.binary(*op, left, right, size),
            ExprKind::Unary(op, operand) => self.unary(*op, operand, &expr.typ),

            ExprKind::Call { function, args } => {
                self.call(function, args)?.ok_or(GenError::VoidValue)
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr) -> Gen<Reg> {
        let reg = self.value(value)?;
        let reg = self.coerce(reg, target.typ.size())?;

        self.here = target.location.clone();
        match &target.kind {
            ExprKind::Variable(symbol) => {
                let address = self.address(symbol, target.scope);
                self.store(&address, reg)?;
            }

            ExprKind::Unary(UnOp::Deref, pointer) => {
                let pointer = self.value(pointer)?;
                self.store(&Address::Indirect(pointer), reg)?;
                self.regs.free(pointer);
            }

            _ => unreachable!("assignment to a non-lvalue"),
        }

        Ok(reg)
    }

    fn binary(&mut self, op: BinOp, left: &Expr, right: &Expr, size: u16) -> Gen<Reg> {
        let lhs = self.value(left)?;
        let lhs = self.coerce(lhs, size)?;
        let rhs = self.value(right)?;
        let rhs = self.coerce(rhs, size)?;

        if let Some(comparison) = comparison(op) {
            return self.compare(comparison, lhs, rhs);
        }

        match (op, size) {
            (BinOp::Add, 2) => self.wide("add16", lhs, rhs),
            (BinOp::Sub, 2) => self.wide("sub16", lhs, rhs),
            (BinOp::And, 2) => self.halfwise("and", lhs, rhs),
            (BinOp::Or, 2) => self.halfwise("or", lhs, rhs),
            (BinOp::Mul, 2) => Err(GenError::Unsupported("Multiplication")),
            (BinOp::Div, 2) => Err(GenError::Unsupported("Division")),
            (BinOp::ShiftLeft, 2) | (BinOp::ShiftRight, 2) => {
                Err(GenError::Unsupported("Shifting"))
            }

            (BinOp::Add, _) => self.operation("add", lhs, rhs),
            (BinOp::Sub, _) => self.operation("sub", lhs, rhs),
            (BinOp::And, _) => self.operation("and", lhs, rhs),
            (BinOp::Or, _) => self.operation("or", lhs, rhs),
            (BinOp::Mul, _) => self.multiply(lhs, rhs),
            (BinOp::Div, _) => self.divide(lhs, rhs),
            (BinOp::ShiftLeft, _) => self.shift(false, lhs, rhs),
            (BinOp::ShiftRight, _) => self.shift(true, lhs, rhs),

            _ => unreachable!("comparisons are handled above"),
        }
    }

    fn unary(&mut self, op: UnOp, operand: &Expr, typ: &Type) -> Gen<Reg> {
        match op {
            UnOp::Plus => self.value(operand),

            UnOp::Negate => {
                let value = self.value(operand)?;
                let zero = self.regs.allocate(value.size())?;
                emit!(self, "mov", "{}, 0", zero)?;

                match value.size() {
                    2 => self.wide("sub16", zero, value),
                    _ => self.operation("sub", zero, value),
                }
            }

            UnOp::AddressOf => match &operand.kind {
                ExprKind::Variable(symbol) => {
                    let address = self.address(symbol, operand.scope);
                    let reg = self.regs.allocate(2)?;
                    emit!(self, "mov", "{}, {}", reg, address.immediate())?;

                    Ok(reg)
                }

                ExprKind::Unary(UnOp::Deref, pointer) => self.value(pointer),
                _ => unreachable!("address of a non-lvalue"),
            },

            UnOp::Deref => {
                let pointer = self.value(operand)?;
                let reg = self.regs.allocate(typ.size())?;
                self.load(reg, &Address::Indirect(pointer))?;
                self.regs.free(pointer);

                Ok(reg)
            }

            UnOp::Increment | UnOp::Decrement => {
                let reg = self.value(operand)?;
                let opcode = match op {
                    UnOp::Increment => "inc",
                    _ => "dec",
                };

                // Los punteros avanzan por el tamaño de su base
                let step = operand.typ.base().map_or(1, |base| base.size().max(1));
                for _ in 0..step {
                    emit!(self, opcode, "{}", reg)?;
                }

                Ok(reg)
            }
        }
    }

    /// Llamada a función. El resultado es `None` para funciones `void`.
    fn call(&mut self, function: &Symbol, args: &[Expr]) -> Gen<Option<Reg>> {
        let (ret, params) = match function.typ() {
            Type::Function { ret, params } => (ret.size(), params.as_slice()),
            _ => (0, &[][..]),
        };

        // Todo registro vivo se preserva y queda libre para los argumentos
        let saved: Vec<Reg> = self.regs.held().regs().collect();
        for &reg in &saved {
            self.push(reg)?;
            self.regs.free(reg);
        }

        let mut pushed = 0;
        for (arg, param) in args.iter().zip(params) {
            let reg = self.value(arg)?;
            let reg = self.coerce(reg, param.size())?;

            self.push(reg)?;
            self.regs.free(reg);
            pushed += param.size();
        }

        emit!(self, "call", "{}", function.name())?;
        if pushed > 0 {
            emit!(self, "mov", "sp, sp+{}", pushed)?;
            self.depth -= pushed;
        }

        let result = match ret {
            0 => None,
            size => {
                let reg = Reg::ret(size);
                self.regs.claim(reg);
                Some(reg)
            }
        };

        // Si el registro de retorno debe restaurarse, el resultado se
        // mueve a otro registro antes de los pops
        let (clashing, clear): (Vec<Reg>, Vec<Reg>) = saved
            .iter()
            .copied()
            .partition(|&reg| result.map_or(false, |result| result.overlaps(reg)));

        for &reg in &clear {
            self.regs.claim(reg);
        }

        let result = match result {
            Some(reg) if !clashing.is_empty() => {
                let moved = self.regs.allocate(reg.size())?;
                emit!(self, "mov", "{}, {}", moved, reg)?;
                self.regs.free(reg);

                Some(moved)
            }

            result => result,
        };

        for &reg in &clashing {
            self.regs.claim(reg);
        }

        for &reg in saved.iter().rev() {
            self.pop(reg)?;
        }

        Ok(result)
    }

    /// Ajusta un valor al tamaño indicado. Ampliar pone la mitad alta
    /// en cero y reducir conserva la mitad baja.
    fn coerce(&mut self, reg: Reg, size: u16) -> Gen<Reg> {
        match (reg.size(), size) {
            (1, 2) => {
                self.regs.free(reg);
                let wide = self.regs.allocate(2)?;

                if wide.low() != reg {
                    emit!(self, "mov", "{}, {}", wide.low(), reg)?;
                }

                emit!(self, "mov", "{}, 0", wide.high())?;
                Ok(wide)
            }

            (2, 1) => {
                self.regs.free(reg);

                let low = reg.low();
                self.regs.claim(low);

                Ok(low)
            }

            _ => Ok(reg),
        }
    }

    fn compare(&mut self, (family, branches): Comparison, lhs: Reg, rhs: Reg) -> Gen<Reg> {
        let n = self.next_label(family);

        if lhs.size() == 1 {
            return self.accumulate(lhs, rhs, |cx, rhs| {
                emit!(cx, "cmp", "{}", rhs)?;
                cx.materialize(family, branches, n)
            });
        }

        // Se comparan mitades altas y, solo si son iguales, mitades bajas
        self.preserving_accumulator(|cx| {
            let decide = format!(".{}_decide_{}", family, n);

            emit!(cx, "mov", "a, {}", lhs.high())?;
            emit!(cx, "cmp", "{}", rhs.high())?;
            emit!(cx, "jne", "{}", decide)?;
            emit!(cx, "mov", "a, {}", lhs.low())?;
            emit!(cx, "cmp", "{}", rhs.low())?;
            cx.put_label(&decide)?;

            cx.materialize(family, branches, n)?;
            emit!(cx, "mov", "{}, a", lhs.low())?;
            emit!(cx, "mov", "{}, 0", lhs.high())?;

            Ok(())
        })?;

        self.regs.free(rhs);
        Ok(lhs)
    }

    /// Convierte las banderas de un `cmp` en 0 o 1 dentro de `a`.
    fn materialize(
        &mut self,
        family: &str,
        branches: [(&'static str, &'static str); 2],
        n: u32,
    ) -> Gen<()> {
        for (opcode, outcome) in branches {
            emit!(self, opcode, ".{}_{}_{}", family, outcome, n)?;
        }

        self.put_label(format_args!(".{}_true_{}", family, n))?;
        emit!(self, "mov", "a, 1")?;
        emit!(self, "jmp", ".{}_exit_{}", family, n)?;

        self.put_label(format_args!(".{}_false_{}", family, n))?;
        emit!(self, "mov", "a, 0")?;

        self.put_label(format_args!(".{}_exit_{}", family, n))
    }

    /// Rotación en lazo. El conteo se toma módulo 8; a la derecha se
    /// rota `8 - n` veces a la izquierda.
    fn shift(&mut self, right: bool, lhs: Reg, rhs: Reg) -> Gen<Reg> {
        let family = if right { "shr" } else { "shl" };
        let n = self.next_label(family);

        self.accumulate(lhs, rhs, |cx, count| {
            cx.push(Reg::ACCUMULATOR)?;
            if right {
                emit!(cx, "mov", "a, 8")?;
                emit!(cx, "sub", "{}", count)?;
            } else {
                emit!(cx, "mov", "a, {}", count)?;
            }

            emit!(cx, "and", "0b111")?;
            emit!(cx, "mov", "{}, a", count)?;
            cx.pop(Reg::ACCUMULATOR)?;

            cx.put_label(format_args!(".{}_loop_{}", family, n))?;
            emit!(cx, "dec", "{}", count)?;
            emit!(cx, "jnc", ".{}_exit_{}", family, n)?;
            emit!(cx, "rol")?;
            emit!(cx, "jmp", ".{}_loop_{}", family, n)?;
            cx.put_label(format_args!(".{}_exit_{}", family, n))
        })
    }

    /// Producto por sumas repetidas.
    fn multiply(&mut self, lhs: Reg, rhs: Reg) -> Gen<Reg> {
        let n = self.next_label("mul");

        self.accumulate(lhs, rhs, |cx, count| {
            let multiplicand = cx.regs.allocate(1)?;
            emit!(cx, "mov", "{}, a", multiplicand)?;
            emit!(cx, "mov", "a, 0")?;

            cx.put_label(format_args!(".mul_loop_{}", n))?;
            emit!(cx, "dec", "{}", count)?;
            emit!(cx, "jnc", ".mul_exit_{}", n)?;
            emit!(cx, "add", "{}", multiplicand)?;
            emit!(cx, "jmp", ".mul_loop_{}", n)?;
            cx.put_label(format_args!(".mul_exit_{}", n))?;

            cx.regs.free(multiplicand);
            Ok(())
        })
    }

    /// Cociente por restas repetidas.
    fn divide(&mut self, lhs: Reg, rhs: Reg) -> Gen<Reg> {
        let n = self.next_label("div");

        self.accumulate(lhs, rhs, |cx, divisor| {
            let quotient = cx.regs.allocate(1)?;
            emit!(cx, "mov", "{}, 0", quotient)?;

            cx.put_label(format_args!(".div_loop_{}", n))?;
            emit!(cx, "cmp", "{}", divisor)?;
            emit!(cx, "je", ".div_step_{}", n)?;
            emit!(cx, "jnc", ".div_exit_{}", n)?;
            cx.put_label(format_args!(".div_step_{}", n))?;
            emit!(cx, "sub", "{}", divisor)?;
            emit!(cx, "inc", "{}", quotient)?;
            emit!(cx, "jmp", ".div_loop_{}", n)?;
            cx.put_label(format_args!(".div_exit_{}", n))?;
            emit!(cx, "mov", "a, {}", quotient)?;

            cx.regs.free(quotient);
            Ok(())
        })
    }

    /// Operación de 8 bits con una sola instrucción de acumulador.
    fn operation(&mut self, opcode: &'static str, lhs: Reg, rhs: Reg) -> Gen<Reg> {
        self.accumulate(lhs, rhs, |cx, rhs| {
            emit!(cx, opcode, "{}", rhs)?;
            Ok(())
        })
    }

    /// Operación de 16 bits con instrucción propia.
    fn wide(&mut self, opcode: &'static str, lhs: Reg, rhs: Reg) -> Gen<Reg> {
        emit!(self, opcode, "{}, {}", lhs, rhs)?;
        self.regs.free(rhs);

        Ok(lhs)
    }

    /// Operación de 16 bits mitad por mitad.
    fn halfwise(&mut self, opcode: &'static str, lhs: Reg, rhs: Reg) -> Gen<Reg> {
        for (left, right) in [(lhs.low(), rhs.low()), (lhs.high(), rhs.high())] {
            self.through_accumulator(left, |cx| {
                emit!(cx, opcode, "{}", right)?;
                Ok(())
            })?;
        }

        self.regs.free(rhs);
        Ok(lhs)
    }

    /// Carril del acumulador para operaciones binarias de 8 bits.
    ///
    /// `op` se ejecuta con el operando izquierdo en `a` y recibe el
    /// registro del operando derecho. El resultado queda en `lhs` y
    /// `rhs` se libera.
    fn accumulate<F>(&mut self, lhs: Reg, rhs: Reg, op: F) -> Gen<Reg>
    where
        F: FnOnce(&mut Self, Reg) -> Gen<()>,
    {
        // El operando derecho no puede quedar en `a` si `lhs` va a ocupar su lugar
        let rhs = if rhs == Reg::ACCUMULATOR && lhs != Reg::ACCUMULATOR {
            let moved = self.regs.allocate(1)?;
            emit!(self, "mov", "{}, a", moved)?;
            self.regs.free(Reg::ACCUMULATOR);

            moved
        } else {
            rhs
        };

        self.through_accumulator(lhs, |cx| op(cx, rhs))?;
        self.regs.free(rhs);

        Ok(lhs)
    }

    /// Ejecuta `op` con el contenido de `reg` en `a` y lo devuelve a
    /// `reg` al terminar.
    fn through_accumulator<F>(&mut self, reg: Reg, op: F) -> Gen<()>
    where
        F: FnOnce(&mut Self) -> Gen<()>,
    {
        if reg == Reg::ACCUMULATOR {
            return op(self);
        }

        self.preserving_accumulator(|cx| {
            emit!(cx, "mov", "a, {}", reg)?;
            op(cx)?;
            emit!(cx, "mov", "{}, a", reg)?;

            Ok(())
        })
    }

    /// Ejecuta `op` con `a` disponible. Si `a` está ocupado se empuja
    /// antes y se restaura después.
    fn preserving_accumulator<F>(&mut self, op: F) -> Gen<()>
    where
        F: FnOnce(&mut Self) -> Gen<()>,
    {
        if self.regs.claim(Reg::ACCUMULATOR) {
            let result = op(self);
            self.regs.free(Reg::ACCUMULATOR);

            result
        } else {
            self.push(Reg::ACCUMULATOR)?;
            op(self)?;
            self.pop(Reg::ACCUMULATOR)
        }
    }

    fn load(&mut self, reg: Reg, address: &Address) -> Gen<()> {
        match reg.halves() {
            None => emit!(self, "mov", "{}, {}", reg, address)?,
            Some((high, low)) => {
                emit!(self, "mov", "{}, {}", low, address)?;
                self.step_indirect(address)?;
                emit!(self, "mov", "{}, {}", high, address.next_byte())?;
            }
        }

        Ok(())
    }

    fn store(&mut self, address: &Address, reg: Reg) -> Gen<()> {
        match reg.halves() {
            None => emit!(self, "mov", "{}, {}", address, reg)?,
            Some((high, low)) => {
                emit!(self, "mov", "{}, {}", address, low)?;
                self.step_indirect(address)?;
                emit!(self, "mov", "{}, {}", address.next_byte(), high)?;
            }
        }

        Ok(())
    }

    /// Las direcciones indirectas avanzan su propio par al byte alto.
    fn step_indirect(&mut self, address: &Address) -> Gen<()> {
        if let Address::Indirect(pair) = address {
            emit!(self, "inc", "{}", pair)?;
        }

        Ok(())
    }

    /// Operando de memoria de un símbolo visto desde `from`.
    fn address(&self, symbol: &Symbol, from: ScopeId) -> Address {
        match self.scopes.stack_offset(symbol, from) {
            Some(offset) => Address::Stack(offset + self.depth),
            None => Address::Label(symbol.name().to_string(), 0),
        }
    }

    /// Emite un literal de string en línea y retorna su etiqueta.
    fn string(&mut self, bytes: &[u8]) -> Gen<String> {
        let n = self.next_label("string");

        // Fuera de una función no hay etiqueta global a la cual anclar
        let prefix = if self.frame.is_some() { "." } else { "" };

        emit!(self, "jmp", "{}string_skip_{}", prefix, n)?;
        self.put_label(format_args!("{}string_{}", prefix, n))?;
        emit!(self, "#d", "\"{}\\0\"", escape(bytes))?;
        self.put_label(format_args!("{}string_skip_{}", prefix, n))?;

        Ok(format!("{}string_{}", prefix, n))
    }

    fn push(&mut self, reg: Reg) -> Gen<()> {
        self.depth += reg.size();
        emit!(self, "push", "{}", reg)?;

        Ok(())
    }

    fn pop(&mut self, reg: Reg) -> Gen<()> {
        emit!(self, "pop", "{}", reg)?;
        self.depth -= reg.size();

        Ok(())
    }

    fn reserve(&mut self, size: u16) -> Gen<()> {
        if size > 0 {
            emit!(self, "mov", "sp, sp-{}", size)?;
        }

        Ok(())
    }

    fn release(&mut self, size: u16) -> Gen<()> {
        if size > 0 {
            emit!(self, "mov", "sp, sp+{}", size)?;
        }

        Ok(())
    }

    fn put_label<L: Display>(&mut self, label: L) -> Gen<()> {
        writeln!(self.output, "{}:", label)?;
        Ok(())
    }

    fn next_label(&mut self, family: &'static str) -> u32 {
        let counter = self.labels.entry(family).or_insert(0);
        let next = *counter;
        *counter += 1;

        next
    }
}

/// Escapa bytes para la directiva `#d`.
fn escape(bytes: &[u8]) -> String {
    let mut escaped = String::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'"' => escaped.push_str("\\\""),
            b'\\' => escaped.push_str("\\\\"),
            b'\n' => escaped.push_str("\\n"),
            b'\t' => escaped.push_str("\\t"),
            b'\r' => escaped.push_str("\\r"),
            0 => escaped.push_str("\\0"),
            0x20..=0x7e => escaped.push(byte as char),
            _ => escaped.push_str(&format!("\\x{:02x}", byte)),
        }
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::escape;

    #[test]
    fn string_escapes() {
        assert_eq!(escape(b"Hello world!"), "Hello world!");
        assert_eq!(escape(b"a\"b\\c\n"), "a\\\"b\\\\c\\n");
        assert_eq!(escape(&[0x01, 0xff]), "\\x01\\xff");
    }
}
