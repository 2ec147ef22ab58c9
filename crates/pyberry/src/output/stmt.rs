//! Berry emission of statements.
//!
//! One top-to-bottom pass over the module. Scope state is updated as
//! statements are emitted, so an expression sees exactly the bindings
//! that precede it in source order.

use super::buffer::OutputBuffer;
use super::expr::ExprWriter;
use crate::ast::*;
use crate::error::TranslateError;
use crate::mappings::MappingTable;
use crate::scope::{
    Binding, ContainerKind, FrameKind, ScopeMode, ScopeTracker, annotation_kind,
    infer_container_kind,
};

/// Knobs that change the emitted text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    pub scope_mode: ScopeMode,
    /// Emit a `var a, b` member line for the `self.` fields of each class.
    pub declare_members: bool,
}

/// Emit a whole module as Berry source.
pub fn emit(
    module: &Module,
    table: &MappingTable,
    options: EmitOptions,
) -> Result<String, TranslateError> {
    let mut writer = StmtWriter::new(table, options);
    writer.write_block(&module.body)?;
    Ok(writer.buffer.finish())
}

struct StmtWriter<'a> {
    table: &'a MappingTable,
    options: EmitOptions,
    scope: ScopeTracker,
    buffer: OutputBuffer,
    /// Enclosing bodies, independent of the tracker's mode.
    context: Vec<FrameKind>,
}

impl<'a> StmtWriter<'a> {
    fn new(table: &'a MappingTable, options: EmitOptions) -> Self {
        Self {
            table,
            options,
            scope: ScopeTracker::new(options.scope_mode),
            buffer: OutputBuffer::new(),
            context: vec![FrameKind::Module],
        }
    }

    fn exprs(&self) -> ExprWriter<'_> {
        ExprWriter::new(self.table, &self.scope)
    }

    fn render(&self, expr: &Expr) -> Result<String, TranslateError> {
        self.exprs().render(expr)
    }

    fn in_class(&self) -> bool {
        self.context.last() == Some(&FrameKind::Class)
    }

    fn enter(&mut self, kind: FrameKind) {
        self.scope.push(kind);
        self.context.push(kind);
    }

    fn leave(&mut self) {
        self.scope.pop();
        self.context.pop();
    }

    fn write_block(&mut self, stmts: &[Stmt]) -> Result<(), TranslateError> {
        for stmt in stmts {
            self.write_stmt(stmt).map_err(|err| err.at_line(stmt.line))?;
        }
        Ok(())
    }

    fn write_indented(&mut self, stmts: &[Stmt]) -> Result<(), TranslateError> {
        self.buffer.indent();
        let result = self.write_block(stmts);
        self.buffer.dedent();
        result
    }

    fn write_stmt(&mut self, stmt: &Stmt) -> Result<(), TranslateError> {
        match &stmt.kind {
            StmtKind::ClassDef(class) => self.write_class(class),
            StmtKind::FunctionDef(function) => self.write_function(function),

            StmtKind::Assign { targets, value } => {
                let rendered = self.render(value)?;
                let kind = infer_container_kind(value, self.table);
                for target in targets {
                    self.write_assignment(target, &rendered, kind)?;
                }
                Ok(())
            }
            StmtKind::AnnAssign {
                target,
                annotation,
                value,
            } => self.write_annotated(target, annotation, value.as_ref()),
            StmtKind::AugAssign { target, op, value } => {
                let target = self.render_target(target)?;
                let token = match op {
                    BinOp::FloorDiv => "/",
                    BinOp::Pow | BinOp::MatMult => {
                        return Err(TranslateError::unsupported(
                            "augmented_assignment",
                            format!("operator `{}=` has no Berry equivalent", op.source_token()),
                        ));
                    }
                    other => other.source_token(),
                };
                let value = self.render(value)?;
                self.buffer.line(format!("{target} {token}= {value}"));
                Ok(())
            }

            StmtKind::If { test, body, orelse } => self.write_if(test, body, orelse),
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => self.write_for(target, iter, body, orelse),
            StmtKind::While { test, body, orelse } => {
                let test = self.exprs().render_condition(test)?;
                self.buffer.line(format!("while {test}"));
                self.write_indented(body)?;
                if !orelse.is_empty() {
                    self.buffer.line("else");
                    self.write_indented(orelse)?;
                }
                self.buffer.line("end");
                Ok(())
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => self.write_try(body, handlers, orelse, finalbody),

            StmtKind::Return(value) => {
                match value {
                    Some(value) => {
                        let value = self.render(value)?;
                        self.buffer.line(format!("return {value}"));
                    }
                    None => self.buffer.line("return"),
                }
                Ok(())
            }

            // Docstrings and other bare string literals carry no behaviour.
            StmtKind::Expr(Expr::Constant(Constant::Str(_))) => Ok(()),
            StmtKind::Expr(expr) => {
                let line = self.render(expr)?;
                self.buffer.line(line);
                Ok(())
            }

            StmtKind::Pass => Ok(()),
            StmtKind::Break => {
                self.buffer.line("break");
                Ok(())
            }
            StmtKind::Continue => {
                self.buffer.line("continue");
                Ok(())
            }

            StmtKind::Import(aliases) => {
                for alias in aliases {
                    if alias.name.contains('.') {
                        return Err(TranslateError::unsupported(
                            "import_statement",
                            format!("dotted import `{}`", alias.name),
                        ));
                    }
                    match &alias.asname {
                        Some(asname) => self.buffer.line(format!("import {} as {}", alias.name, asname)),
                        None => self.buffer.line(format!("import {}", alias.name)),
                    }
                }
                Ok(())
            }
            StmtKind::Global(names) => {
                for name in names {
                    let kind = self.scope.lookup_kind(name);
                    self.scope.declare(name, kind);
                }
                self.buffer.line(format!("global {}", names.join(", ")));
                Ok(())
            }

            StmtKind::Unsupported { kind } => {
                Err(TranslateError::unsupported(kind.clone(), "statement"))
            }
        }
    }

    fn write_class(&mut self, class: &ClassDef) -> Result<(), TranslateError> {
        let bases: Vec<&Expr> = class
            .bases
            .iter()
            .filter(|base| !matches!(base, Expr::Name(name) if name == "object"))
            .collect();

        let header = match bases.as_slice() {
            [] => format!("class {}", class.name),
            [base] => format!("class {} : {}", class.name, self.render(base)?),
            _ => {
                return Err(TranslateError::unsupported(
                    "class_definition",
                    format!("multiple base classes on `{}`", class.name),
                ));
            }
        };
        self.buffer.line(header);

        self.enter(FrameKind::Class);
        self.buffer.indent();
        if self.options.declare_members {
            let fields = member_fields(&class.body);
            if !fields.is_empty() {
                self.buffer.line(format!("var {}", fields.join(", ")));
            }
        }
        let result = self.write_block(&class.body);
        self.buffer.dedent();
        self.leave();
        result?;

        self.buffer.line("end");
        Ok(())
    }

    fn write_function(&mut self, function: &FunctionDef) -> Result<(), TranslateError> {
        let mut is_static = false;
        for decorator in &function.decorators {
            match decorator {
                Expr::Name(name) if name == "staticmethod" => is_static = true,
                other => {
                    let shown = other.dotted_path().unwrap_or_else(|| other.kind_name().to_string());
                    return Err(TranslateError::unsupported(
                        "decorator",
                        format!("@{} on `{}`", shown, function.name),
                    ));
                }
            }
        }

        let is_method = self.in_class() && !is_static;
        let params: &[Param] = match function.params.split_first() {
            Some((_receiver, rest)) if is_method => rest,
            _ => &function.params,
        };
        for param in params {
            match param.kind {
                ParamKind::Positional => {}
                ParamKind::VarArgs => {
                    return Err(TranslateError::unsupported(
                        "list_splat_pattern",
                        format!("`*{}` parameter", param.name),
                    ));
                }
                ParamKind::KwArgs => {
                    return Err(TranslateError::unsupported(
                        "dictionary_splat_pattern",
                        format!("`**{}` parameter", param.name),
                    ));
                }
            }
        }

        let name = self.table.resolve_special_method(&function.name).to_string();
        self.scope.define_function(&function.name);

        let names: Vec<&str> = params.iter().map(|param| param.name.as_str()).collect();
        let prefix = if is_static && self.in_class() { "static def" } else { "def" };
        self.buffer
            .line(format!("{} {}({})", prefix, name, names.join(", ")));

        self.enter(FrameKind::Function);
        self.buffer.indent();
        let result = self.write_function_body(params, &function.body);
        self.buffer.dedent();
        self.leave();
        result?;

        self.buffer.line("end");
        Ok(())
    }

    fn write_function_body(&mut self, params: &[Param], body: &[Stmt]) -> Result<(), TranslateError> {
        for param in params {
            let kind = param
                .annotation
                .as_ref()
                .map_or(ContainerKind::Unknown, |annotation| {
                    annotation_kind(annotation, self.table)
                });
            self.scope.declare(&param.name, kind);
        }

        for param in params {
            if let Some(default) = &param.default {
                let value = self.render(default)?;
                self.buffer.line(format!("if {} == nil", param.name));
                self.buffer.indent();
                self.buffer.line(format!("{} = {}", param.name, value));
                self.buffer.dedent();
                self.buffer.line("end");
            }
        }

        self.write_block(body)
    }

    /// Render an assignment target, rejecting shapes Berry cannot bind.
    fn render_target(&self, target: &Expr) -> Result<String, TranslateError> {
        match target {
            Expr::Name(_) | Expr::Attribute { .. } => self.render(target),
            Expr::Subscript { value, index } => {
                let index = self.exprs().render_index(index).map_err(|err| {
                    TranslateError::malformed(format!("subscript target index: {err}"))
                })?;
                Ok(format!("{}[{}]", self.render(value)?, index))
            }
            Expr::Tuple(_) | Expr::List(_) => Err(TranslateError::malformed(
                "tuple unpacking is not supported",
            )),
            Expr::Starred(_) => Err(TranslateError::malformed("starred assignment target")),
            other => Err(TranslateError::malformed(format!(
                "cannot assign to {}",
                other.kind_name()
            ))),
        }
    }

    fn write_assignment(
        &mut self,
        target: &Expr,
        value: &str,
        kind: ContainerKind,
    ) -> Result<(), TranslateError> {
        let rendered = self.render_target(target)?;
        let line = match self.scope.declare_or_assign(target, kind) {
            Binding::Declare => format!("var {rendered} = {value}"),
            Binding::Assign => format!("{rendered} = {value}"),
        };
        self.buffer.line(line);
        Ok(())
    }

    fn write_annotated(
        &mut self,
        target: &Expr,
        annotation: &Expr,
        value: Option<&Expr>,
    ) -> Result<(), TranslateError> {
        let mut kind = annotation_kind(annotation, self.table);

        let Some(value) = value else {
            // `x: T` declares without a value.
            let rendered = self.render_target(target)?;
            match target {
                Expr::Name(name) if !self.scope.is_declared_here(name) => {
                    self.scope.declare(name, kind);
                    self.buffer.line(format!("var {rendered}"));
                }
                Expr::Attribute { .. } => {
                    if let Some(path) = target.dotted_path() {
                        self.scope.record_kind(&path, kind);
                    }
                }
                _ => {}
            }
            return Ok(());
        };

        if kind == ContainerKind::Unknown {
            kind = infer_container_kind(value, self.table);
        }
        let rendered = self.render(value)?;
        self.write_assignment(target, &rendered, kind)
    }

    fn write_if(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> Result<(), TranslateError> {
        let test = self.exprs().render_condition(test)?;
        self.buffer.line(format!("if {test}"));
        self.write_indented(body)?;

        let mut rest = orelse;
        loop {
            match rest {
                [] => break,
                [
                    Stmt {
                        kind:
                            StmtKind::If {
                                test,
                                body,
                                orelse,
                            },
                        line,
                    },
                ] => {
                    let test = self
                        .exprs()
                        .render_condition(test)
                        .map_err(|err| err.at_line(*line))?;
                    self.buffer.line(format!("elif {test}"));
                    self.write_indented(body)?;
                    rest = orelse.as_slice();
                }
                _ => {
                    self.buffer.line("else");
                    self.write_indented(rest)?;
                    break;
                }
            }
        }

        self.buffer.line("end");
        Ok(())
    }

    fn write_for(
        &mut self,
        target: &Expr,
        iter: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
    ) -> Result<(), TranslateError> {
        if !orelse.is_empty() {
            return Err(TranslateError::unsupported(
                "for_statement",
                "`for ... else` has no Berry equivalent",
            ));
        }

        let variable = match target {
            Expr::Name(name) => name,
            Expr::Tuple(_) | Expr::List(_) => {
                return Err(TranslateError::malformed(
                    "loop target unpacking is not supported",
                ));
            }
            other => {
                return Err(TranslateError::malformed(format!(
                    "cannot loop into {}",
                    other.kind_name()
                )));
            }
        };

        let receiver = match iter {
            Expr::Call { func, args, .. } if args.is_empty() => match func.as_ref() {
                Expr::Attribute { value, attr } if attr == "keys" => value,
                _ => return Err(unsupported_iteration(iter)),
            },
            _ => return Err(unsupported_iteration(iter)),
        };

        let receiver = self.render(receiver)?;
        self.buffer.line(format!("for {variable} : {receiver}.keys()"));
        self.scope.declare(variable, ContainerKind::Unknown);
        self.write_indented(body)?;
        self.buffer.line("end");
        Ok(())
    }

    fn write_try(
        &mut self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
    ) -> Result<(), TranslateError> {
        if !orelse.is_empty() {
            return Err(TranslateError::unsupported(
                "try_statement",
                "`try ... else` has no Berry equivalent",
            ));
        }

        self.buffer.line("try");
        self.write_indented(body)?;

        for handler in handlers {
            match &handler.name {
                Some(name) => {
                    self.buffer.line(format!("except .. as {name}"));
                    self.scope.declare(name, ContainerKind::Unknown);
                }
                None => self.buffer.line("except .."),
            }
            self.write_indented(&handler.body)?;
        }

        if !finalbody.is_empty() {
            self.buffer.line("finally");
            self.write_indented(finalbody)?;
        }

        self.buffer.line("end");
        Ok(())
    }
}

fn unsupported_iteration(iter: &Expr) -> TranslateError {
    TranslateError::unsupported(
        "for_statement",
        format!(
            "iteration over {}; only `for k in m.keys()` is supported",
            iter.kind_name()
        ),
    )
}

/// `self.<field>` names assigned anywhere in a class's methods, in first
/// assignment order.
fn member_fields(body: &[Stmt]) -> Vec<String> {
    let mut fields = Vec::new();
    for stmt in body {
        if let StmtKind::FunctionDef(function) = &stmt.kind {
            collect_fields(&function.body, &mut fields);
        }
    }
    fields
}

fn collect_fields(stmts: &[Stmt], fields: &mut Vec<String>) {
    fn record(target: &Expr, fields: &mut Vec<String>) {
        if let Expr::Attribute { value, attr } = target {
            if matches!(value.as_ref(), Expr::Name(name) if name == "self")
                && !fields.contains(attr)
            {
                fields.push(attr.clone());
            }
        }
    }

    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Assign { targets, .. } => {
                for target in targets {
                    record(target, fields);
                }
            }
            StmtKind::AnnAssign { target, .. } | StmtKind::AugAssign { target, .. } => {
                record(target, fields)
            }
            StmtKind::If { body, orelse, .. }
            | StmtKind::For { body, orelse, .. }
            | StmtKind::While { body, orelse, .. } => {
                collect_fields(body, fields);
                collect_fields(orelse, fields);
            }
            StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                collect_fields(body, fields);
                for handler in handlers {
                    collect_fields(&handler.body, fields);
                }
                collect_fields(orelse, fields);
                collect_fields(finalbody, fields);
            }
            StmtKind::FunctionDef(function) => collect_fields(&function.body, fields),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt::new(kind, 1)
    }

    fn emit_default(body: Vec<Stmt>) -> Result<String, TranslateError> {
        emit(
            &Module { body },
            MappingTable::builtin(),
            EmitOptions::default(),
        )
    }

    fn assign(target: Expr, value: Expr) -> Stmt {
        stmt(StmtKind::Assign {
            targets: vec![target],
            value,
        })
    }

    #[test]
    fn test_declare_then_assign() {
        let out = emit_default(vec![
            assign(Expr::name("x"), Expr::int(1)),
            assign(Expr::name("x"), Expr::int(2)),
        ])
        .unwrap();
        assert_eq!(out, "var x = 1\nx = 2\n");
    }

    #[test]
    fn test_tuple_target_malformed() {
        let err = emit_default(vec![assign(
            Expr::Tuple(vec![Expr::name("a"), Expr::name("b")]),
            Expr::name("pair"),
        )])
        .unwrap_err();
        assert_eq!(err.kind(), "malformed-target");
        assert!(err.to_string().ends_with("(line 1)"));
    }

    #[test]
    fn test_method_skips_receiver() {
        let method = FunctionDef {
            name: "__init__".into(),
            params: vec![Param::plain("self"), Param::plain("topic")],
            decorators: vec![],
            body: vec![assign(
                Expr::attr(Expr::name("self"), "topic"),
                Expr::name("topic"),
            )],
        };
        let class = ClassDef {
            name: "Driver".into(),
            bases: vec![],
            body: vec![stmt(StmtKind::FunctionDef(method))],
        };
        let out = emit_default(vec![stmt(StmtKind::ClassDef(class))]).unwrap();
        assert_eq!(
            out,
            "class Driver\n    def init(topic)\n        self.topic = topic\n    end\nend\n"
        );
    }

    #[test]
    fn test_default_parameter_guard() {
        let function = FunctionDef {
            name: "poll".into(),
            params: vec![Param {
                default: Some(Expr::int(5)),
                ..Param::plain("delay")
            }],
            decorators: vec![],
            body: vec![stmt(StmtKind::Return(Some(Expr::name("delay"))))],
        };
        let out = emit_default(vec![stmt(StmtKind::FunctionDef(function))]).unwrap();
        assert_eq!(
            out,
            "def poll(delay)\n    if delay == nil\n        delay = 5\n    end\n    return delay\nend\n"
        );
    }

    #[test]
    fn test_member_fields_in_order() {
        let body = vec![stmt(StmtKind::FunctionDef(FunctionDef {
            name: "__init__".into(),
            params: vec![Param::plain("self")],
            decorators: vec![],
            body: vec![
                assign(Expr::attr(Expr::name("self"), "b"), Expr::int(1)),
                assign(Expr::attr(Expr::name("self"), "a"), Expr::int(2)),
                assign(Expr::attr(Expr::name("self"), "b"), Expr::int(3)),
            ],
        }))];
        assert_eq!(member_fields(&body), vec!["b", "a"]);
    }

    #[test]
    fn test_unsupported_statement_names_kind() {
        let err = emit_default(vec![Stmt::new(
            StmtKind::Unsupported {
                kind: "with_statement".into(),
            },
            7,
        )])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported construct `with_statement`: statement (line 7)"
        );
    }
}
