//! Tree-sitter based Python reader.
//!
//! Lowers the concrete tree into [`crate::ast`]. The reader is total over
//! well-formed input: node kinds it does not model become `Unsupported`
//! nodes instead of errors, so the emitter can report them with context.

use crate::ast::*;
use crate::error::TranslateError;
use tree_sitter::{Node, Parser};

/// Parse Python source into the translator's syntax tree.
pub fn read_python(source: &str) -> Result<Module, TranslateError> {
    let mut parser = Parser::new();
    parser
        .set_language(&arborium_python::language().into())
        .map_err(|err| TranslateError::Parse {
            line: 0,
            column: 0,
            message: format!("cannot load Python grammar: {err}"),
        })?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| TranslateError::Parse {
            line: 0,
            column: 0,
            message: "parser produced no tree".into(),
        })?;

    let root = tree.root_node();
    if root.has_error() {
        let at = first_error(root).unwrap_or(root);
        let pos = at.start_position();
        let message = if at.is_missing() {
            format!("missing `{}`", at.kind())
        } else {
            "invalid syntax".to_string()
        };
        return Err(TranslateError::Parse {
            line: pos.row + 1,
            column: pos.column + 1,
            message,
        });
    }

    let ctx = ReadContext::new(source);
    Ok(Module {
        body: ctx.read_block_stmts(root)?,
    })
}

/// Depth-first search for the first ERROR or MISSING node.
fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}

/// `async def` / `async for` carry a leading anonymous `async` token.
fn is_async(node: Node) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .next()
        .is_some_and(|first| first.kind() == "async")
}

/// Node kinds that stand for an expression when they appear as a statement.
fn is_expression(kind: &str) -> bool {
    matches!(
        kind,
        "call"
            | "identifier"
            | "attribute"
            | "subscript"
            | "string"
            | "concatenated_string"
            | "integer"
            | "float"
            | "true"
            | "false"
            | "none"
            | "binary_operator"
            | "unary_operator"
            | "not_operator"
            | "boolean_operator"
            | "comparison_operator"
            | "conditional_expression"
            | "parenthesized_expression"
            | "list"
            | "tuple"
            | "set"
            | "dictionary"
            | "lambda"
            | "await"
    )
}

fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

struct ReadContext<'a> {
    source: &'a str,
}

impl<'a> ReadContext<'a> {
    fn new(source: &'a str) -> Self {
        Self { source }
    }

    fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Required child field, or a located parse error.
    fn field<'t>(&self, node: Node<'t>, name: &str) -> Result<Node<'t>, TranslateError> {
        node.child_by_field_name(name).ok_or_else(|| {
            let pos = node.start_position();
            TranslateError::Parse {
                line: pos.row + 1,
                column: pos.column + 1,
                message: format!("{} missing {}", node.kind(), name),
            }
        })
    }

    fn named_children<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|child| child.kind() != "comment")
            .collect()
    }

    fn fields<'t>(&self, node: Node<'t>, name: &str) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.children_by_field_name(name, &mut cursor).collect()
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn read_block_stmts(&self, node: Node) -> Result<Vec<Stmt>, TranslateError> {
        let mut stmts = Vec::new();
        for child in self.named_children(node) {
            stmts.push(self.read_stmt(child)?);
        }
        Ok(stmts)
    }

    fn read_body(&self, node: Node, field: &str) -> Result<Vec<Stmt>, TranslateError> {
        self.read_block_stmts(self.field(node, field)?)
    }

    fn read_stmt(&self, node: Node) -> Result<Stmt, TranslateError> {
        let line = line_of(node);
        let kind = match node.kind() {
            "expression_statement" => self.read_expression_statement(node)?,
            // The grammar may also place these directly under a block.
            "assignment" => self.read_assignment(node)?,
            "augmented_assignment" => self.read_augmented_assignment(node)?,
            kind if is_expression(kind) => StmtKind::Expr(self.read_expr(node)?),

            "if_statement" => self.read_if_statement(node)?,
            "for_statement" => self.read_for_statement(node)?,
            "while_statement" => self.read_while_statement(node)?,
            "try_statement" => self.read_try_statement(node)?,

            "return_statement" => {
                let value = self
                    .named_children(node)
                    .first()
                    .map(|child| self.read_expr(*child))
                    .transpose()?;
                StmtKind::Return(value)
            }

            "pass_statement" => StmtKind::Pass,
            "break_statement" => StmtKind::Break,
            "continue_statement" => StmtKind::Continue,

            "function_definition" if is_async(node) => StmtKind::Unsupported {
                kind: "async function_definition".into(),
            },
            "function_definition" => StmtKind::FunctionDef(self.read_function(node, Vec::new())?),
            "class_definition" => StmtKind::ClassDef(self.read_class(node)?),
            "decorated_definition" => self.read_decorated(node)?,

            "import_statement" => StmtKind::Import(self.read_import(node)),
            "global_statement" => StmtKind::Global(
                self.named_children(node)
                    .into_iter()
                    .map(|child| self.node_text(child).to_string())
                    .collect(),
            ),

            other => StmtKind::Unsupported {
                kind: other.to_string(),
            },
        };
        Ok(Stmt::new(kind, line))
    }

    fn read_expression_statement(&self, node: Node) -> Result<StmtKind, TranslateError> {
        let children = self.named_children(node);
        match children.as_slice() {
            [single] => match single.kind() {
                "assignment" => self.read_assignment(*single),
                "augmented_assignment" => self.read_augmented_assignment(*single),
                _ => Ok(StmtKind::Expr(self.read_expr(*single)?)),
            },
            // `a, b` as a statement
            _ => Ok(StmtKind::Expr(Expr::Tuple(self.read_exprs(&children)?))),
        }
    }

    fn read_assignment(&self, node: Node) -> Result<StmtKind, TranslateError> {
        let left = self.read_expr(self.field(node, "left")?)?;

        if let Some(annotation) = node.child_by_field_name("type") {
            let value = node
                .child_by_field_name("right")
                .map(|right| self.read_expr(right))
                .transpose()?;
            return Ok(StmtKind::AnnAssign {
                target: left,
                annotation: self.read_expr(annotation)?,
                value,
            });
        }

        // `a = b = 1` nests the second assignment in `right`.
        let mut targets = vec![left];
        let mut right = self.field(node, "right")?;
        while right.kind() == "assignment" {
            if right.child_by_field_name("type").is_some() {
                return Ok(StmtKind::Unsupported {
                    kind: "annotated chained assignment".into(),
                });
            }
            targets.push(self.read_expr(self.field(right, "left")?)?);
            right = self.field(right, "right")?;
        }

        let value = match right.kind() {
            "augmented_assignment" | "yield" => {
                return Ok(StmtKind::Unsupported {
                    kind: right.kind().to_string(),
                });
            }
            _ => self.read_expr(right)?,
        };
        Ok(StmtKind::Assign { targets, value })
    }

    fn read_augmented_assignment(&self, node: Node) -> Result<StmtKind, TranslateError> {
        let target = self.read_expr(self.field(node, "left")?)?;
        let value = self.read_expr(self.field(node, "right")?)?;
        let op_node = self.field(node, "operator")?;
        let token = op_node.kind();

        let Some(op) = token.strip_suffix('=').and_then(BinOp::from_token) else {
            return Ok(StmtKind::Unsupported {
                kind: format!("augmented operator {token}"),
            });
        };
        Ok(StmtKind::AugAssign { target, op, value })
    }

    fn read_if_statement(&self, node: Node) -> Result<StmtKind, TranslateError> {
        let test = self.read_expr(self.field(node, "condition")?)?;
        let body = self.read_body(node, "consequence")?;

        // Alternatives arrive flat: elif, elif, else. Fold them from the
        // back into nested `If`s.
        let mut orelse = Vec::new();
        for alt in self.fields(node, "alternative").into_iter().rev() {
            match alt.kind() {
                "else_clause" => orelse = self.read_body(alt, "body")?,
                "elif_clause" => {
                    let nested = StmtKind::If {
                        test: self.read_expr(self.field(alt, "condition")?)?,
                        body: self.read_body(alt, "consequence")?,
                        orelse,
                    };
                    orelse = vec![Stmt::new(nested, line_of(alt))];
                }
                _ => {}
            }
        }

        Ok(StmtKind::If { test, body, orelse })
    }

    fn read_else(&self, node: Node) -> Result<Vec<Stmt>, TranslateError> {
        match node.child_by_field_name("alternative") {
            Some(alt) => self.read_body(alt, "body"),
            None => Ok(Vec::new()),
        }
    }

    fn read_for_statement(&self, node: Node) -> Result<StmtKind, TranslateError> {
        if is_async(node) {
            return Ok(StmtKind::Unsupported {
                kind: "async for".into(),
            });
        }
        Ok(StmtKind::For {
            target: self.read_expr(self.field(node, "left")?)?,
            iter: self.read_expr(self.field(node, "right")?)?,
            body: self.read_body(node, "body")?,
            orelse: self.read_else(node)?,
        })
    }

    fn read_while_statement(&self, node: Node) -> Result<StmtKind, TranslateError> {
        Ok(StmtKind::While {
            test: self.read_expr(self.field(node, "condition")?)?,
            body: self.read_body(node, "body")?,
            orelse: self.read_else(node)?,
        })
    }

    fn read_try_statement(&self, node: Node) -> Result<StmtKind, TranslateError> {
        let body = self.read_body(node, "body")?;
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();

        for child in self.named_children(node) {
            match child.kind() {
                "except_clause" => handlers.push(self.read_except_clause(child)?),
                "else_clause" => orelse = self.read_body(child, "body")?,
                "finally_clause" => {
                    if let Some(block) = self
                        .named_children(child)
                        .into_iter()
                        .find(|c| c.kind() == "block")
                    {
                        finalbody = self.read_block_stmts(block)?;
                    }
                }
                "except_group_clause" => {
                    return Ok(StmtKind::Unsupported {
                        kind: "except_group_clause".into(),
                    });
                }
                _ => {}
            }
        }

        Ok(StmtKind::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    fn read_except_clause(&self, node: Node) -> Result<ExceptHandler, TranslateError> {
        let mut type_ = None;
        let mut name = None;
        let mut body = Vec::new();
        let mut parts = Vec::new();

        for child in self.named_children(node) {
            match child.kind() {
                "block" => body = self.read_block_stmts(child)?,
                // `except E as e` in grammars that wrap it as a pattern
                "as_pattern" => {
                    if let Some(caught) = self.named_children(child).first() {
                        type_ = Some(self.read_expr(*caught)?);
                    }
                    name = child
                        .child_by_field_name("alias")
                        .map(|alias| self.node_text(alias).to_string());
                }
                _ => parts.push(child),
            }
        }

        // `except E, e` / `except E as e` with flat children
        let mut parts = parts.into_iter();
        if let Some(caught) = parts.next() {
            type_ = Some(self.read_expr(caught)?);
        }
        if let Some(alias) = parts.next() {
            name = Some(self.node_text(alias).to_string());
        }

        Ok(ExceptHandler { type_, name, body })
    }

    fn read_function(
        &self,
        node: Node,
        decorators: Vec<Expr>,
    ) -> Result<FunctionDef, TranslateError> {
        let name = self.node_text(self.field(node, "name")?).to_string();
        let params = match node.child_by_field_name("parameters") {
            Some(params) => self.read_parameters(params)?,
            None => Vec::new(),
        };
        let body = self.read_body(node, "body")?;

        Ok(FunctionDef {
            name,
            params,
            decorators,
            body,
        })
    }

    fn read_parameters(&self, node: Node) -> Result<Vec<Param>, TranslateError> {
        let mut params = Vec::new();

        for child in self.named_children(node) {
            let param = match child.kind() {
                "identifier" => Param::plain(self.node_text(child)),
                "default_parameter" => Param {
                    default: Some(self.read_expr(self.field(child, "value")?)?),
                    ..Param::plain(self.node_text(self.field(child, "name")?))
                },
                "typed_default_parameter" => Param {
                    annotation: Some(self.read_expr(self.field(child, "type")?)?),
                    default: Some(self.read_expr(self.field(child, "value")?)?),
                    ..Param::plain(self.node_text(self.field(child, "name")?))
                },
                "typed_parameter" => {
                    let annotation = Some(self.read_expr(self.field(child, "type")?)?);
                    let Some(inner) = self.named_children(child).into_iter().next() else {
                        continue;
                    };
                    let mut param = self.read_plain_parameter(inner);
                    param.annotation = annotation;
                    param
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    self.read_plain_parameter(child)
                }
                // bare `*` and `/` separators
                _ => continue,
            };
            params.push(param);
        }

        Ok(params)
    }

    fn read_plain_parameter(&self, node: Node) -> Param {
        let kind = match node.kind() {
            "list_splat_pattern" => ParamKind::VarArgs,
            "dictionary_splat_pattern" => ParamKind::KwArgs,
            _ => ParamKind::Positional,
        };
        let name = self.node_text(node).trim_start_matches('*').to_string();
        Param {
            kind,
            ..Param::plain(name)
        }
    }

    fn read_class(&self, node: Node) -> Result<ClassDef, TranslateError> {
        let name = self.node_text(self.field(node, "name")?).to_string();
        let bases = match node.child_by_field_name("superclasses") {
            Some(list) => self
                .named_children(list)
                .into_iter()
                .map(|base| self.read_argument(base))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let body = self.read_body(node, "body")?;
        Ok(ClassDef { name, bases, body })
    }

    fn read_decorated(&self, node: Node) -> Result<StmtKind, TranslateError> {
        let mut decorators = Vec::new();
        for child in self.named_children(node) {
            if child.kind() == "decorator" {
                if let Some(expr) = self.named_children(child).first() {
                    decorators.push(self.read_expr(*expr)?);
                }
            }
        }

        let definition = self.field(node, "definition")?;
        match definition.kind() {
            "function_definition" => Ok(StmtKind::FunctionDef(
                self.read_function(definition, decorators)?,
            )),
            "class_definition" => Ok(StmtKind::Unsupported {
                kind: "decorated class_definition".into(),
            }),
            other => Ok(StmtKind::Unsupported {
                kind: other.to_string(),
            }),
        }
    }

    fn read_import(&self, node: Node) -> Vec<ImportAlias> {
        self.fields(node, "name")
            .into_iter()
            .map(|name| match name.kind() {
                "aliased_import" => ImportAlias {
                    name: name
                        .child_by_field_name("name")
                        .map(|n| self.node_text(n).to_string())
                        .unwrap_or_default(),
                    asname: name
                        .child_by_field_name("alias")
                        .map(|a| self.node_text(a).to_string()),
                },
                _ => ImportAlias {
                    name: self.node_text(name).to_string(),
                    asname: None,
                },
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn read_exprs(&self, nodes: &[Node]) -> Result<Vec<Expr>, TranslateError> {
        nodes.iter().map(|node| self.read_expr(*node)).collect()
    }

    fn read_expr(&self, node: Node) -> Result<Expr, TranslateError> {
        match node.kind() {
            "identifier" | "keyword_identifier" => Ok(Expr::Name(self.node_text(node).to_string())),

            "integer" => Ok(self.read_integer(node)),
            "float" => Ok(Expr::Constant(Constant::Float(
                self.node_text(node).replace('_', ""),
            ))),
            "true" => Ok(Expr::Constant(Constant::Bool(true))),
            "false" => Ok(Expr::Constant(Constant::Bool(false))),
            "none" => Ok(Expr::Constant(Constant::None)),
            "string" => self.read_string(node),
            "concatenated_string" => self.read_concatenated_string(node),

            "attribute" => Ok(Expr::Attribute {
                value: Box::new(self.read_expr(self.field(node, "object")?)?),
                attr: self.node_text(self.field(node, "attribute")?).to_string(),
            }),
            "subscript" => self.read_subscript(node),
            "slice" => self.read_slice(node),
            "call" => self.read_call(node),

            "binary_operator" => self.read_binary_operator(node),
            "unary_operator" => {
                let operand = Box::new(self.read_expr(self.field(node, "argument")?)?);
                let op = match self.field(node, "operator")?.kind() {
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Pos,
                    "~" => UnaryOp::Invert,
                    other => {
                        return Ok(Expr::Unsupported {
                            kind: format!("unary operator {other}"),
                        });
                    }
                };
                Ok(Expr::UnaryOp { op, operand })
            }
            "not_operator" => Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(self.read_expr(self.field(node, "argument")?)?),
            }),
            "boolean_operator" => self.read_boolean_operator(node),
            "comparison_operator" => self.read_comparison_operator(node),

            "conditional_expression" => {
                let parts = self.named_children(node);
                let [body, test, orelse] = parts.as_slice() else {
                    return Ok(Expr::Unsupported {
                        kind: "conditional_expression".into(),
                    });
                };
                Ok(Expr::IfExp {
                    test: Box::new(self.read_expr(*test)?),
                    body: Box::new(self.read_expr(*body)?),
                    orelse: Box::new(self.read_expr(*orelse)?),
                })
            }

            "parenthesized_expression" => match self.named_children(node).first() {
                Some(inner) => self.read_expr(*inner),
                None => Ok(Expr::Tuple(Vec::new())),
            },

            "list" | "list_pattern" => Ok(Expr::List(
                self.read_exprs(&self.named_children(node))?,
            )),
            "tuple" | "tuple_pattern" | "pattern_list" | "expression_list" => Ok(Expr::Tuple(
                self.read_exprs(&self.named_children(node))?,
            )),
            "set" => Ok(Expr::Set(self.read_exprs(&self.named_children(node))?)),
            "dictionary" => self.read_dictionary(node),

            "list_splat" | "list_splat_pattern" => match self.named_children(node).first() {
                Some(inner) => Ok(Expr::Starred(Box::new(self.read_expr(*inner)?))),
                None => Ok(Expr::Unsupported {
                    kind: node.kind().to_string(),
                }),
            },

            "lambda" => self.read_lambda(node),

            // annotation wrapper
            "type" => match self.named_children(node).first() {
                Some(inner) => self.read_expr(*inner),
                None => Ok(Expr::Unsupported { kind: "type".into() }),
            },

            other => Ok(Expr::Unsupported {
                kind: other.to_string(),
            }),
        }
    }

    fn read_integer(&self, node: Node) -> Expr {
        let text = self.node_text(node).replace('_', "");
        let lower = text.to_ascii_lowercase();

        let radix = if lower.starts_with("0o") {
            Some(8)
        } else if lower.starts_with("0b") {
            Some(2)
        } else {
            None
        };

        if lower.ends_with('j') || lower.ends_with('l') {
            return Expr::Unsupported {
                kind: "integer suffix".into(),
            };
        }

        match radix {
            Some(radix) => match i64::from_str_radix(&text[2..], radix) {
                Ok(value) => Expr::Constant(Constant::Int(value.to_string())),
                Err(_) => Expr::Unsupported {
                    kind: "integer literal out of range".into(),
                },
            },
            None => Expr::Constant(Constant::Int(text)),
        }
    }

    fn read_binary_operator(&self, node: Node) -> Result<Expr, TranslateError> {
        let left = self.read_expr(self.field(node, "left")?)?;
        let right = self.read_expr(self.field(node, "right")?)?;
        let token = self.field(node, "operator")?.kind();

        let Some(op) = BinOp::from_token(token) else {
            return Ok(Expr::Unsupported {
                kind: format!("binary operator {token}"),
            });
        };
        Ok(Expr::binop(left, op, right))
    }

    fn read_boolean_operator(&self, node: Node) -> Result<Expr, TranslateError> {
        let op = match self.field(node, "operator")?.kind() {
            "and" => BoolOp::And,
            "or" => BoolOp::Or,
            other => {
                return Ok(Expr::Unsupported {
                    kind: format!("boolean operator {other}"),
                });
            }
        };

        let mut values = Vec::new();
        for side in ["left", "right"] {
            match self.read_expr(self.field(node, side)?)? {
                Expr::BoolOp {
                    op: inner,
                    values: nested,
                } if inner == op => values.extend(nested),
                other => values.push(other),
            }
        }
        Ok(Expr::BoolOp { op, values })
    }

    fn read_comparison_operator(&self, node: Node) -> Result<Expr, TranslateError> {
        let mut operands = self
            .read_exprs(&self.named_children(node))?
            .into_iter();
        let Some(left) = operands.next() else {
            return Ok(Expr::Unsupported {
                kind: "comparison_operator".into(),
            });
        };

        let mut ops = Vec::new();
        for op in self.fields(node, "operators") {
            match CmpOp::from_token(op.kind()) {
                Some(op) => ops.push(op),
                None => {
                    return Ok(Expr::Unsupported {
                        kind: format!("comparison operator {}", op.kind()),
                    });
                }
            }
        }

        let comparators: Vec<Expr> = operands.collect();
        if ops.len() != comparators.len() || ops.is_empty() {
            return Ok(Expr::Unsupported {
                kind: "comparison_operator".into(),
            });
        }

        Ok(Expr::Compare {
            left: Box::new(left),
            ops,
            comparators,
        })
    }

    fn read_call(&self, node: Node) -> Result<Expr, TranslateError> {
        let func = Box::new(self.read_expr(self.field(node, "function")?)?);
        let arguments = self.field(node, "arguments")?;

        if arguments.kind() != "argument_list" {
            // `f(x for x in xs)`
            return Ok(Expr::Call {
                func,
                args: vec![Expr::Unsupported {
                    kind: arguments.kind().to_string(),
                }],
                keywords: Vec::new(),
            });
        }

        let mut args = Vec::new();
        let mut keywords = Vec::new();
        for child in self.named_children(arguments) {
            match child.kind() {
                "keyword_argument" => keywords.push(Keyword {
                    arg: Some(self.node_text(self.field(child, "name")?).to_string()),
                    value: self.read_expr(self.field(child, "value")?)?,
                }),
                "dictionary_splat" => {
                    let value = match self.named_children(child).first() {
                        Some(inner) => self.read_expr(*inner)?,
                        None => Expr::Unsupported {
                            kind: "dictionary_splat".into(),
                        },
                    };
                    keywords.push(Keyword { arg: None, value });
                }
                _ => args.push(self.read_argument(child)?),
            }
        }

        Ok(Expr::Call {
            func,
            args,
            keywords,
        })
    }

    fn read_argument(&self, node: Node) -> Result<Expr, TranslateError> {
        match node.kind() {
            "keyword_argument" | "dictionary_splat" => Ok(Expr::Unsupported {
                kind: node.kind().to_string(),
            }),
            _ => self.read_expr(node),
        }
    }

    fn read_subscript(&self, node: Node) -> Result<Expr, TranslateError> {
        let value = Box::new(self.read_expr(self.field(node, "value")?)?);
        let mut indices = self.read_exprs(&self.fields(node, "subscript"))?;

        let index = if indices.len() == 1 {
            indices.remove(0)
        } else {
            Expr::Tuple(indices)
        };
        Ok(Expr::Subscript {
            value,
            index: Box::new(index),
        })
    }

    /// `lo:hi:step`; positions are fixed by the colon tokens.
    fn read_slice(&self, node: Node) -> Result<Expr, TranslateError> {
        let mut bounds: [Option<Box<Expr>>; 3] = [None, None, None];
        let mut section = 0;

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == ":" {
                section += 1;
            } else if child.is_named() && child.kind() != "comment" && section < 3 {
                bounds[section] = Some(Box::new(self.read_expr(child)?));
            }
        }

        let [lower, upper, step] = bounds;
        Ok(Expr::Slice { lower, upper, step })
    }

    fn read_dictionary(&self, node: Node) -> Result<Expr, TranslateError> {
        let mut pairs = Vec::new();
        for child in self.named_children(node) {
            if child.kind() != "pair" {
                return Ok(Expr::Unsupported {
                    kind: child.kind().to_string(),
                });
            }
            let key = self.read_expr(self.field(child, "key")?)?;
            let value = self.read_expr(self.field(child, "value")?)?;
            pairs.push((key, value));
        }
        Ok(Expr::Dict(pairs))
    }

    fn read_lambda(&self, node: Node) -> Result<Expr, TranslateError> {
        let mut params = Vec::new();
        if let Some(list) = node.child_by_field_name("parameters") {
            for param in self.named_children(list) {
                if param.kind() != "identifier" {
                    return Ok(Expr::Unsupported {
                        kind: format!("lambda {}", param.kind()),
                    });
                }
                params.push(self.node_text(param).to_string());
            }
        }

        Ok(Expr::Lambda {
            params,
            body: Box::new(self.read_expr(self.field(node, "body")?)?),
        })
    }

    // ------------------------------------------------------------------
    // String literals
    // ------------------------------------------------------------------

    fn read_concatenated_string(&self, node: Node) -> Result<Expr, TranslateError> {
        let mut parts = Vec::new();
        let mut bytes = Vec::new();
        let mut any_template = false;
        let mut any_bytes = false;

        for child in self.named_children(node) {
            match self.read_string(child)? {
                Expr::Constant(Constant::Str(text)) => parts.push(TemplatePart::Literal(text)),
                Expr::Constant(Constant::Bytes(data)) => {
                    any_bytes = true;
                    bytes.extend(data);
                }
                Expr::TemplateString(nested) => {
                    any_template = true;
                    parts.extend(nested);
                }
                other => return Ok(other),
            }
        }

        if any_bytes {
            return Ok(Expr::Constant(Constant::Bytes(bytes)));
        }
        if any_template {
            return Ok(Expr::TemplateString(parts));
        }
        let text = parts
            .into_iter()
            .map(|part| match part {
                TemplatePart::Literal(text) => text,
                TemplatePart::Value(_) => String::new(),
            })
            .collect();
        Ok(Expr::Constant(Constant::Str(text)))
    }

    fn read_string(&self, node: Node) -> Result<Expr, TranslateError> {
        let mut prefix = String::new();
        let mut parts = Vec::new();
        let mut literal = Vec::new();

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "string_start" => {
                    prefix = self
                        .node_text(child)
                        .chars()
                        .take_while(|c| c.is_ascii_alphabetic())
                        .collect::<String>()
                        .to_ascii_lowercase();
                }
                "string_content" => {
                    let mut raw = self.node_text(child).to_string();
                    if prefix.contains('f') {
                        raw = raw.replace("{{", "{").replace("}}", "}");
                    }
                    if prefix.contains('r') {
                        literal.extend_from_slice(raw.as_bytes());
                    } else {
                        literal.extend(decode_escapes(&raw, prefix.contains('b')));
                    }
                }
                "escape_interpolation" => {
                    literal.extend_from_slice(&self.node_text(child).as_bytes()[..1]);
                }
                "interpolation" => {
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(
                            String::from_utf8_lossy(&literal).into_owned(),
                        ));
                        literal.clear();
                    }
                    let expr = match child
                        .child_by_field_name("expression")
                        .or_else(|| self.named_children(child).into_iter().next())
                    {
                        Some(inner) => self.read_expr(inner)?,
                        None => Expr::Unsupported {
                            kind: "interpolation".into(),
                        },
                    };
                    parts.push(TemplatePart::Value(expr));
                }
                _ => {}
            }
        }

        if prefix.contains('b') {
            return Ok(Expr::Constant(Constant::Bytes(literal)));
        }

        let text = String::from_utf8_lossy(&literal).into_owned();
        if !prefix.contains('f') {
            return Ok(Expr::Constant(Constant::Str(text)));
        }
        if !text.is_empty() {
            parts.push(TemplatePart::Literal(text));
        }
        Ok(Expr::TemplateString(parts))
    }
}

/// Decode backslash escapes of a non-raw literal into bytes.
///
/// In text mode `\xHH` and `\u` escapes produce UTF-8 encoded code points;
/// in bytes mode `\xHH` produces the raw byte.
fn decode_escapes(raw: &str, bytes_mode: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    let push_char = |out: &mut Vec<u8>, c: char| {
        let mut buf = [0u8; 4];
        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    };

    while let Some(c) = chars.next() {
        if c != '\\' {
            push_char(&mut out, c);
            continue;
        }
        let Some(escape) = chars.next() else {
            out.push(b'\\');
            break;
        };
        match escape {
            '\n' => {}
            'n' => out.push(b'\n'),
            't' => out.push(b'\t'),
            'r' => out.push(b'\r'),
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'v' => out.push(0x0b),
            '\\' | '\'' | '"' => out.push(escape as u8),
            'x' | 'u' | 'U' if escape == 'x' || !bytes_mode => {
                let width = match escape {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&digits, 16) {
                    Ok(code) if bytes_mode => out.push(code as u8),
                    Ok(code) => push_char(&mut out, char::from_u32(code).unwrap_or('\u{fffd}')),
                    Err(_) => {
                        out.push(b'\\');
                        push_char(&mut out, escape);
                        out.extend_from_slice(digits.as_bytes());
                    }
                }
            }
            '0'..='7' => {
                let mut digits = String::from(escape);
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                let code = u32::from_str_radix(&digits, 8).unwrap_or(0);
                if bytes_mode {
                    out.push(code as u8);
                } else {
                    push_char(&mut out, char::from_u32(code).unwrap_or('\u{fffd}'));
                }
            }
            // Unknown escapes are kept verbatim.
            other => {
                out.push(b'\\');
                push_char(&mut out, other);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_stmt(source: &str) -> StmtKind {
        read_python(source).unwrap().body.remove(0).kind
    }

    #[test]
    fn test_simple_assignment() {
        match first_stmt("x = 42") {
            StmtKind::Assign { targets, value } => {
                assert_eq!(targets, vec![Expr::name("x")]);
                assert_eq!(value, Expr::int(42));
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn test_block_level_statements() {
        let StmtKind::FunctionDef(def) =
            first_stmt("def tick(self):\n    self.count += 1\n    x = self.count\n    publish(x)\n")
        else {
            panic!("expected FunctionDef");
        };
        let kinds: Vec<_> = def.body.iter().map(|s| &s.kind).collect();
        assert!(matches!(kinds[0], StmtKind::AugAssign { .. }));
        assert!(matches!(kinds[1], StmtKind::Assign { .. }));
        assert!(matches!(kinds[2], StmtKind::Expr(Expr::Call { .. })));
    }

    #[test]
    fn test_real_statements_stay_unsupported() {
        assert_eq!(
            first_stmt("raise ValueError()"),
            StmtKind::Unsupported {
                kind: "raise_statement".into()
            }
        );
        assert_eq!(
            first_stmt("from os import path"),
            StmtKind::Unsupported {
                kind: "import_from_statement".into()
            }
        );
    }

    #[test]
    fn test_chained_assignment_targets() {
        match first_stmt("a = b = []") {
            StmtKind::Assign { targets, value } => {
                assert_eq!(targets, vec![Expr::name("a"), Expr::name("b")]);
                assert_eq!(value, Expr::List(vec![]));
            }
            other => panic!("expected Assign, got {other:?}"),
        }
    }

    #[test]
    fn test_annotated_assignment() {
        match first_stmt("queue: list = []") {
            StmtKind::AnnAssign {
                annotation, value, ..
            } => {
                assert_eq!(annotation, Expr::name("list"));
                assert!(value.is_some());
            }
            other => panic!("expected AnnAssign, got {other:?}"),
        }
    }

    #[test]
    fn test_function_call() {
        match first_stmt("print(\"hello\", 42)") {
            StmtKind::Expr(Expr::Call { func, args, .. }) => {
                assert_eq!(*func, Expr::name("print"));
                assert_eq!(args, vec![Expr::str("hello"), Expr::int(42)]);
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn test_function_parameters() {
        let StmtKind::FunctionDef(def) = first_stmt("def f(self, a, b=1, *rest):\n    pass") else {
            panic!("expected FunctionDef");
        };
        assert_eq!(def.name, "f");
        let names: Vec<_> = def.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["self", "a", "b", "rest"]);
        assert_eq!(def.params[2].default, Some(Expr::int(1)));
        assert_eq!(def.params[3].kind, ParamKind::VarArgs);
    }

    #[test]
    fn test_elif_chain_nests() {
        let source = "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n";
        let StmtKind::If { orelse, .. } = first_stmt(source) else {
            panic!("expected If");
        };
        assert_eq!(orelse.len(), 1);
        let StmtKind::If { test, orelse, .. } = &orelse[0].kind else {
            panic!("expected nested If");
        };
        assert_eq!(*test, Expr::name("b"));
        assert_eq!(orelse.len(), 1);
    }

    #[test]
    fn test_comparison_operators() {
        let StmtKind::Expr(Expr::Compare { ops, .. }) = first_stmt("a is not None") else {
            panic!("expected Compare");
        };
        assert_eq!(ops, vec![CmpOp::IsNot]);

        let StmtKind::Expr(Expr::Compare { ops, .. }) = first_stmt("0 < x <= 10") else {
            panic!("expected Compare");
        };
        assert_eq!(ops, vec![CmpOp::Lt, CmpOp::LtE]);
    }

    #[test]
    fn test_boolean_operator_flattens() {
        let StmtKind::Expr(Expr::BoolOp { op, values }) = first_stmt("a or b or c") else {
            panic!("expected BoolOp");
        };
        assert_eq!(op, BoolOp::Or);
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_f_string_parts() {
        let StmtKind::Expr(Expr::TemplateString(parts)) = first_stmt("f\"tele/{eui}/x\"") else {
            panic!("expected TemplateString");
        };
        assert_eq!(
            parts,
            vec![
                TemplatePart::Literal("tele/".into()),
                TemplatePart::Value(Expr::name("eui")),
                TemplatePart::Literal("/x".into()),
            ]
        );
    }

    #[test]
    fn test_string_escapes_decoded() {
        assert_eq!(
            first_stmt(r"'a\nb\x41'"),
            StmtKind::Expr(Expr::str("a\nbA"))
        );
        assert_eq!(
            first_stmt(r"b'\x01\xff'"),
            StmtKind::Expr(Expr::Constant(Constant::Bytes(vec![0x01, 0xff])))
        );
    }

    #[test]
    fn test_integer_radix_normalised() {
        assert_eq!(first_stmt("0o17"), StmtKind::Expr(Expr::int(15)));
        assert_eq!(first_stmt("1_000"), StmtKind::Expr(Expr::int(1000)));
        assert_eq!(
            first_stmt("0xFF"),
            StmtKind::Expr(Expr::Constant(Constant::Int("0xFF".into())))
        );
    }

    #[test]
    fn test_try_handlers() {
        let source = "try:\n    f()\nexcept Exception as e:\n    g(e)\nfinally:\n    h()\n";
        let StmtKind::Try {
            handlers,
            finalbody,
            ..
        } = first_stmt(source)
        else {
            panic!("expected Try");
        };
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].name.as_deref(), Some("e"));
        assert_eq!(handlers[0].type_, Some(Expr::name("Exception")));
        assert_eq!(finalbody.len(), 1);
    }

    #[test]
    fn test_unmodelled_statement_is_unsupported() {
        assert_eq!(
            first_stmt("with open(p) as f:\n    pass"),
            StmtKind::Unsupported {
                kind: "with_statement".into()
            }
        );
    }

    #[test]
    fn test_statement_lines() {
        let module = read_python("x = 1\n\ny = 2\n").unwrap();
        let lines: Vec<_> = module.body.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_syntax_error_position() {
        let err = read_python("x = 1\ndef broken(:\n").unwrap_err();
        match err {
            TranslateError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected Parse, got {other:?}"),
        }
    }
}
